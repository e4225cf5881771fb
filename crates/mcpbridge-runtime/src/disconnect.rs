//! Classifies an I/O failure as a normal disconnect or a genuine error
//! (spec §4.4 "normal-disconnect classification", §7 error taxonomy).
//! Only the anomalous half ever reaches the `ErrorSink`; the handler
//! treats everything else as an ordinary connection teardown logged at
//! `info`.

use std::io::{self, ErrorKind};

/// Whether an I/O error observed while reading from or writing to a
/// connection should be treated as an ordinary disconnect rather than a
/// warning-worthy failure.
pub fn is_normal_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    ) || is_platform_normal_disconnect(error)
}

/// Platform-specific phrasing of "the peer went away" that doesn't always
/// map to a distinct `ErrorKind` (spec §4.4: "operation aborted /
/// connection reset / netname deleted / connection aborted", "including
/// wrapped inner causes").
fn is_platform_normal_disconnect(error: &io::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        let text = err.to_string().to_ascii_lowercase();
        if PLATFORM_NORMAL_PHRASES.iter().any(|p| text.contains(p)) {
            return true;
        }
        current = err.source();
    }
    false
}

const PLATFORM_NORMAL_PHRASES: &[&str] = &[
    "operation aborted",
    "connection reset",
    "the specified network name is no longer available",
    "netname deleted",
    "connection aborted",
    "socket is not connected",
    "stream disposed",
    "transport endpoint is not connected",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_reset_is_normal() {
        let err = io::Error::new(ErrorKind::ConnectionReset, "peer reset");
        assert!(is_normal_disconnect(&err));
    }

    #[test]
    fn broken_pipe_is_normal() {
        let err = io::Error::new(ErrorKind::BrokenPipe, "pipe closed");
        assert!(is_normal_disconnect(&err));
    }

    #[test]
    fn platform_phrase_in_message_is_normal() {
        let err = io::Error::other("An existing connection was forcibly closed (connection reset) by the remote host");
        assert!(is_normal_disconnect(&err));
    }

    #[test]
    fn genuine_error_is_not_normal() {
        let err = io::Error::new(ErrorKind::PermissionDenied, "permission denied");
        assert!(!is_normal_disconnect(&err));
    }

    #[test]
    fn wrapped_inner_cause_is_still_detected() {
        let inner = io::Error::new(ErrorKind::Other, "connection aborted by peer");
        let wrapped = io::Error::new(ErrorKind::Other, inner);
        assert!(is_normal_disconnect(&wrapped));
    }
}
