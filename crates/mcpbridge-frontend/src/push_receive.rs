//! Push receive channel (spec §4.7): an inbound, loopback, ephemeral-port
//! TCP endpoint separate from the request/response bridge connection.
//! Editor-originated lifecycle events arrive as newline-delimited JSON
//! [`PushNotification`]s; each client connection gets a 30s idle timeout.

use mcpbridge_core::push::{PushNotification, PushType};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{FrontendError, Result};
use mcpbridge_config::constants::PUSH_CLIENT_IDLE_TIMEOUT;

/// Structured reason a push-channel client disconnected, derived from the
/// last lifecycle event it sent (or the bare socket close if none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    UserDisconnect,
    UnityShutdown,
    DomainReload,
    SocketClosed,
}

/// Event surfaced to the front-end session for each push line or
/// disconnect. Unknown `type` values are logged and ignored at the wire
/// layer (spec §4.7) and never reach this enum.
pub enum PushEvent {
    ConnectionEstablished,
    DomainReloadStart,
    DomainReloadRecovered,
    ToolsChanged,
    Disconnected(DisconnectReason),
}

fn classify(notification: &PushNotification) -> PushEvent {
    match notification.push_type {
        PushType::ConnectionEstablished => PushEvent::ConnectionEstablished,
        PushType::DomainReload => PushEvent::DomainReloadStart,
        PushType::DomainReloadRecovered => PushEvent::DomainReloadRecovered,
        PushType::ToolsChanged => PushEvent::ToolsChanged,
        PushType::UserDisconnect => PushEvent::Disconnected(DisconnectReason::UserDisconnect),
        PushType::UnityShutdown => PushEvent::Disconnected(DisconnectReason::UnityShutdown),
    }
}

pub struct PushReceiveServer {
    listener: TcpListener,
}

impl PushReceiveServer {
    /// Bind `127.0.0.1:0`; the OS-assigned port is read back via
    /// [`PushReceiveServer::bound_port`] so the host can advertise it
    /// (environment variable or shared file, spec §4.7).
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(FrontendError::PushServerBindFailed)?;
        Ok(Self { listener })
    }

    pub fn bound_port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accept loop. Each client is handled on its own task; `events`
    /// receives one [`PushEvent`] per parsed line or disconnect.
    pub async fn run(self, events: mpsc::Sender<PushEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let events = events.clone();
                            let client_cancel = cancel.clone();
                            tokio::spawn(async move {
                                Self::handle_client(stream, events, client_cancel).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "push receive accept failed");
                        }
                    }
                }
            }
        }
    }

    async fn handle_client(
        stream: TcpStream,
        events: mpsc::Sender<PushEvent>,
        cancel: CancellationToken,
    ) {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let mut last_reason = DisconnectReason::SocketClosed;

        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                result = tokio::time::timeout(PUSH_CLIENT_IDLE_TIMEOUT, reader.read_line(&mut line)) => result,
            };

            let Ok(read) = read else {
                break; // idle timeout
            };

            match read {
                Ok(0) => break, // clean EOF
                Ok(_) => {
                    let Ok(notification) = PushNotification::from_line(&line) else {
                        tracing::warn!(line = %line.trim_end(), "push channel: unrecognized event, ignoring");
                        continue;
                    };
                    let event = classify(&notification);
                    match &event {
                        PushEvent::Disconnected(reason) => last_reason = *reason,
                        // A domain-reload notification is itself a signal
                        // that the socket is about to go quiet; if nothing
                        // else supersedes it, the eventual close should be
                        // attributed to the reload rather than reported as
                        // a bare socket close.
                        PushEvent::DomainReloadStart => last_reason = DisconnectReason::DomainReload,
                        // Reload succeeded and the connection is healthy
                        // again; a later close is no longer explained by it.
                        PushEvent::DomainReloadRecovered => last_reason = DisconnectReason::SocketClosed,
                        _ => {}
                    }
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        let _ = events.send(PushEvent::Disconnected(last_reason)).await;
    }
}

pub type SharedPushReceiveServer = Arc<PushReceiveServer>;
