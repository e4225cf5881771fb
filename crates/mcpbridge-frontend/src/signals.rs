//! Process lifecycle (spec §4.6 "Signal and stdio lifecycle"): SIGINT,
//! SIGTERM, SIGHUP, and stdin closing all mean the same thing — the host
//! editor is gone and this process should wind down. Shutdown is
//! idempotent: whichever trigger fires first runs the teardown, every
//! later trigger is a no-op.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Runs teardown exactly once regardless of how many trigger sources
/// fire concurrently (a signal racing stdin EOF, for instance).
pub struct ShutdownCoordinator {
    fired: AtomicBool,
    discovery_cancel: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(discovery_cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            fired: AtomicBool::new(false),
            discovery_cancel,
        })
    }

    /// Stop the discovery timer (spec: "clear any remaining timers").
    /// Returns `true` if this call actually performed the teardown.
    pub fn shutdown(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("front end shutting down, cancelling discovery timer");
        self.discovery_cancel.cancel();
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Build the watch future for every shutdown trigger this process
/// recognizes. `discovery_cancel` is the same [`CancellationToken`]
/// returned by [`crate::discovery::EditorDiscovery::start`] — shutdown
/// cancels it directly rather than reaching back into the discovery
/// timer. The caller (the `mcpbridge-cli` binary) awaits the returned
/// future and then exits the process; this library layer never calls
/// `std::process::exit` itself.
pub fn spawn_shutdown_watch(
    discovery_cancel: CancellationToken,
) -> (Arc<ShutdownCoordinator>, impl Future<Output = ()>) {
    let coordinator = ShutdownCoordinator::new(discovery_cancel);
    let watch = {
        let coordinator = coordinator.clone();
        async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            #[cfg(unix)]
            let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
                .expect("failed to install SIGHUP handler");

            let stdin_closed = async {
                let mut stdin = tokio::io::stdin();
                let mut buf = [0u8; 1];
                loop {
                    match stdin.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(_) => continue,
                        Err(_) => break,
                    }
                }
            };

            #[cfg(unix)]
            tokio::select! {
                _ = ctrl_c => tracing::info!("received SIGINT"),
                _ = terminate.recv() => tracing::info!("received SIGTERM"),
                _ = hangup.recv() => tracing::info!("received SIGHUP"),
                _ = stdin_closed => tracing::info!("stdin closed"),
            }

            #[cfg(not(unix))]
            tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c"),
                _ = stdin_closed => tracing::info!("stdin closed"),
            }

            coordinator.shutdown();
        }
    };
    (coordinator, watch)
}

/// Install a panic hook that runs `on_panic` before the default hook, so
/// an unexpected panic still gets a best-effort shutdown (the rough
/// equivalent of a Node process's `uncaughtException`/`unhandledRejection`
/// handlers, spec §4.6).
pub fn install_panic_shutdown_hook(coordinator: Arc<ShutdownCoordinator>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        coordinator.shutdown();
        default_hook(info);
    }));
}
