//! Lifecycle controller (spec §4.5): owns the bridge-server instance and
//! drives it through startup, shutdown, and the host editor's domain-reload
//! cycle. Per spec §9's resolved open question, this is the single
//! consistent ("single-flight-with-protection") variant; the source's
//! direct-start and UseCase-wrapped variants are not reproduced.

use crate::error::{Result, RuntimeError};
use crate::server::BridgeServer;
use crate::traits::{ConnectionSink, ErrorSink, ReloadScheduler, RequestProcessor, UserConfirmation};
use mcpbridge_config::constants::{
    RELOAD_RECOVERY_MAX_ATTEMPTS, START_PORT_WAIT_STEP, START_PORT_WAIT_TIMEOUT,
    STARTUP_PROTECTION_WINDOW,
};
use mcpbridge_core::retry::{retry_with_policy, RetryPolicy};
use mcpbridge_core::session::{SessionRecord, SessionStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

/// Owns the `BridgeServer` instance and the session record that must
/// survive the host's domain reload. A process-wide semaphore serializes
/// every start attempt (spec §4.5 "coalesced, single-flight").
pub struct LifecycleController {
    processor: Arc<dyn RequestProcessor>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    connection_sink: Option<Arc<dyn ConnectionSink>>,
    store: Arc<dyn SessionStore>,
    reconnection_timeout: Duration,
    shutdown_timeout: Duration,
    server: Mutex<Option<Arc<BridgeServer>>>,
    start_lock: Semaphore,
    protected_until: Mutex<Option<Instant>>,
}

impl LifecycleController {
    pub fn new(
        processor: Arc<dyn RequestProcessor>,
        error_sink: Option<Arc<dyn ErrorSink>>,
        connection_sink: Option<Arc<dyn ConnectionSink>>,
        store: Arc<dyn SessionStore>,
        reconnection_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            processor,
            error_sink,
            connection_sink,
            store,
            reconnection_timeout,
            shutdown_timeout,
            server: Mutex::new(None),
            start_lock: Semaphore::new(1),
            protected_until: Mutex::new(None),
        }
    }

    fn new_server(&self) -> Arc<BridgeServer> {
        Arc::new(BridgeServer::new(
            self.processor.clone(),
            self.error_sink.clone(),
            self.connection_sink.clone(),
        ))
    }

    /// Coalesced, single-flight start (spec §4.5 "Start protocol").
    pub async fn start(&self, port: u16) -> Result<()> {
        let _permit = self.start_lock.acquire().await.expect("semaphore closed");

        if let Some(until) = *self.protected_until.lock().await {
            if Instant::now() < until {
                tracing::info!(port, "start suppressed: startup protection window active");
                return Ok(());
            }
        }

        {
            let server = self.server.lock().await;
            if let Some(existing) = server.as_ref() {
                if existing.is_running() {
                    return Ok(()); // idempotent
                }
            }
        }

        // Dispose any stale, non-running instance before binding fresh.
        *self.server.lock().await = None;

        let new_server = self.new_server();
        let bind_result = self.bind_with_retry(&new_server, port).await;

        match bind_result {
            Ok(()) => {
                let bound_port = new_server.bound_port();
                *self.server.lock().await = Some(new_server);
                let mut record = self.store.load().await?;
                record.running = true;
                record.port = bound_port;
                record.reconnecting = false;
                record.show_reconnecting_ui = false;
                self.store.save(&record).await?;

                *self.protected_until.lock().await =
                    Some(Instant::now() + STARTUP_PROTECTION_WINDOW);
                Ok(())
            }
            Err(e) => {
                self.store.clear().await?;
                Err(e)
            }
        }
    }

    /// Wait-and-retry on `AddressInUse` for up to `START_PORT_WAIT_TIMEOUT`
    /// in `START_PORT_WAIT_STEP` steps, always on the same port — recovery
    /// never silently picks a different one (spec §4.5 step 5).
    async fn bind_with_retry(&self, server: &Arc<BridgeServer>, port: u16) -> Result<()> {
        let deadline = Instant::now() + START_PORT_WAIT_TIMEOUT;
        loop {
            match server.start(port).await {
                Ok(()) => return Ok(()),
                Err(RuntimeError::AddressInUse(_)) => {
                    if Instant::now() >= deadline {
                        return Err(RuntimeError::PortWaitExhausted(port));
                    }
                    tokio::time::sleep(START_PORT_WAIT_STEP).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Manual start from the host UI (spec §4.5 "Manual start"): not
    /// coalesced with recovery, asks the user before substituting a port,
    /// and pushes the substitute out to external config on acceptance.
    pub async fn start_manual(
        &self,
        requested_port: u16,
        substitute_port: u16,
        confirmation: &dyn UserConfirmation,
    ) -> Result<u16> {
        match self.start(requested_port).await {
            Ok(()) => Ok(requested_port),
            Err(RuntimeError::PortWaitExhausted(_)) | Err(RuntimeError::AddressInUse(_)) => {
                if confirmation
                    .confirm_port_substitute(requested_port, substitute_port)
                    .await
                {
                    self.start(substitute_port).await?;
                    confirmation.update_external_configs(substitute_port).await;
                    Ok(substitute_port)
                } else {
                    Err(RuntimeError::PortSubstituteDeclined(substitute_port))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Graceful shutdown of whatever server instance is currently owned.
    pub async fn stop(&self) {
        let server = self.server.lock().await.take();
        if let Some(server) = server {
            server.stop_with_timeout(self.shutdown_timeout).await;
        }
    }

    pub async fn bound_port(&self) -> Option<u16> {
        self.server.lock().await.as_ref().and_then(|s| s.bound_port())
    }

    pub fn bridge(&self) -> &Mutex<Option<Arc<BridgeServer>>> {
        &self.server
    }

    /// Pre-reload teardown (spec §4.5 "Pre-reload protocol"). Disposal is
    /// synchronous: a reload racing live sockets risks the port staying
    /// locked on reopen.
    pub async fn before_reload(&self) -> Result<()> {
        let mut record = self.store.load().await?;
        let port = record.port;
        record.in_reload = true;
        record.after_reload = true;
        record.reconnecting = true;
        record.show_reconnecting_ui = true;
        self.store.save(&record).await?;

        // The owned server is about to be torn down, so the "suppress a
        // duplicate start" protection no longer applies — otherwise a
        // reload landing inside the window would have its post-reload
        // recovery `start()` silently ignored and the bridge would never
        // rebind.
        *self.protected_until.lock().await = None;

        if let Some(server) = self.server.lock().await.take() {
            let bound = server.bound_port();
            server.stop_with_timeout(self.shutdown_timeout).await;
            if server.is_running() {
                let port = bound.or(port).unwrap_or_default();
                return Err(RuntimeError::ReloadTeardownFailed(
                    port,
                    "server still reported running after stop".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Post-reload protocol (spec §4.5): clears `in_reload`, arms the
    /// reconnecting-UI timeout if needed, then schedules recovery on the
    /// host's `ReloadScheduler` according to whether the server was
    /// running before the reload.
    pub async fn after_reload(
        &self,
        scheduler: &dyn ReloadScheduler,
        auto_start_preference: bool,
        controller: Arc<Self>,
    ) -> Result<()> {
        let mut record = self.store.load().await?;
        record.in_reload = false;
        self.store.save(&record).await?;

        if record.show_reconnecting_ui {
            self.arm_reconnecting_ui_timeout(scheduler, controller.clone());
        }

        if !record.running {
            return Ok(());
        }

        let currently_running = self
            .server
            .lock()
            .await
            .as_ref()
            .map(|s| s.is_running())
            .unwrap_or(false);
        if currently_running {
            return Ok(());
        }

        let Some(port) = record.port else {
            self.store.clear().await?;
            return Ok(());
        };

        if record.after_reload {
            self.schedule_recovery(scheduler, controller, port, Duration::from_millis(0));
        } else if auto_start_preference {
            self.schedule_recovery(scheduler, controller, port, Duration::from_millis(0));
        } else {
            self.store.clear().await?;
        }

        Ok(())
    }

    fn schedule_recovery(
        &self,
        scheduler: &dyn ReloadScheduler,
        controller: Arc<Self>,
        port: u16,
        delay: Duration,
    ) {
        scheduler.schedule(
            delay,
            Box::new(move || {
                tokio::spawn(async move {
                    let policy = RetryPolicy::new(RELOAD_RECOVERY_MAX_ATTEMPTS)
                        .with_backoff(Duration::from_millis(250), Duration::from_secs(5));
                    let result = retry_with_policy(
                        &policy,
                        |_: &RuntimeError| true,
                        || controller.start(port),
                    )
                    .await;

                    if let Err(e) = result {
                        tracing::error!(port, error = %e, "post-reload recovery exhausted");
                        if let Some(sink) = &controller.error_sink {
                            sink.on_error("post-reload-recovery", &e);
                        }
                        let _ = controller.store.clear().await;
                    }
                });
            }),
        );
    }

    fn arm_reconnecting_ui_timeout(&self, scheduler: &dyn ReloadScheduler, controller: Arc<Self>) {
        scheduler.schedule(
            self.reconnection_timeout,
            Box::new(move || {
                tokio::spawn(async move {
                    if let Ok(mut record) = controller.store.load().await {
                        if record.show_reconnecting_ui {
                            record.show_reconnecting_ui = false;
                            let _ = controller.store.save(&record).await;
                        }
                    }
                });
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::test_support::EchoProcessor;
    use mcpbridge_core::session::MemorySessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ImmediateScheduler;

    impl ReloadScheduler for ImmediateScheduler {
        fn schedule(&self, _after: Duration, work: Box<dyn FnOnce() + Send>) {
            work();
        }
    }

    fn controller() -> Arc<LifecycleController> {
        Arc::new(LifecycleController::new(
            Arc::new(EchoProcessor),
            None,
            None,
            Arc::new(MemorySessionStore::new()),
            Duration::from_millis(50),
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn start_is_idempotent_within_protection_window() {
        let controller = controller();
        controller.start(0).await.unwrap();
        let port = controller.bound_port().await.unwrap();

        // Second start with the same controller inside the protection
        // window must not create a second listener.
        controller.start(port).await.unwrap();
        assert_eq!(controller.bound_port().await, Some(port));

        controller.stop().await;
    }

    #[tokio::test]
    async fn stop_then_stop_is_a_no_op() {
        let controller = controller();
        controller.start(0).await.unwrap();
        controller.stop().await;
        controller.stop().await;
        assert!(controller.bound_port().await.is_none());
    }

    #[tokio::test]
    async fn before_reload_releases_the_port() {
        let controller = controller();
        controller.start(0).await.unwrap();
        let port = controller.bound_port().await.unwrap();

        controller.before_reload().await.unwrap();
        assert!(controller.bound_port().await.is_none());

        // The OS port should be free again.
        let relisten = tokio::net::TcpListener::bind(("127.0.0.1", port)).await;
        assert!(relisten.is_ok());
    }

    #[tokio::test]
    async fn reload_cycle_rebinds_same_port_and_clears_flags() {
        let controller = controller();
        controller.start(0).await.unwrap();
        let port = controller.bound_port().await.unwrap();

        controller.before_reload().await.unwrap();
        let record = controller.store.load().await.unwrap();
        assert!(record.in_reload);
        assert!(record.after_reload);
        assert!(record.running);

        let scheduler = ImmediateScheduler;
        controller
            .clone()
            .after_reload(&scheduler, false, controller.clone())
            .await
            .unwrap();

        // Recovery was scheduled and run immediately by the test scheduler.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.bound_port().await, Some(port));

        let record = controller.store.load().await.unwrap();
        assert!(!record.in_reload);

        controller.stop().await;
    }

    #[tokio::test]
    async fn no_autostart_and_no_after_reload_clears_session() {
        let controller = controller();
        controller.start(0).await.unwrap();
        controller.before_reload().await.unwrap();

        let mut record = controller.store.load().await.unwrap();
        record.after_reload = false; // simulate a plain process restart path
        controller.store.save(&record).await.unwrap();

        let scheduler = ImmediateScheduler;
        controller
            .clone()
            .after_reload(&scheduler, false, controller.clone())
            .await
            .unwrap();

        let record = controller.store.load().await.unwrap();
        assert!(!record.running);
    }

    #[tokio::test]
    async fn reconnecting_ui_timeout_clears_flag() {
        let controller = controller();
        controller.start(0).await.unwrap();
        controller.before_reload().await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingScheduler(Arc<AtomicUsize>);
        impl ReloadScheduler for CountingScheduler {
            fn schedule(&self, _after: Duration, work: Box<dyn FnOnce() + Send>) {
                self.0.fetch_add(1, Ordering::SeqCst);
                work();
            }
        }

        let scheduler = CountingScheduler(calls.clone());
        controller
            .clone()
            .after_reload(&scheduler, false, controller.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = controller.store.load().await.unwrap();
        assert!(!record.show_reconnecting_ui);
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
