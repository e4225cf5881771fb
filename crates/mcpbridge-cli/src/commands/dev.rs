//! `mcpbridge dev`: runs the editor-bridge stand-in under a
//! [`LifecycleController`] and periodically drives it through the same
//! before-reload/after-reload cycle a real host editor's domain reload
//! would trigger, so the reconnect/recovery path can be exercised without
//! an actual editor attached.

use super::host::StaticCatalogProcessor;
use anyhow::Result;
use mcpbridge_core::session::MemorySessionStore;
use mcpbridge_runtime::{LifecycleController, ReloadScheduler};
use std::sync::Arc;
use std::time::Duration;

struct TokioScheduler;

impl ReloadScheduler for TokioScheduler {
    fn schedule(&self, after: Duration, work: Box<dyn FnOnce() + Send>) {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            work();
        });
    }
}

pub async fn execute(port: u16, reload_every: Duration) -> Result<()> {
    let controller = Arc::new(LifecycleController::new(
        Arc::new(StaticCatalogProcessor),
        None,
        None,
        Arc::new(MemorySessionStore::new()),
        Duration::from_secs(10),
        Duration::from_secs(5),
    ));

    controller.start(port).await?;
    let bound = controller.bound_port().await.unwrap_or(port);
    println!("dev bridge listening on 127.0.0.1:{bound}");
    println!("simulating a domain reload every {reload_every:?}; Ctrl-C to stop");

    let scheduler = TokioScheduler;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(reload_every) => {
                println!("simulating domain reload...");
                controller.before_reload().await?;
                controller
                    .clone()
                    .after_reload(&scheduler, true, controller.clone())
                    .await?;
            }
        }
    }

    println!("shutting down");
    controller.stop().await;
    Ok(())
}
