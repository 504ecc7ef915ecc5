use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::services::DocumentService;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// A sweep pass already in flight is allowed to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "sweep worker terminated abnormally");
            }
        }
    }
}

/// Periodic sweeper loop.
///
/// - Runs [`DocumentService::sweep_all`] once per `interval`
/// - The first pass runs immediately after spawn
/// - Failures are logged; the loop keeps going
#[derive(Debug)]
pub struct SweepWorker;

impl SweepWorker {
    pub fn spawn(service: DocumentService, interval: Duration) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(worker_loop(service, interval, shutdown_rx));
        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

async fn worker_loop(
    service: DocumentService,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "sweep worker started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                if let Err(err) = service.sweep_all().await {
                    warn!(error = %err, "sweep pass failed");
                }
            }
        }
    }

    info!("sweep worker stopped");
}
