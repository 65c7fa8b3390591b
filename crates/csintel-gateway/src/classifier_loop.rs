use std::sync::Arc;
use std::time::Duration;

use csintel_classifier::ClassifierWorker;
use tokio::sync::watch;
use tracing::{error, info};

/// The classifier is a single-leader cooperative worker driven by its own
/// short tick, not by the named `Job` system.
const POLL_INTERVAL_SECS: u64 = 5;

pub async fn run(worker: Arc<ClassifierWorker>, mut shutdown: watch::Receiver<bool>) {
    info!("classifier worker loop started");
    let mut interval = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match worker.run_once().await {
                    Ok(0) => {}
                    Ok(n) => info!(processed = n, "classifier batch processed"),
                    Err(e) => error!(err = %e, "classifier tick failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("classifier worker loop shutting down");
                    break;
                }
            }
        }
    }
}
