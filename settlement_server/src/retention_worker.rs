use std::time::Duration;

use log::*;
use settlement_engine::{SqliteDatabase, WebhookProcessor};
use tokio::task::JoinHandle;

/// Starts the ledger retention worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Returns `None` if retention is disabled, i.e. the retention period does not cover the providers' redelivery
/// window.
pub fn start_retention_worker(
    processor: WebhookProcessor<SqliteDatabase>,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if !processor.config().retention_enabled() {
        warn!("🕰️ Ledger retention is disabled. Processed webhook records will be kept indefinitely.");
        return None;
    }
    let handle = tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Ledger retention worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running ledger retention job");
            match processor.purge_expired().await {
                Ok(Some(count)) => info!("🕰️ {count} processed webhook records purged"),
                Ok(None) => {},
                Err(e) => error!("🕰️ Error running ledger retention job: {e}"),
            }
        }
    });
    Some(handle)
}
