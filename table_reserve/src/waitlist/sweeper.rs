//! Periodic expiry sweep.

use super::{manager::WaitlistManager, models::SweepReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{fmt::Display, sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

/// Something that re-queues lapsed confirmation windows
#[async_trait]
pub trait ExpirySweep: Send + Sync {
    type Error: Display + Send;

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, Self::Error>;
}

#[async_trait]
impl ExpirySweep for WaitlistManager {
    type Error = super::WaitlistError;

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, Self::Error> {
        WaitlistManager::sweep_expired(self, now).await
    }
}

/// Spawn a task that calls [`ExpirySweep::sweep_expired`] every `period`.
///
/// The first sweep runs immediately. Abort the returned handle to stop it.
pub fn spawn_sweeper<S>(sweeper: Arc<S>, period: Duration) -> JoinHandle<()>
where
    S: ExpirySweep + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Waitlist sweeper running every {:?}", period);

        loop {
            ticker.tick().await;

            match sweeper.sweep_expired(Utc::now()).await {
                Ok(report) if !report.failed.is_empty() => {
                    log::warn!(
                        "Sweep re-queued {} entries, {} failed",
                        report.requeued.len(),
                        report.failed.len()
                    );
                }
                Ok(report) if !report.is_empty() => {
                    log::debug!(
                        "Sweep re-queued {}, skipped {}",
                        report.requeued.len(),
                        report.skipped.len()
                    );
                }
                Ok(_) => {}
                Err(e) => log::error!("Waitlist sweep failed: {}", e),
            }
        }
    })
}
