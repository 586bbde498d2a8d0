use tokio_cron_scheduler::{Job, JobScheduler};

use crate::allocation::AllocationCoordinator;
use crate::error::Result;

/// Starts the cron job that expires overdue offers. Keep the returned scheduler alive.
pub async fn start_expiry_sweep(
    coordinator: AllocationCoordinator,
    schedule: &str,
    batch: i64,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(schedule, move |_id, _scheduler| {
        let coordinator = coordinator.clone();
        Box::pin(async move {
            if let Err(e) = run_sweep(&coordinator, batch).await {
                tracing::error!(error = %e, "offer expiry sweep failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(schedule, batch, "offer expiry sweep scheduled");
    Ok(scheduler)
}

/// One sweep pass; drains full batches until the backlog is cleared.
pub async fn run_sweep(coordinator: &AllocationCoordinator, batch: i64) -> Result<usize> {
    let mut expired = 0;
    loop {
        let report = coordinator.sweep_expired_offers(batch).await?;
        expired += report.expired;
        if report.expired == 0 || (report.examined as i64) < batch {
            break;
        }
    }
    Ok(expired)
}
