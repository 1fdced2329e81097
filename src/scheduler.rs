//! Background jobs: the crime statistics sync and hourly housekeeping.

use crate::error::AppError;
use crate::proxy::crime::SyncError;
use crate::proxy::SyncTrigger;
use crate::{AppState, Result};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

/// Top of every hour.
pub const HOUSEKEEPING_SCHEDULE: &str = "0 0 * * * *";

impl From<JobSchedulerError> for AppError {
    fn from(err: JobSchedulerError) -> Self {
        AppError::ConfigError(format!("scheduler: {}", err))
    }
}

/// Run one crime sync, treating an overlapping run as a skip.
pub async fn run_crime_sync(state: &AppState, trigger: SyncTrigger) {
    match state.crime.run(&state.db, trigger).await {
        Ok(report) if report.is_success() => {}
        Ok(report) => warn!(
            "Crime sync ({:?}) finished with {} failed queries and {} failed batches",
            trigger, report.queries_failed, report.failed_batches
        ),
        Err(SyncError::AlreadyRunning) => {
            warn!("Skipping {:?} crime sync: a run is already in progress", trigger)
        }
    }
}

/// Expired sessions and stale login-attempt windows.
pub async fn housekeeping(state: &AppState) {
    match state.db.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => info!("Removed {} expired sessions", n),
        Err(e) => error!("Session cleanup failed: {}", e),
    }
    state.rate_limiter.cleanup().await;
}

/// Register the jobs and start the scheduler. The caller keeps the handle
/// and shuts it down on exit.
pub async fn start(state: AppState) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    if state.config.crime.enabled {
        let schedule = state.config.crime.schedule.clone();
        let crime_state = state.clone();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let state = crime_state.clone();
            Box::pin(async move {
                run_crime_sync(&state, SyncTrigger::Scheduled).await;
            })
        })
        .map_err(|e| AppError::ConfigError(format!("invalid crime.schedule '{}': {}", schedule, e)))?;
        scheduler.add(job).await?;
        info!("Crime sync scheduled with '{}'", schedule);
    } else {
        info!("Crime sync disabled");
    }

    let housekeeping_state = state.clone();
    let job = Job::new_async(HOUSEKEEPING_SCHEDULE, move |_uuid, _lock| {
        let state = housekeeping_state.clone();
        Box::pin(async move {
            housekeeping(&state).await;
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_parse() {
        assert!(Job::new_async(HOUSEKEEPING_SCHEDULE, |_, _| Box::pin(async {})).is_ok());
        assert!(Job::new_async("0 0 3 * * *", |_, _| Box::pin(async {})).is_ok());
    }

    #[test]
    fn bad_schedule_is_rejected() {
        assert!(Job::new_async("every night", |_, _| Box::pin(async {})).is_err());
    }

    #[test]
    fn scheduler_errors_map_to_config_errors() {
        let err = AppError::from(JobSchedulerError::CantAdd);
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
