use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::allocation::{allocate, AllocationOutcome, NoWinnerReason};
use crate::engine::state_machine::commit_assignment;
use crate::error::AppError;
use crate::models::assignment::{AllocationTrigger, Assignment};
use crate::models::bid::Bid;
use crate::models::job::JobStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum JobAllocation {
    Assigned(Assignment),
    NoWinner(NoWinnerReason),
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub assigned: Vec<Uuid>,
    pub no_winner: Vec<Uuid>,
    /// Jobs whose lock was contended; they are picked up again next sweep.
    pub retry: Vec<Uuid>,
    /// Jobs another trigger allocated or cancelled between selection and locking.
    pub skipped: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

pub async fn run_scheduler(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "scheduler started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep(&state, Utc::now()).await;
    }
}

/// Allocates every job whose bidding deadline has passed.
///
/// `open` jobs past their deadline are reported as `NoWinner` and left
/// untouched until an operator acts. Jobs run one after another so each
/// decision sees the fairness credits of the ones before it. A failing job is
/// logged and skipped.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let mut due: Vec<(DateTime<Utc>, DateTime<Utc>, Uuid)> = state
        .jobs
        .iter()
        .filter(|entry| {
            let job = entry.value();
            job.status.accepts_bids() && job.deadline_passed(now)
        })
        .map(|entry| {
            let job = entry.value();
            (job.bidding_deadline, job.created_at, job.id)
        })
        .collect();
    due.sort();

    let mut report = SweepReport {
        examined: due.len(),
        ..SweepReport::default()
    };

    for (_, _, job_id) in due {
        match allocate_job(state, job_id, now, AllocationTrigger::Sweep).await {
            Ok(JobAllocation::Assigned(_)) => report.assigned.push(job_id),
            Ok(JobAllocation::NoWinner(_)) => report.no_winner.push(job_id),
            Err(err) if err.is_retryable() => {
                warn!(job_id = %job_id, error = %err, "job skipped; retrying next sweep");
                report.retry.push(job_id);
            }
            Err(AppError::InvalidTransition { from, .. }) => {
                debug!(job_id = %job_id, status = %from, "job left bidding before its turn");
                report.skipped.push(job_id);
            }
            Err(err) => {
                error!(job_id = %job_id, error = %err, "failed to allocate job");
                report.failed.push(job_id);
            }
        }
    }

    state.fairness.lock().await.prune(now);
    state.metrics.sweeps_total.inc();

    info!(
        examined = report.examined,
        assigned = report.assigned.len(),
        no_winner = report.no_winner.len(),
        retry = report.retry.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "sweep finished"
    );

    report
}

/// Runs allocation for one job under its lock and commits the result.
///
/// A forced run ignores the bidding deadline. Re-running on a job that already
/// left `bidding` fails with `InvalidTransition` and never yields a second winner.
pub async fn allocate_job(
    state: &AppState,
    job_id: Uuid,
    now: DateTime<Utc>,
    trigger: AllocationTrigger,
) -> Result<JobAllocation, AppError> {
    let start = Instant::now();
    let result = try_allocate_job(state, job_id, now, trigger).await;

    let outcome = match &result {
        Ok(JobAllocation::Assigned(_)) => "assigned",
        Ok(JobAllocation::NoWinner(_)) => "no_winner",
        Err(_) => "error",
    };
    state
        .metrics
        .allocation_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .allocations_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn try_allocate_job(
    state: &AppState,
    job_id: Uuid,
    now: DateTime<Utc>,
    trigger: AllocationTrigger,
) -> Result<JobAllocation, AppError> {
    let _guard = state.job_locks.acquire(job_id).await?;

    let job = state.job(&job_id)?;
    match job.status {
        JobStatus::Bidding => {}
        JobStatus::Open => {
            debug!(job_id = %job_id, "no active bids; nothing to allocate");
            return Ok(JobAllocation::NoWinner(NoWinnerReason::NoActiveBids));
        }
        from => {
            return Err(AppError::InvalidTransition {
                job_id,
                from,
                to: JobStatus::Assigned,
            });
        }
    }

    if trigger == AllocationTrigger::Sweep && !job.deadline_passed(now) {
        return Err(AppError::JobNotBiddable {
            job_id,
            reason: "bidding window is still open".to_string(),
        });
    }

    let active_bids: Vec<Bid> = state
        .bids_for_job(&job_id)
        .into_iter()
        .filter(Bid::is_active)
        .collect();
    let driver_ids: Vec<Uuid> = active_bids.iter().map(|bid| bid.driver_id).collect();
    let drivers = state.drivers_by_id(&driver_ids);

    let mut fairness = state.fairness.lock().await;
    let snapshot = fairness.snapshot(&driver_ids, now);

    match allocate(&job, &active_bids, &drivers, &snapshot, &state.engine) {
        AllocationOutcome::Winner(decision) => {
            let assignment =
                commit_assignment(state, &job, &decision, &mut fairness, trigger, now)?;
            Ok(JobAllocation::Assigned(assignment))
        }
        AllocationOutcome::NoWinner(reason) => {
            info!(
                job_id = %job_id,
                bids = active_bids.len(),
                reason = ?reason,
                "no winner this cycle"
            );
            Ok(JobAllocation::NoWinner(reason))
        }
    }
}
