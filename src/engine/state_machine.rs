use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::allocation::AllocationDecision;
use crate::engine::fairness::FairnessTracker;
use crate::error::AppError;
use crate::models::assignment::{AllocationTrigger, Assignment};
use crate::models::bid::BidStatus;
use crate::models::event::EngineEvent;
use crate::models::job::{JobStatus, RouteJob};
use crate::state::AppState;

/// Every permitted job status change. Anything else is an `InvalidTransition`.
const TRANSITIONS: &[(JobStatus, JobStatus)] = &[
    (JobStatus::Open, JobStatus::Bidding),
    (JobStatus::Bidding, JobStatus::Open),
    (JobStatus::Bidding, JobStatus::Assigned),
    (JobStatus::Assigned, JobStatus::InProgress),
    (JobStatus::InProgress, JobStatus::Completed),
    (JobStatus::Open, JobStatus::Cancelled),
    (JobStatus::Bidding, JobStatus::Cancelled),
    (JobStatus::Assigned, JobStatus::Cancelled),
    (JobStatus::InProgress, JobStatus::Cancelled),
];

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Moves `job` to `to`, returning the previous status. Leaves `job` untouched on error.
pub fn transition(job: &mut RouteJob, to: JobStatus, now: DateTime<Utc>) -> Result<JobStatus, AppError> {
    let from = job.status;
    if !can_transition(from, to) {
        return Err(AppError::InvalidTransition {
            job_id: job.id,
            from,
            to,
        });
    }

    job.status = to;
    job.updated_at = now;
    Ok(from)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRouteJob {
    pub area: String,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub estimated_stops: u32,
    pub estimated_hours: f64,
    pub base_pay: f64,
    /// Overrides the deadline derived from the scheduled start.
    #[serde(default)]
    pub bidding_deadline: Option<DateTime<Utc>>,
}

pub fn create_job(state: &AppState, new_job: NewRouteJob, now: DateTime<Utc>) -> Result<RouteJob, AppError> {
    if new_job.area.trim().is_empty() {
        return Err(AppError::BadRequest("area cannot be empty".to_string()));
    }

    if new_job.start_time >= new_job.end_time {
        return Err(AppError::BadRequest(
            "start_time must be before end_time".to_string(),
        ));
    }

    if !new_job.base_pay.is_finite() || new_job.base_pay <= 0.0 {
        return Err(AppError::BadRequest("base_pay must be > 0".to_string()));
    }

    if !new_job.estimated_hours.is_finite() || new_job.estimated_hours < 0.0 {
        return Err(AppError::BadRequest(
            "estimated_hours must be >= 0".to_string(),
        ));
    }

    let scheduled_start = new_job.scheduled_date.and_time(new_job.start_time).and_utc();
    let bidding_deadline = match new_job.bidding_deadline {
        Some(deadline) => deadline,
        None => scheduled_start
            .checked_sub_signed(state.engine.bidding_lead)
            .ok_or_else(|| {
                AppError::BadRequest("scheduled start is out of range".to_string())
            })?,
    };

    if bidding_deadline > scheduled_start {
        return Err(AppError::BadRequest(
            "bidding_deadline must not be after the scheduled start".to_string(),
        ));
    }

    if bidding_deadline <= now {
        return Err(AppError::BadRequest(format!(
            "bidding deadline {bidding_deadline} has already passed"
        )));
    }

    let job = RouteJob {
        id: Uuid::new_v4(),
        area: new_job.area.trim().to_string(),
        scheduled_date: new_job.scheduled_date,
        start_time: new_job.start_time,
        end_time: new_job.end_time,
        estimated_stops: new_job.estimated_stops,
        estimated_hours: new_job.estimated_hours,
        base_pay: new_job.base_pay,
        status: JobStatus::Open,
        assigned_driver_id: None,
        bidding_deadline,
        created_at: now,
        updated_at: now,
    };

    state.jobs.insert(job.id, job.clone());
    info!(job_id = %job.id, area = %job.area, deadline = %job.bidding_deadline, "route job created");

    Ok(job)
}

/// Commits a winning allocation: the job becomes `assigned`, the winning bid
/// `accepted`, every other active bid `rejected`, and the win is credited to
/// the driver's fairness window.
///
/// The caller must hold the job's lock and the fairness tracker. Every check
/// runs before the first write, so a failure leaves no partial state.
pub fn commit_assignment(
    state: &AppState,
    job: &RouteJob,
    decision: &AllocationDecision,
    fairness: &mut FairnessTracker,
    trigger: AllocationTrigger,
    now: DateTime<Utc>,
) -> Result<Assignment, AppError> {
    let winner = &decision.winner;

    let mut assigned_job = job.clone();
    transition(&mut assigned_job, JobStatus::Assigned, now)?;

    if job.assigned_driver_id.is_some() {
        return Err(state.invariant_violation(
            job.id,
            format!("job {} in bidding already has an assigned driver", job.id),
        ));
    }

    let bids = state.bids_for_job(&job.id);
    if let Some(accepted) = bids.iter().find(|bid| bid.status == BidStatus::Accepted) {
        return Err(state.invariant_violation(
            job.id,
            format!("job {} already has accepted bid {}", job.id, accepted.id),
        ));
    }

    let stored_winner = bids
        .iter()
        .find(|bid| bid.id == winner.bid.id)
        .ok_or_else(|| AppError::Internal(format!("winning bid {} vanished", winner.bid.id)))?;
    if !stored_winner.is_active() || stored_winner.job_id != job.id {
        return Err(AppError::Internal(format!(
            "winning bid {} is no longer active on job {}",
            winner.bid.id, job.id
        )));
    }

    let mut active_drivers: Vec<Uuid> = bids
        .iter()
        .filter(|bid| bid.is_active())
        .map(|bid| bid.driver_id)
        .collect();
    active_drivers.sort();
    let duplicated = active_drivers.windows(2).any(|pair| pair[0] == pair[1]);
    if duplicated {
        return Err(state.invariant_violation(
            job.id,
            format!("job {} has more than one active bid from the same driver", job.id),
        ));
    }

    assigned_job.assigned_driver_id = Some(winner.bid.driver_id);

    // Writes start here; nothing below can fail.
    if let Some(mut bid) = state.bids.get_mut(&winner.bid.id) {
        bid.status = BidStatus::Accepted;
        bid.updated_at = now;
    }
    state.metrics.active_bids.dec();

    let mut rejected_driver_ids = Vec::with_capacity(decision.rejected_bids.len());
    for rejected in &decision.rejected_bids {
        if let Some(mut bid) = state.bids.get_mut(&rejected.id) {
            if bid.is_active() {
                bid.status = BidStatus::Rejected;
                bid.updated_at = now;
                state.metrics.active_bids.dec();
                rejected_driver_ids.push(bid.driver_id);
            }
        }
    }

    state.jobs.insert(assigned_job.id, assigned_job.clone());
    fairness.record_win(winner.bid.driver_id, now);

    let assignment = Assignment {
        id: Uuid::new_v4(),
        job_id: job.id,
        driver_id: winner.bid.driver_id,
        bid_id: winner.bid.id,
        bid_amount: winner.bid.bid_amount,
        score: winner.score,
        score_breakdown: winner.breakdown,
        rejected_bids: rejected_driver_ids.len(),
        trigger,
        assigned_at: now,
    };
    state.assignments.insert(assignment.id, assignment.clone());

    let wins = fairness.count_wins_in_window(&winner.bid.driver_id, now);
    state
        .metrics
        .driver_wins_in_window
        .with_label_values(&[&winner.bid.driver_id.to_string()])
        .set(wins as f64);

    info!(
        job_id = %job.id,
        driver_id = %winner.bid.driver_id,
        bid_id = %winner.bid.id,
        score = winner.score,
        rejected = rejected_driver_ids.len(),
        wins_in_window = wins,
        "job assigned"
    );

    state.publish(EngineEvent::JobStatusChanged {
        job_id: job.id,
        from: job.status,
        to: JobStatus::Assigned,
        at: now,
    });
    state.publish(EngineEvent::JobAssigned {
        assignment: assignment.clone(),
        rejected_driver_ids,
    });

    Ok(assignment)
}

/// Operator cancellation. Active and accepted bids become `rejected`;
/// withdrawn bids keep their status so the audit trail shows who left on their own.
pub async fn cancel_job(state: &AppState, job_id: Uuid, now: DateTime<Utc>) -> Result<RouteJob, AppError> {
    let guard = state.job_locks.acquire(job_id).await?;

    let mut job = state.job(&job_id)?;
    let from = transition(&mut job, JobStatus::Cancelled, now)?;
    job.assigned_driver_id = None;

    let mut rejected_driver_ids = Vec::new();
    for bid in state.bids_for_job(&job_id) {
        if !matches!(bid.status, BidStatus::Active | BidStatus::Accepted) {
            continue;
        }
        if let Some(mut stored) = state.bids.get_mut(&bid.id) {
            if stored.status == BidStatus::Active {
                state.metrics.active_bids.dec();
            }
            stored.status = BidStatus::Rejected;
            stored.updated_at = now;
            rejected_driver_ids.push(stored.driver_id);
        }
    }

    state.jobs.insert(job.id, job.clone());
    drop(guard);
    state.job_locks.release(&job_id);

    info!(job_id = %job_id, from = %from, rejected = rejected_driver_ids.len(), "job cancelled");

    state.publish(EngineEvent::JobStatusChanged {
        job_id,
        from,
        to: JobStatus::Cancelled,
        at: now,
    });
    state.publish(EngineEvent::JobCancelled {
        job_id,
        rejected_driver_ids,
        at: now,
    });

    Ok(job)
}

/// The assigned driver begins the route.
pub async fn start_job(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    now: DateTime<Utc>,
) -> Result<RouteJob, AppError> {
    driver_transition(state, job_id, driver_id, JobStatus::InProgress, now).await
}

/// The assigned driver finishes the route.
pub async fn complete_job(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    now: DateTime<Utc>,
) -> Result<RouteJob, AppError> {
    let job = driver_transition(state, job_id, driver_id, JobStatus::Completed, now).await?;
    state.job_locks.release(&job_id);
    Ok(job)
}

async fn driver_transition(
    state: &AppState,
    job_id: Uuid,
    driver_id: Uuid,
    to: JobStatus,
    now: DateTime<Utc>,
) -> Result<RouteJob, AppError> {
    let _guard = state.job_locks.acquire(job_id).await?;

    let mut job = state.job(&job_id)?;
    if job.status.has_assignee() && job.assigned_driver_id != Some(driver_id) {
        return Err(AppError::Forbidden(format!(
            "driver {driver_id} is not assigned to job {job_id}"
        )));
    }

    let from = transition(&mut job, to, now)?;
    state.jobs.insert(job.id, job.clone());

    info!(job_id = %job_id, driver_id = %driver_id, from = %from, to = %to, "job status changed");
    state.publish(EngineEvent::JobStatusChanged {
        job_id,
        from,
        to,
        at: now,
    });

    Ok(job)
}
