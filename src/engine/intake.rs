use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::state_machine::transition;
use crate::error::AppError;
use crate::models::bid::{Bid, BidStatus};
use crate::models::event::EngineEvent;
use crate::models::job::JobStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBid {
    pub job_id: Uuid,
    pub driver_id: Uuid,
    pub amount: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Records a driver's bid on a job that is still open for bidding.
///
/// Refusals: `InvalidAmount` for a non-positive or non-finite amount,
/// `NotFound` for an unknown driver or job, `Forbidden` for an inactive driver,
/// `JobNotBiddable` once the job left `open`/`bidding` or its deadline passed,
/// `DuplicateBid` when the driver already holds an active bid on the job.
pub async fn place_bid(state: &AppState, request: PlaceBid, now: DateTime<Utc>) -> Result<Bid, AppError> {
    let result = try_place_bid(state, request, now).await;
    let outcome = match &result {
        Ok(_) => "accepted",
        Err(AppError::DuplicateBid { .. }) => "duplicate",
        Err(AppError::InvalidAmount(_)) => "invalid_amount",
        Err(AppError::Forbidden(_)) => "driver_inactive",
        Err(AppError::JobNotBiddable { .. }) => "not_biddable",
        Err(AppError::LockTimeout(_)) => "lock_timeout",
        Err(_) => "error",
    };
    state.metrics.bids_total.with_label_values(&[outcome]).inc();

    if let Err(err) = &result {
        debug!(error = %err, outcome, "bid refused");
    }
    result
}

async fn try_place_bid(state: &AppState, request: PlaceBid, now: DateTime<Utc>) -> Result<Bid, AppError> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(AppError::InvalidAmount(request.amount));
    }

    let driver = state.driver(&request.driver_id)?;
    if !driver.is_active() {
        return Err(AppError::Forbidden(format!(
            "driver {} is inactive",
            driver.id
        )));
    }

    let _guard = state.job_locks.acquire(request.job_id).await?;

    // Re-read under the lock: an allocation may have committed while we waited.
    let mut job = state.job(&request.job_id)?;
    if !job.status.accepts_bids() {
        return Err(AppError::JobNotBiddable {
            job_id: job.id,
            reason: format!("job is {}", job.status),
        });
    }
    if job.deadline_passed(now) {
        return Err(AppError::JobNotBiddable {
            job_id: job.id,
            reason: format!("bidding closed at {}", job.bidding_deadline),
        });
    }

    let existing = state
        .bids_for_job(&job.id)
        .into_iter()
        .filter(|bid| bid.driver_id == driver.id && bid.is_active())
        .count();
    match existing {
        0 => {}
        1 => {
            return Err(AppError::DuplicateBid {
                job_id: job.id,
                driver_id: driver.id,
            });
        }
        n => {
            return Err(state.invariant_violation(
                job.id,
                format!("driver {} holds {n} active bids on job {}", driver.id, job.id),
            ));
        }
    }

    let bid = Bid {
        id: Uuid::new_v4(),
        job_id: job.id,
        driver_id: driver.id,
        bid_amount: request.amount,
        message: request
            .message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty()),
        driver_rating_at_bid: driver.rating,
        created_at: now,
        status: BidStatus::Active,
        updated_at: now,
    };

    let opened = if job.status == JobStatus::Open {
        Some(transition(&mut job, JobStatus::Bidding, now)?)
    } else {
        None
    };

    state.bids.insert(bid.id, bid.clone());
    if opened.is_some() {
        state.jobs.insert(job.id, job.clone());
    }
    state.metrics.active_bids.inc();

    info!(
        job_id = %job.id,
        driver_id = %driver.id,
        bid_id = %bid.id,
        amount = bid.bid_amount,
        "bid placed"
    );

    state.publish(EngineEvent::BidPlaced {
        job_id: job.id,
        bid_id: bid.id,
        driver_id: driver.id,
        amount: bid.bid_amount,
    });
    if let Some(from) = opened {
        state.publish(EngineEvent::JobStatusChanged {
            job_id: job.id,
            from,
            to: JobStatus::Bidding,
            at: now,
        });
    }

    Ok(bid)
}

/// Withdraws a driver's own active bid. When it was the last active bid on a
/// `bidding` job the job goes back to `open`.
pub async fn withdraw_bid(
    state: &AppState,
    bid_id: Uuid,
    driver_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Bid, AppError> {
    let bid = state.bid(&bid_id)?;
    if bid.driver_id != driver_id {
        return Err(AppError::Forbidden(format!(
            "bid {bid_id} does not belong to driver {driver_id}"
        )));
    }

    let _guard = state.job_locks.acquire(bid.job_id).await?;

    let mut bid = state.bid(&bid_id)?;
    if !bid.is_active() {
        return Err(AppError::BidNotActive {
            bid_id,
            status: bid.status,
        });
    }

    let mut job = state.job(&bid.job_id)?;
    if !job.status.accepts_bids() {
        return Err(AppError::JobNotBiddable {
            job_id: job.id,
            reason: format!("job is {}", job.status),
        });
    }

    let others_active = state
        .bids_for_job(&job.id)
        .iter()
        .any(|other| other.id != bid_id && other.is_active());

    let reopened = if job.status == JobStatus::Bidding && !others_active {
        Some(transition(&mut job, JobStatus::Open, now)?)
    } else {
        None
    };

    bid.status = BidStatus::Withdrawn;
    bid.updated_at = now;
    state.bids.insert(bid.id, bid.clone());
    if reopened.is_some() {
        state.jobs.insert(job.id, job.clone());
    }
    state.metrics.active_bids.dec();
    state.metrics.bids_total.with_label_values(&["withdrawn"]).inc();

    info!(job_id = %job.id, driver_id = %driver_id, bid_id = %bid_id, reopened = reopened.is_some(), "bid withdrawn");

    state.publish(EngineEvent::BidWithdrawn {
        job_id: job.id,
        bid_id,
        driver_id,
    });
    if let Some(from) = reopened {
        state.publish(EngineEvent::JobStatusChanged {
            job_id: job.id,
            from,
            to: JobStatus::Open,
            at: now,
        });
    }

    Ok(bid)
}
