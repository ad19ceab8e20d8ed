use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::fairness::FairnessSnapshot;
use crate::engine::scoring::{compute_score, PriceRange};
use crate::models::assignment::ScoreBreakdown;
use crate::models::bid::Bid;
use crate::models::driver::Driver;
use crate::models::job::RouteJob;
use crate::schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoWinnerReason {
    NoActiveBids,
    NoAvailableDrivers,
    FairnessCapReached,
}

#[derive(Debug, Clone)]
pub struct ScoredBid {
    pub bid: Bid,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub wins_in_window: usize,
}

#[derive(Debug, Clone)]
pub struct AllocationDecision {
    pub winner: ScoredBid,
    /// Every other active bid on the job, including ones filtered out before scoring.
    pub rejected_bids: Vec<Bid>,
    pub candidates_scored: usize,
}

#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    Winner(AllocationDecision),
    NoWinner(NoWinnerReason),
}

/// Picks the winning bid for `job`, or reports why there is none.
///
/// Filters run in order: the driver must be known and active, their
/// availability must cover the job slot, and they must be under the fairness
/// cap. Survivors are scored, and among bids within `tie_epsilon` of the best
/// score the driver with the fewest wins in the window wins, then the
/// earliest bid, then the lowest bid id. The result depends only on the inputs.
pub fn allocate(
    job: &RouteJob,
    active_bids: &[Bid],
    drivers: &HashMap<Uuid, Driver>,
    fairness: &FairnessSnapshot,
    config: &EngineConfig,
) -> AllocationOutcome {
    let mut active: Vec<&Bid> = active_bids
        .iter()
        .filter(|bid| bid.is_active() && bid.job_id == job.id)
        .collect();
    if active.is_empty() {
        return AllocationOutcome::NoWinner(NoWinnerReason::NoActiveBids);
    }
    active.sort_by(|a, b| first_come(a, b));

    let available: Vec<&Bid> = active
        .iter()
        .copied()
        .filter(|bid| {
            drivers.get(&bid.driver_id).is_some_and(|driver| {
                driver.is_active()
                    && schedule::covers(
                        &driver.availability,
                        job.weekday(),
                        job.start_time,
                        job.end_time,
                    )
            })
        })
        .collect();
    if available.is_empty() {
        return AllocationOutcome::NoWinner(NoWinnerReason::NoAvailableDrivers);
    }

    let eligible: Vec<&Bid> = available
        .into_iter()
        .filter(|bid| fairness.wins(&bid.driver_id) < config.max_jobs_per_window)
        .collect();

    let Some(prices) = PriceRange::from_amounts(eligible.iter().map(|bid| bid.bid_amount)) else {
        return AllocationOutcome::NoWinner(NoWinnerReason::FairnessCapReached);
    };

    let scored: Vec<ScoredBid> = eligible
        .iter()
        .map(|bid| {
            let wins_in_window = fairness.wins(&bid.driver_id);
            let (score, breakdown) = compute_score(bid, prices, wins_in_window, config);
            ScoredBid {
                bid: (*bid).clone(),
                score,
                breakdown,
                wins_in_window,
            }
        })
        .collect();

    // A price range exists only for a non-empty `eligible`, so `scored[0]` is in bounds.
    let top = scored.iter().fold(&scored[0], |best, candidate| {
        if candidate.score.total_cmp(&best.score) == Ordering::Greater {
            candidate
        } else {
            best
        }
    });
    let cutoff = top.score - config.tie_epsilon;

    // Seeded with the top scorer, which always sits inside the tie band.
    let winner = scored
        .iter()
        .filter(|candidate| candidate.score >= cutoff)
        .fold(top, |best, candidate| {
            if tie_break(candidate, best) == Ordering::Less {
                candidate
            } else {
                best
            }
        })
        .clone();

    let rejected_bids = active
        .iter()
        .filter(|bid| bid.id != winner.bid.id)
        .map(|bid| (*bid).clone())
        .collect();

    AllocationOutcome::Winner(AllocationDecision {
        winner,
        rejected_bids,
        candidates_scored: scored.len(),
    })
}

fn tie_break(a: &ScoredBid, b: &ScoredBid) -> Ordering {
    a.wins_in_window
        .cmp(&b.wins_in_window)
        .then_with(|| first_come(&a.bid, &b.bid))
}

fn first_come(a: &Bid, b: &Bid) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
