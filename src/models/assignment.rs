use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub rating_score: f64,
    pub availability_score: f64,
    pub price_score: f64,
    pub fairness_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationTrigger {
    Sweep,
    Forced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub job_id: Uuid,
    pub driver_id: Uuid,
    pub bid_id: Uuid,
    pub bid_amount: f64,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub rejected_bids: usize,
    pub trigger: AllocationTrigger,
    pub assigned_at: DateTime<Utc>,
}

/// Fairness bookkeeping for one driver over the current rolling window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationRecord {
    pub driver_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub jobs_won_in_window: usize,
    pub last_won_at: Option<DateTime<Utc>>,
}
