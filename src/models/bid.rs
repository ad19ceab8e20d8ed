use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Withdrawn,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub job_id: Uuid,
    pub driver_id: Uuid,
    pub bid_amount: f64,
    pub message: Option<String>,
    /// Rating captured when the bid was placed; never refreshed afterwards.
    pub driver_rating_at_bid: f64,
    pub created_at: DateTime<Utc>,
    pub status: BidStatus,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn is_active(&self) -> bool {
        self.status == BidStatus::Active
    }
}
