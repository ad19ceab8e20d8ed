use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Bidding,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn accepts_bids(self) -> bool {
        matches!(self, JobStatus::Open | JobStatus::Bidding)
    }

    /// States in which the job must carry an assigned driver and one accepted bid.
    pub fn has_assignee(self) -> bool {
        matches!(
            self,
            JobStatus::Assigned | JobStatus::InProgress | JobStatus::Completed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Open => write!(f, "open"),
            JobStatus::Bidding => write!(f, "bidding"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteJob {
    pub id: Uuid,
    pub area: String,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub estimated_stops: u32,
    pub estimated_hours: f64,
    pub base_pay: f64,
    pub status: JobStatus,
    pub assigned_driver_id: Option<Uuid>,
    pub bidding_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RouteJob {
    pub fn weekday(&self) -> Weekday {
        self.scheduled_date.weekday()
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.bidding_deadline
    }
}
