use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::models::job::JobStatus;

/// Emitted after a change has been committed, for notification and payment collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    BidPlaced {
        job_id: Uuid,
        bid_id: Uuid,
        driver_id: Uuid,
        amount: f64,
    },
    BidWithdrawn {
        job_id: Uuid,
        bid_id: Uuid,
        driver_id: Uuid,
    },
    JobStatusChanged {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
        at: DateTime<Utc>,
    },
    JobAssigned {
        assignment: Assignment,
        rejected_driver_ids: Vec<Uuid>,
    },
    JobCancelled {
        job_id: Uuid,
        rejected_driver_ids: Vec<Uuid>,
        at: DateTime<Utc>,
    },
}
