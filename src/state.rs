use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::error;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::fairness::FairnessTracker;
use crate::engine::locks::JobLocks;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::bid::Bid;
use crate::models::driver::Driver;
use crate::models::event::EngineEvent;
use crate::models::job::RouteJob;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub drivers: DashMap<Uuid, Driver>,
    pub jobs: DashMap<Uuid, RouteJob>,
    pub bids: DashMap<Uuid, Bid>,
    pub assignments: DashMap<Uuid, Assignment>,
    pub job_locks: JobLocks,
    /// Shared across every job so a driver crossing the cap is seen by the next allocation.
    pub fairness: Mutex<FairnessTracker>,
    pub events_tx: broadcast::Sender<EngineEvent>,
    pub engine: EngineConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(engine: EngineConfig, event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            drivers: DashMap::new(),
            jobs: DashMap::new(),
            bids: DashMap::new(),
            assignments: DashMap::new(),
            job_locks: JobLocks::new(engine.lock_timeout),
            fairness: Mutex::new(FairnessTracker::new(engine.fairness_window)),
            events_tx,
            engine,
            metrics: Metrics::new(),
        }
    }

    pub fn job(&self, job_id: &Uuid) -> Result<RouteJob, AppError> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))
    }

    pub fn driver(&self, driver_id: &Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(driver_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
    }

    pub fn bid(&self, bid_id: &Uuid) -> Result<Bid, AppError> {
        self.bids
            .get(bid_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("bid {bid_id} not found")))
    }

    /// Bids of one job ordered by submission time.
    pub fn bids_for_job(&self, job_id: &Uuid) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .iter()
            .filter(|entry| entry.value().job_id == *job_id)
            .map(|entry| entry.value().clone())
            .collect();
        bids.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        bids
    }

    pub fn drivers_by_id<'a, I>(&self, driver_ids: I) -> HashMap<Uuid, Driver>
    where
        I: IntoIterator<Item = &'a Uuid>,
    {
        driver_ids
            .into_iter()
            .filter_map(|id| self.drivers.get(id).map(|entry| (*id, entry.value().clone())))
            .collect()
    }

    /// Best-effort hand-off to notification collaborators; never gates a commit.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Records a broken invariant and returns the error that aborts the operation.
    pub fn invariant_violation(&self, job_id: Uuid, detail: String) -> AppError {
        self.metrics.invariant_violations_total.inc();
        error!(job_id = %job_id, detail = %detail, "internal consistency violation; operator attention required");
        AppError::InvariantViolation(detail)
    }
}
