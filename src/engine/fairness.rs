use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::assignment::AllocationRecord;

/// Rolling per-driver win history used for tie-breaking and the monopolization cap.
///
/// The window is a fixed trailing duration, so counts decay by dropping wins
/// older than `now - window`. Wins stamped after `now` still count: a forced
/// allocation may commit with a later clock than a sweep already in progress.
/// Callers that allocate must hold the tracker for the whole decide-and-commit
/// step so concurrent allocations never both read a stale count.
#[derive(Debug)]
pub struct FairnessTracker {
    window: Duration,
    wins: HashMap<Uuid, VecDeque<DateTime<Utc>>>,
}

/// Point-in-time fairness view handed to the allocator.
#[derive(Debug, Clone, Default)]
pub struct FairnessSnapshot {
    records: HashMap<Uuid, AllocationRecord>,
}

impl FairnessSnapshot {
    pub fn wins(&self, driver_id: &Uuid) -> usize {
        self.records
            .get(driver_id)
            .map(|record| record.jobs_won_in_window)
            .unwrap_or(0)
    }

    pub fn record(&self, driver_id: &Uuid) -> Option<&AllocationRecord> {
        self.records.get(driver_id)
    }
}

impl FairnessTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            wins: HashMap::new(),
        }
    }

    pub fn record_win(&mut self, driver_id: Uuid, at: DateTime<Utc>) {
        let history = self.wins.entry(driver_id).or_default();
        // Wins normally arrive in order; keep the deque sorted if one does not.
        let position = history.partition_point(|won_at| *won_at <= at);
        history.insert(position, at);
    }

    pub fn count_wins_in_window(&self, driver_id: &Uuid, now: DateTime<Utc>) -> usize {
        let window_start = self.window_start(now);
        self.wins
            .get(driver_id)
            .map(|history| history.iter().filter(|won_at| **won_at > window_start).count())
            .unwrap_or(0)
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn last_won_at(&self, driver_id: &Uuid) -> Option<DateTime<Utc>> {
        self.wins
            .get(driver_id)
            .and_then(|history| history.back().copied())
    }

    pub fn snapshot<'a, I>(&self, driver_ids: I, now: DateTime<Utc>) -> FairnessSnapshot
    where
        I: IntoIterator<Item = &'a Uuid>,
    {
        let window_start = self.window_start(now);
        let records = driver_ids
            .into_iter()
            .map(|driver_id| {
                let record = AllocationRecord {
                    driver_id: *driver_id,
                    window_start,
                    jobs_won_in_window: self.count_wins_in_window(driver_id, now),
                    last_won_at: self.last_won_at(driver_id),
                };
                (*driver_id, record)
            })
            .collect();

        FairnessSnapshot { records }
    }

    /// Drops wins that can no longer fall inside any window ending at or after `now`.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window_start = self.window_start(now);
        self.wins.retain(|_, history| {
            while history.front().is_some_and(|won_at| *won_at <= window_start) {
                history.pop_front();
            }
            !history.is_empty()
        });
    }

    pub fn tracked_drivers(&self) -> usize {
        self.wins.len()
    }
}
