// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Event store abstraction
//!
//! The engine reads run snapshots from, and writes derived records back to,
//! a persisted event store owned by a collaborator. The store keeps an
//! append-only capture log per zone so that history survives reprocessing;
//! [`MemoryStore`] is the in-process implementation used for tests and
//! small deployments.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::anomaly::{AnomalyType, UsageAnomaly};
use crate::baseline::UsageBaseline;
use crate::change::StatusChange;
use crate::error::StoreError;
use crate::record::{ActualRun, ScheduledRun, ZoneId};

/// Persistence contract consumed by the reconciliation engine.
///
/// Inserts of derived records are idempotent in cooperation with the
/// caller: the engine checks the matching `*_exists` method first, and a
/// conforming store also refuses duplicates on insert (returning `false`)
/// so that re-running detection on the same snapshot can never grow the
/// logs.
pub trait EventStore {
    /// Scheduled runs for one date: the latest capture per zone and start
    /// time, ordered by start time.
    fn scheduled_runs(&self, date: NaiveDate) -> Result<Vec<ScheduledRun>, StoreError>;

    /// Actual runs observed on one date, ordered by start time.
    fn actual_runs(&self, date: NaiveDate) -> Result<Vec<ActualRun>, StoreError>;

    /// One zone's actual runs inside an inclusive date window.
    fn actual_runs_in_window(
        &self,
        zone_id: ZoneId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActualRun>, StoreError>;

    /// Zones with at least one actual run inside an inclusive date window.
    fn zones_with_actual_runs(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(ZoneId, String)>, StoreError>;

    /// The most recently captured scheduled run for a zone, excluding the
    /// record currently under evaluation.
    fn most_recent_scheduled(
        &self,
        zone_id: ZoneId,
        excluding: &ScheduledRun,
    ) -> Result<Option<ScheduledRun>, StoreError>;

    /// Whether a change with the same (zone, detection day, current text,
    /// previous text) is already stored.
    fn status_change_exists(
        &self,
        zone_id: ZoneId,
        detected_on: NaiveDate,
        current_text: &str,
        previous_text: &str,
    ) -> Result<bool, StoreError>;

    /// Append a status change. Returns `false` when an identical change is
    /// already stored for the same day.
    fn insert_status_change(&mut self, change: &StatusChange) -> Result<bool, StoreError>;

    /// Whether an anomaly of this kind is already stored for the zone and
    /// run date.
    fn anomaly_exists(
        &self,
        zone_id: ZoneId,
        run_date: NaiveDate,
        anomaly_type: AnomalyType,
    ) -> Result<bool, StoreError>;

    /// Append an anomaly. Returns `false` when one of the same kind is
    /// already stored for the zone and run date.
    fn insert_anomaly(&mut self, anomaly: &UsageAnomaly) -> Result<bool, StoreError>;

    /// Replace a zone's baseline. Baselines are superseded wholesale, never
    /// merged.
    fn upsert_baseline(&mut self, baseline: &UsageBaseline) -> Result<(), StoreError>;

    /// A zone's current baseline, if one has been computed.
    fn baseline(&self, zone_id: ZoneId) -> Result<Option<UsageBaseline>, StoreError>;
}

/// In-memory event store over per-zone append-only capture logs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Capture log per zone, in insertion order
    scheduled: HashMap<ZoneId, Vec<ScheduledRun>>,
    actual: Vec<ActualRun>,
    changes: Vec<StatusChange>,
    anomalies: Vec<UsageAnomaly>,
    baselines: HashMap<ZoneId, UsageBaseline>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scheduled-run capture to the zone's log
    pub fn push_scheduled(&mut self, run: ScheduledRun) {
        self.scheduled.entry(run.zone_id).or_default().push(run);
    }

    /// Append an observed run
    pub fn push_actual(&mut self, run: ActualRun) {
        self.actual.push(run);
    }

    /// Number of stored status changes
    pub fn status_change_count(&self) -> usize {
        self.changes.len()
    }

    /// Number of stored anomalies
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    /// All stored status changes, in insertion order
    pub fn status_changes(&self) -> &[StatusChange] {
        &self.changes
    }

    /// All stored anomalies, in insertion order
    pub fn anomalies(&self) -> &[UsageAnomaly] {
        &self.anomalies
    }
}

impl EventStore for MemoryStore {
    fn scheduled_runs(&self, date: NaiveDate) -> Result<Vec<ScheduledRun>, StoreError> {
        // Latest capture wins per (zone, start time)
        let mut latest: HashMap<(ZoneId, chrono::NaiveDateTime), ScheduledRun> = HashMap::new();
        for log in self.scheduled.values() {
            for run in log.iter().filter(|run| run.date == date) {
                let key = (run.zone_id, run.start_time);
                let newer = latest
                    .get(&key)
                    .map_or(true, |existing| run.captured_at > existing.captured_at);
                if newer {
                    latest.insert(key, run.clone());
                }
            }
        }
        let mut runs: Vec<ScheduledRun> = latest.into_values().collect();
        runs.sort_by_key(|run| (run.start_time, run.zone_id));
        Ok(runs)
    }

    fn actual_runs(&self, date: NaiveDate) -> Result<Vec<ActualRun>, StoreError> {
        let mut runs: Vec<ActualRun> = self
            .actual
            .iter()
            .filter(|run| run.date == date)
            .cloned()
            .collect();
        runs.sort_by_key(|run| (run.start_time, run.zone_id));
        Ok(runs)
    }

    fn actual_runs_in_window(
        &self,
        zone_id: ZoneId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActualRun>, StoreError> {
        let mut runs: Vec<ActualRun> = self
            .actual
            .iter()
            .filter(|run| run.zone_id == zone_id && run.date >= start && run.date <= end)
            .cloned()
            .collect();
        runs.sort_by_key(|run| run.start_time);
        Ok(runs)
    }

    fn zones_with_actual_runs(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(ZoneId, String)>, StoreError> {
        let mut zones: HashMap<ZoneId, String> = HashMap::new();
        for run in &self.actual {
            if run.date >= start && run.date <= end {
                zones.entry(run.zone_id).or_insert_with(|| run.zone_name.clone());
            }
        }
        let mut zones: Vec<(ZoneId, String)> = zones.into_iter().collect();
        zones.sort_by_key(|(zone_id, _)| *zone_id);
        Ok(zones)
    }

    fn most_recent_scheduled(
        &self,
        zone_id: ZoneId,
        excluding: &ScheduledRun,
    ) -> Result<Option<ScheduledRun>, StoreError> {
        let Some(log) = self.scheduled.get(&zone_id) else {
            return Ok(None);
        };
        let most_recent = log
            .iter()
            .filter(|run| *run != excluding)
            .max_by_key(|run| (run.captured_at, run.start_time))
            .cloned();
        Ok(most_recent)
    }

    fn status_change_exists(
        &self,
        zone_id: ZoneId,
        detected_on: NaiveDate,
        current_text: &str,
        previous_text: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.changes.iter().any(|change| {
            change.zone_id == zone_id
                && change.detected_at.date() == detected_on
                && change.current_text == current_text
                && change.previous_text == previous_text
        }))
    }

    fn insert_status_change(&mut self, change: &StatusChange) -> Result<bool, StoreError> {
        if self.status_change_exists(
            change.zone_id,
            change.detected_at.date(),
            &change.current_text,
            &change.previous_text,
        )? {
            return Ok(false);
        }
        self.changes.push(change.clone());
        Ok(true)
    }

    fn anomaly_exists(
        &self,
        zone_id: ZoneId,
        run_date: NaiveDate,
        anomaly_type: AnomalyType,
    ) -> Result<bool, StoreError> {
        Ok(self.anomalies.iter().any(|anomaly| {
            anomaly.zone_id == zone_id
                && anomaly.run_date == run_date
                && anomaly.anomaly_type == anomaly_type
        }))
    }

    fn insert_anomaly(&mut self, anomaly: &UsageAnomaly) -> Result<bool, StoreError> {
        if self.anomaly_exists(anomaly.zone_id, anomaly.run_date, anomaly.anomaly_type)? {
            return Ok(false);
        }
        self.anomalies.push(anomaly.clone());
        Ok(true)
    }

    fn upsert_baseline(&mut self, baseline: &UsageBaseline) -> Result<(), StoreError> {
        self.baselines.insert(baseline.zone_id, baseline.clone());
        Ok(())
    }

    fn baseline(&self, zone_id: ZoneId) -> Result<Option<UsageBaseline>, StoreError> {
        Ok(self.baselines.get(&zone_id).cloned())
    }
}
