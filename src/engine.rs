// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! ReconciliationEngine - orchestration of matching, change detection and
//! anomaly checks against the event store.
//!
//! The engine is invocation-scoped and deterministic: each call operates on
//! an immutable snapshot of one date's records and recomputes its results
//! from scratch. The only cross-call state lives in the store, and the
//! correctness contract there is idempotency, not locking: re-running any
//! operation on the same snapshot never duplicates stored changes or
//! anomalies and never alters already-matched results.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::anomaly::{AnomalyDetector, UsageAnomaly, UsageFlag};
use crate::baseline::UsageBaseline;
use crate::change::{ChangeDetector, StatusChange};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::matcher::{MatchType, RunMatcher};
use crate::record::{ActualRun, ScheduledRun, ZoneId};
use crate::store::EventStore;
use crate::summary::{AlertSummary, ReconciliationReport};

/// Coordinates the matcher, change detector and anomaly detector against a
/// persisted event store.
pub struct ReconciliationEngine<S> {
    store: S,
    matcher: RunMatcher,
    change_detector: ChangeDetector,
    anomaly_detector: AnomalyDetector,
    config: EngineConfig,
}

impl<S: EventStore> ReconciliationEngine<S> {
    /// Create an engine over a store. Rejects unusable configurations.
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: RunMatcher::new(config.matcher.clone()),
            change_detector: ChangeDetector::new(),
            anomaly_detector: AnomalyDetector::new(config.anomaly.clone()),
            store,
            config,
        })
    }

    /// Reconcile one date: match scheduled against actual runs, detect and
    /// persist status changes, run anomaly checks, and produce the
    /// notification-facing report.
    ///
    /// `now` is the evaluation wall time used for due-run decisions and
    /// detection timestamps. Store failures abort the invocation; the
    /// caller retries the whole date since matches are recomputed from
    /// scratch each time.
    pub fn reconcile(&mut self, date: NaiveDate, now: NaiveDateTime) -> Result<ReconciliationReport> {
        let scheduled = self.store.scheduled_runs(date)?;
        let actual = self.store.actual_runs(date)?;
        info!(
            "reconciling {}: {} scheduled, {} actual runs",
            date,
            scheduled.len(),
            actual.len()
        );

        let matches = self.matcher.match_runs(&scheduled, &actual, now);

        // Expected volume of runs that are due but unreported
        let missing_gallons: f64 = matches
            .iter()
            .filter(|result| result.match_type == MatchType::MissingRun)
            .filter_map(|result| result.scheduled_index)
            .filter_map(|index| scheduled[index].expected_gallons)
            .sum();

        // Usage flags over matched pairs
        let flags: Vec<UsageFlag> = matches
            .iter()
            .filter_map(|result| Some((result.scheduled_index?, result.actual_index?)))
            .map(|(scheduled_index, actual_index)| {
                self.anomaly_detector.flag_usage(
                    actual[actual_index].gallons,
                    scheduled[scheduled_index].expected_gallons,
                )
            })
            .collect();

        let changes = self.detect_changes(&scheduled, now)?;
        let anomalies = self.scan_anomalies(&actual, now)?;

        let summary = AlertSummary::build(&matches, &changes, &anomalies, &flags, missing_gallons);

        Ok(ReconciliationReport {
            date,
            matches,
            changes,
            anomalies,
            summary,
        })
    }

    /// Detect and persist status changes for a snapshot of scheduled runs.
    ///
    /// Repeated (zone, start time) rows within one snapshot are processed
    /// once. A change is only stored when no change with the same (zone,
    /// day, current text, previous text) already exists, so re-running on
    /// an unchanged snapshot is a no-op. Returns the changes stored this
    /// call.
    pub fn detect_changes(
        &mut self,
        current_runs: &[ScheduledRun],
        now: NaiveDateTime,
    ) -> Result<Vec<StatusChange>> {
        let mut stored = Vec::new();
        let mut processed: HashSet<(ZoneId, NaiveDateTime)> = HashSet::new();

        for run in current_runs {
            if !processed.insert((run.zone_id, run.start_time)) {
                debug!(
                    "zone {} ({}): duplicate snapshot row for the same start time",
                    run.zone_id, run.zone_name
                );
                continue;
            }

            let Some(previous) = self.store.most_recent_scheduled(run.zone_id, run)? else {
                info!(
                    "zone {} ({}): first recorded capture, nothing to compare",
                    run.zone_id, run.zone_name
                );
                continue;
            };

            let Some(change) = self.change_detector.detect(&previous, run, now) else {
                continue;
            };

            if self.store.status_change_exists(
                change.zone_id,
                change.detected_at.date(),
                &change.current_text,
                &change.previous_text,
            )? {
                debug!(
                    "zone {} ({}): change already recorded today, skipping",
                    change.zone_id, change.zone_name
                );
                continue;
            }

            if self.store.insert_status_change(&change)? {
                stored.push(change);
            }
        }

        Ok(stored)
    }

    /// Run anomaly checks over a set of actual runs and persist what is
    /// new. Returns the anomalies stored this call.
    pub fn scan_anomalies(
        &mut self,
        runs: &[ActualRun],
        now: NaiveDateTime,
    ) -> Result<Vec<UsageAnomaly>> {
        let mut stored = Vec::new();

        for run in runs {
            if !run.is_well_formed() {
                warn!(
                    "skipping malformed actual run for zone {} ({})",
                    run.zone_id, run.zone_name
                );
                continue;
            }
            let baseline = self.store.baseline(run.zone_id)?;
            for anomaly in self.anomaly_detector.check_run(run, baseline.as_ref(), now) {
                if self
                    .store
                    .anomaly_exists(anomaly.zone_id, anomaly.run_date, anomaly.anomaly_type)?
                {
                    debug!(
                        "zone {} ({}): {} already recorded for {}, skipping",
                        anomaly.zone_id,
                        anomaly.zone_name,
                        anomaly.anomaly_type.as_str(),
                        anomaly.run_date
                    );
                    continue;
                }
                if self.store.insert_anomaly(&anomaly)? {
                    stored.push(anomaly);
                }
            }
        }

        Ok(stored)
    }

    /// Recompute and upsert baselines for every zone with runs inside the
    /// trailing window ending at `as_of`. Zones below the minimum sample
    /// count keep no baseline entry from this pass (their previous baseline,
    /// if any, is left in place). Returns the number of zones updated.
    pub fn refresh_baselines(&mut self, as_of: NaiveDate, now: NaiveDateTime) -> Result<usize> {
        let window_start = as_of - Duration::days(self.config.baseline.window_days);
        let zones = self.store.zones_with_actual_runs(window_start, as_of)?;
        let mut updated = 0;

        for (zone_id, zone_name) in zones {
            let runs = self.store.actual_runs_in_window(zone_id, window_start, as_of)?;
            match UsageBaseline::compute(
                zone_id,
                &zone_name,
                &runs,
                window_start,
                as_of,
                &self.config.baseline,
                now,
            ) {
                Some(baseline) => {
                    self.store.upsert_baseline(&baseline)?;
                    updated += 1;
                }
                None => {
                    debug!(
                        "zone {} ({}): not enough usable runs for a baseline",
                        zone_id, zone_name
                    );
                }
            }
        }

        Ok(updated)
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
