// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Scheduled vs actual run matching
//!
//! Reconciles one date's scheduled runs against the reported runs and
//! assigns each outcome an alert priority. Matching is greedy: scheduled
//! runs are processed in order and each claims the best available actual
//! run, so the first scheduled run processed wins ties. This is not a
//! globally optimal assignment; it is preserved deliberately for behavioral
//! compatibility.

use std::collections::HashSet;
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MatcherConfig;
use crate::record::{normalize_zone_name, ActualRun, ScheduledRun, ZoneId, ZoneKind};
use crate::status::{classify, StatusVariant};

/// Outcome kind for one scheduled or actual run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Scheduled run with a close, confident actual counterpart
    PerfectMatch,
    /// Same zone matched with a tolerable time or quality difference
    TimeVariance,
    /// Scheduled, due, and no actual run found within tolerance
    MissingRun,
    /// Actual run with no scheduled counterpart
    UnexpectedRun,
    /// Legitimately cancelled due to rainfall
    RainCancelled,
    /// Scheduled start has not reached its due buffer yet
    FutureScheduled,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::PerfectMatch => "perfect_match",
            MatchType::TimeVariance => "time_variance",
            MatchType::MissingRun => "missing_run",
            MatchType::UnexpectedRun => "unexpected_run",
            MatchType::RainCancelled => "rain_cancelled",
            MatchType::FutureScheduled => "future_scheduled",
        }
    }
}

/// Operator-facing severity of a match outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AlertPriority {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::High => "HIGH",
            AlertPriority::Medium => "MEDIUM",
            AlertPriority::Low => "LOW",
            AlertPriority::None => "NONE",
        }
    }

    /// True for the priorities the notification collaborator surfaces
    /// prominently
    pub fn requires_attention(&self) -> bool {
        matches!(self, AlertPriority::High | AlertPriority::Medium)
    }
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one scheduled run (or one leftover actual run).
///
/// Recomputed from scratch on every invocation; never persisted as mutable
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Index into the scheduled slice, when a scheduled run is involved
    pub scheduled_index: Option<usize>,
    /// Index into the actual slice, when an actual run is involved
    pub actual_index: Option<usize>,
    /// Zone the outcome belongs to
    pub zone_id: ZoneId,
    /// Zone display name
    pub zone_name: String,
    /// Scheduled start time, if any
    pub scheduled_time: Option<NaiveDateTime>,
    /// Observed start time, if any
    pub actual_time: Option<NaiveDateTime>,
    /// Outcome kind
    pub match_type: MatchType,
    /// Start-time difference in whole minutes, for paired outcomes
    pub time_difference_minutes: Option<i64>,
    /// Confidence that the pairing is correct, in [0, 1]
    pub confidence: f64,
    /// Short human-readable note the notification collaborator quotes
    pub notes: String,
    /// Operator-facing severity
    pub alert_priority: AlertPriority,
}

/// Reconciles scheduled runs against reported runs for one date
#[derive(Debug, Clone)]
pub struct RunMatcher {
    config: MatcherConfig,
}

impl RunMatcher {
    /// Create a matcher with the given configuration
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Match one date's scheduled runs against its actual runs.
    ///
    /// `now` is the evaluation wall time; runs whose start plus the due
    /// buffer lies beyond it are reported as future, not missing. Malformed
    /// records are skipped with a diagnostic.
    pub fn match_runs(
        &self,
        scheduled: &[ScheduledRun],
        actual: &[ActualRun],
        now: NaiveDateTime,
    ) -> Vec<MatchResult> {
        let mut results = Vec::with_capacity(scheduled.len());
        let mut used: HashSet<usize> = HashSet::new();

        for (index, run) in scheduled.iter().enumerate() {
            if !run.is_well_formed() {
                warn!(
                    "skipping malformed scheduled run for zone {} ({})",
                    run.zone_id, run.zone_name
                );
                continue;
            }

            // Legitimate rain cancellations need no matching and no alert
            if run.is_rain_cancelled || classify(&run.raw_status) == StatusVariant::RainfallAbort {
                results.push(MatchResult {
                    scheduled_index: Some(index),
                    actual_index: None,
                    zone_id: run.zone_id,
                    zone_name: run.zone_name.clone(),
                    scheduled_time: Some(run.start_time),
                    actual_time: None,
                    match_type: MatchType::RainCancelled,
                    time_difference_minutes: None,
                    confidence: 1.0,
                    notes: "legitimately cancelled due to rainfall".to_string(),
                    alert_priority: AlertPriority::None,
                });
                continue;
            }

            // Not yet due: the controller gets a grace window to report
            if run.start_time + Duration::minutes(self.config.due_buffer_minutes) > now {
                results.push(MatchResult {
                    scheduled_index: Some(index),
                    actual_index: None,
                    zone_id: run.zone_id,
                    zone_name: run.zone_name.clone(),
                    scheduled_time: Some(run.start_time),
                    actual_time: None,
                    match_type: MatchType::FutureScheduled,
                    time_difference_minutes: None,
                    confidence: 1.0,
                    notes: "scheduled for the future, not yet due".to_string(),
                    alert_priority: AlertPriority::None,
                });
                continue;
            }

            match self.find_best_match(run, actual, &used) {
                Some((actual_index, confidence, diff_minutes)) => {
                    used.insert(actual_index);
                    let diff = diff_minutes as i64;
                    let (match_type, notes) = if confidence >= 0.9 && diff <= 5 {
                        (
                            MatchType::PerfectMatch,
                            format!("excellent match (confidence {:.2})", confidence),
                        )
                    } else if confidence >= 0.7 {
                        (
                            MatchType::TimeVariance,
                            format!(
                                "good match with {}min offset (confidence {:.2})",
                                diff, confidence
                            ),
                        )
                    } else {
                        (
                            MatchType::TimeVariance,
                            format!(
                                "marginal match with {}min offset (confidence {:.2})",
                                diff, confidence
                            ),
                        )
                    };
                    results.push(MatchResult {
                        scheduled_index: Some(index),
                        actual_index: Some(actual_index),
                        zone_id: run.zone_id,
                        zone_name: run.zone_name.clone(),
                        scheduled_time: Some(run.start_time),
                        actual_time: Some(actual[actual_index].start_time),
                        match_type,
                        time_difference_minutes: Some(diff),
                        confidence,
                        notes,
                        alert_priority: self.priority_for(match_type, confidence, &run.zone_name),
                    });
                }
                None => {
                    results.push(MatchResult {
                        scheduled_index: Some(index),
                        actual_index: None,
                        zone_id: run.zone_id,
                        zone_name: run.zone_name.clone(),
                        scheduled_time: Some(run.start_time),
                        actual_time: None,
                        match_type: MatchType::MissingRun,
                        time_difference_minutes: None,
                        confidence: 0.0,
                        notes: "no matching actual run found within time tolerance".to_string(),
                        alert_priority: self.priority_for(
                            MatchType::MissingRun,
                            0.0,
                            &run.zone_name,
                        ),
                    });
                }
            }
        }

        // Every actual run nobody claimed is unexpected and warrants
        // investigation
        for (index, run) in actual.iter().enumerate() {
            if used.contains(&index) {
                continue;
            }
            if !run.is_well_formed() {
                warn!(
                    "skipping malformed actual run for zone {} ({})",
                    run.zone_id, run.zone_name
                );
                continue;
            }
            results.push(MatchResult {
                scheduled_index: None,
                actual_index: Some(index),
                zone_id: run.zone_id,
                zone_name: run.zone_name.clone(),
                scheduled_time: None,
                actual_time: Some(run.start_time),
                match_type: MatchType::UnexpectedRun,
                time_difference_minutes: None,
                confidence: 0.0,
                notes: "actual run with no corresponding scheduled run".to_string(),
                alert_priority: AlertPriority::Medium,
            });
        }

        results
    }

    /// Find the best unused actual run for a scheduled run.
    ///
    /// Returns the winning index, its confidence and the time difference in
    /// minutes. Candidates must be in the same normalized zone and within
    /// the time tolerance; ties on confidence break to the smaller offset.
    fn find_best_match(
        &self,
        scheduled: &ScheduledRun,
        actual: &[ActualRun],
        used: &HashSet<usize>,
    ) -> Option<(usize, f64, f64)> {
        let tolerance = self.config.time_tolerance_minutes as f64;
        let zone_norm = normalize_zone_name(&scheduled.zone_name);
        let mut best: Option<(usize, f64, f64)> = None;

        for (index, run) in actual.iter().enumerate() {
            if used.contains(&index) || !run.is_well_formed() {
                continue;
            }
            if normalize_zone_name(&run.zone_name) != zone_norm {
                continue;
            }

            let diff = (run.start_time - scheduled.start_time).num_seconds().abs() as f64 / 60.0;
            if diff > tolerance {
                continue;
            }

            let confidence = self.confidence_score(scheduled, run, diff);
            let better = match best {
                None => true,
                Some((_, best_confidence, best_diff)) => {
                    confidence > best_confidence
                        || (confidence == best_confidence && diff < best_diff)
                }
            };
            if better {
                best = Some((index, confidence, diff));
            }
        }

        best
    }

    /// Confidence that a scheduled/actual pair correspond.
    ///
    /// Product of three factors: time proximity (1.0 at zero offset decaying
    /// linearly to 0.5 at the tolerance boundary), duration similarity
    /// (0.8 to 1.0) and reported water efficiency (1.0 normal band, 0.9
    /// moderate, 0.8 degraded; unavailable efficiency does not penalize).
    pub fn confidence_score(
        &self,
        scheduled: &ScheduledRun,
        actual: &ActualRun,
        time_diff_minutes: f64,
    ) -> f64 {
        let tolerance = self.config.time_tolerance_minutes as f64;
        let mut confidence = 1.0;

        let time_factor = (1.0 - (time_diff_minutes / tolerance) * 0.5).max(0.5);
        confidence *= time_factor;

        if scheduled.duration_minutes > 0 {
            let longest = scheduled.duration_minutes.max(actual.duration_minutes) as f64;
            let shortest = scheduled.duration_minutes.min(actual.duration_minutes) as f64;
            let duration_factor = 0.8 + (shortest / longest) * 0.2;
            confidence *= duration_factor;
        }

        if let Some(efficiency) = actual.efficiency_percent {
            let efficiency_factor = if (70.0..=120.0).contains(&efficiency) {
                1.0
            } else if (50.0..70.0).contains(&efficiency) || (120.0..=150.0).contains(&efficiency) {
                0.9
            } else {
                0.8
            };
            confidence *= efficiency_factor;
        }

        confidence.min(1.0)
    }

    /// Alert priority for a match outcome. Priorities for problem outcomes
    /// follow the zone kind: container plantings dry out fastest.
    fn priority_for(
        &self,
        match_type: MatchType,
        confidence: f64,
        zone_name: &str,
    ) -> AlertPriority {
        match match_type {
            MatchType::RainCancelled | MatchType::PerfectMatch | MatchType::FutureScheduled => {
                AlertPriority::None
            }
            MatchType::TimeVariance if confidence >= 0.8 => AlertPriority::Low,
            MatchType::UnexpectedRun => AlertPriority::Medium,
            _ => match ZoneKind::from_name(zone_name) {
                ZoneKind::Container => AlertPriority::High,
                ZoneKind::PoolArea => AlertPriority::Medium,
                ZoneKind::Turf => AlertPriority::Low,
                ZoneKind::Other => AlertPriority::Medium,
            },
        }
    }
}

impl Default for RunMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}
