// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reconciliation report and alert summary.
//!
//! The summary is the hand-off to the notification collaborator: counts by
//! outcome, priority and severity, the zones needing attention and the
//! water that will not be delivered, so subject and body can be rendered
//! without re-deriving any classification logic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::anomaly::{Severity, UsageAnomaly, UsageFlag};
use crate::change::StatusChange;
use crate::matcher::{AlertPriority, MatchResult, MatchType};

/// Severity-tagged, deduplicated roll-up of one reconciliation invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    /// Match outcome counts
    pub perfect_matches: usize,
    pub time_variances: usize,
    pub missing_runs: usize,
    pub unexpected_runs: usize,
    pub rain_cancelled: usize,
    pub future_scheduled: usize,

    /// Match outcomes by alert priority
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,

    /// Detected status changes, and how many of them prevent irrigation
    pub status_changes: usize,
    pub irrigation_prevented: usize,

    /// Anomalies by severity
    pub anomalies_high: usize,
    pub anomalies_medium: usize,
    pub anomalies_low: usize,

    /// Usage flag counts over matched pairs
    pub flags_too_high: usize,
    pub flags_too_low: usize,
    pub flags_zero_reported: usize,

    /// Zones behind any HIGH/MEDIUM outcome, change or anomaly; sorted and
    /// deduplicated
    pub affected_zones: Vec<String>,

    /// Water that will not be delivered: prevented status changes plus
    /// missing scheduled runs, in gallons
    pub expected_gallons_lost: f64,
}

impl AlertSummary {
    /// Build the summary from one invocation's outputs.
    ///
    /// `missing_gallons` is the expected volume of the missing scheduled
    /// runs, accumulated by the engine while matching.
    pub fn build(
        matches: &[MatchResult],
        changes: &[StatusChange],
        anomalies: &[UsageAnomaly],
        flags: &[UsageFlag],
        missing_gallons: f64,
    ) -> Self {
        let mut summary = AlertSummary::default();
        let mut affected: Vec<String> = Vec::new();

        for result in matches {
            match result.match_type {
                MatchType::PerfectMatch => summary.perfect_matches += 1,
                MatchType::TimeVariance => summary.time_variances += 1,
                MatchType::MissingRun => summary.missing_runs += 1,
                MatchType::UnexpectedRun => summary.unexpected_runs += 1,
                MatchType::RainCancelled => summary.rain_cancelled += 1,
                MatchType::FutureScheduled => summary.future_scheduled += 1,
            }
            match result.alert_priority {
                AlertPriority::High => summary.high_priority += 1,
                AlertPriority::Medium => summary.medium_priority += 1,
                AlertPriority::Low => summary.low_priority += 1,
                AlertPriority::None => {}
            }
            if result.alert_priority.requires_attention() {
                affected.push(result.zone_name.clone());
            }
        }

        summary.status_changes = changes.len();
        for change in changes {
            if change.irrigation_prevented {
                summary.irrigation_prevented += 1;
                affected.push(change.zone_name.clone());
            }
        }

        for anomaly in anomalies {
            match anomaly.severity {
                Severity::High => summary.anomalies_high += 1,
                Severity::Medium => summary.anomalies_medium += 1,
                Severity::Low => summary.anomalies_low += 1,
            }
            affected.push(anomaly.zone_name.clone());
        }

        for flag in flags {
            match flag {
                UsageFlag::TooHigh => summary.flags_too_high += 1,
                UsageFlag::TooLow => summary.flags_too_low += 1,
                UsageFlag::ZeroReported => summary.flags_zero_reported += 1,
                UsageFlag::Normal => {}
            }
        }

        affected.sort();
        affected.dedup();
        summary.affected_zones = affected;

        summary.expected_gallons_lost = missing_gallons
            + changes
                .iter()
                .map(|change| change.expected_gallons_lost)
                .sum::<f64>();

        summary
    }

    /// True when anything in the summary warrants a notification
    pub fn requires_attention(&self) -> bool {
        self.high_priority > 0
            || self.medium_priority > 0
            || self.irrigation_prevented > 0
            || self.anomalies_high > 0
    }
}

/// Complete output of one reconciliation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Date the invocation covered
    pub date: NaiveDate,
    /// Per-run match outcomes
    pub matches: Vec<MatchResult>,
    /// Status changes persisted this invocation
    pub changes: Vec<StatusChange>,
    /// Anomalies persisted this invocation
    pub anomalies: Vec<UsageAnomaly>,
    /// Notification-facing roll-up
    pub summary: AlertSummary,
}

impl ReconciliationReport {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
