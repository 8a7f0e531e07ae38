// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Usage anomaly detection
//!
//! Flags abnormal water consumption by comparing each run against its
//! zone's baseline. Checks run in order: zero usage first (and alone, since
//! the remaining checks are meaningless without water), then usage z-score,
//! runtime z-score and efficiency drift. Zero usage needs no baseline;
//! everything else is skipped when the baseline is undefined.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::baseline::UsageBaseline;
use crate::config::AnomalyConfig;
use crate::record::{ActualRun, ZoneId};

/// Kind of usage anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    /// Usage significantly above baseline
    HighUsage,
    /// Usage significantly below baseline
    LowUsage,
    /// Zone ran but no water was reported
    ZeroUsage,
    /// Runtime longer than baseline
    RuntimeIncrease,
    /// Runtime shorter than baseline
    RuntimeDecrease,
    /// Gallons per minute dropped
    EfficiencyDrop,
    /// Gallons per minute spiked
    EfficiencySpike,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::HighUsage => "high_usage",
            AnomalyType::LowUsage => "low_usage",
            AnomalyType::ZeroUsage => "zero_usage",
            AnomalyType::RuntimeIncrease => "runtime_increase",
            AnomalyType::RuntimeDecrease => "runtime_decrease",
            AnomalyType::EfficiencyDrop => "efficiency_drop",
            AnomalyType::EfficiencySpike => "efficiency_spike",
        }
    }
}

/// Severity of a detected anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// Classification of reported usage against flow-rate-expected usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageFlag {
    /// Reported usage within the expected band
    Normal,
    /// Reported usage above the too-high multiplier
    TooHigh,
    /// Reported usage below the too-low multiplier
    TooLow,
    /// Nothing reported where usage was expected
    ZeroReported,
}

impl UsageFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageFlag::Normal => "normal",
            UsageFlag::TooHigh => "too_high",
            UsageFlag::TooLow => "too_low",
            UsageFlag::ZeroReported => "zero_reported",
        }
    }
}

/// A detected usage anomaly for one zone and run date.
///
/// Append-only; no duplicate (zone, run_date, anomaly_type) may be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAnomaly {
    /// Zone the anomaly was detected on
    pub zone_id: ZoneId,
    /// Zone display name
    pub zone_name: String,
    /// Date of the offending run
    pub run_date: NaiveDate,
    /// Kind of anomaly
    pub anomaly_type: AnomalyType,
    /// Severity
    pub severity: Severity,
    /// Observed value (gallons, minutes or GPM depending on the kind)
    pub actual_value: f64,
    /// Baseline expectation for the same quantity
    pub expected_value: f64,
    /// Absolute deviation from the expectation, in percent
    pub deviation_percent: f64,
    /// Human-readable description
    pub description: String,
    /// When the anomaly was detected
    pub detected_at: NaiveDateTime,
}

/// Checks runs against baselines and classifies usage
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    /// Create a detector with the given thresholds
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Check one run against its zone's baseline.
    ///
    /// Zero usage short-circuits the remaining checks and fires regardless
    /// of baseline state. Runs without a reported volume cannot be checked
    /// and produce nothing.
    pub fn check_run(
        &self,
        run: &ActualRun,
        baseline: Option<&UsageBaseline>,
        detected_at: NaiveDateTime,
    ) -> Vec<UsageAnomaly> {
        let mut anomalies = Vec::new();
        let Some(gallons) = run.gallons else {
            return anomalies;
        };
        let minutes = run.duration_minutes as f64;

        if gallons == 0.0 && run.duration_minutes > 0 {
            let expected = baseline.map_or(0.0, |b| b.avg_gallons);
            anomalies.push(UsageAnomaly {
                zone_id: run.zone_id,
                zone_name: run.zone_name.clone(),
                run_date: run.date,
                anomaly_type: AnomalyType::ZeroUsage,
                severity: Severity::High,
                actual_value: 0.0,
                expected_value: expected,
                deviation_percent: 100.0,
                description: format!(
                    "zone ran for {} minutes but reported 0 gallons",
                    run.duration_minutes
                ),
                detected_at,
            });
            return anomalies;
        }

        if gallons <= 0.0 || run.duration_minutes == 0 {
            return anomalies;
        }
        let Some(baseline) = baseline else {
            return anomalies;
        };

        let actual_gpm = gallons / minutes;

        if baseline.std_gallons > 0.0 {
            let z = (gallons - baseline.avg_gallons).abs() / baseline.std_gallons;
            if z > self.config.usage_z_threshold {
                let anomaly_type = if gallons > baseline.avg_gallons {
                    AnomalyType::HighUsage
                } else {
                    AnomalyType::LowUsage
                };
                let severity = if z > self.config.usage_z_critical {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let deviation = ((gallons - baseline.avg_gallons) / baseline.avg_gallons) * 100.0;
                anomalies.push(UsageAnomaly {
                    zone_id: run.zone_id,
                    zone_name: run.zone_name.clone(),
                    run_date: run.date,
                    anomaly_type,
                    severity,
                    actual_value: gallons,
                    expected_value: baseline.avg_gallons,
                    deviation_percent: deviation.abs(),
                    description: format!(
                        "water usage {:+.1}% from baseline ({:.1} vs {:.1} gal)",
                        deviation, gallons, baseline.avg_gallons
                    ),
                    detected_at,
                });
            }
        }

        if baseline.std_duration > 0.0 {
            let z = (minutes - baseline.avg_duration_minutes).abs() / baseline.std_duration;
            if z > self.config.duration_z_threshold {
                let anomaly_type = if minutes > baseline.avg_duration_minutes {
                    AnomalyType::RuntimeIncrease
                } else {
                    AnomalyType::RuntimeDecrease
                };
                let severity = if z > self.config.duration_z_elevated {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                let deviation = ((minutes - baseline.avg_duration_minutes)
                    / baseline.avg_duration_minutes)
                    * 100.0;
                anomalies.push(UsageAnomaly {
                    zone_id: run.zone_id,
                    zone_name: run.zone_name.clone(),
                    run_date: run.date,
                    anomaly_type,
                    severity,
                    actual_value: minutes,
                    expected_value: baseline.avg_duration_minutes,
                    deviation_percent: deviation.abs(),
                    description: format!(
                        "runtime {:+.1}% from baseline ({:.0} vs {:.0} min)",
                        deviation, minutes, baseline.avg_duration_minutes
                    ),
                    detected_at,
                });
            }
        }

        if baseline.avg_gpm > 0.0 {
            let change = (actual_gpm - baseline.avg_gpm) / baseline.avg_gpm;
            if change.abs() > self.config.efficiency_threshold {
                let anomaly_type = if change > 0.0 {
                    AnomalyType::EfficiencySpike
                } else {
                    AnomalyType::EfficiencyDrop
                };
                let severity = if change.abs() > self.config.efficiency_critical {
                    Severity::High
                } else {
                    Severity::Medium
                };
                anomalies.push(UsageAnomaly {
                    zone_id: run.zone_id,
                    zone_name: run.zone_name.clone(),
                    run_date: run.date,
                    anomaly_type,
                    severity,
                    actual_value: actual_gpm,
                    expected_value: baseline.avg_gpm,
                    deviation_percent: change.abs() * 100.0,
                    description: format!(
                        "efficiency {:+.1}% from baseline ({:.2} vs {:.2} GPM)",
                        change * 100.0,
                        actual_gpm,
                        baseline.avg_gpm
                    ),
                    detected_at,
                });
            }
        }

        anomalies
    }

    /// Classify reported usage against the expected volume.
    ///
    /// Without a usable expectation the reported value is taken at face
    /// value, except that nothing reported is always zero-reported.
    pub fn flag_usage(&self, reported: Option<f64>, expected: Option<f64>) -> UsageFlag {
        let reported = reported.unwrap_or(0.0);
        let Some(expected) = expected.filter(|e| e.is_finite() && *e > 0.0) else {
            return if reported == 0.0 {
                UsageFlag::ZeroReported
            } else {
                UsageFlag::Normal
            };
        };

        if reported == 0.0 {
            return UsageFlag::ZeroReported;
        }

        let ratio = reported / expected;
        if ratio > self.config.too_high_multiplier {
            UsageFlag::TooHigh
        } else if ratio < self.config.too_low_multiplier {
            UsageFlag::TooLow
        } else {
            UsageFlag::Normal
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

/// Expected water usage from a zone's average flow rate and a run duration.
pub fn expected_usage(flow_rate_gpm: f64, duration_minutes: f64) -> f64 {
    if duration_minutes <= 0.0 {
        return 0.0;
    }
    flow_rate_gpm * duration_minutes
}
