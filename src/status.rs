// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Status text classification
//!
//! Maps the free-form status text scraped from the controller to a canonical
//! status variant. Classification is an ordered rule list evaluated top to
//! bottom: several status kinds share generic "Time:"/"Duration:" fields, so
//! the most specific phrases must win before any keyword fallback runs.

use serde::{Deserialize, Serialize};

/// Canonical classification of a zone's raw status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusVariant {
    /// Normal watering cycle
    Normal,
    /// Aborted due to high daily rainfall
    RainfallAbort,
    /// Aborted due to sensor input
    SensorAbort,
    /// Water cycle suspended by the user
    UserSuspended,
    /// Not scheduled to run
    NotScheduled,
    /// Aborted or cancelled for a reason we have not seen spelled out
    OtherAbort,
    /// Suspended or paused for a reason we have not seen spelled out
    OtherSuspended,
    /// Text matched no rule
    Unknown,
}

impl StatusVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusVariant::Normal => "normal_cycle",
            StatusVariant::RainfallAbort => "rainfall_abort",
            StatusVariant::SensorAbort => "sensor_abort",
            StatusVariant::UserSuspended => "user_suspended",
            StatusVariant::NotScheduled => "not_scheduled",
            StatusVariant::OtherAbort => "other_abort",
            StatusVariant::OtherSuspended => "other_suspended",
            StatusVariant::Unknown => "unknown",
        }
    }

    /// True when a zone in this status will not irrigate
    pub fn prevents_irrigation(&self) -> bool {
        matches!(
            self,
            StatusVariant::RainfallAbort
                | StatusVariant::SensorAbort
                | StatusVariant::UserSuspended
                | StatusVariant::NotScheduled
                | StatusVariant::OtherAbort
                | StatusVariant::OtherSuspended
        )
    }
}

/// Explicit status phrases, most specific first. First match wins.
const PHRASE_RULES: &[(&str, StatusVariant)] = &[
    ("aborted due to high daily rainfall", StatusVariant::RainfallAbort),
    ("aborted due to sensor input", StatusVariant::SensorAbort),
    ("water cycle suspended", StatusVariant::UserSuspended),
    ("not scheduled to run", StatusVariant::NotScheduled),
    ("normal watering cycle", StatusVariant::Normal),
];

/// Keywords that rule out the schedule-shaped-text fallback
const ABORT_KEYWORDS: &[&str] = &["aborted", "suspended", "cancelled", "not scheduled"];

/// Classify raw status text. Pure and total: unmatched text yields
/// [`StatusVariant::Unknown`], never an error.
pub fn classify(raw: &str) -> StatusVariant {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return StatusVariant::Unknown;
    }

    for (phrase, variant) in PHRASE_RULES {
        if text.contains(phrase) {
            return *variant;
        }
    }

    // Generic abort/suspend indicators not covered by an explicit phrase
    if text.contains("aborted") || text.contains("cancelled") {
        return StatusVariant::OtherAbort;
    }
    if text.contains("suspended") || text.contains("paused") {
        return StatusVariant::OtherSuspended;
    }

    // Schedule text with time and duration fields and no anomaly keyword
    // implies normal operation
    if text.contains("time:")
        && text.contains("duration:")
        && !ABORT_KEYWORDS.iter().any(|keyword| text.contains(keyword))
    {
        return StatusVariant::Normal;
    }

    StatusVariant::Unknown
}
