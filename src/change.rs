// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Status change detection
//!
//! Compares a zone's newest scheduled-run record against the most recently
//! persisted record for that zone and emits a change event only on a genuine
//! classification transition. Two guards keep re-runs quiet: identical raw
//! text never counts as a change, and the engine checks the stored change
//! log for the same (current, previous) text pair before persisting.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::record::{ScheduledRun, ZoneId};
use crate::status::{classify, StatusVariant};

/// Kind of status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// Zone moved into a rainfall abort
    RainfallAbort,
    /// Zone moved into a sensor abort
    SensorAbort,
    /// Zone was suspended by the user
    UserSuspended,
    /// Zone moved into some other state that prevents irrigation
    IrrigationPrevented,
    /// Zone returned to normal from a prevented state
    NormalRestored,
    /// Any other classification transition
    OtherChange,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::RainfallAbort => "rainfall_abort",
            ChangeType::SensorAbort => "sensor_abort",
            ChangeType::UserSuspended => "user_suspended",
            ChangeType::IrrigationPrevented => "irrigation_prevented",
            ChangeType::NormalRestored => "normal_restored",
            ChangeType::OtherChange => "other_change",
        }
    }
}

/// A detected status transition for one zone. Append-only: no two stored
/// changes for the same zone and day may share the same (current, previous)
/// text pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Zone the transition happened on
    pub zone_id: ZoneId,
    /// Zone display name
    pub zone_name: String,
    /// Date of the current record
    pub current_date: NaiveDate,
    /// Start time of the current record
    pub current_start_time: NaiveDateTime,
    /// Classification of the current text
    pub current_variant: StatusVariant,
    /// Current raw status text
    pub current_text: String,
    /// Date of the previous record
    pub previous_date: NaiveDate,
    /// Start time of the previous record
    pub previous_start_time: NaiveDateTime,
    /// Classification of the previous text
    pub previous_variant: StatusVariant,
    /// Previous raw status text
    pub previous_text: String,
    /// Kind of transition
    pub change_type: ChangeType,
    /// True when the current status prevents irrigation
    pub irrigation_prevented: bool,
    /// Scheduled volume that will not be delivered, in gallons
    pub expected_gallons_lost: f64,
    /// When the transition was detected
    pub detected_at: NaiveDateTime,
    /// Hours elapsed since the previous record was captured
    pub hours_since_previous: Option<f64>,
}

/// Derive the change type from a (previous, current) variant pair.
///
/// Transitions into the explicitly recognized problem states keep their
/// names; other prevented states collapse into a generic prevention; a
/// return to normal from any prevented state is a restoration.
pub fn transition_type(previous: StatusVariant, current: StatusVariant) -> ChangeType {
    match current {
        StatusVariant::RainfallAbort => ChangeType::RainfallAbort,
        StatusVariant::SensorAbort => ChangeType::SensorAbort,
        StatusVariant::UserSuspended => ChangeType::UserSuspended,
        StatusVariant::NotScheduled | StatusVariant::OtherAbort | StatusVariant::OtherSuspended => {
            ChangeType::IrrigationPrevented
        }
        StatusVariant::Normal if previous.prevents_irrigation() => ChangeType::NormalRestored,
        _ => ChangeType::OtherChange,
    }
}

/// Detects status transitions between a persisted record and a fresh capture
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare the most recently persisted record with the current capture.
    ///
    /// Returns `None` unless both the raw text and the classification
    /// changed; purely textual flicker that classifies identically is not a
    /// transition.
    pub fn detect(
        &self,
        previous: &ScheduledRun,
        current: &ScheduledRun,
        detected_at: NaiveDateTime,
    ) -> Option<StatusChange> {
        let previous_text = previous.raw_status.trim();
        let current_text = current.raw_status.trim();

        if previous_text == current_text {
            debug!(
                "zone {} ({}): identical status text, no change",
                current.zone_id, current.zone_name
            );
            return None;
        }

        let previous_variant = classify(previous_text);
        let current_variant = classify(current_text);
        if previous_variant == current_variant {
            debug!(
                "zone {} ({}): text changed but classification {} held",
                current.zone_id,
                current.zone_name,
                current_variant.as_str()
            );
            return None;
        }

        let change_type = transition_type(previous_variant, current_variant);
        let irrigation_prevented = current_variant.prevents_irrigation();
        let expected_gallons_lost = if irrigation_prevented {
            current.expected_gallons.unwrap_or(0.0)
        } else {
            0.0
        };
        let hours_since_previous = {
            let seconds = (detected_at - previous.captured_at).num_seconds();
            (seconds >= 0).then(|| seconds as f64 / 3600.0)
        };

        info!(
            "status change detected for zone {} ({}): {} -> {}",
            current.zone_id,
            current.zone_name,
            previous_variant.as_str(),
            current_variant.as_str()
        );

        Some(StatusChange {
            zone_id: current.zone_id,
            zone_name: current.zone_name.clone(),
            current_date: current.date,
            current_start_time: current.start_time,
            current_variant,
            current_text: current_text.to_string(),
            previous_date: previous.date,
            previous_start_time: previous.start_time,
            previous_variant,
            previous_text: previous_text.to_string(),
            change_type,
            irrigation_prevented,
            expected_gallons_lost,
            detected_at,
            hours_since_previous,
        })
    }
}
