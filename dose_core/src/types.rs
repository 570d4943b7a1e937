//! Core domain types for the medication tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications and their embedded dosing schedules
//! - Schedule kinds (daily, weekly, cyclical, ...)
//! - Dose logs and their statuses
//! - The side-effect reference catalog
//!
//! Dose instants (`scheduled_time`, `taken_time`) are civil local time of the
//! medication's owner and carry no offset. Audit stamps are UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// Alternating active/break period for cyclical schedules
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CyclePattern {
    pub active_days: u32,
    pub break_days: u32,
    pub total_cycles: u32,
}

impl CyclePattern {
    /// Length of one active+break cycle in days
    pub fn period(&self) -> i64 {
        i64::from(self.active_days) + i64::from(self.break_days)
    }

    /// Whether the day `offset` days after the schedule start is a dosing day
    pub fn is_active_offset(&self, offset: i64) -> bool {
        let period = self.period();
        if offset < 0 || period == 0 {
            return false;
        }
        offset % period < i64::from(self.active_days)
            && offset / period < i64::from(self.total_cycles)
    }

    /// Number of days covered by all cycles
    pub fn span_days(&self) -> i64 {
        self.period() * i64::from(self.total_cycles)
    }
}

/// Recurrence rule of a schedule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Every calendar day at each slot
    Daily { times: Vec<NaiveTime> },
    /// Selected weekdays (0 = Sunday .. 6 = Saturday) at each slot
    Weekly {
        days_of_week: Vec<u8>,
        times: Vec<NaiveTime>,
    },
    /// Same day-of-month as the start date, at each slot
    Monthly { times: Vec<NaiveTime> },
    /// Active days only, for a fixed number of cycles
    Cyclical {
        cycle: CyclePattern,
        times: Vec<NaiveTime>,
    },
    /// No recurrence; doses are logged ad hoc
    AsNeeded,
    /// Fixed interval from the first dose on the start date
    Custom {
        interval_hours: u32,
        first_dose: NaiveTime,
    },
}

impl ScheduleKind {
    /// Column value used by the relational store
    pub fn type_name(&self) -> &'static str {
        match self {
            ScheduleKind::Daily { .. } => "daily",
            ScheduleKind::Weekly { .. } => "weekly",
            ScheduleKind::Monthly { .. } => "monthly",
            ScheduleKind::Cyclical { .. } => "cyclical",
            ScheduleKind::AsNeeded => "as_needed",
            ScheduleKind::Custom { .. } => "custom",
        }
    }

    /// Time-of-day slots (empty for as-needed and custom)
    pub fn times(&self) -> &[NaiveTime] {
        match self {
            ScheduleKind::Daily { times }
            | ScheduleKind::Weekly { times, .. }
            | ScheduleKind::Monthly { times }
            | ScheduleKind::Cyclical { times, .. } => times,
            ScheduleKind::AsNeeded | ScheduleKind::Custom { .. } => &[],
        }
    }
}

/// How often and when a medication should be taken
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScheduleDefinition {
    pub id: Uuid,
    pub pattern_name: String,
    pub kind: ScheduleKind,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub dosage_amount: f64,
    pub dosage_unit: String,
    pub notes: Option<String>,
}

impl ScheduleDefinition {
    /// Create a schedule with a one-unit mg dosage and no end date
    pub fn new(kind: ScheduleKind, start_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern_name: kind.type_name().to_string(),
            kind,
            start_date,
            end_date: None,
            dosage_amount: 1.0,
            dosage_unit: "mg".into(),
            notes: None,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_dosage(mut self, amount: f64, unit: impl Into<String>) -> Self {
        self.dosage_amount = amount;
        self.dosage_unit = unit.into();
        self
    }
}

// ============================================================================
// Medication
// ============================================================================

/// A medication owned by one user, with its dosing schedule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub dosage_form: String,
    pub strength: Option<String>,
    pub manufacturer: Option<String>,
    pub prescribing_doctor: Option<String>,
    pub pharmacy: Option<String>,
    #[serde(default)]
    pub drug_interactions: Vec<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub schedule: ScheduleDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medication {
    pub fn new(user_id: Uuid, name: impl Into<String>, schedule: ScheduleDefinition) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            generic_name: None,
            dosage_form: "tablet".into(),
            strength: None,
            manufacturer: None,
            prescribing_doctor: None,
            pharmacy: None,
            drug_interactions: Vec::new(),
            notes: None,
            is_active: true,
            schedule,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Dose Logs
// ============================================================================

/// Outcome of a dose occurrence
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Scheduled,
    Taken,
    Skipped,
    Missed,
    Partial,
}

impl LogStatus {
    /// Statuses that must carry a taken_time
    pub fn requires_taken_time(self) -> bool {
        matches!(self, LogStatus::Taken | LogStatus::Partial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Scheduled => "scheduled",
            LogStatus::Taken => "taken",
            LogStatus::Skipped => "skipped",
            LogStatus::Missed => "missed",
            LogStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Ok(LogStatus::Scheduled),
            "taken" => Ok(LogStatus::Taken),
            "skipped" => Ok(LogStatus::Skipped),
            "missed" => Ok(LogStatus::Missed),
            "partial" => Ok(LogStatus::Partial),
            other => Err(crate::Error::validation(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// One record per actual-or-expected dose occurrence
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub scheduled_time: NaiveDateTime,
    pub taken_time: Option<NaiveDateTime>,
    pub dosage_amount: f64,
    pub dosage_unit: String,
    pub status: LogStatus,
    pub effectiveness_rating: Option<u8>,
    #[serde(default)]
    pub side_effects: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicationLog {
    /// A `scheduled` placeholder for an expected dose of `medication`
    pub fn placeholder(medication: &Medication, scheduled_time: NaiveDateTime) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: medication.user_id,
            medication_id: medication.id,
            schedule_id: Some(medication.schedule.id),
            scheduled_time,
            taken_time: None,
            dosage_amount: medication.schedule.dosage_amount,
            dosage_unit: medication.schedule.dosage_unit.clone(),
            status: LogStatus::Scheduled,
            effectiveness_rating: None,
            side_effects: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Side Effects
// ============================================================================

/// Severity of a side effect, ordered mild < critical
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Critical,
}

/// Reference entry used to tag logs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SideEffectType {
    pub name: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub category: String,
    pub is_common: bool,
    pub requires_medical_attention: bool,
    pub symptoms: Vec<String>,
}

/// The catalog of known side-effect types, keyed by lowercase name
#[derive(Clone, Debug, Default)]
pub struct SideEffectCatalog {
    pub entries: HashMap<String, SideEffectType>,
}
