//! Write-time validation of schedules, medications and dose logs.
//!
//! Everything here runs before a record reaches the store. Field invariants
//! produce [`Error::Validation`] naming the field; a status/taken_time
//! mismatch on a log produces [`Error::Consistency`].

use crate::{Error, Medication, MedicationLog, Result, ScheduleDefinition, ScheduleKind};
use chrono::NaiveTime;
use std::collections::HashSet;

/// Upper bound on time-of-day slots per day
pub const MAX_SLOTS_PER_DAY: usize = 24;

/// Allowed range for custom schedules
pub const MIN_INTERVAL_HOURS: u32 = 1;
pub const MAX_INTERVAL_HOURS: u32 = 168;

fn validate_slots(times: &[NaiveTime]) -> Result<()> {
    if times.is_empty() {
        return Err(Error::validation("times", "at least one time of day is required"));
    }
    if times.len() > MAX_SLOTS_PER_DAY {
        return Err(Error::validation(
            "times",
            format!("at most {} times per day, got {}", MAX_SLOTS_PER_DAY, times.len()),
        ));
    }
    let mut seen = HashSet::new();
    for t in times {
        if !seen.insert(*t) {
            return Err(Error::validation(
                "times",
                format!("duplicate time {}", t.format("%H:%M")),
            ));
        }
    }
    Ok(())
}

fn validate_weekdays(days: &[u8]) -> Result<()> {
    if days.is_empty() {
        return Err(Error::validation(
            "days_of_week",
            "weekly schedules need at least one weekday",
        ));
    }
    if days.len() > 7 {
        return Err(Error::validation("days_of_week", "at most 7 weekdays"));
    }
    let mut seen = HashSet::new();
    for &d in days {
        if d > 6 {
            return Err(Error::validation(
                "days_of_week",
                format!("weekday {} outside 0 (Sunday) ..= 6 (Saturday)", d),
            ));
        }
        if !seen.insert(d) {
            return Err(Error::validation("days_of_week", format!("duplicate weekday {}", d)));
        }
    }
    Ok(())
}

pub(crate) fn validate_dosage(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::validation(
            "dosage_amount",
            format!("must be greater than zero, got {}", amount),
        ));
    }
    Ok(())
}

impl ScheduleDefinition {
    /// Check every schedule invariant
    pub fn validate(&self) -> Result<()> {
        if self.pattern_name.trim().is_empty() {
            return Err(Error::validation("pattern_name", "must not be empty"));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(Error::validation(
                    "end_date",
                    format!("{} is before start_date {}", end, self.start_date),
                ));
            }
        }
        validate_dosage(self.dosage_amount)?;
        if self.dosage_unit.trim().is_empty() {
            return Err(Error::validation("dosage_unit", "must not be empty"));
        }

        match &self.kind {
            ScheduleKind::Daily { times } | ScheduleKind::Monthly { times } => {
                validate_slots(times)
            }
            ScheduleKind::Weekly {
                days_of_week,
                times,
            } => {
                validate_weekdays(days_of_week)?;
                validate_slots(times)
            }
            ScheduleKind::Cyclical { cycle, times } => {
                if cycle.active_days == 0 {
                    return Err(Error::validation("active_days", "must be at least 1"));
                }
                if cycle.total_cycles == 0 {
                    return Err(Error::validation("total_cycles", "must be at least 1"));
                }
                validate_slots(times)
            }
            ScheduleKind::AsNeeded => Ok(()),
            ScheduleKind::Custom { interval_hours, .. } => {
                if !(MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS).contains(interval_hours) {
                    return Err(Error::validation(
                        "interval_hours",
                        format!(
                            "must be between {} and {}, got {}",
                            MIN_INTERVAL_HOURS, MAX_INTERVAL_HOURS, interval_hours
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Medication {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        if self.dosage_form.trim().is_empty() {
            return Err(Error::validation("dosage_form", "must not be empty"));
        }
        self.schedule.validate()
    }
}

impl MedicationLog {
    /// Field checks plus the status/taken_time pairing
    pub fn validate(&self) -> Result<()> {
        validate_dosage(self.dosage_amount)?;
        if let Some(rating) = self.effectiveness_rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::validation(
                    "effectiveness_rating",
                    format!("must be between 1 and 5, got {}", rating),
                ));
            }
        }

        match (self.status.requires_taken_time(), self.taken_time.is_some()) {
            (true, false) => Err(Error::Consistency(format!(
                "log {} is '{}' but has no taken_time",
                self.id, self.status
            ))),
            (false, true) => Err(Error::Consistency(format!(
                "log {} is '{}' but has a taken_time",
                self.id, self.status
            ))),
            _ => Ok(()),
        }
    }
}
