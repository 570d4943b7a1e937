//! Column-shaped schedule rows.
//!
//! The relational store and the CLI describe a schedule as a flat row with a
//! `schedule_type` string and nullable columns. Converting a row into a
//! [`ScheduleDefinition`] is where the "column X iff type Y" rules live.

use crate::{CyclePattern, Error, Result, ScheduleDefinition, ScheduleKind};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat pattern row, one nullable column per schedule parameter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub pattern_name: Option<String>,
    pub schedule_type: String,
    pub days_of_week: Option<Vec<u8>>,
    pub specific_times: Option<Vec<String>>,
    pub interval_hours: Option<u32>,
    pub active_days: Option<u32>,
    pub break_days: Option<u32>,
    pub total_cycles: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub dosage_amount: f64,
    pub dosage_unit: Option<String>,
    pub notes: Option<String>,
}

impl ScheduleRow {
    /// A row of the given type with every optional column empty
    pub fn new(schedule_type: impl Into<String>, start_date: NaiveDate, dosage_amount: f64) -> Self {
        Self {
            pattern_name: None,
            schedule_type: schedule_type.into(),
            days_of_week: None,
            specific_times: None,
            interval_hours: None,
            active_days: None,
            break_days: None,
            total_cycles: None,
            start_date,
            end_date: None,
            dosage_amount,
            dosage_unit: None,
            notes: None,
        }
    }
}

/// Parse a time of day written as `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::validation("specific_times", format!("invalid time of day '{}'", s)))
}

fn parse_times(raw: &Option<Vec<String>>) -> Result<Vec<NaiveTime>> {
    raw.iter().flatten().map(|s| parse_time_of_day(s)).collect()
}

fn reject(field: &str, value_present: bool, schedule_type: &str) -> Result<()> {
    if value_present {
        return Err(Error::validation(
            field,
            format!("not allowed for '{}' schedules", schedule_type),
        ));
    }
    Ok(())
}

fn require<T: Copy>(field: &str, value: Option<T>, schedule_type: &str) -> Result<T> {
    value.ok_or_else(|| {
        Error::validation(field, format!("required for '{}' schedules", schedule_type))
    })
}

impl TryFrom<ScheduleRow> for ScheduleDefinition {
    type Error = crate::Error;

    fn try_from(row: ScheduleRow) -> Result<Self> {
        let schedule_type = row.schedule_type.trim().to_lowercase().replace('-', "_");
        let st = schedule_type.as_str();

        if st != "weekly" {
            reject("days_of_week", row.days_of_week.is_some(), st)?;
        }
        if st != "custom" {
            reject("interval_hours", row.interval_hours.is_some(), st)?;
        }
        if st != "cyclical" {
            let cycle_columns =
                row.active_days.is_some() || row.break_days.is_some() || row.total_cycles.is_some();
            reject("active_days", cycle_columns, st)?;
        }

        let times = parse_times(&row.specific_times)?;

        let kind = match st {
            "daily" => ScheduleKind::Daily { times },
            "monthly" => ScheduleKind::Monthly { times },
            "weekly" => ScheduleKind::Weekly {
                days_of_week: row.days_of_week.clone().ok_or_else(|| {
                    Error::validation("days_of_week", "required for 'weekly' schedules")
                })?,
                times,
            },
            "cyclical" => ScheduleKind::Cyclical {
                cycle: CyclePattern {
                    active_days: require("active_days", row.active_days, st)?,
                    break_days: row.break_days.unwrap_or(0),
                    total_cycles: require("total_cycles", row.total_cycles, st)?,
                },
                times,
            },
            "as_needed" => {
                reject("specific_times", !times.is_empty(), st)?;
                ScheduleKind::AsNeeded
            }
            "custom" => {
                if times.len() > 1 {
                    return Err(Error::validation(
                        "specific_times",
                        "custom schedules take a single first-dose time",
                    ));
                }
                ScheduleKind::Custom {
                    interval_hours: require("interval_hours", row.interval_hours, st)?,
                    first_dose: times.first().copied().unwrap_or_default(),
                }
            }
            other => {
                return Err(Error::validation(
                    "schedule_type",
                    format!("unknown schedule type '{}'", other),
                ))
            }
        };

        let schedule = ScheduleDefinition {
            id: Uuid::new_v4(),
            pattern_name: row
                .pattern_name
                .unwrap_or_else(|| kind.type_name().to_string()),
            kind,
            start_date: row.start_date,
            end_date: row.end_date,
            dosage_amount: row.dosage_amount,
            dosage_unit: row.dosage_unit.unwrap_or_else(|| "mg".into()),
            notes: row.notes,
        };
        schedule.validate()?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn field_of(result: Result<ScheduleDefinition>) -> String {
        match result {
            Err(Error::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_weekly_row() {
        let mut row = ScheduleRow::new("weekly", start(), 5.0);
        row.days_of_week = Some(vec![1, 3, 5]);
        row.specific_times = Some(vec!["08:00".into(), "20:30:00".into()]);

        let schedule = ScheduleDefinition::try_from(row).unwrap();
        assert_eq!(schedule.pattern_name, "weekly");
        assert_eq!(schedule.dosage_unit, "mg");
        match schedule.kind {
            ScheduleKind::Weekly {
                days_of_week,
                times,
            } => {
                assert_eq!(days_of_week, vec![1, 3, 5]);
                assert_eq!(times[1], NaiveTime::from_hms_opt(20, 30, 0).unwrap());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_weekly_without_days() {
        let mut row = ScheduleRow::new("weekly", start(), 5.0);
        row.specific_times = Some(vec!["08:00".into()]);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "days_of_week");
    }

    #[test]
    fn test_custom_without_interval() {
        let row = ScheduleRow::new("custom", start(), 5.0);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "interval_hours");
    }

    #[test]
    fn test_interval_only_for_custom() {
        let mut row = ScheduleRow::new("daily", start(), 5.0);
        row.specific_times = Some(vec!["08:00".into()]);
        row.interval_hours = Some(12);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "interval_hours");
    }

    #[test]
    fn test_days_only_for_weekly() {
        let mut row = ScheduleRow::new("daily", start(), 5.0);
        row.specific_times = Some(vec!["08:00".into()]);
        row.days_of_week = Some(vec![1]);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "days_of_week");
    }

    #[test]
    fn test_cyclical_row_defaults_break_days() {
        let mut row = ScheduleRow::new("cyclical", start(), 5.0);
        row.specific_times = Some(vec!["08:00".into(), "20:00".into()]);
        row.active_days = Some(14);
        row.total_cycles = Some(18);

        let schedule = ScheduleDefinition::try_from(row).unwrap();
        match schedule.kind {
            ScheduleKind::Cyclical { cycle, .. } => {
                assert_eq!(cycle.break_days, 0);
                assert_eq!(cycle.total_cycles, 18);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_custom_row_uses_first_time() {
        let mut row = ScheduleRow::new("custom", start(), 5.0);
        row.interval_hours = Some(8);
        row.specific_times = Some(vec!["06:00".into()]);
        let schedule = ScheduleDefinition::try_from(row).unwrap();
        assert_eq!(
            schedule.kind,
            ScheduleKind::Custom {
                interval_hours: 8,
                first_dose: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_as_needed_hyphenated_and_bad_type() {
        let row = ScheduleRow::new("As-Needed", start(), 1.0);
        let schedule = ScheduleDefinition::try_from(row).unwrap();
        assert_eq!(schedule.kind, ScheduleKind::AsNeeded);

        let row = ScheduleRow::new("hourly", start(), 1.0);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "schedule_type");
    }

    #[test]
    fn test_bad_time_and_dosage() {
        let mut row = ScheduleRow::new("daily", start(), 1.0);
        row.specific_times = Some(vec!["25:00".into()]);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "specific_times");

        let mut row = ScheduleRow::new("daily", start(), -1.0);
        row.specific_times = Some(vec!["08:00".into()]);
        assert_eq!(field_of(ScheduleDefinition::try_from(row)), "dosage_amount");
    }
}
