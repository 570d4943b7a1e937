//! Schedule evaluation: expected dose instants for a date window.
//!
//! All arithmetic is on civil local time. A slot at 08:00 stays at 08:00 on
//! both sides of a daylight-saving change, and custom intervals count clock
//! hours rather than elapsed UTC hours.

use crate::{CyclePattern, ScheduleDefinition, ScheduleKind};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Expected dose instants of `schedule` on the days `[window_start, window_end]`
///
/// The result is sorted ascending without duplicates. It only depends on its
/// arguments, so re-running over the same window yields the same instants.
///
/// - daily / weekly / monthly / cyclical: one instant per time slot on each
///   dosing day inside both the window and `[start_date, end_date]`
/// - custom: `start_date` at `first_dose`, then every `interval_hours`
/// - as-needed: nothing
pub fn expand(
    schedule: &ScheduleDefinition,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDateTime> {
    let Some((first, last)) = clip(schedule, window_start, window_end) else {
        return Vec::new();
    };
    let start = schedule.start_date;

    let mut instants = match &schedule.kind {
        ScheduleKind::Daily { times } => slot_days(first, last, times, |_| true),
        ScheduleKind::Weekly {
            days_of_week,
            times,
        } => slot_days(first, last, times, |day| {
            days_of_week.contains(&weekday_index(day))
        }),
        ScheduleKind::Monthly { times } => {
            let anchor = start.day();
            slot_days(first, last, times, |day| day.day() == monthly_dose_day(anchor, day))
        }
        ScheduleKind::Cyclical { cycle, times } => {
            let last = cycle_end(start, cycle).map_or(last, |end| last.min(end));
            slot_days(first, last, times, |day| {
                cycle.is_active_offset((day - start).num_days())
            })
        }
        ScheduleKind::AsNeeded => Vec::new(),
        ScheduleKind::Custom {
            interval_hours,
            first_dose,
        } => interval_instants(start.and_time(*first_dose), *interval_hours, first, last),
    };

    instants.sort();
    instants.dedup();

    tracing::debug!(
        "Expanded {} schedule '{}' over {}..={} into {} doses",
        schedule.kind.type_name(),
        schedule.pattern_name,
        window_start,
        window_end,
        instants.len()
    );
    instants
}

/// First expected instant at or after `after`, looking `horizon_days` ahead
pub fn next_due(
    schedule: &ScheduleDefinition,
    after: NaiveDateTime,
    horizon_days: u32,
) -> Option<NaiveDateTime> {
    let from = after.date();
    let to = from
        .checked_add_signed(Duration::days(i64::from(horizon_days)))
        .unwrap_or(NaiveDate::MAX);
    expand(schedule, from, to).into_iter().find(|t| *t >= after)
}

/// Weekday number with 0 = Sunday, matching `days_of_week`
pub fn weekday_index(day: NaiveDate) -> u8 {
    day.weekday().num_days_from_sunday() as u8
}

/// Intersection of the window with the schedule's active date range
fn clip(
    schedule: &ScheduleDefinition,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let first = schedule.start_date.max(window_start);
    let last = schedule
        .end_date
        .map_or(window_end, |end| end.min(window_end));
    (first <= last).then_some((first, last))
}

/// Last day of the final active period
fn cycle_end(start: NaiveDate, cycle: &CyclePattern) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::days(cycle.span_days() - 1))
}

fn slot_days(
    first: NaiveDate,
    last: NaiveDate,
    times: &[NaiveTime],
    is_dose_day: impl Fn(NaiveDate) -> bool,
) -> Vec<NaiveDateTime> {
    let mut slots = times.to_vec();
    slots.sort();

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| is_dose_day(*day))
        .flat_map(|day| slots.iter().map(move |t| day.and_time(*t)))
        .collect()
}

fn interval_instants(
    anchor: NaiveDateTime,
    interval_hours: u32,
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<NaiveDateTime> {
    let step_secs = i64::from(interval_hours.max(1)) * 3600;
    let step = Duration::seconds(step_secs);
    let lower = first.and_time(NaiveTime::default());

    // Jump straight to the first step on or after the window start
    let skip = if anchor >= lower {
        0
    } else {
        let gap = (lower - anchor).num_seconds();
        (gap + step_secs - 1) / step_secs
    };

    let mut instants = Vec::new();
    let mut next = anchor.checked_add_signed(Duration::seconds(skip * step_secs));
    while let Some(t) = next {
        if t.date() > last {
            break;
        }
        instants.push(t);
        next = t.checked_add_signed(step);
    }
    instants
}

/// Dosing day-of-month for `anchor` in the month of `day`, clamped to its length
fn monthly_dose_day(anchor: u32, day: NaiveDate) -> u32 {
    anchor.min(days_in_month(day.year(), day.month()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}
