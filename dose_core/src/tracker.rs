//! Tracker operations tying the store, schedule evaluator and reconciler.
//!
//! Every function takes the store explicitly; nothing here holds state of its
//! own. Times are civil local time (see [`crate::schedule`]).

use crate::reconcile::{reconcile, AdherenceReport, ReconcileOptions};
use crate::schedule::expand;
use crate::store::MedicationStore;
use crate::{Error, LogStatus, Medication, MedicationLog, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What the user reports for one dose
#[derive(Clone, Debug)]
pub struct DoseOutcome {
    pub status: LogStatus,
    pub taken_time: Option<NaiveDateTime>,
    /// Overrides the scheduled dosage when set
    pub dosage_amount: Option<f64>,
    pub effectiveness_rating: Option<u8>,
    pub side_effects: Vec<String>,
    pub notes: Option<String>,
}

impl DoseOutcome {
    pub fn new(status: LogStatus, taken_time: Option<NaiveDateTime>) -> Self {
        Self {
            status,
            taken_time,
            dosage_amount: None,
            effectiveness_rating: None,
            side_effects: Vec::new(),
            notes: None,
        }
    }

    pub fn taken(at: NaiveDateTime) -> Self {
        Self::new(LogStatus::Taken, Some(at))
    }

    pub fn skipped() -> Self {
        Self::new(LogStatus::Skipped, None)
    }
}

/// One line of a day's dose list
#[derive(Clone, Debug, Serialize)]
pub struct DueDose {
    pub medication_id: Uuid,
    pub medication_name: String,
    pub scheduled_time: NaiveDateTime,
    pub status: LogStatus,
    pub log_id: Option<Uuid>,
    pub dosage_amount: f64,
    pub dosage_unit: String,
}

/// Validate and persist a new medication
pub fn add_medication<S: MedicationStore>(store: &mut S, medication: Medication) -> Result<Medication> {
    store.save_medication(&medication)?;
    tracing::info!(
        "Added medication {} '{}' ({} schedule)",
        medication.id,
        medication.name,
        medication.schedule.kind.type_name()
    );
    Ok(medication)
}

/// Write `scheduled` placeholders for expected doses on `[from, to]`
///
/// Instants that already have a log are left alone, so planning the same
/// window twice creates nothing the second time. Inactive medications are
/// not planned.
pub fn plan_doses<S: MedicationStore>(
    store: &mut S,
    medication_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MedicationLog>> {
    let medication = store.medication(medication_id)?;
    if !medication.is_active {
        tracing::info!("Medication {} is inactive, nothing to plan", medication_id);
        return Ok(Vec::new());
    }

    let expected = expand(&medication.schedule, from, to);
    let existing = store.logs(medication_id, start_of_day(from), end_of_day(to))?;

    let mut created = Vec::new();
    for instant in expected {
        if existing.iter().any(|log| log.scheduled_time == instant) {
            continue;
        }
        let placeholder = MedicationLog::placeholder(&medication, instant);
        store.append_log(&placeholder)?;
        created.push(placeholder);
    }

    tracing::info!(
        "Planned {} doses for '{}' from {} to {}",
        created.len(),
        medication.name,
        from,
        to
    );
    Ok(created)
}

/// Record the outcome of the dose scheduled at `scheduled_time`
///
/// Updates the log already at that instant (usually a placeholder) or creates
/// one for an ad-hoc dose.
pub fn record_dose<S: MedicationStore>(
    store: &mut S,
    medication_id: Uuid,
    scheduled_time: NaiveDateTime,
    outcome: DoseOutcome,
) -> Result<MedicationLog> {
    let medication = store.medication(medication_id)?;

    let mut log = store
        .logs(medication_id, scheduled_time, scheduled_time)?
        .into_iter()
        .next()
        .unwrap_or_else(|| MedicationLog::placeholder(&medication, scheduled_time));

    log.status = outcome.status;
    log.taken_time = outcome.taken_time;
    if let Some(amount) = outcome.dosage_amount {
        log.dosage_amount = amount;
    }
    log.effectiveness_rating = outcome.effectiveness_rating;
    log.side_effects = outcome.side_effects;
    if outcome.notes.is_some() {
        log.notes = outcome.notes;
    }
    log.updated_at = Utc::now();

    store.append_log(&log)?;

    let flagged = crate::catalog::get_default_catalog().flag_log(&log);
    for entry in flagged {
        tracing::warn!(
            "Log {} reports '{}' ({:?}), which requires medical attention",
            log.id,
            entry.name,
            entry.severity
        );
    }

    tracing::info!(
        "Recorded {} for '{}' at {}",
        log.status,
        medication.name,
        scheduled_time
    );
    Ok(log)
}

/// Reconcile one medication's doses on `[from, to]` as of `now`
pub fn adherence<S: MedicationStore>(
    store: &S,
    medication_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
    options: &ReconcileOptions,
) -> Result<AdherenceReport> {
    if to < from {
        return Err(Error::validation(
            "window",
            format!("end {} is before start {}", to, from),
        ));
    }
    let medication = store.medication(medication_id)?;
    let expected = expand(&medication.schedule, from, to);
    let logs = logs_around(store, medication_id, from, to, options)?;
    Ok(reconcile(&expected, &logs, now, options))
}

/// Every active medication's doses on `date`, ordered by time
///
/// Ad-hoc logs on that day that match no expected instant are listed with
/// their own status.
pub fn due_doses<S: MedicationStore>(
    store: &S,
    user_id: Uuid,
    date: NaiveDate,
    now: NaiveDateTime,
    options: &ReconcileOptions,
) -> Result<Vec<DueDose>> {
    let mut due = Vec::new();

    for medication in store.medications(user_id, false)? {
        let expected = expand(&medication.schedule, date, date);
        let logs = logs_around(store, medication.id, date, date, options)?;
        let report = reconcile(&expected, &logs, now, options);

        let line = |scheduled_time, status, log_id| DueDose {
            medication_id: medication.id,
            medication_name: medication.name.clone(),
            scheduled_time,
            status,
            log_id,
            dosage_amount: medication.schedule.dosage_amount,
            dosage_unit: medication.schedule.dosage_unit.clone(),
        };

        for dose in &report.doses {
            due.push(line(dose.scheduled_time, dose.status, dose.log_id));
        }
        for log in logs
            .iter()
            .filter(|log| report.unmatched_logs.contains(&log.id))
            .filter(|log| log.scheduled_time.date() == date)
        {
            due.push(line(log.scheduled_time, log.status, Some(log.id)));
        }
    }

    due.sort_by(|a, b| {
        a.scheduled_time
            .cmp(&b.scheduled_time)
            .then_with(|| a.medication_name.cmp(&b.medication_name))
    });
    Ok(due)
}

/// Logs that could match an instant on `[from, to]` under the tolerance
fn logs_around<S: MedicationStore>(
    store: &S,
    medication_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    options: &ReconcileOptions,
) -> Result<Vec<MedicationLog>> {
    let slack = options.tolerance.abs();
    let lower = start_of_day(from);
    let upper = end_of_day(to);
    let lower = lower.checked_sub_signed(slack).unwrap_or(lower);
    let upper = upper.checked_add_signed(slack).unwrap_or(upper);
    store.logs(medication_id, lower, upper)
}

fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::default())
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .unwrap_or_else(|| start_of_day(day))
}
