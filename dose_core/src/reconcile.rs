//! Reconciliation of expected doses against recorded logs.
//!
//! Each expected instant is paired with at most one log, and each log with at
//! most one instant. Whatever the pairing leaves over decides the status:
//! an unmatched instant is `missed` once due and `scheduled` before that.

use crate::{LogStatus, MedicationLog};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

/// Matching and scoring parameters
#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    /// Largest distance between an expected instant and a log's scheduled_time
    pub tolerance: Duration,
    /// Credit given to a partial dose in the adherence rate
    pub partial_weight: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            tolerance: Duration::zero(),
            partial_weight: 0.5,
        }
    }
}

/// Classification of one expected instant
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ReconciledDose {
    pub scheduled_time: NaiveDateTime,
    pub status: LogStatus,
    pub log_id: Option<Uuid>,
}

/// Per-status counts over the expected instants
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub scheduled: usize,
    pub taken: usize,
    pub partial: usize,
    pub skipped: usize,
    pub missed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: LogStatus) {
        match status {
            LogStatus::Scheduled => self.scheduled += 1,
            LogStatus::Taken => self.taken += 1,
            LogStatus::Partial => self.partial += 1,
            LogStatus::Skipped => self.skipped += 1,
            LogStatus::Missed => self.missed += 1,
        }
    }

    /// Instants that are no longer pending
    pub fn due(&self) -> usize {
        self.taken + self.partial + self.skipped + self.missed
    }
}

/// Result of reconciling a window of expected doses
#[derive(Clone, Debug, Serialize)]
pub struct AdherenceReport {
    pub doses: Vec<ReconciledDose>,
    pub counts: StatusCounts,
    /// `None` while nothing in the window is due yet
    pub adherence_rate: Option<f64>,
    /// Logs that matched no expected instant (as-needed or off-schedule doses)
    pub unmatched_logs: Vec<Uuid>,
}

/// Classify `expected` instants against `logs` as of `now`
pub fn reconcile(
    expected: &[NaiveDateTime],
    logs: &[MedicationLog],
    now: NaiveDateTime,
    options: &ReconcileOptions,
) -> AdherenceReport {
    let mut expected = expected.to_vec();
    expected.sort();
    expected.dedup();

    let mut candidates: Vec<&MedicationLog> = logs.iter().collect();
    candidates.sort_by_key(|log| (log.scheduled_time, log.created_at));
    let mut used = vec![false; candidates.len()];

    let tolerance = options.tolerance.abs();
    let mut doses = Vec::with_capacity(expected.len());
    let mut counts = StatusCounts::default();

    for instant in expected {
        let matched = nearest_unused(&candidates, &used, instant, tolerance);

        let (status, log_id) = match matched {
            Some(idx) => {
                used[idx] = true;
                let log = candidates[idx];
                (classify(Some(log.status), instant, now), Some(log.id))
            }
            None => (classify(None, instant, now), None),
        };

        counts.record(status);
        doses.push(ReconciledDose {
            scheduled_time: instant,
            status,
            log_id,
        });
    }

    let unmatched_logs = candidates
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(log, _)| log.id)
        .collect();

    let adherence_rate = match counts.due() {
        0 => None,
        due => {
            let credit = counts.taken as f64 + options.partial_weight * counts.partial as f64;
            Some(credit / due as f64)
        }
    };

    tracing::debug!(
        "Reconciled {} expected doses: {:?}, adherence {:?}",
        doses.len(),
        counts,
        adherence_rate
    );

    AdherenceReport {
        doses,
        counts,
        adherence_rate,
        unmatched_logs,
    }
}

/// Index of the unused log closest to `instant`, ties going to the earlier one
fn nearest_unused(
    candidates: &[&MedicationLog],
    used: &[bool],
    instant: NaiveDateTime,
    tolerance: Duration,
) -> Option<usize> {
    let lower = instant.checked_sub_signed(tolerance).unwrap_or(NaiveDateTime::MIN);
    let from = candidates.partition_point(|log| log.scheduled_time < lower);

    let mut best: Option<(usize, Duration)> = None;
    for (idx, log) in candidates.iter().enumerate().skip(from) {
        let distance = (log.scheduled_time - instant).abs();
        if distance > tolerance {
            if log.scheduled_time > instant {
                break;
            }
            continue;
        }
        if used[idx] {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((idx, distance));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Status of an expected instant given the status of its matched log, if any
fn classify(log_status: Option<LogStatus>, instant: NaiveDateTime, now: NaiveDateTime) -> LogStatus {
    match log_status {
        Some(LogStatus::Scheduled) | None if instant <= now => LogStatus::Missed,
        Some(LogStatus::Scheduled) | None => LogStatus::Scheduled,
        Some(status) => status,
    }
}
