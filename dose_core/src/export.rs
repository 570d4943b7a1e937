//! CSV export of dose logs.
//!
//! One row per log with civil timestamps and side-effect tags joined by `;`.
//! The file is written to a temp file and renamed into place so a reader never
//! sees a half-written export.

use crate::{Error, MedicationLog, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Column order of [`CsvRow`], written by hand when there are no rows
const HEADERS: [&str; 11] = [
    "id",
    "medication_id",
    "medication",
    "scheduled_time",
    "taken_time",
    "status",
    "dosage_amount",
    "dosage_unit",
    "effectiveness_rating",
    "side_effects",
    "notes",
];

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    medication_id: String,
    medication: String,
    scheduled_time: String,
    taken_time: Option<String>,
    status: String,
    dosage_amount: f64,
    dosage_unit: String,
    effectiveness_rating: Option<u8>,
    side_effects: String,
    notes: Option<String>,
}

fn civil(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

impl CsvRow {
    fn new(log: &MedicationLog, medication: &str) -> Self {
        CsvRow {
            id: log.id.to_string(),
            medication_id: log.medication_id.to_string(),
            medication: medication.to_string(),
            scheduled_time: civil(log.scheduled_time),
            taken_time: log.taken_time.map(civil),
            status: log.status.to_string(),
            dosage_amount: log.dosage_amount,
            dosage_unit: log.dosage_unit.clone(),
            effectiveness_rating: log.effectiveness_rating,
            side_effects: log.side_effects.join(";"),
            notes: log.notes.clone(),
        }
    }
}

/// Write `logs` to `csv_path`, replacing any previous export
///
/// `names` maps medication ids to display names; unknown ids export with an
/// empty name. Returns the number of rows written.
pub fn export_logs_csv(
    logs: &[MedicationLog],
    names: &HashMap<Uuid, String>,
    csv_path: &Path,
) -> Result<usize> {
    let parent = match csv_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(temp.as_file());

    // serde only emits headers alongside the first row
    if logs.is_empty() {
        writer.write_record(HEADERS)?;
    }
    for log in logs {
        let name = names
            .get(&log.medication_id)
            .map(String::as_str)
            .unwrap_or("");
        writer.serialize(CsvRow::new(log, name))?;
    }
    writer.flush()?;
    drop(writer);

    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} logs to {:?}", logs.len(), csv_path);
    Ok(logs.len())
}
