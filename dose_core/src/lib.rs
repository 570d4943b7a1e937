#![forbid(unsafe_code)]

//! Core domain model and business logic for dosetrack.
//!
//! This crate provides:
//! - Domain types (medications, schedules, dose logs, side effects)
//! - Schedule parsing, validation and expansion
//! - Log reconciliation and adherence reporting
//! - Persistence (state file, log WAL, CSV export)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod validation;
pub mod pattern;
pub mod schedule;
pub mod reconcile;
pub mod store;
pub mod export;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use pattern::{parse_time_of_day, ScheduleRow};
pub use schedule::{expand, next_due};
pub use reconcile::{reconcile, AdherenceReport, ReconcileOptions, ReconciledDose, StatusCounts};
pub use store::{FileStore, MedicationStore};
pub use export::export_logs_csv;
pub use tracker::{
    add_medication, adherence, due_doses, plan_doses, record_dose, DoseOutcome, DueDose,
};
