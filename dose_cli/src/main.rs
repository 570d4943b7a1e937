use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use dose_core::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "dosetrack")]
#[command(about = "Medication dosing schedule tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user (defaults to the configured profile)
    #[arg(long, global = true)]
    user: Option<Uuid>,

    /// Print debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a medication with its dosing schedule
    Add {
        name: String,

        /// daily, weekly, monthly, cyclical, as_needed or custom
        #[arg(long = "type", default_value = "daily")]
        schedule_type: String,

        /// Time of day (HH:MM), repeatable or comma separated
        #[arg(long = "time", value_delimiter = ',')]
        times: Vec<String>,

        /// Weekdays for weekly schedules, 0 = Sunday
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,

        #[arg(long)]
        active_days: Option<u32>,

        #[arg(long)]
        break_days: Option<u32>,

        #[arg(long)]
        cycles: Option<u32>,

        #[arg(long)]
        interval_hours: Option<u32>,

        /// First day of the schedule (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,

        /// Last day of the schedule (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value_t = 1.0)]
        dose: f64,

        #[arg(long)]
        unit: Option<String>,

        #[arg(long)]
        strength: Option<String>,

        #[arg(long)]
        doctor: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List medications
    List {
        /// Include deactivated medications
        #[arg(long)]
        all: bool,
    },

    /// Show the doses of one day across all active medications
    Today {
        /// Day to show (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Write scheduled placeholders for upcoming doses
    Plan {
        #[arg(long)]
        medication: Uuid,

        /// First day to plan (defaults to today)
        #[arg(long)]
        from: Option<String>,

        /// Number of days to plan (defaults to the configured horizon)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Record the outcome of a dose
    Log {
        #[arg(long)]
        medication: Uuid,

        /// Scheduled time of the dose (YYYY-MM-DDTHH:MM)
        #[arg(long)]
        at: String,

        /// taken, partial, skipped, missed or scheduled
        #[arg(long, default_value = "taken")]
        status: String,

        /// When the dose was actually taken (defaults to --at for taken/partial)
        #[arg(long)]
        taken_at: Option<String>,

        /// Amount actually taken
        #[arg(long)]
        dose: Option<f64>,

        /// Effectiveness from 1 to 5
        #[arg(long)]
        rating: Option<u8>,

        /// Side effect name, repeatable
        #[arg(long = "side-effect")]
        side_effects: Vec<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Reconcile logs against the schedule and report adherence
    Report {
        #[arg(long)]
        medication: Uuid,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last day (YYYY-MM-DD, defaults to --from)
        #[arg(long)]
        to: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop scheduling a medication, keeping its history
    Deactivate { id: Uuid },

    /// Delete a medication and all of its logs
    Delete { id: Uuid },

    /// List known side effects
    SideEffects {
        /// Only those that require medical attention
        #[arg(long)]
        attention: bool,
    },

    /// Export dose logs to CSV
    Export {
        #[arg(long)]
        out: PathBuf,

        /// Only this medication's logs
        #[arg(long)]
        medication: Option<Uuid>,
    },

    /// Drop superseded records from the log WAL
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dose_core::logging::init_for_cli(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let user_id = cli.user.unwrap_or(config.profile.user_id);
    let mut store = FileStore::open(&data_dir)?;
    tracing::debug!("Using data directory {:?} for user {}", data_dir, user_id);
    let now = Local::now().naive_local();

    match cli.command {
        Commands::Add {
            name,
            schedule_type,
            times,
            days,
            active_days,
            break_days,
            cycles,
            interval_hours,
            start,
            end,
            dose,
            unit,
            strength,
            doctor,
            notes,
        } => {
            let mut row = ScheduleRow::new(
                schedule_type,
                parse_date_or(start.as_deref(), now.date())?,
                dose,
            );
            row.specific_times = (!times.is_empty()).then_some(times);
            row.days_of_week = (!days.is_empty()).then_some(days);
            row.active_days = active_days;
            row.break_days = break_days;
            row.total_cycles = cycles;
            row.interval_hours = interval_hours;
            row.end_date = end.as_deref().map(parse_date).transpose()?;
            row.dosage_unit = unit;

            let schedule = ScheduleDefinition::try_from(row)?;
            let mut medication = Medication::new(user_id, name, schedule);
            medication.strength = strength;
            medication.prescribing_doctor = doctor;
            medication.notes = notes;

            let medication = add_medication(&mut store, medication)?;
            println!("✓ Added medication {}", medication.id);
            Ok(())
        }
        Commands::List { all } => cmd_list(&store, user_id, all, now),
        Commands::Today { date } => {
            let date = parse_date_or(date.as_deref(), now.date())?;
            cmd_today(&store, user_id, date, now, &config)
        }
        Commands::Plan {
            medication,
            from,
            days,
        } => {
            let from = parse_date_or(from.as_deref(), now.date())?;
            let days = days.unwrap_or(config.schedule.plan_horizon_days).max(1);
            let to = from
                .checked_add_signed(Duration::days(i64::from(days) - 1))
                .ok_or_else(|| {
                    Error::validation("days", format!("{} days from {} is out of range", days, from))
                })?;
            let created = plan_doses(&mut store, medication, from, to)?;
            println!("✓ Planned {} doses from {} to {}", created.len(), from, to);
            Ok(())
        }
        Commands::Log {
            medication,
            at,
            status,
            taken_at,
            dose,
            rating,
            side_effects,
            note,
        } => {
            let scheduled_time = parse_datetime(&at)?;
            let status: LogStatus = status.parse()?;
            let taken_time = match taken_at {
                Some(raw) => Some(parse_datetime(&raw)?),
                None if status.requires_taken_time() => Some(scheduled_time),
                None => None,
            };

            let mut outcome = DoseOutcome::new(status, taken_time);
            outcome.dosage_amount = dose;
            outcome.effectiveness_rating = rating;
            outcome.side_effects = side_effects;
            outcome.notes = note;

            let log = record_dose(&mut store, medication, scheduled_time, outcome)?;
            println!("✓ Logged {} dose at {}", log.status, fmt_time(log.scheduled_time));
            for entry in get_default_catalog().flag_log(&log) {
                println!(
                    "  ⚠ {} ({:?}) requires medical attention",
                    entry.name, entry.severity
                );
            }
            Ok(())
        }
        Commands::Report {
            medication,
            from,
            to,
            json,
        } => {
            let from = parse_date(&from)?;
            let to = to.as_deref().map(parse_date).transpose()?.unwrap_or(from);
            let report = adherence(
                &store,
                medication,
                from,
                to,
                now,
                &config.reconcile.options(),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display_report(&report);
            }
            Ok(())
        }
        Commands::Deactivate { id } => {
            let medication = store.deactivate_medication(id)?;
            println!("✓ Deactivated {}", medication.name);
            Ok(())
        }
        Commands::Delete { id } => {
            let medication = store.medication(id)?;
            let removed = store.delete_medication(id)?;
            println!("✓ Deleted {} and {} logs", medication.name, removed);
            Ok(())
        }
        Commands::SideEffects { attention } => {
            let catalog = get_default_catalog();
            let entries = if attention {
                catalog.requiring_attention()
            } else {
                catalog.list()
            };
            for entry in entries {
                let flag = if entry.requires_medical_attention { " !" } else { "" };
                println!(
                    "{:<24} {:<10} {}{}",
                    entry.name,
                    format!("{:?}", entry.severity),
                    entry.category,
                    flag
                );
            }
            Ok(())
        }
        Commands::Export { out, medication } => cmd_export(&store, user_id, medication, &out),
        Commands::Compact => {
            let dropped = store.compact()?;
            println!("✓ Compacted log WAL, dropped {} superseded records", dropped);
            Ok(())
        }
    }
}

fn cmd_list(store: &FileStore, user_id: Uuid, all: bool, now: NaiveDateTime) -> Result<()> {
    let medications = store.medications(user_id, all)?;
    if medications.is_empty() {
        println!("No medications.");
        return Ok(());
    }

    for medication in medications {
        let schedule = &medication.schedule;
        let next = if medication.is_active {
            next_due(schedule, now, 366)
                .map(fmt_time)
                .unwrap_or_else(|| "-".into())
        } else {
            "inactive".into()
        };
        println!(
            "{}  {:<20} {} {} {:<10} next: {}",
            medication.id,
            medication.name,
            schedule.dosage_amount,
            schedule.dosage_unit,
            schedule.kind.type_name(),
            next
        );
    }
    Ok(())
}

fn cmd_today(
    store: &FileStore,
    user_id: Uuid,
    date: NaiveDate,
    now: NaiveDateTime,
    config: &Config,
) -> Result<()> {
    let doses = due_doses(store, user_id, date, now, &config.reconcile.options())?;
    if doses.is_empty() {
        println!("Nothing scheduled on {}.", date);
        return Ok(());
    }

    println!("Doses for {}", date);
    for dose in doses {
        println!(
            "  {}  {:<20} {} {:<6} {}",
            dose.scheduled_time.format("%H:%M"),
            dose.medication_name,
            dose.dosage_amount,
            dose.dosage_unit,
            dose.status
        );
    }
    Ok(())
}

fn cmd_export(
    store: &FileStore,
    user_id: Uuid,
    medication: Option<Uuid>,
    out: &Path,
) -> Result<()> {
    let names: HashMap<Uuid, String> = store
        .medications(user_id, true)?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let mut logs = store.user_logs(user_id)?;
    if let Some(id) = medication {
        store.medication(id)?;
        logs.retain(|log| log.medication_id == id);
    }

    let count = export_logs_csv(&logs, &names, out)?;
    println!("✓ Exported {} logs to {}", count, out.display());
    Ok(())
}

fn display_report(report: &AdherenceReport) {
    for dose in &report.doses {
        println!("  {}  {}", fmt_time(dose.scheduled_time), dose.status);
    }
    let counts = &report.counts;
    println!();
    println!(
        "taken {}  partial {}  skipped {}  missed {}  pending {}",
        counts.taken, counts.partial, counts.skipped, counts.missed, counts.scheduled
    );
    match report.adherence_rate {
        Some(rate) => println!("Adherence: {:.1}%", rate * 100.0),
        None => println!("Adherence: n/a (nothing due yet)"),
    }
    if !report.unmatched_logs.is_empty() {
        println!("Off-schedule logs: {}", report.unmatched_logs.len());
    }
}

fn fmt_time(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation("date", format!("expected YYYY-MM-DD, got '{}'", s)))
}

fn parse_date_or(s: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    s.map(parse_date).transpose().map(|d| d.unwrap_or(default))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| {
            Error::validation("time", format!("expected YYYY-MM-DDTHH:MM, got '{}'", s))
        })
}
