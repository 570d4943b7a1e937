//! Storage collaborator for medications and dose logs.
//!
//! [`FileStore`] keeps medications in a JSON state file that is replaced
//! atomically on every save, and dose logs in an append-only JSON Lines
//! write-ahead log. A log update appends a new version of the record; readers
//! keep the last version per id. Both files are guarded with advisory locks so
//! several processes can share a data directory.

use crate::{Error, Medication, MedicationLog, Result};
use chrono::{NaiveDateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Persistence boundary used by the tracker
pub trait MedicationStore {
    /// Insert or replace a medication after validating it
    fn save_medication(&mut self, medication: &Medication) -> Result<()>;

    fn medication(&self, id: Uuid) -> Result<Medication>;

    /// A user's medications ordered by name
    fn medications(&self, user_id: Uuid, include_inactive: bool) -> Result<Vec<Medication>>;

    /// Soft delete: keep the record and its logs, stop scheduling it
    fn deactivate_medication(&mut self, id: Uuid) -> Result<Medication>;

    /// Hard delete cascading to the medication's logs; returns removed log count
    fn delete_medication(&mut self, id: Uuid) -> Result<usize>;

    /// Remove every medication and log owned by `user_id`; returns removed medication count
    fn delete_user(&mut self, user_id: Uuid) -> Result<usize>;

    /// Insert or update a log after validating it against its medication
    fn append_log(&mut self, log: &MedicationLog) -> Result<()>;

    fn log(&self, id: Uuid) -> Result<MedicationLog>;

    /// Logs of one medication with `from <= scheduled_time <= to`, oldest first
    fn logs(
        &self,
        medication_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<MedicationLog>>;

    /// Every log owned by `user_id`, oldest first
    fn user_logs(&self, user_id: Uuid) -> Result<Vec<MedicationLog>>;
}

/// On-disk shape of the medication state file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    medications: Vec<Medication>,
}

/// Advisory lock on a sidecar file, released on drop
///
/// The data files themselves are replaced by rename, so locking them would
/// guard whichever inode happened to be at the path. The sidecar never moves.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn open(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(file)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release store lock: {}", e);
        }
    }
}

/// File-backed store rooted at a data directory
///
/// Lock order is medications before logs. Every read-modify-write cycle holds
/// its exclusive lock from the first read until the rename, so concurrent
/// processes never overwrite each other's records.
pub struct FileStore {
    medications_path: PathBuf,
    medications_lock: PathBuf,
    wal_path: PathBuf,
    wal_lock: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store under `data_dir`
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let wal_dir = data_dir.join("wal");
        std::fs::create_dir_all(&wal_dir)?;

        tracing::debug!("Opened store at {:?}", data_dir);
        Ok(Self {
            medications_path: data_dir.join("medications.json"),
            medications_lock: data_dir.join("medications.lock"),
            wal_path: wal_dir.join("medication_logs.wal"),
            wal_lock: wal_dir.join("medication_logs.lock"),
        })
    }

    pub fn medications_path(&self) -> &Path {
        &self.medications_path
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Rewrite the log WAL keeping only the latest version of each log
    ///
    /// Returns the number of superseded records dropped.
    pub fn compact(&self) -> Result<usize> {
        let _wal = LockGuard::exclusive(&self.wal_lock)?;
        let (logs, records) = self.read_logs()?;
        self.rewrite_logs(&logs)?;
        let dropped = records - logs.len();
        tracing::info!("Compacted log WAL: kept {}, dropped {}", logs.len(), dropped);
        Ok(dropped)
    }

    /// Read the state file; callers hold the medications lock
    fn load_state(&self) -> Result<StoreState> {
        if !self.medications_path.exists() {
            return Ok(StoreState::default());
        }

        let mut contents = String::new();
        BufReader::new(File::open(&self.medications_path)?).read_to_string(&mut contents)?;

        // Unlike the WAL, a damaged state file is an error: saving over it
        // would drop every medication.
        let state = serde_json::from_str(&contents)?;
        Ok(state)
    }

    /// Replace the state file atomically; callers hold the medications lock exclusively
    fn save_state(&self, state: &StoreState) -> Result<()> {
        let parent = self.medications_path.parent().ok_or_else(|| {
            Error::Other(format!("{:?} has no parent directory", self.medications_path))
        })?;
        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, state)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.medications_path)
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} medications", state.medications.len());
        Ok(())
    }

    fn read_state(&self) -> Result<StoreState> {
        let _meds = LockGuard::shared(&self.medications_lock)?;
        self.load_state()
    }

    /// Latest version of every log plus the raw record count
    ///
    /// Callers hold the WAL lock.
    fn read_logs(&self) -> Result<(Vec<MedicationLog>, usize)> {
        if !self.wal_path.exists() {
            return Ok((Vec::new(), 0));
        }

        let file = File::open(&self.wal_path)?;
        let mut latest: HashMap<Uuid, MedicationLog> = HashMap::new();
        let mut records = 0;
        for (line_num, line) in BufReader::new(&file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<MedicationLog>(&line) {
                Ok(log) => {
                    records += 1;
                    latest.insert(log.id, log);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable log at line {}: {}", line_num + 1, e);
                }
            }
        }

        let mut logs: Vec<_> = latest.into_values().collect();
        logs.sort_by_key(|log| (log.scheduled_time, log.created_at));
        tracing::debug!("Read {} logs ({} records) from WAL", logs.len(), records);
        Ok((logs, records))
    }

    fn shared_logs(&self) -> Result<Vec<MedicationLog>> {
        let _wal = LockGuard::shared(&self.wal_lock)?;
        Ok(self.read_logs()?.0)
    }

    /// Replace the WAL atomically; callers hold the WAL lock exclusively
    fn rewrite_logs(&self, logs: &[MedicationLog]) -> Result<()> {
        let parent = self.wal_path.parent().ok_or_else(|| {
            Error::Other(format!("{:?} has no parent directory", self.wal_path))
        })?;
        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for log in logs {
                serde_json::to_writer(&mut writer, log)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.wal_path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Drop logs failing `keep`, holding the WAL lock for the whole rewrite
    fn retain_logs(&self, keep: impl Fn(&MedicationLog) -> bool) -> Result<usize> {
        let _wal = LockGuard::exclusive(&self.wal_lock)?;
        let (logs, _) = self.read_logs()?;
        let before = logs.len();
        let kept: Vec<_> = logs.into_iter().filter(|log| keep(log)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite_logs(&kept)?;
        }
        Ok(removed)
    }
}

impl MedicationStore for FileStore {
    fn save_medication(&mut self, medication: &Medication) -> Result<()> {
        medication.validate()?;

        let _meds = LockGuard::exclusive(&self.medications_lock)?;
        let mut state = self.load_state()?;
        match state.medications.iter_mut().find(|m| m.id == medication.id) {
            Some(existing) => *existing = medication.clone(),
            None => state.medications.push(medication.clone()),
        }
        self.save_state(&state)?;

        tracing::debug!("Saved medication {} ({})", medication.id, medication.name);
        Ok(())
    }

    fn medication(&self, id: Uuid) -> Result<Medication> {
        self.read_state()?
            .medications
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::not_found("medication", id))
    }

    fn medications(&self, user_id: Uuid, include_inactive: bool) -> Result<Vec<Medication>> {
        let mut meds: Vec<_> = self
            .read_state()?
            .medications
            .into_iter()
            .filter(|m| m.user_id == user_id && (include_inactive || m.is_active))
            .collect();
        meds.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(meds)
    }

    fn deactivate_medication(&mut self, id: Uuid) -> Result<Medication> {
        let _meds = LockGuard::exclusive(&self.medications_lock)?;
        let mut state = self.load_state()?;
        let medication = state
            .medications
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::not_found("medication", id))?;

        medication.is_active = false;
        medication.updated_at = Utc::now();
        let deactivated = medication.clone();
        self.save_state(&state)?;

        tracing::info!("Deactivated medication {}", id);
        Ok(deactivated)
    }

    fn delete_medication(&mut self, id: Uuid) -> Result<usize> {
        let _meds = LockGuard::exclusive(&self.medications_lock)?;
        let mut state = self.load_state()?;
        let before = state.medications.len();
        state.medications.retain(|m| m.id != id);
        if state.medications.len() == before {
            return Err(Error::not_found("medication", id));
        }

        let removed = self.retain_logs(|log| log.medication_id != id)?;
        self.save_state(&state)?;

        tracing::info!("Deleted medication {} and {} logs", id, removed);
        Ok(removed)
    }

    fn delete_user(&mut self, user_id: Uuid) -> Result<usize> {
        let _meds = LockGuard::exclusive(&self.medications_lock)?;
        let mut state = self.load_state()?;
        let before = state.medications.len();
        state.medications.retain(|m| m.user_id != user_id);
        let removed_meds = before - state.medications.len();

        let removed_logs = self.retain_logs(|log| log.user_id != user_id)?;
        self.save_state(&state)?;

        tracing::info!(
            "Deleted user {}: {} medications, {} logs",
            user_id,
            removed_meds,
            removed_logs
        );
        Ok(removed_meds)
    }

    fn append_log(&mut self, log: &MedicationLog) -> Result<()> {
        log.validate()?;

        // Shared medications lock keeps the owner from being deleted mid-append
        let _meds = LockGuard::shared(&self.medications_lock)?;
        let medication = self
            .load_state()?
            .medications
            .into_iter()
            .find(|m| m.id == log.medication_id)
            .ok_or_else(|| Error::not_found("medication", log.medication_id))?;
        if medication.user_id != log.user_id {
            return Err(Error::validation(
                "user_id",
                format!(
                    "log owner {} does not own medication {}",
                    log.user_id, medication.id
                ),
            ));
        }

        let _wal = LockGuard::exclusive(&self.wal_lock)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.wal_path)?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(log)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::debug!("Appended log {} ({}) to WAL", log.id, log.status);
        Ok(())
    }

    fn log(&self, id: Uuid) -> Result<MedicationLog> {
        self.shared_logs()?
            .into_iter()
            .find(|log| log.id == id)
            .ok_or_else(|| Error::not_found("log", id))
    }

    fn logs(
        &self,
        medication_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<MedicationLog>> {
        Ok(self
            .shared_logs()?
            .into_iter()
            .filter(|log| {
                log.medication_id == medication_id
                    && log.scheduled_time >= from
                    && log.scheduled_time <= to
            })
            .collect())
    }

    fn user_logs(&self, user_id: Uuid) -> Result<Vec<MedicationLog>> {
        Ok(self
            .shared_logs()?
            .into_iter()
            .filter(|log| log.user_id == user_id)
            .collect())
    }
}
