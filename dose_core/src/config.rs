//! Configuration file support for dosetrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosetrack/config.toml`.

use crate::reconcile::ReconcileOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Owner of records created from this machine
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    /// Nil means the single local profile
    #[serde(default)]
    pub user_id: Uuid,
}

/// Log matching parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub tolerance_minutes: i64,

    #[serde(default = "default_partial_weight")]
    pub partial_weight: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 0,
            partial_weight: default_partial_weight(),
        }
    }
}

impl ReconcileConfig {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            tolerance: chrono::Duration::minutes(self.tolerance_minutes),
            partial_weight: self.partial_weight,
        }
    }
}

/// Planning configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_plan_horizon_days")]
    pub plan_horizon_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            plan_horizon_days: default_plan_horizon_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("dosetrack")
}

fn default_partial_weight() -> f64 {
    0.5
}

fn default_plan_horizon_days() -> u32 {
    7
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("dosetrack").join("config.toml")
    }

    /// Reject values the reconciler and planner cannot use
    pub fn validate(&self) -> Result<()> {
        if self.reconcile.tolerance_minutes < 0 {
            return Err(Error::Config(format!(
                "reconcile.tolerance_minutes must not be negative, got {}",
                self.reconcile.tolerance_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.reconcile.partial_weight) {
            return Err(Error::Config(format!(
                "reconcile.partial_weight must be within [0, 1], got {}",
                self.reconcile.partial_weight
            )));
        }
        if self.schedule.plan_horizon_days == 0 {
            return Err(Error::Config(
                "schedule.plan_horizon_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
