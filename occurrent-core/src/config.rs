//! User configuration.

use std::path::{Path, PathBuf};

use chrono::Weekday;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::date_range::WeekConfig;
use crate::error::{OccurrentError, OccurrentResult};

static DEFAULT_CALENDAR_FILE: &str = "~/calendar/occurrent.toml";
const DEFAULT_DAYS: u64 = 14;

fn default_calendar_file() -> PathBuf {
    PathBuf::from(DEFAULT_CALENDAR_FILE)
}

fn default_days() -> u64 {
    DEFAULT_DAYS
}

fn default_true() -> bool {
    true
}

fn default_first_day_of_week() -> Weekday {
    WeekConfig::default().first_day_of_week
}

fn default_first_day_of_weekend() -> Weekday {
    WeekConfig::default().first_day_of_weekend
}

fn default_last_day_of_weekend() -> Weekday {
    WeekConfig::default().last_day_of_weekend
}

/// Configuration at ~/.config/occurrent/config.toml, overridable with
/// `OCCURRENT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrentConfig {
    /// TOML file holding rules, generators and exceptions.
    #[serde(default = "default_calendar_file")]
    pub calendar_file: PathBuf,

    /// Window length when no end date is given.
    #[serde(default = "default_days")]
    pub default_days: u64,

    #[serde(default = "default_true")]
    pub hide_hidden: bool,

    #[serde(default = "default_first_day_of_week")]
    pub first_day_of_week: Weekday,

    #[serde(default = "default_first_day_of_weekend")]
    pub first_day_of_weekend: Weekday,

    #[serde(default = "default_last_day_of_weekend")]
    pub last_day_of_weekend: Weekday,
}

impl Default for OccurrentConfig {
    fn default() -> Self {
        let week = WeekConfig::default();
        OccurrentConfig {
            calendar_file: default_calendar_file(),
            default_days: DEFAULT_DAYS,
            hide_hidden: true,
            first_day_of_week: week.first_day_of_week,
            first_day_of_weekend: week.first_day_of_weekend,
            last_day_of_weekend: week.last_day_of_weekend,
        }
    }
}

impl OccurrentConfig {
    pub fn config_path() -> OccurrentResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| OccurrentError::Config("Could not determine config directory".into()))?
            .join("occurrent");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's config, writing a commented default file first if
    /// there is none.
    pub fn load() -> OccurrentResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(Environment::with_prefix("OCCURRENT"))
            .build()
            .map_err(|e| OccurrentError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| OccurrentError::Config(e.to_string()))
    }

    /// Load from a specific file, without environment overrides.
    pub fn load_from(path: &Path) -> OccurrentResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .build()
            .map_err(|e| OccurrentError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| OccurrentError::Config(e.to_string()))
    }

    /// The calendar file with `~` expanded.
    pub fn calendar_file_path(&self) -> PathBuf {
        let full_path_str =
            shellexpand::tilde(&self.calendar_file.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn week(&self) -> WeekConfig {
        WeekConfig {
            first_day_of_week: self.first_day_of_week,
            first_day_of_weekend: self.first_day_of_weekend,
            last_day_of_weekend: self.last_day_of_weekend,
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> OccurrentResult<()> {
        let contents = format!(
            "\
# occurrent configuration

# Where rules, generators and exceptions are defined:
# calendar_file = \"{}\"

# How many days `occurrent between` covers when --to is omitted:
# default_days = {}

# Leave out occurrences marked hidden_from_lists:
# hide_hidden = true

# Week boundaries used by --week-of and --weekend-of:
# first_day_of_week = \"Mon\"
# first_day_of_weekend = \"Sat\"
# last_day_of_weekend = \"Sun\"
",
            DEFAULT_CALENDAR_FILE, DEFAULT_DAYS
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OccurrentError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| OccurrentError::Config(format!("Could not write config file: {e}")))?;

        tracing::debug!(path = %path.display(), "Wrote default config");
        Ok(())
    }
}
