use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::logging;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ENV_PREFIX: &str = "LIELOG_";

/// Options consumed by [`logging::setup`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Append log lines to this file. Relative to `log_dir` when both are set.
    pub log_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    /// Lower the default level from INFO to DEBUG.
    pub debug: bool,
    /// Also write to stderr when a log file is configured.
    pub use_stderr: bool,
    /// `target=LEVEL` overrides, later entries win.
    pub default_log_levels: Vec<String>,
    pub log_date_format: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            log_file: None,
            log_dir: None,
            debug: false,
            use_stderr: false,
            default_log_levels: logging::get_default_log_levels(),
            log_date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl LogOptions {
    pub fn log_path(&self) -> Option<PathBuf> {
        match (&self.log_dir, &self.log_file) {
            (Some(dir), Some(file)) => Some(dir.join(file)),
            (None, Some(file)) => Some(file.clone()),
            (Some(dir), None) => {
                tracing::warn!("log_dir {:?} set without log_file, ignored", dir);
                None
            }
            (None, None) => None,
        }
    }

    /// Add `target=LEVEL` overrides, replacing any existing entry for the same
    /// target. Adding the same overrides twice leaves the list unchanged.
    pub fn extend_default_log_levels<I, S>(&mut self, levels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for level in levels {
            let level = level.into();
            let target = level_target(&level).to_string();

            match self
                .default_log_levels
                .iter_mut()
                .find(|existing| level_target(existing) == target)
            {
                Some(existing) => *existing = level,
                None => self.default_log_levels.push(level),
            }
        }
    }
}

fn level_target(entry: &str) -> &str {
    entry.split_once('=').map(|(t, _)| t).unwrap_or(entry).trim()
}

/// Process configuration, passed explicitly to whoever needs it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    log: Option<LogOptions>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the log options with their defaults. Registering again is a
    /// no-op and hands back the options already in place.
    pub fn register_log_options(&mut self) -> &mut LogOptions {
        self.log.get_or_insert_with(LogOptions::default)
    }

    pub fn log_options(&self) -> Option<&LogOptions> {
        self.log.as_ref()
    }

    /// Read `.env` if present, then `LIELOG_*` variables from the environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::new();
        config.apply_vars(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load a JSON document such as `{"log": {"log_file": "app.log"}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        let config = serde_json::from_slice(&content)?;
        Ok(config)
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let options = self.register_log_options();

        if let Some(file) = var("LOG_FILE") {
            options.log_file = Some(PathBuf::from(file));
        }
        if let Some(dir) = var("LOG_DIR") {
            options.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(debug) = var("DEBUG") {
            options.debug = parse_bool("DEBUG", &debug)?;
        }
        if let Some(use_stderr) = var("USE_STDERR") {
            options.use_stderr = parse_bool("USE_STDERR", &use_stderr)?;
        }
        if let Some(levels) = var("DEFAULT_LOG_LEVELS") {
            options.default_log_levels = levels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(format) = var("LOG_DATE_FORMAT") {
            options.log_date_format = format;
        }

        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Message(format!(
            "{}{}: expect a boolean, got {:?}",
            ENV_PREFIX, name, value
        ))),
    }
}
