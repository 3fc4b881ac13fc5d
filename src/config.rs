//! Application Settings
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If `<data_dir>/settings.json` exists, deep-merge its values over the defaults
//! 3. Apply `FLOW_*` environment overrides (highest priority)
//!
//! Objects merge per key; arrays and primitives are replaced; nulls are skipped.
//! A malformed settings file does not stop the app: it is reported and the
//! defaults are used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SETTINGS_FILE: &str = "settings.json";
pub const APP_NAME: &str = "flow-manager";

/// Focus timer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusSettings {
    pub default_countdown_minutes: u32,
    pub countdown_presets: Vec<u32>,
    /// Stops shorter than this are treated as accidental and not recorded
    pub min_session_ms: i64,
    pub tick_interval_ms: u64,
    /// Attempts the shell makes at saving a session before offering discard
    pub save_retries: u32,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            default_countdown_minutes: 25,
            countdown_presets: vec![10, 25, 45, 60],
            min_session_ms: 1000,
            tick_interval_ms: 1000,
            save_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_file: String,
    /// Defaults to `<data_dir>/logs`
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub focus: FocusSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: "flow_manager.db".to_string(),
            log_dir: None,
            log_level: "info".to_string(),
            focus: FocusSettings::default(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| self.data_dir.join("logs"))
    }

    /// Parsed log level; unknown names fall back to info
    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Settings plus anything worth reporting once logging is up
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub warnings: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".flow-manager")
}

/// Load settings from the process environment
///
/// `data_dir` (the `--data-dir` flag) beats `FLOW_DATA_DIR`, which beats the default.
pub fn load_settings(data_dir: Option<PathBuf>) -> LoadedSettings {
    load_settings_with(data_dir, |name| std::env::var(name).ok())
}

/// Same as [`load_settings`] with an injectable env lookup
pub fn load_settings_with<F>(data_dir: Option<PathBuf>, env: F) -> LoadedSettings
where
    F: Fn(&str) -> Option<String>,
{
    let data_dir = data_dir
        .or_else(|| read_string(&env, "FLOW_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir);

    let mut warnings = Vec::new();
    let mut settings = match load_file(&data_dir.join(SETTINGS_FILE)) {
        Ok(settings) => settings,
        Err(e) => {
            warnings.push(e);
            Settings::default()
        }
    };

    settings.data_dir = data_dir;
    warnings.extend(apply_overrides(&mut settings, &env));
    LoadedSettings { settings, warnings }
}

/// Defaults merged with the file at `path`; a missing file yields the defaults
pub fn load_file(path: &Path) -> Result<Settings, String> {
    let defaults = serde_json::to_value(Settings::default()).map_err(|e| e.to_string())?;

    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let user: Value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid settings file {}: {}", path.display(), e))?;

    serde_json::from_value(deep_merge(defaults, user))
        .map_err(|e| format!("Invalid settings in {}: {}", path.display(), e))
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `FLOW_*` overrides; returns a warning for every value it ignored
fn apply_overrides<F>(settings: &mut Settings, env: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ignored = Vec::new();

    if let Some(level) = read_string(env, "FLOW_LOG_LEVEL") {
        if level.parse::<log::LevelFilter>().is_ok() {
            settings.log_level = level;
        } else {
            ignored.push(format!("Ignoring FLOW_LOG_LEVEL={}", level));
        }
    }

    if let Some(raw) = read_string(env, "FLOW_COUNTDOWN_MINUTES") {
        match parse_range(&raw, 1, 24 * 60) {
            Some(minutes) => settings.focus.default_countdown_minutes = minutes as u32,
            None => ignored.push(format!("Ignoring FLOW_COUNTDOWN_MINUTES={}", raw)),
        }
    }

    if let Some(raw) = read_string(env, "FLOW_MIN_SESSION_MS") {
        match parse_range(&raw, 0, 3_600_000) {
            Some(ms) => settings.focus.min_session_ms = ms as i64,
            None => ignored.push(format!("Ignoring FLOW_MIN_SESSION_MS={}", raw)),
        }
    }

    ignored
}

fn read_string<F>(env: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an integer within an inclusive range
pub fn parse_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
