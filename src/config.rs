/*
 * This file is part of lfancontrol.
 *
 * Copyright (C) 2025 lfancontrol contributors
 *
 * lfancontrol is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * lfancontrol is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with lfancontrol. If not, see <https://www.gnu.org/licenses/>.
 */

//! Settings
//!
//! Read-only JSON settings. Every field is optional; a missing file means
//! defaults. Unknown fields are rejected so typos do not pass silently.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FanControlError, Result};
use crate::escalator::{PrivilegeEscalator, ProcessElevator, DEFAULT_LAUNCHER, HELPER_BIN};
use crate::fan::{EnableValues, DEFAULT_MAX_PWM, DEFAULT_MIN_PWM};
use crate::paths::{SysfsPaths, HWMON_ROOT};
use crate::scanner::DeviceScanner;

const APP_DIR: &str = "lfancontrol";
const CONFIG_FILE: &str = "config.json";

/// Used when the running executable cannot be located.
const FALLBACK_HELPER: &str = "/usr/libexec/lfancontrol/lfan-write-helper";

/// Upper bound for PWM values accepted by the write helper.
pub const PWM_CEILING: i64 = 65535;

fn default_sensor_root() -> PathBuf {
    PathBuf::from(HWMON_ROOT)
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_sensor_root")]
    pub sensor_root: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub pwm: PwmSettings,
    #[serde(default)]
    pub elevation: ElevationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PwmSettings {
    pub min: i64,
    pub max: i64,
    pub manual_enable_value: i64,
    pub auto_enable_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElevationSettings {
    /// Empty runs the helper directly.
    pub launcher: String,
    /// `None` means `lfan-write-helper` next to the running executable.
    pub helper: Option<PathBuf>,
    pub enable_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensor_root: default_sensor_root(),
            poll_interval_ms: default_poll_interval_ms(),
            pwm: PwmSettings::default(),
            elevation: ElevationSettings::default(),
        }
    }
}

impl Default for PwmSettings {
    fn default() -> Self {
        let enable = EnableValues::default();
        Self {
            min: DEFAULT_MIN_PWM,
            max: DEFAULT_MAX_PWM,
            manual_enable_value: enable.manual,
            auto_enable_value: enable.auto,
        }
    }
}

impl Default for ElevationSettings {
    fn default() -> Self {
        Self {
            launcher: DEFAULT_LAUNCHER.to_string(),
            helper: None,
            enable_timeout_secs: 10,
            write_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn enable_values(&self) -> EnableValues {
        EnableValues {
            manual: self.pwm.manual_enable_value,
            auto: self.pwm.auto_enable_value,
        }
    }

    pub fn helper_path(&self) -> PathBuf {
        self.elevation.helper.clone().unwrap_or_else(default_helper_path)
    }

    pub fn scanner(&self) -> DeviceScanner {
        DeviceScanner::new(SysfsPaths::new(&self.sensor_root))
            .with_pwm_range(self.pwm.min, self.pwm.max)
            .with_enable_values(self.enable_values())
    }

    pub fn escalator(&self) -> PrivilegeEscalator {
        let elevator = ProcessElevator::new(Some(self.elevation.launcher.clone()), self.helper_path());
        PrivilegeEscalator::new(Arc::new(elevator)).with_timeouts(
            Duration::from_secs(self.elevation.enable_timeout_secs),
            Duration::from_secs(self.elevation.write_timeout_secs),
        )
    }
}

/// Per-user settings file, falling back to the system-wide one.
pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Path::new(&xdg).join(APP_DIR).join(CONFIG_FILE);
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Path::new(&home).join(".config").join(APP_DIR).join(CONFIG_FILE);
        }
    }
    Path::new("/etc").join(APP_DIR).join(CONFIG_FILE)
}

pub fn default_helper_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(HELPER_BIN)))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_HELPER))
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_path())
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        Err(e) => {
            return Err(FanControlError::config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };
    let settings: Settings = serde_json::from_str(&data)?;
    validate_settings(&settings)?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

pub fn validate_settings(s: &Settings) -> Result<()> {
    if s.sensor_root.as_os_str().is_empty() {
        return Err(FanControlError::invalid_config("sensor_root", "must not be empty"));
    }
    if s.poll_interval_ms == 0 {
        return Err(FanControlError::invalid_config("poll_interval_ms", "must be positive"));
    }
    if s.pwm.min < 0 || s.pwm.max > PWM_CEILING {
        return Err(FanControlError::invalid_config(
            "pwm",
            format!("bounds must lie within 0..={PWM_CEILING}"),
        ));
    }
    if s.pwm.max <= 0 || s.pwm.min > s.pwm.max {
        return Err(FanControlError::invalid_config(
            "pwm",
            format!("min ({}) must not exceed max ({}) and max must be positive", s.pwm.min, s.pwm.max),
        ));
    }
    if s.pwm.manual_enable_value == s.pwm.auto_enable_value {
        return Err(FanControlError::invalid_config(
            "pwm.auto_enable_value",
            "must differ from manual_enable_value",
        ));
    }
    if s.elevation.enable_timeout_secs == 0 || s.elevation.write_timeout_secs == 0 {
        return Err(FanControlError::invalid_config("elevation", "timeouts must be positive"));
    }
    Ok(())
}
