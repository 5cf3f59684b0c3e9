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

//! Per-fan control
//!
//! A [`FanDevice`] owns the resolved attribute paths of one fan and performs
//! every read and write against live sysfs state.
//!
//! # Failure policy
//!
//! Reads degrade to `None` when a file vanished or holds garbage, since
//! hwmon drivers can come and go underneath us. A permission failure is never
//! folded into `None`: writes rejected that way are what the escalation path
//! exists for, and the caller needs to see them.
//!
//! # PWM enable modes
//!
//! - 1 = manual (software control)
//! - 2 = automatic (firmware/driver thermal control)
//!
//! Both values are configurable through [`EnableValues`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{FanControlError, Result};
use crate::sysfs::{SysfsFs, SysfsIo};

pub const DEFAULT_MIN_PWM: i64 = 0;
pub const DEFAULT_MAX_PWM: i64 = 255;

/// Values written to `pwm<K>_enable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableValues {
    pub manual: i64,
    pub auto: i64,
}

impl Default for EnableValues {
    fn default() -> Self {
        Self { manual: 1, auto: 2 }
    }
}

/// Logical control mode of a fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Auto,
    Manual,
    /// No enable file; the mode cannot be switched.
    Unsupported,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => write!(f, "auto"),
            Mode::Manual => write!(f, "manual"),
            Mode::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// One fan discovered under the sensor root.
#[derive(Clone)]
pub struct FanDevice {
    id: String,
    label: String,
    chip: String,
    index: usize,
    rpm_path: PathBuf,
    pwm_path: Option<PathBuf>,
    pwm_enable_path: Option<PathBuf>,
    min_pwm: i64,
    max_pwm: i64,
    enable_values: EnableValues,
    io: Arc<dyn SysfsIo>,
}

impl fmt::Debug for FanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanDevice")
            .field("id", &self.id)
            .field("rpm_path", &self.rpm_path)
            .field("pwm_path", &self.pwm_path)
            .field("pwm_enable_path", &self.pwm_enable_path)
            .field("min_pwm", &self.min_pwm)
            .field("max_pwm", &self.max_pwm)
            .finish_non_exhaustive()
    }
}

/// Builder used by the scanner and by tests.
#[derive(Debug, Clone)]
pub struct FanDeviceBuilder {
    chip: String,
    index: usize,
    rpm_path: PathBuf,
    pwm_path: Option<PathBuf>,
    pwm_enable_path: Option<PathBuf>,
    min_pwm: i64,
    max_pwm: i64,
    enable_values: EnableValues,
}

impl FanDeviceBuilder {
    pub fn new(chip: impl Into<String>, index: usize, rpm_path: impl Into<PathBuf>) -> Self {
        Self {
            chip: chip.into(),
            index,
            rpm_path: rpm_path.into(),
            pwm_path: None,
            pwm_enable_path: None,
            min_pwm: DEFAULT_MIN_PWM,
            max_pwm: DEFAULT_MAX_PWM,
            enable_values: EnableValues::default(),
        }
    }

    pub fn pwm(mut self, path: Option<PathBuf>) -> Self {
        self.pwm_path = path;
        self
    }

    pub fn pwm_enable(mut self, path: Option<PathBuf>) -> Self {
        self.pwm_enable_path = path;
        self
    }

    pub fn pwm_range(mut self, min_pwm: i64, max_pwm: i64) -> Self {
        self.min_pwm = min_pwm;
        self.max_pwm = max_pwm;
        self
    }

    pub fn enable_values(mut self, values: EnableValues) -> Self {
        self.enable_values = values;
        self
    }

    pub fn build(self) -> Result<FanDevice> {
        self.build_with_io(Arc::new(SysfsFs))
    }

    pub fn build_with_io(self, io: Arc<dyn SysfsIo>) -> Result<FanDevice> {
        if self.min_pwm > self.max_pwm {
            return Err(FanControlError::invalid_config(
                "pwm",
                format!("min_pwm {} exceeds max_pwm {}", self.min_pwm, self.max_pwm),
            ));
        }

        // Mode switching only means something next to a PWM file.
        let pwm_enable_path = match (&self.pwm_path, self.pwm_enable_path) {
            (Some(_), enable) => enable,
            (None, Some(enable)) => {
                debug!(path = %enable.display(), "ignoring enable file of fan without pwm");
                None
            }
            (None, None) => None,
        };

        Ok(FanDevice {
            id: format!("{}_fan{}", self.chip, self.index),
            label: format!("{} - Fan {}", self.chip, self.index),
            chip: self.chip,
            index: self.index,
            rpm_path: self.rpm_path,
            pwm_path: self.pwm_path,
            pwm_enable_path,
            min_pwm: self.min_pwm,
            max_pwm: self.max_pwm,
            enable_values: self.enable_values,
            io,
        })
    }
}

impl FanDevice {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rpm_path(&self) -> &Path {
        &self.rpm_path
    }

    pub fn pwm_path(&self) -> Option<&Path> {
        self.pwm_path.as_deref()
    }

    pub fn pwm_enable_path(&self) -> Option<&Path> {
        self.pwm_enable_path.as_deref()
    }

    pub fn min_pwm(&self) -> i64 {
        self.min_pwm
    }

    pub fn max_pwm(&self) -> i64 {
        self.max_pwm
    }

    pub fn enable_values(&self) -> EnableValues {
        self.enable_values
    }

    pub fn has_pwm(&self) -> bool {
        self.pwm_path.is_some()
    }

    pub fn supports_mode_switch(&self) -> bool {
        self.pwm_enable_path.is_some()
    }

    /// Clamp a requested duty cycle into `[min_pwm, max_pwm]`.
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min_pwm, self.max_pwm)
    }

    /// Current fan speed in RPM, `None` when no reading is available.
    pub fn read_rpm(&self) -> Result<Option<i64>> {
        self.read_int(&self.rpm_path)
    }

    /// Current duty cycle, `None` without PWM capability or reading.
    pub fn read_pwm(&self) -> Result<Option<i64>> {
        match &self.pwm_path {
            Some(p) => self.read_int(p),
            None => Ok(None),
        }
    }

    /// Mode as reported by the enable file.
    pub fn mode(&self) -> Result<Mode> {
        let Some(enable) = &self.pwm_enable_path else {
            return Ok(Mode::Unsupported);
        };
        match self.read_int(enable)? {
            Some(v) if v == self.enable_values.manual => Ok(Mode::Manual),
            _ => Ok(Mode::Auto),
        }
    }

    /// Switch to manual control. No-op without an enable file or when the
    /// fan is already manual.
    ///
    /// Only a permission failure is reported; other I/O failures are logged
    /// and the call succeeds.
    pub fn set_manual_mode(&self) -> Result<()> {
        let Some(enable) = &self.pwm_enable_path else {
            return Ok(());
        };
        match self.ensure_manual(enable) {
            Err(e) if !e.is_permission_denied() => {
                warn!(fan = %self.id, error = %e, "could not switch to manual mode");
                Ok(())
            }
            other => other,
        }
    }

    /// Hand control back to the firmware. No-op without an enable file.
    pub fn set_auto_mode(&self) -> Result<()> {
        let Some(enable) = &self.pwm_enable_path else {
            return Ok(());
        };
        self.write_int(enable, self.enable_values.auto)?;
        info!(fan = %self.id, "switched to automatic mode");
        Ok(())
    }

    /// Write a duty cycle, returning the clamped value that was written.
    ///
    /// # Arguments
    /// * `value` - requested duty cycle, clamped into `[min_pwm, max_pwm]`
    ///
    /// Manual mode is forced first on a best-effort basis; whatever happens
    /// there, the PWM write is still attempted.
    pub fn set_pwm(&self, value: i64) -> Result<i64> {
        let Some(pwm) = &self.pwm_path else {
            return Err(FanControlError::unsupported(format!(
                "fan {} has no PWM control",
                self.id
            )));
        };

        let clamped = self.clamp(value);
        if clamped != value {
            debug!(fan = %self.id, requested = value, clamped, "pwm value clamped");
        }

        if let Some(enable) = &self.pwm_enable_path {
            if let Err(e) = self.ensure_manual(enable) {
                warn!(fan = %self.id, error = %e, "manual mode not forced, writing pwm anyway");
            }
        }

        self.write_int(pwm, clamped)?;
        info!(fan = %self.id, pwm = clamped, "pwm written");
        Ok(clamped)
    }

    fn ensure_manual(&self, enable: &Path) -> Result<()> {
        let manual = self.enable_values.manual;
        if self.read_int(enable)? == Some(manual) {
            trace!(fan = %self.id, "already in manual mode");
            return Ok(());
        }
        self.write_int(enable, manual)?;
        info!(fan = %self.id, "switched to manual mode");
        Ok(())
    }

    fn read_int(&self, path: &Path) -> Result<Option<i64>> {
        let raw = match self.io.read(path) {
            Ok(raw) => raw,
            Err(e) => {
                return match FanControlError::from_io(path, e) {
                    e @ FanControlError::PermissionDenied(_) => Err(e),
                    e => {
                        trace!(error = %e, "no reading");
                        Ok(None)
                    }
                };
            }
        };
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(value.parse::<i64>().ok())
    }

    fn write_int(&self, path: &Path, value: i64) -> Result<()> {
        self.io
            .write(path, &format!("{value}\n"))
            .map_err(|e| FanControlError::from_io(path, e))
    }
}
