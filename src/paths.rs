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

//! Path conventions of the hwmon sensor tree.
//!
//! ```text
//! <root>/hwmon<N>/name            chip name (optional)
//! <root>/hwmon<N>/fan<K>_input    fan speed in RPM
//! <root>/hwmon<N>/pwm<K>          duty cycle
//! <root>/hwmon<N>/pwm<K>_enable   control mode (1 = manual, 2 = automatic)
//! ```

use std::path::{Path, PathBuf};

/// Default sensor root on Linux.
pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Prefix every chip directory name carries.
pub const CHIP_DIR_PREFIX: &str = "hwmon";

/// Chip name attribute inside a chip directory.
pub const CHIP_NAME_FILE: &str = "name";

pub const FAN_PREFIX: &str = "fan";
pub const FAN_INPUT_SUFFIX: &str = "_input";
pub const PWM_PREFIX: &str = "pwm";
pub const PWM_ENABLE_SUFFIX: &str = "_enable";

/// Path builder for one sensor root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPaths {
    root: PathBuf,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self::new(HWMON_ROOT)
    }
}

impl SysfsPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `true` for directory names following the `hwmon<N>` convention.
    pub fn is_chip_dir_name(name: &str) -> bool {
        name.starts_with(CHIP_DIR_PREFIX)
    }

    pub fn chip_name_file(chip_dir: &Path) -> PathBuf {
        chip_dir.join(CHIP_NAME_FILE)
    }

    pub fn fan_input(chip_dir: &Path, index: usize) -> PathBuf {
        chip_dir.join(format!("{FAN_PREFIX}{index}{FAN_INPUT_SUFFIX}"))
    }

    pub fn pwm(chip_dir: &Path, index: usize) -> PathBuf {
        chip_dir.join(format!("{PWM_PREFIX}{index}"))
    }

    pub fn pwm_enable(chip_dir: &Path, index: usize) -> PathBuf {
        chip_dir.join(format!("{PWM_PREFIX}{index}{PWM_ENABLE_SUFFIX}"))
    }

    /// Fan index of a `fan<K>_input` file name.
    pub fn fan_input_index(fname: &str) -> Option<usize> {
        extract_index(fname, FAN_PREFIX, FAN_INPUT_SUFFIX)
    }
}

/// Parse the decimal index sitting between `prefix` and `suffix`.
pub fn extract_index(fname: &str, prefix: &str, suffix: &str) -> Option<usize> {
    let mid = fname.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if mid.is_empty() || !mid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    mid.parse().ok()
}
