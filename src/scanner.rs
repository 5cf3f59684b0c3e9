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

//! Fan discovery under the hwmon sensor root.
//!
//! The scan is a snapshot: optional `pwm<K>` / `pwm<K>_enable` files are
//! attached only if they exist while scanning. Nothing here fails the scan;
//! an awkward chip or attribute costs at most that chip or that capability.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::fan::{EnableValues, FanDevice, FanDeviceBuilder, DEFAULT_MAX_PWM, DEFAULT_MIN_PWM};
use crate::paths::SysfsPaths;
use crate::sysfs::{SysfsFs, SysfsIo};

/// Walks a sensor root and builds one [`FanDevice`] per `fan<K>_input`.
#[derive(Clone)]
pub struct DeviceScanner {
    paths: SysfsPaths,
    min_pwm: i64,
    max_pwm: i64,
    enable_values: EnableValues,
    io: Arc<dyn SysfsIo>,
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new(SysfsPaths::default())
    }
}

impl DeviceScanner {
    pub fn new(paths: SysfsPaths) -> Self {
        Self {
            paths,
            min_pwm: DEFAULT_MIN_PWM,
            max_pwm: DEFAULT_MAX_PWM,
            enable_values: EnableValues::default(),
            io: Arc::new(SysfsFs),
        }
    }

    /// PWM bounds given to every device. Callers validate `min <= max`.
    pub fn with_pwm_range(mut self, min_pwm: i64, max_pwm: i64) -> Self {
        self.min_pwm = min_pwm;
        self.max_pwm = max_pwm;
        self
    }

    pub fn with_enable_values(mut self, values: EnableValues) -> Self {
        self.enable_values = values;
        self
    }

    /// Attribute access used for listing, probing and by every built device.
    pub fn with_io(mut self, io: Arc<dyn SysfsIo>) -> Self {
        self.io = io;
        self
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Enumerate fans, chips in lexical order, fans in lexical order per chip.
    pub fn scan(&self) -> Vec<FanDevice> {
        let root = self.paths.root();
        let mut fans = Vec::new();

        let entries = match fs::read_dir(root) {
            Ok(it) => it,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "sensor root absent, no fans");
                return fans;
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot list sensor root");
                return fans;
            }
        };

        let mut chip_dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|ent| SysfsPaths::is_chip_dir_name(&ent.file_name().to_string_lossy()))
            .map(|ent| ent.path())
            .filter(|p| p.is_dir())
            .collect();
        chip_dirs.sort();

        for dir in &chip_dirs {
            let chip = self.read_chip_name(dir);
            let found = self.scan_chip(dir, &chip);
            debug!(chip = %chip, dir = %dir.display(), fans = found.len(), "scanned chip");
            fans.extend(found);
        }

        info!(chips = chip_dirs.len(), fans = fans.len(), "fan scan complete");
        fans
    }

    /// Chip name from `name`, falling back to the directory name.
    fn read_chip_name(&self, dir: &Path) -> String {
        let fallback = || {
            dir.file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "hwmon?".into())
        };
        match self.io.read(&SysfsPaths::chip_name_file(dir)) {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => fallback(),
            Err(e) => {
                trace!(dir = %dir.display(), error = %e, "no chip name");
                fallback()
            }
        }
    }

    fn scan_chip(&self, dir: &Path, chip: &str) -> Vec<FanDevice> {
        let names = match self.io.list(dir) {
            Ok(names) => names,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable chip directory");
                return Vec::new();
            }
        };

        let mut inputs: Vec<(String, usize)> = names
            .into_iter()
            .filter_map(|fname| SysfsPaths::fan_input_index(&fname).map(|idx| (fname, idx)))
            .collect();
        inputs.sort_by_cached_key(|(fname, idx)| (idx.to_string(), fname.clone()));

        let mut fans = Vec::with_capacity(inputs.len());
        for (fname, idx) in inputs {
            let pwm = SysfsPaths::pwm(dir, idx);
            let enable = SysfsPaths::pwm_enable(dir, idx);

            let built = FanDeviceBuilder::new(chip, idx, dir.join(&fname))
                .pwm(self.probe(&pwm).then_some(pwm))
                .pwm_enable(self.probe(&enable).then_some(enable))
                .pwm_range(self.min_pwm, self.max_pwm)
                .enable_values(self.enable_values)
                .build_with_io(Arc::clone(&self.io));

            match built {
                Ok(fan) => {
                    trace!(
                        fan = %fan.id(),
                        pwm = fan.has_pwm(),
                        enable = fan.supports_mode_switch(),
                        "found fan"
                    );
                    fans.push(fan);
                }
                Err(e) => warn!(chip, idx, error = %e, "skipping fan"),
            }
        }
        fans
    }

    /// Whether an optional attribute is present.
    ///
    /// A permission failure means the file is there behind a barrier the
    /// escalation path can cross, so it counts as present.
    fn probe(&self, path: &Path) -> bool {
        match self.io.probe(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %path.display(), "attribute not stat-able, assuming present");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "attribute probe failed, treating as absent");
                false
            }
        }
    }
}
