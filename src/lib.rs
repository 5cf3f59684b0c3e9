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

//! lfancontrol - fan control for Linux using hwmon
//!
//! This library discovers fans exposed under the hwmon sysfs tree, reads
//! their speed and duty cycle, switches them between firmware and manual
//! control and writes duty cycles. Writes the current process may not
//! perform are re-issued through an elevated helper process.

pub mod config;
pub mod control;
pub mod error;
pub mod escalator;
pub mod fan;
pub mod level;
pub mod logger;
pub mod paths;
pub mod poller;
pub mod scanner;
pub mod sysfs;

#[cfg(test)]
pub mod test_utils;

pub use config::Settings;
pub use control::{ControlState, ControlStateMachine, IgnoreReason, OperationGate, Outcome, Request};
pub use error::{FanControlError, Result};
pub use escalator::{Confirmation, Elevator, HelperOutput, PrivilegeEscalator, ProcessElevator};
pub use fan::{EnableValues, FanDevice, FanDeviceBuilder, Mode};
pub use paths::SysfsPaths;
pub use poller::{FanSnapshot, RpmPoller};
pub use scanner::DeviceScanner;
pub use sysfs::{SysfsFs, SysfsIo};
