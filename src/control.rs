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

//! Request handling for the selected fan
//!
//! User intent arrives as [`Request`] values and is applied synchronously
//! against one [`FanDevice`]. A direct write rejected with a permission error
//! is retried exactly once through the [`PrivilegeEscalator`]; nothing is
//! retried after that.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FanControlError, Result};
use crate::escalator::{Confirmation, PrivilegeEscalator};
use crate::fan::{FanDevice, Mode};
use crate::level::level_to_pwm;

/// Serializes device operations between the control path and the poller.
pub type OperationGate = Arc<Mutex<()>>;

pub fn new_gate() -> OperationGate {
    Arc::new(Mutex::new(()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    Auto,
    Manual,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Auto => write!(f, "auto"),
            ControlState::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Mode(ControlState),
    /// Speed level in `0..=7`; only honoured in manual mode.
    Level(i64),
    /// Raw duty cycle.
    Pwm(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The fan has no enable file, so its mode cannot change.
    ModeUnsupported,
    /// Level requests need manual mode.
    NotManual,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::ModeUnsupported => write!(f, "fan does not support mode switching"),
            IgnoreReason::NotManual => write!(f, "fan is not in manual mode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        /// Duty cycle written, `None` for mode changes.
        value: Option<i64>,
        escalated: bool,
        warning: Option<String>,
    },
    Ignored(IgnoreReason),
}

impl Outcome {
    fn direct(value: Option<i64>) -> Self {
        Outcome::Applied { value, escalated: false, warning: None }
    }

    fn escalated(value: Option<i64>, confirmation: Confirmation) -> Self {
        Outcome::Applied {
            value,
            escalated: true,
            warning: confirmation.warning(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }
}

pub struct ControlStateMachine {
    state: ControlState,
    escalator: PrivilegeEscalator,
    gate: OperationGate,
}

impl ControlStateMachine {
    pub fn new(escalator: PrivilegeEscalator, gate: OperationGate) -> Self {
        Self {
            state: ControlState::Auto,
            escalator,
            gate,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn gate(&self) -> &OperationGate {
        &self.gate
    }

    /// Re-derive the state from hardware, e.g. after selecting another fan.
    ///
    /// On a read failure the state falls back to `Auto` and the error is
    /// returned.
    pub fn sync(&mut self, fan: &FanDevice) -> Result<ControlState> {
        let _guard = self.gate.lock();
        let mode = fan.mode();
        self.state = match mode {
            Ok(Mode::Manual) => ControlState::Manual,
            _ => ControlState::Auto,
        };
        debug!(fan = fan.id(), state = %self.state, "state synced");
        mode.map(|_| self.state)
    }

    /// Apply one request to `fan`.
    pub fn handle(&mut self, fan: &FanDevice, request: Request) -> Result<Outcome> {
        let gate = Arc::clone(&self.gate);
        let _guard = gate.lock();
        debug!(fan = fan.id(), ?request, state = %self.state, "handling request");

        match request {
            Request::Mode(target) => {
                if !fan.supports_mode_switch() {
                    self.state = ControlState::Auto;
                    return Ok(Outcome::Ignored(IgnoreReason::ModeUnsupported));
                }
                let outcome = self.switch_mode(fan, target)?;
                self.state = target;
                Ok(outcome)
            }
            Request::Level(level) => {
                if self.state != ControlState::Manual {
                    return Ok(Outcome::Ignored(IgnoreReason::NotManual));
                }
                self.write_pwm(fan, level_to_pwm(level, fan.max_pwm()))
            }
            Request::Pwm(value) => self.write_pwm(fan, value),
        }
    }

    fn switch_mode(&self, fan: &FanDevice, target: ControlState) -> Result<Outcome> {
        let (direct, value) = match target {
            ControlState::Manual => (fan.set_manual_mode(), fan.enable_values().manual),
            ControlState::Auto => (fan.set_auto_mode(), fan.enable_values().auto),
        };
        match direct {
            Ok(()) => Ok(Outcome::direct(None)),
            Err(FanControlError::PermissionDenied(_)) => {
                let enable = fan
                    .pwm_enable_path()
                    .ok_or_else(|| FanControlError::unsupported("fan has no enable file"))?;
                let confirmation = self.escalator.write_privileged(enable, value, None)?;
                info!(fan = fan.id(), mode = %target, "mode set via escalation");
                Ok(Outcome::escalated(None, confirmation))
            }
            Err(e) => Err(e),
        }
    }

    fn write_pwm(&mut self, fan: &FanDevice, value: i64) -> Result<Outcome> {
        let outcome = match fan.set_pwm(value) {
            Ok(written) => Outcome::direct(Some(written)),
            Err(FanControlError::PermissionDenied(_)) => {
                let pwm = fan
                    .pwm_path()
                    .ok_or_else(|| FanControlError::unsupported("fan has no PWM control"))?;
                let clamped = fan.clamp(value);
                let enable = fan
                    .pwm_enable_path()
                    .map(|p| (p, fan.enable_values().manual));
                let confirmation = self.escalator.write_privileged(pwm, clamped, enable)?;
                info!(fan = fan.id(), pwm = clamped, "pwm set via escalation");
                Outcome::escalated(Some(clamped), confirmation)
            }
            Err(e) => return Err(e),
        };
        if fan.supports_mode_switch() {
            self.state = ControlState::Manual;
        }
        Ok(outcome)
    }
}
