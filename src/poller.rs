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

//! Periodic readings of the selected fan

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::control::OperationGate;
use crate::fan::{FanDevice, Mode};
use crate::level::{pwm_percent, pwm_to_level};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// One reading of a fan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanSnapshot {
    pub id: String,
    pub label: String,
    pub rpm: Option<i64>,
    pub pwm: Option<i64>,
    pub level: Option<i64>,
    pub percent: Option<i64>,
    pub mode: Option<Mode>,
    /// Set when a reading was refused by the kernel.
    pub permission_denied: bool,
}

/// Read everything the UI shows for `fan`.
pub fn snapshot(fan: &FanDevice) -> FanSnapshot {
    let mut denied = false;
    let mut take = |r: crate::error::Result<Option<i64>>| match r {
        Ok(v) => v,
        Err(e) => {
            denied |= e.is_permission_denied();
            debug!(fan = fan.id(), error = %e, "reading failed");
            None
        }
    };
    let rpm = take(fan.read_rpm());
    let pwm = take(fan.read_pwm());

    let mode = match fan.mode() {
        Ok(m) => Some(m),
        Err(e) => {
            denied |= e.is_permission_denied();
            None
        }
    };

    FanSnapshot {
        id: fan.id().to_string(),
        label: fan.label().to_string(),
        rpm,
        pwm,
        level: pwm.map(|p| pwm_to_level(p, fan.max_pwm())),
        percent: pwm.map(|p| pwm_percent(p, fan.max_pwm())),
        mode,
        permission_denied: denied,
    }
}

/// Background thread feeding snapshots of one fan to a sink.
pub struct RpmPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RpmPoller {
    /// Start polling. The first snapshot is taken immediately.
    pub fn spawn<F>(fan: FanDevice, gate: OperationGate, interval: Duration, mut sink: F) -> Self
    where
        F: FnMut(FanSnapshot) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            debug!(fan = fan.id(), ?interval, "poller started");
            while !flag.load(Ordering::Relaxed) {
                let snap = {
                    let _guard = gate.lock();
                    snapshot(&fan)
                };
                trace!(?snap, "poll");
                sink(snap);

                let deadline = Instant::now() + interval;
                while !flag.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep((deadline - now).min(Duration::from_millis(50)));
                }
            }
            debug!(fan = fan.id(), "poller stopped");
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop and join the polling thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for RpmPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
