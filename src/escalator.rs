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

//! Privilege escalation for rejected writes
//!
//! When a direct write fails with a permission error, the value is written
//! again by a helper executable started through an elevation launcher
//! (`pkexec` by default):
//!
//! ```text
//! <launcher> <helper> <absolute path> <value>
//! ```
//!
//! The helper prints `OK` and exits 0 on success, or prints `HATA: <message>`
//! on stderr and exits 1. Every invocation is bounded; a helper that outlives
//! its deadline is killed and the write reported as timed out.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{FanControlError, Result};

/// Token the helper prints on success.
pub const SUCCESS_TOKEN: &str = "OK";

/// Bound for the manual-mode pre-step.
pub const ENABLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound for the value write itself.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default launcher.
pub const DEFAULT_LAUNCHER: &str = "pkexec";

/// File name of the helper binary.
pub const HELPER_BIN: &str = "lfan-write-helper";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a finished helper process reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOutput {
    /// `None` when the process died from a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs one elevated write.
///
/// Implementations return `Err` only when no verdict exists: the mechanism
/// could not be started, or the deadline passed.
#[cfg_attr(test, mockall::automock)]
pub trait Elevator: Send + Sync {
    fn run(&self, path: &Path, value: &str, timeout: Duration) -> Result<HelperOutput>;
}

/// [`Elevator`] spawning `<launcher> <helper> <path> <value>`.
#[derive(Debug, Clone)]
pub struct ProcessElevator {
    launcher: Option<String>,
    helper: PathBuf,
}

impl ProcessElevator {
    /// `launcher = None` runs the helper directly.
    pub fn new(launcher: Option<String>, helper: impl Into<PathBuf>) -> Self {
        Self {
            launcher: launcher.filter(|l| !l.trim().is_empty()),
            helper: helper.into(),
        }
    }

    pub fn launcher(&self) -> Option<&str> {
        self.launcher.as_deref()
    }

    pub fn helper(&self) -> &Path {
        &self.helper
    }

    fn command(&self) -> Command {
        match &self.launcher {
            Some(launcher) => {
                let mut cmd = Command::new(launcher);
                cmd.arg(&self.helper);
                cmd
            }
            None => Command::new(&self.helper),
        }
    }
}

impl Elevator for ProcessElevator {
    fn run(&self, path: &Path, value: &str, timeout: Duration) -> Result<HelperOutput> {
        if !self.helper.exists() {
            return Err(FanControlError::MechanismUnavailable(format!(
                "write helper {} not found",
                self.helper.display()
            )));
        }

        let mut cmd = self.command();
        cmd.arg(path)
            .arg(value)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(cmd = ?cmd, "spawning elevated write");

        let mut child = cmd.spawn().map_err(|e| {
            let what = self
                .launcher
                .clone()
                .unwrap_or_else(|| self.helper.display().to_string());
            FanControlError::MechanismUnavailable(format!("cannot run {what}: {e}"))
        })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if start.elapsed() >= timeout => {
                    abandon(child);
                    return Err(FanControlError::Timeout {
                        path: path.to_path_buf(),
                        after: timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(FanControlError::from_io(path, e)),
            }
        };

        let collect = |h: Option<thread::JoinHandle<String>>| {
            h.and_then(|h| h.join().ok()).unwrap_or_default()
        };
        Ok(HelperOutput {
            code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

/// The parts of a child process the timeout path touches.
trait Reapable: Send + 'static {
    fn kill(&mut self) -> io::Result<()>;
    fn wait(&mut self) -> io::Result<()>;
}

impl Reapable for Child {
    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> io::Result<()> {
        Child::wait(self).map(|_| ())
    }
}

/// Stop a child that overran its deadline without blocking the caller.
///
/// A helper already running as root refuses our signal with EPERM; it is
/// then reaped on a detached thread whenever it exits.
fn abandon<C: Reapable>(mut child: C) {
    match child.kill() {
        Ok(()) => {
            let _ = child.wait();
        }
        Err(e) => {
            warn!(error = %e, "cannot kill timed-out helper, leaving it to finish");
            thread::spawn(move || {
                let _ = child.wait();
            });
        }
    }
}

fn drain<R: Read + Send + 'static>(mut r: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = r.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Successful elevated write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Exit 0 and the success token.
    Confirmed,
    /// Exit 0 without the success token; the value was probably written.
    Unconfirmed { stdout: String, stderr: String },
}

impl Confirmation {
    /// Text worth showing the user, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            Confirmation::Confirmed => None,
            Confirmation::Unconfirmed { stdout, stderr } => Some(format!(
                "value written but the helper did not confirm it (stdout: {:?}, stderr: {:?})",
                stdout, stderr
            )),
        }
    }
}

/// Re-issues rejected writes through an [`Elevator`].
#[derive(Clone)]
pub struct PrivilegeEscalator {
    elevator: Arc<dyn Elevator>,
    enable_timeout: Duration,
    write_timeout: Duration,
}

impl PrivilegeEscalator {
    pub fn new(elevator: Arc<dyn Elevator>) -> Self {
        Self {
            elevator,
            enable_timeout: ENABLE_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, enable_timeout: Duration, write_timeout: Duration) -> Self {
        self.enable_timeout = enable_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Write `value` to `path` with elevated rights.
    ///
    /// # Arguments
    /// * `path` - attribute to write; made absolute before the helper sees it
    /// * `value` - value to write
    /// * `enable` - optional `(enable path, manual value)` written first; its
    ///   failure is logged and does not stop the main write
    pub fn write_privileged(
        &self,
        path: &Path,
        value: i64,
        enable: Option<(&Path, i64)>,
    ) -> Result<Confirmation> {
        if let Some((enable_path, manual)) = enable {
            let enable_path = absolute(enable_path);
            match self
                .elevator
                .run(&enable_path, &manual.to_string(), self.enable_timeout)
                .and_then(|out| classify(&out))
            {
                Ok(_) => debug!(path = %enable_path.display(), "manual mode set via helper"),
                Err(e) => warn!(path = %enable_path.display(), error = %e, "elevated manual mode failed, writing value anyway"),
            }
        }

        let path = absolute(path);
        info!(path = %path.display(), value, "escalating write");
        let out = self.elevator.run(&path, &value.to_string(), self.write_timeout)?;
        let confirmation = classify(&out)?;
        if let Some(w) = confirmation.warning() {
            warn!(path = %path.display(), "{w}");
        }
        Ok(confirmation)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Turn helper output into a verdict.
pub fn classify(out: &HelperOutput) -> Result<Confirmation> {
    let stdout = out.stdout.trim();
    let stderr = out.stderr.trim();

    if out.code == Some(0) {
        if stdout == SUCCESS_TOKEN {
            return Ok(Confirmation::Confirmed);
        }
        return Ok(Confirmation::Unconfirmed {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    let diagnostics: Vec<&str> = [stderr, stdout].into_iter().filter(|s| !s.is_empty()).collect();
    let message = if diagnostics.is_empty() {
        match out.code {
            // pkexec conventions
            Some(126) => "authorization dialog dismissed".to_string(),
            Some(127) => "not authorized".to_string(),
            Some(c) => format!("helper exited with status {c}"),
            None => "helper terminated by signal".to_string(),
        }
    } else {
        diagnostics.join("\n")
    };

    Err(FanControlError::ElevatedWriteFailed {
        code: out.code,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;
    use mockall::Sequence;
    use std::fs;
    use tempfile::TempDir;

    fn output(code: Option<i32>, stdout: &str, stderr: &str) -> HelperOutput {
        HelperOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn escalator(mock: MockElevator) -> PrivilegeEscalator {
        PrivilegeEscalator::new(Arc::new(mock))
    }

    #[test]
    fn test_classify_confirmed() {
        assert_eq!(classify(&output(Some(0), "OK\n", "")).unwrap(), Confirmation::Confirmed);
    }

    #[test]
    fn test_classify_unconfirmed() {
        let c = classify(&output(Some(0), "done?", "")).unwrap();
        assert_eq!(
            c,
            Confirmation::Unconfirmed { stdout: "done?".into(), stderr: String::new() }
        );
        assert!(c.warning().unwrap().contains("done?"));
    }

    #[test]
    fn test_classify_failure_carries_diagnostic() {
        let err = classify(&output(Some(1), "", "HATA: Permission denied\n")).unwrap_err();
        match err {
            FanControlError::ElevatedWriteFailed { code, message } => {
                assert_eq!(code, Some(1));
                assert_eq!(message, "HATA: Permission denied");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_failure_without_output() {
        let msg = |code| match classify(&output(code, "", "")).unwrap_err() {
            FanControlError::ElevatedWriteFailed { message, .. } => message,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(msg(Some(126)), "authorization dialog dismissed");
        assert_eq!(msg(Some(127)), "not authorized");
        assert_eq!(msg(Some(3)), "helper exited with status 3");
        assert_eq!(msg(None), "helper terminated by signal");
    }

    #[test]
    fn test_write_privileged_single_invocation() {
        let mut mock = MockElevator::new();
        mock.expect_run()
            .withf(|p, v, t| p == Path::new("/sys/class/hwmon/hwmon0/pwm1") && v == "128" && *t == WRITE_TIMEOUT)
            .times(1)
            .returning(|_, _, _| Ok(output(Some(0), "OK\n", "")));

        let c = escalator(mock)
            .write_privileged(Path::new("/sys/class/hwmon/hwmon0/pwm1"), 128, None)
            .unwrap();
        assert_eq!(c, Confirmation::Confirmed);
    }

    #[test]
    fn test_enable_prestep_runs_first_and_failure_is_ignored() {
        let mut seq = Sequence::new();
        let mut mock = MockElevator::new();
        mock.expect_run()
            .withf(|p, v, t| p.ends_with("pwm1_enable") && v == "1" && *t == ENABLE_TIMEOUT)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(output(Some(1), "", "HATA: busy")));
        mock.expect_run()
            .withf(|p, v, _| p.ends_with("pwm1") && v == "200")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(output(Some(0), "OK", "")));

        let c = escalator(mock)
            .write_privileged(
                Path::new("/hw/hwmon0/pwm1"),
                200,
                Some((Path::new("/hw/hwmon0/pwm1_enable"), 1)),
            )
            .unwrap();
        assert_eq!(c, Confirmation::Confirmed);
    }

    #[test]
    fn test_enable_prestep_timeout_does_not_block() {
        let mut mock = MockElevator::new();
        mock.expect_run()
            .withf(|p, _, _| p.ends_with("pwm1_enable"))
            .times(1)
            .returning(|p, _, t| Err(FanControlError::Timeout { path: p.to_path_buf(), after: t }));
        mock.expect_run()
            .withf(|p, _, _| p.ends_with("pwm1"))
            .times(1)
            .returning(|_, _, _| Ok(output(Some(0), "OK", "")));

        assert!(escalator(mock)
            .write_privileged(Path::new("/hw/pwm1"), 1, Some((Path::new("/hw/pwm1_enable"), 1)))
            .is_ok());
    }

    #[test]
    fn test_failure_and_mechanism_errors_propagate() {
        let mut mock = MockElevator::new();
        mock.expect_run()
            .with(always(), always(), always())
            .times(1)
            .returning(|_, _, _| Err(FanControlError::MechanismUnavailable("no pkexec".into())));
        let err = escalator(mock)
            .write_privileged(Path::new("/hw/pwm1"), 1, None)
            .unwrap_err();
        assert!(matches!(err, FanControlError::MechanismUnavailable(_)));
    }

    #[test]
    fn test_relative_paths_made_absolute() {
        let mut mock = MockElevator::new();
        mock.expect_run()
            .withf(|p, _, _| p.is_absolute() && p.ends_with("pwm1"))
            .times(1)
            .returning(|_, _, _| Ok(output(Some(0), "OK", "")));
        escalator(mock)
            .write_privileged(Path::new("hwmon0/pwm1"), 5, None)
            .unwrap();
    }

    // Process-level tests run the helper script through `sh`, so nothing
    // written by the test is ever exec'd directly.
    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let p = dir.path().join("helper.sh");
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn test_process_elevator_success() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("pwm1");
        fs::write(&target, "0\n").unwrap();
        let helper = script(&tmp, "printf '%s\\n' \"$2\" > \"$1\" && echo OK\n");

        let out = ProcessElevator::new(Some("sh".into()), &helper)
            .run(&target, "77", Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.code, Some(0));
        assert_eq!(out.stdout.trim(), "OK");
        assert_eq!(fs::read_to_string(&target).unwrap(), "77\n");
    }

    #[test]
    fn test_process_elevator_failure_output() {
        let tmp = TempDir::new().unwrap();
        let helper = script(&tmp, "echo 'HATA: Permission denied' >&2; exit 1\n");

        let out = ProcessElevator::new(Some("sh".into()), &helper)
            .run(Path::new("/nonexistent/pwm1"), "1", Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.code, Some(1));
        assert_eq!(out.stderr.trim(), "HATA: Permission denied");
    }

    #[test]
    fn test_process_elevator_timeout() {
        let tmp = TempDir::new().unwrap();
        let helper = script(&tmp, "sleep 5\n");

        let start = Instant::now();
        let err = ProcessElevator::new(Some("sh".into()), &helper)
            .run(Path::new("/x/pwm1"), "1", Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, FanControlError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_process_elevator_mechanism_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = ProcessElevator::new(Some("sh".into()), tmp.path().join("missing.sh"))
            .run(Path::new("/x/pwm1"), "1", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FanControlError::MechanismUnavailable(_)));

        let helper = script(&tmp, "echo OK\n");
        let err = ProcessElevator::new(Some("definitely-not-a-launcher-xyz".into()), &helper)
            .run(Path::new("/x/pwm1"), "1", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FanControlError::MechanismUnavailable(_)));
    }

    /// A child that refuses signals and only exits when told to.
    struct Unkillable {
        exit: std::sync::mpsc::Receiver<()>,
    }

    impl Reapable for Unkillable {
        fn kill(&mut self) -> io::Result<()> {
            Err(io::Error::from_raw_os_error(libc::EPERM))
        }

        fn wait(&mut self) -> io::Result<()> {
            let _ = self.exit.recv();
            Ok(())
        }
    }

    #[test]
    fn test_abandon_does_not_wait_for_unkillable_child() {
        let (exit, rx) = std::sync::mpsc::channel();
        let start = Instant::now();
        abandon(Unkillable { exit: rx });
        assert!(start.elapsed() < Duration::from_secs(1));
        drop(exit);
    }

    #[test]
    fn test_abandon_reaps_killed_child() {
        let mut child = Command::new("sh").arg("-c").arg("sleep 5").spawn().unwrap();
        assert!(child.try_wait().unwrap().is_none());
        let start = Instant::now();
        abandon(child);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_blank_launcher_runs_helper_directly() {
        let e = ProcessElevator::new(Some("  ".into()), "/usr/libexec/lfan-write-helper");
        assert_eq!(e.launcher(), None);
    }
}
