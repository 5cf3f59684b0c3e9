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

//! Command line interface

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use lfancontrol::config::{load_settings, load_settings_from};
use lfancontrol::control::new_gate;
use lfancontrol::level::MAX_LEVEL;
use lfancontrol::poller::{snapshot, FanSnapshot};
use lfancontrol::{
    ControlState, ControlStateMachine, FanDevice, Outcome, Request, RpmPoller, Settings,
};

#[derive(Parser)]
#[command(name = "lfanctl")]
#[command(version)]
#[command(about = "Fan control for Linux using hwmon")]
#[command(long_about = "Fan control for Linux using hwmon

Fans are addressed by id (e.g. nct6775_fan2) or by their 1-based position
in `lfanctl list`. Writes the current user may not perform are retried once
through pkexec and lfan-write-helper.

EXAMPLES:
    lfanctl list                    List discovered fans
    lfanctl status acme_fan1        Show speed, duty cycle and mode
    lfanctl mode 1 manual           Take manual control of the first fan
    lfanctl level 1 5               Set speed level 5 of 7
    lfanctl pwm 1 180               Write a raw duty cycle
    lfanctl watch 1                 Print readings every second

ENVIRONMENT VARIABLES:
    LFAN_LOG=debug         Log filter (default: warn)

FILES:
    ~/.config/lfancontrol/config.json   Settings")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Sensor root to scan instead of the configured one
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Settings file to load instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List discovered fans
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the current readings of one fan
    Status {
        fan: String,
        #[arg(long)]
        json: bool,
    },
    /// Switch a fan between firmware and manual control
    Mode { fan: String, mode: ModeArg },
    /// Set a speed level (0-7); the fan must be in manual mode
    Level { fan: String, level: i64 },
    /// Write a raw duty cycle
    Pwm { fan: String, value: i64 },
    /// Print readings periodically
    Watch {
        fan: String,
        /// Poll interval in milliseconds (default from settings)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Auto,
    Manual,
}

impl From<ModeArg> for ControlState {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Auto => ControlState::Auto,
            ModeArg::Manual => ControlState::Manual,
        }
    }
}

pub fn run_cli(cli: &Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(root) = &cli.root {
        settings.sensor_root = root.clone();
    }

    match &cli.command {
        Commands::List { json } => cmd_list(&settings, *json),
        Commands::Status { fan, json } => cmd_status(&settings, fan, *json),
        Commands::Mode { fan, mode } => cmd_request(&settings, fan, Request::Mode((*mode).into())),
        Commands::Level { fan, level } => {
            if !(0..=MAX_LEVEL).contains(level) {
                bail!("level must be between 0 and {MAX_LEVEL}");
            }
            cmd_request(&settings, fan, Request::Level(*level))
        }
        Commands::Pwm { fan, value } => cmd_request(&settings, fan, Request::Pwm(*value)),
        Commands::Watch { fan, interval_ms, count } => cmd_watch(&settings, fan, *interval_ms, *count),
    }
}

fn scan(settings: &Settings) -> Vec<FanDevice> {
    let fans = settings.scanner().scan();
    debug!(root = %settings.sensor_root.display(), count = fans.len(), "scan finished");
    fans
}

/// Find a fan by id or 1-based position.
fn select(fans: Vec<FanDevice>, key: &str) -> Result<FanDevice> {
    if fans.is_empty() {
        bail!("no fans found");
    }
    if let Ok(pos) = key.parse::<usize>() {
        let count = fans.len();
        return pos
            .checked_sub(1)
            .and_then(|i| fans.into_iter().nth(i))
            .ok_or_else(|| anyhow!("no fan at position {pos} ({count} found)"));
    }
    fans.into_iter()
        .find(|f| f.id() == key)
        .ok_or_else(|| anyhow!("no fan with id '{key}'"))
}

fn describe(s: &FanSnapshot) -> String {
    let rpm = s.rpm.map_or_else(|| "-".to_string(), |r| format!("{r} RPM"));
    let pwm = match (s.pwm, s.percent) {
        (Some(p), Some(pct)) => format!("PWM: {p} ({pct}%)"),
        _ => "PWM: -".to_string(),
    };
    let level = s.level.map_or_else(|| "-".to_string(), |l| l.to_string());
    let mode = s.mode.map_or_else(|| "-".to_string(), |m| m.to_string());
    let mut line = format!("{rpm}  {pwm}  level {level}/{MAX_LEVEL}  mode {mode}");
    if s.permission_denied {
        line.push_str("  (permission denied)");
    }
    line
}

fn cmd_list(settings: &Settings, json: bool) -> Result<()> {
    let fans = scan(settings);
    if json {
        let snaps: Vec<FanSnapshot> = fans.iter().map(snapshot).collect();
        println!("{}", serde_json::to_string_pretty(&snaps)?);
        return Ok(());
    }
    if fans.is_empty() {
        println!("No fans found under {}", settings.sensor_root.display());
        return Ok(());
    }
    println!("Fans ({}):", fans.len());
    for (i, fan) in fans.iter().enumerate() {
        let caps = match (fan.has_pwm(), fan.supports_mode_switch()) {
            (true, true) => "pwm, mode",
            (true, false) => "pwm",
            _ => "read-only",
        };
        println!("  {:>2}. {:<24} {} [{}]", i + 1, fan.id(), fan.label(), caps);
    }
    Ok(())
}

fn cmd_status(settings: &Settings, key: &str, json: bool) -> Result<()> {
    let fan = select(scan(settings), key)?;
    let snap = snapshot(&fan);
    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!("{}: {}", fan.label(), describe(&snap));
    }
    Ok(())
}

fn cmd_request(settings: &Settings, key: &str, request: Request) -> Result<()> {
    let fan = select(scan(settings), key)?;
    let mut machine = ControlStateMachine::new(settings.escalator(), new_gate());
    if let Err(e) = machine.sync(&fan) {
        debug!(error = %e, "could not read current mode");
    }

    match machine.handle(&fan, request)? {
        Outcome::Applied { value, escalated, warning } => {
            let via = if escalated { " (elevated)" } else { "" };
            match value {
                Some(v) => println!("{}: PWM set to {v}{via}", fan.id()),
                None => println!("{}: mode set to {}{via}", fan.id(), machine.state()),
            }
            if let Some(w) = warning {
                eprintln!("Warning: {w}");
            }
        }
        Outcome::Ignored(reason) => {
            println!("{}: request ignored: {reason}", fan.id());
        }
    }
    Ok(())
}

fn cmd_watch(settings: &Settings, key: &str, interval_ms: Option<u64>, count: Option<usize>) -> Result<()> {
    let fan = select(scan(settings), key)?;
    let interval = interval_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| settings.poll_interval());
    let label = fan.label().to_string();

    let (tx, rx) = mpsc::channel();
    let poller = RpmPoller::spawn(fan, new_gate(), interval, move |s| {
        let _ = tx.send(s);
    });

    let mut seen = 0usize;
    while let Ok(snap) = rx.recv() {
        println!("{label}: {}", describe(&snap));
        seen += 1;
        if count.is_some_and(|c| seen >= c) {
            break;
        }
    }
    poller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_requests() {
        let cli = Cli::try_parse_from(["lfanctl", "--root", "/tmp/hw", "mode", "acme_fan1", "manual"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/hw")));
        match cli.command {
            Commands::Mode { fan, mode } => {
                assert_eq!(fan, "acme_fan1");
                assert_eq!(ControlState::from(mode), ControlState::Manual);
            }
            _ => panic!("expected mode command"),
        }

        assert!(Cli::try_parse_from(["lfanctl", "mode", "1", "turbo"]).is_err());
        assert!(Cli::try_parse_from(["lfanctl", "pwm", "1"]).is_err());
    }

    #[test]
    fn test_describe_snapshot() {
        let snap = FanSnapshot {
            id: "acme_fan1".into(),
            label: "acme - Fan 1".into(),
            rpm: Some(1234),
            pwm: Some(128),
            level: Some(4),
            percent: Some(50),
            mode: Some(lfancontrol::Mode::Auto),
            permission_denied: false,
        };
        assert_eq!(describe(&snap), "1234 RPM  PWM: 128 (50%)  level 4/7  mode auto");
    }
}
