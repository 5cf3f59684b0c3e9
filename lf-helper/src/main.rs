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

//! lfan-write-helper - privileged sysfs writer
//!
//! Started through pkexec as `lfan-write-helper <path> <value>`. Prints `OK`
//! on success; on failure prints `HATA: <message>` to stderr and exits 1.
//! stdout and stderr carry only that protocol, so diagnostics go to the
//! systemd journal or nowhere.

mod write;

use std::env;
use std::path::Path;
use std::process::ExitCode;

use tracing::{info, warn};

const LOG_ENV: &str = "LFAN_LOG";
const JOURNAL_SOCKET: &str = "/run/systemd/journal/socket";

fn init_logging() {
    if !Path::new(JOURNAL_SOCKET).exists() {
        return;
    }
    let Ok(journald) = tracing_journald::layer() else {
        return;
    };
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(journald.with_syslog_identifier("lfan-write-helper".to_string()))
        .with(filter)
        .try_init();
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let uid = unsafe { libc::getuid() };
    let euid = unsafe { libc::geteuid() };
    let pkexec_uid = env::var("PKEXEC_UID").unwrap_or_default();
    info!(
        uid,
        euid,
        pkexec_uid = %pkexec_uid,
        args = ?args,
        "write requested"
    );

    match write::run(&args, write::ALLOWED_PATH_PREFIXES) {
        Ok(()) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!(error = %e, "write refused");
            eprintln!("HATA: {e}");
            ExitCode::from(1)
        }
    }
}
