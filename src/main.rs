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

mod cli;

use clap::Parser;
use tracing::debug;

use lfancontrol::logger;

fn main() {
    let args = cli::Cli::parse();
    logger::init_logging(args.verbose);

    if unsafe { libc::geteuid() } == 0 {
        debug!("running as root, writes go straight to sysfs");
    } else {
        debug!("running unprivileged, rejected writes will be escalated");
    }

    if let Err(e) = cli::run_cli(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
