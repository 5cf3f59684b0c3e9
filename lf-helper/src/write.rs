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

//! Argument validation and the write itself

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use lf_error::{FanControlError, Result};
use tracing::info;

/// Directories the helper may write below.
pub const ALLOWED_PATH_PREFIXES: &[&str] = &["/sys/class/hwmon/", "/sys/devices/"];

const FORBIDDEN_PATH_COMPONENTS: &[&str] = &["..", "//", "\0", "\n", "\r", "$("];

pub const MAX_PATH_LENGTH: usize = 256;

pub const MAX_VALUE: i64 = 65535;

/// Check `path` against the allowed roots, before and after resolving
/// symlinks. Returns the path to write.
pub fn validate_path(path: &str, roots: &[&str]) -> Result<PathBuf> {
    let reject = |reason: String| -> Result<PathBuf> { Err(FanControlError::invalid_path(path, reason)) };

    if path.is_empty() {
        return reject("path cannot be empty".into());
    }
    if path.len() > MAX_PATH_LENGTH {
        return reject(format!("path too long: {} > {} chars", path.len(), MAX_PATH_LENGTH));
    }
    if !path.starts_with('/') {
        return reject("path must be absolute".into());
    }
    if !roots.iter().any(|prefix| path.starts_with(prefix)) {
        return reject(format!("path must be under one of: {roots:?}"));
    }
    for forbidden in FORBIDDEN_PATH_COMPONENTS {
        if path.contains(forbidden) {
            return reject(format!("path contains forbidden sequence: {forbidden:?}"));
        }
    }
    if let Some(c) = path
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | '-' | '_' | '.'))
    {
        return reject(format!("path contains invalid character: {c:?}"));
    }

    let file = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !is_pwm_attribute(file) {
        return reject("only pwm<N> and pwm<N>_enable attributes can be written".into());
    }

    if let Ok(canonical) = std::fs::canonicalize(path) {
        let canonical_str = canonical.to_string_lossy();
        if !roots.iter().any(|prefix| canonical_str.starts_with(prefix)) {
            return reject(format!("canonical path {canonical_str} is outside allowed directories"));
        }
    }

    Ok(PathBuf::from(path))
}

/// `pwm<N>` or `pwm<N>_enable`.
pub fn is_pwm_attribute(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("pwm") else {
        return false;
    };
    let digits = rest.strip_suffix("_enable").unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_value(raw: &str) -> Result<i64> {
    let invalid = |reason: &str| FanControlError::InvalidValue {
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a decimal integer"));
    }
    let value: i64 = raw.parse().map_err(|_| invalid("out of range"))?;
    if value > MAX_VALUE {
        return Err(invalid("must be between 0 and 65535"));
    }
    Ok(value)
}

/// Handle one invocation: `<path> <value>`.
pub fn run(args: &[String], roots: &[&str]) -> Result<()> {
    let [path, value] = args else {
        return Err(FanControlError::InvalidValue {
            value: args.join(" "),
            reason: "usage: lfan-write-helper <path> <value>".into(),
        });
    };
    let target = validate_path(path, roots)?;
    let value = parse_value(value)?;

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&target)
        .map_err(|e| FanControlError::from_io(&target, e))?;
    file.write_all(format!("{value}\n").as_bytes())
        .map_err(|e| FanControlError::from_io(&target, e))?;

    info!(path = %target.display(), value, "value written");
    Ok(())
}
