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

//! File access seam for hwmon attributes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Reads and writes single hwmon attribute files.
#[cfg_attr(test, mockall::automock)]
pub trait SysfsIo: Send + Sync {
    /// Whole file contents, untrimmed.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of an existing attribute. Attributes are never created.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// File names directly inside `dir`. Entries that cannot be read are skipped.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// `Ok` when `path` exists and can be stat'ed.
    fn probe(&self, path: &Path) -> io::Result<()>;
}

/// [`SysfsIo`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsFs;

impl SysfsIo for SysfsFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
        f.write_all(contents.as_bytes())?;
        f.flush()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(fs::read_dir(dir)?
            .flatten()
            .map(|ent| ent.file_name().to_string_lossy().into_owned())
            .collect())
    }

    fn probe(&self, path: &Path) -> io::Result<()> {
        fs::metadata(path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("pwm1");
        fs::write(&p, "255\n").unwrap();

        SysfsFs.write(&p, "64\n").unwrap();
        assert_eq!(SysfsFs.read(&p).unwrap(), "64\n");
    }

    #[test]
    fn test_list_and_probe() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fan1_input"), "1\n").unwrap();
        fs::write(dir.path().join("pwm1"), "1\n").unwrap();

        let mut names = SysfsFs.list(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["fan1_input", "pwm1"]);
        assert!(SysfsFs.probe(&dir.path().join("pwm1")).is_ok());
        assert_eq!(
            SysfsFs.probe(&dir.path().join("pwm2")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert_eq!(
            SysfsFs.list(&dir.path().join("nope")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_write_never_creates() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("pwm9");

        let err = SysfsFs.write(&p, "1\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!p.exists());
    }
}
