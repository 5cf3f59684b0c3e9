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

//! Test fixtures shared across modules

#[cfg(test)]
pub mod test_utils {
    use crate::fan::FanDevice;
    use crate::paths::SysfsPaths;
    use crate::scanner::DeviceScanner;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Write one attribute file, creating the chip directory if needed.
    pub fn write_attr(dir: &Path, name: &str, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    /// A sensor root with a single chip `acme` and one controllable fan:
    /// 1234 RPM, pwm 128, automatic mode.
    pub fn acme_hwmon_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let chip = tmp.path().join("hwmon0");
        write_attr(&chip, "name", "acme\n");
        write_attr(&chip, "fan1_input", "1234\n");
        write_attr(&chip, "pwm1", "128\n");
        write_attr(&chip, "pwm1_enable", "2\n");
        tmp
    }

    /// First fan found under `root`.
    pub fn fan_from_tree(root: &Path) -> FanDevice {
        DeviceScanner::new(SysfsPaths::new(root))
            .scan()
            .into_iter()
            .next()
            .expect("fixture tree has a fan")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_acme_tree_layout() {
            let tmp = acme_hwmon_tree();
            let chip = tmp.path().join("hwmon0");
            assert_eq!(fs::read_to_string(chip.join("name")).unwrap(), "acme\n");
            assert!(chip.join("pwm1_enable").exists());
            assert_eq!(fan_from_tree(tmp.path()).id(), "acme_fan1");
        }
    }
}
