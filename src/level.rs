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

//! Coarse 0-7 fan levels.
//!
//! Levels are a presentation scale only: they are always derived from the
//! PWM value and never stored. The mapping is lossy; converting a level to
//! PWM and back lands within one level of where it started.
//!
//! Exact ties in [`pwm_to_level`] round up (`pwm = 1`, `max_pwm = 14` is
//! level 1), not to the even neighbour.
//!
//! Intermediate products are computed in `i128`, so any `i64` input is safe.

/// Highest level.
pub const MAX_LEVEL: i64 = 7;

/// PWM value for `level` on a device whose range tops out at `max_pwm`.
///
/// Truncating integer scaling: 0 maps to 0, [`MAX_LEVEL`] maps to `max_pwm`.
pub fn level_to_pwm(level: i64, max_pwm: i64) -> i64 {
    let level = i128::from(level.clamp(0, MAX_LEVEL));
    narrow(level * i128::from(max_pwm) / i128::from(MAX_LEVEL))
}

/// Nearest level for `pwm`, rounding halves up. Degenerate ranges give 0.
pub fn pwm_to_level(pwm: i64, max_pwm: i64) -> i64 {
    if max_pwm <= 0 {
        return 0;
    }
    let pwm = i128::from(pwm.clamp(0, max_pwm));
    let max = i128::from(max_pwm);
    narrow((2 * pwm * i128::from(MAX_LEVEL) + max) / (2 * max)).clamp(0, MAX_LEVEL)
}

/// Duty cycle as a whole percentage of `max_pwm`, truncated to `0..=100`.
pub fn pwm_percent(pwm: i64, max_pwm: i64) -> i64 {
    let max = max_pwm.max(1);
    narrow(i128::from(pwm.clamp(0, max)) * 100 / i128::from(max))
}

fn narrow(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAXES: [i64; 6] = [7, 10, 100, 255, 1000, 65535];

    #[test]
    fn test_reference_values_255() {
        let pwms: Vec<i64> = (0..=MAX_LEVEL).map(|l| level_to_pwm(l, 255)).collect();
        assert_eq!(pwms, vec![0, 36, 72, 109, 145, 182, 218, 255]);
    }

    #[test]
    fn test_level_to_pwm_endpoints_and_clamp() {
        for max in MAXES {
            assert_eq!(level_to_pwm(0, max), 0);
            assert_eq!(level_to_pwm(MAX_LEVEL, max), max);
            assert_eq!(level_to_pwm(-3, max), 0);
            assert_eq!(level_to_pwm(42, max), max);
        }
    }

    #[test]
    fn test_level_to_pwm_monotonic() {
        for max in MAXES {
            let pwms: Vec<i64> = (0..=MAX_LEVEL).map(|l| level_to_pwm(l, max)).collect();
            assert!(pwms.windows(2).all(|w| w[0] <= w[1]), "max {max}: {pwms:?}");
        }
    }

    #[test]
    fn test_pwm_to_level_range_and_monotonic() {
        for max in MAXES {
            let mut prev = 0;
            for pwm in 0..=max {
                let level = pwm_to_level(pwm, max);
                assert!((0..=MAX_LEVEL).contains(&level));
                assert!(level >= prev, "max {max}, pwm {pwm}");
                prev = level;
            }
        }
    }

    #[test]
    fn test_round_trip_within_one_level() {
        for max in MAXES {
            for level in 0..=MAX_LEVEL {
                let back = pwm_to_level(level_to_pwm(level, max), max);
                assert!((back - level).abs() <= 1, "max {max}: {level} -> {back}");
            }
        }
    }

    #[test]
    fn test_degenerate_and_out_of_range_pwm() {
        assert_eq!(pwm_to_level(100, 0), 0);
        assert_eq!(pwm_to_level(100, -5), 0);
        assert_eq!(pwm_to_level(-20, 255), 0);
        assert_eq!(pwm_to_level(999, 255), MAX_LEVEL);
        assert_eq!(pwm_to_level(128, 255), 4);
    }

    #[test]
    fn test_pwm_percent() {
        assert_eq!(pwm_percent(128, 255), 50);
        assert_eq!(pwm_percent(255, 255), 100);
        assert_eq!(pwm_percent(-4, 255), 0);
        assert_eq!(pwm_percent(100_000_000_000_000_000, 255), 100);
        assert_eq!(pwm_percent(i64::MAX, i64::MAX), 100);
    }

    #[test]
    fn test_extreme_ranges_do_not_overflow() {
        assert_eq!(level_to_pwm(7, i64::MAX / 2), i64::MAX / 2);
        assert_eq!(level_to_pwm(MAX_LEVEL, i64::MAX), i64::MAX);
        assert_eq!(level_to_pwm(0, i64::MAX), 0);
        assert_eq!(pwm_to_level(i64::MAX, i64::MAX), MAX_LEVEL);
        assert_eq!(pwm_to_level(i64::MAX / 2, i64::MAX), 3);
        assert_eq!(pwm_to_level(i64::MIN, i64::MAX), 0);
    }

    #[test]
    fn test_ties_round_up() {
        assert_eq!(pwm_to_level(1, 14), 1);
        assert_eq!(pwm_to_level(3, 14), 2);
        assert_eq!(pwm_to_level(5, 14), 3);
    }
}
