//! A duration type that (de)serializes from the same human-readable strings
//! its `Display` produces (`"15m"`, `"2h30m"`, `"500ms"`), instead of
//! `serde`'s default numeric-seconds representation for [`std::time::Duration`].

use std::{fmt, str::FromStr, time::Duration as StdDuration};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum DurationParseError {
    #[snafu(display("{input:?} is not a valid duration"))]
    Invalid { input: String },
}

/// Wraps [`StdDuration`] with a compact, unit-suffixed textual representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(StdDuration);

const UNITS: &[(&str, u64)] = &[
    ("d", 24 * 60 * 60),
    ("h", 60 * 60),
    ("m", 60),
    ("s", 1),
];

impl Duration {
    pub fn from_secs(secs: u64) -> Self {
        Self(StdDuration::from_secs(secs))
    }

    pub fn as_std(&self) -> StdDuration {
        self.0
    }
}

impl From<StdDuration> for Duration {
    fn from(duration: StdDuration) -> Self {
        Self(duration)
    }
}

impl From<Duration> for StdDuration {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parses a sequence of `<number><unit>` segments (`d`, `h`, `m`, `s`,
    /// `ms`), e.g. `"2h30m"` or `"500ms"`. A bare number of milliseconds with
    /// no unit is rejected; every segment must carry one of the known units.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return InvalidSnafu { input }.fail();
        }

        if let Some(digits) = input.strip_suffix("ms") {
            let millis: u64 = digits.parse().map_err(|_| {
                InvalidSnafu {
                    input: input.to_string(),
                }
                .build()
            })?;
            return Ok(Duration(StdDuration::from_millis(millis)));
        }

        let mut remaining = input;
        let mut total_secs: u64 = 0;
        let mut matched_any = false;

        while !remaining.is_empty() {
            let digit_end = remaining
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(remaining.len());
            if digit_end == 0 {
                return InvalidSnafu {
                    input: input.to_string(),
                }
                .fail();
            }
            let (digits, rest) = remaining.split_at(digit_end);

            let (unit, rest) = UNITS
                .iter()
                .find_map(|(suffix, secs)| rest.strip_prefix(suffix).map(|rest| (*secs, rest)))
                .ok_or_else(|| {
                    InvalidSnafu {
                        input: input.to_string(),
                    }
                    .build()
                })?;

            let value: u64 = digits.parse().map_err(|_| {
                InvalidSnafu {
                    input: input.to_string(),
                }
                .build()
            })?;
            total_secs += value * unit;
            matched_any = true;
            remaining = rest;
        }

        if !matched_any {
            return InvalidSnafu {
                input: input.to_string(),
            }
            .fail();
        }

        Ok(Duration(StdDuration::from_secs(total_secs)))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secs = self.0.as_secs();
        if secs == 0 {
            return write!(f, "{}ms", self.0.subsec_millis());
        }

        for (suffix, unit_secs) in UNITS {
            let count = secs / unit_secs;
            if count > 0 {
                write!(f, "{count}{suffix}")?;
                secs %= unit_secs;
            }
        }
        Ok(())
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("30s", 30)]
    #[case("5m", 300)]
    #[case("2h", 7200)]
    #[case("1d", 86400)]
    #[case("1h30m", 5400)]
    #[case("0s", 0)]
    fn parses_table_of_durations(#[case] input: &str, #[case] expected_secs: u64) {
        assert_eq!(input.parse::<Duration>().unwrap(), Duration::from_secs(expected_secs));
    }

    #[rstest]
    #[case("")]
    #[case("30")]
    #[case("30x")]
    #[case("h30")]
    fn rejects_table_of_invalid_inputs(#[case] input: &str) {
        assert!(input.parse::<Duration>().is_err());
    }

    #[test]
    fn parses_milliseconds() {
        assert_eq!(
            "500ms".parse::<Duration>().unwrap(),
            Duration(StdDuration::from_millis(500))
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let duration: Duration = "1h5m".parse().unwrap();
        let rendered = duration.to_string();
        assert_eq!(rendered.parse::<Duration>().unwrap(), duration);
    }
}
