//! Time control parsing and machine-speed scaling.
//!
//! A workload's nominal time control is calibrated on a baseline machine. This
//! module rescales it by the ratio between that baseline's node throughput and
//! the throughput measured locally, so that slower workers get more time and
//! faster workers get less.
//!
//! Three grammars are understood, all in seconds:
//! - `moves/base+increment` (e.g. `40/60+0.5`)
//! - `moves/base` (e.g. `40/60`)
//! - `base+increment` (e.g. `10.0+0.1`)

use std::fmt;
use std::str::FromStr;

use crate::error::TimeControlError;

/// A parsed time control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeControl {
    /// `moves/base+increment`
    MovesBaseIncrement { moves: u32, base: f64, increment: f64 },
    /// `moves/base`
    MovesBase { moves: u32, base: f64 },
    /// `base+increment`
    BaseIncrement { base: f64, increment: f64 },
}

impl TimeControl {
    /// Multiply every clock component by `factor`, rounding to 2 decimals.
    ///
    /// The move count of a repeating control is never scaled.
    pub fn scale(&self, factor: f64) -> Self {
        match *self {
            Self::MovesBaseIncrement {
                moves,
                base,
                increment,
            } => Self::MovesBaseIncrement {
                moves,
                base: round_centis(base * factor),
                increment: round_centis(increment * factor),
            },
            Self::MovesBase { moves, base } => Self::MovesBase {
                moves,
                base: round_centis(base * factor),
            },
            Self::BaseIncrement { base, increment } => Self::BaseIncrement {
                base: round_centis(base * factor),
                increment: round_centis(increment * factor),
            },
        }
    }
}

impl FromStr for TimeControl {
    type Err = TimeControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TimeControlError::Malformed(s.to_string());
        let text = s.trim();

        match text.split_once('/') {
            Some((moves, clock)) => {
                let moves = moves.trim().parse::<u32>().map_err(|_| malformed())?;
                match clock.split_once('+') {
                    Some((base, increment)) => Ok(Self::MovesBaseIncrement {
                        moves,
                        base: parse_seconds(base).ok_or_else(malformed)?,
                        increment: parse_seconds(increment).ok_or_else(malformed)?,
                    }),
                    None => Ok(Self::MovesBase {
                        moves,
                        base: parse_seconds(clock).ok_or_else(malformed)?,
                    }),
                }
            }
            None => {
                let (base, increment) = text.split_once('+').ok_or_else(malformed)?;
                Ok(Self::BaseIncrement {
                    base: parse_seconds(base).ok_or_else(malformed)?,
                    increment: parse_seconds(increment).ok_or_else(malformed)?,
                })
            }
        }
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MovesBaseIncrement {
                moves,
                base,
                increment,
            } => write!(
                f,
                "{}/{}+{}",
                moves,
                format_seconds(base),
                format_seconds(increment)
            ),
            Self::MovesBase { moves, base } => write!(f, "{}/{}", moves, format_seconds(base)),
            Self::BaseIncrement { base, increment } => {
                write!(f, "{}+{}", format_seconds(base), format_seconds(increment))
            }
        }
    }
}

/// Ratio by which the baseline machine is faster than this one.
///
/// Both speeds are nodes per second. A zero, negative or non-finite result is
/// rejected since it would produce a nonsensical clock.
pub fn speed_factor(baseline_nps: f64, measured_nps: f64) -> Result<f64, TimeControlError> {
    let factor = baseline_nps / measured_nps;
    if !factor.is_finite() || factor <= 0.0 {
        return Err(TimeControlError::InvalidSpeed {
            factor,
            baseline_nps,
            measured_nps,
        });
    }
    Ok(factor)
}

/// Parse `nominal` and scale it by `factor`, returning the canonical string.
pub fn scale_time_control(nominal: &str, factor: f64) -> Result<String, TimeControlError> {
    let tc: TimeControl = nominal.parse()?;
    Ok(tc.scale(factor).to_string())
}

fn parse_seconds(text: &str) -> Option<f64> {
    let value = text.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn round_centis(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Seconds always carry a fractional part: `120` renders as `120.0`.
fn format_seconds(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
#[path = "time_control_tests.rs"]
mod time_control_tests;
