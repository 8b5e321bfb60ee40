//! Dosing functions
//!
//! A dosing function maps time to an instantaneous dosing rate. Every
//! variant is a pure function of time closed over its construction
//! parameters, so the same [`Dosing`] value can be shared between models,
//! evaluated on scalars with [`Dosing::rate`] or on whole ndarray arrays with
//! [`Dosing::rates`].
//!
//! | Variant | Rate at time `t` |
//! |---------|------------------|
//! | constant(X) | `X` |
//! | pulse(X, t0, dt) | `X` if `(t mod dt) >= t0`, else `0` |
//! | sawtooth(X, dt) | `X · (t mod dt) / dt` |
//! | sine(X, dt) | `X · sin(2πt / dt) + X` |
//!
//! `mod` is the floored modulo, so the remainder carries the sign of `dt`.
//!
//! ```rust
//! use pkmodel::dosing;
//!
//! let pulse = dosing::pulse(1.0, 0.1, 0.2);
//! assert_eq!(pulse.rate(0.05).unwrap(), 0.0);
//! assert_eq!(pulse.rate(0.15).unwrap(), 1.0);
//! ```

use std::f64::consts::PI;
use std::fmt;

use ndarray::{Array, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Upper bound on the number of discontinuities reported by [`Dosing::breakpoints`].
const MAX_BREAKPOINTS: usize = 100_000;

/// Time-dependent dosing rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dosing {
    /// Constant rate `strength`
    Constant { strength: f64 },
    /// Rate `strength` during `[onset, period)` of every period, zero otherwise
    Pulse {
        strength: f64,
        onset: f64,
        period: f64,
    },
    /// Linear ramp from zero to `strength`, restarting every period
    Sawtooth { strength: f64, period: f64 },
    /// Sinusoid oscillating in `[0, 2 * strength]`
    Sine { strength: f64, period: f64 },
}

/// Constant dosing of strength `x`.
pub fn constant(x: f64) -> Dosing {
    Dosing::Constant { strength: x }
}

/// Dosing of strength `x` switched on from `t0` until the end of every period `dt`.
///
/// `t0` is expected in `[0, dt)`. Outside that range the window degenerates:
/// `t0 <= 0` keeps the dose on permanently, `t0 >= dt` keeps it off.
pub fn pulse(x: f64, t0: f64, dt: f64) -> Dosing {
    Dosing::Pulse {
        strength: x,
        onset: t0,
        period: dt,
    }
}

/// Dosing ramping from `0` to `x` over every period `dt`.
pub fn sawtooth(x: f64, dt: f64) -> Dosing {
    Dosing::Sawtooth {
        strength: x,
        period: dt,
    }
}

/// Sinusoidal dosing with mean `x`, amplitude `x` and period `dt`.
pub fn sine(x: f64, dt: f64) -> Dosing {
    Dosing::Sine {
        strength: x,
        period: dt,
    }
}

impl Dosing {
    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Dosing::Constant { .. } => "constant",
            Dosing::Pulse { .. } => "pulse",
            Dosing::Sawtooth { .. } => "sawtooth",
            Dosing::Sine { .. } => "sine",
        }
    }

    /// Strength `X` the function was built with.
    pub fn strength(&self) -> f64 {
        match *self {
            Dosing::Constant { strength }
            | Dosing::Pulse { strength, .. }
            | Dosing::Sawtooth { strength, .. }
            | Dosing::Sine { strength, .. } => strength,
        }
    }

    /// Period of the function, `None` for constant dosing.
    pub fn period(&self) -> Option<f64> {
        match *self {
            Dosing::Constant { .. } => None,
            Dosing::Pulse { period, .. }
            | Dosing::Sawtooth { period, .. }
            | Dosing::Sine { period, .. } => Some(period),
        }
    }

    /// Checks that the function can be evaluated.
    ///
    /// Every periodic variant divides by (or takes a modulo of) its period,
    /// which therefore has to be finite and nonzero.
    pub fn validate(&self) -> Result<(), DomainError> {
        let Some(period) = self.period() else {
            return Ok(());
        };
        if !period.is_finite() {
            return Err(DomainError::NonFinitePeriod {
                kind: self.kind(),
                period,
            });
        }
        if period == 0.0 {
            return Err(DomainError::ZeroPeriod { kind: self.kind() });
        }
        Ok(())
    }

    /// Dosing rate at time `t`.
    pub fn rate(&self, t: f64) -> Result<f64, DomainError> {
        self.validate()?;
        if !t.is_finite() {
            return Err(DomainError::NonFiniteTime(t));
        }
        Ok(self.rate_unchecked(t))
    }

    /// Dosing rates for every element of `times`, keeping its shape.
    pub fn rates<S, D>(&self, times: &ArrayBase<S, D>) -> Result<Array<f64, D>, DomainError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.validate()?;
        if let Some(&t) = times.iter().find(|t| !t.is_finite()) {
            return Err(DomainError::NonFiniteTime(t));
        }
        Ok(times.mapv(|t| self.rate_unchecked(t)))
    }

    /// Evaluates without validation. Callers must have run [`Dosing::validate`].
    #[inline(always)]
    pub(crate) fn rate_unchecked(&self, t: f64) -> f64 {
        match *self {
            Dosing::Constant { strength } => strength,
            Dosing::Pulse {
                strength,
                onset,
                period,
            } => {
                if floor_mod(t, period) >= onset {
                    strength
                } else {
                    0.0
                }
            }
            Dosing::Sawtooth { strength, period } => strength * floor_mod(t, period) / period,
            Dosing::Sine { strength, period } => strength * (2.0 * PI * t / period).sin() + strength,
        }
    }

    /// Times in `(0, t_end)` where the function jumps.
    ///
    /// Pulses switch at every period boundary and at every onset, sawtooth
    /// ramps reset at every period boundary. Constant and sinusoidal dosing
    /// are continuous, and so is a pulse whose window is always open or always
    /// closed. Returns an empty list when the function is invalid or when the
    /// number of jumps would exceed an internal cap.
    pub fn breakpoints(&self, t_end: f64) -> Vec<f64> {
        if self.validate().is_err() || !(t_end > 0.0) || !t_end.is_finite() {
            return Vec::new();
        }
        let Some((period, shift)) = self.jumps() else {
            return Vec::new();
        };

        let periods = (t_end / period).ceil();
        let per_period = if shift.is_some() { 2.0 } else { 1.0 };
        if periods * per_period > MAX_BREAKPOINTS as f64 {
            tracing::warn!(
                dosing = %self,
                t_end,
                "More than {} dosing discontinuities, the integrator steps across them",
                MAX_BREAKPOINTS
            );
            return Vec::new();
        }

        let mut points = Vec::with_capacity((periods * per_period) as usize + 2);
        for k in 0..=periods as usize {
            let start = k as f64 * period;
            points.push(start);
            if let Some(shift) = shift {
                points.push(start + shift);
            }
        }
        points.retain(|&t| t > 0.0 && t < t_end);
        points.sort_by(f64::total_cmp);
        points.dedup();
        points
    }

    /// Where a valid function jumps: every multiple of the returned length,
    /// plus the returned offset into each period for pulses.
    ///
    /// The remainder `t mod period` lies in `[0, period)` for a positive period
    /// and in `(period, 0]` for a negative one. A pulse switches where the
    /// remainder crosses the onset, i.e. at `t = onset (mod |period|)`, provided
    /// the onset falls inside that range.
    fn jumps(&self) -> Option<(f64, Option<f64>)> {
        match *self {
            Dosing::Constant { .. } | Dosing::Sine { .. } => None,
            Dosing::Sawtooth { period, .. } => Some((period.abs(), None)),
            Dosing::Pulse { onset, period, .. } => {
                let switching = if period > 0.0 {
                    onset > 0.0 && onset < period
                } else {
                    onset > period && onset <= 0.0
                };
                if !switching {
                    return None;
                }
                let length = period.abs();
                let shift = Some(onset.rem_euclid(length)).filter(|shift| *shift > 0.0);
                Some((length, shift))
            }
        }
    }
}

impl fmt::Display for Dosing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Dosing::Constant { strength } => write!(f, "constant(X={strength})"),
            Dosing::Pulse {
                strength,
                onset,
                period,
            } => write!(f, "pulse(X={strength}, t0={onset}, dt={period})"),
            Dosing::Sawtooth { strength, period } => {
                write!(f, "sawtooth(X={strength}, dt={period})")
            }
            Dosing::Sine { strength, period } => write!(f, "sine(X={strength}, dt={period})"),
        }
    }
}

/// Floored modulo: the remainder takes the sign of `period`.
#[inline(always)]
fn floor_mod(t: f64, period: f64) -> f64 {
    let r = t - period * (t / period).floor();
    // rounding can land exactly on the period
    if r.abs() >= period.abs() {
        r - period
    } else {
        r
    }
}
