//! Total-spin quantum numbers and their projection ladders.

use ndarray as nd;
use crate::error::{ MuSpinError, MuSpinResult };

/// A positive total-spin quantum number `I`, stored as the number of halves
/// `2I` so that integer and half-integer spins are both exact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpinTotal(u32);

impl SpinTotal {
    /// Create from a number of halves; `None` for zero.
    pub fn from_halves(twice: u32) -> Option<Self> {
        (twice > 0).then_some(Self(twice))
    }

    /// Return `2I`.
    pub fn halves(self) -> u32 { self.0 }

    /// Return `I` as an `f64`.
    pub fn f(self) -> f64 { f64::from(self.0) / 2.0 }

    /// Parse a spin value, failing unless it is a positive multiple of 1/2.
    ///
    /// Zero is rejected because a spin-0 particle contributes nothing to the
    /// spin Hilbert space.
    pub fn try_from_f64(f: f64) -> MuSpinResult<Self> {
        let twice = 2.0 * f;
        if !f.is_finite() || f < 0.5 || twice.fract() != 0.0
            || twice > f64::from(u32::MAX)
        {
            return Err(MuSpinError::InvalidSpin(
                format!("{} is not a valid spin value", f)));
        }
        Ok(Self(twice as u32))
    }

    /// Number of projection states, `2I + 1`.
    pub fn dim(self) -> usize { self.0 as usize + 1 }

    /// Projection values `I, I - 1, ..., -I`, the row/column order of every
    /// single-spin matrix.
    pub fn mvals(self) -> nd::Array1<f64> {
        let top = self.0 as i64;
        (0..=top)
            .map(|k| (top - 2 * k) as f64 / 2.0)
            .collect()
    }
}

impl From<SpinTotal> for f64 {
    fn from(I: SpinTotal) -> Self { I.f() }
}

impl TryFrom<f64> for SpinTotal {
    type Error = MuSpinError;

    fn try_from(f: f64) -> MuSpinResult<Self> { Self::try_from_f64(f) }
}
