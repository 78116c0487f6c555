//! Crystallite orientations for powder averaging.
//!
//! Orientations are polar/azimuthal angle pairs `(theta, phi)` in radians,
//! each paired with a weight; weights returned by the schemes here sum to 1.

use std::{ f64::consts::TAU, fmt, str::FromStr };
use ndarray as nd;
use ndarray_linalg::Solve;
use tracing::debug;
use crate::error::{ MuSpinError, MuSpinResult };

/// Rotation matrix taking the crystal frame to the orientation `(theta, phi)`:
/// the z axis is mapped onto the direction with polar angle `theta` and
/// azimuthal angle `phi`.
pub fn rotation_matrix(theta: f64, phi: f64) -> nd::Array2<f64> {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    nd::array![
        [cp * ct, -sp, cp * st],
        [sp * ct,  cp, sp * st],
        [-st,     0.0,      ct],
    ]
}

/// A spherical quadrature scheme.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PowderScheme {
    /// Zaremba-Conroy-Wolfsberg lattice with equal weights.
    Zcw,
    /// Midpoint ZCW lattice with weights adjusted to integrate all spherical
    /// harmonics of rank 1 and 2 exactly.
    Shrewd,
}

const SCHEME_LABELS: [(&str, PowderScheme); 2] = [
    ("zcw", PowderScheme::Zcw),
    ("shrewd", PowderScheme::Shrewd),
];

impl FromStr for PowderScheme {
    type Err = MuSpinError;

    fn from_str(s: &str) -> MuSpinResult<Self> {
        let s = s.trim().to_lowercase();
        SCHEME_LABELS.iter()
            .find(|(l, _)| *l == s)
            .map(|(_, scheme)| *scheme)
            .ok_or(MuSpinError::InvalidScheme(s))
    }
}

impl fmt::Display for PowderScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zcw => write!(f, "zcw"),
            Self::Shrewd => write!(f, "shrewd"),
        }
    }
}

// smallest lattice used by SHREWD; the weight correction needs more points
// than constraints
const SHREWD_MIN: usize = 21;

// Fibonacci lattice size N >= n (at least 8) and its generator
fn zcw_lattice(n: usize) -> (usize, usize) {
    let mut fib: Vec<usize> = vec![3, 5, 8];
    while fib[fib.len() - 1] < n {
        let k = fib.len();
        fib.push(fib[k - 1] + fib[k - 2]);
    }
    let k = fib.len();
    (fib[k - 1], fib[k - 3])
}

fn lattice_angles(N: usize, g: usize, shift: f64) -> Vec<(f64, f64)> {
    (0..N)
        .map(|j| {
            let x = j as f64 + shift;
            let theta = (2.0 * (x / N as f64).fract() - 1.0).acos();
            let phi = TAU * (x * g as f64 / N as f64).fract();
            (theta, phi)
        })
        .collect()
}

// rank-1 and rank-2 real spherical harmonics, up to normalization
fn harmonics(theta: f64, phi: f64) -> [f64; 8] {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let (x, y, z) = (st * cp, st * sp, ct);
    [x, y, z, x * y, y * z, x * z, x * x - y * y, 3.0 * z * z - 1.0]
}

fn shrewd_weights(angles: &[(f64, f64)]) -> MuSpinResult<nd::Array1<f64>> {
    let N = angles.len();
    let mut A: nd::Array2<f64> = nd::Array2::zeros((9, N));
    for (j, (theta, phi)) in angles.iter().enumerate() {
        A[[0, j]] = 1.0;
        for (k, f) in harmonics(*theta, *phi).into_iter().enumerate() {
            A[[k + 1, j]] = f;
        }
    }
    let w0: nd::Array1<f64> = nd::Array1::from_elem(N, 1.0 / N as f64);
    let mut target: nd::Array1<f64> = nd::Array1::zeros(9);
    target[0] = 1.0;
    // minimum-norm w = w0 + Aᵀ λ such that A w = target
    let resid: nd::Array1<f64> = &target - &A.dot(&w0);
    let gram: nd::Array2<f64> = A.dot(&A.t());
    let lambda: nd::Array1<f64> = gram.solve_into(resid)?;
    let w: nd::Array1<f64> = w0 + A.t().dot(&lambda);
    if let Some(bad) = w.iter().find(|wj| !(wj.is_finite() && **wj > 0.0)) {
        return Err(MuSpinError::InvalidWeights(
            format!("SHREWD correction on {} points gave weight {}", N, bad)));
    }
    Ok(w)
}

impl PowderScheme {
    /// Generate at least `n` orientations with weights summing to 1.
    pub fn orientations(self, n: usize)
        -> MuSpinResult<(Vec<(f64, f64)>, Vec<f64>)>
    {
        let (angles, weights)
            = match self {
                Self::Zcw => {
                    let (N, g) = zcw_lattice(n);
                    let angles = lattice_angles(N, g, 0.0);
                    (angles, vec![1.0 / N as f64; N])
                },
                Self::Shrewd => {
                    let (N, g) = zcw_lattice(n.max(SHREWD_MIN));
                    let angles = lattice_angles(N, g, 0.5);
                    let weights = shrewd_weights(&angles)?;
                    (angles, weights.to_vec())
                },
            };
        debug!(scheme = %self, requested = n, generated = angles.len(), "powder orientations");
        Ok((angles, weights))
    }
}
