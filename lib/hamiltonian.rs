//! Time evolution and decay-weighted integration of observables under a
//! time-independent Hamiltonian.
//!
//! Hamiltonians are expressed in units of MHz (cyclic frequency) and times in
//! microseconds, so that the phase accumulated by an energy eigenstate after
//! time `t` is `2π E t`.

use std::{ f64::consts::TAU, ops::Deref };
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    density::DensityOperator,
    error::{ MuSpinError, MuSpinResult },
    operator::{ HERMITIAN_TOL, Operator },
};

/// A Hermitian [`Operator`] representing the energy of a spin system.
#[derive(Clone, Debug, PartialEq)]
pub struct Hamiltonian(Operator);

impl Deref for Hamiltonian {
    type Target = Operator;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl AsRef<Operator> for Hamiltonian {
    fn as_ref(&self) -> &Operator { &self.0 }
}

impl From<Hamiltonian> for Operator {
    fn from(h: Hamiltonian) -> Self { h.0 }
}

/// An initial state and a set of observables expressed in the eigenbasis of a
/// [`Hamiltonian`].
///
/// Building a frame costs one diagonalization; any number of time traces and
/// decay integrals can then be computed from it.
#[derive(Clone, Debug)]
pub struct EigenFrame {
    // E[i] - E[j]
    dE: nd::Array2<f64>,
    rho: nd::Array2<C64>,
    // transposed, so that expectation values are elementwise sums
    ops_t: Vec<nd::Array2<C64>>,
}

impl EigenFrame {
    /// Dimension of the Hilbert space.
    pub fn size(&self) -> usize { self.rho.nrows() }

    /// Number of observables carried by the frame.
    pub fn num_operators(&self) -> usize { self.ops_t.len() }

    /// Expectation values of every observable at each of `times`, with shape
    /// `[times.len(), operators]`.
    pub fn evolve(&self, times: &[f64]) -> nd::Array2<f64> {
        debug!(
            size = self.size(),
            ntimes = times.len(),
            nops = self.ops_t.len(),
            "evolving density operator",
        );
        let mut results: nd::Array2<f64>
            = nd::Array2::zeros((times.len(), self.ops_t.len()));
        let mut rho_t: nd::Array2<C64>;
        for (&t, mut row) in times.iter().zip(results.outer_iter_mut()) {
            rho_t = nd::Zip::from(&self.rho).and(&self.dE)
                .map_collect(|r, de| *r * (-C64::i() * (TAU * *de * t)).exp());
            for (op_t, x) in self.ops_t.iter().zip(row.iter_mut()) {
                *x = nd::Zip::from(op_t).and(&rho_t)
                    .fold(C64::from(0.0), |acc, o, r| acc + *o * *r)
                    .re;
            }
        }
        results
    }

    /// Integrals over `t` from zero to infinity of every observable's
    /// expectation value, weighted by `exp(-t / tau)`.
    pub fn integrate_decaying(&self, tau: f64) -> MuSpinResult<nd::Array1<f64>> {
        if !(tau.is_finite() && tau > 0.0) {
            return Err(MuSpinError::InvalidDecay(tau));
        }
        debug!(size = self.size(), tau, "integrating decaying expectation values");
        let kernel: nd::Array2<C64>
            = nd::Zip::from(&self.rho).and(&self.dE)
            .map_collect(|r, de| *r / (C64::from(tau.recip()) + C64::i() * (TAU * *de)));
        let results: nd::Array1<f64>
            = self.ops_t.iter()
            .map(|op_t| {
                nd::Zip::from(op_t).and(&kernel)
                    .fold(C64::from(0.0), |acc, o, k| acc + *o * *k)
                    .re
            })
            .collect();
        Ok(results)
    }
}

impl Hamiltonian {
    /// Create a new Hamiltonian, failing if `op` is not Hermitian.
    pub fn new(op: Operator) -> MuSpinResult<Self> {
        if !op.is_hermitian_within(HERMITIAN_TOL) {
            return Err(MuSpinError::NonHermitian);
        }
        Ok(Self(op))
    }

    /// Create a new Hamiltonian from anything convertible into an
    /// [`Operator`], e.g. a [`SpinOperator`][crate::spinop::SpinOperator].
    pub fn from_spin_operator<O>(op: O) -> MuSpinResult<Self>
    where O: Into<Operator>
    {
        Self::new(op.into())
    }

    /// The zero Hamiltonian over the given subsystems.
    pub fn zeros(dim: &[usize]) -> MuSpinResult<Self> {
        Ok(Self(Operator::zeros(dim)?))
    }

    /// Return a reference to the underlying operator.
    pub fn as_operator(&self) -> &Operator { &self.0 }

    /// Sum of two Hamiltonians.
    pub fn try_add(&self, rhs: &Self) -> MuSpinResult<Self> {
        Ok(Self(self.0.try_add(&rhs.0)?))
    }

    /// Multiply by a real factor, e.g. a magnetic field strength.
    pub fn scale(&self, x: f64) -> Self { Self(&self.0 * x) }

    fn check_dims<O>(&self, rho0: &DensityOperator, operators: &[O])
        -> MuSpinResult<()>
    where O: AsRef<Operator>
    {
        let dim = self.0.dim();
        if rho0.dim() != dim {
            return Err(MuSpinError::IncompatibleDimension(
                dim.to_vec(), rho0.dim().to_vec()));
        }
        if let Some(op) = operators.iter().find(|op| op.as_ref().dim() != dim) {
            return Err(MuSpinError::IncompatibleDimension(
                dim.to_vec(), op.as_ref().dim().to_vec()));
        }
        Ok(())
    }

    /// Diagonalize once and express `rho0` and `operators` in the
    /// eigenbasis.
    pub fn eigen_frame<O>(&self, rho0: &DensityOperator, operators: &[O])
        -> MuSpinResult<EigenFrame>
    where O: AsRef<Operator>
    {
        self.check_dims(rho0, operators)?;
        let (E, V) = self.0.diagonalize()?;
        let n = E.len();
        let dE: nd::Array2<f64>
            = nd::Array2::from_shape_fn((n, n), |(i, j)| E[i] - E[j]);
        let rho = rho0.change_basis(&V)?.into_matrix();
        let ops_t: Vec<nd::Array2<C64>>
            = operators.iter()
            .map(|op| {
                op.as_ref().change_basis(&V)
                    .map(|o| o.into_matrix().reversed_axes())
            })
            .collect::<MuSpinResult<_>>()?;
        Ok(EigenFrame { dE, rho, ops_t })
    }

    /// Compute expectation values of `operators` for the state `rho0` evolved
    /// to each of `times`.
    ///
    /// The Hamiltonian is diagonalized once and every time is evaluated
    /// independently, so `times` may be in any order and unevenly spaced. The
    /// returned array has shape `[times.len(), operators.len()]`.
    pub fn evolve<O>(
        &self,
        rho0: &DensityOperator,
        times: &[f64],
        operators: &[O],
    ) -> MuSpinResult<nd::Array2<f64>>
    where O: AsRef<Operator>
    {
        Ok(self.eigen_frame(rho0, operators)?.evolve(times))
    }

    /// Compute the integrals over `t` from zero to infinity of the
    /// expectation values of `operators`, weighted by `exp(-t / tau)`.
    ///
    /// The integral is evaluated in closed form in the eigenbasis of the
    /// Hamiltonian. Divide by `tau` to obtain a decay-averaged expectation
    /// value.
    pub fn integrate_decaying<O>(
        &self,
        rho0: &DensityOperator,
        tau: f64,
        operators: &[O],
    ) -> MuSpinResult<nd::Array1<f64>>
    where O: AsRef<Operator>
    {
        if !(tau.is_finite() && tau > 0.0) {
            return Err(MuSpinError::InvalidDecay(tau));
        }
        self.eigen_frame(rho0, operators)?.integrate_decaying(tau)
    }
}
