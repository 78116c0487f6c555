//! Normalized quantum states over composite spin Hilbert spaces.

use std::ops::Deref;
use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use tracing::{ debug, warn };
use crate::{
    error::{ MuSpinError, MuSpinResult },
    operator::{ HERMITIAN_TOL, Operator },
    spin::SpinTotal,
    spinop::SpinAxis,
};

/// Compute the outer product `|a><b|` of two state vectors.
pub fn outer_prod(a: &nd::Array1<C64>, b: &nd::Array1<C64>)
    -> nd::Array2<C64>
{
    let na = a.len();
    let nb = b.len();
    nd::Array2::from_shape_vec(
        (na, nb),
        a.iter().cartesian_product(b)
            .map(|(ai, bj)| *ai * bj.conj())
            .collect(),
    )
    .expect("outer_prod: error reshaping array")
}

/// Split each full-space index into its (kept, traced) pair of sub-indices,
/// with subsystems ordered as in a Kronecker product (first subsystem most
/// significant).
fn split_indices(dim: &[usize], traced: &[bool]) -> Vec<(usize, usize)> {
    let n: usize = dim.iter().product();
    (0..n)
        .map(|mut idx| {
            let mut kept_idx: usize = 0;
            let mut kept_stride: usize = 1;
            let mut traced_idx: usize = 0;
            let mut traced_stride: usize = 1;
            for (d, t) in dim.iter().zip(traced).rev() {
                let digit = idx % d;
                idx /= d;
                if *t {
                    traced_idx += digit * traced_stride;
                    traced_stride *= d;
                } else {
                    kept_idx += digit * kept_stride;
                    kept_stride *= d;
                }
            }
            (kept_idx, traced_idx)
        })
        .collect()
}

/// A Hermitian, unit-trace [`Operator`] describing a (possibly mixed) quantum
/// state.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityOperator(Operator);

impl Deref for DensityOperator {
    type Target = Operator;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl AsRef<Operator> for DensityOperator {
    fn as_ref(&self) -> &Operator { &self.0 }
}

impl From<DensityOperator> for Operator {
    fn from(rho: DensityOperator) -> Self { rho.0 }
}

impl DensityOperator {
    /// Create a new density operator from a matrix, normalizing it to unit
    /// trace.
    ///
    /// Fails if the matrix is not square, does not match `dim`, has zero trace,
    /// or is not Hermitian after normalization.
    pub fn new(matrix: nd::Array2<C64>, dim: Option<Vec<usize>>)
        -> MuSpinResult<Self>
    {
        Self::from_operator(Operator::new(matrix, dim)?)
    }

    /// Normalize an existing operator into a density operator.
    pub fn from_operator(op: Operator) -> MuSpinResult<Self> {
        let tr = op.trace();
        if tr.is_zero() {
            return Err(MuSpinError::ZeroTrace);
        }
        // a Hermitian matrix has a real trace; dividing by an imaginary one
        // would turn an anti-Hermitian input into a Hermitian result
        let normalized = op / tr;
        if tr.im.abs() > HERMITIAN_TOL * tr.norm()
            || !normalized.is_hermitian_within(HERMITIAN_TOL)
        {
            return Err(MuSpinError::NonHermitian);
        }
        Ok(Self(normalized))
    }

    /// Create a classical mixture of basis states with the given (not
    /// necessarily normalized) populations.
    pub fn from_diagonal(populations: &nd::Array1<f64>) -> MuSpinResult<Self> {
        Self::new(
            nd::Array2::from_diag(&populations.mapv(C64::from)),
            None,
        )
    }

    /// Construct a product state from per-spin polarization directions.
    ///
    /// Each spin is prepared in the eigenstate of `v·S` with maximal eigenvalue
    /// (only the direction of `v` matters), after which its off-diagonal
    /// elements are multiplied by `1 - gamma`: a `gamma` of 0 leaves a pure
    /// coherent state and 1 leaves only the diagonal. The per-spin states are
    /// combined by Kronecker product in list order.
    pub fn from_vectors<V>(spins: &[f64], vectors: &[V], gammas: &[f64])
        -> MuSpinResult<Self>
    where V: AsRef<[f64]>
    {
        if spins.is_empty()
            || spins.len() != vectors.len()
            || spins.len() != gammas.len()
        {
            return Err(MuSpinError::EmptyInput(
                format!(
                    "lists of spins ({}), vectors ({}), and gammas ({}) must \
                    have equal, non-zero length",
                    spins.len(), vectors.len(), gammas.len(),
                )
            ));
        }
        let factors: Vec<Operator>
            = spins.iter().zip(vectors).zip(gammas)
            .map(|((I, v), gamma)| single_polarized(*I, v.as_ref(), *gamma))
            .collect::<MuSpinResult<_>>()?;
        let rho = Operator::kron_all(&factors)?;
        debug!(dim = ?rho.dim(), "built polarized density operator");
        Self::from_operator(rho)
    }

    /// Return a reference to the underlying operator.
    pub fn as_operator(&self) -> &Operator { &self.0 }

    /// Unwrap into the underlying operator.
    pub fn into_operator(self) -> Operator { self.0 }

    /// Kronecker product of two states, which is again a valid state.
    pub fn kron(&self, rhs: &Self) -> Self { Self(self.0.kron(&rhs.0)) }

    /// Trace out the subsystems at the given indices, returning the reduced
    /// state on the remaining subsystems (in their original order).
    ///
    /// Tracing out every subsystem leaves the 1×1 state `[1]`.
    pub fn partial_trace(&self, indices: &[usize]) -> MuSpinResult<Self> {
        let dim = self.0.dim();
        if let Some(bad) = indices.iter().find(|k| **k >= dim.len()) {
            return Err(MuSpinError::InvalidShape(
                format!(
                    "cannot trace over subsystem {} of a {}-subsystem state",
                    bad, dim.len(),
                )
            ));
        }
        let traced: Vec<bool>
            = (0..dim.len()).map(|k| indices.contains(&k)).collect();
        let new_dim: Vec<usize>
            = dim.iter().zip(&traced)
            .filter_map(|(d, t)| (!t).then_some(*d))
            .collect();
        let new_dim = if new_dim.is_empty() { vec![1] } else { new_dim };
        let m: usize = new_dim.iter().product();
        let split = split_indices(dim, &traced);
        let mut reduced: nd::Array2<C64> = nd::Array2::zeros((m, m));
        let matrix = self.0.matrix();
        for ((a, (ka, ta)), (b, (kb, tb)))
            in split.iter().enumerate().cartesian_product(split.iter().enumerate())
        {
            if ta == tb {
                reduced[[*ka, *kb]] += matrix[[a, b]];
            }
        }
        Self::new(reduced, Some(new_dim))
    }

    /// Expectation value of an observable in this state.
    ///
    /// The observable must act on the same subsystems. Any imaginary residue
    /// (which should only arise from round-off for Hermitian observables) is
    /// discarded, with a warning if it is not negligible.
    pub fn expectation(&self, op: &Operator) -> MuSpinResult<f64> {
        if op.dim() != self.0.dim() {
            return Err(MuSpinError::IncompatibleDimension(
                op.dim().to_vec(), self.0.dim().to_vec()));
        }
        let value: C64
            = op.matrix().iter().zip(self.0.matrix().t().iter())
            .map(|(o, r)| *o * *r)
            .sum();
        if value.im.abs() > 1e-9 * value.re.abs().max(1.0) {
            warn!(
                re = value.re,
                im = value.im,
                "discarding non-negligible imaginary part of expectation value",
            );
        }
        Ok(value.re)
    }
}

fn single_polarized(I: f64, v: &[f64], gamma: f64) -> MuSpinResult<Operator> {
    let I = SpinTotal::try_from_f64(I)?;
    if v.len() != 3 {
        return Err(MuSpinError::InvalidVector(
            format!("{:?} is not a valid 3D vector", v)));
    }
    if v.iter().all(|x| *x == 0.0) || v.iter().any(|x| !x.is_finite()) {
        return Err(MuSpinError::InvalidVector(
            format!("{:?} does not define a direction", v)));
    }
    if !(0.0..=1.0).contains(&gamma) {
        return Err(MuSpinError::InvalidGamma(gamma));
    }
    let n = I.dim();
    let mut proj: Operator = Operator::zeros(&[n])?;
    for (axis, vk) in SpinAxis::CARTESIAN.iter().zip(v) {
        let s = Operator::from_parts(axis.matrix(I), vec![n]);
        proj = proj.try_add(&(s * *vk))?;
    }
    let (E, V) = proj.diagonalize()?;
    // eigenvalues are ascending, so the maximal one is last
    let kmax = E.len() - 1;
    let psi: nd::Array1<C64> = V.column(kmax).to_owned();
    let mut rho = outer_prod(&psi, &psi);
    rho.indexed_iter_mut()
        .filter(|((i, j), _)| i != j)
        .for_each(|(_, r)| { *r *= 1.0 - gamma; });
    Operator::new(rho, Some(vec![n]))
}
