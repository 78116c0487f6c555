//! Generic square operators over composite spin Hilbert spaces.
//!
//! An [`Operator`] pairs a complex matrix with the list of dimensions of the
//! subsystems it acts on, e.g. `[2, 3]` for a spin-1/2 tensored with a spin-1
//! (a 6×6 matrix). Operators combine only with operators of identical
//! subsystem structure, except under the Kronecker product, which concatenates
//! the dimension lists.
//!
//! All operations return new values; no matrix storage is shared between an
//! operand and a result.

use std::ops::{ Div, Mul, Neg };
use ndarray::{ self as nd, linalg::kron };
use ndarray_linalg::{ Eigh, UPLO };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::error::{ MuSpinError, MuSpinResult };

/// Relative tolerance used when validating that density matrices and
/// Hamiltonians are Hermitian; see [`Operator::is_hermitian_within`].
pub const HERMITIAN_TOL: f64 = 1e-10;

/// A square complex matrix tagged with the dimensions of the subsystems it
/// tensors over.
#[derive(Clone, Debug)]
pub struct Operator {
    matrix: nd::Array2<C64>,
    dim: Vec<usize>,
}

impl PartialEq for Operator {
    /// Exact comparison of dimension lists and matrix elements.
    fn eq(&self, other: &Self) -> bool {
        self.dim == other.dim && self.matrix == other.matrix
    }
}

impl AsRef<Operator> for Operator {
    fn as_ref(&self) -> &Operator { self }
}

impl Operator {
    /// Create a new operator.
    ///
    /// If `dim` is `None`, the operator is treated as acting on a single opaque
    /// subsystem of size equal to that of the matrix.
    pub fn new(matrix: nd::Array2<C64>, dim: Option<Vec<usize>>)
        -> MuSpinResult<Self>
    {
        let (n, m) = matrix.dim();
        if n != m {
            return Err(MuSpinError::InvalidShape(
                format!("operator matrix must be square, got {}×{}", n, m)));
        }
        let dim = dim.unwrap_or_else(|| vec![n]);
        if dim.is_empty() || dim.iter().any(|d| *d == 0) {
            return Err(MuSpinError::InvalidShape(
                format!("invalid subsystem dimensions {:?}", dim)));
        }
        if dim.iter().product::<usize>() != n {
            return Err(MuSpinError::InvalidShape(
                format!("dimensions {:?} incompatible with {}×{} matrix",
                    dim, n, n)));
        }
        Ok(Self { matrix, dim })
    }

    /// Create an operator from a real-valued matrix.
    pub fn from_real(matrix: nd::Array2<f64>, dim: Option<Vec<usize>>)
        -> MuSpinResult<Self>
    {
        Self::new(matrix.mapv(C64::from), dim)
    }

    // for use where the invariant holds by construction
    pub(crate) fn from_parts(matrix: nd::Array2<C64>, dim: Vec<usize>) -> Self {
        debug_assert_eq!(dim.iter().product::<usize>(), matrix.nrows());
        Self { matrix, dim }
    }

    /// Identity operator over the given subsystems.
    pub fn identity(dim: &[usize]) -> MuSpinResult<Self> {
        let n: usize = dim.iter().product();
        Self::new(nd::Array2::eye(n), Some(dim.to_vec()))
    }

    /// Zero operator over the given subsystems.
    pub fn zeros(dim: &[usize]) -> MuSpinResult<Self> {
        let n: usize = dim.iter().product();
        Self::new(nd::Array2::zeros((n, n)), Some(dim.to_vec()))
    }

    /// Return a reference to the underlying matrix.
    pub fn matrix(&self) -> &nd::Array2<C64> { &self.matrix }

    /// Unwrap into the underlying matrix.
    pub fn into_matrix(self) -> nd::Array2<C64> { self.matrix }

    /// Return the subsystem dimensions.
    pub fn dim(&self) -> &[usize] { &self.dim }

    /// Return the size of the (square) matrix.
    pub fn size(&self) -> usize { self.matrix.nrows() }

    /// Spin quantum numbers `(d - 1) / 2` implied by the subsystem dimensions.
    pub fn spins(&self) -> Vec<f64> {
        self.dim.iter().map(|d| (*d as f64 - 1.0) / 2.0).collect()
    }

    /// Sum of the main diagonal.
    pub fn trace(&self) -> C64 { self.matrix.diag().sum() }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        Self {
            matrix: self.matrix.t().mapv(|a| a.conj()),
            dim: self.dim.clone(),
        }
    }

    /// Return `true` if the matrix is exactly equal to its conjugate
    /// transpose.
    pub fn is_hermitian(&self) -> bool {
        self.matrix.iter().zip(self.matrix.t().iter())
            .all(|(aij, aji)| *aij == aji.conj())
    }

    /// Return `true` if every element differs from the corresponding element
    /// of the conjugate transpose by at most `tol` times the largest element
    /// magnitude (or `tol` itself for an all-zero matrix).
    pub fn is_hermitian_within(&self, tol: f64) -> bool {
        let scale: f64
            = self.matrix.iter().map(|a| a.norm()).fold(0.0, f64::max)
            .max(1.0);
        self.matrix.iter().zip(self.matrix.t().iter())
            .all(|(aij, aji)| (*aij - aji.conj()).norm() <= tol * scale)
    }

    fn check_dim(&self, other: &Self) -> MuSpinResult<()> {
        if self.dim == other.dim {
            Ok(())
        } else {
            Err(MuSpinError::IncompatibleDimension(
                self.dim.clone(), other.dim.clone()))
        }
    }

    /// Sum of two operators acting on the same subsystems.
    pub fn try_add(&self, rhs: &Self) -> MuSpinResult<Self> {
        self.check_dim(rhs)?;
        Ok(Self { matrix: &self.matrix + &rhs.matrix, dim: self.dim.clone() })
    }

    /// Difference of two operators acting on the same subsystems.
    pub fn try_sub(&self, rhs: &Self) -> MuSpinResult<Self> {
        self.check_dim(rhs)?;
        Ok(Self { matrix: &self.matrix - &rhs.matrix, dim: self.dim.clone() })
    }

    /// Matrix product of two operators acting on the same subsystems.
    pub fn try_dot(&self, rhs: &Self) -> MuSpinResult<Self> {
        self.check_dim(rhs)?;
        Ok(Self { matrix: self.matrix.dot(&rhs.matrix), dim: self.dim.clone() })
    }

    /// Add `x` times the identity.
    pub fn add_scalar<X>(&self, x: X) -> Self
    where X: Into<C64>
    {
        let x: C64 = x.into();
        let mut matrix = self.matrix.clone();
        matrix.diag_mut().iter_mut().for_each(|a| { *a += x; });
        Self { matrix, dim: self.dim.clone() }
    }

    /// Subtract `x` times the identity.
    pub fn sub_scalar<X>(&self, x: X) -> Self
    where X: Into<C64>
    {
        self.add_scalar(-x.into())
    }

    /// Multiply every element by `x`.
    pub fn scale<X>(&self, x: X) -> Self
    where X: Into<C64>
    {
        let x: C64 = x.into();
        Self { matrix: &self.matrix * x, dim: self.dim.clone() }
    }

    /// Kronecker (tensor) product with `self` on the left.
    pub fn kron(&self, rhs: &Self) -> Self {
        Self {
            matrix: kron(&self.matrix, &rhs.matrix),
            dim: self.dim.iter().chain(rhs.dim.iter()).copied().collect(),
        }
    }

    /// Kronecker product of an ordered sequence of operators, accumulated left
    /// to right.
    pub fn kron_all<'a, I>(ops: I) -> MuSpinResult<Self>
    where I: IntoIterator<Item = &'a Operator>
    {
        let mut iter = ops.into_iter();
        let first = iter.next()
            .ok_or_else(|| MuSpinError::EmptyInput(
                "cannot take the Kronecker product of zero operators".into()))?;
        let mut acc: Self = first.clone();
        for op in iter {
            acc = acc.kron(op);
        }
        Ok(acc)
    }

    /// Diagonalize the operator, assuming it is Hermitian.
    ///
    /// Only the lower triangle of the matrix is read. Returns eigenvalues in
    /// ascending order and the unitary matrix whose columns are the
    /// corresponding eigenvectors.
    pub fn diagonalize(&self) -> MuSpinResult<(nd::Array1<f64>, nd::Array2<C64>)>
    {
        let (E, V): (nd::Array1<f64>, nd::Array2<C64>)
            = self.matrix.eigh(UPLO::Lower)?;
        Ok((E, V))
    }

    /// Return a version of `self` in another basis, `basis^† · M · basis`.
    ///
    /// Passing the eigenvectors of `self` as `basis` diagonalizes it.
    pub fn change_basis(&self, basis: &nd::Array2<C64>) -> MuSpinResult<Self> {
        let n = self.size();
        if basis.dim() != (n, n) {
            return Err(MuSpinError::InvalidShape(
                format!("basis of shape {:?} incompatible with {}×{} operator",
                    basis.dim(), n, n)));
        }
        let basis_h: nd::Array2<C64> = basis.t().mapv(|a| a.conj());
        Ok(Self {
            matrix: basis_h.dot(&self.matrix).dot(basis),
            dim: self.dim.clone(),
        })
    }

    /// Return `true` if all elements are exactly zero.
    pub fn is_zero(&self) -> bool { self.matrix.iter().all(|a| a.is_zero()) }
}

impl Mul<C64> for &Operator {
    type Output = Operator;

    fn mul(self, x: C64) -> Operator { self.scale(x) }
}

impl Mul<f64> for &Operator {
    type Output = Operator;

    fn mul(self, x: f64) -> Operator { self.scale(x) }
}

impl Mul<C64> for Operator {
    type Output = Operator;

    fn mul(mut self, x: C64) -> Operator {
        self.matrix.mapv_inplace(|a| a * x);
        self
    }
}

impl Mul<f64> for Operator {
    type Output = Operator;

    fn mul(mut self, x: f64) -> Operator {
        self.matrix.mapv_inplace(|a| a * x);
        self
    }
}

impl Div<C64> for &Operator {
    type Output = Operator;

    fn div(self, x: C64) -> Operator {
        Operator { matrix: &self.matrix / x, dim: self.dim.clone() }
    }
}

impl Div<f64> for &Operator {
    type Output = Operator;

    fn div(self, x: f64) -> Operator {
        Operator { matrix: self.matrix.mapv(|a| a / x), dim: self.dim.clone() }
    }
}

impl Div<C64> for Operator {
    type Output = Operator;

    fn div(mut self, x: C64) -> Operator {
        self.matrix.mapv_inplace(|a| a / x);
        self
    }
}

impl Div<f64> for Operator {
    type Output = Operator;

    fn div(mut self, x: f64) -> Operator {
        self.matrix.mapv_inplace(|a| a / x);
        self
    }
}

impl Neg for &Operator {
    type Output = Operator;

    fn neg(self) -> Operator {
        Operator { matrix: self.matrix.mapv(|a| -a), dim: self.dim.clone() }
    }
}
