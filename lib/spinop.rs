//! Construction of single- and multi-spin angular momentum operators.

use std::{ fmt, ops::Deref, str::FromStr };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    error::{ MuSpinError, MuSpinResult },
    operator::Operator,
    spin::SpinTotal,
};

/// Names a single-spin observable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpinAxis {
    X,
    Y,
    Z,
    /// Raising part of Sx, i.e. `S+ / 2`, so that `Sx = Plus + Minus`.
    Plus,
    /// Lowering part of Sx, i.e. `S- / 2`.
    Minus,
    Identity,
}

// label -> axis
const AXIS_LABELS: [(&str, SpinAxis); 8] = [
    ("x", SpinAxis::X),
    ("y", SpinAxis::Y),
    ("z", SpinAxis::Z),
    ("+", SpinAxis::Plus),
    ("-", SpinAxis::Minus),
    ("0", SpinAxis::Identity),
    ("i", SpinAxis::Identity),
    ("identity", SpinAxis::Identity),
];

impl SpinAxis {
    /// The three Cartesian axes, in order.
    pub const CARTESIAN: [SpinAxis; 3] = [SpinAxis::X, SpinAxis::Y, SpinAxis::Z];

    /// Look up an axis by label (`x`, `y`, `z`, `+`, `-`, or `0` for the
    /// identity), case-insensitive.
    pub fn from_label(label: &str) -> MuSpinResult<Self> {
        let label = label.trim().to_lowercase();
        AXIS_LABELS.iter()
            .find(|(l, _)| *l == label)
            .map(|(_, axis)| *axis)
            .ok_or(MuSpinError::InvalidAxis(label))
    }

    /// Single-character label of the axis.
    pub fn label(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::Plus => '+',
            Self::Minus => '-',
            Self::Identity => '0',
        }
    }

    /// Matrix builder for this axis, acting on a projection sequence
    /// `+I, ..., -I`.
    fn builder(self) -> fn(&nd::Array1<f64>) -> nd::Array2<C64> {
        match self {
            Self::X => s_x,
            Self::Y => s_y,
            Self::Z => s_z,
            Self::Plus => s_plus,
            Self::Minus => s_minus,
            Self::Identity => s_identity,
        }
    }

    /// Matrix of this observable for a single spin.
    pub fn matrix(self, spin: SpinTotal) -> nd::Array2<C64> {
        (self.builder())(&spin.mvals())
    }
}

impl FromStr for SpinAxis {
    type Err = MuSpinError;

    fn from_str(s: &str) -> MuSpinResult<Self> { Self::from_label(s) }
}

impl TryFrom<char> for SpinAxis {
    type Error = MuSpinError;

    fn try_from(c: char) -> MuSpinResult<Self> {
        Self::from_label(c.encode_utf8(&mut [0; 4]))
    }
}

impl fmt::Display for SpinAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn s_plus(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    // <m + 1|S+|m> = sqrt(I(I + 1) - m(m + 1)) is the square root of the
    // cumulative sum of 2m over the descending projection sequence; the factor
    // 1/2 makes this the raising half of Sx
    let n = mvals.len();
    let mut op: nd::Array2<C64> = nd::Array2::zeros((n, n));
    let mut acc: f64 = 0.0;
    for (k, m) in mvals.iter().take(n.saturating_sub(1)).enumerate() {
        acc += 2.0 * m;
        op[[k, k + 1]] = C64::from(0.5 * acc.sqrt());
    }
    op
}

fn s_minus(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    s_plus(mvals).reversed_axes()
}

fn s_x(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    let p = s_plus(mvals);
    &p + &p.t()
}

fn s_y(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    let p = s_plus(mvals);
    (&p.t() - &p) * C64::i()
}

fn s_z(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    nd::Array2::from_diag(&mvals.mapv(C64::from))
}

fn s_identity(mvals: &nd::Array1<f64>) -> nd::Array2<C64> {
    nd::Array2::eye(mvals.len())
}

/// An [`Operator`] formed as the tensor product of single-spin observables.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinOperator(Operator);

impl Deref for SpinOperator {
    type Target = Operator;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl AsRef<Operator> for SpinOperator {
    fn as_ref(&self) -> &Operator { &self.0 }
}

impl From<SpinOperator> for Operator {
    fn from(op: SpinOperator) -> Self { op.0 }
}

impl SpinOperator {
    /// Construct a spin operator from parallel lists of spin values and axes.
    ///
    /// For example, `spins = [0.5, 0.5]` and `axes = [X, Z]` gives the Sx Iz
    /// operator for a pair of spin-1/2 particles. Spins must be positive
    /// half-integers.
    pub fn from_axes(spins: &[f64], axes: &[SpinAxis]) -> MuSpinResult<Self> {
        if spins.is_empty() || spins.len() != axes.len() {
            return Err(MuSpinError::EmptyInput(
                format!(
                    "lists of spins ({}) and axes ({}) must have equal, \
                    non-zero length",
                    spins.len(), axes.len(),
                )
            ));
        }
        let totals: Vec<SpinTotal>
            = spins.iter()
            .map(|I| SpinTotal::try_from_f64(*I))
            .collect::<MuSpinResult<_>>()?;
        Ok(Self::from_totals(&totals, axes))
    }

    /// Like [`Self::from_axes`], but with spins already validated.
    ///
    /// *Panics* if `spins` and `axes` are empty or of unequal length.
    pub(crate) fn from_totals(spins: &[SpinTotal], axes: &[SpinAxis]) -> Self {
        assert!(!spins.is_empty() && spins.len() == axes.len());
        let factors: Vec<Operator>
            = spins.iter().zip(axes)
            .map(|(I, axis)| {
                Operator::from_parts(axis.matrix(*I), vec![I.dim()])
            })
            .collect();
        // non-empty by the assertion above
        let mut acc: Operator = factors[0].clone();
        for f in factors.iter().skip(1) {
            acc = acc.kron(f);
        }
        Self(acc)
    }

    /// Single-spin operator for one axis.
    pub fn single(spin: f64, axis: SpinAxis) -> MuSpinResult<Self> {
        Self::from_axes(&[spin], &[axis])
    }

    /// Return a reference to the underlying operator.
    pub fn as_operator(&self) -> &Operator { &self.0 }

    /// Unwrap into the underlying operator.
    pub fn into_operator(self) -> Operator { self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &nd::Array2<C64>, b: &nd::Array2<C64>) -> bool {
        a.dim() == b.dim()
            && a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < 1e-12)
    }

    #[test]
    fn axis_labels() {
        assert_eq!(SpinAxis::from_label("x").unwrap(), SpinAxis::X);
        assert_eq!(SpinAxis::from_label("Z").unwrap(), SpinAxis::Z);
        assert_eq!("+".parse::<SpinAxis>().unwrap(), SpinAxis::Plus);
        assert_eq!(SpinAxis::try_from('-').unwrap(), SpinAxis::Minus);
        assert_eq!(SpinAxis::try_from('0').unwrap(), SpinAxis::Identity);
        assert!(matches!(
            SpinAxis::from_label("w"),
            Err(MuSpinError::InvalidAxis(_))
        ));
    }

    #[test]
    fn spin_half_matrices() {
        let sx = SpinOperator::single(0.5, SpinAxis::X).unwrap();
        let sy = SpinOperator::single(0.5, SpinAxis::Y).unwrap();
        let sz = SpinOperator::single(0.5, SpinAxis::Z).unwrap();
        let h = C64::from(0.5);
        let z = C64::from(0.0);
        assert!(close(sx.matrix(), &nd::array![[z, h], [h, z]]));
        assert!(close(
            sy.matrix(),
            &nd::array![[z, -C64::i() * 0.5], [C64::i() * 0.5, z]],
        ));
        assert!(close(sz.matrix(), &nd::array![[h, z], [z, -h]]));
        let sp = SpinOperator::single(0.5, SpinAxis::Plus).unwrap();
        assert!(close(sp.matrix(), &nd::array![[z, h], [z, z]]));
        let sm = SpinOperator::single(0.5, SpinAxis::Minus).unwrap();
        assert!(close(sp.try_add(&sm).unwrap().matrix(), sx.matrix()));
    }

    #[test]
    fn commutation_relations() {
        // [Sx, Sy] = i Sz for spin 1
        let sx = SpinOperator::single(1.0, SpinAxis::X).unwrap();
        let sy = SpinOperator::single(1.0, SpinAxis::Y).unwrap();
        let sz = SpinOperator::single(1.0, SpinAxis::Z).unwrap();
        let comm = sx.try_dot(&sy).unwrap()
            .try_sub(&sy.try_dot(&sx).unwrap()).unwrap();
        assert!(close(comm.matrix(), sz.scale(C64::i()).matrix()));
        // S^2 = I(I + 1) for spin 3/2
        let s2 = SpinAxis::CARTESIAN.iter()
            .map(|a| {
                let s = SpinOperator::single(1.5, *a).unwrap();
                s.try_dot(&s).unwrap()
            })
            .reduce(|acc, s| acc.try_add(&s).unwrap())
            .unwrap();
        let expected = Operator::identity(&[4]).unwrap().scale(1.5 * 2.5);
        assert!(close(s2.matrix(), expected.matrix()));
    }

    #[test]
    fn multi_spin_embedding() {
        let spins = [0.5, 1.0, 0.5];
        let op = SpinOperator::from_axes(
            &spins,
            &[SpinAxis::Identity, SpinAxis::Z, SpinAxis::Identity],
        )
        .unwrap();
        let embedded
            = Operator::identity(&[2]).unwrap()
            .kron(&SpinOperator::single(1.0, SpinAxis::Z).unwrap())
            .kron(&Operator::identity(&[2]).unwrap());
        assert_eq!(op.dim(), &[2, 3, 2]);
        assert_eq!(*op, embedded);
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(
            SpinOperator::from_axes(&[0.3], &[SpinAxis::X]),
            Err(MuSpinError::InvalidSpin(_))
        ));
        assert!(matches!(
            SpinOperator::from_axes(&[], &[]),
            Err(MuSpinError::EmptyInput(_))
        ));
        assert!(matches!(
            SpinOperator::from_axes(&[0.5, 0.5], &[SpinAxis::X]),
            Err(MuSpinError::EmptyInput(_))
        ));
    }
}
