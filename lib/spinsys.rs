//! Description of a spin system containing a single muon: an ordered list of
//! particle species plus the physical interactions between them.
//!
//! Vectors are given in the crystal frame as 3-component arrays and tensors as
//! 3×3 arrays. Interactions are converted to operators in MHz.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    error::{ MuSpinError, MuSpinResult },
    hamiltonian::Hamiltonian,
    isotopes::{ self, SpinSpecies, DIPOLAR_MHZ, EFG_MHZ },
    operator::Operator,
    spin::SpinTotal,
    spinop::{ SpinAxis, SpinOperator },
};

// tolerance on the symmetry of an electric field gradient tensor
const SYMMETRY_TOL: f64 = 1e-9;

/// A single physical interaction within a [`MuonSpinSystem`].
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionTerm {
    /// Coupling of spin `i` to a local magnetic field (T), `γ_i B·S_i`.
    Zeeman { i: usize, field: nd::Array1<f64> },
    /// Hyperfine coupling tensor (MHz), `S_i·A·S_j`.
    Hyperfine { i: usize, j: usize, tensor: nd::Array2<f64> },
    /// Magnetic dipole-dipole coupling between spins separated by `r` (Å).
    Dipolar { i: usize, j: usize, r: nd::Array1<f64> },
    /// Coupling of a spin ≥ 1 nucleus to an electric field gradient (atomic
    /// units).
    Quadrupolar { i: usize, efg: nd::Array2<f64> },
}

fn check_vector(v: &nd::Array1<f64>, what: &str) -> MuSpinResult<()> {
    if v.len() != 3 || v.iter().any(|x| !x.is_finite()) {
        return Err(MuSpinError::InvalidVector(
            format!("{} must have three finite components, got {}", what, v)));
    }
    Ok(())
}

fn check_tensor(t: &nd::Array2<f64>, what: &str) -> MuSpinResult<()> {
    if t.dim() != (3, 3) || t.iter().any(|x| !x.is_finite()) {
        return Err(MuSpinError::InvalidVector(
            format!("{} must be a finite 3×3 tensor, got shape {:?}",
                what, t.dim())));
    }
    Ok(())
}

fn check_rotation(R: &nd::Array2<f64>) -> MuSpinResult<()> {
    if R.dim() != (3, 3) {
        return Err(MuSpinError::InvalidShape(
            format!("rotation matrix must be 3×3, got {:?}", R.dim())));
    }
    Ok(())
}

impl InteractionTerm {
    /// Indices of the spins this term acts on.
    pub fn spins(&self) -> Vec<usize> {
        match self {
            Self::Zeeman { i, .. } => vec![*i],
            Self::Hyperfine { i, j, .. } => vec![*i, *j],
            Self::Dipolar { i, j, .. } => vec![*i, *j],
            Self::Quadrupolar { i, .. } => vec![*i],
        }
    }

    /// Short name of the interaction.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zeeman { .. } => "zeeman",
            Self::Hyperfine { .. } => "hyperfine",
            Self::Dipolar { .. } => "dipolar",
            Self::Quadrupolar { .. } => "quadrupolar",
        }
    }

    /// Return the term in a frame rotated by `R`: vectors transform as `R v`
    /// and tensors as `R T Rᵀ`.
    pub fn rotate(&self, R: &nd::Array2<f64>) -> MuSpinResult<Self> {
        check_rotation(R)?;
        let rot_t = |T: &nd::Array2<f64>| R.dot(T).dot(&R.t());
        let term
            = match self {
                Self::Zeeman { i, field }
                    => Self::Zeeman { i: *i, field: R.dot(field) },
                Self::Hyperfine { i, j, tensor }
                    => Self::Hyperfine { i: *i, j: *j, tensor: rot_t(tensor) },
                Self::Dipolar { i, j, r }
                    => Self::Dipolar { i: *i, j: *j, r: R.dot(r) },
                Self::Quadrupolar { i, efg }
                    => Self::Quadrupolar { i: *i, efg: rot_t(efg) },
            };
        Ok(term)
    }
}

/// An ordered collection of spins containing exactly one muon, along with the
/// interactions between them.
#[derive(Clone, Debug)]
pub struct MuonSpinSystem {
    species: Vec<SpinSpecies>,
    totals: Vec<SpinTotal>,
    muon: usize,
    terms: Vec<InteractionTerm>,
}

impl MuonSpinSystem {
    /// Create a new spin system from particle labels (see
    /// [`isotopes::lookup`]), e.g. `["mu", "e", "2H"]`.
    ///
    /// Fails if no labels are given, if any label is unknown, or if the labels
    /// do not contain exactly one muon.
    pub fn new<S>(labels: &[S]) -> MuSpinResult<Self>
    where S: AsRef<str>
    {
        if labels.is_empty() {
            return Err(MuSpinError::EmptyInput(
                "a spin system needs at least one spin".into()));
        }
        let species: Vec<SpinSpecies>
            = labels.iter()
            .map(|l| isotopes::lookup(l.as_ref()))
            .collect::<MuSpinResult<_>>()?;
        let muons: Vec<usize>
            = species.iter().enumerate()
            .filter_map(|(k, s)| s.is_muon().then_some(k))
            .collect();
        if muons.len() != 1 {
            return Err(MuSpinError::NoMuon(muons.len()));
        }
        let totals: Vec<SpinTotal>
            = species.iter()
            .map(|s| SpinTotal::try_from_f64(s.spin))
            .collect::<MuSpinResult<_>>()?;
        debug!(
            spins = ?species.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
            "created spin system",
        );
        Ok(Self { species, totals, muon: muons[0], terms: Vec::new() })
    }

    /// Number of spins.
    pub fn len(&self) -> usize { self.species.len() }

    pub fn is_empty(&self) -> bool { self.species.is_empty() }

    /// Spin quantum numbers, in order.
    pub fn spins(&self) -> Vec<f64> { self.totals.iter().map(|I| I.f()).collect() }

    /// Species of the `i`-th spin.
    pub fn species(&self, i: usize) -> Option<&SpinSpecies> { self.species.get(i) }

    fn check_index(&self, i: usize) -> MuSpinResult<()> {
        if i >= self.len() {
            return Err(MuSpinError::InvalidShape(
                format!("spin index {} out of range for {} spins", i, self.len())));
        }
        Ok(())
    }

    /// Spin quantum number of the `i`-th spin.
    pub fn spin(&self, i: usize) -> MuSpinResult<f64> {
        self.check_index(i)?;
        Ok(self.totals[i].f())
    }

    /// Gyromagnetic ratio of the `i`-th spin, in MHz/T.
    pub fn gamma(&self, i: usize) -> MuSpinResult<f64> {
        self.check_index(i)?;
        Ok(self.species[i].gamma)
    }

    /// Hilbert space dimensions of all spins, in order.
    pub fn dims(&self) -> Vec<usize> { self.totals.iter().map(|I| I.dim()).collect() }

    /// Index of the muon.
    pub fn muon_index(&self) -> usize { self.muon }

    /// All interaction terms, in the order they were added.
    pub fn terms(&self) -> &[InteractionTerm] { &self.terms }

    /// Build the operator acting as the given axes on the given spins and as
    /// the identity on all others.
    pub fn operator(&self, axes: &[(usize, SpinAxis)]) -> MuSpinResult<SpinOperator> {
        let mut all_axes: Vec<SpinAxis> = vec![SpinAxis::Identity; self.len()];
        let mut seen: Vec<bool> = vec![false; self.len()];
        for (i, axis) in axes.iter() {
            self.check_index(*i)?;
            if seen[*i] {
                return Err(MuSpinError::InvalidShape(
                    format!("spin index {} given more than once", i)));
            }
            seen[*i] = true;
            all_axes[*i] = *axis;
        }
        Ok(SpinOperator::from_totals(&self.totals, &all_axes))
    }

    fn validate(&self, term: &InteractionTerm) -> MuSpinResult<()> {
        for i in term.spins() {
            self.check_index(i)?;
        }
        match term {
            InteractionTerm::Zeeman { field, .. } => {
                check_vector(field, "local field")?;
            },
            InteractionTerm::Hyperfine { i, j, tensor } => {
                if i == j {
                    return Err(MuSpinError::InvalidShape(
                        format!("hyperfine coupling of spin {} to itself", i)));
                }
                check_tensor(tensor, "hyperfine tensor")?;
            },
            InteractionTerm::Dipolar { i, j, r } => {
                if i == j {
                    return Err(MuSpinError::InvalidShape(
                        format!("dipolar coupling of spin {} to itself", i)));
                }
                check_vector(r, "dipolar vector")?;
                if r.iter().all(|x| *x == 0.0) {
                    return Err(MuSpinError::InvalidVector(
                        "dipolar vector must be non-zero".into()));
                }
            },
            InteractionTerm::Quadrupolar { i, efg } => {
                check_tensor(efg, "electric field gradient")?;
                let scale = efg.iter().fold(1.0_f64, |acc, x| acc.max(x.abs()));
                if efg.iter().zip(efg.t().iter())
                    .any(|(a, b)| (a - b).abs() > SYMMETRY_TOL * scale)
                {
                    return Err(MuSpinError::InvalidVector(
                        "electric field gradient must be symmetric".into()));
                }
                let s = &self.species[*i];
                if s.spin < 1.0 || s.quadrupole == 0.0 {
                    return Err(MuSpinError::InvalidSpin(
                        format!("{} has no quadrupole moment", s.label)));
                }
            },
        }
        Ok(())
    }

    /// Add an interaction term after checking it against the system.
    pub fn add_term(&mut self, term: InteractionTerm) -> MuSpinResult<()> {
        self.validate(&term)?;
        debug!(term = term.name(), spins = ?term.spins(), "added interaction term");
        self.terms.push(term);
        Ok(())
    }

    /// Couple spin `i` to a local magnetic field, in T.
    pub fn add_zeeman_term(&mut self, i: usize, field: &[f64])
        -> MuSpinResult<()>
    {
        self.add_term(InteractionTerm::Zeeman {
            i,
            field: nd::Array1::from_vec(field.to_vec()),
        })
    }

    /// Couple spins `i` and `j` through a hyperfine tensor, in MHz.
    pub fn add_hyperfine_term(&mut self, i: usize, j: usize, tensor: &nd::Array2<f64>)
        -> MuSpinResult<()>
    {
        self.add_term(InteractionTerm::Hyperfine { i, j, tensor: tensor.clone() })
    }

    /// Couple spins `i` and `j` through an isotropic (Fermi contact)
    /// hyperfine interaction of strength `a`, in MHz.
    pub fn add_isotropic_hyperfine_term(&mut self, i: usize, j: usize, a: f64)
        -> MuSpinResult<()>
    {
        self.add_hyperfine_term(i, j, &(nd::Array2::<f64>::eye(3) * a))
    }

    /// Couple spins `i` and `j` through the magnetic dipolar interaction, with
    /// `r` the vector between them, in Å.
    pub fn add_dipolar_term(&mut self, i: usize, j: usize, r: &[f64])
        -> MuSpinResult<()>
    {
        self.add_term(InteractionTerm::Dipolar {
            i,
            j,
            r: nd::Array1::from_vec(r.to_vec()),
        })
    }

    /// Couple spin `i` to an electric field gradient tensor, in atomic units.
    pub fn add_quadrupolar_term(&mut self, i: usize, efg: &nd::Array2<f64>)
        -> MuSpinResult<()>
    {
        self.add_term(InteractionTerm::Quadrupolar { i, efg: efg.clone() })
    }

    /// Return a copy of the system with every term rotated by `R`.
    pub fn rotate(&self, R: &nd::Array2<f64>) -> MuSpinResult<Self> {
        check_rotation(R)?;
        let terms: Vec<InteractionTerm>
            = self.terms.iter()
            .map(|t| t.rotate(R))
            .collect::<MuSpinResult<_>>()?;
        Ok(Self { terms, ..self.clone() })
    }

    fn zero_matrix(&self) -> nd::Array2<C64> {
        let n: usize = self.dims().iter().product();
        nd::Array2::zeros((n, n))
    }

    // Σ_ab T_ab S_i^a S_j^b
    fn bilinear(&self, i: usize, j: usize, T: &nd::Array2<f64>, acc: &mut nd::Array2<C64>)
        -> MuSpinResult<()>
    {
        let cart = SpinAxis::CARTESIAN;
        for ((a, ax_a), (b, ax_b)) in cart.iter().enumerate()
            .cartesian_product(cart.iter().enumerate())
        {
            let t = T[[a, b]];
            if t == 0.0 { continue; }
            let op: Operator
                = if i == j {
                    let sa = self.operator(&[(i, *ax_a)])?;
                    let sb = self.operator(&[(i, *ax_b)])?;
                    sa.try_dot(&sb)?
                } else {
                    self.operator(&[(i, *ax_a), (j, *ax_b)])?.into_operator()
                };
            acc.scaled_add(C64::from(t), op.matrix());
        }
        Ok(())
    }

    fn add_term_matrix(&self, term: &InteractionTerm, acc: &mut nd::Array2<C64>)
        -> MuSpinResult<()>
    {
        match term {
            InteractionTerm::Zeeman { i, field } => {
                let g = self.species[*i].gamma;
                for (B, axis) in field.iter().zip(SpinAxis::CARTESIAN) {
                    if *B == 0.0 { continue; }
                    let op = self.operator(&[(*i, axis)])?;
                    acc.scaled_add(C64::from(g * B), op.matrix());
                }
            },
            InteractionTerm::Hyperfine { i, j, tensor } => {
                self.bilinear(*i, *j, tensor, acc)?;
            },
            InteractionTerm::Dipolar { i, j, r } => {
                let rnorm: f64 = r.dot(r).sqrt();
                let rhat: nd::Array1<f64> = r / rnorm;
                let D: f64
                    = DIPOLAR_MHZ * self.species[*i].gamma * self.species[*j].gamma
                    / rnorm.powi(3);
                let rr: nd::Array2<f64>
                    = nd::Array2::from_shape_fn((3, 3), |(a, b)| rhat[a] * rhat[b]);
                let T: nd::Array2<f64> = (nd::Array2::<f64>::eye(3) - rr * 3.0) * D;
                self.bilinear(*i, *j, &T, acc)?;
            },
            InteractionTerm::Quadrupolar { i, efg } => {
                let s = &self.species[*i];
                let I2 = 2.0 * s.spin;
                let Q: f64 = EFG_MHZ * s.quadrupole / (I2 * (I2 - 1.0));
                self.bilinear(*i, *i, &(efg * Q), acc)?;
            },
        }
        Ok(())
    }

    /// Operator for a single interaction term, in MHz.
    pub fn term_operator(&self, term: &InteractionTerm) -> MuSpinResult<Operator> {
        self.validate(term)?;
        let mut acc = self.zero_matrix();
        self.add_term_matrix(term, &mut acc)?;
        Operator::new(acc, Some(self.dims()))
    }

    /// Sum of all interaction terms as a [`Hamiltonian`]; the zero operator if
    /// the system has no terms.
    pub fn hamiltonian(&self) -> MuSpinResult<Hamiltonian> {
        let mut acc = self.zero_matrix();
        for term in self.terms.iter() {
            self.add_term_matrix(term, &mut acc)?;
        }
        Hamiltonian::new(Operator::new(acc, Some(self.dims()))?)
    }

    /// Zeeman Hamiltonian of all spins per unit external field along z,
    /// `Σ_i γ_i S_z^(i)` in MHz/T.
    pub fn zeeman_operator(&self) -> MuSpinResult<Hamiltonian> {
        let mut acc = self.zero_matrix();
        for (i, s) in self.species.iter().enumerate() {
            let op = self.operator(&[(i, SpinAxis::Z)])?;
            acc.scaled_add(C64::from(s.gamma), op.matrix());
        }
        Hamiltonian::new(Operator::new(acc, Some(self.dims()))?)
    }
}
