//! A "virtual spectrometer": repeated simulation of a spin system over a set
//! of crystallite orientations, averaged into a single measurement.

use std::{ fmt, str::FromStr };
use indexmap::IndexMap;
use ndarray as nd;
use rayon::iter::{ IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator };
use tracing::{ debug, info };
use crate::{
    density::DensityOperator,
    error::{ MuSpinError, MuSpinResult },
    hamiltonian::Hamiltonian,
    isotopes::{ H_PLANCK, K_B, MU_TAU },
    operator::Operator,
    powder::{ rotation_matrix, PowderScheme },
    spin::SpinTotal,
    spinop::SpinAxis,
    spinsys::MuonSpinSystem,
};

/// Initial polarization direction of the muon.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MuonAxis {
    /// One of the Cartesian axes.
    Axis(SpinAxis),
    /// An arbitrary unit vector.
    Vector([f64; 3]),
}

impl Default for MuonAxis {
    fn default() -> Self { Self::Axis(SpinAxis::X) }
}

impl MuonAxis {
    /// Parse `x`, `y`, or `z`.
    pub fn from_label(label: &str) -> MuSpinResult<Self> {
        match SpinAxis::from_label(label)? {
            axis @ (SpinAxis::X | SpinAxis::Y | SpinAxis::Z) => Ok(Self::Axis(axis)),
            _ => Err(MuSpinError::InvalidAxis(label.to_string())),
        }
    }

    /// Normalize a 3-component direction.
    pub fn from_vector(v: &[f64]) -> MuSpinResult<Self> {
        if v.len() != 3 || v.iter().any(|x| !x.is_finite()) {
            return Err(MuSpinError::InvalidVector(
                format!("muon axis must have three finite components, got {:?}", v)));
        }
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(MuSpinError::InvalidVector(
                "muon axis must be non-zero".into()));
        }
        Ok(Self::Vector([v[0] / norm, v[1] / norm, v[2] / norm]))
    }

    /// Unit vector along the axis.
    pub fn direction(&self) -> [f64; 3] {
        match self {
            Self::Axis(SpinAxis::Y) => [0.0, 1.0, 0.0],
            Self::Axis(SpinAxis::Z) => [0.0, 0.0, 1.0],
            Self::Axis(_) => [1.0, 0.0, 0.0],
            Self::Vector(v) => *v,
        }
    }
}

impl FromStr for MuonAxis {
    type Err = MuSpinError;

    fn from_str(s: &str) -> MuSpinResult<Self> { Self::from_label(s) }
}

/// Kind of quantity recorded by [`MuonExperiment::run_experiment`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Acquire {
    /// Expectation values at each requested time (`e`).
    Evolution,
    /// Expectation values integrated against the muon decay, normalized by
    /// the muon lifetime (`i`).
    Integral,
}

impl Acquire {
    pub fn label(self) -> char {
        match self {
            Self::Evolution => 'e',
            Self::Integral => 'i',
        }
    }
}

impl TryFrom<char> for Acquire {
    type Error = MuSpinError;

    fn try_from(c: char) -> MuSpinResult<Self> {
        match c.to_ascii_lowercase() {
            'e' => Ok(Self::Evolution),
            'i' => Ok(Self::Integral),
            _ => Err(MuSpinError::InvalidAcquire(c.to_string())),
        }
    }
}

impl fmt::Display for Acquire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Non-empty selection of [`Acquire`] kinds, parsed from strings like `"e"`,
/// `"i"`, or `"ei"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AcquireSet {
    evolution: bool,
    integral: bool,
}

impl AcquireSet {
    pub fn evolution() -> Self { Self { evolution: true, integral: false } }

    pub fn integral() -> Self { Self { evolution: false, integral: true } }

    pub fn both() -> Self { Self { evolution: true, integral: true } }

    pub fn contains(&self, acq: Acquire) -> bool {
        match acq {
            Acquire::Evolution => self.evolution,
            Acquire::Integral => self.integral,
        }
    }
}

impl Default for AcquireSet {
    fn default() -> Self { Self::evolution() }
}

impl FromStr for AcquireSet {
    type Err = MuSpinError;

    fn from_str(s: &str) -> MuSpinResult<Self> {
        let mut set = Self { evolution: false, integral: false };
        for c in s.trim().chars() {
            match Acquire::try_from(c).map_err(|_| MuSpinError::InvalidAcquire(s.into()))? {
                Acquire::Evolution => { set.evolution = true; },
                Acquire::Integral => { set.integral = true; },
            }
        }
        if !(set.evolution || set.integral) {
            return Err(MuSpinError::InvalidAcquire(s.into()));
        }
        Ok(set)
    }
}

impl fmt::Display for AcquireSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.evolution { write!(f, "e")?; }
        if self.integral { write!(f, "i")?; }
        Ok(())
    }
}

/// Orientation-averaged output of [`MuonExperiment::run_experiment`].
///
/// Both [`Acquire`] kinds are always present, evolution first. Evolution
/// arrays have shape `[times, operators]` and integral arrays
/// `[operators]`; a kind that was not requested holds an empty array.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentResults(IndexMap<Acquire, nd::ArrayD<f64>>);

impl ExperimentResults {
    pub fn get(&self, acq: Acquire) -> &nd::ArrayD<f64> {
        // both keys are inserted on construction
        &self.0[&acq]
    }

    pub fn evolution(&self) -> &nd::ArrayD<f64> { self.get(Acquire::Evolution) }

    pub fn integral(&self) -> &nd::ArrayD<f64> { self.get(Acquire::Integral) }

    pub fn iter(&self) -> impl Iterator<Item = (&Acquire, &nd::ArrayD<f64>)> + '_ {
        self.0.iter()
    }

    pub fn into_inner(self) -> IndexMap<Acquire, nd::ArrayD<f64>> { self.0 }
}

// weight-scaled contributions of a set of orientations
struct Partial {
    evolution: nd::Array2<f64>,
    integral: nd::Array1<f64>,
    weight: f64,
}

impl Partial {
    fn zeros(ntimes: usize, nops: usize) -> Self {
        Self {
            evolution: nd::Array2::zeros((ntimes, nops)),
            integral: nd::Array1::zeros(nops),
            weight: 0.0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.evolution += &other.evolution;
        self.integral += &other.integral;
        self.weight += other.weight;
        self
    }
}

/// Normalized Boltzmann populations of the Zeeman levels of a single spin
/// (ordered `m = +I, ..., -I`) in field `field` (T) at temperature `T` (K).
///
/// An infinite temperature gives uniform populations; a temperature of zero
/// or less puts all population in the lowest level(s).
pub fn thermal_populations(spin: SpinTotal, gamma: f64, field: f64, T: f64)
    -> nd::Array1<f64>
{
    // level energies in Hz
    let E: nd::Array1<f64> = spin.mvals() * (gamma * field * 1e6);
    let Emin: f64 = E.iter().copied().fold(f64::INFINITY, f64::min);
    let mut Z: nd::Array1<f64>
        = if T > 0.0 {
            // measured from the ground level so that no exponent is positive
            E.mapv(|e| (-H_PLANCK * (e - Emin) / (K_B * T)).exp())
        } else {
            E.mapv(|e| if e == Emin { 1.0 } else { 0.0 })
        };
    let total: f64 = Z.sum();
    if total > 0.0 && total.is_finite() {
        Z /= total;
    } else {
        Z.fill(1.0 / Z.len() as f64);
    }
    Z
}

/// Simulates muon spin experiments on a single [`MuonSpinSystem`].
///
/// The external field is always along the laboratory z axis; the spin
/// system's interactions are rotated into each crystallite orientation.
#[derive(Clone, Debug)]
pub struct MuonExperiment {
    system: MuonSpinSystem,
    zeeman: Hamiltonian,
    field: f64,
    orientations: Vec<(f64, f64)>,
    weights: Vec<f64>,
    muon_axis: MuonAxis,
    temperature: f64,
    rho0: DensityOperator,
}

impl MuonExperiment {
    /// Create an experiment on a spin system with no interactions, built from
    /// particle labels.
    ///
    /// Starts as a single crystal at `(0, 0)` in zero field, with the muon
    /// polarized along x and every other spin at infinite temperature.
    pub fn new<S>(labels: &[S]) -> MuSpinResult<Self>
    where S: AsRef<str>
    {
        Self::from_spin_system(MuonSpinSystem::new(labels)?)
    }

    /// Create an experiment on a pre-built spin system.
    pub fn from_spin_system(system: MuonSpinSystem) -> MuSpinResult<Self> {
        let zeeman = system.zeeman_operator()?;
        let muon_axis = MuonAxis::default();
        let temperature = f64::INFINITY;
        let rho0 = Self::starting_state(&system, 0.0, &muon_axis, temperature)?;
        Ok(Self {
            system,
            zeeman,
            field: 0.0,
            orientations: vec![(0.0, 0.0)],
            weights: vec![1.0],
            muon_axis,
            temperature,
            rho0,
        })
    }

    pub fn spin_system(&self) -> &MuonSpinSystem { &self.system }

    pub fn orientations(&self) -> &[(f64, f64)] { &self.orientations }

    pub fn weights(&self) -> &[f64] { &self.weights }

    /// External field along z, in T.
    pub fn field(&self) -> f64 { self.field }

    pub fn temperature(&self) -> f64 { self.temperature }

    pub fn muon_axis(&self) -> MuonAxis { self.muon_axis }

    /// Initial state of the whole system.
    pub fn rho0(&self) -> &DensityOperator { &self.rho0 }

    /// Per-tesla Zeeman Hamiltonian of all spins.
    pub fn zeeman_operator(&self) -> &Hamiltonian { &self.zeeman }

    /// Use a single crystallite with the given orientation.
    pub fn set_single_crystal(&mut self, theta: f64, phi: f64) {
        self.orientations = vec![(theta, phi)];
        self.weights = vec![1.0];
    }

    /// Average over at least `n` orientations generated by the named powder
    /// scheme (`zcw` or `shrewd`).
    pub fn set_powder_average(&mut self, n: usize, scheme: &str) -> MuSpinResult<()> {
        let scheme: PowderScheme = scheme.parse()?;
        let (orientations, weights) = scheme.orientations(n)?;
        self.orientations = orientations;
        self.weights = weights;
        Ok(())
    }

    /// Average over a custom set of orientations with non-negative weights.
    ///
    /// Weights need not be normalized, but must not all be zero.
    pub fn set_orientations(&mut self, orientations: &[(f64, f64)], weights: &[f64])
        -> MuSpinResult<()>
    {
        if orientations.is_empty() {
            return Err(MuSpinError::EmptyInput("no orientations given".into()));
        }
        if weights.len() != orientations.len() {
            return Err(MuSpinError::InvalidWeights(
                format!(
                    "got {} weights for {} orientations",
                    weights.len(), orientations.len(),
                )
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MuSpinError::InvalidWeights(
                "weights must be finite and non-negative".into()));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(MuSpinError::InvalidWeights(
                "weights must not sum to zero".into()));
        }
        self.orientations = orientations.to_vec();
        self.weights = weights.to_vec();
        Ok(())
    }

    /// Set the external field along z, in T.
    ///
    /// Unlike a plain setter, this also rebuilds the initial state from the
    /// new field, so the thermal populations of the non-muon spins always
    /// match the field in effect, whichever of this and
    /// [`Self::set_starting_state`] is called last.
    pub fn set_magnetic_field(&mut self, field: f64) -> MuSpinResult<()> {
        self.rho0 = Self::starting_state(
            &self.system, field, &self.muon_axis, self.temperature)?;
        self.field = field;
        Ok(())
    }

    /// Set the initial muon polarization and the temperature (K) of all other
    /// spins.
    pub fn set_starting_state(&mut self, muon_axis: MuonAxis, temperature: f64)
        -> MuSpinResult<()>
    {
        self.rho0 = Self::starting_state(
            &self.system, self.field, &muon_axis, temperature)?;
        self.muon_axis = muon_axis;
        self.temperature = temperature;
        Ok(())
    }

    fn starting_state(
        system: &MuonSpinSystem,
        field: f64,
        muon_axis: &MuonAxis,
        temperature: f64,
    ) -> MuSpinResult<DensityOperator> {
        let muon = system.muon_index();
        let factors: Vec<DensityOperator>
            = (0..system.len())
            .map(|i| {
                let I = system.spin(i)?;
                if i == muon {
                    DensityOperator::from_vectors(
                        &[I], &[muon_axis.direction()], &[0.0])
                } else {
                    let pops = thermal_populations(
                        SpinTotal::try_from_f64(I)?,
                        system.gamma(i)?,
                        field,
                        temperature,
                    );
                    DensityOperator::from_diagonal(&pops)
                }
            })
            .collect::<MuSpinResult<_>>()?;
        let mut rho = factors[0].clone();
        for f in factors.iter().skip(1) {
            rho = rho.kron(f);
        }
        debug!(
            axis = ?muon_axis.direction(),
            field,
            temperature,
            "built starting state",
        );
        Ok(rho)
    }

    fn run_orientation(
        &self,
        theta: f64,
        phi: f64,
        times: &[f64],
        operators: &[Operator],
        acquire: AcquireSet,
        weight: f64,
    ) -> MuSpinResult<Partial> {
        let R = rotation_matrix(theta, phi);
        let H_int = self.system.rotate(&R)?.hamiltonian()?;
        let H = self.zeeman.scale(self.field).try_add(&H_int)?;
        let frame = H.eigen_frame(&self.rho0, operators)?;
        let mut partial = Partial::zeros(times.len(), operators.len());
        partial.weight = weight;
        if acquire.contains(Acquire::Evolution) {
            partial.evolution = frame.evolve(times) * weight;
        }
        if acquire.contains(Acquire::Integral) {
            partial.integral
                = frame.integrate_decaying(MU_TAU)? * (weight / MU_TAU);
        }
        debug!(theta, phi, weight, "finished orientation");
        Ok(partial)
    }

    /// Run the experiment, recording the expectation values of `operators`
    /// (the muon's x spin component if `None`) for each acquired kind,
    /// averaged over all orientations.
    ///
    /// Orientations are computed in parallel; the result is the same as for a
    /// sequential weighted average.
    pub fn run_experiment(
        &self,
        times: &[f64],
        operators: Option<&[Operator]>,
        acquire: AcquireSet,
    ) -> MuSpinResult<ExperimentResults> {
        let default_ops: Vec<Operator>;
        let operators: &[Operator]
            = match operators {
                Some(ops) => ops,
                None => {
                    let sx = self.system
                        .operator(&[(self.system.muon_index(), SpinAxis::X)])?;
                    default_ops = vec![sx.into_operator()];
                    &default_ops
                },
            };
        info!(
            orientations = self.orientations.len(),
            size = self.rho0.size(),
            times = times.len(),
            operators = operators.len(),
            acquire = %acquire,
            "starting experiment",
        );
        let total: Partial
            = self.orientations.par_iter()
            .zip(self.weights.par_iter())
            .map(|((theta, phi), w)| {
                self.run_orientation(*theta, *phi, times, operators, acquire, *w)
            })
            .try_reduce(
                || Partial::zeros(times.len(), operators.len()),
                |a, b| Ok(a.merge(b)),
            )?;
        // total weight is positive by construction of the orientation setters
        let norm = total.weight;
        let empty = || nd::ArrayD::<f64>::zeros(nd::IxDyn(&[0]));
        let mut results: IndexMap<Acquire, nd::ArrayD<f64>> = IndexMap::new();
        results.insert(
            Acquire::Evolution,
            if acquire.contains(Acquire::Evolution) {
                (total.evolution / norm).into_dyn()
            } else {
                empty()
            },
        );
        results.insert(
            Acquire::Integral,
            if acquire.contains(Acquire::Integral) {
                (total.integral / norm).into_dyn()
            } else {
                empty()
            },
        );
        info!("finished experiment");
        Ok(ExperimentResults(results))
    }

    /// Run the experiment once per external field in `fields` (T), e.g. to
    /// trace an avoided level crossing through the decay-averaged integral.
    ///
    /// `self` is left unchanged; each run rebuilds the initial state for its
    /// own field.
    pub fn run_field_sweep(
        &self,
        fields: &[f64],
        times: &[f64],
        operators: Option<&[Operator]>,
        acquire: AcquireSet,
    ) -> MuSpinResult<Vec<(f64, ExperimentResults)>> {
        if fields.is_empty() {
            return Err(MuSpinError::EmptyInput("no fields given".into()));
        }
        info!(fields = fields.len(), "starting field sweep");
        let mut expt = self.clone();
        fields.iter()
            .map(|&field| -> MuSpinResult<(f64, ExperimentResults)> {
                expt.set_magnetic_field(field)?;
                let results = expt.run_experiment(times, operators, acquire)?;
                Ok((field, results))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;
    use super::*;
    use crate::spinop::SpinOperator;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn acquire_selectors() {
        assert_eq!("e".parse::<AcquireSet>().unwrap(), AcquireSet::evolution());
        assert_eq!("i".parse::<AcquireSet>().unwrap(), AcquireSet::integral());
        assert_eq!("ie".parse::<AcquireSet>().unwrap(), AcquireSet::both());
        assert_eq!("ei".parse::<AcquireSet>().unwrap().to_string(), "ei");
        for bad in ["", "x", "ex"] {
            assert!(matches!(
                bad.parse::<AcquireSet>(),
                Err(MuSpinError::InvalidAcquire(_))
            ));
        }
    }

    #[test]
    fn muon_axes() {
        assert_eq!(MuonAxis::from_label("z").unwrap().direction(), [0.0, 0.0, 1.0]);
        assert!(matches!(MuonAxis::from_label("+"), Err(MuSpinError::InvalidAxis(_))));
        assert!(matches!(MuonAxis::from_label("w"), Err(MuSpinError::InvalidAxis(_))));
        let v = MuonAxis::from_vector(&[0.0, 3.0, 4.0]).unwrap().direction();
        assert!((v[1] - 0.6).abs() < EPSILON && (v[2] - 0.8).abs() < EPSILON);
        assert!(matches!(
            MuonAxis::from_vector(&[0.0, 0.0, 0.0]),
            Err(MuSpinError::InvalidVector(_))
        ));
        assert!(matches!(
            MuonAxis::from_vector(&[1.0, 0.0]),
            Err(MuSpinError::InvalidVector(_))
        ));
    }

    #[test]
    fn thermal_state() {
        let I = SpinTotal::try_from_f64(1.0).unwrap();
        let inf = thermal_populations(I, 42.577, 1.0, f64::INFINITY);
        assert!(inf.iter().all(|p| (p - 1.0 / 3.0).abs() < EPSILON));
        // positive gamma: m = -1 is the lowest level
        let zero = thermal_populations(I, 42.577, 1.0, 0.0);
        assert_eq!(zero.to_vec(), vec![0.0, 0.0, 1.0]);
        // zero field is degenerate at any temperature
        let degen = thermal_populations(I, 42.577, 0.0, 0.0);
        assert!(degen.iter().all(|p| (p - 1.0 / 3.0).abs() < EPSILON));
        let cold = thermal_populations(I, 42.577, 10.0, 1e-3);
        assert!((cold.sum() - 1.0).abs() < EPSILON);
        assert!(cold[2] > cold[1] && cold[1] > cold[0]);
    }

    #[test]
    fn default_state() {
        let expt = MuonExperiment::new(&["mu", "e"]).unwrap();
        assert_eq!(expt.orientations(), &[(0.0, 0.0)]);
        assert_eq!(expt.weights(), &[1.0]);
        assert_eq!(expt.field(), 0.0);
        let rho_mu = expt.rho0().partial_trace(&[1]).unwrap();
        let sx = SpinOperator::single(0.5, SpinAxis::X).unwrap();
        assert!((rho_mu.expectation(&sx).unwrap() - 0.5).abs() < EPSILON);
        let rho_e = expt.rho0().partial_trace(&[0]).unwrap();
        let half = DensityOperator::from_diagonal(&nd::array![1.0, 1.0]).unwrap();
        assert!(
            rho_e.matrix().iter().zip(half.matrix().iter())
                .all(|(a, b)| (a - b).norm() < EPSILON)
        );
        assert!(matches!(
            MuonExperiment::new::<&str>(&[]),
            Err(MuSpinError::EmptyInput(_))
        ));
    }

    #[test]
    fn static_muon() {
        // no interactions, no field: muon stays polarized
        let expt = MuonExperiment::new(&["mu"]).unwrap();
        let times = [0.0, 1.0, 2.5];
        let res = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
        assert_eq!(res.evolution().shape(), &[3, 1]);
        assert!(res.evolution().iter().all(|x| (x - 0.5).abs() < EPSILON));
        assert_eq!(res.integral().shape(), &[1]);
        assert!((res.integral()[[0]] - 0.5).abs() < EPSILON);
        let keys: Vec<Acquire> = res.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![Acquire::Evolution, Acquire::Integral]);
    }

    #[test]
    fn unrequested_kind_is_empty() {
        let expt = MuonExperiment::new(&["mu"]).unwrap();
        let res = expt.run_experiment(&[0.0], None, AcquireSet::integral()).unwrap();
        assert_eq!(res.evolution().len(), 0);
        assert_eq!(res.integral().len(), 1);
    }

    #[test]
    fn larmor_in_field() {
        let B = 0.01;
        let mut expt = MuonExperiment::new(&["mu"]).unwrap();
        expt.set_magnetic_field(B).unwrap();
        let nu = expt.spin_system().gamma(0).unwrap() * B;
        let times: Vec<f64> = (0..20).map(|k| 0.05 * k as f64).collect();
        let res = expt.run_experiment(&times, None, AcquireSet::evolution()).unwrap();
        for (k, t) in times.iter().enumerate() {
            assert!((res.evolution()[[k, 0]] - 0.5 * (TAU * nu * t).cos()).abs() < 1e-8);
        }
    }

    #[test]
    fn muonium_zero_field() {
        let A = 4463.0;
        let mut system = MuonSpinSystem::new(&["mu", "e"]).unwrap();
        system.add_isotropic_hyperfine_term(0, 1, A).unwrap();
        let expt = MuonExperiment::from_spin_system(system).unwrap();
        let times = [0.0, 0.25 / A, 0.5 / A, 1.0 / A];
        let res = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
        for (k, t) in times.iter().enumerate() {
            let expected = 0.25 * (1.0 + (TAU * A * t).cos());
            assert!((res.evolution()[[k, 0]] - expected).abs() < 1e-8);
        }
        assert!(res.evolution()[[2, 0]].abs() < 1e-8);
        let tau_term = 1.0 / (1.0 + (TAU * A * MU_TAU).powi(2));
        let expected = 0.25 * (1.0 + tau_term);
        assert!((res.integral()[[0]] - expected).abs() < 1e-8);
    }

    #[test]
    fn single_orientation_matches_single_crystal() {
        let mut system = MuonSpinSystem::new(&["mu", "H"]).unwrap();
        system.add_dipolar_term(0, 1, &[0.5, 0.0, 1.0]).unwrap();
        let mut expt = MuonExperiment::from_spin_system(system).unwrap();
        expt.set_magnetic_field(0.002).unwrap();
        let times = [0.0, 0.3, 1.1];
        expt.set_single_crystal(0.7, 1.9);
        let single = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
        expt.set_orientations(&[(0.7, 1.9)], &[3.0]).unwrap();
        let custom = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
        for ((_, a), (_, b)) in single.iter().zip(custom.iter()) {
            assert!(a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-12));
        }
    }

    #[test]
    fn weighted_average() {
        let mut system = MuonSpinSystem::new(&["mu", "H"]).unwrap();
        system.add_dipolar_term(0, 1, &[0.0, 0.0, 1.2]).unwrap();
        let mut expt = MuonExperiment::from_spin_system(system).unwrap();
        let times = [0.5, 2.0];
        let orients = [(0.0, 0.0), (1.2, 0.4)];
        let mut each: Vec<nd::ArrayD<f64>> = Vec::new();
        for (theta, phi) in orients {
            expt.set_single_crystal(theta, phi);
            each.push(
                expt.run_experiment(&times, None, AcquireSet::evolution())
                    .unwrap().evolution().clone()
            );
        }
        expt.set_orientations(&orients, &[1.0, 3.0]).unwrap();
        let avg = expt.run_experiment(&times, None, AcquireSet::evolution()).unwrap();
        let expected = (&each[0] * 0.25) + (&each[1] * 0.75);
        assert!(
            avg.evolution().iter().zip(expected.iter())
                .all(|(x, y)| (x - y).abs() < 1e-12)
        );
    }

    #[test]
    fn invalid_orientations() {
        let mut expt = MuonExperiment::new(&["mu"]).unwrap();
        assert!(matches!(expt.set_orientations(&[], &[]), Err(MuSpinError::EmptyInput(_))));
        assert!(matches!(
            expt.set_orientations(&[(0.0, 0.0)], &[1.0, 1.0]),
            Err(MuSpinError::InvalidWeights(_))
        ));
        assert!(matches!(
            expt.set_orientations(&[(0.0, 0.0)], &[-1.0]),
            Err(MuSpinError::InvalidWeights(_))
        ));
        assert!(matches!(
            expt.set_orientations(&[(0.0, 0.0), (1.0, 0.0)], &[0.0, 0.0]),
            Err(MuSpinError::InvalidWeights(_))
        ));
        assert!(matches!(
            expt.set_powder_average(10, "lebedev"),
            Err(MuSpinError::InvalidScheme(_))
        ));
        expt.set_powder_average(10, "ZCW").unwrap();
        assert_eq!(expt.orientations().len(), 13);
    }

    #[test]
    fn custom_operators_and_single_time() {
        let expt = MuonExperiment::new(&["mu", "e"]).unwrap();
        let ops: Vec<Operator>
            = [SpinAxis::X, SpinAxis::Z].into_iter()
            .map(|a| expt.spin_system().operator(&[(0, a)]).unwrap().into_operator())
            .collect();
        let res = expt.run_experiment(&[0.0], Some(ops.as_slice()), "ei".parse().unwrap()).unwrap();
        assert_eq!(res.evolution().shape(), &[1, 2]);
        assert_eq!(res.integral().shape(), &[2]);
        assert!((res.evolution()[[0, 0]] - 0.5).abs() < EPSILON);
        assert!(res.evolution()[[0, 1]].abs() < EPSILON);

        let bad = vec![Operator::identity(&[2]).unwrap()];
        assert!(matches!(
            expt.run_experiment(&[0.0], Some(bad.as_slice()), AcquireSet::evolution()),
            Err(MuSpinError::IncompatibleDimension(_, _))
        ));
    }

    #[test]
    fn field_sweep_decouples_muonium() {
        // anisotropic muonium: isotropic contact term plus a muon-electron
        // dipolar coupling, powder averaged, muon polarized along the field
        let mut system = MuonSpinSystem::new(&["mu", "e"]).unwrap();
        system.add_isotropic_hyperfine_term(0, 1, 4463.0).unwrap();
        system.add_dipolar_term(0, 1, &[0.0, 0.0, 1.0]).unwrap();
        let mut expt = MuonExperiment::from_spin_system(system).unwrap();
        expt.set_starting_state(MuonAxis::from_label("z").unwrap(), f64::INFINITY)
            .unwrap();
        expt.set_powder_average(20, "zcw").unwrap();
        let sz = vec![
            expt.spin_system().operator(&[(0, SpinAxis::Z)]).unwrap().into_operator()
        ];
        let fields = [0.0, 0.01, 0.1, 1.0];
        let sweep = expt.run_field_sweep(
            &fields, &[0.0], Some(sz.as_slice()), AcquireSet::integral()).unwrap();
        assert_eq!(sweep.len(), fields.len());
        assert_eq!(expt.field(), 0.0);
        let integrals: Vec<f64>
            = sweep.iter()
            .map(|(_, res)| res.integral()[[0]])
            .collect();
        for ((B, _), expected) in sweep.iter().zip(fields) {
            assert_eq!(*B, expected);
        }
        // most of the polarization is lost to the hyperfine coupling at zero
        // field and recovered as the field decouples the two spins
        assert!(integrals[0] < 0.3);
        assert!(integrals[3] > 0.45);
        assert!(integrals[3] - integrals[0] > 0.15);
        assert!(matches!(
            expt.run_field_sweep(&[], &[0.0], None, AcquireSet::integral()),
            Err(MuSpinError::EmptyInput(_))
        ));
    }
}
