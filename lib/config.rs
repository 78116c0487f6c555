//! TOML description of a complete experiment.
//!
//! ```toml
//! spins = ["mu", "e"]
//! field = [0.0, 0.005, 0.01]
//! muon_axis = "x"
//! acquire = "ei"
//!
//! [time]
//! start = 0.0
//! stop = 10.0
//! steps = 100
//!
//! [orientation]
//! mode = "powder"
//! count = 100
//! scheme = "zcw"
//!
//! [[hyperfine]]
//! i = 0
//! j = 1
//! isotropic = 4463.0
//! ```

use std::path::Path;
use ndarray as nd;
use serde::{ Deserialize, Serialize };
use tracing::info;
use crate::{
    error::{ MuSpinError, MuSpinResult },
    experiment::{ AcquireSet, ExperimentResults, MuonAxis, MuonExperiment },
    spinsys::MuonSpinSystem,
};

fn default_temperature() -> f64 { f64::INFINITY }

fn default_acquire() -> String { "e".into() }

fn default_scheme() -> String { "zcw".into() }

/// Initial muon polarization, either an axis label or a vector.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AxisConfig {
    Label(String),
    Vector(Vec<f64>),
}

impl Default for AxisConfig {
    fn default() -> Self { Self::Label("x".into()) }
}

impl AxisConfig {
    pub fn to_muon_axis(&self) -> MuSpinResult<MuonAxis> {
        match self {
            Self::Label(label) => MuonAxis::from_label(label),
            Self::Vector(v) => MuonAxis::from_vector(v),
        }
    }
}

/// Evenly spaced sampling times, in μs.
///
/// The default is 100 points from 0 to 10 μs inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeAxis {
    pub start: f64,
    pub stop: f64,
    pub steps: usize,
}

impl Default for TimeAxis {
    fn default() -> Self { Self { start: 0.0, stop: 10.0, steps: 100 } }
}

impl TimeAxis {
    pub fn to_array(&self) -> nd::Array1<f64> {
        nd::Array1::linspace(self.start, self.stop, self.steps)
    }
}

/// Evenly spaced external fields, in T, endpoints included.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRange {
    pub start: f64,
    pub stop: f64,
    pub steps: usize,
}

/// External field along z, in T.
///
/// A list or range runs the whole experiment once per value.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Value(f64),
    List(Vec<f64>),
    Range(FieldRange),
}

impl Default for FieldConfig {
    fn default() -> Self { Self::Value(0.0) }
}

impl FieldConfig {
    /// Every field value to simulate, in order.
    pub fn values(&self) -> MuSpinResult<Vec<f64>> {
        let fields: Vec<f64>
            = match self {
                Self::Value(B) => vec![*B],
                Self::List(B) => B.clone(),
                Self::Range(FieldRange { start, stop, steps }) => {
                    nd::Array1::linspace(*start, *stop, *steps).to_vec()
                },
            };
        if fields.is_empty() {
            return Err(MuSpinError::EmptyInput("no field values given".into()));
        }
        if let Some(B) = fields.iter().find(|B| !B.is_finite()) {
            return Err(MuSpinError::InvalidVector(
                format!("field values must be finite, got {}", B)));
        }
        Ok(fields)
    }
}

/// Crystallite orientations to average over.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OrientationConfig {
    Single {
        #[serde(default)]
        theta: f64,
        #[serde(default)]
        phi: f64,
    },
    Powder {
        count: usize,
        #[serde(default = "default_scheme")]
        scheme: String,
    },
}

impl Default for OrientationConfig {
    fn default() -> Self { Self::Single { theta: 0.0, phi: 0.0 } }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HyperfineConfig {
    pub i: usize,
    pub j: usize,
    /// Fermi contact coupling, in MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotropic: Option<f64>,
    /// Full coupling tensor, in MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensor: Option<Vec<Vec<f64>>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DipolarConfig {
    pub i: usize,
    pub j: usize,
    /// Vector from spin `i` to spin `j`, in Å.
    pub r: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuadrupolarConfig {
    pub i: usize,
    /// Electric field gradient tensor, in atomic units.
    pub efg: Vec<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ZeemanConfig {
    pub i: usize,
    /// Local magnetic field, in T.
    pub field: Vec<f64>,
}

fn tensor_from_rows(rows: &[Vec<f64>], what: &str) -> MuSpinResult<nd::Array2<f64>> {
    if rows.len() != 3 || rows.iter().any(|row| row.len() != 3) {
        return Err(MuSpinError::InvalidVector(
            format!("{} must be given as three rows of three numbers", what)));
    }
    Ok(nd::Array2::from_shape_fn((3, 3), |(a, b)| rows[a][b]))
}

/// Top-level experiment description.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Particle labels; see [`isotopes::lookup`][crate::isotopes::lookup].
    pub spins: Vec<String>,
    #[serde(default)]
    pub field: FieldConfig,
    /// Temperature of all non-muon spins, in K.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub muon_axis: AxisConfig,
    #[serde(default = "default_acquire")]
    pub acquire: String,
    /// Size of the worker thread pool; defaults to one per core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeAxis>,
    /// Explicit sampling times, in μs, as an alternative to `[time]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<f64>>,
    #[serde(default)]
    pub orientation: OrientationConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hyperfine: Vec<HyperfineConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dipolar: Vec<DipolarConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quadrupolar: Vec<QuadrupolarConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zeeman: Vec<ZeemanConfig>,
}

impl ExperimentConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> MuSpinResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load<P>(path: P) -> MuSpinResult<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MuSpinError::ConfigFile(path.display().to_string(), e))?;
        info!(path = %path.display(), "loaded experiment configuration");
        Self::from_toml_str(&text)
    }

    /// External field values, in T; see [`FieldConfig::values`].
    pub fn fields(&self) -> MuSpinResult<Vec<f64>> { self.field.values() }

    /// Parsed acquisition selector.
    pub fn acquire(&self) -> MuSpinResult<AcquireSet> { self.acquire.parse() }

    /// Sampling times, in μs.
    pub fn time_axis(&self) -> MuSpinResult<nd::Array1<f64>> {
        match (&self.time, &self.times) {
            (Some(_), Some(_)) => Err(MuSpinError::InvalidShape(
                "give either a [time] range or a list of times, not both".into())),
            (Some(range), None) => Ok(range.to_array()),
            (None, Some(times)) => Ok(nd::Array1::from_vec(times.clone())),
            (None, None) => Ok(TimeAxis::default().to_array()),
        }
    }

    /// Build the spin system described by `spins` and the interaction tables.
    pub fn build_spin_system(&self) -> MuSpinResult<MuonSpinSystem> {
        let mut system = MuonSpinSystem::new(&self.spins)?;
        for hf in self.hyperfine.iter() {
            match (hf.isotropic, &hf.tensor) {
                (Some(a), None) => {
                    system.add_isotropic_hyperfine_term(hf.i, hf.j, a)?;
                },
                (None, Some(rows)) => {
                    let A = tensor_from_rows(rows, "hyperfine tensor")?;
                    system.add_hyperfine_term(hf.i, hf.j, &A)?;
                },
                _ => {
                    return Err(MuSpinError::InvalidVector(
                        format!(
                            "hyperfine coupling {}-{} needs exactly one of \
                            `isotropic` or `tensor`",
                            hf.i, hf.j,
                        )
                    ));
                },
            }
        }
        for dip in self.dipolar.iter() {
            system.add_dipolar_term(dip.i, dip.j, &dip.r)?;
        }
        for quad in self.quadrupolar.iter() {
            let efg = tensor_from_rows(&quad.efg, "electric field gradient")?;
            system.add_quadrupolar_term(quad.i, &efg)?;
        }
        for zee in self.zeeman.iter() {
            system.add_zeeman_term(zee.i, &zee.field)?;
        }
        Ok(system)
    }

    /// Build a ready-to-run experiment with the configured terms,
    /// orientations, and starting state, set to the first configured field.
    pub fn build_experiment(&self) -> MuSpinResult<MuonExperiment> {
        let fields = self.fields()?;
        let system = self.build_spin_system()?;
        let mut expt = MuonExperiment::from_spin_system(system)?;
        expt.set_starting_state(self.muon_axis.to_muon_axis()?, self.temperature)?;
        expt.set_magnetic_field(fields[0])?;
        match &self.orientation {
            OrientationConfig::Single { theta, phi } => {
                expt.set_single_crystal(*theta, *phi);
            },
            OrientationConfig::Powder { count, scheme } => {
                expt.set_powder_average(*count, scheme)?;
            },
        }
        Ok(expt)
    }

    /// Build the experiment and run it at every configured field, recording
    /// the muon's x spin component over the configured time axis.
    pub fn run(&self) -> MuSpinResult<Vec<(f64, ExperimentResults)>> {
        let expt = self.build_experiment()?;
        let times = self.time_axis()?.to_vec();
        expt.run_field_sweep(&self.fields()?, &times, None, self.acquire()?)
    }
}
