//! Error type shared by all parts of the simulation engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuSpinError {
    /// Returned when a matrix is not square or when a dimension list does not
    /// match the size of the matrix it describes.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Returned when two operators are combined whose subsystem dimensions
    /// differ.
    #[error("incompatible dimensions: {0:?} and {1:?}")]
    IncompatibleDimension(Vec<usize>, Vec<usize>),

    /// Returned for a spin value that is not a positive half-integer, or a spin
    /// label that does not name a known species.
    #[error("invalid spin: {0}")]
    InvalidSpin(String),

    /// Returned for an unrecognized spin axis label.
    #[error("invalid spin axis: {0}")]
    InvalidAxis(String),

    /// Returned for a direction, position, or tensor with the wrong number of
    /// components, or with zero length where a direction is needed.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// Returned for a decoherence factor outside of `[0, 1]`.
    #[error("invalid decoherence factor {0}: must be in [0, 1]")]
    InvalidGamma(f64),

    /// Returned for an unrecognized powder averaging scheme.
    #[error("invalid powder averaging scheme: {0}")]
    InvalidScheme(String),

    /// Returned when attempting to normalize a density matrix with zero trace.
    #[error("cannot define a density operator with zero trace")]
    ZeroTrace,

    /// Returned when a density matrix or Hamiltonian is not Hermitian.
    #[error("operator must be Hermitian")]
    NonHermitian,

    /// Returned when a list of spins, axes, vectors, or orientations is empty
    /// or when parallel lists have mismatched lengths.
    #[error("empty or mismatched input: {0}")]
    EmptyInput(String),

    /// Returned when a spin system does not contain exactly one muon.
    #[error("spin system must contain exactly one muon, found {0}")]
    NoMuon(usize),

    /// Returned for orientation weights that cannot be averaged over.
    #[error("invalid orientation weights: {0}")]
    InvalidWeights(String),

    /// Returned for a non-positive or non-finite decay constant.
    #[error("invalid decay constant {0}: must be positive and finite")]
    InvalidDecay(f64),

    /// Returned for an acquisition selector other than combinations of `e` and
    /// `i`.
    #[error("invalid acquisition selector: {0:?}")]
    InvalidAcquire(String),

    /// Returned when an experiment description cannot be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Returned when an experiment description cannot be read from disk.
    #[error("cannot read configuration file {0}: {1}")]
    ConfigFile(String, #[source] std::io::Error),

    /// Returned when a diagonalization or linear solve fails.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}
pub type MuSpinResult<T> = Result<T, MuSpinError>;
