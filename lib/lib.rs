#![allow(dead_code, non_snake_case, non_upper_case_globals)]

//! Quantum simulation of muon spin rotation/relaxation experiments: tensor
//! operators over composite spin spaces, density-matrix evolution under
//! time-independent Hamiltonians, and powder averaging over crystallite
//! orientations.

pub mod error;
pub mod spin;
pub mod operator;
pub mod spinop;
pub mod density;
pub mod hamiltonian;
pub mod isotopes;
pub mod spinsys;
pub mod powder;
pub mod experiment;
pub mod config;

pub use crate::{
    config::ExperimentConfig,
    density::DensityOperator,
    error::{ MuSpinError, MuSpinResult },
    experiment::{
        Acquire,
        AcquireSet,
        ExperimentResults,
        MuonAxis,
        MuonExperiment,
    },
    hamiltonian::{ EigenFrame, Hamiltonian },
    isotopes::MU_TAU,
    operator::Operator,
    powder::PowderScheme,
    spinop::{ SpinAxis, SpinOperator },
    spinsys::{ InteractionTerm, MuonSpinSystem },
};
