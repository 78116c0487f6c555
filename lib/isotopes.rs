//! Physical constants and spin properties of the particles that can make up a
//! spin system.

use std::sync::OnceLock;
use regex::Regex;
use rustc_hash::FxHashMap as HashMap;
use crate::error::{ MuSpinError, MuSpinResult };

// Planck constant [J s]
pub const H_PLANCK: f64 = 6.62607015e-34;
// Boltzmann constant [J / K]
pub const K_B: f64 = 1.380649e-23;
// elementary charge [C]
pub const E_CHARGE: f64 = 1.602176634e-19;
// vacuum permeability / 4π [T m / A]
pub const MU0_4PI: f64 = 1.00000000055e-7;
// atomic unit of electric field gradient [V / m^2]
pub const EFG_AU: f64 = 9.7173624292e21;

// muon mean lifetime [μs]
pub const MU_TAU: f64 = 2.1969811;

// gyromagnetic ratios [MHz / T]
pub const GAMMA_MU: f64 = 135.538809;
pub const GAMMA_E: f64 = -28024.9514242;

/// Dipolar coupling prefactor `μ0 h / 4π` converting `γ1 γ2 / r^3`, with
/// gyromagnetic ratios in MHz/T and distance in Å, to MHz.
pub const DIPOLAR_MHZ: f64 = MU0_4PI * H_PLANCK * 1e12 * 1e30 / 1e6;

/// Converts the product of a quadrupole moment in millibarn and an electric
/// field gradient in atomic units to `eQV/h` in MHz.
pub const EFG_MHZ: f64 = E_CHARGE * 1e-31 * EFG_AU / H_PLANCK / 1e6;

/// Spin properties of a single particle.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinSpecies {
    /// Label as given by the user, e.g. `mu`, `e`, or `2H`.
    pub label: String,
    /// Spin quantum number.
    pub spin: f64,
    /// Gyromagnetic ratio in MHz/T.
    pub gamma: f64,
    /// Electric quadrupole moment in millibarn (zero for spin-1/2).
    pub quadrupole: f64,
}

impl SpinSpecies {
    /// Return `true` if this is the muon.
    pub fn is_muon(&self) -> bool { self.label == "mu" }

    /// Return `true` if this is an electron.
    pub fn is_electron(&self) -> bool { self.label == "e" }
}

// (mass number, symbol, spin, gamma [MHz/T], quadrupole moment [mb])
const ISOTOPES: &[(u32, &str, f64, f64, f64)] = &[
    (1, "H", 0.5, 42.577478, 0.0),
    (2, "H", 1.0, 6.535902, 2.86),
    (3, "He", 0.5, -32.434100, 0.0),
    (6, "Li", 1.0, 6.265941, -0.808),
    (7, "Li", 1.5, 16.548171, -40.1),
    (9, "Be", 1.5, -5.983755, 52.88),
    (10, "B", 3.0, 4.575241, 84.59),
    (11, "B", 1.5, 13.662979, 40.59),
    (13, "C", 0.5, 10.708395, 0.0),
    (14, "N", 1.0, 3.077706, 20.44),
    (15, "N", 0.5, -4.316267, 0.0),
    (17, "O", 2.5, -5.774236, -25.58),
    (19, "F", 0.5, 40.078, 0.0),
    (23, "Na", 1.5, 11.268820, 104.0),
    (25, "Mg", 2.5, -2.608, 199.4),
    (27, "Al", 2.5, 11.103080, 146.6),
    (29, "Si", 0.5, -8.465, 0.0),
    (31, "P", 0.5, 17.251, 0.0),
    (33, "S", 1.5, 3.272, -67.8),
    (35, "Cl", 1.5, 4.176541, -81.65),
    (37, "Cl", 1.5, 3.476604, -64.35),
    (39, "K", 1.5, 1.989, 58.5),
    (51, "V", 3.5, 11.213, -52.0),
    (55, "Mn", 2.5, 10.5763, 330.0),
    (57, "Fe", 0.5, 1.3816, 0.0),
    (59, "Co", 3.5, 10.077, 420.0),
    (63, "Cu", 1.5, 11.2981, -220.0),
    (65, "Cu", 1.5, 12.1027, -204.0),
    (75, "As", 1.5, 7.3150, 314.0),
    (79, "Br", 1.5, 10.7042, 313.0),
    (93, "Nb", 4.5, 10.4523, -320.0),
    (107, "Ag", 0.5, -1.7330, 0.0),
    (127, "I", 2.5, 8.5778, -696.0),
    (195, "Pt", 0.5, 9.2920, 0.0),
];

// element symbol -> mass number of the default (most abundant magnetic)
// isotope
const DEFAULT_ISOTOPES: &[(&str, u32)] = &[
    ("H", 1), ("He", 3), ("Li", 7), ("Be", 9), ("B", 11), ("C", 13),
    ("N", 14), ("O", 17), ("F", 19), ("Na", 23), ("Mg", 25), ("Al", 27),
    ("Si", 29), ("P", 31), ("S", 33), ("Cl", 35), ("K", 39), ("V", 51),
    ("Mn", 55), ("Fe", 57), ("Co", 59), ("Cu", 63), ("As", 75), ("Br", 79),
    ("Nb", 93), ("Ag", 107), ("I", 127), ("Pt", 195),
];

// "{mass}{symbol}" -> (spin, gamma, quadrupole)
type IsotopeTable = HashMap<String, (f64, f64, f64)>;

fn isotope_table() -> &'static IsotopeTable {
    static TABLE: OnceLock<IsotopeTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        ISOTOPES.iter()
            .map(|(a, s, spin, gamma, q)| (format!("{}{}", a, s), (*spin, *gamma, *q)))
            .collect()
    })
}

fn default_table() -> &'static HashMap<&'static str, u32> {
    static TABLE: OnceLock<HashMap<&'static str, u32>> = OnceLock::new();
    TABLE.get_or_init(|| DEFAULT_ISOTOPES.iter().copied().collect())
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)?([A-Z][a-z]?)$")
            .expect("isotope label pattern is a valid regex")
    })
}

/// Look up the spin properties of a particle by label.
///
/// Accepted labels are `mu` (the muon), `e` (an electron), and nuclei written
/// as an element symbol optionally preceded by a mass number, e.g. `H`, `2H`,
/// or `13C`. An element symbol alone resolves to its most abundant isotope
/// with non-zero spin.
pub fn lookup(label: &str) -> MuSpinResult<SpinSpecies> {
    let label = label.trim();
    match label {
        "mu" => {
            return Ok(SpinSpecies {
                label: label.into(),
                spin: 0.5,
                gamma: GAMMA_MU,
                quadrupole: 0.0,
            });
        },
        "e" => {
            return Ok(SpinSpecies {
                label: label.into(),
                spin: 0.5,
                gamma: GAMMA_E,
                quadrupole: 0.0,
            });
        },
        _ => { },
    }
    let caps = label_pattern().captures(label)
        .ok_or_else(|| MuSpinError::InvalidSpin(
            format!("{:?} is not a valid spin label", label)))?;
    let symbol: &str = &caps[2];
    let mass: u32 = match caps.get(1) {
        Some(m) => m.as_str().parse()
            .map_err(|_| MuSpinError::InvalidSpin(
                format!("invalid mass number in {:?}", label)))?,
        None => default_table().get(symbol)
            .copied()
            .ok_or_else(|| MuSpinError::InvalidSpin(
                format!("no magnetic isotope known for {:?}", symbol)))?,
    };
    isotope_table().get(format!("{}{}", mass, symbol).as_str())
        .map(|(spin, gamma, quadrupole)| {
            SpinSpecies {
                label: label.into(),
                spin: *spin,
                gamma: *gamma,
                quadrupole: *quadrupole,
            }
        })
        .ok_or_else(|| MuSpinError::InvalidSpin(
            format!("unknown or non-magnetic isotope {}{}", mass, symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particles() {
        let mu = lookup("mu").unwrap();
        assert!(mu.is_muon());
        assert_eq!(mu.spin, 0.5);
        assert_eq!(mu.gamma, GAMMA_MU);
        let e = lookup("e").unwrap();
        assert!(e.is_electron());
        assert!(e.gamma < 0.0);
    }

    #[test]
    fn nuclei() {
        let h = lookup("H").unwrap();
        assert_eq!(h.spin, 0.5);
        assert!((h.gamma - 42.577).abs() < 1e-3);
        let d = lookup("2H").unwrap();
        assert_eq!(d.spin, 1.0);
        assert!(d.quadrupole > 0.0);
        assert_eq!(lookup("C").unwrap(), SpinSpecies { label: "C".into(), ..lookup("13C").unwrap() });
        assert_eq!(lookup("Cu").unwrap().spin, 1.5);
    }

    #[test]
    fn unknown_labels() {
        for bad in ["12C", "Xx", "h", "2", "muon", ""] {
            assert!(
                matches!(lookup(bad), Err(MuSpinError::InvalidSpin(_))),
                "label {:?} should be rejected", bad,
            );
        }
    }

    #[test]
    fn derived_constants() {
        // μ0 h / 4π with γ in MHz/T and r in Å
        assert!((DIPOLAR_MHZ - 6.62607e-5).abs() < 1e-9);
        assert!((EFG_MHZ - 0.234965).abs() < 1e-5);
    }
}
