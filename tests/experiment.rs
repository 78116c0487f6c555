use std::f64::consts::TAU;
use ndarray as nd;
use num_complex::Complex64 as C64;
use muspinsim::{
    AcquireSet,
    DensityOperator,
    ExperimentConfig,
    MuonAxis,
    MuonExperiment,
    MuonSpinSystem,
    Operator,
    SpinAxis,
    SpinOperator,
};

fn close(a: &nd::Array2<C64>, b: &nd::Array2<C64>, eps: f64) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < eps)
}

#[test]
fn muon_electron_starting_state() {
    let expt = MuonExperiment::new(&["mu", "e"]).unwrap();
    // (I/2 + Sx) for the muon, I/2 for the electron
    let sx = SpinOperator::single(0.5, SpinAxis::X).unwrap();
    let id = Operator::identity(&[2]).unwrap();
    let rho_mu = id.scale(0.5).try_add(&sx).unwrap();
    let rho_e = id.scale(0.5);
    let expected = rho_mu.kron(&rho_e);
    assert!(close(expt.rho0().matrix(), expected.matrix(), 1e-12));
    assert_eq!(expt.rho0().dim(), &[2, 2]);

    let mu_x = expt.spin_system().operator(&[(0, SpinAxis::X)]).unwrap();
    assert!((expt.rho0().expectation(&mu_x).unwrap() - 0.5).abs() < 1e-12);
    let full = expt.rho0().partial_trace(&[0, 1]).unwrap();
    assert!((full.matrix()[[0, 0]] - C64::from(1.0)).norm() < 1e-12);
}

#[test]
fn isotropic_coupling_is_orientation_independent() {
    let mut system = MuonSpinSystem::new(&["mu", "e"]).unwrap();
    system.add_isotropic_hyperfine_term(0, 1, 100.0).unwrap();
    let mut expt = MuonExperiment::from_spin_system(system).unwrap();
    let times: Vec<f64> = (0..10).map(|k| 0.001 * k as f64).collect();
    let single = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
    expt.set_powder_average(50, "zcw").unwrap();
    let powder = expt.run_experiment(&times, None, AcquireSet::both()).unwrap();
    for ((_, a), (_, b)) in single.iter().zip(powder.iter()) {
        assert_eq!(a.shape(), b.shape());
        assert!(a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9));
    }
    for (k, t) in times.iter().enumerate() {
        let expected = 0.25 * (1.0 + (TAU * 100.0 * t).cos());
        assert!((single.evolution()[[k, 0]] - expected).abs() < 1e-9);
    }
}

#[test]
fn muon_along_field_does_not_precess() {
    let mut expt = MuonExperiment::new(&["mu"]).unwrap();
    expt.set_magnetic_field(0.5).unwrap();
    expt.set_starting_state("z".parse().unwrap(), f64::INFINITY).unwrap();
    let sz = SpinOperator::single(0.5, SpinAxis::Z).unwrap().into_operator();
    let res = expt
        .run_experiment(&[0.0, 0.37, 1.2], Some(&[sz]), AcquireSet::both())
        .unwrap();
    assert!(res.evolution().iter().all(|x| (x - 0.5).abs() < 1e-9));
    assert!((res.integral()[[0]] - 0.5).abs() < 1e-9);
}

#[test]
fn config_file_end_to_end() {
    let text = r#"
        spins = ["mu", "e"]
        acquire = "ei"
        times = [0.0, 0.000112]

        [orientation]
        mode = "single"
        theta = 0.3

        [[hyperfine]]
        i = 0
        j = 1
        isotropic = 4463.0
    "#;
    let path = std::env::temp_dir()
        .join(format!("muspinsim-config-{}.toml", std::process::id()));
    std::fs::write(&path, text).unwrap();
    let config = ExperimentConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let expt = config.build_experiment().unwrap();
    let times = config.time_axis().unwrap();
    let res = expt
        .run_experiment(times.as_slice().unwrap(), None, config.acquire().unwrap())
        .unwrap();
    assert_eq!(res.evolution().shape(), &[2, 1]);
    assert_eq!(res.integral().shape(), &[1]);
    assert!((res.evolution()[[0, 0]] - 0.5).abs() < 1e-9);
    let expected = 0.25 * (1.0 + (TAU * 4463.0 * 0.000112).cos());
    assert!((res.evolution()[[1, 0]] - expected).abs() < 1e-9);

    assert!(ExperimentConfig::load(std::env::temp_dir().join("does-not-exist.toml")).is_err());
}

#[test]
fn thermal_nucleus_at_low_temperature() {
    let mut expt = MuonExperiment::new(&["mu", "H"]).unwrap();
    expt.set_starting_state(Default::default(), 0.0).unwrap();
    expt.set_magnetic_field(1.0).unwrap();
    // proton fully in m = -1/2 (lower Zeeman level for positive gamma)
    let rho_h: DensityOperator = expt.rho0().partial_trace(&[0]).unwrap();
    let expected = nd::array![
        [C64::from(0.0), C64::from(0.0)],
        [C64::from(0.0), C64::from(1.0)],
    ];
    assert!(close(rho_h.matrix(), &expected, 1e-12));
}

#[test]
fn field_and_starting_state_setters_commute() {
    let axis = MuonAxis::from_label("z").unwrap();
    let mut field_first = MuonExperiment::new(&["mu", "H"]).unwrap();
    field_first.set_magnetic_field(2.0).unwrap();
    field_first.set_starting_state(axis, 0.001).unwrap();
    let mut state_first = MuonExperiment::new(&["mu", "H"]).unwrap();
    state_first.set_starting_state(axis, 0.001).unwrap();
    state_first.set_magnetic_field(2.0).unwrap();
    assert!(close(field_first.rho0().matrix(), state_first.rho0().matrix(), 1e-14));
    // the proton is almost fully polarized at 2 T and 1 mK
    let rho_h = state_first.rho0().partial_trace(&[0]).unwrap();
    assert!(rho_h.matrix()[[1, 1]].re > 0.9);
}
