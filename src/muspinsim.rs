use std::path::PathBuf;
use anyhow::Context;
use muspinsim::{ Acquire, ExperimentConfig };
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let infile: PathBuf
        = std::env::args_os().nth(1)
        .map(PathBuf::from)
        .context("usage: muspinsim <config.toml>")?;
    let config = ExperimentConfig::load(&infile)?;

    if let Some(n) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to size the worker thread pool")?;
    }

    let times = config.time_axis()?;
    let acquire = config.acquire()?;
    let runs = config.run()?;

    if acquire.contains(Acquire::Evolution) {
        for (field, results) in runs.iter() {
            println!("# field = {:.6} T", field);
            println!("# t (us)\t<S_x> (muon)");
            for (t, row) in times.iter().zip(results.evolution().outer_iter()) {
                let vals: Vec<String>
                    = row.iter().map(|x| format!("{:.10e}", x)).collect();
                println!("{:.6}\t{}", t, vals.join("\t"));
            }
        }
    }
    if acquire.contains(Acquire::Integral) {
        println!("# B (T)\tintegral <S_x> (muon)");
        for (field, results) in runs.iter() {
            let vals: Vec<String>
                = results.integral().iter().map(|x| format!("{:.10e}", x)).collect();
            println!("{:.6}\t{}", field, vals.join("\t"));
        }
    }
    info!(input = %infile.display(), fields = runs.len(), "done");
    Ok(())
}
