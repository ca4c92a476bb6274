use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger;
use rand::rngs::StdRng;
use rand::SeedableRng;

use lumi_detect::algorithm::{measure_luminescence, Baseline};
use lumi_detect::image_funcs::load_micrograph;

/// Measures the mean luminescence of bright objects in a single-channel
/// grayscale micrograph (e.g. EMCCD sensor output).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None)]
struct Args {
    /// Path of the grayscale image to analyze.
    input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let image = load_micrograph(&args.input)
        .with_context(|| format!("cannot analyze '{}'", args.input.display()))?;

    let mut rng = StdRng::from_os_rng();
    let report = measure_luminescence(&image, Baseline::Mean, &mut rng)?;

    println!("Mean Luminescence Value: {:.4}", report.mean_luminescence);
    println!("Standard Deviation: {:.4}", report.std_deviation);
    Ok(())
}
