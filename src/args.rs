//! Command-line argument parsing

use clap::Parser;

/// Accelerated Langevin dynamics with YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override log output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override number of steps
    #[arg(long)]
    pub total_steps: Option<u64>,

    /// Override bath temperature (K)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Override thermal noise seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override energy report file
    #[arg(long)]
    pub energy_file: Option<String>,
}
