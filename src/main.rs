//! Accelerated Langevin dynamics command-line interface
//!
//! Reads a YAML run configuration, applies command-line overrides and runs
//! group aMD or multi-basin iaMD.

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};

mod args;
mod output;

use args::Args;
use iamd::config::RunConfig;
use iamd::{BoostKind, Integrator};
use output::setup_output;

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_ref());

    info!("Reading configuration from: {}", args.config_file);
    let mut config = RunConfig::from_file(&args.config_file)
        .wrap_err_with(|| format!("Unable to load configuration file: {}", args.config_file))?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .wrap_err("Invalid configuration after command-line overrides")?;
    info!("Configuration loaded:\n{:?}", config);

    let mut sim = config
        .build_simulation()
        .wrap_err("Failed to set up the simulation")?;

    info!(
        "{} particles, {} degrees of freedom",
        sim.state().len(),
        sim.degrees_of_freedom()
    );
    let coeffs = sim.integrator().thermostat().coefficients();
    info!(
        "Langevin coefficients: vscale={:.6}, fscale={:.6e}, noisescale={:.6}",
        coeffs.vscale, coeffs.fscale, coeffs.noisescale
    );
    match sim.integrator().boost() {
        BoostKind::GroupAmd(boosts) => {
            for b in boosts {
                info!(
                    "Group aMD on group {}: alpha={}, Emax={}",
                    b.group, b.alpha, b.e_max
                );
            }
        }
        BoostKind::MultiBasin(mb) => {
            info!(
                "Multi-basin iaMD on group {} with {} basins ({:?} mixture)",
                mb.group,
                mb.basins().len(),
                mb.evaluation
            );
        }
    }

    let total_steps = config.integrator.total_steps;
    let result = sim.run(total_steps);
    let failed_at = sim.current_step();
    result.wrap_err_with(|| format!("Simulation failed at step {}", failed_at))?;

    let temperature = sim.kinetic_temperature();
    let state = sim.finish().wrap_err("Failed to close the energy reporter")?;
    info!(
        "Finished {} steps: kinetic energy {:.6} kJ/mol, T = {:.2} K",
        total_steps,
        state.kinetic_energy(),
        temperature
    );
    Ok(())
}

/// Override configuration values with command-line arguments if provided
fn apply_overrides(config: &mut RunConfig, args: &Args) {
    if let Some(steps) = args.total_steps {
        info!("Overriding total_steps with: {}", steps);
        config.integrator.total_steps = steps;
    }
    if let Some(t) = args.temperature {
        info!("Overriding temperature with: {}", t);
        if let Some(start) = config.override_temperature(t) {
            warn!(
                "Temperature schedule now ramps from {} K to {} K; the start is not overridden",
                start, t
            );
        }
    }
    if let Some(seed) = args.seed {
        info!("Overriding seed with: {}", seed);
        config.integrator.seed = Some(seed);
    }
    if let Some(path) = &args.energy_file {
        info!("Overriding energy_file with: {}", path);
        config.output.energy_file = Some(path.clone());
    }
}
