//! Accelerated Langevin integrators: group aMD and multi-basin iaMD.
//!
//! The integrators advance a [`ParticleState`] one step at a time and consult
//! three collaborators per step: a [`ForceGroupProvider`] for per-group forces
//! and energies, a [`ConstraintProjector`] and a [`NoiseSource`].

pub mod boost;
pub mod config;
pub mod constraints;
pub mod error;
pub mod integrator;
pub mod potential;
pub mod provider;
pub mod reporter;
pub mod simulation;
pub mod state;
pub mod thermostat;

pub use boost::{Basin, BoostKind, GroupBoost, MixtureEvaluation, MixtureFactor, MultiBasinBoost};
pub use config::{RunConfig, TemperatureSchedule};
pub use constraints::{DistanceConstraint, NoConstraints, Shake};
pub use error::{AmdError, Result};
pub use integrator::{AcceleratedIntegrator, Integrator, StepEnv, StepRecord};
pub use potential::ForceField;
pub use provider::{
    ConstraintProjector, ForceGroup, ForceGroupProvider, GaussianNoise, GroupEvaluation,
    NoiseSource, ZeroNoise,
};
pub use reporter::EnergyReporter;
pub use simulation::Simulation;
pub use state::ParticleState;
pub use thermostat::{LangevinThermostat, ThermostatCoefficients};
