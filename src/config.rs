use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::boost::{Basin, BoostKind, GroupBoost, MixtureEvaluation, MultiBasinBoost};
use crate::constraints::{
    DistanceConstraint, NoConstraints, Shake, DEFAULT_SHAKE_MAX_ITERATIONS,
    DEFAULT_SHAKE_TOLERANCE,
};
use crate::error::{AmdError, Result};
use crate::integrator::AcceleratedIntegrator;
use crate::potential::{DoubleWell, ForceField, HarmonicBond, HarmonicTether, LennardJones};
use crate::provider::{ConstraintProjector, ForceGroup, GaussianNoise};
use crate::reporter::EnergyReporter;
use crate::simulation::Simulation;
use crate::state::ParticleState;
use crate::thermostat::{thermal_energy, LangevinThermostat};

/// Configuration of an accelerated Langevin run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunConfig {
    /// Particles, velocities and masses
    pub system: SystemConfig,
    /// Thermostat, time step and boost law
    pub integrator: IntegratorConfig,
    /// Linear ramp of the bath temperature (optional)
    #[serde(default)]
    pub temperature_schedule: Option<TemperatureSchedule>,
    /// Force terms, each assigned to a force group
    pub force_field: Vec<ForceTermConfig>,
    /// Fixed-distance constraints solved with SHAKE
    #[serde(default)]
    pub constraints: Vec<DistanceConstraint>,
    #[serde(default = "default_shake_tolerance")]
    pub shake_tolerance: f64,
    #[serde(default = "default_shake_max_iterations")]
    pub shake_max_iterations: usize,
    /// Energy reporting
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    pub positions: PositionConfig,
    #[serde(default)]
    pub velocities: VelocityConfig,
    /// Masses in amu; zero marks a virtual site
    pub masses: MassConfig,
    /// Periodic box used by pair terms (optional)
    #[serde(default)]
    pub box_lengths: Option<[f64; 3]>,
}

/// Position configuration options
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum PositionConfig {
    /// Explicit list of positions (nm)
    #[serde(rename = "explicit")]
    Explicit { coords: Vec<[f64; 3]> },
    /// Simple cubic lattice
    #[serde(rename = "cubic_lattice")]
    CubicLattice {
        n_per_side: usize,
        spacing: f64,
        offset: Option<[f64; 3]>,
    },
}

/// Velocity configuration options
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(tag = "type")]
pub enum VelocityConfig {
    #[serde(rename = "explicit")]
    Explicit { velocities: Vec<[f64; 3]> },
    /// Maxwell-Boltzmann distribution at the given temperature (K)
    #[serde(rename = "maxwell_boltzmann")]
    MaxwellBoltzmann { temperature: f64, seed: Option<u64> },
    #[default]
    #[serde(rename = "zero")]
    Zero,
}

/// Mass configuration options
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum MassConfig {
    /// Single mass for all particles
    Uniform(f64),
    /// Individual masses per particle
    Individual(Vec<f64>),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntegratorConfig {
    /// Bath temperature (K)
    pub temperature: f64,
    /// Friction coefficient (1/ps)
    pub friction: f64,
    /// Time step (ps)
    pub time_step: f64,
    pub total_steps: u64,
    /// Seed of the thermal noise; drawn from entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    pub boost: BoostConfig,
}

/// Boost law
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum BoostConfig {
    /// One `(alpha, e_max)` pair per boosted group
    #[serde(rename = "group_amd")]
    GroupAmd {
        boosted: Vec<GroupBoost>,
        #[serde(default)]
        plain: Vec<ForceGroup>,
    },
    /// Basin mixture on a single group
    #[serde(rename = "multi_basin")]
    MultiBasin {
        group: ForceGroup,
        basins: Vec<Basin>,
        #[serde(default)]
        plain: Option<ForceGroup>,
        #[serde(default)]
        mixture: MixtureEvaluation,
    },
}

/// Temperature schedule for ramping
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TemperatureSchedule {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Number of steps for ramping
    pub ramp_steps: u64,
}

impl TemperatureSchedule {
    /// Bath temperature before `step`: linear ramp, then constant.
    pub fn temperature_at(&self, step: u64) -> f64 {
        if step < self.ramp_steps {
            let progress = step as f64 / self.ramp_steps as f64;
            self.initial_temperature
                + (self.final_temperature - self.initial_temperature) * progress
        } else {
            self.final_temperature
        }
    }
}

/// A force term and the group it belongs to
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ForceTermConfig {
    #[serde(rename = "lennard_jones")]
    LennardJones {
        group: ForceGroup,
        epsilon: f64,
        sigma: f64,
        #[serde(default)]
        cutoff: Option<f64>,
    },
    #[serde(rename = "harmonic_tether")]
    HarmonicTether {
        group: ForceGroup,
        k: f64,
        #[serde(default)]
        center: [f64; 3],
    },
    #[serde(rename = "double_well")]
    DoubleWell {
        group: ForceGroup,
        barrier: f64,
        half_width: f64,
        #[serde(default)]
        axis: usize,
    },
    #[serde(rename = "harmonic_bond")]
    HarmonicBond {
        group: ForceGroup,
        i: usize,
        j: usize,
        k: f64,
        r0: f64,
    },
}

impl ForceTermConfig {
    pub fn group(&self) -> ForceGroup {
        match self {
            ForceTermConfig::LennardJones { group, .. }
            | ForceTermConfig::HarmonicTether { group, .. }
            | ForceTermConfig::DoubleWell { group, .. }
            | ForceTermConfig::HarmonicBond { group, .. } => *group,
        }
    }
}

/// Output configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
    /// Energy report file; `.gz` / `.bz2` suffixes select compression
    #[serde(default)]
    pub energy_file: Option<String>,
    /// Reported groups; every group of the force field when empty
    #[serde(default)]
    pub groups: Vec<ForceGroup>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_interval: default_report_interval(),
            energy_file: None,
            groups: Vec::new(),
            separator: default_separator(),
        }
    }
}

// Default value functions
fn default_shake_tolerance() -> f64 {
    DEFAULT_SHAKE_TOLERANCE
}
fn default_shake_max_iterations() -> usize {
    DEFAULT_SHAKE_MAX_ITERATIONS
}
fn default_report_interval() -> u64 {
    1000
}
fn default_separator() -> String {
    " ".to_string()
}

fn config_err(msg: impl Into<String>) -> AmdError {
    AmdError::Config(msg.into())
}

impl RunConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: RunConfig =
            serde_yml::from_str(content).map_err(|e| config_err(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yml::to_string(self).map_err(|e| config_err(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Set the bath temperature. With a temperature schedule the ramp now
    /// ends at `temperature`; returns the schedule's start, which is kept.
    pub fn override_temperature(&mut self, temperature: f64) -> Option<f64> {
        self.integrator.temperature = temperature;
        self.temperature_schedule.as_mut().map(|schedule| {
            schedule.final_temperature = temperature;
            schedule.initial_temperature
        })
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let ig = &self.integrator;
        if !(ig.temperature > 0.0) {
            return Err(config_err("Temperature must be positive"));
        }
        if !(ig.friction >= 0.0) {
            return Err(config_err("Friction must be non-negative"));
        }
        if !(ig.time_step > 0.0) {
            return Err(config_err("Time step must be positive"));
        }
        if ig.total_steps == 0 {
            return Err(config_err("Total steps must be positive"));
        }

        match &ig.boost {
            BoostConfig::GroupAmd { boosted, .. } => {
                if boosted.is_empty() {
                    return Err(config_err("group_amd needs at least one boosted group"));
                }
                for b in boosted {
                    if !(b.alpha > 0.0) {
                        return Err(config_err(format!(
                            "alpha of boosted group {} must be positive",
                            b.group
                        )));
                    }
                }
            }
            BoostConfig::MultiBasin { basins, .. } => {
                if basins.is_empty() {
                    return Err(config_err("multi_basin needs at least one basin"));
                }
                if basins.iter().any(|b| !(b.alpha > 0.0)) {
                    return Err(config_err("Basin strengths must be positive"));
                }
            }
        }

        if let Some(schedule) = &self.temperature_schedule {
            if !(schedule.initial_temperature > 0.0 && schedule.final_temperature > 0.0) {
                return Err(config_err("Scheduled temperatures must be positive"));
            }
        }

        if self.force_field.is_empty() {
            return Err(config_err("Force field has no terms"));
        }
        for term in &self.force_field {
            match term {
                ForceTermConfig::LennardJones {
                    epsilon,
                    sigma,
                    cutoff,
                    ..
                } => {
                    if !(*epsilon > 0.0 && *sigma > 0.0) {
                        return Err(config_err("LJ epsilon and sigma must be positive"));
                    }
                    if cutoff.is_some_and(|c| !(c > 0.0)) {
                        return Err(config_err("LJ cutoff must be positive"));
                    }
                }
                ForceTermConfig::HarmonicTether { k, .. } => {
                    if !(*k >= 0.0) {
                        return Err(config_err("Tether stiffness must be non-negative"));
                    }
                }
                ForceTermConfig::DoubleWell {
                    half_width, axis, ..
                } => {
                    if !(*half_width > 0.0) {
                        return Err(config_err("Double-well half width must be positive"));
                    }
                    if *axis > 2 {
                        return Err(config_err("Double-well axis must be 0, 1 or 2"));
                    }
                }
                ForceTermConfig::HarmonicBond { i, j, .. } => {
                    if i == j {
                        return Err(config_err("A bond needs two distinct particles"));
                    }
                }
            }
        }

        if let Some(lengths) = &self.system.box_lengths {
            if lengths.iter().any(|&l| !(l > 0.0)) {
                return Err(config_err("Box lengths must be positive"));
            }
        }

        if self.output.report_interval == 0 {
            return Err(config_err("Report interval must be positive"));
        }

        Ok(())
    }

    /// Generate positions based on configuration
    pub fn generate_positions(&self) -> Vec<Vector3<f64>> {
        match &self.system.positions {
            PositionConfig::Explicit { coords } => coords
                .iter()
                .map(|&c| Vector3::new(c[0], c[1], c[2]))
                .collect(),
            PositionConfig::CubicLattice {
                n_per_side,
                spacing,
                offset,
            } => {
                let offset = offset.unwrap_or([0.0, 0.0, 0.0]);
                let mut positions = Vec::with_capacity(n_per_side.pow(3));
                for i in 0..*n_per_side {
                    for j in 0..*n_per_side {
                        for k in 0..*n_per_side {
                            positions.push(Vector3::new(
                                offset[0] + i as f64 * spacing,
                                offset[1] + j as f64 * spacing,
                                offset[2] + k as f64 * spacing,
                            ));
                        }
                    }
                }
                positions
            }
        }
    }

    /// Generate masses based on configuration
    pub fn generate_masses(&self, n_particles: usize) -> Result<Vec<f64>> {
        match &self.system.masses {
            MassConfig::Uniform(mass) => {
                if !(*mass > 0.0) {
                    return Err(config_err("Uniform mass must be positive"));
                }
                Ok(vec![*mass; n_particles])
            }
            MassConfig::Individual(masses) => {
                if masses.len() != n_particles {
                    return Err(config_err(format!(
                        "Number of masses ({}) doesn't match number of particles ({})",
                        masses.len(),
                        n_particles
                    )));
                }
                Ok(masses.clone())
            }
        }
    }

    /// Generate velocities (nm/ps) based on configuration
    pub fn generate_velocities(&self, masses: &[f64]) -> Result<Vec<Vector3<f64>>> {
        let n = masses.len();
        match &self.system.velocities {
            VelocityConfig::Explicit { velocities } => {
                if velocities.len() != n {
                    return Err(config_err(format!(
                        "Number of explicit velocities ({}) doesn't match number of particles ({})",
                        velocities.len(),
                        n
                    )));
                }
                Ok(velocities
                    .iter()
                    .map(|&v| Vector3::new(v[0], v[1], v[2]))
                    .collect())
            }
            VelocityConfig::MaxwellBoltzmann { temperature, seed } => {
                use rand::SeedableRng;
                use rand_distr::{Distribution, StandardNormal};

                if !(*temperature > 0.0) {
                    return Err(config_err("Initial temperature must be positive"));
                }
                let mut rng = if let Some(seed) = seed {
                    rand::rngs::StdRng::seed_from_u64(*seed)
                } else {
                    rand::rngs::StdRng::from_entropy()
                };
                let kt = thermal_energy(*temperature);

                let mut velocities: Vec<Vector3<f64>> = masses
                    .iter()
                    .map(|&m| {
                        let v = Vector3::<f64>::new(
                            StandardNormal.sample(&mut rng),
                            StandardNormal.sample(&mut rng),
                            StandardNormal.sample(&mut rng),
                        );
                        if m > 0.0 {
                            v * (kt / m).sqrt()
                        } else {
                            Vector3::zeros()
                        }
                    })
                    .collect();

                // Remove center-of-mass motion
                let total_mass: f64 = masses.iter().sum();
                if n > 1 && total_mass > 0.0 {
                    let p: Vector3<f64> = velocities
                        .iter()
                        .zip(masses)
                        .map(|(v, &m)| v * m)
                        .sum();
                    let v_cm = p / total_mass;
                    for (v, &m) in velocities.iter_mut().zip(masses) {
                        if m > 0.0 {
                            *v -= v_cm;
                        }
                    }
                }
                Ok(velocities)
            }
            VelocityConfig::Zero => Ok(vec![Vector3::zeros(); n]),
        }
    }

    pub fn build_state(&self) -> Result<ParticleState> {
        let positions = self.generate_positions();
        let masses = self.generate_masses(positions.len())?;
        let velocities = self.generate_velocities(&masses)?;
        ParticleState::new(positions, velocities, masses)
    }

    pub fn build_force_field(&self, n_particles: usize) -> Result<ForceField> {
        let box_lengths = self
            .system
            .box_lengths
            .map(|l| Vector3::new(l[0], l[1], l[2]));

        let mut ff = ForceField::new();
        for term in &self.force_field {
            match *term {
                ForceTermConfig::LennardJones {
                    group,
                    epsilon,
                    sigma,
                    cutoff,
                } => {
                    let mut lj = LennardJones::new(epsilon, sigma);
                    lj.cutoff = cutoff;
                    lj.box_lengths = box_lengths;
                    ff.add_term(group, Box::new(lj));
                }
                ForceTermConfig::HarmonicTether { group, k, center } => {
                    ff.add_term(
                        group,
                        Box::new(HarmonicTether {
                            k,
                            center: Vector3::new(center[0], center[1], center[2]),
                        }),
                    );
                }
                ForceTermConfig::DoubleWell {
                    group,
                    barrier,
                    half_width,
                    axis,
                } => {
                    ff.add_term(
                        group,
                        Box::new(DoubleWell {
                            barrier,
                            half_width,
                            axis,
                        }),
                    );
                }
                ForceTermConfig::HarmonicBond { group, i, j, k, r0 } => {
                    if i.max(j) >= n_particles {
                        return Err(AmdError::LengthMismatch {
                            what: "bonded particle index range",
                            expected: n_particles,
                            found: i.max(j) + 1,
                        });
                    }
                    ff.add_term(group, Box::new(HarmonicBond { i, j, k, r0 }));
                }
            }
        }
        Ok(ff)
    }

    pub fn build_constraints(&self, n_particles: usize) -> Result<Box<dyn ConstraintProjector>> {
        if self.constraints.is_empty() {
            return Ok(Box::new(NoConstraints));
        }
        let shake = Shake::new(self.constraints.clone())?
            .with_tolerance(self.shake_tolerance)?
            .with_max_iterations(self.shake_max_iterations)?;
        shake.check_indices(n_particles)?;
        Ok(Box::new(shake))
    }

    pub fn build_integrator(&self) -> Result<AcceleratedIntegrator> {
        let ig = &self.integrator;
        let thermostat = LangevinThermostat::new(ig.temperature, ig.friction, ig.time_step)?;
        let (boost, plain) = match &ig.boost {
            BoostConfig::GroupAmd { boosted, plain } => {
                (BoostKind::group_amd(boosted.clone())?, plain.clone())
            }
            BoostConfig::MultiBasin {
                group,
                basins,
                plain,
                mixture,
            } => {
                let mb = MultiBasinBoost::new(*group, basins.clone())?.with_evaluation(*mixture);
                (BoostKind::MultiBasin(mb), plain.iter().copied().collect())
            }
        };
        Ok(AcceleratedIntegrator::new(thermostat, boost, plain))
    }

    pub fn build_noise(&self) -> GaussianNoise {
        match self.integrator.seed {
            Some(seed) => GaussianNoise::from_seed(seed),
            None => GaussianNoise::from_entropy(),
        }
    }

    /// Reported groups: the configured list, or every group of the force field.
    pub fn report_groups(&self) -> Vec<ForceGroup> {
        if !self.output.groups.is_empty() {
            return self.output.groups.clone();
        }
        let mut groups: Vec<ForceGroup> = self.force_field.iter().map(|t| t.group()).collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn build_reporter(&self) -> Result<Option<EnergyReporter<'static>>> {
        match &self.output.energy_file {
            Some(path) => Ok(Some(
                EnergyReporter::create(path, self.output.report_interval, self.report_groups())?
                    .with_separator(&self.output.separator),
            )),
            None => Ok(None),
        }
    }

    /// Assemble a ready-to-run simulation from this configuration.
    pub fn build_simulation(&self) -> Result<Simulation<ForceField, AcceleratedIntegrator>> {
        let state = self.build_state()?;
        let n = state.len();
        let ff = self.build_force_field(n)?;
        let constraints = self.build_constraints(n)?;
        let integrator = self.build_integrator()?;

        let mut sim = Simulation::new(state, ff, integrator)
            .with_constraints(constraints)
            .with_noise(Box::new(self.build_noise()));
        if let Some(schedule) = self.temperature_schedule {
            sim = sim.with_schedule(schedule);
        }
        if let Some(reporter) = self.build_reporter()? {
            sim = sim.with_reporter(reporter);
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use crate::integrator::Integrator;
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    const MULTI_BASIN_YAML: &str = r#"
system:
  positions:
    type: explicit
    coords:
      - [0.0, 0.0, 0.0]
      - [0.1, 0.0, 0.0]
  masses: [12.0, 1.0]
integrator:
  temperature: 300.0
  friction: 1.0
  time_step: 0.002
  total_steps: 100
  seed: 7
  boost:
    type: multi_basin
    group: 0
    basins:
      - {a: 5.0, e: -10.0}
      - {a: 2.0, e: 3.0, m: 1.5}
    plain: 1
    mixture: log_sum_exp
force_field:
  - type: double_well
    group: 0
    barrier: 8.0
    half_width: 0.2
  - type: harmonic_bond
    group: 1
    i: 0
    j: 1
    k: 1000.0
    r0: 0.1
"#;

    #[test]
    fn test_config_validation() {
        let mut config = create_test_config();
        assert!(config.validate().is_ok());

        config.integrator.time_step = -0.1;
        assert!(config.validate().is_err());
        config.integrator.time_step = 0.002;

        config.integrator.temperature = f64::NAN;
        assert!(config.validate().is_err());
        config.integrator.temperature = 300.0;

        config.integrator.boost = BoostConfig::GroupAmd {
            boosted: vec![],
            plain: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_multi_basin() {
        let config = RunConfig::from_yaml(MULTI_BASIN_YAML).unwrap();
        assert!(config.constraints.is_empty());
        assert_eq!(config.shake_tolerance, DEFAULT_SHAKE_TOLERANCE);
        assert_eq!(config.output.report_interval, 1000);
        assert_eq!(config.report_groups(), vec![ForceGroup(0), ForceGroup(1)]);

        let integrator = config.build_integrator().unwrap();
        assert_eq!(integrator.plain_groups(), &[ForceGroup(1)]);
        match integrator.boost() {
            BoostKind::MultiBasin(mb) => {
                assert_eq!(mb.evaluation, MixtureEvaluation::LogSumExp);
                assert_eq!(mb.offsets(), vec![0.0, 1.5]);
            }
            other => panic!("unexpected boost {:?}", other),
        }
    }

    #[test]
    fn test_position_generation() {
        let config = create_test_config();
        let positions = config.generate_positions();
        assert_eq!(positions.len(), 8);

        let mut xs: Vec<f64> = positions.iter().map(|p| p.x).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        xs.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        assert_eq!(xs.len(), 2);
        assert_relative_eq!(xs[1] - xs[0], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_generation() {
        let mut config = create_test_config();
        config.system.velocities = VelocityConfig::MaxwellBoltzmann {
            temperature: 300.0,
            seed: Some(42),
        };
        let masses = vec![1.0, 2.0, 0.0, 4.0];
        let velocities = config.generate_velocities(&masses).unwrap();
        assert_eq!(velocities.len(), 4);
        assert_eq!(velocities[2], Vector3::zeros());

        let p: Vector3<f64> = velocities.iter().zip(&masses).map(|(v, &m)| v * m).sum();
        assert!(p.norm() < 1e-10);

        // same seed, same draw
        assert_eq!(config.generate_velocities(&masses).unwrap(), velocities);
    }

    #[test]
    fn test_mass_generation() {
        let mut config = create_test_config();
        assert_eq!(config.generate_masses(8).unwrap(), vec![39.948; 8]);

        config.system.masses = MassConfig::Individual(vec![1.0, 0.0]);
        assert_eq!(config.generate_masses(2).unwrap(), vec![1.0, 0.0]);
        assert!(config.generate_masses(3).is_err());
    }

    #[test]
    fn test_temperature_schedule() {
        let schedule = TemperatureSchedule {
            initial_temperature: 200.0,
            final_temperature: 400.0,
            ramp_steps: 10,
        };
        assert_relative_eq!(schedule.temperature_at(0), 200.0);
        assert_relative_eq!(schedule.temperature_at(5), 300.0);
        assert_relative_eq!(schedule.temperature_at(10), 400.0);
        assert_relative_eq!(schedule.temperature_at(1000), 400.0);
    }

    #[test]
    fn test_temperature_override_reaches_schedule() {
        let mut config = create_test_config();
        assert_eq!(config.override_temperature(250.0), None);
        assert_relative_eq!(config.integrator.temperature, 250.0);

        config.temperature_schedule = Some(TemperatureSchedule {
            initial_temperature: 100.0,
            final_temperature: 300.0,
            ramp_steps: 10,
        });
        assert_eq!(config.override_temperature(450.0), Some(100.0));
        let schedule = config.temperature_schedule.unwrap();
        assert_relative_eq!(schedule.temperature_at(10), 450.0);
        assert_relative_eq!(schedule.temperature_at(0), 100.0);

        let mut sim = config.build_simulation().unwrap();
        sim.run(12).unwrap();
        assert_relative_eq!(sim.integrator().thermostat().temperature(), 450.0);
    }

    #[test]
    fn test_constraints_out_of_range() {
        let mut config = create_test_config();
        config.constraints = vec![DistanceConstraint {
            i: 0,
            j: 8,
            distance: 0.4,
        }];
        assert!(config.build_constraints(8).is_err());
        config.constraints[0].j = 1;
        assert!(config.build_constraints(8).is_ok());
    }

    #[test]
    fn test_yaml_serialization() {
        let config = create_test_config();
        let yaml = serde_yml::to_string(&config).unwrap();
        let deserialized: RunConfig = serde_yml::from_str(&yaml).unwrap();
        assert!(deserialized.validate().is_ok());
    }

    #[test]
    fn test_file_io() {
        let config = create_test_config();
        let temp_file = NamedTempFile::new().unwrap();
        config.to_file(temp_file.path()).unwrap();

        let loaded = RunConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.integrator.total_steps, config.integrator.total_steps);
        assert!(loaded.build_simulation().is_ok());
    }

    fn create_test_config() -> RunConfig {
        RunConfig {
            system: SystemConfig {
                positions: PositionConfig::CubicLattice {
                    n_per_side: 2,
                    spacing: 0.4,
                    offset: None,
                },
                velocities: VelocityConfig::Zero,
                masses: MassConfig::Uniform(39.948),
                box_lengths: Some([0.8, 0.8, 0.8]),
            },
            integrator: IntegratorConfig {
                temperature: 300.0,
                friction: 1.0,
                time_step: 0.002,
                total_steps: 1000,
                seed: Some(1),
                boost: BoostConfig::GroupAmd {
                    boosted: vec![GroupBoost {
                        group: ForceGroup(0),
                        alpha: 4.0,
                        e_max: -2.0,
                    }],
                    plain: vec![],
                },
            },
            temperature_schedule: None,
            force_field: vec![ForceTermConfig::LennardJones {
                group: ForceGroup(0),
                epsilon: 0.996,
                sigma: 0.34,
                cutoff: Some(0.39),
            }],
            constraints: vec![],
            shake_tolerance: DEFAULT_SHAKE_TOLERANCE,
            shake_max_iterations: DEFAULT_SHAKE_MAX_ITERATIONS,
            output: OutputConfig::default(),
        }
    }
}
