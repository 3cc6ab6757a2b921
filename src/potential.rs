//! Analytic force terms grouped into force groups.
//!
//! A [`ForceField`] is a list of terms, each tagged with the force group it
//! belongs to. Querying a group sums the forces and energies of its terms.

use nalgebra::Vector3;

use crate::provider::{ForceGroup, ForceGroupProvider, GroupEvaluation};

pub trait ForceTerm: Send + Sync {
    /// Potential energy and per-particle forces at `positions`.
    fn energy_forces(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>);

    fn name(&self) -> &'static str;
}

/// 12-6 Lennard-Jones pair interaction between all particles.
#[derive(Debug, Clone)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: Option<f64>,
    /// Periodic box for the minimum-image convention; `None` for an isolated cluster.
    pub box_lengths: Option<Vector3<f64>>,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        LennardJones {
            epsilon,
            sigma,
            cutoff: None,
            box_lengths: None,
        }
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn with_box(mut self, box_lengths: Vector3<f64>) -> Self {
        self.box_lengths = Some(box_lengths);
        self
    }

    fn minimum_image(&self, mut d: Vector3<f64>) -> Vector3<f64> {
        if let Some(lengths) = self.box_lengths {
            for k in 0..3 {
                let l = lengths[k];
                d[k] -= l * (d[k] / l).round();
            }
        }
        d
    }
}

impl ForceTerm for LennardJones {
    fn energy_forces(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let n = positions.len();
        let mut forces = vec![Vector3::zeros(); n];
        let mut energy = 0.0;
        let sigma2 = self.sigma * self.sigma;
        let r_cut2 = self.cutoff.map(|rc| rc * rc).unwrap_or(f64::INFINITY);

        for i in 0..n {
            for j in (i + 1)..n {
                let rij = self.minimum_image(positions[i] - positions[j]);
                let r2 = rij.norm_squared();
                if r2 > r_cut2 {
                    continue;
                }

                let inv_r2 = sigma2 / r2;
                let inv_r6 = inv_r2 * inv_r2 * inv_r2;
                energy += 4.0 * self.epsilon * (inv_r6 * inv_r6 - inv_r6);

                let f_mag = 48.0 * self.epsilon * inv_r6 * (inv_r6 - 0.5) / r2;
                let fij = rij * f_mag;
                forces[i] += fij;
                forces[j] -= fij;
            }
        }

        (energy, forces)
    }

    fn name(&self) -> &'static str {
        "lennard_jones"
    }
}

/// Isotropic spring `k/2 |x - center|^2` acting on every particle.
#[derive(Debug, Clone)]
pub struct HarmonicTether {
    pub k: f64,
    pub center: Vector3<f64>,
}

impl ForceTerm for HarmonicTether {
    fn energy_forces(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let mut energy = 0.0;
        let forces = positions
            .iter()
            .map(|x| {
                let d = x - self.center;
                energy += 0.5 * self.k * d.norm_squared();
                d * -self.k
            })
            .collect();
        (energy, forces)
    }

    fn name(&self) -> &'static str {
        "harmonic_tether"
    }
}

/// Quartic double well `barrier ((x/w)^2 - 1)^2` along one Cartesian axis.
///
/// Minima sit at `x = ±half_width` and are separated by a barrier of height
/// `barrier` at `x = 0`.
#[derive(Debug, Clone)]
pub struct DoubleWell {
    pub barrier: f64,
    pub half_width: f64,
    pub axis: usize,
}

impl ForceTerm for DoubleWell {
    fn energy_forces(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let w2 = self.half_width * self.half_width;
        let mut energy = 0.0;
        let forces = positions
            .iter()
            .map(|x| {
                let q = x[self.axis];
                let u = q * q / w2 - 1.0;
                energy += self.barrier * u * u;
                let mut f = Vector3::zeros();
                f[self.axis] = -4.0 * self.barrier * u * q / w2;
                f
            })
            .collect();
        (energy, forces)
    }

    fn name(&self) -> &'static str {
        "double_well"
    }
}

/// Harmonic bond `k/2 (r - r0)^2` between two particles.
#[derive(Debug, Clone)]
pub struct HarmonicBond {
    pub i: usize,
    pub j: usize,
    pub k: f64,
    pub r0: f64,
}

impl ForceTerm for HarmonicBond {
    fn energy_forces(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let mut forces = vec![Vector3::zeros(); positions.len()];
        let rij = positions[self.i] - positions[self.j];
        let r = rij.norm();
        let dr = r - self.r0;
        if r > 0.0 {
            let fij = rij * (-self.k * dr / r);
            forces[self.i] += fij;
            forces[self.j] -= fij;
        }
        (0.5 * self.k * dr * dr, forces)
    }

    fn name(&self) -> &'static str {
        "harmonic_bond"
    }
}

/// Force terms partitioned into force groups.
#[derive(Default)]
pub struct ForceField {
    terms: Vec<(ForceGroup, Box<dyn ForceTerm>)>,
}

impl ForceField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, group: ForceGroup, term: Box<dyn ForceTerm>) {
        self.terms.push((group, term));
    }

    pub fn with_term(mut self, group: ForceGroup, term: impl ForceTerm + 'static) -> Self {
        self.add_term(group, Box::new(term));
        self
    }

    /// Distinct groups that own at least one term, in ascending order.
    pub fn groups(&self) -> Vec<ForceGroup> {
        let mut groups: Vec<ForceGroup> = self.terms.iter().map(|(g, _)| *g).collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn term_names(&self, group: ForceGroup) -> Vec<&'static str> {
        self.terms
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, t)| t.name())
            .collect()
    }
}

impl ForceGroupProvider for ForceField {
    fn forces_and_energy(&self, group: ForceGroup, positions: &[Vector3<f64>]) -> GroupEvaluation {
        let mut forces = vec![Vector3::zeros(); positions.len()];
        let mut energy = 0.0;
        for (_, term) in self.terms.iter().filter(|(g, _)| *g == group) {
            let (e, f) = term.energy_forces(positions);
            energy += e;
            for (acc, fi) in forces.iter_mut().zip(&f) {
                *acc += fi;
            }
        }
        GroupEvaluation { forces, energy }
    }
}
