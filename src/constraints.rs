//! Constraint projectors.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{require_positive, AmdError, Result};
use crate::provider::ConstraintProjector;

/// Projector for systems without holonomic constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraints;

impl ConstraintProjector for NoConstraints {
    fn project(&self, _: &[Vector3<f64>], _: &mut [Vector3<f64>], _: &[f64]) -> Result<()> {
        Ok(())
    }
}

/// Fixed distance between particles `i` and `j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}

pub const DEFAULT_SHAKE_TOLERANCE: f64 = 1.0e-8;
pub const DEFAULT_SHAKE_MAX_ITERATIONS: usize = 500;

/// SHAKE projection of pair distances.
///
/// Corrections are applied along the bond vectors of the reference
/// (pre-drift) configuration, weighted by inverse mass. The tolerance is
/// relative: iteration stops once `|d^2 - r^2| / (2 d^2) < tolerance` for
/// every constraint.
#[derive(Debug, Clone)]
pub struct Shake {
    constraints: Vec<DistanceConstraint>,
    tolerance: f64,
    max_iterations: usize,
}

impl Shake {
    pub fn new(constraints: Vec<DistanceConstraint>) -> Result<Self> {
        for c in &constraints {
            require_positive("constraint distance", c.distance)?;
            if c.i == c.j {
                return Err(AmdError::InvalidParameter {
                    name: "constraint particle",
                    value: c.i as f64,
                    reason: "a constraint needs two distinct particles",
                });
            }
        }
        Ok(Self {
            constraints,
            tolerance: DEFAULT_SHAKE_TOLERANCE,
            max_iterations: DEFAULT_SHAKE_MAX_ITERATIONS,
        })
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        require_positive("shake tolerance", tolerance)?;
        self.tolerance = tolerance;
        Ok(self)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        if max_iterations == 0 {
            return Err(AmdError::InvalidParameter {
                name: "shake max iterations",
                value: 0.0,
                reason: "must be at least one",
            });
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    /// Fail if any constraint refers to a particle index `>= n`.
    pub fn check_indices(&self, n: usize) -> Result<()> {
        match self
            .constraints
            .iter()
            .map(|c| c.i.max(c.j))
            .find(|&idx| idx >= n)
        {
            Some(idx) => Err(AmdError::LengthMismatch {
                what: "constrained particle index range",
                expected: n,
                found: idx + 1,
            }),
            None => Ok(()),
        }
    }
}

impl ConstraintProjector for Shake {
    fn project(
        &self,
        old_positions: &[Vector3<f64>],
        positions: &mut [Vector3<f64>],
        inv_masses: &[f64],
    ) -> Result<()> {
        if self.constraints.is_empty() {
            return Ok(());
        }
        self.check_indices(positions.len())?;

        let mut max_error = 0.0;
        for _ in 0..self.max_iterations {
            max_error = 0.0f64;

            for c in &self.constraints {
                let (inv_i, inv_j) = (inv_masses[c.i], inv_masses[c.j]);
                let d2 = c.distance * c.distance;
                let s = positions[c.i] - positions[c.j];
                let diff = d2 - s.norm_squared();
                let error = diff.abs() / (2.0 * d2);
                if error.is_nan() {
                    return Err(AmdError::ConstraintNotConverged {
                        iterations: self.max_iterations,
                        max_error: f64::NAN,
                    });
                }
                max_error = max_error.max(error);
                if error < self.tolerance || inv_i + inv_j == 0.0 {
                    continue;
                }

                let r_ref = old_positions[c.i] - old_positions[c.j];
                let g = diff / (2.0 * s.dot(&r_ref) * (inv_i + inv_j));
                positions[c.i] += r_ref * (g * inv_i);
                positions[c.j] -= r_ref * (g * inv_j);
            }

            if max_error < self.tolerance {
                return Ok(());
            }
        }

        Err(AmdError::ConstraintNotConverged {
            iterations: self.max_iterations,
            max_error,
        })
    }

    fn constraint_count(&self) -> usize {
        self.constraints.len()
    }
}
