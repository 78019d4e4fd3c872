use crate::config::AdaptiveStepConfig;
use crate::vecmath::Vec3;
use serde::{Deserialize, Serialize};

/// Simulation parameters derived from a process configuration, used frequently during ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    // World & Grid
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub extent: Vec3,
    pub cell_size: [f64; 3], // Per axis; equal unless the boundary is periodic
    pub inv_cell_size: [f64; 3],
    pub grid_dims: [u32; 3],
    pub num_grid_cells: usize,
    pub periodic: bool,
    pub wall_restitution: f64,

    // Integration
    pub substeps: u32,
    pub max_speed: f64,
    pub adaptive: Option<AdaptiveStepConfig>,
    // Largest pair distance any force model evaluates; 0 without pair forces
    pub force_reach: f64,
}

impl SimParams {
    /// Smallest cell edge across the three axes.
    pub fn min_cell_size(&self) -> f64 {
        self.cell_size[0].min(self.cell_size[1]).min(self.cell_size[2])
    }

    /// Length a particle may cross per substep before the step is refined:
    /// the force reach, or the cell edge when no pair force acts.
    pub fn cfl_length(&self) -> f64 {
        if self.force_reach > 0.0 {
            self.force_reach.min(self.min_cell_size())
        } else {
            self.min_cell_size()
        }
    }

    /// Substeps for a tick of `dt` when the fastest particle moves at
    /// `peak_speed`. Fixed unless adaptive stepping is configured.
    pub fn substeps_for(&self, dt: f64, peak_speed: f64) -> u32 {
        let base = self.substeps.max(1);
        let Some(adaptive) = self.adaptive else { return base };
        let limit = adaptive.max_cfl * self.cfl_length();
        let mut substeps = base;
        while substeps < adaptive.max_substeps && peak_speed * dt / substeps as f64 > limit {
            substeps = substeps.saturating_mul(2).min(adaptive.max_substeps);
        }
        substeps
    }
}
