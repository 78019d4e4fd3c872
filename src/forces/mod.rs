//! Pluggable force models.
//!
//! Every model reads particles through a [`ForceContext`] and writes into a
//! per-slot [`ForceBuffer`]. Models never touch velocity or position; the
//! integrator consumes the three accumulated channels.

mod brownian;
mod collision;
mod composite;
mod electrostatic;
mod lennard_jones;
mod sph;

pub use brownian::BrownianMotion;
pub use collision::Collision;
pub use composite::Composite;
pub use electrostatic::Electrostatic;
pub use lennard_jones::LennardJones;
pub use sph::Sph;

use crate::arena::ParticleArena;
use crate::environment::Environment;
use crate::grid::SpatialIndex;
use crate::integrator::Domain;
use crate::particle::Particle;
use bioparticle_common::{ForceModelConfig, Vec3};
use rand::RngCore;

// Pairs closer than this are treated as coincident and skipped.
pub(crate) const MIN_DISTANCE: f64 = 1e-9;

/// Per-particle output of the force models for one substep.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    /// Continuous force, integrated over dt.
    pub force: Vec3,
    /// Instantaneous momentum change.
    pub impulse: Vec3,
    /// Direct positional correction (overlap resolution).
    pub displacement: Vec3,
}

#[derive(Debug, Default)]
pub struct ForceBuffer {
    entries: Vec<Accumulator>,
}

impl ForceBuffer {
    /// Zeroes the buffer and sizes it for `slots` arena slots.
    pub fn reset(&mut self, slots: usize) {
        self.entries.clear();
        self.entries.resize(slots, Accumulator::default());
    }

    pub fn get(&self, slot: usize) -> Accumulator {
        self.entries.get(slot).copied().unwrap_or_default()
    }

    pub fn add_force(&mut self, slot: usize, f: Vec3) {
        if let Some(e) = self.entries.get_mut(slot) {
            e.force += f;
        }
    }

    pub fn add_impulse(&mut self, slot: usize, j: Vec3) {
        if let Some(e) = self.entries.get_mut(slot) {
            e.impulse += j;
        }
    }

    pub fn add_displacement(&mut self, slot: usize, d: Vec3) {
        if let Some(e) = self.entries.get_mut(slot) {
            e.displacement += d;
        }
    }
}

/// Read-only view of the system handed to force models.
pub struct ForceContext<'a> {
    pub particles: &'a ParticleArena,
    pub index: &'a SpatialIndex,
    pub domain: &'a Domain,
    pub environment: &'a Environment,
    pub dt: f64,
}

impl<'a> ForceContext<'a> {
    /// Calls `f(slot, particle, offset, distance)` for every other active
    /// particle in the 27-cell block around `p`. `offset` points from `p` to
    /// the neighbour and respects periodic wrapping.
    pub fn for_each_neighbor<F>(&self, slot: usize, p: &Particle, mut f: F)
    where
        F: FnMut(usize, &'a Particle, Vec3, f64),
    {
        let particles = self.particles;
        self.index.for_each_neighbor(p.position, |other| {
            if other == slot {
                return;
            }
            let Some(q) = particles.slot(other) else { return };
            if !q.is_active() {
                return;
            }
            let offset = self.domain.separation(p.position, q.position);
            f(other, q, offset, offset.length());
        });
    }
}

/// A source of per-substep forces.
pub trait ForceModel: Send {
    fn name(&self) -> &'static str;

    /// Adds this model's contribution for every active particle.
    fn accumulate(&mut self, ctx: &ForceContext<'_>, rng: &mut dyn RngCore, out: &mut ForceBuffer);

    /// Mean fluid density of the last evaluation, for density-based models.
    fn mean_density(&self) -> Option<f64> {
        None
    }
}

/// Instantiates the models described by a (validated) configuration.
pub fn build(config: &ForceModelConfig) -> Box<dyn ForceModel> {
    match config {
        ForceModelConfig::Brownian(c) => Box::new(BrownianMotion::new(c)),
        ForceModelConfig::Electrostatic(c) => Box::new(Electrostatic::new(c)),
        ForceModelConfig::Sph(c) => Box::new(Sph::new(c)),
        ForceModelConfig::LennardJones(c) => Box::new(LennardJones::new(c)),
        ForceModelConfig::Collision(c) => Box::new(Collision::new(c)),
        ForceModelConfig::Composite { models } => Box::new(Composite::new(models.iter().map(build).collect())),
    }
}
