use super::{ForceBuffer, ForceContext, ForceModel, MIN_DISTANCE};
use bioparticle_common::{SphConfig, Vec3};
use rand::RngCore;
use std::f64::consts::PI;

/// Smoothed-particle hydrodynamics with Müller-style kernels.
///
/// Two passes per substep: poly6 densities (self contribution included),
/// then pressure (spiky gradient), viscosity (laplacian) and a cohesive
/// surface-tension pull. All terms vanish beyond the smoothing length.
#[derive(Debug, Clone)]
pub struct Sph {
    config: SphConfig,
    poly6: f64,
    spiky_grad: f64,
    visc_lap: f64,
    // Per-slot density and pressure from the last density pass.
    densities: Vec<f64>,
    pressures: Vec<f64>,
    mean_density: Option<f64>,
}

impl Sph {
    pub fn new(config: &SphConfig) -> Self {
        let h = config.smoothing_length;
        Sph {
            config: config.clone(),
            poly6: 315.0 / (64.0 * PI * h.powi(9)),
            spiky_grad: -45.0 / (PI * h.powi(6)),
            visc_lap: 45.0 / (PI * h.powi(6)),
            densities: Vec::new(),
            pressures: Vec::new(),
            mean_density: None,
        }
    }

    /// Poly6 kernel W(r).
    pub fn kernel(&self, r: f64) -> f64 {
        let h = self.config.smoothing_length;
        if r >= h {
            return 0.0;
        }
        let x = h * h - r * r;
        self.poly6 * x * x * x
    }

    pub fn density(&self, slot: usize) -> Option<f64> {
        self.densities.get(slot).copied().filter(|d| *d > 0.0)
    }

    fn compute_densities(&mut self, ctx: &ForceContext<'_>) {
        let slots = ctx.particles.slot_count();
        self.densities.clear();
        self.densities.resize(slots, 0.0);
        self.pressures.clear();
        self.pressures.resize(slots, 0.0);

        let (mut sum, mut count) = (0.0, 0usize);
        for (slot, p) in ctx.particles.active() {
            let mut rho = p.mass * self.kernel(0.0);
            ctx.for_each_neighbor(slot, p, |_, q, _, r| {
                rho += q.mass * self.kernel(r);
            });
            if rho.is_finite() {
                self.densities[slot] = rho;
                self.pressures[slot] = self.config.gas_constant * (rho - self.config.rest_density);
                sum += rho;
                count += 1;
            }
        }
        self.mean_density = if count > 0 { Some(sum / count as f64) } else { None };
    }
}

impl ForceModel for Sph {
    fn name(&self) -> &'static str {
        "sph"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, _rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        self.compute_densities(ctx);
        let h = self.config.smoothing_length;

        for (slot, p) in ctx.particles.active() {
            let rho_i = self.densities[slot];
            if !(rho_i > 0.0) || p.anchored {
                continue;
            }
            let p_i = self.pressures[slot];
            let mut f_pressure = Vec3::ZERO;
            let mut f_viscosity = Vec3::ZERO;
            let mut f_surface = Vec3::ZERO;

            ctx.for_each_neighbor(slot, p, |j, q, offset, r| {
                if r >= h || r < MIN_DISTANCE {
                    return;
                }
                let rho_j = self.densities[j];
                if !(rho_j > 0.0) {
                    return;
                }
                // Unit vector from the neighbour toward this particle.
                let away = offset * (-1.0 / r);
                let w = h - r;
                // ∇W_spiky = spiky_grad * (h - r)² * r̂ (negative coefficient).
                let grad = away * (self.spiky_grad * w * w);
                f_pressure -= grad * (q.mass * (p_i + self.pressures[j]) / (2.0 * rho_j));
                f_viscosity += (q.velocity - p.velocity) * (self.config.viscosity * q.mass / rho_j * self.visc_lap * w);
                f_surface -= away * (self.config.surface_tension * q.mass / rho_j * self.kernel(r));
            });

            // Force densities → force on a particle of mass m_i.
            let force = (f_pressure + f_viscosity + f_surface) * (p.mass / rho_i);
            if force.is_finite() {
                out.add_force(slot, force);
            }
        }
    }

    fn mean_density(&self) -> Option<f64> {
        self.mean_density
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::test_support::World;
    use bioparticle_common::{BioType, BoundaryPolicy, SpeciesConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fluid() -> SpeciesConfig {
        SpeciesConfig::new("water", BioType::Fluid, 1.0, 0.05)
    }

    #[test]
    fn isolated_particle_has_self_density_only() {
        let mut world = World::new(10.0, 1.0, BoundaryPolicy::default());
        world.add(&fluid(), Vec3::splat(5.0), Vec3::ZERO);
        let mut sph = Sph::new(&SphConfig::default());
        let out = world.evaluate(&mut sph, 0.01, &mut StdRng::seed_from_u64(0));
        let expected = 315.0 / (64.0 * PI);
        assert!((sph.density(0).unwrap_or_default() - expected).abs() < 1e-9);
        assert_eq!(sph.mean_density(), sph.density(0));
        assert_eq!(out.get(0).force, Vec3::ZERO);
    }

    #[test]
    fn compressed_pair_pushes_apart_symmetrically() {
        let mut world = World::new(10.0, 1.0, BoundaryPolicy::default());
        world.add(&fluid(), Vec3::new(4.9, 5.0, 5.0), Vec3::ZERO);
        world.add(&fluid(), Vec3::new(5.1, 5.0, 5.0), Vec3::ZERO);
        // Rest density far below the pair's density → positive pressure.
        let mut sph = Sph::new(&SphConfig { rest_density: 0.1, ..Default::default() });
        let out = world.evaluate(&mut sph, 0.01, &mut StdRng::seed_from_u64(0));
        assert!(out.get(0).force.x < 0.0);
        assert!(out.get(1).force.x > 0.0);
        assert!((out.get(0).force + out.get(1).force).length() < 1e-9);
    }

    #[test]
    fn rarefied_pair_attracts() {
        let mut world = World::new(10.0, 1.0, BoundaryPolicy::default());
        world.add(&fluid(), Vec3::new(4.7, 5.0, 5.0), Vec3::ZERO);
        world.add(&fluid(), Vec3::new(5.3, 5.0, 5.0), Vec3::ZERO);
        let mut sph = Sph::new(&SphConfig { rest_density: 50.0, viscosity: 0.0, ..Default::default() });
        let out = world.evaluate(&mut sph, 0.01, &mut StdRng::seed_from_u64(0));
        assert!(out.get(0).force.x > 0.0);
    }

    #[test]
    fn viscosity_damps_relative_motion() {
        let mut world = World::new(10.0, 1.0, BoundaryPolicy::default());
        world.add(&fluid(), Vec3::new(4.8, 5.0, 5.0), Vec3::new(0.0, 1.0, 0.0));
        world.add(&fluid(), Vec3::new(5.2, 5.0, 5.0), Vec3::new(0.0, -1.0, 0.0));
        let mut sph = Sph::new(&SphConfig { gas_constant: 0.0, viscosity: 1.0, ..Default::default() });
        let out = world.evaluate(&mut sph, 0.01, &mut StdRng::seed_from_u64(0));
        assert!(out.get(0).force.y < 0.0);
        assert!(out.get(1).force.y > 0.0);
    }
}
