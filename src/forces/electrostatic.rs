use super::{ForceBuffer, ForceContext, ForceModel, MIN_DISTANCE};
use crate::particle::{Bindable, Chargeable};
use bioparticle_common::{ElectrostaticConfig, Vec3};
use rand::RngCore;

/// Debye-screened Coulomb interaction between charged particles.
///
/// F_i = -k/ε · q_i q_j · exp(-r/λ) · r̂_ij / (r² + s²), with r̂_ij pointing
/// from i to j, so like charges repel and opposite charges attract. A pair
/// interacts while r is inside the larger of the two interaction radii.
#[derive(Debug, Clone)]
pub struct Electrostatic {
    config: ElectrostaticConfig,
}

impl Electrostatic {
    pub fn new(config: &ElectrostaticConfig) -> Self {
        Electrostatic { config: config.clone() }
    }

    /// Force on a charge `qi` from `qj` at `offset` (i → j).
    pub fn pair_force(&self, qi: f64, qj: f64, offset: Vec3, distance: f64, debye: f64) -> Vec3 {
        let k = self.config.coulomb_constant / self.config.dielectric_constant;
        let s2 = self.config.softening * self.config.softening;
        let screening = if debye.is_finite() { (-distance / debye).exp() } else { 1.0 };
        let magnitude = k * qi * qj * screening / (distance * distance + s2);
        offset * (-magnitude / distance)
    }
}

impl ForceModel for Electrostatic {
    fn name(&self) -> &'static str {
        "electrostatic"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, _rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        let debye = self
            .config
            .screening_length(ctx.environment.temperature, ctx.environment.ionic_strength);
        for (slot, p) in ctx.particles.active() {
            if !p.is_charged() {
                continue;
            }
            let mut total = Vec3::ZERO;
            ctx.for_each_neighbor(slot, p, |_, q, offset, distance| {
                if !q.is_charged() || distance < MIN_DISTANCE {
                    return;
                }
                let cutoff = p.interaction_radius().max(q.interaction_radius());
                if distance >= cutoff {
                    return;
                }
                let f = self.pair_force(p.charge(), q.charge(), offset, distance, debye);
                if f.is_finite() {
                    total += f;
                }
            });
            out.add_force(slot, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::test_support::World;
    use bioparticle_common::{BioType, BoundaryPolicy, SpeciesConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ion(charge: f64) -> SpeciesConfig {
        let mut s = SpeciesConfig::new("ion", BioType::Ion, 1.0, 0.1);
        s.charge = charge;
        s.interaction_radius = 3.0;
        s
    }

    fn model() -> Electrostatic {
        Electrostatic::new(&ElectrostaticConfig { debye_length: Some(2.0), ..Default::default() })
    }

    #[test]
    fn like_charges_repel_opposite_attract() {
        let mut world = World::new(10.0, 3.0, BoundaryPolicy::default());
        world.add(&ion(1.0), Vec3::new(4.0, 5.0, 5.0), Vec3::ZERO);
        world.add(&ion(1.0), Vec3::new(5.0, 5.0, 5.0), Vec3::ZERO);
        let out = world.evaluate(&mut model(), 0.01, &mut StdRng::seed_from_u64(0));
        assert!(out.get(0).force.x < 0.0);
        assert!(out.get(1).force.x > 0.0);
        // Newton's third law.
        assert!((out.get(0).force + out.get(1).force).length() < 1e-12);

        let mut world = World::new(10.0, 3.0, BoundaryPolicy::default());
        world.add(&ion(1.0), Vec3::new(4.0, 5.0, 5.0), Vec3::ZERO);
        world.add(&ion(-1.0), Vec3::new(5.0, 5.0, 5.0), Vec3::ZERO);
        let out = world.evaluate(&mut model(), 0.01, &mut StdRng::seed_from_u64(0));
        assert!(out.get(0).force.x > 0.0);
        assert!(out.get(1).force.x < 0.0);
    }

    #[test]
    fn screening_weakens_with_distance_and_cuts_off() {
        let m = model();
        let near = m.pair_force(1.0, 1.0, Vec3::new(1.0, 0.0, 0.0), 1.0, 2.0).length();
        let far = m.pair_force(1.0, 1.0, Vec3::new(2.0, 0.0, 0.0), 2.0, 2.0).length();
        let unscreened = m.pair_force(1.0, 1.0, Vec3::new(2.0, 0.0, 0.0), 2.0, f64::INFINITY).length();
        assert!(far < near);
        assert!(far < unscreened);

        let mut world = World::new(10.0, 3.0, BoundaryPolicy::default());
        world.add(&ion(1.0), Vec3::new(1.0, 5.0, 5.0), Vec3::ZERO);
        world.add(&ion(1.0), Vec3::new(4.5, 5.0, 5.0), Vec3::ZERO);
        let out = world.evaluate(&mut model(), 0.01, &mut StdRng::seed_from_u64(0));
        assert_eq!(out.get(0).force, Vec3::ZERO);
    }

    #[test]
    fn coincident_charges_are_skipped() {
        let mut world = World::new(10.0, 3.0, BoundaryPolicy::default());
        world.add(&ion(1.0), Vec3::splat(5.0), Vec3::ZERO);
        world.add(&ion(1.0), Vec3::splat(5.0), Vec3::ZERO);
        let out = world.evaluate(&mut model(), 0.01, &mut StdRng::seed_from_u64(0));
        assert_eq!(out.get(0).force, Vec3::ZERO);
        assert!(out.get(0).force.is_finite());
    }

    #[test]
    fn periodic_neighbours_interact_across_the_boundary() {
        let mut world = World::new(10.0, 3.0, BoundaryPolicy::Periodic);
        world.add(&ion(1.0), Vec3::new(0.5, 5.0, 5.0), Vec3::ZERO);
        world.add(&ion(1.0), Vec3::new(9.5, 5.0, 5.0), Vec3::ZERO);
        let out = world.evaluate(&mut model(), 0.01, &mut StdRng::seed_from_u64(0));
        // Repelled away from the wrapped neighbour at x = -0.5.
        assert!(out.get(0).force.x > 0.0);
        assert!(out.get(1).force.x < 0.0);
    }
}
