use super::{ForceBuffer, ForceContext, ForceModel, MIN_DISTANCE};
use bioparticle_common::{LennardJonesConfig, Vec3};
use rand::RngCore;

/// 12-6 Lennard-Jones with a soft core.
///
/// σ = sigma_scale·(r_i + r_j); pairs interact out to cutoff_multiple·(r_i + r_j).
/// Separations below soft_core·σ are evaluated at soft_core·σ so deeply
/// overlapping particles get a large but finite push.
#[derive(Debug, Clone)]
pub struct LennardJones {
    config: LennardJonesConfig,
}

impl LennardJones {
    pub fn new(config: &LennardJonesConfig) -> Self {
        LennardJones { config: config.clone() }
    }

    /// Scalar force along the separation; positive is repulsive.
    pub fn magnitude(&self, r: f64, sigma: f64) -> f64 {
        let r = r.max(self.config.soft_core * sigma);
        let sr6 = (sigma / r).powi(6);
        24.0 * self.config.epsilon / r * (2.0 * sr6 * sr6 - sr6)
    }
}

impl ForceModel for LennardJones {
    fn name(&self) -> &'static str {
        "lennard-jones"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, _rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        for (slot, p) in ctx.particles.active() {
            let mut total = Vec3::ZERO;
            ctx.for_each_neighbor(slot, p, |_, q, offset, r| {
                let contact = p.radius + q.radius;
                if r < MIN_DISTANCE || contact <= 0.0 || r >= self.config.cutoff_multiple * contact {
                    return;
                }
                let sigma = self.config.sigma_scale * contact;
                let f = offset * (-self.magnitude(r, sigma) / r);
                if f.is_finite() {
                    total += f;
                }
            });
            out.add_force(slot, total);
        }
    }
}
