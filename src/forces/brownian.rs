use super::{ForceBuffer, ForceContext, ForceModel};
use crate::particle::Diffusible;
use bioparticle_common::{BrownianConfig, Vec3};
use rand::{Rng, RngCore};
use std::f64::consts::PI;

/// Thermal agitation: an isotropic Gaussian velocity kick per substep,
/// Δv = √(2·D/dt)·ξ, written to the impulse channel as m·Δv.
#[derive(Debug, Clone)]
pub struct BrownianMotion {
    strength: f64,
    spare: Option<f64>,
}

impl BrownianMotion {
    pub fn new(config: &BrownianConfig) -> Self {
        BrownianMotion { strength: config.strength, spare: None }
    }

    /// Standard normal sample via the Box–Muller transform. Each transform
    /// yields two independent samples; the second is kept for the next call.
    fn gaussian(&mut self, rng: &mut dyn RngCore) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // Avoid ln(0).
        let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.random::<f64>();
        let mag = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;
        self.spare = Some(mag * theta.sin());
        mag * theta.cos()
    }
}

impl ForceModel for BrownianMotion {
    fn name(&self) -> &'static str {
        "brownian"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        if !(ctx.dt > 0.0) || self.strength == 0.0 {
            return;
        }
        for (slot, p) in ctx.particles.active() {
            if !p.diffuses() {
                continue;
            }
            let sigma = (2.0 * p.diffusion_coefficient() / ctx.dt).sqrt() * self.strength;
            let xi = Vec3::new(self.gaussian(rng), self.gaussian(rng), self.gaussian(rng));
            out.add_impulse(slot, xi * (sigma * p.mass));
        }
    }
}
