use super::{ForceBuffer, ForceContext, ForceModel, MIN_DISTANCE};
use bioparticle_common::CollisionConfig;
use rand::RngCore;

/// Hard-sphere contacts.
///
/// Each overlapping pair is handled once (lower slot first): positions are
/// separated along the contact normal in proportion to inverse mass, and an
/// approaching pair exchanges the impulse J = (1 + e)·v_rel·n / (1/m_i + 1/m_j).
/// Anchored particles have infinite mass.
#[derive(Debug, Clone)]
pub struct Collision {
    restitution: f64,
}

impl Collision {
    pub fn new(config: &CollisionConfig) -> Self {
        Collision { restitution: config.restitution }
    }
}

impl ForceModel for Collision {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, _rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        for (i, p) in ctx.particles.active() {
            let w_i = if p.anchored { 0.0 } else { 1.0 / p.mass };
            ctx.for_each_neighbor(i, p, |j, q, offset, distance| {
                if j <= i {
                    return;
                }
                let contact = p.radius + q.radius;
                if distance >= contact || distance < MIN_DISTANCE {
                    return;
                }
                let w_j = if q.anchored { 0.0 } else { 1.0 / q.mass };
                let w_sum = w_i + w_j;
                if w_sum <= 0.0 {
                    return;
                }
                // Contact normal from i to j.
                let n = offset * (1.0 / distance);
                let overlap = contact - distance;
                out.add_displacement(i, n * (-overlap * w_i / w_sum));
                out.add_displacement(j, n * (overlap * w_j / w_sum));

                let approach = (p.velocity - q.velocity).dot(n);
                if approach <= 0.0 {
                    return; // already separating
                }
                let impulse = (1.0 + self.restitution) * approach / w_sum;
                if !impulse.is_finite() {
                    return;
                }
                // Impulse channel holds momentum; zero inverse mass means no response.
                if w_i > 0.0 {
                    out.add_impulse(i, n * -impulse);
                }
                if w_j > 0.0 {
                    out.add_impulse(j, n * impulse);
                }
            });
        }
    }
}
