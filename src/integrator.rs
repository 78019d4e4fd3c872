use crate::forces::Accumulator;
use crate::particle::Particle;
use bioparticle_common::{BoundaryPolicy, BoundsConfig, SimParams, Vec3};

/// Simulation box plus the rule applied at its faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: Vec3,
    pub max: Vec3,
    pub policy: BoundaryPolicy,
}

impl Domain {
    pub fn new(bounds: BoundsConfig, policy: BoundaryPolicy) -> Self {
        Domain { min: bounds.min, max: bounds.max, policy }
    }

    pub fn from_params(params: &SimParams) -> Self {
        let policy = if params.periodic {
            BoundaryPolicy::Periodic
        } else {
            BoundaryPolicy::Reflective { restitution: params.wall_restitution }
        };
        Domain { min: params.bounds_min, max: params.bounds_max, policy }
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn is_periodic(&self) -> bool {
        matches!(self.policy, BoundaryPolicy::Periodic)
    }

    /// Displacement from `from` to `to`; the minimum image under periodic boundaries.
    #[inline(always)]
    pub fn separation(&self, from: Vec3, to: Vec3) -> Vec3 {
        let mut d = to - from;
        if self.is_periodic() {
            let extent = self.extent();
            for axis in 0..3 {
                let l = extent[axis];
                let c = d.axis_mut(axis);
                *c -= l * (*c / l).round();
            }
        }
        d
    }

    /// Brings a position back inside the box, adjusting velocity for reflective walls.
    pub fn enforce(&self, position: &mut Vec3, velocity: &mut Vec3) {
        match self.policy {
            BoundaryPolicy::Reflective { restitution } => {
                for axis in 0..3 {
                    let (lo, hi) = (self.min[axis], self.max[axis]);
                    let p = position.axis_mut(axis);
                    if *p < lo {
                        *p = lo;
                        let v = velocity.axis_mut(axis);
                        if *v < 0.0 {
                            *v = -*v * restitution;
                        }
                    } else if *p > hi {
                        *p = hi;
                        let v = velocity.axis_mut(axis);
                        if *v > 0.0 {
                            *v = -*v * restitution;
                        }
                    }
                }
            }
            BoundaryPolicy::Periodic => {
                for axis in 0..3 {
                    let (lo, hi) = (self.min[axis], self.max[axis]);
                    let l = hi - lo;
                    let p = position.axis_mut(axis);
                    if *p < lo || *p >= hi {
                        *p = lo + (*p - lo).rem_euclid(l);
                        // rem_euclid can round up to exactly l.
                        if *p >= hi {
                            *p = lo;
                        }
                    }
                }
            }
        }
    }
}

/// Semi-implicit Euler with velocity damping and a speed limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    pub max_speed: f64,
}

impl Integrator {
    pub fn new(params: &SimParams) -> Self {
        Integrator { max_speed: params.max_speed }
    }

    /// Advances one particle by one substep using its accumulated channels.
    /// `particle.force` already holds the total force for this substep.
    pub fn integrate(&self, particle: &mut Particle, accum: &Accumulator, dt: f64, domain: &Domain) {
        if !particle.is_active() {
            return;
        }
        if particle.anchored {
            particle.velocity = Vec3::ZERO;
            particle.acceleration = Vec3::ZERO;
            return;
        }
        let inv_mass = 1.0 / particle.mass;

        particle.velocity += accum.impulse * inv_mass;
        particle.acceleration = particle.force * inv_mass;
        particle.velocity += particle.acceleration * dt;
        particle.velocity *= particle.damping;
        particle.velocity = particle.velocity.clamp_length(self.max_speed);

        particle.position += particle.velocity * dt + accum.displacement;
        domain.enforce(&mut particle.position, &mut particle.velocity);
    }
}
