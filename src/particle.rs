use crate::environment::Environment;
use bioparticle_common::{BioType, FaultKind, ParticleId, ParticleSnapshot, SpeciesConfig, Vec3, VisualConfig};
use std::f64::consts::PI;

// Colour a particle drifts toward as its binding progresses.
const BOUND_COLOR: [f32; 3] = [1.0, 0.843, 0.0];
// Tint applied to activated receptors and reaction sites.
const ACTIVE_COLOR: [f32; 3] = [0.2, 1.0, 0.4];

/// Why a particle left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Expired,
    Consumed,
    NumericFault,
}

/// Lifecycle stage, derived from the particle's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleState {
    Spawned,
    Active,
    PartiallyBound,
    Inactive(Fate),
}

/// Capability flags resolved once when the particle is created or converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub chargeable: bool,
    pub diffusible: bool,
    pub bindable: bool,
}

impl Capabilities {
    fn resolve(bio_type: BioType, charge: f64, diffusion: f64, interaction_radius: f64) -> Self {
        let has_partners = BioType::ALL.iter().any(|&other| bio_type.can_bind_with(other));
        Capabilities {
            chargeable: charge != 0.0,
            diffusible: diffusion > 0.0,
            bindable: has_partners && interaction_radius > 0.0,
        }
    }
}

/// Seen by field and electrostatic forces.
pub trait Chargeable {
    fn charge(&self) -> f64;
    fn is_charged(&self) -> bool;
}

/// Seen by the Brownian model.
pub trait Diffusible {
    fn diffusion_coefficient(&self) -> f64;
    fn diffuses(&self) -> bool;
}

/// Seen by the binding resolver and the affinity pull.
pub trait Bindable {
    fn bio_type(&self) -> BioType;
    fn interaction_radius(&self) -> f64;
    fn binding_strength(&self) -> f64;
    fn is_bindable(&self) -> bool;

    /// Symmetric type compatibility.
    fn can_bind_with(&self, other: &dyn Bindable) -> bool {
        self.bio_type().can_bind_with(other.bio_type())
    }
}

/// Neighbour as seen from the particle being updated.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub id: ParticleId,
    pub bio_type: BioType,
    /// Displacement from the updated particle to the neighbour.
    pub offset: Vec3,
    pub distance: f64,
}

/// A single simulated entity.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: ParticleId,
    pub species: usize,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub force: Vec3,
    pub mass: f64,
    pub charge: f64,
    pub radius: f64,
    pub damping: f64,
    bio_type: BioType,
    pub half_life: f64,
    pub diffusion: f64,
    pub interaction_radius: f64,
    pub binding_strength: f64,
    pub attraction_gain: f64,
    pub anchored: bool,
    pub age: f64,
    pub max_age: f64,
    pub binding_progress: f64,
    /// Receptor / reaction-site activation level in [0, 1].
    pub activation: f64,
    active: bool,
    fate: Option<Fate>,
    /// Tick at which the particle was first seen inactive; culled on the next tick.
    pub(crate) retired_at: Option<u64>,
    capabilities: Capabilities,
    base_visual: VisualConfig,
    pub visual: VisualConfig,
}

impl Particle {
    pub fn from_species(id: ParticleId, species: usize, config: &SpeciesConfig, position: Vec3, velocity: Vec3) -> Self {
        let velocity = if config.anchored { Vec3::ZERO } else { velocity };
        Particle {
            id,
            species,
            position,
            velocity,
            acceleration: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: config.mass,
            charge: config.charge,
            radius: config.radius,
            damping: config.damping,
            bio_type: config.bio_type,
            half_life: config.half_life.unwrap_or(f64::INFINITY),
            diffusion: config.diffusion,
            interaction_radius: config.interaction_radius,
            binding_strength: config.binding_strength,
            attraction_gain: config.attraction_gain,
            anchored: config.anchored,
            age: 0.0,
            max_age: config.max_age(),
            binding_progress: 0.0,
            activation: 0.0,
            active: true,
            fate: None,
            retired_at: None,
            capabilities: Capabilities::resolve(config.bio_type, config.charge, config.diffusion, config.interaction_radius),
            base_visual: config.visual,
            visual: config.visual,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn bio_type(&self) -> BioType {
        self.bio_type
    }

    pub fn fate(&self) -> Option<Fate> {
        self.fate
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn state(&self) -> ParticleState {
        match self.fate {
            Some(fate) => ParticleState::Inactive(fate),
            None if self.age == 0.0 => ParticleState::Spawned,
            None if self.binding_progress > 0.0 && self.binding_progress < 1.0 => ParticleState::PartiallyBound,
            None => ParticleState::Active,
        }
    }

    /// Terminal transition; later calls keep the first fate.
    pub fn deactivate(&mut self, fate: Fate) {
        if self.active {
            self.active = false;
            self.fate = Some(fate);
            self.velocity = Vec3::ZERO;
            self.force = Vec3::ZERO;
        }
    }

    /// Changes the biological type, e.g. substrate → product after catalysis.
    pub fn convert(&mut self, bio_type: BioType) {
        self.bio_type = bio_type;
        self.capabilities = Capabilities::resolve(bio_type, self.charge, self.diffusion, self.interaction_radius);
        self.binding_progress = 0.0;
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.length_squared()
    }

    /// Ages the particle and adds environmental and affinity forces on top of
    /// what the force models accumulated into `self.force`.
    ///
    /// `candidates` are nearby particles; only those the particle can bind
    /// with and that lie inside its interaction radius pull on it.
    pub fn update(&mut self, dt: f64, env: &Environment, candidates: &[Neighbor]) {
        if !self.active {
            return;
        }
        self.age += dt;
        if self.age >= self.max_age {
            self.deactivate(Fate::Expired);
            return;
        }
        if self.anchored {
            return;
        }

        if self.is_charged() {
            if let Some(field) = env.electric_field {
                self.force += field * self.charge;
            }
        }
        if env.flow.is_some() {
            self.force += env.flow_at(self.position) * self.mass;
        }
        if let Some(g) = env.gravity {
            self.force += g * self.mass;
        }
        if env.viscosity > 0.0 {
            // Stokes drag on a sphere.
            self.force -= self.velocity * (6.0 * PI * env.viscosity * self.radius);
        }

        if self.is_bindable() && self.attraction_gain > 0.0 {
            for n in candidates {
                if n.distance <= 1e-12 || n.distance >= self.interaction_radius {
                    continue;
                }
                if !self.bio_type.can_bind_with(n.bio_type) {
                    continue;
                }
                let strength = self.binding_strength * (1.0 - n.distance / self.interaction_radius) * self.attraction_gain;
                self.force += n.offset * (strength / n.distance);
            }
        }
    }

    /// Deactivates the particle if its state is no longer finite.
    pub fn check_numeric(&mut self) -> Option<FaultKind> {
        let fault = if !self.position.is_finite() {
            Some(FaultKind::NonFinitePosition)
        } else if !self.velocity.is_finite() {
            Some(FaultKind::NonFiniteVelocity)
        } else {
            None
        };
        if fault.is_some() {
            self.deactivate(Fate::NumericFault);
        }
        fault
    }

    /// Recomputes presentation attributes from progress, activation and age.
    pub fn refresh_visuals(&mut self) {
        let progress = self.binding_progress.clamp(0.0, 1.0) as f32;
        let activation = self.activation.clamp(0.0, 1.0) as f32;
        let mut color = self.base_visual.color;
        for c in 0..3 {
            color[c] += (BOUND_COLOR[c] - color[c]) * progress;
            color[c] += (ACTIVE_COLOR[c] - color[c]) * activation * 0.5;
        }
        let life = if self.max_age.is_finite() {
            (1.0 - self.age / self.max_age).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        self.visual = VisualConfig {
            color,
            size: self.base_visual.size * (0.8 + 0.4 * progress),
            opacity: self.base_visual.opacity * life,
        };
    }

    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            color: self.visual.color,
            size: self.visual.size,
            opacity: self.visual.opacity,
            bio_type: self.bio_type,
            active: self.active,
            binding_progress: self.binding_progress,
        }
    }
}

impl Chargeable for Particle {
    fn charge(&self) -> f64 {
        self.charge
    }

    fn is_charged(&self) -> bool {
        self.capabilities.chargeable
    }
}

impl Diffusible for Particle {
    fn diffusion_coefficient(&self) -> f64 {
        self.diffusion
    }

    fn diffuses(&self) -> bool {
        self.capabilities.diffusible && !self.anchored
    }
}

impl Bindable for Particle {
    fn bio_type(&self) -> BioType {
        Particle::bio_type(self)
    }

    fn interaction_radius(&self) -> f64 {
        self.interaction_radius
    }

    fn binding_strength(&self) -> f64 {
        self.binding_strength
    }

    fn is_bindable(&self) -> bool {
        self.capabilities.bindable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(species: &SpeciesConfig) -> Particle {
        Particle::from_species(ParticleId::new(0, 0), 0, species, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn expires_at_twice_the_half_life_and_not_before() {
        let mut species = SpeciesConfig::new("hormone", BioType::Hormone, 1.0, 0.1);
        species.half_life = Some(0.5);
        let mut p = particle(&species);
        let env = Environment::default();
        let dt = 0.1;
        let mut ticks = 0;
        while p.is_active() {
            p.update(dt, &env, &[]);
            ticks += 1;
            if p.is_active() {
                assert!(p.age < p.max_age);
            }
        }
        assert_eq!(p.fate(), Some(Fate::Expired));
        assert!(p.age >= 1.0 - 1e-9);
        assert!(ticks >= 10);
        assert_eq!(p.state(), ParticleState::Inactive(Fate::Expired));
    }

    #[test]
    fn infinite_half_life_never_expires() {
        let species = SpeciesConfig::new("receptor", BioType::Receptor, 1.0, 0.1);
        let mut p = particle(&species);
        p.update(1e9, &Environment::default(), &[]);
        assert!(p.is_active());
    }

    #[test]
    fn non_finite_velocity_is_a_fault() {
        let species = SpeciesConfig::new("ion", BioType::Ion, 1.0, 0.1);
        let mut p = particle(&species);
        assert_eq!(p.check_numeric(), None);
        p.velocity.y = f64::NAN;
        assert_eq!(p.check_numeric(), Some(FaultKind::NonFiniteVelocity));
        assert_eq!(p.fate(), Some(Fate::NumericFault));
    }

    #[test]
    fn environment_forces_accumulate() {
        let mut species = SpeciesConfig::new("ion", BioType::Ion, 2.0, 0.1);
        species.charge = -1.0;
        let mut p = particle(&species);
        let env = Environment {
            electric_field: Some(Vec3::new(0.0, 0.0, 3.0)),
            gravity: Some(Vec3::new(0.0, -1.0, 0.0)),
            ..Environment::default()
        };
        p.update(0.01, &env, &[]);
        assert!((p.force.z + 3.0).abs() < 1e-12);
        assert!((p.force.y + 2.0).abs() < 1e-12);
    }

    #[test]
    fn affinity_pulls_toward_compatible_partner_only() {
        let mut species = SpeciesConfig::new("ligand", BioType::Ligand, 1.0, 0.05);
        species.interaction_radius = 1.0;
        species.binding_strength = 2.0;
        let mut p = particle(&species);
        let receptor = Neighbor {
            id: ParticleId::new(1, 0),
            bio_type: BioType::Receptor,
            offset: Vec3::new(0.5, 0.0, 0.0),
            distance: 0.5,
        };
        let enzyme = Neighbor { bio_type: BioType::Enzyme, offset: Vec3::new(0.0, 0.5, 0.0), ..receptor };
        p.update(0.01, &Environment::default(), &[receptor, enzyme]);
        assert!((p.force.x - 1.0).abs() < 1e-12);
        assert_eq!(p.force.y, 0.0);
    }

    #[test]
    fn conversion_updates_capabilities() {
        let mut species = SpeciesConfig::new("substrate", BioType::Substrate, 1.0, 0.05);
        species.interaction_radius = 0.5;
        let mut p = particle(&species);
        assert!(p.is_bindable());
        p.convert(BioType::Product);
        assert_eq!(Bindable::bio_type(&p), BioType::Product);
        assert!(!p.is_bindable());
        assert!(!p.capabilities().bindable);
    }

    #[test]
    fn capability_traits_follow_the_resolved_record() {
        let mut species = SpeciesConfig::new("sodium", BioType::Ion, 1.0, 0.1);
        species.charge = 1.0;
        species.diffusion = 0.4;
        species.interaction_radius = 1.0;
        let ion = particle(&species);
        assert!(ion.is_charged() && ion.diffuses() && ion.is_bindable());
        assert_eq!(Chargeable::charge(&ion), 1.0);

        let mut channel = SpeciesConfig::new("channel", BioType::IonChannel, 5.0, 0.3);
        channel.interaction_radius = 1.0;
        channel.anchored = true;
        channel.diffusion = 0.4;
        let channel = particle(&channel);
        assert!(!channel.is_charged());
        assert!(!channel.diffuses());
        assert!(ion.can_bind_with(&channel));
        assert!(channel.can_bind_with(&ion));

        let fluid = particle(&SpeciesConfig::new("water", BioType::Fluid, 1.0, 0.1));
        assert!(!ion.can_bind_with(&fluid));
    }
}
