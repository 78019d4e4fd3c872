use crate::arena::ParticleArena;
use crate::binding::{BindingResolver, BondGraph};
use crate::environment::Environment;
use crate::forces::{self, ForceBuffer, ForceContext, ForceModel};
use crate::grid::SpatialIndex;
use crate::hooks::{self, ProcessHook};
use crate::integrator::{Domain, Integrator};
use crate::particle::{Bindable, Neighbor, Particle};
use bioparticle_common::{
    BioType, BoundsConfig, ConfigError, ParticleId, Placement, ProcessConfig, ReactionEvent, ReactionKind,
    SimParams, SimulationFault, SpeciesConfig, SystemSnapshot, SystemStatistics, Vec3,
};
use log::{debug, info, trace, warn};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::collections::{BTreeMap, VecDeque};

// Fault records kept for inspection; older ones are dropped first.
const MAX_FAULTS: usize = 1024;
// Step used by apply_external_force before the first tick.
const DEFAULT_DT: f64 = 1.0 / 60.0;

/// One self-contained simulated process: its particles, forces, binding
/// state and emission, advanced tick by tick.
pub struct ParticleSystem {
    name: String,
    config: ProcessConfig,
    params: SimParams,
    particles: ParticleArena,
    index: SpatialIndex,
    domain: Domain,
    environment: Environment,
    forces: Box<dyn ForceModel>,
    buffer: ForceBuffer,
    integrator: Integrator,
    binding: BindingResolver,
    rng: StdRng,
    hook: Option<Box<dyn ProcessHook>>,
    /// Fractional particles owed by emission.
    emission_budget: f64,
    species_chooser: Option<WeightedIndex<f64>>,
    saturated: bool,
    time: f64,
    tick: u64,
    last_dt: f64,
    last_substeps: u32,
    faults: VecDeque<SimulationFault>,
    scratch: Vec<Neighbor>,
}

impl ParticleSystem {
    /// Validates `config` and places the initial population using a
    /// generator seeded from `seed`.
    pub fn new(name: impl Into<String>, config: ProcessConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(name, config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(name: impl Into<String>, config: ProcessConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let name = name.into();
        let params = config.get_sim_params();

        let species_chooser = if config.emission_rate > 0.0 {
            let weights = config.blueprint.iter().map(|e| e.proportion);
            let chooser = WeightedIndex::new(weights).map_err(|e| ConfigError::InvalidParameter {
                field: "blueprint.proportion",
                reason: e.to_string(),
            })?;
            Some(chooser)
        } else {
            None
        };

        let mut system = ParticleSystem {
            params: params.clone(),
            particles: ParticleArena::with_capacity(config.initial_population()),
            index: SpatialIndex::new(&params),
            domain: Domain::from_params(&params),
            environment: Environment::from(&config.environment),
            forces: forces::build(&config.forces),
            buffer: ForceBuffer::default(),
            integrator: Integrator::new(&params),
            binding: BindingResolver::new(&config.binding, &config.reactions),
            rng,
            hook: config.hook.as_ref().map(hooks::build),
            emission_budget: 0.0,
            species_chooser,
            saturated: false,
            time: 0.0,
            tick: 0,
            last_dt: DEFAULT_DT,
            last_substeps: params.substeps,
            faults: VecDeque::new(),
            scratch: Vec::new(),
            name,
            config,
        };
        system.place_initial_population();
        system.rebuild_index();

        info!(
            "Created system '{}' ({:?}): {} particles, grid {}x{}x{}, forces '{}'.",
            system.name,
            system.config.kind,
            system.particles.len(),
            params.grid_dims[0],
            params.grid_dims[1],
            params.grid_dims[2],
            system.forces.name()
        );
        Ok(system)
    }

    fn place_initial_population(&mut self) {
        for species_idx in 0..self.config.blueprint.len() {
            let entry = &self.config.blueprint[species_idx];
            let count = entry.initial_count;
            let placement = entry.placement.clone();
            for k in 0..count {
                let position = initial_position(&placement, &self.config.bounds, k, count, &mut self.rng);
                self.spawn_at(species_idx, position);
            }
        }
    }

    // --- Tick ---

    /// Advances the system by `dt` seconds. Non-finite or non-positive steps
    /// are skipped.
    pub fn tick(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            warn!("System '{}': skipping tick with invalid dt {}.", self.name, dt);
            return;
        }
        self.last_dt = dt;

        let substeps = self.params.substeps_for(dt, self.peak_speed(dt));
        if substeps != self.last_substeps {
            debug!("System '{}': {} substeps per tick (configured {}).", self.name, substeps, self.params.substeps);
        }
        self.last_substeps = substeps;
        let h = dt / substeps as f64;
        for _ in 0..substeps {
            self.substep(h);
        }
        self.time += dt;
        self.tick += 1;

        // --- Binding ---
        self.rebuild_index();
        let outcome = self.binding.resolve(&mut self.particles, &self.index, &self.domain, &mut self.rng, self.time, dt);

        // --- Hook ---
        if let Some(mut hook) = self.hook.take() {
            hook.on_tick(self, dt);
            self.hook = Some(hook);
        }

        // --- Lifecycle ---
        let culled = self.cull();
        let emitted = self.emit(dt);

        for (_, p) in self.particles.iter_mut() {
            p.refresh_visuals();
        }

        debug!(
            "System '{}' tick {} (t={:.3}): {} live, {} bound pairs, +{} emitted, -{} culled, {} new bonds.",
            self.name,
            self.tick,
            self.time,
            self.particles.len(),
            self.binding.bonds().len(),
            emitted,
            culled,
            outcome.bound
        );
    }

    fn substep(&mut self, h: f64) {
        self.rebuild_index();
        self.buffer.reset(self.particles.slot_count());
        {
            let ctx = ForceContext {
                particles: &self.particles,
                index: &self.index,
                domain: &self.domain,
                environment: &self.environment,
                dt: h,
            };
            self.forces.accumulate(&ctx, &mut self.rng, &mut self.buffer);
        }

        let slots: Vec<usize> = self.particles.active().map(|(slot, _)| slot).collect();
        for slot in slots {
            self.gather_candidates(slot);
            let accum = self.buffer.get(slot);
            let Some(p) = self.particles.slot_mut(slot) else { continue };
            p.force = accum.force;
            p.update(h, &self.environment, &self.scratch);
            if !p.is_active() {
                continue;
            }
            self.integrator.integrate(p, &accum, h, &self.domain);
            if let Some(kind) = p.check_numeric() {
                let fault = SimulationFault { tick: self.tick, time: self.time, particle: p.id, kind };
                warn!("System '{}': particle {} deactivated ({:?}).", self.name, p.id, kind);
                self.record_fault(fault);
            }
        }
        trace!("System '{}' substep h={:.5} done.", self.name, h);
    }

    // Fastest expected speed over the coming tick: current speed plus the
    // last acceleration applied over a base substep, capped at max speed.
    fn peak_speed(&self, dt: f64) -> f64 {
        let h = dt / self.params.substeps.max(1) as f64;
        self.particles
            .active()
            .filter(|(_, p)| !p.anchored)
            .map(|(_, p)| (p.velocity.length() + p.acceleration.length() * h).min(self.params.max_speed))
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    fn record_fault(&mut self, fault: SimulationFault) {
        if self.faults.len() >= MAX_FAULTS {
            self.faults.pop_front();
        }
        self.faults.push_back(fault);
    }

    // Compatible partners inside the particle's interaction radius, for the
    // affinity pull applied in Particle::update.
    fn gather_candidates(&mut self, slot: usize) {
        self.scratch.clear();
        let particles = &self.particles;
        let Some(p) = particles.slot(slot) else { return };
        if !p.is_bindable() || p.attraction_gain <= 0.0 || p.anchored {
            return;
        }
        let (position, reach) = (p.position, p.interaction_radius());
        let domain = &self.domain;
        let scratch = &mut self.scratch;
        self.index.for_each_within(position, reach, |j| {
            if j == slot {
                return;
            }
            let Some(q) = particles.slot(j) else { return };
            if !q.is_active() || !p.can_bind_with(q) {
                return;
            }
            let offset = domain.separation(position, q.position);
            let distance = offset.length();
            if distance < reach {
                scratch.push(Neighbor { id: q.id, bio_type: q.bio_type(), offset, distance });
            }
        });
    }

    fn rebuild_index(&mut self) {
        self.index.rebuild(self.particles.active().map(|(slot, p)| (slot, p.position)));
    }

    // Inactive particles stay visible for the tick they retired in and are
    // removed on the next one.
    fn cull(&mut self) -> usize {
        let tick = self.tick;
        let mut doomed = Vec::new();
        for (_, p) in self.particles.iter_mut() {
            if p.is_active() {
                continue;
            }
            match p.retired_at {
                None => p.retired_at = Some(tick),
                Some(t) if t < tick => doomed.push(p.id),
                Some(_) => {}
            }
        }
        for id in &doomed {
            self.binding.forget(*id);
            self.particles.remove(*id);
        }
        doomed.len()
    }

    fn emit(&mut self, dt: f64) -> usize {
        let Some(chooser) = self.species_chooser.clone() else { return 0 };
        self.emission_budget += self.config.emission_rate * dt;

        let cap = self.config.population_cap;
        let mut active = self.particles.active_count();
        let mut emitted = 0;
        while self.emission_budget >= 1.0 {
            if active >= cap {
                if !self.saturated {
                    warn!("System '{}' reached its population cap of {}; emission paused.", self.name, cap);
                    self.saturated = true;
                }
                // Do not bank particles while saturated.
                self.emission_budget = self.emission_budget.min(1.0);
                return emitted;
            }
            let species_idx = chooser.sample(&mut self.rng);
            let entry = &self.config.blueprint[species_idx];
            let placement = entry.placement.clone();
            let position = emission_position(&placement, &self.config.bounds, &mut self.rng);
            self.spawn_at(species_idx, position);
            self.emission_budget -= 1.0;
            active += 1;
            emitted += 1;
        }
        if self.saturated && active < cap {
            debug!("System '{}' below its population cap again; emission resumed.", self.name);
            self.saturated = false;
        }
        emitted
    }

    fn spawn_at(&mut self, species_idx: usize, position: Vec3) -> ParticleId {
        let entry = &self.config.blueprint[species_idx];
        let velocity = initial_velocity(entry.initial_speed, &mut self.rng);
        let species = &entry.species;
        let position = self.domain_clamp(position);
        self.particles
            .insert_with(|id| Particle::from_species(id, species_idx, species, position, velocity))
    }

    fn domain_clamp(&self, p: Vec3) -> Vec3 {
        p.max(self.config.bounds.min).min(self.config.bounds.max)
    }

    // --- Population ---

    /// Adds one particle of blueprint entry `species_idx`. Returns `None`
    /// when the species is unknown or the population cap is reached.
    pub fn spawn(&mut self, species_idx: usize, position: Vec3, velocity: Vec3) -> Option<ParticleId> {
        let species = &self.config.blueprint.get(species_idx)?.species;
        if self.particles.active_count() >= self.config.population_cap {
            return None;
        }
        let position = position.max(self.config.bounds.min).min(self.config.bounds.max);
        Some(
            self.particles
                .insert_with(|id| Particle::from_species(id, species_idx, species, position, velocity)),
        )
    }

    /// Removes a particle and all its bonds immediately.
    pub fn remove(&mut self, id: ParticleId) -> bool {
        self.binding.forget(id);
        self.particles.remove(id).is_some()
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.config.blueprint.iter().position(|e| e.species.name == name)
    }

    pub fn species(&self, species_idx: usize) -> Option<&SpeciesConfig> {
        self.config.blueprint.get(species_idx).map(|e| &e.species)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id)
    }

    /// Active particles in slot order.
    pub fn particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles.active().map(|(_, p)| p)
    }

    pub fn particles_mut(&mut self) -> impl Iterator<Item = &mut Particle> + '_ {
        self.particles.iter_mut().map(|(_, p)| p).filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.particles.active_count()
    }

    /// Live particles, including those retired this tick.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles_of_type(&self, bio_type: BioType) -> Vec<ParticleId> {
        self.particles().filter(|p| p.bio_type() == bio_type).map(|p| p.id).collect()
    }

    pub fn particles_in_region(&self, center: Vec3, radius: f64) -> Vec<ParticleId> {
        self.particles()
            .filter(|p| self.domain.separation(center, p.position).length() <= radius)
            .map(|p| p.id)
            .collect()
    }

    // --- Interaction ---

    /// Pushes active particles within `radius` of `position`. The velocity
    /// change F·(1 − d/radius)·dt/m uses the last tick's dt. Returns the
    /// number of particles affected.
    pub fn apply_external_force(&mut self, position: Vec3, force: Vec3, radius: f64) -> usize {
        if !(radius > 0.0) || !force.is_finite() {
            return 0;
        }
        let dt = self.last_dt;
        let domain = self.domain;
        let mut affected = 0;
        for (_, p) in self.particles.iter_mut() {
            if !p.is_active() || p.anchored {
                continue;
            }
            let distance = domain.separation(position, p.position).length();
            if distance > radius {
                continue;
            }
            let falloff = 1.0 - distance / radius;
            p.velocity += force * (falloff * dt / p.mass);
            affected += 1;
        }
        affected
    }

    pub fn bonds(&self) -> &BondGraph {
        self.binding.bonds()
    }

    pub fn bound_partners(&self, id: ParticleId) -> Vec<ParticleId> {
        self.binding.bonds().partners(id)
    }

    pub fn bound_pair_count(&self) -> usize {
        self.binding.bonds().len()
    }

    /// Forms a bond outside the probabilistic binding pass.
    pub fn bind_pair(&mut self, a: ParticleId, b: ParticleId, kind: ReactionKind) -> bool {
        self.binding.bind_pair(&mut self.particles, a, b, kind, self.time)
    }

    pub fn record_event(&mut self, kind: ReactionKind, a: ParticleId, b: ParticleId) {
        let (Some(pa), Some(pb)) = (self.particles.get(a), self.particles.get(b)) else { return };
        let types = (pa.bio_type(), pb.bio_type());
        self.binding.record(ReactionEvent { time: self.time, kind, participants: (a, b), types });
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &ReactionEvent> + '_ {
        self.binding.events().iter()
    }

    pub fn faults(&self) -> &VecDeque<SimulationFault> {
        &self.faults
    }

    // --- Environment & hook ---

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    pub fn set_hook(&mut self, hook: Option<Box<dyn ProcessHook>>) {
        self.hook = hook;
    }

    pub fn hook_name(&self) -> Option<&'static str> {
        self.hook.as_ref().map(|h| h.name())
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    // --- Outputs ---

    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            process: self.name.clone(),
            time: self.time,
            tick: self.tick,
            particles: self.particles.iter().map(|(_, p)| p.snapshot()).collect(),
        }
    }

    pub fn statistics(&self) -> SystemStatistics {
        let mut stats = SystemStatistics {
            time: self.time,
            tick: self.tick,
            total_particles: self.particles.len(),
            bound_pairs: self.binding.bonds().len(),
            binding_events_per_sec: self.binding.events().binding_rate(self.time),
            recent_events: self.binding.events().len(),
            faults: self.faults.len(),
            substeps: self.last_substeps,
            mean_density: self.forces.mean_density(),
            ..Default::default()
        };
        let mut histogram = BTreeMap::new();
        let (mut speed, mut age, mut force) = (0.0, 0.0, 0.0);
        for p in self.particles() {
            stats.active_particles += 1;
            speed += p.velocity.length();
            age += p.age;
            force += p.force.length();
            stats.kinetic_energy += p.kinetic_energy();
            *histogram.entry(p.bio_type()).or_insert(0) += 1;
        }
        if stats.active_particles > 0 {
            let n = stats.active_particles as f64;
            stats.average_speed = speed / n;
            stats.average_age = age / n;
            stats.average_force = force / n;
        }
        stats.type_histogram = histogram;
        stats
    }
}

// --- Placement ---

fn sample_in(bounds: &BoundsConfig, rng: &mut StdRng) -> Vec3 {
    let mut p = bounds.min;
    for axis in 0..3 {
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if hi > lo {
            *p.axis_mut(axis) = rng.random_range(lo..hi);
        }
    }
    p
}

/// Position of the `k`-th of `count` initial particles of one entry.
fn initial_position(placement: &Placement, bounds: &BoundsConfig, k: usize, count: usize, rng: &mut StdRng) -> Vec3 {
    match placement {
        Placement::Uniform { region } => sample_in(region.as_ref().unwrap_or(bounds), rng),
        Placement::Lattice { center, spacing } => {
            let side = (count as f64).cbrt().ceil().max(1.0) as usize;
            let half = (side as f64 - 1.0) * 0.5;
            let (i, j, l) = (k % side, (k / side) % side, k / (side * side));
            *center + Vec3::new(i as f64 - half, j as f64 - half, l as f64 - half) * *spacing
        }
        Placement::Line { start, end } => {
            let t = (k as f64 + 0.5) / count.max(1) as f64;
            start.lerp(*end, t)
        }
        Placement::Plane { axis, offset } => {
            let mut p = sample_in(bounds, rng);
            *p.axis_mut(axis.index()) = *offset;
            p
        }
    }
}

fn emission_position(placement: &Placement, bounds: &BoundsConfig, rng: &mut StdRng) -> Vec3 {
    match placement {
        Placement::Lattice { center, spacing } => {
            let jitter = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            *center + jitter * *spacing
        }
        Placement::Line { start, end } => start.lerp(*end, rng.random::<f64>()),
        other => initial_position(other, bounds, 0, 1, rng),
    }
}

/// Each component drawn from N(0, speed).
fn initial_velocity(speed: f64, rng: &mut StdRng) -> Vec3 {
    if !(speed > 0.0) {
        return Vec3::ZERO;
    }
    match Normal::new(0.0, speed) {
        Ok(normal) => Vec3::new(normal.sample(rng), normal.sample(rng), normal.sample(rng)),
        Err(_) => Vec3::ZERO,
    }
}
