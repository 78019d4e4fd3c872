use crate::arena::ParticleArena;
use crate::grid::SpatialIndex;
use crate::integrator::Domain;
use crate::particle::{Bindable, Fate};
use bioparticle_common::{
    BindingConfig, BioType, Participant, ParticleId, ReactionEffect, ReactionEvent, ReactionKind, ReactionRule, Vec3,
};
use log::{debug, trace};
use rand::{Rng, RngCore};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Undirected bond, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bond {
    pub a: ParticleId,
    pub b: ParticleId,
}

impl Bond {
    pub fn new(x: ParticleId, y: ParticleId) -> Self {
        if x <= y {
            Bond { a: x, b: y }
        } else {
            Bond { a: y, b: x }
        }
    }

    pub fn other(&self, id: ParticleId) -> ParticleId {
        if self.a == id {
            self.b
        } else {
            self.a
        }
    }
}

/// Single edge set of bonds with a derived per-particle adjacency index.
/// Every mutation goes through both, so partner lookups are symmetric.
#[derive(Debug, Clone, Default)]
pub struct BondGraph {
    edges: BTreeSet<Bond>,
    adjacency: BTreeMap<ParticleId, BTreeSet<ParticleId>>,
}

impl BondGraph {
    pub fn bind(&mut self, x: ParticleId, y: ParticleId) -> bool {
        if x == y || !self.edges.insert(Bond::new(x, y)) {
            return false;
        }
        self.adjacency.entry(x).or_default().insert(y);
        self.adjacency.entry(y).or_default().insert(x);
        true
    }

    pub fn unbind(&mut self, x: ParticleId, y: ParticleId) -> bool {
        if !self.edges.remove(&Bond::new(x, y)) {
            return false;
        }
        for (from, to) in [(x, y), (y, x)] {
            if let Some(set) = self.adjacency.get_mut(&from) {
                set.remove(&to);
                if set.is_empty() {
                    self.adjacency.remove(&from);
                }
            }
        }
        true
    }

    /// Removes every bond of `id`, returning its former partners.
    pub fn detach(&mut self, id: ParticleId) -> Vec<ParticleId> {
        let partners = self.partners(id);
        for &other in &partners {
            self.unbind(id, other);
        }
        partners
    }

    pub fn contains(&self, x: ParticleId, y: ParticleId) -> bool {
        self.edges.contains(&Bond::new(x, y))
    }

    pub fn partners(&self, id: ParticleId) -> Vec<ParticleId> {
        self.adjacency.get(&id).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    pub fn degree(&self, id: ParticleId) -> usize {
        self.adjacency.get(&id).map_or(0, |s| s.len())
    }

    /// Number of bound pairs.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn bonds(&self) -> impl Iterator<Item = &Bond> + '_ {
        self.edges.iter()
    }

    /// Particles holding at least one bond.
    pub fn bound_particles(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Adjacency agrees with the edge set in both directions.
    pub fn is_symmetric(&self) -> bool {
        let degree_sum: usize = self.adjacency.values().map(|s| s.len()).sum();
        degree_sum == 2 * self.edges.len()
            && self.edges.iter().all(|e| {
                self.adjacency.get(&e.a).is_some_and(|s| s.contains(&e.b))
                    && self.adjacency.get(&e.b).is_some_and(|s| s.contains(&e.a))
            })
    }
}

/// Recent reactions, bounded by age and count.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<ReactionEvent>,
    retention: f64,
    max_events: usize,
}

impl EventLog {
    pub fn new(retention: f64, max_events: usize) -> Self {
        EventLog { events: VecDeque::new(), retention, max_events: max_events.max(1) }
    }

    pub fn push(&mut self, event: ReactionEvent) {
        self.events.push_back(event);
        while self.events.len() > self.max_events {
            self.events.pop_front();
        }
    }

    /// Drops events older than the retention window.
    pub fn prune(&mut self, now: f64) {
        let horizon = now - self.retention;
        while self.events.front().is_some_and(|e| e.time < horizon) {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReactionEvent> + '_ {
        self.events.iter()
    }

    /// Binding events within the last simulated second.
    pub fn binding_rate(&self, now: f64) -> f64 {
        self.events
            .iter()
            .rev()
            .take_while(|e| e.time > now - 1.0)
            .filter(|e| e.kind == ReactionKind::Binding)
            .count() as f64
    }
}

/// Counters for one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingOutcome {
    pub attempts: usize,
    pub bound: usize,
    pub reactions: usize,
    pub released: usize,
}

// Snapshot of an initiator taken before any mutation.
struct Initiator {
    slot: usize,
    id: ParticleId,
    position: Vec3,
    bio_type: BioType,
    radius: f64,
    strength: f64,
}

/// Decides which compatible pairs bind, keeps the bond graph and dispatches
/// reaction effects.
#[derive(Debug, Clone)]
pub struct BindingResolver {
    config: BindingConfig,
    reactions: BTreeMap<(BioType, BioType), ReactionEffect>,
    bonds: BondGraph,
    events: EventLog,
}

impl BindingResolver {
    pub fn new(config: &BindingConfig, rules: &[ReactionRule]) -> Self {
        let reactions = rules
            .iter()
            .map(|r| ((r.initiator, r.acceptor), r.effect.clone()))
            .collect();
        BindingResolver {
            config: config.clone(),
            reactions,
            bonds: BondGraph::default(),
            events: EventLog::new(config.event_retention, config.max_events),
        }
    }

    pub fn bonds(&self) -> &BondGraph {
        &self.bonds
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Binding probability for an initiator of the given strength and
    /// interaction radius at `distance` from a candidate.
    pub fn probability(&self, strength: f64, interaction_radius: f64, distance: f64) -> f64 {
        if interaction_radius <= 0.0 {
            return 0.0;
        }
        (strength * (1.0 - distance / interaction_radius) * self.config.scaling_factor).clamp(0.0, 1.0)
    }

    fn capacity_of(&self, role: Participant) -> usize {
        match role {
            Participant::Initiator => 1,
            Participant::Acceptor => self.config.saturation.acceptor_capacity(),
        }
    }

    /// One pass over the population: drop dead bonds, age live ones, then
    /// attempt new bindings.
    pub fn resolve(
        &mut self,
        particles: &mut ParticleArena,
        index: &SpatialIndex,
        domain: &Domain,
        rng: &mut dyn RngCore,
        time: f64,
        dt: f64,
    ) -> BindingOutcome {
        let mut outcome = BindingOutcome::default();
        self.prune_bonds(particles);
        outcome.released += self.age_bonds(particles, rng, time, dt);

        if self.config.enabled {
            let initiators: Vec<Initiator> = particles
                .active()
                .filter(|(_, p)| p.is_bindable() && !p.bio_type().binding_targets().is_empty())
                .map(|(slot, p)| Initiator {
                    slot,
                    id: p.id,
                    position: p.position,
                    bio_type: p.bio_type(),
                    radius: p.interaction_radius(),
                    strength: p.binding_strength(),
                })
                .collect();

            let initiator_cap = self.capacity_of(Participant::Initiator);
            let acceptor_cap = self.capacity_of(Participant::Acceptor);
            let mut candidates: Vec<(usize, f64)> = Vec::new();

            for init in initiators {
                if self.bonds.degree(init.id) >= initiator_cap {
                    continue;
                }
                // Earlier reactions this pass may have consumed or converted it.
                match particles.slot(init.slot) {
                    Some(p) if p.is_active() && p.bio_type() == init.bio_type => {}
                    _ => continue,
                }
                let reach = init.radius * self.config.reach_multiplier;
                candidates.clear();
                index.for_each_within(init.position, reach, |j| {
                    if j == init.slot {
                        return;
                    }
                    let Some(q) = particles.slot(j) else { return };
                    if !q.is_active() || !init.bio_type.initiates(q.bio_type()) {
                        return;
                    }
                    let distance = domain.separation(init.position, q.position).length();
                    if distance < reach {
                        candidates.push((j, distance));
                    }
                });
                candidates.sort_by(|a, b| a.0.cmp(&b.0));

                for &(j, distance) in &candidates {
                    let Some(q) = particles.slot(j) else { continue };
                    let acceptor = q.id;
                    if !q.is_active() || self.bonds.contains(init.id, acceptor) || self.bonds.degree(acceptor) >= acceptor_cap {
                        continue;
                    }
                    if self.already_translocated((init.bio_type, q.bio_type()), init.position) {
                        continue;
                    }
                    let p = self.probability(init.strength, init.radius, distance);
                    if p <= 0.0 {
                        continue;
                    }
                    outcome.attempts += 1;
                    if rng.random::<f64>() >= p {
                        continue;
                    }
                    if self.bind(particles, init.id, acceptor, time, &mut outcome) {
                        break;
                    }
                }
            }
        }

        self.events.prune(time);
        if outcome.bound > 0 || outcome.released > 0 {
            debug!(
                "Binding pass at t={:.3}: {} attempts, {} bound, {} reactions, {} released, {} pairs held.",
                time, outcome.attempts, outcome.bound, outcome.reactions, outcome.released, self.bonds.len()
            );
        }
        outcome
    }

    /// Forms a bond outside the probabilistic pass (used by process hooks)
    /// and logs it as `kind`. No reaction effect is dispatched.
    pub fn bind_pair(&mut self, particles: &mut ParticleArena, a: ParticleId, b: ParticleId, kind: ReactionKind, time: f64) -> bool {
        let (Some(pa), Some(pb)) = (particles.get(a), particles.get(b)) else { return false };
        if !pa.is_active() || !pb.is_active() || !self.bonds.bind(a, b) {
            return false;
        }
        let types = (pa.bio_type(), pb.bio_type());
        self.bump_progress(particles, a, b);
        self.events.push(ReactionEvent { time, kind, participants: (a, b), types });
        true
    }

    /// Records an event that involves no bond change (e.g. cascade steps).
    pub fn record(&mut self, event: ReactionEvent) {
        self.events.push(event);
    }

    /// Drops every bond of a particle that is leaving the system.
    pub fn forget(&mut self, id: ParticleId) {
        self.bonds.detach(id);
    }

    fn bump_progress(&self, particles: &mut ParticleArena, a: ParticleId, b: ParticleId) {
        for id in [a, b] {
            if let Some(p) = particles.get_mut(id) {
                p.binding_progress = (p.binding_progress + self.config.progress_step).min(1.0);
            }
        }
    }

    fn bind(&mut self, particles: &mut ParticleArena, initiator: ParticleId, acceptor: ParticleId, time: f64, outcome: &mut BindingOutcome) -> bool {
        let (Some(pi), Some(pa)) = (particles.get(initiator), particles.get(acceptor)) else { return false };
        let types = (pi.bio_type(), pa.bio_type());
        let (vi, mi, anchored_i) = (pi.velocity, pi.mass, pi.anchored);
        let (va, ma, anchored_a) = (pa.velocity, pa.mass, pa.anchored);
        if !self.bonds.bind(initiator, acceptor) {
            return false;
        }
        outcome.bound += 1;
        self.bump_progress(particles, initiator, acceptor);

        // Momentum averaging: bound partners move together. Not momentum-conserving
        // against anchored partners, which simply hold the other still.
        if self.config.momentum_averaging {
            let shared = match (anchored_i, anchored_a) {
                (false, false) => (vi * mi + va * ma) / (mi + ma),
                _ => Vec3::ZERO,
            };
            for id in [initiator, acceptor] {
                if let Some(p) = particles.get_mut(id) {
                    if !p.anchored {
                        p.velocity = shared;
                    }
                }
            }
        }

        self.events.push(ReactionEvent {
            time,
            kind: ReactionKind::Binding,
            participants: (initiator, acceptor),
            types,
        });
        trace!("{} ({}) bound {} ({}).", initiator, types.0, acceptor, types.1);

        if let Some(effect) = self.reactions.get(&types).cloned() {
            self.apply_reaction(particles, initiator, acceptor, types, &effect, time);
            outcome.reactions += 1;
        }
        true
    }

    fn apply_reaction(
        &mut self,
        particles: &mut ParticleArena,
        initiator: ParticleId,
        acceptor: ParticleId,
        types: (BioType, BioType),
        effect: &ReactionEffect,
        time: f64,
    ) {
        let kind = match effect {
            ReactionEffect::Catalysis { product } => {
                if let Some(p) = particles.get_mut(initiator) {
                    p.convert(*product);
                }
                self.bonds.unbind(initiator, acceptor);
                ReactionKind::Catalysis
            }
            ReactionEffect::Activation => {
                if let Some(p) = particles.get_mut(acceptor) {
                    p.activation = 1.0;
                }
                ReactionKind::Activation
            }
            ReactionEffect::Translocation { axis, plane, offset } => {
                if let Some(p) = particles.get_mut(initiator) {
                    *p.position.axis_mut(axis.index()) = plane + offset;
                }
                self.bonds.unbind(initiator, acceptor);
                ReactionKind::Translocation
            }
            ReactionEffect::Consumption { target } => {
                let victim = match target {
                    Participant::Initiator => initiator,
                    Participant::Acceptor => acceptor,
                };
                if let Some(p) = particles.get_mut(victim) {
                    p.deactivate(Fate::Consumed);
                }
                self.bonds.detach(victim);
                ReactionKind::Consumption
            }
        };
        self.events.push(ReactionEvent { time, kind, participants: (initiator, acceptor), types });
    }

    // Translocation is one-way: initiators already on the far side of the
    // plane do not bind that carrier again.
    fn already_translocated(&self, types: (BioType, BioType), position: Vec3) -> bool {
        match self.reactions.get(&types) {
            Some(ReactionEffect::Translocation { axis, plane, offset }) => {
                (position[axis.index()] - plane) * offset > 0.0
            }
            _ => false,
        }
    }

    // Removes bonds whose endpoints are gone or inactive. Survivors left
    // without partners lose their progress, as on dissociation.
    fn prune_bonds(&mut self, particles: &mut ParticleArena) {
        let dead: Vec<ParticleId> = self
            .bonds
            .bound_particles()
            .filter(|id| !particles.get(*id).is_some_and(|p| p.is_active()))
            .collect();
        for id in dead {
            for partner in self.bonds.detach(id) {
                self.release_progress(particles, partner);
            }
        }
    }

    fn release_progress(&self, particles: &mut ParticleArena, id: ParticleId) {
        if self.bonds.degree(id) == 0 {
            if let Some(p) = particles.get_mut(id) {
                p.binding_progress = 0.0;
            }
        }
    }

    // Progress accrues on held bonds; bonds may dissociate at `unbinding_rate`.
    fn age_bonds(&mut self, particles: &mut ParticleArena, rng: &mut dyn RngCore, time: f64, dt: f64) -> usize {
        if self.bonds.is_empty() || !(dt > 0.0) {
            return 0;
        }
        let bonds: Vec<Bond> = self.bonds.bonds().copied().collect();
        let growth = self.config.progress_rate * dt;
        let p_off = 1.0 - (-self.config.unbinding_rate * dt).exp();
        let mut released = 0;
        for bond in bonds {
            if p_off > 0.0 && rng.random::<f64>() < p_off {
                self.bonds.unbind(bond.a, bond.b);
                let types = (
                    particles.get(bond.a).map(|p| p.bio_type()),
                    particles.get(bond.b).map(|p| p.bio_type()),
                );
                for id in [bond.a, bond.b] {
                    self.release_progress(particles, id);
                }
                if let (Some(ta), Some(tb)) = types {
                    self.events.push(ReactionEvent {
                        time,
                        kind: ReactionKind::Unbinding,
                        participants: (bond.a, bond.b),
                        types: (ta, tb),
                    });
                }
                released += 1;
                continue;
            }
            if growth > 0.0 {
                for id in [bond.a, bond.b] {
                    if let Some(p) = particles.get_mut(id) {
                        p.binding_progress = (p.binding_progress + growth).min(1.0);
                    }
                }
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use bioparticle_common::{
        Axis, BlueprintEntry, BoundaryPolicy, BoundsConfig, ProcessConfig, SaturationPolicy, SpeciesConfig,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Bench {
        particles: ParticleArena,
        index: SpatialIndex,
        domain: Domain,
    }

    impl Bench {
        fn new() -> Self {
            let species = SpeciesConfig::new("x", BioType::Ligand, 1.0, 0.05);
            let mut config = ProcessConfig::new(BoundsConfig::cube(4.0), vec![BlueprintEntry::new(species, 0, 1.0)], 100);
            config.spatial.cell_size = Some(1.0);
            let params = config.get_sim_params();
            Bench {
                particles: ParticleArena::default(),
                index: SpatialIndex::new(&params),
                domain: Domain::new(config.bounds, BoundaryPolicy::default()),
            }
        }

        fn add(&mut self, species: &SpeciesConfig, position: Vec3, velocity: Vec3) -> ParticleId {
            self.particles.insert_with(|id| Particle::from_species(id, 0, species, position, velocity))
        }

        fn resolve(&mut self, resolver: &mut BindingResolver, rng: &mut StdRng, time: f64) -> BindingOutcome {
            self.index.rebuild(self.particles.active().map(|(s, p)| (s, p.position)));
            resolver.resolve(&mut self.particles, &self.index, &self.domain, rng, time, 0.1)
        }
    }

    fn ligand() -> SpeciesConfig {
        let mut s = SpeciesConfig::new("ligand", BioType::Ligand, 1.0, 0.05);
        s.interaction_radius = 0.5;
        s.binding_strength = 1.0;
        s
    }

    fn receptor() -> SpeciesConfig {
        let mut s = SpeciesConfig::new("receptor", BioType::Receptor, 1.0, 0.1);
        s.interaction_radius = 0.5;
        s.anchored = true;
        s
    }

    fn certain() -> BindingConfig {
        BindingConfig { scaling_factor: 1e6, ..Default::default() }
    }

    #[test]
    fn bond_graph_stays_symmetric() {
        let mut graph = BondGraph::default();
        let (a, b, c) = (ParticleId::new(0, 0), ParticleId::new(1, 0), ParticleId::new(2, 0));
        assert!(graph.bind(a, b));
        assert!(!graph.bind(b, a));
        assert!(graph.bind(c, a));
        assert_eq!(graph.partners(a), vec![b, c]);
        assert_eq!(graph.partners(b), vec![a]);
        assert!(graph.is_symmetric());
        assert_eq!(graph.detach(a), vec![b, c]);
        assert!(graph.is_empty());
        assert_eq!(graph.degree(b), 0);
        assert!(graph.is_symmetric());
    }

    #[test]
    fn probability_follows_distance_and_scale() {
        let resolver = BindingResolver::new(&BindingConfig::default(), &[]);
        assert!((resolver.probability(1.0, 1.0, 0.5) - 0.05).abs() < 1e-12);
        assert_eq!(resolver.probability(1.0, 1.0, 1.2), 0.0);
        let eager = BindingResolver::new(&certain(), &[]);
        assert_eq!(eager.probability(1.0, 1.0, 0.5), 1.0);
    }

    #[test]
    fn one_to_one_saturates_each_receptor() {
        let mut bench = Bench::new();
        let r = bench.add(&receptor(), Vec3::splat(2.0), Vec3::ZERO);
        let l1 = bench.add(&ligand(), Vec3::new(2.1, 2.0, 2.0), Vec3::ZERO);
        let l2 = bench.add(&ligand(), Vec3::new(1.9, 2.0, 2.0), Vec3::ZERO);
        let mut resolver = BindingResolver::new(&certain(), &[]);
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = bench.resolve(&mut resolver, &mut rng, 0.1);
        assert_eq!(outcome.bound, 1);
        assert_eq!(resolver.bonds().partners(r), vec![l1]);
        assert_eq!(resolver.bonds().degree(l2), 0);
        assert!(resolver.bonds().is_symmetric());
        assert!((bench.particles.get(r).map(|p| p.binding_progress).unwrap_or_default() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn many_to_one_fills_capacity() {
        let mut bench = Bench::new();
        let r = bench.add(&receptor(), Vec3::splat(2.0), Vec3::ZERO);
        for dx in [0.1, -0.1, 0.2] {
            bench.add(&ligand(), Vec3::new(2.0 + dx, 2.0, 2.0), Vec3::ZERO);
        }
        let config = BindingConfig { saturation: SaturationPolicy::ManyToOne { capacity: 2 }, ..certain() };
        let mut resolver = BindingResolver::new(&config, &[]);
        bench.resolve(&mut resolver, &mut StdRng::seed_from_u64(3), 0.1);
        assert_eq!(resolver.bonds().degree(r), 2);
        assert_eq!(resolver.bonds().len(), 2);
    }

    #[test]
    fn momentum_is_averaged_between_free_partners() {
        let mut bench = Bench::new();
        let mut enzyme = SpeciesConfig::new("enzyme", BioType::Enzyme, 3.0, 0.1);
        enzyme.interaction_radius = 0.5;
        let mut substrate = ligand();
        substrate.bio_type = BioType::Substrate;
        let e = bench.add(&enzyme, Vec3::splat(2.0), Vec3::new(-1.0, 0.0, 0.0));
        let s = bench.add(&substrate, Vec3::new(2.1, 2.0, 2.0), Vec3::new(3.0, 0.0, 0.0));
        let mut resolver = BindingResolver::new(&certain(), &[]);
        bench.resolve(&mut resolver, &mut StdRng::seed_from_u64(1), 0.1);
        for id in [e, s] {
            let v = bench.particles.get(id).map(|p| p.velocity).unwrap_or_default();
            assert!(v.length() < 1e-12, "expected (3·-1 + 1·3)/4 = 0, got {v:?}");
        }
    }

    #[test]
    fn catalysis_converts_and_releases() {
        let mut bench = Bench::new();
        let mut enzyme = SpeciesConfig::new("enzyme", BioType::Enzyme, 3.0, 0.1);
        enzyme.interaction_radius = 0.5;
        let mut substrate = ligand();
        substrate.bio_type = BioType::Substrate;
        let e = bench.add(&enzyme, Vec3::splat(2.0), Vec3::ZERO);
        let s = bench.add(&substrate, Vec3::new(2.1, 2.0, 2.0), Vec3::ZERO);
        let rules = [ReactionRule {
            initiator: BioType::Substrate,
            acceptor: BioType::Enzyme,
            effect: ReactionEffect::Catalysis { product: BioType::Product },
        }];
        let mut resolver = BindingResolver::new(&certain(), &rules);
        let outcome = bench.resolve(&mut resolver, &mut StdRng::seed_from_u64(1), 0.5);
        assert_eq!(outcome.reactions, 1);
        assert_eq!(bench.particles.get(s).map(|p| p.bio_type()), Some(BioType::Product));
        assert_eq!(resolver.bonds().degree(e), 0);
        let kinds: Vec<ReactionKind> = resolver.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ReactionKind::Binding, ReactionKind::Catalysis]);
        assert_eq!(resolver.events().binding_rate(0.5), 1.0);
    }

    #[test]
    fn consumption_deactivates_and_drops_bonds() {
        let mut bench = Bench::new();
        let mut hunter = SpeciesConfig::new("macrophage", BioType::ImmuneCell, 5.0, 0.2);
        hunter.interaction_radius = 0.6;
        hunter.binding_strength = 1.0;
        let prey = SpeciesConfig::new("bacterium", BioType::Pathogen, 1.0, 0.1);
        bench.add(&hunter, Vec3::splat(2.0), Vec3::ZERO);
        let b = bench.add(&prey, Vec3::new(2.2, 2.0, 2.0), Vec3::ZERO);
        let rules = [ReactionRule {
            initiator: BioType::ImmuneCell,
            acceptor: BioType::Pathogen,
            effect: ReactionEffect::Consumption { target: Participant::Acceptor },
        }];
        let mut resolver = BindingResolver::new(&certain(), &rules);
        bench.resolve(&mut resolver, &mut StdRng::seed_from_u64(1), 0.1);
        assert_eq!(bench.particles.get(b).and_then(|p| p.fate()), Some(Fate::Consumed));
        assert!(resolver.bonds().is_empty());
    }

    #[test]
    fn translocation_carries_nutrients_one_way() {
        let mut bench = Bench::new();
        let mut glucose = SpeciesConfig::new("glucose", BioType::Nutrient, 0.3, 0.12);
        glucose.interaction_radius = 0.9;
        glucose.binding_strength = 0.8;
        let mut carrier = SpeciesConfig::new("glut4", BioType::Transporter, 8.0, 0.35);
        carrier.interaction_radius = 0.9;
        carrier.anchored = true;
        bench.add(&carrier, Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO);
        let n = bench.add(&glucose, Vec3::new(2.0, 2.0, 1.9), Vec3::ZERO);
        let rules = [ReactionRule {
            initiator: BioType::Nutrient,
            acceptor: BioType::Transporter,
            effect: ReactionEffect::Translocation { axis: Axis::Z, plane: 2.0, offset: 0.6 },
        }];
        let mut resolver = BindingResolver::new(&certain(), &rules);
        let mut rng = StdRng::seed_from_u64(4);

        for pass in 0..3 {
            bench.resolve(&mut resolver, &mut rng, 0.1 * (pass + 1) as f64);
            let z = bench.particles.get(n).map(|p| p.position.z).unwrap_or_default();
            assert!((z - 2.6).abs() < 1e-12, "pass {pass}: z = {z}");
            assert!(resolver.bonds().is_empty());
        }
        let crossings = resolver.events().iter().filter(|e| e.kind == ReactionKind::Translocation).count();
        assert_eq!(crossings, 1);
    }

    #[test]
    fn losing_a_partner_resets_progress() {
        let mut bench = Bench::new();
        let r = bench.add(&receptor(), Vec3::splat(2.0), Vec3::ZERO);
        let l = bench.add(&ligand(), Vec3::new(2.1, 2.0, 2.0), Vec3::ZERO);
        let mut resolver = BindingResolver::new(&certain(), &[]);
        let mut rng = StdRng::seed_from_u64(5);
        bench.resolve(&mut resolver, &mut rng, 0.1);
        assert!(bench.particles.get(r).map(|p| p.binding_progress).unwrap_or_default() > 0.0);

        if let Some(p) = bench.particles.get_mut(l) {
            p.deactivate(Fate::Consumed);
        }
        bench.resolve(&mut resolver, &mut rng, 0.2);
        assert!(resolver.bonds().is_empty());
        assert_eq!(bench.particles.get(r).map(|p| p.binding_progress), Some(0.0));
    }

    #[test]
    fn event_log_forgets_old_events() {
        let mut log = EventLog::new(5.0, 3);
        let id = ParticleId::new(0, 0);
        for t in [0.0, 1.0, 2.0, 3.0] {
            log.push(ReactionEvent { time: t, kind: ReactionKind::Binding, participants: (id, id), types: (BioType::Ion, BioType::IonChannel) });
        }
        assert_eq!(log.len(), 3);
        log.prune(7.5);
        assert_eq!(log.len(), 1);
        assert_eq!(log.binding_rate(3.5), 1.0);
    }

    #[test]
    fn dissociation_releases_bonds() {
        let mut bench = Bench::new();
        bench.add(&receptor(), Vec3::splat(2.0), Vec3::ZERO);
        bench.add(&ligand(), Vec3::new(2.1, 2.0, 2.0), Vec3::ZERO);
        let mut resolver = BindingResolver::new(&certain(), &[]);
        let mut rng = StdRng::seed_from_u64(9);
        bench.resolve(&mut resolver, &mut rng, 0.1);
        assert_eq!(resolver.bonds().len(), 1);

        let mut leaky = BindingResolver::new(&BindingConfig { unbinding_rate: 1e9, enabled: false, ..certain() }, &[]);
        leaky.bonds = resolver.bonds().clone();
        let outcome = bench.resolve(&mut leaky, &mut rng, 0.2);
        assert_eq!(outcome.released, 1);
        assert!(leaky.bonds().is_empty());
    }
}
