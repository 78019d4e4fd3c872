use crate::catalog::ProcessCatalog;
use crate::system::ParticleSystem;
use bioparticle_common::{ConfigError, ManagerStatistics, ProcessConfig, SystemSnapshot};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no process named '{0}' in the catalog")]
    UnknownProcess(String),

    #[error("a system with id '{0}' already exists")]
    DuplicateSystem(String),

    #[error("no system with id '{0}'")]
    UnknownSystem(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Owns independent particle systems keyed by id and advances the active
/// ones together.
pub struct SimulationManager {
    catalog: ProcessCatalog,
    systems: BTreeMap<String, ParticleSystem>,
    active: BTreeSet<String>,
    seed: u64,
    created: u64,
}

impl Default for SimulationManager {
    fn default() -> Self {
        SimulationManager::new(ProcessCatalog::builtin(), 42)
    }
}

impl SimulationManager {
    /// Systems created without an explicit seed derive theirs from `seed`
    /// and their creation order.
    pub fn new(catalog: ProcessCatalog, seed: u64) -> Self {
        SimulationManager {
            catalog,
            systems: BTreeMap::new(),
            active: BTreeSet::new(),
            seed,
            created: 0,
        }
    }

    pub fn catalog(&self) -> &ProcessCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ProcessCatalog {
        &mut self.catalog
    }

    /// Builds a system from a catalog process. The new system starts
    /// inactive.
    pub fn create(&mut self, id: &str, process: &str) -> Result<&mut ParticleSystem, ManagerError> {
        let config = self
            .catalog
            .get(process)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownProcess(process.to_string()))?;
        self.create_from_config(id, config, None)
    }

    pub fn create_from_config(
        &mut self,
        id: &str,
        config: ProcessConfig,
        seed: Option<u64>,
    ) -> Result<&mut ParticleSystem, ManagerError> {
        if self.systems.contains_key(id) {
            return Err(ManagerError::DuplicateSystem(id.to_string()));
        }
        let seed = seed.unwrap_or_else(|| self.next_seed());
        let system = ParticleSystem::new(id, config, seed)?;
        self.insert(id, system)
    }

    /// Adds an already constructed system under `id`.
    pub fn insert(&mut self, id: &str, system: ParticleSystem) -> Result<&mut ParticleSystem, ManagerError> {
        if self.systems.contains_key(id) {
            return Err(ManagerError::DuplicateSystem(id.to_string()));
        }
        debug!("Adding system '{}' to the manager.", id);
        Ok(self.systems.entry(id.to_string()).or_insert(system))
    }

    fn next_seed(&mut self) -> u64 {
        let seed = self.seed.wrapping_add(self.created.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.created += 1;
        seed
    }

    pub fn start(&mut self, id: &str) -> Result<(), ManagerError> {
        if !self.systems.contains_key(id) {
            return Err(ManagerError::UnknownSystem(id.to_string()));
        }
        if self.active.insert(id.to_string()) {
            info!("Started system '{}'.", id);
        }
        Ok(())
    }

    /// Pauses a system; it keeps its state and resumes where it left off.
    pub fn stop(&mut self, id: &str) -> Result<(), ManagerError> {
        if !self.systems.contains_key(id) {
            return Err(ManagerError::UnknownSystem(id.to_string()));
        }
        if self.active.remove(id) {
            info!("Stopped system '{}'.", id);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<ParticleSystem> {
        self.active.remove(id);
        self.systems.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ParticleSystem> {
        self.systems.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ParticleSystem> {
        self.systems.get_mut(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.keys().map(String::as_str)
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.active.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Ticks every active system by `dt`. Systems share no state, so with
    /// the `parallel` feature they run on the rayon pool.
    pub fn update(&mut self, dt: f64) {
        if !(dt > 0.0) || !dt.is_finite() {
            warn!("Ignoring manager update with invalid dt {}.", dt);
            return;
        }
        let active = &self.active;

        #[cfg(feature = "parallel")]
        self.systems
            .par_iter_mut()
            .filter(|(id, _)| active.contains(id.as_str()))
            .for_each(|(_, system)| system.tick(dt));

        #[cfg(not(feature = "parallel"))]
        self.systems
            .iter_mut()
            .filter(|(id, _)| active.contains(id.as_str()))
            .for_each(|(_, system)| system.tick(dt));
    }

    pub fn statistics(&self) -> ManagerStatistics {
        let per_system = self
            .systems
            .iter()
            .map(|(id, system)| (id.clone(), system.statistics()))
            .collect();
        ManagerStatistics::merge(per_system, self.active.len())
    }

    pub fn snapshots(&self) -> BTreeMap<String, SystemSnapshot> {
        self.systems
            .iter()
            .map(|(id, system)| (id.clone(), system.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_from_catalog() {
        let mut manager = SimulationManager::default();
        let system = manager.create("ions", "ionic-solution").expect("builtin");
        assert_eq!(system.active_count(), 200);
        assert!(matches!(
            manager.create("other", "cold-fusion"),
            Err(ManagerError::UnknownProcess(name)) if name == "cold-fusion"
        ));
        assert!(matches!(manager.create("ions", "sph-droplet"), Err(ManagerError::DuplicateSystem(_))));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn invalid_definitions_surface_config_errors() {
        let mut manager = SimulationManager::default();
        let mut config = manager.catalog().get("receptor-binding").cloned().expect("builtin");
        config.population_cap = 0;
        assert!(matches!(
            manager.create_from_config("bad", config, Some(1)),
            Err(ManagerError::Config(ConfigError::ZeroPopulationCap))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn only_active_systems_advance() {
        let mut manager = SimulationManager::default();
        manager.create("a", "receptor-binding").expect("builtin");
        manager.create("b", "enzyme-catalysis").expect("builtin");
        manager.start("a").expect("exists");
        assert!(matches!(manager.start("c"), Err(ManagerError::UnknownSystem(_))));

        for _ in 0..3 {
            manager.update(1.0 / 60.0);
        }
        assert_eq!(manager.get("a").map(|s| s.tick_count()), Some(3));
        assert_eq!(manager.get("b").map(|s| s.tick_count()), Some(0));

        manager.stop("a").expect("exists");
        manager.start("b").expect("exists");
        manager.update(1.0 / 60.0);
        assert_eq!(manager.get("a").map(|s| s.tick_count()), Some(3));
        assert_eq!(manager.get("b").map(|s| s.tick_count()), Some(1));
        assert_eq!(manager.active_ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn statistics_sum_over_systems() {
        let mut manager = SimulationManager::default();
        manager.create("ions", "ionic-solution").expect("builtin");
        manager.create("drop", "sph-droplet").expect("builtin");
        manager.start("ions").expect("exists");
        let stats = manager.statistics();
        assert_eq!(stats.systems.len(), 2);
        assert_eq!(stats.active_systems, 1);
        assert_eq!(stats.active_particles, 400);
        assert_eq!(stats.total_particles, 400);
        assert_eq!(manager.snapshots()["drop"].particles.len(), 200);
    }

    #[test]
    fn remove_forgets_activity() {
        let mut manager = SimulationManager::default();
        manager.create("a", "ionic-solution").expect("builtin");
        manager.start("a").expect("exists");
        assert!(manager.remove("a").is_some());
        assert!(!manager.is_active("a"));
        assert!(manager.get("a").is_none());
    }

    #[test]
    fn derived_seeds_differ_between_systems() {
        let mut manager = SimulationManager::default();
        manager.create("a", "ionic-solution").expect("builtin");
        manager.create("b", "ionic-solution").expect("builtin");
        let first = |id: &str| manager.get(id).and_then(|s| s.particles().next().map(|p| p.position));
        assert_ne!(first("a"), first("b"));
    }
}
