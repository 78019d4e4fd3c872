use crate::catalog::ProcessCatalog;
use crate::manager::SimulationManager;
use anyhow::{anyhow, bail, Context, Result};
use bioparticle_common::{BioType, EngineConfig, ParticleId, Snapshot, Vec3};
use log::{debug, info};

/// One particle's final state, as written to the positions CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalPosition {
    pub system: String,
    pub id: ParticleId,
    pub bio_type: BioType,
    pub position: Vec3,
}

/// Drives a manager for the headless binary: builds the configured runs,
/// steps them at a fixed dt and keeps the recorded frames.
pub struct Runner {
    config: EngineConfig,
    manager: SimulationManager,
    snapshots: Vec<Snapshot>,
    steps: u64,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut manager = SimulationManager::new(ProcessCatalog::builtin(), config.seed);

        // --- Build every run ---
        for run in &config.runs {
            let mut definition = match (&run.definition, &run.process) {
                (Some(definition), _) => definition.clone(),
                (None, Some(name)) => manager
                    .catalog()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("run '{}': unknown process '{}'", run.id, name))?,
                (None, None) => bail!("run '{}' needs either `process` or `definition`.", run.id),
            };
            if let Some(cap) = run.population_cap {
                definition.population_cap = cap;
            }
            if let Some(rate) = run.emission_rate {
                definition.emission_rate = rate;
            }
            manager
                .create_from_config(&run.id, definition, run.seed)
                .with_context(|| format!("Failed to create run '{}'", run.id))?;
            manager.start(&run.id)?;
        }
        info!("Runner prepared {} system(s).", manager.len());

        Ok(Runner { config, manager, snapshots: Vec::new(), steps: 0 })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manager(&self) -> &SimulationManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SimulationManager {
        &mut self.manager
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f64 {
        self.steps as f64 * self.config.timing.dt
    }

    pub fn total_steps(&self) -> u64 {
        (self.config.timing.total_time / self.config.timing.dt).ceil() as u64
    }

    /// Steps between recorded frames; at least one.
    pub fn record_interval_steps(&self) -> u64 {
        (self.config.timing.record_interval.max(0.0) / self.config.timing.dt).round().max(1.0) as u64
    }

    pub fn step(&mut self) {
        self.manager.update(self.config.timing.dt);
        self.steps += 1;
    }

    pub fn current_particle_count(&self) -> usize {
        self.manager.ids().filter_map(|id| self.manager.get(id)).map(|s| s.active_count()).sum()
    }

    pub fn record_snapshot(&mut self) {
        let particles = self.config.output.save_positions_in_snapshot.then(|| {
            self.manager
                .snapshots()
                .into_iter()
                .map(|(id, snapshot)| (id, snapshot.particles))
                .collect()
        });
        let snapshot = Snapshot { time: self.time(), statistics: self.manager.statistics(), particles };
        debug!(
            "Recorded frame {} at t={:.3}s ({} active particles).",
            self.snapshots.len(),
            snapshot.time,
            snapshot.statistics.active_particles
        );
        self.snapshots.push(snapshot);
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Final state of every active particle, grouped by system id.
    pub fn get_results(&self) -> Vec<FinalPosition> {
        let mut results = Vec::new();
        for id in self.manager.ids() {
            let Some(system) = self.manager.get(id) else { continue };
            results.extend(system.particles().map(|p| FinalPosition {
                system: id.to_string(),
                id: p.id,
                bio_type: p.bio_type(),
                position: p.position,
            }));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioparticle_common::{OutputConfig, RunConfig, TimingConfig};

    fn config(runs: Vec<RunConfig>) -> EngineConfig {
        EngineConfig {
            timing: TimingConfig { dt: 0.125, total_time: 0.5, record_interval: 0.25 },
            seed: 7,
            runs,
            output: OutputConfig {
                base_filename: "test".into(),
                save_positions: true,
                save_stats: true,
                save_positions_in_snapshot: true,
                format: None,
            },
        }
    }

    fn run(id: &str, process: &str) -> RunConfig {
        RunConfig {
            id: id.into(),
            process: Some(process.into()),
            definition: None,
            seed: None,
            population_cap: None,
            emission_rate: None,
        }
    }

    #[test]
    fn records_frames_with_positions() {
        let mut runner = Runner::new(config(vec![run("ions", "ionic-solution")])).expect("runner");
        assert_eq!(runner.total_steps(), 4);
        assert_eq!(runner.record_interval_steps(), 2);

        runner.record_snapshot();
        for _ in 0..runner.total_steps() {
            runner.step();
        }
        runner.record_snapshot();

        let frames = runner.get_recorded_snapshots();
        assert_eq!(frames.len(), 2);
        assert!((frames[1].time - 0.5).abs() < 1e-12);
        let particles = frames[1].particles.as_ref().expect("positions requested");
        assert_eq!(particles["ions"].len(), 200);
        assert_eq!(runner.get_results().len(), 200);
        assert_eq!(runner.current_particle_count(), 200);
    }

    #[test]
    fn applies_run_overrides() {
        let mut overridden = run("cells", "blood-flow");
        overridden.population_cap = Some(300);
        overridden.emission_rate = Some(0.0);
        let runner = Runner::new(config(vec![overridden])).expect("runner");
        let system = runner.manager().get("cells").expect("created");
        assert_eq!(system.config().population_cap, 300);
        assert_eq!(system.config().emission_rate, 0.0);
        assert!(runner.manager().is_active("cells"));
    }

    #[test]
    fn rejects_unknown_processes() {
        let err = Runner::new(config(vec![run("x", "photosynthesis")])).err().expect("unknown process");
        assert!(err.to_string().contains("photosynthesis"));
    }
}
