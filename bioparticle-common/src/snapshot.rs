use crate::biotype::BioType;
use crate::id::ParticleId;
use crate::vecmath::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of one particle, handed to renderers after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    pub id: ParticleId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: [f32; 3],
    pub size: f32,
    pub opacity: f32,
    pub bio_type: BioType,
    pub active: bool,
    pub binding_progress: f64,
}

/// All particles of one system at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub process: String,
    pub time: f64,
    pub tick: u64,
    pub particles: Vec<ParticleSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReactionKind {
    Binding,
    Unbinding,
    Catalysis,
    Activation,
    Translocation,
    Consumption,
    Cascade,
    Incorporation,
}

/// One entry of the recent event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub time: f64,
    pub kind: ReactionKind,
    pub participants: (ParticleId, ParticleId),
    pub types: (BioType, BioType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    NonFinitePosition,
    NonFiniteVelocity,
}

/// A particle deactivated because its state stopped being a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationFault {
    pub tick: u64,
    pub time: f64,
    pub particle: ParticleId,
    pub kind: FaultKind,
}

/// Aggregates over one system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatistics {
    pub time: f64,
    pub tick: u64,
    pub total_particles: usize,
    pub active_particles: usize,
    pub average_speed: f64,
    pub average_age: f64,
    pub average_force: f64,
    pub kinetic_energy: f64,
    pub bound_pairs: usize,
    /// Binding events inside the last simulated second.
    pub binding_events_per_sec: f64,
    pub recent_events: usize,
    pub faults: usize,
    /// Substeps used by the last tick; above the configured count only
    /// under adaptive stepping.
    #[serde(default)]
    pub substeps: u32,
    pub type_histogram: BTreeMap<BioType, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_density: Option<f64>,
}

/// Statistics of every system in a manager plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatistics {
    pub systems: BTreeMap<String, SystemStatistics>,
    pub active_systems: usize,
    pub total_particles: usize,
    pub active_particles: usize,
    pub bound_pairs: usize,
    pub binding_events_per_sec: f64,
    pub faults: usize,
    pub type_histogram: BTreeMap<BioType, usize>,
}

impl ManagerStatistics {
    /// Sums per-system statistics into the aggregate fields.
    pub fn merge(systems: BTreeMap<String, SystemStatistics>, active_systems: usize) -> Self {
        let mut merged = ManagerStatistics { active_systems, ..Default::default() };
        for stats in systems.values() {
            merged.total_particles += stats.total_particles;
            merged.active_particles += stats.active_particles;
            merged.bound_pairs += stats.bound_pairs;
            merged.binding_events_per_sec += stats.binding_events_per_sec;
            merged.faults += stats.faults;
            for (bio_type, count) in &stats.type_histogram {
                *merged.type_histogram.entry(*bio_type).or_insert(0) += count;
            }
        }
        merged.systems = systems;
        merged
    }
}

/// A recorded frame of the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated seconds at which the frame was taken.
    pub time: f64,
    pub statistics: ManagerStatistics,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "particles": null
    pub particles: Option<BTreeMap<String, Vec<ParticleSnapshot>>>,
}
