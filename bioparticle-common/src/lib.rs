pub mod biotype;
pub mod config;
pub mod error;
pub mod id;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use biotype::BioType;
pub use config::{
    AdaptiveStepConfig, Axis, BindingConfig, BlueprintEntry, BoundaryPolicy, BoundsConfig, BrownianConfig,
    CollisionConfig, ElectrostaticConfig, EngineConfig, EnvironmentConfig, FlowPreset, ForceModelConfig,
    HookConfig, IntegratorConfig, LennardJonesConfig, OutputConfig, Participant, Placement, ProcessConfig,
    ProcessKind, ReactionEffect, ReactionRule, RunConfig, SaturationPolicy, SpatialConfig, SpeciesConfig,
    SphConfig, TimingConfig, VisualConfig,
};
pub use error::ConfigError;
pub use id::ParticleId;
pub use sim_params::SimParams;
pub use snapshot::{
    FaultKind, ManagerStatistics, ParticleSnapshot, ReactionEvent, ReactionKind, SimulationFault, Snapshot,
    SystemSnapshot, SystemStatistics,
};
pub use vecmath::{clamp, Vec3};
