use crate::biotype::BioType;
use crate::error::ConfigError;
use crate::sim_params::SimParams;
use crate::vecmath::Vec3;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Runner configuration (config.toml)
// ---------------------------------------------------------------------------

// Configuration for timing, in seconds
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub dt: f64,
    pub total_time: f64,
    pub record_interval: f64,
}

// One simulation started by the runner. Either names a catalog process or
// carries a full inline definition.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub id: String,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub definition: Option<ProcessConfig>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub population_cap: Option<usize>,
    #[serde(default)]
    pub emission_rate: Option<f64>,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main runner configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub runs: Vec<RunConfig>,
    pub output: OutputConfig,
}

fn default_seed() -> u64 {
    42
}

impl EngineConfig {
    /// Loads the runner configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: EngineConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        // --- Validation ---
        if !(config.timing.dt > 0.0) || !config.timing.dt.is_finite() {
            anyhow::bail!("timing.dt must be positive.");
        }
        if config.timing.total_time < 0.0 {
            anyhow::bail!("timing.total_time must not be negative.");
        }
        if config.runs.is_empty() {
            anyhow::bail!("at least one [[runs]] entry is required.");
        }
        for run in &config.runs {
            if run.process.is_none() && run.definition.is_none() {
                anyhow::bail!("run '{}' needs either `process` or `definition`.", run.id);
            }
            if let Some(definition) = &run.definition {
                definition
                    .validate()
                    .map_err(|e| anyhow::anyhow!("run '{}': {}", run.id, e))?;
            }
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Process configuration
// ---------------------------------------------------------------------------

/// Named biological process families.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessKind {
    BloodFlow,
    NeuralSignals,
    HormoneDiffusion,
    ImmuneResponse,
    AtpSynthesis,
    IonTransport,
    ReceptorBinding,
    EnzymeCatalysis,
    MembraneTransport,
    DnaTranscription,
    SignalTransduction,
    SphFluid,
    IonicSolution,
    Custom,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

/// Axis-aligned box.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct BoundsConfig {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundsConfig {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        BoundsConfig { min, max }
    }

    /// Cube of side `size` with its lower corner at the origin.
    pub fn cube(size: f64) -> Self {
        BoundsConfig { min: Vec3::ZERO, max: Vec3::splat(size) }
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Vec3) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && (0..3).all(|a| self.max[a] > self.min[a])
    }
}

/// Presentation attributes of a species.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct VisualConfig {
    pub color: [f32; 3],
    pub size: f32,
    pub opacity: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        VisualConfig { color: [1.0, 1.0, 1.0], size: 1.0, opacity: 1.0 }
    }
}

/// Physical and biological template shared by every particle of one kind.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SpeciesConfig {
    pub name: String,
    pub bio_type: BioType,
    pub mass: f64,
    #[serde(default)]
    pub charge: f64,
    pub radius: f64,
    #[serde(default = "default_damping")]
    pub damping: f64,
    // Seconds; absent means the particle never expires by age.
    #[serde(default)]
    pub half_life: Option<f64>,
    #[serde(default)]
    pub diffusion: f64,
    #[serde(default)]
    pub interaction_radius: f64,
    #[serde(default)]
    pub binding_strength: f64,
    // Scales the short-range pull toward compatible binding partners.
    #[serde(default = "default_attraction_gain")]
    pub attraction_gain: f64,
    #[serde(default)]
    pub anchored: bool,
    #[serde(default)]
    pub visual: VisualConfig,
}

fn default_damping() -> f64 {
    0.98
}

fn default_attraction_gain() -> f64 {
    1.0
}

impl SpeciesConfig {
    /// Minimal species; remaining fields take their defaults.
    pub fn new(name: impl Into<String>, bio_type: BioType, mass: f64, radius: f64) -> Self {
        SpeciesConfig {
            name: name.into(),
            bio_type,
            mass,
            charge: 0.0,
            radius,
            damping: default_damping(),
            half_life: None,
            diffusion: 0.0,
            interaction_radius: 0.0,
            binding_strength: 0.0,
            attraction_gain: default_attraction_gain(),
            anchored: false,
            visual: VisualConfig::default(),
        }
    }

    /// Age at which the particle is deactivated: twice the half-life.
    pub fn max_age(&self) -> f64 {
        self.half_life.map(|h| 2.0 * h).unwrap_or(f64::INFINITY)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(ConfigError::NonPositiveMass { species: self.name.clone(), mass: self.mass });
        }
        let non_negative = [
            ("radius", self.radius),
            ("diffusion", self.diffusion),
            ("interaction_radius", self.interaction_radius),
            ("binding_strength", self.binding_strength),
            ("attraction_gain", self.attraction_gain),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::NegativeParameter { species: self.name.clone(), field, value });
            }
        }
        if !self.charge.is_finite() {
            return Err(ConfigError::NegativeParameter {
                species: self.name.clone(),
                field: "charge",
                value: self.charge,
            });
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(ConfigError::InvalidDamping { species: self.name.clone(), damping: self.damping });
        }
        if let Some(half_life) = self.half_life {
            if !(half_life > 0.0) {
                return Err(ConfigError::InvalidHalfLife { species: self.name.clone(), half_life });
            }
        }
        Ok(())
    }
}

/// Where particles of a blueprint entry are placed, initially and on emission.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Placement {
    /// Uniformly random inside `region` (the process bounds when absent).
    Uniform {
        #[serde(default)]
        region: Option<BoundsConfig>,
    },
    /// Compact cubic lattice around `center`.
    Lattice { center: Vec3, spacing: f64 },
    /// Evenly spaced along a segment; emission samples points on it.
    Line { start: Vec3, end: Vec3 },
    /// Uniformly random on the plane `axis = offset` inside the bounds.
    Plane { axis: Axis, offset: f64 },
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Uniform { region: None }
    }
}

/// One line of the population blueprint.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BlueprintEntry {
    pub species: SpeciesConfig,
    // Relative weight of this species in emission.
    #[serde(default)]
    pub proportion: f64,
    #[serde(default)]
    pub initial_count: usize,
    #[serde(default)]
    pub placement: Placement,
    // Standard deviation of each initial velocity component.
    #[serde(default)]
    pub initial_speed: f64,
}

impl BlueprintEntry {
    pub fn new(species: SpeciesConfig, initial_count: usize, proportion: f64) -> Self {
        BlueprintEntry {
            species,
            proportion,
            initial_count,
            placement: Placement::default(),
            initial_speed: 0.0,
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_initial_speed(mut self, initial_speed: f64) -> Self {
        self.initial_speed = initial_speed;
        self
    }
}

/// Declarative flow field presets. The engine also accepts custom closures.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlowPreset {
    Uniform { velocity: Vec3 },
    /// base + amplitude * sin(wavenumber * y)
    Pulsatile { base: Vec3, amplitude: Vec3, wavenumber: f64 },
    /// Slow swirling drift through extracellular matrix.
    Interstitial { amplitude: f64, wavenumber: f64 },
    /// Constant-speed drift toward a point.
    Converge { target: Vec3, speed: f64 },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub temperature: f64,
    pub viscosity: f64,
    pub ionic_strength: f64,
    pub electric_field: Option<Vec3>,
    pub gravity: Option<Vec3>,
    pub flow: Option<FlowPreset>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            temperature: 310.0,
            viscosity: 0.0,
            ionic_strength: 0.15,
            electric_field: None,
            gravity: None,
            flow: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Force models
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BrownianConfig {
    pub strength: f64,
}

impl Default for BrownianConfig {
    fn default() -> Self {
        BrownianConfig { strength: 1.0 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ElectrostaticConfig {
    pub coulomb_constant: f64,
    pub dielectric_constant: f64,
    // Fixed screening length. When absent it follows temperature and ionic strength.
    pub debye_length: Option<f64>,
    // Screening length at 298.15 K, ionic strength 0.15 and unit dielectric.
    pub debye_reference: f64,
    pub softening: f64,
}

impl Default for ElectrostaticConfig {
    fn default() -> Self {
        ElectrostaticConfig {
            coulomb_constant: 1.0,
            dielectric_constant: 1.0,
            debye_length: None,
            debye_reference: 1.0,
            softening: 0.05,
        }
    }
}

impl ElectrostaticConfig {
    pub const REFERENCE_TEMPERATURE: f64 = 298.15;
    pub const REFERENCE_IONIC_STRENGTH: f64 = 0.15;

    /// Screening length under the given conditions, λ ∝ √(ε·T / I).
    pub fn screening_length(&self, temperature: f64, ionic_strength: f64) -> f64 {
        if let Some(fixed) = self.debye_length {
            return fixed;
        }
        if !(ionic_strength > 0.0) {
            return f64::INFINITY;
        }
        let ratio = self.dielectric_constant * (temperature / Self::REFERENCE_TEMPERATURE)
            * (Self::REFERENCE_IONIC_STRENGTH / ionic_strength);
        self.debye_reference * ratio.max(0.0).sqrt()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SphConfig {
    pub smoothing_length: f64,
    pub rest_density: f64,
    pub gas_constant: f64,
    pub viscosity: f64,
    pub surface_tension: f64,
}

impl Default for SphConfig {
    fn default() -> Self {
        SphConfig {
            smoothing_length: 1.0,
            rest_density: 6.0,
            gas_constant: 300.0,
            viscosity: 0.5,
            surface_tension: 0.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LennardJonesConfig {
    pub epsilon: f64,
    // σ = sigma_scale * (r_i + r_j)
    pub sigma_scale: f64,
    // cutoff = cutoff_multiple * (r_i + r_j)
    pub cutoff_multiple: f64,
    // Separations below soft_core * σ are evaluated at soft_core * σ.
    pub soft_core: f64,
}

impl Default for LennardJonesConfig {
    fn default() -> Self {
        LennardJonesConfig { epsilon: 1.0, sigma_scale: 0.89, cutoff_multiple: 2.5, soft_core: 0.8 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollisionConfig {
    pub restitution: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        CollisionConfig { restitution: 0.8 }
    }
}

/// Force model selection. `composite` sums any subset of the others.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum ForceModelConfig {
    Brownian(BrownianConfig),
    Electrostatic(ElectrostaticConfig),
    Sph(SphConfig),
    LennardJones(LennardJonesConfig),
    Collision(CollisionConfig),
    Composite { models: Vec<ForceModelConfig> },
}

impl Default for ForceModelConfig {
    fn default() -> Self {
        ForceModelConfig::Brownian(BrownianConfig::default())
    }
}

impl ForceModelConfig {
    /// Largest pair distance the model evaluates, given the population's
    /// largest radius and largest interaction radius.
    pub fn reach(&self, max_radius: f64, max_interaction_radius: f64) -> f64 {
        match self {
            ForceModelConfig::Brownian(_) => 0.0,
            ForceModelConfig::Electrostatic(_) => max_interaction_radius,
            ForceModelConfig::Sph(sph) => sph.smoothing_length,
            ForceModelConfig::LennardJones(lj) => lj.cutoff_multiple * 2.0 * max_radius,
            ForceModelConfig::Collision(_) => 2.0 * max_radius,
            ForceModelConfig::Composite { models } => models
                .iter()
                .map(|m| m.reach(max_radius, max_interaction_radius))
                .fold(0.0, f64::max),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ForceModelConfig::Brownian(b) => {
                if !(b.strength >= 0.0) {
                    return Err(ConfigError::model("brownian", "strength must be non-negative"));
                }
            }
            ForceModelConfig::Electrostatic(e) => {
                if !(e.dielectric_constant > 0.0) {
                    return Err(ConfigError::model("electrostatic", "dielectric constant must be positive"));
                }
                if let Some(lambda) = e.debye_length {
                    if !(lambda > 0.0) {
                        return Err(ConfigError::model("electrostatic", "debye length must be positive"));
                    }
                }
                if !(e.debye_reference > 0.0) {
                    return Err(ConfigError::model("electrostatic", "debye reference must be positive"));
                }
                if !(e.softening >= 0.0) || !e.coulomb_constant.is_finite() {
                    return Err(ConfigError::model("electrostatic", "softening and coulomb constant must be finite, softening non-negative"));
                }
            }
            ForceModelConfig::Sph(s) => {
                if !(s.smoothing_length > 0.0) {
                    return Err(ConfigError::model("sph", "smoothing length must be positive"));
                }
                if !(s.rest_density > 0.0) {
                    return Err(ConfigError::model("sph", "rest density must be positive"));
                }
                if !(s.gas_constant >= 0.0) || !(s.viscosity >= 0.0) || !(s.surface_tension >= 0.0) {
                    return Err(ConfigError::model("sph", "gas constant, viscosity and surface tension must be non-negative"));
                }
            }
            ForceModelConfig::LennardJones(lj) => {
                if !(lj.epsilon >= 0.0) || !(lj.sigma_scale > 0.0) || !(lj.cutoff_multiple > 0.0) {
                    return Err(ConfigError::model("lennard-jones", "epsilon must be non-negative; sigma scale and cutoff positive"));
                }
                if !(lj.soft_core > 0.0 && lj.soft_core <= 1.0) {
                    return Err(ConfigError::model("lennard-jones", "soft core must lie in (0, 1]"));
                }
            }
            ForceModelConfig::Collision(c) => {
                if !(0.0..=1.0).contains(&c.restitution) {
                    return Err(ConfigError::model("collision", "restitution must lie in [0, 1]"));
                }
            }
            ForceModelConfig::Composite { models } => {
                if models.is_empty() {
                    return Err(ConfigError::model("composite", "needs at least one model"));
                }
                for model in models {
                    model.validate()?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Integrator, spatial index, binding
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// Clamp to the wall and invert the outward velocity, attenuated by `restitution`.
    Reflective {
        #[serde(default = "default_wall_restitution")]
        restitution: f64,
    },
    /// Wrap around to the opposite face.
    Periodic,
}

fn default_wall_restitution() -> f64 {
    0.5
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        BoundaryPolicy::Reflective { restitution: default_wall_restitution() }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IntegratorConfig {
    pub substeps: u32,
    pub max_speed: f64,
    pub boundary: BoundaryPolicy,
    // Fixed substep count when absent.
    pub adaptive: Option<AdaptiveStepConfig>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig { substeps: 8, max_speed: 10.0, boundary: BoundaryPolicy::default(), adaptive: None }
    }
}

/// Substep refinement driven by the CFL number `v_max * h / length`, where
/// `length` is the force reach (or the cell edge when no pair force acts).
/// The substep count doubles from `substeps` until the number drops to
/// `max_cfl` or `max_substeps` is reached.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AdaptiveStepConfig {
    pub max_cfl: f64,
    pub max_substeps: u32,
}

impl Default for AdaptiveStepConfig {
    fn default() -> Self {
        AdaptiveStepConfig { max_cfl: 0.25, max_substeps: 64 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpatialConfig {
    // Automatic (largest interaction reach) when absent.
    pub cell_size: Option<f64>,
    // Upper bound on the grid size; cells grow past `cell_size` to respect it.
    pub max_cells: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        SpatialConfig { cell_size: None, max_cells: 1 << 21 }
    }
}

/// How many partners a particle may hold at once.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum SaturationPolicy {
    /// Every particle holds at most one partner.
    OneToOne,
    /// Acceptors hold up to `capacity` initiators; initiators hold one.
    ManyToOne { capacity: usize },
}

impl Default for SaturationPolicy {
    fn default() -> Self {
        SaturationPolicy::OneToOne
    }
}

impl SaturationPolicy {
    pub fn acceptor_capacity(self) -> usize {
        match self {
            SaturationPolicy::OneToOne => 1,
            SaturationPolicy::ManyToOne { capacity } => capacity,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BindingConfig {
    pub enabled: bool,
    // p = strength * (1 - d / r) * scaling_factor
    pub scaling_factor: f64,
    // Candidates are searched within reach_multiplier * interaction radius.
    pub reach_multiplier: f64,
    pub progress_step: f64,
    // Progress gained per second while a bond holds.
    pub progress_rate: f64,
    // Dissociation rate per bond, 1/s.
    pub unbinding_rate: f64,
    pub saturation: SaturationPolicy,
    pub momentum_averaging: bool,
    // Seconds of binding events kept in the log.
    pub event_retention: f64,
    pub max_events: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        BindingConfig {
            enabled: true,
            scaling_factor: 0.1,
            reach_multiplier: 1.5,
            progress_step: 0.1,
            progress_rate: 0.0,
            unbinding_rate: 0.0,
            saturation: SaturationPolicy::OneToOne,
            momentum_averaging: true,
            event_retention: 5.0,
            max_events: 4096,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Participant {
    Initiator,
    Acceptor,
}

/// What happens once an initiator binds an acceptor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReactionEffect {
    /// Initiator converts to `product`; the acceptor is released.
    Catalysis { product: BioType },
    /// Acceptor switches to its activated state.
    Activation,
    /// Initiator crosses the plane `axis = plane` and lands at `plane + offset`.
    /// The sign of `offset` is the crossing direction; initiators already on
    /// that side are left alone.
    Translocation { axis: Axis, plane: f64, offset: f64 },
    /// One participant is consumed.
    Consumption { target: Participant },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReactionRule {
    pub initiator: BioType,
    pub acceptor: BioType,
    pub effect: ReactionEffect,
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Built-in per-tick behaviours a process may attach.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "hook", rename_all = "kebab-case")]
pub enum HookConfig {
    /// Uniform flow along `axis` pulsing as base + amplitude * sin(2π f t).
    PulsatileFlow { base_speed: f64, amplitude: f64, frequency: f64, axis: Axis },
    /// Electric field along `axis` oscillating as amplitude * sin(2π f t).
    OscillatingField { amplitude: f64, frequency: f64, axis: Axis },
    /// Flow converging on the centroid of `target` particles.
    ConcentrationGradient { target: BioType, speed: f64 },
    /// `hunter` particles steer toward the nearest `prey`.
    Chemotaxis { hunter: BioType, prey: BioType, gain: f64, sensing_radius: f64 },
    /// Sites of type `site` activate one after another, starting when a
    /// `trigger` particle comes within `radius` of the first site.
    SignalCascade { site: BioType, trigger: BioType, radius: f64 },
    /// Polymerases walk along `axis`, incorporating nucleotides they pass.
    PolymeraseTrack { speed: f64, axis: Axis, capture_radius: f64, spacing: f64 },
}

impl HookConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = match self {
            HookConfig::PulsatileFlow { frequency, .. } => frequency.is_finite(),
            HookConfig::OscillatingField { frequency, .. } => frequency.is_finite(),
            HookConfig::ConcentrationGradient { speed, .. } => *speed >= 0.0,
            HookConfig::Chemotaxis { gain, sensing_radius, .. } => *gain >= 0.0 && *sensing_radius > 0.0,
            HookConfig::SignalCascade { radius, .. } => *radius > 0.0,
            HookConfig::PolymeraseTrack { capture_radius, spacing, .. } => *capture_radius > 0.0 && *spacing >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::parameter("hook", format!("invalid parameters in {self:?}")))
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessConfig
// ---------------------------------------------------------------------------

/// Everything needed to build one particle system.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub kind: ProcessKind,
    #[serde(default)]
    pub description: String,
    pub bounds: BoundsConfig,
    pub blueprint: Vec<BlueprintEntry>,
    // Particles per second.
    #[serde(default)]
    pub emission_rate: f64,
    pub population_cap: usize,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub forces: ForceModelConfig,
    #[serde(default)]
    pub integrator: IntegratorConfig,
    #[serde(default)]
    pub spatial: SpatialConfig,
    #[serde(default)]
    pub binding: BindingConfig,
    #[serde(default)]
    pub reactions: Vec<ReactionRule>,
    #[serde(default)]
    pub hook: Option<HookConfig>,
}

impl ProcessConfig {
    /// A custom process with default environment, forces and binding.
    pub fn new(bounds: BoundsConfig, blueprint: Vec<BlueprintEntry>, population_cap: usize) -> Self {
        ProcessConfig {
            kind: ProcessKind::Custom,
            description: String::new(),
            bounds,
            blueprint,
            emission_rate: 0.0,
            population_cap,
            environment: EnvironmentConfig::default(),
            forces: ForceModelConfig::default(),
            integrator: IntegratorConfig::default(),
            spatial: SpatialConfig::default(),
            binding: BindingConfig::default(),
            reactions: Vec::new(),
            hook: None,
        }
    }

    pub fn initial_population(&self) -> usize {
        self.blueprint.iter().map(|e| e.initial_count).sum()
    }

    pub fn max_radius(&self) -> f64 {
        self.blueprint.iter().map(|e| e.species.radius).fold(0.0, f64::max)
    }

    pub fn max_interaction_radius(&self) -> f64 {
        self.blueprint.iter().map(|e| e.species.interaction_radius).fold(0.0, f64::max)
    }

    /// Smallest admissible grid cell: the largest distance any force model
    /// or the particles themselves look for neighbours.
    pub fn required_cell_size(&self) -> f64 {
        let max_interaction = self.max_interaction_radius();
        self.forces.reach(self.max_radius(), max_interaction).max(max_interaction)
    }

    /// Checks every parameter once, before any tick runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds { min: self.bounds.min, max: self.bounds.max });
        }
        if self.blueprint.is_empty() {
            return Err(ConfigError::EmptyBlueprint);
        }
        for entry in &self.blueprint {
            entry.species.validate()?;
            if !(entry.proportion >= 0.0) || !entry.proportion.is_finite() {
                return Err(ConfigError::NegativeRate { field: "proportion", value: entry.proportion });
            }
            if !(entry.initial_speed >= 0.0) || !entry.initial_speed.is_finite() {
                return Err(ConfigError::NegativeRate { field: "initial_speed", value: entry.initial_speed });
            }
            if let Placement::Lattice { spacing, .. } = entry.placement {
                if !(spacing > 0.0) {
                    return Err(ConfigError::parameter("placement", "lattice spacing must be positive"));
                }
            }
        }
        if !(self.emission_rate >= 0.0) || !self.emission_rate.is_finite() {
            return Err(ConfigError::NegativeRate { field: "emission_rate", value: self.emission_rate });
        }
        if self.emission_rate > 0.0 && !self.blueprint.iter().any(|e| e.proportion > 0.0) {
            return Err(ConfigError::NoEmittableSpecies);
        }
        if self.population_cap == 0 {
            return Err(ConfigError::ZeroPopulationCap);
        }
        let initial = self.initial_population();
        if initial > self.population_cap {
            return Err(ConfigError::InitialPopulationExceedsCap { initial, cap: self.population_cap });
        }

        let env = &self.environment;
        if !(env.viscosity >= 0.0) {
            return Err(ConfigError::NegativeRate { field: "environment.viscosity", value: env.viscosity });
        }
        if !(env.temperature >= 0.0) {
            return Err(ConfigError::NegativeRate { field: "environment.temperature", value: env.temperature });
        }
        if !(env.ionic_strength >= 0.0) {
            return Err(ConfigError::NegativeRate { field: "environment.ionic_strength", value: env.ionic_strength });
        }

        self.forces.validate()?;

        let integrator = &self.integrator;
        if integrator.substeps == 0 {
            return Err(ConfigError::parameter("integrator.substeps", "must be at least 1"));
        }
        if !(integrator.max_speed > 0.0) {
            return Err(ConfigError::parameter("integrator.max_speed", "must be positive"));
        }
        if let BoundaryPolicy::Reflective { restitution } = integrator.boundary {
            if !(0.0..=1.0).contains(&restitution) {
                return Err(ConfigError::parameter("integrator.boundary.restitution", "must lie in [0, 1]"));
            }
        }
        if let Some(adaptive) = &integrator.adaptive {
            if !(adaptive.max_cfl > 0.0) || !adaptive.max_cfl.is_finite() {
                return Err(ConfigError::parameter("integrator.adaptive.max_cfl", "must be positive and finite"));
            }
            if adaptive.max_substeps < integrator.substeps {
                return Err(ConfigError::parameter(
                    "integrator.adaptive.max_substeps",
                    format!("must be at least integrator.substeps ({})", integrator.substeps),
                ));
            }
        }

        let required = self.required_cell_size();
        if let Some(cell_size) = self.spatial.cell_size {
            if !(cell_size > 0.0) || cell_size < required {
                return Err(ConfigError::CellSizeTooSmall { cell_size, required });
            }
        }
        if self.spatial.max_cells == 0 || self.spatial.max_cells > u32::MAX as usize {
            return Err(ConfigError::parameter("spatial.max_cells", "must lie in [1, u32::MAX]"));
        }

        for rule in &self.reactions {
            if let ReactionEffect::Translocation { plane, offset, .. } = rule.effect {
                if !plane.is_finite() || !offset.is_finite() || offset == 0.0 {
                    return Err(ConfigError::parameter(
                        "reactions.translocation",
                        "plane must be finite and offset finite and non-zero",
                    ));
                }
            }
        }

        let binding = &self.binding;
        for (field, value) in [
            ("binding.scaling_factor", binding.scaling_factor),
            ("binding.reach_multiplier", binding.reach_multiplier),
            ("binding.progress_step", binding.progress_step),
            ("binding.progress_rate", binding.progress_rate),
            ("binding.unbinding_rate", binding.unbinding_rate),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::NegativeRate { field, value });
            }
        }
        if !(binding.event_retention > 0.0) {
            return Err(ConfigError::parameter("binding.event_retention", "must be positive"));
        }
        if binding.saturation.acceptor_capacity() == 0 {
            return Err(ConfigError::parameter("binding.saturation", "capacity must be at least 1"));
        }

        if let Some(hook) = &self.hook {
            hook.validate()?;
        }
        Ok(())
    }

    /// Converts the configuration into parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let extent = self.bounds.extent();
        let force_reach = self.forces.reach(self.max_radius(), self.max_interaction_radius());
        let required = self.required_cell_size();

        // Grid parameters
        let requested = self.spatial.cell_size.unwrap_or(required);
        // Degenerate populations (point particles, no pair forces) still get a usable grid.
        let base_cell = if requested > 1e-9 { requested } else { extent.x.min(extent.y).min(extent.z) };
        let periodic = matches!(self.integrator.boundary, BoundaryPolicy::Periodic);

        let max_cells = self.spatial.max_cells.clamp(1, u32::MAX as usize);
        let (grid_dims, cell_size) = grid_layout(extent, base_cell, periodic, max_cells);
        let inv_cell_size = [1.0 / cell_size[0], 1.0 / cell_size[1], 1.0 / cell_size[2]];
        let num_grid_cells = grid_dims.iter().map(|&d| d as usize).product();

        let wall_restitution = match self.integrator.boundary {
            BoundaryPolicy::Reflective { restitution } => restitution,
            BoundaryPolicy::Periodic => 1.0,
        };

        SimParams {
            // World & Grid
            bounds_min: self.bounds.min,
            bounds_max: self.bounds.max,
            extent,
            cell_size,
            inv_cell_size,
            grid_dims,
            num_grid_cells,
            periodic,
            wall_restitution,
            // Integration
            substeps: self.integrator.substeps.max(1),
            max_speed: self.integrator.max_speed,
            adaptive: self.integrator.adaptive,
            force_reach,
        }
    }
}

// Cell counts and edges per axis. Non-periodic grids take ceil(extent / cell)
// cells; periodic grids take floor(extent / cell) uniform cells so wrapped
// neighbours stay adjacent. The edge grows until the total fits `max_cells`.
fn grid_layout(extent: Vec3, base_cell: f64, periodic: bool, max_cells: usize) -> ([u32; 3], [f64; 3]) {
    let largest = extent.x.max(extent.y).max(extent.z);
    let mut edge = if base_cell > 0.0 && base_cell.is_finite() { base_cell } else { largest };
    for _ in 0..64 {
        if !(edge > 0.0) || !edge.is_finite() {
            break;
        }
        let mut dims = [1u32; 3];
        let mut cell_size = [edge; 3];
        for axis in 0..3 {
            let cells = if periodic { (extent[axis] / edge).floor() } else { (extent[axis] / edge).ceil() };
            // NaN maps to one cell; huge axes saturate and are caught by the total below.
            dims[axis] = cells.max(1.0).min(u32::MAX as f64) as u32;
            if periodic {
                cell_size[axis] = extent[axis] / dims[axis] as f64;
            }
        }
        let total: u64 = dims.iter().map(|&d| d as u64).product();
        if total <= max_cells as u64 {
            return (dims, cell_size);
        }
        // Scale the edge by the cube root of the excess, with slack for per-axis rounding.
        edge *= (total as f64 / max_cells as f64).cbrt().max(1.0) * 1.01;
    }
    // Degenerate extents: one cell spanning the box.
    ([1; 3], [extent.x, extent.y, extent.z])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessConfig {
        let mut ligand = SpeciesConfig::new("ligand", BioType::Ligand, 1.0, 0.05);
        ligand.interaction_radius = 0.5;
        ProcessConfig::new(BoundsConfig::cube(4.0), vec![BlueprintEntry::new(ligand, 10, 1.0)], 20)
    }

    #[test]
    fn sample_config_is_valid() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_mass() {
        let mut config = sample();
        config.blueprint[0].species.mass = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveMass { .. })));
    }

    #[test]
    fn rejects_cell_size_below_interaction_radius() {
        let mut config = sample();
        config.spatial.cell_size = Some(0.25);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CellSizeTooSmall { cell_size: 0.25, required: 0.5 })
        );
    }

    #[test]
    fn rejects_negative_rates() {
        let mut config = sample();
        config.emission_rate = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeRate { field: "emission_rate", .. })));

        let mut config = sample();
        config.binding.scaling_factor = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeRate { .. })));
    }

    #[test]
    fn rejects_initial_population_above_cap() {
        let mut config = sample();
        config.population_cap = 5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InitialPopulationExceedsCap { initial: 10, cap: 5 })
        );
    }

    #[test]
    fn periodic_grid_uses_uniform_cells_no_smaller_than_requested() {
        let mut config = sample();
        config.bounds = BoundsConfig::cube(10.0);
        config.spatial.cell_size = Some(3.0);
        config.integrator.boundary = BoundaryPolicy::Periodic;
        let params = config.get_sim_params();
        assert_eq!(params.grid_dims, [3, 3, 3]);
        assert!(params.cell_size.iter().all(|&c| c >= 3.0));

        config.integrator.boundary = BoundaryPolicy::default();
        let params = config.get_sim_params();
        assert_eq!(params.grid_dims, [4, 4, 4]);
        assert_eq!(params.cell_size, [3.0; 3]);
    }

    #[test]
    fn tiny_interaction_radii_keep_the_grid_bounded() {
        let mut speck = SpeciesConfig::new("speck", BioType::Molecule, 1.0, 0.001);
        speck.interaction_radius = 0.001;
        let config = ProcessConfig::new(BoundsConfig::cube(10.0), vec![BlueprintEntry::new(speck, 4, 1.0)], 10);
        assert_eq!(config.validate(), Ok(()));

        let params = config.get_sim_params();
        let cells: u64 = params.grid_dims.iter().map(|&d| d as u64).product();
        assert_eq!(cells as usize, params.num_grid_cells);
        assert!(params.num_grid_cells <= config.spatial.max_cells);
        assert!(params.min_cell_size() >= 0.001);
        // The grid still covers the whole box.
        for axis in 0..3 {
            assert!(params.grid_dims[axis] as f64 * params.cell_size[axis] >= 10.0);
        }
    }

    #[test]
    fn cell_limit_applies_to_periodic_grids() {
        let mut config = sample();
        config.bounds = BoundsConfig::cube(100.0);
        config.spatial.cell_size = Some(0.5);
        config.spatial.max_cells = 1000;
        config.integrator.boundary = BoundaryPolicy::Periodic;
        let params = config.get_sim_params();
        assert!(params.num_grid_cells <= 1000);
        assert!(params.cell_size.iter().all(|&c| c >= 0.5));
        for axis in 0..3 {
            let covered = params.grid_dims[axis] as f64 * params.cell_size[axis];
            assert!((covered - 100.0).abs() < 1e-9);
        }

        config.spatial.max_cells = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidParameter { field: "spatial.max_cells", .. })));
    }

    #[test]
    fn rejects_adaptive_limits_below_the_base_substeps() {
        let mut config = sample();
        config.integrator.adaptive = Some(AdaptiveStepConfig { max_cfl: 0.25, max_substeps: 4 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { field: "integrator.adaptive.max_substeps", .. })
        ));
        config.integrator.adaptive = Some(AdaptiveStepConfig { max_cfl: 0.0, max_substeps: 16 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { field: "integrator.adaptive.max_cfl", .. })
        ));
        config.integrator.adaptive = Some(AdaptiveStepConfig::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn substeps_double_until_the_cfl_limit_holds() {
        let mut config = sample();
        config.integrator.substeps = 1;
        // Cell edge 0.5 (the interaction radius) and no pair force.
        let fixed = config.get_sim_params();
        assert_eq!(fixed.substeps_for(0.1, 9.0), 1);

        config.integrator.adaptive = Some(AdaptiveStepConfig { max_cfl: 0.25, max_substeps: 64 });
        let params = config.get_sim_params();
        assert_eq!(params.cfl_length(), 0.5);
        // 9 * 0.1 / n <= 0.125 first holds at n = 8.
        assert_eq!(params.substeps_for(0.1, 9.0), 8);
        assert_eq!(params.substeps_for(0.1, 0.5), 1);
        assert_eq!(params.substeps_for(0.1, 1e9), 64);
    }

    #[test]
    fn rejects_translocation_without_a_direction() {
        let mut config = sample();
        config.reactions.push(ReactionRule {
            initiator: BioType::Nutrient,
            acceptor: BioType::Transporter,
            effect: ReactionEffect::Translocation { axis: Axis::Z, plane: 2.0, offset: 0.0 },
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { field: "reactions.translocation", .. })
        ));
    }

    #[test]
    fn parses_process_from_toml() {
        let text = r#"
            kind = "receptor-binding"
            population_cap = 80
            emission_rate = 2.0

            [bounds]
            min = { x = 0.0, y = 0.0, z = 0.0 }
            max = { x = 4.0, y = 4.0, z = 4.0 }

            [forces]
            model = "composite"
            models = [{ model = "brownian" }, { model = "collision", restitution = 0.5 }]

            [binding.saturation]
            policy = "many-to-one"
            capacity = 3

            [[blueprint]]
            proportion = 1.0
            initial_count = 5
            [blueprint.species]
            name = "ligand"
            bio_type = "ligand"
            mass = 1.0
            radius = 0.05
            interaction_radius = 0.5
            half_life = 30.0

            [[reactions]]
            initiator = "ligand"
            acceptor = "receptor"
            effect = { kind = "activation" }
        "#;
        let config: ProcessConfig = toml::from_str(text).expect("parse");
        assert_eq!(config.kind, ProcessKind::ReceptorBinding);
        assert_eq!(config.binding.saturation, SaturationPolicy::ManyToOne { capacity: 3 });
        assert_eq!(config.binding.scaling_factor, 0.1);
        assert_eq!(config.integrator.substeps, 8);
        assert_eq!(config.blueprint[0].species.max_age(), 60.0);
        assert_eq!(config.reactions[0].effect, ReactionEffect::Activation);
        assert!(matches!(config.forces, ForceModelConfig::Composite { ref models } if models.len() == 2));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn screening_length_follows_ionic_strength() {
        let e = ElectrostaticConfig::default();
        let base = e.screening_length(ElectrostaticConfig::REFERENCE_TEMPERATURE, 0.15);
        let salty = e.screening_length(ElectrostaticConfig::REFERENCE_TEMPERATURE, 0.6);
        assert!((base - 1.0).abs() < 1e-12);
        assert!((salty - 0.5).abs() < 1e-12);
        let fixed = ElectrostaticConfig { debye_length: Some(2.0), ..e };
        assert_eq!(fixed.screening_length(100.0, 1.0), 2.0);
    }
}
