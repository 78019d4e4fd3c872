use bioparticle_common::{EnvironmentConfig, FlowPreset, Vec3};
use std::fmt;
use std::sync::Arc;

/// Host-supplied flow, position → velocity.
pub type FlowFn = Arc<dyn Fn(Vec3) -> Vec3 + Send + Sync>;

/// Background flow a particle is carried along by.
#[derive(Clone)]
pub enum FlowField {
    Preset(FlowPreset),
    Custom(FlowFn),
}

impl FlowField {
    pub fn custom(f: impl Fn(Vec3) -> Vec3 + Send + Sync + 'static) -> Self {
        FlowField::Custom(Arc::new(f))
    }

    pub fn velocity_at(&self, p: Vec3) -> Vec3 {
        match self {
            FlowField::Preset(FlowPreset::Uniform { velocity }) => *velocity,
            FlowField::Preset(FlowPreset::Pulsatile { base, amplitude, wavenumber }) => {
                *base + *amplitude * (p.y * wavenumber).sin()
            }
            FlowField::Preset(FlowPreset::Interstitial { amplitude, wavenumber }) => Vec3::new(
                (p.z * wavenumber).sin() * amplitude,
                (p.x * wavenumber).cos() * amplitude,
                0.0,
            ),
            FlowField::Preset(FlowPreset::Converge { target, speed }) => (*target - p).normalize_or_zero() * *speed,
            FlowField::Custom(f) => f(p),
        }
    }
}

impl fmt::Debug for FlowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowField::Preset(preset) => f.debug_tuple("Preset").field(preset).finish(),
            FlowField::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Medium the particles live in. Read during a tick; hooks and hosts may
/// change it between ticks.
#[derive(Debug, Clone)]
pub struct Environment {
    pub temperature: f64,
    pub viscosity: f64,
    pub ionic_strength: f64,
    pub electric_field: Option<Vec3>,
    pub gravity: Option<Vec3>,
    pub flow: Option<FlowField>,
}

impl Environment {
    pub fn flow_at(&self, p: Vec3) -> Vec3 {
        self.flow.as_ref().map_or(Vec3::ZERO, |f| f.velocity_at(p))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::from(&EnvironmentConfig::default())
    }
}

impl From<&EnvironmentConfig> for Environment {
    fn from(config: &EnvironmentConfig) -> Self {
        Environment {
            temperature: config.temperature,
            viscosity: config.viscosity,
            ionic_strength: config.ionic_strength,
            electric_field: config.electric_field,
            gravity: config.gravity,
            flow: config.flow.clone().map(FlowField::Preset),
        }
    }
}
