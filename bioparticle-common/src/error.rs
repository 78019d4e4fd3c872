use crate::vecmath::Vec3;
use thiserror::Error;

/// Rejected process configuration. Raised once, at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("species '{species}': mass must be positive and finite, got {mass}")]
    NonPositiveMass { species: String, mass: f64 },

    #[error("species '{species}': {field} must be non-negative and finite, got {value}")]
    NegativeParameter { species: String, field: &'static str, value: f64 },

    #[error("species '{species}': damping must lie in (0, 1], got {damping}")]
    InvalidDamping { species: String, damping: f64 },

    #[error("species '{species}': half-life must be positive, got {half_life}")]
    InvalidHalfLife { species: String, half_life: f64 },

    #[error("{field} must be non-negative and finite, got {value}")]
    NegativeRate { field: &'static str, value: f64 },

    #[error("cell size {cell_size} is smaller than the largest interaction reach {required}")]
    CellSizeTooSmall { cell_size: f64, required: f64 },

    #[error("bounds are empty or non-finite (min {min:?}, max {max:?})")]
    InvalidBounds { min: Vec3, max: Vec3 },

    #[error("population blueprint has no species")]
    EmptyBlueprint,

    #[error("population cap must be positive")]
    ZeroPopulationCap,

    #[error("initial population {initial} exceeds the population cap {cap}")]
    InitialPopulationExceedsCap { initial: usize, cap: usize },

    #[error("emission rate is positive but no species has a positive proportion")]
    NoEmittableSpecies,

    #[error("{model} model: {reason}")]
    InvalidModel { model: &'static str, reason: String },

    #[error("{field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn model(model: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidModel { model, reason: reason.into() }
    }

    pub(crate) fn parameter(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter { field, reason: reason.into() }
    }
}
