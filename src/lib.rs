//! Particle-based biological physics engine.
//!
//! A [`ParticleSystem`] owns one simulated process: particles in a bounded
//! box advanced by pluggable force models, a semi-implicit Euler
//! integrator and a probabilistic binding/reaction layer. A
//! [`SimulationManager`] runs several independent systems built from the
//! [`ProcessCatalog`].

pub mod arena;
pub mod binding;
pub mod catalog;
pub mod environment;
pub mod forces;
pub mod grid;
pub mod hooks;
pub mod integrator;
pub mod manager;
pub mod particle;
pub mod runner;
pub mod system;

pub use arena::ParticleArena;
pub use binding::{Bond, BondGraph, BindingResolver, EventLog};
pub use catalog::ProcessCatalog;
pub use environment::{Environment, FlowField};
pub use forces::{ForceBuffer, ForceContext, ForceModel};
pub use grid::SpatialIndex;
pub use hooks::ProcessHook;
pub use integrator::{Domain, Integrator};
pub use manager::{ManagerError, SimulationManager};
pub use particle::{Capabilities, Fate, Particle, ParticleState};
pub use runner::{FinalPosition, Runner};
pub use system::ParticleSystem;
