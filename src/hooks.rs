//! Per-tick process behaviours that go beyond forces and binding rules.

use crate::environment::FlowField;
use crate::system::ParticleSystem;
use bioparticle_common::{Axis, BioType, FlowPreset, HookConfig, ParticleId, ReactionKind, Vec3};
use log::debug;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Runs after binding and before culling on every tick.
pub trait ProcessHook: Send {
    fn name(&self) -> &'static str;
    fn on_tick(&mut self, system: &mut ParticleSystem, dt: f64);
}

pub fn build(config: &HookConfig) -> Box<dyn ProcessHook> {
    match *config {
        HookConfig::PulsatileFlow { base_speed, amplitude, frequency, axis } => {
            Box::new(PulsatileFlow { base_speed, amplitude, frequency, axis })
        }
        HookConfig::OscillatingField { amplitude, frequency, axis } => {
            Box::new(OscillatingField { amplitude, frequency, axis })
        }
        HookConfig::ConcentrationGradient { target, speed } => Box::new(ConcentrationGradient { target, speed }),
        HookConfig::Chemotaxis { hunter, prey, gain, sensing_radius } => {
            Box::new(Chemotaxis { hunter, prey, gain, sensing_radius })
        }
        HookConfig::SignalCascade { site, trigger, radius } => Box::new(SignalCascade::new(site, trigger, radius)),
        HookConfig::PolymeraseTrack { speed, axis, capture_radius, spacing } => {
            Box::new(PolymeraseTrack::new(speed, axis, capture_radius, spacing))
        }
    }
}

fn wave(frequency: f64, time: f64) -> f64 {
    (2.0 * PI * frequency * time).sin()
}

/// Heartbeat-like uniform flow.
#[derive(Debug, Clone)]
pub struct PulsatileFlow {
    pub base_speed: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub axis: Axis,
}

impl ProcessHook for PulsatileFlow {
    fn name(&self) -> &'static str {
        "pulsatile-flow"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, _dt: f64) {
        let speed = self.base_speed + self.amplitude * wave(self.frequency, system.time());
        let velocity = self.axis.unit() * speed;
        system.environment_mut().flow = Some(FlowField::Preset(FlowPreset::Uniform { velocity }));
    }
}

/// Alternating electric field, e.g. a depolarisation wave.
#[derive(Debug, Clone)]
pub struct OscillatingField {
    pub amplitude: f64,
    pub frequency: f64,
    pub axis: Axis,
}

impl ProcessHook for OscillatingField {
    fn name(&self) -> &'static str {
        "oscillating-field"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, _dt: f64) {
        let strength = self.amplitude * wave(self.frequency, system.time());
        system.environment_mut().electric_field = Some(self.axis.unit() * strength);
    }
}

/// Flow converging on the centroid of all `target` particles; cleared while
/// none exist.
#[derive(Debug, Clone)]
pub struct ConcentrationGradient {
    pub target: BioType,
    pub speed: f64,
}

impl ProcessHook for ConcentrationGradient {
    fn name(&self) -> &'static str {
        "concentration-gradient"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, _dt: f64) {
        let (sum, count) = system
            .particles()
            .filter(|p| p.bio_type() == self.target)
            .fold((Vec3::ZERO, 0usize), |(s, n), p| (s + p.position, n + 1));
        system.environment_mut().flow = if count > 0 {
            let target = sum / count as f64;
            Some(FlowField::Preset(FlowPreset::Converge { target, speed: self.speed }))
        } else {
            None
        };
    }
}

/// Hunters accelerate toward the nearest prey they can sense.
#[derive(Debug, Clone)]
pub struct Chemotaxis {
    pub hunter: BioType,
    pub prey: BioType,
    pub gain: f64,
    pub sensing_radius: f64,
}

impl ProcessHook for Chemotaxis {
    fn name(&self) -> &'static str {
        "chemotaxis"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, dt: f64) {
        let prey: Vec<Vec3> = system.particles().filter(|p| p.bio_type() == self.prey).map(|p| p.position).collect();
        if prey.is_empty() {
            return;
        }
        let domain = *system.domain();
        let steering: Vec<(ParticleId, Vec3)> = system
            .particles()
            .filter(|p| p.bio_type() == self.hunter && !p.anchored)
            .filter_map(|h| {
                prey.iter()
                    .map(|&q| domain.separation(h.position, q))
                    .filter(|d| d.length() <= self.sensing_radius)
                    .min_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
                    .map(|d| (h.id, d.normalize_or_zero()))
            })
            .collect();
        for (id, direction) in steering {
            if let Some(h) = system.particle_mut(id) {
                h.velocity += direction * (self.gain * dt);
            }
        }
    }
}

// Seconds for a fully activated site to relax.
const CASCADE_RELAXATION: f64 = 2.0;

/// Chain of reaction sites (in creation order). A trigger near site k
/// activates site k; an active site k in turn lets a trigger near it
/// activate site k + 1. Activation relaxes over time.
#[derive(Debug, Clone)]
pub struct SignalCascade {
    site: BioType,
    trigger: BioType,
    radius: f64,
}

impl SignalCascade {
    pub fn new(site: BioType, trigger: BioType, radius: f64) -> Self {
        SignalCascade { site, trigger, radius }
    }
}

impl ProcessHook for SignalCascade {
    fn name(&self) -> &'static str {
        "signal-cascade"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, dt: f64) {
        let sites: Vec<(ParticleId, Vec3, f64)> = system
            .particles()
            .filter(|p| p.bio_type() == self.site)
            .map(|p| (p.id, p.position, p.activation))
            .collect();
        let triggers: Vec<(ParticleId, Vec3)> = system
            .particles()
            .filter(|p| p.bio_type() == self.trigger)
            .map(|p| (p.id, p.position))
            .collect();
        let domain = *system.domain();

        for &(id, _, _) in &sites {
            if let Some(p) = system.particle_mut(id) {
                p.activation = (p.activation - dt / CASCADE_RELAXATION).max(0.0);
            }
        }

        for (k, &(site_id, position, activation)) in sites.iter().enumerate() {
            // Upstream site must be live for the signal to pass on.
            let upstream_ready = k == 0 || system.particle(sites[k - 1].0).is_some_and(|p| p.activation > 0.5);
            if !upstream_ready {
                continue;
            }
            let Some(&(trigger_id, _)) = triggers
                .iter()
                .find(|(_, t)| domain.separation(position, *t).length() <= self.radius)
            else {
                continue;
            };
            if let Some(p) = system.particle_mut(site_id) {
                p.activation = 1.0;
            }
            if activation <= 0.5 {
                debug!("Cascade site {} activated by {}.", site_id, trigger_id);
                system.record_event(ReactionKind::Cascade, trigger_id, site_id);
            }
        }
    }
}

/// Polymerases walk along an axis; free nucleotides they pass are
/// incorporated into a strand trailing behind them.
#[derive(Debug, Clone)]
pub struct PolymeraseTrack {
    speed: f64,
    axis: Axis,
    capture_radius: f64,
    spacing: f64,
    // Last incorporated nucleotide per polymerase.
    tails: BTreeMap<ParticleId, ParticleId>,
}

impl PolymeraseTrack {
    pub fn new(speed: f64, axis: Axis, capture_radius: f64, spacing: f64) -> Self {
        PolymeraseTrack { speed, axis, capture_radius, spacing, tails: BTreeMap::new() }
    }

    pub fn strand_tail(&self, polymerase: ParticleId) -> Option<ParticleId> {
        self.tails.get(&polymerase).copied()
    }
}

impl ProcessHook for PolymeraseTrack {
    fn name(&self) -> &'static str {
        "polymerase-track"
    }

    fn on_tick(&mut self, system: &mut ParticleSystem, _dt: f64) {
        let unit = self.axis.unit();
        let polymerases: Vec<ParticleId> = system.particles_of_type(BioType::Polymerase);
        self.tails.retain(|p, _| system.particle(*p).is_some_and(|p| p.is_active()));

        for pol in polymerases {
            let Some(position) = system.particle_mut(pol).map(|p| {
                p.velocity = unit * self.speed;
                p.position
            }) else {
                continue;
            };

            let captured: Vec<ParticleId> = system
                .particles()
                .filter(|n| n.bio_type() == BioType::Nucleotide && !n.anchored)
                .filter(|n| system.domain().separation(position, n.position).length() <= self.capture_radius)
                .map(|n| n.id)
                .collect();

            for nucleotide in captured {
                if system.bonds().degree(nucleotide) > 0 {
                    continue;
                }
                let anchor = self.tails.get(&pol).copied().unwrap_or(pol);
                if !system.bind_pair(nucleotide, anchor, ReactionKind::Incorporation) {
                    continue;
                }
                if let Some(n) = system.particle_mut(nucleotide) {
                    n.anchored = true;
                    n.velocity = Vec3::ZERO;
                    n.position = position - unit * self.spacing;
                }
                self.tails.insert(pol, nucleotide);
            }
        }
    }
}
