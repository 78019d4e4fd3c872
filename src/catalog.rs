//! Named process definitions.
//!
//! Units are illustrative (lengths ~ particle radii, masses ~ 1); each entry
//! is tuned to look and behave plausibly at 60 ticks per second.

use bioparticle_common::{
    Axis, BindingConfig, BioType, BlueprintEntry, BoundaryPolicy, BoundsConfig, BrownianConfig, CollisionConfig,
    ConfigError, ElectrostaticConfig, EnvironmentConfig, FlowPreset, ForceModelConfig, HookConfig, IntegratorConfig,
    Participant, Placement, ProcessConfig, ProcessKind, ReactionEffect, ReactionRule, SaturationPolicy, SpeciesConfig,
    SphConfig, Vec3,
};
use log::debug;
use std::collections::BTreeMap;

/// Registry of process definitions by name.
#[derive(Debug, Clone, Default)]
pub struct ProcessCatalog {
    processes: BTreeMap<String, ProcessConfig>,
}

impl ProcessCatalog {
    pub fn empty() -> Self {
        ProcessCatalog::default()
    }

    /// Every built-in process.
    pub fn builtin() -> Self {
        let mut processes = BTreeMap::new();
        for (name, config) in [
            ("blood-flow", blood_flow()),
            ("neural-signals", neural_signals()),
            ("hormone-diffusion", hormone_diffusion()),
            ("immune-response", immune_response()),
            ("atp-synthesis", atp_synthesis()),
            ("ion-transport", ion_transport()),
            ("receptor-binding", receptor_binding()),
            ("enzyme-catalysis", enzyme_catalysis()),
            ("membrane-transport", membrane_transport()),
            ("dna-transcription", dna_transcription()),
            ("signal-transduction", signal_transduction()),
            ("sph-droplet", sph_droplet()),
            ("ionic-solution", ionic_solution()),
        ] {
            processes.insert(name.to_string(), config);
        }
        ProcessCatalog { processes }
    }

    /// Adds or replaces a definition after validating it. Returns the
    /// definition it replaced.
    pub fn register(&mut self, name: impl Into<String>, config: ProcessConfig) -> Result<Option<ProcessConfig>, ConfigError> {
        config.validate()?;
        let name = name.into();
        debug!("Registering process '{}'.", name);
        Ok(self.processes.insert(name, config))
    }

    pub fn get(&self, name: &str) -> Option<&ProcessConfig> {
        self.processes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.processes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

fn species(name: &str, bio_type: BioType, mass: f64, radius: f64, color: u32) -> SpeciesConfig {
    let mut s = SpeciesConfig::new(name, bio_type, mass, radius);
    s.visual.color = rgb(color);
    s.visual.size = (radius * 2.0) as f32;
    s
}

fn anchored(mut s: SpeciesConfig) -> SpeciesConfig {
    s.anchored = true;
    s.damping = 1.0;
    s
}

fn brownian_and_collision() -> ForceModelConfig {
    ForceModelConfig::Composite {
        models: vec![
            ForceModelConfig::Brownian(BrownianConfig::default()),
            ForceModelConfig::Collision(CollisionConfig::default()),
        ],
    }
}

fn plane(axis: Axis, offset: f64) -> Placement {
    Placement::Plane { axis, offset }
}

fn region(min: Vec3, max: Vec3) -> Placement {
    Placement::Uniform { region: Some(BoundsConfig::new(min, max)) }
}

// ---------------------------------------------------------------------------
// Circulation & signalling
// ---------------------------------------------------------------------------

fn blood_flow() -> ProcessConfig {
    let mut rbc = species("red-blood-cell", BioType::BloodCell, 1.0, 0.35, 0xdc2626);
    rbc.interaction_radius = 0.5;
    rbc.damping = 0.99;

    let mut wbc = species("white-blood-cell", BioType::ImmuneCell, 2.0, 0.5, 0xf8fafc);
    wbc.damping = 0.97;

    let mut oxygen = species("oxygen", BioType::GasMolecule, 0.05, 0.08, 0x60a5fa);
    oxygen.diffusion = 0.3;
    oxygen.interaction_radius = 0.7;
    oxygen.binding_strength = 0.8;
    oxygen.half_life = Some(20.0);

    let mut config = ProcessConfig::new(
        BoundsConfig::new(Vec3::ZERO, Vec3::new(20.0, 8.0, 8.0)),
        vec![
            BlueprintEntry::new(rbc, 120, 0.0).with_initial_speed(0.2),
            BlueprintEntry::new(wbc, 12, 0.0).with_initial_speed(0.1),
            BlueprintEntry::new(oxygen, 60, 1.0).with_placement(plane(Axis::X, 0.5)),
        ],
        500,
    );
    config.kind = ProcessKind::BloodFlow;
    config.description = "Red cells carry oxygen along a vessel under pulsatile flow.".into();
    config.emission_rate = 6.0;
    config.environment.viscosity = 0.02;
    config.forces = brownian_and_collision();
    config.integrator.boundary = BoundaryPolicy::Periodic;
    // Haemoglobin carries four oxygen molecules.
    config.binding.saturation = SaturationPolicy::ManyToOne { capacity: 4 };
    config.binding.progress_rate = 0.5;
    config.hook = Some(HookConfig::PulsatileFlow { base_speed: 1.5, amplitude: 1.0, frequency: 1.2, axis: Axis::X });
    config
}

fn neural_signals() -> ProcessConfig {
    let mut dopamine = species("dopamine", BioType::Neurotransmitter, 0.2, 0.1, 0x8b5cf6);
    dopamine.charge = 1.0;
    dopamine.diffusion = 0.4;
    dopamine.interaction_radius = 0.8;
    dopamine.binding_strength = 0.9;
    dopamine.half_life = Some(3.0);

    let mut receptor = anchored(species("d2-receptor", BioType::Receptor, 5.0, 0.25, 0xef4444));
    receptor.charge = -1.0;
    receptor.interaction_radius = 0.8;

    let mut config = ProcessConfig::new(
        BoundsConfig::new(Vec3::ZERO, Vec3::new(12.0, 6.0, 12.0)),
        vec![
            BlueprintEntry::new(dopamine, 70, 1.0).with_placement(plane(Axis::Y, 5.5)).with_initial_speed(0.3),
            BlueprintEntry::new(receptor, 30, 0.0).with_placement(plane(Axis::Y, 0.5)),
        ],
        400,
    );
    config.kind = ProcessKind::NeuralSignals;
    config.description = "Neurotransmitter release across a synaptic cleft onto postsynaptic receptors.".into();
    config.emission_rate = 20.0;
    config.environment.electric_field = Some(Vec3::new(0.0, -0.5, 0.0));
    config.forces = brownian_and_collision();
    config.binding = BindingConfig { unbinding_rate: 0.5, progress_rate: 1.0, ..Default::default() };
    config.reactions = vec![ReactionRule {
        initiator: BioType::Neurotransmitter,
        acceptor: BioType::Receptor,
        effect: ReactionEffect::Activation,
    }];
    config.hook = Some(HookConfig::OscillatingField { amplitude: 1.5, frequency: 0.5, axis: Axis::Y });
    config
}

fn hormone_diffusion() -> ProcessConfig {
    let mut insulin = species("insulin", BioType::Hormone, 0.5, 0.12, 0x10b981);
    insulin.diffusion = 0.4;
    insulin.interaction_radius = 1.0;
    insulin.binding_strength = 0.8;
    insulin.half_life = Some(30.0);

    let mut receptor = anchored(species("insulin-receptor", BioType::Receptor, 5.0, 0.3, 0x8b5cf6));
    receptor.interaction_radius = 1.0;

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(16.0),
        vec![
            BlueprintEntry::new(insulin, 80, 1.0)
                .with_placement(region(Vec3::ZERO, Vec3::splat(4.0)))
                .with_initial_speed(0.2),
            BlueprintEntry::new(receptor, 20, 0.0).with_placement(region(Vec3::splat(10.0), Vec3::splat(16.0))),
        ],
        400,
    );
    config.kind = ProcessKind::HormoneDiffusion;
    config.description = "Insulin released in one corner diffuses toward distant target receptors.".into();
    config.emission_rate = 4.0;
    config.environment.flow = Some(FlowPreset::Interstitial { amplitude: 0.1, wavenumber: 0.5 });
    config.forces = brownian_and_collision();
    config.binding.unbinding_rate = 0.1;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Hormone,
        acceptor: BioType::Receptor,
        effect: ReactionEffect::Activation,
    }];
    config.hook = Some(HookConfig::ConcentrationGradient { target: BioType::Receptor, speed: 0.3 });
    config
}

fn immune_response() -> ProcessConfig {
    let mut macrophage = species("macrophage", BioType::ImmuneCell, 3.0, 0.45, 0xf8fafc);
    macrophage.interaction_radius = 1.0;
    macrophage.binding_strength = 1.0;
    macrophage.damping = 0.96;

    let mut bacterium = species("bacterium", BioType::Pathogen, 0.5, 0.2, 0x7c2d12);
    bacterium.charge = -1.0;
    bacterium.diffusion = 0.2;
    bacterium.half_life = Some(60.0);
    bacterium.damping = 0.95;

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(15.0),
        vec![
            BlueprintEntry::new(macrophage, 40, 0.0).with_initial_speed(0.2),
            BlueprintEntry::new(bacterium, 30, 1.0).with_initial_speed(0.3),
        ],
        300,
    );
    config.kind = ProcessKind::ImmuneResponse;
    config.description = "Macrophages hunt and engulf bacteria.".into();
    config.emission_rate = 2.0;
    config.forces = brownian_and_collision();
    config.binding.scaling_factor = 0.5;
    config.reactions = vec![ReactionRule {
        initiator: BioType::ImmuneCell,
        acceptor: BioType::Pathogen,
        effect: ReactionEffect::Consumption { target: Participant::Acceptor },
    }];
    config.hook = Some(HookConfig::Chemotaxis {
        hunter: BioType::ImmuneCell,
        prey: BioType::Pathogen,
        gain: 3.0,
        sensing_radius: 6.0,
    });
    config
}

// ---------------------------------------------------------------------------
// Metabolism & transport
// ---------------------------------------------------------------------------

fn atp_synthesis() -> ProcessConfig {
    let mut adp = species("adp", BioType::Molecule, 0.2, 0.1, 0xf59e0b);
    adp.charge = -1.0;
    adp.diffusion = 0.3;
    adp.interaction_radius = 0.9;
    adp.binding_strength = 0.6;
    adp.half_life = Some(60.0);

    let mut synthase = anchored(species("atp-synthase", BioType::Enzyme, 10.0, 0.4, 0x059669));
    synthase.interaction_radius = 0.9;

    let mut proton = species("proton", BioType::Ion, 0.05, 0.05, 0xfde047);
    proton.charge = 1.0;
    proton.diffusion = 0.5;
    proton.interaction_radius = 0.9;
    proton.half_life = Some(20.0);

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(adp, 80, 1.0).with_initial_speed(0.2),
            BlueprintEntry::new(synthase, 10, 0.0).with_placement(plane(Axis::Z, 5.0)),
            BlueprintEntry::new(proton, 50, 1.0).with_placement(region(Vec3::ZERO, Vec3::new(10.0, 10.0, 4.5))),
        ],
        500,
    );
    config.kind = ProcessKind::AtpSynthesis;
    config.description = "ATP synthase in the inner membrane phosphorylates ADP driven by a proton gradient.".into();
    config.emission_rate = 4.0;
    config.environment.electric_field = Some(Vec3::new(0.0, 0.0, 0.4));
    config.forces = ForceModelConfig::Composite {
        models: vec![
            ForceModelConfig::Brownian(BrownianConfig::default()),
            ForceModelConfig::Electrostatic(ElectrostaticConfig { debye_length: Some(1.0), softening: 0.1, ..Default::default() }),
            ForceModelConfig::Collision(CollisionConfig::default()),
        ],
    };
    config.binding.saturation = SaturationPolicy::ManyToOne { capacity: 3 };
    config.binding.scaling_factor = 0.3;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Molecule,
        acceptor: BioType::Enzyme,
        effect: ReactionEffect::Catalysis { product: BioType::Product },
    }];
    config
}

fn ion_transport() -> ProcessConfig {
    let ion = |name: &str, charge: f64, color: u32| {
        let mut s = species(name, BioType::Ion, 0.1, 0.08, color);
        s.charge = charge;
        s.diffusion = 0.4;
        s.interaction_radius = 1.0;
        s.binding_strength = 0.7;
        s
    };
    let mut channel = anchored(species("voltage-gated-channel", BioType::IonChannel, 10.0, 0.3, 0x10b981));
    channel.interaction_radius = 1.0;

    let below = region(Vec3::ZERO, Vec3::new(10.0, 10.0, 4.5));
    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(ion("sodium", 1.0, 0xfacc15), 60, 0.5).with_placement(below.clone()),
            BlueprintEntry::new(ion("potassium", 1.0, 0xa855f7), 40, 0.3).with_placement(below.clone()),
            BlueprintEntry::new(ion("chloride", -1.0, 0x22c55e), 40, 0.2).with_placement(below),
            BlueprintEntry::new(channel, 12, 0.0).with_placement(plane(Axis::Z, 5.0)),
        ],
        400,
    );
    config.kind = ProcessKind::IonTransport;
    config.description = "Ions cross a membrane through voltage-gated channels.".into();
    config.emission_rate = 3.0;
    config.environment.electric_field = Some(Vec3::new(0.0, 0.0, 0.3));
    config.forces = ForceModelConfig::Composite {
        models: vec![
            ForceModelConfig::Brownian(BrownianConfig::default()),
            ForceModelConfig::Electrostatic(ElectrostaticConfig { softening: 0.1, ..Default::default() }),
            ForceModelConfig::Collision(CollisionConfig::default()),
        ],
    };
    config.binding.scaling_factor = 0.4;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Ion,
        acceptor: BioType::IonChannel,
        effect: ReactionEffect::Translocation { axis: Axis::Z, plane: 5.0, offset: 0.6 },
    }];
    config
}

fn receptor_binding() -> ProcessConfig {
    let mut ligand = species("ligand", BioType::Ligand, 0.3, 0.1, 0xf97316);
    ligand.diffusion = 0.5;
    ligand.interaction_radius = 1.0;
    ligand.binding_strength = 1.0;

    let mut receptor = anchored(species("receptor", BioType::Receptor, 5.0, 0.3, 0x3b82f6));
    receptor.interaction_radius = 1.0;

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(8.0),
        vec![
            BlueprintEntry::new(ligand, 60, 1.0).with_initial_speed(0.3),
            BlueprintEntry::new(receptor, 12, 0.0).with_placement(plane(Axis::Y, 0.5)),
        ],
        200,
    );
    config.kind = ProcessKind::ReceptorBinding;
    config.description = "Ligands find and occupy membrane receptors one-to-one.".into();
    config.forces = brownian_and_collision();
    config.binding.unbinding_rate = 0.2;
    config.binding.progress_rate = 0.5;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Ligand,
        acceptor: BioType::Receptor,
        effect: ReactionEffect::Activation,
    }];
    config
}

fn enzyme_catalysis() -> ProcessConfig {
    let mut enzyme = species("hexokinase", BioType::Enzyme, 5.0, 0.5, 0x059669);
    enzyme.diffusion = 0.02;
    enzyme.interaction_radius = 1.0;

    let mut substrate = species("glucose", BioType::Substrate, 0.3, 0.12, 0xfbbf24);
    substrate.diffusion = 0.4;
    substrate.interaction_radius = 0.8;
    substrate.binding_strength = 1.0;
    substrate.half_life = Some(30.0);

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(enzyme, 8, 0.0),
            BlueprintEntry::new(substrate, 80, 1.0).with_initial_speed(0.2),
        ],
        300,
    );
    config.kind = ProcessKind::EnzymeCatalysis;
    config.description = "Enzymes turn substrate into product and are released to catalyse again.".into();
    config.emission_rate = 5.0;
    config.forces = brownian_and_collision();
    config.binding.scaling_factor = 0.4;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Substrate,
        acceptor: BioType::Enzyme,
        effect: ReactionEffect::Catalysis { product: BioType::Product },
    }];
    config
}

fn membrane_transport() -> ProcessConfig {
    let mut nutrient = species("glucose", BioType::Nutrient, 0.3, 0.12, 0xfbbf24);
    nutrient.diffusion = 0.4;
    nutrient.interaction_radius = 0.9;
    nutrient.binding_strength = 0.8;

    let mut transporter = anchored(species("glut4", BioType::Transporter, 8.0, 0.35, 0x8b5cf6));
    transporter.interaction_radius = 0.9;

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(nutrient, 80, 1.0)
                .with_placement(region(Vec3::ZERO, Vec3::new(10.0, 10.0, 4.0)))
                .with_initial_speed(0.2),
            BlueprintEntry::new(transporter, 15, 0.0).with_placement(plane(Axis::Z, 5.0)),
        ],
        300,
    );
    config.kind = ProcessKind::MembraneTransport;
    config.description = "Carrier proteins move nutrients across a membrane.".into();
    config.emission_rate = 2.0;
    config.forces = brownian_and_collision();
    config.binding.scaling_factor = 0.3;
    config.reactions = vec![ReactionRule {
        initiator: BioType::Nutrient,
        acceptor: BioType::Transporter,
        effect: ReactionEffect::Translocation { axis: Axis::Z, plane: 5.0, offset: 0.6 },
    }];
    config
}

// ---------------------------------------------------------------------------
// Molecular machinery
// ---------------------------------------------------------------------------

fn dna_transcription() -> ProcessConfig {
    let template = anchored(species("dna-base", BioType::Molecule, 1.0, 0.15, 0x2563eb));

    let mut polymerase = species("rna-polymerase", BioType::Polymerase, 20.0, 0.5, 0xdc2626);
    polymerase.damping = 1.0;

    let mut nucleotide = species("ntp", BioType::Nucleotide, 0.1, 0.08, 0xf97316);
    nucleotide.diffusion = 0.3;

    let start = Vec3::new(1.0, 4.0, 4.0);
    let end = Vec3::new(15.0, 4.0, 4.0);
    let mut config = ProcessConfig::new(
        BoundsConfig::new(Vec3::ZERO, Vec3::new(16.0, 8.0, 8.0)),
        vec![
            BlueprintEntry::new(template, 40, 0.0).with_placement(Placement::Line { start, end }),
            BlueprintEntry::new(polymerase, 1, 0.0).with_placement(Placement::Line { start, end: start }),
            BlueprintEntry::new(nucleotide, 150, 1.0).with_initial_speed(0.2),
        ],
        500,
    );
    config.kind = ProcessKind::DnaTranscription;
    config.description = "RNA polymerase walks a DNA template and strings nucleotides into a transcript.".into();
    config.emission_rate = 5.0;
    config.environment.flow = Some(FlowPreset::Converge { target: Vec3::new(8.0, 4.0, 4.0), speed: 0.15 });
    config.forces = ForceModelConfig::Brownian(BrownianConfig::default());
    // Incorporation is driven by the polymerase track, not stochastic binding.
    config.binding.enabled = false;
    config.hook = Some(HookConfig::PolymeraseTrack { speed: 0.4, axis: Axis::X, capture_radius: 0.6, spacing: 0.3 });
    config
}

fn signal_transduction() -> ProcessConfig {
    let mut site = anchored(species("kinase", BioType::RegulatoryProtein, 5.0, 0.3, 0xf59e0b));
    site.interaction_radius = 0.8;

    let mut signal = species("camp", BioType::SignalMolecule, 0.1, 0.08, 0x8b5cf6);
    signal.diffusion = 0.6;
    signal.half_life = Some(10.0);

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(site, 6, 0.0).with_placement(Placement::Line {
                start: Vec3::new(2.0, 5.0, 5.0),
                end: Vec3::new(8.0, 5.0, 5.0),
            }),
            BlueprintEntry::new(signal, 40, 1.0)
                .with_placement(region(Vec3::new(0.0, 3.0, 3.0), Vec3::new(3.0, 7.0, 7.0)))
                .with_initial_speed(0.2),
        ],
        300,
    );
    config.kind = ProcessKind::SignalTransduction;
    config.description = "A second messenger relays activation down a kinase cascade.".into();
    config.emission_rate = 4.0;
    config.environment.flow = Some(FlowPreset::Uniform { velocity: Vec3::new(0.2, 0.0, 0.0) });
    config.forces = ForceModelConfig::Brownian(BrownianConfig::default());
    config.hook = Some(HookConfig::SignalCascade {
        site: BioType::RegulatoryProtein,
        trigger: BioType::SignalMolecule,
        radius: 0.8,
    });
    config
}

// ---------------------------------------------------------------------------
// Physics showcases
// ---------------------------------------------------------------------------

/// 200 fluid particles released as a compressed block near the top of a
/// narrow column.
fn sph_droplet() -> ProcessConfig {
    let mut water = species("water", BioType::Fluid, 1.0, 0.1, 0x38bdf8);
    water.damping = 0.995;

    let mut config = ProcessConfig::new(
        BoundsConfig::new(Vec3::ZERO, Vec3::new(3.0, 10.0, 3.0)),
        vec![BlueprintEntry::new(water, 200, 0.0).with_placement(Placement::Lattice {
            center: Vec3::new(1.5, 6.0, 1.5),
            spacing: 0.35,
        })],
        200,
    );
    config.kind = ProcessKind::SphFluid;
    config.description = "A dense water droplet collapses under gravity and relaxes to rest density.".into();
    config.environment = EnvironmentConfig { gravity: Some(Vec3::new(0.0, -9.8, 0.0)), ..Default::default() };
    config.forces = ForceModelConfig::Sph(SphConfig {
        smoothing_length: 1.0,
        rest_density: 6.0,
        gas_constant: 300.0,
        viscosity: 0.5,
        surface_tension: 0.0,
    });
    config.integrator = IntegratorConfig {
        substeps: 8,
        max_speed: 20.0,
        boundary: BoundaryPolicy::Reflective { restitution: 0.3 },
        adaptive: None,
    };
    config.binding.enabled = false;
    config
}

/// 100 cations and 100 anions in a 10 x 10 x 10 box under screened Coulomb
/// forces only.
fn ionic_solution() -> ProcessConfig {
    let ion = |name: &str, charge: f64, color: u32| {
        let mut s = species(name, BioType::Ion, 1.0, 0.1, color);
        s.charge = charge;
        s.interaction_radius = 3.0;
        s.damping = 0.98;
        s
    };
    let mut config = ProcessConfig::new(
        BoundsConfig::cube(10.0),
        vec![
            BlueprintEntry::new(ion("cation", 1.0, 0xef4444), 100, 0.0),
            BlueprintEntry::new(ion("anion", -1.0, 0x3b82f6), 100, 0.0),
        ],
        200,
    );
    config.kind = ProcessKind::IonicSolution;
    config.description = "Oppositely charged ions pair up under Debye-screened attraction.".into();
    config.forces = ForceModelConfig::Electrostatic(ElectrostaticConfig {
        coulomb_constant: 20.0,
        debye_length: Some(2.0),
        softening: 0.1,
        ..Default::default()
    });
    config.integrator.max_speed = 5.0;
    config.spatial.cell_size = Some(3.0);
    config.binding.enabled = false;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_validates() {
        let catalog = ProcessCatalog::builtin();
        assert_eq!(catalog.len(), 13);
        for name in catalog.names() {
            let config = catalog.get(name).expect("listed");
            assert!(config.validate().is_ok(), "{name}: {:?}", config.validate());
        }
    }

    #[test]
    fn kinds_match_names() {
        let catalog = ProcessCatalog::builtin();
        assert_eq!(catalog.get("sph-droplet").map(|c| c.kind), Some(ProcessKind::SphFluid));
        assert_eq!(catalog.get("ion-transport").map(|c| c.kind), Some(ProcessKind::IonTransport));
        assert!(catalog.get("protein-folding").is_none());
    }

    #[test]
    fn register_rejects_invalid_definitions() {
        let mut catalog = ProcessCatalog::empty();
        let mut config = ionic_solution();
        config.population_cap = 10;
        assert!(matches!(
            catalog.register("crowded", config),
            Err(ConfigError::InitialPopulationExceedsCap { initial: 200, cap: 10 })
        ));
        assert!(catalog.is_empty());
        assert_eq!(catalog.register("ions", ionic_solution()), Ok(None));
        assert!(catalog.contains("ions"));
    }

    #[test]
    fn hex_colours_convert() {
        assert_eq!(rgb(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(rgb(0x00ff00), [0.0, 1.0, 0.0]);
    }
}
