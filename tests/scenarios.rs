use bioparticle_common::{
    BioType, BlueprintEntry, BoundsConfig, ForceModelConfig, BrownianConfig, ProcessConfig, SaturationPolicy,
    SpeciesConfig, Vec3,
};
use bioparticle_engine::{Particle, ParticleSystem, ProcessCatalog};

const DT: f64 = 1.0 / 60.0;

fn builtin(name: &str, seed: u64) -> ParticleSystem {
    let config = ProcessCatalog::builtin().get(name).cloned().expect("built-in process");
    ParticleSystem::new(name, config, seed).expect("built-in processes are valid")
}

/// Mean over `from` of the distance to the closest particle in `to`.
fn mean_nearest(system: &ParticleSystem, from: &[&Particle], to: &[&Particle]) -> f64 {
    let mut total = 0.0;
    for p in from {
        let nearest = to
            .iter()
            .filter(|q| q.id != p.id)
            .map(|q| system.domain().separation(p.position, q.position).length())
            .fold(f64::INFINITY, f64::min);
        total += nearest;
    }
    total / from.len() as f64
}

// Sum and count of distances below `range` over pairs from `a` x `b`; each
// unordered pair once when both sides are the same class.
fn close_pairs(system: &ParticleSystem, a: &[&Particle], b: &[&Particle], same: bool, range: f64) -> (f64, usize) {
    let (mut total, mut count) = (0.0, 0);
    for (i, p) in a.iter().enumerate() {
        let start = if same { i + 1 } else { 0 };
        for q in &b[start..] {
            let d = system.domain().separation(p.position, q.position).length();
            if d < range {
                total += d;
                count += 1;
            }
        }
    }
    (total, count)
}

/// Mean separation of opposite-charge and of same-charge pairs within the
/// screened interaction range, plus the mean nearest opposite-charge distance.
fn ion_distances(system: &ParticleSystem) -> (f64, f64, f64) {
    let range = system.config().blueprint[0].species.interaction_radius;
    let cations: Vec<&Particle> = system.particles().filter(|p| p.charge > 0.0).collect();
    let anions: Vec<&Particle> = system.particles().filter(|p| p.charge < 0.0).collect();
    let (opposite, n_opposite) = close_pairs(system, &cations, &anions, false, range);
    let (plus, n_plus) = close_pairs(system, &cations, &cations, true, range);
    let (minus, n_minus) = close_pairs(system, &anions, &anions, true, range);
    (
        opposite / n_opposite as f64,
        (plus + minus) / (n_plus + n_minus) as f64,
        mean_nearest(system, &cations, &anions),
    )
}

#[test]
fn opposite_charges_pair_up() {
    let mut system = builtin("ionic-solution", 2024);
    assert_eq!(system.particles_of_type(BioType::Ion).len(), 200);
    let (opposite_start, like_start, nearest_start) = ion_distances(&system);

    for _ in 0..600 {
        system.tick(DT);
    }
    let (opposite_end, like_end, nearest_end) = ion_distances(&system);

    assert!(system.faults().is_empty());
    assert!(
        opposite_end < opposite_start,
        "opposite-charge pairs went from {opposite_start:.3} to {opposite_end:.3}"
    );
    assert!(
        like_end >= 0.95 * like_start,
        "same-charge pairs closed in: {like_start:.3} -> {like_end:.3}"
    );
    assert!(
        nearest_end < 0.6 * nearest_start,
        "nearest opposite charge went from {nearest_start:.3} to {nearest_end:.3}"
    );
}

fn receptor_field() -> ProcessConfig {
    let mut ligand = SpeciesConfig::new("ligand", BioType::Ligand, 0.3, 0.05);
    ligand.diffusion = 0.5;
    ligand.interaction_radius = 1.5;
    ligand.binding_strength = 1.0;

    let mut receptor = SpeciesConfig::new("receptor", BioType::Receptor, 5.0, 0.1);
    receptor.interaction_radius = 1.5;
    receptor.anchored = true;
    receptor.damping = 1.0;

    let mut config = ProcessConfig::new(
        BoundsConfig::cube(4.0),
        vec![BlueprintEntry::new(ligand, 50, 0.0), BlueprintEntry::new(receptor, 10, 0.0)],
        60,
    );
    config.forces = ForceModelConfig::Brownian(BrownianConfig::default());
    config.binding.scaling_factor = 1.0;
    config.binding.saturation = SaturationPolicy::OneToOne;
    config
}

#[test]
fn receptors_saturate_one_to_one() {
    let mut system = ParticleSystem::new("receptors", receptor_field(), 11).expect("valid config");
    let receptors = system.particles_of_type(BioType::Receptor);
    assert_eq!(receptors.len(), 10);

    let mut peak = 0;
    for _ in 0..300 {
        system.tick(DT);
        let bound = system.bound_pair_count();
        assert!(bound <= 10, "{bound} pairs for 10 receptors");
        peak = peak.max(bound);
        for id in system.particles().map(|p| p.id) {
            assert!(system.bound_partners(id).len() <= 1);
        }
    }
    assert_eq!(peak, 10);
    assert_eq!(system.bound_pair_count(), 10);
    for receptor in receptors {
        let partners = system.bound_partners(receptor);
        assert_eq!(partners.len(), 1);
        let ligand = system.particle(partners[0]).expect("partner is live");
        assert_eq!(ligand.bio_type(), BioType::Ligand);
    }
    assert!(system.recent_events().count() >= 1);
}

fn centre_of_mass_height(system: &ParticleSystem) -> f64 {
    let (mut weighted, mut mass) = (0.0, 0.0);
    for p in system.particles() {
        weighted += p.position.y * p.mass;
        mass += p.mass;
    }
    weighted / mass
}

#[test]
fn droplet_settles_toward_rest_density() {
    let mut system = builtin("sph-droplet", 5);
    let rest_density = 6.0;
    let start_height = centre_of_mass_height(&system);

    system.tick(DT);
    let first = system.statistics().mean_density.expect("fluid reports density");
    let first_error = (first - rest_density).abs() / rest_density;

    for _ in 1..300 {
        system.tick(DT);
    }
    let stats = system.statistics();
    let last = stats.mean_density.expect("fluid reports density");
    let last_error = (last - rest_density).abs() / rest_density;

    assert_eq!(stats.active_particles, 200);
    assert!(system.faults().is_empty());
    assert!(centre_of_mass_height(&system) < start_height - 1.0);
    assert!(last_error < first_error, "density error {first_error:.3} -> {last_error:.3}");
    assert!(last_error < 0.5, "mean density {last:.3} far from {rest_density}");
    let bounds = BoundsConfig::new(Vec3::ZERO, Vec3::new(3.0, 10.0, 3.0));
    assert!(system.particles().all(|p| bounds.contains(p.position)));
}
