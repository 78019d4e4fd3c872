use crate::particle::Particle;
use bioparticle_common::ParticleId;

#[derive(Debug)]
struct Slot {
    generation: u32,
    particle: Option<Particle>,
}

/// Generational arena owning every particle of a system.
///
/// Slot indices are stable for a particle's lifetime and are what the spatial
/// index stores; freed slots are reused with a bumped generation so stale
/// `ParticleId`s fail lookups instead of aliasing a newcomer.
#[derive(Debug, Default)]
pub struct ParticleArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl ParticleArena {
    pub fn with_capacity(capacity: usize) -> Self {
        ParticleArena { slots: Vec::with_capacity(capacity), free: Vec::new(), len: 0 }
    }

    /// Number of live particles (active or awaiting cull).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upper bound on slot indices; sizes per-slot scratch buffers.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Inserts a particle built from its freshly assigned id.
    pub fn insert_with(&mut self, build: impl FnOnce(ParticleId) -> Particle) -> ParticleId {
        let id = match self.free.pop() {
            Some(index) => ParticleId::new(index, self.slots[index as usize].generation),
            None => {
                // Grow by 20% like the rest of the state buffers.
                if self.slots.len() == self.slots.capacity() {
                    let target = ((self.slots.len() as f64 * 1.2).ceil() as usize).max(16);
                    log::debug!("Growing particle arena from {} to {} slots.", self.slots.len(), target);
                    self.slots.reserve(target - self.slots.len());
                }
                self.slots.push(Slot { generation: 0, particle: None });
                ParticleId::new((self.slots.len() - 1) as u32, 0)
            }
        };
        self.slots[id.slot()].particle = Some(build(id));
        self.len += 1;
        id
    }

    /// Removes a particle; its slot is recycled with the next generation.
    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation {
            return None;
        }
        let particle = slot.particle.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(particle)
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots
            .get(id.slot())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.particle.as_ref())
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots
            .get_mut(id.slot())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.particle.as_mut())
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.get(id).is_some()
    }

    /// Particle at a raw slot index, if occupied.
    pub fn slot(&self, index: usize) -> Option<&Particle> {
        self.slots.get(index).and_then(|s| s.particle.as_ref())
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.slots.get_mut(index).and_then(|s| s.particle.as_mut())
    }

    /// Live particles in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Particle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.particle.as_ref().map(|p| (i, p)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Particle)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.particle.as_mut().map(|p| (i, p)))
    }

    /// Active particles only, in slot order.
    pub fn active(&self) -> impl Iterator<Item = (usize, &Particle)> + '_ {
        self.iter().filter(|(_, p)| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use bioparticle_common::{BioType, SpeciesConfig, Vec3};

    fn spawn(arena: &mut ParticleArena) -> ParticleId {
        let species = SpeciesConfig::new("ion", BioType::Ion, 1.0, 0.1);
        arena.insert_with(|id| Particle::from_species(id, 0, &species, Vec3::ZERO, Vec3::ZERO))
    }

    #[test]
    fn stale_ids_do_not_alias_recycled_slots() {
        let mut arena = ParticleArena::default();
        let a = spawn(&mut arena);
        let b = spawn(&mut arena);
        assert_eq!(arena.len(), 2);

        assert!(arena.remove(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        let c = spawn(&mut arena);
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c).map(|p| p.id), Some(c));
        assert!(arena.contains(b));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn iteration_is_in_slot_order() {
        let mut arena = ParticleArena::default();
        let ids: Vec<_> = (0..5).map(|_| spawn(&mut arena)).collect();
        arena.remove(ids[2]);
        let slots: Vec<usize> = arena.iter().map(|(i, _)| i).collect();
        assert_eq!(slots, vec![0, 1, 3, 4]);
    }
}
