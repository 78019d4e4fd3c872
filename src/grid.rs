use bioparticle_common::{SimParams, Vec3};

/// Uniform-grid hash over the process bounds.
///
/// Built with a counting sort: every inserted slot gets a cell index, cells
/// are counted, a prefix sum gives each cell's start, and slots are scattered
/// into `cell_particle_indices` so one cell's particles are contiguous.
/// Rebuilt from scratch whenever positions change.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    params: SimParams,
    // Grid cell index for each inserted entry, parallel to `entry_slots`
    particle_grid_indices: Vec<u32>,
    entry_slots: Vec<u32>,
    // Number of particles in each grid cell
    cell_counts: Vec<u32>,
    // Start index in cell_particle_indices for each grid cell (prefix sum)
    cell_starts: Vec<u32>,
    // Sorted list of particle slots based on grid cell
    cell_particle_indices: Vec<u32>,
    write_offsets: Vec<u32>,
}

impl SpatialIndex {
    pub fn new(params: &SimParams) -> Self {
        let num_grid_cells = params.num_grid_cells;
        SpatialIndex {
            params: params.clone(),
            particle_grid_indices: Vec::new(),
            entry_slots: Vec::new(),
            cell_counts: vec![0; num_grid_cells],
            cell_starts: vec![0; num_grid_cells],
            cell_particle_indices: Vec::new(),
            write_offsets: vec![0; num_grid_cells],
        }
    }

    pub fn len(&self) -> usize {
        self.cell_particle_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_particle_indices.is_empty()
    }

    /// Edge length of the smallest cell; queries up to this radius stay in the 27-cell block.
    pub fn cell_size(&self) -> f64 {
        self.params.min_cell_size()
    }

    /// Integer cell coordinates of a position, clamped to the grid.
    #[inline(always)]
    pub fn cell_coords(&self, pos: Vec3) -> [i64; 3] {
        let mut coords = [0i64; 3];
        for axis in 0..3 {
            let rel = (pos[axis] - self.params.bounds_min[axis]) * self.params.inv_cell_size[axis];
            // NaN casts to 0; infinities saturate and are clamped below.
            let c = rel.floor() as i64;
            coords[axis] = c.clamp(0, self.params.grid_dims[axis] as i64 - 1);
        }
        coords
    }

    /// Calculates the 1D grid cell index for a given position.
    #[inline(always)]
    pub fn cell_index(&self, pos: Vec3) -> u32 {
        let [x, y, z] = self.cell_coords(pos);
        self.flatten(x as u32, y as u32, z as u32)
    }

    #[inline(always)]
    fn flatten(&self, x: u32, y: u32, z: u32) -> u32 {
        let [dx, dy, _] = self.params.grid_dims;
        (z * dy + y) * dx + x
    }

    /// Clears the grid and reinserts `(slot, position)` entries.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (usize, Vec3)>) {
        // Phase 1: assign grid indices.
        self.particle_grid_indices.clear();
        self.entry_slots.clear();
        for (slot, pos) in entries {
            let cell = self.cell_index(pos);
            self.particle_grid_indices.push(cell);
            self.entry_slots.push(slot as u32);
        }
        let num_entries = self.entry_slots.len();

        // Phase 2: count particles in each grid cell.
        self.cell_counts.iter_mut().for_each(|c| *c = 0);
        for &cell in &self.particle_grid_indices {
            self.cell_counts[cell as usize] += 1;
        }

        // Phase 3: cell start indices via prefix sum.
        let mut total_sum = 0;
        for (start, &count) in self.cell_starts.iter_mut().zip(&self.cell_counts) {
            *start = total_sum;
            total_sum += count;
        }
        debug_assert_eq!(total_sum as usize, num_entries);

        // Phase 4: scatter slots into their cell's block.
        self.write_offsets.iter_mut().for_each(|o| *o = 0);
        self.cell_particle_indices.clear();
        self.cell_particle_indices.resize(num_entries, 0);
        for (&cell, &slot) in self.particle_grid_indices.iter().zip(&self.entry_slots) {
            let cell = cell as usize;
            let write_idx = (self.cell_starts[cell] + self.write_offsets[cell]) as usize;
            self.cell_particle_indices[write_idx] = slot;
            self.write_offsets[cell] += 1;
        }
        log::trace!("Spatial index rebuilt with {} entries over {} cells.", num_entries, self.cell_counts.len());
    }

    /// Slots stored in one cell.
    fn cell_slots(&self, cell: usize) -> &[u32] {
        let start = self.cell_starts[cell] as usize;
        let end = start + self.cell_counts[cell] as usize;
        &self.cell_particle_indices[start..end]
    }

    // Cell coordinates along one axis within `span` of `center`, wrapped or clamped.
    fn axis_range(&self, axis: usize, center: i64, span: i64) -> Vec<u32> {
        let dims = self.params.grid_dims[axis] as i64;
        if self.params.periodic {
            if 2 * span + 1 >= dims {
                return (0..dims as u32).collect();
            }
            (center - span..=center + span).map(|c| c.rem_euclid(dims) as u32).collect()
        } else {
            let lo = (center - span).max(0);
            let hi = (center + span).min(dims - 1);
            (lo..=hi).map(|c| c as u32).collect()
        }
    }

    /// Calls `f` with every slot in cells within `span` cells of `pos`'s cell.
    fn for_each_in_span<F: FnMut(usize)>(&self, pos: Vec3, span: i64, mut f: F) {
        if self.params.num_grid_cells == 0 {
            return;
        }
        let center = self.cell_coords(pos);
        let xs = self.axis_range(0, center[0], span);
        let ys = self.axis_range(1, center[1], span);
        let zs = self.axis_range(2, center[2], span);
        for &z in &zs {
            for &y in &ys {
                for &x in &xs {
                    let cell = self.flatten(x, y, z) as usize;
                    for &slot in self.cell_slots(cell) {
                        f(slot as usize);
                    }
                }
            }
        }
    }

    /// Every slot in the 27-cell block around `pos`. May include false
    /// positives; never misses a particle within one cell edge.
    pub fn for_each_neighbor<F: FnMut(usize)>(&self, pos: Vec3, f: F) {
        self.for_each_in_span(pos, 1, f);
    }

    /// Candidate slots for a query radius, widening the block when the
    /// radius exceeds one cell.
    pub fn for_each_within<F: FnMut(usize)>(&self, pos: Vec3, radius: f64, f: F) {
        let span = (radius / self.cell_size()).ceil().max(1.0) as i64;
        self.for_each_in_span(pos, span, f);
    }

    /// Collected form of [`SpatialIndex::for_each_neighbor`].
    pub fn neighbors(&self, pos: Vec3) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_neighbor(pos, |slot| out.push(slot));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioparticle_common::{BioType, BlueprintEntry, BoundaryPolicy, BoundsConfig, ProcessConfig, SpeciesConfig};

    fn params(size: f64, cell: f64, periodic: bool) -> SimParams {
        let species = SpeciesConfig::new("ion", BioType::Ion, 1.0, 0.1);
        let mut config = ProcessConfig::new(BoundsConfig::cube(size), vec![BlueprintEntry::new(species, 0, 1.0)], 10);
        config.spatial.cell_size = Some(cell);
        if periodic {
            config.integrator.boundary = BoundaryPolicy::Periodic;
        }
        config.get_sim_params()
    }

    #[test]
    fn finds_particles_in_adjacent_cells_only() {
        let mut index = SpatialIndex::new(&params(10.0, 1.0, false));
        index.rebuild([
            (0, Vec3::new(0.5, 0.5, 0.5)),
            (1, Vec3::new(1.5, 0.5, 0.5)),
            (2, Vec3::new(5.5, 5.5, 5.5)),
        ]);
        let mut found = index.neighbors(Vec3::new(0.6, 0.6, 0.6));
        found.sort();
        assert_eq!(found, vec![0, 1]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn out_of_bounds_positions_clamp_to_edge_cells() {
        let mut index = SpatialIndex::new(&params(4.0, 1.0, false));
        index.rebuild([(7, Vec3::new(-3.0, 9.0, 2.0))]);
        assert_eq!(index.neighbors(Vec3::new(0.1, 3.9, 2.0)), vec![7]);
    }

    #[test]
    fn periodic_grid_wraps_neighbor_cells() {
        let mut index = SpatialIndex::new(&params(10.0, 2.0, true));
        index.rebuild([(0, Vec3::new(9.9, 5.0, 5.0)), (1, Vec3::new(0.1, 5.0, 5.0))]);
        assert_eq!(index.neighbors(Vec3::new(0.1, 5.0, 5.0)).len(), 2);
        // Not wrapped without the periodic flag.
        let mut open = SpatialIndex::new(&params(10.0, 2.0, false));
        open.rebuild([(0, Vec3::new(9.9, 5.0, 5.0)), (1, Vec3::new(0.1, 5.0, 5.0))]);
        assert_eq!(open.neighbors(Vec3::new(0.1, 5.0, 5.0)), vec![1]);
    }

    #[test]
    fn small_periodic_grids_do_not_visit_a_cell_twice() {
        let mut index = SpatialIndex::new(&params(4.0, 2.0, true));
        index.rebuild([(0, Vec3::new(1.0, 1.0, 1.0))]);
        assert_eq!(index.neighbors(Vec3::new(3.0, 3.0, 3.0)), vec![0]);
    }

    #[test]
    fn wider_queries_span_more_cells() {
        let mut index = SpatialIndex::new(&params(10.0, 1.0, false));
        index.rebuild([(0, Vec3::new(0.5, 0.5, 0.5)), (1, Vec3::new(2.9, 0.5, 0.5))]);
        assert_eq!(index.neighbors(Vec3::new(0.5, 0.5, 0.5)), vec![0]);
        let mut wide = Vec::new();
        index.for_each_within(Vec3::new(0.5, 0.5, 0.5), 2.5, |s| wide.push(s));
        wide.sort();
        assert_eq!(wide, vec![0, 1]);
    }
}
