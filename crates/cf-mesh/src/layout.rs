//! Packed state layout for the solver.
//!
//! Unknowns are stored node-major so each x node owns one contiguous block:
//! `[c_s shells | c_e | phi_s | phi_e]` in the electrodes,
//! `[c_e | phi_e]` in the separator. Offsets are precomputed once so the
//! assembler and the block solver index without branching on region.

use std::ops::Range;

use crate::mesh::Mesh;

#[derive(Debug, Clone)]
pub struct StateLayout {
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    has_particle: Vec<bool>,
    n_r: usize,
    n_unknowns: usize,
}

impl StateLayout {
    pub fn new(mesh: &Mesh) -> Self {
        let n_r = mesh.cathode_particles.n_shells();
        let mut offsets = Vec::with_capacity(mesh.n_nodes());
        let mut sizes = Vec::with_capacity(mesh.n_nodes());
        let mut has_particle = Vec::with_capacity(mesh.n_nodes());

        let mut next = 0;
        for node in 0..mesh.n_nodes() {
            let particle = mesh.region(node).is_electrode();
            let size = if particle { n_r + 3 } else { 2 };
            offsets.push(next);
            sizes.push(size);
            has_particle.push(particle);
            next += size;
        }

        Self {
            offsets,
            sizes,
            has_particle,
            n_r,
            n_unknowns: next,
        }
    }

    pub fn n_unknowns(&self) -> usize {
        self.n_unknowns
    }

    pub fn n_nodes(&self) -> usize {
        self.offsets.len()
    }

    pub fn n_r(&self) -> usize {
        self.n_r
    }

    pub fn has_particle(&self, node: usize) -> bool {
        self.has_particle[node]
    }

    /// Unknown count in this node's block.
    pub fn block_size(&self, node: usize) -> usize {
        self.sizes[node]
    }

    /// Index range covered by this node's block.
    pub fn block_range(&self, node: usize) -> Range<usize> {
        let start = self.offsets[node];
        start..start + self.sizes[node]
    }

    /// Solid concentration in the given shell. Panics on separator nodes.
    pub fn offset_cs(&self, node: usize, shell: usize) -> usize {
        debug_assert!(self.has_particle[node]);
        debug_assert!(shell < self.n_r);
        self.offsets[node] + shell
    }

    pub fn offset_ce(&self, node: usize) -> usize {
        if self.has_particle[node] {
            self.offsets[node] + self.n_r
        } else {
            self.offsets[node]
        }
    }

    /// Solid potential. Panics on separator nodes.
    pub fn offset_phis(&self, node: usize) -> usize {
        debug_assert!(self.has_particle[node]);
        self.offsets[node] + self.n_r + 1
    }

    pub fn offset_phie(&self, node: usize) -> usize {
        if self.has_particle[node] {
            self.offsets[node] + self.n_r + 2
        } else {
            self.offsets[node] + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_design::reference::reference_cell;
    use cf_design::DiscretizationConfig;

    fn layout_for(n_x: usize, n_r: usize) -> (Mesh, StateLayout) {
        let mut config = DiscretizationConfig::default();
        config.n_x = n_x;
        config.n_r = n_r;
        let mesh = Mesh::build(&reference_cell(), &config).unwrap();
        let layout = StateLayout::new(&mesh);
        (mesh, layout)
    }

    #[test]
    fn blocks_partition_the_state() {
        let (mesh, layout) = layout_for(20, 10);
        let mut covered = 0;
        for node in 0..mesh.n_nodes() {
            let range = layout.block_range(node);
            assert_eq!(range.start, covered);
            covered = range.end;
        }
        assert_eq!(covered, layout.n_unknowns());
    }

    #[test]
    fn separator_blocks_are_two_wide() {
        let (mesh, layout) = layout_for(20, 10);
        for node in 0..mesh.n_nodes() {
            if mesh.region(node).is_electrode() {
                assert_eq!(layout.block_size(node), 13);
                assert!(layout.has_particle(node));
            } else {
                assert_eq!(layout.block_size(node), 2);
                assert!(!layout.has_particle(node));
            }
        }
    }

    #[test]
    fn field_offsets_stay_inside_their_block() {
        let (mesh, layout) = layout_for(14, 6);
        for node in 0..mesh.n_nodes() {
            let range = layout.block_range(node);
            assert!(range.contains(&layout.offset_ce(node)));
            assert!(range.contains(&layout.offset_phie(node)));
            if layout.has_particle(node) {
                assert!(range.contains(&layout.offset_cs(node, 0)));
                assert!(range.contains(&layout.offset_cs(node, 5)));
                assert!(range.contains(&layout.offset_phis(node)));
                assert_eq!(layout.offset_cs(node, 0), range.start);
                assert_eq!(layout.offset_phie(node), range.end - 1);
            }
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use cf_design::DiscretizationConfig;
    use cf_design::reference::reference_cell;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn offsets_are_a_bijection(n_x in 6usize..32, n_r in 2usize..12) {
            let mut config = DiscretizationConfig::default();
            config.n_x = n_x;
            config.n_r = n_r;
            let mesh = Mesh::build(&reference_cell(), &config).unwrap();
            let layout = StateLayout::new(&mesh);

            let mut seen = HashSet::new();
            for node in 0..mesh.n_nodes() {
                if layout.has_particle(node) {
                    for shell in 0..n_r {
                        prop_assert!(seen.insert(layout.offset_cs(node, shell)));
                    }
                    prop_assert!(seen.insert(layout.offset_phis(node)));
                }
                prop_assert!(seen.insert(layout.offset_ce(node)));
                prop_assert!(seen.insert(layout.offset_phie(node)));
            }
            prop_assert_eq!(seen.len(), layout.n_unknowns());
            prop_assert_eq!(seen.iter().max().copied(), Some(layout.n_unknowns() - 1));
        }
    }
}
