//! Finite-volume mesh over the cell sandwich.
//!
//! The x axis runs from the cathode current collector (x = 0) through the
//! separator to the anode current collector. Each region gets a share of
//! the `n_x` nodes proportional to its thickness, never fewer than two.
//! Electrode nodes additionally carry a radial shell mesh for the
//! representative particle.

use cf_design::{CellDesign, DiscretizationConfig, ElectrodeDesign};
use std::f64::consts::PI;

use crate::error::{MeshError, MeshResult};

/// Which sandwich layer an x node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Cathode,
    Separator,
    Anode,
}

impl Region {
    pub fn is_electrode(self) -> bool {
        matches!(self, Region::Cathode | Region::Anode)
    }
}

/// One x-direction finite volume.
#[derive(Debug, Clone, Copy)]
pub struct MeshNode {
    pub region: Region,
    /// Volume width along x.
    pub dx_m: f64,
    /// Centroid position measured from the cathode collector.
    pub x_center_m: f64,
}

/// Uniform spherical shell mesh for one electrode's particles.
#[derive(Debug, Clone)]
pub struct RadialMesh {
    pub radius_m: f64,
    pub dr_m: f64,
    /// Shell volumes, innermost first: `4π/3 (r_{j+1}^3 - r_j^3)`.
    pub shell_volumes_m3: Vec<f64>,
    /// Face areas `4π r_j^2` for j = 0..=n_shells; face 0 sits at the
    /// center and has zero area, which encodes the symmetry condition.
    pub face_areas_m2: Vec<f64>,
}

impl RadialMesh {
    fn build(radius_m: f64, n_r: usize) -> Self {
        let dr_m = radius_m / n_r as f64;
        let face_radii: Vec<f64> = (0..=n_r).map(|j| j as f64 * dr_m).collect();
        let shell_volumes_m3 = face_radii
            .windows(2)
            .map(|w| 4.0 * PI / 3.0 * (w[1].powi(3) - w[0].powi(3)))
            .collect();
        let face_areas_m2 = face_radii.iter().map(|r| 4.0 * PI * r * r).collect();
        Self {
            radius_m,
            dr_m,
            shell_volumes_m3,
            face_areas_m2,
        }
    }

    pub fn n_shells(&self) -> usize {
        self.shell_volumes_m3.len()
    }

    /// Shell centroid radius, used when sampling concentration profiles.
    pub fn shell_center_m(&self, shell: usize) -> f64 {
        (shell as f64 + 0.5) * self.dr_m
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    nodes: Vec<MeshNode>,
    n_cathode: usize,
    n_separator: usize,
    n_anode: usize,
    pub cathode_particles: RadialMesh,
    pub anode_particles: RadialMesh,
}

impl Mesh {
    pub fn build(design: &CellDesign, config: &DiscretizationConfig) -> MeshResult<Mesh> {
        if config.n_x < 6 {
            return Err(MeshError::TooFewNodes { n_x: config.n_x });
        }
        if config.n_r < 2 {
            return Err(MeshError::TooFewShells { n_r: config.n_r });
        }

        let thicknesses = [
            ("cathode", design.cathode.thickness_m),
            ("separator", design.separator.thickness_m),
            ("anode", design.anode.thickness_m),
        ];
        for (region, value) in thicknesses {
            if !value.is_finite() || value <= 0.0 {
                return Err(MeshError::NonPositiveThickness { region, value });
            }
        }

        let counts = allocate_nodes(
            config.n_x,
            [
                design.cathode.thickness_m,
                design.separator.thickness_m,
                design.anode.thickness_m,
            ],
        );

        let mut nodes = Vec::with_capacity(config.n_x);
        let mut x = 0.0;
        let regions = [Region::Cathode, Region::Separator, Region::Anode];
        for ((region, (_, thickness)), count) in regions.iter().zip(thicknesses).zip(counts) {
            let dx_m = thickness / count as f64;
            for _ in 0..count {
                nodes.push(MeshNode {
                    region: *region,
                    dx_m,
                    x_center_m: x + 0.5 * dx_m,
                });
                x += dx_m;
            }
        }

        let cathode_particles =
            RadialMesh::build(particle_radius(&design.cathode, "cathode")?, config.n_r);
        let anode_particles =
            RadialMesh::build(particle_radius(&design.anode, "anode")?, config.n_r);

        Ok(Mesh {
            nodes,
            n_cathode: counts[0],
            n_separator: counts[1],
            n_anode: counts[2],
            cathode_particles,
            anode_particles,
        })
    }

    pub fn nodes(&self) -> &[MeshNode] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_cathode(&self) -> usize {
        self.n_cathode
    }

    pub fn n_separator(&self) -> usize {
        self.n_separator
    }

    pub fn n_anode(&self) -> usize {
        self.n_anode
    }

    pub fn region(&self, node: usize) -> Region {
        self.nodes[node].region
    }

    /// Radial mesh for an electrode node, `None` in the separator.
    pub fn particles(&self, node: usize) -> Option<&RadialMesh> {
        match self.nodes[node].region {
            Region::Cathode => Some(&self.cathode_particles),
            Region::Anode => Some(&self.anode_particles),
            Region::Separator => None,
        }
    }

    /// First anode node index; the last cathode node is `n_cathode - 1`.
    pub fn first_anode(&self) -> usize {
        self.n_cathode + self.n_separator
    }
}

/// Splits `n_x` nodes across the three regions proportionally to thickness.
/// Every region keeps at least two nodes; the remainder goes to the largest
/// fractional shares, ties resolved in sandwich order.
fn allocate_nodes(n_x: usize, thicknesses: [f64; 3]) -> [usize; 3] {
    let total: f64 = thicknesses.iter().sum();
    let spare = n_x - 6;

    let ideal: Vec<f64> = thicknesses
        .iter()
        .map(|t| spare as f64 * t / total)
        .collect();
    let mut counts = [2usize; 3];
    let mut assigned = 0;
    for (count, share) in counts.iter_mut().zip(&ideal) {
        let floor = share.floor() as usize;
        *count += floor;
        assigned += floor;
    }

    let mut order: Vec<usize> = (0..3).collect();
    order.sort_by(|&a, &b| {
        let fa = ideal[a] - ideal[a].floor();
        let fb = ideal[b] - ideal[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &region in order.iter().take(spare - assigned) {
        counts[region] += 1;
    }

    counts
}

fn particle_radius(electrode: &ElectrodeDesign, name: &str) -> MeshResult<f64> {
    let radius = electrode
        .particle_radius_m
        .or(electrode.material.particle_radius_m)
        .ok_or_else(|| MeshError::MissingParticleRadius {
            electrode: name.to_string(),
        })?;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(MeshError::NonPositiveParticleRadius {
            electrode: name.to_string(),
            value: radius,
        });
    }
    Ok(radius)
}
