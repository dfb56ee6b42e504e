//! Project schema definitions.

use crate::config::DiscretizationConfig;
use crate::design::{CellDesign, ElectrodeDesign, SeparatorDesign};
use crate::protocol::{Cutoffs, OperatingProtocol, ProtocolMode};
use crate::validate::ValidationError;
use cf_materials::{MaterialCatalog, MaterialSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellProject {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub designs: Vec<CellDesignDef>,
    #[serde(default)]
    pub protocols: Vec<ProtocolDef>,
    #[serde(default)]
    pub runs: Vec<RunDef>,
}

impl CellProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: crate::migrate::LATEST_VERSION,
            name: name.into(),
            designs: Vec::new(),
            protocols: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn design(&self, id: &str) -> Option<&CellDesignDef> {
        self.designs.iter().find(|d| d.id == id)
    }

    pub fn protocol(&self, id: &str) -> Option<&ProtocolDef> {
        self.protocols.iter().find(|p| p.id == id)
    }

    pub fn run(&self, name: &str) -> Option<&RunDef> {
        self.runs.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellDesignDef {
    pub id: String,
    pub name: String,
    pub cathode: ElectrodeDef,
    pub separator: SeparatorLayerDef,
    pub anode: ElectrodeDef,
    pub electrolyte: MaterialRefDef,
    pub area_m2: f64,
    #[serde(default = "default_layer_count")]
    pub layer_count: u32,
    #[serde(default = "default_initial_soc")]
    pub initial_soc: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElectrodeDef {
    pub material: MaterialRefDef,
    pub thickness_m: f64,
    pub porosity: f64,
    pub active_volume_fraction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle_radius_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeparatorLayerDef {
    pub material: MaterialRefDef,
    pub thickness_m: f64,
    pub porosity: f64,
}

/// A material slot either names a catalog entry or carries a spec inline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source")]
pub enum MaterialRefDef {
    Catalog { id: String },
    Inline { spec: MaterialSpec },
}

impl MaterialRefDef {
    pub fn resolve(&self, catalog: &dyn MaterialCatalog) -> Result<MaterialSpec, ValidationError> {
        match self {
            MaterialRefDef::Catalog { id } => {
                catalog.get(id).map_err(|_| ValidationError::MissingReference {
                    id: id.clone(),
                    context: "material catalog".to_string(),
                })
            }
            MaterialRefDef::Inline { spec } => Ok(spec.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolDef {
    pub id: String,
    pub mode: ProtocolMode,
    #[serde(default)]
    pub cutoffs: Cutoffs,
}

impl ProtocolDef {
    pub fn to_protocol(&self) -> OperatingProtocol {
        OperatingProtocol {
            mode: self.mode.clone(),
            cutoffs: self.cutoffs.clone(),
        }
    }
}

/// Explicit model override for a run. When absent the dispatcher picks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelChoiceDef {
    SingleParticle,
    PseudoTwoDimensional,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDef {
    pub name: String,
    pub design_id: String,
    pub protocol_id: String,
    #[serde(default)]
    pub config: DiscretizationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelChoiceDef>,
    #[serde(default = "default_temperature_k")]
    pub temperature_k: f64,
}

fn default_layer_count() -> u32 {
    1
}

fn default_initial_soc() -> f64 {
    1.0
}

fn default_temperature_k() -> f64 {
    cf_core::constants::T_REF_K
}

impl ElectrodeDef {
    pub fn resolve(
        &self,
        catalog: &dyn MaterialCatalog,
    ) -> Result<ElectrodeDesign, ValidationError> {
        Ok(ElectrodeDesign {
            material: self.material.resolve(catalog)?,
            thickness_m: self.thickness_m,
            porosity: self.porosity,
            active_volume_fraction: self.active_volume_fraction,
            particle_radius_m: self.particle_radius_m,
        })
    }
}

impl SeparatorLayerDef {
    pub fn resolve(
        &self,
        catalog: &dyn MaterialCatalog,
    ) -> Result<SeparatorDesign, ValidationError> {
        Ok(SeparatorDesign {
            material: self.material.resolve(catalog)?,
            thickness_m: self.thickness_m,
            porosity: self.porosity,
        })
    }
}

impl CellDesignDef {
    /// Replaces catalog references with concrete specs, yielding a design the
    /// models can consume directly.
    pub fn resolve(&self, catalog: &dyn MaterialCatalog) -> Result<CellDesign, ValidationError> {
        Ok(CellDesign {
            id: self.id.clone(),
            name: self.name.clone(),
            cathode: self.cathode.resolve(catalog)?,
            separator: self.separator.resolve(catalog)?,
            anode: self.anode.resolve(catalog)?,
            electrolyte: self.electrolyte.resolve(catalog)?,
            area_m2: self.area_m2,
            layer_count: self.layer_count,
            initial_soc: self.initial_soc,
        })
    }
}
