//! Project validation logic.

use crate::protocol::{Cutoffs, ProtocolMode};
use crate::schema::{
    CellDesignDef, CellProject, ElectrodeDef, MaterialRefDef, ProtocolDef, RunDef,
    SeparatorLayerDef,
};
use cf_materials::MaterialRole;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &CellProject) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    let mut design_ids = HashSet::new();
    for design in &project.designs {
        if !design_ids.insert(&design.id) {
            return Err(ValidationError::DuplicateId {
                id: design.id.clone(),
                context: "designs".to_string(),
            });
        }
        validate_design(design)?;
    }

    let mut protocol_ids = HashSet::new();
    for protocol in &project.protocols {
        if !protocol_ids.insert(&protocol.id) {
            return Err(ValidationError::DuplicateId {
                id: protocol.id.clone(),
                context: "protocols".to_string(),
            });
        }
        validate_protocol(protocol)?;
    }

    let mut run_names = HashSet::new();
    for run in &project.runs {
        if !run_names.insert(&run.name) {
            return Err(ValidationError::DuplicateId {
                id: run.name.clone(),
                context: "runs".to_string(),
            });
        }
        validate_run(run, &design_ids, &protocol_ids)?;
    }

    Ok(())
}

pub fn validate_design(design: &CellDesignDef) -> Result<(), ValidationError> {
    validate_electrode("cathode", design, &design.cathode, MaterialRole::Cathode)?;
    validate_electrode("anode", design, &design.anode, MaterialRole::Anode)?;
    validate_separator(design, &design.separator)?;
    validate_material_ref(
        &format!("design '{}' electrolyte", design.id),
        &design.electrolyte,
        MaterialRole::Electrolyte,
    )?;

    validate_positive_finite("area_m2", design.area_m2, &design.id)?;
    if design.layer_count == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("design '{}' layer_count", design.id),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if !design.initial_soc.is_finite() || !(0.0..=1.0).contains(&design.initial_soc) {
        return Err(ValidationError::InvalidValue {
            field: format!("design '{}' initial_soc", design.id),
            value: design.initial_soc.to_string(),
            reason: "must be in [0, 1]".to_string(),
        });
    }

    Ok(())
}

fn validate_electrode(
    slot: &str,
    design: &CellDesignDef,
    electrode: &ElectrodeDef,
    expected_role: MaterialRole,
) -> Result<(), ValidationError> {
    let context = format!("{} {}", design.id, slot);
    validate_material_ref(
        &format!("design '{}' {} material", design.id, slot),
        &electrode.material,
        expected_role,
    )?;
    validate_positive_finite("thickness_m", electrode.thickness_m, &context)?;
    validate_open_fraction("porosity", electrode.porosity, &context)?;
    validate_open_fraction(
        "active_volume_fraction",
        electrode.active_volume_fraction,
        &context,
    )?;

    let solids = electrode.porosity + electrode.active_volume_fraction;
    if solids > 1.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("design '{}' {} volume fractions", design.id, slot),
            value: solids.to_string(),
            reason: "porosity + active_volume_fraction must not exceed 1".to_string(),
        });
    }

    if let Some(r) = electrode.particle_radius_m
        && (!r.is_finite() || r <= 0.0)
    {
        return Err(ValidationError::InvalidValue {
            field: format!("design '{}' {} particle_radius_m", design.id, slot),
            value: r.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }

    Ok(())
}

fn validate_separator(
    design: &CellDesignDef,
    separator: &SeparatorLayerDef,
) -> Result<(), ValidationError> {
    let context = format!("{} separator", design.id);
    validate_material_ref(
        &format!("design '{}' separator material", design.id),
        &separator.material,
        MaterialRole::Separator,
    )?;
    validate_positive_finite("thickness_m", separator.thickness_m, &context)?;
    validate_open_fraction("porosity", separator.porosity, &context)?;
    Ok(())
}

/// Inline specs carry their role and can be checked here. Catalog references
/// are checked when the catalog resolves them.
fn validate_material_ref(
    field: &str,
    material: &MaterialRefDef,
    expected_role: MaterialRole,
) -> Result<(), ValidationError> {
    if let MaterialRefDef::Inline { spec } = material
        && spec.role != expected_role
    {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: format!("{:?}", spec.role),
            reason: format!("slot requires a {expected_role:?} material"),
        });
    }
    Ok(())
}

fn validate_protocol(protocol: &ProtocolDef) -> Result<(), ValidationError> {
    let context = format!("protocol '{}'", protocol.id);

    match &protocol.mode {
        ProtocolMode::ConstantCurrent { rate_c } => {
            validate_finite("rate_c", *rate_c, &context)?;
        }
        ProtocolMode::ConstantCurrentConstantVoltage {
            rate_c,
            hold_voltage_v,
            taper_c,
        } => {
            validate_finite("rate_c", *rate_c, &context)?;
            if *rate_c == 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("{context} rate_c"),
                    value: "0".to_string(),
                    reason: "CC-CV requires a nonzero current phase".to_string(),
                });
            }
            validate_positive_finite("hold_voltage_v", *hold_voltage_v, &context)?;
            validate_positive_finite("taper_c", *taper_c, &context)?;
            if *taper_c >= rate_c.abs() {
                return Err(ValidationError::InvalidValue {
                    field: format!("{context} taper_c"),
                    value: taper_c.to_string(),
                    reason: "taper rate must be below the CC rate magnitude".to_string(),
                });
            }
        }
        ProtocolMode::Pulse { segments } => {
            if segments.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: format!("{context} segments"),
                    value: "[]".to_string(),
                    reason: "pulse protocols need at least one segment".to_string(),
                });
            }
            for (idx, segment) in segments.iter().enumerate() {
                let seg_context = format!("{context} segment {idx}");
                validate_finite("rate_c", segment.rate_c, &seg_context)?;
                validate_positive_finite("duration_s", segment.duration_s, &seg_context)?;
            }
        }
    }

    validate_cutoffs(&context, &protocol.cutoffs)
}

fn validate_cutoffs(context: &str, cutoffs: &Cutoffs) -> Result<(), ValidationError> {
    if let Some(v) = cutoffs.voltage_min_v {
        validate_finite("voltage_min_v", v, context)?;
    }
    if let Some(v) = cutoffs.voltage_max_v {
        validate_finite("voltage_max_v", v, context)?;
    }
    if let (Some(lo), Some(hi)) = (cutoffs.voltage_min_v, cutoffs.voltage_max_v)
        && lo >= hi
    {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} voltage cutoffs"),
            value: format!("[{lo}, {hi}]"),
            reason: "voltage_min_v must lie below voltage_max_v".to_string(),
        });
    }
    if let Some(t) = cutoffs.temperature_max_k {
        validate_positive_finite("temperature_max_k", t, context)?;
    }
    Ok(())
}

fn validate_run(
    run: &RunDef,
    design_ids: &HashSet<&String>,
    protocol_ids: &HashSet<&String>,
) -> Result<(), ValidationError> {
    if !design_ids.contains(&run.design_id) {
        return Err(ValidationError::MissingReference {
            id: run.design_id.clone(),
            context: format!("run '{}' design_id", run.name),
        });
    }
    if !protocol_ids.contains(&run.protocol_id) {
        return Err(ValidationError::MissingReference {
            id: run.protocol_id.clone(),
            context: format!("run '{}' protocol_id", run.name),
        });
    }

    let context = format!("run '{}'", run.name);
    validate_positive_finite("temperature_k", run.temperature_k, &context)?;

    let config = &run.config;
    if config.n_x < 6 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} n_x"),
            value: config.n_x.to_string(),
            reason: "need at least two nodes per region".to_string(),
        });
    }
    if config.n_r < 2 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} n_r"),
            value: config.n_r.to_string(),
            reason: "need at least two radial shells".to_string(),
        });
    }
    validate_positive_finite("dt_init_s", config.dt_init_s, &context)?;
    validate_positive_finite("dt_min_s", config.dt_min_s, &context)?;
    validate_positive_finite("dt_max_s", config.dt_max_s, &context)?;
    if config.dt_min_s > config.dt_init_s || config.dt_init_s > config.dt_max_s {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} time step bounds"),
            value: format!(
                "[{}, {}, {}]",
                config.dt_min_s, config.dt_init_s, config.dt_max_s
            ),
            reason: "require dt_min_s <= dt_init_s <= dt_max_s".to_string(),
        });
    }
    validate_positive_finite("abs_tol", config.abs_tol, &context)?;
    validate_positive_finite("rel_tol", config.rel_tol, &context)?;
    if config.max_newton_iters == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} max_newton_iters"),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if let Some(t_end) = config.t_end_s {
        validate_positive_finite("t_end_s", t_end, &context)?;
    }
    if config.record_every == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} record_every"),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_finite(field: &str, value: f64, context: &str) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} {field}"),
            value: value.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}

fn validate_positive_finite(field: &str, value: f64, context: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} {field}"),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}

fn validate_open_fraction(field: &str, value: f64, context: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} {field}"),
            value: value.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    Ok(())
}
