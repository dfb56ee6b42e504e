//! Material property errors.

use crate::spec::MaterialRole;
use thiserror::Error;

/// Result type for material operations.
pub type MaterialResult<T> = Result<T, MaterialError>;

/// Errors raised while validating or resolving material data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterialError {
    /// OCP table reverses direction beyond tolerance.
    #[error("Material {material}: OCP table is not monotonic near soc={soc}")]
    NonMonotonicOcp { material: String, soc: f64 },

    /// OCP table has fewer than two points.
    #[error("Material {material}: OCP table needs at least 2 points, got {len}")]
    OcpTableTooShort { material: String, len: usize },

    /// OCP soc grid must be strictly increasing.
    #[error("Material {material}: OCP soc grid not strictly increasing at index {index}")]
    NonIncreasingSoc { material: String, index: usize },

    /// A property required by the material's role is absent.
    #[error("Material {material}: missing required property {what}")]
    MissingProperty {
        material: String,
        what: &'static str,
    },

    /// A property that must be positive is not.
    #[error("Material {material}: {what} must be positive, got {value}")]
    NonPositive {
        material: String,
        what: &'static str,
        value: f64,
    },

    /// A property is outside its admissible range.
    #[error("Material {material}: {what} out of range, got {value}")]
    OutOfRange {
        material: String,
        what: &'static str,
        value: f64,
    },

    /// The spec's role does not match the slot it is used in.
    #[error("Material {material}: expected role {expected:?}, found {found:?}")]
    WrongRole {
        material: String,
        expected: MaterialRole,
        found: MaterialRole,
    },

    /// Catalog lookup failed.
    #[error("Unknown material id: {id}")]
    UnknownMaterial { id: String },

    /// Scalar inversion of the kinetics law failed to converge.
    #[error("Kinetics inversion failed for {what}")]
    KineticsInversion { what: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MaterialError::NonMonotonicOcp {
            material: "nmc_111".into(),
            soc: 0.4,
        };
        assert!(err.to_string().contains("nmc_111"));

        let err = MaterialError::UnknownMaterial {
            id: "unobtainium".into(),
        };
        assert!(err.to_string().contains("unobtainium"));
    }
}
