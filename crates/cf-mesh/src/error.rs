//! Mesh construction errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Too few x nodes: {n_x} (three regions need at least two each)")]
    TooFewNodes { n_x: usize },

    #[error("Too few radial shells: {n_r}")]
    TooFewShells { n_r: usize },

    #[error("Non-positive thickness for {region}: {value}")]
    NonPositiveThickness { region: &'static str, value: f64 },

    #[error("No particle radius for {electrode} (set it on the design or the material)")]
    MissingParticleRadius { electrode: String },

    #[error("Non-positive particle radius for {electrode}: {value}")]
    NonPositiveParticleRadius { electrode: String, value: f64 },
}

pub type MeshResult<T> = Result<T, MeshError>;
