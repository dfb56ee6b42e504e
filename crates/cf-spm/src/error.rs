use thiserror::Error;

/// Model construction failures; stepping itself is a direct linear update
/// and cannot fail.
#[derive(Error, Debug)]
pub enum SpmError {
    #[error("Material error: {0}")]
    Material(#[from] cf_materials::MaterialError),

    #[error("Design error: {0}")]
    Design(#[from] cf_design::ValidationError),
}

pub type SpmResult<T> = Result<T, SpmError>;
