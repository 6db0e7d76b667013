use crate::data::DataType;
use thiserror::Error;

/// Why a mapping cannot be rendered yet. Variants are listed in the order they are checked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required dimensions: {}", .0.join(", "))]
    MissingRequiredDimension(Vec<String>),

    #[error("Dimension '{dimension}' needs at least {required} mapped columns, got {actual}")]
    InsufficientMultiValueMapping {
        dimension: String,
        required: usize,
        actual: usize,
    },

    #[error("Data type mismatch: cannot map {} onto '{name}'", type_label(.mapped_type))]
    TypeMismatch {
        dimension: String,
        name: String,
        mapped_type: Option<DataType>,
    },
}

fn type_label(t: &Option<DataType>) -> String {
    t.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Failures while decoding a project file. All are recoverable and leave the pipeline untouched.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Selected project is not valid: {0}")]
    Invalid(String),

    #[error("Invalid version number, please use a suitable deserializer")]
    InvalidVersion,

    #[error("No serializer found for version {0}")]
    UnsupportedVersion(String),

    #[error("Unknown chart! ({0})")]
    UnknownChart(String),

    #[error("Can't open your project. Invalid file")]
    Json(#[from] serde_json::Error),
}
