use thiserror::Error;

use crate::mirror::ImageCategory;

pub type Result<T> = std::result::Result<T, MirrorError>;

// Exit-code bits set by the CLI wrapper; the core only classifies.
pub const GENERIC_ERROR_CODE: i32 = 1 << 0;
pub const RELEASE_IMAGE_ERROR_CODE: i32 = 1 << 1;
pub const OPERATOR_ERROR_CODE: i32 = 1 << 2;
pub const HELM_IMAGE_ERROR_CODE: i32 = 1 << 3;
pub const ADDITIONAL_IMAGE_ERROR_CODE: i32 = 1 << 4;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid image reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("manifest fetch for {image}: {reason}")]
    ManifestFetch { image: String, reason: String },

    #[error("catalog {catalog} has more than one manifest in its index")]
    AmbiguousCatalog { catalog: String },

    #[error("label {label} not found in config blob of {catalog}")]
    MissingConfigsLabel { catalog: String, label: String },

    #[error("catalog extraction for {catalog}: {reason}")]
    CatalogExtract { catalog: String, reason: String },

    #[error("mapping {line:?} expected to have exactly one {separator:?}")]
    MalformedMapping { line: String, separator: String },

    #[error("resource name {name:?} is not a valid RFC 1123 DNS label")]
    NameViolation { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{} errors during {stage}: {}", .errors.len(), .errors.join("; "))]
    Aggregate { stage: String, errors: Vec<String> },
}

impl MirrorError {
    /// Map this error onto the CLI exit-code bitmask.
    pub fn exit_code(&self) -> i32 {
        match self {
            MirrorError::ManifestFetch { .. } => RELEASE_IMAGE_ERROR_CODE,
            MirrorError::AmbiguousCatalog { .. }
            | MirrorError::MissingConfigsLabel { .. }
            | MirrorError::CatalogExtract { .. } => OPERATOR_ERROR_CODE,
            _ => GENERIC_ERROR_CODE,
        }
    }
}

/// Collects per-record errors during a pipeline stage so a single failing
/// image or catalog does not abort the whole run. `NameViolation` and
/// `MalformedMapping` are not collectable: they abort the stage early.
#[derive(Debug, Default)]
pub struct ErrorList {
    stage: String,
    errors: Vec<String>,
}

impl ErrorList {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, context: &str, err: MirrorError) {
        tracing::error!(context = %context, error = %err, "collected stage error");
        self.errors.push(format!("{}: {}", context, err));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Resolve the stage: `Ok(())` if nothing was collected, otherwise a
    /// single aggregated error.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(MirrorError::Aggregate {
                stage: self.stage,
                errors: self.errors,
            })
        }
    }
}

/// Exit-code bit for a whole category of work, used when aggregating.
pub fn category_error_code(category: ImageCategory) -> i32 {
    match category {
        ImageCategory::OcpRelease | ImageCategory::OcpReleaseContent => RELEASE_IMAGE_ERROR_CODE,
        ImageCategory::OperatorCatalog
        | ImageCategory::OperatorBundle
        | ImageCategory::OperatorRelatedImage => OPERATOR_ERROR_CODE,
        ImageCategory::CincinnatiGraph => RELEASE_IMAGE_ERROR_CODE,
        ImageCategory::Generic => ADDITIONAL_IMAGE_ERROR_CODE,
    }
}
