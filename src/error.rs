//! Error types for the object type registry

use std::path::PathBuf;

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, TypeError>;

/// Boxed error returned by external collaborators (providers, caches)
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Object type registry errors
#[derive(Error, Debug)]
pub enum TypeError {
    /// A binding type declares no column referencing the requested object type.
    /// This is a declaration bug, never a runtime condition.
    #[error("Column not found for dependency object type '{object_type}' in binding type '{binding_type}'")]
    ColumnNotFound {
        object_type: String,
        binding_type: String,
    },

    #[error("Object type already registered: {object_type}")]
    DuplicateType { object_type: String },

    #[error("Registry is complete, cannot register object type {object_type}")]
    RegistrySealed { object_type: String },

    #[error("Unknown object type: {0}")]
    UnknownType(String),

    #[error("Invalid manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Provider error for {object_type}: {source}")]
    Provider {
        object_type: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("No provider registered for object type {0}")]
    ProviderMissing(String),

    #[error("Invalid lint pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl TypeError {
    /// Build the declaration error raised by binding where-condition paths
    pub fn column_not_found(object_type: impl Into<String>, binding_type: impl Into<String>) -> Self {
        TypeError::ColumnNotFound {
            object_type: object_type.into(),
            binding_type: binding_type.into(),
        }
    }
}
