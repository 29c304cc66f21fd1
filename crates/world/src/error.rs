//! Error types for the world crate

use basalt_core::BasaltError;

/// Block-state registry and section errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// File I/O error
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    /// Block report could not be parsed
    #[error("Invalid block report: {0}")]
    InvalidFormat(String),

    /// Registry would contain no states
    #[error("Block registry is empty")]
    Empty,

    /// A state that is not part of the registry
    #[error("Unknown block state: {0}")]
    UnknownState(u32),

    /// Block coordinates outside the section or column
    #[error("Coordinates out of range: ({0}, {1}, {2})")]
    OutOfRange(i32, i32, i32),
}

impl From<RegistryError> for BasaltError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::FileError(e) => BasaltError::Io(e),
            other => BasaltError::InvalidData(other.to_string()),
        }
    }
}

/// Result type for world operations
pub type Result<T> = std::result::Result<T, RegistryError>;
