//! Error types for store operations.

use lumen_core::PresetId;
use thiserror::Error;

/// Errors that can occur while accessing the preset store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared buffer is held by someone else
    #[error("shared buffer unavailable")]
    BufferUnavailable,

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a data directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A tier file does not hold a JSON object
    #[error("file '{path}' is not a valid preset document: {source}")]
    Corrupt {
        /// Path of the unparseable file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization produced no output
    #[error("failed to encode preset document: {0}")]
    Encode(#[source] serde_json::Error),

    /// No record stored under the id
    #[error("preset {0} not found")]
    RecordNotFound(PresetId),

    /// The id is reserved for this operation
    #[error("preset id {0} is reserved")]
    InvalidId(PresetId),

    /// The id is write-protected
    #[error("preset {0} is protected")]
    Protected(PresetId),
}

impl StoreError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a directory creation error.
    pub fn create_dir(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        StoreError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt document error.
    pub fn corrupt(path: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            source,
        }
    }

    /// Returns true for filesystem failures, including unparseable files.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            StoreError::ReadFile { .. }
                | StoreError::WriteFile { .. }
                | StoreError::CreateDir { .. }
                | StoreError::Corrupt { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    fn mock_json_err() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{").unwrap_err()
    }

    #[test]
    fn read_file_factory_produces_correct_variant() {
        let err = StoreError::read_file("/presets.json", mock_io_err());
        assert!(matches!(err, StoreError::ReadFile { ref path, .. } if path == "/presets.json"));
        assert!(err.is_io());
    }

    #[test]
    fn write_file_factory_produces_correct_variant() {
        let err = StoreError::write_file("/tmp.json", mock_io_err());
        assert!(matches!(err, StoreError::WriteFile { ref path, .. } if path == "/tmp.json"));
        assert!(err.is_io());
    }

    #[test]
    fn corrupt_display() {
        let err = StoreError::corrupt("/presets.json", mock_json_err());
        let msg = err.to_string();
        assert!(msg.contains("not a valid preset document"), "got: {msg}");
        assert!(msg.contains("/presets.json"), "got: {msg}");
        assert!(err.is_io());
    }

    #[test]
    fn record_not_found_display() {
        let err = StoreError::RecordNotFound(PresetId::new(5));
        assert_eq!(err.to_string(), "preset 5 not found");
        assert!(!err.is_io());
    }

    #[test]
    fn protected_display() {
        let err = StoreError::Protected(PresetId::new(1));
        assert_eq!(err.to_string(), "preset 1 is protected");
    }

    #[test]
    fn io_variants_expose_source() {
        assert!(StoreError::read_file("/x", mock_io_err()).source().is_some());
        assert!(StoreError::write_file("/x", mock_io_err()).source().is_some());
        assert!(StoreError::Encode(mock_json_err()).source().is_some());
    }

    #[test]
    fn plain_variants_have_no_source() {
        assert!(StoreError::BufferUnavailable.source().is_none());
        assert!(StoreError::InvalidId(PresetId::new(0)).source().is_none());
    }
}
