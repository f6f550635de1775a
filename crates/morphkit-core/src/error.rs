//! Error types for morphkit.

use thiserror::Error;

/// The main error type for morphkit operations.
#[derive(Error, Debug)]
pub enum MorphError {
    /// The file backing a morph target does not exist.
    #[error("morph target '{0}' not found")]
    TargetNotFound(String),

    /// A morph target file contains a malformed line.
    #[error("morph target '{key}' line {line}: {reason}")]
    TargetParse {
        /// Key of the target being parsed.
        key: String,
        /// One-based line number of the offending line.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// A face or UV list does not match the mesh's vertices per primitive.
    #[error("arity mismatch: expected {expected} vertices per primitive, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A vertex index is not part of the mesh.
    #[error("vertex index {index} out of range (mesh has {vertex_count} vertices)")]
    VertexOutOfRange { index: usize, vertex_count: usize },

    /// A face index is not part of the mesh.
    #[error("face index {index} out of range (mesh has {face_count} faces)")]
    FaceOutOfRange { index: usize, face_count: usize },

    /// A face group with the given name was not found.
    #[error("face group '{0}' not found")]
    FaceGroupNotFound(String),

    /// A face group with the given name already exists.
    #[error("face group '{0}' already exists")]
    FaceGroupExists(String),

    /// A warp was requested without any landmarks.
    #[error("no landmarks provided for warping")]
    NoLandmarks,

    /// A landmark index is missing from the source or target positions.
    #[error(
        "landmark index {index} out of range (source has {source_len} vertices, target has {target_len})"
    )]
    LandmarkOutOfRange {
        index: usize,
        source_len: usize,
        target_len: usize,
    },

    /// The RBF least-squares solve did not produce usable weights.
    #[error("warp solve failed: {0}")]
    WarpSolveFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MorphError {
    /// Returns true if the caller may recover by retrying with another key
    /// or by skipping the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TargetNotFound(_) | Self::WarpSolveFailed(_))
    }
}

/// A specialized Result type for morphkit operations.
pub type Result<T> = std::result::Result<T, MorphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(MorphError::TargetNotFound("a.target".into()).is_recoverable());
        assert!(MorphError::WarpSolveFailed("singular".into()).is_recoverable());
        assert!(!MorphError::ArityMismatch {
            expected: 4,
            actual: 3
        }
        .is_recoverable());
    }

    #[test]
    fn test_parse_error_message() {
        let err = MorphError::TargetParse {
            key: "nose.target".into(),
            line: 3,
            reason: "expected 4 fields, found 2".into(),
        };
        assert_eq!(
            err.to_string(),
            "morph target 'nose.target' line 3: expected 4 fields, found 2"
        );
    }
}
