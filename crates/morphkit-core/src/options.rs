//! Configuration options for morphkit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Global configuration options for a morphkit session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Mesh construction options.
    pub mesh: MeshOptions,

    /// Morph target loading and saving options.
    pub target: TargetOptions,

    /// RBF warp options.
    pub warp: WarpOptions,

    /// Caller-side fallback naming for missing targets.
    pub fallback: FallbackOptions,
}

impl Options {
    /// Parses options from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let options = Self::from_json_str(&text)?;
        log::debug!("loaded options from {}", path.display());
        Ok(options)
    }

    /// Serializes these options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Options controlling mesh construction and render layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Vertices per primitive for meshes built without an explicit arity.
    pub default_arity: usize,

    /// Face groups whose name contains any of these substrings get no render slots.
    pub hidden_group_patterns: Vec<String>,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            default_arity: 4,
            hidden_group_patterns: vec!["joint".to_string(), "helper".to_string()],
        }
    }
}

impl MeshOptions {
    /// Returns whether a group with this name should be left out of the render layout.
    #[must_use]
    pub fn is_hidden_group(&self, name: &str) -> bool {
        self.hidden_group_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }
}

/// Options for morph target files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Directory that relative target keys are resolved against.
    pub root: Option<PathBuf>,

    /// Minimum distance from the rest position for a vertex to be saved in a target.
    pub save_epsilon: f32,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            root: None,
            save_epsilon: 0.001,
        }
    }
}

/// Options for the RBF warp solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpOptions {
    /// Squared regularizer used when the landmark set has a single point.
    pub singleton_regularizer: f64,

    /// Singular values below this threshold are treated as zero by the solver.
    pub svd_epsilon: f64,

    /// Maximum landmark residual, relative to the largest target coordinate.
    pub residual_tolerance: f64,
}

impl Default for WarpOptions {
    fn default() -> Self {
        Self {
            singleton_regularizer: 1.0,
            svd_epsilon: 1e-12,
            residual_tolerance: 1e-4,
        }
    }
}

/// Substitutions a caller may try when a target key cannot be found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackOptions {
    /// Ordered `(from, to)` substring replacements.
    pub substitutions: Vec<(String, String)>,
}
