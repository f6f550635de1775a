//! Core abstractions for morphkit.
//!
//! This crate provides the fundamental types shared by the other morphkit crates:
//! - [`MorphError`] and the crate-wide [`Result`] alias
//! - [`Options`], the serde-backed session configuration
//! - [`RenderSink`] and [`DisplacementListener`], the seams through which a mesh
//!   reports changes to the outside world

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Option structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]

pub mod error;
pub mod options;
pub mod sink;

pub use error::{MorphError, Result};
pub use options::{FallbackOptions, MeshOptions, Options, TargetOptions, WarpOptions};
pub use sink::{
    DisplacementListener, RenderLayout, RenderSink, Rgba, UpdateFields, VertexUpdate, WHITE,
};

// Re-export glam types for convenience
pub use glam::{Vec2, Vec3};
