//! morphkit: a Rust-native morph target and mesh deformation engine.
//!
//! Build a [`Mesh`], attach a render sink, and blend morph targets into it.
//! Targets are plain text files of per-vertex displacements; they are parsed
//! once per [`Session`] and shared from its cache.
//!
//! # Quick Start
//!
//! ```no_run
//! use morphkit::*;
//!
//! fn main() -> Result<()> {
//!     init();
//!     let session = Session::new(Options::load("morphkit.json")?);
//!
//!     let source = MeshSource {
//!         arity: Some(3),
//!         positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
//!         faces: vec![FaceSpec {
//!             vertices: vec![0, 1, 2],
//!             group: "body".into(),
//!             uv: None,
//!         }],
//!     };
//!     let mut mesh = session.build_mesh("base", &source)?;
//!     mesh.attach(Box::new(RenderBuffer::new()));
//!
//!     let mut character = Character::new(mesh);
//!     character.set_target(&session, "targets/nose-long.target", 0.7)?;
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `morphkit-core`: errors, options, and the render sink and listener traits
//! - `morphkit-mesh`: meshes, morph targets, and RBF warping
//! - `morphkit-render`: a CPU render buffer implementing the sink

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::float_cmp)]

mod character;
mod fallback;
mod init;
mod session;

pub use character::Character;
pub use fallback::FallbackPolicy;
pub use init::init;
pub use session::Session;

// Re-export core types
pub use morphkit_core::{
    DisplacementListener, FallbackOptions, MeshOptions, MorphError, Options, RenderLayout,
    RenderSink, Result, Rgba, TargetOptions, UpdateFields, Vec2, Vec3, VertexUpdate,
    WarpOptions, WHITE,
};

// Re-export mesh types
pub use morphkit_mesh::{
    warp_target, ApplyOptions, Face, FaceGroup, FaceId, FaceSpec, GroupId, Mesh, MeshSource,
    MorphTarget, ShadowBuffer, TargetCache, TargetOrigin, TargetStore, VertexId, WarpField,
};

// Re-export render types
pub use morphkit_render::{PushStats, RenderBuffer, RenderVertex};
