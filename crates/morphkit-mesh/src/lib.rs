//! Mesh topology, morph targets, and RBF warping for morphkit.
//!
//! This crate provides:
//! - [`Mesh`], a polygon mesh whose faces are organised into named groups
//! - [`MorphTarget`] and [`TargetStore`], for loading, caching, and applying
//!   per-vertex displacement sets
//! - [`WarpField`], a multiquadric RBF used to carry a morph from one mesh to another
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use morphkit_core::{TargetOptions, Vec3};
//! use morphkit_mesh::{ApplyOptions, Mesh, MorphTarget, TargetCache, TargetStore};
//!
//! let mut mesh = Mesh::new("tri", 3);
//! for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
//!     mesh.create_vertex(p);
//! }
//! let group = mesh.create_face_group("body").unwrap();
//! mesh.create_face(group, &[0, 1, 2], None).unwrap();
//!
//! let store = TargetStore::new(Arc::new(TargetCache::new()), TargetOptions::default());
//! store.register(MorphTarget::parse(&mesh, "lift", "2 0 0 1").unwrap());
//! store.apply(&mut mesh, "lift", 0.5, &ApplyOptions::default()).unwrap();
//! assert_eq!(mesh.position(2), Some(Vec3::new(0.0, 1.0, 0.5)));
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Index and float conversions are intentional in geometry code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::float_cmp)]

pub mod mesh;
pub mod shadow;
pub mod target;
pub mod warp;

pub use mesh::{Face, FaceGroup, FaceId, FaceSpec, GroupId, Mesh, MeshSource, VertexId};
pub use shadow::ShadowBuffer;
pub use target::{ApplyOptions, MorphTarget, TargetCache, TargetOrigin, TargetStore};
pub use warp::{warp_target, WarpField};
