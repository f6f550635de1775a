//! Morph targets.
//!
//! A morph target is a sparse set of per-vertex displacements. It is parsed
//! once against the mesh it belongs to, at which point the affected vertices
//! and the faces they touch are frozen; applying it afterwards only walks
//! those lists.
//!
//! On disk a target is plain text, one `index dx dy dz` record per line.

mod cache;
mod store;

pub use cache::TargetCache;
pub use store::{ApplyOptions, TargetStore};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use morphkit_core::{MorphError, Result};

use crate::mesh::{FaceId, Mesh, VertexId};

/// Where a target's deltas came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Parsed from a target file.
    File,
    /// Built in memory, e.g. by warping another target.
    Registered,
}

/// A parsed morph target.
#[derive(Debug)]
pub struct MorphTarget {
    key: String,
    deltas: BTreeMap<VertexId, Vec3>,
    vertices: Vec<VertexId>,
    faces: Vec<FaceId>,
    origin: TargetOrigin,
    // f32 bits; NaN until the first apply
    last_factor: AtomicU32,
}

impl MorphTarget {
    /// Parses target text for `mesh`.
    ///
    /// Blank lines are ignored and records for vertices the mesh does not have
    /// are skipped. When an index appears twice the later record wins.
    pub fn parse(mesh: &Mesh, key: impl Into<String>, text: &str) -> Result<Self> {
        let key = key.into();
        let vertex_count = mesh.vertex_count();
        let mut deltas = BTreeMap::new();
        let mut skipped = 0usize;

        for (number, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let parse_error = |reason: String| MorphError::TargetParse {
                key: key.clone(),
                line: number + 1,
                reason,
            };
            if fields.len() != 4 {
                return Err(parse_error(format!(
                    "expected 4 fields, found {}",
                    fields.len()
                )));
            }
            let index: usize = fields[0]
                .parse()
                .map_err(|_| parse_error(format!("invalid vertex index '{}'", fields[0])))?;
            let mut delta = [0.0f32; 3];
            for (axis, field) in fields[1..].iter().enumerate() {
                let value: f32 = field
                    .parse()
                    .map_err(|_| parse_error(format!("invalid coordinate '{field}'")))?;
                if !value.is_finite() {
                    return Err(parse_error(format!("non-finite coordinate '{field}'")));
                }
                delta[axis] = value;
            }
            if index >= vertex_count {
                skipped += 1;
                continue;
            }
            deltas.insert(index, Vec3::from_array(delta));
        }

        if skipped > 0 {
            log::warn!(
                "morph target '{key}': skipped {skipped} records beyond vertex count {vertex_count}"
            );
        }
        let target = Self::from_deltas(mesh, key, deltas, TargetOrigin::File);
        log::debug!(
            "parsed morph target '{}': {} vertices, {} faces",
            target.key,
            target.vertices.len(),
            target.faces.len()
        );
        Ok(target)
    }

    /// Builds a target from in-memory deltas. Out-of-range vertices are dropped.
    pub fn from_deltas(
        mesh: &Mesh,
        key: impl Into<String>,
        deltas: impl IntoIterator<Item = (VertexId, Vec3)>,
        origin: TargetOrigin,
    ) -> Self {
        let vertex_count = mesh.vertex_count();
        let deltas: BTreeMap<VertexId, Vec3> = deltas
            .into_iter()
            .filter(|&(v, _)| v < vertex_count)
            .collect();
        let vertices: Vec<VertexId> = deltas.keys().copied().collect();
        let faces: BTreeSet<FaceId> = vertices
            .iter()
            .flat_map(|&v| mesh.shared_faces(v).iter().copied())
            .collect();
        Self {
            key: key.into(),
            deltas,
            vertices,
            faces: faces.into_iter().collect(),
            origin,
            last_factor: AtomicU32::new(f32::NAN.to_bits()),
        }
    }

    /// Returns the key this target is cached under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns where the deltas came from.
    pub fn origin(&self) -> TargetOrigin {
        self.origin
    }

    /// Returns the delta stored for a vertex.
    pub fn delta(&self, vertex: VertexId) -> Option<Vec3> {
        self.deltas.get(&vertex).copied()
    }

    /// Returns all deltas, ordered by vertex.
    pub fn deltas(&self) -> &BTreeMap<VertexId, Vec3> {
        &self.deltas
    }

    /// Returns the affected vertices, ascending.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Returns every face that contains an affected vertex, ascending.
    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    /// Returns true if the target affects no vertex.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the factor this target was last applied with.
    pub fn last_applied_factor(&self) -> Option<f32> {
        let factor = f32::from_bits(self.last_factor.load(Ordering::Relaxed));
        (!factor.is_nan()).then_some(factor)
    }

    pub(crate) fn record_factor(&self, factor: f32) {
        self.last_factor.store(factor.to_bits(), Ordering::Relaxed);
    }

    /// Serializes the deltas in target file format.
    pub fn to_text(&self) -> String {
        write_records(self.deltas.iter().map(|(&v, &d)| (v, d)))
    }
}

/// Formats `index dx dy dz` records with six decimals.
pub(crate) fn write_records(records: impl IntoIterator<Item = (VertexId, Vec3)>) -> String {
    let mut text = String::new();
    for (vertex, d) in records {
        // Writing to a String cannot fail.
        let _ = writeln!(text, "{vertex} {:.6} {:.6} {:.6}", d.x, d.y, d.z);
    }
    text
}
