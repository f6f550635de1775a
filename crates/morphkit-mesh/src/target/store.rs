//! Loading and applying morph targets.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use morphkit_core::{MorphError, Result, TargetOptions, WarpOptions};

use super::{write_records, MorphTarget, TargetCache, TargetOrigin};
use crate::mesh::{Mesh, VertexId};
use crate::warp;

/// How [`TargetStore::apply`] touches the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOptions {
    /// Restrict the working set to the vertices and faces of this group.
    pub face_group: Option<String>,
    /// Recompute normals of the working set after moving it.
    pub recalc_normals: bool,
    /// Push the working set to the mesh's render sink.
    pub push_to_sink: bool,
    /// Per-axis multiplier applied on top of the factor.
    pub axis_scale: Vec3,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            face_group: None,
            recalc_normals: true,
            push_to_sink: true,
            axis_scale: Vec3::ONE,
        }
    }
}

impl ApplyOptions {
    /// Restricts the working set to a face group.
    pub fn with_face_group(mut self, name: impl Into<String>) -> Self {
        self.face_group = Some(name.into());
        self
    }

    /// Sets whether normals are recomputed.
    pub fn with_recalc_normals(mut self, recalc: bool) -> Self {
        self.recalc_normals = recalc;
        self
    }

    /// Sets whether the render sink is updated.
    pub fn with_push_to_sink(mut self, push: bool) -> Self {
        self.push_to_sink = push;
        self
    }

    /// Sets the per-axis scale.
    pub fn with_axis_scale(mut self, scale: Vec3) -> Self {
        self.axis_scale = scale;
        self
    }
}

/// Loads, caches, and applies morph targets.
///
/// The store holds no per-mesh state: which factor each target is currently
/// applied at is the caller's business.
#[derive(Debug)]
pub struct TargetStore {
    cache: Arc<TargetCache>,
    options: TargetOptions,
}

impl TargetStore {
    /// Creates a store backed by `cache`.
    pub fn new(cache: Arc<TargetCache>, options: TargetOptions) -> Self {
        Self { cache, options }
    }

    /// Returns the backing cache.
    pub fn cache(&self) -> &Arc<TargetCache> {
        &self.cache
    }

    /// Returns the store options.
    pub fn options(&self) -> &TargetOptions {
        &self.options
    }

    /// Returns the file path for a key.
    pub fn resolve(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        match &self.options.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Reads and parses the target file for `key`, bypassing the cache.
    pub fn load(&self, mesh: &Mesh, key: &str) -> Result<MorphTarget> {
        let path = self.resolve(key);
        log::debug!("loading morph target '{key}' from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MorphError::TargetNotFound(key.to_string()),
            _ => MorphError::IoError(e),
        })?;
        MorphTarget::parse(mesh, key, &text)
    }

    /// Returns the cached target for `key`, loading it on first use.
    pub fn get_or_load(&self, mesh: &Mesh, key: &str) -> Result<Arc<MorphTarget>> {
        self.cache
            .get_or_try_insert_with(key, || self.load(mesh, key))
    }

    /// Caches an in-memory target under its key.
    pub fn register(&self, target: MorphTarget) -> Arc<MorphTarget> {
        log::debug!(
            "registered morph target '{}' ({} vertices)",
            target.key(),
            target.vertices().len()
        );
        self.cache.insert(target)
    }

    /// Applies the target `key` to `mesh` at `factor`.
    ///
    /// Returns `false` if the target affects no vertex. Undo an application by
    /// applying the same target again with the opposite factor.
    pub fn apply(
        &self,
        mesh: &mut Mesh,
        key: &str,
        factor: f32,
        options: &ApplyOptions,
    ) -> Result<bool> {
        let target = self.get_or_load(mesh, key)?;
        Self::apply_target(mesh, &target, factor, options)
    }

    /// Applies an already loaded target.
    pub fn apply_target(
        mesh: &mut Mesh,
        target: &MorphTarget,
        factor: f32,
        options: &ApplyOptions,
    ) -> Result<bool> {
        target.record_factor(factor);
        if target.is_empty() {
            return Ok(false);
        }
        if factor == 0.0 && !options.recalc_normals && !options.push_to_sink {
            return Ok(true);
        }

        let (vertices, faces) = match &options.face_group {
            Some(name) => {
                let (vertices, faces) = mesh.faces_and_vertices_for_groups(&[name])?;
                (Cow::Owned(vertices), Cow::Owned(faces))
            }
            None => (
                Cow::Borrowed(target.vertices()),
                Cow::Borrowed(target.faces()),
            ),
        };

        if factor != 0.0 {
            let scale = options.axis_scale * factor;
            for &v in vertices.iter() {
                match target.delta(v) {
                    Some(delta) if delta != Vec3::ZERO => mesh.displace(v, delta * scale),
                    _ => {}
                }
            }
        }
        if options.recalc_normals {
            mesh.recompute_normals(Some(&*faces), Some(&*vertices));
        }
        if options.push_to_sink {
            mesh.update(Some(&*vertices), true);
        }
        log::debug!(
            "applied morph target '{}' at {factor} to {} vertices",
            target.key(),
            vertices.len()
        );
        Ok(true)
    }

    /// Recomputes and pushes the normals of everything `key` affects.
    ///
    /// Meant for callers that applied several targets with normal
    /// recomputation turned off.
    pub fn recalc_target_normals(&self, mesh: &mut Mesh, key: &str) -> Result<bool> {
        let target = self.get_or_load(mesh, key)?;
        if target.is_empty() {
            return Ok(false);
        }
        mesh.recompute_normals(Some(target.faces()), Some(target.vertices()));
        mesh.update(Some(target.vertices()), true);
        Ok(true)
    }

    /// Writes the displacement of `mesh` from its rest pose as a target file.
    ///
    /// Only vertices that moved further than `save_epsilon` are written; with
    /// `group` set, only that group's vertices are considered. Returns the
    /// number of records written.
    pub fn save_target(
        &self,
        mesh: &Mesh,
        path: impl AsRef<Path>,
        group: Option<&str>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let candidates: Vec<VertexId> = match group {
            Some(name) => mesh.faces_and_vertices_for_groups(&[name])?.0,
            None => (0..mesh.vertex_count()).collect(),
        };
        let epsilon = self.options.save_epsilon;
        let records: Vec<(VertexId, Vec3)> = candidates
            .into_iter()
            .map(|v| (v, mesh.positions()[v] - mesh.rest_positions()[v]))
            .filter(|(_, delta)| delta.length() > epsilon)
            .collect();

        std::fs::write(path, write_records(records.iter().copied()))?;
        if records.is_empty() {
            log::warn!("zero vertices exported to {}", path.display());
        } else {
            log::debug!("saved {} vertices to {}", records.len(), path.display());
        }
        Ok(records.len())
    }

    /// Colors the vertices of `key` by displacement length and pushes the colors.
    ///
    /// The longest delta is red-white `[255, 230, 230]`, shorter ones fade
    /// toward cyan-white, and zero deltas are white.
    pub fn analyze_target(&self, mesh: &mut Mesh, key: &str) -> Result<()> {
        let target = self.get_or_load(mesh, key)?;
        let max = target
            .deltas()
            .values()
            .map(|d| d.length())
            .fold(0.000_01_f32, f32::max);
        for (&vertex, delta) in target.deltas() {
            let length = delta.length();
            let color = if length == 0.0 {
                morphkit_core::WHITE
            } else {
                let red = (length / max * 255.0) as u8;
                let other = 255 - red / 10;
                [red, other, other, 255]
            };
            mesh.set_vertex_color(vertex, color)?;
        }
        Ok(())
    }

    /// Warps the target `source_key` of `source` into the index space of
    /// `destination` and registers the result as `warped_key`.
    pub fn register_warped(
        &self,
        source: &Mesh,
        source_key: &str,
        destination: &Mesh,
        warped_key: &str,
        landmarks: &[VertexId],
        options: &WarpOptions,
    ) -> Result<Arc<MorphTarget>> {
        let target = self.get_or_load(source, source_key)?;
        let deltas = warp::warp_target(
            target.deltas(),
            source.rest_positions(),
            destination.rest_positions(),
            landmarks,
            options,
        )?;
        let warped =
            MorphTarget::from_deltas(destination, warped_key, deltas, TargetOrigin::Registered);
        Ok(self.register(warped))
    }
}
