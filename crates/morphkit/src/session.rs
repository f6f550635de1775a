//! Session state: configuration, the shared target cache, and fallback policy.

use std::path::Path;
use std::sync::Arc;

use morphkit_core::{MorphError, Options, Result, WarpOptions};
use morphkit_mesh::{
    ApplyOptions, Mesh, MeshSource, MorphTarget, TargetCache, TargetStore, VertexId,
};

use crate::fallback::FallbackPolicy;

/// Everything that outlives a single mesh.
///
/// Dropping the session drops its target cache.
#[derive(Debug)]
pub struct Session {
    options: Options,
    store: TargetStore,
    fallback: FallbackPolicy,
}

impl Session {
    /// Creates a session with the given options and an empty cache.
    pub fn new(options: Options) -> Self {
        let cache = Arc::new(TargetCache::new());
        let store = TargetStore::new(cache, options.target.clone());
        let fallback = FallbackPolicy::from_options(&options.fallback);
        log::info!(
            "morphkit session started (target root: {})",
            options
                .target
                .root
                .as_deref()
                .map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
        );
        Self {
            options,
            store,
            fallback,
        }
    }

    /// Creates a session from a JSON options file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Options::load(path)?))
    }

    /// Returns the session options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the target store.
    pub fn store(&self) -> &TargetStore {
        &self.store
    }

    /// Returns the shared target cache.
    pub fn cache(&self) -> &Arc<TargetCache> {
        self.store.cache()
    }

    /// Returns the fallback policy.
    pub fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }

    /// Replaces the fallback policy.
    pub fn set_fallback(&mut self, fallback: FallbackPolicy) {
        self.fallback = fallback;
    }

    /// Builds a mesh using the session's mesh options.
    pub fn build_mesh(&self, name: impl Into<String>, source: &MeshSource) -> Result<Mesh> {
        Mesh::from_source(name, source, &self.options.mesh)
    }

    /// Creates an empty mesh using the session's mesh options.
    pub fn empty_mesh(&self, name: impl Into<String>) -> Mesh {
        Mesh::with_options(name, self.options.mesh.default_arity, &self.options.mesh)
    }

    /// Returns the target for `key`, loading it, or a configured substitute,
    /// on first use.
    pub fn target(&self, mesh: &Mesh, key: &str) -> Result<Arc<MorphTarget>> {
        self.fallback.get_or_load(&self.store, mesh, key)
    }

    /// Applies a target, resolving missing keys through the fallback policy.
    pub fn apply(
        &self,
        mesh: &mut Mesh,
        key: &str,
        factor: f32,
        options: &ApplyOptions,
    ) -> Result<bool> {
        let target = match self.target(mesh, key) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("cannot apply morph target '{key}': {e}");
                return Err(e);
            }
        };
        TargetStore::apply_target(mesh, &target, factor, options)
    }

    /// Warps a target of `source` onto `destination` and registers it as
    /// `warped_key`, using the session's warp options.
    pub fn warp_target(
        &self,
        source: &Mesh,
        source_key: &str,
        destination: &Mesh,
        warped_key: &str,
        landmarks: &[VertexId],
    ) -> Result<Arc<MorphTarget>> {
        self.warp_target_with(
            source,
            source_key,
            destination,
            warped_key,
            landmarks,
            &self.options.warp,
        )
    }

    /// Like [`warp_target`](Self::warp_target) with explicit warp options.
    pub fn warp_target_with(
        &self,
        source: &Mesh,
        source_key: &str,
        destination: &Mesh,
        warped_key: &str,
        landmarks: &[VertexId],
        options: &WarpOptions,
    ) -> Result<Arc<MorphTarget>> {
        let source_key = self.target(source, source_key)?.key().to_string();
        self.store
            .register_warped(source, &source_key, destination, warped_key, landmarks, options)
            .map_err(|e| {
                if let MorphError::WarpSolveFailed(reason) = &e {
                    log::warn!("warping '{source_key}' failed: {reason}");
                }
                e
            })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::info!(
            "morphkit session closed ({} cached targets)",
            self.cache().len()
        );
    }
}
