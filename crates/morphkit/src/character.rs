//! Per-mesh bookkeeping of applied target values.

use std::collections::BTreeMap;

use morphkit_core::Result;
use morphkit_mesh::{ApplyOptions, Mesh};

use crate::session::Session;

/// A mesh together with the value each morph target is currently set to.
///
/// Targets are additive, so changing a value applies only the difference from
/// the current one.
#[derive(Debug)]
pub struct Character {
    mesh: Mesh,
    values: BTreeMap<String, f32>,
    apply_options: ApplyOptions,
}

impl Character {
    /// Wraps a mesh in its rest pose.
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            values: BTreeMap::new(),
            apply_options: ApplyOptions::default(),
        }
    }

    /// Sets the options used for every application.
    ///
    /// The face group restriction, if any, applies to all targets.
    pub fn with_apply_options(mut self, options: ApplyOptions) -> Self {
        self.apply_options = options;
        self
    }

    /// Returns the mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Returns the mesh mutably.
    ///
    /// Moving vertices directly is not tracked by [`target_value`](Self::target_value).
    pub fn mesh_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    /// Unwraps the mesh.
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    /// Returns the value `key` is currently set to, zero if never set.
    pub fn target_value(&self, key: &str) -> f32 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Returns every target with a non-zero value, ordered by key.
    pub fn applied_targets(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Sets `key` to `value` by applying the difference from its current value.
    ///
    /// Returns whether the mesh was touched. On error the recorded value is
    /// left unchanged.
    pub fn set_target(&mut self, session: &Session, key: &str, value: f32) -> Result<bool> {
        let delta = value - self.target_value(key);
        if delta == 0.0 {
            return Ok(false);
        }
        let applied = session.apply(&mut self.mesh, key, delta, &self.apply_options)?;
        if value == 0.0 {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_string(), value);
        }
        log::debug!("set '{key}' to {value} on mesh '{}'", self.mesh.name());
        Ok(applied)
    }

    /// Returns the mesh to its rest pose and forgets all target values.
    pub fn reset_targets(&mut self) {
        self.mesh.reset_to_rest(true, true);
        log::debug!(
            "reset {} targets on mesh '{}'",
            self.values.len(),
            self.mesh.name()
        );
        self.values.clear();
    }
}
