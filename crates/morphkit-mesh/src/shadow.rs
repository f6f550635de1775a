//! Secondary position buffer that follows morph displacements.

use std::any::Any;

use glam::Vec3;
use morphkit_core::DisplacementListener;

/// A copy of a mesh's positions that receives every morph delta.
///
/// Useful for keeping an unsubdivided or otherwise derived copy of the
/// geometry in step with the mesh it shadows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowBuffer {
    positions: Vec<Vec3>,
}

impl ShadowBuffer {
    /// Creates a shadow buffer starting at the given positions.
    pub fn new(positions: impl Into<Vec<Vec3>>) -> Self {
        Self {
            positions: positions.into(),
        }
    }

    /// Returns the shadowed positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }
}

impl DisplacementListener for ShadowBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_displace(&mut self, vertex: usize, delta: Vec3) {
        if let Some(position) = self.positions.get_mut(vertex) {
            *position += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mesh;

    #[test]
    fn test_shadow_follows_displacement() {
        let mut mesh = Mesh::new("m", 3);
        mesh.create_vertex(Vec3::ZERO);
        mesh.create_vertex(Vec3::X);
        let shadow = ShadowBuffer::new(mesh.positions());
        mesh.add_listener(Box::new(shadow));
        mesh.displace(1, Vec3::Y);
        mesh.displace(7, Vec3::Y);
        let shadow = mesh.listener::<ShadowBuffer>().unwrap();
        assert_eq!(shadow.positions(), &[Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)]);

        mesh.listener_mut::<ShadowBuffer>().unwrap().on_displace(0, Vec3::X);
        assert_eq!(mesh.position(0), Some(Vec3::ZERO));
        assert_eq!(mesh.take_listeners().len(), 1);
        assert!(mesh.listener::<ShadowBuffer>().is_none());
    }
}
