//! Geometry computation methods for meshes.
//!
//! - Face normals from the first three corners
//! - Vertex normals as the normalized sum of incident face normals
//! - Axis-aligned bounding box

use glam::Vec3;

use super::{FaceId, Mesh, VertexId};

/// Unit normal of the plane through three points, or zero if they are collinear.
pub(crate) fn plane_normal(v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    (v1 - v0).cross(v2 - v0).normalize_or_zero()
}

impl Mesh {
    /// Recomputes the normal of one face from its first three corners.
    ///
    /// Faces with fewer than three corners get `+Z`.
    pub fn compute_face_normal(&mut self, face: FaceId) {
        let Some(f) = self.faces.get(face) else {
            return;
        };
        let normal = if f.vertices.len() >= 3 {
            plane_normal(
                self.positions[f.vertices[0]],
                self.positions[f.vertices[1]],
                self.positions[f.vertices[2]],
            )
        } else {
            Vec3::Z
        };
        self.faces[face].normal = normal;
    }

    /// Recomputes the normal of one vertex from the current normals of its faces.
    ///
    /// A vertex without faces, or whose face normals cancel out, gets zero.
    pub fn compute_vertex_normal(&mut self, vertex: VertexId) {
        let Some(shared) = self.shared_faces.get(vertex) else {
            return;
        };
        let sum: Vec3 = shared.iter().map(|&f| self.faces[f].normal).sum();
        self.normals[vertex] = sum.normalize_or_zero();
    }

    /// Recomputes face normals, then vertex normals.
    ///
    /// `None` selects every face or vertex. Faces are always done first so that
    /// vertex normals see fresh face normals.
    pub fn recompute_normals(&mut self, faces: Option<&[FaceId]>, vertices: Option<&[VertexId]>) {
        match faces {
            Some(faces) => {
                for &face in faces {
                    self.compute_face_normal(face);
                }
            }
            None => {
                for face in 0..self.faces.len() {
                    self.compute_face_normal(face);
                }
            }
        }
        match vertices {
            Some(vertices) => {
                for &vertex in vertices {
                    self.compute_vertex_normal(vertex);
                }
            }
            None => {
                for vertex in 0..self.positions.len() {
                    self.compute_vertex_normal(vertex);
                }
            }
        }
    }

    /// Returns the axis-aligned bounding box of the current positions.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_normal_degenerate() {
        assert_eq!(plane_normal(Vec3::ZERO, Vec3::X, Vec3::X * 2.0), Vec3::ZERO);
    }

    #[test]
    fn test_quad_normal_uses_first_three_corners() {
        let mut mesh = Mesh::new("bent", 4);
        mesh.create_vertex(Vec3::ZERO);
        mesh.create_vertex(Vec3::X);
        mesh.create_vertex(Vec3::new(1.0, 1.0, 0.0));
        // Fourth corner lifted off the plane of the first three
        mesh.create_vertex(Vec3::new(0.0, 1.0, 5.0));
        let group = mesh.create_face_group("g").unwrap();
        mesh.create_face(group, &[0, 1, 2, 3], None).unwrap();
        mesh.recompute_normals(None, None);
        assert_eq!(mesh.face(0).unwrap().normal(), Vec3::Z);
        assert_eq!(mesh.normal(3), Some(Vec3::Z));
    }

    #[test]
    fn test_opposite_faces_cancel() {
        let mut mesh = Mesh::new("card", 3);
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            mesh.create_vertex(p);
        }
        let group = mesh.create_face_group("g").unwrap();
        mesh.create_face(group, &[0, 1, 2], None).unwrap();
        mesh.create_face(group, &[0, 2, 1], None).unwrap();
        mesh.recompute_normals(None, None);
        assert_eq!(mesh.normal(0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_lone_vertex_normal_is_zero() {
        let mut mesh = Mesh::new("points", 3);
        mesh.create_vertex(Vec3::ONE);
        mesh.recompute_normals(None, None);
        assert_eq!(mesh.normal(0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_subset_recompute_leaves_others() {
        let mut mesh = Mesh::new("tris", 3);
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(5.0, 0.0, 0.0)] {
            mesh.create_vertex(p);
        }
        let group = mesh.create_face_group("g").unwrap();
        mesh.create_face(group, &[0, 1, 2], None).unwrap();
        mesh.create_face(group, &[1, 3, 2], None).unwrap();
        mesh.recompute_normals(Some(&[0][..]), Some(&[0][..]));
        assert_eq!(mesh.face(0).unwrap().normal(), Vec3::Z);
        assert_eq!(mesh.face(1).unwrap().normal(), Vec3::ZERO);
        assert_eq!(mesh.normal(0), Some(Vec3::Z));
        assert_eq!(mesh.normal(3), Some(Vec3::ZERO));
    }

    #[test]
    fn test_bounding_box() {
        let mut mesh = Mesh::new("box", 3);
        assert!(mesh.bounding_box().is_none());
        mesh.create_vertex(Vec3::new(1.0, -2.0, 3.0));
        mesh.create_vertex(Vec3::new(-1.0, 4.0, 0.0));
        assert_eq!(
            mesh.bounding_box(),
            Some((Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 4.0, 3.0)))
        );
    }
}
