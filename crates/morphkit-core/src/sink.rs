//! Render sink and displacement listener traits.
//!
//! A [`RenderSink`] receives vertex attribute updates from a mesh. The mesh
//! talks in logical vertex indices; the sink owns the duplicated render array
//! and fans each update out to every slot listed for that vertex in the
//! [`RenderLayout`].

use std::any::Any;
use std::ops::Range;

use glam::Vec3;

/// An RGBA color with 8 bits per channel.
pub type Rgba = [u8; 4];

/// Opaque white, the color of freshly created vertices.
pub const WHITE: Rgba = [255, 255, 255, 255];

/// The attributes of one logical vertex, as pushed to a render sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexUpdate {
    /// Logical vertex index.
    pub index: usize,
    /// Current position.
    pub position: Vec3,
    /// Current normal.
    pub normal: Vec3,
    /// Current color.
    pub color: Rgba,
    /// Which attributes changed.
    pub fields: UpdateFields,
}

/// Flags selecting which attributes of a [`VertexUpdate`] are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFields {
    pub position: bool,
    pub normal: bool,
    pub color: bool,
}

impl UpdateFields {
    /// Position and normal, the fields touched by a morph.
    pub const GEOMETRY: Self = Self {
        position: true,
        normal: true,
        color: false,
    };

    /// Position only.
    pub const POSITION: Self = Self {
        position: true,
        normal: false,
        color: false,
    };

    /// Color only.
    pub const COLOR: Self = Self {
        position: false,
        normal: false,
        color: true,
    };

    /// Everything.
    pub const ALL: Self = Self {
        position: true,
        normal: true,
        color: true,
    };
}

/// Mapping from logical vertices and face corners to render slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderLayout {
    /// Render slots mirroring each logical vertex.
    pub vertex_slots: Vec<Vec<u32>>,
    /// Render slot of each face corner, `None` for faces in hidden groups.
    pub corner_slots: Vec<Vec<Option<u32>>>,
    /// Index buffer, one entry per visible face corner.
    pub indices: Vec<u32>,
    /// Range of `indices` covered by each face group.
    pub group_ranges: Vec<Range<usize>>,
    /// Total number of render slots.
    pub slot_count: usize,
}

impl RenderLayout {
    /// Returns the render slots of a vertex.
    pub fn slots(&self, vertex: usize) -> &[u32] {
        self.vertex_slots.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the render slot of a face corner, if the face is rendered.
    pub fn corner_slot(&self, face: usize, corner: usize) -> Option<u32> {
        self.corner_slots.get(face)?.get(corner).copied().flatten()
    }
}

/// Receiver of vertex attribute updates.
///
/// The core only ever writes to a sink, and writes once per touched logical
/// vertex; fanning out to duplicated slots is the sink's job.
pub trait RenderSink: Any + Send {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Installs the slot layout of the mesh this sink is attached to.
    fn set_layout(&mut self, layout: RenderLayout);

    /// Pushes the attributes of one logical vertex.
    fn push_vertex(&mut self, update: &VertexUpdate);

    /// Pushes a color to a single face corner.
    fn push_corner_color(&mut self, face: usize, corner: usize, color: Rgba);
}

/// Observer of the per-vertex deltas applied by morph targets.
pub trait DisplacementListener: Any + Send {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called once per displaced vertex with the delta just added to its position.
    fn on_displace(&mut self, vertex: usize, delta: Vec3);
}
