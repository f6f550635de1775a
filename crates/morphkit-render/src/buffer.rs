//! Duplicated render vertex array.
//!
//! A logical mesh vertex that carries different UVs on different faces is
//! split into several render slots. [`RenderBuffer`] keeps one packed
//! [`RenderVertex`] per slot and mirrors every logical update into all of
//! them, tracking the dirty slot range so an uploader only copies what changed.

use std::any::Any;
use std::ops::Range;

use morphkit_core::{RenderLayout, RenderSink, Rgba, VertexUpdate, WHITE};

/// One render slot, packed for upload.
/// Note: 28 bytes, no padding; every field is 4-byte aligned.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderVertex {
    /// Position (xyz).
    pub position: [f32; 3],
    /// Normal (xyz).
    pub normal: [f32; 3],
    /// Color (RGBA, 8 bits per channel).
    pub color: [u8; 4],
}

impl Default for RenderVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            color: WHITE,
        }
    }
}

/// Counters for pushes received since the buffer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    /// Logical vertex updates received.
    pub vertex_pushes: usize,
    /// Single-corner color updates received.
    pub corner_pushes: usize,
    /// Render slots written in total.
    pub slot_writes: usize,
}

/// A CPU-side render vertex array that implements [`RenderSink`].
#[derive(Debug, Default)]
pub struct RenderBuffer {
    layout: RenderLayout,
    vertices: Vec<RenderVertex>,
    dirty: Option<Range<usize>>,
    stats: PushStats,
}

impl RenderBuffer {
    /// Creates an empty buffer. Its size is set when a mesh attaches it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot layout in use.
    pub fn layout(&self) -> &RenderLayout {
        &self.layout
    }

    /// Returns the number of render slots.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the buffer holds no slots.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns all render slots.
    pub fn vertices(&self) -> &[RenderVertex] {
        &self.vertices
    }

    /// Returns one render slot.
    pub fn slot(&self, slot: usize) -> Option<&RenderVertex> {
        self.vertices.get(slot)
    }

    /// Returns the index buffer of the attached mesh.
    pub fn indices(&self) -> &[u32] {
        &self.layout.indices
    }

    /// Returns the packed vertex data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Returns the packed index data as bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.layout.indices)
    }

    /// Returns the push counters.
    pub fn stats(&self) -> PushStats {
        self.stats
    }

    /// Returns the range of slots written since the last call, and resets it.
    pub fn take_dirty(&mut self) -> Option<Range<usize>> {
        self.dirty.take()
    }

    fn mark_dirty(&mut self, slot: usize) {
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(slot)..range.end.max(slot + 1),
            None => slot..slot + 1,
        });
        self.stats.slot_writes += 1;
    }
}

impl RenderSink for RenderBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn set_layout(&mut self, layout: RenderLayout) {
        log::debug!(
            "render buffer resized to {} slots ({} indices)",
            layout.slot_count,
            layout.indices.len()
        );
        self.vertices = vec![RenderVertex::default(); layout.slot_count];
        self.layout = layout;
        self.dirty = None;
    }

    fn push_vertex(&mut self, update: &VertexUpdate) {
        self.stats.vertex_pushes += 1;
        for i in 0..self.layout.slots(update.index).len() {
            let slot = self.layout.slots(update.index)[i] as usize;
            let Some(target) = self.vertices.get_mut(slot) else {
                continue;
            };
            if update.fields.position {
                target.position = update.position.to_array();
            }
            if update.fields.normal {
                target.normal = update.normal.to_array();
            }
            if update.fields.color {
                target.color = update.color;
            }
            self.mark_dirty(slot);
        }
    }

    fn push_corner_color(&mut self, face: usize, corner: usize, color: Rgba) {
        self.stats.corner_pushes += 1;
        let Some(slot) = self.layout.corner_slot(face, corner) else {
            return;
        };
        let slot = slot as usize;
        if let Some(target) = self.vertices.get_mut(slot) {
            target.color = color;
            self.mark_dirty(slot);
        }
    }
}
