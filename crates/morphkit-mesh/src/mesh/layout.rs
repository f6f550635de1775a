//! Render slot layout.
//!
//! Within each visible face group, every distinct `(vertex, uv)` pair seen
//! among face corners gets its own render slot. A vertex used by two groups, or
//! by one group with two different UVs, therefore maps to several slots.

use std::collections::HashMap;

use morphkit_core::RenderLayout;

use super::Mesh;

impl Mesh {
    /// Computes the render layout for the current topology.
    ///
    /// Groups whose name matches a hidden-group pattern contribute no slots
    /// and no indices; their range in `group_ranges` is empty.
    pub fn render_layout(&self) -> RenderLayout {
        let mut vertex_slots: Vec<Vec<u32>> = vec![Vec::new(); self.positions.len()];
        let mut corner_slots: Vec<Vec<Option<u32>>> = self
            .faces
            .iter()
            .map(|face| vec![None; face.vertices.len()])
            .collect();
        let mut indices = Vec::new();
        let mut group_ranges = Vec::with_capacity(self.groups.len());
        let mut slot_count: u32 = 0;

        for group in &self.groups {
            let start = indices.len();
            if !group.visible {
                group_ranges.push(start..start);
                continue;
            }

            let mut seen: HashMap<(usize, Option<u32>), u32> = HashMap::new();
            for &face_id in &group.faces {
                let face = &self.faces[face_id];
                for (corner, &vertex) in face.vertices.iter().enumerate() {
                    let uv = face.uv.as_ref().map(|uv| uv[corner]);
                    let slot = *seen.entry((vertex, uv)).or_insert_with(|| {
                        let slot = slot_count;
                        vertex_slots[vertex].push(slot);
                        slot_count += 1;
                        slot
                    });
                    indices.push(slot);
                    corner_slots[face_id][corner] = Some(slot);
                }
            }
            group_ranges.push(start..indices.len());
        }

        RenderLayout {
            vertex_slots,
            corner_slots,
            indices,
            group_ranges,
            slot_count: slot_count as usize,
        }
    }
}
