//! Mesh topology store.
//!
//! A [`Mesh`] owns flat per-vertex attribute arrays plus faces organised into
//! named [`FaceGroup`]s. Vertices, faces, and groups are addressed by index;
//! each vertex keeps the list of faces it belongs to so that morph targets can
//! find the faces whose normals they invalidate.

mod geometry;
mod layout;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use glam::{Vec2, Vec3};
use morphkit_core::{
    DisplacementListener, MeshOptions, MorphError, RenderLayout, RenderSink, Result, Rgba,
    UpdateFields, VertexUpdate, WHITE,
};

/// Index of a vertex in a [`Mesh`].
pub type VertexId = usize;
/// Index of a face in a [`Mesh`].
pub type FaceId = usize;
/// Index of a face group in a [`Mesh`].
pub type GroupId = usize;

/// A polygon of fixed arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    vertices: Vec<VertexId>,
    normal: Vec3,
    group: GroupId,
    uv: Option<Vec<u32>>,
    colors: Option<Vec<Rgba>>,
}

impl Face {
    /// Returns the vertices of this face, in winding order.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// Returns the face normal as of the last recomputation.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Returns the group this face belongs to.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Returns the per-corner indices into the mesh UV table.
    pub fn uv(&self) -> Option<&[u32]> {
        self.uv.as_deref()
    }

    /// Returns the per-corner colors, if the face has been colored.
    pub fn colors(&self) -> Option<&[Rgba]> {
        self.colors.as_deref()
    }
}

/// A named set of faces.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceGroup {
    name: String,
    faces: Vec<FaceId>,
    visible: bool,
}

impl FaceGroup {
    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the faces of this group, in creation order.
    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    /// Returns whether this group gets render slots.
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// One face of a [`MeshSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSpec {
    /// Vertex indices, in winding order.
    pub vertices: Vec<VertexId>,
    /// Name of the group the face goes into. Groups are created on first use.
    pub group: String,
    /// Optional per-corner texture coordinates.
    pub uv: Option<Vec<Vec2>>,
}

/// Plain geometry from which a [`Mesh`] can be built in one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSource {
    /// Vertices per face. `None` uses [`MeshOptions::default_arity`].
    pub arity: Option<usize>,
    /// Vertex positions in the rest pose.
    pub positions: Vec<Vec3>,
    /// Faces, in order.
    pub faces: Vec<FaceSpec>,
}

/// A polygon mesh with morphable vertex positions.
pub struct Mesh {
    name: String,
    arity: usize,

    // Per-vertex attributes
    positions: Vec<Vec3>,
    rest_positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Rgba>,
    shared_faces: Vec<Vec<FaceId>>,

    faces: Vec<Face>,
    groups: Vec<FaceGroup>,
    group_index: HashMap<String, GroupId>,

    // Deduplicated texture coordinates
    uv_values: Vec<Vec2>,
    uv_lookup: HashMap<[u32; 2], u32>,

    hidden_group_patterns: Vec<String>,
    sink: Option<Box<dyn RenderSink>>,
    // Topology changed since the sink last received a layout
    layout_stale: bool,
    listeners: Vec<Box<dyn DisplacementListener>>,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("vertices", &self.positions.len())
            .field("faces", &self.faces.len())
            .field("groups", &self.groups.len())
            .field("attached", &self.sink.is_some())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Mesh {
    /// Creates an empty mesh whose faces have `arity` vertices.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self::with_options(name, arity, &MeshOptions::default())
    }

    /// Creates an empty mesh using the hidden-group patterns from `options`.
    pub fn with_options(name: impl Into<String>, arity: usize, options: &MeshOptions) -> Self {
        Self {
            name: name.into(),
            arity,
            positions: Vec::new(),
            rest_positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            shared_faces: Vec::new(),
            faces: Vec::new(),
            groups: Vec::new(),
            group_index: HashMap::new(),
            uv_values: Vec::new(),
            uv_lookup: HashMap::new(),
            hidden_group_patterns: options.hidden_group_patterns.clone(),
            sink: None,
            layout_stale: false,
            listeners: Vec::new(),
        }
    }

    /// Builds a mesh from plain geometry and computes all normals.
    pub fn from_source(
        name: impl Into<String>,
        source: &MeshSource,
        options: &MeshOptions,
    ) -> Result<Self> {
        let arity = source.arity.unwrap_or(options.default_arity);
        let mut mesh = Self::with_options(name, arity, options);
        for &position in &source.positions {
            mesh.create_vertex(position);
        }
        for spec in &source.faces {
            let group = match mesh.face_group_id(&spec.group) {
                Some(id) => id,
                None => mesh.create_face_group(spec.group.clone())?,
            };
            mesh.create_face(group, &spec.vertices, spec.uv.as_deref())?;
        }
        mesh.recompute_normals(None, None);
        log::debug!(
            "built mesh '{}': {} vertices, {} faces, {} groups",
            mesh.name,
            mesh.vertex_count(),
            mesh.face_count(),
            mesh.groups.len()
        );
        Ok(mesh)
    }

    /// Returns a deep copy of this mesh under a new name.
    ///
    /// The copy has no render sink and no listeners.
    pub fn clone_topology(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: self.arity,
            positions: self.positions.clone(),
            rest_positions: self.rest_positions.clone(),
            normals: self.normals.clone(),
            colors: self.colors.clone(),
            shared_faces: self.shared_faces.clone(),
            faces: self.faces.clone(),
            groups: self.groups.clone(),
            group_index: self.group_index.clone(),
            uv_values: self.uv_values.clone(),
            uv_lookup: self.uv_lookup.clone(),
            hidden_group_patterns: self.hidden_group_patterns.clone(),
            sink: None,
            layout_stale: false,
            listeners: Vec::new(),
        }
    }

    // === Accessors ===

    /// Returns the mesh name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of vertices per face.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the number of faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns the current vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Returns the positions vertices had when they were created.
    pub fn rest_positions(&self) -> &[Vec3] {
        &self.rest_positions
    }

    /// Returns the vertex normals.
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Returns the position of a vertex.
    pub fn position(&self, vertex: VertexId) -> Option<Vec3> {
        self.positions.get(vertex).copied()
    }

    /// Returns the normal of a vertex.
    pub fn normal(&self, vertex: VertexId) -> Option<Vec3> {
        self.normals.get(vertex).copied()
    }

    /// Returns the color of a vertex.
    pub fn color(&self, vertex: VertexId) -> Option<Rgba> {
        self.colors.get(vertex).copied()
    }

    /// Returns the faces a vertex belongs to, in the order they were created.
    pub fn shared_faces(&self, vertex: VertexId) -> &[FaceId] {
        self.shared_faces.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns a face.
    pub fn face(&self, face: FaceId) -> Option<&Face> {
        self.faces.get(face)
    }

    /// Returns all faces.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Returns all face groups.
    pub fn face_groups(&self) -> &[FaceGroup] {
        &self.groups
    }

    /// Returns a face group by name.
    pub fn face_group(&self, name: &str) -> Option<&FaceGroup> {
        self.face_group_id(name).map(|id| &self.groups[id])
    }

    /// Returns the index of a face group by name.
    pub fn face_group_id(&self, name: &str) -> Option<GroupId> {
        self.group_index.get(name).copied()
    }

    /// Returns the deduplicated texture coordinates.
    pub fn uv_values(&self) -> &[Vec2] {
        &self.uv_values
    }

    /// Returns whether a group name matches one of the hidden-group patterns.
    pub fn is_hidden_group(&self, name: &str) -> bool {
        self.hidden_group_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }

    // === Construction ===

    /// Appends a vertex at `position` and returns its index.
    ///
    /// The position is also recorded as the vertex's rest position.
    pub fn create_vertex(&mut self, position: Vec3) -> VertexId {
        let id = self.positions.len();
        self.positions.push(position);
        self.rest_positions.push(position);
        self.normals.push(Vec3::ZERO);
        self.colors.push(WHITE);
        self.shared_faces.push(Vec::new());
        self.mark_layout_stale();
        id
    }

    /// Creates an empty face group.
    pub fn create_face_group(&mut self, name: impl Into<String>) -> Result<GroupId> {
        let name = name.into();
        if self.group_index.contains_key(&name) {
            return Err(MorphError::FaceGroupExists(name));
        }
        let id = self.groups.len();
        let visible = !self.is_hidden_group(&name);
        self.group_index.insert(name.clone(), id);
        self.groups.push(FaceGroup {
            name,
            faces: Vec::new(),
            visible,
        });
        self.mark_layout_stale();
        Ok(id)
    }

    /// Creates a face in `group` from existing vertices.
    ///
    /// `vertices` must have exactly [`arity`](Self::arity) entries, as must
    /// `uv` when given. Texture coordinates are interned so that equal values
    /// share one table entry.
    pub fn create_face(
        &mut self,
        group: GroupId,
        vertices: &[VertexId],
        uv: Option<&[Vec2]>,
    ) -> Result<FaceId> {
        if group >= self.groups.len() {
            return Err(MorphError::FaceGroupNotFound(format!("#{group}")));
        }
        if vertices.len() != self.arity {
            return Err(MorphError::ArityMismatch {
                expected: self.arity,
                actual: vertices.len(),
            });
        }
        if let Some(&index) = vertices.iter().find(|&&v| v >= self.positions.len()) {
            return Err(MorphError::VertexOutOfRange {
                index,
                vertex_count: self.positions.len(),
            });
        }
        let uv: Option<Vec<u32>> = match uv {
            Some(coords) if coords.len() != self.arity => {
                return Err(MorphError::ArityMismatch {
                    expected: self.arity,
                    actual: coords.len(),
                });
            }
            Some(coords) => Some(coords.iter().map(|&c| self.intern_uv(c)).collect()),
            None => None,
        };

        let id = self.faces.len();
        self.faces.push(Face {
            vertices: vertices.to_vec(),
            normal: Vec3::ZERO,
            group,
            uv,
            colors: None,
        });
        self.groups[group].faces.push(id);
        for &v in vertices {
            let shared = &mut self.shared_faces[v];
            if !shared.contains(&id) {
                shared.push(id);
            }
        }
        self.mark_layout_stale();
        Ok(id)
    }

    fn intern_uv(&mut self, uv: Vec2) -> u32 {
        let key = [uv.x.to_bits(), uv.y.to_bits()];
        if let Some(&index) = self.uv_lookup.get(&key) {
            return index;
        }
        let index = self.uv_values.len() as u32;
        self.uv_values.push(uv);
        self.uv_lookup.insert(key, index);
        index
    }

    /// Removes all vertices, faces, groups, and texture coordinates.
    ///
    /// An attached sink receives an empty layout; listeners are kept.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.rest_positions.clear();
        self.normals.clear();
        self.colors.clear();
        self.shared_faces.clear();
        self.faces.clear();
        self.groups.clear();
        self.group_index.clear();
        self.uv_values.clear();
        self.uv_lookup.clear();
        self.layout_stale = false;
        if let Some(sink) = self.sink.as_mut() {
            sink.set_layout(RenderLayout::default());
        }
    }

    // === Queries ===

    /// Returns the other vertices of every face that contains `vertex`,
    /// sorted and without duplicates.
    pub fn vertex_neighbors(&self, vertex: VertexId) -> Vec<VertexId> {
        let mut neighbors = BTreeSet::new();
        for &face in self.shared_faces(vertex) {
            neighbors.extend(self.faces[face].vertices.iter().copied());
        }
        neighbors.remove(&vertex);
        neighbors.into_iter().collect()
    }

    /// Returns the vertices and faces of the named groups, each sorted and
    /// without duplicates.
    pub fn faces_and_vertices_for_groups<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<(Vec<VertexId>, Vec<FaceId>)> {
        let mut vertices = BTreeSet::new();
        let mut faces = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            let group = self
                .face_group(name)
                .ok_or_else(|| MorphError::FaceGroupNotFound(name.to_string()))?;
            for &face in &group.faces {
                faces.insert(face);
                vertices.extend(self.faces[face].vertices.iter().copied());
            }
        }
        Ok((vertices.into_iter().collect(), faces.into_iter().collect()))
    }

    // === Mutation ===

    /// Moves a vertex and pushes its new position to the sink.
    pub fn set_vertex_position(&mut self, vertex: VertexId, position: Vec3) -> Result<()> {
        self.check_vertex(vertex)?;
        self.positions[vertex] = position;
        self.push(vertex, UpdateFields::POSITION);
        Ok(())
    }

    /// Adds `delta` to a vertex position and notifies every listener.
    ///
    /// Out-of-range vertices are ignored. Nothing is pushed to the sink.
    pub fn displace(&mut self, vertex: VertexId, delta: Vec3) {
        let Some(position) = self.positions.get_mut(vertex) else {
            return;
        };
        *position += delta;
        for listener in &mut self.listeners {
            listener.on_displace(vertex, delta);
        }
    }

    /// Restores every vertex to its rest position.
    pub fn reset_to_rest(&mut self, recalc_normals: bool, push: bool) {
        self.positions.clone_from(&self.rest_positions);
        if recalc_normals {
            self.recompute_normals(None, None);
        }
        if push {
            self.update(None, recalc_normals);
        }
    }

    /// Makes the current positions the new rest positions.
    pub fn commit_rest(&mut self) {
        self.rest_positions.clone_from(&self.positions);
    }

    // === Colors ===

    /// Sets the color of a vertex on every face it belongs to.
    pub fn set_vertex_color(&mut self, vertex: VertexId, color: Rgba) -> Result<()> {
        self.check_vertex(vertex)?;
        self.colors[vertex] = color;
        self.push(vertex, UpdateFields::COLOR);
        Ok(())
    }

    /// Colors every corner of one face.
    ///
    /// Only the render slots of this face's corners are updated; other faces
    /// sharing the same vertices keep their color in the render buffer.
    pub fn set_face_color(&mut self, face: FaceId, color: Rgba) -> Result<()> {
        if face >= self.faces.len() {
            return Err(MorphError::FaceOutOfRange {
                index: face,
                face_count: self.faces.len(),
            });
        }
        self.color_face(face, color);
        Ok(())
    }

    /// Colors every face of a group.
    pub fn set_group_color(&mut self, name: &str, color: Rgba) -> Result<()> {
        let group = self
            .face_group_id(name)
            .ok_or_else(|| MorphError::FaceGroupNotFound(name.to_string()))?;
        for i in 0..self.groups[group].faces.len() {
            let face = self.groups[group].faces[i];
            self.color_face(face, color);
        }
        Ok(())
    }

    /// Colors the whole mesh, including vertices no face refers to.
    pub fn set_color(&mut self, color: Rgba) {
        for face in 0..self.faces.len() {
            self.color_face(face, color);
        }
        self.colors.fill(color);
    }

    fn color_face(&mut self, face: FaceId, color: Rgba) {
        self.sync_layout();
        let target = &mut self.faces[face];
        target.colors = Some(vec![color; target.vertices.len()]);
        for &v in &target.vertices {
            self.colors[v] = color;
        }
        if let Some(sink) = self.sink.as_mut() {
            for corner in 0..target.vertices.len() {
                sink.push_corner_color(face, corner, color);
            }
        }
    }

    // === Render sink ===

    /// Attaches a render sink, installs the current layout in it, and pushes
    /// every vertex and colored corner. Returns the previously attached sink.
    ///
    /// Vertices, faces, or groups created while attached are picked up before
    /// the next push reaches the sink.
    pub fn attach(&mut self, mut sink: Box<dyn RenderSink>) -> Option<Box<dyn RenderSink>> {
        self.fill_sink(&mut *sink);
        self.layout_stale = false;
        log::debug!("attached render sink to mesh '{}'", self.name);
        self.sink.replace(sink)
    }

    /// Sends the attached sink a freshly computed layout and pushes every
    /// vertex and colored corner again.
    pub fn refresh_layout(&mut self) {
        self.layout_stale = false;
        let Some(mut sink) = self.sink.take() else {
            return;
        };
        self.fill_sink(&mut *sink);
        log::debug!("refreshed render layout of mesh '{}'", self.name);
        self.sink = Some(sink);
    }

    fn fill_sink(&self, sink: &mut dyn RenderSink) {
        sink.set_layout(self.render_layout());
        for vertex in 0..self.positions.len() {
            sink.push_vertex(&self.vertex_update(vertex, UpdateFields::ALL));
        }
        for (id, face) in self.faces.iter().enumerate() {
            if let Some(colors) = &face.colors {
                for (corner, &color) in colors.iter().enumerate() {
                    sink.push_corner_color(id, corner, color);
                }
            }
        }
    }

    fn mark_layout_stale(&mut self) {
        if self.sink.is_some() {
            self.layout_stale = true;
        }
    }

    fn sync_layout(&mut self) {
        if self.layout_stale {
            self.refresh_layout();
        }
    }

    /// Detaches and returns the render sink.
    pub fn detach(&mut self) -> Option<Box<dyn RenderSink>> {
        self.layout_stale = false;
        self.sink.take()
    }

    /// Returns whether a render sink is attached.
    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Returns the attached sink if it is a `T`.
    pub fn sink<T: RenderSink>(&self) -> Option<&T> {
        self.sink.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Returns the attached sink mutably if it is a `T`.
    pub fn sink_mut<T: RenderSink>(&mut self) -> Option<&mut T> {
        self.sink.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Pushes positions, and normals if `with_normals`, for the given
    /// vertices (all vertices when `None`). Does nothing when detached.
    pub fn update(&mut self, vertices: Option<&[VertexId]>, with_normals: bool) {
        if self.sink.is_none() {
            return;
        }
        self.sync_layout();
        let fields = if with_normals {
            UpdateFields::GEOMETRY
        } else {
            UpdateFields::POSITION
        };
        match vertices {
            Some(vertices) => {
                for &v in vertices {
                    self.push(v, fields);
                }
            }
            None => {
                for v in 0..self.positions.len() {
                    self.push(v, fields);
                }
            }
        }
    }

    /// Recomputes normals of, and/or pushes, every vertex in the named groups.
    pub fn update_groups<S: AsRef<str>>(
        &mut self,
        names: &[S],
        recalc_normals: bool,
        push: bool,
    ) -> Result<()> {
        let (vertices, faces) = self.faces_and_vertices_for_groups(names)?;
        if recalc_normals {
            self.recompute_normals(Some(&faces[..]), Some(&vertices[..]));
        }
        if push {
            self.update(Some(&vertices[..]), recalc_normals);
        }
        Ok(())
    }

    fn vertex_update(&self, vertex: VertexId, fields: UpdateFields) -> VertexUpdate {
        VertexUpdate {
            index: vertex,
            position: self.positions[vertex],
            normal: self.normals[vertex],
            color: self.colors[vertex],
            fields,
        }
    }

    fn push(&mut self, vertex: VertexId, fields: UpdateFields) {
        if vertex >= self.positions.len() {
            return;
        }
        self.sync_layout();
        let update = self.vertex_update(vertex, fields);
        if let Some(sink) = self.sink.as_mut() {
            sink.push_vertex(&update);
        }
    }

    // === Listeners ===

    /// Registers a displacement listener.
    pub fn add_listener(&mut self, listener: Box<dyn DisplacementListener>) {
        self.listeners.push(listener);
    }

    /// Returns the first listener that is a `T`.
    pub fn listener<T: DisplacementListener>(&self) -> Option<&T> {
        self.listeners
            .iter()
            .find_map(|l| l.as_any().downcast_ref::<T>())
    }

    /// Returns the first listener that is a `T`, mutably.
    pub fn listener_mut<T: DisplacementListener>(&mut self) -> Option<&mut T> {
        self.listeners
            .iter_mut()
            .find_map(|l| l.as_any_mut().downcast_mut::<T>())
    }

    /// Removes and returns all listeners.
    pub fn take_listeners(&mut self) -> Vec<Box<dyn DisplacementListener>> {
        std::mem::take(&mut self.listeners)
    }

    fn check_vertex(&self, vertex: VertexId) -> Result<()> {
        if vertex < self.positions.len() {
            Ok(())
        } else {
            Err(MorphError::VertexOutOfRange {
                index: vertex,
                vertex_count: self.positions.len(),
            })
        }
    }
}
