//! The mesh hierarchy: per-level entity arenas, the boundary, and queries.
//!
//! Level 0 is populated once by a [`MeshBuilder`]; every finer level only
//! holds refinements of its parent level. The refinement cycle itself lives in
//! [`hierarchy`](crate::topology::hierarchy) and the per-tetra steps in
//! [`tetra_refine`](crate::topology::tetra_refine).
//!
//! # Handles
//! Handles stay valid until the next call to [`MultiGrid::refine`]; the
//! removal pass of a cycle may invalidate any of them. Lookups through a stale
//! handle return [`MeshError::StaleHandle`].

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::boundary::{BndIdx, Boundary};
use crate::geometry::metrics::{self, Point2, Point3};
use crate::mesh_error::MeshError;
use crate::mesh_generation::{LevelZero, MeshBuilder};
use crate::topology::recycle::RecycleBins;
use crate::topology::reference::{
    EDGE_OF_FACE, NUM_FACES, NUM_VERTS, VERT_OF_FACE, face_to_tetra_coord,
};
use crate::topology::refine_rule::{
    NO_REF_MARK, REG_REF_MARK, REMOVE_MARK, edge_pattern,
};
use crate::topology::simplex::{
    Edge, EdgeHandle, EdgeKey, Face, FaceHandle, FaceKey, Handle, Tetra, TetraHandle, TetraKey,
    Vertex, VertexHandle, VertexKey,
};

/// Runtime configuration of a hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiGridOptions {
    /// Largest accepted distance between the projections of a junction edge
    /// midpoint onto its two boundary segments.
    pub projection_tolerance: f64,
    /// Relative tolerance for the child-volume check of the sanity checker.
    pub volume_tolerance: f64,
    /// Validate the whole hierarchy after every refinement cycle.
    pub check_invariants: bool,
}

impl Default for MultiGridOptions {
    fn default() -> Self {
        Self {
            projection_tolerance: 1e-9,
            volume_tolerance: 1e-10,
            check_invariants: false,
        }
    }
}

/// Owning arenas of one level.
#[derive(Debug, Default)]
pub(crate) struct Level {
    pub(crate) vertices: SlotMap<VertexKey, Vertex>,
    pub(crate) edges: SlotMap<EdgeKey, Edge>,
    pub(crate) faces: SlotMap<FaceKey, Face>,
    pub(crate) tetras: SlotMap<TetraKey, Tetra>,
}

impl Level {
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty()
            && self.edges.is_empty()
            && self.faces.is_empty()
            && self.tetras.is_empty()
    }
}

/// Entity counts of one level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSize {
    pub vertices: usize,
    pub edges: usize,
    pub faces: usize,
    pub tetras: usize,
}

/// The multi-level tetrahedral hierarchy.
#[derive(Debug)]
pub struct MultiGrid {
    pub(crate) levels: Vec<Level>,
    pub(crate) boundary: Boundary,
    pub(crate) options: MultiGridOptions,
    pub(crate) bins: RecycleBins,
    next_vertex_id: u64,
    next_tetra_id: u64,
}

macro_rules! arena_access {
    ($get:ident, $get_mut:ident, $field:ident, $handle:ty, $entity:ty, $kind:literal) => {
        pub fn $get(&self, h: $handle) -> Result<&$entity, MeshError> {
            self.levels
                .get(h.level)
                .and_then(|l| l.$field.get(h.key))
                .ok_or(MeshError::StaleHandle {
                    kind: $kind,
                    level: h.level,
                })
        }

        pub(crate) fn $get_mut(&mut self, h: $handle) -> Result<&mut $entity, MeshError> {
            self.levels
                .get_mut(h.level)
                .and_then(|l| l.$field.get_mut(h.key))
                .ok_or(MeshError::StaleHandle {
                    kind: $kind,
                    level: h.level,
                })
        }
    };
}

impl MultiGrid {
    /// Build a hierarchy whose level 0 is produced by `builder`.
    pub fn new<B: MeshBuilder + ?Sized>(builder: &B) -> Result<Self, MeshError> {
        Self::with_options(builder, MultiGridOptions::default())
    }

    pub fn with_options<B: MeshBuilder + ?Sized>(
        builder: &B,
        options: MultiGridOptions,
    ) -> Result<Self, MeshError> {
        let mut mg = MultiGrid {
            levels: vec![Level::default()],
            boundary: Boundary::new(),
            options,
            bins: RecycleBins::new(),
            next_vertex_id: 0,
            next_tetra_id: 0,
        };
        let mut level0 = LevelZero::new(&mut mg);
        builder.build(&mut level0)?;
        level0.finish()?;
        log::debug!("built level 0: {}", mg.size_info_line());
        Ok(mg)
    }

    arena_access!(vertex, vertex_mut, vertices, VertexHandle, Vertex, "vertex");
    arena_access!(edge, edge_mut, edges, EdgeHandle, Edge, "edge");
    arena_access!(face, face_mut, faces, FaceHandle, Face, "face");
    arena_access!(tetra, tetra_mut, tetras, TetraHandle, Tetra, "tetra");

    pub fn options(&self) -> &MultiGridOptions {
        &self.options
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Index of the finest level.
    pub fn last_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn level_ref(&self, level: usize) -> Result<&Level, MeshError> {
        self.levels.get(level).ok_or(MeshError::StaleHandle {
            kind: "level",
            level,
        })
    }

    pub(crate) fn level_mut(&mut self, level: usize) -> Result<&mut Level, MeshError> {
        self.levels.get_mut(level).ok_or(MeshError::StaleHandle {
            kind: "level",
            level,
        })
    }

    pub(crate) fn append_level(&mut self) {
        self.levels.push(Level::default());
        log::debug!("appended level {}", self.last_level());
    }

    /// Entity counts per level, coarsest first.
    pub fn size_info(&self) -> Vec<LevelSize> {
        self.levels
            .iter()
            .map(|l| LevelSize {
                vertices: l.vertices.len(),
                edges: l.edges.len(),
                faces: l.faces.len(),
                tetras: l.tetras.len(),
            })
            .collect()
    }

    pub(crate) fn size_info_line(&self) -> String {
        let total = self.size_info().iter().fold(LevelSize::default(), |acc, s| LevelSize {
            vertices: acc.vertices + s.vertices,
            edges: acc.edges + s.edges,
            faces: acc.faces + s.faces,
            tetras: acc.tetras + s.tetras,
        });
        format!(
            "{} Verts, {} Edges, {} Faces, {} Tetras",
            total.vertices, total.edges, total.faces, total.tetras
        )
    }

    // Entity creation

    pub(crate) fn insert_vertex(&mut self, level: usize, coord: Point3) -> Result<VertexHandle, MeshError> {
        let id = self.next_vertex_id;
        self.next_vertex_id += 1;
        let key = self.level_mut(level)?.vertices.insert(Vertex::new(id, level, coord));
        Ok(Handle::new(level, key))
    }

    /// `vertices` must be sorted by identifier.
    pub(crate) fn insert_edge(
        &mut self,
        level: usize,
        vertices: [VertexHandle; 2],
        bnd: [Option<BndIdx>; 2],
    ) -> Result<EdgeHandle, MeshError> {
        let key = self.level_mut(level)?.edges.insert(Edge::new(vertices, level, bnd));
        let edge = Handle::new(level, key);
        self.bins.recycle_edge(vertices, edge);
        Ok(edge)
    }

    /// `vertices` must be sorted by identifier.
    pub(crate) fn insert_face(
        &mut self,
        level: usize,
        vertices: [VertexHandle; 3],
        bnd: Option<BndIdx>,
    ) -> Result<FaceHandle, MeshError> {
        let key = self.level_mut(level)?.faces.insert(Face::new(vertices, level, bnd));
        let face = Handle::new(level, key);
        self.bins.recycle_face(vertices, face);
        Ok(face)
    }

    pub(crate) fn insert_tetra(
        &mut self,
        level: usize,
        vertices: [VertexHandle; NUM_VERTS],
        edges: [EdgeHandle; 6],
        faces: [FaceHandle; NUM_FACES],
        parent: Option<TetraHandle>,
    ) -> Result<TetraHandle, MeshError> {
        let id = self.next_tetra_id;
        self.next_tetra_id += 1;
        let key = self.level_mut(level)?.tetras.insert(Tetra {
            id,
            level,
            vertices,
            edges,
            faces,
            parent,
            children: None,
            ref_mark: NO_REF_MARK,
            ref_rule: NO_REF_MARK,
        });
        Ok(Handle::new(level, key))
    }

    /// Sort vertex handles by ascending identifier.
    pub(crate) fn sorted_by_id<const N: usize>(
        &self,
        mut vertices: [VertexHandle; N],
    ) -> Result<[VertexHandle; N], MeshError> {
        let mut keyed = Vec::with_capacity(N);
        for v in vertices {
            keyed.push((self.vertex(v)?.id, v));
        }
        keyed.sort_unstable_by_key(|(id, _)| *id);
        for (slot, (_, v)) in vertices.iter_mut().zip(keyed) {
            *slot = v;
        }
        Ok(vertices)
    }

    pub(crate) fn vertex_ids<const N: usize>(&self, vertices: [VertexHandle; N]) -> Result<[u64; N], MeshError> {
        let mut ids = [0u64; N];
        for (id, v) in ids.iter_mut().zip(vertices) {
            *id = self.vertex(v)?.id;
        }
        Ok(ids)
    }

    // Face neighbor slots

    /// Register `tetra` on `face`.
    ///
    /// A tetra on the face's level takes slot 0, or slot 1 if slot 0 is taken.
    /// A child one level below takes slot 2 when its parent sits in slot 0 and
    /// slot 3 otherwise.
    pub(crate) fn link_tetra(&mut self, face: FaceHandle, tetra: TetraHandle) -> Result<(), MeshError> {
        let (t_id, t_parent) = {
            let t = self.tetra(tetra)?;
            (t.id, t.parent)
        };
        let f = self.face(face)?;
        let slot = if tetra.level == f.level {
            usize::from(f.neighbors[0].is_some())
        } else if tetra.level == f.level + 1 {
            if t_parent.is_some() && f.neighbors[0] == t_parent { 2 } else { 3 }
        } else {
            return Err(MeshError::IllegalGreenLevel {
                tetra: t_id,
                tetra_level: tetra.level,
                face_level: f.level,
            });
        };
        if let Some(linked) = f.neighbors[slot] {
            let linked = self.tetra(linked).map(|t| t.id).unwrap_or(u64::MAX);
            return Err(MeshError::FaceSlotOccupied { slot, linked });
        }
        self.face_mut(face)?.neighbors[slot] = Some(tetra);
        Ok(())
    }

    /// Remove `tetra` from `face`; the other side moves into slot 0 if needed.
    pub(crate) fn unlink_tetra(&mut self, face: FaceHandle, tetra: TetraHandle) -> Result<(), MeshError> {
        let t_id = self.tetra(tetra).map(|t| t.id).unwrap_or(u64::MAX);
        let f = self.face_mut(face)?;
        let mut slot = f
            .neighbors
            .iter()
            .position(|n| *n == Some(tetra))
            .ok_or(MeshError::NoSuchNeighbor(t_id))?;
        if slot == 0 {
            slot = 1;
            f.neighbors[0] = f.neighbors[1];
            f.neighbors[2] = f.neighbors[3];
            f.neighbors[3] = None;
        }
        f.neighbors[slot] = None;
        Ok(())
    }

    pub(crate) fn link_to_faces(&mut self, tetra: TetraHandle) -> Result<(), MeshError> {
        for face in self.tetra(tetra)?.faces {
            self.link_tetra(face, tetra)?;
        }
        Ok(())
    }

    pub(crate) fn unlink_from_faces(&mut self, tetra: TetraHandle) -> Result<(), MeshError> {
        for face in self.tetra(tetra)?.faces {
            self.unlink_tetra(face, tetra)?;
        }
        Ok(())
    }

    // Predicates needing more than one entity

    /// Level-0 tetras and children of regularly refined parents.
    pub fn is_regular(&self, tetra: TetraHandle) -> Result<bool, MeshError> {
        match self.tetra(tetra)?.parent {
            None => Ok(true),
            Some(p) => Ok(self.tetra(p)?.ref_rule == REG_REF_MARK),
        }
    }

    /// Whether the rule committed by the face's first neighbor splits the face.
    pub fn is_face_refined(&self, face: FaceHandle) -> Result<bool, MeshError> {
        let Some(t) = self.face(face)?.neighbors[0] else {
            return Ok(false);
        };
        let tet = self.tetra(t)?;
        if tet.is_unrefined() {
            return Ok(false);
        }
        let local = tet.face_index(face).ok_or_else(|| {
            MeshError::InvariantViolation(format!("tetra {} lacks a linked face", tet.id))
        })?;
        let pattern = edge_pattern(tet.ref_rule);
        Ok(EDGE_OF_FACE[local].iter().any(|&e| pattern & (1 << e) != 0))
    }

    pub fn is_face_in_triang(&self, face: FaceHandle, level: usize) -> Result<bool, MeshError> {
        let f_level = self.face(face)?.level;
        Ok(f_level == level || (f_level < level && !self.is_face_refined(face)?))
    }

    // Marking

    fn mark_leaf(&mut self, tetra: TetraHandle, mark: u8) -> Result<(), MeshError> {
        let t = self.tetra_mut(tetra)?;
        if !t.is_unrefined() {
            return Err(MeshError::MarkOnRefinedTetra(t.id));
        }
        t.ref_mark = mark;
        Ok(())
    }

    /// Request regular refinement of an unrefined tetra.
    pub fn mark_for_refinement(&mut self, tetra: TetraHandle) -> Result<(), MeshError> {
        self.mark_leaf(tetra, REG_REF_MARK)
    }

    /// Ask the parent to drop this unrefined tetra.
    pub fn mark_for_removal(&mut self, tetra: TetraHandle) -> Result<(), MeshError> {
        self.mark_leaf(tetra, REMOVE_MARK)
    }

    /// Withdraw any pending request on an unrefined tetra.
    pub fn clear_mark(&mut self, tetra: TetraHandle) -> Result<(), MeshError> {
        self.mark_leaf(tetra, NO_REF_MARK)
    }

    /// Request regular refinement of every tetra in the finest triangulation.
    pub fn mark_all(&mut self) -> Result<(), MeshError> {
        let leaves: Vec<_> = self.triang_tetras(self.last_level()).map(|(h, _)| h).collect();
        for t in leaves {
            self.mark_for_refinement(t)?;
        }
        Ok(())
    }

    /// Request removal of every tetra in the finest triangulation.
    pub fn unmark_all(&mut self) -> Result<(), MeshError> {
        let leaves: Vec<_> = self.triang_tetras(self.last_level()).map(|(h, _)| h).collect();
        for t in leaves {
            self.mark_for_removal(t)?;
        }
        Ok(())
    }

    // Geometric queries

    pub fn tetra_coords(&self, tetra: TetraHandle) -> Result<[Point3; NUM_VERTS], MeshError> {
        let t = self.tetra(tetra)?;
        let mut coords = [[0.0; 3]; NUM_VERTS];
        for (c, v) in coords.iter_mut().zip(t.vertices) {
            *c = self.vertex(v)?.coord;
        }
        Ok(coords)
    }

    pub fn volume(&self, tetra: TetraHandle) -> Result<f64, MeshError> {
        Ok(metrics::tetra_volume(&self.tetra_coords(tetra)?))
    }

    pub fn tetra_barycenter(&self, tetra: TetraHandle) -> Result<Point3, MeshError> {
        Ok(metrics::centroid(&self.tetra_coords(tetra)?))
    }

    /// Barycenter of local face `face` of `tetra`.
    pub fn tetra_face_barycenter(&self, tetra: TetraHandle, face: usize) -> Result<Point3, MeshError> {
        let c = self.tetra_coords(tetra)?;
        let [a, b, d] = local_face(face)?;
        Ok(metrics::centroid(&[c[a], c[b], c[d]]))
    }

    pub fn face_barycenter(&self, face: FaceHandle) -> Result<Point3, MeshError> {
        let f = self.face(face)?;
        let mut pts = [[0.0; 3]; 3];
        for (p, v) in pts.iter_mut().zip(f.vertices) {
            *p = self.vertex(v)?.coord;
        }
        Ok(metrics::centroid(&pts))
    }

    pub fn edge_barycenter(&self, edge: EdgeHandle) -> Result<Point3, MeshError> {
        let [v0, v1] = self.edge(edge)?.vertices;
        Ok(metrics::midpoint(self.vertex(v0)?.coord, self.vertex(v1)?.coord))
    }

    /// Unit normal of local face `face`, its orientation sign and the length
    /// of the cross product.
    ///
    /// `dir` is `1.0` when the returned normal points out of `tetra`. With
    /// consistent numbering both tetras of a face get the same normal and
    /// opposite signs.
    pub fn face_normal(&self, tetra: TetraHandle, face: usize) -> Result<(Point3, f64, f64), MeshError> {
        let c = self.tetra_coords(tetra)?;
        let [a, b, d] = local_face(face)?;
        metrics::oriented_normal(c[a], c[b], c[d], c[face])
    }

    /// Outward unit normal of local face `face` and the length of the cross product.
    pub fn outer_normal(&self, tetra: TetraHandle, face: usize) -> Result<(Point3, f64), MeshError> {
        let (n, dir, abs_det) = self.face_normal(tetra, face)?;
        Ok((metrics::scale(n, dir), abs_det))
    }

    /// Map barycentric coordinates `(c1, c2, c3)` (weights of vertices 1..3) to world space.
    pub fn world_coord(&self, tetra: TetraHandle, c: Point3) -> Result<Point3, MeshError> {
        let v = self.tetra_coords(tetra)?;
        let w0 = 1.0 - c[0] - c[1] - c[2];
        let mut p = metrics::scale(v[0], w0);
        for i in 0..3 {
            p = metrics::add(p, metrics::scale(v[i + 1], c[i]));
        }
        Ok(p)
    }

    /// Map face-local coordinates on local face `face` to world space.
    pub fn face_world_coord(&self, tetra: TetraHandle, face: usize, c: Point2) -> Result<Point3, MeshError> {
        let v = self.tetra_coords(tetra)?;
        let [a, b, d] = local_face(face)?;
        let p = metrics::scale(v[a], 1.0 - c[0] - c[1]);
        Ok(metrics::add(
            p,
            metrics::add(metrics::scale(v[b], c[0]), metrics::scale(v[d], c[1])),
        ))
    }

    /// Barycentric coordinates (weights of vertices 1..3) of a face-local point.
    pub fn face_to_tetra_coord(&self, face: usize, c: Point2) -> Result<Point3, MeshError> {
        face_to_tetra_coord(face, c).ok_or(MeshError::LocalIndexOutOfRange {
            kind: "tetra face",
            index: face,
        })
    }

    pub fn circumsphere(&self, tetra: TetraHandle) -> Result<(Point3, f64), MeshError> {
        metrics::circumsphere(&self.tetra_coords(tetra)?).ok_or_else(|| MeshError::DegenerateGeometry {
            what: "circumsphere",
            dump: self.dump_tetra(tetra),
        })
    }

    /// Circumcircle of local face `face` of `tetra`.
    pub fn circumcircle(&self, tetra: TetraHandle, face: usize) -> Result<(Point3, f64), MeshError> {
        let c = self.tetra_coords(tetra)?;
        let [a, b, d] = local_face(face)?;
        metrics::circumcircle(c[a], c[b], c[d]).ok_or_else(|| MeshError::DegenerateGeometry {
            what: "circumcircle",
            dump: self.dump_tetra(tetra),
        })
    }

    /// Whether `p` lies strictly inside the circumsphere of `tetra`.
    pub fn is_in_circumsphere(&self, tetra: TetraHandle, p: Point3) -> Result<bool, MeshError> {
        let (center, radius) = self.circumsphere(tetra)?;
        Ok(metrics::distance(center, p) < radius)
    }

    /// Same-level neighbor of `tetra` across local face `face`.
    pub fn neighbor(&self, tetra: TetraHandle, face: usize) -> Result<Option<TetraHandle>, MeshError> {
        let t = self.tetra(tetra)?;
        let fh = *t.faces.get(face).ok_or(MeshError::LocalIndexOutOfRange {
            kind: "tetra face",
            index: face,
        })?;
        let f = self.face(fh)?;
        Ok(if f.neighbors[0] == Some(tetra) {
            f.neighbors[1]
        } else {
            f.neighbors[0]
        })
    }

    /// The tetra of the level-`level` triangulation on the other side of `face`.
    ///
    /// Descends into the neighbor's child when the same-level neighbor has been
    /// refined beyond `level`. Returns `None` on the boundary.
    pub fn neigh_in_triang(
        &self,
        face: FaceHandle,
        tetra: TetraHandle,
        level: usize,
    ) -> Result<Option<TetraHandle>, MeshError> {
        let f = self.face(face)?;
        if !self.tetra(tetra)?.is_in_triang(level) {
            return Err(MeshError::NotInTriangulation { kind: "tetra", level });
        }
        if !self.is_face_in_triang(face, level)? {
            return Err(MeshError::NotInTriangulation { kind: "face", level });
        }
        if f.is_on_boundary() {
            return Ok(None);
        }
        let slot = if tetra.level == f.level { 0 } else { 2 };
        let opp = usize::from(f.neighbors[slot] == Some(tetra));
        match f.neighbors[opp] {
            Some(n) if self.tetra(n)?.is_in_triang(level) => Ok(Some(n)),
            _ => Ok(f.neighbors[opp + 2]),
        }
    }
}

fn local_face(face: usize) -> Result<[usize; 3], MeshError> {
    VERT_OF_FACE
        .get(face)
        .map(|f| f.map(usize::from))
        .ok_or(MeshError::LocalIndexOutOfRange {
            kind: "tetra face",
            index: face,
        })
}

impl std::fmt::Display for MultiGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.size_info_line())?;
        for (level, s) in self.size_info().iter().enumerate() {
            writeln!(
                f,
                "  level {level}: {} Verts, {} Edges, {} Faces, {} Tetras",
                s.vertices, s.edges, s.faces, s.tetras
            )?;
        }
        Ok(())
    }
}
