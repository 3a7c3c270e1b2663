//! Simplex entities of the hierarchy and the handles that address them.
//!
//! Every entity lives in the per-level arena of its kind inside
//! [`MultiGrid`](crate::topology::multigrid::MultiGrid). Cross references
//! (edge to vertex, tetra to face, parent to child, face to neighbor) are
//! [`Handle`]s: a level plus a `slotmap` key. Keys stay valid across insertions
//! and are only invalidated by the removal pass of a refinement cycle.
//!
//! Vertex identifiers grow monotonically. Tetra vertices, edge endpoints and
//! face vertices are stored in ascending identifier order; a midpoint is always
//! younger than the endpoints of its edge.

use slotmap::new_key_type;

use crate::boundary::{BndIdx, BndPoint};
use crate::geometry::Point3;
use crate::mesh_error::MeshError;
use crate::topology::reference::{MAX_CHILDREN, NUM_EDGES, NUM_FACES, NUM_VERTS};
use crate::topology::refine_rule::{
    NO_REF_MARK, REG_REF_MARK, REMOVE_MARK,
};

new_key_type! {
    pub struct VertexKey;
    pub struct EdgeKey;
    pub struct FaceKey;
    pub struct TetraKey;
}

/// Level-qualified arena key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle<K> {
    pub level: usize,
    pub key: K,
}

impl<K> Handle<K> {
    pub fn new(level: usize, key: K) -> Self {
        Self { level, key }
    }
}

pub type VertexHandle = Handle<VertexKey>;
pub type EdgeHandle = Handle<EdgeKey>;
pub type FaceHandle = Handle<FaceKey>;
pub type TetraHandle = Handle<TetraKey>;

/// A mesh vertex.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub(crate) id: u64,
    pub(crate) level: usize,
    pub(crate) coord: Point3,
    /// Sorted by segment; empty for interior vertices.
    pub(crate) bnd: Vec<BndPoint>,
    pub(crate) remove_mark: bool,
}

impl Vertex {
    pub(crate) fn new(id: u64, level: usize, coord: Point3) -> Self {
        Self {
            id,
            level,
            coord,
            bnd: Vec::new(),
            remove_mark: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn coord(&self) -> Point3 {
        self.coord
    }

    pub fn bnd_points(&self) -> &[BndPoint] {
        &self.bnd
    }

    pub fn bnd_point(&self, segment: BndIdx) -> Option<&BndPoint> {
        self.bnd.iter().find(|b| b.segment == segment)
    }

    pub fn is_on_boundary(&self) -> bool {
        !self.bnd.is_empty()
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.remove_mark
    }

    /// Vertices never leave a finer triangulation once created.
    pub fn is_in_triang(&self, level: usize) -> bool {
        self.level <= level
    }

    pub(crate) fn add_bnd(&mut self, point: BndPoint) {
        match self.bnd.binary_search_by_key(&point.segment, |b| b.segment) {
            Ok(pos) => self.bnd[pos] = point,
            Err(pos) => self.bnd.insert(pos, point),
        }
    }
}

/// A mesh edge.
#[derive(Clone, Debug)]
pub struct Edge {
    pub(crate) vertices: [VertexHandle; 2],
    pub(crate) level: usize,
    pub(crate) bnd: [Option<BndIdx>; 2],
    /// Number of tetrahedra that committed a regular refinement over this edge.
    pub(crate) mark_count: u16,
    pub(crate) mid_vertex: Option<VertexHandle>,
    pub(crate) remove_mark: bool,
}

impl Edge {
    pub(crate) fn new(vertices: [VertexHandle; 2], level: usize, bnd: [Option<BndIdx>; 2]) -> Self {
        Self {
            vertices,
            level,
            bnd,
            mark_count: 0,
            mid_vertex: None,
            remove_mark: false,
        }
    }

    pub fn vertices(&self) -> [VertexHandle; 2] {
        self.vertices
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn bnd_indices(&self) -> impl Iterator<Item = BndIdx> + '_ {
        self.bnd.iter().flatten().copied()
    }

    pub fn is_on_boundary(&self) -> bool {
        self.bnd[0].is_some()
    }

    pub fn mark_count(&self) -> u16 {
        self.mark_count
    }

    pub fn is_marked_for_ref(&self) -> bool {
        self.mark_count > 0
    }

    pub fn mid_vertex(&self) -> Option<VertexHandle> {
        self.mid_vertex
    }

    pub fn is_refined(&self) -> bool {
        self.mid_vertex.is_some()
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.remove_mark
    }

    pub fn is_in_triang(&self, level: usize) -> bool {
        self.level == level || (self.level < level && !self.is_refined())
    }
}

/// A triangular face with up to four neighbor slots.
///
/// Slots 0 and 1 hold the same-level tetrahedra (slot 1 stays empty on the
/// boundary). Slots 2 and 3 hold the children of slot 0 and slot 1 that still
/// use the whole face.
#[derive(Clone, Debug)]
pub struct Face {
    pub(crate) vertices: [VertexHandle; 3],
    pub(crate) level: usize,
    pub(crate) bnd: Option<BndIdx>,
    pub(crate) neighbors: [Option<TetraHandle>; 4],
    pub(crate) remove_mark: bool,
}

impl Face {
    pub(crate) fn new(vertices: [VertexHandle; 3], level: usize, bnd: Option<BndIdx>) -> Self {
        Self {
            vertices,
            level,
            bnd,
            neighbors: [None; 4],
            remove_mark: false,
        }
    }

    pub fn vertices(&self) -> [VertexHandle; 3] {
        self.vertices
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn bnd_idx(&self) -> Option<BndIdx> {
        self.bnd
    }

    pub fn is_on_boundary(&self) -> bool {
        self.bnd.is_some()
    }

    pub fn neighbor_slot(&self, slot: usize) -> Option<TetraHandle> {
        self.neighbors.get(slot).copied().flatten()
    }

    /// Any tetra on the face's own level.
    pub fn some_tetra(&self) -> Option<TetraHandle> {
        self.neighbors[0]
    }

    pub fn is_on_next_level(&self) -> bool {
        self.neighbors[2].is_some() || self.neighbors[3].is_some()
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.remove_mark
    }
}

/// Up to eight children of a refined tetra, in catalog order of its rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Children {
    handles: [TetraHandle; MAX_CHILDREN],
    len: u8,
}

impl Children {
    pub(crate) fn push(&mut self, child: TetraHandle) -> Result<(), MeshError> {
        let slot = self.handles.get_mut(usize::from(self.len)).ok_or_else(|| {
            MeshError::InvariantViolation(format!("more than {MAX_CHILDREN} children"))
        })?;
        *slot = child;
        self.len += 1;
        Ok(())
    }

    pub fn as_slice(&self) -> &[TetraHandle] {
        &self.handles[..usize::from(self.len)]
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A tetrahedron.
#[derive(Clone, Debug)]
pub struct Tetra {
    pub(crate) id: u64,
    pub(crate) level: usize,
    pub(crate) vertices: [VertexHandle; NUM_VERTS],
    pub(crate) edges: [EdgeHandle; NUM_EDGES],
    pub(crate) faces: [FaceHandle; NUM_FACES],
    pub(crate) parent: Option<TetraHandle>,
    /// In catalog order of the committed rule; `None` while unrefined.
    pub(crate) children: Option<Children>,
    pub(crate) ref_mark: u8,
    pub(crate) ref_rule: u8,
}

impl Tetra {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn vertices(&self) -> [VertexHandle; NUM_VERTS] {
        self.vertices
    }

    pub fn edges(&self) -> [EdgeHandle; NUM_EDGES] {
        self.edges
    }

    pub fn faces(&self) -> [FaceHandle; NUM_FACES] {
        self.faces
    }

    pub fn parent(&self) -> Option<TetraHandle> {
        self.parent
    }

    pub fn children(&self) -> &[TetraHandle] {
        match &self.children {
            Some(c) => c.as_slice(),
            None => &[],
        }
    }

    pub fn ref_mark(&self) -> u8 {
        self.ref_mark
    }

    pub fn ref_rule(&self) -> u8 {
        self.ref_rule
    }

    pub fn is_unrefined(&self) -> bool {
        self.ref_rule == NO_REF_MARK
    }

    pub fn is_regularly_refined(&self) -> bool {
        self.ref_rule == REG_REF_MARK
    }

    pub fn is_marked_for_ref(&self) -> bool {
        self.ref_mark != NO_REF_MARK && self.ref_mark != REMOVE_MARK
    }

    pub fn is_marked_for_reg_ref(&self) -> bool {
        self.ref_mark == REG_REF_MARK
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.ref_mark == REMOVE_MARK
    }

    pub fn is_marked_for_no_ref(&self) -> bool {
        self.ref_mark == NO_REF_MARK
    }

    /// The pending mark would rebuild exactly the committed rule.
    pub fn is_mark_eq_rule(&self) -> bool {
        let mark = if self.is_marked_for_removal() {
            NO_REF_MARK
        } else {
            self.ref_mark
        };
        mark == self.ref_rule
    }

    pub fn is_in_triang(&self, level: usize) -> bool {
        self.level == level || (self.level < level && self.is_unrefined())
    }

    /// Local index of `face` in this tetra.
    pub fn face_index(&self, face: FaceHandle) -> Option<usize> {
        self.faces.iter().position(|f| *f == face)
    }

    pub fn vertex_index(&self, vertex: VertexHandle) -> Option<usize> {
        self.vertices.iter().position(|v| *v == vertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn vertex_handles(n: usize) -> Vec<VertexHandle> {
        let mut arena: SlotMap<VertexKey, Vertex> = SlotMap::with_key();
        (0..n)
            .map(|i| Handle::new(0, arena.insert(Vertex::new(i as u64, 0, [0.0; 3]))))
            .collect()
    }

    #[test]
    fn boundary_points_stay_sorted_by_segment() {
        let mut v = Vertex::new(0, 0, [0.0; 3]);
        v.add_bnd(BndPoint::new(3, [0.0, 1.0]));
        v.add_bnd(BndPoint::new(1, [0.5, 0.5]));
        v.add_bnd(BndPoint::new(3, [1.0, 1.0]));
        let segs: Vec<_> = v.bnd_points().iter().map(|b| b.segment).collect();
        assert_eq!(segs, vec![1, 3]);
        assert_eq!(v.bnd_point(3).map(|b| b.coord2d), Some([1.0, 1.0]));
    }

    #[test]
    fn edge_triangulation_membership() {
        let vs = vertex_handles(3);
        let mut e = Edge::new([vs[0], vs[1]], 1, [None, None]);
        assert!(!e.is_in_triang(0));
        assert!(e.is_in_triang(1) && e.is_in_triang(2));
        e.mid_vertex = Some(vs[2]);
        assert!(e.is_in_triang(1));
        assert!(!e.is_in_triang(2));
    }

    #[test]
    fn remove_mark_counts_as_no_refinement() {
        let vs = vertex_handles(4);
        let mut edges: SlotMap<EdgeKey, Edge> = SlotMap::with_key();
        let mut faces: SlotMap<FaceKey, Face> = SlotMap::with_key();
        let e = Handle::new(0, edges.insert(Edge::new([vs[0], vs[1]], 0, [None, None])));
        let f = Handle::new(0, faces.insert(Face::new([vs[0], vs[1], vs[2]], 0, None)));
        let mut t = Tetra {
            id: 0,
            level: 0,
            vertices: [vs[0], vs[1], vs[2], vs[3]],
            edges: [e; NUM_EDGES],
            faces: [f; NUM_FACES],
            parent: None,
            children: None,
            ref_mark: REMOVE_MARK,
            ref_rule: NO_REF_MARK,
        };
        assert!(t.is_mark_eq_rule());
        assert!(!t.is_marked_for_ref());
        t.ref_mark = REG_REF_MARK;
        assert!(!t.is_mark_eq_rule());
        assert!(t.is_marked_for_ref() && t.is_marked_for_reg_ref());
        assert!(t.children().is_empty());
    }

    #[test]
    fn children_hold_at_most_eight() {
        let mut arena: SlotMap<TetraKey, ()> = SlotMap::with_key();
        let handles: Vec<_> = (0..=MAX_CHILDREN).map(|_| Handle::new(1, arena.insert(()))).collect();
        let mut children = Children::default();
        for &h in &handles[..MAX_CHILDREN] {
            children.push(h).unwrap();
        }
        assert_eq!(children.as_slice(), &handles[..MAX_CHILDREN]);
        assert!(matches!(
            children.push(handles[MAX_CHILDREN]),
            Err(MeshError::InvariantViolation(_))
        ));
        assert_eq!(children.len(), MAX_CHILDREN);
    }
}
