//! Recycle bins: per-vertex scratch lists of entities that may be reused.
//!
//! During one refinement pass every freshly built or rescued edge, face and
//! child tetra is registered with its lowest-identifier vertex. Collection of
//! a tetra's sub-simplices then searches these bins before creating anything,
//! which keeps at most one edge per vertex pair and one face per vertex triple
//! on every level. Bins are a side table keyed by vertex handle; all of them
//! are dropped once a level has been refined.
//!
//! All lookups take vertices in ascending identifier order.

use hashbrown::HashMap;

use crate::topology::simplex::{EdgeHandle, FaceHandle, TetraHandle, VertexHandle};

#[derive(Clone, Debug, Default)]
pub(crate) struct RecycleBin {
    edges: Vec<(VertexHandle, EdgeHandle)>,
    faces: Vec<([VertexHandle; 2], FaceHandle)>,
    tetras: Vec<([VertexHandle; 3], TetraHandle)>,
}

impl RecycleBin {
    fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.faces.is_empty() && self.tetras.is_empty()
    }
}

/// Lazily populated bins, keyed by the owning (lowest) vertex.
#[derive(Clone, Debug, Default)]
pub struct RecycleBins {
    bins: HashMap<VertexHandle, RecycleBin>,
}

impl RecycleBins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recycle_edge(&mut self, v: [VertexHandle; 2], edge: EdgeHandle) {
        let bin = self.bins.entry(v[0]).or_default();
        if !bin.edges.iter().any(|(_, e)| *e == edge) {
            bin.edges.push((v[1], edge));
        }
    }

    pub fn find_edge(&self, v: [VertexHandle; 2]) -> Option<EdgeHandle> {
        self.bins
            .get(&v[0])?
            .edges
            .iter()
            .find(|(hi, _)| *hi == v[1])
            .map(|(_, e)| *e)
    }

    pub fn recycle_face(&mut self, v: [VertexHandle; 3], face: FaceHandle) {
        let bin = self.bins.entry(v[0]).or_default();
        if !bin.faces.iter().any(|(_, f)| *f == face) {
            bin.faces.push(([v[1], v[2]], face));
        }
    }

    pub fn find_face(&self, v: [VertexHandle; 3]) -> Option<FaceHandle> {
        self.bins
            .get(&v[0])?
            .faces
            .iter()
            .find(|(rest, _)| *rest == [v[1], v[2]])
            .map(|(_, f)| *f)
    }

    pub fn recycle_tetra(&mut self, v: [VertexHandle; 4], tetra: TetraHandle) {
        let bin = self.bins.entry(v[0]).or_default();
        if !bin.tetras.iter().any(|(_, t)| *t == tetra) {
            bin.tetras.push(([v[1], v[2], v[3]], tetra));
        }
    }

    pub fn find_tetra(&self, v: [VertexHandle; 4]) -> Option<TetraHandle> {
        self.bins
            .get(&v[0])?
            .tetras
            .iter()
            .find(|(rest, _)| *rest == [v[1], v[2], v[3]])
            .map(|(_, t)| *t)
    }

    /// Whether `vertex` currently owns a non-empty bin.
    pub fn has_bin(&self, vertex: VertexHandle) -> bool {
        self.bins.get(&vertex).is_some_and(|b| !b.is_empty())
    }

    /// Number of vertices owning a bin.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Registered entity counts `(edges, faces, tetras)` of one vertex' bin.
    pub fn bin_sizes(&self, vertex: VertexHandle) -> (usize, usize, usize) {
        self.bins
            .get(&vertex)
            .map(|b| (b.edges.len(), b.faces.len(), b.tetras.len()))
            .unwrap_or_default()
    }

    /// Drop every bin.
    pub fn destroy_all(&mut self) {
        self.bins.clear();
    }
}
