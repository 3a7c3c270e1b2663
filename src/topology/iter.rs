//! The two level-parameterized iteration families.
//!
//! `all_*` walks every entity whose own level is at most `level` (the full
//! forest). `triang_*` walks only the entities of the conforming triangulation
//! resolved to depth `level`, which is what discretizations consume. Levels
//! beyond the finest one are clamped.

use crate::topology::multigrid::MultiGrid;
use crate::topology::simplex::{
    Edge, EdgeHandle, Face, FaceHandle, Handle, Tetra, TetraHandle, Vertex, VertexHandle,
};

macro_rules! all_family {
    ($name:ident, $field:ident, $handle:ty, $entity:ty) => {
        pub fn $name(&self, level: usize) -> impl Iterator<Item = ($handle, &$entity)> + '_ {
            let upto = level.min(self.last_level());
            self.levels[..=upto]
                .iter()
                .enumerate()
                .flat_map(|(l, lv)| lv.$field.iter().map(move |(k, e)| (Handle::new(l, k), e)))
        }
    };
}

impl MultiGrid {
    all_family!(all_vertices, vertices, VertexHandle, Vertex);
    all_family!(all_edges, edges, EdgeHandle, Edge);
    all_family!(all_faces, faces, FaceHandle, Face);
    all_family!(all_tetras, tetras, TetraHandle, Tetra);

    pub fn triang_vertices(&self, level: usize) -> impl Iterator<Item = (VertexHandle, &Vertex)> + '_ {
        let level = level.min(self.last_level());
        self.all_vertices(level).filter(move |(_, v)| v.is_in_triang(level))
    }

    pub fn triang_edges(&self, level: usize) -> impl Iterator<Item = (EdgeHandle, &Edge)> + '_ {
        let level = level.min(self.last_level());
        self.all_edges(level).filter(move |(_, e)| e.is_in_triang(level))
    }

    /// Faces of the level-`level` triangulation.
    ///
    /// A coarser face belongs to it as long as the rule of its first neighbor
    /// does not split it. Faces whose membership cannot be decided (a stale
    /// neighbor) are logged and kept, so the sanity checker still sees them.
    pub fn triang_faces(&self, level: usize) -> impl Iterator<Item = (FaceHandle, &Face)> + '_ {
        let level = level.min(self.last_level());
        self.all_faces(level)
            .filter(move |(h, _)| match self.is_face_in_triang(*h, level) {
                Ok(inside) => inside,
                Err(e) => {
                    log::warn!("face on level {} kept in triangulation {level}: {e}", h.level);
                    true
                }
            })
    }

    pub fn triang_tetras(&self, level: usize) -> impl Iterator<Item = (TetraHandle, &Tetra)> + '_ {
        let level = level.min(self.last_level());
        self.all_tetras(level).filter(move |(_, t)| t.is_in_triang(level))
    }
}
