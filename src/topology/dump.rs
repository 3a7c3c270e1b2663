//! Human-readable entity dumps for diagnostics. Not a stable format.

use std::fmt::Write;

use crate::topology::multigrid::MultiGrid;
use crate::topology::simplex::{EdgeHandle, FaceHandle, TetraHandle, VertexHandle};

impl MultiGrid {
    fn vertex_label(&self, v: VertexHandle) -> String {
        match self.vertex(v) {
            Ok(v) => format!("{}@{:?}", v.id, v.coord),
            Err(_) => "<stale>".to_string(),
        }
    }

    fn tetra_label(&self, t: Option<TetraHandle>) -> String {
        match t.map(|t| self.tetra(t)) {
            None => "-".to_string(),
            Some(Ok(t)) => t.id.to_string(),
            Some(Err(_)) => "<stale>".to_string(),
        }
    }

    pub fn dump_vertex(&self, v: VertexHandle) -> String {
        let Ok(vertex) = self.vertex(v) else {
            return format!("stale vertex handle on level {}", v.level);
        };
        let mut out = String::new();
        let _ = writeln!(out, "Vertex {} level {} at {:?}", vertex.id, vertex.level, vertex.coord);
        for p in &vertex.bnd {
            let _ = writeln!(out, "  on segment {} at {:?}", p.segment, p.coord2d);
        }
        let (edges, faces, tetras) = self.bins.bin_sizes(v);
        if edges + faces + tetras > 0 {
            let _ = writeln!(out, "  recycle bin: {edges} edges, {faces} faces, {tetras} tetras");
        }
        if vertex.remove_mark {
            let _ = writeln!(out, "  marked for removal");
        }
        out
    }

    pub fn dump_edge(&self, e: EdgeHandle) -> String {
        let Ok(edge) = self.edge(e) else {
            return format!("stale edge handle on level {}", e.level);
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Edge level {}: {} -> {}",
            edge.level,
            self.vertex_label(edge.vertices[0]),
            self.vertex_label(edge.vertices[1])
        );
        let _ = writeln!(out, "  boundary {:?}, refinement count {}", edge.bnd, edge.mark_count);
        if let Some(mid) = edge.mid_vertex {
            let _ = writeln!(out, "  midpoint {}", self.vertex_label(mid));
        }
        out
    }

    pub fn dump_face(&self, f: FaceHandle) -> String {
        let Ok(face) = self.face(f) else {
            return format!("stale face handle on level {}", f.level);
        };
        let mut out = String::new();
        let _ = writeln!(out, "Face level {} boundary {:?}", face.level, face.bnd);
        for v in face.vertices {
            let _ = writeln!(out, "  vertex {}", self.vertex_label(v));
        }
        let slots: Vec<_> = face.neighbors.iter().map(|n| self.tetra_label(*n)).collect();
        let _ = writeln!(out, "  neighbors {}", slots.join(" "));
        out
    }

    pub fn dump_tetra(&self, t: TetraHandle) -> String {
        let Ok(tet) = self.tetra(t) else {
            return format!("stale tetra handle on level {}", t.level);
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Tetra {} level {} mark {} rule {} parent {}",
            tet.id,
            tet.level,
            tet.ref_mark,
            tet.ref_rule,
            self.tetra_label(tet.parent)
        );
        for v in tet.vertices {
            let _ = writeln!(out, "  vertex {}", self.vertex_label(v));
        }
        for (i, e) in tet.edges.iter().enumerate() {
            let count = self.edge(*e).map(|e| e.mark_count).unwrap_or_default();
            let _ = writeln!(out, "  edge {i} level {} count {count}", e.level);
        }
        for (i, f) in tet.faces.iter().enumerate() {
            let neighbor = self.neighbor(t, i).ok().flatten();
            let _ = writeln!(out, "  face {i} level {} neighbor {}", f.level, self.tetra_label(neighbor));
        }
        if !tet.children().is_empty() {
            let ids: Vec<_> = tet.children().iter().map(|c| self.tetra_label(Some(*c))).collect();
            let _ = writeln!(out, "  children {}", ids.join(" "));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh_generation::TetraBuilder;
    use crate::topology::multigrid::MultiGrid;

    #[test]
    fn tetra_dump_lists_corners_and_faces() {
        let mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let (t, _) = mg.all_tetras(0).next().unwrap();
        let dump = mg.dump_tetra(t);
        assert!(dump.starts_with("Tetra 0 level 0"));
        assert_eq!(dump.matches("  vertex ").count(), 4);
        assert_eq!(dump.matches("neighbor -").count(), 4);

        let (f, _) = mg.all_faces(0).next().unwrap();
        assert!(mg.dump_face(f).contains("neighbors 0 - - -"));
    }
}
