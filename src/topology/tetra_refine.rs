//! Per-tetrahedron steps of a refinement cycle.
//!
//! These are called level by level from [`hierarchy`](crate::topology::hierarchy):
//! mark restriction and closure on the way down, and on the way up the rescue
//! of reusable children plus the collection of every sub-simplex a new rule
//! needs. Collection always searches the [`RecycleBins`](crate::topology::recycle::RecycleBins)
//! before creating anything.

use hashbrown::HashMap;

use crate::boundary::BndPoint;
use crate::geometry::metrics;
use crate::mesh_error::MeshError;
use crate::topology::multigrid::MultiGrid;
use crate::topology::reference::{NUM_EDGES, NUM_LOCAL_POINTS, VERT_OF_EDGE, VERT_OF_FACE};
use crate::topology::refine_rule::{
    GREEN_REG_REF_MARK, LocalEdge, LocalFace, NO_REF_MARK, REG_REF_MARK, REMOVE_MARK, RefRule,
    parent_edge, parent_face, parent_face_of_edge, parent_face_of_face, ref_rule, splits_edge,
    sub_edge,
};
use crate::topology::simplex::{Children, EdgeHandle, FaceHandle, TetraHandle, VertexHandle};

/// Corners followed by the midpoints of the six edges (if present).
pub(crate) type LocalPoints = [Option<VertexHandle>; NUM_LOCAL_POINTS];

fn sort2(a: u8, b: u8) -> LocalEdge {
    if a < b { [a, b] } else { [b, a] }
}

fn sort3(a: u8, b: u8, c: u8) -> LocalFace {
    let mut f = [a, b, c];
    f.sort_unstable();
    f
}

impl MultiGrid {
    /// Register a regular refinement on all six edges.
    pub(crate) fn commit_reg_ref_mark(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        for e in self.tetra(t)?.edges {
            self.edge_mut(e)?.mark_count += 1;
        }
        Ok(())
    }

    /// Withdraw a previously committed regular refinement.
    pub(crate) fn uncommit_reg_ref_mark(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        for e in self.tetra(t)?.edges {
            let [v0, v1] = self.edge(e)?.vertices;
            let ids = self.vertex_ids([v0, v1])?;
            let edge = self.edge_mut(e)?;
            edge.mark_count = edge
                .mark_count
                .checked_sub(1)
                .ok_or(MeshError::EdgeMarkUnderflow {
                    v0: ids[0],
                    v1: ids[1],
                })?;
        }
        Ok(())
    }

    /// Bring the marks of `t` and its children into a consistent request.
    pub(crate) fn restrict_mark(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        let tet = self.tetra(t)?;
        let (level, children) = (tet.level, tet.children().to_vec());

        if tet.is_unrefined() {
            if tet.is_marked_for_reg_ref() && self.is_regular(t)? {
                self.commit_reg_ref_mark(t)?;
            }
            let tet = self.tetra_mut(t)?;
            if tet.level == 0 && tet.is_marked_for_removal() {
                tet.ref_mark = NO_REF_MARK;
            }
            return Ok(());
        }

        if tet.is_regularly_refined() {
            let mut keep_any = false;
            for c in children {
                let child = self.tetra_mut(c)?;
                if child.is_marked_for_removal() {
                    child.ref_mark = NO_REF_MARK;
                } else {
                    keep_any = true;
                }
            }
            if !keep_any {
                log::trace!("tetra {} drops all children", self.tetra(t)?.id);
                self.tetra_mut(t)?.ref_mark = NO_REF_MARK;
                self.uncommit_reg_ref_mark(t)?;
            }
            return Ok(());
        }

        // irregular: promote to regular if any child asks for more
        let mut promote = false;
        for c in children {
            if !promote {
                let child = self.tetra(c)?;
                promote = child.is_marked_for_ref();
                // parent edges do not count
                for e in child.edges {
                    if promote {
                        break;
                    }
                    let edge = self.edge(e)?;
                    promote = edge.is_marked_for_ref() && edge.level != level;
                }
            }
            self.tetra_mut(c)?.ref_mark = NO_REF_MARK;
        }
        if promote {
            log::trace!("promoting irregular tetra {} to regular refinement", self.tetra(t)?.id);
            self.tetra_mut(t)?.ref_mark = REG_REF_MARK;
            self.commit_reg_ref_mark(t)?;
        } else {
            self.tetra_mut(t)?.ref_mark = NO_REF_MARK;
        }
        Ok(())
    }

    /// Set the mark of a regular tetra to the pattern of its marked edges.
    pub(crate) fn close(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        let mut pattern = 0u8;
        for (i, e) in self.tetra(t)?.edges.into_iter().enumerate() {
            if self.edge(e)?.is_marked_for_ref() {
                pattern |= 1 << i;
            }
        }
        let tet = self.tetra_mut(t)?;
        tet.ref_mark = match pattern {
            REG_REF_MARK => GREEN_REG_REF_MARK,
            NO_REF_MARK if tet.is_marked_for_removal() => REMOVE_MARK,
            p => p,
        };
        Ok(())
    }

    pub(crate) fn local_points(&self, t: TetraHandle) -> Result<LocalPoints, MeshError> {
        let tet = self.tetra(t)?;
        let mut pts = [None; NUM_LOCAL_POINTS];
        for (p, v) in pts.iter_mut().zip(tet.vertices) {
            *p = Some(v);
        }
        for (i, e) in tet.edges.into_iter().enumerate() {
            pts[4 + i] = self.edge(e)?.mid_vertex;
        }
        Ok(pts)
    }

    fn local_point(&self, t: TetraHandle, pts: &LocalPoints, label: u8) -> Result<VertexHandle, MeshError> {
        pts[usize::from(label)].ok_or_else(|| MeshError::MissingLocalVertex {
            tetra: self.tetra(t).map(|t| t.id).unwrap_or(u64::MAX),
            local: label,
        })
    }

    /// Create the midpoint of `edge` on the next level, projected onto the boundary.
    pub(crate) fn build_mid_vertex(&mut self, edge: EdgeHandle) -> Result<VertexHandle, MeshError> {
        let e = self.edge(edge)?;
        let (level, [h0, h1]) = (e.level + 1, e.vertices);
        let segments: Vec<_> = e.bnd_indices().collect();
        let (v0, v1) = (self.vertex(h0)?, self.vertex(h1)?);

        let mut coord = None;
        let mut bnd = Vec::with_capacity(segments.len());
        for seg in segments {
            let p0 = v0.bnd_point(seg).ok_or(MeshError::NonBoundaryVertex {
                vertex: v0.id,
                segment: seg,
            })?;
            let p1 = v1.bnd_point(seg).ok_or(MeshError::NonBoundaryVertex {
                vertex: v1.id,
                segment: seg,
            })?;
            let (pos, param) = self.boundary.segment(seg)?.mid_project(p0, p1);
            match coord {
                None => coord = Some(pos),
                Some(first) => {
                    let distance = metrics::distance(first, pos);
                    let tolerance = self.options.projection_tolerance;
                    if distance > tolerance {
                        return Err(MeshError::BoundaryProjectionMismatch {
                            v0: v0.id,
                            v1: v1.id,
                            distance,
                            tolerance,
                        });
                    }
                }
            }
            bnd.push(BndPoint::new(seg, param));
        }
        let coord = coord.unwrap_or_else(|| metrics::midpoint(v0.coord, v1.coord));

        let mid = self.insert_vertex(level, coord)?;
        let vertex = self.vertex_mut(mid)?;
        for p in bnd {
            vertex.add_bnd(p);
        }
        self.edge_mut(edge)?.mid_vertex = Some(mid);
        Ok(mid)
    }

    /// Split an unrefined edge: midpoint plus two recycled halves.
    pub(crate) fn build_sub_edges(&mut self, edge: EdgeHandle) -> Result<[EdgeHandle; 2], MeshError> {
        let mid = self.build_mid_vertex(edge)?;
        let e = self.edge(edge)?;
        let (level, [v0, v1], bnd) = (e.level + 1, e.vertices, e.bnd);
        // the midpoint is younger than both endpoints
        let lo = self.insert_edge(level, [v0, mid], bnd)?;
        let hi = self.insert_edge(level, [v1, mid], bnd)?;
        Ok([lo, hi])
    }

    fn find_sub_edge(&self, edge: EdgeHandle, half: usize) -> Result<EdgeHandle, MeshError> {
        let e = self.edge(edge)?;
        let ids = self.vertex_ids(e.vertices)?;
        let missing = MeshError::MissingSubEdge {
            v0: ids[0],
            v1: ids[1],
        };
        let mid = e.mid_vertex.ok_or(missing.clone())?;
        self.bins.find_edge([e.vertices[half], mid]).ok_or(missing)
    }

    /// Every edge the children of rule `rule` need, keyed by local edge.
    pub(crate) fn collect_edges(
        &mut self,
        t: TetraHandle,
        rule: &RefRule,
        mark: u8,
    ) -> Result<HashMap<LocalEdge, EdgeHandle>, MeshError> {
        let tet = self.tetra(t)?;
        let (edges, faces, level) = (tet.edges, tet.faces, tet.level + 1);

        for (i, e) in edges.into_iter().enumerate() {
            if splits_edge(mark, i) && !self.edge(e)?.is_refined() {
                self.build_sub_edges(e)?;
            }
        }
        let pts = self.local_points(t)?;

        let mut map = HashMap::with_capacity(rule.edges.len());
        for &le in &rule.edges {
            let handle = if let Some(pe) = parent_edge(le) {
                edges[pe]
            } else if let Some((pe, half)) = sub_edge(le) {
                self.find_sub_edge(edges[pe], half)?
            } else {
                let verts = self.sorted_by_id([
                    self.local_point(t, &pts, le[0])?,
                    self.local_point(t, &pts, le[1])?,
                ])?;
                match self.bins.find_edge(verts) {
                    Some(found) => found,
                    None => {
                        let bnd = match parent_face_of_edge(le) {
                            Some(f) => self.face(faces[f])?.bnd,
                            None => None,
                        };
                        self.insert_edge(level, verts, [bnd, None])?
                    }
                }
            };
            map.insert(le, handle);
        }
        Ok(map)
    }

    /// Every face the children of rule `rule` need, keyed by local face.
    pub(crate) fn collect_faces(
        &mut self,
        t: TetraHandle,
        rule: &RefRule,
    ) -> Result<HashMap<LocalFace, FaceHandle>, MeshError> {
        let faces = self.tetra(t)?.faces;
        let level = self.tetra(t)?.level + 1;
        let pts = self.local_points(t)?;

        let mut map = HashMap::with_capacity(rule.faces.len());
        for &lf in &rule.faces {
            let handle = if let Some(pf) = parent_face(lf) {
                faces[pf]
            } else {
                let verts = self.sorted_by_id([
                    self.local_point(t, &pts, lf[0])?,
                    self.local_point(t, &pts, lf[1])?,
                    self.local_point(t, &pts, lf[2])?,
                ])?;
                match self.bins.find_face(verts) {
                    Some(found) => found,
                    None => {
                        let bnd = match parent_face_of_face(lf) {
                            Some(f) => self.face(faces[f])?.bnd,
                            None => None,
                        };
                        self.insert_face(level, verts, bnd)?
                    }
                }
            };
            map.insert(lf, handle);
        }
        Ok(map)
    }

    /// Find or create the children of `t` and link them to their faces.
    pub(crate) fn collect_and_link_children(
        &mut self,
        t: TetraHandle,
        rule: &RefRule,
        edges: &HashMap<LocalEdge, EdgeHandle>,
        faces: &HashMap<LocalFace, FaceHandle>,
    ) -> Result<(), MeshError> {
        let level = self.tetra(t)?.level + 1;
        let pts = self.local_points(t)?;
        let mut children = Children::default();

        for child in rule.children {
            let mut labeled = Vec::with_capacity(4);
            for &l in child {
                let v = self.local_point(t, &pts, l)?;
                labeled.push((self.vertex(v)?.id, l, v));
            }
            labeled.sort_unstable_by_key(|(id, _, _)| *id);
            let labels: [u8; 4] = std::array::from_fn(|i| labeled[i].1);
            let verts: [VertexHandle; 4] = std::array::from_fn(|i| labeled[i].2);

            let mut child_edges = [None; NUM_EDGES];
            for (slot, [a, b]) in child_edges.iter_mut().zip(VERT_OF_EDGE) {
                *slot = edges.get(&sort2(labels[usize::from(a)], labels[usize::from(b)])).copied();
            }
            let mut child_faces = [None; 4];
            for (slot, [a, b, c]) in child_faces.iter_mut().zip(VERT_OF_FACE) {
                *slot = faces
                    .get(&sort3(
                        labels[usize::from(a)],
                        labels[usize::from(b)],
                        labels[usize::from(c)],
                    ))
                    .copied();
            }
            let incomplete = || {
                MeshError::InvariantViolation(format!(
                    "rule of tetra {} lacks a sub-simplex of child {child:?}",
                    self.tetra(t).map(|t| t.id).unwrap_or(u64::MAX)
                ))
            };
            let child_edges: [EdgeHandle; NUM_EDGES] = child_edges
                .iter()
                .copied()
                .collect::<Option<Vec<_>>>()
                .and_then(|v| v.try_into().ok())
                .ok_or_else(incomplete)?;
            let child_faces: [FaceHandle; 4] = child_faces
                .iter()
                .copied()
                .collect::<Option<Vec<_>>>()
                .and_then(|v| v.try_into().ok())
                .ok_or_else(incomplete)?;

            let handle = match self.bins.find_tetra(verts) {
                Some(found) => {
                    let c = self.tetra_mut(found)?;
                    c.edges = child_edges;
                    c.faces = child_faces;
                    found
                }
                None => self.insert_tetra(level, verts, child_edges, child_faces, Some(t))?,
            };
            self.link_to_faces(handle)?;
            children.push(handle)?;
        }
        log::trace!(
            "tetra {} refined into {} children",
            self.tetra(t)?.id,
            children.len()
        );
        self.tetra_mut(t)?.children = Some(children);
        Ok(())
    }

    /// Rescue the sub-simplices and children shared by the committed rule and the new mark.
    pub(crate) fn recycle_reusables(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        let tet = self.tetra(t)?;
        let old = ref_rule(tet.ref_rule);
        let new = ref_rule(tet.ref_mark);
        let children = tet.children().to_vec();
        let pts = self.local_points(t)?;

        for &c in &children {
            let child = self.tetra(c)?;
            let cv = child.vertices;
            let (c_edges, c_faces) = (child.edges, child.faces);
            let mut labels = [0u8; 4];
            for (label, v) in labels.iter_mut().zip(cv) {
                *label = pts
                    .iter()
                    .position(|p| *p == Some(v))
                    .and_then(|l| u8::try_from(l).ok())
                    .ok_or(MeshError::MissingLocalVertex {
                        tetra: child.id,
                        local: u8::MAX,
                    })?;
            }

            for (i, [a, b]) in VERT_OF_EDGE.into_iter().enumerate() {
                let (a, b) = (usize::from(a), usize::from(b));
                let le = sort2(labels[a], labels[b]);
                if parent_edge(le).is_some() || new.edges.binary_search(&le).is_err() {
                    continue;
                }
                debug_assert!(old.edges.binary_search(&le).is_ok());
                self.vertex_mut(cv[a])?.remove_mark = false;
                self.vertex_mut(cv[b])?.remove_mark = false;
                self.edge_mut(c_edges[i])?.remove_mark = false;
                self.bins.recycle_edge([cv[a], cv[b]], c_edges[i]);
            }

            for (i, [a, b, d]) in VERT_OF_FACE.into_iter().enumerate() {
                let (a, b, d) = (usize::from(a), usize::from(b), usize::from(d));
                let lf = sort3(labels[a], labels[b], labels[d]);
                if parent_face(lf).is_some() || new.faces.binary_search(&lf).is_err() {
                    continue;
                }
                self.face_mut(c_faces[i])?.remove_mark = false;
                self.bins.recycle_face([cv[a], cv[b], cv[d]], c_faces[i]);
            }

            if new.children.contains(&labels) {
                log::trace!("recycling child {}", self.tetra(c)?.id);
                self.tetra_mut(c)?.ref_mark = NO_REF_MARK;
                self.unlink_from_faces(c)?;
                self.bins.recycle_tetra(cv, c);
            }
        }
        Ok(())
    }

    /// Save every sub-simplex of the children of `t` from removal.
    pub(crate) fn clear_all_remove_marks(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        for c in self.tetra(t)?.children().to_vec() {
            let child = self.tetra(c)?;
            let (verts, edges, faces) = (child.vertices, child.edges, child.faces);
            for v in verts {
                self.vertex_mut(v)?.remove_mark = false;
            }
            for e in edges {
                self.edge_mut(e)?.remove_mark = false;
            }
            for f in faces {
                self.face_mut(f)?.remove_mark = false;
            }
        }
        Ok(())
    }

    /// Apply the pending mark of `t` as its new rule and build the children.
    pub(crate) fn refine_tetra(&mut self, t: TetraHandle) -> Result<(), MeshError> {
        let tet = self.tetra_mut(t)?;
        let mark = if tet.is_marked_for_removal() {
            NO_REF_MARK
        } else {
            tet.ref_mark
        };
        tet.ref_rule = mark;
        if mark == NO_REF_MARK {
            log::trace!("tetra {} unrefined", tet.id);
            tet.children = None;
            return Ok(());
        }
        let rule = ref_rule(mark);
        let edges = self.collect_edges(t, rule, mark)?;
        let faces = self.collect_faces(t, rule)?;
        self.collect_and_link_children(t, rule, &edges, &faces)
    }
}
