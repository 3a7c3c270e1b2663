//! Hierarchy sanity checks.
//!
//! The checker is read-only. It never repairs anything; every violation is
//! logged and collected, and [`validate_multigrid`] turns a non-empty report
//! into [`MeshError::InvariantViolation`].

use hashbrown::{HashMap, HashSet};

use crate::debug_invariants::DebugInvariants;
use crate::geometry::metrics;
use crate::mesh_error::MeshError;
use crate::topology::multigrid::MultiGrid;
use crate::topology::reference::{OPP_EDGE, VERT_OF_EDGE, VERT_OF_FACE};
use crate::topology::refine_rule::ref_rule;
use crate::topology::simplex::{EdgeHandle, FaceHandle, TetraHandle, VertexHandle};

/// Groups of checks run by the sanity checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanityOptions {
    /// Levels and boundary parameters of vertices.
    pub check_vertices: bool,
    /// Endpoint order, boundary ids and uniqueness of edges.
    pub check_edges: bool,
    /// Neighbor slots, boundary ids and uniqueness of faces.
    pub check_faces: bool,
    /// Sub-simplex orientation, parent/child links and edge refinement counters.
    pub check_tetras: bool,
    /// Children fill their parent exactly. Only holds for planar boundaries.
    pub check_volumes: bool,
    /// Every triangulation face has one tetra per side.
    pub check_conformity: bool,
    /// No recycle bin survives a refinement cycle.
    pub check_bins: bool,
}

impl SanityOptions {
    /// Enable all checks.
    pub fn all() -> Self {
        Self {
            check_vertices: true,
            check_edges: true,
            check_faces: true,
            check_tetras: true,
            check_volumes: true,
            check_conformity: true,
            check_bins: true,
        }
    }

    /// All checks except the volume balance of refined tetras.
    pub fn curved() -> Self {
        Self {
            check_volumes: false,
            ..Self::all()
        }
    }
}

impl Default for SanityOptions {
    fn default() -> Self {
        Self::all()
    }
}

fn vid(mg: &MultiGrid, v: VertexHandle) -> u64 {
    mg.vertex(v).map(|v| v.id).unwrap_or(u64::MAX)
}

struct Report<'a> {
    mg: &'a MultiGrid,
    violations: Vec<String>,
}

impl Report<'_> {
    fn fail(&mut self, msg: String) {
        log::warn!("sanity: {msg}");
        self.violations.push(msg);
    }

    fn check(&mut self, ok: bool, msg: impl FnOnce() -> String) {
        if !ok {
            self.fail(msg());
        }
    }

    fn lookup<T>(&mut self, what: &str, r: Result<T, MeshError>) -> Option<T> {
        match r {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(format!("{what}: {e}"));
                None
            }
        }
    }

    fn vertices(&mut self) {
        let mg = self.mg;
        for (h, v) in mg.all_vertices(mg.last_level()) {
            self.check(v.level == h.level, || {
                format!("vertex {} stored on level {} claims level {}", v.id, h.level, v.level)
            });
            let tol = mg.options.projection_tolerance * (1.0 + metrics::norm(v.coord));
            for p in &v.bnd {
                let Some(seg) = self.lookup("vertex boundary", mg.boundary.segment(p.segment)) else {
                    continue;
                };
                let d = metrics::distance(seg.map(p.coord2d), v.coord);
                self.check(d <= tol, || {
                    format!(
                        "vertex {} is {d:e} away from its parameter on segment {}",
                        v.id, p.segment
                    )
                });
            }
        }
    }

    fn edges(&mut self) {
        let mg = self.mg;
        let mut seen: HashSet<[VertexHandle; 2]> = HashSet::new();
        for (h, e) in mg.all_edges(mg.last_level()) {
            let [v0, v1] = e.vertices;
            let (i0, i1) = (vid(mg, v0), vid(mg, v1));
            self.check(e.level == h.level, || format!("edge {i0}-{i1} has a wrong level"));
            self.check(i0 < i1, || format!("edge {i0}-{i1} endpoints are not sorted"));
            self.check(v0.level <= e.level && v1.level <= e.level, || {
                format!("edge {i0}-{i1} uses a vertex from a finer level")
            });
            self.check(seen.insert(e.vertices), || format!("edge {i0}-{i1} exists twice"));
            for seg in e.bnd_indices() {
                let on_seg = [v0, v1].iter().all(|&v| {
                    mg.vertex(v).is_ok_and(|v| v.bnd_point(seg).is_some())
                });
                self.check(on_seg, || {
                    format!("edge {i0}-{i1} on segment {seg} has an endpoint off that segment")
                });
            }
            if let Some(mid) = e.mid_vertex {
                self.check(mid.level == e.level + 1 && mg.vertex(mid).is_ok(), || {
                    format!("edge {i0}-{i1} has a stale midpoint")
                });
            }
        }
    }

    fn faces(&mut self) {
        let mg = self.mg;
        let mut seen: HashSet<[VertexHandle; 3]> = HashSet::new();
        for (h, f) in mg.all_faces(mg.last_level()) {
            let ids = f.vertices.map(|v| vid(mg, v));
            self.check(f.level == h.level, || format!("face {ids:?} has a wrong level"));
            self.check(ids[0] < ids[1] && ids[1] < ids[2], || {
                format!("face {ids:?} vertices are not sorted")
            });
            self.check(seen.insert(f.vertices), || format!("face {ids:?} exists twice"));
            self.check(f.neighbors[0].is_some(), || format!("face {ids:?} has no tetra"));
            self.check(f.neighbors[1].is_some() != f.is_on_boundary(), || {
                format!("face {ids:?} neighbor count does not match its boundary flag")
            });
            for (slot, n) in f.neighbors.iter().enumerate() {
                let Some(t) = *n else { continue };
                let Some(tet) = self.lookup("face neighbor", mg.tetra(t)) else {
                    continue;
                };
                self.check(tet.level == f.level + slot / 2 && tet.face_index(h).is_some(), || {
                    format!("face {ids:?} slot {slot} links tetra {} that does not use it", tet.id)
                });
            }
            if let Some(seg) = f.bnd {
                let on_seg = f
                    .vertices
                    .iter()
                    .all(|&v| mg.vertex(v).is_ok_and(|v| v.bnd_point(seg).is_some()));
                self.check(on_seg, || format!("face {ids:?} has a vertex off segment {seg}"));
            }
        }
    }

    fn tetras(&mut self, volumes: bool) {
        let mg = self.mg;
        let mut committed: HashMap<EdgeHandle, u16> = HashMap::new();
        for (h, t) in mg.all_tetras(mg.last_level()) {
            let id = t.id;
            let ids = t.vertices.map(|v| vid(mg, v));
            self.check(t.level == h.level, || format!("tetra {id} has a wrong level"));
            self.check(ids.windows(2).all(|w| w[0] < w[1]), || {
                format!("tetra {id} vertices {ids:?} are not sorted")
            });
            for (e, [a, b]) in VERT_OF_EDGE.into_iter().enumerate() {
                let expected = [t.vertices[usize::from(a)], t.vertices[usize::from(b)]];
                let ok = mg.edge(t.edges[e]).is_ok_and(|edge| edge.vertices == expected);
                self.check(ok, || format!("tetra {id} edge {e} does not match its corners"));
                let opp = mg.edge(t.edges[usize::from(OPP_EDGE[e])]);
                let covers = mg.edge(t.edges[e]).is_ok_and(|edge| {
                    opp.is_ok_and(|o| {
                        let mut all = [edge.vertices, o.vertices].concat();
                        all.sort();
                        all.dedup();
                        all.len() == 4
                    })
                });
                self.check(covers, || format!("tetra {id} edge {e} and its opposite share a vertex"));
            }
            for (f, [a, b, c]) in VERT_OF_FACE.into_iter().enumerate() {
                let expected = [a, b, c].map(|i| t.vertices[usize::from(i)]);
                let linked = mg.face(t.faces[f]).is_ok_and(|face| {
                    face.vertices == expected && face.neighbors.contains(&Some(h))
                });
                self.check(linked, || format!("tetra {id} face {f} does not match or link back"));
            }

            match t.parent {
                None => self.check(t.level == 0, || format!("tetra {id} above level 0 has no parent")),
                Some(p) => {
                    let ok = mg.tetra(p).is_ok_and(|p| p.children().contains(&h));
                    self.check(ok, || format!("tetra {id} is not among its parent's children"));
                }
            }

            if !t.is_unrefined() {
                self.check(t.ref_mark == t.ref_rule, || {
                    format!("refined tetra {id} has mark {} but rule {}", t.ref_mark, t.ref_rule)
                });
                let expected = ref_rule(t.ref_rule).child_count();
                self.check(t.children().len() == expected, || {
                    format!("tetra {id} has {} children, rule {} needs {expected}", t.children().len(), t.ref_rule)
                });
                for &c in t.children() {
                    let ok = mg.tetra(c).is_ok_and(|c| c.parent == Some(h) && c.level == t.level + 1);
                    self.check(ok, || format!("child of tetra {id} does not point back"));
                }
                if volumes {
                    self.volume_balance(h);
                }
            }

            if t.is_regularly_refined() && mg.is_regular(h).unwrap_or(false) {
                for e in t.edges {
                    *committed.entry(e).or_default() += 1;
                }
            }
        }

        for (h, e) in mg.all_edges(mg.last_level()) {
            let expected = committed.get(&h).copied().unwrap_or(0);
            self.check(e.mark_count == expected, || {
                format!(
                    "edge {}-{} counts {} refinements, {expected} regular tetras refine it",
                    vid(mg, e.vertices[0]),
                    vid(mg, e.vertices[1]),
                    e.mark_count
                )
            });
        }
    }

    fn volume_balance(&mut self, t: TetraHandle) {
        let mg = self.mg;
        let Some(parent) = self.lookup("volume", mg.volume(t)) else {
            return;
        };
        let children: Result<f64, MeshError> = mg
            .tetra(t)
            .map(|t| t.children().to_vec())
            .and_then(|cs| cs.into_iter().map(|c| mg.volume(c)).sum());
        let Some(children) = self.lookup("child volume", children) else {
            return;
        };
        let tol = mg.options.volume_tolerance * parent.max(f64::MIN_POSITIVE);
        self.check((children - parent).abs() <= tol, || {
            format!(
                "children of tetra {} have volume {children:e}, parent {parent:e}",
                mg.tetra(t).map(|t| t.id).unwrap_or(u64::MAX)
            )
        });
    }

    fn conformity(&mut self) {
        let mg = self.mg;
        for level in 0..mg.num_levels() {
            let mut uses: HashMap<FaceHandle, usize> = HashMap::new();
            for (_, t) in mg.triang_tetras(level) {
                for f in t.faces {
                    *uses.entry(f).or_default() += 1;
                }
            }
            for (h, f) in mg.triang_faces(level) {
                let expected = if f.is_on_boundary() { 1 } else { 2 };
                let got = uses.remove(&h).unwrap_or(0);
                self.check(got == expected, || {
                    format!(
                        "level {level}: face {:?} is used by {got} triangulation tetras, expected {expected}",
                        f.vertices.map(|v| vid(mg, v))
                    )
                });
            }
            self.check(uses.is_empty(), || {
                format!("level {level}: {} faces used by the triangulation are not part of it", uses.len())
            });
        }
    }
}

impl MultiGrid {
    /// Collect every invariant violation selected by `options`.
    pub fn sanity_violations(&self, options: SanityOptions) -> Vec<String> {
        let mut report = Report {
            mg: self,
            violations: Vec::new(),
        };
        if options.check_vertices {
            report.vertices();
        }
        if options.check_edges {
            report.edges();
        }
        if options.check_faces {
            report.faces();
        }
        if options.check_tetras {
            report.tetras(options.check_volumes);
        }
        if options.check_conformity {
            report.conformity();
        }
        if options.check_bins {
            let bins = self.bins.len();
            report.check(bins == 0, || format!("{bins} recycle bins outlived the refinement cycle"));
        }
        report.violations
    }

    pub fn is_sane(&self, options: SanityOptions) -> bool {
        self.sanity_violations(options).is_empty()
    }
}

/// Validate the whole hierarchy, failing on the first report with violations.
pub fn validate_multigrid(mg: &MultiGrid, options: SanityOptions) -> Result<(), MeshError> {
    let violations = mg.sanity_violations(options);
    match violations.first() {
        None => Ok(()),
        Some(first) => Err(MeshError::InvariantViolation(format!(
            "{first} ({} violations in total)",
            violations.len()
        ))),
    }
}

impl DebugInvariants for MultiGrid {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "multigrid");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        validate_multigrid(self, SanityOptions::curved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::{BrickBuilder, TetraBuilder};

    #[test]
    fn fresh_level_zero_is_sane() {
        let mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        assert_eq!(mg.sanity_violations(SanityOptions::all()), Vec::<String>::new());
        let brick = MultiGrid::new(&BrickBuilder::new([0.0; 3], [1.0, 2.0, 1.0], [2, 1, 1])).unwrap();
        assert!(brick.is_sane(SanityOptions::all()));
    }

    #[test]
    fn broken_counter_is_reported() {
        let mut mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let (e, _) = mg.all_edges(0).next().unwrap();
        mg.edge_mut(e).unwrap().mark_count = 3;
        let err = validate_multigrid(&mg, SanityOptions::all()).unwrap_err();
        assert!(matches!(err, MeshError::InvariantViolation(msg) if msg.contains("counts 3")));
    }

    #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
    #[test]
    #[should_panic(expected = "[invariants] multigrid")]
    fn broken_counter_panics_in_debug() {
        let mut mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let (e, _) = mg.all_edges(0).next().unwrap();
        mg.edge_mut(e).unwrap().mark_count = 3;
        mg.debug_assert_invariants();
    }

    #[cfg(all(
        debug_assertions,
        not(any(feature = "strict-invariants", feature = "check-invariants"))
    ))]
    #[test]
    #[should_panic(expected = "[invariants] multigrid")]
    fn refine_asserts_invariants_in_debug() {
        let mut mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let (v, _) = mg.all_vertices(0).next().unwrap();
        mg.vertex_mut(v).unwrap().bnd[0].coord2d = [0.5, 0.5];
        let _ = mg.refine();
    }

    #[test]
    fn leftover_bins_are_reported() {
        let mut mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let (e, edge) = mg.all_edges(0).next().map(|(h, e)| (h, e.vertices)).unwrap();
        mg.bins.recycle_edge(edge, e);
        let only_bins = SanityOptions {
            check_vertices: false,
            check_edges: false,
            check_faces: false,
            check_tetras: false,
            check_volumes: false,
            check_conformity: false,
            check_bins: true,
        };
        assert_eq!(mg.sanity_violations(only_bins).len(), 1);
    }
}
