//! The refinement-rule catalog.
//!
//! Each of the 64 edge patterns (bit `e` set when edge `e` is split) maps to a
//! conforming decomposition of the reference tetrahedron into children given
//! as ascending 4-tuples of local points (see [`crate::topology::reference`]).
//! A face is always split the same way for the same marked face edges:
//! one edge splits towards the opposite corner, two edges split the lower edge
//! first, three edges give the red 1:4 split. Neighbouring tetrahedra that
//! agree on their vertex order therefore agree on every shared sub-face.
//!
//! Edge and face lists of a rule are the sorted unions over its children and
//! serve as the stable ids compared when a rule changes.

use itertools::Itertools;
use once_cell::sync::Lazy;
use static_assertions::const_assert_eq;

use crate::topology::reference::{
    NUM_EDGES, NUM_VERTS, VERT_OF_EDGE, VERT_OF_FACE, common_parent_face,
    edge_of_midpoint, face_by_vert,
};

/// Number of catalog entries.
pub const NUM_RULES: usize = 64;

const_assert_eq!(NUM_RULES, 1 << NUM_EDGES);

/// No refinement requested or committed.
pub const NO_REF_MARK: u8 = 0;
/// Regular refinement into eight children.
pub const REG_REF_MARK: u8 = 63;
/// All edges split, but as a closure of a green child; uses the regular catalog entry.
pub const GREEN_REG_REF_MARK: u8 = 127;
/// The owning parent should drop this tetrahedron.
pub const REMOVE_MARK: u8 = 64;

/// Local edge id: ascending pair of local points.
pub type LocalEdge = [u8; 2];
/// Local face id: ascending triple of local points.
pub type LocalFace = [u8; 3];
/// Local child id: ascending quadruple of local points.
pub type LocalChild = [u8; 4];

/// Decomposition of one edge pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRule {
    pub children: &'static [LocalChild],
    pub edges: Vec<LocalEdge>,
    pub faces: Vec<LocalFace>,
}

impl RefRule {
    fn from_children(children: &'static [LocalChild]) -> Self {
        let edges = children
            .iter()
            .flat_map(|c| VERT_OF_EDGE.iter().map(move |[a, b]| [c[*a as usize], c[*b as usize]]))
            .sorted()
            .dedup()
            .collect();
        let faces = children
            .iter()
            .flat_map(|c| {
                VERT_OF_FACE
                    .iter()
                    .map(move |[a, b, d]| [c[*a as usize], c[*b as usize], c[*d as usize]])
            })
            .sorted()
            .dedup()
            .collect();
        Self {
            children,
            edges,
            faces,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Catalog entry for a committed rule or mark; the green bit is ignored.
pub fn ref_rule(rule: u8) -> &'static RefRule {
    &RULES[usize::from(rule & 63)]
}

/// Parent edge index when both endpoints are corners.
pub fn parent_edge(edge: LocalEdge) -> Option<usize> {
    if usize::from(edge[1]) < NUM_VERTS {
        VERT_OF_EDGE.iter().position(|e| *e == edge)
    } else {
        None
    }
}

/// `(parent edge, half)` when `edge` joins a corner to the midpoint of an incident edge.
///
/// Half `0` touches the lower corner of the parent edge.
pub fn sub_edge(edge: LocalEdge) -> Option<(usize, usize)> {
    let [corner, mid] = edge;
    let parent = edge_of_midpoint(mid)?;
    VERT_OF_EDGE[parent]
        .iter()
        .position(|&v| v == corner)
        .map(|half| (parent, half))
}

/// Parent face an inner edge lies on; `None` for the interior diagonals.
pub fn parent_face_of_edge(edge: LocalEdge) -> Option<usize> {
    common_parent_face(&edge)
}

/// Parent face index when all three points are corners.
pub fn parent_face(face: LocalFace) -> Option<usize> {
    if face.iter().all(|&v| usize::from(v) < NUM_VERTS) {
        face_by_vert(face[0], face[1], face[2])
    } else {
        None
    }
}

/// Parent face a sub-face lies on; `None` for faces through the interior.
pub fn parent_face_of_face(face: LocalFace) -> Option<usize> {
    common_parent_face(&face)
}

/// Edge pattern of a rule or mark, with the green bit stripped.
pub fn edge_pattern(rule: u8) -> u8 {
    rule & 63
}

/// Whether edge `e` is split by `rule`.
pub fn splits_edge(rule: u8, e: usize) -> bool {
    edge_pattern(rule) & (1 << e) != 0
}

static RULES: Lazy<Vec<RefRule>> =
    Lazy::new(|| CHILDREN.iter().map(|c| RefRule::from_children(*c)).collect());

#[rustfmt::skip]
static CHILDREN: [&[LocalChild]; NUM_RULES] = [
    &[[0, 1, 2, 3]],
    &[[0, 2, 3, 4], [1, 2, 3, 4]],
    &[[0, 1, 3, 5], [1, 2, 3, 5]],
    &[[0, 3, 4, 5], [1, 2, 3, 4], [2, 3, 4, 5]],
    &[[0, 1, 3, 6], [0, 2, 3, 6]],
    &[[0, 2, 3, 4], [1, 3, 4, 6], [2, 3, 4, 6]],
    &[[0, 1, 3, 5], [1, 3, 5, 6], [2, 3, 5, 6]],
    &[[0, 3, 4, 5], [1, 3, 4, 6], [2, 3, 5, 6], [3, 4, 5, 6]],
    &[[0, 1, 2, 7], [1, 2, 3, 7]],
    &[[0, 2, 4, 7], [1, 2, 3, 4], [2, 3, 4, 7]],
    &[[0, 1, 5, 7], [1, 2, 3, 5], [1, 3, 5, 7]],
    &[[0, 4, 5, 7], [1, 2, 3, 4], [2, 3, 4, 5], [3, 4, 5, 7]],
    &[[0, 1, 6, 7], [0, 2, 6, 7], [1, 3, 6, 7], [2, 3, 6, 7]],
    &[[0, 2, 4, 7], [1, 3, 4, 6], [2, 3, 4, 6], [2, 3, 4, 7]],
    &[[0, 1, 5, 7], [1, 3, 5, 6], [1, 3, 5, 7], [2, 3, 5, 6]],
    &[[0, 4, 5, 7], [1, 3, 4, 6], [2, 3, 5, 6], [3, 4, 5, 6], [3, 4, 5, 7]],
    &[[0, 1, 2, 8], [0, 2, 3, 8]],
    &[[0, 2, 3, 4], [1, 2, 4, 8], [2, 3, 4, 8]],
    &[[0, 1, 5, 8], [0, 3, 5, 8], [1, 2, 5, 8], [2, 3, 5, 8]],
    &[[0, 3, 4, 5], [1, 2, 4, 8], [2, 3, 4, 5], [2, 3, 4, 8]],
    &[[0, 1, 6, 8], [0, 2, 3, 6], [0, 3, 6, 8]],
    &[[0, 2, 3, 4], [1, 4, 6, 8], [2, 3, 4, 6], [3, 4, 6, 8]],
    &[[0, 1, 5, 8], [0, 3, 5, 8], [1, 5, 6, 8], [2, 3, 5, 6], [3, 5, 6, 8]],
    &[[0, 3, 4, 5], [1, 4, 6, 8], [2, 3, 5, 6], [3, 4, 5, 6], [3, 4, 6, 8]],
    &[[0, 1, 2, 7], [1, 2, 7, 8], [2, 3, 7, 8]],
    &[[0, 2, 4, 7], [1, 2, 4, 8], [2, 3, 7, 8], [2, 4, 7, 8]],
    &[[0, 1, 5, 7], [1, 2, 5, 8], [1, 5, 7, 8], [2, 3, 5, 8], [3, 5, 7, 8]],
    &[[0, 4, 5, 7], [1, 2, 4, 8], [2, 3, 5, 8], [2, 4, 5, 8], [3, 5, 7, 8], [4, 5, 7, 8]],
    &[[0, 1, 6, 7], [0, 2, 6, 7], [1, 6, 7, 8], [2, 3, 6, 7], [3, 6, 7, 8]],
    &[[0, 2, 4, 7], [1, 4, 6, 8], [2, 3, 6, 7], [2, 4, 6, 7], [3, 6, 7, 8], [4, 6, 7, 8]],
    &[[0, 1, 5, 7], [1, 5, 6, 8], [1, 5, 7, 8], [2, 3, 5, 6], [3, 5, 6, 8], [3, 5, 7, 8]],
    &[
        [0, 4, 5, 7], [1, 4, 6, 8], [2, 3, 5, 6], [3, 5, 6, 8], [3, 5, 7, 8], [4, 5, 6, 8],
        [4, 5, 7, 8],
    ],
    &[[0, 1, 2, 9], [0, 1, 3, 9]],
    &[[0, 2, 4, 9], [0, 3, 4, 9], [1, 2, 4, 9], [1, 3, 4, 9]],
    &[[0, 1, 3, 5], [1, 2, 5, 9], [1, 3, 5, 9]],
    &[[0, 3, 4, 5], [1, 2, 4, 9], [1, 3, 4, 9], [2, 4, 5, 9], [3, 4, 5, 9]],
    &[[0, 1, 3, 6], [0, 2, 6, 9], [0, 3, 6, 9]],
    &[[0, 2, 4, 9], [0, 3, 4, 9], [1, 3, 4, 6], [2, 4, 6, 9], [3, 4, 6, 9]],
    &[[0, 1, 3, 5], [1, 3, 5, 6], [2, 5, 6, 9], [3, 5, 6, 9]],
    &[[0, 3, 4, 5], [1, 3, 4, 6], [2, 5, 6, 9], [3, 4, 5, 9], [3, 4, 6, 9], [4, 5, 6, 9]],
    &[[0, 1, 2, 7], [1, 2, 7, 9], [1, 3, 7, 9]],
    &[[0, 2, 4, 7], [1, 2, 4, 9], [1, 3, 4, 9], [2, 4, 7, 9], [3, 4, 7, 9]],
    &[[0, 1, 5, 7], [1, 2, 5, 9], [1, 3, 7, 9], [1, 5, 7, 9]],
    &[[0, 4, 5, 7], [1, 2, 4, 9], [1, 3, 4, 9], [2, 4, 5, 9], [3, 4, 7, 9], [4, 5, 7, 9]],
    &[[0, 1, 6, 7], [0, 2, 6, 7], [1, 3, 6, 7], [2, 6, 7, 9], [3, 6, 7, 9]],
    &[[0, 2, 4, 7], [1, 3, 4, 6], [2, 4, 6, 9], [2, 4, 7, 9], [3, 4, 6, 9], [3, 4, 7, 9]],
    &[[0, 1, 5, 7], [1, 3, 6, 7], [1, 5, 6, 7], [2, 5, 6, 9], [3, 6, 7, 9], [5, 6, 7, 9]],
    &[
        [0, 4, 5, 7], [1, 3, 4, 6], [2, 5, 6, 9], [3, 4, 6, 9], [3, 4, 7, 9], [4, 5, 6, 9],
        [4, 5, 7, 9],
    ],
    &[[0, 1, 2, 8], [0, 2, 8, 9], [0, 3, 8, 9]],
    &[[0, 2, 4, 9], [0, 3, 4, 9], [1, 2, 4, 8], [2, 4, 8, 9], [3, 4, 8, 9]],
    &[[0, 1, 5, 8], [0, 3, 5, 8], [1, 2, 5, 8], [2, 5, 8, 9], [3, 5, 8, 9]],
    &[[0, 3, 4, 5], [1, 2, 4, 8], [2, 4, 5, 9], [2, 4, 8, 9], [3, 4, 5, 9], [3, 4, 8, 9]],
    &[[0, 1, 6, 8], [0, 2, 6, 9], [0, 3, 8, 9], [0, 6, 8, 9]],
    &[[0, 2, 4, 9], [0, 3, 4, 9], [1, 4, 6, 8], [2, 4, 6, 9], [3, 4, 8, 9], [4, 6, 8, 9]],
    &[[0, 1, 5, 8], [0, 3, 5, 8], [1, 5, 6, 8], [2, 5, 6, 9], [3, 5, 8, 9], [5, 6, 8, 9]],
    &[
        [0, 3, 4, 5], [1, 4, 6, 8], [2, 5, 6, 9], [3, 4, 5, 9], [3, 4, 8, 9], [4, 5, 6, 9],
        [4, 6, 8, 9],
    ],
    &[[0, 1, 2, 7], [1, 2, 7, 8], [2, 7, 8, 9], [3, 7, 8, 9]],
    &[[0, 2, 4, 7], [1, 2, 4, 8], [2, 4, 7, 9], [2, 4, 8, 9], [3, 7, 8, 9], [4, 7, 8, 9]],
    &[[0, 1, 5, 7], [1, 2, 5, 8], [1, 5, 7, 8], [2, 5, 8, 9], [3, 7, 8, 9], [5, 7, 8, 9]],
    &[
        [0, 4, 5, 7], [1, 2, 4, 8], [2, 4, 5, 9], [2, 4, 8, 9], [3, 7, 8, 9], [4, 5, 7, 9],
        [4, 7, 8, 9],
    ],
    &[[0, 1, 6, 7], [0, 2, 6, 7], [1, 6, 7, 8], [2, 6, 7, 9], [3, 7, 8, 9], [6, 7, 8, 9]],
    &[
        [0, 2, 4, 7], [1, 4, 6, 8], [2, 4, 6, 9], [2, 4, 7, 9], [3, 7, 8, 9], [4, 6, 8, 9],
        [4, 7, 8, 9],
    ],
    &[
        [0, 1, 5, 7], [1, 5, 6, 8], [1, 5, 7, 8], [2, 5, 6, 9], [3, 7, 8, 9], [5, 6, 8, 9],
        [5, 7, 8, 9],
    ],
    &[
        [0, 4, 5, 7], [1, 4, 6, 8], [2, 5, 6, 9], [3, 7, 8, 9], [4, 5, 6, 9], [4, 5, 7, 9],
        [4, 6, 8, 9], [4, 7, 8, 9],
    ],
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::metrics::tetra_volume;
    use crate::topology::reference::{EDGE_OF_FACE, MAX_CHILDREN, NUM_FACES, reference_coord};
    use std::collections::HashMap;

    fn child_volume(c: &LocalChild) -> f64 {
        tetra_volume(&c.map(reference_coord))
    }

    #[test]
    fn regular_rule_shape() {
        let reg = ref_rule(REG_REF_MARK);
        assert_eq!(reg.child_count(), MAX_CHILDREN);
        assert_eq!(reg.edges.len(), 25);
        assert_eq!(reg.faces.len(), 24);
        assert_eq!(ref_rule(GREEN_REG_REF_MARK), reg);
        assert_eq!(ref_rule(NO_REF_MARK).children, &[[0, 1, 2, 3]]);
    }

    #[test]
    fn children_fill_the_parent() {
        for rule in 0..NUM_RULES as u8 {
            let r = ref_rule(rule);
            let mut total = 0.0;
            for c in r.children {
                let v = child_volume(c);
                assert!(v > 1e-6, "rule {rule}: degenerate child {c:?}");
                total += v;
            }
            assert!((total - 1.0 / 6.0).abs() < 1e-12, "rule {rule}: volume {total}");
        }
    }

    #[test]
    fn marked_edges_are_split() {
        for rule in 0..NUM_RULES as u8 {
            let r = ref_rule(rule);
            for e in 0..NUM_EDGES {
                let [a, b] = VERT_OF_EDGE[e];
                let mid = (NUM_VERTS + e) as u8;
                if splits_edge(rule, e) {
                    assert!(!r.edges.contains(&[a, b]), "rule {rule} keeps edge {e}");
                    assert!(r.edges.contains(&[a, mid]) && r.edges.contains(&[b, mid]));
                    assert_eq!(sub_edge([b, mid]), Some((e, 1)));
                } else {
                    assert!(r.edges.contains(&[a, b]), "rule {rule} lacks edge {e}");
                    assert_eq!(parent_edge([a, b]), Some(e));
                }
            }
        }
    }

    #[test]
    fn faces_are_shared_by_at_most_two_children() {
        for rule in 0..NUM_RULES as u8 {
            let r = ref_rule(rule);
            let mut uses: HashMap<LocalFace, usize> = HashMap::new();
            for c in r.children {
                for [a, b, d] in VERT_OF_FACE {
                    let f = [c[a as usize], c[b as usize], c[d as usize]];
                    *uses.entry(f).or_default() += 1;
                }
            }
            for (f, n) in uses {
                let on_parent = parent_face_of_face(f).is_some();
                assert_eq!(n, if on_parent { 1 } else { 2 }, "rule {rule} face {f:?}");
            }
        }
    }

    #[test]
    fn parent_face_split_depends_only_on_its_edges() {
        for f in 0..NUM_FACES {
            let mut seen: HashMap<u8, Vec<LocalFace>> = HashMap::new();
            for rule in 0..NUM_RULES as u8 {
                let sub_pattern = EDGE_OF_FACE[f]
                    .iter()
                    .enumerate()
                    .fold(0u8, |m, (i, &e)| m | (u8::from(splits_edge(rule, e as usize)) << i));
                let on_face: Vec<LocalFace> = ref_rule(rule)
                    .faces
                    .iter()
                    .copied()
                    .filter(|&face| parent_face_of_face(face) == Some(f))
                    .collect();
                let expected = seen.entry(sub_pattern).or_insert_with(|| on_face.clone());
                assert_eq!(*expected, on_face, "face {f} rule {rule}");
            }
        }
    }

    #[test]
    fn inner_edge_classification() {
        // regular rule: one diagonal, twelve edges on parent faces
        let reg = ref_rule(REG_REF_MARK);
        let inner: Vec<_> = reg
            .edges
            .iter()
            .filter(|e| parent_edge(**e).is_none() && sub_edge(**e).is_none())
            .collect();
        assert_eq!(inner.len(), 13);
        assert_eq!(
            inner.iter().filter(|e| parent_face_of_edge(***e).is_none()).count(),
            1
        );
        assert_eq!(parent_face([0, 1, 2]), Some(3));
        assert_eq!(parent_face([0, 1, 4]), None);
    }
}
