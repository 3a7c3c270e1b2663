//! Local numbering of the reference tetrahedron and its refinement points.
//!
//! Local vertices `0..4` are the corners; local vertex `4 + e` is the midpoint
//! of edge `e`. Edge `e` joins `VERT_OF_EDGE[e]`, face `f` is opposite corner
//! `f` and spans `VERT_OF_FACE[f]`. All tuples are ascending, so a tetrahedron
//! whose vertices are sorted by identifier sees every sub-simplex in the same
//! order as its neighbors do.

/// Corners of a tetrahedron.
pub const NUM_VERTS: usize = 4;
/// Edges of a tetrahedron.
pub const NUM_EDGES: usize = 6;
/// Faces of a tetrahedron.
pub const NUM_FACES: usize = 4;
/// Corners plus edge midpoints.
pub const NUM_LOCAL_POINTS: usize = NUM_VERTS + NUM_EDGES;
/// Largest child count of any refinement rule.
pub const MAX_CHILDREN: usize = 8;

pub const VERT_OF_EDGE: [[u8; 2]; NUM_EDGES] = [[0, 1], [0, 2], [1, 2], [0, 3], [1, 3], [2, 3]];

pub const VERT_OF_FACE: [[u8; 3]; NUM_FACES] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// Edges bounding face `f`, as edge indices.
pub const EDGE_OF_FACE: [[u8; 3]; NUM_FACES] = [[2, 4, 5], [1, 3, 5], [0, 3, 4], [0, 1, 2]];

/// Edge opposite edge `e` (sharing no corner).
pub const OPP_EDGE: [u8; NUM_EDGES] = [5, 4, 3, 2, 1, 0];

/// Edge index joining corners `a` and `b`.
pub fn edge_by_vert(a: u8, b: u8) -> Option<usize> {
    let key = if a < b { [a, b] } else { [b, a] };
    VERT_OF_EDGE.iter().position(|e| *e == key)
}

/// Face index spanned by three distinct corners.
pub fn face_by_vert(a: u8, b: u8, c: u8) -> Option<usize> {
    if a == b || b == c || a == c || a > 3 || b > 3 || c > 3 {
        return None;
    }
    Some(6 - usize::from(a) - usize::from(b) - usize::from(c))
}

/// Edge whose midpoint is local point `v`, if `v` is a midpoint.
pub fn edge_of_midpoint(v: u8) -> Option<usize> {
    (usize::from(v) >= NUM_VERTS && usize::from(v) < NUM_LOCAL_POINTS)
        .then(|| usize::from(v) - NUM_VERTS)
}

/// Bitmask of parent faces containing local point `v`.
pub fn faces_of_point(v: u8) -> u8 {
    let corners: &[u8] = match edge_of_midpoint(v) {
        Some(e) => &VERT_OF_EDGE[e],
        None => std::slice::from_ref(&v),
    };
    let mut mask = 0u8;
    for f in 0..NUM_FACES as u8 {
        if corners.iter().all(|&c| c != f) {
            mask |= 1 << f;
        }
    }
    mask
}

/// Parent face containing all given local points, if any.
pub fn common_parent_face(points: &[u8]) -> Option<usize> {
    let mask = points.iter().fold(0b1111u8, |m, &v| m & faces_of_point(v));
    (mask != 0).then(|| mask.trailing_zeros() as usize)
}

/// Reference coordinates of local point `v` on the unit tetrahedron.
pub fn reference_coord(v: u8) -> [f64; 3] {
    const CORNERS: [[f64; 3]; NUM_VERTS] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    match edge_of_midpoint(v) {
        Some(e) => {
            let [a, b] = VERT_OF_EDGE[e];
            let (a, b) = (CORNERS[usize::from(a)], CORNERS[usize::from(b)]);
            [
                0.5 * (a[0] + b[0]),
                0.5 * (a[1] + b[1]),
                0.5 * (a[2] + b[2]),
            ]
        }
        None => CORNERS[usize::from(v)],
    }
}

/// Barycentric coordinates of a point given by local coordinates on face `face`.
///
/// The face-local coordinates `(r, s)` weight the second and third face vertex.
pub fn face_to_tetra_coord(face: usize, c: [f64; 2]) -> Option<[f64; 3]> {
    match face {
        0 => Some([1.0 - c[0] - c[1], c[0], c[1]]),
        1 => Some([0.0, c[0], c[1]]),
        2 => Some([c[0], 0.0, c[1]]),
        3 => Some([c[0], c[1], 0.0]),
        _ => None,
    }
}
