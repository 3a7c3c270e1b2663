//! Point arithmetic and simplex metrics on plain `[f64; 3]` coordinates.
//!
//! The tetrahedron uses the reference ordering `[v0, v1, v2, v3]` with
//! barycentric coordinates `(1 - r - s - t, r, s, t)`. Face `i` is the face
//! opposite vertex `i`; its local parametric coordinates `(r, s)` run along the
//! two face edges leaving the lowest face vertex.

use crate::mesh_error::MeshError;

/// A point or vector in 3D.
pub type Point3 = [f64; 3];
/// A boundary parameter in 2D.
pub type Point2 = [f64; 2];

pub const EPS: f64 = 1e-12;

pub fn add(a: Point3, b: Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: Point3, s: f64) -> Point3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm_sq(a: Point3) -> f64 {
    dot(a, a)
}

pub fn norm(a: Point3) -> f64 {
    norm_sq(a).sqrt()
}

pub fn distance(a: Point3, b: Point3) -> f64 {
    norm(sub(a, b))
}

pub fn midpoint(a: Point3, b: Point3) -> Point3 {
    scale(add(a, b), 0.5)
}

/// Arithmetic mean of a non-empty point set.
pub fn centroid(points: &[Point3]) -> Point3 {
    let sum = points.iter().fold([0.0; 3], |acc, p| add(acc, *p));
    scale(sum, 1.0 / points.len().max(1) as f64)
}

/// Signed volume of the tetrahedron `(a, b, c, d)`; positive for a right-handed ordering.
pub fn signed_volume(a: Point3, b: Point3, c: Point3, d: Point3) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

/// Unsigned tetrahedron volume.
pub fn tetra_volume(v: &[Point3; 4]) -> f64 {
    signed_volume(v[0], v[1], v[2], v[3]).abs()
}

/// Area of the triangle `(a, b, c)`.
pub fn triangle_area(a: Point3, b: Point3, c: Point3) -> f64 {
    0.5 * norm(cross(sub(b, a), sub(c, a)))
}

/// Unit normal of triangle `(a, b, c)` together with the sign that turns it
/// into the outward normal of a tetrahedron whose fourth vertex is `opposite`.
///
/// Returns `(normal, dir, abs_det)` where `dir` is `1.0` if `normal` already
/// points away from `opposite` and `-1.0` otherwise. `abs_det` is the length of
/// the cross product (twice the triangle area).
pub fn oriented_normal(
    a: Point3,
    b: Point3,
    c: Point3,
    opposite: Point3,
) -> Result<(Point3, f64, f64), MeshError> {
    let n = cross(sub(b, a), sub(c, a));
    let abs_det = norm(n);
    if abs_det < EPS {
        return Err(MeshError::InvalidGeometry(format!(
            "zero-area triangle {a:?} {b:?} {c:?}"
        )));
    }
    let dir = if dot(sub(opposite, a), n) < 0.0 { 1.0 } else { -1.0 };
    Ok((scale(n, 1.0 / abs_det), dir, abs_det))
}

/// Barycentric coordinates of `p` with respect to tetrahedron `v`.
pub fn barycentric(p: Point3, v: &[Point3; 4]) -> Result<[f64; 4], MeshError> {
    let vol = signed_volume(v[0], v[1], v[2], v[3]);
    if vol.abs() < EPS * EPS {
        return Err(MeshError::InvalidGeometry(format!(
            "degenerate tetrahedron {v:?}"
        )));
    }
    Ok([
        signed_volume(p, v[1], v[2], v[3]) / vol,
        signed_volume(v[0], p, v[2], v[3]) / vol,
        signed_volume(v[0], v[1], p, v[3]) / vol,
        signed_volume(v[0], v[1], v[2], p) / vol,
    ])
}

/// Whether barycentric coordinates describe a point in the closed tetrahedron.
pub fn is_inside(bary: &[f64; 4], tolerance: f64) -> bool {
    bary.iter().all(|&b| b >= -tolerance && b <= 1.0 + tolerance)
}

/// Center and radius of the sphere through the four vertices.
///
/// Solves `2 (p_i - p_0) . c = |p_i|^2 - |p_0|^2`; `None` for coplanar input.
pub fn circumsphere(v: &[Point3; 4]) -> Option<(Point3, f64)> {
    let p0 = v[0];
    let p0_sq = norm_sq(p0);
    let mut rows = [[0.0; 3]; 3];
    let mut rhs = [0.0; 3];
    for i in 0..3 {
        rows[i] = sub(v[i + 1], p0);
        rhs[i] = 0.5 * (norm_sq(v[i + 1]) - p0_sq);
    }
    let center = solve3(rows, rhs)?;
    let radius = distance(center, p0);
    let tol = EPS.max(radius * 1e-9);
    if v[1..]
        .iter()
        .any(|p| (distance(center, *p) - radius).abs() > tol)
    {
        return None;
    }
    Some((center, radius))
}

/// Center and radius of the circle through `a`, `b`, `c`; `None` for collinear input.
pub fn circumcircle(a: Point3, b: Point3, c: Point3) -> Option<(Point3, f64)> {
    let p1 = sub(b, a);
    let p2 = sub(c, a);
    let p1_sq = norm_sq(p1);
    let p2_sq = norm_sq(p2);
    let p1p2 = dot(p1, p2);
    let det = p1_sq * p2_sq - p1p2 * p1p2;
    if det.abs() < EPS * p1_sq.max(p2_sq).max(1.0) * EPS {
        return None;
    }
    let m0 = 0.5 * p2_sq * (p1_sq - p1p2) / det;
    let m1 = 0.5 * p1_sq * (p2_sq - p1p2) / det;
    let center = add(a, add(scale(p1, m0), scale(p2, m1)));
    let radius = distance(center, a);
    let tol = EPS.max(radius * 1e-9);
    if (distance(center, b) - radius).abs() > tol || (distance(center, c) - radius).abs() > tol {
        return None;
    }
    Some((center, radius))
}

/// Cramer's rule for a 3x3 system given by rows.
fn solve3(rows: [Point3; 3], rhs: Point3) -> Option<Point3> {
    let det = dot(rows[0], cross(rows[1], rows[2]));
    let scale_ref = norm(rows[0]) * norm(rows[1]) * norm(rows[2]);
    if det.abs() <= EPS * scale_ref {
        return None;
    }
    // Column-replacement determinants via the transposed triple products.
    let cols = [
        [rows[0][0], rows[1][0], rows[2][0]],
        [rows[0][1], rows[1][1], rows[2][1]],
        [rows[0][2], rows[1][2], rows[2][2]],
    ];
    let x = dot(rhs, cross(cols[1], cols[2])) / det;
    let y = dot(cols[0], cross(rhs, cols[2])) / det;
    let z = dot(cols[0], cross(cols[1], rhs)) / det;
    Some([x, y, z])
}
