//! Level-0 mesh builders.
//!
//! A [`MeshBuilder`] populates level 0 of a fresh hierarchy through a
//! [`LevelZero`] context. The builder only supplies boundary segments,
//! vertices (with their boundary parameters) and tetrahedra; edges and faces,
//! their boundary ids and the face neighbor slots are derived here.

use itertools::Itertools;

use crate::boundary::{AffineSquare, AffineTriangle, BndIdx, BndPoint, BoundarySegment};
use crate::geometry::metrics;
use crate::geometry::Point3;
use crate::mesh_error::MeshError;
use crate::topology::multigrid::MultiGrid;
use crate::topology::reference::{NUM_FACES, NUM_VERTS, VERT_OF_EDGE, VERT_OF_FACE};
use crate::topology::simplex::{EdgeHandle, FaceHandle, TetraHandle, VertexHandle};

/// Produces the coarse mesh of a hierarchy.
pub trait MeshBuilder {
    fn build(&self, mesh: &mut LevelZero<'_>) -> Result<(), MeshError>;
}

fn invalid_input(message: impl Into<String>) -> MeshError {
    MeshError::InvalidBuilderInput(message.into())
}

/// Construction context for level 0.
pub struct LevelZero<'a> {
    mg: &'a mut MultiGrid,
}

impl<'a> LevelZero<'a> {
    pub(crate) fn new(mg: &'a mut MultiGrid) -> Self {
        Self { mg }
    }

    /// Register a boundary segment.
    pub fn add_segment(&mut self, segment: Box<dyn BoundarySegment>) -> Result<BndIdx, MeshError> {
        self.mg.boundary.add_segment(segment)
    }

    /// Add a vertex with its parameters on every boundary segment it lies on.
    pub fn add_vertex(&mut self, coord: Point3, bnd: &[BndPoint]) -> Result<VertexHandle, MeshError> {
        if coord.iter().any(|c| !c.is_finite()) {
            return Err(invalid_input(format!("non-finite vertex coordinate {coord:?}")));
        }
        for p in bnd {
            self.mg.boundary.segment(p.segment)?;
        }
        let v = self.mg.insert_vertex(0, coord)?;
        let vertex = self.mg.vertex_mut(v)?;
        for p in bnd {
            vertex.add_bnd(*p);
        }
        Ok(v)
    }

    /// Segments shared by all given vertices.
    fn common_segments(&self, vertices: &[VertexHandle]) -> Result<Vec<BndIdx>, MeshError> {
        let mut common: Option<Vec<BndIdx>> = None;
        for &v in vertices {
            let segs: Vec<_> = self.mg.vertex(v)?.bnd.iter().map(|p| p.segment).collect();
            common = Some(match common {
                None => segs,
                Some(c) => c.into_iter().filter(|s| segs.contains(s)).collect(),
            });
        }
        Ok(common.unwrap_or_default())
    }

    fn edge(&mut self, vertices: [VertexHandle; 2]) -> Result<EdgeHandle, MeshError> {
        if let Some(e) = self.mg.bins.find_edge(vertices) {
            return Ok(e);
        }
        let segs = self.common_segments(&vertices)?;
        if segs.len() > 2 {
            let [v0, v1] = self.mg.vertex_ids(vertices)?;
            return Err(MeshError::EdgeOnTooManyBoundarySegments {
                v0,
                v1,
                count: segs.len(),
            });
        }
        self.mg
            .insert_edge(0, vertices, [segs.first().copied(), segs.get(1).copied()])
    }

    fn face(&mut self, vertices: [VertexHandle; 3]) -> Result<FaceHandle, MeshError> {
        if let Some(f) = self.mg.bins.find_face(vertices) {
            return Ok(f);
        }
        let segs = self.common_segments(&vertices)?;
        if segs.len() > 1 {
            return Err(MeshError::FaceOnTooManyBoundarySegments {
                vertices: self.mg.vertex_ids(vertices)?,
            });
        }
        self.mg.insert_face(0, vertices, segs.first().copied())
    }

    /// Add a tetrahedron; the corners may be given in any order.
    pub fn add_tetra(&mut self, vertices: [VertexHandle; NUM_VERTS]) -> Result<TetraHandle, MeshError> {
        if vertices.iter().tuple_combinations().any(|(a, b)| a == b) {
            return Err(invalid_input("tetrahedron with a repeated vertex"));
        }
        let vertices = self.mg.sorted_by_id(vertices)?;
        let mut coords = [[0.0; 3]; NUM_VERTS];
        for (c, v) in coords.iter_mut().zip(vertices) {
            *c = self.mg.vertex(v)?.coord;
        }
        if metrics::tetra_volume(&coords) <= metrics::EPS * metrics::EPS {
            return Err(invalid_input(format!("degenerate tetrahedron {coords:?}")));
        }

        let mut edges = Vec::with_capacity(VERT_OF_EDGE.len());
        for [a, b] in VERT_OF_EDGE {
            edges.push(self.edge([vertices[usize::from(a)], vertices[usize::from(b)]])?);
        }
        let mut faces = Vec::with_capacity(NUM_FACES);
        for [a, b, c] in VERT_OF_FACE {
            faces.push(self.face([a, b, c].map(|i| vertices[usize::from(i)]))?);
        }
        let edges = edges
            .try_into()
            .map_err(|_| invalid_input("tetrahedron edge count"))?;
        let faces = faces
            .try_into()
            .map_err(|_| invalid_input("tetrahedron face count"))?;

        let t = self.mg.insert_tetra(0, vertices, edges, faces, None)?;
        self.mg.link_to_faces(t)?;
        Ok(t)
    }

    /// Check that boundary ids match the neighbor counts and drop the bins.
    pub(crate) fn finish(self) -> Result<(), MeshError> {
        let level = self.mg.level_ref(0)?;
        if level.tetras.is_empty() {
            return Err(invalid_input("level 0 has no tetrahedra"));
        }
        for f in level.faces.values() {
            if f.neighbors[1].is_some() == f.is_on_boundary() {
                let ids = self.mg.vertex_ids(f.vertices)?;
                return Err(invalid_input(format!(
                    "face {ids:?} has {} neighbors but boundary id {:?}",
                    f.neighbors.iter().flatten().count(),
                    f.bnd
                )));
            }
        }
        self.mg.bins.destroy_all();
        Ok(())
    }
}

/// A single tetrahedron whose four faces are planar boundary segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TetraBuilder {
    pub corners: [Point3; NUM_VERTS],
}

impl TetraBuilder {
    pub fn new(corners: [Point3; NUM_VERTS]) -> Self {
        Self { corners }
    }

    /// The reference tetrahedron.
    pub fn unit() -> Self {
        Self::new([
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ])
    }
}

impl MeshBuilder for TetraBuilder {
    fn build(&self, mesh: &mut LevelZero<'_>) -> Result<(), MeshError> {
        const PARAMS: [[f64; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let c = self.corners;
        let mut bnd: [Vec<BndPoint>; NUM_VERTS] = Default::default();
        for [a, b, d] in VERT_OF_FACE {
            let (a, b, d) = (usize::from(a), usize::from(b), usize::from(d));
            let seg = mesh.add_segment(Box::new(AffineTriangle::from_corners(c[a], c[b], c[d])))?;
            for (corner, param) in [a, b, d].into_iter().zip(PARAMS) {
                bnd[corner].push(BndPoint::new(seg, param));
            }
        }
        let mut vertices = Vec::with_capacity(NUM_VERTS);
        for (coord, points) in c.into_iter().zip(&bnd) {
            vertices.push(mesh.add_vertex(coord, points)?);
        }
        mesh.add_tetra([vertices[0], vertices[1], vertices[2], vertices[3]])?;
        Ok(())
    }
}

/// Axis-aligned box of `n[0] x n[1] x n[2]` cubes, six Kuhn tetrahedra each.
///
/// Boundary segments are the six sides, in the order x-min, x-max, y-min,
/// y-max, z-min, z-max.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrickBuilder {
    pub min: Point3,
    pub max: Point3,
    pub n: [usize; 3],
}

impl BrickBuilder {
    pub fn new(min: Point3, max: Point3, n: [usize; 3]) -> Self {
        Self { min, max, n }
    }

    /// The unit cube as a single Kuhn cube.
    pub fn unit_cube() -> Self {
        Self::new([0.0; 3], [1.0; 3], [1, 1, 1])
    }
}

impl MeshBuilder for BrickBuilder {
    fn build(&self, mesh: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let [nx, ny, nz] = self.n;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(invalid_input("nx, ny, and nz must be positive"));
        }
        let ext = metrics::sub(self.max, self.min);
        if ext.iter().any(|e| !(*e > 0.0)) {
            return Err(invalid_input(format!("empty brick {:?}..{:?}", self.min, self.max)));
        }
        let axis = |d: usize| {
            let mut e = [0.0; 3];
            e[d] = ext[d];
            e
        };

        // (normal axis, the two in-plane axes)
        let sides = [(0, 1, 2), (1, 0, 2), (2, 0, 1)];
        let mut segs = Vec::with_capacity(6);
        for &(normal, s, t) in &sides {
            for upper in [false, true] {
                let mut origin = self.min;
                if upper {
                    origin[normal] = self.max[normal];
                }
                let seg = mesh.add_segment(Box::new(AffineSquare::new(origin, axis(s), axis(t))))?;
                segs.push((seg, normal, upper, s, t));
            }
        }

        let idx = |i: usize, j: usize, k: usize| k * (nx + 1) * (ny + 1) + j * (nx + 1) + i;
        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    let ijk = [i, j, k];
                    let frac = [0, 1, 2].map(|d| ijk[d] as f64 / self.n[d] as f64);
                    let coord = [0, 1, 2].map(|d| self.min[d] + ext[d] * frac[d]);
                    let bnd: Vec<_> = segs
                        .iter()
                        .filter(|(_, normal, upper, _, _)| {
                            ijk[*normal] == if *upper { self.n[*normal] } else { 0 }
                        })
                        .map(|&(seg, _, _, s, t)| BndPoint::new(seg, [frac[s], frac[t]]))
                        .collect();
                    vertices.push(mesh.add_vertex(coord, &bnd)?);
                }
            }
        }

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    for path in (0..3).permutations(3) {
                        let mut at = [i, j, k];
                        let mut tet = [vertices[idx(i, j, k)]; NUM_VERTS];
                        for (step, &d) in path.iter().enumerate() {
                            at[d] += 1;
                            tet[step + 1] = vertices[idx(at[0], at[1], at[2])];
                        }
                        mesh.add_tetra(tet)?;
                    }
                }
            }
        }
        log::debug!("brick builder: {} vertices, {} tetras", vertices.len(), 6 * nx * ny * nz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tetra_has_four_boundary_faces() {
        let mg = MultiGrid::new(&TetraBuilder::unit()).unwrap();
        let size = mg.size_info();
        assert_eq!(size.len(), 1);
        assert_eq!((size[0].vertices, size[0].edges, size[0].faces, size[0].tetras), (4, 6, 4, 1));
        assert_eq!(mg.boundary().len(), 4);
        assert!(mg.all_faces(0).all(|(_, f)| f.is_on_boundary()));
        assert!(mg.all_edges(0).all(|(_, e)| e.bnd_indices().count() == 2));
        assert!(mg.all_vertices(0).all(|(_, v)| v.bnd_points().len() == 3));
    }

    #[test]
    fn kuhn_cube_counts() {
        let mg = MultiGrid::new(&BrickBuilder::unit_cube()).unwrap();
        let s = mg.size_info()[0];
        // 12 cube edges, 6 face diagonals, 1 main diagonal
        assert_eq!((s.vertices, s.edges, s.faces, s.tetras), (8, 19, 18, 6));
        assert_eq!(mg.all_faces(0).filter(|(_, f)| f.is_on_boundary()).count(), 12);
        assert_eq!(mg.all_edges(0).filter(|(_, e)| !e.is_on_boundary()).count(), 1);
    }

    #[test]
    fn stacked_cubes_share_their_faces() {
        let mg = MultiGrid::new(&BrickBuilder::new([0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1])).unwrap();
        let s = mg.size_info()[0];
        assert_eq!(s.tetras, 12);
        assert_eq!(s.vertices, 12);
        assert_eq!(mg.all_faces(0).filter(|(_, f)| f.is_on_boundary()).count(), 20);
    }

    struct Custom(fn(&mut LevelZero<'_>) -> Result<(), MeshError>);

    impl MeshBuilder for Custom {
        fn build(&self, mesh: &mut LevelZero<'_>) -> Result<(), MeshError> {
            (self.0)(mesh)
        }
    }

    fn repeated_vertex(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let a = m.add_vertex([0.0; 3], &[])?;
        let b = m.add_vertex([1.0, 0.0, 0.0], &[])?;
        let c = m.add_vertex([0.0, 1.0, 0.0], &[])?;
        m.add_tetra([a, b, c, a]).map(|_| ())
    }

    fn no_boundary(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let mut v = Vec::new();
        for c in TetraBuilder::unit().corners {
            v.push(m.add_vertex(c, &[])?);
        }
        m.add_tetra([v[3], v[1], v[2], v[0]]).map(|_| ())
    }

    fn unknown_segment(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        m.add_vertex([0.0; 3], &[BndPoint::new(7, [0.0, 0.0])]).map(|_| ())
    }

    fn crowded_edge(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let c = TetraBuilder::unit().corners;
        let mut shared = Vec::new();
        for _ in 0..3 {
            let s = m.add_segment(Box::new(AffineTriangle::from_corners(c[0], c[1], c[2])))?;
            shared.push(BndPoint::new(s, [0.0, 0.0]));
        }
        let a = m.add_vertex(c[0], &shared)?;
        let b = m.add_vertex(c[1], &shared)?;
        let d = m.add_vertex(c[2], &[])?;
        let e = m.add_vertex(c[3], &[])?;
        m.add_tetra([a, b, d, e]).map(|_| ())
    }

    fn crowded_face(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let c = TetraBuilder::unit().corners;
        let s0 = m.add_segment(Box::new(AffineTriangle::from_corners(c[0], c[1], c[2])))?;
        let s1 = m.add_segment(Box::new(AffineTriangle::from_corners(c[0], c[1], c[2])))?;
        let on_both = |p: [f64; 2]| [BndPoint::new(s0, p), BndPoint::new(s1, p)];
        let a = m.add_vertex(c[0], &on_both([0.0, 0.0]))?;
        let b = m.add_vertex(c[1], &on_both([1.0, 0.0]))?;
        let d = m.add_vertex(c[2], &on_both([0.0, 1.0]))?;
        let e = m.add_vertex(c[3], &[])?;
        m.add_tetra([a, b, d, e]).map(|_| ())
    }

    fn three_tetras_on_one_face(m: &mut LevelZero<'_>) -> Result<(), MeshError> {
        let mut v = Vec::new();
        for c in TetraBuilder::unit().corners {
            v.push(m.add_vertex(c, &[])?);
        }
        let below = m.add_vertex([0.0, 0.0, -1.0], &[])?;
        let beside = m.add_vertex([1.0, 1.0, 1.0], &[])?;
        m.add_tetra([v[0], v[1], v[2], v[3]])?;
        m.add_tetra([v[0], v[1], v[2], below])?;
        m.add_tetra([v[0], v[1], v[2], beside]).map(|_| ())
    }

    #[test]
    fn builder_input_errors() {
        assert!(matches!(
            MultiGrid::new(&Custom(repeated_vertex)),
            Err(MeshError::InvalidBuilderInput(_))
        ));
        assert!(matches!(
            MultiGrid::new(&Custom(no_boundary)),
            Err(MeshError::InvalidBuilderInput(_))
        ));
        assert_eq!(
            MultiGrid::new(&Custom(unknown_segment)).unwrap_err(),
            MeshError::UnknownBoundarySegment(7)
        );
    }

    #[test]
    fn edge_on_three_segments_is_rejected() {
        assert!(matches!(
            MultiGrid::new(&Custom(crowded_edge)),
            Err(MeshError::EdgeOnTooManyBoundarySegments { count: 3, .. })
        ));
    }

    #[test]
    fn face_on_two_segments_is_rejected() {
        assert_eq!(
            MultiGrid::new(&Custom(crowded_face)).unwrap_err(),
            MeshError::FaceOnTooManyBoundarySegments { vertices: [0, 1, 2] }
        );
    }

    #[test]
    fn third_tetra_on_a_face_is_rejected() {
        assert_eq!(
            MultiGrid::new(&Custom(three_tetras_on_one_face)).unwrap_err(),
            MeshError::FaceSlotOccupied { slot: 1, linked: 1 }
        );
    }
}
