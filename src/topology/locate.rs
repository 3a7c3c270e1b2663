//! Point location in a triangulation level.

use crate::geometry::Point3;
use crate::geometry::metrics::{barycentric, is_inside};
use crate::mesh_error::MeshError;
use crate::topology::multigrid::MultiGrid;
use crate::topology::simplex::TetraHandle;

/// Slack on barycentric coordinates when testing containment.
pub const LOCATE_TOLERANCE: f64 = 1e-10;

/// A tetra containing a point, with the point's barycentric coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub tetra: TetraHandle,
    pub barycentric: [f64; 4],
}

impl MultiGrid {
    /// Find the tetra of the level-`level` triangulation containing `p`.
    ///
    /// Starts from the level-0 tetra containing `p` and descends into the child
    /// whose smallest barycentric coordinate is largest. `None` if `p` lies
    /// outside the coarse mesh.
    pub fn locate(&self, p: Point3, level: usize) -> Result<Option<Location>, MeshError> {
        let level = level.min(self.last_level());
        let mut current = None;
        for (h, _) in self.all_tetras(0) {
            let bary = barycentric(p, &self.tetra_coords(h)?)?;
            if is_inside(&bary, LOCATE_TOLERANCE) {
                current = Some(Location { tetra: h, barycentric: bary });
                break;
            }
        }
        let Some(mut loc) = current else {
            return Ok(None);
        };

        while !self.tetra(loc.tetra)?.is_in_triang(level) {
            let mut best: Option<(f64, Location)> = None;
            for &c in self.tetra(loc.tetra)?.children() {
                let bary = barycentric(p, &self.tetra_coords(c)?)?;
                let score = bary.iter().copied().fold(f64::INFINITY, f64::min);
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, Location { tetra: c, barycentric: bary }));
                }
            }
            match best {
                Some((_, next)) => loc = next,
                None => break,
            }
        }
        Ok(Some(loc))
    }
}
