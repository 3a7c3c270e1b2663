#![allow(dead_code)]
use tetra_multigrid::prelude::*;

/// Assert the hierarchy passes the selected sanity checks, listing every violation.
pub fn assert_sane_with(mg: &MultiGrid, options: SanityOptions) {
    let violations = mg.sanity_violations(options);
    assert!(
        violations.is_empty(),
        "{} violations:\n{}",
        violations.len(),
        violations.join("\n")
    );
}

pub fn assert_sane(mg: &MultiGrid) {
    assert_sane_with(mg, SanityOptions::all());
}

/// Tetras of the finest triangulation.
pub fn leaves(mg: &MultiGrid) -> Vec<TetraHandle> {
    mg.triang_tetras(mg.last_level()).map(|(h, _)| h).collect()
}

/// Summed volume of the level-`level` triangulation.
pub fn triang_volume(mg: &MultiGrid, level: usize) -> f64 {
    mg.triang_tetras(level)
        .map(|(h, _)| mg.volume(h).unwrap())
        .sum()
}

/// Whether the tetra is the child of an irregular (green) refinement.
pub fn is_green_child(mg: &MultiGrid, t: TetraHandle) -> bool {
    !mg.is_regular(t).unwrap()
}

/// Entity counts `(vertices, edges, faces, tetras)` of one level.
pub fn counts(mg: &MultiGrid, level: usize) -> (usize, usize, usize, usize) {
    let s = mg.size_info()[level];
    (s.vertices, s.edges, s.faces, s.tetras)
}
