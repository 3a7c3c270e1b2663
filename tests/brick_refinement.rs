mod util;
use util::*;

use tetra_multigrid::prelude::*;

fn brick() -> MultiGrid {
    MultiGrid::new(&BrickBuilder::new([0.0; 3], [2.0; 3], [2, 2, 2])).unwrap()
}

/// Mark every leaf that has the origin as a corner.
fn mark_corner_leaves(mg: &mut MultiGrid) -> usize {
    let corner: Vec<_> = mg
        .triang_tetras(mg.last_level())
        .filter(|(_, t)| {
            t.vertices()
                .iter()
                .any(|v| mg.vertex(*v).unwrap().coord() == [0.0; 3])
        })
        .map(|(h, _)| h)
        .collect();
    for &t in &corner {
        mg.mark_for_refinement(t).unwrap();
    }
    corner.len()
}

#[test]
fn level_zero_layout() {
    let mg = brick();
    let (v, _, _, t) = counts(&mg, 0);
    assert_eq!((v, t), (27, 48));
    assert_eq!(mg.boundary().len(), 6);
    assert!((triang_volume(&mg, 0) - 8.0).abs() < 1e-12);
    assert_sane(&mg);
}

#[test]
fn uniform_refinement_halves_the_lattice() {
    let mut mg = brick();
    let (v0, e0, _, t0) = counts(&mg, 0);
    mg.mark_all().unwrap();
    mg.refine().unwrap();

    assert_eq!(mg.triang_tetras(1).count(), 8 * t0);
    assert_eq!(mg.triang_vertices(1).count(), v0 + e0);
    assert_eq!(mg.triang_vertices(1).count(), 125);
    assert!((triang_volume(&mg, 1) - 8.0).abs() < 1e-12);
    assert_sane(&mg);
}

#[test]
fn boundary_vertices_stay_on_their_sides() {
    let mut mg = brick();
    for _ in 0..2 {
        mg.mark_all().unwrap();
        mg.refine().unwrap();
    }
    let mut on_boundary = 0;
    for (_, v) in mg.all_vertices(2) {
        let c = v.coord();
        let touches_side = c.iter().any(|x| *x == 0.0 || *x == 2.0);
        assert_eq!(v.is_on_boundary(), touches_side, "vertex at {c:?}");
        for p in v.bnd_points() {
            let seg = mg.boundary().segment(p.segment).unwrap();
            let mapped = seg.map(p.coord2d);
            assert!(mapped.iter().zip(c).all(|(a, b)| (a - b).abs() < 1e-12));
        }
        on_boundary += usize::from(touches_side);
    }
    // 9^3 lattice minus the 7^3 interior
    assert_eq!(on_boundary, 729 - 343);
}

#[test]
fn local_refinement_towards_a_corner() {
    let mut mg = brick();
    for cycle in 1..=3 {
        assert!(mark_corner_leaves(&mut mg) > 0);
        mg.refine().unwrap();
        assert_eq!(mg.num_levels(), cycle + 1);
        assert!((triang_volume(&mg, cycle) - 8.0).abs() < 1e-12);
        assert_sane(&mg);
    }

    let loc = mg.locate([1e-3, 2e-3, 3e-3], mg.last_level()).unwrap().unwrap();
    assert_eq!(loc.tetra.level, mg.last_level());
    let far = mg.locate([1.9, 1.7, 1.3], mg.last_level()).unwrap().unwrap();
    assert!(far.tetra.level < mg.last_level());
    assert!(mg.tetra(far.tetra).unwrap().is_unrefined());
}

#[test]
fn coarsening_undoes_local_refinement() {
    let mut mg = brick();
    let initial = counts(&mg, 0);
    for _ in 0..3 {
        mark_corner_leaves(&mut mg);
        mg.refine().unwrap();
    }
    assert_eq!(mg.num_levels(), 4);

    let mut cycles = 0;
    while mg.num_levels() > 1 {
        let before = mg.num_levels();
        mg.unmark_all().unwrap();
        mg.refine().unwrap();
        assert_eq!(mg.num_levels(), before - 1);
        assert_sane(&mg);
        cycles += 1;
        assert!(cycles <= 3);
    }
    assert_eq!(counts(&mg, 0), initial);
    assert!(mg.all_tetras(0).all(|(_, t)| t.is_unrefined() && t.ref_mark() == NO_REF_MARK));
}

#[test]
fn located_points_lie_in_their_tetra() {
    let mut mg = brick();
    mark_corner_leaves(&mut mg);
    mg.refine().unwrap();
    for p in [[0.1, 0.2, 0.3], [1.5, 0.5, 0.25], [0.6, 1.9, 1.1]] {
        let loc = mg.locate(p, 1).unwrap().unwrap();
        assert!(mg.tetra(loc.tetra).unwrap().is_in_triang(1));
        assert!(loc.barycentric.iter().all(|b| *b > -1e-10));
        let [_, b1, b2, b3] = loc.barycentric;
        let back = mg.world_coord(loc.tetra, [b1, b2, b3]).unwrap();
        assert!(back.iter().zip(p).all(|(a, b)| (a - b).abs() < 1e-12));
    }
}

fn connectivity(mg: &MultiGrid) -> Vec<(u64, u8, Vec<u64>)> {
    let mut out: Vec<_> = mg
        .all_tetras(mg.last_level())
        .map(|(_, t)| {
            let children = t.children().iter().map(|c| mg.tetra(*c).unwrap().id()).collect();
            (t.id(), t.ref_rule(), children)
        })
        .collect();
    out.sort();
    out
}

#[test]
fn refining_twice_without_new_marks_is_idempotent() {
    let mut mg = brick();
    mark_corner_leaves(&mut mg);
    mg.refine().unwrap();
    let sizes = mg.size_info();
    let links = connectivity(&mg);

    mg.refine().unwrap();
    assert_eq!(mg.size_info(), sizes);
    assert_eq!(connectivity(&mg), links);
    assert_sane(&mg);
}
