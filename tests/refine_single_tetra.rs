mod util;
use util::*;

use tetra_multigrid::geometry::metrics::distance;
use tetra_multigrid::prelude::*;

fn unit_tetra() -> MultiGrid {
    MultiGrid::new(&TetraBuilder::unit()).unwrap()
}

#[test]
fn refine_without_marks_changes_nothing() {
    let mut mg = unit_tetra();
    mg.refine().unwrap();
    assert_eq!(mg.num_levels(), 1);
    assert_eq!(counts(&mg, 0), (4, 6, 4, 1));
    assert_sane(&mg);
}

#[test]
fn regular_refinement_creates_eight_children() {
    let mut mg = unit_tetra();
    let (t, _) = mg.triang_tetras(0).next().unwrap();
    mg.mark_for_refinement(t).unwrap();
    mg.refine().unwrap();

    assert_eq!(mg.num_levels(), 2);
    let tet = mg.tetra(t).unwrap();
    assert!(tet.is_regularly_refined());
    assert_eq!(tet.ref_mark(), REG_REF_MARK);
    assert_eq!(tet.children().len(), 8);
    for &c in tet.children() {
        let child = mg.tetra(c).unwrap();
        assert_eq!(child.level(), 1);
        assert_eq!(child.parent(), Some(t));
        assert!(child.is_unrefined());
        assert!(!is_green_child(&mg, c));
    }
    // 6 midpoints, 12 halves + 13 inner edges, 16 boundary + 8 inner faces
    assert_eq!(counts(&mg, 1), (6, 25, 24, 8));
    assert!((triang_volume(&mg, 1) - 1.0 / 6.0).abs() < 1e-14);
    assert_sane(&mg);
}

#[test]
fn midpoints_sit_on_their_edges() {
    let mut mg = unit_tetra();
    mg.mark_all().unwrap();
    mg.refine().unwrap();
    for (_, e) in mg.all_edges(0) {
        let mid = e.mid_vertex().expect("every coarse edge is split");
        let [a, b] = e.vertices().map(|v| mg.vertex(v).unwrap().coord());
        let m = mg.vertex(mid).unwrap();
        assert_eq!(m.level(), 1);
        let expected = [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1]), 0.5 * (a[2] + b[2])];
        assert!(distance(m.coord(), expected) < 1e-15);
        assert_eq!(m.bnd_points().len(), 2, "an outer edge lies on two faces");
    }
}

#[test]
fn edge_counters_follow_committed_marks() {
    let mut mg = unit_tetra();
    mg.mark_all().unwrap();
    mg.refine().unwrap();
    assert!(mg.all_edges(0).all(|(_, e)| e.mark_count() == 1));
    assert!(mg.all_edges(1).filter(|(h, _)| h.level == 1).all(|(_, e)| e.mark_count() == 0));
}

#[test]
fn two_uniform_cycles_give_sixty_four_leaves() {
    let mut mg = unit_tetra();
    for _ in 0..2 {
        mg.mark_all().unwrap();
        mg.refine().unwrap();
    }
    assert_eq!(mg.num_levels(), 3);
    assert_eq!(mg.triang_tetras(2).count(), 64);
    assert_eq!(mg.all_tetras(2).count(), 1 + 8 + 64);
    // vertices of the twice-refined tetra: the 5-point-per-edge lattice
    assert_eq!(mg.triang_vertices(2).count(), 35);
    assert!((triang_volume(&mg, 2) - 1.0 / 6.0).abs() < 1e-14);
    assert_sane(&mg);
}

#[test]
fn coarsening_returns_to_the_initial_mesh() {
    let mut mg = unit_tetra();
    for _ in 0..2 {
        mg.mark_all().unwrap();
        mg.refine().unwrap();
    }

    mg.unmark_all().unwrap();
    mg.refine().unwrap();
    assert_eq!(mg.num_levels(), 2);
    assert_eq!(counts(&mg, 1), (6, 25, 24, 8));
    assert!(mg.triang_tetras(1).all(|(_, t)| t.is_unrefined()));
    assert_sane(&mg);

    mg.unmark_all().unwrap();
    mg.refine().unwrap();
    assert_eq!(mg.num_levels(), 1);
    assert_eq!(counts(&mg, 0), (4, 6, 4, 1));
    let (t, tet) = mg.all_tetras(0).next().unwrap();
    assert!(tet.is_unrefined());
    assert!(mg.all_edges(0).all(|(_, e)| e.mark_count() == 0 && e.mid_vertex().is_none()));
    assert!(mg.tetra(t).unwrap().children().is_empty());
    assert_sane(&mg);
}

#[test]
fn removing_a_single_child_keeps_the_family() {
    let mut mg = unit_tetra();
    mg.mark_all().unwrap();
    mg.refine().unwrap();

    let child = leaves(&mg)[0];
    mg.mark_for_removal(child).unwrap();
    mg.refine().unwrap();
    assert_eq!(mg.num_levels(), 2);
    assert_eq!(mg.triang_tetras(1).count(), 8);
    assert!(mg.triang_tetras(1).all(|(_, t)| t.ref_mark() == NO_REF_MARK));
    assert_sane(&mg);
}

#[test]
fn marking_a_refined_tetra_is_rejected() {
    let mut mg = unit_tetra();
    mg.mark_all().unwrap();
    mg.refine().unwrap();
    let (root, _) = mg.all_tetras(0).next().unwrap();
    assert!(matches!(
        mg.mark_for_refinement(root),
        Err(MeshError::MarkOnRefinedTetra(_))
    ));
    assert!(matches!(
        mg.mark_for_removal(root),
        Err(MeshError::MarkOnRefinedTetra(_))
    ));
}

#[test]
fn checked_refinement_validates_each_cycle() {
    let options = MultiGridOptions {
        check_invariants: true,
        ..MultiGridOptions::default()
    };
    let mut mg = MultiGrid::with_options(&TetraBuilder::unit(), options).unwrap();
    mg.mark_all().unwrap();
    mg.refine().unwrap();
    mg.unmark_all().unwrap();
    mg.refine().unwrap();
    assert_eq!(mg.num_levels(), 1);
}
