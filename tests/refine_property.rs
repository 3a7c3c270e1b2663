mod util;
use util::*;

use proptest::prelude::*;
use tetra_multigrid::prelude::*;

/// One refinement cycle: refine (`true`) or remove the picked leaves.
fn apply_cycle(mg: &mut MultiGrid, refine: bool, picks: &[usize]) {
    let leaves = leaves(mg);
    for &i in picks {
        let t = leaves[i % leaves.len()];
        if refine {
            mg.mark_for_refinement(t).unwrap();
        } else {
            mg.mark_for_removal(t).unwrap();
        }
    }
    mg.refine().unwrap();
}

fn cycles() -> impl Strategy<Value = Vec<(bool, Vec<usize>)>> {
    prop::collection::vec(
        (prop::bool::weighted(0.7), prop::collection::vec(0usize..1000, 1..4)),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_random_cycles_keep_the_hierarchy_sane(steps in cycles()) {
        let mut mg = MultiGrid::new(&BrickBuilder::unit_cube()).unwrap();
        for (refine, picks) in &steps {
            apply_cycle(&mut mg, *refine, picks);
            let violations = mg.sanity_violations(SanityOptions::all());
            prop_assert!(violations.is_empty(), "{}", violations.join("\n"));
            prop_assert!((triang_volume(&mg, mg.last_level()) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn prop_removing_everything_restores_level_zero(steps in cycles()) {
        let mut mg = MultiGrid::new(&BrickBuilder::unit_cube()).unwrap();
        let initial = counts(&mg, 0);
        for (refine, picks) in &steps {
            apply_cycle(&mut mg, *refine, picks);
        }
        let mut budget = mg.num_levels();
        while mg.num_levels() > 1 {
            prop_assert!(budget > 0, "coarsening stalled at {} levels", mg.num_levels());
            mg.unmark_all().unwrap();
            mg.refine().unwrap();
            budget -= 1;
        }
        prop_assert_eq!(counts(&mg, 0), initial);
        prop_assert!(mg.all_tetras(0).all(|(_, t)| t.is_unrefined()));
        prop_assert!(mg.all_edges(0).all(|(_, e)| e.mark_count() == 0));
        prop_assert!(mg.is_sane(SanityOptions::all()));
    }
}
