use proptest::prelude::*;
use qplan_model::plan_algebra::{
    hint_id, num_lossless_plans, num_plans, num_sampling_plans, ratio_id, reduce_join_method,
    sel_ids_of_plan, sel_ids_of_sampling_plan,
};

proptest! {
    #[test]
    fn num_plans_matches_closed_form(d in 1u32..6, j in 1u64..5, num_ratios in 1usize..5) {
        let full = num_plans(d, j, num_ratios, false);
        let sampling = num_plans(d, j, num_ratios, true);
        prop_assert_eq!(full, num_lossless_plans(d, j) + num_sampling_plans(d, num_ratios));
        prop_assert_eq!(sampling, num_sampling_plans(d, num_ratios));
        prop_assert_eq!(num_lossless_plans(d, j), ((1u64 << d) - 1) * j);
        prop_assert_eq!(num_sampling_plans(d, num_ratios), d as u64 * num_ratios as u64);
    }

    #[test]
    fn reduce_join_method_remainder_is_within_one_modulus(p in 0u64..500, d in 1u32..6) {
        let modulus = (1u64 << d) - 1;
        let (remainder, join_method) = reduce_join_method(p, d);
        prop_assert!(remainder <= modulus);
        prop_assert!(join_method >= 1);
        prop_assert_eq!(remainder + modulus * (join_method - 1), p);
    }

    #[test]
    fn sel_ids_of_plan_is_superset_of_set_bits_and_contains_plan(d in 2u32..5, j in 1u64..3, p in 1u64..16) {
        let modulus = (1u64 << d) - 1;
        prop_assume!(p <= modulus);
        let ids: Vec<u64> = sel_ids_of_plan(p, d, j).unwrap().into_iter().map(|s| s.0).collect();
        prop_assert!(ids.contains(&p));
        for bit in 0..d {
            let mask = 1u64 << bit;
            if p & mask != 0 {
                prop_assert!(ids.contains(&mask));
            }
        }
    }

    #[test]
    fn hint_and_ratio_id_recombine_to_k(num_ratios in 1usize..6, k in 0u64..100) {
        let h = hint_id(k, num_ratios);
        let r = ratio_id(k, num_ratios);
        prop_assert_eq!(h * num_ratios as u64 + r, k);
        prop_assert!(r < num_ratios as u64);
    }

    #[test]
    fn sel_ids_of_sampling_plan_stays_within_dimension_bits(d in 1u32..6, num_ratios in 1usize..5, k in 0u64..40) {
        let total = num_sampling_plans(d, num_ratios);
        let result = sel_ids_of_sampling_plan(k, d, num_ratios);
        if k >= total {
            prop_assert!(result.is_err());
        } else {
            let id = result.unwrap().0;
            prop_assert!(id.is_power_of_two());
            prop_assert!(id <= 1u64 << (d - 1));
        }
    }

    #[test]
    fn invalid_plan_beyond_lossless_count_is_rejected(d in 2u32..5, j in 1u64..3, extra in 1u64..20) {
        let max = num_lossless_plans(d, j);
        prop_assert!(sel_ids_of_plan(max + extra, d, j).is_err());
    }
}
