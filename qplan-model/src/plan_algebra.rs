//! Plan algebra: enumerate lossless and sampling plans, map
//! plans/bitmasks/selectivity-id sets, and reduce join methods. Plans are
//! plain integers throughout — no stringy decimal/binary conversions.

use qplan_core::types::SelId;
use qplan_core::{Error, Result};

/// Number of lossless (hinted) plans for one join method times `J` join
/// methods: `(2^d - 1) * J`. Plan id `0` ("no hint") is not counted here —
/// it is the baseline time reference, not a member of the action space.
pub fn num_lossless_plans(d: u32, j: u64) -> u64 {
    ((1u64 << d) - 1) * j
}

/// Number of sampling plans: `d * |R|`.
pub fn num_sampling_plans(d: u32, num_ratios: usize) -> u64 {
    d as u64 * num_ratios as u64
}

/// `num_plans(d, J, |R|, sampling_only)`. When `sampling_only`, returns
/// `d*|R|`; otherwise the full lossless-plus-sampling action cardinality
/// `(2^d-1)*J + d*|R|`.
pub fn num_plans(d: u32, j: u64, num_ratios: usize, sampling_only: bool) -> u64 {
    if sampling_only {
        num_sampling_plans(d, num_ratios)
    } else {
        num_lossless_plans(d, j) + num_sampling_plans(d, num_ratios)
    }
}

/// `reduce_join_method(p, d)`: strip the join-method component by
/// repeatedly subtracting `2^d-1` until `p <= 2^d-1`. Returns
/// `(plan_within_one_join_method, join_method_index)` with the index
/// starting at 1.
pub fn reduce_join_method(p: u64, d: u32) -> (u64, u64) {
    let modulus = (1u64 << d) - 1;
    let mut remainder = p;
    let mut join_method = 1u64;
    while remainder > modulus {
        remainder -= modulus;
        join_method += 1;
    }
    (remainder, join_method)
}

fn validate_plan(p: u64, d: u32, j: u64) -> Result<()> {
    let max = num_lossless_plans(d, j);
    if p > max {
        return Err(Error::InvalidPlan { plan: p, max });
    }
    Ok(())
}

/// `sel_ids_of_plan(p, d, J)`: the ordered set of selectivity ids needed to
/// estimate plan `p`. Decomposes the join-method-reduced remainder to its
/// set bits and appends the remainder itself when it is not already a
/// single bit. `p = 0` ("no hint") yields the empty set.
pub fn sel_ids_of_plan(p: u64, d: u32, j: u64) -> Result<Vec<SelId>> {
    validate_plan(p, d, j)?;
    let (remainder, _join_method) = reduce_join_method(p, d);
    if remainder == 0 {
        return Ok(Vec::new());
    }
    let mut ids: Vec<u64> = Vec::new();
    for bit in 0..d {
        let mask = 1u64 << bit;
        if remainder & mask != 0 {
            ids.push(mask);
        }
    }
    if !remainder.is_power_of_two() {
        ids.push(remainder);
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids.into_iter().map(SelId).collect())
}

/// `hint_id(k, |R|) = k div |R|`.
pub fn hint_id(k: u64, num_ratios: usize) -> u64 {
    k / num_ratios as u64
}

/// `ratio_id(k, |R|) = k mod |R|`.
pub fn ratio_id(k: u64, num_ratios: usize) -> u64 {
    k % num_ratios as u64
}

/// `sel_ids_of_sampling_plan(k, d, |R|) -> { 2^(d-1-hint_id(k)) }`.
pub fn sel_ids_of_sampling_plan(k: u64, d: u32, num_ratios: usize) -> Result<SelId> {
    let total = num_sampling_plans(d, num_ratios);
    if k >= total {
        return Err(Error::InvalidPlan { plan: k, max: total.saturating_sub(1) });
    }
    let hid = hint_id(k, num_ratios);
    if hid >= d as u64 {
        return Err(Error::InvalidPlan { plan: k, max: total.saturating_sub(1) });
    }
    let id = 1u64 << (d as u64 - 1 - hid);
    Ok(SelId(id))
}

/// Index positions (0-based dimension indices) that a bitmap-scan hint for
/// plan `p` must list, derived from the join-method-reduced remainder.
/// Empty only for `p = 0` (no hint) — callers must not emit an empty
/// bitmap-scan hint in that case, per the adapter contract.
pub fn hint_indexes(p: u64, d: u32) -> Vec<u32> {
    let (remainder, _join_method) = reduce_join_method(p, d);
    (0..d).filter(|bit| remainder & (1u64 << bit) != 0).collect()
}
