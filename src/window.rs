//! Positional window operations over columns of optional values.
//!
//! A `None` is an undefined value. Windows are taken over the order the
//! values are given in; nothing here sorts by date.

use std::collections::BTreeMap;

/// Row positions per key, keys in ascending order.
pub type Groups<K> = BTreeMap<K, Vec<usize>>;

/// Mean of each trailing `window` values, current value included.
///
/// The first `window - 1` positions, and any window containing an undefined
/// value, give `None`.
#[must_use]
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let sum = values[i + 1 - window..=i]
                .iter()
                .copied()
                .sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Moves every value `n` positions later; the first `n` become `None`.
#[must_use]
pub fn shift<T: Copy>(values: &[Option<T>], n: usize) -> Vec<Option<T>> {
    (0..values.len())
        .map(|i| if i >= n { values[i - n] } else { None })
        .collect()
}

/// Groups row positions by key. Rows whose key is `None` belong to no group.
pub fn group_rows<K: Ord>(keys: impl IntoIterator<Item = Option<K>>) -> Groups<K> {
    let mut groups: Groups<K> = BTreeMap::new();
    for (i, key) in keys.into_iter().enumerate() {
        if let Some(key) = key {
            groups.entry(key).or_default().push(i);
        }
    }
    groups
}

/// Sums `values` within each group and writes the total back to every
/// member row. Rows outside any group get `None`.
#[must_use]
pub fn group_sum<K>(groups: &Groups<K>, values: &[i64]) -> Vec<Option<i64>> {
    let mut out = vec![None; values.len()];
    for positions in groups.values() {
        let total: i64 = positions.iter().map(|&i| values[i]).sum();
        for &i in positions {
            out[i] = Some(total);
        }
    }
    out
}

/// [`shift`] applied separately within each group.
#[must_use]
pub fn grouped_shift<K, T: Copy>(
    groups: &Groups<K>,
    values: &[Option<T>],
    n: usize,
) -> Vec<Option<T>> {
    let mut out = vec![None; values.len()];
    for positions in groups.values() {
        for (j, &i) in positions.iter().enumerate().skip(n) {
            out[i] = values[positions[j - n]];
        }
    }
    out
}

/// [`rolling_mean`] within each group, then a `lag` shift over the group
/// results laid end to end in key order.
///
/// The shift is not confined to a group: the first `lag` rows of a group
/// receive the last rolling values of the group before it.
#[must_use]
pub fn grouped_rolling_mean_then_shift<K>(
    groups: &Groups<K>,
    values: &[Option<f64>],
    window: usize,
    lag: usize,
) -> Vec<Option<f64>> {
    let mut positions = Vec::with_capacity(values.len());
    let mut means = Vec::with_capacity(values.len());
    for group in groups.values() {
        let members: Vec<_> = group.iter().map(|&i| values[i]).collect();
        positions.extend_from_slice(group);
        means.extend(rolling_mean(&members, window));
    }
    let mut out = vec![None; values.len()];
    for (i, mean) in positions.into_iter().zip(shift(&means, lag)) {
        out[i] = mean;
    }
    out
}
