//! Stratified train/evaluation split.

use crate::error::{ModelError, Result};
use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Split row indices so each class keeps its proportion in both partitions.
///
/// Per class, `round(n * test_fraction)` rows go to evaluation. A class with at
/// least two rows always keeps one row on each side; a singleton class stays in
/// training. Both index lists come back sorted.
///
/// # Errors
/// Returns [`ModelError::InvalidConfig`] unless `0.0 <= test_fraction < 1.0`.
pub fn stratified_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(ModelError::InvalidConfig(format!(
            "test_fraction must be in [0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &class) in labels.iter().enumerate() {
        by_class.entry(class).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (class, mut rows) in by_class {
        let n = rows.len();
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        if test_fraction > 0.0 {
            if n == 1 {
                warn!("class {} has a single row, kept in training", class);
                n_test = 0;
            } else {
                n_test = n_test.clamp(1, n - 1);
            }
        }

        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
