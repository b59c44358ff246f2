//! Convenient utility functions.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

#[cfg(feature = "progress_bar")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress_bar")]
use std::time::Duration;

/// Creates a [`ProgressBar`] with a predefined default style.
#[cfg(feature = "progress_bar")]
pub fn progress_bar(len: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(len as u64).with_style(
        ProgressStyle::with_template("{elapsed_precise} {wide_bar} {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress_bar.enable_steady_tick(Duration::new(0, 100000000));
    progress_bar
}

/// Return `log2(count + 1)`.
///
/// Counts beyond the `f64` range give `+inf`.
pub fn log2_plus_one(count: &BigUint) -> f64 {
    (count + 1u32).to_f64().map_or(f64::INFINITY, f64::log2)
}
