//! Autocorrelation decay of factor series.

use ndarray::{Array1, ArrayView1, s};

/// Autocorrelation threshold marking the half-life.
pub const HALF_LIFE_THRESHOLD: f64 = 0.5;

/// Minimum number of valid points to estimate a half-life.
pub const MIN_HALF_LIFE_POINTS: usize = 4;

fn lag_corr(x: ArrayView1<'_, Option<f64>>, k: usize) -> Option<f64> {
    let head = x.slice(s![..x.len() - k]);
    let tail = x.slice(s![k..]);
    let (a, b): (Vec<f64>, Vec<f64>) = head
        .iter()
        .zip(tail.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip();
    if a.len() < 2 {
        return None;
    }
    let a = Array1::from(a);
    let b = Array1::from(b);
    let da = &a - a.mean()?;
    let db = &b - b.mean()?;
    let denom = (da.dot(&da) * db.dot(&db)).sqrt();
    let corr = da.dot(&db) / denom;
    corr.is_finite().then_some(corr)
}

fn decayed(x: ArrayView1<'_, Option<f64>>, k: usize) -> bool {
    lag_corr(x, k).is_none_or(|c| c <= HALF_LIFE_THRESHOLD)
}

/// Smallest lag whose autocorrelation drops to `0.5` or below.
///
/// Lags up to half the series length are searched, assuming the autocorrelation decays
/// monotonically; a series that never decays reports that maximum lag. Returns `None` with
/// fewer than four valid points.
pub fn half_life(values: &[Option<f64>]) -> Option<f64> {
    let x: Array1<Option<f64>> =
        values.iter().map(|v| v.filter(|v| v.is_finite())).collect();
    if x.iter().flatten().count() < MIN_HALF_LIFE_POINTS {
        return None;
    }
    let max_lag = (x.len() / 2).max(1);
    let view = x.view();
    if !decayed(view, max_lag) {
        return Some(max_lag as f64);
    }
    let (mut lo, mut hi) = (1, max_lag);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if decayed(view, mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Some(lo as f64)
}
