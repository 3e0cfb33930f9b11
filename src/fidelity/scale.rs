//! Heuristic mapping from a raw device pixel ratio to a logical display
//! scale bucket (1x, 2x, ...).
//!
//! A ratio close to an integer bucket is taken to mean "browser zoom at
//! 100% on an Nx display". The ranges are empirical and can misclassify
//! high-density or fractionally-scaled displays; the precondition screen's
//! manual bypass exists for exactly those cases. The strategy is a plain
//! function pointer so deployments can substitute their own.

/// Highest display density the heuristic recognizes.
const MAX_BUCKET: u32 = 4;

/// Infer the logical scale bucket for `dpr`, accepting a relative
/// `tolerance` around each integer bucket. Returns `None` when the ratio
/// sits between buckets.
pub fn infer_scale_bucket(dpr: f64, tolerance: f64) -> Option<u32> {
    if !dpr.is_finite() || dpr <= 0.0 {
        return None;
    }
    for bucket in 1..=MAX_BUCKET {
        let nominal = bucket as f64;
        if ((dpr - nominal) / nominal).abs() <= tolerance {
            return Some(bucket);
        }
    }
    None
}
