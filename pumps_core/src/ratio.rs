//! Volume <-> raw unit conversion.
//!
//! All arithmetic truncates: fractional steps, ticks and ratios are dropped.
//! Volumes are multiplied in `f32` so a decimal such as 0.7 ml lands on the
//! whole unit it names instead of one below it.
//! Repeated small doses therefore drift below the ideal volume; the drift is
//! bounded by one raw unit per dose.

/// Steps for `ml` at `steps_per_ml`, truncated toward zero.
/// Non-finite volumes map to 0; results saturate at the `i64` range.
#[inline]
pub fn volume_to_steps(ml: f32, steps_per_ml: u32) -> i64 {
    if !ml.is_finite() {
        return 0;
    }
    (ml * steps_per_ml as f32) as i64
}

/// Ticks for `ml` at `ticks_per_ml`. Negative and non-finite volumes map to 0.
#[inline]
pub fn volume_to_ticks(ml: f32, ticks_per_ml: u32) -> u64 {
    if !ml.is_finite() || ml <= 0.0 {
        return 0;
    }
    (ml * ticks_per_ml as f32) as u64
}

/// Ratio learned from `count` raw units delivering `target_ml`.
///
/// Returns `None` for a zero target; saturates at `u32::MAX`.
#[inline]
pub fn ratio_from_count(count: u64, target_ml: u32) -> Option<u32> {
    if target_ml == 0 {
        return None;
    }
    let r = count / u64::from(target_ml);
    Some(u32::try_from(r).unwrap_or(u32::MAX))
}
