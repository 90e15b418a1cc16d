//! Numeric helpers shared by the trust and scoring code
//!
//! Every learned quantity in the engine is an exponential moving average of
//! samples in [0, 1], so it stays inside the unit interval by construction.

/// Clamp a value into [0, 1], mapping NaN to 0
#[inline]
pub fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Exponential moving average step: `old × (1 − α) + sample × α`
#[inline]
pub fn ema(old: f64, sample: f64, alpha: f64) -> f64 {
    old * (1.0 - alpha) + sample * alpha
}

/// EMA step towards 1 on success and towards 0 on failure
#[inline]
pub fn ema_hit(old: f64, hit: bool, alpha: f64) -> f64 {
    ema(old, if hit { 1.0 } else { 0.0 }, alpha)
}

/// Divide, falling back to `fallback` when the denominator is not positive
#[inline]
pub fn ratio_or(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        unit_interval(numerator / denominator)
    } else {
        fallback
    }
}
