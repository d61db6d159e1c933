//! Window functions shared by the built-in indicators.
//!
//! Windows end at `idx` inclusive. A window that does not fit, or that
//! contains NaN, yields NaN.

/// Exponential smoothing step: `value * a + prev * (1 - a)`, `a = 2/(period+1)`.
/// A NaN `prev` seeds the recurrence with `value`.
#[inline]
pub fn iema(prev: f64, value: f64, period: usize) -> f64 {
    if prev.is_nan() {
        return value;
    }
    let a = 2.0 / (period as f64 + 1.0);
    // Same recurrence, arranged so a constant input is an exact fixed point.
    prev + a * (value - prev)
}

/// Wilder smoothing step: `(prev * (period - 1) + value) / period`.
#[inline]
pub fn wilder(prev: f64, value: f64, period: usize) -> f64 {
    let p = period as f64;
    (prev * (p - 1.0) + value) / p
}

/// `values[i]`, NaN when out of range.
#[inline]
pub fn at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(f64::NAN)
}

pub(crate) fn window(values: &[f64], idx: usize, period: usize) -> Option<&[f64]> {
    if period == 0 || idx >= values.len() || idx + 1 < period {
        return None;
    }
    let w = &values[idx + 1 - period..=idx];
    (!w.iter().any(|v| v.is_nan())).then_some(w)
}

pub fn ma(values: &[f64], idx: usize, period: usize) -> f64 {
    window(values, idx, period).map_or(f64::NAN, |w| w.iter().sum::<f64>() / period as f64)
}

/// Population standard deviation.
pub fn stdev(values: &[f64], idx: usize, period: usize) -> f64 {
    window(values, idx, period).map_or(f64::NAN, |w| {
        let mean = w.iter().sum::<f64>() / period as f64;
        let var = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        var.max(0.0).sqrt()
    })
}

pub fn highest(values: &[f64], idx: usize, period: usize) -> f64 {
    window(values, idx, period).map_or(f64::NAN, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn lowest(values: &[f64], idx: usize, period: usize) -> f64 {
    window(values, idx, period).map_or(f64::NAN, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(ma(&v, 1, 3).is_nan());
        assert_eq!(ma(&v, 2, 3), 2.0);
        assert_eq!(ma(&v, 3, 3), 3.0);
        assert_eq!(highest(&v, 3, 2), 4.0);
        assert_eq!(lowest(&v, 3, 2), 3.0);
        assert!((stdev(&v, 3, 4) - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(ma(&[1.0, f64::NAN, 3.0], 2, 2).is_nan());
    }

    #[test]
    fn ema_fixed_point() {
        let mut prev = f64::NAN;
        for _ in 0..20 {
            prev = iema(prev, 10.0, 5);
            assert_eq!(prev, 10.0);
        }
    }
}
