//! Mathematical utility functions shared by the generators
//!
//! Interpolation helpers used to spread `const` ranges across datapoints
//! and to rescale noise into the requested value range.

/// Linear interpolation between two values
///
/// # Arguments
/// * `a` - Start value
/// * `b` - End value
/// * `ratio` - Interpolation ratio (0.0 = a, 1.0 = b)
///
/// # Examples
/// ```
/// use vampireman::math_utils::lerp;
///
/// assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
/// assert_eq!(lerp(100.0, 200.0, 0.25), 125.0);
/// ```
pub fn lerp(a: f64, b: f64, ratio: f64) -> f64 {
    a + (b - a) * ratio
}

/// Inverse linear interpolation - find the ratio for a given value
///
/// Returns 0.0 when `a` and `b` coincide.
///
/// # Examples
/// ```
/// use vampireman::math_utils::inverse_lerp;
///
/// assert_eq!(inverse_lerp(100.0, 200.0, 150.0), 0.5);
/// ```
pub fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    if (b - a).abs() < f64::EPSILON {
        0.0
    } else {
        (value - a) / (b - a)
    }
}

/// The `index`-th of `count` evenly spaced values from `min` to `max`, both ends included.
///
/// A single step yields `min`. The last step is exactly `max`.
///
/// # Examples
/// ```
/// use vampireman::math_utils::linear_step;
///
/// assert_eq!(linear_step(10.0, 20.0, 0, 2), 10.0);
/// assert_eq!(linear_step(10.0, 20.0, 1, 2), 20.0);
/// assert_eq!(linear_step(0.0, 1.0, 2, 5), 0.5);
/// ```
pub fn linear_step(min: f64, max: f64, index: usize, count: usize) -> f64 {
    if count <= 1 {
        return min;
    }
    if index + 1 == count {
        return max;
    }
    lerp(min, max, index as f64 / (count - 1) as f64)
}

/// Like [`linear_step`], but evenly spaced in log10 space.
///
/// Both bounds must be positive.
pub fn log_step(min: f64, max: f64, index: usize, count: usize) -> f64 {
    if count <= 1 {
        return min;
    }
    if index + 1 == count {
        return max;
    }
    10f64.powf(linear_step(min.log10(), max.log10(), index, count))
}
