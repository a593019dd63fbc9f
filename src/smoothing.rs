// src/smoothing.rs - lerp-toward-target used by every animated value
use crate::Vec3;

/// Blend factor for one tick, clamped to [0, 1] so a long frame lands on
/// the target instead of overshooting it. Bad input (NaN, negative dt)
/// freezes the value for the tick.
pub fn lerp_factor(dt: f32, speed: f32) -> f32 {
    let factor = dt * speed;
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn approach(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

pub fn approach_vec(current: &mut Vec3, target: &Vec3, factor: f32) {
    *current += (target - *current) * factor;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_is_clamped() {
        assert!((lerp_factor(0.1, 2.5) - 0.25).abs() < 1e-6);
        assert_eq!(lerp_factor(10.0, 2.5), 1.0);
        assert_eq!(lerp_factor(-1.0, 2.5), 0.0);
        assert_eq!(lerp_factor(f32::NAN, 2.5), 0.0);
        assert_eq!(lerp_factor(f32::INFINITY, 2.5), 0.0);
    }

    #[test]
    fn test_approach_never_overshoots() {
        let mut value = 0.0;
        for dt in [0.016, 0.5, 3.0, 0.001] {
            let next = approach(value, 10.0, lerp_factor(dt, 2.5));
            assert!(next >= value);
            assert!(next <= 10.0 + 1e-5);
            value = next;
        }
        assert!((value - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_approach_vec_per_axis() {
        let mut current = Vec3::new(0.0, 10.0, -4.0);
        approach_vec(&mut current, &Vec3::new(2.0, 0.0, 4.0), 0.5);
        assert_eq!(current, Vec3::new(1.0, 5.0, 0.0));
    }
}
