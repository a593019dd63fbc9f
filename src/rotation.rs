// src/rotation.rs - group rotation from idle spin and open-hand steering
use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::gesture::{FormationState, GestureSignal};
use crate::smoothing::{approach, lerp_factor};
use crate::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Idle spin in tree formation, rad/s
    pub idle_rate: f32,
    pub tilt_range: f32,
    pub yaw_range: f32,
    pub damping: f32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            idle_rate: 0.2,
            tilt_range: 2.0,
            yaw_range: 1.0,
            damping: 2.0,
        }
    }
}

impl RotationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.damping.is_finite() && self.damping > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "rotation damping must be positive, got {}",
                self.damping
            )));
        }
        if ![self.idle_rate, self.tilt_range, self.yaw_range]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(EngineError::InvalidConfig(
                "rotation rates must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RotationController {
    config: RotationConfig,
    idle_angle: f32,
    tilt_x: f32,
    yaw_y: f32,
    x: f32,
    y: f32,
}

impl RotationController {
    pub fn new(config: RotationConfig) -> Self {
        Self {
            config,
            idle_angle: 0.0,
            tilt_x: 0.0,
            yaw_y: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn tick(&mut self, signal: &GestureSignal, state: FormationState, dt: f32) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

        if state == FormationState::Tree {
            self.idle_angle += self.config.idle_rate * dt;
        }

        // open hand steers; the last offset holds otherwise
        if signal.detected && signal.is_open {
            self.tilt_x = (signal.cursor_x - 0.5) * self.config.tilt_range;
            self.yaw_y = (signal.cursor_y - 0.5) * self.config.yaw_range;
        }

        let target_x = self.tilt_x;
        let target_y = match state {
            FormationState::Tree => self.yaw_y + self.idle_angle,
            FormationState::Explode => self.yaw_y,
        };

        let factor = lerp_factor(dt, self.config.damping);
        self.x = approach(self.x, target_x, factor);
        self.y = approach(self.y, target_y, factor);
    }

    /// Current (x, y) rotation in radians.
    pub fn angles(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn idle_angle(&self) -> f32 {
        self.idle_angle
    }

    pub fn group_rotation(&self) -> Rotation3<f32> {
        Rotation3::from_axis_angle(&Vec3::x_axis(), self.x)
            * Rotation3::from_axis_angle(&Vec3::y_axis(), self.y)
    }
}

impl Default for RotationController {
    fn default() -> Self {
        Self::new(RotationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_at(cursor_x: f32, cursor_y: f32) -> GestureSignal {
        GestureSignal {
            cursor_x,
            cursor_y,
            is_pinching: false,
            is_fist: false,
            is_open: true,
            detected: true,
        }
    }

    #[test]
    fn test_idle_spin_only_in_tree() {
        let mut rotation = RotationController::default();
        let idle = GestureSignal::default();
        for _ in 0..10 {
            rotation.tick(&idle, FormationState::Tree, 0.1);
        }
        assert!((rotation.idle_angle() - 0.2).abs() < 1e-5);
        assert!(rotation.angles().1 > 0.0);

        for _ in 0..10 {
            rotation.tick(&idle, FormationState::Explode, 0.1);
        }
        assert!((rotation.idle_angle() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_open_hand_steers_and_holds() {
        let mut rotation = RotationController::default();
        rotation.tick(&open_at(1.0, 0.0), FormationState::Explode, 10.0);
        let (x, y) = rotation.angles();
        assert!((x - 1.0).abs() < 1e-5);
        assert!((y + 0.5).abs() < 1e-5);

        // a fist does not steer, the offset stays
        let fist = GestureSignal {
            is_open: false,
            is_fist: true,
            cursor_x: 0.0,
            ..open_at(0.0, 1.0)
        };
        rotation.tick(&fist, FormationState::Explode, 10.0);
        assert_eq!(rotation.angles(), (x, y));
    }

    #[test]
    fn test_damping_is_gradual() {
        let mut rotation = RotationController::default();
        rotation.tick(&open_at(1.0, 0.5), FormationState::Explode, 0.1);
        // factor 0.2 of the way to 1.0
        assert!((rotation.angles().0 - 0.2).abs() < 1e-5);
        rotation.tick(&open_at(1.0, 0.5), FormationState::Explode, f32::NAN);
        assert!((rotation.angles().0 - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_group_rotation_order() {
        let mut rotation = RotationController::default();
        rotation.tick(&open_at(0.5 + 0.25 * std::f32::consts::PI, 0.5), FormationState::Explode, 10.0);
        // x tilt of pi/2 sends +y to +z
        let r = rotation.group_rotation();
        let moved = r * Vec3::new(0.0, 1.0, 0.0);
        assert!((moved - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-4);
    }
}
