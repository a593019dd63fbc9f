// src/star.rs - tree-top star that follows the formation
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::gesture::FormationState;
use crate::smoothing::{approach, approach_vec, lerp_factor};
use crate::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarConfig {
    pub tree_position: [f32; 3],
    pub tree_scale: f32,
    pub explode_position: [f32; 3],
    pub explode_scale: f32,
    pub speed: f32,
    pub pulse_amplitude: f32,
    pub pulse_frequency: f32,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            tree_position: [0.0, 9.5, 0.0],
            tree_scale: 2.5,
            explode_position: [0.0, 0.0, 0.0],
            explode_scale: 3.5,
            speed: 3.0,
            pulse_amplitude: 0.05,
            pulse_frequency: 2.0,
        }
    }
}

impl StarConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "star speed must be positive, got {}",
                self.speed
            )));
        }
        if !(self.tree_scale > 0.0 && self.explode_scale > 0.0) {
            return Err(EngineError::InvalidConfig(
                "star scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StarPose {
    pub position: [f32; 3],
    pub scale: f32,
}

pub struct TreeStar {
    config: StarConfig,
    position: Vec3,
    scale: f32,
}

impl TreeStar {
    pub fn new(config: StarConfig) -> Self {
        let position = Vec3::from(config.tree_position);
        let scale = config.tree_scale;
        Self {
            config,
            position,
            scale,
        }
    }

    pub fn tick(&mut self, state: FormationState, dt: f32) {
        let factor = lerp_factor(dt, self.config.speed);
        let (target, target_scale) = match state {
            FormationState::Tree => (self.config.tree_position, self.config.tree_scale),
            FormationState::Explode => (self.config.explode_position, self.config.explode_scale),
        };
        approach_vec(&mut self.position, &Vec3::from(target), factor);
        self.scale = approach(self.scale, target_scale, factor);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn pose(&self, elapsed: f32) -> StarPose {
        let pulse = 1.0 + (elapsed * self.config.pulse_frequency).sin() * self.config.pulse_amplitude;
        StarPose {
            position: self.position.into(),
            scale: self.scale * pulse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_moves_to_core_on_explode() {
        let mut star = TreeStar::new(StarConfig::default());
        assert_eq!(star.position().y, 9.5);

        star.tick(FormationState::Explode, 0.1);
        let y = star.position().y;
        assert!(y < 9.5 && y > 0.0);

        for _ in 0..200 {
            star.tick(FormationState::Explode, 0.05);
        }
        assert!(star.position().norm() < 1e-3);
        assert!((star.pose(0.0).scale - 3.5).abs() < 1e-3);

        star.tick(FormationState::Tree, 5.0);
        assert!((star.position().y - 9.5).abs() < 1e-5);
    }

    #[test]
    fn test_pulse_only_touches_output_scale() {
        let star = TreeStar::new(StarConfig::default());
        let quarter = std::f32::consts::FRAC_PI_4;
        // sin(2 * pi/4) = 1
        assert!((star.pose(quarter).scale - 2.5 * 1.05).abs() < 1e-5);
        assert_eq!(star.pose(0.0).scale, 2.5);
    }
}
