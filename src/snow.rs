// src/snow.rs - ambient falling snow, independent of the formation
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowConfig {
    pub count: usize,
    /// Box the flakes live in, centred on the origin
    pub extent: [f32; 3],
    pub fall_speed: f32,
    pub drift: f32,
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            count: 2000,
            extent: [50.0, 40.0, 50.0],
            fall_speed: 2.0,
            drift: 0.5,
        }
    }
}

impl SnowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.extent.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(EngineError::InvalidConfig(format!(
                "snow extent must be positive, got {:?}",
                self.extent
            )));
        }
        if !self.fall_speed.is_finite() || self.fall_speed < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "snow fall_speed must be non-negative, got {}",
                self.fall_speed
            )));
        }
        Ok(())
    }
}

struct Flake {
    position: Vec3,
    phase: f32,
}

pub struct SnowField {
    config: SnowConfig,
    flakes: Vec<Flake>,
    rng: StdRng,
}

impl SnowField {
    pub fn new(config: SnowConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ 0x536E_6F77);
        let [ex, ey, ez] = config.extent;
        let flakes = (0..config.count)
            .map(|_| Flake {
                position: Vec3::new(
                    (rng.gen::<f32>() - 0.5) * ex,
                    (rng.gen::<f32>() - 0.5) * ey,
                    (rng.gen::<f32>() - 0.5) * ez,
                ),
                phase: rng.gen::<f32>() * std::f32::consts::TAU,
            })
            .collect();
        Self { config, flakes, rng }
    }

    pub fn tick(&mut self, elapsed: f32, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let [ex, ey, ez] = self.config.extent;
        let floor = -ey / 2.0;
        for flake in &mut self.flakes {
            flake.position.y -= self.config.fall_speed * dt;
            flake.position.x -= (elapsed * 0.5 + flake.phase).sin() * dt * self.config.drift;
            if flake.position.y < floor {
                flake.position.y = ey / 2.0;
                flake.position.x = (self.rng.gen::<f32>() - 0.5) * ex;
                flake.position.z = (self.rng.gen::<f32>() - 0.5) * ez;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.flakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flakes.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.flakes.iter().map(|f| f.position)
    }
}
