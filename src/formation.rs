// src/formation.rs - seeded tree and explode targets for every particle layer

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use crate::animator::MotionProfile;
use crate::error::{EngineError, Result};
use crate::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParticleCategory {
    Foliage,
    Ornament,
    Ribbon,
    /// Gift box; its trim (two ribbons and a bow) shares the box pose.
    GiftBox,
}

impl ParticleCategory {
    pub const ALL: [ParticleCategory; 4] = [
        ParticleCategory::Foliage,
        ParticleCategory::Ornament,
        ParticleCategory::Ribbon,
        ParticleCategory::GiftBox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParticleCategory::Foliage => "foliage",
            ParticleCategory::Ornament => "ornament",
            ParticleCategory::Ribbon => "ribbon",
            ParticleCategory::GiftBox => "gift_box",
        }
    }

    fn salt(self) -> u64 {
        match self {
            ParticleCategory::Foliage => 0x5EED_0001,
            ParticleCategory::Ornament => 0x5EED_0002,
            ParticleCategory::Ribbon => 0x5EED_0003,
            ParticleCategory::GiftBox => 0x5EED_0004,
        }
    }

    pub fn default_layer(self) -> LayerConfig {
        let spiral = TreeRule::Spiral {
            turns: 4.5,
            radius_offset: 0.8,
        };
        match self {
            ParticleCategory::Foliage => LayerConfig {
                category: self,
                count: 1500,
                rule: TreeRule::Volume {
                    radius_scale: 1.0,
                    distribution: RadialDistribution::Uniform,
                },
                explode_radius: 15.0,
                explode_jitter: 10.0,
                motion: MotionProfile {
                    spin_rate: [0.2, 0.1],
                    phase_spin: true,
                    tree_scale: 1.0,
                    explode_scale: 0.5,
                    pulse_amplitude: 0.0,
                    pulse_frequency: 0.0,
                },
            },
            ParticleCategory::Ornament => LayerConfig {
                category: self,
                count: 600,
                rule: TreeRule::Volume {
                    radius_scale: 0.9,
                    distribution: RadialDistribution::SurfaceBiased,
                },
                explode_radius: 20.0,
                explode_jitter: 10.0,
                motion: MotionProfile {
                    spin_rate: [0.5, 0.5],
                    phase_spin: false,
                    tree_scale: 1.0,
                    explode_scale: 0.6,
                    pulse_amplitude: 0.1,
                    pulse_frequency: 2.0,
                },
            },
            ParticleCategory::Ribbon => LayerConfig {
                category: self,
                count: 600,
                rule: spiral,
                explode_radius: 20.0,
                explode_jitter: 10.0,
                motion: MotionProfile {
                    spin_rate: [1.0, 0.5],
                    phase_spin: false,
                    tree_scale: 0.4,
                    explode_scale: 0.5,
                    pulse_amplitude: 0.0,
                    pulse_frequency: 0.0,
                },
            },
            ParticleCategory::GiftBox => LayerConfig {
                category: self,
                count: 150,
                rule: spiral,
                explode_radius: 20.0,
                explode_jitter: 10.0,
                motion: MotionProfile {
                    spin_rate: [0.3, 0.3],
                    phase_spin: true,
                    tree_scale: 1.2,
                    explode_scale: 0.8,
                    pulse_amplitude: 0.1,
                    pulse_frequency: 1.5,
                },
            },
        }
    }
}

impl fmt::Display for ParticleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticleCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foliage" | "leaf" => Ok(ParticleCategory::Foliage),
            "ornament" | "gold" => Ok(ParticleCategory::Ornament),
            "ribbon" => Ok(ParticleCategory::Ribbon),
            "gift_box" | "giftbox" | "box" => Ok(ParticleCategory::GiftBox),
            _ => Err(EngineError::UnknownCategory(s.to_string())),
        }
    }
}

impl TryFrom<String> for ParticleCategory {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ParticleCategory> for String {
    fn from(category: ParticleCategory) -> Self {
        category.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadialDistribution {
    Uniform,
    /// sqrt-weighted radius, pushes particles toward the cone surface
    SurfaceBiased,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeRule {
    Volume {
        radius_scale: f32,
        distribution: RadialDistribution,
    },
    Spiral {
        turns: f32,
        radius_offset: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub height: f32,
    pub radius: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            height: 16.0,
            radius: 7.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub category: ParticleCategory,
    pub count: usize,
    pub rule: TreeRule,
    pub explode_radius: f32,
    pub explode_jitter: f32,
    pub motion: MotionProfile,
}

pub fn default_layers() -> Vec<LayerConfig> {
    ParticleCategory::ALL
        .iter()
        .map(|category| category.default_layer())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationTarget {
    pub tree: Vec3,
    pub explode: Vec3,
}

#[derive(Debug, Clone)]
pub struct FormationGenerator {
    tree: TreeConfig,
    layers: Vec<LayerConfig>,
    seed: u64,
}

impl FormationGenerator {
    pub fn new(tree: TreeConfig, layers: Vec<LayerConfig>, seed: u64) -> Result<Self> {
        if !(tree.height.is_finite() && tree.height > 0.0 && tree.radius.is_finite() && tree.radius > 0.0)
        {
            return Err(EngineError::InvalidConfig(format!(
                "tree height and radius must be positive, got {} x {}",
                tree.height, tree.radius
            )));
        }

        for (i, layer) in layers.iter().enumerate() {
            validate_layer(layer)?;
            if layers[..i].iter().any(|other| other.category == layer.category) {
                return Err(EngineError::DuplicateCategory(layer.category));
            }
        }

        Ok(Self { tree, layers, seed })
    }

    pub fn tree(&self) -> &TreeConfig {
        &self.tree
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    pub fn layer(&self, category: ParticleCategory) -> Result<&LayerConfig> {
        self.layers
            .iter()
            .find(|layer| layer.category == category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))
    }

    pub(crate) fn set_count(&mut self, category: ParticleCategory, count: usize) -> Result<()> {
        if count == 0 {
            return Err(EngineError::InvalidParticleCount { category, count });
        }
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.category == category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))?;
        layer.count = count;
        Ok(())
    }

    /// Targets for `count` particles of `category`. A zero count is an
    /// empty layer, not an error.
    pub fn generate(&self, count: usize, category: ParticleCategory) -> Result<Vec<FormationTarget>> {
        let layer = self.layer(category)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(layer_seed(self.seed, category, count));
        let targets = (0..count)
            .map(|i| FormationTarget {
                tree: tree_target(&layer.rule, &self.tree, i, count, &mut rng),
                explode: explode_target(i, count, layer.explode_radius, layer.explode_jitter, &mut rng),
            })
            .collect();
        Ok(targets)
    }

    /// Targets for a category at its configured count.
    pub fn generate_layer(&self, category: ParticleCategory) -> Result<Vec<FormationTarget>> {
        let count = self.layer(category)?.count;
        self.generate(count, category)
    }
}

fn validate_layer(layer: &LayerConfig) -> Result<()> {
    if layer.count == 0 {
        return Err(EngineError::InvalidParticleCount {
            category: layer.category,
            count: layer.count,
        });
    }
    if !(layer.explode_radius.is_finite() && layer.explode_radius > 0.0)
        || !(layer.explode_jitter.is_finite() && layer.explode_jitter >= 0.0)
    {
        return Err(EngineError::InvalidConfig(format!(
            "{}: explode radius must be positive and jitter non-negative",
            layer.category
        )));
    }
    let rule_ok = match layer.rule {
        TreeRule::Volume { radius_scale, .. } => radius_scale.is_finite() && radius_scale > 0.0,
        TreeRule::Spiral {
            turns,
            radius_offset,
        } => turns.is_finite() && turns > 0.0 && radius_offset.is_finite(),
    };
    if !rule_ok {
        return Err(EngineError::InvalidConfig(format!(
            "{}: invalid tree rule {:?}",
            layer.category, layer.rule
        )));
    }
    let motion = &layer.motion;
    let motion_ok = motion.spin_rate.iter().all(|r| r.is_finite())
        && [motion.tree_scale, motion.explode_scale, motion.pulse_amplitude, motion.pulse_frequency]
            .iter()
            .all(|v| v.is_finite());
    if !motion_ok {
        return Err(EngineError::InvalidConfig(format!(
            "{}: motion values must be finite, got {:?}",
            layer.category, motion
        )));
    }
    Ok(())
}

fn layer_seed(seed: u64, category: ParticleCategory, count: usize) -> u64 {
    seed ^ category.salt().rotate_left(17) ^ (count as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn tree_target(rule: &TreeRule, tree: &TreeConfig, index: usize, count: usize, rng: &mut StdRng) -> Vec3 {
    match *rule {
        TreeRule::Volume {
            radius_scale,
            distribution,
        } => {
            let h: f32 = rng.gen();
            let r_max = (1.0 - h) * tree.radius * radius_scale;
            let u: f32 = rng.gen();
            let fraction = match distribution {
                RadialDistribution::Uniform => u,
                RadialDistribution::SurfaceBiased => u.sqrt(),
            };
            let r = fraction * r_max;
            let theta = rng.gen::<f32>() * TAU;
            Vec3::new(r * theta.cos(), h * tree.height - tree.height / 2.0, r * theta.sin())
        }
        TreeRule::Spiral {
            turns,
            radius_offset,
        } => {
            // index order is the ribbon order, no randomness here
            let t = index as f32 / count as f32;
            let r = (1.0 - t) * (tree.radius + radius_offset);
            let theta = t * TAU * turns;
            Vec3::new(r * theta.cos(), t * tree.height - tree.height / 2.0, r * theta.sin())
        }
    }
}

/// Fibonacci-style sphere placement with bounded radial jitter.
fn explode_target(index: usize, count: usize, radius: f32, jitter: f32, rng: &mut StdRng) -> Vec3 {
    let phi = (-1.0 + 2.0 * index as f32 / count as f32).clamp(-1.0, 1.0).acos();
    let theta = (count as f32 * PI).sqrt() * phi;
    let r = radius + rng.gen::<f32>() * jitter;
    Vec3::new(
        r * theta.cos() * phi.sin(),
        r * theta.sin() * phi.sin(),
        r * phi.cos(),
    )
}
