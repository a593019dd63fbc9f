// src/config.rs - engine configuration, loaded from JSON with defaults for anything missing
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::animator::AnimationConfig;
use crate::camera::CameraConfig;
use crate::error::{EngineError, Result};
use crate::formation::{default_layers, FormationGenerator, LayerConfig, TreeConfig};
use crate::gesture::GestureConfig;
use crate::photos::PhotoConfig;
use crate::rotation::RotationConfig;
use crate::selection::SelectionConfig;
use crate::snow::SnowConfig;
use crate::source::SourceConfig;
use crate::star::StarConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seeds particle layout, snow and photo placement
    pub seed: u64,
    pub tree: TreeConfig,
    pub layers: Vec<LayerConfig>,
    pub gesture: GestureConfig,
    pub animation: AnimationConfig,
    pub rotation: RotationConfig,
    pub star: StarConfig,
    pub snow: SnowConfig,
    pub photos: PhotoConfig,
    pub selection: SelectionConfig,
    pub camera: CameraConfig,
    pub source: SourceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 2024,
            tree: TreeConfig::default(),
            layers: default_layers(),
            gesture: GestureConfig::default(),
            animation: AnimationConfig::default(),
            rotation: RotationConfig::default(),
            star: StarConfig::default(),
            snow: SnowConfig::default(),
            photos: PhotoConfig::default(),
            selection: SelectionConfig::default(),
            camera: CameraConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `<config dir>/config.json` for this application, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "GestureTree", "gesture_tree")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one particle layer is required".to_string(),
            ));
        }
        // layer and tree checks live with the generator
        FormationGenerator::new(self.tree, self.layers.clone(), self.seed)?;
        self.gesture.validate()?;
        if !(self.animation.formation_speed.is_finite() && self.animation.formation_speed > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "formation_speed must be positive, got {}",
                self.animation.formation_speed
            )));
        }
        self.rotation.validate()?;
        self.star.validate()?;
        self.snow.validate()?;
        self.photos.validate()?;
        self.selection.validate()?;
        self.camera.validate()?;
        self.source.validate()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
