// src/gesture.rs - fist / open / pinch classification from one hand
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::landmarks::{
    LandmarkFrame, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP, MIDDLE_TIP, PINKY_TIP, RING_TIP,
    THUMB_TIP, WRIST,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Thumb tip to index tip, normalized image units.
    pub pinch_threshold: f32,
    /// Mean fingertip-to-wrist distance below which the hand is a fist.
    pub fist_threshold: f32,
    /// Mean fingertip-to-wrist distance above which the hand is open.
    pub open_threshold: f32,
    /// Landmark used as the cursor (palm centre proxy).
    pub cursor_landmark: usize,
    /// The video feed is shown mirrored, so x is flipped for the cursor.
    pub mirror_x: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.05,
            fist_threshold: 0.25,
            open_threshold: 0.40,
            cursor_landmark: MIDDLE_MCP,
            mirror_x: true,
        }
    }
}

impl GestureConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.pinch_threshold.is_finite() && self.pinch_threshold > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "pinch_threshold must be positive, got {}",
                self.pinch_threshold
            )));
        }
        if !(self.fist_threshold > 0.0 && self.fist_threshold < self.open_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "need 0 < fist_threshold ({}) < open_threshold ({})",
                self.fist_threshold, self.open_threshold
            )));
        }
        if !self.open_threshold.is_finite() {
            return Err(EngineError::InvalidConfig(
                "open_threshold must be finite".to_string(),
            ));
        }
        if self.cursor_landmark >= LANDMARK_COUNT {
            return Err(EngineError::InvalidConfig(format!(
                "cursor_landmark {} is not a hand landmark index",
                self.cursor_landmark
            )));
        }
        Ok(())
    }
}

/// Control signal published once per inference cycle.
///
/// When `detected` is false the other fields are whatever the last detected
/// frame produced; callers check `detected` before using them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureSignal {
    pub cursor_x: f32,
    pub cursor_y: f32,
    pub is_pinching: bool,
    pub is_fist: bool,
    pub is_open: bool,
    pub detected: bool,
}

impl Default for GestureSignal {
    fn default() -> Self {
        Self {
            cursor_x: 0.5,
            cursor_y: 0.5,
            is_pinching: false,
            // The scene starts as a tree
            is_fist: true,
            is_open: false,
            detected: false,
        }
    }
}

impl GestureSignal {
    pub fn cursor(&self) -> Option<(f32, f32)> {
        self.detected.then_some((self.cursor_x, self.cursor_y))
    }

    pub fn pinch_held(&self) -> bool {
        self.detected && self.is_pinching
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationState {
    #[default]
    Tree,
    Explode,
}

impl FormationState {
    /// Level-triggered transition: a fist means tree, an open hand means
    /// explode, anything else (neutral grip, no hand) holds.
    pub fn next(self, signal: &GestureSignal) -> Self {
        if !signal.detected {
            self
        } else if signal.is_fist {
            FormationState::Tree
        } else if signal.is_open {
            FormationState::Explode
        } else {
            self
        }
    }

    pub fn is_exploded(self) -> bool {
        self == FormationState::Explode
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormationState::Tree => "tree",
            FormationState::Explode => "explode",
        }
    }
}

impl fmt::Display for FormationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn pinch_distance(frame: &LandmarkFrame) -> f32 {
    frame[THUMB_TIP].planar_distance(&frame[INDEX_TIP])
}

/// Mean distance of the four fingertips to the wrist.
pub fn grip_openness(frame: &LandmarkFrame) -> f32 {
    let wrist = frame[WRIST];
    let total: f32 = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP]
        .iter()
        .map(|&tip| frame[tip].planar_distance(&wrist))
        .sum();
    total / 4.0
}

pub struct GestureClassifier {
    config: GestureConfig,
    last: GestureSignal,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            last: GestureSignal::default(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn last(&self) -> GestureSignal {
        self.last
    }

    pub fn classify(&mut self, frame: Option<&LandmarkFrame>) -> GestureSignal {
        let frame = match frame {
            Some(frame) if is_finite_frame(frame) => frame,
            Some(_) => {
                debug!("dropping landmark frame with non-finite coordinates");
                self.last.detected = false;
                return self.last;
            }
            None => {
                self.last.detected = false;
                return self.last;
            }
        };

        let anchor = frame
            .get(self.config.cursor_landmark)
            .unwrap_or(&frame[MIDDLE_MCP]);
        let cursor_x = if self.config.mirror_x {
            1.0 - anchor.x
        } else {
            anchor.x
        };

        let openness = grip_openness(frame);

        self.last = GestureSignal {
            cursor_x,
            cursor_y: anchor.y,
            is_pinching: pinch_distance(frame) < self.config.pinch_threshold,
            is_fist: openness < self.config.fist_threshold,
            is_open: openness > self.config.open_threshold,
            detected: true,
        };
        self.last
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

fn is_finite_frame(frame: &LandmarkFrame) -> bool {
    frame
        .points()
        .iter()
        .all(|p| p.x.is_finite() && p.y.is_finite())
}
