// src/selection.rs - pinch-to-focus picking with a no-repeat random fallback
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::camera::{cursor_to_ndc, Projector};
use crate::error::{EngineError, Result};
use crate::gesture::GestureSignal;
use crate::photos::ObjectPool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// NDC distance under which the nearest object is picked directly.
    pub pick_radius: f32,
    /// Fixes the random-pick sequence; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            pick_radius: 0.3,
            seed: None,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.pick_radius.is_finite() && self.pick_radius > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "pick_radius must be positive, got {}",
                self.pick_radius
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SelectionEvent {
    Idle,
    Picked { id: String, distance: f32 },
    RandomPick { id: String, history_reset: bool },
    Released { id: String },
}

impl SelectionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionEvent::Idle => "idle",
            SelectionEvent::Picked { .. } => "picked",
            SelectionEvent::RandomPick { .. } => "random_pick",
            SelectionEvent::Released { .. } => "released",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            SelectionEvent::Idle => None,
            SelectionEvent::Picked { id, .. }
            | SelectionEvent::RandomPick { id, .. }
            | SelectionEvent::Released { id } => Some(id),
        }
    }
}

/// Ids already shown by random picks, in the order they were shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionHistory {
    shown: Vec<String>,
}

impl SelectionHistory {
    pub fn contains(&self, id: &str) -> bool {
        self.shown.iter().any(|s| s == id)
    }

    pub fn push(&mut self, id: String) {
        self.shown.push(id);
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }

    pub fn ids(&self) -> &[String] {
        &self.shown
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

pub struct SelectionController {
    config: SelectionConfig,
    active: Option<String>,
    history: SelectionHistory,
    was_pinching: bool,
    generation: Option<u64>,
    rng: StdRng,
}

impl SelectionController {
    pub fn new(config: SelectionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            active: None,
            history: SelectionHistory::default(),
            was_pinching: false,
            generation: None,
            rng,
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn history(&self) -> &SelectionHistory {
        &self.history
    }

    /// One selection step. Only this method changes the active id.
    pub fn update<P: Projector>(&mut self, signal: &GestureSignal, pool: &ObjectPool, projector: &P) -> SelectionEvent {
        if self.generation != Some(pool.generation) {
            if self.generation.is_some() && !self.history.is_empty() {
                debug!("object pool changed, clearing selection history");
            }
            self.history.clear();
            self.generation = Some(pool.generation);
        }

        let pinching = signal.pinch_held();
        let rising = pinching && !self.was_pinching;
        self.was_pinching = pinching;

        if let Some(id) = self.active.take() {
            if !pool.contains(&id) {
                info!("active object {} left the pool", id);
                return SelectionEvent::Released { id };
            }
            if !pinching {
                info!("released {}", id);
                return SelectionEvent::Released { id };
            }
            self.active = Some(id);
            return SelectionEvent::Idle;
        }

        if !rising {
            return SelectionEvent::Idle;
        }

        if let Some((id, distance)) = self.nearest(signal, pool, projector) {
            if distance < self.config.pick_radius {
                info!("picked {} at ndc distance {:.3}", id, distance);
                self.active = Some(id.clone());
                return SelectionEvent::Picked { id, distance };
            }
        }

        match self.random_pick(pool) {
            Some((id, history_reset)) => {
                info!("random pick {} (history reset: {})", id, history_reset);
                self.active = Some(id.clone());
                SelectionEvent::RandomPick { id, history_reset }
            }
            None => SelectionEvent::Idle,
        }
    }

    /// Closest projected object to the cursor in NDC, ignoring anything
    /// without usable depth or beyond the far plane.
    pub fn nearest<P: Projector>(&self, signal: &GestureSignal, pool: &ObjectPool, projector: &P) -> Option<(String, f32)> {
        let (ndc_x, ndc_y) = cursor_to_ndc(signal.cursor_x, signal.cursor_y);
        pool.objects
            .iter()
            .filter_map(|object| {
                let ndc = projector.project(&object.world_position)?;
                if ndc.z >= 1.0 {
                    return None;
                }
                let distance = ((ndc.x - ndc_x).powi(2) + (ndc.y - ndc_y).powi(2)).sqrt();
                Some((object, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(object, distance)| (object.id.clone(), distance))
    }

    fn random_pick(&mut self, pool: &ObjectPool) -> Option<(String, bool)> {
        if pool.is_empty() {
            return None;
        }
        let mut available: Vec<&str> = pool
            .objects
            .iter()
            .map(|o| o.id.as_str())
            .filter(|id| !self.history.contains(id))
            .collect();

        let history_reset = available.is_empty();
        if history_reset {
            self.history.clear();
            available = pool.objects.iter().map(|o| o.id.as_str()).collect();
        }

        let id = available[self.rng.gen_range(0..available.len())].to_string();
        self.history.push(id.clone());
        Some((id, history_reset))
    }
}
