// src/engine.rs - the per-frame context object that owns every animated part of the scene
use serde::Serialize;
use tracing::info;

use crate::animator::{FormationAnimator, ParticlePose};
use crate::camera::{PerspectiveCamera, Projector};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::formation::{FormationGenerator, ParticleCategory};
use crate::gesture::{FormationState, GestureSignal};
use crate::photos::{PhotoPose, PhotoRegistry};
use crate::rotation::RotationController;
use crate::selection::{SelectionController, SelectionEvent};
use crate::snow::SnowField;
use crate::star::{StarPose, TreeStar};

#[derive(Debug, Clone, Serialize)]
pub struct LayerPoses {
    pub category: ParticleCategory,
    #[serde(skip)]
    pub poses: Vec<ParticlePose>,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub elapsed: f32,
    pub formation: FormationState,
    pub rotation: (f32, f32),
    pub layers: Vec<LayerPoses>,
    pub star: StarPose,
    pub photos: Vec<PhotoPose>,
    pub active: Option<String>,
    pub cursor: Option<(f32, f32)>,
    pub event: SelectionEvent,
    pub convergence_error: f32,
}

/// Each field has a single owner: the animator moves particles, the
/// selection controller decides the active photo, the rotation controller
/// turns the group.
pub struct Engine {
    config: EngineConfig,
    state: FormationState,
    animator: FormationAnimator,
    rotation: RotationController,
    star: TreeStar,
    snow: SnowField,
    photos: PhotoRegistry,
    selection: SelectionController,
    camera: PerspectiveCamera,
    elapsed: f32,
    ticks: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let generator = FormationGenerator::new(config.tree, config.layers.clone(), config.seed)?;
        let animator = FormationAnimator::new(generator, &config.animation)?;
        info!(
            "engine ready: {} particles in {} layers",
            animator.particle_count(),
            animator.layers().len()
        );

        Ok(Self {
            state: FormationState::default(),
            animator,
            rotation: RotationController::new(config.rotation.clone()),
            star: TreeStar::new(config.star.clone()),
            snow: SnowField::new(config.snow.clone(), config.seed),
            photos: PhotoRegistry::new(config.photos.clone(), config.seed),
            selection: SelectionController::new(config.selection.clone()),
            camera: PerspectiveCamera::new(&config.camera),
            elapsed: 0.0,
            ticks: 0,
            config,
        })
    }

    /// Advance one frame using the engine's own camera for picking.
    pub fn tick(&mut self, signal: &GestureSignal, dt: f32) -> FrameSnapshot {
        let camera = self.camera.clone();
        self.tick_with(signal, dt, &camera)
    }

    pub fn tick_with<P: Projector>(&mut self, signal: &GestureSignal, dt: f32, projector: &P) -> FrameSnapshot {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.elapsed += dt;
        self.ticks += 1;

        let next = self.state.next(signal);
        if next != self.state {
            info!("formation {} -> {}", self.state, next);
            self.state = next;
        }

        self.rotation.tick(signal, self.state, dt);
        self.animator.tick(self.state, dt);
        self.star.tick(self.state, dt);
        self.snow.tick(self.elapsed, dt);

        let group = self.rotation.group_rotation();
        let pool = self.photos.pool(self.elapsed, &group, self.selection.active());
        let event = self.selection.update(signal, &pool, projector);
        let active = self.selection.active();
        self.photos.tick(self.state, active, &group, &self.camera, dt);

        FrameSnapshot {
            tick: self.ticks,
            elapsed: self.elapsed,
            formation: self.state,
            rotation: self.rotation.angles(),
            layers: self
                .animator
                .layers()
                .iter()
                .map(|layer| LayerPoses {
                    category: layer.category(),
                    poses: layer.poses(self.state, self.elapsed).collect(),
                })
                .collect(),
            star: self.star.pose(self.elapsed),
            photos: self.photos.poses(self.elapsed, &group, active),
            active: active.map(str::to_string),
            cursor: signal.cursor(),
            event,
            convergence_error: self.animator.convergence_error(self.state),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> FormationState {
        self.state
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn animator(&self) -> &FormationAnimator {
        &self.animator
    }

    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }

    pub fn star(&self) -> &TreeStar {
        &self.star
    }

    pub fn snow(&self) -> &SnowField {
        &self.snow
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn photos(&self) -> &PhotoRegistry {
        &self.photos
    }

    /// Adding or clearing photos bumps the pool generation, which the
    /// selection controller notices on the next tick.
    pub fn photos_mut(&mut self) -> &mut PhotoRegistry {
        &mut self.photos
    }

    pub fn set_particle_count(&mut self, category: ParticleCategory, count: usize) -> Result<()> {
        self.animator.set_count(category, count)?;
        info!("regenerated {} with {} particles", category, count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use crate::error::EngineError;
    use crate::gesture::GestureClassifier;
    use crate::source::SimulatedHand;
    use crate::Vec3;
    use std::collections::HashSet;

    struct NoDepth;

    impl Projector for NoDepth {
        fn project(&self, _world: &Vec3) -> Option<Vec3> {
            None
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.camera = CameraConfig {
            aspect: 1.0,
            ..CameraConfig::default()
        };
        config.selection.seed = Some(17);
        config
    }

    fn hand(cursor_x: f32, cursor_y: f32, pinching: bool, fist: bool, open: bool) -> GestureSignal {
        GestureSignal {
            cursor_x,
            cursor_y,
            is_pinching: pinching,
            is_fist: fist,
            is_open: open,
            detected: true,
        }
    }

    fn neutral(pinching: bool) -> GestureSignal {
        hand(0.5, 0.5, pinching, false, false)
    }

    #[test]
    fn test_pinch_on_object_focuses_it_until_release() {
        let mut engine = Engine::new(config()).unwrap();
        let photos = engine.photos_mut();
        photos.insert_at("one", "1.jpg", Vec3::new(-8.0, 0.0, 0.0)).unwrap();
        photos.insert_at("two", "2.jpg", Vec3::new(0.0, 0.0, 0.0)).unwrap();
        photos.insert_at("three", "3.jpg", Vec3::new(8.0, 0.0, 0.0)).unwrap();

        engine.tick(&neutral(false), 0.016);
        let frame = engine.tick(&hand(0.51, 0.5, true, false, false), 0.016);
        match &frame.event {
            SelectionEvent::Picked { id, distance } => {
                assert_eq!(id, "two");
                assert!(*distance < 0.3);
            }
            other => panic!("expected Picked, got {:?}", other),
        }
        assert_eq!(frame.active.as_deref(), Some("two"));
        let flagged: Vec<&str> = frame.photos.iter().filter(|p| p.active).map(|p| p.id.as_str()).collect();
        assert_eq!(flagged, vec!["two"]);

        let frame = engine.tick(&neutral(false), 0.016);
        assert_eq!(frame.event, SelectionEvent::Released { id: "two".to_string() });
        assert_eq!(frame.active, None);
        assert!(frame.photos.iter().all(|p| !p.active));
    }

    #[test]
    fn test_empty_space_pinches_walk_the_pool() {
        let mut engine = Engine::new(config()).unwrap();
        engine.photos_mut().insert("a", "a.jpg").unwrap();
        engine.photos_mut().insert("b", "b.jpg").unwrap();

        let pinch = |engine: &mut Engine| {
            let frame = engine.tick_with(&neutral(true), 0.016, &NoDepth);
            engine.tick_with(&neutral(false), 0.016, &NoDepth);
            frame.event
        };

        let first = pinch(&mut engine);
        assert_eq!(engine.selection().history().len(), 1);
        let second = pinch(&mut engine);
        assert_ne!(first.id(), second.id());

        match pinch(&mut engine) {
            SelectionEvent::RandomPick { id, history_reset } => {
                assert!(history_reset);
                assert!(id == "a" || id == "b");
            }
            other => panic!("expected RandomPick, got {:?}", other),
        }

        // new photos reset what has been shown
        engine.photos_mut().add_photos(["c.jpg"]);
        engine.tick_with(&neutral(false), 0.016, &NoDepth);
        assert!(engine.selection().history().is_empty());
    }

    #[test]
    fn test_formation_follows_open_and_fist() {
        let mut engine = Engine::new(config()).unwrap();
        assert_eq!(engine.state(), FormationState::Tree);

        for _ in 0..5 {
            let frame = engine.tick(&hand(0.5, 0.5, false, false, true), 0.016);
            assert_eq!(frame.formation, FormationState::Explode);
        }
        assert_eq!(engine.tick(&neutral(false), 0.016).formation, FormationState::Explode);

        let mut lost = hand(0.5, 0.5, false, true, false);
        lost.detected = false;
        assert_eq!(engine.tick(&lost, 0.016).formation, FormationState::Explode);

        assert_eq!(engine.tick(&hand(0.5, 0.5, false, true, false), 0.016).formation, FormationState::Tree);
        assert_eq!(engine.tick(&neutral(false), 0.016).formation, FormationState::Tree);
    }

    #[test]
    fn test_explode_converges_and_moves_star() {
        let mut engine = Engine::new(config()).unwrap();
        let open = hand(0.5, 0.5, false, false, true);
        let mut frame = engine.tick(&open, 0.016);
        for _ in 0..600 {
            frame = engine.tick(&open, 0.016);
        }
        assert!(frame.convergence_error < 1e-3);
        assert!(frame.star.position[1].abs() < 1e-2);
        assert_eq!(frame.layers.len(), 4);
        assert_eq!(frame.layers[0].poses.len(), 1500);
    }

    #[test]
    fn test_at_most_one_active_over_a_session() {
        let mut engine = Engine::new(config()).unwrap();
        engine
            .photos_mut()
            .add_photos((0..12).map(|i| format!("photo_{}.jpg", i)));
        let hand = SimulatedHand::new();
        let mut classifier = GestureClassifier::default();

        let mut picked = HashSet::new();
        for step in 0..(60 * 30) {
            let t = step as f32 / 60.0;
            let signal = classifier.classify(hand.frame_at(t).as_ref());
            let frame = engine.tick(&signal, 1.0 / 60.0);

            let active: Vec<&PhotoPose> = frame.photos.iter().filter(|p| p.active).collect();
            assert!(active.len() <= 1);
            assert_eq!(active.first().map(|p| p.id.clone()), frame.active);
            if let Some(id) = frame.active {
                picked.insert(id);
            }
        }
        // the scripted hand pinches once per cycle
        assert!(!picked.is_empty());
    }

    #[test]
    fn test_same_seed_same_scene() {
        let signal = hand(0.5, 0.5, false, false, true);
        let mut a = Engine::new(config()).unwrap();
        let mut b = Engine::new(config()).unwrap();
        let fa = a.tick(&signal, 0.05);
        let fb = b.tick(&signal, 0.05);
        for (la, lb) in fa.layers.iter().zip(fb.layers.iter()) {
            assert_eq!(la.poses, lb.poses);
        }
    }

    #[test]
    fn test_bad_dt_is_a_frozen_frame() {
        let mut engine = Engine::new(config()).unwrap();
        let frame = engine.tick(&hand(0.5, 0.5, false, false, true), f32::NAN);
        assert_eq!(frame.elapsed, 0.0);
        assert_eq!(frame.formation, FormationState::Explode);
        assert_eq!(engine.animator().convergence_error(FormationState::Tree), 0.0);
    }

    #[test]
    fn test_misconfiguration_fails_at_construction() {
        let mut bad = config();
        bad.layers[2].count = 0;
        assert!(matches!(
            Engine::new(bad),
            Err(EngineError::InvalidParticleCount {
                category: ParticleCategory::Ribbon,
                ..
            })
        ));

        let mut engine = Engine::new(config()).unwrap();
        engine.set_particle_count(ParticleCategory::Ornament, 10).unwrap();
        let frame = engine.tick(&neutral(false), 0.016);
        assert_eq!(frame.layers[1].poses.len(), 10);
    }
}
