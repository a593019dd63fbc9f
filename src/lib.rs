//! gesture_tree - gesture-driven particle formation engine
//!
//! A hand-landmark feed is classified into fist / open / pinch signals that
//! drive a few thousand particles between a cone ("tree") and a sphere
//! ("explode"), rotate the scene, and pick photo objects out of it.
//!
//! Everything is advanced through [`engine::Engine::tick`]; the landmark feed
//! runs on its own tokio task (see [`source`]).

pub mod animator;
pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod formation;
pub mod gesture;
pub mod landmarks;
pub mod photos;
pub mod rotation;
pub mod selection;
pub mod smoothing;
pub mod snow;
pub mod source;
pub mod star;
pub mod telemetry;

pub type Vec3 = nalgebra::Vector3<f32>;

pub use config::EngineConfig;
pub use engine::{Engine, FrameSnapshot};
pub use error::{EngineError, Result};
pub use formation::{FormationGenerator, ParticleCategory};
pub use gesture::{FormationState, GestureClassifier, GestureSignal};
pub use landmarks::{Landmark, LandmarkFrame};
pub use selection::{SelectionController, SelectionEvent};
pub use source::{GestureFeed, LandmarkSource, SimulatedHand};
