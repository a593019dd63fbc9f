// src/photos.rs - photo objects hung in the tree, their focus animation and the selectable pool
use nalgebra::Rotation3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use tracing::debug;
use uuid::Uuid;

use crate::camera::PerspectiveCamera;
use crate::error::{EngineError, Result};
use crate::gesture::FormationState;
use crate::smoothing::{approach, approach_vec, lerp_factor};
use crate::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    pub tree_scale: f32,
    pub explode_scale: f32,
    pub speed: f32,
    /// Distance in front of the camera a focused photo settles at
    pub focus_distance: f32,
    pub focus_scale: f32,
    pub focus_speed: f32,
    pub hover_amplitude: f32,
    pub highlight: f32,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            tree_scale: 1.2,
            explode_scale: 1.5,
            speed: 3.0,
            focus_distance: 8.0,
            focus_scale: 4.0,
            focus_speed: 6.0,
            hover_amplitude: 0.1,
            highlight: 0.2,
        }
    }
}

impl PhotoConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed > 0.0 && self.focus_speed > 0.0) {
            return Err(EngineError::InvalidConfig(
                "photo speeds must be positive".to_string(),
            ));
        }
        if !(self.tree_scale > 0.0 && self.explode_scale > 0.0 && self.focus_scale > 0.0) {
            return Err(EngineError::InvalidConfig(
                "photo scales must be positive".to_string(),
            ));
        }
        if !self.hover_amplitude.is_finite() || !self.focus_distance.is_finite() {
            return Err(EngineError::InvalidConfig(
                "photo hover and focus distance must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: String,
    /// Where the image comes from; the engine never opens it
    pub media: String,
    pub tree_position: Vec3,
    pub explode_position: Vec3,
    /// Group-local position, blended every tick
    pub position: Vec3,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoPose {
    pub id: String,
    pub position: [f32; 3],
    pub scale: f32,
    pub active: bool,
    pub highlight: f32,
}

/// What the selection controller sees of a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableObject {
    pub id: String,
    pub tree_position: Vec3,
    pub world_position: Vec3,
    pub is_active: bool,
}

/// Snapshot of every selectable object. `generation` changes whenever
/// photos are added or removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPool {
    pub generation: u64,
    pub objects: Vec<SelectableObject>,
}

impl ObjectPool {
    pub fn contains(&self, id: &str) -> bool {
        self.objects.iter().any(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// 32-bit rolling string hash over UTF-16 code units (`h = h * 31 + c`).
pub fn id_hash(id: &str) -> i32 {
    id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32)
    })
}

/// Explode position of a photo, spread over a sphere shell by its id.
pub fn explode_position_for(id: &str) -> Vec3 {
    let seed = (id_hash(id) as i64).abs();
    let u = (seed % 1000) as f32 / 1000.0;
    let v = ((seed * 13) % 1000) as f32 / 1000.0;
    let theta = TAU * u;
    let phi = (2.0 * v - 1.0).clamp(-1.0, 1.0).acos();
    let r = 18.0 + ((seed * 7) % 10) as f32;
    Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos(),
    )
}

/// Tree placement, kept close to the trunk.
fn tree_position(rng: &mut StdRng) -> Vec3 {
    let y = -7.0 + rng.gen::<f32>() * 12.0;
    let t = (y + 7.0) / 12.0;
    let r = ((1.0 - t) * 6.5 + 2.5) * 0.75;
    let theta = rng.gen::<f32>() * PI * 2.0;
    Vec3::new(r * theta.cos(), y, r * theta.sin())
}

pub struct PhotoRegistry {
    config: PhotoConfig,
    photos: Vec<Photo>,
    generation: u64,
    rng: StdRng,
}

impl PhotoRegistry {
    pub fn new(config: PhotoConfig, seed: u64) -> Self {
        Self {
            config,
            photos: Vec::new(),
            generation: 0,
            rng: StdRng::seed_from_u64(seed ^ 0x5048_4F54),
        }
    }

    pub fn config(&self) -> &PhotoConfig {
        &self.config
    }

    /// Register media under fresh ids. Returns the new ids in input order.
    pub fn add_photos<I, S>(&mut self, media: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = Vec::new();
        for item in media {
            let id = Uuid::new_v4().to_string();
            let position = tree_position(&mut self.rng);
            self.push(id.clone(), item.into(), position);
            ids.push(id);
        }
        if !ids.is_empty() {
            self.generation += 1;
            debug!("added {} photos, pool generation {}", ids.len(), self.generation);
        }
        ids
    }

    /// Register one photo under a caller-chosen id.
    pub fn insert(&mut self, id: impl Into<String>, media: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(EngineError::DuplicateObject(id));
        }
        let position = tree_position(&mut self.rng);
        self.push(id, media.into(), position);
        self.generation += 1;
        Ok(())
    }

    /// Same as [`insert`](Self::insert) with an explicit tree position.
    pub fn insert_at(&mut self, id: impl Into<String>, media: impl Into<String>, tree_position: Vec3) -> Result<()> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(EngineError::DuplicateObject(id));
        }
        self.push(id, media.into(), tree_position);
        self.generation += 1;
        Ok(())
    }

    fn push(&mut self, id: String, media: String, tree_position: Vec3) {
        let explode_position = explode_position_for(&id);
        self.photos.push(Photo {
            id,
            media,
            tree_position,
            explode_position,
            position: tree_position,
            scale: self.config.tree_scale,
        });
    }

    pub fn clear(&mut self) {
        self.photos.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn get(&self, id: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Blend every photo toward its target. The focused photo heads for a
    /// spot in front of the camera, expressed in group-local space so the
    /// group rotation puts it back where the camera sees it.
    pub fn tick(
        &mut self,
        state: FormationState,
        active: Option<&str>,
        rotation: &Rotation3<f32>,
        camera: &PerspectiveCamera,
        dt: f32,
    ) {
        let focus_world = camera.position() + camera.forward() * self.config.focus_distance;
        let focus_local = rotation.inverse() * focus_world;

        for photo in &mut self.photos {
            let (target, target_scale, speed) = if active == Some(photo.id.as_str()) {
                (focus_local, self.config.focus_scale, self.config.focus_speed)
            } else if state.is_exploded() {
                (photo.explode_position, self.config.explode_scale, self.config.speed)
            } else {
                (photo.tree_position, self.config.tree_scale, self.config.speed)
            };
            let factor = lerp_factor(dt, speed);
            approach_vec(&mut photo.position, &target, factor);
            photo.scale = approach(photo.scale, target_scale, factor);
        }
    }

    pub fn poses(&self, elapsed: f32, rotation: &Rotation3<f32>, active: Option<&str>) -> Vec<PhotoPose> {
        let pulse = 1.0 + (elapsed * 2.0).sin() * 0.05;
        self.photos
            .iter()
            .map(|photo| {
                let is_active = active == Some(photo.id.as_str());
                PhotoPose {
                    id: photo.id.clone(),
                    position: (rotation * self.hovered_position(photo, elapsed, is_active)).into(),
                    scale: photo.scale,
                    active: is_active,
                    highlight: if is_active { self.config.highlight * pulse } else { 0.0 },
                }
            })
            .collect()
    }

    /// Picking candidates, placed where `poses` draws them at `elapsed`.
    pub fn pool(&self, elapsed: f32, rotation: &Rotation3<f32>, active: Option<&str>) -> ObjectPool {
        ObjectPool {
            generation: self.generation,
            objects: self
                .photos
                .iter()
                .map(|photo| {
                    let is_active = active == Some(photo.id.as_str());
                    SelectableObject {
                        id: photo.id.clone(),
                        tree_position: photo.tree_position,
                        world_position: rotation * self.hovered_position(photo, elapsed, is_active),
                        is_active,
                    }
                })
                .collect(),
        }
    }

    // hover is an output offset only, the focused photo holds still
    fn hovered_position(&self, photo: &Photo, elapsed: f32, is_active: bool) -> Vec3 {
        let mut local = photo.position;
        if !is_active {
            local.y += (elapsed + photo.tree_position.x).sin() * self.config.hover_amplitude;
        }
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PhotoRegistry {
        PhotoRegistry::new(PhotoConfig::default(), 42)
    }

    #[test]
    fn test_id_hash_matches_java_style_hash() {
        assert_eq!(id_hash(""), 0);
        assert_eq!(id_hash("a"), 97);
        assert_eq!(id_hash("ab"), 97 * 31 + 98);
        // overflows wrap like a 32-bit integer
        assert_eq!(id_hash("hello world"), 1_794_106_052);
        assert_eq!(id_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_explode_position_from_id() {
        // seed 97: u = 0.097, v = 0.261, r = 18 + 9
        let p = explode_position_for("a");
        assert!((p.norm() - 27.0).abs() < 1e-3);
        assert!((p.z - 27.0 * (2.0 * 0.261 - 1.0)).abs() < 1e-3);
        assert_eq!(explode_position_for("a"), explode_position_for("a"));

        let extreme = explode_position_for("polygenelubricants");
        assert!(extreme.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_tree_placement_hugs_trunk() {
        let mut photos = registry();
        photos.add_photos((0..200).map(|i| format!("photo_{}.jpg", i)));
        for photo in photos.photos() {
            let p = photo.tree_position;
            assert!(p.y >= -7.0 && p.y <= 5.0);
            let t = (p.y + 7.0) / 12.0;
            let expected = ((1.0 - t) * 6.5 + 2.5) * 0.75;
            assert!(((p.x * p.x + p.z * p.z).sqrt() - expected).abs() < 1e-3);
            assert!(Uuid::parse_str(&photo.id).is_ok());
        }
    }

    #[test]
    fn test_generation_tracks_pool_changes() {
        let mut photos = registry();
        assert_eq!(photos.generation(), 0);
        photos.add_photos(["a.jpg", "b.jpg"]);
        assert_eq!(photos.generation(), 1);
        photos.add_photos(Vec::<String>::new());
        assert_eq!(photos.generation(), 1);
        photos.insert("fixed", "c.jpg").unwrap();
        assert_eq!(photos.generation(), 2);
        photos.clear();
        assert_eq!(photos.generation(), 3);
        assert!(photos.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut photos = registry();
        photos.insert("a", "a.jpg").unwrap();
        match photos.insert("a", "other.jpg") {
            Err(EngineError::DuplicateObject(id)) => assert_eq!(id, "a"),
            other => panic!("expected DuplicateObject, got {:?}", other),
        }
        assert_eq!(photos.len(), 1);
    }

    #[test]
    fn test_active_photo_flies_to_camera() {
        let mut photos = registry();
        photos.insert_at("a", "a.jpg", Vec3::new(3.0, 0.0, 0.0)).unwrap();
        photos.insert_at("b", "b.jpg", Vec3::new(-3.0, 0.0, 0.0)).unwrap();
        let camera = PerspectiveCamera::default();
        let rotation = Rotation3::from_axis_angle(&Vec3::y_axis(), 0.7);

        for _ in 0..100 {
            photos.tick(FormationState::Tree, Some("a"), &rotation, &camera, 0.05);
        }
        let a = photos.get("a").unwrap();
        // in world space it sits 8 units in front of the eye
        let world = rotation * a.position;
        assert!((world - Vec3::new(0.0, 0.0, 27.0)).norm() < 1e-3);
        assert!((a.scale - 4.0).abs() < 1e-3);

        let b = photos.get("b").unwrap();
        assert!((b.position - Vec3::new(-3.0, 0.0, 0.0)).norm() < 1e-5);
        assert!((b.scale - 1.2).abs() < 1e-5);

        photos.tick(FormationState::Explode, None, &rotation, &camera, 10.0);
        let a = photos.get("a").unwrap();
        assert!((a.position - explode_position_for("a")).norm() < 1e-4);
        assert!((a.scale - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_poses_hover_and_highlight() {
        let mut photos = registry();
        photos.insert_at("a", "a.jpg", Vec3::new(0.0, 1.0, 0.0)).unwrap();
        let identity = Rotation3::identity();
        let half_pi = std::f32::consts::FRAC_PI_2;

        let idle = photos.poses(half_pi, &identity, None);
        assert!((idle[0].position[1] - 1.1).abs() < 1e-5);
        assert_eq!(idle[0].highlight, 0.0);

        let focused = photos.poses(half_pi, &identity, Some("a"));
        assert!((focused[0].position[1] - 1.0).abs() < 1e-5);
        assert!(focused[0].active);
        assert!(focused[0].highlight > 0.19 && focused[0].highlight < 0.22);

        // hover is output only
        assert_eq!(photos.get("a").unwrap().position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_pool_reflects_rotation_and_active_flag() {
        let mut photos = registry();
        photos.insert_at("a", "a.jpg", Vec3::new(1.0, 0.0, 0.0)).unwrap();
        photos.insert_at("b", "b.jpg", Vec3::new(0.0, 2.0, 0.0)).unwrap();
        let rotation = Rotation3::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2);

        let pool = photos.pool(0.0, &rotation, Some("b"));
        assert_eq!(pool.generation, photos.generation());
        assert_eq!(pool.len(), 2);
        assert!((pool.objects[0].world_position - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-5);
        assert_eq!(pool.objects[0].tree_position, Vec3::new(1.0, 0.0, 0.0));
        assert!(!pool.objects[0].is_active);
        assert!(pool.objects[1].is_active);
        assert!(pool.contains("a") && !pool.contains("c"));
    }

    #[test]
    fn test_pool_matches_drawn_position() {
        let mut photos = registry();
        photos.insert_at("a", "a.jpg", Vec3::new(0.0, 1.0, 0.0)).unwrap();
        photos.insert_at("b", "b.jpg", Vec3::new(2.0, -1.0, 0.0)).unwrap();
        let rotation = Rotation3::from_axis_angle(&Vec3::x_axis(), 0.4);
        let elapsed = std::f32::consts::FRAC_PI_2;

        let poses = photos.poses(elapsed, &rotation, Some("b"));
        let pool = photos.pool(elapsed, &rotation, Some("b"));
        for (pose, object) in poses.iter().zip(&pool.objects) {
            assert_eq!(pose.id, object.id);
            assert!((Vec3::from(pose.position) - object.world_position).norm() < 1e-6);
        }
        // the hovering photo is lifted by the full amplitude at this instant
        let lifted = rotation.inverse() * pool.objects[0].world_position;
        assert!((lifted.y - 1.1).abs() < 1e-5);
    }
}
