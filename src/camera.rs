// src/camera.rs - projection of world points into normalized device coordinates
use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::Vec3;

/// World → NDC. `None` means the point has no usable depth.
pub trait Projector {
    fn project(&self, world: &Vec3) -> Option<Vec3>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 35.0],
            target: [0.0, 0.0, 0.0],
            fov_y_degrees: 45.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(EngineError::InvalidConfig(format!(
                "camera fov must be in (0, 180) degrees, got {}",
                self.fov_y_degrees
            )));
        }
        if !(self.aspect.is_finite() && self.aspect > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "camera aspect must be positive, got {}",
                self.aspect
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(EngineError::InvalidConfig(format!(
                "camera needs 0 < near ({}) < far ({})",
                self.near, self.far
            )));
        }
        if self.eye == self.target {
            return Err(EngineError::InvalidConfig(
                "camera eye and target coincide".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    eye: Point3<f32>,
    forward: Vec3,
    view_projection: Matrix4<f32>,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let eye = Point3::from(config.eye);
        let target = Point3::from(config.target);
        let forward = (target - eye).normalize();
        // looking straight up or down needs a different up vector
        let up = if forward.cross(&Vec3::y()).norm() < 1e-6 {
            Vec3::z()
        } else {
            Vec3::y()
        };

        let view = Isometry3::look_at_rh(&eye, &target, &up);
        let projection = Perspective3::new(
            config.aspect,
            config.fov_y_degrees.to_radians(),
            config.near,
            config.far,
        );

        Self {
            eye,
            forward,
            view_projection: projection.as_matrix() * view.to_homogeneous(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.eye.coords
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(&CameraConfig::default())
    }
}

impl Projector for PerspectiveCamera {
    fn project(&self, world: &Vec3) -> Option<Vec3> {
        let clip = self.view_projection * Vector4::new(world.x, world.y, world.z, 1.0);
        if clip.w.abs() < f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        (ndc.x.is_finite() && ndc.y.is_finite() && ndc.z.is_finite()).then_some(ndc)
    }
}

/// Cursor in image space (0-1, y down) to NDC (-1..1, y up).
pub fn cursor_to_ndc(x: f32, y: f32) -> (f32, f32) {
    (x * 2.0 - 1.0, 1.0 - y * 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_centre() {
        let camera = PerspectiveCamera::default();
        let ndc = camera.project(&Vec3::zeros()).unwrap();
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_screen_axes() {
        let camera = PerspectiveCamera::default();
        let right = camera.project(&Vec3::new(5.0, 0.0, 0.0)).unwrap();
        let up = camera.project(&Vec3::new(0.0, 5.0, 0.0)).unwrap();
        assert!(right.x > 0.0 && right.y.abs() < 1e-5);
        assert!(up.y > 0.0 && up.x.abs() < 1e-5);
    }

    #[test]
    fn test_behind_camera_is_beyond_far_depth() {
        let camera = PerspectiveCamera::default();
        let behind = camera.project(&Vec3::new(0.0, 0.0, 40.0)).unwrap();
        assert!(behind.z >= 1.0);
        // on the eye plane there is no depth at all
        assert!(camera.project(&Vec3::new(1.0, 0.0, 35.0)).is_none());
    }

    #[test]
    fn test_forward_and_position() {
        let camera = PerspectiveCamera::default();
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 35.0));
        assert!((camera.forward() - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_cursor_to_ndc() {
        assert_eq!(cursor_to_ndc(0.5, 0.5), (0.0, 0.0));
        assert_eq!(cursor_to_ndc(1.0, 0.0), (1.0, 1.0));
        assert_eq!(cursor_to_ndc(0.0, 1.0), (-1.0, -1.0));
    }

    #[test]
    fn test_validation() {
        assert!(CameraConfig::default().validate().is_ok());
        let flat = CameraConfig {
            near: 10.0,
            far: 1.0,
            ..CameraConfig::default()
        };
        assert!(flat.validate().is_err());
    }
}
