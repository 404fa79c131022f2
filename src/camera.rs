use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::euler_xyz;

/// Perspective camera with an XYZ Euler orientation, looking down -Z when unrotated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub rotation: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(euler_xyz(self.rotation), self.position)
    }

    pub fn view(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Direction the camera faces in world space.
    pub fn forward(&self) -> Vec3 {
        euler_xyz(self.rotation) * Vec3::NEG_Z
    }
}
