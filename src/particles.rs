//! Point clouds for the face scene: the DNA helix and the background starfield.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mesh::Aabb;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointStyle {
    /// Three-colour gradient picked per point by `color_randoms`, additively blended.
    Gradient { colors: [Vec3; 3] },
    Flat { color: Vec3, size: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    pub randoms: Vec<f32>,
    pub color_randoms: Vec<f32>,
    pub style: PointStyle,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Interleaved `position.xyz, random, color_random` floats for the GPU.
    pub fn interleaved(&self) -> Vec<f32> {
        self.positions
            .iter()
            .zip(self.randoms.iter().zip(&self.color_randoms))
            .flat_map(|(p, (r, c))| [p.x, p.y, p.z, *r, *c])
            .collect()
    }
}

/// Builds the gradient cloud from model vertices, recentred on their bounding box.
pub fn helix_cloud(vertices: &[Vec3], colors: [Vec3; 3], rng: &mut StdRng) -> PointCloud {
    let offset = Aabb::from_points(vertices.iter().copied())
        .map(|bounds| bounds.center())
        .unwrap_or(Vec3::ZERO);
    let positions: Vec<Vec3> = vertices.iter().map(|v| *v - offset).collect();
    let randoms = (0..positions.len()).map(|_| rng.random::<f32>()).collect();
    let color_randoms = (0..positions.len()).map(|_| rng.random::<f32>()).collect();
    PointCloud {
        positions,
        randoms,
        color_randoms,
        style: PointStyle::Gradient { colors },
    }
}

/// Flat plane of points scattered over `extent` x `extent` at depth `z`.
pub fn starfield(count: usize, extent: f32, z: f32, color: Vec3, size: f32, rng: &mut StdRng) -> PointCloud {
    let positions = (0..count)
        .map(|_| {
            Vec3::new(
                (rng.random::<f32>() - 0.5) * extent,
                (rng.random::<f32>() - 0.5) * extent,
                z,
            )
        })
        .collect();
    PointCloud {
        positions,
        randoms: vec![0.0; count],
        color_randoms: vec![0.0; count],
        style: PointStyle::Flat { color, size },
    }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helix_is_recentred() {
        let vertices = [Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 4.0, 2.0)];
        let cloud = helix_cloud(&vertices, [Vec3::ONE; 3], &mut seeded_rng(7));
        assert_eq!(cloud.positions[0], Vec3::new(-5.0, -2.0, -1.0));
        assert_eq!(cloud.positions[1], Vec3::new(5.0, 2.0, 1.0));
        assert!(cloud.randoms.iter().all(|r| (0.0..1.0).contains(r)));
        assert_eq!(cloud.interleaved().len(), 10);
    }

    #[test]
    fn starfield_stays_inside_extent() {
        let cloud = starfield(1000, 400.0, -50.0, Vec3::splat(0.3), 0.15, &mut seeded_rng(1));
        assert_eq!(cloud.len(), 1000);
        assert!(cloud
            .positions
            .iter()
            .all(|p| p.x >= -200.0 && p.x < 200.0 && p.y >= -200.0 && p.y < 200.0 && p.z == -50.0));
    }
}
