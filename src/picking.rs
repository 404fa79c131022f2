//! Ray casting against mesh bounds.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::mesh::Aabb;
use crate::scene::{NodeId, NodeKind, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray through `ndc` (`-1..1`, `+y` up) from the camera's near plane.
    pub fn from_camera(camera: &PerspectiveCamera, ndc: Vec2) -> Self {
        let inverse = camera.view_proj().inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Self {
            origin: near,
            direction: (far - near).normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Distance to the first intersection with `bounds`, if any lies ahead.
    pub fn intersect_aabb(&self, bounds: &Aabb) -> Option<f32> {
        let mut near = f32::NEG_INFINITY;
        let mut far = f32::INFINITY;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let direction = self.direction[axis];
            let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
            if direction.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - origin) / direction;
            let t2 = (hi - origin) / direction;
            near = near.max(t1.min(t2));
            far = far.min(t1.max(t2));
        }
        if near > far || far < 0.0 {
            return None;
        }
        Some(near.max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
}

/// Nearest visible mesh whose world bounds the ray crosses.
pub fn pick(graph: &SceneGraph, ray: &Ray) -> Option<Hit> {
    let world = graph.world_matrices();
    graph
        .ids()
        .filter(|id| matches!(graph.node(*id).kind, NodeKind::Mesh { .. }))
        .filter(|id| graph.is_visible(*id))
        .filter_map(|id| {
            let bounds = graph.world_bounds(id, world[id.index()])?;
            let distance = ray.intersect_aabb(&bounds)?;
            Some(Hit { node: id, distance })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshData;
    use crate::scene::{Material, Transform};

    fn graph_with_boxes() -> SceneGraph {
        let mut graph = SceneGraph::new();
        for (name, z) in [("far", -20.0), ("near", -10.0)] {
            let mesh = graph.add_mesh(MeshData::cuboid(2.0, 2.0, 2.0));
            graph.add(
                None,
                name,
                NodeKind::Mesh {
                    mesh,
                    material: Material::default(),
                },
                Transform::at(Vec3::new(0.0, 0.0, z)),
            );
        }
        graph
    }

    #[test]
    fn centre_ray_points_forward() {
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        let ray = Ray::from_camera(&camera, Vec2::ZERO);
        assert!(ray.direction.abs_diff_eq(Vec3::NEG_Z, 1e-4));
        assert!((ray.origin.z - -0.1).abs() < 1e-4);
    }

    #[test]
    fn picks_nearest_box() {
        let graph = graph_with_boxes();
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        let hit = pick(&graph, &Ray::from_camera(&camera, Vec2::ZERO)).unwrap();
        assert_eq!(graph.node(hit.node).name, "near");
        assert!((hit.distance - 8.9).abs() < 1e-3);
    }

    #[test]
    fn misses_hidden_and_offscreen_boxes() {
        let mut graph = graph_with_boxes();
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        let ray = Ray::from_camera(&camera, Vec2::new(0.9, 0.9));
        assert!(pick(&graph, &ray).is_none());

        let near = graph.find("near").unwrap();
        graph.node_mut(near).visible = false;
        let hit = pick(&graph, &Ray::from_camera(&camera, Vec2::ZERO)).unwrap();
        assert_eq!(graph.node(hit.node).name, "far");
    }
}
