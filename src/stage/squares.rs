use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use anyhow::{Context, Result};
use glam::Vec3;

use super::face::hex_color;
use super::{camera_channel, SceneSlot, Scenes};
use crate::camera::PerspectiveCamera;
use crate::config::PageConfig;
use crate::lattice::LatticeConfig;
use crate::mesh::MeshData;
use crate::scene::{Light, LightKind, Material, NodeId, NodeKind, SceneGraph, Transform};
use crate::timeline::{
    Axis, Channel, ColorComponent, Ease, Property, SceneId, ScrollAnimator, ScrollTrigger,
    SectionRef, Target,
};

const LIGHT_COLOR: u32 = 0xfff0dd;
const LIGHT_INTENSITY: f32 = 700.0;
const BACKDROP: u32 = 0x0f5193;

#[derive(Debug, Clone)]
pub struct SquaresHandles {
    pub lattice: NodeId,
    pub light: NodeId,
    /// Cubes plus beams placed under `lattice`.
    pub lattice_meshes: usize,
}

pub(super) fn build(config: &PageConfig) -> Result<(SceneSlot, SquaresHandles)> {
    let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
    camera.position = Vec3::new(-3.0, 0.0, 100.0);
    camera.rotation = Vec3::new(1.0, -2.0, -4.5);
    let mut slot = SceneSlot::new(camera);
    let graph = &mut slot.graph;

    let light = graph.add(
        None,
        "squaresLight",
        NodeKind::Light(Light {
            kind: LightKind::Directional,
            color: hex_color(LIGHT_COLOR),
            intensity: LIGHT_INTENSITY,
        }),
        Transform::at(Vec3::new(0.0, 0.0, 100.0))
            .with_rotation(Vec3::new(FRAC_PI_4, 0.0, 0.0))
            .with_scale(Vec3::splat(10.0)),
    );
    graph.node_mut(light).cast_shadow = true;

    let lattice = graph.add_group(None, "lattice");
    let lattice_meshes =
        place_lattice(graph, lattice, &config.lattice).context("failed to lay out the lattice")?;

    Ok((
        slot,
        SquaresHandles {
            lattice,
            light,
            lattice_meshes,
        },
    ))
}

/// Adds one cube per lattice position and one bar per beam under `parent`.
pub fn place_lattice(
    graph: &mut SceneGraph,
    parent: NodeId,
    lattice: &LatticeConfig,
) -> Result<usize, crate::lattice::LatticeError> {
    let size = lattice.square_size;
    let cube = graph.add_mesh(MeshData::cuboid(size, size, size));
    let material = Material::metallic();
    let mut placed = 0;

    for row in lattice.rows() {
        let row = row?;
        for (i, position) in row.cube_positions().into_iter().enumerate() {
            let id = graph.add(
                Some(parent),
                format!("cube_{}_{i}", row.index),
                NodeKind::Mesh {
                    mesh: cube,
                    material,
                },
                Transform::at(position),
            );
            graph.set_shadows(id, true, true);
            placed += 1;
        }
        for (i, beam) in row.beams.iter().enumerate() {
            let mesh = graph.add_mesh(MeshData::cuboid(beam.width, beam.height, beam.depth));
            let id = graph.add(
                Some(parent),
                format!("beam_{}_{i}", row.index),
                NodeKind::Mesh { mesh, material },
                Transform::at(beam.coords).with_rotation(beam.rotation),
            );
            graph.set_shadows(id, true, true);
            placed += 1;
        }
    }
    Ok(placed)
}

fn section(index: u32) -> SectionRef {
    SectionRef::new(super::container_name(SceneId::Squares), index)
}

fn between(start: u32, end: u32) -> ScrollTrigger {
    ScrollTrigger::between(section(start), section(end))
}

pub(super) fn animate(scroll: &mut ScrollAnimator, scenes: &Scenes) {
    let position = |axis| camera_channel(SceneId::Squares, Property::Position(axis));
    let rotation = |axis| camera_channel(SceneId::Squares, Property::Rotation(axis));
    let backdrop = |component| {
        Channel::new(
            Target::Backdrop(SceneId::Squares),
            Property::Color(component),
        )
    };
    let color = hex_color(BACKDROP);
    let ease = Ease::default();

    scroll
        .to(
            scenes,
            &[
                (rotation(Axis::X), 0.0),
                (rotation(Axis::Y), 0.0),
                (rotation(Axis::Z), 0.0),
            ],
            between(1, 3),
            ease,
        )
        .to(scenes, &[(position(Axis::Z), -60.0)], between(1, 10), ease)
        .to(scenes, &[(position(Axis::X), -3.0)], between(2, 3), ease)
        .to(scenes, &[(position(Axis::X), 3.0)], between(4, 5), ease)
        .to(scenes, &[(rotation(Axis::Z), -FRAC_PI_2)], between(4, 8), ease)
        .to(
            scenes,
            &[
                (backdrop(ColorComponent::Red), color.x),
                (backdrop(ColorComponent::Green), color.y),
                (backdrop(ColorComponent::Blue), color.z),
                (backdrop(ColorComponent::Alpha), 1.0),
            ],
            between(9, 10),
            ease,
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_meshes_share_rows() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group(None, "lattice");
        let config = LatticeConfig {
            row_count: 2,
            ..LatticeConfig::default()
        };
        assert_eq!(place_lattice(&mut graph, root, &config).unwrap(), 32);

        let beam = graph.find("beam_1_1").unwrap();
        let node = graph.node(beam);
        assert_eq!(node.transform.position, Vec3::new(-6.0, 0.0, -6.0));
        assert_eq!(node.transform.rotation.z, FRAC_PI_2);
        assert!(node.cast_shadow && node.receive_shadow);

        let cube = graph.find("cube_0_5").unwrap();
        assert_eq!(graph.node(cube).transform.position, Vec3::new(-6.0, 0.0, -3.0));
    }

    #[test]
    fn empty_rows_fail() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group(None, "lattice");
        let config = LatticeConfig {
            long_row_length: 0,
            ..LatticeConfig::default()
        };
        assert!(place_lattice(&mut graph, root, &config).is_err());
    }
}
