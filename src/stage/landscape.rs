use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::Vec3;

use super::{camera_channel, node_channel, SceneSlot, Scenes};
use crate::assets::{decode_texture, load_gltf, AssetSource, LoadingManager};
use crate::camera::PerspectiveCamera;
use crate::config::PageConfig;
use crate::mesh::MeshData;
use crate::scene::{Light, LightKind, Material, NodeId, NodeKind, Transform};
use crate::timeline::{Axis, Ease, Property, SceneId, ScrollAnimator, ScrollTrigger, SectionRef};

const CAR_POSITION: Vec3 = Vec3::new(5500.0, 1000.0, 2.0);
const CAR_SCALE: f32 = 100.0;
const GEAR_POSITION: Vec3 = Vec3::new(-400.0, 100.0, 3.0);
const GEAR_SCALE: f32 = 20.0;
const GROUND_SIZE: (f32, f32) = (20_000.0, 5_000.0);
const SUN_POSITION: Vec3 = Vec3::new(0.0, 7500.0, 500.0);

#[derive(Debug, Clone)]
pub struct LandscapeHandles {
    pub car: Option<NodeId>,
    pub gear: Option<NodeId>,
    pub gear_group: NodeId,
    pub ground: NodeId,
    pub sun: NodeId,
}

pub(super) fn build(
    config: &PageConfig,
    source: &dyn AssetSource,
    loader: &mut LoadingManager,
) -> (SceneSlot, LandscapeHandles) {
    let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 10_000.0);
    camera.position = Vec3::new(0.0, -1700.0, 2500.0);
    camera.rotation.x = PI;
    let mut slot = SceneSlot::new(camera);
    let graph = &mut slot.graph;
    let paths = &config.assets;

    let car = loader
        .track(&paths.car_model, || load_gltf(source, &paths.car_model))
        .map(|model| {
            let id = model.instantiate(graph, None);
            *graph.transform_mut(id) = Transform::at(CAR_POSITION)
                .with_rotation(Vec3::new(FRAC_PI_2, -FRAC_PI_2, 0.0))
                .with_scale(Vec3::splat(CAR_SCALE));
            graph.set_shadows(id, true, true);
            id
        });

    let gear_group = graph.add(
        None,
        "gearGroup",
        NodeKind::Group,
        Transform::at(GEAR_POSITION),
    );
    let gear = loader
        .track(&paths.gear_model, || load_gltf(source, &paths.gear_model))
        .map(|model| {
            let id = model.instantiate(graph, Some(gear_group));
            *graph.transform_mut(id) = Transform::default()
                .with_rotation(Vec3::new(FRAC_PI_2, -FRAC_PI_4, 0.0))
                .with_scale(Vec3::splat(GEAR_SCALE));
            graph.set_shadows(id, true, false);
            graph.node_mut(id).receive_shadow = true;
            id
        });

    graph.add(
        None,
        "ambient",
        NodeKind::Light(Light {
            kind: LightKind::Ambient,
            color: Vec3::ONE,
            intensity: 2.0,
        }),
        Transform::default(),
    );
    let sun = graph.add(
        None,
        "sun",
        NodeKind::Light(Light {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            intensity: 0.8,
        }),
        Transform::at(SUN_POSITION),
    );
    graph.node_mut(sun).cast_shadow = true;

    let tint = loader
        .track(&paths.ground_texture, || {
            let bytes = source.read(&paths.ground_texture)?;
            decode_texture(&paths.ground_texture, &bytes)
        })
        .map(|texture| texture.average_color)
        .unwrap_or(Vec3::ONE);
    let plane = graph.add_mesh(MeshData::plane(GROUND_SIZE.0, GROUND_SIZE.1));
    let ground = graph.add(
        None,
        "ground",
        NodeKind::Mesh {
            mesh: plane,
            material: Material {
                color: tint,
                ..Material::default()
            },
        },
        Transform::at(Vec3::new(0.0, 1000.0, 0.0)),
    );
    graph.set_shadows(ground, true, true);

    (
        slot,
        LandscapeHandles {
            car,
            gear,
            gear_group,
            ground,
            sun,
        },
    )
}

fn between(start: u32, end: u32) -> ScrollTrigger {
    let container = super::container_name(SceneId::Landscape);
    ScrollTrigger::between(
        SectionRef::new(container.clone(), start),
        SectionRef::new(container, end),
    )
}

pub(super) fn animate(scroll: &mut ScrollAnimator, scenes: &Scenes, handles: &LandscapeHandles) {
    let ease = Ease::default();
    if let Some(car) = handles.car {
        let channel = node_channel(SceneId::Landscape, car, Property::Position(Axis::X));
        scroll.to(scenes, &[(channel, -1000.0)], between(3, 10), ease);
    }
    let gear_spin = node_channel(
        SceneId::Landscape,
        handles.gear_group,
        Property::Rotation(Axis::Z),
    );
    scroll.to(scenes, &[(gear_spin, FRAC_PI_2)], between(3, 10), ease);

    let position = |axis| camera_channel(SceneId::Landscape, Property::Position(axis));
    let rotation = |axis| camera_channel(SceneId::Landscape, Property::Rotation(axis));
    scroll
        .to(scenes, &[(rotation(Axis::X), FRAC_PI_2)], between(1, 3), ease)
        .to(scenes, &[(position(Axis::Z), 300.0)], between(1, 3), ease)
        .to(scenes, &[(position(Axis::Y), 0.0)], between(3, 8), ease)
        .to(scenes, &[(rotation(Axis::X), FRAC_PI_2)], between(4, 8), ease);
}
