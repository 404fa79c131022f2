use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_4, PI};

use glam::Vec3;
use rand::rngs::StdRng;

use super::{node_channel, SceneSlot, Scenes};
use crate::assets::{
    decode_texture, load_gltf, load_obj_from_str, parse_mtl, AssetError, AssetSource,
    LoadingManager, Model, MtlLibrary,
};
use crate::camera::PerspectiveCamera;
use crate::config::PageConfig;
use crate::particles::{helix_cloud, starfield};
use crate::scene::{Light, LightKind, NodeId, NodeKind, Transform};
use crate::timeline::{Axis, Ease, Property, SceneId, ScrollAnimator, ScrollTrigger, SectionRef};

const LIGHT_COLOR: u32 = 0xfff0dd;
const HELIX_COLORS: [u32; 3] = [0x0d98ff, 0xaa00cc, 0x0d98ba];
const STAR_COLOR: u32 = 0x515151;
const STAR_EXTENT: f32 = 400.0;
const STAR_DEPTH: f32 = -50.0;
const STAR_SIZE: f32 = 0.15;

#[derive(Debug, Clone)]
pub struct FaceHandles {
    pub group: NodeId,
    pub model: Option<NodeId>,
    pub helix: Option<NodeId>,
    pub starfield: NodeId,
    pub light: NodeId,
}

/// `0xRRGGBB` to an sRGB colour in `0..1`.
pub(crate) fn hex_color(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32,
        ((hex >> 8) & 0xff) as f32,
        (hex & 0xff) as f32,
    ) / 255.0
}

pub(super) fn build(
    config: &PageConfig,
    source: &dyn AssetSource,
    loader: &mut LoadingManager,
    rng: &mut StdRng,
) -> (SceneSlot, FaceHandles) {
    let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
    camera.position.z = 5.0;
    let mut slot = SceneSlot::new(camera);
    let graph = &mut slot.graph;
    let paths = &config.assets;

    let library = loader
        .track(&paths.face_material, || {
            let text = source.read_to_string(&paths.face_material)?;
            parse_mtl(&text).map_err(|err| parse_error(&paths.face_material, err))
        })
        .unwrap_or_else(MtlLibrary::default);
    let face = loader.track(&paths.face_model, || {
        let text = source.read_to_string(&paths.face_model)?;
        let obj = load_obj_from_str(&text).map_err(|err| parse_error(&paths.face_model, err))?;
        Ok(obj.into_model("face", &library))
    });

    let group = graph.add(
        None,
        "faceGroup",
        NodeKind::Group,
        Transform::at(Vec3::new(-1.0, -0.5, 0.0)),
    );
    let model = face.map(|face| {
        let id = face.instantiate(graph, Some(group));
        graph.node_mut(id).transform.rotation = Vec3::new(FRAC_PI_4, -FRAC_PI_2 - 0.4, PI / 5.0);
        id
    });

    let dna: Option<Model> = loader.track(&paths.dna_model, || load_gltf(source, &paths.dna_model));
    let helix = dna.and_then(|dna| {
        let vertices: Vec<Vec3> = dna
            .nodes
            .iter()
            .find_map(|node| node.mesh.as_ref())
            .map(|(mesh, _)| mesh.positions().collect())?;
        let colors = HELIX_COLORS.map(hex_color);
        let cloud = graph.add_cloud(helix_cloud(&vertices, colors, rng));
        Some(graph.add(
            None,
            "dna",
            NodeKind::Points { cloud },
            Transform::at(Vec3::new(4.5, -2.0, -1.0)),
        ))
    });

    // loaded with the starfield but not sampled by it
    let _cross = loader.track(&paths.cross_texture, || {
        let bytes = source.read(&paths.cross_texture)?;
        decode_texture(&paths.cross_texture, &bytes)
    });

    let stars = graph.add_cloud(starfield(
        config.starfield.count,
        STAR_EXTENT,
        STAR_DEPTH,
        hex_color(STAR_COLOR),
        STAR_SIZE,
        rng,
    ));
    let starfield = graph.add(
        None,
        "particles",
        NodeKind::Points { cloud: stars },
        Transform::default(),
    );

    let light = graph.add(
        None,
        "faceLight",
        NodeKind::Light(Light {
            kind: LightKind::Directional,
            color: hex_color(LIGHT_COLOR),
            intensity: 1.0,
        }),
        Transform::at(Vec3::new(0.0, 4.0, 7.0)),
    );

    (
        slot,
        FaceHandles {
            group,
            model,
            helix,
            starfield,
            light,
        },
    )
}

fn parse_error(path: &str, err: anyhow::Error) -> AssetError {
    AssetError::Parse {
        path: path.to_string(),
        message: format!("{err:#}"),
    }
}

fn section(index: u32) -> SectionRef {
    SectionRef::new(super::container_name(SceneId::Face), index)
}

pub(super) fn animate(scroll: &mut ScrollAnimator, scenes: &Scenes, handles: &FaceHandles) {
    let Some(model) = handles.model else {
        return;
    };
    let channel = |property| node_channel(SceneId::Face, model, property);
    scroll
        .to(
            scenes,
            &[
                (channel(Property::Rotation(Axis::Y)), FRAC_PI_2),
                (channel(Property::Rotation(Axis::X)), -FRAC_PI_3),
            ],
            ScrollTrigger::between(section(1), section(5)),
            Ease::default(),
        )
        .to(
            scenes,
            &[
                (channel(Property::Position(Axis::Z)), -2.0),
                (channel(Property::Position(Axis::Y)), -2.0),
                (channel(Property::Position(Axis::X)), -3.0),
            ],
            ScrollTrigger::between(section(1), section(3)),
            Ease::default(),
        );
}
