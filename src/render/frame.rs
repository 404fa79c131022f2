//! CPU-side preparation of one frame: uniforms and draw lists.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::camera::PerspectiveCamera;
use crate::particles::PointStyle;
use crate::scene::{CloudId, LightKind, MeshId, NodeKind, SceneGraph};
use crate::stage::SceneSlot;

pub const MAX_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// Ambient colour pre-multiplied by intensity.
    pub ambient: [f32; 4],
    /// Unit vectors pointing from the scene towards each light.
    pub light_directions: [[f32; 4]; MAX_LIGHTS],
    pub light_colors: [[f32; 4]; MAX_LIGHTS],
    /// `light count, exposure, time, unused`.
    pub params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub color: [f32; 4],
    /// `metalness, roughness, unused, unused`.
    pub surface: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointsConstants {
    pub model: [[f32; 4]; 4],
    pub colors: [[f32; 4]; 3],
    /// `size, gradient flag, unused, unused`.
    pub style: [f32; 4],
}

#[derive(Clone, Copy, Debug)]
pub struct MeshDraw {
    pub mesh: MeshId,
    pub constants: ObjectConstants,
}

#[derive(Clone, Copy, Debug)]
pub struct CloudDraw {
    pub cloud: CloudId,
    pub constants: PointsConstants,
}

/// Everything the GPU needs to draw one scene.
#[derive(Clone, Debug)]
pub struct FrameData {
    pub globals: GlobalUniform,
    pub meshes: Vec<MeshDraw>,
    pub clouds: Vec<CloudDraw>,
    pub clear: wgpu::Color,
}

/// Base size of gradient particles in world units.
const GRADIENT_POINT_SIZE: f32 = 0.05;
const EXPOSURE: f32 = 1.0;
/// Scenes without lights still show their shapes.
const FALLBACK_AMBIENT: f32 = 0.15;

pub fn build_frame(slot: &SceneSlot, time: f32) -> FrameData {
    let graph = &slot.graph;
    let world = graph.world_matrices();
    let mut meshes = Vec::new();
    let mut clouds = Vec::new();

    for id in graph.ids() {
        if !graph.is_visible(id) {
            continue;
        }
        let node = graph.node(id);
        let model = world[id.index()];
        match &node.kind {
            NodeKind::Mesh { mesh, material } => meshes.push(MeshDraw {
                mesh: *mesh,
                constants: ObjectConstants {
                    model: model.to_cols_array_2d(),
                    normal: mat3_to_3x4(Mat3::from_mat4(model).inverse().transpose()),
                    color: material.color.extend(material.opacity).into(),
                    surface: [material.metalness, material.roughness, 0.0, 0.0],
                },
            }),
            NodeKind::Points { cloud } => {
                let (colors, style) = match graph.cloud(*cloud).style {
                    PointStyle::Gradient { colors } => (colors, [GRADIENT_POINT_SIZE, 1.0, 0.0, 0.0]),
                    PointStyle::Flat { color, size } => ([color; 3], [size, 0.0, 0.0, 0.0]),
                };
                clouds.push(CloudDraw {
                    cloud: *cloud,
                    constants: PointsConstants {
                        model: model.to_cols_array_2d(),
                        colors: colors.map(|c| srgb_to_linear(c).extend(1.0).into()),
                        style,
                    },
                });
            }
            NodeKind::Group | NodeKind::Light(_) => {}
        }
    }

    FrameData {
        globals: globals(graph, &world, &slot.camera, time),
        meshes,
        clouds,
        clear: clear_color(slot.backdrop),
    }
}

fn globals(graph: &SceneGraph, world: &[Mat4], camera: &PerspectiveCamera, time: f32) -> GlobalUniform {
    let mut ambient = Vec3::ZERO;
    let mut directions = [[0.0; 4]; MAX_LIGHTS];
    let mut colors = [[0.0; 4]; MAX_LIGHTS];
    let mut count = 0;

    for id in graph.ids() {
        let NodeKind::Light(light) = graph.node(id).kind else {
            continue;
        };
        if !graph.is_visible(id) {
            continue;
        }
        let radiance = srgb_to_linear(light.color) * light.intensity;
        match light.kind {
            LightKind::Ambient => ambient += radiance,
            LightKind::Directional => {
                if count == MAX_LIGHTS {
                    log::debug!("ignoring light {} beyond the first {MAX_LIGHTS}", graph.node(id).name);
                    continue;
                }
                // shines from its position towards the origin
                let position = world[id.index()].w_axis.truncate();
                let direction = if position == Vec3::ZERO {
                    Vec3::Y
                } else {
                    position.normalize()
                };
                directions[count] = direction.extend(0.0).into();
                colors[count] = radiance.extend(1.0).into();
                count += 1;
            }
        }
    }
    if count == 0 && ambient == Vec3::ZERO {
        ambient = Vec3::splat(FALLBACK_AMBIENT);
    }

    GlobalUniform {
        view: camera.view().to_cols_array_2d(),
        proj: camera.projection().to_cols_array_2d(),
        camera_position: camera.position.extend(1.0).into(),
        ambient: ambient.extend(0.0).into(),
        light_directions: directions,
        light_colors: colors,
        params: [count as f32, EXPOSURE, time, 0.0],
    }
}

/// Pre-multiplied linear clear colour for a straight-alpha sRGB backdrop.
pub fn clear_color(backdrop: Vec4) -> wgpu::Color {
    let alpha = backdrop.w.clamp(0.0, 1.0);
    let rgb = srgb_to_linear(backdrop.truncate()) * alpha;
    wgpu::Color {
        r: rgb.x as f64,
        g: rgb.y as f64,
        b: rgb.z as f64,
        a: alpha as f64,
    }
}

pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}
