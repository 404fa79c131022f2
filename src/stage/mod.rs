//! The three scenes of the page and everything that moves them.

mod face;
mod landscape;
mod squares;

use std::f32::consts::TAU;

use anyhow::Result;
use glam::{Vec2, Vec3, Vec4};

use crate::assets::{AssetSource, LoadingManager};
use crate::camera::PerspectiveCamera;
use crate::config::PageConfig;
use crate::input::PointerSnapshot;
use crate::particles::seeded_rng;
use crate::picking::{pick, Ray};
use crate::scene::{NodeId, SceneGraph};
use crate::timeline::{
    Animatable, Axis, Channel, ClockAnimator, ColorComponent, Ease, Property, SceneId,
    ScrollAnimator, SectionLayout, StackedLayout, Target,
};

pub use self::face::FaceHandles;
pub use self::landscape::LandscapeHandles;
pub use self::squares::SquaresHandles;

/// Name of the node that spins when clicked.
pub const SPINNING_GEAR: &str = "Gear1";
const GEAR_SPIN_SECONDS: f32 = 1.0;
const CAMERA_EASING: f32 = 0.05;
const STARFIELD_EASING: f32 = 0.1;
const HELIX_SPIN: f32 = 0.001;

/// A scene graph with the camera that draws it and its canvas colour.
#[derive(Debug, Clone)]
pub struct SceneSlot {
    pub graph: SceneGraph,
    pub camera: PerspectiveCamera,
    /// Straight-alpha sRGB clear colour; transparent until animated.
    pub backdrop: Vec4,
}

impl SceneSlot {
    fn new(camera: PerspectiveCamera) -> Self {
        Self {
            graph: SceneGraph::new(),
            camera,
            backdrop: Vec4::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenes {
    pub face: SceneSlot,
    pub squares: SceneSlot,
    pub landscape: SceneSlot,
}

impl Scenes {
    pub fn slot(&self, id: SceneId) -> &SceneSlot {
        match id {
            SceneId::Face => &self.face,
            SceneId::Squares => &self.squares,
            SceneId::Landscape => &self.landscape,
        }
    }

    pub fn slot_mut(&mut self, id: SceneId) -> &mut SceneSlot {
        match id {
            SceneId::Face => &mut self.face,
            SceneId::Squares => &mut self.squares,
            SceneId::Landscape => &mut self.landscape,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneId, &SceneSlot)> {
        SceneId::ALL.into_iter().map(move |id| (id, self.slot(id)))
    }
}

fn axis(v: Vec3, axis: Axis) -> f32 {
    match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
        Axis::Z => v.z,
    }
}

fn axis_mut(v: &mut Vec3, axis: Axis) -> &mut f32 {
    match axis {
        Axis::X => &mut v.x,
        Axis::Y => &mut v.y,
        Axis::Z => &mut v.z,
    }
}

fn component_mut(color: &mut Vec4, component: ColorComponent) -> &mut f32 {
    match component {
        ColorComponent::Red => &mut color.x,
        ColorComponent::Green => &mut color.y,
        ColorComponent::Blue => &mut color.z,
        ColorComponent::Alpha => &mut color.w,
    }
}

impl Scenes {
    fn channel_mut(&mut self, channel: Channel) -> Option<&mut f32> {
        match (channel.target, channel.property) {
            (Target::Node(scene, node), property) => {
                let transform = &mut self.slot_mut(scene).graph.get_mut(node)?.transform;
                match property {
                    Property::Position(a) => Some(axis_mut(&mut transform.position, a)),
                    Property::Rotation(a) => Some(axis_mut(&mut transform.rotation, a)),
                    Property::Scale(a) => Some(axis_mut(&mut transform.scale, a)),
                    Property::Color(_) => None,
                }
            }
            (Target::Camera(scene), property) => {
                let camera = &mut self.slot_mut(scene).camera;
                match property {
                    Property::Position(a) => Some(axis_mut(&mut camera.position, a)),
                    Property::Rotation(a) => Some(axis_mut(&mut camera.rotation, a)),
                    Property::Scale(_) | Property::Color(_) => None,
                }
            }
            (Target::Backdrop(scene), Property::Color(c)) => {
                Some(component_mut(&mut self.slot_mut(scene).backdrop, c))
            }
            (Target::Backdrop(_), _) => None,
        }
    }
}

impl Animatable for Scenes {
    fn read(&self, channel: Channel) -> Option<f32> {
        match (channel.target, channel.property) {
            (Target::Node(scene, node), property) => {
                let transform = &self.slot(scene).graph.get(node)?.transform;
                match property {
                    Property::Position(a) => Some(axis(transform.position, a)),
                    Property::Rotation(a) => Some(axis(transform.rotation, a)),
                    Property::Scale(a) => Some(axis(transform.scale, a)),
                    Property::Color(_) => None,
                }
            }
            (Target::Camera(scene), property) => {
                let camera = &self.slot(scene).camera;
                match property {
                    Property::Position(a) => Some(axis(camera.position, a)),
                    Property::Rotation(a) => Some(axis(camera.rotation, a)),
                    Property::Scale(_) | Property::Color(_) => None,
                }
            }
            (Target::Backdrop(scene), Property::Color(c)) => {
                let color = self.slot(scene).backdrop;
                Some(match c {
                    ColorComponent::Red => color.x,
                    ColorComponent::Green => color.y,
                    ColorComponent::Blue => color.z,
                    ColorComponent::Alpha => color.w,
                })
            }
            (Target::Backdrop(_), _) => None,
        }
    }

    fn write(&mut self, channel: Channel, value: f32) -> bool {
        match self.channel_mut(channel) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Channel helpers used when declaring timelines.
pub(crate) fn node_channel(scene: SceneId, node: NodeId, property: Property) -> Channel {
    Channel::new(Target::Node(scene, node), property)
}

pub(crate) fn camera_channel(scene: SceneId, property: Property) -> Channel {
    Channel::new(Target::Camera(scene), property)
}

/// Section container id for a scene, e.g. `face-section`.
pub fn container_name(scene: SceneId) -> String {
    format!("{}-section", scene.name())
}

/// Stacked page layout with one viewport-tall section per `.section` element.
pub fn page_layout(config: &PageConfig, viewport_height: f32) -> StackedLayout {
    StackedLayout::new(viewport_height.max(1.0))
        .with_container(container_name(SceneId::Face), config.sections.face)
        .with_container(container_name(SceneId::Squares), config.sections.squares)
        .with_container(container_name(SceneId::Landscape), config.sections.landscape)
}

/// Owns the scenes, the handles animation touches and both animators.
#[derive(Debug)]
pub struct Stage {
    scenes: Scenes,
    face: FaceHandles,
    squares: SquaresHandles,
    landscape: LandscapeHandles,
    scroll: ScrollAnimator,
    clock: ClockAnimator,
    elapsed: f32,
}

impl Stage {
    /// Builds all scenes from `source`. Assets that fail to load are left out.
    pub fn build(
        config: &PageConfig,
        source: &dyn AssetSource,
        loader: &mut LoadingManager,
    ) -> Result<Self> {
        let mut rng = seeded_rng(config.starfield.seed);
        let (landscape_slot, landscape) = landscape::build(config, source, loader);
        let (face_slot, face) = face::build(config, source, loader, &mut rng);
        let (squares_slot, squares) = squares::build(config)?;

        let mut stage = Self {
            scenes: Scenes {
                face: face_slot,
                squares: squares_slot,
                landscape: landscape_slot,
            },
            face,
            squares,
            landscape,
            scroll: ScrollAnimator::new(),
            clock: ClockAnimator::new(),
            elapsed: 0.0,
        };
        landscape::animate(&mut stage.scroll, &stage.scenes, &stage.landscape);
        face::animate(&mut stage.scroll, &stage.scenes, &stage.face);
        squares::animate(&mut stage.scroll, &stage.scenes);
        log::info!(
            "stage ready: {} scroll tweens, {} lattice meshes",
            stage.scroll.tweens().len(),
            stage.squares.lattice_meshes
        );
        Ok(stage)
    }

    pub fn scenes(&self) -> &Scenes {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut Scenes {
        &mut self.scenes
    }

    pub fn face(&self) -> &FaceHandles {
        &self.face
    }

    pub fn squares(&self) -> &SquaresHandles {
        &self.squares
    }

    pub fn landscape(&self) -> &LandscapeHandles {
        &self.landscape
    }

    pub fn scroll_animator(&self) -> &ScrollAnimator {
        &self.scroll
    }

    /// Seconds since the stage started, as last passed to `advance`.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        for id in SceneId::ALL {
            self.scenes.slot_mut(id).camera.set_viewport(width, height);
        }
    }

    /// Re-evaluates scroll tweens; returns `false` when the offset is unchanged.
    pub fn apply_scroll(&mut self, scroll: f32, layout: &dyn SectionLayout) -> bool {
        self.scroll.update(scroll, layout, &mut self.scenes)
    }

    /// Forces the next `apply_scroll` to re-apply, e.g. after the layout changed.
    pub fn invalidate_scroll(&mut self) {
        self.scroll.invalidate();
    }

    /// Per-frame procedural motion at `elapsed` seconds.
    pub fn advance(&mut self, elapsed: f32, pointer: &PointerSnapshot) {
        self.elapsed = elapsed;
        let target = pointer.target();

        let face_camera = &mut self.scenes.face.camera;
        face_camera.rotation.x += CAMERA_EASING * (target.y - face_camera.rotation.x);
        face_camera.rotation.y += CAMERA_EASING * (target.x - face_camera.rotation.y);
        let face_rotation = face_camera.rotation;

        let squares_camera = &mut self.scenes.squares.camera;
        squares_camera.rotation.x += CAMERA_EASING * (target.y - squares_camera.rotation.x);
        let squares_z = squares_camera.position.z;
        self.scenes
            .squares
            .graph
            .transform_mut(self.squares.light)
            .position
            .z = squares_z + 150.0;

        let face_graph = &mut self.scenes.face.graph;
        face_graph.transform_mut(self.face.group).position.y = (elapsed / 2.0).cos() / 4.0;
        if let Some(helix) = self.face.helix {
            face_graph.transform_mut(helix).rotation.y -= HELIX_SPIN;
        }
        let stars = &mut face_graph.transform_mut(self.face.starfield).rotation;
        stars.y += STARFIELD_EASING * (target.x - face_rotation.y);
        stars.x += STARFIELD_EASING * (target.y - face_rotation.x);

        self.scenes
            .landscape
            .graph
            .transform_mut(self.landscape.gear_group)
            .position
            .z = elapsed.cos() * 20.0 + 100.0;

        self.clock.update(elapsed, &mut self.scenes);
    }

    /// Handles a click at `ndc` on the landscape canvas; returns the node hit.
    pub fn click(&mut self, ndc: Vec2) -> Option<NodeId> {
        let slot = &self.scenes.landscape;
        let ray = Ray::from_camera(&slot.camera, ndc);
        let hit = pick(&slot.graph, &ray)?;
        let node = slot.graph.node(hit.node);
        log::debug!("clicked {} at distance {:.1}", node.name, hit.distance);
        if node.name == SPINNING_GEAR {
            let channel = node_channel(SceneId::Landscape, hit.node, Property::Rotation(Axis::Z));
            if self.clock.is_animating(channel) {
                return Some(hit.node);
            }
            let to = node.transform.rotation.z + TAU;
            self.clock.start(
                &self.scenes,
                &[(channel, to)],
                self.elapsed,
                0.0,
                GEAR_SPIN_SECONDS,
                Ease::default(),
            );
        }
        Some(hit.node)
    }

    pub fn is_spinning(&self) -> bool {
        !self.clock.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::timeline::SectionRef;

    fn empty_stage() -> Stage {
        let mut config = PageConfig::default();
        config.starfield.count = 100;
        Stage::build(&config, &MemorySource::new(), &mut LoadingManager::new()).unwrap()
    }

    #[test]
    fn builds_without_assets() {
        let mut loader = LoadingManager::new();
        let mut config = PageConfig::default();
        config.starfield.count = 10;
        let stage = Stage::build(&config, &MemorySource::new(), &mut loader).unwrap();
        assert!(loader.is_complete());
        assert_eq!(loader.failed(), loader.total());
        assert_eq!(stage.squares().lattice_meshes, 20 * (12 + 4));
        assert!(stage.face().model.is_none());
        assert!(stage.landscape().car.is_none());
    }

    #[test]
    fn scroll_reaches_final_squares_camera() {
        let mut stage = empty_stage();
        let layout = page_layout(&PageConfig::default(), 800.0);
        assert!(stage.apply_scroll(layout.max_scroll(), &layout));
        let camera = stage.scenes().squares.camera;
        assert_eq!(camera.position, Vec3::new(3.0, 0.0, -60.0));
        assert!((camera.rotation.z - -std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(camera.rotation.x, 0.0);
        assert_eq!(stage.scenes().squares.backdrop.w, 1.0);
    }

    #[test]
    fn scroll_at_top_keeps_initial_pose() {
        let mut stage = empty_stage();
        let layout = page_layout(&PageConfig::default(), 800.0);
        stage.apply_scroll(0.0, &layout);
        let camera = stage.scenes().squares.camera;
        assert_eq!(camera.position, Vec3::new(-3.0, 0.0, 100.0));
        assert_eq!(camera.rotation, Vec3::new(1.0, -2.0, -4.5));
        assert_eq!(stage.scenes().squares.backdrop, Vec4::ZERO);
    }

    fn stage_with_car() -> Stage {
        let mut bin = Vec::new();
        for c in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&c.to_le_bytes());
        }
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "name": "Body", "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": {len} }}],
  "buffers": [{{ "uri": "body.bin", "byteLength": {len} }}]
}}"#,
            len = bin.len()
        );
        let mut source = MemorySource::new();
        source.insert("objects/mercedes/mercedes.glb", json.into_bytes());
        source.insert("objects/mercedes/body.bin", bin);
        let mut config = PageConfig::default();
        config.starfield.count = 100;
        Stage::build(&config, &source, &mut LoadingManager::new()).unwrap()
    }

    #[test]
    fn scrolling_back_to_top_restores_initial_pose() {
        let mut stage = stage_with_car();
        let car = stage.landscape().car.unwrap();
        let gear = stage.landscape().gear_group;
        let layout = page_layout(&PageConfig::default(), 800.0);

        stage.apply_scroll(layout.max_scroll(), &layout);
        let landscape = &stage.scenes().landscape;
        assert_eq!(landscape.graph.node(car).transform.position.x, -1000.0);
        assert_eq!(landscape.camera.position, Vec3::new(0.0, 0.0, 300.0));

        assert!(stage.apply_scroll(0.0, &layout));
        let squares = &stage.scenes().squares;
        assert_eq!(squares.camera.position, Vec3::new(-3.0, 0.0, 100.0));
        assert_eq!(squares.camera.rotation, Vec3::new(1.0, -2.0, -4.5));
        assert_eq!(squares.backdrop, Vec4::ZERO);

        let landscape = &stage.scenes().landscape;
        assert_eq!(landscape.camera.position, Vec3::new(0.0, -1700.0, 2500.0));
        assert_eq!(landscape.camera.rotation.x, std::f32::consts::PI);
        assert_eq!(landscape.graph.node(car).transform.position.x, 5500.0);
        assert_eq!(landscape.graph.node(gear).transform.rotation.z, 0.0);
    }

    #[test]
    fn scrolling_back_between_chained_tweens_keeps_first_target() {
        let mut stage = empty_stage();
        let layout = page_layout(&PageConfig::default(), 800.0);
        stage.apply_scroll(layout.max_scroll(), &layout);

        // the n_4 -> n_5 tween starts here; n_2 -> n_3 has finished
        let n4 = SectionRef::new(container_name(SceneId::Squares), 4);
        let scroll = layout.section_bounds(&n4).unwrap().top - layout.viewport_height();
        stage.apply_scroll(scroll, &layout);
        let camera = stage.scenes().squares.camera;
        assert_eq!(camera.position.x, -3.0);
        assert_eq!(camera.rotation.z, 0.0);
    }

    #[test]
    fn advance_applies_procedural_motion() {
        let mut stage = empty_stage();
        let pointer = PointerSnapshot {
            offset: Vec2::new(1.0, 1.0),
            ndc: Vec2::ZERO,
        };
        stage.advance(0.0, &pointer);
        let light = stage.squares().light;
        let squares = &stage.scenes().squares;
        assert_eq!(squares.graph.node(light).transform.position.z, 250.0);
        // target is zero for a pointer offset of one pixel
        assert!((squares.camera.rotation.x - 0.95).abs() < 1e-6);

        let face = &stage.scenes().face;
        assert_eq!(face.graph.node(stage.face().group).transform.position.y, 0.25);
        let gear = stage.landscape().gear_group;
        let landscape = &stage.scenes().landscape;
        assert_eq!(landscape.graph.node(gear).transform.position.z, 120.0);
    }

    #[test]
    fn mouse_easing_survives_unchanged_scroll() {
        let mut stage = empty_stage();
        let layout = page_layout(&PageConfig::default(), 800.0);
        stage.apply_scroll(layout.max_scroll(), &layout);
        let pointer = PointerSnapshot {
            offset: Vec2::new(1.0, -999.0),
            ndc: Vec2::ZERO,
        };
        stage.advance(0.0, &pointer);
        let eased = stage.scenes().squares.camera.rotation.x;
        assert!(eased > 0.0);
        assert!(!stage.apply_scroll(layout.max_scroll(), &layout));
        assert_eq!(stage.scenes().squares.camera.rotation.x, eased);
    }

    #[test]
    fn resize_updates_every_camera() {
        let mut stage = empty_stage();
        stage.resize(1600, 800);
        for (_, slot) in stage.scenes().iter() {
            assert_eq!(slot.camera.aspect, 2.0);
        }
    }
}
