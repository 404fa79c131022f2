use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec3;

use crate::assets::{AssetError, AssetSource, LoadingManager};
use crate::config::{PageConfig, MANIFEST};
use crate::input::PointerState;
use crate::stage::{container_name, Stage};
use crate::timeline::{SceneId, SectionLayout, StackedLayout};

/// Reads the optional page manifest from `source`, falling back to defaults.
pub fn load_config(source: &dyn AssetSource) -> Result<PageConfig> {
    match source.read_to_string(MANIFEST) {
        Ok(xml) => PageConfig::from_xml(&xml).with_context(|| format!("failed to parse {MANIFEST}")),
        Err(AssetError::NotFound(_)) => Ok(PageConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {MANIFEST}")),
    }
}

/// Stage plus the scroll and pointer state driving it, shared by both entry points.
pub struct Page {
    stage: Stage,
    pointer: Arc<PointerState>,
    scroll: f32,
}

impl Page {
    pub fn new(stage: Stage, pointer: Arc<PointerState>) -> Self {
        Self {
            stage,
            pointer,
            scroll: 0.0,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn pointer(&self) -> &Arc<PointerState> {
        &self.pointer
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    pub fn set_scroll(&mut self, scroll: f32) {
        self.scroll = scroll.max(0.0);
    }

    /// Resizes every camera and re-applies the timelines against the new layout.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pointer.set_viewport(width as f32, height as f32);
        self.stage.resize(width, height);
        self.stage.invalidate_scroll();
    }

    /// Runs one frame: queued clicks, scroll timelines, then procedural motion.
    pub fn frame(&mut self, elapsed: f32, layout: &dyn SectionLayout) {
        for ndc in self.pointer.take_clicks() {
            self.stage.click(ndc);
        }
        self.stage.apply_scroll(self.scroll, layout);
        self.stage.advance(elapsed, &self.pointer.snapshot());
    }
}

/// Scene whose container is under the middle of the viewport.
pub fn visible_scene(layout: &StackedLayout, scroll: f32) -> SceneId {
    let middle = scroll + layout.viewport_height() / 2.0;
    layout
        .container_at(middle)
        .and_then(|name| {
            SceneId::ALL
                .into_iter()
                .find(|id| container_name(*id) == name)
        })
        .unwrap_or(SceneId::Face)
}

pub fn print_load_summary(loader: &LoadingManager) {
    println!(
        "Loaded {} of {} assets ({} failed)",
        loader.loaded() - loader.failed(),
        loader.total(),
        loader.failed()
    );
}

pub fn print_final_state(stage: &Stage) {
    let lattice = &stage.scenes().squares.graph;
    let cubes = lattice.count_by(|node| node.name.starts_with("cube_"));
    let beams = lattice.count_by(|node| node.name.starts_with("beam_"));
    println!("Lattice: {cubes} cubes, {beams} beams");

    println!("Final camera states:");
    for (id, slot) in stage.scenes().iter() {
        let camera = &slot.camera;
        println!(
            " - {} camera pos={} rot={}",
            id.name(),
            format_vec(camera.position),
            format_vec(camera.rotation)
        );
    }
}

fn format_vec(v: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;
    use crate::stage::page_layout;

    #[test]
    fn missing_manifest_uses_defaults() {
        let source = MemorySource::new();
        assert_eq!(load_config(&source).unwrap(), PageConfig::default());
    }

    #[test]
    fn manifest_overrides_sections() {
        let mut source = MemorySource::new();
        source.insert(
            MANIFEST,
            b"<page><sections><face>3</face></sections></page>".to_vec(),
        );
        assert_eq!(load_config(&source).unwrap().sections.face, 3);

        source.insert(MANIFEST, b"<site/>".to_vec());
        assert!(load_config(&source).is_err());
    }

    #[test]
    fn visible_scene_follows_scroll() {
        let layout = page_layout(&PageConfig::default(), 100.0);
        assert_eq!(visible_scene(&layout, 0.0), SceneId::Face);
        assert_eq!(visible_scene(&layout, 500.0), SceneId::Squares);
        assert_eq!(visible_scene(&layout, 1600.0), SceneId::Landscape);
        assert_eq!(visible_scene(&layout, 1e9), SceneId::Landscape);
    }

    #[test]
    fn page_frame_applies_scroll() {
        let config = PageConfig {
            starfield: crate::config::StarfieldConfig {
                count: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut loader = LoadingManager::new();
        let stage = Stage::build(&config, &MemorySource::new(), &mut loader).unwrap();
        let mut page = Page::new(stage, Arc::new(PointerState::new()));
        page.resize(800, 600);
        let layout = page_layout(&config, 600.0);

        page.set_scroll(layout.max_scroll());
        page.frame(0.0, &layout);
        let camera = &page.stage().scenes().squares.camera;
        assert!((camera.position.z + 60.0).abs() < 1e-3);

        page.set_scroll(-5.0);
        assert_eq!(page.scroll(), 0.0);
    }
}
