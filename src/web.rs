#![cfg(target_arch = "wasm32")]

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlCanvasElement, HtmlElement};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::web::{EventLoopExtWebSys, WindowAttributesExtWebSys};
use winit::window::Window;

use crate::app::{load_config, Page};
use crate::assets::{external_buffers, AssetError, LoadingManager, MemorySource};
use crate::config::MANIFEST;
use crate::input::PointerState;
use crate::overlay::{LoaderOverlay, OverlayFrame};
use crate::render::Renderer;
use crate::stage::Stage;
use crate::timeline::{SceneId, SectionBounds, SectionLayout, SectionRef};

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    let _ = wasm_logger::init(wasm_logger::Config::default());
}

/// Downloads the page's assets from `asset_root` and starts drawing into the scene containers.
#[wasm_bindgen]
pub async fn run(asset_root: String) -> Result<(), JsValue> {
    start(asset_root)
        .await
        .map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

async fn start(root: String) -> Result<()> {
    let window = web_sys::window().context("missing window")?;
    let document = window.document().context("missing document")?;

    let mut canvases = Vec::new();
    for scene in SceneId::ALL {
        canvases.push((scene, attach_canvas(&document, scene)?));
    }
    let overlay_dom = OverlayDom::find(&document);
    if overlay_dom.is_none() {
        log::warn!("no #loader element, loading progress is not shown");
    }
    let mut overlay = LoaderOverlay::new(overlay_dom.as_ref().map_or(0, |dom| dom.bars.len()));

    let mut source = MemorySource::new();
    match fetch_bytes(&root, MANIFEST).await {
        Ok(bytes) => source.insert(MANIFEST, bytes),
        Err(AssetError::NotFound(_)) => {}
        Err(err) => log::warn!("ignoring page manifest: {err}"),
    }
    let config = load_config(&source)?;

    let mut downloads = LoadingManager::new();
    let mut queue: VecDeque<String> = config.assets.all().into_iter().map(str::to_string).collect();
    for path in &queue {
        downloads.begin(path);
    }
    while let Some(path) = queue.pop_front() {
        let outcome = fetch_bytes(&root, &path).await;
        if let (Ok(bytes), true) = (&outcome, path.ends_with(".gltf")) {
            match external_buffers(&path, bytes) {
                Ok(buffers) => {
                    for buffer in buffers {
                        downloads.begin(&buffer);
                        queue.push_back(buffer);
                    }
                }
                Err(err) => log::warn!("cannot list buffers of {path}: {err}"),
            }
        }
        if let Some(bytes) = downloads.finish(&path, outcome) {
            source.insert(path, bytes);
        }
        let now = now_seconds(&window);
        overlay.apply(&downloads.drain_events(), now);
        if let Some(dom) = &overlay_dom {
            dom.show(&overlay.frame(now));
        }
    }
    overlay.complete(now_seconds(&window));

    let mut decoding = LoadingManager::new();
    let stage = Stage::build(&config, &source, &mut decoding).context("failed to build the page")?;
    let pointer = Arc::new(PointerState::new());
    let mut page = Page::new(stage, Arc::clone(&pointer));

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let (width, height) = viewport_size(&window);
    let mut views = Vec::new();
    for (scene, canvas) in canvases {
        #[allow(deprecated)]
        let scene_window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_canvas(Some(canvas))
                    .with_inner_size(LogicalSize::new(width, height)),
            )
            .map_err(|err| anyhow!("failed to create the {} window: {err}", scene.name()))?;
        let renderer = Renderer::new(Arc::new(scene_window))
            .await
            .with_context(|| format!("failed to set up the {} renderer", scene.name()))?;
        views.push(SceneView { scene, renderer });
    }
    if let Some(view) = views.first() {
        let size = view.renderer.size();
        page.resize(size.width, size.height);
    }

    let started = now_seconds(&window);
    let mut app = WebState {
        layout: DomLayout {
            window: window.clone(),
            document,
        },
        window,
        views,
        page,
        overlay: overlay_dom.map(|dom| (dom, overlay)),
        started,
    };

    #[allow(deprecated)]
    event_loop.spawn(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, elwt) {
            log::error!("stopping render loop: {err:#}");
            elwt.exit();
        }
    });
    Ok(())
}

/// Appends a canvas to `#<scene>-canvas`.
fn attach_canvas(document: &Document, scene: SceneId) -> Result<HtmlCanvasElement> {
    let id = format!("{}-canvas", scene.name());
    let container = document
        .get_element_by_id(&id)
        .with_context(|| format!("missing #{id} container"))?;
    let canvas: HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|err| anyhow!("failed to create canvas: {err:?}"))?
        .dyn_into()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    container
        .append_child(&canvas)
        .map_err(|err| anyhow!("failed to attach canvas to #{id}: {err:?}"))?;
    Ok(canvas)
}

async fn fetch_bytes(root: &str, path: &str) -> Result<Vec<u8>, AssetError> {
    let failed = |message: String| AssetError::Io {
        path: path.to_string(),
        source: std::io::Error::other(message),
    };
    let window = web_sys::window().ok_or_else(|| failed("missing window".into()))?;
    let url = format!("{}/{}", root.trim_end_matches('/'), path);

    let response = JsFuture::from(window.fetch_with_str(&url))
        .await
        .map_err(|err| failed(format!("{err:?}")))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| failed("fetch did not return a response".into()))?;
    if response.status() == 404 {
        return Err(AssetError::NotFound(path.to_string()));
    }
    if !response.ok() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    let buffer = response
        .array_buffer()
        .map_err(|err| failed(format!("{err:?}")))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|err| failed(format!("{err:?}")))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

fn now_seconds(window: &web_sys::Window) -> f32 {
    window
        .performance()
        .map_or(0.0, |performance| (performance.now() / 1000.0) as f32)
}

fn viewport_size(window: &web_sys::Window) -> (f64, f64) {
    let dimension = |value: Result<JsValue, JsValue>| {
        value.ok().and_then(|v| v.as_f64()).unwrap_or(1.0).max(1.0)
    };
    (dimension(window.inner_width()), dimension(window.inner_height()))
}

/// Section geometry read from the live document.
struct DomLayout {
    window: web_sys::Window,
    document: Document,
}

impl SectionLayout for DomLayout {
    fn section_bounds(&self, section: &SectionRef) -> Option<SectionBounds> {
        let element = self.document.query_selector(&section.selector()).ok()??;
        let rect = element.get_bounding_client_rect();
        let scroll = self.window.scroll_y().unwrap_or(0.0);
        Some(SectionBounds {
            top: (rect.top() + scroll) as f32,
            height: rect.height() as f32,
        })
    }

    fn viewport_height(&self) -> f32 {
        viewport_size(&self.window).1 as f32
    }
}

/// `#loader`, its `.counter__percent` and `.loader__bar` children.
struct OverlayDom {
    loader: HtmlElement,
    counter: Option<HtmlElement>,
    bars: Vec<(HtmlElement, f64)>,
}

impl OverlayDom {
    fn find(document: &Document) -> Option<Self> {
        let loader = document.get_element_by_id("loader")?.dyn_into().ok()?;
        let counter = document
            .query_selector(".counter__percent")
            .ok()
            .flatten()
            .and_then(|element| element.dyn_into().ok());
        let mut bars = Vec::new();
        if let Ok(list) = document.query_selector_all(".loader__bar") {
            for index in 0..list.length() {
                if let Some(bar) = list.item(index).and_then(|node| node.dyn_into::<HtmlElement>().ok()) {
                    let height = bar.offset_height() as f64;
                    bars.push((bar, height));
                }
            }
        }
        Some(Self {
            loader,
            counter,
            bars,
        })
    }

    fn show(&self, frame: &OverlayFrame) {
        set_style(&self.loader, "z-index", &frame.z_index.to_string());
        if let Some(counter) = &self.counter {
            counter.set_text_content(Some(&frame.percent.to_string()));
            set_style(counter, "opacity", &frame.counter_opacity.to_string());
        }
        for ((bar, initial), height) in self.bars.iter().zip(&frame.bar_heights) {
            set_style(bar, "height", &format!("{}px", initial * *height as f64));
        }
    }
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    if let Err(err) = element.style().set_property(property, value) {
        log::debug!("failed to set {property} on the loader: {err:?}");
    }
}

struct SceneView {
    scene: SceneId,
    renderer: Renderer,
}

struct WebState {
    window: web_sys::Window,
    layout: DomLayout,
    views: Vec<SceneView>,
    page: Page,
    overlay: Option<(OverlayDom, LoaderOverlay)>,
    started: f32,
}

impl WebState {
    fn process_event(&mut self, event: &Event<()>, _elwt: &ActiveEventLoop) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } => {
                let Some(index) = self
                    .views
                    .iter()
                    .position(|view| view.renderer.window_id() == *window_id)
                else {
                    return Ok(());
                };
                match event {
                    WindowEvent::Resized(size) => {
                        self.views[index].renderer.resize(*size);
                        self.page.resize(size.width, size.height);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let position = Vec2::new(position.x as f32, position.y as f32);
                        self.page.pointer().set_position(position);
                    }
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } if self.views[index].scene == SceneId::Landscape => {
                        self.page.pointer().click();
                    }
                    WindowEvent::RedrawRequested => {
                        let elapsed = self.page.stage().elapsed();
                        let view = &mut self.views[index];
                        let slot = self.page.stage().scenes().slot(view.scene);
                        view.renderer.draw(view.scene, slot, elapsed)?;
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = now_seconds(&self.window);
                self.page
                    .set_scroll(self.window.scroll_y().unwrap_or(0.0) as f32);
                self.page.frame(now - self.started, &self.layout);
                self.update_overlay(now);
                for view in &self.views {
                    view.renderer.window().request_redraw();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn update_overlay(&mut self, now: f32) {
        let Some((dom, overlay)) = &self.overlay else {
            return;
        };
        dom.show(&overlay.frame(now));
        if overlay.is_finished(now) {
            self.overlay = None;
        }
    }
}
