use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::Window;

use portfolio_stage::app::{load_config, print_final_state, print_load_summary, visible_scene, Page};
use portfolio_stage::{
    page_layout, DirSource, LoadingManager, PageConfig, PointerState, Renderer, Stage,
    StackedLayout,
};

const WINDOW_SIZE: (u32, u32) = (1280, 720);
/// Pixels scrolled per wheel notch.
const LINE_HEIGHT: f32 = 100.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let source = DirSource::new(&options.path);
    let config = load_config(&source)?;

    let mut loader = LoadingManager::new();
    let stage = Stage::build(&config, &source, &mut loader).context("failed to build the page")?;
    print_load_summary(&loader);
    let page = Page::new(stage, Arc::new(PointerState::new()));

    if options.summary_only {
        return run_headless(page, &config, options.scroll);
    }
    match open_window() {
        Ok((event_loop, window)) => run_interactive(event_loop, window, page, &config, options.scroll),
        Err(err) => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(page, &config, options.scroll)
        }
    }
}

/// Applies the timelines at one scroll offset and prints the resulting state.
fn run_headless(mut page: Page, config: &PageConfig, scroll: Option<f32>) -> Result<()> {
    let (width, height) = WINDOW_SIZE;
    let layout = page_layout(config, height as f32);
    page.resize(width, height);
    // without --scroll the page is shown fully scrolled
    let scroll = scroll.unwrap_or(layout.max_scroll()).min(layout.max_scroll());
    page.set_scroll(scroll);
    page.frame(0.0, &layout);
    println!("Scroll offset: {:.0} of {:.0}", page.scroll(), layout.max_scroll());
    print_final_state(page.stage());
    Ok(())
}

fn open_window() -> Result<(EventLoop<()>, Arc<Window>), WindowInitError> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    #[allow(deprecated)]
    let window = event_loop
        .create_window(
            Window::default_attributes()
                .with_title("Portfolio Stage")
                .with_inner_size(LogicalSize::new(WINDOW_SIZE.0 as f64, WINDOW_SIZE.1 as f64)),
        )
        .map_err(|err| WindowInitError::from_error("window", err))?;
    Ok((event_loop, Arc::new(window)))
}

fn run_interactive(
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    mut page: Page,
    config: &PageConfig,
    scroll: Option<f32>,
) -> Result<()> {
    let renderer = block_on(Renderer::new(Arc::clone(&window)))?;
    let size = renderer.size();
    page.resize(size.width, size.height);
    let layout = page_layout(config, size.height as f32);
    page.set_scroll(scroll.unwrap_or(0.0).min(layout.max_scroll()));

    let mut app = AppState {
        renderer,
        page,
        layout,
        config: config.clone(),
        started: Instant::now(),
        last_error: None,
    };

    #[allow(deprecated)]
    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            if let Err(err) = app.process_event(&event, elwt) {
                app.last_error = Some(err);
                elwt.exit();
            }
        })
        .context("event loop failed")?;

    print_final_state(app.page.stage());
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    renderer: Renderer,
    page: Page,
    layout: StackedLayout,
    config: PageConfig,
    started: Instant,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &ActiveEventLoop) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => self.resize(size.width, size.height),
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = self.renderer.window().inner_size();
                        self.resize(size.width, size.height);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let position = Vec2::new(position.x as f32, position.y as f32);
                        self.page.pointer().set_position(position);
                    }
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => self.page.pointer().click(),
                    WindowEvent::MouseWheel { delta, .. } => {
                        let pixels = match delta {
                            MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT,
                            MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                        };
                        let scroll = (self.page.scroll() + pixels).min(self.layout.max_scroll());
                        self.page.set_scroll(scroll);
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::AboutToWait => self.renderer.window().request_redraw(),
            Event::LoopExiting => info!("closing at scroll offset {:.0}", self.page.scroll()),
            _ => {}
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(winit::dpi::PhysicalSize::new(width, height));
        self.page.resize(width, height);
        self.layout = page_layout(&self.config, height as f32);
        let scroll = self.page.scroll().min(self.layout.max_scroll());
        self.page.set_scroll(scroll);
    }

    fn redraw(&mut self) -> Result<()> {
        let elapsed = self.started.elapsed().as_secs_f32();
        self.page.frame(elapsed, &self.layout);
        // the window shows whichever scene the page has scrolled to
        let scene = visible_scene(&self.layout, self.page.scroll());
        let slot = self.page.stage().scenes().slot(scene);
        self.renderer.draw(scene, slot, elapsed)
    }
}

struct CliOptions {
    path: String,
    summary_only: bool,
    scroll: Option<f32>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::from_args(env::args().skip(1))
    }

    fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: portfolio-stage <asset-dir> [--summary-only] [--scroll <px>]"
            ));
        };
        let mut summary_only = false;
        let mut scroll = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--scroll" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--scroll expects a pixel offset"))?;
                    let pixels: f32 = value
                        .parse()
                        .with_context(|| format!("invalid scroll offset `{value}`"))?;
                    if !pixels.is_finite() || pixels < 0.0 {
                        return Err(anyhow!("scroll offset must be a non-negative number"));
                    }
                    scroll = Some(pixels);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only or --scroll <px>"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            summary_only,
            scroll,
        })
    }
}
