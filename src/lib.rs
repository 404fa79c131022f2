//! Scroll-driven 3D portfolio page: a face scene, a lattice of squares and a
//! landscape, each animated by the page's scroll offset.
//!
//! Scene construction, timelines, asset decoding and picking are plain data
//! and run headless; the renderer and the native and web entry points drive
//! them from a winit event loop.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod input;
pub mod lattice;
pub mod mesh;
pub mod overlay;
pub mod particles;
pub mod picking;
pub mod render;
pub mod scene;
pub mod stage;
pub mod timeline;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use assets::{AssetError, AssetSource, DirSource, LoadingManager, MemorySource};
pub use camera::PerspectiveCamera;
pub use config::PageConfig;
pub use input::PointerState;
pub use lattice::{LatticeConfig, LatticeError, RowLayout};
pub use render::Renderer;
pub use scene::{NodeId, SceneGraph};
pub use stage::{page_layout, Stage};
pub use timeline::{SceneId, StackedLayout};
