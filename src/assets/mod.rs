//! Asset sources, decoders and load-progress tracking.

mod gltf_import;
mod obj;
mod texture;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use thiserror::Error;

use crate::mesh::MeshData;
use crate::scene::{Material, NodeId, NodeKind, SceneGraph, Transform};

pub use self::gltf_import::{external_buffers, load_gltf};
pub use self::obj::{load_obj_from_str, parse_mtl, MtlLibrary, ObjModel, ObjPart};
pub use self::texture::{decode_texture, Texture};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` was not found")]
    NotFound(String),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{path}` is not valid UTF-8")]
    Encoding { path: String },
    #[error("failed to parse `{path}`: {message}")]
    Parse { path: String, message: String },
    #[error("invalid glTF `{path}`: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to decode image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("`{path}` uses unsupported feature: {feature}")]
    Unsupported { path: String, feature: String },
}

/// Byte provider for asset paths relative to the page root.
pub trait AssetSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError>;

    fn read_to_string(&self, path: &str) -> Result<String, AssetError> {
        String::from_utf8(self.read(path)?).map_err(|_| AssetError::Encoding {
            path: path.to_string(),
        })
    }
}

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.root.join(path.trim_start_matches('/'));
        std::fs::read(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(path.to_string())
            } else {
                AssetError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }
}

/// Assets already resident in memory, e.g. fetched by the browser.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files
            .insert(normalize(&path.into()), Arc::from(bytes.into_boxed_slice()));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(&normalize(path))
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Resolves `relative` against the directory holding `base`.
pub fn sibling_path(base: &str, relative: &str) -> String {
    match base.rfind('/') {
        Some(slash) => format!("{}/{}", &base[..slash], relative),
        None => relative.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Started { url: String, total: usize },
    Progress { url: String, loaded: usize, total: usize },
    Failed { url: String, message: String },
    Completed,
}

/// Tracks requested and finished loads and records progress events.
#[derive(Debug, Default)]
pub struct LoadingManager {
    total: usize,
    loaded: usize,
    failed: usize,
    events: Vec<LoadEvent>,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, url: &str) {
        self.total += 1;
        log::info!("started loading: {url}");
        self.events.push(LoadEvent::Started {
            url: url.to_string(),
            total: self.total,
        });
    }

    /// Records the outcome of a load started with `begin`.
    pub fn finish<T>(&mut self, url: &str, outcome: Result<T, AssetError>) -> Option<T> {
        self.loaded += 1;
        let value = match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                self.failed += 1;
                log::warn!("failed to load {url}: {err}");
                self.events.push(LoadEvent::Failed {
                    url: url.to_string(),
                    message: err.to_string(),
                });
                None
            }
        };
        log::info!("loaded {} of {}: {url}", self.loaded, self.total);
        self.events.push(LoadEvent::Progress {
            url: url.to_string(),
            loaded: self.loaded,
            total: self.total,
        });
        if self.is_complete() {
            log::info!("loaded all resources");
            self.events.push(LoadEvent::Completed);
        }
        value
    }

    /// Convenience wrapper running `load` between `begin` and `finish`.
    pub fn track<T>(&mut self, url: &str, load: impl FnOnce() -> Result<T, AssetError>) -> Option<T> {
        self.begin(url);
        let outcome = load();
        self.finish(url, outcome)
    }

    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (self.loaded as f32 / self.total as f32 * 100.0).round() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn events(&self) -> &[LoadEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LoadEvent> {
        std::mem::take(&mut self.events)
    }
}

/// One node of a decoded model, with its parent given as an index into the list.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub parent: Option<usize>,
    pub transform: Transform,
    pub mesh: Option<(MeshData, Material)>,
}

/// Decoded model hierarchy ready to be attached to a scene graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub name: String,
    pub nodes: Vec<ModelNode>,
}

impl Model {
    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.mesh.is_some()).count()
    }

    /// World-space vertex positions of every mesh, ignoring the model root.
    pub fn vertex_positions(&self) -> Vec<Vec3> {
        let mut world = Vec::with_capacity(self.nodes.len());
        let mut out = Vec::new();
        for node in &self.nodes {
            let local = node.transform.matrix();
            let matrix = match node.parent {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(matrix);
            if let Some((mesh, _)) = &node.mesh {
                out.extend(mesh.positions().map(|p| matrix.transform_point3(p)));
            }
        }
        out
    }

    /// Adds the model under a new group named after it and returns that group.
    pub fn instantiate(&self, graph: &mut SceneGraph, parent: Option<NodeId>) -> NodeId {
        let root = graph.add_group(parent, self.name.clone());
        let mut ids: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let parent = node.parent.map(|index| ids[index]).unwrap_or(root);
            let kind = match &node.mesh {
                Some((mesh, material)) => NodeKind::Mesh {
                    mesh: graph.add_mesh(mesh.clone()),
                    material: *material,
                },
                None => NodeKind::Group,
            };
            ids.push(graph.add(Some(parent), node.name.clone(), kind, node.transform));
        }
        root
    }
}
