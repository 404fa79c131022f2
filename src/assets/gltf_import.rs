use glam::{EulerRot, Quat, Vec3};
use gltf::buffer::Source;
use gltf::mesh::Mode;
use gltf::Gltf;

use super::{sibling_path, AssetError, AssetSource, Model, ModelNode};
use crate::mesh::MeshData;
use crate::scene::{Material, Transform};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Loads a `.gltf` or `.glb` file, resolving external buffers next to it.
pub fn load_gltf(source: &dyn AssetSource, path: &str) -> Result<Model, AssetError> {
    let bytes = source.read(path)?;
    let gltf = Gltf::from_slice(&bytes).map_err(|source| AssetError::Gltf {
        path: path.to_string(),
        source,
    })?;
    if gltf.extensions_required().any(|ext| ext == DRACO_EXTENSION) {
        return Err(unsupported(path, DRACO_EXTENSION));
    }

    let buffers = gltf
        .buffers()
        .map(|buffer| match buffer.source() {
            Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| unsupported(path, "missing binary chunk")),
            Source::Uri(uri) if uri.starts_with("data:") => {
                Err(unsupported(path, "data URI buffers"))
            }
            Source::Uri(uri) => source.read(&sibling_path(path, uri)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| unsupported(path, "file without scenes"))?;

    let mut import = Importer {
        path,
        buffers: &buffers,
        nodes: Vec::new(),
    };
    for node in scene.nodes() {
        import.visit(node, None)?;
    }

    Ok(Model {
        name: model_name(path),
        nodes: import.nodes,
    })
}

/// Paths of the external buffer files a `.gltf` document refers to.
pub fn external_buffers(path: &str, bytes: &[u8]) -> Result<Vec<String>, AssetError> {
    let gltf = Gltf::from_slice(bytes).map_err(|source| AssetError::Gltf {
        path: path.to_string(),
        source,
    })?;
    Ok(gltf
        .buffers()
        .filter_map(|buffer| match buffer.source() {
            Source::Uri(uri) if !uri.starts_with("data:") => Some(sibling_path(path, uri)),
            _ => None,
        })
        .collect())
}

struct Importer<'a> {
    path: &'a str,
    buffers: &'a [Vec<u8>],
    nodes: Vec<ModelNode>,
}

impl Importer<'_> {
    fn visit(&mut self, node: gltf::Node<'_>, parent: Option<usize>) -> Result<(), AssetError> {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));
        let (translation, rotation, scale) = node.transform().decomposed();
        let (rx, ry, rz) = Quat::from_array(rotation).to_euler(EulerRot::XYZ);
        let transform = Transform {
            position: Vec3::from_array(translation),
            rotation: Vec3::new(rx, ry, rz),
            scale: Vec3::from_array(scale),
        };

        let mut primitives = match node.mesh() {
            Some(mesh) => mesh
                .primitives()
                .filter(|primitive| primitive.mode() == Mode::Triangles)
                .map(|primitive| self.primitive(&primitive))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        }
        .into_iter();

        let index = self.nodes.len();
        self.nodes.push(ModelNode {
            name: name.clone(),
            parent,
            transform,
            mesh: primitives.next(),
        });
        for (extra, mesh) in primitives.enumerate() {
            self.nodes.push(ModelNode {
                name: format!("{name}_{}", extra + 1),
                parent: Some(index),
                transform: Transform::default(),
                mesh: Some(mesh),
            });
        }
        for child in node.children() {
            self.visit(child, Some(index))?;
        }
        Ok(())
    }

    fn primitive(
        &self,
        primitive: &gltf::Primitive<'_>,
    ) -> Result<(MeshData, Material), AssetError> {
        let reader = primitive.reader(|buffer| self.buffers.get(buffer.index()).map(Vec::as_slice));
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| unsupported(self.path, "primitive without positions"))?
            .collect();
        let normals: Vec<[f32; 3]> = reader
            .read_normals()
            .map(|normals| normals.collect())
            .unwrap_or_default();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let mut mesh = MeshData {
            vertices: Vec::with_capacity(positions.len() * 6),
            indices,
        };
        for (i, p) in positions.iter().enumerate() {
            let n = normals.get(i).copied().unwrap_or([0.0; 3]);
            mesh.vertices.extend_from_slice(&[p[0], p[1], p[2], n[0], n[1], n[2]]);
        }
        if mesh.needs_normals() {
            mesh.compute_normals();
        }

        let pbr = primitive.material().pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let material = Material {
            color: Vec3::new(r, g, b),
            metalness: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            opacity: a,
        };
        Ok((mesh, material))
    }
}

fn unsupported(path: &str, feature: &str) -> AssetError {
    AssetError::Unsupported {
        path: path.to_string(),
        feature: feature.to_string(),
    }
}

fn model_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.split('.').next().unwrap_or(file).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemorySource;

    fn triangle_gltf() -> (String, Vec<u8>) {
        let mut bin = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "Root", "translation": [0, 0, 5], "children": [1] }},
    {{ "name": "Gear1", "mesh": 0 }}
  ],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0, 0, 0], "max": [1, 1, 0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": {len} }}],
  "buffers": [{{ "uri": "gear.bin", "byteLength": {len} }}]
}}"#,
            len = bin.len()
        );
        (json, bin)
    }

    #[test]
    fn loads_hierarchy_with_external_buffer() {
        let (json, bin) = triangle_gltf();
        let mut source = MemorySource::new();
        source.insert("objects/gear/gear.gltf", json.into_bytes());
        source.insert("objects/gear/gear.bin", bin);

        let model = load_gltf(&source, "objects/gear/gear.gltf").unwrap();
        assert_eq!(model.name, "gear");
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.nodes[0].transform.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(model.nodes[1].parent, Some(0));
        let (mesh, _) = model.nodes[1].mesh.as_ref().unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(model.vertex_positions()[1], Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn missing_buffer_is_reported() {
        let (json, _) = triangle_gltf();
        let mut source = MemorySource::new();
        source.insert("gear.gltf", json.into_bytes());
        assert!(matches!(
            load_gltf(&source, "gear.gltf"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn lists_sibling_buffers() {
        let (json, _) = triangle_gltf();
        let buffers = external_buffers("objects/gear/gear.gltf", json.as_bytes()).unwrap();
        assert_eq!(buffers, vec!["objects/gear/gear.bin".to_string()]);
    }

    #[test]
    fn garbage_is_a_gltf_error() {
        let mut source = MemorySource::new();
        source.insert("car.glb", b"not a model".to_vec());
        assert!(matches!(
            load_gltf(&source, "car.glb"),
            Err(AssetError::Gltf { .. })
        ));
    }
}
