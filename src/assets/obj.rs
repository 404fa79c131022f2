use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;

use super::{Model, ModelNode};
use crate::mesh::{MeshData, VERTEX_STRIDE};
use crate::scene::{Material, Transform};

/// Materials declared in an MTL file, keyed by `newmtl` name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MtlLibrary {
    pub materials: HashMap<String, Material>,
}

/// Geometry sharing one `usemtl` material.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjPart {
    pub name: String,
    pub material: Option<String>,
    pub mesh: MeshData,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjModel {
    pub material_libraries: Vec<String>,
    pub parts: Vec<ObjPart>,
}

impl ObjModel {
    /// Converts to a flat model, resolving part materials against `library`.
    pub fn into_model(self, name: &str, library: &MtlLibrary) -> Model {
        let nodes = self
            .parts
            .into_iter()
            .map(|part| {
                let material = part
                    .material
                    .as_deref()
                    .and_then(|name| library.materials.get(name))
                    .copied()
                    .unwrap_or_default();
                ModelNode {
                    name: part.name,
                    parent: None,
                    transform: Transform::default(),
                    mesh: Some((part.mesh, material)),
                }
            })
            .collect();
        Model {
            name: name.to_string(),
            nodes,
        }
    }
}

/// Parses an MTL file. Only diffuse colour (`Kd`) and dissolve (`d`/`Tr`) are kept.
pub fn parse_mtl(data: &str) -> Result<MtlLibrary> {
    let mut library = MtlLibrary::default();
    let mut current: Option<String> = None;

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        if tag == "newmtl" {
            let name = parts.collect::<Vec<_>>().join(" ");
            library.materials.insert(name.clone(), Material::default());
            current = Some(name);
            continue;
        }
        let Some(material) = current
            .as_ref()
            .and_then(|name| library.materials.get_mut(name))
        else {
            continue;
        };
        match tag {
            "Kd" => {
                material.color = parse_vec3(parts)
                    .with_context(|| format!("invalid Kd on line {}", line_no + 1))?;
            }
            "d" => material.opacity = parse_scalar(parts, line_no)?,
            "Tr" => material.opacity = 1.0 - parse_scalar(parts, line_no)?,
            "Pm" => material.metalness = parse_scalar(parts, line_no)?,
            "Pr" => material.roughness = parse_scalar(parts, line_no)?,
            _ => {}
        }
    }

    Ok(library)
}

fn parse_scalar<'a>(mut parts: impl Iterator<Item = &'a str>, line_no: usize) -> Result<f32> {
    parts
        .next()
        .ok_or_else(|| anyhow!("missing value on line {}", line_no + 1))?
        .parse::<f32>()
        .with_context(|| format!("invalid number on line {}", line_no + 1))
}

/// Parses an OBJ file from memory, splitting geometry by `o`/`g`/`usemtl`.
pub fn load_obj_from_str(data: &str) -> Result<ObjModel> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut model = ObjModel::default();
    let mut builder = PartBuilder::new("default".to_string(), None);
    let mut object_name = "default".to_string();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                builder
                    .push_polygon(&polygon, &positions, &normals)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
            }
            "mtllib" => model
                .material_libraries
                .extend(parts.map(|name| name.to_string())),
            "o" | "g" => {
                object_name = parts.collect::<Vec<_>>().join(" ");
                let material = builder.material.clone();
                let finished = std::mem::replace(
                    &mut builder,
                    PartBuilder::new(object_name.clone(), material),
                );
                finished.finish_into(&mut model.parts);
            }
            "usemtl" => {
                let material = Some(parts.collect::<Vec<_>>().join(" "));
                let finished = std::mem::replace(
                    &mut builder,
                    PartBuilder::new(object_name.clone(), material),
                );
                finished.finish_into(&mut model.parts);
            }
            _ => {}
        }
    }
    builder.finish_into(&mut model.parts);

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }
    Ok(model)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let _texcoord = segments.next();
        let vn = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        indices.push(FaceIndex { v, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vn: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    normal: Option<usize>,
}

struct PartBuilder {
    name: String,
    material: Option<String>,
    lookup: HashMap<Key, u32>,
    mesh: MeshData,
}

impl PartBuilder {
    fn new(name: String, material: Option<String>) -> Self {
        Self {
            name,
            material,
            lookup: HashMap::new(),
            mesh: MeshData::default(),
        }
    }

    fn push_polygon(
        &mut self,
        polygon: &[FaceIndex],
        positions: &[Vec3],
        normals: &[Vec3],
    ) -> Result<()> {
        // fan triangulation
        for i in 1..(polygon.len() - 1) {
            for corner in [polygon[0], polygon[i], polygon[i + 1]] {
                let index = self.vertex(corner, positions, normals)?;
                self.mesh.indices.push(index);
            }
        }
        Ok(())
    }

    fn vertex(&mut self, corner: FaceIndex, positions: &[Vec3], normals: &[Vec3]) -> Result<u32> {
        let position =
            fix_index(corner.v, positions.len()).ok_or_else(|| anyhow!("invalid vertex index"))?;
        let normal = fix_index(corner.vn, normals.len());
        let key = Key { position, normal };
        let next_index = (self.mesh.vertices.len() / VERTEX_STRIDE) as u32;
        let vertices = &mut self.mesh.vertices;
        Ok(*self.lookup.entry(key).or_insert_with(|| {
            let p = positions[position];
            let n = normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
            vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z]);
            next_index
        }))
    }

    fn finish_into(mut self, parts: &mut Vec<ObjPart>) {
        if self.mesh.indices.is_empty() {
            return;
        }
        if self.mesh.needs_normals() {
            self.mesh.compute_normals();
        }
        parts.push(ObjPart {
            name: self.name,
            material: self.material,
            mesh: self.mesh,
        });
    }
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = (-index) as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}
