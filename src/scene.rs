use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::mesh::{Aabb, MeshData};
use crate::particles::PointCloud;

/// Position, XYZ Euler rotation (radians) and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn quat(&self) -> Quat {
        euler_xyz(self.rotation)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

/// Rotation applying X, then Y, then Z about the local axes.
pub fn euler_xyz(rotation: Vec3) -> Quat {
    Quat::from_rotation_x(rotation.x)
        * Quat::from_rotation_y(rotation.y)
        * Quat::from_rotation_z(rotation.z)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshId(usize);

impl MeshId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloudId(usize);

impl CloudId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Surface parameters for lit meshes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            metalness: 0.0,
            roughness: 1.0,
            opacity: 1.0,
        }
    }
}

impl Material {
    pub fn metallic() -> Self {
        Self {
            metalness: 1.0,
            roughness: 0.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Ambient,
    /// Shines from the node's world position toward the origin.
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh { mesh: MeshId, material: Material },
    Points { cloud: CloudId },
    Light(Light),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub visible: bool,
}

/// Arena-backed scene graph owning its nodes, meshes and point clouds.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    meshes: Vec<MeshData>,
    clouds: Vec<PointCloud>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_cloud(&mut self, cloud: PointCloud) -> CloudId {
        self.clouds.push(cloud);
        CloudId(self.clouds.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> &MeshData {
        &self.meshes[id.0]
    }

    pub fn cloud(&self, id: CloudId) -> &PointCloud {
        &self.clouds[id.0]
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &MeshData)> {
        self.meshes.iter().enumerate().map(|(i, m)| (MeshId(i), m))
    }

    /// Adds a node under `parent`, or at the root when `parent` is `None`.
    pub fn add(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        kind: NodeKind,
        transform: Transform,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            kind,
            transform,
            parent,
            children: Vec::new(),
            cast_shadow: false,
            receive_shadow: false,
            visible: true,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn add_group(&mut self, parent: Option<NodeId>, name: impl Into<String>) -> NodeId {
        self.add(parent, name, NodeKind::Group, Transform::default())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> &mut Transform {
        &mut self.nodes[id.0].transform
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.nodes[id.0].parent.is_none())
    }

    /// Depth-first list of `root` and all of its descendants.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Sets shadow flags on `root` and every mesh below it.
    pub fn set_shadows(&mut self, root: NodeId, cast: bool, receive: bool) {
        for id in self.descendants(root) {
            let node = &mut self.nodes[id.0];
            if id == root || matches!(node.kind, NodeKind::Mesh { .. }) {
                node.cast_shadow = cast;
                node.receive_shadow = receive;
            }
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let node = &self.nodes[id.0];
        let local = node.transform.matrix();
        match node.parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    /// World matrices for every node, indexed by `NodeId::index`.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut out = vec![Mat4::IDENTITY; self.nodes.len()];
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots().map(|id| (id, Mat4::IDENTITY)).collect();
        while let Some((id, parent)) = stack.pop() {
            let node = &self.nodes[id.0];
            let world = parent * node.transform.matrix();
            out[id.0] = world;
            stack.extend(node.children.iter().map(|child| (*child, world)));
        }
        out
    }

    /// True when the node and all of its ancestors are visible.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            if !node.visible {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// World-space bounds of a mesh node.
    pub fn world_bounds(&self, id: NodeId, world: Mat4) -> Option<Aabb> {
        match &self.nodes[id.0].kind {
            NodeKind::Mesh { mesh, .. } => self.meshes[mesh.0].bounds().map(|b| b.transformed(world)),
            _ => None,
        }
    }

    pub fn count_by(&self, predicate: impl Fn(&Node) -> bool) -> usize {
        self.nodes.iter().filter(|node| predicate(node)).count()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn world_matrix_composes_parents() {
        let mut graph = SceneGraph::new();
        let group = graph.add(
            None,
            "group",
            NodeKind::Group,
            Transform::at(Vec3::new(1.0, 0.0, 0.0)),
        );
        let child = graph.add(
            Some(group),
            "child",
            NodeKind::Group,
            Transform::at(Vec3::new(0.0, 2.0, 0.0)),
        );
        let world = graph.world_matrix(child);
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(graph.world_matrices()[child.index()], world);
    }

    #[test]
    fn euler_rotation_applies_z_first_to_points() {
        let transform = Transform::default().with_rotation(Vec3::new(0.0, 0.0, FRAC_PI_2));
        let rotated = transform.matrix().transform_point3(Vec3::X);
        assert!((rotated - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn set_shadows_reaches_nested_meshes() {
        let mut graph = SceneGraph::new();
        let mesh = graph.add_mesh(MeshData::cuboid(1.0, 1.0, 1.0));
        let root = graph.add_group(None, "model");
        let inner = graph.add_group(Some(root), "inner");
        let leaf = graph.add(
            Some(inner),
            "leaf",
            NodeKind::Mesh {
                mesh,
                material: Material::default(),
            },
            Transform::default(),
        );
        graph.set_shadows(root, true, false);
        assert!(graph.node(leaf).cast_shadow);
        assert!(!graph.node(leaf).receive_shadow);
        assert!(graph.node(root).cast_shadow);
        assert!(!graph.node(inner).cast_shadow);
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group(None, "root");
        let child = graph.add_group(Some(root), "child");
        graph.node_mut(root).visible = false;
        assert!(!graph.is_visible(child));
        assert_eq!(graph.find("child"), Some(child));
    }
}
