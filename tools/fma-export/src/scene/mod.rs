//! Scene access
//!
//! The exporter reads scenes only through the [`SceneSource`],
//! [`ObjectSource`] and [`MeshSource`] traits. [`Scene`] is the in-memory
//! implementation, filled by the OBJ adapter in [`obj`] or built directly.
//!
//! Source scenes are Z-up with Y forward; the exporter converts to FMA axes.

pub mod obj;

use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};

pub use obj::{load_obj, parse_mtl, parse_obj};

/// World placement of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    /// Euler angles in radians, XYZ order
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let [rx, ry, rz] = self.rotation;
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            Quat::from_euler(EulerRot::XYZ, rx, ry, rz),
            Vec3::from(self.position),
        )
    }

    pub fn determinant(&self) -> f32 {
        self.matrix().determinant()
    }

    /// Mirrored transforms flip face winding.
    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }
}

/// A face: a run of consecutive loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polygon {
    pub loop_start: usize,
    pub loop_total: usize,
    pub normal: [f32; 3],
}

impl Polygon {
    pub fn loops(&self) -> std::ops::Range<usize> {
        self.loop_start..self.loop_start + self.loop_total
    }
}

/// One corner of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loop {
    /// Index into the mesh's positions
    pub vertex: usize,
    pub normal: [f32; 3],
}

/// Surface description, exported to a `.mtl.fma` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse_color: [f32; 4],
    pub specular_color: [f32; 3],
    pub emission_color: [f32; 3],
    pub specular_exponent: f32,
    pub transparent: bool,
    pub diffuse_texture: Option<String>,
    pub normal_texture: Option<String>,
    pub specular_texture: Option<String>,
    pub emissive_texture: Option<String>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: [0.8, 0.8, 0.8, 1.0],
            specular_color: [0.5, 0.5, 0.5],
            emission_color: [0.0; 3],
            specular_exponent: 2.0,
            transparent: false,
            diffuse_texture: None,
            normal_texture: None,
            specular_texture: None,
            emissive_texture: None,
        }
    }
}

/// Read-only view of a scene.
pub trait SceneSource {
    /// Selected mesh objects, in scene order.
    fn objects(&self) -> Vec<&dyn ObjectSource>;
}

/// Read-only view of a placed object.
pub trait ObjectSource {
    fn name(&self) -> &str;
    fn transform(&self) -> Transform;
    fn mesh(&self) -> &dyn MeshSource;

    fn determinant(&self) -> f32 {
        self.transform().determinant()
    }
}

/// Read-only view of mesh data.
///
/// Meshes are identified by name: objects sharing a mesh return meshes with
/// the same name.
pub trait MeshSource {
    fn name(&self) -> &str;
    fn positions(&self) -> &[[f32; 3]];
    fn polygons(&self) -> &[Polygon];
    fn loops(&self) -> &[Loop];
    fn uv_layer_count(&self) -> usize;
    /// UV of a loop in the active layer, as stored by the source.
    fn loop_uv(&self, loop_index: usize) -> Option<[f32; 2]>;
    fn materials(&self) -> &[Material];
}

/// A UV layer: one coordinate per loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<[f32; 2]>,
}

/// In-memory mesh data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub polygons: Vec<Polygon>,
    pub loops: Vec<Loop>,
    pub uv_layers: Vec<UvLayer>,
    pub active_uv_layer: usize,
    pub materials: Vec<Material>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a face over existing positions.
    ///
    /// `corners` pairs each position index with its loop normal and UV. The
    /// face normal is the Newell normal of the corners.
    pub fn add_face(&mut self, corners: &[(usize, [f32; 3], Option<[f32; 2]>)]) {
        let loop_start = self.loops.len();
        let points: Vec<[f32; 3]> = corners
            .iter()
            .map(|(v, _, _)| self.positions.get(*v).copied().unwrap_or([0.0; 3]))
            .collect();
        let normal = newell_normal(&points);

        let has_uvs = corners.iter().any(|(_, _, uv)| uv.is_some());
        if has_uvs && self.uv_layers.is_empty() {
            self.uv_layers.push(UvLayer {
                name: "UVMap".to_string(),
                uvs: vec![[0.0; 2]; loop_start],
            });
        }

        for (vertex, normal, uv) in corners {
            self.loops.push(Loop {
                vertex: *vertex,
                normal: *normal,
            });
            if let Some(layer) = self.uv_layers.get_mut(self.active_uv_layer) {
                layer.uvs.push(uv.unwrap_or([0.0; 2]));
            }
        }
        self.polygons.push(Polygon {
            loop_start,
            loop_total: corners.len(),
            normal,
        });
    }
}

impl MeshSource for Mesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    fn loops(&self) -> &[Loop] {
        &self.loops
    }

    fn uv_layer_count(&self) -> usize {
        self.uv_layers.len()
    }

    fn loop_uv(&self, loop_index: usize) -> Option<[f32; 2]> {
        self.uv_layers
            .get(self.active_uv_layer)
            .and_then(|layer| layer.uvs.get(loop_index))
            .copied()
    }

    fn materials(&self) -> &[Material] {
        &self.materials
    }
}

/// An object placing a (possibly shared) mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub transform: Transform,
    pub mesh: Arc<Mesh>,
    pub selected: bool,
}

impl Object {
    pub fn new(name: impl Into<String>, mesh: Arc<Mesh>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh,
            selected: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

impl ObjectSource for Object {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn mesh(&self) -> &dyn MeshSource {
        self.mesh.as_ref()
    }
}

/// In-memory scene.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub objects: Vec<Object>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: Object) {
        self.objects.push(object);
    }
}

impl SceneSource for Scene {
    fn objects(&self) -> Vec<&dyn ObjectSource> {
        self.objects
            .iter()
            .filter(|o| o.selected)
            .map(|o| o as &dyn ObjectSource)
            .collect()
    }
}

/// Normal of a planar polygon, robust to concave and near-degenerate faces.
///
/// Returns +Z for degenerate input.
pub fn newell_normal(points: &[[f32; 3]]) -> [f32; 3] {
    let mut n = Vec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let a = Vec3::from(*current);
        let b = Vec3::from(points[(i + 1) % points.len()]);
        n += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    n.try_normalize().unwrap_or(Vec3::Z).to_array()
}
