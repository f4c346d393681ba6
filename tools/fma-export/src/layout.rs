//! Scene analysis and segment placement
//!
//! Nothing is written until the whole scene has been scanned: segment offsets
//! depend on the string storage size and on the deduplicated vertex count,
//! so both are settled here before the header is built.

use hashbrown::HashMap;
use indexmap::IndexMap;

use fma_common::{
    material_file_name, ModelHeader, Segment, StringPool, StringSegment, VertexLayout,
    BONE_RECORD_SIZE, DEFAULT_MATERIAL_NAME, FACE_RECORD_SIZE, INDEX_SIZE, MATERIAL_RECORD_SIZE,
    MESH_RECORD_SIZE, PLACEHOLDER_BONE_PARENT, VERTEX_RECORD_SIZE,
};

use crate::error::ExportError;
use crate::material::validate_material_name;
use crate::options::{ExportOptions, GeometryMode};
use crate::scene::{Material, MeshSource, ObjectSource, SceneSource};
use crate::vertices::VertexTable;

/// A distinct material and its dense slot.
#[derive(Debug, Clone)]
pub struct MaterialSlot<'a> {
    /// `None` for the default material
    pub material: Option<&'a Material>,
    pub slot: usize,
}

/// A distinct (mesh, winding) pair.
#[derive(Clone)]
pub struct MeshAllocation<'a> {
    pub mesh: &'a dyn MeshSource,
    /// Placed by a transform with a negative determinant
    pub mirrored: bool,
    pub material_slot: usize,
    pub first_face: usize,
    pub face_count: usize,
    /// Index-stream entries of this mesh, restarts included
    pub index_count: usize,
}

/// Everything the encoders need, gathered before any byte is written.
pub struct SceneAnalysis<'a> {
    pub geometry: GeometryMode,
    pub objects: Vec<&'a dyn ObjectSource>,
    /// Keyed by material name, in first-seen order
    pub materials: IndexMap<String, MaterialSlot<'a>>,
    /// Keyed by mesh name and winding, in first-seen order
    pub meshes: IndexMap<String, MeshAllocation<'a>>,
    /// Dense mesh index of every object
    pub object_meshes: Vec<usize>,
    pub vertices: VertexTable,
    pub strings: StringPool,
    pub face_count: usize,
    pub index_count: usize,
}

/// The single material of a mesh, or `None` for the default material.
pub fn mesh_material(mesh: &dyn MeshSource) -> Result<Option<&Material>, ExportError> {
    match mesh.materials() {
        [] => Ok(None),
        [material] => Ok(Some(material)),
        many => Err(ExportError::MultipleMaterials {
            mesh: mesh.name().to_string(),
            count: many.len(),
        }),
    }
}

/// Material name used in tables and file names.
pub fn material_name(material: Option<&Material>) -> &str {
    material.map_or(DEFAULT_MATERIAL_NAME, |m| m.name.as_str())
}

/// Key of a mesh as placed by an object: mirrored placements are distinct.
pub fn mesh_key(mesh_name: &str, mirrored: bool) -> String {
    format!("{}:det_{}tz", mesh_name, if mirrored { "l" } else { "g" })
}

fn validate_mesh(mesh: &dyn MeshSource, geometry: GeometryMode) -> Result<(), ExportError> {
    let invalid = |reason: String| ExportError::InvalidMesh {
        mesh: mesh.name().to_string(),
        reason,
    };

    if mesh.uv_layer_count() > 1 {
        return Err(ExportError::MultipleUvLayers {
            mesh: mesh.name().to_string(),
            count: mesh.uv_layer_count(),
        });
    }

    let loops = mesh.loops();
    let positions = mesh.positions().len();
    for (face, polygon) in mesh.polygons().iter().enumerate() {
        if polygon.loop_total < 3 {
            return Err(invalid(format!(
                "face {} has {} corners",
                face, polygon.loop_total
            )));
        }
        if polygon.loop_start + polygon.loop_total > loops.len() {
            return Err(invalid(format!("face {} runs past the loop list", face)));
        }
        if geometry == GeometryMode::TriangleList && polygon.loop_total != 3 {
            return Err(ExportError::NonTriangularFace {
                mesh: mesh.name().to_string(),
                face,
                loops: polygon.loop_total,
            });
        }
    }
    if let Some(l) = loops.iter().find(|l| l.vertex >= positions) {
        return Err(invalid(format!(
            "loop references vertex {} of {}",
            l.vertex, positions
        )));
    }
    if mesh.uv_layer_count() == 1 {
        if let Some(missing) = (0..loops.len()).find(|i| mesh.loop_uv(*i).is_none()) {
            return Err(invalid(format!("loop {} has no UV", missing)));
        }
    }
    Ok(())
}

/// Scan the scene: materials, meshes, counts, vertices and strings.
pub fn analyze<'a>(
    scene: &'a dyn SceneSource,
    geometry: GeometryMode,
) -> Result<SceneAnalysis<'a>, ExportError> {
    let objects = scene.objects();
    if objects.is_empty() {
        return Err(ExportError::NoObjects);
    }

    // Materials
    let mut materials: IndexMap<String, MaterialSlot<'a>> = IndexMap::new();
    for &object in &objects {
        let material = mesh_material(object.mesh())?;
        let name = material_name(material);
        validate_material_name(name)?;
        let name = name.to_string();
        let slot = materials.len();
        materials
            .entry(name)
            .or_insert(MaterialSlot { material, slot });
    }

    // Meshes, one per (mesh, winding)
    let mut meshes: IndexMap<String, MeshAllocation<'a>> = IndexMap::new();
    let mut named: HashMap<&'a str, &'a dyn MeshSource> = HashMap::new();
    let mut object_meshes = Vec::with_capacity(objects.len());
    let mut face_count = 0;
    let mut index_count = 0;
    for &object in &objects {
        let mesh = object.mesh();
        // Records are keyed by name, so one name must mean one mesh
        let first = *named.entry(mesh.name()).or_insert(mesh);
        if !std::ptr::addr_eq(first, mesh) {
            return Err(ExportError::DuplicateMeshName(mesh.name().to_string()));
        }
        let mirrored = object.determinant() < 0.0;
        let key = mesh_key(mesh.name(), mirrored);

        if let Some(index) = meshes.get_index_of(&key) {
            object_meshes.push(index);
            continue;
        }

        validate_mesh(mesh, geometry)?;
        let material = material_name(mesh_material(mesh)?);
        let material_slot = materials
            .get(material)
            .ok_or_else(|| ExportError::MissingMaterialSlot {
                mesh: mesh.name().to_string(),
                material: material.to_string(),
            })?
            .slot;
        let polygons = mesh.polygons();
        let mesh_indices: usize = polygons
            .iter()
            .map(|p| geometry.indices_per_face(p.loop_total))
            .sum();

        object_meshes.push(meshes.len());
        meshes.insert(
            key,
            MeshAllocation {
                mesh,
                mirrored,
                material_slot,
                first_face: face_count,
                face_count: polygons.len(),
                index_count: mesh_indices,
            },
        );
        face_count += polygons.len();
        index_count += mesh_indices;
    }

    // Vertices
    let mut vertices = VertexTable::new();
    for allocation in meshes.values() {
        vertices.add_mesh(allocation.mesh)?;
    }

    // Strings
    let mut strings = StringPool::new();
    strings.intern(PLACEHOLDER_BONE_PARENT)?;
    for &object in &objects {
        strings.intern(object.name())?;
        strings.intern(object.mesh().name())?;
        let material = mesh_material(object.mesh())?;
        strings.intern(material_file_name(material_name(material)))?;
    }
    strings.pad(8);

    tracing::debug!(
        "Analysis: {} objects, {} materials, {} meshes, {} faces, {} vertices, {} indices",
        objects.len(),
        materials.len(),
        meshes.len(),
        face_count,
        vertices.len(),
        index_count
    );

    Ok(SceneAnalysis {
        geometry,
        objects,
        materials,
        meshes,
        object_meshes,
        vertices,
        strings,
        face_count,
        index_count,
    })
}

/// Kinds of fixed-size segments, in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Materials,
    Meshes,
    Bones,
    Faces,
    Vertices,
    Indices,
}

impl SegmentKind {
    pub const PLACEMENT_ORDER: [SegmentKind; 6] = [
        SegmentKind::Materials,
        SegmentKind::Meshes,
        SegmentKind::Bones,
        SegmentKind::Faces,
        SegmentKind::Vertices,
        SegmentKind::Indices,
    ];

    pub fn record_size(self) -> usize {
        match self {
            SegmentKind::Materials => MATERIAL_RECORD_SIZE,
            SegmentKind::Meshes => MESH_RECORD_SIZE,
            SegmentKind::Bones => BONE_RECORD_SIZE,
            SegmentKind::Faces => FACE_RECORD_SIZE,
            SegmentKind::Vertices => VERTEX_RECORD_SIZE,
            SegmentKind::Indices => INDEX_SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::Materials => "materials",
            SegmentKind::Meshes => "meshes",
            SegmentKind::Bones => "bones",
            SegmentKind::Faces => "faces",
            SegmentKind::Vertices => "vertices",
            SegmentKind::Indices => "indices",
        }
    }
}

/// Element counts of every segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentCounts {
    pub strings: usize,
    pub strings_len: usize,
    pub materials: usize,
    pub meshes: usize,
    pub bones: usize,
    pub faces: usize,
    pub vertices: usize,
    pub indices: usize,
}

impl SegmentCounts {
    pub fn of(analysis: &SceneAnalysis<'_>) -> Self {
        Self {
            strings: analysis.strings.count(),
            strings_len: analysis.strings.len(),
            materials: analysis.materials.len(),
            meshes: analysis.meshes.len(),
            bones: analysis.objects.len(),
            faces: analysis.face_count,
            vertices: analysis.vertices.len(),
            indices: analysis.index_count,
        }
    }
}

/// Absolute placement of every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub header_size: usize,
    pub comment_len: usize,
    pub strings: StringSegment,
    pub materials: Segment,
    pub meshes: Segment,
    pub bones: Segment,
    pub faces: Segment,
    pub vertices: Segment,
    pub indices: Segment,
}

impl LayoutPlan {
    /// Place segments one after the other: header, comment, strings, then
    /// the fixed-size segments in [`SegmentKind::PLACEMENT_ORDER`].
    pub fn compute(counts: &SegmentCounts, header_size: usize, comment_len: usize) -> Self {
        let strings = StringSegment {
            start: (header_size + comment_len) as u64,
            count: counts.strings as u64,
            len: counts.strings_len as u64,
        };
        let materials = Segment::new(strings.end(), counts.materials as u64);
        let meshes = Segment::new(materials.end(MATERIAL_RECORD_SIZE), counts.meshes as u64);
        let bones = Segment::new(meshes.end(MESH_RECORD_SIZE), counts.bones as u64);
        let faces = Segment::new(bones.end(BONE_RECORD_SIZE), counts.faces as u64);
        let vertices = Segment::new(faces.end(FACE_RECORD_SIZE), counts.vertices as u64);
        let indices = Segment::new(vertices.end(VERTEX_RECORD_SIZE), counts.indices as u64);

        Self {
            header_size,
            comment_len,
            strings,
            materials,
            meshes,
            bones,
            faces,
            vertices,
            indices,
        }
    }

    pub fn segment(&self, kind: SegmentKind) -> Segment {
        match kind {
            SegmentKind::Materials => self.materials,
            SegmentKind::Meshes => self.meshes,
            SegmentKind::Bones => self.bones,
            SegmentKind::Faces => self.faces,
            SegmentKind::Vertices => self.vertices,
            SegmentKind::Indices => self.indices,
        }
    }

    /// Planned byte size of a segment.
    pub fn segment_len(&self, kind: SegmentKind) -> u64 {
        self.segment(kind).count * kind.record_size() as u64
    }

    /// Total file size.
    pub fn file_len(&self) -> u64 {
        self.indices.end(INDEX_SIZE)
    }

    pub fn header(&self, options: &ExportOptions) -> ModelHeader {
        ModelHeader {
            version: options.version,
            flags: options.geometry.flags(),
            strings: self.strings,
            materials: self.materials,
            meshes: self.meshes,
            bones: self.bones,
            faces: self.faces,
            indices: self.indices,
            vertices: self.vertices,
            vertex_layout: VertexLayout::fma_default(),
        }
    }

    /// Log the segment table.
    pub fn log(&self) {
        tracing::info!(
            "Comment:   {:06x} to {:06x}",
            self.header_size,
            self.header_size + self.comment_len
        );
        tracing::info!("Strings:   {:3} @ {:010x}", self.strings.count, self.strings.start);
        for kind in SegmentKind::PLACEMENT_ORDER {
            let segment = self.segment(kind);
            tracing::info!("{:<10} {:3} @ {:010x}", kind.name(), segment.count, segment.start);
        }
    }
}
