//! Vertex deduplication
//!
//! Face corners become output vertices. Two corners share a vertex when their
//! position, UV and normal are bit-identical; the tangent basis of a shared
//! vertex is the mean of the per-triangle bases it was seen with.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;

use fma_common::packing::{normalize_or_fallback, to_fma_axes};
use fma_common::{ByteSink, PRIMITIVE_RESTART, VERTEX_RECORD_SIZE};

use crate::error::ExportError;
use crate::scene::MeshSource;

/// Bit pattern of (position, UV, normal) as eight f32s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexKey([u8; 32]);

impl VertexKey {
    pub fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        let floats: [f32; 8] = [
            position[0],
            position[1],
            position[2],
            uv[0],
            uv[1],
            normal[0],
            normal[1],
            normal[2],
        ];
        Self(bytemuck::cast(floats))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// One output vertex, in source axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexRecord {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    /// Running mean of the tangents seen so far (not normalized)
    pub tangent: [f32; 3],
    /// Running mean of the bitangents seen so far (not normalized)
    pub bitangent: [f32; 3],
    pub ref_count: u32,
}

impl VertexRecord {
    fn accumulate(&mut self, tangent: Vec3, bitangent: Vec3) {
        let n = self.ref_count as f32;
        let inv = 1.0 / (n + 1.0);
        self.tangent = ((Vec3::from(self.tangent) * n + tangent) * inv).to_array();
        self.bitangent = ((Vec3::from(self.bitangent) * n + bitangent) * inv).to_array();
        self.ref_count += 1;
    }

    /// Record bytes: position, UV, normal, tangent, bitangent in FMA axes.
    pub fn to_bytes(&self) -> [u8; VERTEX_RECORD_SIZE] {
        let p = to_fma_axes(self.position);
        let n = to_fma_axes(self.normal);
        let t = to_fma_axes(normalize_or_fallback(self.tangent));
        let b = to_fma_axes(normalize_or_fallback(self.bitangent));
        let floats: [f32; 14] = [
            p[0], p[1], p[2], self.uv[0], self.uv[1], n[0], n[1], n[2], t[0], t[1], t[2], b[0],
            b[1], b[2],
        ];

        let mut bytes = [0u8; VERTEX_RECORD_SIZE];
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(floats) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

/// Tangent and bitangent of a triangle from its positions and UVs.
///
/// A triangle with degenerate UVs uses a unit inverse determinant.
pub fn tangent_pair(positions: [Vec3; 3], uvs: [Vec2; 3]) -> (Vec3, Vec3) {
    let e0 = positions[1] - positions[0];
    let e1 = positions[2] - positions[0];
    let du0 = uvs[1] - uvs[0];
    let du1 = uvs[2] - uvs[0];

    let det = du0.x * du1.y - du0.y * du1.x;
    let inv_det = if det != 0.0 { 1.0 / det } else { 1.0 };

    let tangent = inv_det * (du1.y * e0 - du0.y * e1);
    let bitangent = inv_det * (du0.x * e1 - du1.x * e0);
    (tangent, bitangent)
}

/// UV of a loop as exported: `(u, 1 - v)`, or the origin without UV layers.
pub fn loop_uv(mesh: &dyn MeshSource, loop_index: usize) -> [f32; 2] {
    if mesh.uv_layer_count() == 0 {
        return [0.0, 0.0];
    }
    match mesh.loop_uv(loop_index) {
        Some([u, v]) => [u, 1.0 - v],
        None => [0.0, 0.0],
    }
}

/// Key of a mesh loop.
pub fn loop_key(mesh: &dyn MeshSource, loop_index: usize) -> VertexKey {
    let l = mesh.loops()[loop_index];
    VertexKey::new(mesh.positions()[l.vertex], loop_uv(mesh, loop_index), l.normal)
}

/// Insertion-ordered set of distinct vertices.
#[derive(Debug, Clone, Default)]
pub struct VertexTable {
    records: Vec<VertexRecord>,
    lookup: HashMap<VertexKey, u32>,
}

impl VertexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a corner, returning its dense index.
    ///
    /// A new key gets the next index; a known key folds the tangent pair into
    /// its running mean.
    pub fn insert(
        &mut self,
        position: [f32; 3],
        uv: [f32; 2],
        normal: [f32; 3],
        tangent: Vec3,
        bitangent: Vec3,
    ) -> Result<u32, ExportError> {
        let key = VertexKey::new(position, uv, normal);
        if let Some(&index) = self.lookup.get(&key) {
            self.records[index as usize].accumulate(tangent, bitangent);
            return Ok(index);
        }

        // The restart value can never be a vertex index
        let index = u32::try_from(self.records.len())
            .ok()
            .filter(|i| *i != PRIMITIVE_RESTART)
            .ok_or(ExportError::TooManyVertices(self.records.len() + 1))?;
        self.records.push(VertexRecord {
            position,
            uv,
            normal,
            tangent: tangent.to_array(),
            bitangent: bitangent.to_array(),
            ref_count: 1,
        });
        self.lookup.insert(key, index);
        Ok(index)
    }

    /// Register every corner of `mesh`.
    ///
    /// Each corner `i` of a face takes its tangent pair from the triangle
    /// formed with the next two corners, wrapping around the face.
    pub fn add_mesh(&mut self, mesh: &dyn MeshSource) -> Result<(), ExportError> {
        let positions = mesh.positions();
        let loops = mesh.loops();

        for polygon in mesh.polygons() {
            let n = polygon.loop_total;
            for i in 0..n {
                let window = [
                    polygon.loop_start + i,
                    polygon.loop_start + (i + 1) % n,
                    polygon.loop_start + (i + 2) % n,
                ];
                let p = window.map(|l| Vec3::from(positions[loops[l].vertex]));
                let uv = window.map(|l| Vec2::from(loop_uv(mesh, l)));
                let (tangent, bitangent) = tangent_pair(p, uv);

                let corner = loops[window[0]];
                self.insert(
                    positions[corner.vertex],
                    uv[0].to_array(),
                    corner.normal,
                    tangent,
                    bitangent,
                )?;
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &VertexKey) -> Option<u32> {
        self.lookup.get(key).copied()
    }

    pub fn records(&self) -> &[VertexRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write every vertex in index order.
    pub fn encode(&self, sink: &mut ByteSink) {
        for record in &self.records {
            sink.put_bytes(&record.to_bytes());
        }
    }
}
