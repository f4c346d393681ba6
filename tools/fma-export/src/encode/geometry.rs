//! Face table and index stream

use fma_common::packing::to_fma_axes;
use fma_common::{ByteSink, PRIMITIVE_RESTART};

use super::to_u32;
use crate::error::ExportError;
use crate::layout::SceneAnalysis;
use crate::options::GeometryMode;
use crate::scene::Polygon;
use crate::vertices::loop_key;

/// Face table, in mesh allocation order.
///
/// Each face records where its run starts in the index stream, counted in
/// indices from the start of the stream.
pub fn encode_faces(analysis: &SceneAnalysis<'_>, sink: &mut ByteSink) -> Result<(), ExportError> {
    let mut first_index: usize = 0;

    for allocation in analysis.meshes.values() {
        let polygons = allocation.mesh.polygons();
        if polygons.len() != allocation.face_count {
            return Err(ExportError::FaceCountMismatch {
                mesh: allocation.mesh.name().to_string(),
                planned: allocation.face_count,
                actual: polygons.len(),
            });
        }

        for polygon in polygons {
            sink.put_u32(to_u32(polygon.loop_total, "face loops")?);
            sink.put_u32(to_u32(first_index, "indices")?);
            sink.put_u32(to_u32(allocation.material_slot, "material slots")?);
            // Rotated like the vertex normals
            sink.put_f32s(&to_fma_axes(polygon.normal));
            first_index += analysis.geometry.indices_per_face(polygon.loop_total);
        }
    }
    Ok(())
}

/// Loop order of a face as written to the index stream.
fn face_loops(polygon: &Polygon, mirrored: bool) -> Vec<usize> {
    let mut loops: Vec<usize> = polygon.loops().collect();
    if mirrored {
        loops.reverse();
    }
    loops
}

/// Index stream: the dense vertex index of every loop, reversed for mirrored
/// meshes, with a restart after each face in triangle-fan mode.
pub fn encode_indices(analysis: &SceneAnalysis<'_>, sink: &mut ByteSink) -> Result<(), ExportError> {
    let restart = analysis.geometry == GeometryMode::TriangleFan;
    let mut written: u64 = 0;

    for allocation in analysis.meshes.values() {
        let mesh = allocation.mesh;
        for polygon in mesh.polygons() {
            for loop_index in face_loops(polygon, allocation.mirrored) {
                let index = analysis.vertices.get(&loop_key(mesh, loop_index)).ok_or_else(|| {
                    ExportError::MissingVertex {
                        mesh: mesh.name().to_string(),
                        loop_index,
                    }
                })?;
                sink.put_u32(index);
                written += 1;
            }
            if restart {
                sink.put_u32(PRIMITIVE_RESTART);
                written += 1;
            }
        }
    }

    let planned = analysis.index_count as u64;
    if written != planned {
        return Err(ExportError::IndexCountMismatch {
            planned,
            actual: written,
        });
    }
    Ok(())
}
