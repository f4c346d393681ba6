//! Segment encoders
//!
//! Each encoder appends one segment to the model buffer. Encoders read the
//! allocations made by [`analyze`](crate::layout::analyze) and never compute
//! offsets of their own; [`check_segment`] compares what was written against
//! the [`LayoutPlan`].

mod geometry;

pub use geometry::{encode_faces, encode_indices};

use glam::Vec3;

use fma_common::packing::{swap_yz, to_fma_axes};
use fma_common::{material_file_name, ByteSink, BONE_PADDING, PLACEHOLDER_BONE_PARENT};

use crate::error::ExportError;
use crate::layout::{LayoutPlan, SceneAnalysis, SegmentKind};
use crate::scene::MeshSource;

/// Fail unless `written` bytes match the planned size of `kind`.
pub fn check_segment(plan: &LayoutPlan, kind: SegmentKind, written: usize) -> Result<(), ExportError> {
    let planned = plan.segment_len(kind);
    if planned != written as u64 {
        return Err(ExportError::SegmentSizeMismatch {
            segment: kind.name(),
            planned,
            actual: written as u64,
        });
    }
    Ok(())
}

/// Narrow a count to the u32 the records hold.
pub(crate) fn to_u32(count: usize, what: &'static str) -> Result<u32, ExportError> {
    u32::try_from(count).map_err(|_| ExportError::CountOverflow { what, count })
}

/// Material table: the string offset of each slot's file name.
pub fn encode_materials(analysis: &SceneAnalysis<'_>, sink: &mut ByteSink) -> Result<(), ExportError> {
    for (name, slot) in &analysis.materials {
        let pointer = analysis.strings.require(material_file_name(name))?;
        tracing::debug!("Material {} '{}' @ {:#x}", slot.slot, name, pointer);
        sink.put_u64(pointer);
    }
    Ok(())
}

/// Bounding sphere of a mesh in source axes: mean of the positions and the
/// largest distance from it.
pub fn bounding_sphere(mesh: &dyn MeshSource) -> (Vec3, f32) {
    let positions = mesh.positions();

    let mut center = Vec3::ZERO;
    for (i, p) in positions.iter().enumerate() {
        center += (Vec3::from(*p) - center) / (i + 1) as f32;
    }

    let radius = positions
        .iter()
        .map(|p| Vec3::from(*p).distance(center))
        .fold(0.0f32, f32::max);

    (center, radius)
}

/// Mesh table.
pub fn encode_meshes(analysis: &SceneAnalysis<'_>, sink: &mut ByteSink) -> Result<(), ExportError> {
    for (key, allocation) in &analysis.meshes {
        let (center, radius) = bounding_sphere(allocation.mesh);
        tracing::debug!(
            "Mesh '{}': {} faces from {}, sphere {:?} r={}",
            key,
            allocation.face_count,
            allocation.first_face,
            center,
            radius
        );

        sink.put_u64(allocation.material_slot as u64);
        sink.put_u64(allocation.first_face as u64);
        sink.put_u32(to_u32(allocation.face_count, "faces")?);
        sink.put_u32(to_u32(allocation.index_count, "indices")?);
        // Same axes as the vertex positions the sphere encloses
        sink.put_f32s(&to_fma_axes(center.to_array()));
        sink.put_f32(radius);
    }
    Ok(())
}

/// Bone table: one bone per placed object.
pub fn encode_bones(analysis: &SceneAnalysis<'_>, sink: &mut ByteSink) -> Result<(), ExportError> {
    let parent = analysis.strings.require(PLACEHOLDER_BONE_PARENT)?;

    for (object, &mesh_slot) in analysis.objects.iter().zip(&analysis.object_meshes) {
        let transform = object.transform();
        let name = analysis.strings.require(object.name())?;
        tracing::debug!(
            "Bone '{}' -> mesh {}, at {:?}",
            object.name(),
            mesh_slot,
            transform.position
        );

        sink.put_u64(name);
        sink.put_u64(parent);
        sink.put_u64(mesh_slot as u64);
        sink.put_f32s(&to_fma_axes(transform.position));
        sink.put_f32s(&swap_yz(transform.rotation));
        sink.put_f32s(&swap_yz(transform.scale));
        sink.put_bytes(BONE_PADDING);
    }
    Ok(())
}
