//! Model file export
//!
//! # Layout
//!
//! ```text
//! header      160 bytes   magic, flags, segment table, vertex layout
//! comment     free-form, space-padded to 8 bytes
//! strings     length-prefixed records, zero-padded to 8 bytes
//! materials   u64 string offset per material slot
//! meshes      0x28 bytes per mesh
//! bones       0x40 bytes per object
//! faces       0x18 bytes per face
//! vertices    0x38 bytes per vertex
//! indices     u32 per index
//! ```
//!
//! The header's segment table stores indices before vertices even though the
//! vertex segment comes first in the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fma_common::binary::pad_with_spaces_8;
use fma_common::{ByteSink, ModelHeader, VertexLayout};

use crate::encode::{
    check_segment, encode_bones, encode_faces, encode_indices, encode_materials, encode_meshes,
};
use crate::error::ExportError;
use crate::layout::{analyze, LayoutPlan, SceneAnalysis, SegmentCounts, SegmentKind};
use crate::material::write_scene_materials;
use crate::options::{check_version, ExportOptions};
use crate::output::write_atomic;
use crate::scene::SceneSource;

type SegmentEncoder = fn(&SceneAnalysis<'_>, &mut ByteSink) -> Result<(), ExportError>;

/// An encoded model file and where its segments were placed.
#[derive(Debug, Clone)]
pub struct ExportedModel {
    pub bytes: Vec<u8>,
    pub plan: LayoutPlan,
    pub counts: SegmentCounts,
}

fn check_offset(plan_start: u64, sink: &ByteSink, segment: &'static str) -> Result<(), ExportError> {
    if sink.len() as u64 != plan_start {
        return Err(ExportError::SegmentSizeMismatch {
            segment,
            planned: plan_start,
            actual: sink.len() as u64,
        });
    }
    Ok(())
}

/// Encode the selected objects of `scene` into one model file.
pub fn encode_model(
    scene: &dyn SceneSource,
    options: &ExportOptions,
) -> Result<ExportedModel, ExportError> {
    check_version(options.version)?;
    let analysis = analyze(scene, options.geometry)?;
    let counts = SegmentCounts::of(&analysis);

    let comment = pad_with_spaces_8(&options.model_comment);
    let header_size = ModelHeader::size_for(&VertexLayout::fma_default());
    let plan = LayoutPlan::compute(&counts, header_size, comment.len());
    plan.log();

    let mut sink = ByteSink::with_capacity(plan.file_len() as usize);
    sink.put_bytes(&plan.header(options).to_bytes()?);
    sink.put_bytes(&comment);

    check_offset(plan.strings.start, &sink, "strings")?;
    sink.put_bytes(analysis.strings.content());

    let encoders: [(SegmentKind, SegmentEncoder); 4] = [
        (SegmentKind::Materials, encode_materials),
        (SegmentKind::Meshes, encode_meshes),
        (SegmentKind::Bones, encode_bones),
        (SegmentKind::Faces, encode_faces),
    ];
    for (kind, encode) in encoders {
        check_offset(plan.segment(kind).start, &sink, kind.name())?;
        let before = sink.len();
        encode(&analysis, &mut sink)?;
        check_segment(&plan, kind, sink.len() - before)?;
    }

    check_offset(plan.vertices.start, &sink, "vertices")?;
    let before = sink.len();
    analysis.vertices.encode(&mut sink);
    check_segment(&plan, SegmentKind::Vertices, sink.len() - before)?;

    check_offset(plan.indices.start, &sink, "indices")?;
    let before = sink.len();
    encode_indices(&analysis, &mut sink)?;
    check_segment(&plan, SegmentKind::Indices, sink.len() - before)?;

    check_offset(plan.file_len(), &sink, "file")?;

    Ok(ExportedModel {
        bytes: sink.into_inner(),
        plan,
        counts,
    })
}

/// Files written by one export.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub model: Option<PathBuf>,
    pub materials: Vec<PathBuf>,
}

/// Export a scene to `output`, and its materials next to it when requested.
pub fn export_scene(
    scene: &dyn SceneSource,
    output: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();

    if options.write_model {
        let model = encode_model(scene, options)
            .with_context(|| format!("Failed to export model: {:?}", output))?;
        write_atomic(output, &model.bytes)
            .with_context(|| format!("Failed to write model: {:?}", output))?;
        tracing::info!(
            "Wrote {:?}: {} bones, {} meshes, {} faces, {} vertices ({} bytes)",
            output,
            model.counts.bones,
            model.counts.meshes,
            model.counts.faces,
            model.counts.vertices,
            model.bytes.len()
        );
        summary.model = Some(output.to_path_buf());
    }

    if options.write_materials {
        let dir = output.parent().unwrap_or_else(|| Path::new(""));
        summary.materials =
            write_scene_materials(scene, dir, &options.material_comment, options.version)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::options::GeometryMode;
    use crate::scene::{Material, Mesh, Object, Scene};
    use fma_common::{ModelFlags, PRIMITIVE_RESTART};

    fn u64_at(bytes: &[u8], offset: usize) -> u64 {
        u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
    }

    fn triangle_scene() -> Scene {
        let mut mesh = Mesh::new("Tri");
        mesh.positions = vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let n = [0.0, 0.0, 1.0];
        mesh.add_face(&[(0, n, None), (1, n, None), (2, n, None)]);
        mesh.materials.push(Material::new("Red"));
        let mut scene = Scene::new();
        scene.push(Object::new("Tri", Arc::new(mesh)));
        scene
    }

    #[test]
    fn test_single_triangle_file() {
        let model = encode_model(&triangle_scene(), &ExportOptions::default()).unwrap();
        let bytes = &model.bytes;

        assert_eq!(&bytes[..8], b"##fma\x00\x00\x04");
        assert_eq!(
            u64::from_be_bytes(bytes[8..16].try_into().unwrap()),
            ModelFlags::TRIANGLE_FAN.bits()
        );
        assert_eq!(model.bytes.len() as u64, model.plan.file_len());
        assert_eq!(model.plan.header_size, ModelHeader::SIZE);
        assert_eq!(model.plan.strings.start % 8, 0);

        // Strings segment, then materials/meshes/bones/faces, then indices before vertices
        assert_eq!(u64_at(bytes, 16), model.plan.strings.start);
        assert_eq!(u64_at(bytes, 40), model.plan.materials.start);
        assert_eq!(u64_at(bytes, 48), 1);
        assert_eq!(u64_at(bytes, 104), model.plan.indices.start);
        assert_eq!(u64_at(bytes, 112), 4);
        assert_eq!(u64_at(bytes, 120), model.plan.vertices.start);
        assert_eq!(u64_at(bytes, 128), 3);

        let indices: Vec<u32> = bytes[model.plan.indices.start as usize..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, PRIMITIVE_RESTART]);
    }

    #[test]
    fn test_comment_is_space_padded() {
        let options = ExportOptions {
            model_comment: b"abc".to_vec(),
            ..Default::default()
        };
        let model = encode_model(&triangle_scene(), &options).unwrap();
        let start = ModelHeader::SIZE;
        assert_eq!(&model.bytes[start..start + 8], b"abc     ");
        assert_eq!(model.plan.strings.start, (start + 8) as u64);
    }

    #[test]
    fn test_triangle_list_flag() {
        let options = ExportOptions {
            geometry: GeometryMode::TriangleList,
            ..Default::default()
        };
        let model = encode_model(&triangle_scene(), &options).unwrap();
        assert_eq!(
            u64::from_be_bytes(model.bytes[8..16].try_into().unwrap()),
            ModelFlags::TRIANGLE_LIST.bits()
        );
        assert_eq!(model.counts.indices, 3);
    }

    #[test]
    fn test_version_must_fit_three_bytes() {
        let options = ExportOptions {
            version: 0x0100_0000,
            ..Default::default()
        };
        assert!(matches!(
            encode_model(&triangle_scene(), &options),
            Err(ExportError::UnsupportedVersion(0x0100_0000))
        ));

        let options = ExportOptions {
            version: 0x00AB_CDEF,
            ..Default::default()
        };
        let model = encode_model(&triangle_scene(), &options).unwrap();
        assert_eq!(&model.bytes[5..8], &[0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let scene = triangle_scene();
        let a = encode_model(&scene, &ExportOptions::default()).unwrap();
        let b = encode_model(&scene, &ExportOptions::default()).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }
}
