//! Material file export
//!
//! Every distinct material used by the exported objects becomes one
//! `<name>.mtl.fma` file next to the model. Texture paths are stored as
//! string references; anything without a texture becomes an inline color.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;

use fma_common::packing::{pack_color_rgb, pack_color_rgba};
use fma_common::{
    material_file_name, MaterialRecord, TextureSlot, DEFAULT_MATERIAL_NAME, DEFAULT_NORMAL_COLOR,
};

use crate::error::ExportError;
use crate::layout::{material_name, mesh_material};
use crate::options::check_version;
use crate::output::write_atomic;
use crate::scene::{Material, SceneSource};

/// Join a directory and a file name given as text, ignoring trailing
/// separators on the directory. An empty directory yields the bare file name.
///
/// File writes join [`Path`]s instead, so non-UTF-8 directories survive.
pub fn merge_dir_basename(dir: &str, basename: &str) -> PathBuf {
    let dir = dir.trim_end_matches(['/', '\\']);
    if dir.is_empty() {
        PathBuf::from(basename)
    } else {
        PathBuf::from(format!("{}/{}", dir, basename))
    }
}

/// Check that `name` can be used as the stem of a material file name.
///
/// The file must land in the output directory, so path separators and the
/// `.`/`..` components are rejected.
pub fn validate_material_name(name: &str) -> Result<(), ExportError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name == "." || name == ".." {
        "name is a relative path component"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(ExportError::InvalidMaterialName {
        name: name.to_string(),
        reason,
    })
}

/// Distinct materials of the exported objects, in first-seen order.
///
/// Meshes without a material contribute the `default` material.
pub fn scene_materials(scene: &dyn SceneSource) -> Result<Vec<Material>, ExportError> {
    let mut materials: IndexMap<String, Material> = IndexMap::new();
    for object in scene.objects() {
        let material = mesh_material(object.mesh())?;
        validate_material_name(material_name(material))?;
        materials
            .entry(material_name(material).to_string())
            .or_insert_with(|| {
                material
                    .cloned()
                    .unwrap_or_else(|| Material::new(DEFAULT_MATERIAL_NAME))
            });
    }
    Ok(materials.into_values().collect())
}

fn slot(texture: &Option<String>, color: u32) -> TextureSlot {
    match texture {
        Some(path) => TextureSlot::Texture(path.clone()),
        None => TextureSlot::Color(color),
    }
}

/// Build the material file contents for a scene material.
pub fn record_from_material(material: &Material, comment: &[u8]) -> MaterialRecord {
    let [dr, dg, db, da] = material.diffuse_color;
    let [sr, sg, sb] = material.specular_color;
    let [er, eg, eb] = material.emission_color;

    MaterialRecord {
        transparent: material.transparent,
        diffuse: slot(&material.diffuse_texture, pack_color_rgba(dr, dg, db, da)),
        normal: slot(&material.normal_texture, DEFAULT_NORMAL_COLOR),
        specular: slot(&material.specular_texture, pack_color_rgb(sr, sg, sb)),
        emissive: slot(&material.emissive_texture, pack_color_rgb(er, eg, eb)),
        specular_exponent: material.specular_exponent,
        comment: comment.to_vec(),
    }
}

/// Encode every material of the scene, paired with its file name.
pub fn encode_scene_materials(
    scene: &dyn SceneSource,
    comment: &[u8],
    version: u32,
) -> Result<Vec<(String, Vec<u8>)>, ExportError> {
    check_version(version)?;
    scene_materials(scene)?
        .iter()
        .map(|material| -> Result<(String, Vec<u8>), ExportError> {
            let bytes = record_from_material(material, comment).encode_with_version(version)?;
            Ok((material_file_name(&material.name), bytes))
        })
        .collect()
}

/// Write the material files of a scene into `dir`.
pub fn write_scene_materials(
    scene: &dyn SceneSource,
    dir: &Path,
    comment: &[u8],
    version: u32,
) -> Result<Vec<PathBuf>> {
    let files = encode_scene_materials(scene, comment, version)?;

    let mut written = Vec::with_capacity(files.len());
    for (file_name, bytes) in files {
        let path = dir.join(&file_name);
        write_atomic(&path, &bytes)
            .with_context(|| format!("Failed to write material: {:?}", path))?;
        tracing::info!("Wrote material {:?} ({} bytes)", path, bytes.len());
        written.push(path);
    }
    Ok(written)
}

/// Parse a slot given on the command line or in a manifest.
///
/// `0x`/`#`-prefixed hex is an inline `RRGGBBAA` color (`RRGGBB` gets full
/// alpha); anything else is a texture path.
pub fn parse_slot(value: &str) -> Result<TextureSlot> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'));

    match hex {
        Some(digits) => {
            let color = u32::from_str_radix(digits, 16)
                .with_context(|| format!("Invalid color: {:?}", value))?;
            match digits.len() {
                8 => Ok(TextureSlot::Color(color)),
                6 => Ok(TextureSlot::Color((color << 8) | 0xFF)),
                _ => anyhow::bail!("Color {:?} must have 6 or 8 hex digits", value),
            }
        }
        None if value.is_empty() => anyhow::bail!("Empty texture path"),
        None => Ok(TextureSlot::Texture(value.to_string())),
    }
}
