//! fma-export.toml manifest parsing and build orchestration
//!
//! A manifest describes one model export and any number of hand-authored
//! material files:
//!
//! ```toml
//! [export]
//! input = "scene.obj"
//! output = "build/scene.fma"
//! geometry = "triangle-fan"
//! materials = true
//!
//! [[material]]
//! name = "metal"
//! specular_exponent = 16.0
//! diffuse = { texture = "metal.png" }
//! emissive = { color = 0x000000FF }
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use fma_common::{material_file_name, MaterialRecord, TextureSlot, FMA_MODEL_EXT};

use crate::material::validate_material_name;
use crate::model::export_scene;
use crate::options::{
    check_version, ExportOptions, GeometryMode, DEFAULT_MATERIAL_COMMENT, DEFAULT_MODEL_COMMENT,
};
use crate::output::write_atomic;
use crate::scene::load_obj;

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = "fma-export.toml";

/// Root manifest structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub export: Option<ExportSection>,
    #[serde(default, rename = "material")]
    pub materials: Vec<MaterialEntry>,
}

/// Model export section
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    /// Source OBJ file
    pub input: PathBuf,
    /// Output model file (default: input with `.fma` extension)
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_geometry")]
    pub geometry: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub material_comment: Option<String>,
    /// Write the model file
    #[serde(default = "default_true")]
    pub model: bool,
    /// Write the scene's material files next to the model
    #[serde(default)]
    pub materials: bool,
}

fn default_geometry() -> String {
    GeometryMode::default().as_str().to_string()
}

fn default_version() -> u32 {
    fma_common::FMA_VERSION
}

fn default_true() -> bool {
    true
}

/// One slot of a hand-authored material.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotEntry {
    Texture(String),
    /// `0xRRGGBBAA`
    Color(u32),
}

impl From<&SlotEntry> for TextureSlot {
    fn from(entry: &SlotEntry) -> Self {
        match entry {
            SlotEntry::Texture(path) => TextureSlot::Texture(path.clone()),
            SlotEntry::Color(rgba) => TextureSlot::Color(*rgba),
        }
    }
}

/// A hand-authored material file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialEntry {
    pub name: String,
    /// Output file (default: `<name>.mtl.fma` next to the manifest)
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub transparent: bool,
    #[serde(default)]
    pub specular_exponent: Option<f32>,
    #[serde(default)]
    pub diffuse: Option<SlotEntry>,
    #[serde(default)]
    pub normal: Option<SlotEntry>,
    #[serde(default)]
    pub specular: Option<SlotEntry>,
    #[serde(default)]
    pub emissive: Option<SlotEntry>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl MaterialEntry {
    /// Material file contents; unset slots keep the creator defaults.
    pub fn record(&self) -> MaterialRecord {
        let defaults = MaterialRecord::default();
        let pick = |entry: &Option<SlotEntry>, fallback: TextureSlot| {
            entry.as_ref().map(TextureSlot::from).unwrap_or(fallback)
        };

        MaterialRecord {
            transparent: self.transparent,
            diffuse: pick(&self.diffuse, defaults.diffuse),
            normal: pick(&self.normal, defaults.normal),
            specular: pick(&self.specular, defaults.specular),
            emissive: pick(&self.emissive, defaults.emissive),
            specular_exponent: self.specular_exponent.unwrap_or(defaults.specular_exponent),
            comment: self
                .comment
                .as_deref()
                .unwrap_or(DEFAULT_MATERIAL_COMMENT)
                .as_bytes()
                .to_vec(),
        }
    }

    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        match &self.output {
            Some(path) => base_dir.join(path),
            None => base_dir.join(material_file_name(&self.name)),
        }
    }
}

impl ExportSection {
    /// Export options described by this section.
    pub fn options(&self) -> Result<ExportOptions> {
        let geometry: GeometryMode = self.geometry.parse()?;
        Ok(ExportOptions {
            geometry,
            version: self.version,
            model_comment: self
                .comment
                .as_deref()
                .unwrap_or(DEFAULT_MODEL_COMMENT)
                .as_bytes()
                .to_vec(),
            material_comment: self
                .material_comment
                .as_deref()
                .unwrap_or(DEFAULT_MATERIAL_COMMENT)
                .as_bytes()
                .to_vec(),
            write_model: self.model,
            write_materials: self.materials,
        })
    }

    pub fn input_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.input)
    }

    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        match &self.output {
            Some(path) => base_dir.join(path),
            None => self.input_path(base_dir).with_extension(FMA_MODEL_EXT),
        }
    }
}

impl Manifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse manifest: {:?}", path))
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fma-export.toml")
    }

    /// Validate manifest fields
    pub fn validate(&self) -> Result<()> {
        if self.export.is_none() && self.materials.is_empty() {
            anyhow::bail!("Manifest has neither an [export] section nor any [[material]] entries");
        }

        if let Some(export) = &self.export {
            export.options()?;
            check_version(export.version)?;
            if !export.model && !export.materials {
                anyhow::bail!("[export] writes nothing: both `model` and `materials` are false");
            }
        }

        let mut names = HashSet::new();
        for entry in &self.materials {
            validate_material_name(&entry.name)?;
            if !names.insert(entry.name.as_str()) {
                anyhow::bail!("Material '{}' is defined twice", entry.name);
            }
            if let Some(exponent) = entry.specular_exponent {
                if !exponent.is_finite() {
                    anyhow::bail!("Material '{}' has a non-finite specular exponent", entry.name);
                }
            }
            for (slot, value) in [
                ("diffuse", &entry.diffuse),
                ("normal", &entry.normal),
                ("specular", &entry.specular),
                ("emissive", &entry.emissive),
            ] {
                if let Some(SlotEntry::Texture(path)) = value {
                    if path.is_empty() {
                        anyhow::bail!("Material '{}' has an empty {} texture path", entry.name, slot);
                    }
                }
            }
        }

        Ok(())
    }

    /// Check that every input file exists
    pub fn validate_sources(&self, base_dir: &Path) -> Result<()> {
        if let Some(export) = &self.export {
            let input = export.input_path(base_dir);
            if !input.exists() {
                anyhow::bail!("Export input not found: {:?}", input);
            }
        }
        Ok(())
    }
}

/// Directory relative paths in `manifest_path` resolve against.
pub fn base_dir(manifest_path: &Path) -> PathBuf {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Build everything a manifest asks for
///
/// `output_override` replaces the model output path.
pub fn build_all(
    manifest: &Manifest,
    base_dir: &Path,
    output_override: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    manifest.validate()?;
    manifest.validate_sources(base_dir)?;

    let mut written = Vec::new();

    if let Some(export) = &manifest.export {
        let input = export.input_path(base_dir);
        let output = output_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| export.output_path(base_dir));
        tracing::info!("Exporting {:?} -> {:?}", input, output);

        let scene = load_obj(&input)?;
        let summary = export_scene(&scene, &output, &export.options()?)?;
        written.extend(summary.model);
        written.extend(summary.materials);
    }

    for entry in &manifest.materials {
        let path = entry.output_path(base_dir);
        let bytes = entry
            .record()
            .encode()
            .with_context(|| format!("Failed to encode material '{}'", entry.name))?;
        write_atomic(&path, &bytes)
            .with_context(|| format!("Failed to write material: {:?}", path))?;
        tracing::info!("Wrote material '{}' -> {:?}", entry.name, path);
        written.push(path);
    }

    Ok(written)
}
