//! Export options

use std::fmt;
use std::str::FromStr;

use fma_common::{FMA_MAX_VERSION, FMA_VERSION, ModelFlags};

use crate::error::ExportError;

/// Comment stored in exported model files unless overridden.
pub const DEFAULT_MODEL_COMMENT: &str =
    "[[[ This model file was generated by the `fma-export` tool.  ]]]";

/// Comment stored in exported material files unless overridden.
pub const DEFAULT_MATERIAL_COMMENT: &str =
    "[[[        This material file was generated by the `fma-export` tool.        ]]]";

/// How faces are laid out in the index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryMode {
    /// One fan per face, each closed by a primitive restart
    #[default]
    TriangleFan,
    /// Three indices per triangle, no restarts
    TriangleList,
}

impl GeometryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryMode::TriangleFan => "triangle-fan",
            GeometryMode::TriangleList => "triangle-list",
        }
    }

    pub fn flags(self) -> ModelFlags {
        match self {
            GeometryMode::TriangleFan => ModelFlags::TRIANGLE_FAN,
            GeometryMode::TriangleList => ModelFlags::TRIANGLE_LIST,
        }
    }

    /// Index-stream entries used by one face with `loops` corners.
    pub fn indices_per_face(self, loops: usize) -> usize {
        match self {
            GeometryMode::TriangleFan => loops + 1,
            GeometryMode::TriangleList => 3,
        }
    }
}

impl FromStr for GeometryMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triangle-fan" => Ok(GeometryMode::TriangleFan),
            "triangle-list" => Ok(GeometryMode::TriangleList),
            other => Err(ExportError::UnsupportedGeometry(other.to_string())),
        }
    }
}

impl fmt::Display for GeometryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of one export run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub geometry: GeometryMode,
    /// Written as the three version bytes after the magic
    pub version: u32,
    pub model_comment: Vec<u8>,
    pub material_comment: Vec<u8>,
    /// Write the `.fma` model file
    pub write_model: bool,
    /// Write one `.mtl.fma` file per material next to the model
    pub write_materials: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            geometry: GeometryMode::default(),
            version: FMA_VERSION,
            model_comment: DEFAULT_MODEL_COMMENT.as_bytes().to_vec(),
            material_comment: DEFAULT_MATERIAL_COMMENT.as_bytes().to_vec(),
            write_model: true,
            write_materials: false,
        }
    }
}

/// Fail unless `version` fits the three version bytes after the magic.
pub fn check_version(version: u32) -> Result<u32, ExportError> {
    if version > FMA_MAX_VERSION {
        return Err(ExportError::UnsupportedVersion(version));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_parse() {
        assert_eq!("triangle-fan".parse::<GeometryMode>().unwrap(), GeometryMode::TriangleFan);
        assert_eq!("triangle-list".parse::<GeometryMode>().unwrap(), GeometryMode::TriangleList);
        assert!(matches!(
            "quads".parse::<GeometryMode>(),
            Err(ExportError::UnsupportedGeometry(s)) if s == "quads"
        ));
    }

    #[test]
    fn test_geometry_display_round_trip() {
        for mode in [GeometryMode::TriangleFan, GeometryMode::TriangleList] {
            assert_eq!(mode.to_string().parse::<GeometryMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_defaults() {
        let options = ExportOptions::default();
        assert_eq!(options.geometry, GeometryMode::TriangleFan);
        assert_eq!(options.version, 4);
        assert!(options.write_model);
        assert!(!options.write_materials);
    }

    #[test]
    fn test_check_version() {
        assert_eq!(check_version(4).unwrap(), 4);
        assert_eq!(check_version(0x00FF_FFFF).unwrap(), 0x00FF_FFFF);
        assert!(matches!(
            check_version(0x0100_0000),
            Err(ExportError::UnsupportedVersion(0x0100_0000))
        ));
    }

    #[test]
    fn test_indices_per_face() {
        assert_eq!(GeometryMode::TriangleFan.indices_per_face(4), 5);
        assert_eq!(GeometryMode::TriangleList.indices_per_face(3), 3);
    }
}
