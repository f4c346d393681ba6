//! Export errors

use fma_common::{EncodeError, LayoutError};

/// Errors raised while turning a scene into FMA files.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Geometry mode string not recognized
    #[error("invalid geometry type '{0}' (expected 'triangle-fan' or 'triangle-list')")]
    UnsupportedGeometry(String),

    /// FMA allows one material per mesh
    #[error("mesh \"{mesh}\" has {count} materials, but FMA only allows one material per mesh")]
    MultipleMaterials { mesh: String, count: usize },

    #[error("mesh \"{mesh}\" has {count} UV layers, but at most one is supported")]
    MultipleUvLayers { mesh: String, count: usize },

    /// Triangle lists need every face to be a triangle
    #[error("face {face} of mesh \"{mesh}\" has {loops} corners, but triangle-list geometry needs triangles")]
    NonTriangularFace {
        mesh: String,
        face: usize,
        loops: usize,
    },

    #[error("mesh \"{mesh}\" is malformed: {reason}")]
    InvalidMesh { mesh: String, reason: String },

    #[error("no mesh objects to export")]
    NoObjects,

    /// Two different meshes share a name, so their records would collide
    #[error("two different meshes are named \"{0}\"")]
    DuplicateMeshName(String),

    /// Material names become file names and may not leave the output directory
    #[error("invalid material name {name:?}: {reason}")]
    InvalidMaterialName { name: String, reason: &'static str },

    #[error("format version {0} does not fit in three bytes (max {max})", max = fma_common::FMA_MAX_VERSION)]
    UnsupportedVersion(u32),

    /// A count written as u32 does not fit
    #[error("{count} {what} exceed the u32 range of the format")]
    CountOverflow { what: &'static str, count: usize },

    /// More distinct vertices than a u32 index can address
    #[error("{0} distinct vertices exceed the index range")]
    TooManyVertices(usize),

    #[error("OBJ line {line}: {reason}")]
    Obj { line: usize, reason: String },

    #[error("MTL line {line}: {reason}")]
    Mtl { line: usize, reason: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    // Internal consistency: the write pass disagrees with the analysis pass.
    #[error("internal error: mesh \"{mesh}\" should have {planned} faces but has {actual}")]
    FaceCountMismatch {
        mesh: String,
        planned: usize,
        actual: usize,
    },

    #[error("internal error: planned {planned} indices but wrote {actual}")]
    IndexCountMismatch { planned: u64, actual: u64 },

    #[error("internal error: {segment} segment planned at {planned} bytes but wrote {actual}")]
    SegmentSizeMismatch {
        segment: &'static str,
        planned: u64,
        actual: u64,
    },

    #[error("internal error: vertex of mesh \"{mesh}\" loop {loop_index} was never registered")]
    MissingVertex { mesh: String, loop_index: usize },

    #[error("internal error: material \"{material}\" of mesh \"{mesh}\" has no slot")]
    MissingMaterialSlot { mesh: String, material: String },
}

impl ExportError {
    /// Internal-consistency errors point at a bug in the exporter, not at the input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ExportError::FaceCountMismatch { .. }
                | ExportError::IndexCountMismatch { .. }
                | ExportError::SegmentSizeMismatch { .. }
                | ExportError::MissingVertex { .. }
                | ExportError::MissingMaterialSlot { .. }
        )
    }
}
