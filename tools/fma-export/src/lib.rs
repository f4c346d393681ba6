//! fma-export library
//!
//! Turns scenes into FMA model files and their `.mtl.fma` material files.
//! The binary drives it from OBJ files and `fma-export.toml` manifests; other
//! hosts implement [`SceneSource`] and call [`encode_model`] directly.

pub mod encode;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod material;
pub mod model;
pub mod options;
pub mod output;
pub mod scene;
pub mod vertices;

pub use error::ExportError;
pub use layout::{analyze, LayoutPlan, SceneAnalysis, SegmentCounts, SegmentKind};
pub use material::{
    encode_scene_materials, merge_dir_basename, parse_slot, record_from_material,
    scene_materials, validate_material_name, write_scene_materials,
};
pub use model::{encode_model, export_scene, ExportSummary, ExportedModel};
pub use options::{check_version, ExportOptions, GeometryMode};
pub use scene::{
    load_obj, Material, Mesh, MeshSource, Object, ObjectSource, Scene, SceneSource, Transform,
};
pub use vertices::{VertexKey, VertexTable};

// Re-export the format crate for callers that only depend on this one
pub use fma_common;
