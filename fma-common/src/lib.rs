//! Shared types and utilities for the FMA model format
//!
//! This crate holds everything about the format that does not depend on a
//! scene source, and is used by `fma-export`.
//!
//! # Modules
//!
//! - [`binary`] - Width-tagged little/big-endian value writer
//! - [`strings`] - Deduplicating string storage
//! - [`vertex_layout`] - Vertex layout descriptors
//! - [`packing`] - Color packing and axis conversion
//! - [`formats`] - Model and material file headers

pub mod binary;
pub mod error;
pub mod formats;
pub mod packing;
pub mod strings;
pub mod vertex_layout;

pub use binary::{ByteSink, Endian, Value, Width, WriteOptions, write_values};
pub use error::{EncodeError, LayoutError};
pub use strings::{MAX_STRING_LEN, StringPool};
pub use vertex_layout::{Datum, DatumKind, FMA_VERTEX_LAYOUT, VertexLayout};

pub use formats::{
    BONE_PADDING,
    BONE_RECORD_SIZE,
    DEFAULT_EMISSIVE_COLOR,
    // Constants
    DEFAULT_MATERIAL_NAME,
    DEFAULT_NORMAL_COLOR,
    FACE_RECORD_SIZE,
    FMA_MAGIC,
    FMA_MATERIAL_SUFFIX,
    FMA_MAX_VERSION,
    FMA_MODEL_EXT,
    FMA_VERSION,
    INDEX_SIZE,
    MATERIAL_RECORD_SIZE,
    MESH_RECORD_SIZE,
    // Material types
    MaterialFlags,
    MaterialRecord,
    // Model types
    ModelFlags,
    ModelHeader,
    PLACEHOLDER_BONE_PARENT,
    PRIMITIVE_RESTART,
    Segment,
    StringSegment,
    TextureSlot,
    VERTEX_RECORD_SIZE,
    magic_number,
    material_file_name,
};
