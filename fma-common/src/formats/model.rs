//! FMA model format (.fma)
//!
//! A flat, memory-mappable scene container. Every record has a fixed size and
//! every reference is either an absolute byte offset or a dense index, so a
//! reader can map the file and index into it without parsing.
//!
//! # Layout
//! ```text
//! 0x00: magic "##fma" + version (3 bytes, high byte first)
//! 0x08: flags u64 (big-endian)
//! 0x10: strings   start u64, count u64, length u64
//! 0x28: materials start u64, count u64
//! 0x38: meshes    start u64, count u64
//! 0x48: bones     start u64, count u64
//! 0x58: faces     start u64, count u64
//! 0x68: indices   start u64, count u64
//! 0x78: vertices  start u64, count u64
//! 0x88: vertex layout (u16 length, bytes, 0x00)
//! var:  zero padding to 8 bytes
//! 0xA0: comment (free-form)
//! var:  string storage, materials, meshes, bones, faces, vertices, indices
//! ```
//!
//! The header lists indices before vertices, while the data places vertices
//! first.

use crate::binary::{Value, Width, WriteOptions, padding_for, write_values};
use crate::error::EncodeError;
use crate::vertex_layout::VertexLayout;

/// First five bytes of every FMA file.
pub const FMA_MAGIC: &[u8; 5] = b"##fma";

/// Format version written by this crate.
pub const FMA_VERSION: u32 = 4;

/// Highest version the three magic bytes can hold.
pub const FMA_MAX_VERSION: u32 = 0x00FF_FFFF;

/// Model file extension
pub const FMA_MODEL_EXT: &str = "fma";

/// Suffix appended to a material name to get its file name.
pub const FMA_MATERIAL_SUFFIX: &str = ".mtl.fma";

/// Material used by meshes that have none.
pub const DEFAULT_MATERIAL_NAME: &str = "default";

/// Parent name shared by every bone.
pub const PLACEHOLDER_BONE_PARENT: &str = "null_bone_parent";

/// Index-stream delimiter between faces.
pub const PRIMITIVE_RESTART: u32 = 0xFFFF_FFFF;

pub const MATERIAL_RECORD_SIZE: usize = 0x08;
pub const MESH_RECORD_SIZE: usize = 0x28;
pub const BONE_RECORD_SIZE: usize = 0x40;
pub const FACE_RECORD_SIZE: usize = 0x18;
pub const INDEX_SIZE: usize = 0x04;
pub const VERTEX_RECORD_SIZE: usize = 0x38;

/// Padding at the end of every bone record.
pub const BONE_PADDING: &[u8; 4] = b"pad4";

bitflags::bitflags! {
    /// Model header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModelFlags: u64 {
        /// Faces are fans delimited by primitive restarts
        const TRIANGLE_FAN = 1 << 0;
        /// Faces are plain triangles
        const TRIANGLE_LIST = 1 << 1;
        const EXTERNAL_MODEL = 1 << 2;
        const EXTERNAL_STRINGS = 1 << 3;
    }
}

/// Magic number followed by the three low bytes of `version`.
pub fn magic_number(version: u32) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[0..5].copy_from_slice(FMA_MAGIC);
    bytes[5] = ((version >> 16) & 0xFF) as u8;
    bytes[6] = ((version >> 8) & 0xFF) as u8;
    bytes[7] = (version & 0xFF) as u8;
    bytes
}

/// Region of fixed-size records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub count: u64,
}

impl Segment {
    pub fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    /// First byte past the segment for records of `record_size` bytes.
    pub fn end(&self, record_size: usize) -> u64 {
        self.start + self.count * record_size as u64
    }
}

/// The string storage region: a count of strings and a byte length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringSegment {
    pub start: u64,
    pub count: u64,
    pub len: u64,
}

impl StringSegment {
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// Model file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHeader {
    pub version: u32,
    pub flags: ModelFlags,
    pub strings: StringSegment,
    pub materials: Segment,
    pub meshes: Segment,
    pub bones: Segment,
    pub faces: Segment,
    pub indices: Segment,
    pub vertices: Segment,
    pub vertex_layout: VertexLayout,
}

impl ModelHeader {
    /// Size of the magic, flags and segment table.
    pub const FIXED_SIZE: usize = 8 * 17;

    /// Header size for the canonical vertex layout.
    pub const SIZE: usize = 160;

    /// Header size for a given vertex layout, padded to 8 bytes.
    pub fn size_for(layout: &VertexLayout) -> usize {
        let len = Self::FIXED_SIZE + layout.encoded_len();
        len + padding_for(len, 8)
    }

    /// Size of this header once encoded.
    pub fn encoded_len(&self) -> usize {
        Self::size_for(&self.vertex_layout)
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&magic_number(self.version));
        write_values(
            &mut out,
            Width::W8,
            &[Value::from(self.flags.bits())],
            WriteOptions::BIG_ENDIAN,
        )?;

        let segments = [
            self.strings.start,
            self.strings.count,
            self.strings.len,
            self.materials.start,
            self.materials.count,
            self.meshes.start,
            self.meshes.count,
            self.bones.start,
            self.bones.count,
            self.faces.start,
            self.faces.count,
            self.indices.start,
            self.indices.count,
            self.vertices.start,
            self.vertices.count,
        ]
        .map(Value::from);
        write_values(&mut out, Width::W8, &segments, WriteOptions::default())?;

        self.vertex_layout.write_to(&mut out);
        out.resize(out.len() + padding_for(out.len(), 8), 0);
        Ok(out)
    }
}

/// File name of the sibling file holding material `name`.
pub fn material_file_name(name: &str) -> String {
    format!("{name}{FMA_MATERIAL_SUFFIX}")
}
