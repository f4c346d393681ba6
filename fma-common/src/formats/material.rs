//! FMA material format (.mtl.fma)
//!
//! One small file per material, referenced from a model's material table by
//! file name.
//!
//! # Layout
//! ```text
//! 0x00: magic "##fma" + version
//! 0x08: flags u64 (big-endian)
//! 0x10: diffuse  slot u64
//! 0x18: normal   slot u64
//! 0x20: specular slot u64
//! 0x28: emissive slot u64
//! 0x30: specular exponent f32
//! 0x34: "pad4"
//! 0x38: strings start u64, count u64, length u64
//! 0x50: comment (space-padded to 8 bytes)
//! var:  string storage
//! ```
//!
//! A slot flagged inline holds an RGBA8 color in its high four bytes, stored
//! big-endian (`RR GG BB AA 00 00 00 00`). Any other slot holds the
//! little-endian offset of a texture path in the string storage.

use crate::binary::{Value, Width, WriteOptions, pad_with_spaces_8, write_values};
use crate::error::EncodeError;
use crate::formats::model::{FMA_VERSION, StringSegment, magic_number};
use crate::strings::StringPool;

bitflags::bitflags! {
    /// Material header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u64 {
        const TRANSPARENT = 1 << 0;
        const DIFFUSE_INLINE = 1 << 1;
        const NORMAL_INLINE = 1 << 2;
        const SPECULAR_INLINE = 1 << 3;
        const EMISSIVE_INLINE = 1 << 4;
    }
}

/// Flat normal (+Z in tangent space)
pub const DEFAULT_NORMAL_COLOR: u32 = 0x8080_FFFF;

/// No emission
pub const DEFAULT_EMISSIVE_COLOR: u32 = 0x0000_00FF;

/// Contents of one texture slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Inline `0xRRGGBBAA` color
    Color(u32),
    /// Path of an external texture
    Texture(String),
}

impl TextureSlot {
    pub fn is_inline(&self) -> bool {
        matches!(self, TextureSlot::Color(_))
    }

    fn encode(&self, pool: &mut StringPool) -> Result<[u8; 8], EncodeError> {
        match self {
            TextureSlot::Color(rgba) => Ok((u64::from(*rgba) << 32).to_be_bytes()),
            TextureSlot::Texture(path) => Ok(pool.intern(path)?.to_le_bytes()),
        }
    }
}

/// One material file.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub transparent: bool,
    pub diffuse: TextureSlot,
    pub normal: TextureSlot,
    pub specular: TextureSlot,
    pub emissive: TextureSlot,
    pub specular_exponent: f32,
    /// Free-form bytes stored after the header
    pub comment: Vec<u8>,
}

impl Default for MaterialRecord {
    fn default() -> Self {
        Self {
            transparent: false,
            diffuse: TextureSlot::Color(0xCCCC_CCFF),
            normal: TextureSlot::Color(0x7F7F_FFFF),
            specular: TextureSlot::Color(0x3030_30FF),
            emissive: TextureSlot::Color(0x0101_01FF),
            specular_exponent: 2.0,
            comment: Vec::new(),
        }
    }
}

impl MaterialRecord {
    /// Size of the fixed part of the file.
    pub const HEADER_SIZE: usize = 8 * 6 + 4 * 2 + 8 * 3;

    pub fn flags(&self) -> MaterialFlags {
        let mut flags = MaterialFlags::empty();
        flags.set(MaterialFlags::TRANSPARENT, self.transparent);
        flags.set(MaterialFlags::DIFFUSE_INLINE, self.diffuse.is_inline());
        flags.set(MaterialFlags::NORMAL_INLINE, self.normal.is_inline());
        flags.set(MaterialFlags::SPECULAR_INLINE, self.specular.is_inline());
        flags.set(MaterialFlags::EMISSIVE_INLINE, self.emissive.is_inline());
        flags
    }

    /// Encode the whole file with the current format version.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.encode_with_version(FMA_VERSION)
    }

    pub fn encode_with_version(&self, version: u32) -> Result<Vec<u8>, EncodeError> {
        let mut pool = StringPool::new();
        let slots = [
            self.diffuse.encode(&mut pool)?,
            self.normal.encode(&mut pool)?,
            self.specular.encode(&mut pool)?,
            self.emissive.encode(&mut pool)?,
        ];
        pool.pad(8);

        let comment = pad_with_spaces_8(&self.comment);
        let strings = StringSegment {
            start: (Self::HEADER_SIZE + comment.len()) as u64,
            count: pool.count() as u64,
            len: pool.len() as u64,
        };

        let mut out = Vec::with_capacity(Self::HEADER_SIZE + comment.len() + pool.len());
        out.extend_from_slice(&magic_number(version));
        write_values(
            &mut out,
            Width::W8,
            &[Value::from(self.flags().bits())],
            WriteOptions::BIG_ENDIAN,
        )?;
        for slot in &slots {
            out.extend_from_slice(slot);
        }
        write_values(
            &mut out,
            Width::W4,
            &[Value::from(self.specular_exponent)],
            WriteOptions::default(),
        )?;
        out.extend_from_slice(b"pad4");
        write_values(
            &mut out,
            Width::W8,
            &[
                Value::from(strings.start),
                Value::from(strings.count),
                Value::from(strings.len),
            ],
            WriteOptions::default(),
        )?;
        debug_assert_eq!(out.len(), Self::HEADER_SIZE);

        out.extend_from_slice(&comment);
        out.extend_from_slice(pool.content());
        Ok(out)
    }
}
