//! String storage
//!
//! An append-only, deduplicating arena of length-prefixed strings. Model and
//! material files refer to strings by the byte offset of their record inside
//! the storage, so equal strings must share a single record.
//!
//! # Record layout
//! ```text
//! 0x00: length u16 (little-endian)
//! 0x02: bytes [length]
//! var:  0x00 terminator
//! var:  0 or 1 padding byte (records stay 2-aligned)
//! ```

use hashbrown::HashMap;

use crate::binary::padding_for;
use crate::error::EncodeError;

/// Largest string the storage accepts, in bytes.
///
/// Strings are capped at 64 KiB; a 65536-byte string would not fit the u16
/// length field, so the last representable length is the real ceiling.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Deduplicating string arena.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    content: Vec<u8>,
    offsets: HashMap<Vec<u8>, u64>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new record for `seq` and return its offset.
    ///
    /// Does not check for an existing record; use [`StringPool::seek_or_insert`]
    /// to intern.
    pub fn add(&mut self, seq: impl AsRef<[u8]>) -> Result<u64, EncodeError> {
        let seq = seq.as_ref();
        if seq.len() > MAX_STRING_LEN {
            return Err(EncodeError::StringTooLarge {
                len: seq.len(),
                max: MAX_STRING_LEN,
            });
        }

        let offset = self.content.len() as u64;
        self.content.extend_from_slice(&(seq.len() as u16).to_le_bytes());
        self.content.extend_from_slice(seq);
        self.content.push(0);
        self.pad(2);
        self.offsets.insert(seq.to_vec(), offset);
        Ok(offset)
    }

    /// Read back the bytes of the record starting at `offset`.
    pub fn get(&self, offset: u64) -> Result<&[u8], EncodeError> {
        let len = self.content.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start.saturating_add(2) > len {
            return Err(EncodeError::StringOutOfBounds { offset, len });
        }

        let length = u16::from_le_bytes([self.content[start], self.content[start + 1]]) as usize;
        let end = start + 2 + length + 1;
        if end > len {
            return Err(EncodeError::StringOverrun {
                offset,
                overrun: end - len,
            });
        }
        Ok(&self.content[start + 2..start + 2 + length])
    }

    /// Offset of an already-interned string, if any.
    pub fn find(&self, seq: impl AsRef<[u8]>) -> Option<u64> {
        self.offsets.get(seq.as_ref()).copied()
    }

    /// Return the offset of `seq`, inserting it first when `insert` is true.
    ///
    /// Returns `Ok(None)` only when the string is absent and `insert` is false.
    pub fn seek_or_insert(
        &mut self,
        seq: impl AsRef<[u8]>,
        insert: bool,
    ) -> Result<Option<u64>, EncodeError> {
        let seq = seq.as_ref();
        if let Some(offset) = self.find(seq) {
            return Ok(Some(offset));
        }
        if insert {
            return self.add(seq).map(Some);
        }
        Ok(None)
    }

    /// Intern `seq`, returning its offset.
    pub fn intern(&mut self, seq: impl AsRef<[u8]>) -> Result<u64, EncodeError> {
        let seq = seq.as_ref();
        match self.find(seq) {
            Some(offset) => Ok(offset),
            None => self.add(seq),
        }
    }

    /// Offset of a string that must already be interned.
    pub fn require(&self, seq: impl AsRef<[u8]>) -> Result<u64, EncodeError> {
        let seq = seq.as_ref();
        self.find(seq)
            .ok_or_else(|| EncodeError::StringNotInterned(String::from_utf8_lossy(seq).into_owned()))
    }

    /// Append zero bytes until the storage length is a multiple of `alignment`.
    pub fn pad(&mut self, alignment: usize) {
        let padding = padding_for(self.content.len(), alignment);
        self.content.resize(self.content.len() + padding, 0);
    }

    /// Number of distinct strings stored.
    pub fn count(&self) -> usize {
        self.offsets.len()
    }

    /// Storage size in bytes, padding included.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}
