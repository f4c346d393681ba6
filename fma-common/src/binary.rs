//! Width-tagged binary writer
//!
//! Every FMA field is an integer or IEEE-754 float of 1, 2, 4 or 8 bytes.
//! Integers are little-endian unless a field explicitly asks for big-endian
//! (header and material flags). Floats are written as the bit pattern of an
//! `f32` (width 4) or `f64` (width 8), never through a numeric cast.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::EncodeError;

/// Byte order of a written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Byte width of a written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W1,
    W2,
    W4,
    W8,
}

impl Width {
    /// Number of bytes one value occupies
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Width::W1 => 1,
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
        }
    }

    /// Widths 1 and 2 are integer-only.
    #[inline]
    pub const fn allows_float(self) -> bool {
        matches!(self, Width::W4 | Width::W8)
    }
}

impl TryFrom<usize> for Width {
    type Error = EncodeError;

    fn try_from(bytes: usize) -> Result<Self, Self::Error> {
        match bytes {
            1 => Ok(Width::W1),
            2 => Ok(Width::W2),
            4 => Ok(Width::W4),
            8 => Ok(Width::W8),
            other => Err(EncodeError::UnsupportedWidth(other)),
        }
    }
}

/// A single value to encode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i128),
    Float(f64),
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i128)
            }
        })*
    };
}

value_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Signedness and byte order of a `write_values` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub signed: bool,
    pub endian: Endian,
}

impl WriteOptions {
    pub const BIG_ENDIAN: Self = Self {
        signed: false,
        endian: Endian::Big,
    };
}

fn int_fits(value: i128, width: Width, signed: bool) -> bool {
    let bits = (width.bytes() * 8) as u32;
    if signed {
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        (min..=max).contains(&value)
    } else {
        (0..(1i128 << bits)).contains(&value)
    }
}

fn validate(width: Width, values: &[Value], signed: bool) -> Result<(), EncodeError> {
    for (index, value) in values.iter().enumerate() {
        match *value {
            Value::Float(_) if !width.allows_float() => {
                return Err(EncodeError::FloatNotAllowed {
                    index,
                    width: width.bytes(),
                });
            }
            Value::Int(v) if !int_fits(v, width, signed) => {
                return Err(EncodeError::IntOutOfRange {
                    index,
                    value: v,
                    width: width.bytes(),
                    signed,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

fn encode_one<B: ByteOrder>(out: &mut [u8], width: Width, value: Value, signed: bool) {
    let n = width.bytes();
    match value {
        Value::Float(f) if width == Width::W4 => B::write_u32(out, (f as f32).to_bits()),
        Value::Float(f) => B::write_u64(out, f.to_bits()),
        Value::Int(v) if signed => B::write_int(out, v as i64, n),
        Value::Int(v) => B::write_uint(out, v as u64, n),
    }
}

/// Append `values` to `dst`, each encoded at `width`.
///
/// All values are validated before anything is appended, so a failed call
/// leaves `dst` untouched.
pub fn write_values(
    dst: &mut Vec<u8>,
    width: Width,
    values: &[Value],
    options: WriteOptions,
) -> Result<(), EncodeError> {
    validate(width, values, options.signed)?;

    let n = width.bytes();
    let mut scratch = [0u8; 8];
    dst.reserve(values.len() * n);
    for value in values {
        let out = &mut scratch[..n];
        match options.endian {
            Endian::Little => encode_one::<LittleEndian>(out, width, *value, options.signed),
            Endian::Big => encode_one::<BigEndian>(out, width, *value, options.signed),
        }
        dst.extend_from_slice(out);
    }
    Ok(())
}

/// Exclusively-owned, append-only output buffer.
///
/// The typed `put_*` helpers cover the fixed little-endian record fields;
/// [`ByteSink::write`] is the general width-tagged entry point.
#[derive(Debug, Clone, Default)]
pub struct ByteSink {
    buf: Vec<u8>,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Width-tagged write, see [`write_values`].
    pub fn write(
        &mut self,
        width: Width,
        values: &[Value],
        options: WriteOptions,
    ) -> Result<(), EncodeError> {
        write_values(&mut self.buf, width, values, options)
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    pub fn put_f32s(&mut self, values: &[f32]) {
        for v in values {
            self.put_f32(*v);
        }
    }

    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `fill` bytes until the length is a multiple of `alignment`.
    pub fn pad(&mut self, alignment: usize, fill: u8) {
        let padding = padding_for(self.buf.len(), alignment);
        self.buf.resize(self.buf.len() + padding, fill);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop everything written so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bytes needed to bring `len` up to a multiple of `alignment`.
#[inline]
pub const fn padding_for(len: usize, alignment: usize) -> usize {
    (alignment - (len % alignment)) % alignment
}

/// Pad a byte sequence to 8-byte alignment with ASCII spaces.
///
/// Comments use space padding rather than zeroes so they stay readable in a
/// hex dump.
pub fn pad_with_spaces_8(seq: &[u8]) -> Vec<u8> {
    let mut out = seq.to_vec();
    out.resize(seq.len() + padding_for(seq.len(), 8), b' ');
    out
}
