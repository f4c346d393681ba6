//! Error types for the FMA encoders.

use thiserror::Error;

/// Failures while encoding primitives or managing string storage.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    /// Only 1, 2, 4 and 8 byte wide values exist in the format.
    #[error("unsupported value width {0} (must be 1, 2, 4 or 8)")]
    UnsupportedWidth(usize),

    /// Floats can only be written at widths 4 (f32) and 8 (f64).
    #[error("value {index} is a float, but width {width} only accepts integers")]
    FloatNotAllowed { index: usize, width: usize },

    #[error("value {index} ({value}) does not fit in {width} {} byte(s)", signedness(.signed))]
    IntOutOfRange {
        index: usize,
        value: i128,
        width: usize,
        signed: bool,
    },

    #[error("string sequence is too large ({len} > {max} bytes)")]
    StringTooLarge { len: usize, max: usize },

    #[error("string pointer 0x{offset:X} out of bounds (storage is 0x{len:X} bytes)")]
    StringOutOfBounds { offset: u64, len: usize },

    #[error("bad string pointer 0x{offset:X}: record overruns storage by {overrun} byte(s)")]
    StringOverrun { offset: u64, overrun: usize },

    #[error("string {0:?} is not in the string storage")]
    StringNotInterned(String),
}

/// Failures while parsing a vertex layout descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("vertex layout is empty")]
    Empty,

    #[error("unexpected character {found:?} at position {position} of vertex layout")]
    UnexpectedChar { position: usize, found: char },

    #[error("group '{group}' repeats the previous group at position {position}")]
    RepeatedGroup { position: usize, group: char },

    #[error("vertex layout is {0} bytes long, but the header stores at most 65535")]
    TooLong(usize),
}

fn signedness(signed: &bool) -> &'static str {
    if *signed { "signed" } else { "unsigned" }
}
