//! Vertex layout descriptors
//!
//! A layout string describes the fields of one vertex record. A group letter
//! selects the kind of the fields that follow it, and every digit after the
//! letter is one field of that byte width:
//!
//! - `s` signed integers, widths 1, 2, 4, 8
//! - `u` unsigned integers, widths 1, 2, 4, 8
//! - `f` floats, widths 2, 4, 8
//!
//! The same letter may not open two groups in a row (`f4f4` must be `f44`).
//!
//! In the model header the descriptor is stored as a u16 length, the layout
//! bytes, and a zero terminator.

use crate::error::LayoutError;

/// Layout every exported model declares.
pub const FMA_VERTEX_LAYOUT: &str = "f44444222222222";

/// Kind of a single vertex field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumKind {
    Signed,
    Unsigned,
    Float,
}

impl DatumKind {
    fn from_group(c: char) -> Option<Self> {
        match c {
            's' => Some(DatumKind::Signed),
            'u' => Some(DatumKind::Unsigned),
            'f' => Some(DatumKind::Float),
            _ => None,
        }
    }

    fn accepts_width(self, width: u8) -> bool {
        match self {
            DatumKind::Float => matches!(width, 2 | 4 | 8),
            DatumKind::Signed | DatumKind::Unsigned => matches!(width, 1 | 2 | 4 | 8),
        }
    }
}

/// One field of a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Datum {
    pub kind: DatumKind,
    /// Width in bytes
    pub width: u8,
}

/// A parsed, validated vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    source: String,
    data: Vec<Datum>,
}

impl VertexLayout {
    /// Parse and validate a layout string.
    pub fn parse(layout: &str) -> Result<Self, LayoutError> {
        if layout.is_empty() {
            return Err(LayoutError::Empty);
        }
        if layout.len() > u16::MAX as usize {
            return Err(LayoutError::TooLong(layout.len()));
        }

        let mut data = Vec::with_capacity(layout.len());
        let mut group: Option<(char, DatumKind)> = None;
        let mut group_has_data = false;

        for (position, c) in layout.chars().enumerate() {
            if let Some(kind) = DatumKind::from_group(c) {
                match group {
                    Some(_) if !group_has_data => {
                        // The previous group never received a datum
                        return Err(LayoutError::UnexpectedChar { position, found: c });
                    }
                    Some((previous, _)) if previous == c => {
                        return Err(LayoutError::RepeatedGroup { position, group: c });
                    }
                    _ => {}
                }
                group = Some((c, kind));
                group_has_data = false;
                continue;
            }

            let Some((_, kind)) = group else {
                return Err(LayoutError::UnexpectedChar { position, found: c });
            };
            let width = c
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .filter(|w| kind.accepts_width(*w))
                .ok_or(LayoutError::UnexpectedChar { position, found: c })?;
            data.push(Datum { kind, width });
            group_has_data = true;
        }

        Ok(Self {
            source: layout.to_string(),
            data,
        })
    }

    /// The canonical layout of exported models.
    pub fn fma_default() -> Self {
        Self {
            source: FMA_VERTEX_LAYOUT.to_string(),
            data: FMA_VERTEX_LAYOUT
                .bytes()
                .skip(1)
                .map(|b| Datum {
                    kind: DatumKind::Float,
                    width: b - b'0',
                })
                .collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn data(&self) -> &[Datum] {
        &self.data
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes of one vertex laid out this way.
    pub fn stride(&self) -> usize {
        self.data.iter().map(|d| d.width as usize).sum()
    }

    /// Bytes the descriptor occupies in a header: length, layout, terminator.
    pub fn encoded_len(&self) -> usize {
        2 + self.source.len() + 1
    }

    /// Append the header form of the descriptor to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.source.len() as u16).to_le_bytes());
        out.extend_from_slice(self.source.as_bytes());
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = VertexLayout::parse(FMA_VERTEX_LAYOUT).unwrap();
        assert_eq!(layout.len(), 14);
        assert_eq!(layout.stride(), 5 * 4 + 9 * 2);
        assert!(layout.data().iter().all(|d| d.kind == DatumKind::Float));
        assert_eq!(layout, VertexLayout::fma_default());
    }

    #[test]
    fn test_mixed_groups() {
        let layout = VertexLayout::parse("f444s111111111f44").unwrap();
        assert_eq!(layout.len(), 14);
        assert_eq!(layout.data()[3], Datum { kind: DatumKind::Signed, width: 1 });
        assert_eq!(layout.stride(), 12 + 9 + 8);

        let layout = VertexLayout::parse("u8s2").unwrap();
        assert_eq!(layout.data()[0].kind, DatumKind::Unsigned);
        assert_eq!(layout.stride(), 10);
    }

    #[test]
    fn test_repeated_group_rejected() {
        assert_eq!(
            VertexLayout::parse("f4f4"),
            Err(LayoutError::RepeatedGroup { position: 2, group: 'f' })
        );
    }

    #[test]
    fn test_bad_characters_rejected() {
        // No group before the first width
        assert!(matches!(
            VertexLayout::parse("44"),
            Err(LayoutError::UnexpectedChar { position: 0, found: '4' })
        ));
        // Floats have no 1-byte width
        assert!(matches!(
            VertexLayout::parse("f41"),
            Err(LayoutError::UnexpectedChar { position: 2, found: '1' })
        ));
        // Integers have no 3-byte width
        assert!(matches!(
            VertexLayout::parse("u3"),
            Err(LayoutError::UnexpectedChar { position: 1, found: '3' })
        ));
        // Group without data
        assert!(matches!(
            VertexLayout::parse("fs1"),
            Err(LayoutError::UnexpectedChar { position: 1, found: 's' })
        ));
        assert!(matches!(
            VertexLayout::parse("f4x"),
            Err(LayoutError::UnexpectedChar { position: 2, found: 'x' })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(VertexLayout::parse(""), Err(LayoutError::Empty));
    }

    #[test]
    fn test_header_form() {
        let layout = VertexLayout::fma_default();
        let mut out = Vec::new();
        layout.write_to(&mut out);
        assert_eq!(out.len(), layout.encoded_len());
        assert_eq!(&out[0..2], &15u16.to_le_bytes());
        assert_eq!(&out[2..17], FMA_VERTEX_LAYOUT.as_bytes());
        assert_eq!(out[17], 0);
    }
}
