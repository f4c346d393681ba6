//! Color and vector packing utilities
//!
//! Provides the conversions the exporters apply before data reaches a record:
//! - f32 → unorm8 color channels, packed as RGBA8 in a u32
//! - source axis convention → FMA axis convention
//! - NaN-free vector normalization

// ============================================================================
// Color Packing
// ============================================================================

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255], truncating.
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0) as u8
}

/// Pack an RGBA color (f32x4) as `0xRRGGBBAA`
#[inline]
pub fn pack_color_rgba(r: f32, g: f32, b: f32, a: f32) -> u32 {
    u32::from_be_bytes([
        f32_to_unorm8(r),
        f32_to_unorm8(g),
        f32_to_unorm8(b),
        f32_to_unorm8(a),
    ])
}

/// Pack an RGB color (f32x3) with alpha = 255
#[inline]
pub fn pack_color_rgb(r: f32, g: f32, b: f32) -> u32 {
    pack_color_rgba(r, g, b, 1.0)
}

// ============================================================================
// Axis Conversion
// ============================================================================

/// Convert a Z-up, Y-forward vector to FMA axes: `(x, y, z) -> (x, z, -y)`.
///
/// Used for positions, normals and tangents.
#[inline]
pub fn to_fma_axes([x, y, z]: [f32; 3]) -> [f32; 3] {
    [x, z, -y]
}

/// Swap Y and Z without negation: `(x, y, z) -> (x, z, y)`.
///
/// Used for Euler rotations and scales, which carry no direction.
#[inline]
pub fn swap_yz([x, y, z]: [f32; 3]) -> [f32; 3] {
    [x, z, y]
}

// ============================================================================
// Vectors
// ============================================================================

/// Fallback direction for zero-length vectors.
pub const FALLBACK_AXIS: [f32; 3] = [1.0, 0.0, 0.0];

/// Normalize `v`, returning [`FALLBACK_AXIS`] for a zero or non-finite length.
#[inline]
pub fn normalize_or_fallback([x, y, z]: [f32; 3]) -> [f32; 3] {
    let len = (x * x + y * y + z * z).sqrt();
    if len == 0.0 || !len.is_finite() {
        return FALLBACK_AXIS;
    }
    [x / len, y / len, z / len]
}
