//! Color utilities: hex parsing, RGBA8 packing, and the CPU reference for
//! the sRGB → linear → XYZ → CIELUV chain.
//!
//! The conversion constants here are shared verbatim with
//! `shaders/cieluv_common.wgsl`; the compute kernels must stay in
//! agreement with these functions within floating-point tolerance.

use crate::error::{Result, ViewerError};

/// An RGBA color. `r`, `g`, `b` are normalized to [0,1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: 1.0,
        }
    }
}

/// Parses a 7-character `#RRGGBB` string.
///
/// Quirk, kept for compatibility with existing callers: alpha is the
/// constant 255.0, NOT normalized to [0,1] like the other channels.
pub fn hex2rgb(hex: &str) -> Result<Color> {
    // Byte length and byte-indexed slicing below require ASCII; anything
    // else must fail as a configuration error, not a slice panic.
    if hex.len() != 7 || !hex.is_ascii() || !hex.starts_with('#') {
        return Err(ViewerError::InvalidConfiguration(format!(
            "expected #RRGGBB, got {:?}",
            hex
        )));
    }

    let channel = |range: std::ops::Range<usize>| -> Result<f32> {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| v as f32 / 255.0)
            .map_err(|_| ViewerError::InvalidConfiguration(format!("bad hex digits in {:?}", hex)))
    };

    Ok(Color {
        r: channel(1..3)?,
        g: channel(3..5)?,
        b: channel(5..7)?,
        a: 255.0,
    })
}

/// Packs normalized RGBA into one little-endian RGBA8 word, the layout the
/// image kernels read from the pixel-source buffer.
pub fn pack_rgba8(r: f32, g: f32, b: f32, a: f32) -> u32 {
    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    q(r) | (q(g) << 8) | (q(b) << 16) | (q(a) << 24)
}

/// Unpacks one RGBA8 word into normalized channels.
pub fn unpack_rgba8(px: u32) -> [f32; 4] {
    [
        (px & 0xFF) as f32 / 255.0,
        ((px >> 8) & 0xFF) as f32 / 255.0,
        ((px >> 16) & 0xFF) as f32 / 255.0,
        ((px >> 24) & 0xFF) as f32 / 255.0,
    ]
}

// --- CIE constants (D65 reference white) ---

const WHITE_U: f32 = 0.197_840;
const WHITE_V: f32 = 0.468_336;

/// Bounds used to map (L, u, v) into a renderable [0,1]³ box. Chosen to
/// contain the full sRGB gamut with a small margin.
pub const U_MIN: f32 = -140.0;
pub const U_MAX: f32 = 180.0;
pub const V_MIN: f32 = -140.0;
pub const V_MAX: f32 = 124.0;

/// sRGB transfer function, decode direction (IEC 61966-2-1).
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear sRGB to CIE XYZ (D65).
pub fn linear_to_xyz(r: f32, g: f32, b: f32) -> [f32; 3] {
    [
        0.4124 * r + 0.3576 * g + 0.1805 * b,
        0.2126 * r + 0.7152 * g + 0.0722 * b,
        0.0193 * r + 0.1192 * g + 0.9505 * b,
    ]
}

/// CIE XYZ to CIELUV. Returns (L*, u*, v*) with L* in [0,100].
pub fn xyz_to_luv(x: f32, y: f32, z: f32) -> [f32; 3] {
    // CIE threshold: (6/29)^3
    const EPS: f32 = 0.008_856_452;
    // (29/3)^3
    const KAPPA: f32 = 903.296_3;

    let l = if y > EPS {
        116.0 * y.cbrt() - 16.0
    } else {
        KAPPA * y
    };

    let denom = x + 15.0 * y + 3.0 * z;
    let (up, vp) = if denom > 1e-9 {
        (4.0 * x / denom, 9.0 * y / denom)
    } else {
        // Black maps to the white point's chromaticity so u* = v* = 0.
        (WHITE_U, WHITE_V)
    };

    [l, 13.0 * l * (up - WHITE_U), 13.0 * l * (vp - WHITE_V)]
}

/// Full chain: gamma-encoded sRGB to CIELUV.
pub fn srgb_to_luv(r: f32, g: f32, b: f32) -> [f32; 3] {
    let [x, y, z] = linear_to_xyz(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
    xyz_to_luv(x, y, z)
}

/// Maps (L*, u*, v*) into the [0,1]³ box the render pipeline expects:
/// x from u*, y from L*, z from v*.
pub fn luv_to_render_pos(l: f32, u: f32, v: f32) -> [f32; 3] {
    [
        (u - U_MIN) / (U_MAX - U_MIN),
        l / 100.0,
        (v - V_MIN) / (V_MAX - V_MIN),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hex2rgb_red() {
        let c = hex2rgb("#FF0000").unwrap();
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 0.0);
        assert_relative_eq!(c.b, 0.0);
        // Alpha quirk: constant 255, not normalized.
        assert_relative_eq!(c.a, 255.0);
    }

    #[test]
    fn hex2rgb_mixed() {
        let c = hex2rgb("#4080c0").unwrap();
        assert_relative_eq!(c.r, 64.0 / 255.0);
        assert_relative_eq!(c.g, 128.0 / 255.0);
        assert_relative_eq!(c.b, 192.0 / 255.0);
    }

    #[test]
    fn hex2rgb_rejects_bad_input() {
        assert!(matches!(
            hex2rgb("FF0000"),
            Err(ViewerError::InvalidConfiguration(_))
        ));
        assert!(hex2rgb("#FF00").is_err());
        assert!(hex2rgb("#GG0000").is_err());
    }

    #[test]
    fn hex2rgb_rejects_multibyte_input_without_panicking() {
        // 7 bytes but not 7 ASCII chars; byte 3 falls inside the euro
        // sign, so byte-indexed slicing must never be reached.
        assert!(matches!(
            hex2rgb("#\u{20AC}000"),
            Err(ViewerError::InvalidConfiguration(_))
        ));
        assert!(hex2rgb("#ÿÿ0000").is_err());
    }

    #[test]
    fn rgba8_round_trip_within_one_step() {
        for &(r, g, b, a) in &[
            (0.0, 0.0, 0.0, 0.0),
            (1.0, 1.0, 1.0, 1.0),
            (0.25, 0.5, 0.75, 1.0),
            (0.123, 0.456, 0.789, 0.5),
        ] {
            let [ur, ug, ub, ua] = unpack_rgba8(pack_rgba8(r, g, b, a));
            assert!((ur - r).abs() <= 1.0 / 255.0);
            assert!((ug - g).abs() <= 1.0 / 255.0);
            assert!((ub - b).abs() <= 1.0 / 255.0);
            assert!((ua - a).abs() <= 1.0 / 255.0);
        }
    }

    #[test]
    fn white_is_achromatic() {
        let [l, u, v] = srgb_to_luv(1.0, 1.0, 1.0);
        assert_relative_eq!(l, 100.0, epsilon = 0.05);
        assert_relative_eq!(u, 0.0, epsilon = 0.05);
        assert_relative_eq!(v, 0.0, epsilon = 0.05);
    }

    #[test]
    fn black_is_origin() {
        let [l, u, v] = srgb_to_luv(0.0, 0.0, 0.0);
        assert_relative_eq!(l, 0.0);
        assert_relative_eq!(u, 0.0);
        assert_relative_eq!(v, 0.0);
    }

    #[test]
    fn red_matches_cie_reference() {
        // Published CIELUV coordinates for sRGB primary red under D65.
        let [l, u, v] = srgb_to_luv(1.0, 0.0, 0.0);
        assert_relative_eq!(l, 53.23, epsilon = 0.05);
        assert_relative_eq!(u, 175.05, epsilon = 0.3);
        assert_relative_eq!(v, 37.75, epsilon = 0.3);
    }

    #[test]
    fn gamut_fits_render_box() {
        // Every corner of the sRGB cube must land inside [0,1]^3.
        for i in 0..8 {
            let r = (i & 1) as f32;
            let g = ((i >> 1) & 1) as f32;
            let b = ((i >> 2) & 1) as f32;
            let [l, u, v] = srgb_to_luv(r, g, b);
            let pos = luv_to_render_pos(l, u, v);
            for c in pos {
                assert!((0.0..=1.0).contains(&c), "corner {i} escaped: {pos:?}");
            }
        }
    }
}
