//! sRGB transfer and premultiplied alpha over scanlines.
//!
//! Both operate on whole rows in place and only understand the 8-bit
//! RGBA/BGRA/BGRX families plus half-float and float RGBA. Red and blue are
//! treated alike, so RGBA and BGRA share one code path.

use half::f16;
use rgb::FromSlice;

use crate::error::ImagingError;
use crate::format::PixelFormat;

/// Direction of an sRGB transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    /// Linear light to sRGB-encoded.
    Encode,
    /// sRGB-encoded to linear light.
    Decode,
}

impl TransferDirection {
    /// Direction needed to move data from `from` to `to`, if their sRGB
    /// flags differ.
    pub const fn between(from: PixelFormat, to: PixelFormat) -> Option<Self> {
        match (from.is_srgb(), to.is_srgb()) {
            (false, true) => Some(Self::Encode),
            (true, false) => Some(Self::Decode),
            _ => None,
        }
    }

    #[inline]
    fn apply(self, v: f32) -> f32 {
        match self {
            Self::Encode => linear_to_srgb(v),
            Self::Decode => srgb_to_linear(v),
        }
    }
}

/// sRGB electro-optical transfer: encoded value to linear light.
#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Inverse of [`srgb_to_linear`].
#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    /// Four 8-bit channels, alpha last.
    U8 { alpha: bool },
    /// Four half floats.
    F16,
    /// Four f32.
    F32,
}

const fn layout(format: PixelFormat) -> Option<Layout> {
    use PixelFormat as F;
    match format {
        F::R8G8B8A8Typeless
        | F::R8G8B8A8UNorm
        | F::R8G8B8A8UNormSrgb
        | F::B8G8R8A8Typeless
        | F::B8G8R8A8UNorm
        | F::B8G8R8A8UNormSrgb => Some(Layout::U8 { alpha: true }),
        F::B8G8R8X8Typeless | F::B8G8R8X8UNorm | F::B8G8R8X8UNormSrgb => {
            Some(Layout::U8 { alpha: false })
        }
        F::R16G16B16A16Float => Some(Layout::F16),
        F::R32G32B32A32Float => Some(Layout::F32),
        _ => None,
    }
}

/// Whether [`transfer_scanline`] understands `format`.
pub const fn supports_transfer(format: PixelFormat) -> bool {
    layout(format).is_some()
}

/// Whether [`premultiply_scanline`] understands `format`.
pub const fn supports_premultiply(format: PixelFormat) -> bool {
    matches!(
        layout(format),
        Some(Layout::U8 { alpha: true } | Layout::F16 | Layout::F32)
    )
}

fn for_each_f16(row: &mut [u8], mut f: impl FnMut(&mut [f32; 4])) {
    for px in row.chunks_exact_mut(8) {
        let mut v = [0f32; 4];
        for (c, bytes) in v.iter_mut().zip(px.chunks_exact(2)) {
            *c = f16::from_bits(u16::from_le_bytes([bytes[0], bytes[1]])).to_f32();
        }
        f(&mut v);
        for (c, bytes) in v.iter().zip(px.chunks_exact_mut(2)) {
            bytes.copy_from_slice(&f16::from_f32(*c).to_bits().to_le_bytes());
        }
    }
}

fn for_each_f32(row: &mut [u8], mut f: impl FnMut(&mut [f32; 4])) {
    for px in row.chunks_exact_mut(16) {
        let mut v = [0f32; 4];
        for (c, bytes) in v.iter_mut().zip(px.chunks_exact(4)) {
            *c = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        f(&mut v);
        for (c, bytes) in v.iter().zip(px.chunks_exact_mut(4)) {
            bytes.copy_from_slice(&c.to_le_bytes());
        }
    }
}

fn transfer_lut(direction: TransferDirection) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, out) in lut.iter_mut().enumerate() {
        let v = direction.apply(i as f32 / 255.0);
        *out = (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    }
    lut
}

/// Apply the sRGB transfer to the color channels of one row in place.
/// Alpha is untouched.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] if [`supports_transfer`] is false.
pub fn transfer_scanline(
    row: &mut [u8],
    format: PixelFormat,
    direction: TransferDirection,
) -> Result<(), ImagingError> {
    match layout(format) {
        Some(Layout::U8 { .. }) => {
            let lut = transfer_lut(direction);
            for px in row.as_rgba_mut() {
                px.r = lut[px.r as usize];
                px.g = lut[px.g as usize];
                px.b = lut[px.b as usize];
            }
        }
        Some(Layout::F16) => for_each_f16(row, |v| {
            for c in &mut v[..3] {
                *c = direction.apply(*c);
            }
        }),
        Some(Layout::F32) => for_each_f32(row, |v| {
            for c in &mut v[..3] {
                *c = direction.apply(*c);
            }
        }),
        None => return Err(ImagingError::UnsupportedFormat(format)),
    }
    Ok(())
}

/// Multiply color channels by alpha in place.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] if [`supports_premultiply`] is false.
pub fn premultiply_scanline(row: &mut [u8], format: PixelFormat) -> Result<(), ImagingError> {
    match layout(format) {
        Some(Layout::U8 { alpha: true }) => {
            for px in row.as_rgba_mut() {
                let a = px.a as u32;
                px.r = ((px.r as u32 * a + 127) / 255) as u8;
                px.g = ((px.g as u32 * a + 127) / 255) as u8;
                px.b = ((px.b as u32 * a + 127) / 255) as u8;
            }
        }
        Some(Layout::F16) => for_each_f16(row, premultiply_f32),
        Some(Layout::F32) => for_each_f32(row, premultiply_f32),
        _ => return Err(ImagingError::UnsupportedFormat(format)),
    }
    Ok(())
}

/// Divide color channels by alpha in place. Pixels with zero alpha are
/// left as they are.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] if [`supports_premultiply`] is false.
pub fn unpremultiply_scanline(row: &mut [u8], format: PixelFormat) -> Result<(), ImagingError> {
    match layout(format) {
        Some(Layout::U8 { alpha: true }) => {
            for px in row.as_rgba_mut() {
                let a = px.a as u32;
                if a == 0 {
                    continue;
                }
                px.r = ((px.r as u32 * 255 + a / 2) / a).min(255) as u8;
                px.g = ((px.g as u32 * 255 + a / 2) / a).min(255) as u8;
                px.b = ((px.b as u32 * 255 + a / 2) / a).min(255) as u8;
            }
        }
        Some(Layout::F16) => for_each_f16(row, unpremultiply_f32),
        Some(Layout::F32) => for_each_f32(row, unpremultiply_f32),
        _ => return Err(ImagingError::UnsupportedFormat(format)),
    }
    Ok(())
}

fn premultiply_f32(v: &mut [f32; 4]) {
    let a = v[3];
    for c in &mut v[..3] {
        *c *= a;
    }
}

fn unpremultiply_f32(v: &mut [f32; 4]) {
    let a = v[3];
    if a != 0.0 {
        for c in &mut v[..3] {
            *c /= a;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn transfer_curve_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
        // Mid grey: sRGB 0.5 is about 21.4% linear.
        assert!((srgb_to_linear(0.5) - 0.2140).abs() < 1e-3);
    }

    #[test]
    fn transfer_curve_inverts() {
        for i in 0..=100 {
            let v = i as f32 / 100.0;
            assert!((linear_to_srgb(srgb_to_linear(v)) - v).abs() < 1e-5, "{v}");
        }
    }

    #[test]
    fn direction_between_formats() {
        assert_eq!(
            TransferDirection::between(PixelFormat::R8G8B8A8UNorm, PixelFormat::R8G8B8A8UNormSrgb),
            Some(TransferDirection::Encode)
        );
        assert_eq!(
            TransferDirection::between(PixelFormat::B8G8R8A8UNormSrgb, PixelFormat::R8G8B8A8UNorm),
            Some(TransferDirection::Decode)
        );
        assert_eq!(
            TransferDirection::between(PixelFormat::R8G8B8A8UNorm, PixelFormat::B8G8R8A8UNorm),
            None
        );
    }

    #[test]
    fn transfer_u8_keeps_alpha_and_extremes() {
        let mut row = [0u8, 128, 255, 77];
        transfer_scanline(&mut row, PixelFormat::R8G8B8A8UNorm, TransferDirection::Decode).unwrap();
        assert_eq!(row[0], 0);
        assert!(row[1] < 128, "decoding darkens midtones, got {}", row[1]);
        assert_eq!(row[2], 255);
        assert_eq!(row[3], 77);
    }

    #[test]
    fn transfer_f32_row() {
        let mut row: Vec<u8> = [0.5f32, 0.0, 1.0, 0.25].iter().flat_map(|v| v.to_le_bytes()).collect();
        transfer_scanline(&mut row, PixelFormat::R32G32B32A32Float, TransferDirection::Decode).unwrap();
        let r = f32::from_le_bytes([row[0], row[1], row[2], row[3]]);
        let a = f32::from_le_bytes([row[12], row[13], row[14], row[15]]);
        assert!((r - 0.2140).abs() < 1e-3);
        assert_eq!(a, 0.25);
    }

    #[test]
    fn transfer_rejects_other_formats() {
        let mut row = [0u8; 4];
        assert!(matches!(
            transfer_scanline(&mut row, PixelFormat::R10G10B10A2UNorm, TransferDirection::Encode),
            Err(ImagingError::UnsupportedFormat(PixelFormat::R10G10B10A2UNorm))
        ));
    }

    #[test]
    fn premultiply_u8() {
        let mut row = [200u8, 100, 50, 128, 10, 20, 30, 0];
        premultiply_scanline(&mut row, PixelFormat::B8G8R8A8UNorm).unwrap();
        assert_eq!(row, [100, 50, 25, 128, 0, 0, 0, 0]);
    }

    #[test]
    fn unpremultiply_u8_reverses_premultiply() {
        let mut row = [100u8, 50, 25, 128, 3, 4, 5, 0];
        unpremultiply_scanline(&mut row, PixelFormat::R8G8B8A8UNorm).unwrap();
        assert_eq!(row, [199, 100, 50, 128, 3, 4, 5, 0]);
    }

    #[test]
    fn premultiply_half() {
        let mut row: Vec<u8> = [1.0f32, 0.5, 0.25, 0.5]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_bits().to_le_bytes())
            .collect();
        premultiply_scanline(&mut row, PixelFormat::R16G16B16A16Float).unwrap();
        let r = f16::from_bits(u16::from_le_bytes([row[0], row[1]])).to_f32();
        assert_eq!(r, 0.5);
        unpremultiply_scanline(&mut row, PixelFormat::R16G16B16A16Float).unwrap();
        let r = f16::from_bits(u16::from_le_bytes([row[0], row[1]])).to_f32();
        assert_eq!(r, 1.0);
    }

    #[test]
    fn premultiply_needs_alpha() {
        let mut row = [0u8; 4];
        assert!(!supports_premultiply(PixelFormat::B8G8R8X8UNorm));
        assert!(premultiply_scanline(&mut row, PixelFormat::B8G8R8X8UNorm).is_err());
        assert!(supports_transfer(PixelFormat::B8G8R8X8UNorm));
    }
}
