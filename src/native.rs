//! Codec-native pixel formats.
//!
//! A codec backend decodes into, and encodes from, its own set of pixel
//! formats. [`NativeFormat`] names that set. Three fixed tables connect it
//! to the catalog:
//!
//! - [`NativeFormat::pixel_format`]: exact native -> catalog mapping.
//! - [`NativeFormat::from_pixel_format`]: catalog -> native, with sRGB and
//!   depth formats aliased to their storage equivalents.
//! - [`NativeFormat::nearest_fit`]: the format a native format without a
//!   catalog entry is promoted to before conversion.

use crate::format::PixelFormat;

/// Pixel formats a codec backend produces or consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NativeFormat {
    // Indexed and gray
    Indexed1,
    Indexed2,
    Indexed4,
    Indexed8,
    BlackWhite,
    Gray2,
    Gray4,
    Gray8,
    Gray16,
    GrayFixed16,
    GrayHalf,
    GrayFixed32,
    GrayFloat,
    Alpha8,

    // 16 and 32 bit packed
    Bgr555,
    Bgr565,
    Bgra5551,
    Bgr101010,
    Rgba1010102,
    Rgba1010102XR,
    Rgbe,

    // 8 bits per channel
    Bgr24,
    Rgb24,
    Bgr32,
    Bgra32,
    Pbgra32,
    Rgba32,
    Prgba32,

    // 16 bits per channel
    Rgb48,
    Bgr48,
    Rgba64,
    Bgra64,
    Prgba64,
    Pbgra64,
    RgbFixed48,
    BgrFixed48,
    RgbaFixed64,
    BgraFixed64,
    RgbFixed64,
    RgbHalf48,
    RgbHalf64,
    RgbaHalf64,

    // 32 bits per channel
    RgbFixed96,
    Rgb128Float,
    Rgba128Float,
    Prgba128Float,
    RgbaFixed128,
    RgbFixed128,

    // Print and HDR
    Cmyk32,
    Cmyk64,
    CmykAlpha40,
    CmykAlpha80,
    /// 10-bit PQ-encoded video output; nothing in the catalog can hold it.
    Hdr10,
}

impl NativeFormat {
    /// Every native format, in declaration order.
    pub const ALL: &'static [NativeFormat] = &[
        Self::Indexed1,
        Self::Indexed2,
        Self::Indexed4,
        Self::Indexed8,
        Self::BlackWhite,
        Self::Gray2,
        Self::Gray4,
        Self::Gray8,
        Self::Gray16,
        Self::GrayFixed16,
        Self::GrayHalf,
        Self::GrayFixed32,
        Self::GrayFloat,
        Self::Alpha8,
        Self::Bgr555,
        Self::Bgr565,
        Self::Bgra5551,
        Self::Bgr101010,
        Self::Rgba1010102,
        Self::Rgba1010102XR,
        Self::Rgbe,
        Self::Bgr24,
        Self::Rgb24,
        Self::Bgr32,
        Self::Bgra32,
        Self::Pbgra32,
        Self::Rgba32,
        Self::Prgba32,
        Self::Rgb48,
        Self::Bgr48,
        Self::Rgba64,
        Self::Bgra64,
        Self::Prgba64,
        Self::Pbgra64,
        Self::RgbFixed48,
        Self::BgrFixed48,
        Self::RgbaFixed64,
        Self::BgraFixed64,
        Self::RgbFixed64,
        Self::RgbHalf48,
        Self::RgbHalf64,
        Self::RgbaHalf64,
        Self::RgbFixed96,
        Self::Rgb128Float,
        Self::Rgba128Float,
        Self::Prgba128Float,
        Self::RgbaFixed128,
        Self::RgbFixed128,
        Self::Cmyk32,
        Self::Cmyk64,
        Self::CmykAlpha40,
        Self::CmykAlpha80,
        Self::Hdr10,
    ];

    /// Bits per pixel of the native layout.
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Indexed1 | Self::BlackWhite => 1,
            Self::Indexed2 | Self::Gray2 => 2,
            Self::Indexed4 | Self::Gray4 => 4,
            Self::Indexed8 | Self::Gray8 | Self::Alpha8 => 8,
            Self::Gray16
            | Self::GrayFixed16
            | Self::GrayHalf
            | Self::Bgr555
            | Self::Bgr565
            | Self::Bgra5551 => 16,
            Self::Bgr24 | Self::Rgb24 => 24,
            Self::GrayFixed32
            | Self::GrayFloat
            | Self::Bgr101010
            | Self::Rgba1010102
            | Self::Rgba1010102XR
            | Self::Rgbe
            | Self::Bgr32
            | Self::Bgra32
            | Self::Pbgra32
            | Self::Rgba32
            | Self::Prgba32
            | Self::Cmyk32
            | Self::Hdr10 => 32,
            Self::CmykAlpha40 => 40,
            Self::Rgb48 | Self::Bgr48 | Self::RgbFixed48 | Self::BgrFixed48 | Self::RgbHalf48 => 48,
            Self::Rgba64
            | Self::Bgra64
            | Self::Prgba64
            | Self::Pbgra64
            | Self::RgbaFixed64
            | Self::BgraFixed64
            | Self::RgbFixed64
            | Self::RgbHalf64
            | Self::RgbaHalf64
            | Self::Cmyk64 => 64,
            Self::CmykAlpha80 => 80,
            Self::RgbFixed96 => 96,
            Self::Rgb128Float
            | Self::Rgba128Float
            | Self::Prgba128Float
            | Self::RgbaFixed128
            | Self::RgbFixed128 => 128,
        }
    }

    /// Whether the native layout carries alpha.
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Alpha8
                | Self::Bgra5551
                | Self::Rgba1010102
                | Self::Rgba1010102XR
                | Self::Bgra32
                | Self::Pbgra32
                | Self::Rgba32
                | Self::Prgba32
                | Self::Rgba64
                | Self::Bgra64
                | Self::Prgba64
                | Self::Pbgra64
                | Self::RgbaFixed64
                | Self::BgraFixed64
                | Self::RgbaHalf64
                | Self::Rgba128Float
                | Self::Prgba128Float
                | Self::RgbaFixed128
                | Self::CmykAlpha40
                | Self::CmykAlpha80
        )
    }

    /// Exact catalog format for this native format, if one exists.
    pub const fn pixel_format(self) -> Option<PixelFormat> {
        Some(match self {
            Self::Rgba128Float => PixelFormat::R32G32B32A32Float,
            Self::RgbaHalf64 => PixelFormat::R16G16B16A16Float,
            Self::Rgba64 => PixelFormat::R16G16B16A16UNorm,
            Self::Rgba32 => PixelFormat::R8G8B8A8UNorm,
            Self::Bgra32 => PixelFormat::B8G8R8A8UNorm,
            Self::Bgr32 => PixelFormat::B8G8R8X8UNorm,
            Self::Rgba1010102XR => PixelFormat::R10G10B10XrBiasA2UNorm,
            Self::Rgba1010102 => PixelFormat::R10G10B10A2UNorm,
            Self::Rgbe => PixelFormat::R9G9B9E5SharedExp,
            Self::Bgr565 => PixelFormat::B5G6R5UNorm,
            Self::Bgra5551 => PixelFormat::B5G5R5A1UNorm,
            Self::GrayFloat => PixelFormat::R32Float,
            Self::GrayHalf => PixelFormat::R16Float,
            Self::Gray16 => PixelFormat::R16UNorm,
            Self::Gray8 => PixelFormat::R8UNorm,
            Self::Alpha8 => PixelFormat::A8UNorm,
            Self::BlackWhite => PixelFormat::R1UNorm,
            _ => return None,
        })
    }

    /// Native format storing `format`, if the backend has one.
    ///
    /// sRGB and depth formats map to the native format with the same
    /// storage; the caller keeps track of the color space.
    pub const fn from_pixel_format(format: PixelFormat) -> Option<NativeFormat> {
        Some(match format {
            PixelFormat::R32G32B32A32Float => Self::Rgba128Float,
            PixelFormat::R16G16B16A16Float => Self::RgbaHalf64,
            PixelFormat::R16G16B16A16UNorm => Self::Rgba64,
            PixelFormat::R8G8B8A8UNorm | PixelFormat::R8G8B8A8UNormSrgb => Self::Rgba32,
            PixelFormat::B8G8R8A8UNorm | PixelFormat::B8G8R8A8UNormSrgb => Self::Bgra32,
            PixelFormat::B8G8R8X8UNorm | PixelFormat::B8G8R8X8UNormSrgb => Self::Bgr32,
            PixelFormat::R10G10B10XrBiasA2UNorm => Self::Rgba1010102XR,
            PixelFormat::R10G10B10A2UNorm => Self::Rgba1010102,
            PixelFormat::R9G9B9E5SharedExp => Self::Rgbe,
            PixelFormat::B5G6R5UNorm => Self::Bgr565,
            PixelFormat::B5G5R5A1UNorm => Self::Bgra5551,
            PixelFormat::R32Float | PixelFormat::D32Float => Self::GrayFloat,
            PixelFormat::R16Float => Self::GrayHalf,
            PixelFormat::R16UNorm | PixelFormat::D16UNorm => Self::Gray16,
            PixelFormat::R8UNorm => Self::Gray8,
            PixelFormat::A8UNorm => Self::Alpha8,
            PixelFormat::R1UNorm => Self::BlackWhite,
            _ => return None,
        })
    }

    /// Native format to decode into so the result has a catalog entry.
    ///
    /// Formats with an exact entry return themselves. Everything else is
    /// promoted to the closest format that holds it without visible loss.
    /// `None` means no catalog format can represent this one.
    pub const fn nearest_fit(self) -> Option<NativeFormat> {
        if self.pixel_format().is_some() {
            return Some(self);
        }
        Some(match self {
            Self::Indexed1 | Self::Indexed2 | Self::Indexed4 | Self::Indexed8 => Self::Rgba32,
            Self::Gray2 | Self::Gray4 => Self::Gray8,
            Self::GrayFixed16 => Self::GrayHalf,
            Self::GrayFixed32 => Self::GrayFloat,
            Self::Bgr555 => Self::Bgra5551,
            Self::Bgr101010 => Self::Rgba1010102,
            Self::Bgr24 | Self::Rgb24 => Self::Rgba32,
            Self::Pbgra32 | Self::Prgba32 => Self::Rgba32,
            Self::Rgb48 | Self::Bgr48 => Self::Rgba64,
            Self::Bgra64 | Self::Prgba64 | Self::Pbgra64 => Self::Rgba64,
            Self::RgbFixed48 | Self::BgrFixed48 => Self::RgbaHalf64,
            Self::RgbaFixed64 | Self::BgraFixed64 | Self::RgbFixed64 => Self::RgbaHalf64,
            Self::RgbHalf48 | Self::RgbHalf64 => Self::RgbaHalf64,
            Self::Prgba128Float | Self::Rgb128Float => Self::Rgba128Float,
            Self::RgbaFixed128 | Self::RgbFixed128 | Self::RgbFixed96 => Self::Rgba128Float,
            Self::Cmyk32 => Self::Rgba32,
            Self::Cmyk64 | Self::CmykAlpha40 | Self::CmykAlpha80 => Self::Rgba64,
            Self::Hdr10 => return None,
            // Exact-mapped formats returned above.
            other => other,
        })
    }
}
