//! Pixel format catalog.
//!
//! [`PixelFormat`] is the closed set of in-memory pixel formats this crate
//! can lay out. [`PixelFormatInfo`] carries the static facts about each one:
//! bit depth, channel count, block compression, and how (and whether) the
//! format stores alpha. Row and slice pitches are derived from it with
//! [`PixelFormatInfo::pitch`].

use core::fmt;

/// In-memory pixel formats known to the catalog.
///
/// Names follow the component order of the bits in a little-endian word,
/// lowest bits first (`R8G8B8A8` stores red in byte 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    R32G32B32A32Typeless,
    R32G32B32A32Float,
    R32G32B32A32UInt,
    R32G32B32A32SInt,
    R32G32B32Float,
    R16G16B16A16Typeless,
    R16G16B16A16Float,
    R16G16B16A16UNorm,
    R16G16B16A16UInt,
    R16G16B16A16SNorm,
    R16G16B16A16SInt,
    R10G10B10A2Typeless,
    R10G10B10A2UNorm,
    R10G10B10A2UInt,
    /// 10:10:10:2 with the extended-range (XR) bias applied to color.
    R10G10B10XrBiasA2UNorm,
    R9G9B9E5SharedExp,
    R8G8B8A8Typeless,
    R8G8B8A8UNorm,
    R8G8B8A8UNormSrgb,
    R8G8B8A8UInt,
    R8G8B8A8SNorm,
    R8G8B8A8SInt,
    B8G8R8A8Typeless,
    B8G8R8A8UNorm,
    B8G8R8A8UNormSrgb,
    B8G8R8X8Typeless,
    B8G8R8X8UNorm,
    B8G8R8X8UNormSrgb,
    /// Packed 4:2:2, two pixels share one `R8G8_B8G8` word.
    R8G8B8G8UNorm,
    /// Packed 4:2:2, two pixels share one `G8R8_G8B8` word.
    G8R8G8B8UNorm,
    B5G6R5UNorm,
    B5G5R5A1UNorm,
    B4G4R4A4UNorm,
    R32Float,
    D32Float,
    R16Float,
    R16UNorm,
    D16UNorm,
    R8UNorm,
    A8UNorm,
    /// One bit per pixel monochrome.
    R1UNorm,
    Bc1UNorm,
    Bc1UNormSrgb,
    Bc2UNorm,
    Bc2UNormSrgb,
    Bc3UNorm,
    Bc3UNormSrgb,
    Bc4UNorm,
    Bc4SNorm,
    Bc5UNorm,
    Bc5SNorm,
    Bc6hUf16,
    Bc6hSf16,
    Bc7UNorm,
    Bc7UNormSrgb,
}

impl PixelFormat {
    /// Every format in the catalog, in declaration order.
    pub const ALL: &'static [PixelFormat] = &[
        Self::R32G32B32A32Typeless,
        Self::R32G32B32A32Float,
        Self::R32G32B32A32UInt,
        Self::R32G32B32A32SInt,
        Self::R32G32B32Float,
        Self::R16G16B16A16Typeless,
        Self::R16G16B16A16Float,
        Self::R16G16B16A16UNorm,
        Self::R16G16B16A16UInt,
        Self::R16G16B16A16SNorm,
        Self::R16G16B16A16SInt,
        Self::R10G10B10A2Typeless,
        Self::R10G10B10A2UNorm,
        Self::R10G10B10A2UInt,
        Self::R10G10B10XrBiasA2UNorm,
        Self::R9G9B9E5SharedExp,
        Self::R8G8B8A8Typeless,
        Self::R8G8B8A8UNorm,
        Self::R8G8B8A8UNormSrgb,
        Self::R8G8B8A8UInt,
        Self::R8G8B8A8SNorm,
        Self::R8G8B8A8SInt,
        Self::B8G8R8A8Typeless,
        Self::B8G8R8A8UNorm,
        Self::B8G8R8A8UNormSrgb,
        Self::B8G8R8X8Typeless,
        Self::B8G8R8X8UNorm,
        Self::B8G8R8X8UNormSrgb,
        Self::R8G8B8G8UNorm,
        Self::G8R8G8B8UNorm,
        Self::B5G6R5UNorm,
        Self::B5G5R5A1UNorm,
        Self::B4G4R4A4UNorm,
        Self::R32Float,
        Self::D32Float,
        Self::R16Float,
        Self::R16UNorm,
        Self::D16UNorm,
        Self::R8UNorm,
        Self::A8UNorm,
        Self::R1UNorm,
        Self::Bc1UNorm,
        Self::Bc1UNormSrgb,
        Self::Bc2UNorm,
        Self::Bc2UNormSrgb,
        Self::Bc3UNorm,
        Self::Bc3UNormSrgb,
        Self::Bc4UNorm,
        Self::Bc4SNorm,
        Self::Bc5UNorm,
        Self::Bc5SNorm,
        Self::Bc6hUf16,
        Self::Bc6hSf16,
        Self::Bc7UNorm,
        Self::Bc7UNormSrgb,
    ];

    /// Static catalog entry for this format.
    pub const fn info(self) -> PixelFormatInfo {
        use AlphaEncoding as A;
        let i = PixelFormatInfo::linear;
        match self {
            Self::R32G32B32A32Typeless => i(self, 128, 4, A::Typeless, 32).typeless(),
            Self::R32G32B32A32Float => i(self, 128, 4, A::Float, 32),
            Self::R32G32B32A32UInt => i(self, 128, 4, A::UInt, 32),
            Self::R32G32B32A32SInt => i(self, 128, 4, A::SInt, 32),
            Self::R32G32B32Float => i(self, 96, 3, A::None, 0),
            Self::R16G16B16A16Typeless => i(self, 64, 4, A::Typeless, 16).typeless(),
            Self::R16G16B16A16Float => i(self, 64, 4, A::Float, 16),
            Self::R16G16B16A16UNorm => i(self, 64, 4, A::UNorm, 16),
            Self::R16G16B16A16UInt => i(self, 64, 4, A::UInt, 16),
            Self::R16G16B16A16SNorm => i(self, 64, 4, A::SNorm, 16),
            Self::R16G16B16A16SInt => i(self, 64, 4, A::SInt, 16),
            Self::R10G10B10A2Typeless => i(self, 32, 4, A::Typeless, 2).typeless(),
            Self::R10G10B10A2UNorm | Self::R10G10B10XrBiasA2UNorm => i(self, 32, 4, A::UNorm, 2),
            Self::R10G10B10A2UInt => i(self, 32, 4, A::UInt, 2),
            Self::R9G9B9E5SharedExp => i(self, 32, 3, A::None, 0),
            Self::R8G8B8A8Typeless => i(self, 32, 4, A::Typeless, 8).typeless(),
            Self::R8G8B8A8UNorm => i(self, 32, 4, A::UNorm, 8),
            Self::R8G8B8A8UNormSrgb => i(self, 32, 4, A::UNorm, 8).srgb(),
            Self::R8G8B8A8UInt => i(self, 32, 4, A::UInt, 8),
            Self::R8G8B8A8SNorm => i(self, 32, 4, A::SNorm, 8),
            Self::R8G8B8A8SInt => i(self, 32, 4, A::SInt, 8),
            Self::B8G8R8A8Typeless => i(self, 32, 4, A::Typeless, 8).typeless(),
            Self::B8G8R8A8UNorm => i(self, 32, 4, A::UNorm, 8),
            Self::B8G8R8A8UNormSrgb => i(self, 32, 4, A::UNorm, 8).srgb(),
            Self::B8G8R8X8Typeless => i(self, 32, 4, A::None, 0).typeless(),
            Self::B8G8R8X8UNorm => i(self, 32, 4, A::None, 0),
            Self::B8G8R8X8UNormSrgb => i(self, 32, 4, A::None, 0).srgb(),
            Self::R8G8B8G8UNorm | Self::G8R8G8B8UNorm => i(self, 16, 4, A::None, 0).packed(),
            Self::B5G6R5UNorm => i(self, 16, 3, A::None, 0),
            Self::B5G5R5A1UNorm => i(self, 16, 4, A::UNorm, 1),
            Self::B4G4R4A4UNorm => i(self, 16, 4, A::UNorm, 4),
            Self::R32Float | Self::D32Float => i(self, 32, 1, A::None, 0),
            Self::R16Float | Self::R16UNorm | Self::D16UNorm => i(self, 16, 1, A::None, 0),
            Self::R8UNorm => i(self, 8, 1, A::None, 0),
            Self::A8UNorm => i(self, 8, 1, A::UNorm, 8),
            Self::R1UNorm => i(self, 1, 1, A::None, 0),
            Self::Bc1UNorm => i(self, 4, 4, A::UNorm, 1).block(8),
            Self::Bc1UNormSrgb => i(self, 4, 4, A::UNorm, 1).block(8).srgb(),
            Self::Bc2UNorm => i(self, 8, 4, A::UNorm, 4).block(16),
            Self::Bc2UNormSrgb => i(self, 8, 4, A::UNorm, 4).block(16).srgb(),
            Self::Bc3UNorm => i(self, 8, 4, A::UNorm, 8).block(16),
            Self::Bc3UNormSrgb => i(self, 8, 4, A::UNorm, 8).block(16).srgb(),
            Self::Bc4UNorm | Self::Bc4SNorm => i(self, 4, 1, A::None, 0).block(8),
            Self::Bc5UNorm | Self::Bc5SNorm => i(self, 8, 2, A::None, 0).block(16),
            Self::Bc6hUf16 | Self::Bc6hSf16 => i(self, 8, 3, A::None, 0).block(16),
            Self::Bc7UNorm => i(self, 8, 4, A::UNorm, 8).block(16),
            Self::Bc7UNormSrgb => i(self, 8, 4, A::UNorm, 8).block(16).srgb(),
        }
    }

    /// Whether the format stores sRGB-encoded color.
    #[inline]
    pub const fn is_srgb(self) -> bool {
        self.info().srgb
    }

    /// Whether the format is block compressed.
    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.info().block_bytes != 0
    }

    /// Whether the format carries an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        !matches!(self.info().alpha, AlphaEncoding::None)
    }

    /// The linear (non-sRGB) format with identical storage, or `self`.
    pub const fn linear_equivalent(self) -> Self {
        match self {
            Self::R8G8B8A8UNormSrgb => Self::R8G8B8A8UNorm,
            Self::B8G8R8A8UNormSrgb => Self::B8G8R8A8UNorm,
            Self::B8G8R8X8UNormSrgb => Self::B8G8R8X8UNorm,
            Self::Bc1UNormSrgb => Self::Bc1UNorm,
            Self::Bc2UNormSrgb => Self::Bc2UNorm,
            Self::Bc3UNormSrgb => Self::Bc3UNorm,
            Self::Bc7UNormSrgb => Self::Bc7UNorm,
            other => other,
        }
    }

    /// Whether two formats share the exact same bit layout, so a straight
    /// memory copy converts one into the other (color space aside).
    pub fn storage_equivalent(self, other: Self) -> bool {
        fn storage(f: PixelFormat) -> PixelFormat {
            match f.linear_equivalent() {
                PixelFormat::R8G8B8A8Typeless => PixelFormat::R8G8B8A8UNorm,
                PixelFormat::B8G8R8A8Typeless => PixelFormat::B8G8R8A8UNorm,
                PixelFormat::B8G8R8X8Typeless => PixelFormat::B8G8R8X8UNorm,
                PixelFormat::R10G10B10A2Typeless => PixelFormat::R10G10B10A2UNorm,
                PixelFormat::R16G16B16A16Typeless => PixelFormat::R16G16B16A16UNorm,
                PixelFormat::R32G32B32A32Typeless => PixelFormat::R32G32B32A32UInt,
                PixelFormat::D32Float => PixelFormat::R32Float,
                PixelFormat::D16UNorm => PixelFormat::R16UNorm,
                other => other,
            }
        }
        storage(self) == storage(other)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a format encodes its alpha channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AlphaEncoding {
    /// No alpha channel.
    None,
    /// Unsigned normalized integer.
    UNorm,
    /// Signed normalized integer.
    SNorm,
    /// Unsigned integer.
    UInt,
    /// Signed integer.
    SInt,
    /// IEEE float (half or single, per the alpha bit width).
    Float,
    /// Typeless storage; treated as unsigned.
    Typeless,
}

impl AlphaEncoding {
    /// Whether the encoding is signed (the top alpha bit is a sign bit).
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::SNorm | Self::SInt)
    }
}

/// Static facts about a [`PixelFormat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct PixelFormatInfo {
    /// The format described.
    pub format: PixelFormat,
    /// Bits per pixel. For block-compressed formats this is the average.
    pub bit_depth: u16,
    /// Number of color/alpha channels.
    pub channel_count: u8,
    /// Alpha encoding, [`AlphaEncoding::None`] if there is no alpha.
    pub alpha: AlphaEncoding,
    /// Width of the alpha channel in bits.
    pub alpha_bits: u8,
    /// Bytes per 4x4 block, 0 for uncompressed formats.
    pub block_bytes: u8,
    /// Two pixels share one packed word (4:2:2 formats).
    pub packed: bool,
    /// Color is sRGB encoded.
    pub srgb: bool,
    /// Storage without a fixed numeric interpretation.
    pub typeless: bool,
}

impl PixelFormatInfo {
    const fn linear(
        format: PixelFormat,
        bit_depth: u16,
        channel_count: u8,
        alpha: AlphaEncoding,
        alpha_bits: u8,
    ) -> Self {
        Self {
            format,
            bit_depth,
            channel_count,
            alpha,
            alpha_bits,
            block_bytes: 0,
            packed: false,
            srgb: false,
            typeless: false,
        }
    }

    const fn srgb(mut self) -> Self {
        self.srgb = true;
        self
    }

    const fn typeless(mut self) -> Self {
        self.typeless = true;
        self
    }

    const fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    const fn block(mut self, bytes: u8) -> Self {
        self.block_bytes = bytes;
        self
    }

    /// Whether the format is block compressed.
    #[inline]
    pub const fn is_compressed(&self) -> bool {
        self.block_bytes != 0
    }

    /// Whole bytes per pixel, or `None` for compressed and sub-byte formats.
    pub const fn bytes_per_pixel(&self) -> Option<usize> {
        if self.is_compressed() || self.bit_depth % 8 != 0 {
            None
        } else {
            Some(self.bit_depth as usize / 8)
        }
    }

    /// Row and slice pitch for a `width` x `height` surface of this format.
    ///
    /// Compressed formats pitch by block row; packed 4:2:2 formats by pixel
    /// pair; everything else by bits per pixel, rounded up to a whole byte
    /// (or to the alignment requested in `options`).
    pub const fn pitch(&self, width: u32, height: u32, options: PitchOptions) -> PitchLayout {
        let width = width as u64;
        let height = height as u64;

        if self.is_compressed() {
            let blocks_wide = if width > 0 { width.div_ceil(4) } else { 0 };
            let blocks_high = if height > 0 { height.div_ceil(4) } else { 0 };
            let row_pitch = blocks_wide * self.block_bytes as u64;
            return PitchLayout {
                row_pitch,
                slice_pitch: row_pitch * blocks_high,
                blocks_wide: blocks_wide as u32,
                blocks_high: blocks_high as u32,
            };
        }

        if self.packed {
            let row_pitch = ((width + 1) >> 1) << 2;
            return PitchLayout {
                row_pitch,
                slice_pitch: row_pitch * height,
                blocks_wide: 0,
                blocks_high: 0,
            };
        }

        let bpp = match options.bits_per_pixel {
            Some(bits) => bits as u64,
            None => self.bit_depth as u64,
        };
        let bits = width * bpp;
        let row_pitch = match options.alignment {
            RowAlignment::Tight => bits.div_ceil(8),
            RowAlignment::LegacyDword => bits.div_ceil(32) * 4,
            RowAlignment::Align16 => bits.div_ceil(128) * 16,
            RowAlignment::Align32 => bits.div_ceil(256) * 32,
            RowAlignment::Align64 => bits.div_ceil(512) * 64,
            RowAlignment::Align4K => bits.div_ceil(32768) * 4096,
        };

        PitchLayout {
            row_pitch,
            slice_pitch: row_pitch * height,
            blocks_wide: 0,
            blocks_high: 0,
        }
    }

    /// Number of scanlines needed to store `height` rows (block rows for
    /// compressed formats).
    pub const fn scanline_count(&self, height: u32) -> u32 {
        if self.is_compressed() {
            height.div_ceil(4)
        } else {
            height
        }
    }
}

/// Row and slice pitch of one surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchLayout {
    /// Bytes between the starts of consecutive scanlines (or block rows).
    pub row_pitch: u64,
    /// Bytes for the whole surface.
    pub slice_pitch: u64,
    /// 4x4 blocks per row (compressed formats only).
    pub blocks_wide: u32,
    /// 4x4 block rows (compressed formats only).
    pub blocks_high: u32,
}

/// Row alignment applied to linear formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RowAlignment {
    /// Round up to a whole byte only.
    #[default]
    Tight,
    /// Round up to four bytes, as old DirectDraw surfaces assumed.
    LegacyDword,
    /// Round up to 16 bytes.
    Align16,
    /// Round up to 32 bytes.
    Align32,
    /// Round up to 64 bytes.
    Align64,
    /// Round up to 4096 bytes.
    Align4K,
}

/// Options that influence row pitch.
///
/// The default is tight packing at the format's own bit depth, which is
/// what image layouts use. The other settings exist for reading data
/// written with legacy pitch assumptions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PitchOptions {
    alignment: RowAlignment,
    bits_per_pixel: Option<u8>,
}

impl PitchOptions {
    /// Tight packing at the format's bit depth.
    pub const fn new() -> Self {
        Self {
            alignment: RowAlignment::Tight,
            bits_per_pixel: None,
        }
    }

    /// Set the row alignment.
    pub const fn with_alignment(mut self, alignment: RowAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Override the bits per pixel used for the pitch (8, 16 or 24 in
    /// legacy data).
    pub const fn with_bits_per_pixel(mut self, bits: u8) -> Self {
        self.bits_per_pixel = Some(bits);
        self
    }

    /// Row alignment in effect.
    pub const fn alignment(&self) -> RowAlignment {
        self.alignment
    }

    /// Bits-per-pixel override, if any.
    pub const fn bits_per_pixel(&self) -> Option<u8> {
        self.bits_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_every_format_once() {
        for (i, a) in PixelFormat::ALL.iter().enumerate() {
            assert_eq!(a.info().format, *a);
            for b in &PixelFormat::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::R32G32B32A32Float.info().bytes_per_pixel(), Some(16));
        assert_eq!(PixelFormat::R16G16B16A16UNorm.info().bytes_per_pixel(), Some(8));
        assert_eq!(PixelFormat::R8G8B8A8UNorm.info().bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::B5G6R5UNorm.info().bytes_per_pixel(), Some(2));
        assert_eq!(PixelFormat::A8UNorm.info().bytes_per_pixel(), Some(1));
        assert_eq!(PixelFormat::R1UNorm.info().bytes_per_pixel(), None);
        assert_eq!(PixelFormat::Bc1UNorm.info().bytes_per_pixel(), None);
    }

    #[test]
    fn alpha_facts() {
        assert!(PixelFormat::B5G5R5A1UNorm.has_alpha());
        assert_eq!(PixelFormat::B5G5R5A1UNorm.info().alpha_bits, 1);
        assert!(!PixelFormat::B8G8R8X8UNorm.has_alpha());
        assert!(!PixelFormat::B5G6R5UNorm.has_alpha());
        assert!(PixelFormat::R8G8B8A8SInt.info().alpha.is_signed());
        assert!(!PixelFormat::R16G16B16A16Float.info().alpha.is_signed());
    }

    #[test]
    fn linear_pitch() {
        let layout = PixelFormat::R8G8B8A8UNorm
            .info()
            .pitch(320, 200, PitchOptions::new());
        assert_eq!(layout.row_pitch, 1280);
        assert_eq!(layout.slice_pitch, 256_000);
    }

    #[test]
    fn compressed_pitch() {
        let bc1 = PixelFormat::Bc1UNorm.info().pitch(320, 200, PitchOptions::new());
        assert_eq!(bc1.row_pitch, 640);
        assert_eq!(bc1.slice_pitch, 32_000);
        assert_eq!(bc1.blocks_wide, 80);
        assert_eq!(bc1.blocks_high, 50);

        let bc7 = PixelFormat::Bc7UNorm.info().pitch(320, 200, PitchOptions::new());
        assert_eq!(bc7.row_pitch, 1280);
        assert_eq!(bc7.slice_pitch, 64_000);

        // A 1x1 mip still occupies a whole block.
        let tiny = PixelFormat::Bc3UNorm.info().pitch(1, 1, PitchOptions::new());
        assert_eq!(tiny.row_pitch, 16);
        assert_eq!(tiny.slice_pitch, 16);
    }

    #[test]
    fn packed_pitch() {
        let layout = PixelFormat::R8G8B8G8UNorm
            .info()
            .pitch(320, 200, PitchOptions::new());
        assert_eq!(layout.row_pitch, 640);
        assert_eq!(layout.slice_pitch, 128_000);
    }

    #[test]
    fn sub_byte_pitch_rounds_up() {
        let layout = PixelFormat::R1UNorm.info().pitch(9, 2, PitchOptions::new());
        assert_eq!(layout.row_pitch, 2);
        assert_eq!(layout.slice_pitch, 4);
    }

    #[test]
    fn legacy_alignment() {
        let info = PixelFormat::R8UNorm.info();
        let dword = info.pitch(
            5,
            1,
            PitchOptions::new().with_alignment(RowAlignment::LegacyDword),
        );
        assert_eq!(dword.row_pitch, 8);

        let bpp24 = PixelFormat::R8G8B8A8UNorm.info().pitch(
            3,
            1,
            PitchOptions::new()
                .with_alignment(RowAlignment::LegacyDword)
                .with_bits_per_pixel(24),
        );
        assert_eq!(bpp24.row_pitch, 12);

        let aligned = info.pitch(5, 1, PitchOptions::new().with_alignment(RowAlignment::Align64));
        assert_eq!(aligned.row_pitch, 64);
    }

    #[test]
    fn storage_equivalence() {
        assert!(PixelFormat::R8G8B8A8UNorm.storage_equivalent(PixelFormat::R8G8B8A8UNormSrgb));
        assert!(PixelFormat::R8G8B8A8Typeless.storage_equivalent(PixelFormat::R8G8B8A8UNorm));
        assert!(PixelFormat::D16UNorm.storage_equivalent(PixelFormat::R16UNorm));
        assert!(!PixelFormat::R8G8B8A8UNorm.storage_equivalent(PixelFormat::B8G8R8A8UNorm));
        assert!(!PixelFormat::R8G8B8A8UNorm.storage_equivalent(PixelFormat::R8G8B8A8SNorm));
    }

    #[test]
    fn scanline_count_uses_block_rows() {
        assert_eq!(PixelFormat::Bc1UNorm.info().scanline_count(10), 3);
        assert_eq!(PixelFormat::R8UNorm.info().scanline_count(10), 10);
    }
}
