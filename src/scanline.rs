//! Scanline transcoding.
//!
//! Allocation-free routines over one row of pixels. Routines that keep the
//! pixel size take a [`LineIo`], which is either a distinct source and
//! destination or a single buffer updated in place. Widening routines
//! (16 → 32 and 24 → 32 bits) cannot run in place and take plain slices.
//!
//! Source and destination lengths act as the pitches: a routine processes
//! as many whole pixels as fit in both. The one narrowing routine that can
//! run out of destination space, [`compress_32bpp_to_24bpp`], stops at the
//! boundary and reports [`ImagingError::BufferOverrun`].
//!
//! 32-bit results are little-endian `R8G8B8A8`: red in byte 0, alpha in
//! byte 3.

use crate::error::ImagingError;
use crate::format::PixelFormat;

/// Per-call scanline options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScanlineFlags {
    opaque_alpha: bool,
}

impl ScanlineFlags {
    /// No options.
    pub const fn new() -> Self {
        Self {
            opaque_alpha: false,
        }
    }

    /// Force alpha to fully opaque in the output.
    pub const fn with_opaque_alpha(mut self, v: bool) -> Self {
        self.opaque_alpha = v;
        self
    }

    /// Whether alpha is forced opaque.
    pub const fn opaque_alpha(&self) -> bool {
        self.opaque_alpha
    }
}

/// Source and destination of a same-size scanline routine.
#[derive(Debug)]
pub enum LineIo<'a> {
    /// Read `src`, write `dst`.
    Copy {
        /// Source row.
        src: &'a [u8],
        /// Destination row.
        dst: &'a mut [u8],
    },
    /// Update one row in place.
    InPlace(&'a mut [u8]),
}

impl<'a> LineIo<'a> {
    /// Distinct source and destination.
    #[inline]
    pub fn copy(src: &'a [u8], dst: &'a mut [u8]) -> Self {
        Self::Copy { src, dst }
    }

    /// One row updated in place.
    #[inline]
    pub fn in_place(line: &'a mut [u8]) -> Self {
        Self::InPlace(line)
    }

    /// Copy whole `bpp`-byte pixels into the destination (if distinct) and
    /// return the destination pixels.
    fn into_dst(self, bpp: usize) -> &'a mut [u8] {
        match self {
            Self::Copy { src, dst } => {
                let n = src.len().min(dst.len()) / bpp * bpp;
                dst[..n].copy_from_slice(&src[..n]);
                &mut dst[..n]
            }
            Self::InPlace(line) => {
                let n = line.len() / bpp * bpp;
                &mut line[..n]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Alpha fields
// ---------------------------------------------------------------------------

/// Where a format keeps alpha, and what "zero" and "opaque" mean there.
#[derive(Clone, Copy, Debug)]
struct AlphaField {
    bytes_per_pixel: usize,
    /// Byte offset of the little-endian word holding alpha.
    offset: usize,
    /// Width of that word in bytes (1, 2 or 4).
    width: usize,
    /// Every alpha bit in the word.
    field: u32,
    /// Bits that must all be clear for alpha to count as zero.
    zero_test: u32,
    /// Opaque alpha, already positioned within `field`.
    opaque: u32,
}

impl AlphaField {
    const fn new(bytes_per_pixel: usize, offset: usize, width: usize, field: u32, zero_test: u32, opaque: u32) -> Self {
        Self {
            bytes_per_pixel,
            offset,
            width,
            field,
            zero_test,
            opaque,
        }
    }

    #[inline]
    fn read(&self, px: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        word[..self.width].copy_from_slice(&px[self.offset..self.offset + self.width]);
        u32::from_le_bytes(word)
    }

    #[inline]
    fn write(&self, px: &mut [u8], value: u32) {
        px[self.offset..self.offset + self.width].copy_from_slice(&value.to_le_bytes()[..self.width]);
    }

    #[inline]
    fn is_zero(&self, px: &[u8]) -> bool {
        self.read(px) & self.zero_test == 0
    }

    #[inline]
    fn force_opaque(&self, px: &mut [u8]) {
        let value = self.read(px);
        self.write(px, (value & !self.field) | self.opaque);
    }
}

const HALF_ONE: u32 = half::f16::ONE.to_bits() as u32;
const FLOAT_ONE: u32 = 0x3F80_0000;

/// Alpha storage for `format`. Includes the X byte of `B8G8R8X8`, which is
/// written as opaque but never read as alpha.
fn alpha_field(format: PixelFormat) -> Option<AlphaField> {
    use PixelFormat as F;
    let field = match format {
        F::R32G32B32A32Float => AlphaField::new(16, 12, 4, u32::MAX, 0x7FFF_FFFF, FLOAT_ONE),
        F::R32G32B32A32SInt => AlphaField::new(16, 12, 4, u32::MAX, 0x7FFF_FFFF, 0x7FFF_FFFF),
        F::R32G32B32A32UInt | F::R32G32B32A32Typeless => {
            AlphaField::new(16, 12, 4, u32::MAX, u32::MAX, u32::MAX)
        }
        F::R16G16B16A16Float => AlphaField::new(8, 6, 2, 0xFFFF, 0x7FFF, HALF_ONE),
        F::R16G16B16A16SInt | F::R16G16B16A16SNorm => AlphaField::new(8, 6, 2, 0xFFFF, 0x7FFF, 0x7FFF),
        F::R16G16B16A16UNorm | F::R16G16B16A16UInt | F::R16G16B16A16Typeless => {
            AlphaField::new(8, 6, 2, 0xFFFF, 0xFFFF, 0xFFFF)
        }
        F::R10G10B10A2Typeless
        | F::R10G10B10A2UNorm
        | F::R10G10B10A2UInt
        | F::R10G10B10XrBiasA2UNorm => {
            AlphaField::new(4, 0, 4, 0xC000_0000, 0xC000_0000, 0xC000_0000)
        }
        F::R8G8B8A8SInt | F::R8G8B8A8SNorm => AlphaField::new(4, 3, 1, 0xFF, 0x7F, 0x7F),
        F::R8G8B8A8Typeless
        | F::R8G8B8A8UNorm
        | F::R8G8B8A8UNormSrgb
        | F::R8G8B8A8UInt
        | F::B8G8R8A8Typeless
        | F::B8G8R8A8UNorm
        | F::B8G8R8A8UNormSrgb
        | F::B8G8R8X8Typeless
        | F::B8G8R8X8UNorm
        | F::B8G8R8X8UNormSrgb => AlphaField::new(4, 3, 1, 0xFF, 0xFF, 0xFF),
        F::B5G5R5A1UNorm => AlphaField::new(2, 0, 2, 0x8000, 0x8000, 0x8000),
        F::B4G4R4A4UNorm => AlphaField::new(2, 0, 2, 0xF000, 0xF000, 0xF000),
        F::A8UNorm => AlphaField::new(1, 0, 1, 0xFF, 0xFF, 0xFF),
        _ => return None,
    };
    Some(field)
}

/// Bytes per pixel when whole pixels can be moved independently; `None`
/// for block-compressed, packed 4:2:2 and sub-byte formats.
fn pixel_unit(format: PixelFormat) -> Option<usize> {
    let info = format.info();
    if info.packed {
        return None;
    }
    info.bytes_per_pixel()
}

// ---------------------------------------------------------------------------
// 16-bit packed <-> 8-bit RGBA
// ---------------------------------------------------------------------------

#[inline]
const fn widen5(x: u16) -> u8 {
    ((x << 3) | (x >> 2)) as u8
}

#[inline]
const fn widen6(x: u16) -> u8 {
    ((x << 2) | (x >> 4)) as u8
}

#[inline]
const fn widen4(x: u16) -> u8 {
    ((x << 4) | x) as u8
}

fn unpack_565(p: u16, _opaque: bool) -> [u8; 4] {
    [
        widen5((p & 0xF800) >> 11),
        widen6((p & 0x07E0) >> 5),
        widen5(p & 0x001F),
        0xFF,
    ]
}

fn unpack_5551(p: u16, opaque: bool) -> [u8; 4] {
    let alpha = if opaque || p & 0x8000 != 0 { 0xFF } else { 0x00 };
    [
        widen5((p & 0x7C00) >> 10),
        widen5((p & 0x03E0) >> 5),
        widen5(p & 0x001F),
        alpha,
    ]
}

fn unpack_4444(p: u16, opaque: bool) -> [u8; 4] {
    let alpha = if opaque { 0xFF } else { widen4((p & 0xF000) >> 12) };
    [
        widen4((p & 0x0F00) >> 8),
        widen4((p & 0x00F0) >> 4),
        widen4(p & 0x000F),
        alpha,
    ]
}

fn pack_565([r, g, b, _]: [u8; 4], _opaque: bool) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

fn pack_5551([r, g, b, a]: [u8; 4], opaque: bool) -> u16 {
    let alpha = if opaque || a >= 0x80 { 0x8000 } else { 0 };
    alpha | ((r as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (b as u16 >> 3)
}

fn pack_4444([r, g, b, a]: [u8; 4], opaque: bool) -> u16 {
    let alpha = if opaque { 0xF } else { a as u16 >> 4 };
    (alpha << 12) | ((r as u16 >> 4) << 8) | ((g as u16 >> 4) << 4) | (b as u16 >> 4)
}

/// Widen a line of 5:6:5, 5:5:5:1 or 4:4:4:4 pixels to 8-bit RGBA.
///
/// Each channel is widened by bit replication, so 0 maps to 0 and the
/// channel maximum maps to 255. Alpha is opaque for 5:6:5 and whenever
/// `flags` asks for it; otherwise the 1-bit alpha becomes 0x00 or 0xFF and
/// the 4-bit alpha is replicated like color.
///
/// Returns the number of pixels written.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] for any other source format.
pub fn expand_16bpp_to_32bpp(
    src: &[u8],
    dst: &mut [u8],
    format: PixelFormat,
    flags: ScanlineFlags,
) -> Result<usize, ImagingError> {
    let unpack: fn(u16, bool) -> [u8; 4] = match format {
        PixelFormat::B5G6R5UNorm => unpack_565,
        PixelFormat::B5G5R5A1UNorm => unpack_5551,
        PixelFormat::B4G4R4A4UNorm => unpack_4444,
        other => return Err(ImagingError::UnsupportedFormat(other)),
    };
    let mut count = 0;
    for (s, d) in src.chunks_exact(2).zip(dst.chunks_exact_mut(4)) {
        d.copy_from_slice(&unpack(u16::from_le_bytes([s[0], s[1]]), flags.opaque_alpha));
        count += 1;
    }
    Ok(count)
}

/// Narrow a line of 8-bit RGBA to 5:6:5, 5:5:5:1 or 4:4:4:4.
///
/// The inverse of [`expand_16bpp_to_32bpp`]: expanding then compressing
/// reproduces the original 16-bit values exactly.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] for any other target format.
pub fn compress_32bpp_to_16bpp(
    src: &[u8],
    dst: &mut [u8],
    format: PixelFormat,
    flags: ScanlineFlags,
) -> Result<usize, ImagingError> {
    let pack: fn([u8; 4], bool) -> u16 = match format {
        PixelFormat::B5G6R5UNorm => pack_565,
        PixelFormat::B5G5R5A1UNorm => pack_5551,
        PixelFormat::B4G4R4A4UNorm => pack_4444,
        other => return Err(ImagingError::UnsupportedFormat(other)),
    };
    let mut count = 0;
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(2)) {
        let p = pack([s[0], s[1], s[2], s[3]], flags.opaque_alpha);
        d.copy_from_slice(&p.to_le_bytes());
        count += 1;
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// 24-bit <-> 32-bit
// ---------------------------------------------------------------------------

/// Widen 3-byte pixels to 4-byte pixels with opaque alpha.
///
/// Bytes keep their order; with `reverse` the pixels are written back to
/// front. Returns the number of pixels written.
pub fn expand_24bpp_to_32bpp(src: &[u8], dst: &mut [u8], reverse: bool) -> usize {
    let count = (src.len() / 3).min(dst.len() / 4);
    for (i, s) in src.chunks_exact(3).take(count).enumerate() {
        let j = if reverse { count - 1 - i } else { i };
        dst[j * 4..j * 4 + 4].copy_from_slice(&[s[0], s[1], s[2], 0xFF]);
    }
    count
}

/// Narrow 4-byte pixels to 3 bytes, dropping alpha.
///
/// `swap_red_blue` exchanges bytes 0 and 2 on the way (RGBA in, BGR out);
/// `reverse` writes pixels back to front. Every source pixel needs three
/// bytes of destination; the routine never writes past `dst.len()`.
///
/// # Errors
///
/// [`ImagingError::BufferOverrun`] when the destination runs out. Pixels
/// before the boundary have been written; `written` says how many.
pub fn compress_32bpp_to_24bpp(
    src: &[u8],
    dst: &mut [u8],
    swap_red_blue: bool,
    reverse: bool,
) -> Result<usize, ImagingError> {
    let count = src.len() / 4;
    let required = count * 3;
    for (i, px) in src.chunks_exact(4).enumerate() {
        let at = if reverse { (count - 1 - i) * 3 } else { i * 3 };
        if at + 3 > dst.len() {
            return Err(ImagingError::BufferOverrun {
                written: i,
                required,
                available: dst.len(),
            });
        }
        let out = if swap_red_blue {
            [px[2], px[1], px[0]]
        } else {
            [px[0], px[1], px[2]]
        };
        dst[at..at + 3].copy_from_slice(&out);
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Same-size routines
// ---------------------------------------------------------------------------

fn map_u32(io: LineIo<'_>, f: impl Fn(u32) -> u32) -> usize {
    let line = io.into_dst(4);
    for px in line.chunks_exact_mut(4) {
        let p = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&f(p).to_le_bytes());
    }
    line.len() / 4
}

/// Exchange red and blue, turning RGBA order into BGRA and back.
///
/// Applies to the 10:10:10:2 family (10-bit fields) and to the 8-bit
/// RGBA/BGRA/BGRX families (bytes 0 and 2). With `opaque_alpha` the alpha
/// bits are set; otherwise they pass through. Other formats are copied
/// unchanged. Returns the number of pixels processed.
pub fn swizzle_scanline(io: LineIo<'_>, format: PixelFormat, flags: ScanlineFlags) -> usize {
    use PixelFormat as F;
    let opaque = flags.opaque_alpha;
    match format {
        F::R10G10B10A2Typeless
        | F::R10G10B10A2UNorm
        | F::R10G10B10A2UInt
        | F::R10G10B10XrBiasA2UNorm => map_u32(io, |p| {
            let alpha = if opaque { 0xC000_0000 } else { p & 0xC000_0000 };
            ((p & 0x3FF0_0000) >> 20) | (p & 0x000F_FC00) | ((p & 0x0000_03FF) << 20) | alpha
        }),
        F::R8G8B8A8Typeless
        | F::R8G8B8A8UNorm
        | F::R8G8B8A8UNormSrgb
        | F::R8G8B8A8UInt
        | F::B8G8R8A8Typeless
        | F::B8G8R8A8UNorm
        | F::B8G8R8A8UNormSrgb
        | F::B8G8R8X8Typeless
        | F::B8G8R8X8UNorm
        | F::B8G8R8X8UNormSrgb => map_u32(io, |p| {
            let alpha = if opaque { 0xFF00_0000 } else { p & 0xFF00_0000 };
            ((p & 0x00FF_0000) >> 16) | (p & 0x0000_FF00) | ((p & 0x0000_00FF) << 16) | alpha
        }),
        other => {
            let bpp = pixel_unit(other).unwrap_or(1);
            io.into_dst(bpp).len() / bpp
        }
    }
}

/// Copy a line, forcing alpha opaque if `flags` asks for it.
///
/// Opaque means the largest positive value of the alpha encoding: all ones
/// for unsigned fields, `0x7F…` for signed ones, 1.0 for float and half.
/// Formats without alpha are copied unchanged. Returns bytes copied.
pub fn copy_scanline(io: LineIo<'_>, format: PixelFormat, flags: ScanlineFlags) -> usize {
    let field = alpha_field(format).filter(|_| flags.opaque_alpha);
    let bpp = field.map_or_else(|| pixel_unit(format).unwrap_or(1), |f| f.bytes_per_pixel);
    let line = io.into_dst(bpp);
    if let Some(field) = field {
        for px in line.chunks_exact_mut(bpp) {
            field.force_opaque(px);
        }
    }
    line.len()
}

/// Copy (or scan in place) one line and report whether every pixel's alpha
/// is zero.
///
/// With `flip_horizontal` the pixels are written back to front. A copy
/// reads only the source; an in-place flip reverses the line. Formats
/// without alpha, and empty lines, report `false`. Block-compressed,
/// packed and sub-byte formats are copied byte for byte and never flipped.
///
/// Float alpha tests the magnitude bits only, so `-0.0` counts as zero.
pub fn copy_scanline_detect_alpha(io: LineIo<'_>, format: PixelFormat, flip_horizontal: bool) -> bool {
    let Some(bpp) = pixel_unit(format) else {
        io.into_dst(1);
        return false;
    };
    let probe = alpha_field(format).filter(|_| format.has_alpha());

    let (count, all_zero) = match io {
        LineIo::Copy { src, dst } => {
            let count = src.len().min(dst.len()) / bpp;
            let mut all_zero = true;
            for (i, px) in src.chunks_exact(bpp).take(count).enumerate() {
                if let Some(probe) = probe {
                    all_zero &= probe.is_zero(px);
                }
                let j = if flip_horizontal { count - 1 - i } else { i };
                dst[j * bpp..(j + 1) * bpp].copy_from_slice(px);
            }
            (count, all_zero)
        }
        LineIo::InPlace(line) => {
            let count = line.len() / bpp;
            let line = &mut line[..count * bpp];
            let all_zero = probe.is_none_or(|probe| line.chunks_exact(bpp).all(|px| probe.is_zero(px)));
            if flip_horizontal {
                line.reverse();
                for px in line.chunks_exact_mut(bpp) {
                    px.reverse();
                }
            }
            (count, all_zero)
        }
    };
    probe.is_some() && count > 0 && all_zero
}

/// Replace alpha values that fall in `min..=max` with `value`.
///
/// Values are raw field contents shifted down to bit 0 (0..=3 for 2-bit
/// alpha, 0..=255 for 8-bit, raw IEEE bits for float). Returns how many
/// pixels were changed.
///
/// # Errors
///
/// [`ImagingError::UnsupportedFormat`] if the format has no alpha.
pub fn set_alpha_scanline(
    io: LineIo<'_>,
    format: PixelFormat,
    value: u32,
    min: u32,
    max: u32,
) -> Result<usize, ImagingError> {
    let field = alpha_field(format)
        .filter(|_| format.has_alpha())
        .ok_or(ImagingError::UnsupportedFormat(format))?;
    let shift = field.field.trailing_zeros();
    let replacement = (value << shift) & field.field;

    let line = io.into_dst(field.bytes_per_pixel);
    let mut replaced = 0;
    for px in line.chunks_exact_mut(field.bytes_per_pixel) {
        let raw = field.read(px);
        let alpha = (raw & field.field) >> shift;
        if (min..=max).contains(&alpha) {
            field.write(px, (raw & !field.field) | replacement);
            replaced += 1;
        }
    }
    Ok(replaced)
}

// ---------------------------------------------------------------------------
// 8-bit RGBA interchange
// ---------------------------------------------------------------------------

/// Convert one line of `format` to `R8G8B8A8UNorm`.
///
/// Supports the 16-bit packed formats and the 8-bit RGBA/BGRA/BGRX
/// families. Returns pixels written.
pub fn to_rgba8_scanline(
    src: &[u8],
    dst: &mut [u8],
    format: PixelFormat,
    flags: ScanlineFlags,
) -> Result<usize, ImagingError> {
    use PixelFormat as F;
    match format {
        F::B5G6R5UNorm | F::B5G5R5A1UNorm | F::B4G4R4A4UNorm => {
            expand_16bpp_to_32bpp(src, dst, format, flags)
        }
        F::R8G8B8A8Typeless | F::R8G8B8A8UNorm | F::R8G8B8A8UNormSrgb => {
            Ok(copy_scanline(LineIo::copy(src, dst), format, flags) / 4)
        }
        F::B8G8R8A8Typeless | F::B8G8R8A8UNorm | F::B8G8R8A8UNormSrgb => {
            Ok(swizzle_scanline(LineIo::copy(src, dst), format, flags))
        }
        F::B8G8R8X8Typeless | F::B8G8R8X8UNorm | F::B8G8R8X8UNormSrgb => Ok(swizzle_scanline(
            LineIo::copy(src, dst),
            format,
            flags.with_opaque_alpha(true),
        )),
        other => Err(ImagingError::UnsupportedFormat(other)),
    }
}

/// Convert one line of `R8G8B8A8UNorm` to `format`.
///
/// The inverse of [`to_rgba8_scanline`]. Returns pixels written.
pub fn from_rgba8_scanline(
    src: &[u8],
    dst: &mut [u8],
    format: PixelFormat,
    flags: ScanlineFlags,
) -> Result<usize, ImagingError> {
    use PixelFormat as F;
    match format {
        F::B5G6R5UNorm | F::B5G5R5A1UNorm | F::B4G4R4A4UNorm => {
            compress_32bpp_to_16bpp(src, dst, format, flags)
        }
        F::R8G8B8A8Typeless | F::R8G8B8A8UNorm | F::R8G8B8A8UNormSrgb => {
            Ok(copy_scanline(LineIo::copy(src, dst), format, flags) / 4)
        }
        F::B8G8R8A8Typeless | F::B8G8R8A8UNorm | F::B8G8R8A8UNormSrgb => {
            Ok(swizzle_scanline(LineIo::copy(src, dst), format, flags))
        }
        F::B8G8R8X8Typeless | F::B8G8R8X8UNorm | F::B8G8R8X8UNormSrgb => Ok(swizzle_scanline(
            LineIo::copy(src, dst),
            format,
            flags.with_opaque_alpha(true),
        )),
        other => Err(ImagingError::UnsupportedFormat(other)),
    }
}
