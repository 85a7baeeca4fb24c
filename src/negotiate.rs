//! Format negotiation.
//!
//! Decides which native format a backend should decode into, and how a
//! conversion between two catalog formats is carried out.

use alloc::vec::Vec;

use tracing::debug;

use crate::backend::BackendCapabilities;
use crate::error::ImagingError;
use crate::format::PixelFormat;
use crate::native::NativeFormat;

/// Caller adjustments applied after the exact and nearest-fit lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NegotiationFlags {
    force_rgb: bool,
    no_16bpp: bool,
    no_x2_bias: bool,
    disallow_monochrome: bool,
}

impl NegotiationFlags {
    /// No adjustments.
    pub const fn new() -> Self {
        Self {
            force_rgb: false,
            no_16bpp: false,
            no_x2_bias: false,
            disallow_monochrome: false,
        }
    }

    /// Remap blue-red swapped 32-bit formats to RGBA order.
    pub const fn with_force_rgb(mut self, v: bool) -> Self {
        self.force_rgb = v;
        self
    }

    /// Promote 16-bit packed formats to 32-bit RGBA.
    pub const fn with_no_16bpp(mut self, v: bool) -> Self {
        self.no_16bpp = v;
        self
    }

    /// Remap XR-biased 10:10:10:2 to the unbiased layout.
    pub const fn with_no_x2_bias(mut self, v: bool) -> Self {
        self.no_x2_bias = v;
        self
    }

    /// Promote 1-bit monochrome to 8-bit gray.
    pub const fn with_disallow_monochrome(mut self, v: bool) -> Self {
        self.disallow_monochrome = v;
        self
    }

    /// Whether blue-red swapped formats are remapped.
    pub const fn force_rgb(&self) -> bool {
        self.force_rgb
    }

    /// Whether 16-bit packed formats are promoted.
    pub const fn no_16bpp(&self) -> bool {
        self.no_16bpp
    }

    /// Whether XR bias is removed.
    pub const fn no_x2_bias(&self) -> bool {
        self.no_x2_bias
    }

    /// Whether monochrome is promoted.
    pub const fn disallow_monochrome(&self) -> bool {
        self.disallow_monochrome
    }
}

/// Outcome of [`best_supported_format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NegotiatedFormat {
    /// Native format the backend should produce.
    pub native: NativeFormat,
    /// Catalog format of the resulting pixels.
    pub format: PixelFormat,
    /// The backend must convert from the requested format, instead of a
    /// straight copy.
    pub conversion_required: bool,
}

/// Resolve `requested` against the catalog.
///
/// Exact matches pass through. Formats without a catalog entry are promoted
/// through [`NativeFormat::nearest_fit`], then `flags` adjust the result.
///
/// # Errors
///
/// [`ImagingError::UnsupportedNativeFormat`] if nothing can represent
/// `requested`.
pub fn best_supported_format(
    requested: NativeFormat,
    flags: NegotiationFlags,
) -> Result<NegotiatedFormat, ImagingError> {
    let fit = requested
        .nearest_fit()
        .ok_or(ImagingError::UnsupportedNativeFormat(requested))?;

    let native = apply_flags(fit, flags);
    let format = native
        .pixel_format()
        .ok_or(ImagingError::UnsupportedNativeFormat(native))?;

    let negotiated = NegotiatedFormat {
        native,
        format,
        conversion_required: native != requested,
    };
    debug!(?requested, ?negotiated, "negotiated native format");
    Ok(negotiated)
}

fn apply_flags(native: NativeFormat, flags: NegotiationFlags) -> NativeFormat {
    let mut native = native;
    if flags.force_rgb && matches!(native, NativeFormat::Bgra32 | NativeFormat::Bgr32) {
        native = NativeFormat::Rgba32;
    }
    if flags.no_x2_bias && native == NativeFormat::Rgba1010102XR {
        native = NativeFormat::Rgba1010102;
    }
    if flags.no_16bpp && matches!(native, NativeFormat::Bgra5551 | NativeFormat::Bgr565) {
        native = NativeFormat::Rgba32;
    }
    if flags.disallow_monochrome && native == NativeFormat::BlackWhite {
        native = NativeFormat::Gray8;
    }
    native
}

// ---------------------------------------------------------------------------
// Conversion planning
// ---------------------------------------------------------------------------

/// One side of a backend conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackendLeg {
    /// Native format handed to (or received from) the backend.
    pub native: NativeFormat,
    /// The catalog format has no native form; pixels pass through
    /// `R8G8B8A8UNorm` via scanline routines on this side.
    pub through_rgba8: bool,
}

impl BackendLeg {
    /// How `format` reaches the backend, or `None` if it cannot.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        if let Some(native) = NativeFormat::from_pixel_format(format) {
            return Some(Self {
                native,
                through_rgba8: false,
            });
        }
        rgba8_family(format).then_some(Self {
            native: NativeFormat::Rgba32,
            through_rgba8: true,
        })
    }
}

/// How a conversion between two catalog formats is performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversionPath {
    /// Identical storage; bytes are copied.
    Copy,
    /// Both formats convert to and from 8-bit RGBA with scanline routines.
    Scanline,
    /// The backend converts between native formats.
    Backend {
        /// Source side.
        source: BackendLeg,
        /// Destination side.
        dest: BackendLeg,
    },
}

/// Formats the scanline routines can move to and from `R8G8B8A8UNorm`.
pub(crate) const fn rgba8_family(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::B5G6R5UNorm
            | PixelFormat::B5G5R5A1UNorm
            | PixelFormat::B4G4R4A4UNorm
            | PixelFormat::R8G8B8A8Typeless
            | PixelFormat::R8G8B8A8UNorm
            | PixelFormat::R8G8B8A8UNormSrgb
            | PixelFormat::B8G8R8A8Typeless
            | PixelFormat::B8G8R8A8UNorm
            | PixelFormat::B8G8R8A8UNormSrgb
            | PixelFormat::B8G8R8X8Typeless
            | PixelFormat::B8G8R8X8UNorm
            | PixelFormat::B8G8R8X8UNormSrgb
    )
}

/// Choose how to convert `from` into `to`.
///
/// # Errors
///
/// [`ImagingError::NoConversionPath`] if neither a copy, the scanline
/// routines, nor the backend (given `capabilities`) can do it.
pub fn conversion_path(
    from: PixelFormat,
    to: PixelFormat,
    capabilities: &BackendCapabilities,
) -> Result<ConversionPath, ImagingError> {
    if from.storage_equivalent(to) {
        return Ok(ConversionPath::Copy);
    }
    if rgba8_family(from) && rgba8_family(to) {
        return Ok(ConversionPath::Scanline);
    }
    if capabilities.convert()
        && let (Some(source), Some(dest)) = (BackendLeg::for_format(from), BackendLeg::for_format(to))
    {
        return Ok(ConversionPath::Backend { source, dest });
    }
    Err(ImagingError::NoConversionPath { from, to })
}

/// The subset of `candidates` that `source` can be converted to.
pub fn can_convert_formats(
    source: PixelFormat,
    candidates: &[PixelFormat],
    capabilities: &BackendCapabilities,
) -> Vec<PixelFormat> {
    candidates
        .iter()
        .copied()
        .filter(|&to| conversion_path(source, to, capabilities).is_ok())
        .collect()
}
