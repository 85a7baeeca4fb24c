//! Whole-image operations.
//!
//! [`Transcoder`] walks an image's buffers in layout order and applies the
//! scanline routines to each one, calling the [`CodecBackend`] only for
//! container decode/encode, resampling, cropping and conversions the
//! scanline routines cannot do. Every operation allocates its destination
//! after checking [`ResourceLimits`] and checks the stop token between
//! buffers, never inside one.
//!
//! Operations either produce a complete new [`Image`] or fail with the first
//! error; a partially converted image is never returned.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use enough::{Stop, Unstoppable};
use tracing::{debug, trace};

use crate::backend::{
    CodecBackend, Dithering, EncodeOptions, FrameMut, FrameRef, ImageFilter, Rect,
};
use crate::buffer::{Image, PlaneMut, PlaneRef};
use crate::color::{self, TransferDirection};
use crate::error::ImagingError;
use crate::format::PixelFormat;
use crate::layout::{ImageDescriptor, ImageType, max_mip_count};
use crate::limits::ResourceLimits;
use crate::native::NativeFormat;
use crate::negotiate::{
    BackendLeg, ConversionPath, NegotiationFlags, best_supported_format, conversion_path,
};
use crate::scanline::{self, LineIo, ScanlineFlags};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A format conversion to perform with [`Transcoder::convert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConversionRequest {
    source: PixelFormat,
    dest: PixelFormat,
    dithering: Dithering,
    opaque_alpha: bool,
}

impl ConversionRequest {
    /// Convert `source` pixels to `dest`, without dithering.
    pub const fn new(source: PixelFormat, dest: PixelFormat) -> Self {
        Self {
            source,
            dest,
            dithering: Dithering::None,
            opaque_alpha: false,
        }
    }

    /// Dithering for backend conversions that lose precision.
    pub const fn with_dithering(mut self, dithering: Dithering) -> Self {
        self.dithering = dithering;
        self
    }

    /// Force the result's alpha to fully opaque.
    pub const fn with_opaque_alpha(mut self, v: bool) -> Self {
        self.opaque_alpha = v;
        self
    }

    /// Source format.
    pub const fn source(&self) -> PixelFormat {
        self.source
    }

    /// Destination format.
    pub const fn dest(&self) -> PixelFormat {
        self.dest
    }

    /// Dithering policy.
    pub const fn dithering(&self) -> Dithering {
        self.dithering
    }

    /// Whether alpha is forced opaque.
    pub const fn opaque_alpha(&self) -> bool {
        self.opaque_alpha
    }
}

/// Where existing content sits after [`Transcoder::expand`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExpandAnchor {
    /// Top-left corner.
    #[default]
    TopLeft,
    /// Centered horizontally, top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Left edge, centered vertically.
    Left,
    /// Centered.
    Center,
    /// Right edge, centered vertically.
    Right,
    /// Bottom-left corner.
    BottomLeft,
    /// Centered horizontally, bottom edge.
    Bottom,
    /// Bottom-right corner.
    BottomRight,
}

impl ExpandAnchor {
    /// Position of an `inner` rectangle within `outer`.
    pub const fn offset(self, inner: (u32, u32), outer: (u32, u32)) -> (u32, u32) {
        let dx = outer.0.saturating_sub(inner.0);
        let dy = outer.1.saturating_sub(inner.1);
        let x = match self {
            Self::TopLeft | Self::Left | Self::BottomLeft => 0,
            Self::Top | Self::Center | Self::Bottom => dx / 2,
            Self::TopRight | Self::Right | Self::BottomRight => dx,
        };
        let y = match self {
            Self::TopLeft | Self::Top | Self::TopRight => 0,
            Self::Left | Self::Center | Self::Right => dy / 2,
            Self::BottomLeft | Self::Bottom | Self::BottomRight => dy,
        };
        (x, y)
    }
}

// ---------------------------------------------------------------------------
// Decode fixups
// ---------------------------------------------------------------------------

/// How rows of a decoded frame become catalog pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeFixup {
    /// The frame already has a catalog format.
    Copy(PixelFormat),
    /// 24-bit rows widened to 32 bits, optionally swapped to RGBA order.
    Expand24 { format: PixelFormat, swizzle: bool },
    /// BGR 10:10:10 rotated into 10:10:10:2 with opaque alpha.
    Bgr101010,
    /// BGR 5:5:5 stored as 5:5:5:1 with the alpha bit set.
    Bgr555,
    /// BGR 5:5:5 widened to RGBA when 16-bit formats are refused.
    Bgr555To32,
}

impl DecodeFixup {
    fn for_frame(native: NativeFormat, flags: NegotiationFlags) -> Result<Self, ImagingError> {
        if let Some(format) = native.pixel_format() {
            return Ok(Self::Copy(format));
        }
        Ok(match native {
            NativeFormat::Rgb24 => Self::Expand24 {
                format: PixelFormat::R8G8B8A8UNorm,
                swizzle: false,
            },
            NativeFormat::Bgr24 if flags.force_rgb() => Self::Expand24 {
                format: PixelFormat::R8G8B8A8UNorm,
                swizzle: true,
            },
            NativeFormat::Bgr24 => Self::Expand24 {
                format: PixelFormat::B8G8R8A8UNorm,
                swizzle: false,
            },
            NativeFormat::Bgr101010 => Self::Bgr101010,
            NativeFormat::Bgr555 if flags.no_16bpp() => Self::Bgr555To32,
            NativeFormat::Bgr555 => Self::Bgr555,
            other => return Err(ImagingError::UnsupportedNativeFormat(other)),
        })
    }

    fn format(self) -> PixelFormat {
        match self {
            Self::Copy(format) | Self::Expand24 { format, .. } => format,
            Self::Bgr101010 => PixelFormat::R10G10B10A2UNorm,
            Self::Bgr555 => PixelFormat::B5G5R5A1UNorm,
            Self::Bgr555To32 => PixelFormat::R8G8B8A8UNorm,
        }
    }

    fn apply(self, src: &[u8], dst: &mut [u8]) -> Result<(), ImagingError> {
        let opaque = ScanlineFlags::new().with_opaque_alpha(true);
        match self {
            Self::Copy(_) => {
                let n = src.len().min(dst.len());
                dst[..n].copy_from_slice(&src[..n]);
            }
            Self::Expand24 { format, swizzle } => {
                scanline::expand_24bpp_to_32bpp(src, dst, false);
                if swizzle {
                    scanline::swizzle_scanline(LineIo::in_place(dst), format, ScanlineFlags::new());
                }
            }
            Self::Bgr101010 => {
                scanline::swizzle_scanline(
                    LineIo::copy(src, dst),
                    PixelFormat::R10G10B10A2UNorm,
                    opaque,
                );
            }
            Self::Bgr555 => {
                scanline::copy_scanline(LineIo::copy(src, dst), PixelFormat::B5G5R5A1UNorm, opaque);
            }
            Self::Bgr555To32 => {
                scanline::expand_16bpp_to_32bpp(src, dst, PixelFormat::B5G5R5A1UNorm, opaque)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

/// Runs whole-image operations against a backend.
///
/// # Example
///
/// ```ignore
/// let transcoder = Transcoder::new(&backend)
///     .with_limits(ResourceLimits::none().with_max_memory(256 << 20))
///     .with_stop(&stop);
/// let image = transcoder.decode(&bytes, NegotiationFlags::new())?;
/// let mips = transcoder.generate_mips(&image, 0, ImageFilter::Fant)?;
/// ```
pub struct Transcoder<'a, B: CodecBackend> {
    backend: &'a B,
    stop: &'a dyn Stop,
    limits: ResourceLimits,
}

impl<B: CodecBackend> fmt::Debug for Transcoder<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("capabilities", &self.backend.capabilities())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<'a, B: CodecBackend> Transcoder<'a, B> {
    /// Use `backend`, with no limits and no cancellation.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            stop: &Unstoppable,
            limits: ResourceLimits::none(),
        }
    }

    /// Check `stop` between buffers.
    pub fn with_stop(mut self, stop: &'a dyn Stop) -> Self {
        self.stop = stop;
        self
    }

    /// Refuse to allocate images beyond `limits`.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The backend.
    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Active limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    fn allocate(&self, descriptor: ImageDescriptor) -> Result<Image, ImagingError> {
        Image::with_limits(descriptor, &self.limits)
    }

    // --- Container I/O ---

    /// Decode the first frame of `data`.
    ///
    /// The backend's format is negotiated with `flags`; frames that come
    /// back as 24-bit RGB/BGR, BGR 10:10:10 or BGR 5:5:5 are repacked into
    /// the nearest catalog format.
    pub fn decode(&self, data: &[u8], flags: NegotiationFlags) -> Result<Image, ImagingError> {
        require(self.backend.capabilities().decode(), "backend cannot decode")?;
        self.limits.check_file_size(data.len() as u64)?;

        let probed = self.backend.probe_format(data).map_err(ImagingError::backend)?;
        let negotiated = best_supported_format(probed, flags)?;
        let decoded = self
            .backend
            .decode_frame(data, negotiated.native)
            .map_err(ImagingError::backend)?;
        let frame = FrameRef::new(
            decoded.pixels(),
            decoded.width(),
            decoded.height(),
            decoded.row_pitch(),
            decoded.native(),
        )?;

        let fixup = DecodeFixup::for_frame(frame.native(), flags)?;
        debug!(
            ?probed,
            requested = ?negotiated.native,
            actual = ?frame.native(),
            ?fixup,
            "decoded frame"
        );

        let descriptor = ImageDescriptor::new_2d(fixup.format(), frame.width(), frame.height());
        let mut image = self.allocate(descriptor)?;
        let mut plane = image.buffer_at_mut(0);
        for y in 0..frame.height() {
            fixup.apply(frame.row(y), plane.row_mut(y))?;
        }
        Ok(image)
    }

    /// Encode the top-level buffer (mip 0, first slice) of `image`.
    ///
    /// 8-bit RGBA/BGRA pixels are narrowed to 24-bit BGR rows when the
    /// container cannot store alpha.
    pub fn encode(&self, image: &Image, options: &EncodeOptions) -> Result<Vec<u8>, ImagingError> {
        require(self.backend.capabilities().encode(), "backend cannot encode")?;
        let plane = image.buffer_at(0);
        let leg = backend_leg(plane.format())?;
        let (width, height) = (plane.width(), plane.height());

        let staged;
        let frame = if leg.through_rgba8 {
            staged = stage_rgba8(plane)?;
            FrameRef::new(&staged, width, height, width as usize * 4, NativeFormat::Rgba32)?
        } else {
            FrameRef::from_plane(plane, leg.native)
        };

        let narrowed;
        let frame = match narrow_swaps_red_blue(frame.native()) {
            Some(swap) if !options.container().supports_alpha() => {
                let (src_len, pitch) = (width as usize * 4, width as usize * 3);
                let mut rows = vec![0u8; pitch * height as usize];
                for (y, dst) in (0..height).zip(rows.chunks_exact_mut(pitch)) {
                    scanline::compress_32bpp_to_24bpp(&frame.row(y)[..src_len], dst, swap, false)?;
                }
                narrowed = rows;
                FrameRef::new(&narrowed, width, height, pitch, NativeFormat::Bgr24)?
            }
            _ => frame,
        };

        debug!(container = ?options.container(), native = ?frame.native(), "encoding frame");
        self.backend
            .encode_frame(frame, options)
            .map_err(ImagingError::backend)
    }

    // --- Conversion ---

    /// Convert every buffer of `image` as described by `request`.
    ///
    /// Channel conversion runs first; an sRGB transfer follows when exactly
    /// one of the two formats is sRGB, and the opaque-alpha override comes
    /// last.
    ///
    /// # Errors
    ///
    /// [`ImagingError::FormatMismatch`] if `image` is not in the request's
    /// source format, [`ImagingError::NoConversionPath`] if nothing can
    /// convert between the formats.
    pub fn convert(&self, image: &Image, request: &ConversionRequest) -> Result<Image, ImagingError> {
        let (from, to) = (request.source(), request.dest());
        if image.format() != from {
            return Err(ImagingError::FormatMismatch {
                expected: from,
                actual: image.format(),
            });
        }
        let path = conversion_path(from, to, &self.backend.capabilities())?;
        let transfer = TransferDirection::between(from, to).filter(|_| !to.is_compressed());
        if transfer.is_some() && !color::supports_transfer(to) {
            return Err(ImagingError::UnsupportedFormat(to));
        }
        let opaque = request.opaque_alpha() && !to.is_compressed();
        debug!(?from, ?to, ?path, ?transfer, opaque, "converting image");

        let mut dest = self.allocate(image.descriptor().with_format(to))?;
        for (index, mut plane) in dest.buffers_mut().into_iter().enumerate() {
            self.stop.check()?;
            let src = image.buffer_at(index);
            trace!(index, mip = src.mip_level(), slice = src.array_or_depth_index(), "converting buffer");
            match path {
                ConversionPath::Copy => plane.copy_from(&src)?,
                ConversionPath::Scanline => convert_rows(src, &mut plane)?,
                ConversionPath::Backend { .. } => {
                    let dithering = request.dithering();
                    self.run_backend(src, &mut plane, |s, d| self.backend.convert(s, d, dithering))?;
                }
            }
            finish_rows(&mut plane, transfer, opaque)?;
        }
        Ok(dest)
    }

    // --- Scaling ---

    /// Build `mip_count` levels from mip 0 (`0` means the full chain).
    ///
    /// Mip 0 is copied; every other level is resampled by the backend from
    /// mip 0 of the same array slice. For 3D images each depth slice at a
    /// level is resampled from the mip-0 slice at the same relative depth.
    pub fn generate_mips(
        &self,
        image: &Image,
        mip_count: u32,
        filter: ImageFilter,
    ) -> Result<Image, ImagingError> {
        require(self.backend.capabilities().resample(), "backend cannot resample")?;
        backend_leg(image.format())?;
        let source = image.descriptor();
        let full = max_mip_count(source.width(), source.height(), source.depth());
        let mips = if mip_count == 0 { full } else { mip_count.min(full) };
        debug!(mips, ?filter, "generating mip chain");

        let mut dest = self.allocate(source.with_mip_count(mips))?;
        for mut plane in dest.buffers_mut() {
            self.stop.check()?;
            let (mip, slice) = (plane.mip_level(), plane.array_or_depth_index());
            if mip == 0 {
                plane.copy_from(&image.buffer(0, slice))?;
                continue;
            }
            let source_slice = match source.image_type() {
                ImageType::Image3D => (slice << mip).min(source.depth() - 1),
                _ => slice,
            };
            trace!(mip, slice, source_slice, "resampling mip level");
            let src = image.buffer(0, source_slice);
            self.run_backend(src, &mut plane, |s, d| self.backend.resample(s, d, filter))?;
        }
        Ok(dest)
    }

    /// Resample every buffer to a new top-level size.
    ///
    /// The mip count is kept where the new size allows it and reduced
    /// otherwise. `depth` only applies to 3D images.
    pub fn resize(
        &self,
        image: &Image,
        width: u32,
        height: u32,
        depth: u32,
        filter: ImageFilter,
    ) -> Result<Image, ImagingError> {
        let source = image.descriptor();
        let resized = source.with_size(width, height, depth);
        let mips = source
            .mip_count()
            .min(max_mip_count(resized.width(), resized.height(), resized.depth()));
        let target = resized.with_mip_count(mips);
        if target == *source {
            debug!("resize keeps the current size");
            return Ok(image.clone());
        }
        require(self.backend.capabilities().resample(), "backend cannot resample")?;
        backend_leg(image.format())?;
        debug!(width, height, depth, mips, ?filter, "resizing image");

        let mut dest = self.allocate(target)?;
        for mut plane in dest.buffers_mut() {
            self.stop.check()?;
            let (mip, slice) = (plane.mip_level(), plane.array_or_depth_index());
            let source_slice = match source.image_type() {
                ImageType::Image3D => {
                    let scaled = u64::from(slice) * u64::from(source.depth_at(mip))
                        / u64::from(target.depth_at(mip));
                    scaled as u32
                }
                _ => slice,
            };
            let src = image.buffer(mip, source_slice);
            self.run_backend(src, &mut plane, |s, d| self.backend.resample(s, d, filter))?;
        }
        Ok(dest)
    }

    /// Keep the part of every buffer inside `rect`, and the first `depth`
    /// slices of a 3D image.
    ///
    /// The rectangle is clipped to the image. If nothing is left, or the
    /// whole image is kept, the image is returned unchanged without calling
    /// the backend. Mip levels use the rectangle scaled to their size.
    pub fn crop(&self, image: &Image, rect: Rect, depth: u32) -> Result<Image, ImagingError> {
        let source = image.descriptor();
        let depth = match source.image_type() {
            ImageType::Image3D => depth.clamp(1, source.depth()),
            _ => 1,
        };
        let Some(clipped) = rect.clip(source.width(), source.height()) else {
            debug!(?rect, "crop rectangle misses the image");
            return Ok(image.clone());
        };
        if clipped == Rect::new(0, 0, source.width(), source.height()) && depth == source.depth() {
            debug!(?rect, "crop rectangle covers the image");
            return Ok(image.clone());
        }
        require(self.backend.capabilities().crop(), "backend cannot crop")?;
        backend_leg(image.format())?;

        let cropped = source.with_size(clipped.width, clipped.height, depth);
        let mips = source
            .mip_count()
            .min(max_mip_count(cropped.width(), cropped.height(), cropped.depth()));
        debug!(?clipped, depth, mips, "cropping image");

        let mut dest = self.allocate(cropped.with_mip_count(mips))?;
        for mut plane in dest.buffers_mut() {
            self.stop.check()?;
            let (mip, slice) = (plane.mip_level(), plane.array_or_depth_index());
            let src = image.buffer(mip, slice);
            let region = fit_within(clipped.at_mip(mip), src.width(), src.height());
            trace!(mip, slice, ?region, "cropping buffer");
            self.run_backend(src, &mut plane, |s, d| self.backend.crop(s, region, d))?;
        }
        Ok(dest)
    }

    /// Grow the canvas to at least `width` × `height` × `depth`, placing the
    /// existing pixels according to `anchor`. New pixels are zero.
    ///
    /// Sizes smaller than the current ones are ignored per axis. The backend
    /// is not involved.
    pub fn expand(
        &self,
        image: &Image,
        width: u32,
        height: u32,
        depth: u32,
        anchor: ExpandAnchor,
    ) -> Result<Image, ImagingError> {
        let source = image.descriptor();
        let bpp = pixel_bytes(source.format())?;
        let grown = source.with_size(
            width.max(source.width()),
            height.max(source.height()),
            depth.max(source.depth()),
        );
        if grown == *source {
            return Ok(image.clone());
        }
        debug!(width = grown.width(), height = grown.height(), depth = grown.depth(), ?anchor, "expanding image");

        let mut dest = self.allocate(grown)?;
        for src in image.buffers() {
            self.stop.check()?;
            let mut dst = dest.try_buffer_mut(src.mip_level(), src.array_or_depth_index())?;
            let (x, y) = anchor.offset((src.width(), src.height()), (dst.width(), dst.height()));
            let (start, len) = (x as usize * bpp, src.width() as usize * bpp);
            for (row, line) in (y..).zip(src.rows()) {
                dst.row_mut(row)[start..start + len].copy_from_slice(&line[..len]);
            }
        }
        Ok(dest)
    }

    // --- Pixel edits ---

    /// Multiply color by alpha in every buffer.
    pub fn premultiply(&self, image: &mut Image) -> Result<(), ImagingError> {
        self.for_each_row(image, color::premultiply_scanline)
    }

    /// Divide color by alpha in every buffer.
    pub fn unpremultiply(&self, image: &mut Image) -> Result<(), ImagingError> {
        self.for_each_row(image, color::unpremultiply_scanline)
    }

    fn for_each_row(
        &self,
        image: &mut Image,
        edit: fn(&mut [u8], PixelFormat) -> Result<(), ImagingError>,
    ) -> Result<(), ImagingError> {
        let format = image.format();
        if !color::supports_premultiply(format) {
            return Err(ImagingError::UnsupportedFormat(format));
        }
        let bpp = pixel_bytes(format)?;
        for mut plane in image.buffers_mut() {
            self.stop.check()?;
            let len = plane.width() as usize * bpp;
            for row in plane.rows_mut() {
                edit(&mut row[..len], format)?;
            }
        }
        Ok(())
    }

    /// Replace alpha values in `min..=max` with `value` (raw field values,
    /// see [`scanline::set_alpha_scanline`]). Returns pixels changed.
    pub fn set_alpha(&self, image: &mut Image, value: u32, min: u32, max: u32) -> Result<usize, ImagingError> {
        let format = image.format();
        let bpp = pixel_bytes(format)?;
        let mut replaced = 0;
        for mut plane in image.buffers_mut() {
            self.stop.check()?;
            let len = plane.width() as usize * bpp;
            for row in plane.rows_mut() {
                replaced += scanline::set_alpha_scanline(LineIo::in_place(&mut row[..len]), format, value, min, max)?;
            }
        }
        Ok(replaced)
    }

    /// Mirror every buffer left to right.
    ///
    /// Also reports whether every pixel of the image has zero alpha; always
    /// `false` for formats without alpha.
    pub fn mirror_horizontal(&self, image: &Image) -> Result<(Image, bool), ImagingError> {
        let format = image.format();
        let bpp = pixel_bytes(format)?;
        let mut dest = self.allocate(*image.descriptor())?;
        let mut all_transparent = true;
        for (index, mut plane) in dest.buffers_mut().into_iter().enumerate() {
            self.stop.check()?;
            let src = image.buffer_at(index);
            let len = src.width() as usize * bpp;
            for (line, out) in src.rows().zip(plane.rows_mut()) {
                all_transparent &= scanline::copy_scanline_detect_alpha(
                    LineIo::copy(&line[..len], &mut out[..len]),
                    format,
                    true,
                );
            }
        }
        Ok((dest, all_transparent))
    }

    // --- Backend plumbing ---

    /// Hand one source plane and one destination plane to the backend,
    /// staging through 8-bit RGBA on whichever side has no native format.
    fn run_backend(
        &self,
        src: PlaneRef<'_>,
        dst: &mut PlaneMut<'_>,
        call: impl FnOnce(FrameRef<'_>, &mut FrameMut<'_>) -> Result<(), B::Error>,
    ) -> Result<(), ImagingError> {
        let src_leg = backend_leg(src.format())?;
        let dst_leg = backend_leg(dst.format())?;

        let staged;
        let src_frame = if src_leg.through_rgba8 {
            staged = stage_rgba8(src)?;
            FrameRef::new(&staged, src.width(), src.height(), src.width() as usize * 4, NativeFormat::Rgba32)?
        } else {
            FrameRef::from_plane(src, src_leg.native)
        };

        if !dst_leg.through_rgba8 {
            let mut frame = FrameMut::from_plane(dst, dst_leg.native);
            return call(src_frame, &mut frame).map_err(ImagingError::backend);
        }

        let pitch = dst.width() as usize * 4;
        let mut out = vec![0u8; pitch * dst.height() as usize];
        let mut frame = FrameMut::new(&mut out, dst.width(), dst.height(), pitch, NativeFormat::Rgba32)?;
        call(src_frame, &mut frame).map_err(ImagingError::backend)?;
        let format = dst.format();
        for (rgba, row) in out.chunks_exact(pitch).zip(dst.rows_mut()) {
            scanline::from_rgba8_scanline(rgba, row, format, ScanlineFlags::new())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require(supported: bool, what: &'static str) -> Result<(), ImagingError> {
    if supported {
        Ok(())
    } else {
        Err(ImagingError::Unsupported(what))
    }
}

fn backend_leg(format: PixelFormat) -> Result<BackendLeg, ImagingError> {
    BackendLeg::for_format(format).ok_or(ImagingError::UnsupportedFormat(format))
}

/// Bytes per pixel for formats whose pixels can be addressed one by one.
fn pixel_bytes(format: PixelFormat) -> Result<usize, ImagingError> {
    let info = format.info();
    match info.bytes_per_pixel() {
        Some(bpp) if !info.packed => Ok(bpp),
        _ => Err(ImagingError::UnsupportedFormat(format)),
    }
}

/// Whether narrowing `native` to BGR24 swaps red and blue; `None` if the
/// format is not 8-bit four-channel.
fn narrow_swaps_red_blue(native: NativeFormat) -> Option<bool> {
    match native {
        NativeFormat::Rgba32 => Some(true),
        NativeFormat::Bgra32 | NativeFormat::Bgr32 => Some(false),
        _ => None,
    }
}

fn stage_rgba8(plane: PlaneRef<'_>) -> Result<Vec<u8>, ImagingError> {
    let pitch = plane.width() as usize * 4;
    let mut staged = vec![0u8; pitch * plane.height() as usize];
    for (src, dst) in plane.rows().zip(staged.chunks_exact_mut(pitch)) {
        scanline::to_rgba8_scanline(src, dst, plane.format(), ScanlineFlags::new())?;
    }
    Ok(staged)
}

fn convert_rows(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), ImagingError> {
    let (from, to) = (src.format(), dst.format());
    let mut rgba = vec![0u8; src.width() as usize * 4];
    for (src_row, dst_row) in src.rows().zip(dst.rows_mut()) {
        scanline::to_rgba8_scanline(src_row, &mut rgba, from, ScanlineFlags::new())?;
        scanline::from_rgba8_scanline(&rgba, dst_row, to, ScanlineFlags::new())?;
    }
    Ok(())
}

fn finish_rows(
    plane: &mut PlaneMut<'_>,
    transfer: Option<TransferDirection>,
    opaque: bool,
) -> Result<(), ImagingError> {
    if transfer.is_none() && !opaque {
        return Ok(());
    }
    let format = plane.format();
    let flags = ScanlineFlags::new().with_opaque_alpha(true);
    for row in plane.rows_mut() {
        if let Some(direction) = transfer {
            color::transfer_scanline(row, format, direction)?;
        }
        if opaque {
            scanline::copy_scanline(LineIo::in_place(row), format, flags);
        }
    }
    Ok(())
}

/// Shift `rect` so it lies inside `width` × `height`, shrinking it only if
/// it is larger than the plane.
fn fit_within(rect: Rect, width: u32, height: u32) -> Rect {
    let w = rect.width.min(width);
    let h = rect.height.min(height);
    let x = (rect.x.max(0) as u32).min(width - w);
    let y = (rect.y.max(0) as u32).min(height - h);
    Rect::new(x as i32, y as i32, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCapabilities, ContainerFormat, DecodedFrame};
    use crate::limits::LimitExceeded;
    use core::cell::Cell;
    use enough::StopReason;

    #[derive(Debug, thiserror::Error)]
    #[error("fake backend: {0}")]
    struct FakeError(&'static str);

    /// Nearest-neighbour backend that records how often it is called.
    struct FakeBackend {
        caps: BackendCapabilities,
        frame: Option<DecodedFrame>,
        calls: Cell<usize>,
        encoded: Cell<Option<NativeFormat>>,
    }

    impl FakeBackend {
        fn new(caps: BackendCapabilities) -> Self {
            Self {
                caps,
                frame: None,
                calls: Cell::new(0),
                encoded: Cell::new(None),
            }
        }

        fn with_frame(mut self, frame: DecodedFrame) -> Self {
            self.frame = Some(frame);
            self
        }

        fn called(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn native_bytes(native: NativeFormat) -> usize {
        native.bits_per_pixel() as usize / 8
    }

    impl CodecBackend for FakeBackend {
        type Error = FakeError;

        fn capabilities(&self) -> BackendCapabilities {
            self.caps
        }

        fn probe_format(&self, _data: &[u8]) -> Result<NativeFormat, FakeError> {
            self.frame.as_ref().map(DecodedFrame::native).ok_or(FakeError("nothing to decode"))
        }

        fn decode_frame(&self, _data: &[u8], _native: NativeFormat) -> Result<DecodedFrame, FakeError> {
            self.called();
            self.frame.clone().ok_or(FakeError("nothing to decode"))
        }

        fn encode_frame(&self, frame: FrameRef<'_>, _options: &EncodeOptions) -> Result<Vec<u8>, FakeError> {
            self.called();
            self.encoded.set(Some(frame.native()));
            let len = frame.width() as usize * native_bytes(frame.native());
            Ok((0..frame.height()).flat_map(|y| frame.row(y)[..len].to_vec()).collect())
        }

        fn resample(&self, src: FrameRef<'_>, dst: &mut FrameMut<'_>, _filter: ImageFilter) -> Result<(), FakeError> {
            self.called();
            let bpp = native_bytes(src.native());
            let (sw, sh, dw, dh) = (src.width(), src.height(), dst.width(), dst.height());
            for y in 0..dh {
                let line = src.row(y * sh / dh);
                let out = dst.row_mut(y);
                for x in 0..dw {
                    let sx = (x * sw / dw) as usize;
                    out[x as usize * bpp..][..bpp].copy_from_slice(&line[sx * bpp..][..bpp]);
                }
            }
            Ok(())
        }

        fn crop(&self, src: FrameRef<'_>, rect: Rect, dst: &mut FrameMut<'_>) -> Result<(), FakeError> {
            self.called();
            let bpp = native_bytes(src.native());
            let (x, len) = (rect.x as usize * bpp, rect.width as usize * bpp);
            for y in 0..rect.height {
                let line = src.row(rect.y as u32 + y);
                dst.row_mut(y)[..len].copy_from_slice(&line[x..x + len]);
            }
            Ok(())
        }

        fn convert(&self, src: FrameRef<'_>, dst: &mut FrameMut<'_>, _dithering: Dithering) -> Result<(), FakeError> {
            self.called();
            if (src.native(), dst.native()) != (NativeFormat::Rgba32, NativeFormat::Gray8) {
                return Err(FakeError("unsupported conversion"));
            }
            for y in 0..src.height() {
                let line = src.row(y);
                let out = dst.row_mut(y);
                for x in 0..src.width() as usize {
                    out[x] = line[x * 4];
                }
            }
            Ok(())
        }
    }

    struct Cancelled;

    impl Stop for Cancelled {
        fn check(&self) -> Result<(), StopReason> {
            Err(StopReason::Cancelled)
        }
    }

    fn rgba_image(width: u32, height: u32) -> Image {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| [i as u8, 100 + i as u8, 200, 255])
            .collect();
        Image::from_data(ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, width, height), data).unwrap()
    }

    // --- Decode / encode ---

    #[test]
    fn decode_widens_bgr24() {
        let frame = DecodedFrame::new(vec![1, 2, 3, 4, 5, 6, 0, 0], 2, 1, 8, NativeFormat::Bgr24);
        let backend = FakeBackend::new(BackendCapabilities::new().with_decode(true)).with_frame(frame);
        let transcoder = Transcoder::new(&backend);

        let image = transcoder.decode(b"bytes", NegotiationFlags::new()).unwrap();
        assert_eq!(image.format(), PixelFormat::B8G8R8A8UNorm);
        assert_eq!(image.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);

        let image = transcoder
            .decode(b"bytes", NegotiationFlags::new().with_force_rgb(true))
            .unwrap();
        assert_eq!(image.format(), PixelFormat::R8G8B8A8UNorm);
        assert_eq!(image.data(), &[3, 2, 1, 255, 6, 5, 4, 255]);
    }

    #[test]
    fn decode_bgr555_sets_alpha() {
        let frame = DecodedFrame::new(0x7FFFu16.to_le_bytes().to_vec(), 1, 1, 2, NativeFormat::Bgr555);
        let backend = FakeBackend::new(BackendCapabilities::new().with_decode(true)).with_frame(frame);
        let transcoder = Transcoder::new(&backend);

        let image = transcoder.decode(b"x", NegotiationFlags::new()).unwrap();
        assert_eq!(image.format(), PixelFormat::B5G5R5A1UNorm);
        assert_eq!(image.data(), &0xFFFFu16.to_le_bytes());

        let image = transcoder
            .decode(b"x", NegotiationFlags::new().with_no_16bpp(true))
            .unwrap();
        assert_eq!(image.format(), PixelFormat::R8G8B8A8UNorm);
        assert_eq!(image.data(), &[255, 255, 255, 255]);
    }

    #[test]
    fn decode_checks_file_size_and_capability() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let err = Transcoder::new(&backend).decode(b"x", NegotiationFlags::new()).unwrap_err();
        assert!(matches!(err, ImagingError::Unsupported(_)));

        let backend = FakeBackend::new(BackendCapabilities::new().with_decode(true));
        let err = Transcoder::new(&backend)
            .with_limits(ResourceLimits::none().with_max_file_size(2))
            .decode(b"abc", NegotiationFlags::new())
            .unwrap_err();
        assert!(matches!(err, ImagingError::Limit(LimitExceeded::FileSize { .. })));
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn decode_rejects_short_frames() {
        let frame = DecodedFrame::new(vec![0; 4], 2, 2, 8, NativeFormat::Rgba32);
        let backend = FakeBackend::new(BackendCapabilities::new().with_decode(true)).with_frame(frame);
        let err = Transcoder::new(&backend).decode(b"x", NegotiationFlags::new()).unwrap_err();
        assert!(matches!(err, ImagingError::InsufficientData { required: 16, actual: 4 }));
    }

    #[test]
    fn encode_narrows_for_alpha_less_containers() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_encode(true));
        let transcoder = Transcoder::new(&backend);
        let image = rgba_image(2, 1);

        let bytes = transcoder.encode(&image, &EncodeOptions::new(ContainerFormat::Jpeg)).unwrap();
        assert_eq!(backend.encoded.get(), Some(NativeFormat::Bgr24));
        assert_eq!(bytes, [200, 100, 0, 200, 101, 1]);

        let bytes = transcoder.encode(&image, &EncodeOptions::new(ContainerFormat::Png)).unwrap();
        assert_eq!(backend.encoded.get(), Some(NativeFormat::Rgba32));
        assert_eq!(bytes, image.data());
    }

    #[test]
    fn encode_stages_4444_through_rgba() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_encode(true));
        let data = 0xF00Fu16.to_le_bytes().to_vec();
        let image = Image::from_data(ImageDescriptor::new_2d(PixelFormat::B4G4R4A4UNorm, 1, 1), data).unwrap();
        let bytes = Transcoder::new(&backend)
            .encode(&image, &EncodeOptions::new(ContainerFormat::Png))
            .unwrap();
        assert_eq!(backend.encoded.get(), Some(NativeFormat::Rgba32));
        assert_eq!(bytes, [0, 0, 255, 255]);
    }

    // --- Conversion ---

    #[test]
    fn convert_bgra_to_rgba_with_scanlines() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let data = vec![1, 2, 3, 4];
        let image = Image::from_data(ImageDescriptor::new_2d(PixelFormat::B8G8R8A8UNorm, 1, 1), data).unwrap();
        let request = ConversionRequest::new(PixelFormat::B8G8R8A8UNorm, PixelFormat::R8G8B8A8UNorm);
        let out = Transcoder::new(&backend).convert(&image, &request).unwrap();
        assert_eq!(out.format(), PixelFormat::R8G8B8A8UNorm);
        assert_eq!(out.data(), &[3, 2, 1, 4]);
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn convert_applies_srgb_after_copy() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let image = Image::from_data(
            ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNormSrgb, 1, 1),
            vec![0, 128, 255, 9],
        )
        .unwrap();
        let request = ConversionRequest::new(PixelFormat::R8G8B8A8UNormSrgb, PixelFormat::R8G8B8A8UNorm)
            .with_opaque_alpha(true);
        let out = Transcoder::new(&backend).convert(&image, &request).unwrap();
        let px = out.data();
        assert_eq!(px[0], 0);
        assert!(px[1] < 128);
        assert_eq!(px[2], 255);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn convert_through_backend_and_staging() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_convert(true));
        let transcoder = Transcoder::new(&backend);

        let image = rgba_image(2, 2);
        let request = ConversionRequest::new(PixelFormat::R8G8B8A8UNorm, PixelFormat::R8UNorm);
        let out = transcoder.convert(&image, &request).unwrap();
        assert_eq!(out.data(), &[0, 1, 2, 3]);

        let data = 0xF0F0u16.to_le_bytes().repeat(2);
        let image = Image::from_data(ImageDescriptor::new_2d(PixelFormat::B4G4R4A4UNorm, 2, 1), data).unwrap();
        let request = ConversionRequest::new(PixelFormat::B4G4R4A4UNorm, PixelFormat::R8UNorm);
        let out = transcoder.convert(&image, &request).unwrap();
        assert_eq!(out.data(), &[0, 0]);
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn convert_errors() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let transcoder = Transcoder::new(&backend);
        let image = rgba_image(1, 1);

        let wrong_source = ConversionRequest::new(PixelFormat::B8G8R8A8UNorm, PixelFormat::R8G8B8A8UNorm);
        assert!(matches!(
            transcoder.convert(&image, &wrong_source),
            Err(ImagingError::FormatMismatch { .. })
        ));

        let no_path = ConversionRequest::new(PixelFormat::R8G8B8A8UNorm, PixelFormat::R8UNorm);
        assert!(matches!(
            transcoder.convert(&image, &no_path),
            Err(ImagingError::NoConversionPath { .. })
        ));
    }

    // --- Mips, resize ---

    #[test]
    fn generate_full_mip_chain() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let image = rgba_image(4, 4);
        let out = Transcoder::new(&backend).generate_mips(&image, 0, ImageFilter::Point).unwrap();

        assert_eq!(out.descriptor().mip_count(), 3);
        assert_eq!(out.layout().len(), 3);
        assert_eq!(backend.calls.get(), 2);
        assert_eq!(out.buffer(0, 0).as_bytes(), image.data());
        // Nearest sampling keeps every other pixel of mip 0.
        assert_eq!(&out.buffer(1, 0).row(0)[..4], &[0, 100, 200, 255]);
        assert_eq!(&out.buffer(1, 0).row(0)[4..8], &[2, 102, 200, 255]);
        assert_eq!(out.buffer(2, 0).as_bytes(), &[0, 100, 200, 255]);
    }

    #[test]
    fn generate_mips_for_volume() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let image = Image::new(ImageDescriptor::new_3d(PixelFormat::R8UNorm, 4, 4, 4)).unwrap();
        let out = Transcoder::new(&backend).generate_mips(&image, 3, ImageFilter::Fant).unwrap();
        assert_eq!(out.layout().len(), 4 + 2 + 1);
        assert_eq!(backend.calls.get(), 3);
    }

    #[test]
    fn generate_mips_needs_capability_and_format() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let err = Transcoder::new(&backend)
            .generate_mips(&rgba_image(2, 2), 0, ImageFilter::Fant)
            .unwrap_err();
        assert!(matches!(err, ImagingError::Unsupported(_)));

        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let bc1 = Image::new(ImageDescriptor::new_2d(PixelFormat::Bc1UNorm, 8, 8)).unwrap();
        let err = Transcoder::new(&backend).generate_mips(&bc1, 0, ImageFilter::Fant).unwrap_err();
        assert!(matches!(err, ImagingError::UnsupportedFormat(PixelFormat::Bc1UNorm)));
    }

    #[test]
    fn resize_caps_mip_count() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let image = Image::new(ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 8, 8).with_mip_count(4)).unwrap();
        let out = Transcoder::new(&backend)
            .resize(&image, 2, 2, 1, ImageFilter::Linear)
            .unwrap();
        assert_eq!((out.descriptor().width(), out.descriptor().height()), (2, 2));
        assert_eq!(out.descriptor().mip_count(), 2);
        assert_eq!(backend.calls.get(), 2);
    }

    #[test]
    fn limits_checked_before_backend() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let err = Transcoder::new(&backend)
            .with_limits(ResourceLimits::none().with_max_memory(1024))
            .resize(&rgba_image(2, 2), 64, 64, 1, ImageFilter::Fant)
            .unwrap_err();
        assert!(matches!(err, ImagingError::Limit(LimitExceeded::Memory { .. })));
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn cancellation_between_buffers() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_resample(true));
        let err = Transcoder::new(&backend)
            .with_stop(&Cancelled)
            .generate_mips(&rgba_image(4, 4), 0, ImageFilter::Fant)
            .unwrap_err();
        assert!(matches!(err, ImagingError::Cancelled(StopReason::Cancelled)));
        assert_eq!(backend.calls.get(), 0);
    }

    // --- Crop, expand ---

    #[test]
    fn crop_outside_or_whole_is_noop() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let transcoder = Transcoder::new(&backend);
        let image = rgba_image(4, 4);

        let out = transcoder.crop(&image, Rect::new(10, 10, 4, 4), 1).unwrap();
        assert_eq!(out, image);
        let out = transcoder.crop(&image, Rect::new(-2, -2, 10, 10), 1).unwrap();
        assert_eq!(out, image);
        assert_eq!(backend.calls.get(), 0);
    }

    #[test]
    fn crop_clips_and_scales_per_mip() {
        let backend = FakeBackend::new(BackendCapabilities::new().with_crop(true));
        let image = Image::from_data(
            ImageDescriptor::new_2d(PixelFormat::R8UNorm, 4, 4).with_mip_count(2),
            (0..20).collect(),
        )
        .unwrap();
        let out = Transcoder::new(&backend)
            .crop(&image, Rect::new(2, 2, 8, 8), 1)
            .unwrap();
        assert_eq!((out.descriptor().width(), out.descriptor().height()), (2, 2));
        assert_eq!(out.descriptor().mip_count(), 2);
        assert_eq!(out.buffer(0, 0).as_bytes(), &[10, 11, 14, 15]);
        // Mip 1 is 2x2 (bytes 16..20); the scaled rect is (1,1) 1x1.
        assert_eq!(out.buffer(1, 0).as_bytes(), &[19]);
    }

    #[test]
    fn expand_centers_content() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let image = Image::from_data(ImageDescriptor::new_2d(PixelFormat::R8UNorm, 2, 2), vec![1, 2, 3, 4]).unwrap();
        let out = Transcoder::new(&backend)
            .expand(&image, 4, 4, 1, ExpandAnchor::Center)
            .unwrap();
        assert_eq!(
            out.data(),
            &[0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0]
        );

        let out = Transcoder::new(&backend)
            .expand(&image, 3, 1, 1, ExpandAnchor::BottomRight)
            .unwrap();
        assert_eq!(out.data(), &[0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn anchor_offsets() {
        assert_eq!(ExpandAnchor::TopLeft.offset((2, 2), (6, 4)), (0, 0));
        assert_eq!(ExpandAnchor::Center.offset((2, 2), (6, 4)), (2, 1));
        assert_eq!(ExpandAnchor::Right.offset((2, 2), (6, 4)), (4, 1));
        assert_eq!(ExpandAnchor::Bottom.offset((2, 2), (6, 4)), (2, 2));
    }

    // --- Pixel edits ---

    #[test]
    fn mirror_reports_transparency() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let transcoder = Transcoder::new(&backend);

        let image = Image::from_data(
            ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 2, 1),
            vec![1, 2, 3, 0, 4, 5, 6, 0],
        )
        .unwrap();
        let (out, transparent) = transcoder.mirror_horizontal(&image).unwrap();
        assert!(transparent);
        assert_eq!(out.data(), &[4, 5, 6, 0, 1, 2, 3, 0]);

        let (_, transparent) = transcoder.mirror_horizontal(&rgba_image(2, 1)).unwrap();
        assert!(!transparent);
    }

    #[test]
    fn premultiply_round_trip() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let transcoder = Transcoder::new(&backend);
        let mut image = Image::from_data(
            ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 1, 1),
            vec![200, 100, 50, 128],
        )
        .unwrap();
        transcoder.premultiply(&mut image).unwrap();
        assert_eq!(image.data(), &[100, 50, 25, 128]);
        transcoder.unpremultiply(&mut image).unwrap();
        assert_eq!(image.data(), &[199, 100, 50, 128]);

        let mut gray = Image::new(ImageDescriptor::new_2d(PixelFormat::R8UNorm, 1, 1)).unwrap();
        assert!(transcoder.premultiply(&mut gray).is_err());
    }

    #[test]
    fn set_alpha_counts_replacements() {
        let backend = FakeBackend::new(BackendCapabilities::new());
        let mut image = Image::from_data(
            ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 2, 1),
            vec![0, 0, 0, 0, 0, 0, 0, 200],
        )
        .unwrap();
        let n = Transcoder::new(&backend).set_alpha(&mut image, 255, 0, 10).unwrap();
        assert_eq!(n, 1);
        assert_eq!(image.data(), &[0, 0, 0, 255, 0, 0, 0, 200]);
    }

    #[test]
    fn fit_within_shifts_rect() {
        assert_eq!(fit_within(Rect::new(2, 0, 1, 1), 2, 2), Rect::new(1, 0, 1, 1));
        assert_eq!(fit_within(Rect::new(0, 0, 1, 1), 2, 2), Rect::new(0, 0, 1, 1));
    }
}
