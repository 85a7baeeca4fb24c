//! Codec backend boundary.
//!
//! The pipeline never decodes containers or filters pixels itself. It hands
//! whole frames in a [`NativeFormat`] to a caller-owned [`CodecBackend`] and
//! gets frames back. [`BackendCapabilities`] tells the pipeline which calls
//! the backend actually implements, so it can fail early with
//! [`ImagingError::Unsupported`](crate::ImagingError::Unsupported) instead of
//! calling into a stub.

use alloc::vec::Vec;
use core::fmt;

use crate::buffer::{PlaneMut, PlaneRef};
use crate::error::ImagingError;
use crate::native::NativeFormat;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Describes what a backend supports.
///
/// # Example
///
/// ```
/// use zenlayout::BackendCapabilities;
///
/// static CAPS: BackendCapabilities = BackendCapabilities::new()
///     .with_decode(true)
///     .with_resample(true);
///
/// assert!(CAPS.decode());
/// assert!(!CAPS.crop());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct BackendCapabilities {
    decode: bool,
    encode: bool,
    resample: bool,
    crop: bool,
    convert: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendCapabilities {
    /// Create capabilities with everything disabled.
    pub const fn new() -> Self {
        Self {
            decode: false,
            encode: false,
            resample: false,
            crop: false,
            convert: false,
        }
    }

    /// Everything enabled.
    pub const fn all() -> Self {
        Self {
            decode: true,
            encode: true,
            resample: true,
            crop: true,
            convert: true,
        }
    }

    /// Whether [`CodecBackend::decode_frame`] and
    /// [`CodecBackend::probe_format`] work.
    pub const fn decode(&self) -> bool {
        self.decode
    }

    /// Whether [`CodecBackend::encode_frame`] works.
    pub const fn encode(&self) -> bool {
        self.encode
    }

    /// Whether [`CodecBackend::resample`] works.
    pub const fn resample(&self) -> bool {
        self.resample
    }

    /// Whether [`CodecBackend::crop`] works.
    pub const fn crop(&self) -> bool {
        self.crop
    }

    /// Whether [`CodecBackend::convert`] works.
    pub const fn convert(&self) -> bool {
        self.convert
    }

    /// Set decode support.
    pub const fn with_decode(mut self, v: bool) -> Self {
        self.decode = v;
        self
    }

    /// Set encode support.
    pub const fn with_encode(mut self, v: bool) -> Self {
        self.encode = v;
        self
    }

    /// Set resample support.
    pub const fn with_resample(mut self, v: bool) -> Self {
        self.resample = v;
        self
    }

    /// Set crop support.
    pub const fn with_crop(mut self, v: bool) -> Self {
        self.crop = v;
        self
    }

    /// Set native-format conversion support.
    pub const fn with_convert(mut self, v: bool) -> Self {
        self.convert = v;
        self
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Sampling filter for resampling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageFilter {
    /// Nearest neighbour.
    Point,
    /// Bilinear.
    Linear,
    /// Bicubic.
    Cubic,
    /// Box filter weighted by pixel coverage. Good for downscaling.
    #[default]
    Fant,
}

/// Dithering used when a conversion loses precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Dithering {
    /// No dithering.
    #[default]
    None,
    /// 4x4 ordered.
    Ordered4x4,
    /// 8x8 ordered.
    Ordered8x8,
    /// 16x16 ordered.
    Ordered16x16,
    /// 4x4 spiral.
    Spiral4x4,
    /// 8x8 spiral.
    Spiral8x8,
    /// 4x4 dual spiral.
    DualSpiral4x4,
    /// 8x8 dual spiral.
    DualSpiral8x8,
    /// Error diffusion.
    ErrorDiffusion,
}

/// Container file format written by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ContainerFormat {
    /// PNG.
    Png,
    /// Windows bitmap.
    Bmp,
    /// JPEG.
    Jpeg,
    /// GIF.
    Gif,
    /// TIFF.
    Tiff,
    /// JPEG XR / HD Photo.
    Wmp,
}

impl ContainerFormat {
    /// Whether the container stores an alpha channel. Frames for containers
    /// without alpha are narrowed to 24-bit rows before encoding.
    pub const fn supports_alpha(self) -> bool {
        matches!(self, Self::Png | Self::Gif | Self::Tiff | Self::Wmp)
    }
}

/// Encode settings handed to [`CodecBackend::encode_frame`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodeOptions {
    container: ContainerFormat,
    quality: Option<f32>,
    interlace: bool,
}

impl EncodeOptions {
    /// Defaults for `container`: backend-chosen quality, no interlacing.
    pub const fn new(container: ContainerFormat) -> Self {
        Self {
            container,
            quality: None,
            interlace: false,
        }
    }

    /// Lossy quality in `0.0..=1.0`. Out-of-range values are clamped.
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = Some(quality.clamp(0.0, 1.0));
        self
    }

    /// Write an interlaced/progressive stream where supported.
    pub const fn with_interlace(mut self, v: bool) -> Self {
        self.interlace = v;
        self
    }

    /// Target container.
    pub const fn container(&self) -> ContainerFormat {
        self.container
    }

    /// Lossy quality, if set.
    pub const fn quality(&self) -> Option<f32> {
        self.quality
    }

    /// Whether interlacing was requested.
    pub const fn interlace(&self) -> bool {
        self.interlace
    }
}

/// Pixel rectangle. The origin may be negative; see [`clip`](Self::clip).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle covers no pixels.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersect with `0..width` × `0..height`. `None` if nothing is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        // Bounded by `width`/`height`, so the narrowing casts are lossless.
        Some(Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// The rectangle as it applies to mip level `mip`: origin and size
    /// halved per level, size floored at 1.
    pub const fn at_mip(&self, mip: u32) -> Rect {
        let shift = if mip > 31 { 31 } else { mip };
        let w = self.width >> shift;
        let h = self.height >> shift;
        Rect::new(
            self.x >> shift,
            self.y >> shift,
            if w == 0 { 1 } else { w },
            if h == 0 { 1 } else { h },
        )
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Pixels in a native format, as handed to the backend.
#[derive(Clone, Copy)]
pub struct FrameRef<'a> {
    pixels: &'a [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    native: NativeFormat,
}

impl<'a> FrameRef<'a> {
    /// Wrap loose native pixels.
    ///
    /// # Errors
    ///
    /// [`ImagingError::InsufficientData`] if `pixels` is shorter than
    /// `row_pitch * height`.
    pub fn new(
        pixels: &'a [u8],
        width: u32,
        height: u32,
        row_pitch: usize,
        native: NativeFormat,
    ) -> Result<Self, ImagingError> {
        let required = row_pitch * height as usize;
        if pixels.len() < required {
            return Err(ImagingError::InsufficientData {
                required,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels: &pixels[..required],
            width,
            height,
            row_pitch,
            native,
        })
    }

    /// View an image plane as `native`.
    pub fn from_plane(plane: PlaneRef<'a>, native: NativeFormat) -> Self {
        Self {
            pixels: plane.as_bytes(),
            width: plane.width(),
            height: plane.height(),
            row_pitch: plane.row_pitch(),
            native,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte stride between rows.
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Native format of the pixels.
    pub fn native(&self) -> NativeFormat {
        self.native
    }

    /// All pixel bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.pixels
    }

    /// Row `y`, `row_pitch` bytes long.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(y < self.height, "row index {y} out of bounds (height: {})", self.height);
        let start = y as usize * self.row_pitch;
        &self.pixels[start..start + self.row_pitch]
    }
}

impl fmt::Debug for FrameRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrameRef({}x{} {:?}, pitch {})",
            self.width, self.height, self.native, self.row_pitch
        )
    }
}

/// Destination pixels the backend writes in a native format.
pub struct FrameMut<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    native: NativeFormat,
}

impl<'a> FrameMut<'a> {
    /// Wrap a loose native buffer.
    ///
    /// # Errors
    ///
    /// [`ImagingError::InsufficientData`] if `pixels` is too short.
    pub fn new(
        pixels: &'a mut [u8],
        width: u32,
        height: u32,
        row_pitch: usize,
        native: NativeFormat,
    ) -> Result<Self, ImagingError> {
        let required = row_pitch * height as usize;
        if pixels.len() < required {
            return Err(ImagingError::InsufficientData {
                required,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels: &mut pixels[..required],
            width,
            height,
            row_pitch,
            native,
        })
    }

    /// Write into an image plane as `native`.
    pub fn from_plane(plane: &'a mut PlaneMut<'_>, native: NativeFormat) -> Self {
        let (width, height, row_pitch) = (plane.width(), plane.height(), plane.row_pitch());
        Self {
            pixels: plane.as_bytes_mut(),
            width,
            height,
            row_pitch,
            native,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte stride between rows.
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Native format the pixels must be written in.
    pub fn native(&self) -> NativeFormat {
        self.native
    }

    /// All pixel bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.pixels
    }

    /// Row `y`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row index {y} out of bounds (height: {})", self.height);
        let start = y as usize * self.row_pitch;
        &mut self.pixels[start..start + self.row_pitch]
    }
}

impl fmt::Debug for FrameMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrameMut({}x{} {:?}, pitch {})",
            self.width, self.height, self.native, self.row_pitch
        )
    }
}

/// One decoded frame, owned.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    row_pitch: usize,
    native: NativeFormat,
}

impl DecodedFrame {
    /// Wrap decoded pixels. `native` is the format the backend actually
    /// produced, which may differ from the one requested.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, row_pitch: usize, native: NativeFormat) -> Self {
        Self {
            pixels,
            width,
            height,
            row_pitch,
            native,
        }
    }

    /// Pixel bytes, `row_pitch * height` or more.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Take the pixel bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte stride between rows.
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Native format of the pixels.
    pub fn native(&self) -> NativeFormat {
        self.native
    }

    /// Row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height` or the pixel data is short.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row index {y} out of bounds (height: {})", self.height);
        let start = y as usize * self.row_pitch;
        &self.pixels[start..start + self.row_pitch]
    }
}

impl fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecodedFrame({}x{} {:?}, {} bytes)",
            self.width,
            self.height,
            self.native,
            self.pixels.len()
        )
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A platform codec and pixel sampler.
///
/// Implementations are handed to [`Transcoder`](crate::Transcoder) by
/// reference; the pipeline holds no global state. Methods the backend does
/// not implement should be reported as unsupported in
/// [`capabilities`](Self::capabilities); the pipeline will not call them.
pub trait CodecBackend {
    /// The backend-specific error type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// What this backend implements.
    fn capabilities(&self) -> BackendCapabilities;

    /// Native pixel format of the first frame in `data`.
    fn probe_format(&self, data: &[u8]) -> Result<NativeFormat, Self::Error>;

    /// Decode the first frame of `data`, preferably as `native`.
    fn decode_frame(&self, data: &[u8], native: NativeFormat) -> Result<DecodedFrame, Self::Error>;

    /// Encode one frame into a container.
    fn encode_frame(&self, frame: FrameRef<'_>, options: &EncodeOptions) -> Result<Vec<u8>, Self::Error>;

    /// Scale `src` to the size of `dst`.
    fn resample(&self, src: FrameRef<'_>, dst: &mut FrameMut<'_>, filter: ImageFilter) -> Result<(), Self::Error>;

    /// Copy `rect` of `src` into `dst`, whose size is the rectangle's size.
    fn crop(&self, src: FrameRef<'_>, rect: Rect, dst: &mut FrameMut<'_>) -> Result<(), Self::Error>;

    /// Convert `src` into the native format of `dst`. Sizes match.
    fn convert(&self, src: FrameRef<'_>, dst: &mut FrameMut<'_>, dithering: Dithering) -> Result<(), Self::Error>;
}
