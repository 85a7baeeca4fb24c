//! Image storage.
//!
//! An [`Image`] owns one contiguous byte arena laid out by
//! [`compute_layout`]. Individual buffers are borrowed as [`PlaneRef`] /
//! [`PlaneMut`] views carrying their own size, pitch and format, so callers
//! never do offset arithmetic themselves.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::error::ImagingError;
use crate::format::PixelFormat;
use crate::layout::{BufferLayoutEntry, ImageDescriptor, ImageLayout, compute_layout};
use crate::limits::ResourceLimits;

// ---------------------------------------------------------------------------
// PlaneRef (borrowed, immutable)
// ---------------------------------------------------------------------------

/// Borrowed view of one buffer: a mip level of one array or depth slice.
///
/// Rows are scanlines for uncompressed formats and 4×4 block rows for
/// compressed ones; see [`scanline_count`](Self::scanline_count).
#[derive(Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: PixelFormat,
    mip_level: u32,
    index: u32,
}

impl<'a> PlaneRef<'a> {
    /// Wrap loose pixel data, such as a decoded frame.
    ///
    /// # Errors
    ///
    /// [`ImagingError::InsufficientData`] if `data` is shorter than
    /// `row_pitch` times the scanline count.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        row_pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, ImagingError> {
        let required = row_pitch * format.info().scanline_count(height) as usize;
        if data.len() < required {
            return Err(ImagingError::InsufficientData {
                required,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: &data[..required],
            width,
            height,
            row_pitch,
            format,
            mip_level: 0,
            index: 0,
        })
    }

    fn from_entry(data: &'a [u8], entry: &BufferLayoutEntry, format: PixelFormat) -> Self {
        Self {
            data,
            width: entry.width,
            height: entry.height,
            row_pitch: entry.row_pitch as usize,
            format,
            mip_level: entry.mip_level,
            index: entry.array_or_depth_index,
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Mip level this buffer belongs to.
    #[inline]
    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    /// Array index, or depth slice index for 3D images.
    #[inline]
    pub fn array_or_depth_index(&self) -> u32 {
        self.index
    }

    /// Rows stored (block rows for compressed formats).
    #[inline]
    pub fn scanline_count(&self) -> u32 {
        self.format.info().scanline_count(self.height)
    }

    /// Bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= scanline_count()`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let rows = self.scanline_count();
        assert!(y < rows, "row index {y} out of bounds (rows: {rows})");
        let start = y as usize * self.row_pitch;
        &self.data[start..start + self.row_pitch]
    }

    /// All rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + use<'a> {
        self.data.chunks_exact(self.row_pitch.max(1))
    }

    /// The whole buffer.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

impl fmt::Debug for PlaneRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaneRef({}x{}, {:?}, mip {}, index {})",
            self.width, self.height, self.format, self.mip_level, self.index
        )
    }
}

// ---------------------------------------------------------------------------
// PlaneMut (borrowed, mutable)
// ---------------------------------------------------------------------------

/// Mutable view of one buffer.
///
/// Same semantics as [`PlaneRef`] but allows writing rows. Distinct
/// `PlaneMut`s from [`Image::buffers_mut`] never overlap and may be sent
/// to different threads.
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: PixelFormat,
    mip_level: u32,
    index: u32,
}

impl<'a> PlaneMut<'a> {
    /// Wrap a loose mutable buffer, such as a frame staging area.
    ///
    /// # Errors
    ///
    /// [`ImagingError::InsufficientData`] if `data` is too short.
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        row_pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, ImagingError> {
        let required = row_pitch * format.info().scanline_count(height) as usize;
        if data.len() < required {
            return Err(ImagingError::InsufficientData {
                required,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: &mut data[..required],
            width,
            height,
            row_pitch,
            format,
            mip_level: 0,
            index: 0,
        })
    }

    fn from_entry(data: &'a mut [u8], entry: &BufferLayoutEntry, format: PixelFormat) -> Self {
        Self {
            data,
            width: entry.width,
            height: entry.height,
            row_pitch: entry.row_pitch as usize,
            format,
            mip_level: entry.mip_level,
            index: entry.array_or_depth_index,
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Mip level this buffer belongs to.
    #[inline]
    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    /// Array index, or depth slice index for 3D images.
    #[inline]
    pub fn array_or_depth_index(&self) -> u32 {
        self.index
    }

    /// Rows stored (block rows for compressed formats).
    #[inline]
    pub fn scanline_count(&self) -> u32 {
        self.format.info().scanline_count(self.height)
    }

    /// Read-only view of the same buffer.
    #[inline]
    pub fn as_view(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: &*self.data,
            width: self.width,
            height: self.height,
            row_pitch: self.row_pitch,
            format: self.format,
            mip_level: self.mip_level,
            index: self.index,
        }
    }

    /// Bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= scanline_count()`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let rows = self.scanline_count();
        assert!(y < rows, "row index {y} out of bounds (rows: {rows})");
        let start = y as usize * self.row_pitch;
        &self.data[start..start + self.row_pitch]
    }

    /// Mutable bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= scanline_count()`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let rows = self.scanline_count();
        assert!(y < rows, "row index {y} out of bounds (rows: {rows})");
        let start = y as usize * self.row_pitch;
        &mut self.data[start..start + self.row_pitch]
    }

    /// All rows, top to bottom.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.data.chunks_exact_mut(self.row_pitch.max(1))
    }

    /// The whole buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &*self.data
    }

    /// The whole buffer, mutably.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    /// Copy `src` row by row into this buffer.
    ///
    /// # Errors
    ///
    /// [`ImagingError::FormatMismatch`] if the storage formats differ, or
    /// [`ImagingError::InsufficientData`] if the sizes differ.
    pub fn copy_from(&mut self, src: &PlaneRef<'_>) -> Result<(), ImagingError> {
        if !src.format.storage_equivalent(self.format) {
            return Err(ImagingError::FormatMismatch {
                expected: self.format,
                actual: src.format,
            });
        }
        if src.width != self.width || src.height != self.height {
            return Err(ImagingError::InsufficientData {
                required: self.data.len(),
                actual: src.data.len(),
            });
        }
        let len = self.row_pitch.min(src.row_pitch);
        for (dst, src) in self.rows_mut().zip(src.rows()) {
            dst[..len].copy_from_slice(&src[..len]);
        }
        Ok(())
    }
}

impl fmt::Debug for PlaneMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlaneMut({}x{}, {:?}, mip {}, index {})",
            self.width, self.height, self.format, self.mip_level, self.index
        )
    }
}

// ---------------------------------------------------------------------------
// Image (owned arena)
// ---------------------------------------------------------------------------

/// An image: descriptor, layout and the arena holding every buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    layout: ImageLayout,
    data: Vec<u8>,
}

impl Image {
    /// Allocate a zeroed image.
    pub fn new(descriptor: ImageDescriptor) -> Result<Self, ImagingError> {
        let layout = compute_layout(&descriptor)?;
        let data = vec![0u8; layout.total_size()];
        Ok(Self { layout, data })
    }

    /// Allocate a zeroed image after checking `limits`.
    pub fn with_limits(
        descriptor: ImageDescriptor,
        limits: &ResourceLimits,
    ) -> Result<Self, ImagingError> {
        descriptor.validate()?;
        limits.check_descriptor(&descriptor)?;
        Self::new(descriptor)
    }

    /// Wrap existing arena bytes. Extra trailing bytes are dropped.
    ///
    /// # Errors
    ///
    /// [`ImagingError::InsufficientData`] if `data` is shorter than the
    /// layout requires.
    pub fn from_data(descriptor: ImageDescriptor, mut data: Vec<u8>) -> Result<Self, ImagingError> {
        let layout = compute_layout(&descriptor)?;
        if data.len() < layout.total_size() {
            return Err(ImagingError::InsufficientData {
                required: layout.total_size(),
                actual: data.len(),
            });
        }
        data.truncate(layout.total_size());
        Ok(Self { layout, data })
    }

    /// Image descriptor.
    #[inline]
    pub fn descriptor(&self) -> &ImageDescriptor {
        self.layout.descriptor()
    }

    /// Buffer layout.
    #[inline]
    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.layout.descriptor().format()
    }

    /// The whole arena.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The whole arena, mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take the arena.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Buffer at `(mip, depth_or_array)`, clamped like
    /// [`ImageLayout::index_of`].
    pub fn buffer(&self, mip: u32, depth_or_array: u32) -> PlaneRef<'_> {
        self.buffer_at(self.layout.index_of(mip, depth_or_array))
    }

    /// Buffer at `(mip, depth_or_array)`, strictly checked.
    pub fn try_buffer(&self, mip: u32, depth_or_array: u32) -> Result<PlaneRef<'_>, ImagingError> {
        Ok(self.buffer_at(self.layout.try_index_of(mip, depth_or_array)?))
    }

    /// Mutable buffer at `(mip, depth_or_array)`, clamped.
    pub fn buffer_mut(&mut self, mip: u32, depth_or_array: u32) -> PlaneMut<'_> {
        let index = self.layout.index_of(mip, depth_or_array);
        self.buffer_at_mut(index)
    }

    /// Mutable buffer at `(mip, depth_or_array)`, strictly checked.
    pub fn try_buffer_mut(
        &mut self,
        mip: u32,
        depth_or_array: u32,
    ) -> Result<PlaneMut<'_>, ImagingError> {
        let index = self.layout.try_index_of(mip, depth_or_array)?;
        Ok(self.buffer_at_mut(index))
    }

    /// Buffer by position in the layout.
    ///
    /// # Panics
    ///
    /// Panics if `index >= layout().len()`.
    pub fn buffer_at(&self, index: usize) -> PlaneRef<'_> {
        let entry = &self.layout.entries()[index];
        PlaneRef::from_entry(&self.data[entry.byte_range()], entry, self.format())
    }

    /// Mutable buffer by position in the layout.
    ///
    /// # Panics
    ///
    /// Panics if `index >= layout().len()`.
    pub fn buffer_at_mut(&mut self, index: usize) -> PlaneMut<'_> {
        let format = self.format();
        let entry = &self.layout.entries()[index];
        PlaneMut::from_entry(&mut self.data[entry.byte_range()], entry, format)
    }

    /// Every buffer, in layout order.
    pub fn buffers(&self) -> impl Iterator<Item = PlaneRef<'_>> {
        let format = self.format();
        self.layout
            .entries()
            .iter()
            .map(move |entry| PlaneRef::from_entry(&self.data[entry.byte_range()], entry, format))
    }

    /// Every buffer as a disjoint mutable view, in layout order.
    pub fn buffers_mut(&mut self) -> Vec<PlaneMut<'_>> {
        let format = self.layout.descriptor().format();
        let mut rest = self.data.as_mut_slice();
        let mut planes = Vec::with_capacity(self.layout.len());
        for entry in self.layout.entries() {
            let (head, tail) = core::mem::take(&mut rest).split_at_mut(entry.slice_pitch as usize);
            planes.push(PlaneMut::from_entry(head, entry, format));
            rest = tail;
        }
        planes
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.descriptor();
        write!(
            f,
            "Image({:?} {}x{}x{}, {} mips, {} slices, {:?})",
            d.image_type(),
            d.width(),
            d.height(),
            d.depth(),
            d.mip_count(),
            d.array_count(),
            d.format()
        )
    }
}
