//! Image layout: where every mip level, array slice and depth slice lives.
//!
//! An [`ImageDescriptor`] describes an image's shape. [`compute_layout`]
//! turns it into an [`ImageLayout`]: one [`BufferLayoutEntry`] per
//! physically distinct buffer, in array-major, mip-ascending,
//! depth-ascending order, with byte offsets into one contiguous arena.
//!
//! ```
//! use zenlayout::{ImageDescriptor, PixelFormat, compute_layout};
//!
//! let desc = ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 4, 4).with_mip_count(3);
//! let layout = compute_layout(&desc).unwrap();
//! assert_eq!(layout.len(), 3);
//! assert_eq!(layout.index_of(2, 0), 2);
//! ```

use alloc::vec::Vec;

use tracing::trace;

use crate::error::{ImagingError, IndexAxis};
use crate::format::{PitchOptions, PixelFormat};

/// Dimensionality of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// One row per slice; height and depth are 1.
    Image1D,
    /// Width × height slices, optionally arrayed.
    Image2D,
    /// Width × height × depth; never arrayed.
    Image3D,
}

/// Immutable description of an image's shape and format.
///
/// Built with a constructor per [`ImageType`] and the `with_*` setters.
/// A format or size change means a new descriptor and a new layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    image_type: ImageType,
    format: PixelFormat,
    width: u32,
    height: u32,
    depth: u32,
    array_count: u32,
    mip_count: u32,
}

impl ImageDescriptor {
    /// A 1D image `width` pixels wide.
    pub const fn new_1d(format: PixelFormat, width: u32) -> Self {
        Self::new(ImageType::Image1D, format, width, 1, 1)
    }

    /// A 2D image.
    pub const fn new_2d(format: PixelFormat, width: u32, height: u32) -> Self {
        Self::new(ImageType::Image2D, format, width, height, 1)
    }

    /// A 3D image.
    pub const fn new_3d(format: PixelFormat, width: u32, height: u32, depth: u32) -> Self {
        Self::new(ImageType::Image3D, format, width, height, depth)
    }

    const fn new(image_type: ImageType, format: PixelFormat, width: u32, height: u32, depth: u32) -> Self {
        Self {
            image_type,
            format,
            width,
            height,
            depth,
            array_count: 1,
            mip_count: 1,
        }
    }

    /// Set the array slice count.
    pub const fn with_array_count(mut self, count: u32) -> Self {
        self.array_count = count;
        self
    }

    /// Set the mip level count.
    pub const fn with_mip_count(mut self, count: u32) -> Self {
        self.mip_count = count;
        self
    }

    /// Use every mip level down to 1×1×1.
    pub const fn with_full_mip_chain(mut self) -> Self {
        self.mip_count = max_mip_count(self.width, self.height, self.depth);
        self
    }

    /// Same shape, different format.
    pub const fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Same type, format and counts; new top-level size.
    ///
    /// Depth is ignored for 1D and 2D images.
    pub const fn with_size(mut self, width: u32, height: u32, depth: u32) -> Self {
        self.width = width;
        self.height = match self.image_type {
            ImageType::Image1D => 1,
            _ => height,
        };
        self.depth = match self.image_type {
            ImageType::Image3D => depth,
            _ => 1,
        };
        self
    }

    /// Image dimensionality.
    #[inline]
    pub const fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// Pixel format.
    #[inline]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Top-level width.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Top-level height.
    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Top-level depth (1 unless 3D).
    #[inline]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Array slice count (1 for 3D).
    #[inline]
    pub const fn array_count(&self) -> u32 {
        self.array_count
    }

    /// Mip level count.
    #[inline]
    pub const fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// Width, height and depth of `mip`.
    pub const fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        (
            mip_dimension(self.width, mip),
            mip_dimension(self.height, mip),
            self.depth_at(mip),
        )
    }

    /// Depth slices stored at `mip`: halved per level for 3D images,
    /// always 1 otherwise.
    pub const fn depth_at(&self, mip: u32) -> u32 {
        match self.image_type {
            ImageType::Image3D => mip_dimension(self.depth, mip),
            _ => 1,
        }
    }

    /// Check the structural rules every layout relies on.
    pub fn validate(&self) -> Result<(), ImagingError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(ImagingError::InvalidDescriptor("dimensions must be non-zero"));
        }
        if self.array_count == 0 {
            return Err(ImagingError::InvalidDescriptor("array count must be non-zero"));
        }
        if self.mip_count == 0 {
            return Err(ImagingError::InvalidDescriptor("mip count must be non-zero"));
        }
        match self.image_type {
            ImageType::Image1D if self.height != 1 => {
                return Err(ImagingError::InvalidDescriptor("1D images have a height of 1"));
            }
            ImageType::Image1D | ImageType::Image2D if self.depth != 1 => {
                return Err(ImagingError::InvalidDescriptor("only 3D images have depth"));
            }
            ImageType::Image3D if self.array_count != 1 => {
                return Err(ImagingError::InvalidDescriptor("3D images cannot be arrayed"));
            }
            _ => {}
        }
        if self.mip_count > max_mip_count(self.width, self.height, self.depth) {
            return Err(ImagingError::InvalidDescriptor(
                "mip count exceeds the full mip chain",
            ));
        }
        Ok(())
    }

    /// Compute this descriptor's layout. See [`compute_layout`].
    pub fn describe(&self) -> Result<ImageLayout, ImagingError> {
        compute_layout(self)
    }
}

/// Size of `size` at mip level `mip`, floored at 1.
#[inline]
pub const fn mip_dimension(size: u32, mip: u32) -> u32 {
    let halved = if mip >= u32::BITS { 0 } else { size >> mip };
    if halved == 0 { 1 } else { halved }
}

/// Number of mip levels until every axis reaches 1.
pub const fn max_mip_count(width: u32, height: u32, depth: u32) -> u32 {
    let (mut w, mut h, mut d) = (width, height, depth);
    let mut count = 1;
    while w > 1 || h > 1 || d > 1 {
        w = if w > 1 { w >> 1 } else { 1 };
        h = if h > 1 { h >> 1 } else { 1 };
        d = if d > 1 { d >> 1 } else { 1 };
        count += 1;
    }
    count
}

/// Total depth slices across `mip_count` levels of a 3D image.
pub const fn depth_slice_count(depth: u32, mip_count: u32) -> u32 {
    let mut total = 0;
    let mut mip = 0;
    while mip < mip_count {
        total += mip_dimension(depth, mip);
        mip += 1;
    }
    total
}

/// Arena bytes needed for every buffer of `descriptor`.
///
/// Assumes a valid descriptor; saturates instead of overflowing.
pub fn size_in_bytes(descriptor: &ImageDescriptor) -> u64 {
    let info = descriptor.format.info();
    let mut total: u64 = 0;
    for mip in 0..descriptor.mip_count {
        let (w, h, d) = descriptor.mip_extent(mip);
        let slice = info.pitch(w, h, PitchOptions::new()).slice_pitch;
        total = total.saturating_add(slice.saturating_mul(d as u64));
    }
    total.saturating_mul(descriptor.array_count as u64)
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// One physically distinct buffer in an image arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferLayoutEntry {
    /// Position in the layout's buffer list.
    pub buffer_index: u32,
    /// Byte offset of the buffer in the arena.
    pub byte_offset: usize,
    /// Bytes per scanline (per block row for compressed formats).
    pub row_pitch: u32,
    /// Bytes in the whole buffer.
    pub slice_pitch: u32,
    /// Width at this mip.
    pub width: u32,
    /// Height at this mip.
    pub height: u32,
    /// Depth slices at this mip (1 unless 3D).
    pub depth: u32,
    /// Mip level.
    pub mip_level: u32,
    /// Array index, or depth slice index for 3D images.
    pub array_or_depth_index: u32,
}

impl BufferLayoutEntry {
    /// Arena byte range of this buffer.
    #[inline]
    pub fn byte_range(&self) -> core::ops::Range<usize> {
        self.byte_offset..self.byte_offset + self.slice_pitch as usize
    }
}

/// First buffer index and depth count of one `(mip, array)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MipOffset {
    /// Buffer index of the first depth slice.
    pub first_buffer: u32,
    /// Depth slices stored at this mip.
    pub depth: u32,
}

/// O(1) lookup from `(mip, array_index)` to [`MipOffset`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MipOffsetIndex {
    mip_count: u32,
    offsets: Vec<MipOffset>,
}

impl MipOffsetIndex {
    /// Offset record for `(mip, array_index)`, or `None` if out of range.
    #[inline]
    pub fn get(&self, mip: u32, array_index: u32) -> Option<MipOffset> {
        if mip >= self.mip_count {
            return None;
        }
        let key = array_index as usize * self.mip_count as usize + mip as usize;
        self.offsets.get(key).copied()
    }

    /// Number of `(mip, array)` records.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the index is empty (never true for a computed layout).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Buffer list and mip index for one [`ImageDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageLayout {
    descriptor: ImageDescriptor,
    entries: Vec<BufferLayoutEntry>,
    mip_index: MipOffsetIndex,
    total_size: usize,
}

/// Compute the tightly packed layout of `descriptor`.
///
/// Walks array slices outermost, then mips, then depth slices. Each mip's
/// pitches come from the format catalog; offsets accumulate by slice pitch.
///
/// # Errors
///
/// [`ImagingError::InvalidDescriptor`] if the descriptor breaks a
/// structural rule or a buffer does not fit the address space.
pub fn compute_layout(descriptor: &ImageDescriptor) -> Result<ImageLayout, ImagingError> {
    compute_layout_with_pitch(descriptor, PitchOptions::new())
}

/// [`compute_layout`] with non-default row pitches, for arenas written
/// with legacy row alignment.
pub fn compute_layout_with_pitch(
    descriptor: &ImageDescriptor,
    pitch: PitchOptions,
) -> Result<ImageLayout, ImagingError> {
    descriptor.validate()?;
    let info = descriptor.format.info();

    let index_len = descriptor.array_count as usize * descriptor.mip_count as usize;
    let mut offsets = Vec::with_capacity(index_len);
    let mut entries = Vec::new();
    let mut offset: usize = 0;

    for array in 0..descriptor.array_count {
        for mip in 0..descriptor.mip_count {
            let (width, height, depth_here) = descriptor.mip_extent(mip);
            let layout = info.pitch(width, height, pitch);
            let row_pitch = u32::try_from(layout.row_pitch)
                .map_err(|_| ImagingError::InvalidDescriptor("row pitch exceeds u32"))?;
            let slice_pitch = u32::try_from(layout.slice_pitch)
                .map_err(|_| ImagingError::InvalidDescriptor("slice pitch exceeds u32"))?;

            let first_buffer = u32::try_from(entries.len())
                .map_err(|_| ImagingError::InvalidDescriptor("too many buffers"))?;
            offsets.push(MipOffset {
                first_buffer,
                depth: depth_here,
            });

            for slice in 0..depth_here {
                entries.push(BufferLayoutEntry {
                    buffer_index: first_buffer + slice,
                    byte_offset: offset,
                    row_pitch,
                    slice_pitch,
                    width,
                    height,
                    depth: depth_here,
                    mip_level: mip,
                    array_or_depth_index: match descriptor.image_type {
                        ImageType::Image3D => slice,
                        _ => array,
                    },
                });
                offset = offset
                    .checked_add(slice_pitch as usize)
                    .ok_or(ImagingError::InvalidDescriptor("image exceeds address space"))?;
            }
        }
    }

    trace!(
        buffers = entries.len(),
        bytes = offset,
        format = ?descriptor.format,
        "computed image layout"
    );

    Ok(ImageLayout {
        descriptor: *descriptor,
        entries,
        mip_index: MipOffsetIndex {
            mip_count: descriptor.mip_count,
            offsets,
        },
        total_size: offset,
    })
}

impl ImageLayout {
    /// The descriptor this layout was computed from.
    #[inline]
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// All buffers, in index order.
    #[inline]
    pub fn entries(&self) -> &[BufferLayoutEntry] {
        &self.entries
    }

    /// The `(mip, array)` index.
    #[inline]
    pub fn mip_index(&self) -> &MipOffsetIndex {
        &self.mip_index
    }

    /// Number of buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a computed layout.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arena size in bytes.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Buffer index of `(mip, depth_or_array)`, clamped.
    ///
    /// Out-of-range inputs are clamped to the last valid mip and the last
    /// valid array or depth slice at that mip, so this never fails. Use
    /// [`try_index_of`](Self::try_index_of) when out-of-range input is a
    /// caller bug.
    pub fn index_of(&self, mip: u32, depth_or_array: u32) -> usize {
        let mip = mip.min(self.descriptor.mip_count - 1);
        match self.descriptor.image_type {
            ImageType::Image3D => {
                let offset = self.offset_unchecked(mip, 0);
                offset.first_buffer as usize + depth_or_array.min(offset.depth - 1) as usize
            }
            _ => {
                let array = depth_or_array.min(self.descriptor.array_count - 1);
                self.offset_unchecked(mip, array).first_buffer as usize
            }
        }
    }

    /// Buffer index of `(mip, depth_or_array)`.
    ///
    /// # Errors
    ///
    /// [`ImagingError::OutOfRange`] naming the offending axis.
    pub fn try_index_of(&self, mip: u32, depth_or_array: u32) -> Result<usize, ImagingError> {
        if mip >= self.descriptor.mip_count {
            return Err(ImagingError::OutOfRange {
                axis: IndexAxis::Mip,
                index: mip,
                count: self.descriptor.mip_count,
            });
        }
        let (axis, count) = match self.descriptor.image_type {
            ImageType::Image3D => (IndexAxis::Depth, self.descriptor.depth_at(mip)),
            _ => (IndexAxis::Array, self.descriptor.array_count),
        };
        if depth_or_array >= count {
            return Err(ImagingError::OutOfRange {
                axis,
                index: depth_or_array,
                count,
            });
        }
        Ok(self.index_of(mip, depth_or_array))
    }

    /// Entry for `(mip, depth_or_array)`, clamped like
    /// [`index_of`](Self::index_of).
    #[inline]
    pub fn entry(&self, mip: u32, depth_or_array: u32) -> &BufferLayoutEntry {
        &self.entries[self.index_of(mip, depth_or_array)]
    }

    /// Entry for `(mip, depth_or_array)`, strictly checked.
    pub fn try_entry(&self, mip: u32, depth_or_array: u32) -> Result<&BufferLayoutEntry, ImagingError> {
        Ok(&self.entries[self.try_index_of(mip, depth_or_array)?])
    }

    fn offset_unchecked(&self, mip: u32, array: u32) -> MipOffset {
        let key = array as usize * self.descriptor.mip_count as usize + mip as usize;
        self.mip_index.offsets[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(w: u32, h: u32) -> ImageDescriptor {
        ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, w, h)
    }

    // --- Descriptor validation ---

    #[test]
    fn validate_rejects_bad_shapes() {
        assert!(rgba(0, 4).validate().is_err());
        assert!(rgba(4, 4).with_array_count(0).validate().is_err());
        assert!(rgba(4, 4).with_mip_count(0).validate().is_err());
        assert!(rgba(4, 4).with_mip_count(4).validate().is_err());
        assert!(rgba(4, 4).with_mip_count(3).validate().is_ok());
        assert!(
            ImageDescriptor::new_3d(PixelFormat::R8UNorm, 4, 4, 4)
                .with_array_count(2)
                .validate()
                .is_err()
        );
        assert!(
            ImageDescriptor::new_1d(PixelFormat::R8UNorm, 4)
                .with_array_count(3)
                .validate()
                .is_ok()
        );
    }

    // --- Mip arithmetic ---

    #[test]
    fn max_mip_count_values() {
        assert_eq!(max_mip_count(1, 1, 1), 1);
        assert_eq!(max_mip_count(4, 4, 1), 3);
        assert_eq!(max_mip_count(320, 200, 1), 9);
        assert_eq!(max_mip_count(1, 1, 16), 5);
        assert_eq!(max_mip_count(u32::MAX, 1, 1), 32);
    }

    #[test]
    fn mip_halving_terminates_within_log2_bound() {
        for &(w, h, d) in &[(1u32, 1u32, 1u32), (3, 5, 1), (320, 200, 1), (17, 1, 33), (1 << 20, 3, 1)] {
            let largest = w.max(h).max(d);
            let bound = (u32::BITS - (largest - 1).leading_zeros()) + 1;
            let count = max_mip_count(w, h, d);
            assert!(count <= bound, "{w}x{h}x{d}: {count} > {bound}");

            let desc = ImageDescriptor::new_3d(PixelFormat::R8UNorm, w, h, d);
            let mut previous = (u32::MAX, u32::MAX, u32::MAX);
            for mip in 0..count {
                let extent = desc.mip_extent(mip);
                assert!(extent.0 <= previous.0 && extent.1 <= previous.1 && extent.2 <= previous.2);
                previous = extent;
            }
            assert_eq!(previous, (1, 1, 1));
        }
    }

    #[test]
    fn depth_slices_sum() {
        assert_eq!(depth_slice_count(8, 4), 8 + 4 + 2 + 1);
        assert_eq!(depth_slice_count(5, 3), 5 + 2 + 1);
        assert_eq!(depth_slice_count(1, 3), 3);
    }

    #[test]
    fn mip_dimension_large_shift() {
        assert_eq!(mip_dimension(1024, 40), 1);
        assert_eq!(mip_dimension(1024, 3), 128);
    }

    // --- compute_layout ---

    #[test]
    fn four_by_four_three_mips() {
        let layout = compute_layout(&rgba(4, 4).with_mip_count(3)).unwrap();
        assert_eq!(layout.len(), 3);
        let sizes: Vec<_> = layout.entries().iter().map(|e| (e.width, e.height)).collect();
        assert_eq!(sizes, [(4, 4), (2, 2), (1, 1)]);
        let offsets: Vec<_> = layout.entries().iter().map(|e| e.byte_offset).collect();
        assert_eq!(offsets, [0, 64, 80]);
        assert_eq!(layout.total_size(), 84);
        assert_eq!(
            layout.mip_index().get(2, 0),
            Some(MipOffset {
                first_buffer: 2,
                depth: 1
            })
        );
        assert_eq!(layout.index_of(2, 0), 2);
    }

    #[test]
    fn buffer_count_matches_formula() {
        let cases = [
            rgba(16, 8).with_mip_count(5).with_array_count(3),
            ImageDescriptor::new_3d(PixelFormat::R16Float, 8, 8, 8).with_full_mip_chain(),
            ImageDescriptor::new_3d(PixelFormat::R8UNorm, 4, 2, 7).with_mip_count(3),
            ImageDescriptor::new_1d(PixelFormat::A8UNorm, 64)
                .with_array_count(4)
                .with_full_mip_chain(),
            ImageDescriptor::new_2d(PixelFormat::Bc1UNorm, 64, 64).with_full_mip_chain(),
        ];
        for desc in cases {
            let layout = compute_layout(&desc).unwrap();
            let per_array: u32 = (0..desc.mip_count()).map(|m| desc.depth_at(m)).sum();
            assert_eq!(layout.len() as u32, per_array * desc.array_count(), "{desc:?}");
            assert_eq!(layout.total_size() as u64, size_in_bytes(&desc));
        }
    }

    #[test]
    fn offsets_strictly_increase_without_overlap() {
        let desc = rgba(7, 5).with_full_mip_chain().with_array_count(2);
        let layout = compute_layout(&desc).unwrap();
        for pair in layout.entries().windows(2) {
            assert!(pair[0].byte_offset < pair[1].byte_offset);
            assert_eq!(pair[0].byte_range().end, pair[1].byte_offset);
        }
        for (i, entry) in layout.entries().iter().enumerate() {
            assert_eq!(entry.buffer_index as usize, i);
        }
    }

    #[test]
    fn array_major_ordering() {
        let desc = rgba(4, 4).with_mip_count(2).with_array_count(2);
        let layout = compute_layout(&desc).unwrap();
        let order: Vec<_> = layout
            .entries()
            .iter()
            .map(|e| (e.array_or_depth_index, e.mip_level))
            .collect();
        assert_eq!(order, [(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn volume_ordering_and_depth() {
        let desc = ImageDescriptor::new_3d(PixelFormat::R8G8B8A8UNorm, 4, 4, 4).with_mip_count(3);
        let layout = compute_layout(&desc).unwrap();
        let order: Vec<_> = layout
            .entries()
            .iter()
            .map(|e| (e.mip_level, e.array_or_depth_index, e.depth))
            .collect();
        assert_eq!(
            order,
            [
                (0, 0, 4),
                (0, 1, 4),
                (0, 2, 4),
                (0, 3, 4),
                (1, 0, 2),
                (1, 1, 2),
                (2, 0, 1)
            ]
        );
        assert_eq!(layout.index_of(1, 1), 5);
    }

    #[test]
    fn compressed_layout_pitches_by_block() {
        let desc = ImageDescriptor::new_2d(PixelFormat::Bc1UNorm, 320, 200);
        let layout = compute_layout(&desc).unwrap();
        let entry = layout.entries()[0];
        assert_eq!(entry.row_pitch, 640);
        assert_eq!(entry.slice_pitch, 32_000);
    }

    #[test]
    fn legacy_pitch_layout() {
        let desc = ImageDescriptor::new_2d(PixelFormat::R8UNorm, 3, 2);
        let layout = compute_layout_with_pitch(
            &desc,
            PitchOptions::new().with_alignment(crate::format::RowAlignment::LegacyDword),
        )
        .unwrap();
        assert_eq!(layout.entries()[0].row_pitch, 4);
        assert_eq!(layout.total_size(), 8);
    }

    // --- Lookup ---

    #[test]
    fn index_of_round_trips() {
        let descs = [
            rgba(16, 16).with_full_mip_chain().with_array_count(3),
            ImageDescriptor::new_3d(PixelFormat::R8UNorm, 8, 8, 6).with_full_mip_chain(),
        ];
        for desc in descs {
            let layout = compute_layout(&desc).unwrap();
            for mip in 0..desc.mip_count() {
                let count = match desc.image_type() {
                    ImageType::Image3D => desc.depth_at(mip),
                    _ => desc.array_count(),
                };
                for idx in 0..count {
                    let entry = &layout.entries()[layout.index_of(mip, idx)];
                    assert_eq!((entry.mip_level, entry.array_or_depth_index), (mip, idx));
                    assert_eq!(layout.try_index_of(mip, idx).unwrap(), layout.index_of(mip, idx));
                }
            }
        }
    }

    #[test]
    fn clamped_lookup() {
        let layout = compute_layout(&rgba(4, 4).with_mip_count(3).with_array_count(2)).unwrap();
        assert_eq!(layout.index_of(9, 0), layout.index_of(2, 0));
        assert_eq!(layout.index_of(0, 9), layout.index_of(0, 1));

        let volume =
            compute_layout(&ImageDescriptor::new_3d(PixelFormat::R8UNorm, 4, 4, 4).with_mip_count(2))
                .unwrap();
        // Mip 1 has two depth slices; slice 3 clamps to 1.
        assert_eq!(volume.index_of(1, 3), volume.index_of(1, 1));
    }

    #[test]
    fn strict_lookup_reports_axis() {
        let layout = compute_layout(&rgba(4, 4).with_mip_count(3)).unwrap();
        assert!(matches!(
            layout.try_index_of(3, 0),
            Err(ImagingError::OutOfRange {
                axis: IndexAxis::Mip,
                index: 3,
                count: 3
            })
        ));
        assert!(matches!(
            layout.try_index_of(0, 1),
            Err(ImagingError::OutOfRange {
                axis: IndexAxis::Array,
                ..
            })
        ));

        let volume =
            compute_layout(&ImageDescriptor::new_3d(PixelFormat::R8UNorm, 4, 4, 4).with_mip_count(2))
                .unwrap();
        assert!(matches!(
            volume.try_index_of(1, 2),
            Err(ImagingError::OutOfRange {
                axis: IndexAxis::Depth,
                index: 2,
                count: 2
            })
        ));
    }
}
