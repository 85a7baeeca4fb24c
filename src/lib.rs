//! Buffer layout and pixel transcoding for zen* image pipelines.
//!
//! This crate describes where every mip level, array slice and depth slice
//! of an image lives in one contiguous arena, and moves pixels between
//! formats one scanline at a time:
//!
//! - [`PixelFormat`] / [`PixelFormatInfo`]: the format catalog (bit depth,
//!   alpha encoding, sRGB, block compression, pitch)
//! - [`ImageDescriptor`] / [`ImageLayout`] / [`compute_layout`]: mip chains,
//!   arrays and volumes laid out in a single arena
//! - [`Image`] / [`PlaneRef`] / [`PlaneMut`]: the arena and views into
//!   individual buffers
//! - [`scanline`]: widen, narrow, swizzle, alpha detection and alpha
//!   replacement for single rows
//! - [`color`]: sRGB transfer and premultiplied alpha for single rows
//! - [`NativeFormat`] / [`best_supported_format`] / [`conversion_path`]:
//!   negotiation with a codec backend's own pixel formats
//! - [`Transcoder`]: whole-image decode, encode, convert, mip generation,
//!   resize, crop and expand on top of a [`CodecBackend`]
//! - [`ResourceLimits`]: allocation limits checked before any buffer is
//!   created
//!
//! Codec backends (container decoding, resampling filters, dithered
//! conversions) live outside this crate and plug in through
//! [`CodecBackend`].

#![forbid(unsafe_code)]

extern crate alloc;

mod backend;
mod buffer;
pub mod color;
mod error;
mod format;
mod layout;
mod limits;
mod native;
mod negotiate;
mod pipeline;
pub mod scanline;

pub use backend::{
    BackendCapabilities, CodecBackend, ContainerFormat, DecodedFrame, Dithering, EncodeOptions,
    FrameMut, FrameRef, ImageFilter, Rect,
};
pub use buffer::{Image, PlaneMut, PlaneRef};
pub use color::TransferDirection;
pub use error::{ImagingError, IndexAxis};
pub use format::{AlphaEncoding, PitchLayout, PitchOptions, PixelFormat, PixelFormatInfo, RowAlignment};
pub use layout::{
    BufferLayoutEntry, ImageDescriptor, ImageLayout, ImageType, MipOffset, MipOffsetIndex,
    compute_layout, compute_layout_with_pitch, depth_slice_count, max_mip_count, mip_dimension,
    size_in_bytes,
};
pub use limits::{LimitExceeded, ResourceLimits};
pub use native::NativeFormat;
pub use negotiate::{
    BackendLeg, ConversionPath, NegotiatedFormat, NegotiationFlags, best_supported_format,
    can_convert_formats, conversion_path,
};
pub use pipeline::{ConversionRequest, ExpandAnchor, Transcoder};
pub use scanline::{LineIo, ScanlineFlags};

// Re-exports for backend implementors and callers.
pub use enough::{Stop, StopReason, Unstoppable};
