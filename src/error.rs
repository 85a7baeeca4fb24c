//! Crate error type.

use alloc::boxed::Box;
use core::fmt;

use enough::StopReason;

use crate::format::PixelFormat;
use crate::limits::LimitExceeded;
use crate::native::NativeFormat;

/// Index axis named by [`ImagingError::OutOfRange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexAxis {
    /// Mip level.
    Mip,
    /// Array slice (1D/2D images).
    Array,
    /// Depth slice (3D images).
    Depth,
}

impl fmt::Display for IndexAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mip => "mip level",
            Self::Array => "array index",
            Self::Depth => "depth slice",
        })
    }
}

/// Errors from layout, transcoding and pipeline operations.
///
/// Scanline routines only ever return [`BufferOverrun`](Self::BufferOverrun)
/// or [`InsufficientData`](Self::InsufficientData); everything else comes
/// from negotiation, layout validation or the pipeline.
#[derive(Debug)]
#[non_exhaustive]
pub enum ImagingError {
    /// The format has no catalog entry, native equivalent, or nearest fit.
    UnsupportedFormat(PixelFormat),
    /// A backend native format has no nearest fit.
    UnsupportedNativeFormat(NativeFormat),
    /// No scanline or backend path converts between the two formats.
    NoConversionPath {
        /// Source format.
        from: PixelFormat,
        /// Requested format.
        to: PixelFormat,
    },
    /// A strict index lookup was outside the descriptor's bounds.
    OutOfRange {
        /// Which index was out of range.
        axis: IndexAxis,
        /// The index requested.
        index: u32,
        /// Number of valid entries on that axis.
        count: u32,
    },
    /// A narrowing routine ran out of destination space and stopped.
    BufferOverrun {
        /// Pixels written before stopping.
        written: usize,
        /// Destination bytes the full line needs.
        required: usize,
        /// Destination bytes available.
        available: usize,
    },
    /// The image descriptor violates a structural rule.
    InvalidDescriptor(&'static str),
    /// Source data is shorter than the operation needs.
    InsufficientData {
        /// Bytes needed.
        required: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Two images or buffers that must share a format do not.
    FormatMismatch {
        /// Expected format.
        expected: PixelFormat,
        /// Format found.
        actual: PixelFormat,
    },
    /// The backend lacks a capability the operation needs.
    Unsupported(&'static str),
    /// A resource limit was exceeded.
    Limit(LimitExceeded),
    /// The operation was cancelled between buffers.
    Cancelled(StopReason),
    /// The codec backend failed.
    Backend(Box<dyn core::error::Error + Send + Sync>),
}

impl ImagingError {
    /// Wrap a backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

impl fmt::Display for ImagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(format) => write!(f, "unsupported pixel format {format}"),
            Self::UnsupportedNativeFormat(native) => {
                write!(f, "native format {native:?} has no supported equivalent")
            }
            Self::NoConversionPath { from, to } => {
                write!(f, "no conversion path from {from} to {to}")
            }
            Self::OutOfRange { axis, index, count } => {
                write!(f, "{axis} {index} out of range (count {count})")
            }
            Self::BufferOverrun {
                written,
                required,
                available,
            } => write!(
                f,
                "destination too small: {required} bytes required, {available} available \
                 ({written} pixels written)"
            ),
            Self::InvalidDescriptor(msg) => write!(f, "invalid image descriptor: {msg}"),
            Self::InsufficientData { required, actual } => {
                write!(f, "insufficient data: need {required} bytes, got {actual}")
            }
            Self::FormatMismatch { expected, actual } => {
                write!(f, "format mismatch: expected {expected}, got {actual}")
            }
            Self::Unsupported(what) => write!(f, "backend does not support {what}"),
            Self::Limit(err) => write!(f, "{err}"),
            Self::Cancelled(reason) => write!(f, "operation cancelled: {reason:?}"),
            Self::Backend(err) => write!(f, "codec backend error: {err}"),
        }
    }
}

impl core::error::Error for ImagingError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Limit(err) => Some(err),
            Self::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<LimitExceeded> for ImagingError {
    fn from(err: LimitExceeded) -> Self {
        Self::Limit(err)
    }
}

impl From<StopReason> for ImagingError {
    fn from(reason: StopReason) -> Self {
        Self::Cancelled(reason)
    }
}
