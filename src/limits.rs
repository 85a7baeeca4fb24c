//! Resource limits for image allocation.
//!
//! [`ResourceLimits`] caps what a pipeline will allocate. [`LimitExceeded`]
//! is returned when a check fails. The pipeline calls
//! [`check_descriptor()`](ResourceLimits::check_descriptor) before it
//! allocates any destination arena, so an oversized request is rejected
//! before pixel work begins.

use crate::layout::{ImageDescriptor, size_in_bytes};

/// Resource limits for layout and transcode operations.
///
/// All fields are optional; `None` means no limit for that resource.
///
/// # Example
///
/// ```
/// use zenlayout::ResourceLimits;
///
/// let limits = ResourceLimits::none()
///     .with_max_pixels(100_000_000)
///     .with_max_memory(512 * 1024 * 1024);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResourceLimits {
    /// Maximum pixels in the top mip level (width × height × depth).
    pub max_pixels: Option<u64>,
    /// Maximum arena size in bytes.
    pub max_memory_bytes: Option<u64>,
    /// Maximum image width in pixels.
    pub max_width: Option<u32>,
    /// Maximum image height in pixels.
    pub max_height: Option<u32>,
    /// Maximum depth of a 3D image.
    pub max_depth: Option<u32>,
    /// Maximum number of array slices.
    pub max_array_count: Option<u32>,
    /// Maximum encoded input size in bytes (decode only).
    pub max_file_size: Option<u64>,
}

impl ResourceLimits {
    /// No limits (all fields `None`).
    pub fn none() -> Self {
        Self::default()
    }

    /// Set maximum top-level pixel count.
    pub fn with_max_pixels(mut self, max: u64) -> Self {
        self.max_pixels = Some(max);
        self
    }

    /// Set maximum arena size in bytes.
    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Set maximum image width in pixels.
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Set maximum image height in pixels.
    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    /// Set maximum 3D depth.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set maximum array slice count.
    pub fn with_max_array_count(mut self, count: u32) -> Self {
        self.max_array_count = Some(count);
        self
    }

    /// Set maximum encoded input size in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Whether any limits are set.
    pub fn has_any(&self) -> bool {
        self.max_pixels.is_some()
            || self.max_memory_bytes.is_some()
            || self.max_width.is_some()
            || self.max_height.is_some()
            || self.max_depth.is_some()
            || self.max_array_count.is_some()
            || self.max_file_size.is_some()
    }

    // --- Validation methods ---

    /// Check width, height and depth against the dimension limits and
    /// `max_pixels`.
    pub fn check_dimensions(&self, width: u32, height: u32, depth: u32) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_width
            && width > max
        {
            return Err(LimitExceeded::Width { actual: width, max });
        }
        if let Some(max) = self.max_height
            && height > max
        {
            return Err(LimitExceeded::Height {
                actual: height,
                max,
            });
        }
        if let Some(max) = self.max_depth
            && depth > max
        {
            return Err(LimitExceeded::Depth { actual: depth, max });
        }
        if let Some(max) = self.max_pixels {
            let pixels = width as u64 * height as u64 * depth as u64;
            if pixels > max {
                return Err(LimitExceeded::Pixels {
                    actual: pixels,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Check an array slice count against `max_array_count`.
    pub fn check_array_count(&self, count: u32) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_array_count
            && count > max
        {
            return Err(LimitExceeded::ArrayCount { actual: count, max });
        }
        Ok(())
    }

    /// Check an allocation size against `max_memory_bytes`.
    pub fn check_memory(&self, bytes: u64) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_memory_bytes
            && bytes > max
        {
            return Err(LimitExceeded::Memory { actual: bytes, max });
        }
        Ok(())
    }

    /// Check encoded input size against `max_file_size`.
    pub fn check_file_size(&self, bytes: u64) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_file_size
            && bytes > max
        {
            return Err(LimitExceeded::FileSize { actual: bytes, max });
        }
        Ok(())
    }

    /// Check everything an [`ImageDescriptor`] would allocate: dimensions,
    /// array count and the full arena size across all mips and slices.
    pub fn check_descriptor(&self, descriptor: &ImageDescriptor) -> Result<(), LimitExceeded> {
        self.check_dimensions(descriptor.width(), descriptor.height(), descriptor.depth())?;
        self.check_array_count(descriptor.array_count())?;
        if self.max_memory_bytes.is_some() {
            self.check_memory(size_in_bytes(descriptor))?;
        }
        Ok(())
    }
}

/// A resource limit was exceeded.
///
/// Each variant carries the actual value and the limit that was exceeded.
/// Implements [`core::error::Error`]; [`ImagingError`](crate::ImagingError)
/// wraps it via `From`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LimitExceeded {
    /// Image width exceeded `max_width`.
    Width {
        /// Actual width.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Image height exceeded `max_height`.
    Height {
        /// Actual height.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Image depth exceeded `max_depth`.
    Depth {
        /// Actual depth.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Array slice count exceeded `max_array_count`.
    ArrayCount {
        /// Actual count.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Pixel count exceeded `max_pixels`.
    Pixels {
        /// Actual pixel count.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Arena size exceeded `max_memory_bytes`.
    Memory {
        /// Required bytes.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Input size exceeded `max_file_size`.
    FileSize {
        /// Actual size in bytes.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
}

impl core::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Width { actual, max } => write!(f, "width {actual} exceeds limit {max}"),
            Self::Height { actual, max } => write!(f, "height {actual} exceeds limit {max}"),
            Self::Depth { actual, max } => write!(f, "depth {actual} exceeds limit {max}"),
            Self::ArrayCount { actual, max } => {
                write!(f, "array count {actual} exceeds limit {max}")
            }
            Self::Pixels { actual, max } => {
                write!(f, "pixel count {actual} exceeds limit {max}")
            }
            Self::Memory { actual, max } => {
                write!(f, "memory {actual} bytes exceeds limit {max}")
            }
            Self::FileSize { actual, max } => {
                write!(f, "file size {actual} bytes exceeds limit {max}")
            }
        }
    }
}

impl core::error::Error for LimitExceeded {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;

    #[test]
    fn default_has_no_limits() {
        let limits = ResourceLimits::none();
        assert!(!limits.has_any());
    }

    #[test]
    fn builder_sets_limits() {
        let limits = ResourceLimits::none()
            .with_max_pixels(1_000_000)
            .with_max_memory(512 * 1024 * 1024);
        assert!(limits.has_any());
        assert_eq!(limits.max_pixels, Some(1_000_000));
        assert_eq!(limits.max_memory_bytes, Some(512 * 1024 * 1024));
        assert!(limits.max_depth.is_none());
    }

    // --- Validation tests ---

    #[test]
    fn check_dimensions_pass() {
        let limits = ResourceLimits::none()
            .with_max_width(1920)
            .with_max_height(1080)
            .with_max_pixels(2_073_600);
        assert!(limits.check_dimensions(1920, 1080, 1).is_ok());
        assert!(limits.check_dimensions(100, 100, 1).is_ok());
    }

    #[test]
    fn check_dimensions_width_exceeded() {
        let limits = ResourceLimits::none().with_max_width(1920);
        let err = limits.check_dimensions(1921, 1080, 1).unwrap_err();
        assert_eq!(
            err,
            LimitExceeded::Width {
                actual: 1921,
                max: 1920
            }
        );
    }

    #[test]
    fn check_dimensions_counts_depth_in_pixels() {
        let limits = ResourceLimits::none().with_max_pixels(1_000);
        assert!(limits.check_dimensions(10, 10, 10).is_ok());
        let err = limits.check_dimensions(10, 10, 11).unwrap_err();
        assert_eq!(
            err,
            LimitExceeded::Pixels {
                actual: 1_100,
                max: 1_000
            }
        );
    }

    #[test]
    fn check_depth_and_array() {
        let limits = ResourceLimits::none()
            .with_max_depth(8)
            .with_max_array_count(6);
        assert!(matches!(
            limits.check_dimensions(4, 4, 9),
            Err(LimitExceeded::Depth { actual: 9, max: 8 })
        ));
        assert!(limits.check_array_count(6).is_ok());
        assert!(matches!(
            limits.check_array_count(7),
            Err(LimitExceeded::ArrayCount { actual: 7, max: 6 })
        ));
    }

    #[test]
    fn check_memory_pass_and_fail() {
        let limits = ResourceLimits::none().with_max_memory(512 * 1024 * 1024);
        assert!(limits.check_memory(256 * 1024 * 1024).is_ok());
        let err = limits.check_memory(1024 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, LimitExceeded::Memory { .. }));
    }

    #[test]
    fn check_file_size_pass_and_fail() {
        let limits = ResourceLimits::none().with_max_file_size(10 * 1024 * 1024);
        assert!(limits.check_file_size(5 * 1024 * 1024).is_ok());
        let err = limits.check_file_size(20 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, LimitExceeded::FileSize { .. }));
    }

    #[test]
    fn check_descriptor_counts_whole_mip_chain() {
        // 4x4 RGBA8 with 3 mips: 64 + 16 + 4 bytes.
        let desc = ImageDescriptor::new_2d(PixelFormat::R8G8B8A8UNorm, 4, 4).with_mip_count(3);
        assert!(ResourceLimits::none().with_max_memory(84).check_descriptor(&desc).is_ok());
        let err = ResourceLimits::none()
            .with_max_memory(83)
            .check_descriptor(&desc)
            .unwrap_err();
        assert_eq!(err, LimitExceeded::Memory { actual: 84, max: 83 });
    }

    #[test]
    fn limit_exceeded_display() {
        use alloc::format;
        let err = LimitExceeded::Width {
            actual: 5000,
            max: 4096,
        };
        assert_eq!(format!("{err}"), "width 5000 exceeds limit 4096");

        let err = LimitExceeded::ArrayCount { actual: 7, max: 6 };
        assert_eq!(format!("{err}"), "array count 7 exceeds limit 6");
    }

    #[test]
    fn limit_exceeded_is_error() {
        fn assert_error<E: core::error::Error>(_: &E) {}
        let err = LimitExceeded::Width {
            actual: 5000,
            max: 4096,
        };
        assert_error(&err);
    }
}
