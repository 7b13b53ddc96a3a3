use ndarray::{ArrayView3, ShapeBuilder};
use thiserror::Error;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be positive, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("bytes per row ({bytes_per_row}) is smaller than width * 4 ({min})")]
    StrideTooSmall { bytes_per_row: usize, min: usize },
    #[error("frame data holds {actual} bytes, expected at least {expected}")]
    DataTooShort { actual: usize, expected: usize },
}

/// Pixel layout of a captured frame. Only single-plane 32-bit BGRA is produced
/// by the capture sources, little-endian with premultiplied alpha first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra32,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Bgra32 => 1,
        }
    }
}

/// One captured frame: BGRA rows of `bytes_per_row` bytes each.
///
/// Pixel memory is only reachable through [`Frame::lock`], which hands out a
/// scoped [`FrameLock`]. Rows are stored top-down, as a capture device
/// delivers them.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Option<Vec<u8>>,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    /// Wraps tightly or loosely packed BGRA bytes.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bytes_per_row: usize,
        index: usize,
    ) -> Result<Self, FrameError> {
        validate_geometry(width, height, bytes_per_row)?;
        let expected = bytes_per_row * height as usize;
        if data.len() < expected {
            return Err(FrameError::DataTooShort {
                actual: data.len(),
                expected,
            });
        }
        Ok(Self {
            data: Some(data),
            width,
            height,
            bytes_per_row,
            format: PixelFormat::Bgra32,
            index,
        })
    }

    /// A frame filled with a single BGRA colour, rows packed without padding.
    pub fn filled(width: u32, height: u32, bgra: [u8; 4], index: usize) -> Result<Self, FrameError> {
        let bytes_per_row = width as usize * BYTES_PER_PIXEL;
        let data = bgra
            .iter()
            .copied()
            .cycle()
            .take(bytes_per_row * height as usize)
            .collect();
        Self::new(data, width, height, bytes_per_row, index)
    }

    /// A frame whose pixel memory was never mapped into this process.
    ///
    /// Locking succeeds but no base address is available.
    pub fn without_storage(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        index: usize,
    ) -> Result<Self, FrameError> {
        validate_geometry(width, height, bytes_per_row)?;
        Ok(Self {
            data: None,
            width,
            height,
            bytes_per_row,
            format: PixelFormat::Bgra32,
            index,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Read-only copy of the raw bytes, `None` if the frame has no storage.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Locks the pixel memory for direct access until the guard is dropped.
    pub fn lock(&mut self) -> FrameLock<'_> {
        log::trace!("frame {} locked", self.index);
        FrameLock { frame: self }
    }

    /// BGRA pixel at column `x`, row `y` (top-down).
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let data = self.data.as_ref()?;
        let offset = y as usize * self.bytes_per_row + x as usize * BYTES_PER_PIXEL;
        let mut px = [0u8; 4];
        px.copy_from_slice(&data[offset..offset + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// `(height, width, 4)` view honouring the row stride.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        let data = self.data.as_ref()?;
        let shape = (self.height as usize, self.width as usize, BYTES_PER_PIXEL)
            .strides((self.bytes_per_row, BYTES_PER_PIXEL, 1));
        ArrayView3::from_shape(shape, data).ok()
    }
}

fn validate_geometry(width: u32, height: u32, bytes_per_row: usize) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::ZeroDimensions { width, height });
    }
    let min = width as usize * BYTES_PER_PIXEL;
    if bytes_per_row < min {
        return Err(FrameError::StrideTooSmall { bytes_per_row, min });
    }
    Ok(())
}

/// Scoped exclusive access to a frame's pixel memory. Unlocks on drop, so
/// every exit path releases the lock.
pub struct FrameLock<'a> {
    frame: &'a mut Frame,
}

impl FrameLock<'_> {
    /// Base address of `plane`, or `None` when the plane does not exist or
    /// the frame has no mapped memory.
    pub fn base_address_of_plane(&mut self, plane: usize) -> Option<&mut [u8]> {
        if plane >= self.frame.format.plane_count() {
            return None;
        }
        self.frame.data.as_deref_mut()
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.frame.bytes_per_row
    }
}

impl Drop for FrameLock<'_> {
    fn drop(&mut self) {
        log::trace!("frame {} unlocked", self.frame.index);
    }
}
