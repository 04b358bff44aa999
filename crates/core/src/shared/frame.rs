use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array2, ArrayView3};

#[cfg(test)]
use super::bounding_box::BoundingBox;

/// A single decoded video frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens in the video readers; detectors and
/// trackers only see this type.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
    revision: u64,
}

const CHANNELS: usize = 3;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(0);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
            revision: next_revision(),
        }
    }

    /// A frame filled with one RGB color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position of this frame in decode order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Process-wide identity of the pixel contents. Clones share it;
    /// drawing into the frame assigns a new one.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    /// Fills a rectangle with one color, clipped to the frame.
    #[cfg(test)]
    pub(crate) fn fill_rect(&mut self, rect: &BoundingBox, rgb: [u8; 3]) {
        let Some(clipped) = rect.clamp_to(self.width, self.height) else {
            return;
        };
        self.revision = next_revision();
        let stride = self.width as usize * CHANNELS;
        for row in clipped.y as usize..clipped.bottom() as usize {
            for col in clipped.x as usize..clipped.right() as usize {
                let offset = row * stride + col * CHANNELS;
                self.data[offset..offset + CHANNELS].copy_from_slice(&rgb);
            }
        }
    }

    /// `[height, width, channel]` view over the pixel buffer.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// ITU-R BT.601 luma plane as `[height, width]` floats in 0..=255.
    pub fn luma(&self) -> Array2<f32> {
        let rgb = self.as_ndarray();
        Array2::from_shape_fn((self.height as usize, self.width as usize), |(y, x)| {
            0.299 * rgb[[y, x, 0]] as f32
                + 0.587 * rgb[[y, x, 1]] as f32
                + 0.114 * rgb[[y, x, 2]] as f32
        })
    }
}
