use maplapse_types::VideoFrame;

use crate::features::GrayPlane;

/// Fixed rectangular region where the overlay is expected to appear:
/// centered, sized to the template, padding split evenly per axis. Pixels
/// outside the rectangle are zeroed before matching so unrelated screen
/// content cannot contribute correspondences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayMask {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl OverlayMask {
    pub fn centered(frame_width: u32, frame_height: u32, template_width: u32, template_height: u32) -> Self {
        let width = template_width.min(frame_width) as usize;
        let height = template_height.min(frame_height) as usize;
        let x = (frame_width as usize - width) / 2;
        let y = (frame_height as usize - height) / 2;
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Copy of the frame's luma plane with everything outside the mask
    /// rectangle blacked out.
    pub fn apply(&self, frame: &VideoFrame) -> MaskedPlane {
        let stride = frame.luma_stride();
        let height = frame.height() as usize;
        let mut data = vec![0u8; stride * height];
        let luma = frame.luma();
        for row in self.y..(self.y + self.height).min(height) {
            let start = row * stride + self.x;
            let end = start + self.width;
            data[start..end].copy_from_slice(&luma[start..end]);
        }
        MaskedPlane {
            width: frame.width(),
            height: frame.height(),
            stride,
            data,
        }
    }
}

/// Owned masked luma plane derived from one frame; lives for one cycle.
#[derive(Debug, Clone)]
pub struct MaskedPlane {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl MaskedPlane {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn as_gray(&self) -> GrayPlane<'_> {
        GrayPlane::new(self.width, self.height, self.stride, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_luma(width: u32, height: u32, value: u8) -> VideoFrame {
        let luma = vec![value; (width * height) as usize];
        let chroma = vec![128u8; (width * height.div_ceil(2)) as usize];
        VideoFrame::from_nv12_owned(
            width,
            height,
            width as usize,
            width as usize,
            None,
            luma,
            chroma,
        )
        .unwrap()
    }

    #[test]
    fn mask_is_centered_with_split_padding() {
        let mask = OverlayMask::centered(320, 240, 96, 96);
        assert_eq!(mask.x(), 112);
        assert_eq!(mask.y(), 72);
        assert_eq!(mask.width(), 96);
        assert_eq!(mask.height(), 96);
    }

    #[test]
    fn oversized_template_clamps_to_the_frame() {
        let mask = OverlayMask::centered(100, 80, 200, 160);
        assert_eq!((mask.x(), mask.y()), (0, 0));
        assert_eq!((mask.width(), mask.height()), (100, 80));
    }

    #[test]
    fn apply_zeroes_pixels_outside_the_rectangle() {
        let frame = frame_with_luma(32, 32, 200);
        let mask = OverlayMask::centered(32, 32, 8, 8);
        let masked = mask.apply(&frame);
        let data = masked.data();

        assert_eq!(data[0], 0);
        assert_eq!(data[31 * 32 + 31], 0);
        let inside = mask.y() * 32 + mask.x();
        assert_eq!(data[inside], 200);
        assert_eq!(data[(mask.y() + 7) * 32 + mask.x() + 7], 200);
        assert_eq!(data[mask.y() * 32 + mask.x() - 1], 0);
    }
}
