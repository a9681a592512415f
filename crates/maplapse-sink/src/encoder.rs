use image::RgbImage;
use maplapse_types::VideoFrame;

use crate::sink::SinkError;

/// Destination for accepted frames. Implementations receive frames strictly
/// in cycle order and must not reorder them.
pub trait FrameEncoder: Send + 'static {
    fn append(&mut self, frame: &VideoFrame) -> Result<(), SinkError>;
    fn finish(&mut self) -> Result<(), SinkError>;
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Convert an NV12 frame to packed RGB (BT.601 full range).
pub fn nv12_to_rgb(frame: &VideoFrame) -> RgbImage {
    let width = frame.width();
    let height = frame.height();
    let luma = frame.luma();
    let chroma = frame.chroma();
    let luma_stride = frame.luma_stride();
    let chroma_stride = frame.chroma_stride();

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height as usize {
        let luma_row = y * luma_stride;
        let chroma_row = (y / 2) * chroma_stride;
        for x in 0..width as usize {
            let yy = luma[luma_row + x] as i32;
            let uv = chroma_row + (x / 2) * 2;
            let u = chroma[uv] as i32 - 128;
            let v = chroma[uv + 1] as i32 - 128;

            let r = yy + ((91_881 * v) >> 16);
            let g = yy - ((22_554 * u + 46_802 * v) >> 16);
            let b = yy + ((116_130 * u) >> 16);
            rgb.push(clamp_u8(r));
            rgb.push(clamp_u8(g));
            rgb.push(clamp_u8(b));
        }
    }
    RgbImage::from_raw(width, height, rgb).expect("pixel buffer length matches dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_produces_gray() {
        let frame = VideoFrame::from_nv12_owned(
            2,
            2,
            2,
            2,
            None,
            vec![100, 100, 100, 100],
            vec![128, 128],
        )
        .unwrap();
        let rgb = nv12_to_rgb(&frame);
        let pixel = rgb.get_pixel(0, 0);
        assert_eq!(pixel.0, [100, 100, 100]);
    }

    #[test]
    fn white_luma_saturates_to_white() {
        let frame =
            VideoFrame::from_nv12_owned(2, 2, 2, 2, None, vec![255; 4], vec![128, 128]).unwrap();
        let rgb = nv12_to_rgb(&frame);
        assert_eq!(rgb.get_pixel(1, 1).0, [255, 255, 255]);
    }
}
