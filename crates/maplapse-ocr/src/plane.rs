use std::fmt;
use std::ops::Deref;

use maplapse_types::VideoFrame;

use crate::error::OcrError;

/// Immutable view over a luminance plane.
#[derive(Clone)]
pub struct LumaPlane<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> LumaPlane<'a> {
    pub fn from_parts(
        width: u32,
        height: u32,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, OcrError> {
        let required = stride
            .checked_mul(height as usize)
            .ok_or(OcrError::PlaneOverflow { stride, height })?;
        if data.len() < required {
            return Err(OcrError::InsufficientPlaneData {
                provided: data.len(),
                required,
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data: &data[..required],
        })
    }

    pub fn from_frame(frame: &'a VideoFrame) -> Self {
        // VideoFrame guarantees the buffer is at least stride * height bytes.
        Self {
            width: frame.width(),
            height: frame.height(),
            stride: frame.luma_stride(),
            data: frame.luma(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl fmt::Debug for LumaPlane<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LumaPlane")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Deref for LumaPlane<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_plane_is_rejected() {
        let data = vec![0u8; 7];
        let result = LumaPlane::from_parts(4, 2, 4, &data);
        assert!(matches!(
            result,
            Err(OcrError::InsufficientPlaneData {
                provided: 7,
                required: 8
            })
        ));
    }

    #[test]
    fn plane_trims_to_required_length() {
        let data = vec![0u8; 16];
        let plane = LumaPlane::from_parts(4, 2, 4, &data).unwrap();
        assert_eq!(plane.data().len(), 8);
    }
}
