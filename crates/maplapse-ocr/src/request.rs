use crate::plane::LumaPlane;

/// OCR invocation payload: the full luminance plane of one frame.
///
/// Engines return tokens for whatever text they find; callers match tokens
/// by content, never by position.
#[derive(Debug)]
pub struct OcrRequest<'a> {
    plane: LumaPlane<'a>,
}

impl<'a> OcrRequest<'a> {
    pub fn new(plane: LumaPlane<'a>) -> Self {
        Self { plane }
    }

    pub fn plane(&self) -> &LumaPlane<'a> {
        &self.plane
    }
}
