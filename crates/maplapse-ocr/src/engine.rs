use crate::error::OcrError;
use crate::request::OcrRequest;
use crate::response::OcrResponse;

/// Common interface for all OCR engines.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn warm_up(&self) -> Result<(), OcrError> {
        Ok(())
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError>;
}

/// Placeholder OCR engine used when no real backend is available. Always
/// returns an empty token sequence, leaving the clock tracker unset.
#[derive(Debug, Default)]
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(OcrResponse::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::LumaPlane;

    #[test]
    fn noop_engine_returns_empty_response() {
        let data = vec![0u8; 8];
        let plane = LumaPlane::from_parts(4, 2, 4, &data).unwrap();
        let request = OcrRequest::new(plane);
        let response = NoopOcrEngine.recognize(&request).unwrap();
        assert!(response.texts.is_empty());
    }
}
