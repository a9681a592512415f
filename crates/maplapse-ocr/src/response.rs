#[derive(Debug, Clone)]
pub struct OcrText {
    pub text: String,
    pub confidence: Option<f32>,
}

impl OcrText {
    pub fn new(text: String) -> Self {
        Self {
            text,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, value: f32) -> Self {
        self.confidence = Some(value);
        self
    }
}

/// Ordered token sequence produced by one OCR invocation.
#[derive(Debug, Clone)]
pub struct OcrResponse {
    pub texts: Vec<OcrText>,
}

impl OcrResponse {
    pub fn new(texts: Vec<OcrText>) -> Self {
        Self { texts }
    }

    pub fn empty() -> Self {
        Self { texts: Vec::new() }
    }

    /// Token strings in recognition order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(|item| item.text.as_str())
    }
}
