mod backends;
mod engine;
mod error;
mod plane;
mod request;
mod response;

pub use backends::tesseract::TesseractOcrEngine;
pub use engine::{NoopOcrEngine, OcrEngine};
pub use error::OcrError;
pub use plane::LumaPlane;
pub use request::OcrRequest;
pub use response::{OcrResponse, OcrText};
