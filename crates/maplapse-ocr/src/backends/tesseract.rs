use std::path::PathBuf;
use std::process::Command;

use image::{GrayImage, ImageFormat};
use tracing::{debug, warn};

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::request::OcrRequest;
use crate::response::{OcrResponse, OcrText};

/// OCR engine that shells out to a locally installed `tesseract` binary.
///
/// The binary is probed once at construction; when it is missing the engine
/// still constructs but every `recognize` call fails with a backend error,
/// which the clock tracker treats as a recoverable recognition failure.
pub struct TesseractOcrEngine {
    available: bool,
    work_dir: PathBuf,
}

impl TesseractOcrEngine {
    pub fn new() -> Self {
        let available = probe_tesseract();
        if available {
            debug!("tesseract binary found");
        } else {
            warn!("tesseract binary not found; clock recognition disabled");
        }

        let work_dir = std::env::temp_dir().join(format!("maplapse-ocr-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&work_dir);

        Self {
            available,
            work_dir,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    fn run_tesseract(&self, image: &GrayImage) -> Result<String, OcrError> {
        let input = self.work_dir.join("frame.png");
        image
            .save_with_format(&input, ImageFormat::Png)
            .map_err(|err| OcrError::backend(format!("failed to write OCR input: {err}")))?;

        let output = Command::new("tesseract")
            .arg(&input)
            .arg("stdout")
            .arg("--psm")
            .arg("6")
            .output()
            .map_err(|err| OcrError::backend(format!("failed to launch tesseract: {err}")))?;

        if !output.status.success() {
            return Err(OcrError::backend(format!(
                "tesseract exited with status {}",
                output.status
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| OcrError::backend(format!("tesseract output was not UTF-8: {err}")))
    }
}

impl Default for TesseractOcrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcrEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        if self.available {
            Ok(())
        } else {
            Err(OcrError::backend("tesseract binary not found on PATH"))
        }
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        if !self.available {
            return Err(OcrError::backend("tesseract binary not found on PATH"));
        }

        let plane = request.plane();
        let image = gray_image_from_plane(
            plane.width(),
            plane.height(),
            plane.stride(),
            plane.data(),
        );
        let stdout = self.run_tesseract(&image)?;
        Ok(tokens_from_stdout(&stdout))
    }
}

fn probe_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn gray_image_from_plane(width: u32, height: u32, stride: usize, data: &[u8]) -> GrayImage {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height as usize {
        let offset = row * stride;
        pixels.extend_from_slice(&data[offset..offset + width as usize]);
    }
    GrayImage::from_raw(width, height, pixels)
        .expect("pixel buffer length matches width * height")
}

fn tokens_from_stdout(stdout: &str) -> OcrResponse {
    let texts = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| OcrText::new(line.to_owned()))
        .collect();
    OcrResponse::new(texts)
}
