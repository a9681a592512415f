use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;

use crate::config::OutputFormat;
use crate::encoder::{FrameEncoder, nv12_to_rgb};
use crate::sink::SinkError;
use maplapse_types::VideoFrame;

/// Writes accepted frames as a numbered image sequence plus a JSON manifest
/// carrying the nominal playback cadence. Always available; the MP4 encoder
/// is an optional feature.
pub struct ImageSequenceEncoder {
    dir: PathBuf,
    format: OutputFormat,
    fps: u32,
    frames: u64,
    dimensions: Option<(u32, u32)>,
}

#[derive(Serialize)]
struct Manifest {
    fps: u32,
    frames: u64,
    width: Option<u32>,
    height: Option<u32>,
}

impl ImageSequenceEncoder {
    pub fn create(dir: PathBuf, format: OutputFormat, fps: u32) -> Result<Self, SinkError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            format,
            fps,
            frames: 0,
            dimensions: None,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn frame_path(&self) -> PathBuf {
        self.dir
            .join(format!("frame_{:06}.{}", self.frames, self.format.extension()))
    }
}

impl FrameEncoder for ImageSequenceEncoder {
    fn append(&mut self, frame: &VideoFrame) -> Result<(), SinkError> {
        let rgb = nv12_to_rgb(frame);
        let path = self.frame_path();
        match self.format {
            OutputFormat::Png => rgb
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|err| SinkError::encode(err.to_string()))?,
            OutputFormat::Jpeg { quality } => {
                let file = File::create(&path)?;
                let mut writer = BufWriter::new(file);
                let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
                    .map_err(|err| SinkError::encode(err.to_string()))?;
            }
        }
        self.dimensions.get_or_insert((frame.width(), frame.height()));
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let manifest = Manifest {
            fps: self.fps,
            frames: self.frames,
            width: self.dimensions.map(|(w, _)| w),
            height: self.dimensions.map(|(_, h)| h),
        };
        let file = File::create(self.dir.join("manifest.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &manifest)
            .map_err(|err| SinkError::encode(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(width: u32, height: u32) -> VideoFrame {
        let luma = vec![90u8; (width * height) as usize];
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
    fn frames_are_numbered_in_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder =
            ImageSequenceEncoder::create(dir.path().to_path_buf(), OutputFormat::Png, 4).unwrap();
        encoder.append(&test_frame(16, 16)).unwrap();
        encoder.append(&test_frame(16, 16)).unwrap();
        encoder.finish().unwrap();

        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000001.png").exists());
        let manifest = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
        assert!(manifest.contains("\"frames\": 2"));
        assert!(manifest.contains("\"fps\": 4"));
    }
}
