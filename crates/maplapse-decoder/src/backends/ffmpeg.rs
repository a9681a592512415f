#![cfg(feature = "backend-ffmpeg")]

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg::util::error::{EAGAIN, EWOULDBLOCK};
use ffmpeg_next as ffmpeg;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{
    DynFrameSource, FrameError, FrameResult, FrameSource, FrameStream, SourceMetadata,
    VideoFrame, spawn_stream_from_channel,
};

const BACKEND_NAME: &str = "ffmpeg";

pub struct FfmpegSource {
    input: PathBuf,
    sample_step: Duration,
    channel_capacity: usize,
    metadata: SourceMetadata,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P, sample_step: Duration) -> FrameResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file {} does not exist", path.display()),
            )));
        }
        ffmpeg::init()
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        let metadata = probe_metadata(path)?;
        Ok(Self {
            input: path.to_path_buf(),
            sample_step,
            channel_capacity: 8,
            metadata,
        })
    }

    fn decode_loop(&self, tx: mpsc::Sender<FrameResult<VideoFrame>>) -> FrameResult<()> {
        let mut ictx = ffmpeg::format::input(&self.input)
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        let input_stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| FrameError::backend_failure(BACKEND_NAME, "no video stream found"))?;
        let stream_index = input_stream.index();

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
        let mut decoder = context
            .decoder()
            .video()
            .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        let mut scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::pixel::Pixel::NV12,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::FAST_BILINEAR,
        )
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;

        let duration = ictx.duration();
        let step_ms = self.sample_step.as_millis().max(1) as i64;
        let mut decoded = ffmpeg::util::frame::Video::empty();
        let mut converted = ffmpeg::util::frame::Video::empty();
        let mut cycle: u64 = 0;
        // Seek targets start one step in and advance one step per decoded
        // frame; the loop ends when a target falls past the container
        // duration or the demuxer stops producing frames.
        let mut offset_ms: i64 = step_ms;

        loop {
            let target = offset_ms * i64::from(ffmpeg::ffi::AV_TIME_BASE) / 1000;
            if duration > 0 && target > duration {
                let _ = tx.blocking_send(Err(FrameError::EndOfStream));
                return Ok(());
            }
            if ictx.seek(target, ..target).is_err() {
                debug!(offset_ms, "seek past end of container");
                let _ = tx.blocking_send(Err(FrameError::EndOfStream));
                return Ok(());
            }
            decoder.flush();

            let mut produced = false;
            for (stream, packet) in ictx.packets() {
                if stream.index() != stream_index {
                    continue;
                }
                if let Err(err) = decoder.send_packet(&packet) {
                    if !is_retryable_error(&err) {
                        return Err(FrameError::backend_failure(BACKEND_NAME, err.to_string()));
                    }
                }
                match decoder.receive_frame(&mut decoded) {
                    Ok(()) => {
                        produced = true;
                        break;
                    }
                    Err(err) => {
                        if is_retryable_error(&err) || matches!(err, ffmpeg::Error::Eof) {
                            continue;
                        }
                        return Err(FrameError::backend_failure(BACKEND_NAME, err.to_string()));
                    }
                }
            }

            if !produced {
                let _ = tx.blocking_send(Err(FrameError::EndOfStream));
                return Ok(());
            }

            scaler
                .run(&decoded, &mut converted)
                .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
            let frame = frame_from_converted(&converted, offset_ms)?
                .with_frame_index(Some(cycle));
            if tx.blocking_send(Ok(frame)).is_err() {
                return Ok(());
            }

            cycle += 1;
            offset_ms += step_ms;
        }
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> SourceMetadata {
        self.metadata
    }

    fn into_stream(self: Box<Self>) -> FrameStream {
        let source = *self;
        let capacity = source.channel_capacity;
        spawn_stream_from_channel(capacity, move |tx| {
            let result = source.decode_loop(tx.clone());
            if let Err(err) = result {
                let _ = tx.blocking_send(Err(err));
            }
        })
    }
}

fn probe_metadata(path: &Path) -> FrameResult<SourceMetadata> {
    let ictx = ffmpeg::format::input(&path)
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| FrameError::backend_failure(BACKEND_NAME, "no video stream found"))?;
    let rate = stream.avg_frame_rate();
    let fps = if rate.denominator() != 0 {
        Some(f64::from(rate))
    } else {
        None
    };
    let duration = if ictx.duration() > 0 {
        Some(Duration::from_micros(ictx.duration() as u64))
    } else {
        None
    };
    let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
    let video = context
        .decoder()
        .video()
        .map_err(|err| FrameError::backend_failure(BACKEND_NAME, err.to_string()))?;
    Ok(SourceMetadata {
        duration,
        fps,
        width: Some(video.width()),
        height: Some(video.height()),
    })
}

fn frame_from_converted(
    frame: &ffmpeg::util::frame::Video,
    offset_ms: i64,
) -> FrameResult<VideoFrame> {
    let width = frame.width();
    let height = frame.height();
    let luma_stride = frame.stride(0);
    let chroma_stride = frame.stride(1);

    let luma_plane = frame.data(0);
    let mut luma = Vec::with_capacity(luma_stride * height as usize);
    for row in 0..height as usize {
        let offset = row * luma_stride;
        luma.extend_from_slice(&luma_plane[offset..offset + luma_stride]);
    }

    let chroma_rows = (height as usize).div_ceil(2);
    let chroma_plane = frame.data(1);
    let mut chroma = Vec::with_capacity(chroma_stride * chroma_rows);
    for row in 0..chroma_rows {
        let offset = row * chroma_stride;
        chroma.extend_from_slice(&chroma_plane[offset..offset + chroma_stride]);
    }

    let timestamp = Some(Duration::from_millis(offset_ms.max(0) as u64));
    VideoFrame::from_nv12_owned(
        width,
        height,
        luma_stride,
        chroma_stride,
        timestamp,
        luma,
        chroma,
    )
}

fn is_retryable_error(error: &ffmpeg::Error) -> bool {
    matches!(
        error,
        ffmpeg::Error::Other { errno }
            if *errno == EAGAIN || *errno == EWOULDBLOCK
    )
}

pub fn boxed_ffmpeg<P: AsRef<Path>>(
    path: P,
    sample_step: Duration,
    channel_capacity: Option<usize>,
) -> FrameResult<DynFrameSource> {
    let mut source = FfmpegSource::open(path, sample_step)?;
    if let Some(capacity) = channel_capacity {
        source.channel_capacity = capacity.max(1);
    }
    Ok(Box::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_error() {
        let result = FfmpegSource::open("/tmp/nonexistent-file.mp4", Duration::from_millis(500));
        assert!(result.is_err());
    }
}
