use maplapse_types::{GameClock, VideoFrame};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::encoder::FrameEncoder;
use crate::stamp::{self, StampStyle};

#[derive(Debug, Clone, Copy)]
pub struct FrameMetadata {
    pub cycle: u64,
    pub clock: Option<GameClock>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("frame sink worker stopped")]
    Stopped,
    #[error("encode error: {message}")]
    Encode { message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSummary {
    pub frames_written: u64,
}

struct Job {
    frame: VideoFrame,
    metadata: FrameMetadata,
}

/// Ordered frame sink: one bounded channel feeding one blocking worker, so
/// frames reach the encoder exactly in submission (cycle) order.
pub struct FrameSink {
    sender: mpsc::Sender<Job>,
    worker: tokio::task::JoinHandle<Result<SinkSummary, SinkError>>,
}

impl FrameSink {
    pub fn new(mut encoder: Box<dyn FrameEncoder>, stamp: StampStyle, capacity: usize) -> Self {
        let (sender, mut rx) = mpsc::channel::<Job>(capacity.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            let mut frames_written = 0u64;
            while let Some(job) = rx.blocking_recv() {
                let Job { frame, metadata } = job;
                let frame = match metadata.clock {
                    Some(clock) => stamped_copy(&frame, clock, stamp)?,
                    None => frame,
                };
                encoder.append(&frame)?;
                frames_written += 1;
                debug!(cycle = metadata.cycle, frames_written, "frame written");
            }
            encoder.finish()?;
            Ok(SinkSummary { frames_written })
        });

        Self { sender, worker }
    }

    pub async fn submit(
        &self,
        frame: VideoFrame,
        metadata: FrameMetadata,
    ) -> Result<(), SinkError> {
        self.sender
            .send(Job { frame, metadata })
            .await
            .map_err(|_| SinkError::Stopped)
    }

    /// Flush the encoder and return the final frame count.
    pub async fn shutdown(self) -> Result<SinkSummary, SinkError> {
        drop(self.sender);
        match self.worker.await {
            Ok(result) => result,
            Err(err) => {
                if !err.is_cancelled() {
                    tracing::error!("frame sink worker task error: {err}");
                }
                Err(SinkError::Stopped)
            }
        }
    }
}

fn stamped_copy(
    frame: &VideoFrame,
    clock: GameClock,
    style: StampStyle,
) -> Result<VideoFrame, SinkError> {
    let mut luma = frame.luma().to_vec();
    let mut chroma = frame.chroma().to_vec();
    stamp::burn_clock(
        &mut luma,
        &mut chroma,
        frame.width(),
        frame.height(),
        frame.luma_stride(),
        frame.chroma_stride(),
        clock,
        style,
    );
    VideoFrame::from_nv12_owned(
        frame.width(),
        frame.height(),
        frame.luma_stride(),
        frame.chroma_stride(),
        frame.timestamp(),
        luma,
        chroma,
    )
    .map(|copy| copy.with_frame_index(frame.frame_index()))
    .map_err(|err| SinkError::encode(err.to_string()))
}
