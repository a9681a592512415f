use std::time::Duration;

use tokio::sync::mpsc::Sender;

use crate::core::{
    DynFrameSource, FrameError, FrameResult, FrameSource, FrameStream, SourceMetadata,
    VideoFrame, spawn_stream_from_channel,
};

/// Synthetic source used by tests and CI. Emits gradient frames whose
/// timestamps follow the sampling contract: frame k sits at `(k + 1) * step`.
pub struct MockSource {
    width: u32,
    height: u32,
    stride: usize,
    frame_count: usize,
    sample_step: Duration,
    channel_capacity: usize,
}

impl MockSource {
    const DEFAULT_CHANNEL_CAPACITY: usize = 8;

    pub fn new(sample_step: Duration, channel_capacity: Option<usize>) -> Self {
        Self {
            width: 640,
            height: 360,
            stride: 640,
            frame_count: 120,
            sample_step,
            channel_capacity: channel_capacity
                .unwrap_or(Self::DEFAULT_CHANNEL_CAPACITY)
                .max(1),
        }
    }

    fn emit_frames(&self, tx: Sender<FrameResult<VideoFrame>>) {
        for index in 0..self.frame_count {
            if tx.is_closed() {
                return;
            }
            let mut luma = vec![0u8; self.stride * self.height as usize];
            for (row, chunk) in luma.chunks_mut(self.stride).enumerate() {
                let value = ((row + index) % 256) as u8;
                chunk.fill(value);
            }
            let chroma_rows = (self.height as usize).div_ceil(2);
            let chroma = vec![128u8; self.stride * chroma_rows];
            let timestamp = Some(self.sample_step * (index as u32 + 1));
            let frame = VideoFrame::from_nv12_owned(
                self.width,
                self.height,
                self.stride,
                self.stride,
                timestamp,
                luma,
                chroma,
            )
            .map(|frame| frame.with_frame_index(Some(index as u64)));
            if tx.blocking_send(frame).is_err() {
                return;
            }
        }
        let _ = tx.blocking_send(Err(FrameError::EndOfStream));
    }
}

impl FrameSource for MockSource {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            duration: Some(self.sample_step * self.frame_count as u32),
            fps: None,
            width: Some(self.width),
            height: Some(self.height),
        }
    }

    fn into_stream(self: Box<Self>) -> FrameStream {
        let source = *self;
        let capacity = source.channel_capacity;
        spawn_stream_from_channel(capacity, move |tx| {
            source.emit_frames(tx);
        })
    }
}

pub fn boxed_mock(
    sample_step: Duration,
    channel_capacity: Option<usize>,
) -> FrameResult<DynFrameSource> {
    Ok(Box::new(MockSource::new(sample_step, channel_capacity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test(flavor = "multi_thread")]
    async fn mock_source_emits_frames_then_end_of_stream() {
        let source = Box::new(MockSource::new(Duration::from_millis(500), None));
        let metadata = source.metadata();
        assert_eq!(metadata.width, Some(640));
        assert_eq!(
            metadata.estimated_cycles(Duration::from_millis(500)),
            Some(120)
        );

        let mut stream = (source as DynFrameSource).into_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.width(), 640);
        assert_eq!(first.timestamp(), Some(Duration::from_millis(500)));
        assert_eq!(first.frame_index(), Some(0));

        let mut count = 1u64;
        let mut saw_eos = false;
        while let Some(item) = stream.next().await {
            match item {
                Ok(_) => count += 1,
                Err(err) => {
                    assert!(err.is_end_of_stream());
                    saw_eos = true;
                }
            }
        }
        assert_eq!(count, 120);
        assert!(saw_eos);
    }
}
