use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;
use futures_util::stream::unfold;
use tokio::sync::mpsc::{self, Sender};

pub use maplapse_types::{FrameError, FrameResult, VideoFrame};

pub type FrameStream = Pin<Box<dyn Stream<Item = FrameResult<VideoFrame>> + Send>>;

pub type DynFrameSource = Box<dyn FrameSource>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceMetadata {
    pub duration: Option<Duration>,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SourceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sampling cycles a source of this duration yields for the
    /// given step, counting one decoded frame per seek target.
    pub fn estimated_cycles(&self, sample_step: Duration) -> Option<u64> {
        let duration = self.duration?;
        let step = sample_step.as_millis().max(1) as u64;
        Some(duration.as_millis() as u64 / step)
    }
}

/// A video source that seeks ahead by a fixed sampling step and decodes one
/// frame per step. Each stream item corresponds to one engine cycle.
pub trait FrameSource: Send + 'static {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata::default()
    }

    fn into_stream(self: Box<Self>) -> FrameStream;
}

pub fn spawn_stream_from_channel(
    capacity: usize,
    task: impl FnOnce(Sender<FrameResult<VideoFrame>>) + Send + 'static,
) -> FrameStream {
    let (tx, rx) = mpsc::channel(capacity);
    tokio::task::spawn_blocking(move || task(tx));
    let stream = unfold(rx, |mut receiver| async {
        receiver.recv().await.map(|item| (item, receiver))
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test(flavor = "multi_thread")]
    async fn spawn_stream_from_channel_pushes_values() {
        let stream = spawn_stream_from_channel(2, move |tx| {
            tx.blocking_send(Ok(VideoFrame::from_nv12_owned(
                2,
                2,
                2,
                2,
                None,
                vec![1, 2, 3, 4],
                vec![128; 2],
            )
            .unwrap()))
                .unwrap();
        });
        let mut stream = stream;
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.luma(), &[1, 2, 3, 4]);
    }

    #[test]
    fn estimated_cycles_follows_sampling_step() {
        let metadata = SourceMetadata {
            duration: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        assert_eq!(
            metadata.estimated_cycles(Duration::from_millis(500)),
            Some(20)
        );
        assert_eq!(SourceMetadata::default().estimated_cycles(Duration::from_millis(500)), None);
    }
}
