pub mod stamp;

mod config;
mod encoder;
#[cfg(feature = "sink-ffmpeg")]
mod ffmpeg;
mod image_seq;
mod sink;

pub use config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_OUTPUT_FPS, OutputFormat};
pub use encoder::{FrameEncoder, nv12_to_rgb};
#[cfg(feature = "sink-ffmpeg")]
pub use ffmpeg::Mp4Encoder;
pub use image_seq::ImageSequenceEncoder;
pub use sink::{FrameMetadata, FrameSink, SinkError, SinkSummary};
pub use stamp::StampStyle;
