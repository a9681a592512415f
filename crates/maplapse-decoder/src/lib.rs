pub mod backends;
pub mod config;
pub mod core;

pub use config::{Backend, Configuration};
pub use core::{
    DynFrameSource, FrameSource, FrameStream, SourceMetadata, spawn_stream_from_channel,
};
pub use maplapse_types::{FrameError, FrameResult, VideoFrame};
