//! Shared domain models for the maplapse workspace.
//!
//! This crate centralizes lightweight data structures used across the
//! decoder, detector, OCR, sink, and CLI crates. Keep it backend-agnostic
//! and free of platform-specific dependencies so every crate can depend on
//! it without pulling native SDKs or heavy features.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

/// A decoded video frame in NV12 layout: a full-resolution luma plane and a
/// half-height plane of interleaved chroma samples.
#[derive(Clone)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    luma_stride: usize,
    chroma_stride: usize,
    timestamp: Option<Duration>,
    frame_index: Option<u64>,
    luma: Arc<[u8]>,
    chroma: Arc<[u8]>,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("luma_stride", &self.luma_stride)
            .field("chroma_stride", &self.chroma_stride)
            .field("timestamp", &self.timestamp)
            .field("frame_index", &self.frame_index)
            .field("luma_bytes", &self.luma.len())
            .field("chroma_bytes", &self.chroma.len())
            .finish()
    }
}

impl VideoFrame {
    pub fn from_nv12_owned(
        width: u32,
        height: u32,
        luma_stride: usize,
        chroma_stride: usize,
        timestamp: Option<Duration>,
        luma: Vec<u8>,
        chroma: Vec<u8>,
    ) -> FrameResult<Self> {
        let luma_required =
            luma_stride
                .checked_mul(height as usize)
                .ok_or_else(|| FrameError::InvalidFrame {
                    reason: "calculated luma plane length overflowed".into(),
                })?;
        if luma.len() < luma_required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient luma bytes: got {} expected at least {}",
                    luma.len(),
                    luma_required
                ),
            });
        }
        let chroma_rows = (height as usize).div_ceil(2);
        let chroma_required =
            chroma_stride
                .checked_mul(chroma_rows)
                .ok_or_else(|| FrameError::InvalidFrame {
                    reason: "calculated chroma plane length overflowed".into(),
                })?;
        if chroma.len() < chroma_required {
            return Err(FrameError::InvalidFrame {
                reason: format!(
                    "insufficient chroma bytes: got {} expected at least {}",
                    chroma.len(),
                    chroma_required
                ),
            });
        }
        Ok(Self {
            width,
            height,
            luma_stride,
            chroma_stride,
            timestamp,
            frame_index: None,
            luma: Arc::from(luma.into_boxed_slice()),
            chroma: Arc::from(chroma.into_boxed_slice()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma_stride(&self) -> usize {
        self.luma_stride
    }

    pub fn chroma_stride(&self) -> usize {
        self.chroma_stride
    }

    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    pub fn chroma(&self) -> &[u8] {
        &self.chroma
    }

    pub fn with_frame_index(mut self, index: Option<u64>) -> Self {
        self.frame_index = index;
        self
    }

    pub fn set_frame_index(&mut self, index: Option<u64>) {
        self.frame_index = index;
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("end of stream")]
    EndOfStream,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

/// An in-game time-of-day value.
///
/// Ordering is chronological within a single day. `tick_back` applies the
/// tracker's one-second synchronization decay with calendar-correct rollover,
/// wrapping midnight back to `23:59:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GameClock {
    hour: u8,
    minute: u8,
    second: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("hour {0} is out of range (0-23)")]
    HourOutOfRange(u32),
    #[error("minute {0} is out of range (0-59)")]
    MinuteOutOfRange(u32),
    #[error("second {0} is out of range (0-59)")]
    SecondOutOfRange(u32),
}

impl GameClock {
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, ClockError> {
        if hour >= 24 {
            return Err(ClockError::HourOutOfRange(hour));
        }
        if minute >= 60 {
            return Err(ClockError::MinuteOutOfRange(minute));
        }
        if second >= 60 {
            return Err(ClockError::SecondOutOfRange(second));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// Subtract one second, rolling minute/hour boundaries and wrapping
    /// midnight to the end of the previous day.
    pub fn tick_back(&mut self) {
        if self.second > 0 {
            self.second -= 1;
            return;
        }
        self.second = 59;
        if self.minute > 0 {
            self.minute -= 1;
            return;
        }
        self.minute = 59;
        if self.hour > 0 {
            self.hour -= 1;
        } else {
            self.hour = 23;
        }
    }
}

impl fmt::Display for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_accessors_work() {
        let frame = VideoFrame::from_nv12_owned(
            4,
            2,
            4,
            4,
            Some(Duration::from_millis(500)),
            vec![0; 8],
            vec![128; 4],
        )
        .unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.luma_stride(), 4);
        assert_eq!(frame.timestamp(), Some(Duration::from_millis(500)));
        assert_eq!(frame.luma().len(), 8);
        assert_eq!(frame.chroma().len(), 4);
        assert_eq!(frame.frame_index(), None);
    }

    #[test]
    fn short_luma_plane_is_rejected() {
        let result = VideoFrame::from_nv12_owned(4, 4, 4, 4, None, vec![0; 8], vec![128; 8]);
        assert!(result.is_err());
    }

    #[test]
    fn clock_rejects_out_of_range_fields() {
        assert_eq!(GameClock::new(24, 0, 0), Err(ClockError::HourOutOfRange(24)));
        assert_eq!(
            GameClock::new(1, 61, 0),
            Err(ClockError::MinuteOutOfRange(61))
        );
        assert_eq!(
            GameClock::new(1, 0, 60),
            Err(ClockError::SecondOutOfRange(60))
        );
    }

    #[test]
    fn tick_back_rolls_minute_boundary() {
        let mut clock = GameClock::new(1, 0, 5).unwrap();
        for _ in 0..10 {
            clock.tick_back();
        }
        assert_eq!(clock, GameClock::new(0, 59, 55).unwrap());
    }

    #[test]
    fn tick_back_wraps_midnight() {
        let mut clock = GameClock::new(0, 0, 0).unwrap();
        clock.tick_back();
        assert_eq!(clock, GameClock::new(23, 59, 59).unwrap());
    }

    #[test]
    fn ordering_is_chronological() {
        let early = GameClock::new(0, 10, 0).unwrap();
        let late = GameClock::new(0, 15, 0).unwrap();
        assert!(late > early);
        assert!(GameClock::new(1, 0, 0).unwrap() > GameClock::new(0, 59, 59).unwrap());
    }

    #[test]
    fn display_pads_minutes_and_seconds() {
        let clock = GameClock::new(1, 3, 7).unwrap();
        assert_eq!(clock.to_string(), "1:03:07");
    }
}
