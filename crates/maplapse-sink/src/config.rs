/// Output cadence of the assembled video. The source is sampled at roughly
/// two frames per second of footage, so 4 fps plays back at a 2x time-lapse.
pub const DEFAULT_OUTPUT_FPS: u32 = 4;

/// Queue depth before frame submission applies backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }
}
