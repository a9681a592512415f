/// Good-correspondence threshold for the full map overlay. High because the
/// map graphic is large and detailed; recalibrate per template.
pub const DEFAULT_MIN_MATCH_COUNT: usize = 1000;

/// Threshold for the warmup marker, a small localized screen element.
pub const DEFAULT_MIN_MATCH_COUNT_WARMUP: usize = 30;

/// Matching effort and filter parameters. Fixed for the life of a run so
/// repeated detections over identical frames stay deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherParams {
    /// Corner response threshold for the FAST segment test.
    pub fast_threshold: u8,
    /// Hash tables in the approximate nearest-neighbour index.
    pub trees: usize,
    /// Candidate distance evaluations per query descriptor.
    pub checks: usize,
    /// Nearest / second-nearest distance ratio below which a
    /// correspondence counts as good.
    pub ratio: f32,
}

impl Default for MatcherParams {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            trees: 5,
            checks: 50,
            ratio: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub min_match_count: usize,
    pub warmup_min_match_count: usize,
    pub matcher: MatcherParams,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_match_count: DEFAULT_MIN_MATCH_COUNT,
            warmup_min_match_count: DEFAULT_MIN_MATCH_COUNT_WARMUP,
            matcher: MatcherParams::default(),
        }
    }
}
