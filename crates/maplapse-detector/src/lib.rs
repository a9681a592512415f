//! Map-overlay detection for sampled gameplay frames.
//!
//! The pipeline is classic sparse matching: FAST corners on the luma plane,
//! binary patch descriptors, an approximate two-nearest-neighbour search over
//! the frame's descriptors, and a distance-ratio filter. A frame is accepted
//! when the surviving correspondence count clears the template's threshold.

mod config;
mod detector;
mod error;
mod features;
mod mask;
mod matcher;
mod template;

pub use config::{
    DEFAULT_MIN_MATCH_COUNT, DEFAULT_MIN_MATCH_COUNT_WARMUP, DetectorConfig, MatcherParams,
};
pub use detector::{MapDetection, OverlayDetector};
pub use error::DetectorError;
pub use features::{Descriptor, GrayPlane, Keypoint, detect_and_describe};
pub use mask::{MaskedPlane, OverlayMask};
pub use matcher::good_match_count;
pub use template::{MapId, Template, TemplateSet, WARMUP_ASSET};
