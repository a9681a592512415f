use serde::Serialize;
use tracing::debug;

use crate::config::MatcherParams;
use crate::features::{Descriptor, GrayPlane, detect_and_describe};
use crate::mask::MaskedPlane;
use crate::matcher::good_match_count;
use crate::template::Template;

/// Outcome of matching one frame against one template. The raw count is kept
/// for diagnostics; everything downstream keys off `visible`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MapDetection {
    pub good_matches: usize,
    pub visible: bool,
}

/// Decides whether a template overlay is present in a masked frame.
///
/// Stateless apart from its template and parameters: re-running on an
/// identical plane yields an identical result.
pub struct OverlayDetector {
    template: Template,
    params: MatcherParams,
    min_match_count: usize,
}

impl OverlayDetector {
    pub fn new(template: Template, params: MatcherParams, min_match_count: usize) -> Self {
        Self {
            template,
            params,
            min_match_count,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn min_match_count(&self) -> usize {
        self.min_match_count
    }

    /// Match against descriptors already extracted from the frame, so several
    /// detectors can share one extraction pass per cycle.
    pub fn match_descriptors(&self, scene: &[Descriptor]) -> MapDetection {
        let good_matches = good_match_count(self.template.descriptors(), scene, &self.params);
        let detection = MapDetection {
            good_matches,
            visible: good_matches > self.min_match_count,
        };
        debug!(
            template = %self.template.name(),
            good = good_matches,
            threshold = self.min_match_count,
            visible = detection.visible,
            "overlay match"
        );
        detection
    }

    pub fn detect(&self, masked: &MaskedPlane) -> MapDetection {
        self.detect_plane(masked.as_gray())
    }

    pub fn detect_plane(&self, plane: GrayPlane<'_>) -> MapDetection {
        let (_, scene) = detect_and_describe(plane, &self.params);
        self.match_descriptors(&scene)
    }

    /// Extraction shared across detectors for one cycle.
    pub fn describe_plane(plane: GrayPlane<'_>, params: &MatcherParams) -> Vec<Descriptor> {
        let (_, descriptors) = detect_and_describe(plane, params);
        descriptors
    }
}
