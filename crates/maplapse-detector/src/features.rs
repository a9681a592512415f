use std::sync::OnceLock;

use crate::config::MatcherParams;

pub const DESCRIPTOR_BYTES: usize = 32;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_BYTES * 8;

// Descriptor patch geometry: comparison points within ±13 of the keypoint,
// each read through a box filter of radius 2. Keypoints closer than BORDER to
// a plane edge are discarded so every read stays in bounds.
const SAMPLE_RADIUS: i32 = 13;
const SMOOTH_RADIUS: i32 = 2;
pub const BORDER: u32 = (SAMPLE_RADIUS + SMOOTH_RADIUS + 1) as u32;

const PATTERN_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

// Bresenham circle of radius 3 used by the FAST segment test.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC_LENGTH: usize = 9;

/// Borrowed view over a grayscale plane with an explicit stride.
#[derive(Clone, Copy)]
pub struct GrayPlane<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> GrayPlane<'a> {
    pub fn new(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Self {
        debug_assert!(data.len() >= stride * height as usize);
        Self {
            width,
            height,
            stride,
            data,
        }
    }

    #[inline(always)]
    fn at(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.stride + x as usize]
    }

    #[inline(always)]
    fn at_offset(&self, x: u32, y: u32, dx: i32, dy: i32) -> u8 {
        let xx = (x as i32 + dx) as u32;
        let yy = (y as i32 + dy) as u32;
        self.at(xx, yy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    pub score: u32,
}

/// 256-bit binary patch descriptor.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u8; DESCRIPTOR_BYTES]);

impl Descriptor {
    #[inline]
    pub fn distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    #[inline]
    pub fn bit(&self, index: usize) -> bool {
        (self.0[index / 8] >> (index % 8)) & 1 == 1
    }
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Descriptor({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

fn lcg_next(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    *state
}

fn pattern_coordinate(state: &mut u64) -> i32 {
    let span = (2 * SAMPLE_RADIUS + 1) as u64;
    ((lcg_next(state) >> 33) % span) as i32 - SAMPLE_RADIUS
}

/// Fixed comparison-point pairs shared by every descriptor computation.
/// Derived from a compile-time seed so matching is reproducible across runs.
fn sampling_pattern() -> &'static [(i32, i32, i32, i32)] {
    static PATTERN: OnceLock<Vec<(i32, i32, i32, i32)>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut state = PATTERN_SEED;
        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS);
        while pairs.len() < DESCRIPTOR_BITS {
            let pair = (
                pattern_coordinate(&mut state),
                pattern_coordinate(&mut state),
                pattern_coordinate(&mut state),
                pattern_coordinate(&mut state),
            );
            // Degenerate pairs compare a point to itself and carry no signal.
            if (pair.0, pair.1) != (pair.2, pair.3) {
                pairs.push(pair);
            }
        }
        pairs
    })
}

/// FAST-9 corners with non-maximum suppression. Returns keypoints at least
/// `BORDER` pixels from every edge, in row-major order.
pub fn detect_keypoints(plane: GrayPlane<'_>, threshold: u8) -> Vec<Keypoint> {
    let width = plane.width as usize;
    let height = plane.height as usize;
    if plane.width <= 2 * BORDER || plane.height <= 2 * BORDER {
        return Vec::new();
    }

    let mut scores = vec![0u32; width * height];
    let mut candidates = Vec::new();

    for y in BORDER..plane.height - BORDER {
        for x in BORDER..plane.width - BORDER {
            let Some(score) = corner_score(plane, x, y, threshold) else {
                continue;
            };
            scores[y as usize * width + x as usize] = score;
            candidates.push((x, y));
        }
    }

    let mut keypoints = Vec::with_capacity(candidates.len() / 2);
    for (x, y) in candidates {
        let score = scores[y as usize * width + x as usize];
        if is_local_maximum(&scores, width, x as usize, y as usize, score) {
            keypoints.push(Keypoint { x, y, score });
        }
    }
    keypoints
}

fn corner_score(plane: GrayPlane<'_>, x: u32, y: u32, threshold: u8) -> Option<u32> {
    let center = plane.at(x, y);
    let lo = center.saturating_sub(threshold);
    let hi = center.saturating_add(threshold);

    // Cardinal pre-test: a 9-long arc must include at least three of the
    // four compass points on one side of the band.
    let mut brighter_cardinal = 0;
    let mut darker_cardinal = 0;
    for &(dx, dy) in &[CIRCLE[0], CIRCLE[4], CIRCLE[8], CIRCLE[12]] {
        let value = plane.at_offset(x, y, dx, dy);
        if value > hi {
            brighter_cardinal += 1;
        } else if value < lo {
            darker_cardinal += 1;
        }
    }
    if brighter_cardinal < 3 && darker_cardinal < 3 {
        return None;
    }

    let mut brighter = [false; 16];
    let mut darker = [false; 16];
    for (index, &(dx, dy)) in CIRCLE.iter().enumerate() {
        let value = plane.at_offset(x, y, dx, dy);
        brighter[index] = value > hi;
        darker[index] = value < lo;
    }

    if !has_contiguous_arc(&brighter) && !has_contiguous_arc(&darker) {
        return None;
    }

    let mut score = 0u32;
    for &(dx, dy) in CIRCLE.iter() {
        let value = plane.at_offset(x, y, dx, dy);
        if value > hi {
            score += (value - hi) as u32;
        } else if value < lo {
            score += (lo - value) as u32;
        }
    }
    Some(score.max(1))
}

fn has_contiguous_arc(flags: &[bool; 16]) -> bool {
    let mut run = 0usize;
    for index in 0..32 {
        if flags[index % 16] {
            run += 1;
            if run >= ARC_LENGTH {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn is_local_maximum(scores: &[u32], width: usize, x: usize, y: usize, score: u32) -> bool {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let neighbor = scores[(y as i32 + dy) as usize * width + (x as i32 + dx) as usize];
            // Ties resolve in scan order so plateau corners keep exactly one
            // representative.
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if (earlier && neighbor >= score) || (!earlier && neighbor > score) {
                return false;
            }
        }
    }
    true
}

fn build_integral(plane: GrayPlane<'_>) -> Vec<u32> {
    let width = plane.width as usize;
    let height = plane.height as usize;
    let stride = width + 1;
    let mut integral = vec![0u32; stride * (height + 1)];
    for y in 0..height {
        let mut row_acc = 0u32;
        let src = &plane.data[y * plane.stride..y * plane.stride + width];
        for x in 0..width {
            row_acc += src[x] as u32;
            integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_acc;
        }
    }
    integral
}

#[inline(always)]
fn box_sum(integral: &[u32], stride: usize, x: i32, y: i32) -> u32 {
    let x0 = (x - SMOOTH_RADIUS) as usize;
    let y0 = (y - SMOOTH_RADIUS) as usize;
    let x1 = (x + SMOOTH_RADIUS + 1) as usize;
    let y1 = (y + SMOOTH_RADIUS + 1) as usize;
    integral[y1 * stride + x1] + integral[y0 * stride + x0]
        - integral[y0 * stride + x1]
        - integral[y1 * stride + x0]
}

/// Binary descriptors for the given keypoints. Each bit compares two
/// box-smoothed samples from the fixed pattern around the keypoint.
pub fn compute_descriptors(plane: GrayPlane<'_>, keypoints: &[Keypoint]) -> Vec<Descriptor> {
    if keypoints.is_empty() {
        return Vec::new();
    }
    let pattern = sampling_pattern();
    let integral = build_integral(plane);
    let stride = plane.width as usize + 1;

    let mut descriptors = Vec::with_capacity(keypoints.len());
    for keypoint in keypoints {
        let cx = keypoint.x as i32;
        let cy = keypoint.y as i32;
        let mut bytes = [0u8; DESCRIPTOR_BYTES];
        for (index, &(x1, y1, x2, y2)) in pattern.iter().enumerate() {
            let a = box_sum(&integral, stride, cx + x1, cy + y1);
            let b = box_sum(&integral, stride, cx + x2, cy + y2);
            if a < b {
                bytes[index / 8] |= 1 << (index % 8);
            }
        }
        descriptors.push(Descriptor(bytes));
    }
    descriptors
}

/// Keypoints plus descriptors in one pass; the unit of work for both
/// template preparation and per-frame matching.
pub fn detect_and_describe(
    plane: GrayPlane<'_>,
    params: &MatcherParams,
) -> (Vec<Keypoint>, Vec<Descriptor>) {
    let keypoints = detect_keypoints(plane, params.fast_threshold);
    let descriptors = compute_descriptors(plane, &keypoints);
    (keypoints, descriptors)
}
