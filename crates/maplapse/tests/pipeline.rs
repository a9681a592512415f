use std::sync::Arc;

use image::GrayImage;

use maplapse::clock::{ClockRecognizer, ClockTracker, TrackerConfig};
use maplapse::pipeline::{EngineConfig, PipelineComponents, StopSignal, run_pipeline};
use maplapse::progress::CycleProgress;
use maplapse_decoder::FrameStream;
use maplapse_detector::{MatcherParams, OverlayDetector, Template};
use maplapse_ocr::{OcrEngine, OcrError, OcrRequest, OcrResponse, OcrText};
use maplapse_sink::{FrameSink, ImageSequenceEncoder, OutputFormat, StampStyle};
use maplapse_types::{FrameError, FrameResult, GameClock, VideoFrame};

const TEMPLATE_SIZE: u32 = 96;
const FRAME_W: u32 = 320;
const FRAME_H: u32 = 240;
const TEST_THRESHOLD: usize = 10;

/// Deterministic blocky noise; busy enough for corner detection.
fn noise_pattern(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; (width * height) as usize];
    let block = 3u32;
    for y in 0..height {
        for x in 0..width {
            let mut state = seed
                ^ ((x / block) as u64).wrapping_mul(0x517c_c1b7_2722_0a95)
                ^ ((y / block) as u64).wrapping_mul(0x2545_f491_4f6c_dd1d);
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            data[(y * width + x) as usize] = if state & (1 << 33) != 0 { 255 } else { 0 };
        }
    }
    data
}

fn frame_at(cycle: u64, overlay: Option<&[u8]>) -> VideoFrame {
    let stride = FRAME_W as usize;
    let mut luma = vec![0u8; stride * FRAME_H as usize];
    for (row, chunk) in luma.chunks_mut(stride).enumerate() {
        chunk.fill((row % 200) as u8);
    }
    if let Some(pattern) = overlay {
        let x0 = (FRAME_W - TEMPLATE_SIZE) as usize / 2;
        let y0 = (FRAME_H - TEMPLATE_SIZE) as usize / 2;
        for row in 0..TEMPLATE_SIZE as usize {
            let src = &pattern[row * TEMPLATE_SIZE as usize..(row + 1) * TEMPLATE_SIZE as usize];
            let dst = (y0 + row) * stride + x0;
            luma[dst..dst + TEMPLATE_SIZE as usize].copy_from_slice(src);
        }
    }
    let chroma = vec![128u8; stride * (FRAME_H as usize).div_ceil(2)];
    VideoFrame::from_nv12_owned(FRAME_W, FRAME_H, stride, stride, None, luma, chroma)
        .unwrap()
        .with_frame_index(Some(cycle))
}

fn stream_of(frames: Vec<FrameResult<VideoFrame>>) -> FrameStream {
    Box::pin(futures_util::stream::iter(frames))
}

fn components(ocr: Arc<dyn OcrEngine>, map_pattern: &[u8]) -> PipelineComponents {
    let params = MatcherParams::default();
    let map_image =
        GrayImage::from_raw(TEMPLATE_SIZE, TEMPLATE_SIZE, map_pattern.to_vec()).unwrap();
    let warmup_image = GrayImage::from_raw(
        TEMPLATE_SIZE,
        TEMPLATE_SIZE,
        noise_pattern(TEMPLATE_SIZE, TEMPLATE_SIZE, 4242),
    )
    .unwrap();

    PipelineComponents {
        map_detector: OverlayDetector::new(
            Template::from_gray("test-map", &map_image, &params).unwrap(),
            params,
            TEST_THRESHOLD,
        ),
        warmup_detector: OverlayDetector::new(
            Template::from_gray("warmup", &warmup_image, &params).unwrap(),
            params,
            TEST_THRESHOLD,
        ),
        recognizer: ClockRecognizer::new(ocr),
        tracker: ClockTracker::new(TrackerConfig::default()),
    }
}

struct ScriptedOcr {
    tokens: Vec<String>,
}

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(OcrResponse::new(
            self.tokens.iter().cloned().map(OcrText::new).collect(),
        ))
    }
}

struct FailingOcr;

impl OcrEngine for FailingOcr {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Err(OcrError::backend("scripted recognition failure"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn accepted_frames_reach_the_sink_exactly_once_with_clock_stamps() {
    let map_pattern = noise_pattern(TEMPLATE_SIZE, TEMPLATE_SIZE, 21);

    let mut items: Vec<FrameResult<VideoFrame>> = Vec::new();
    for cycle in 0..20u64 {
        let overlay = (cycle % 3 == 0).then_some(map_pattern.as_slice());
        items.push(Ok(frame_at(cycle, overlay)));
    }
    items.push(Err(FrameError::EndOfStream));

    let dir = tempfile::tempdir().unwrap();
    let encoder =
        ImageSequenceEncoder::create(dir.path().to_path_buf(), OutputFormat::Png, 4).unwrap();
    let sink = FrameSink::new(Box::new(encoder), StampStyle::default(), 4);

    let ocr = Arc::new(ScriptedOcr {
        tokens: vec!["score".to_owned(), "2:15:07".to_owned()],
    });

    let summary = run_pipeline(
        stream_of(items),
        sink,
        components(ocr, &map_pattern),
        EngineConfig::default(),
        StopSignal::new(),
        &CycleProgress::hidden(),
    )
    .await
    .unwrap();

    // Overlay frames at cycles 0, 3, 6, 9, 12, 15, 18.
    assert_eq!(summary.cycles, 20);
    assert_eq!(summary.frames_accepted, 7);
    assert_eq!(summary.frames_written, 7);
    // Direct read refreshes at cycles 0/5/10/15; decays at 16 and 18 leave
    // the tracked clock two seconds behind the last confirmed read.
    assert_eq!(summary.clock, Some(GameClock::new(2, 15, 5).unwrap()));

    assert!(dir.path().join("frame_000006.png").exists());
    assert!(!dir.path().join("frame_000007.png").exists());

    // Cycle 0 was accepted before the first direct read, so it carries no
    // stamp; the second accepted frame (cycle 3) does.
    let unstamped = image::open(dir.path().join("frame_000000.png"))
        .unwrap()
        .to_rgb8();
    assert_ne!(unstamped.get_pixel(101, 61).0, [255, 255, 255]);

    let stamped = image::open(dir.path().join("frame_000001.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(stamped.get_pixel(101, 61).0, [255, 255, 255]);
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_without_the_overlay_are_never_accepted() {
    let map_pattern = noise_pattern(TEMPLATE_SIZE, TEMPLATE_SIZE, 21);

    let mut items: Vec<FrameResult<VideoFrame>> = Vec::new();
    for cycle in 0..8u64 {
        items.push(Ok(frame_at(cycle, None)));
    }
    items.push(Err(FrameError::EndOfStream));

    let dir = tempfile::tempdir().unwrap();
    let encoder =
        ImageSequenceEncoder::create(dir.path().to_path_buf(), OutputFormat::Png, 4).unwrap();
    let sink = FrameSink::new(Box::new(encoder), StampStyle::default(), 4);

    let ocr = Arc::new(ScriptedOcr { tokens: Vec::new() });
    let summary = run_pipeline(
        stream_of(items),
        sink,
        components(ocr, &map_pattern),
        EngineConfig::default(),
        StopSignal::new(),
        &CycleProgress::hidden(),
    )
    .await
    .unwrap();

    assert_eq!(summary.cycles, 8);
    assert_eq!(summary.frames_accepted, 0);
    assert_eq!(summary.frames_written, 0);
    assert!(summary.clock.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn recognition_failures_never_abort_the_run() {
    let map_pattern = noise_pattern(TEMPLATE_SIZE, TEMPLATE_SIZE, 21);

    let mut items: Vec<FrameResult<VideoFrame>> = Vec::new();
    for cycle in 0..6u64 {
        items.push(Ok(frame_at(cycle, Some(map_pattern.as_slice()))));
    }
    items.push(Err(FrameError::EndOfStream));

    let dir = tempfile::tempdir().unwrap();
    let encoder =
        ImageSequenceEncoder::create(dir.path().to_path_buf(), OutputFormat::Png, 4).unwrap();
    let sink = FrameSink::new(Box::new(encoder), StampStyle::default(), 4);

    let summary = run_pipeline(
        stream_of(items),
        sink,
        components(Arc::new(FailingOcr), &map_pattern),
        EngineConfig::default(),
        StopSignal::new(),
        &CycleProgress::hidden(),
    )
    .await
    .unwrap();

    // Every frame carries the overlay; the clock simply never acquires.
    assert_eq!(summary.frames_written, 6);
    assert!(summary.clock.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn decode_errors_abort_after_flushing_the_sink() {
    let map_pattern = noise_pattern(TEMPLATE_SIZE, TEMPLATE_SIZE, 21);

    let items: Vec<FrameResult<VideoFrame>> = vec![
        Ok(frame_at(0, Some(map_pattern.as_slice()))),
        Err(FrameError::backend_failure("mock", "simulated decode fault")),
    ];

    let dir = tempfile::tempdir().unwrap();
    let encoder =
        ImageSequenceEncoder::create(dir.path().to_path_buf(), OutputFormat::Png, 4).unwrap();
    let sink = FrameSink::new(Box::new(encoder), StampStyle::default(), 4);

    let ocr = Arc::new(ScriptedOcr { tokens: Vec::new() });
    let result = run_pipeline(
        stream_of(items),
        sink,
        components(ocr, &map_pattern),
        EngineConfig::default(),
        StopSignal::new(),
        &CycleProgress::hidden(),
    )
    .await;

    assert!(result.is_err());
    // The frame accepted before the failure still reached the encoder.
    assert!(dir.path().join("frame_000000.png").exists());
}
