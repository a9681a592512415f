//! The per-frame control loop.
//!
//! One stream item equals one cycle: the decoder has already seeked ahead by
//! the sampling step. Each cycle derives the masked luma plane, runs warmup
//! acquisition while the clock is untrusted, decides overlay visibility,
//! forwards accepted frames to the sink in cycle order, and fires the
//! modulo-gated clock transitions. Recognition failures are logged and
//! swallowed; only decode and sink failures abort the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use maplapse_decoder::FrameStream;
use maplapse_detector::{MatcherParams, OverlayDetector, OverlayMask};
use maplapse_sink::{FrameMetadata, FrameSink, SinkError};
use maplapse_types::{FrameError, GameClock, VideoFrame};

use crate::clock::{ClockRecognizer, ClockTracker};

/// Cycle gating and sampling tunables. Defaults encode the source material's
/// cadence: half a second of footage per cycle, one second of clock decay
/// every two cycles, an OCR re-check every five, a sanity check every 120.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_step: Duration,
    pub decay_interval: u64,
    pub direct_read_interval: u64,
    pub sanity_interval: u64,
    pub matcher: MatcherParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_step: Duration::from_millis(500),
            decay_interval: 2,
            direct_read_interval: 5,
            sanity_interval: 120,
            matcher: MatcherParams::default(),
        }
    }
}

/// Session-scoped counters, owned by the driver and passed to whatever needs
/// them; nothing here is process-global.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleContext {
    pub cycle: u64,
    pub frames_accepted: u64,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] FrameError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub cycles: u64,
    pub frames_accepted: u64,
    pub frames_written: u64,
    pub clock: Option<GameClock>,
}

/// Cooperative stop flag; a signal handler sets it and the driver unwinds
/// cleanly after the cycle in flight.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct PipelineComponents {
    pub map_detector: OverlayDetector,
    pub warmup_detector: OverlayDetector,
    pub recognizer: ClockRecognizer,
    pub tracker: ClockTracker,
}

struct CycleDriver {
    components: PipelineComponents,
    config: EngineConfig,
    ctx: CycleContext,
    mask: Option<OverlayMask>,
}

impl CycleDriver {
    fn new(components: PipelineComponents, config: EngineConfig) -> Self {
        Self {
            components,
            config,
            ctx: CycleContext::default(),
            mask: None,
        }
    }

    fn mask_for(&mut self, frame: &VideoFrame) -> OverlayMask {
        let template = self.components.map_detector.template();
        *self.mask.get_or_insert_with(|| {
            OverlayMask::centered(
                frame.width(),
                frame.height(),
                template.width(),
                template.height(),
            )
        })
    }

    async fn run_cycle(
        &mut self,
        frame: VideoFrame,
        sink: &FrameSink,
        progress: &crate::progress::CycleProgress,
    ) -> Result<(), PipelineError> {
        let cycle = self.ctx.cycle;
        let mask = self.mask_for(&frame);
        let masked = mask.apply(&frame);
        // One extraction pass feeds both detectors.
        let scene = OverlayDetector::describe_plane(masked.as_gray(), &self.config.matcher);

        if !self.components.tracker.is_set() {
            let warmup = self.components.warmup_detector.match_descriptors(&scene);
            if warmup.visible {
                self.try_warmup_acquisition(&frame);
            }
        }

        let detection = self.components.map_detector.match_descriptors(&scene);
        if detection.visible {
            let metadata = FrameMetadata {
                cycle,
                clock: self.components.tracker.current(),
            };
            sink.submit(frame.clone(), metadata).await?;
            self.ctx.frames_accepted += 1;
            match metadata.clock {
                Some(clock) => info!(
                    frame = self.ctx.frames_accepted,
                    good = detection.good_matches,
                    clock = %clock,
                    "added frame"
                ),
                None => info!(
                    frame = self.ctx.frames_accepted,
                    good = detection.good_matches,
                    "added frame (clock unset)"
                ),
            }
            progress.on_accept(self.ctx.frames_accepted, metadata.clock);
        }

        if cycle % self.config.direct_read_interval == 0 {
            self.try_direct_read(&frame);
        }
        if cycle % self.config.decay_interval == 0 {
            self.components.tracker.decay();
        }
        if cycle % self.config.sanity_interval == 0 && self.components.tracker.sanity_check() {
            info!(cycle, "clock drifted past its checkpoint; reacquiring");
        }

        self.ctx.cycle += 1;
        progress.on_cycle(self.ctx.cycle);
        Ok(())
    }

    /// Warmup acquisition: OCR the full frame and look for the marker.
    /// Failures are recoverable by contract; the clock stays as it was.
    fn try_warmup_acquisition(&mut self, frame: &VideoFrame) {
        let tokens = match self.components.recognizer.recognize(frame) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(cycle = self.ctx.cycle, "clock check failed: {err}");
                return;
            }
        };
        match self.components.tracker.observe_warmup(&tokens) {
            Ok(Some(_)) => {}
            Ok(None) => debug!(cycle = self.ctx.cycle, "warmup marker not recognized"),
            Err(err) => warn!(cycle = self.ctx.cycle, "clock check failed: {err}"),
        }
    }

    fn try_direct_read(&mut self, frame: &VideoFrame) {
        let tokens = match self.components.recognizer.recognize(frame) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(cycle = self.ctx.cycle, "clock check failed: {err}");
                return;
            }
        };
        if let Err(err) = self.components.tracker.observe_direct(&tokens) {
            warn!(cycle = self.ctx.cycle, "clock check failed: {err}");
        }
    }
}

/// Drive the sampling stream to completion. The sink is always flushed, even
/// when the run aborts; end-of-stream is the expected clean exit.
pub async fn run_pipeline(
    mut stream: FrameStream,
    sink: FrameSink,
    components: PipelineComponents,
    config: EngineConfig,
    stop: StopSignal,
    progress: &crate::progress::CycleProgress,
) -> Result<RunSummary, PipelineError> {
    let mut driver = CycleDriver::new(components, config);
    let mut run_error: Option<PipelineError> = None;

    while let Some(item) = stream.next().await {
        if stop.is_stop_requested() {
            info!(cycle = driver.ctx.cycle, "stop requested; unwinding");
            break;
        }
        match item {
            Ok(frame) => {
                if let Err(err) = driver.run_cycle(frame, &sink, progress).await {
                    run_error = Some(err);
                    break;
                }
            }
            Err(err) if err.is_end_of_stream() => {
                debug!(cycle = driver.ctx.cycle, "end of stream");
                break;
            }
            Err(err) => {
                run_error = Some(err.into());
                break;
            }
        }
    }

    let sink_result = sink.shutdown().await;
    if let Some(err) = run_error {
        return Err(err);
    }
    let sink_summary = sink_result?;

    Ok(RunSummary {
        cycles: driver.ctx.cycle,
        frames_accepted: driver.ctx.frames_accepted,
        frames_written: sink_summary.frames_written,
        clock: driver.components.tracker.current(),
    })
}
