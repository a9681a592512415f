use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};

use maplapse::cli::CliArgs;
use maplapse::clock::{ClockRecognizer, ClockTracker, TrackerConfig};
use maplapse::pipeline::{
    PipelineComponents, PipelineError, StopSignal, run_pipeline,
};
use maplapse::progress::CycleProgress;
use maplapse::settings::{ConfigError, EffectiveSettings, OcrBackendChoice, load_settings};
use maplapse_decoder::{Backend, Configuration, SourceMetadata};
use maplapse_detector::{DetectorError, MapId, OverlayDetector, TemplateSet};
use maplapse_ocr::{NoopOcrEngine, OcrEngine, OcrError, TesseractOcrEngine};
use maplapse_sink::{FrameEncoder, FrameSink, ImageSequenceEncoder, SinkError};
use maplapse_types::FrameError;

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), RunError> {
    init_tracing();

    let args = CliArgs::parse();
    if args.list_backends {
        print_available_backends();
        return Ok(());
    }
    if args.list_maps {
        print_maps();
        return Ok(());
    }

    let settings = load_settings(&args)?;
    let (map, input) = settings.require_run_inputs()?;

    let mut config = Configuration::from_env().unwrap_or_default();
    if let Some(backend) = settings.backend {
        config.backend = backend;
    }
    config.input = Some(input);
    config.sample_step = settings.engine.sample_step;

    if !Configuration::available_backends().contains(&config.backend) {
        return Err(FrameError::unsupported(config.backend.as_str()).into());
    }

    let matcher = settings.detector.matcher;
    let templates = TemplateSet::load(&settings.assets_dir, map, &matcher)?;
    let map_detector =
        OverlayDetector::new(templates.map, matcher, settings.detector.min_match_count);
    let warmup_detector = OverlayDetector::new(
        templates.warmup,
        matcher,
        settings.detector.warmup_min_match_count,
    );

    let recognizer = ClockRecognizer::new(build_ocr_engine(settings.ocr_backend)?);
    info!(map = %map, ocr = recognizer.engine_name(), "starting extraction");

    // Source-open failures abort here, before anything is written.
    let source = config.create_source()?;
    let metadata = source.metadata();
    let estimated = metadata.estimated_cycles(settings.engine.sample_step);
    let sink = build_sink(&settings, &metadata)?;

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("stop requested; finishing the current cycle");
                stop.request_stop();
            }
        });
    }

    let progress = CycleProgress::new(estimated);
    let components = PipelineComponents {
        map_detector,
        warmup_detector,
        recognizer,
        tracker: ClockTracker::new(TrackerConfig::default()),
    };

    match run_pipeline(
        source.into_stream(),
        sink,
        components,
        settings.engine.clone(),
        stop,
        &progress,
    )
    .await
    {
        Ok(summary) => {
            progress.finish(&summary);
            println!(
                "process completed with {} frames @ {}",
                summary.frames_written,
                settings.output.display()
            );
            Ok(())
        }
        Err(err) => {
            progress.abandon();
            Err(err.into())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_ocr_engine(choice: OcrBackendChoice) -> Result<Arc<dyn OcrEngine>, RunError> {
    match choice {
        OcrBackendChoice::Noop => Ok(Arc::new(NoopOcrEngine)),
        OcrBackendChoice::Tesseract => {
            let engine = TesseractOcrEngine::new();
            engine.warm_up()?;
            Ok(Arc::new(engine))
        }
        OcrBackendChoice::Auto => {
            let engine = TesseractOcrEngine::new();
            if engine.is_available() {
                Ok(Arc::new(engine))
            } else {
                warn!("tesseract unavailable; continuing without clock recognition");
                Ok(Arc::new(NoopOcrEngine))
            }
        }
    }
}

fn build_sink(
    settings: &EffectiveSettings,
    metadata: &SourceMetadata,
) -> Result<FrameSink, RunError> {
    let wants_mp4 = settings
        .output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));

    let encoder: Box<dyn FrameEncoder> = if wants_mp4 {
        build_mp4_encoder(settings, metadata)?
    } else {
        Box::new(ImageSequenceEncoder::create(
            settings.output.clone(),
            settings.output_format,
            settings.output_fps,
        )?)
    };
    Ok(FrameSink::new(
        encoder,
        settings.stamp,
        maplapse_sink::DEFAULT_CHANNEL_CAPACITY,
    ))
}

#[cfg(feature = "sink-ffmpeg")]
fn build_mp4_encoder(
    settings: &EffectiveSettings,
    metadata: &SourceMetadata,
) -> Result<Box<dyn FrameEncoder>, RunError> {
    let (Some(width), Some(height)) = (metadata.width, metadata.height) else {
        return Err(ConfigError::InvalidValue {
            field: "output",
            value: settings.output.display().to_string(),
            message: "mp4 output needs source dimensions, which this backend does not report"
                .to_owned(),
        }
        .into());
    };
    Ok(Box::new(maplapse_sink::Mp4Encoder::create(
        &settings.output,
        width,
        height,
        settings.output_fps,
    )?))
}

#[cfg(not(feature = "sink-ffmpeg"))]
fn build_mp4_encoder(
    settings: &EffectiveSettings,
    _metadata: &SourceMetadata,
) -> Result<Box<dyn FrameEncoder>, RunError> {
    Err(ConfigError::InvalidValue {
        field: "output",
        value: settings.output.display().to_string(),
        message: "mp4 output requires a build with the sink-ffmpeg feature".to_owned(),
    }
    .into())
}

fn print_available_backends() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    if names.is_empty() {
        println!("available backends: (none compiled)");
    } else {
        println!("available backends: {}", names.join(", "));
    }
}

fn print_maps() {
    println!("supported maps:");
    for map in MapId::ALL {
        println!("  {map}");
    }
}
