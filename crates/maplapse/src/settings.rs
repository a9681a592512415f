use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use maplapse_decoder::Backend;
use maplapse_detector::{DetectorConfig, MapId, MatcherParams};
use maplapse_sink::{OutputFormat, StampStyle};

use crate::cli::{CliArgs, OcrBackendArg, OutputFormatArg};
use crate::pipeline::EngineConfig;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    backend: Option<String>,
    map: Option<String>,
    input: Option<String>,
    assets_dir: Option<String>,
    output: Option<String>,
    output_format: Option<String>,
    jpeg_quality: Option<u8>,
    output_fps: Option<u32>,
    sample_step_ms: Option<u64>,
    min_match_count: Option<usize>,
    warmup_min_match_count: Option<usize>,
    decay_interval: Option<u64>,
    direct_read_interval: Option<u64>,
    sanity_interval: Option<u64>,
    ocr_backend: Option<String>,
    matcher: Option<MatcherFileConfig>,
    stamp: Option<StampFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct MatcherFileConfig {
    fast_threshold: Option<u8>,
    trees: Option<usize>,
    checks: Option<usize>,
    ratio: Option<f32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct StampFileConfig {
    x: Option<u32>,
    y: Option<u32>,
    scale: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackendChoice {
    Auto,
    Tesseract,
    Noop,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config file {path} does not exist")]
    NotFound { path: PathBuf },
    #[error("invalid value '{value}' for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        value: String,
        message: String,
    },
    #[error("no map selected; pass --map (see --list-maps)")]
    MissingMap,
    #[error("no input file selected")]
    MissingInput,
    #[error("no map or input file selected; pass --map and an input path")]
    MissingMapAndInput,
}

/// Merged view of CLI arguments over the optional TOML config file over the
/// built-in defaults. CLI always wins.
#[derive(Debug)]
pub struct EffectiveSettings {
    pub backend: Option<Backend>,
    pub map: Option<MapId>,
    pub input: Option<PathBuf>,
    pub assets_dir: PathBuf,
    pub output: PathBuf,
    pub output_format: OutputFormat,
    pub output_fps: u32,
    pub detector: DetectorConfig,
    pub engine: EngineConfig,
    pub stamp: StampStyle,
    pub ocr_backend: OcrBackendChoice,
}

impl EffectiveSettings {
    /// Operator-surface validation: both selections must exist before a run
    /// starts, and the combined omission gets its own message.
    pub fn require_run_inputs(&self) -> Result<(MapId, PathBuf), ConfigError> {
        match (self.map, self.input.clone()) {
            (Some(map), Some(input)) => Ok((map, input)),
            (None, Some(_)) => Err(ConfigError::MissingMap),
            (Some(_), None) => Err(ConfigError::MissingInput),
            (None, None) => Err(ConfigError::MissingMapAndInput),
        }
    }
}

pub fn load_settings(args: &CliArgs) -> Result<EffectiveSettings, ConfigError> {
    let file = load_file_config(args.config.as_deref())?;
    merge(args, file)
}

fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Some(path.to_path_buf())
        }
        None => ProjectDirs::from("", "", "maplapse")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists()),
    };

    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

fn merge(args: &CliArgs, file: FileConfig) -> Result<EffectiveSettings, ConfigError> {
    let backend = match args.backend.as_deref().or(file.backend.as_deref()) {
        Some(name) => Some(Backend::from_str(name).map_err(|err| ConfigError::InvalidValue {
            field: "backend",
            value: name.to_owned(),
            message: err.to_string(),
        })?),
        None => None,
    };

    let map = match args.map.as_deref().or(file.map.as_deref()) {
        Some(name) => Some(MapId::from_str(name).map_err(|err| ConfigError::InvalidValue {
            field: "map",
            value: name.to_owned(),
            message: err.to_string(),
        })?),
        None => None,
    };

    let input = args
        .input
        .clone()
        .or_else(|| file.input.as_deref().map(PathBuf::from));

    let output_format = match args.output_format {
        Some(OutputFormatArg::Png) => OutputFormat::Png,
        Some(OutputFormatArg::Jpeg) => OutputFormat::Jpeg {
            quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        },
        None => match file.output_format.as_deref() {
            None | Some("png") => OutputFormat::Png,
            Some("jpeg") | Some("jpg") => OutputFormat::Jpeg {
                quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "output_format",
                    value: other.to_owned(),
                    message: "expected 'png' or 'jpeg'".to_owned(),
                });
            }
        },
    };

    let ocr_backend = match args.ocr_backend {
        Some(OcrBackendArg::Auto) => OcrBackendChoice::Auto,
        Some(OcrBackendArg::Tesseract) => OcrBackendChoice::Tesseract,
        Some(OcrBackendArg::Noop) => OcrBackendChoice::Noop,
        None => match file.ocr_backend.as_deref() {
            None | Some("auto") => OcrBackendChoice::Auto,
            Some("tesseract") => OcrBackendChoice::Tesseract,
            Some("noop") => OcrBackendChoice::Noop,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "ocr_backend",
                    value: other.to_owned(),
                    message: "expected 'auto', 'tesseract' or 'noop'".to_owned(),
                });
            }
        },
    };

    let mut matcher = MatcherParams::default();
    if let Some(cfg) = file.matcher.clone() {
        if let Some(value) = cfg.fast_threshold {
            matcher.fast_threshold = value;
        }
        if let Some(value) = cfg.trees {
            matcher.trees = value;
        }
        if let Some(value) = cfg.checks {
            matcher.checks = value;
        }
        if let Some(value) = cfg.ratio {
            matcher.ratio = value;
        }
    }

    let mut detector = DetectorConfig {
        matcher,
        ..DetectorConfig::default()
    };
    if let Some(value) = args.min_match_count.or(file.min_match_count) {
        detector.min_match_count = value;
    }
    if let Some(value) = args
        .warmup_min_match_count
        .or(file.warmup_min_match_count)
    {
        detector.warmup_min_match_count = value;
    }

    let mut engine = EngineConfig {
        matcher,
        ..EngineConfig::default()
    };
    if let Some(ms) = args.sample_step_ms.or(file.sample_step_ms) {
        engine.sample_step = Duration::from_millis(ms.max(1));
    }
    if let Some(value) = args.decay_interval.or(file.decay_interval) {
        engine.decay_interval = value.max(1);
    }
    if let Some(value) = args.direct_read_interval.or(file.direct_read_interval) {
        engine.direct_read_interval = value.max(1);
    }
    if let Some(value) = args.sanity_interval.or(file.sanity_interval) {
        engine.sanity_interval = value.max(1);
    }

    let mut stamp = StampStyle::default();
    if let Some(cfg) = file.stamp {
        if let Some(x) = cfg.x {
            stamp.x = x;
        }
        if let Some(y) = cfg.y {
            stamp.y = y;
        }
        if let Some(scale) = cfg.scale {
            stamp.scale = scale;
        }
    }

    Ok(EffectiveSettings {
        backend,
        map,
        input,
        assets_dir: args
            .assets_dir
            .clone()
            .or_else(|| file.assets_dir.as_deref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
        output: args
            .output
            .clone()
            .or_else(|| file.output.as_deref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        output_format,
        output_fps: args
            .output_fps
            .or(file.output_fps)
            .unwrap_or(maplapse_sink::DEFAULT_OUTPUT_FPS),
        detector,
        engine,
        stamp,
        ocr_backend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("maplapse").chain(argv.iter().copied()))
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let settings = merge(&args(&[]), FileConfig::default()).unwrap();
        assert_eq!(settings.assets_dir, PathBuf::from("assets"));
        assert_eq!(settings.output, PathBuf::from("output"));
        assert_eq!(settings.detector.min_match_count, 1000);
        assert_eq!(settings.detector.warmup_min_match_count, 30);
        assert_eq!(settings.engine.sample_step, Duration::from_millis(500));
        assert_eq!(settings.engine.decay_interval, 2);
        assert_eq!(settings.engine.direct_read_interval, 5);
        assert_eq!(settings.engine.sanity_interval, 120);
        assert_eq!(settings.ocr_backend, OcrBackendChoice::Auto);
    }

    #[test]
    fn cli_overrides_file_values() {
        let file = FileConfig {
            map: Some("FOY".to_owned()),
            sample_step_ms: Some(1000),
            ..FileConfig::default()
        };
        let settings = merge(&args(&["--map", "utah", "--sample-step-ms", "250"]), file).unwrap();
        assert_eq!(settings.map, Some(MapId::Utah));
        assert_eq!(settings.engine.sample_step, Duration::from_millis(250));
    }

    #[test]
    fn unknown_map_is_a_configuration_error() {
        let result = merge(&args(&["--map", "MOON_BASE"]), FileConfig::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn missing_selections_are_reported_distinctly() {
        let neither = merge(&args(&[]), FileConfig::default()).unwrap();
        assert!(matches!(
            neither.require_run_inputs(),
            Err(ConfigError::MissingMapAndInput)
        ));

        let no_input = merge(&args(&["--map", "FOY"]), FileConfig::default()).unwrap();
        assert!(matches!(
            no_input.require_run_inputs(),
            Err(ConfigError::MissingInput)
        ));

        let no_map = merge(&args(&["clip.mp4"]), FileConfig::default()).unwrap();
        assert!(matches!(
            no_map.require_run_inputs(),
            Err(ConfigError::MissingMap)
        ));
    }

    #[test]
    fn matcher_table_feeds_both_detector_and_engine() {
        let file = FileConfig {
            matcher: Some(MatcherFileConfig {
                checks: Some(80),
                ..MatcherFileConfig::default()
            }),
            ..FileConfig::default()
        };
        let settings = merge(&args(&[]), file).unwrap();
        assert_eq!(settings.detector.matcher.checks, 80);
        assert_eq!(settings.engine.matcher.checks, 80);
    }
}
