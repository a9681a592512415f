use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormatArg {
    Png,
    Jpeg,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrBackendArg {
    Auto,
    Tesseract,
    Noop,
}

#[derive(Debug, Parser)]
#[command(
    name = "maplapse",
    about = "Extract map-overlay frames from gameplay recordings into a timestamped video",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Lock decoding to a specific backend implementation
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Map identifier to look for (see --list-maps)
    #[arg(short = 'm', long = "map")]
    pub map: Option<String>,

    /// Directory holding the reference map and warmup images
    #[arg(long = "assets-dir")]
    pub assets_dir: Option<PathBuf>,

    /// Output path: a directory for an image sequence, or an .mp4 file
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Image format for sequence output
    #[arg(long = "output-format", value_enum)]
    pub output_format: Option<OutputFormatArg>,

    /// Nominal frame rate of the assembled output
    #[arg(long = "output-fps", value_parser = clap::value_parser!(u32).range(1..))]
    pub output_fps: Option<u32>,

    /// Source milliseconds skipped ahead per cycle
    #[arg(long = "sample-step-ms", value_parser = clap::value_parser!(u64).range(1..))]
    pub sample_step_ms: Option<u64>,

    /// Good-match count the map template must exceed
    #[arg(long = "min-match-count")]
    pub min_match_count: Option<usize>,

    /// Good-match count the warmup marker must exceed
    #[arg(long = "warmup-min-match-count")]
    pub warmup_min_match_count: Option<usize>,

    /// Cycles between one-second clock decays
    #[arg(long = "decay-interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub decay_interval: Option<u64>,

    /// Cycles between direct OCR clock reads
    #[arg(long = "direct-read-interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub direct_read_interval: Option<u64>,

    /// Cycles between clock sanity checks
    #[arg(long = "sanity-interval", value_parser = clap::value_parser!(u64).range(1..))]
    pub sanity_interval: Option<u64>,

    /// Preferred OCR backend
    #[arg(long = "ocr-backend", value_enum)]
    pub ocr_backend: Option<OcrBackendArg>,

    /// Print the list of available decoding backends
    #[arg(long = "list-backends")]
    pub list_backends: bool,

    /// Print the supported map identifiers
    #[arg(long = "list-maps")]
    pub list_maps: bool,

    /// Input video path
    pub input: Option<PathBuf>,
}
