use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::{DynFrameSource, FrameError, FrameResult};

pub const DEFAULT_SAMPLE_STEP_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Ffmpeg,
}

impl FromStr for Backend {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "ffmpeg" => Ok(Backend::Ffmpeg),
            other => Err(FrameError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::Ffmpeg => "ffmpeg",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-ffmpeg")]
    {
        backends.push(Backend::Ffmpeg);
    }
    backends.push(Backend::Mock);
    backends
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    pub sample_step: Duration,
    pub channel_capacity: Option<NonZeroUsize>,
}

impl Default for Configuration {
    fn default() -> Self {
        let backend = compiled_backends()
            .into_iter()
            .next()
            .unwrap_or(Backend::Mock);
        Self {
            backend,
            input: None,
            sample_step: Duration::from_millis(DEFAULT_SAMPLE_STEP_MS),
            channel_capacity: None,
        }
    }
}

impl Configuration {
    pub fn from_env() -> FrameResult<Self> {
        let mut config = Configuration::default();
        if let Ok(backend) = env::var("MAPLAPSE_BACKEND") {
            config.backend = Backend::from_str(&backend)?;
        }
        if let Ok(path) = env::var("MAPLAPSE_INPUT") {
            config.input = Some(PathBuf::from(path));
        }
        if let Ok(step) = env::var("MAPLAPSE_SAMPLE_STEP_MS") {
            let parsed: u64 = step.parse().map_err(|_| {
                FrameError::configuration(format!(
                    "failed to parse MAPLAPSE_SAMPLE_STEP_MS='{step}' as a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(FrameError::configuration(
                    "MAPLAPSE_SAMPLE_STEP_MS must be greater than zero",
                ));
            }
            config.sample_step = Duration::from_millis(parsed);
        }
        Ok(config)
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    pub fn create_source(&self) -> FrameResult<DynFrameSource> {
        let channel_capacity = self.channel_capacity.map(NonZeroUsize::get);

        match self.backend {
            Backend::Mock => {
                crate::backends::mock::boxed_mock(self.sample_step, channel_capacity)
            }
            Backend::Ffmpeg => {
                #[cfg(feature = "backend-ffmpeg")]
                {
                    let path = self.input.clone().ok_or_else(|| {
                        FrameError::configuration("ffmpeg backend requires an input path")
                    })?;
                    return crate::backends::ffmpeg::boxed_ffmpeg(
                        path,
                        self.sample_step,
                        channel_capacity,
                    );
                }
                #[cfg(not(feature = "backend-ffmpeg"))]
                {
                    return Err(FrameError::unsupported("ffmpeg"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_round_trips_through_from_str() {
        assert_eq!(Backend::from_str("mock").unwrap(), Backend::Mock);
        assert_eq!(Backend::from_str("FFMPEG").unwrap(), Backend::Ffmpeg);
        assert!(Backend::from_str("gstreamer").is_err());
    }

    #[test]
    fn mock_backend_is_always_compiled() {
        assert!(Configuration::available_backends().contains(&Backend::Mock));
    }
}
