use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to load template {path}: {message}")]
    TemplateLoad { path: PathBuf, message: String },

    #[error("template '{name}' produced no descriptors; the reference image is too flat to match")]
    EmptyTemplate { name: String },

    #[error("unknown map identifier '{value}'; expected one of: {expected}")]
    UnknownMap { value: String, expected: String },
}

impl DetectorError {
    pub fn template_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TemplateLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}
