//! Error types for the inspection pipeline

use rigscan_advisory::AdvisoryError;
use rigscan_graph::GraphError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] rigscan_core::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported sensor file format: {0}")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("advisory error: {0}")]
    Advisory(#[from] AdvisoryError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
