//! Error handling and custom error types
//!
//! Provides unified error handling across the pipeline using thiserror.
//! Component boundaries turn these into result records; inside a component
//! they propagate with `?`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("LQIP generation failed: {0}")]
    Lqip(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;
