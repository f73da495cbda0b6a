//! Image derivation pipeline for portfolio posts.
//!
//! Turns raw images (local files or allow-listed remote URLs) into a family
//! of resized, re-encoded variants plus a blurred low-quality placeholder,
//! skipping work whose outputs are already newer than their source.

pub mod batch;
pub mod cache;
pub mod cleanup;
pub mod download;
pub mod error;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod presets;
pub mod source;

pub use error::{Error, Result};
