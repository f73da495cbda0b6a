//! Image derivation
//!
//! Resizes and re-encodes a source file into preset artifacts and the LQIP
//! placeholder. Every call reports its own outcome, so one failed preset
//! never stops its siblings.

pub mod calculations;
pub mod encode;
pub mod lqip;
pub mod mock;
pub mod processor;

pub use lqip::LqipSettings;
pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::models::{LqipResult, Preset, ProcessingResult};
use crate::presets::DEFAULT_PRESET;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn transform(
        &self,
        source: &Path,
        preset: &Preset,
        output_dir: &Path,
        base_name: &str,
    ) -> ProcessingResult;

    async fn generate_lqip(&self, source: &Path, output_dir: &Path, base_name: &str) -> LqipResult;
}

/// `<base>.<ext>` for the default preset, `<base>-<preset>.<ext>` otherwise.
pub fn output_file_name(base_name: &str, preset: &Preset) -> String {
    if preset.name == DEFAULT_PRESET {
        format!("{}.{}", base_name, preset.format.extension())
    } else {
        format!("{}-{}.{}", base_name, preset.name, preset.format.extension())
    }
}

pub fn output_path(output_dir: &Path, base_name: &str, preset: &Preset) -> PathBuf {
    output_dir.join(output_file_name(base_name, preset))
}

/// `(<base>-lqip.webp, <base>-lqip.txt)`
pub fn lqip_paths(output_dir: &Path, base_name: &str) -> (PathBuf, PathBuf) {
    (
        output_dir.join(format!("{}-lqip.webp", base_name)),
        output_dir.join(format!("{}-lqip.txt", base_name)),
    )
}

/// Write through a `.part` sibling so a failed write never leaves a
/// truncated artifact at the final path.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = std::fs::write(&part, bytes).and_then(|_| std::fs::rename(&part, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&part);
    }
    written
}
