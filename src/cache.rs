//! Modification-time cache guard.
//!
//! An artifact is regenerated only when it is missing, older than its
//! source, or the caller forces it. Re-running with unchanged sources writes
//! nothing.

use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn should_regenerate(source: &Path, output: &Path, force: bool) -> bool {
    if force {
        return true;
    }

    let Some(output_mtime) = modified(output) else {
        return true;
    };

    // An unreadable source is left for the transformer to report.
    let Some(source_mtime) = modified(source) else {
        return true;
    };

    let stale = source_mtime > output_mtime;
    if !stale {
        debug!("{} is current, skipping", output.display());
    }
    stale
}

/// Both LQIP sidecars exist and the placeholder is not older than the source.
pub fn lqip_is_current(source: &Path, webp: &Path, txt: &Path, force: bool) -> bool {
    txt.exists() && !should_regenerate(source, webp, force)
}

pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
