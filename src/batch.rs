//! Raw image discovery and request building for batch runs.
//!
//! Raw inputs live at `<raw_dir>/<postId>/<file>` and derive into
//! `<public_dir>/<postId>/`. Cover images get the full preset family and an
//! LQIP; everything else gets the default preset only.

use crate::pipeline::{PresetSelection, SourceRequest};
use crate::source::has_image_extension;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File stems that mark a post's cover image.
pub const COVER_STEMS: &[&str] = &["portada", "cover"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub post_id: String,
    pub path: PathBuf,
    pub base_name: String,
    pub is_cover: bool,
}

impl RawImage {
    pub fn from_path(post_id: &str, path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_string();
        let is_cover = COVER_STEMS.iter().any(|c| stem.eq_ignore_ascii_case(c));

        Some(Self {
            post_id: post_id.to_string(),
            path: path.to_path_buf(),
            base_name: stem,
            is_cover,
        })
    }

    pub fn to_request(&self, public_dir: &Path, force: bool) -> SourceRequest {
        let selection = if self.is_cover {
            PresetSelection::Essential
        } else {
            PresetSelection::Default
        };

        SourceRequest::new(
            &self.path.to_string_lossy(),
            &public_dir.join(&self.post_id),
            &self.base_name,
        )
        .with_presets(selection)
        .with_force(force)
        .with_lqip(self.is_cover)
    }
}

/// List raw images, optionally scoped to one post, in path order.
pub fn discover(raw_dir: &Path, post_id: Option<&str>) -> Result<Vec<RawImage>> {
    let post_dirs: Vec<(String, PathBuf)> = match post_id {
        Some(id) => {
            let dir = raw_dir.join(id);
            if !dir.is_dir() {
                return Err(Error::InvalidSource(format!(
                    "no raw image directory for post '{}' at {}",
                    id,
                    dir.display()
                )));
            }
            vec![(id.to_string(), dir)]
        }
        None => {
            if !raw_dir.is_dir() {
                warn!("Raw image directory {} does not exist", raw_dir.display());
                return Ok(Vec::new());
            }
            let mut dirs = Vec::new();
            for entry in std::fs::read_dir(raw_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        dirs.push((name.to_string(), path.clone()));
                    }
                }
            }
            dirs
        }
    };

    let mut images = scan_posts(post_dirs);
    images.sort_by(|a, b| a.path.cmp(&b.path));
    warn_on_shared_base_names(&images);
    Ok(images)
}

/// Image files directly inside each post directory. A post that cannot be
/// read is logged and skipped.
fn scan_posts(post_dirs: Vec<(String, PathBuf)>) -> Vec<RawImage> {
    let mut images = Vec::new();
    for (id, dir) in post_dirs {
        match scan_post(&id, &dir) {
            Ok(found) => images.extend(found),
            Err(e) => warn!("Skipping post '{}' at {}: {}", id, dir.display(), e),
        }
    }
    images
}

fn scan_post(post_id: &str, dir: &Path) -> Result<Vec<RawImage>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(has_image_extension);
        if !is_image {
            debug!("Ignoring {}", path.display());
            continue;
        }
        if let Some(image) = RawImage::from_path(post_id, &path) {
            images.push(image);
        }
    }
    Ok(images)
}

// Same stem in one post means same output files; the pipeline keeps the first.
fn warn_on_shared_base_names(images: &[RawImage]) {
    let mut seen: HashMap<(&str, &str), &Path> = HashMap::new();
    for image in images {
        let key = (image.post_id.as_str(), image.base_name.as_str());
        match seen.get(&key) {
            Some(first) => warn!(
                "{} shares its output name with {}; only the first is rendered",
                image.path.display(),
                first.display()
            ),
            None => {
                seen.insert(key, &image.path);
            }
        }
    }
}

/// Request for an explicit `--file`; the post id is the parent directory name.
pub fn request_for_file(path: &Path, public_dir: &Path, force: bool) -> Result<SourceRequest> {
    let post_id = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Error::InvalidSource(format!("cannot infer post id from {}", path.display()))
        })?;

    let image = RawImage::from_path(post_id, path)
        .ok_or_else(|| Error::InvalidSource(format!("invalid file name: {}", path.display())))?;

    Ok(image.to_request(public_dir, force))
}

/// Request for a remote cover image.
pub fn request_for_url(
    url: &str,
    post_id: &str,
    base_name: &str,
    public_dir: &Path,
    force: bool,
) -> SourceRequest {
    SourceRequest::new(url, &public_dir.join(post_id), base_name)
        .with_presets(PresetSelection::Essential)
        .with_force(force)
        .with_lqip(true)
}
