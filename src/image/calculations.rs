//! Pure dimension calculations for preset resizes.
//!
//! Nothing here touches pixels or the file system. Both fit modes follow a
//! never-enlarge policy: a source smaller than the preset bounds keeps its
//! native size.

use crate::models::{FitMode, Preset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Source already satisfies the preset; no resampling.
    Keep,
    /// Resize to exactly these dimensions (aspect already preserved).
    Scale { width: u32, height: u32 },
    /// Resize to cover the box, then centre-crop to it.
    Fill { width: u32, height: u32 },
}

impl ResizePlan {
    /// Output dimensions for a source of the given size.
    pub fn output_dimensions(self, source: (u32, u32)) -> (u32, u32) {
        match self {
            ResizePlan::Keep => source,
            ResizePlan::Scale { width, height } | ResizePlan::Fill { width, height } => {
                (width, height)
            }
        }
    }
}

pub fn plan_resize(source: (u32, u32), preset: &Preset) -> ResizePlan {
    match (preset.fit, preset.width, preset.height) {
        (FitMode::Cover, Some(width), Some(height)) => plan_cover(source, (width, height)),
        // Cover without both bounds has nothing to crop to.
        _ => plan_inside(source, preset.width, preset.height),
    }
}

/// Fit within the given bounds, preserving aspect ratio.
pub fn plan_inside(
    source: (u32, u32),
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> ResizePlan {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return ResizePlan::Keep;
    }

    let mut scale = 1.0_f64;
    if let Some(w) = max_width {
        scale = scale.min(w as f64 / src_w as f64);
    }
    if let Some(h) = max_height {
        scale = scale.min(h as f64 / src_h as f64);
    }

    if scale >= 1.0 {
        return ResizePlan::Keep;
    }

    let width = ((src_w as f64 * scale).round() as u32).clamp(1, src_w);
    let height = ((src_h as f64 * scale).round() as u32).clamp(1, src_h);

    if (width, height) == source {
        ResizePlan::Keep
    } else {
        ResizePlan::Scale { width, height }
    }
}

/// Fill the target box and crop, shrinking the box when the source is too
/// small to cover it at full size.
pub fn plan_cover(source: (u32, u32), target: (u32, u32)) -> ResizePlan {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w == 0 || src_h == 0 || tgt_w == 0 || tgt_h == 0 {
        return ResizePlan::Keep;
    }

    if src_w <= tgt_w && src_h <= tgt_h {
        return ResizePlan::Keep;
    }

    let k = (src_w as f64 / tgt_w as f64)
        .min(src_h as f64 / tgt_h as f64)
        .min(1.0);

    let width = ((tgt_w as f64 * k).round() as u32).clamp(1, src_w);
    let height = ((tgt_h as f64 * k).round() as u32).clamp(1, src_h);

    if (width, height) == source {
        ResizePlan::Keep
    } else {
        ResizePlan::Fill { width, height }
    }
}
