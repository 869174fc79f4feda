// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so a
// different corpus format (COCO json, a database, ...) can be
// plugged in by implementing CaptionSource.

use anyhow::Result;
use std::path::Path;

use crate::domain::caption::CaptionPair;

// ─── CaptionSource ────────────────────────────────────────────────────────────
/// Any component that can produce image/caption pairs.
///
/// Implementations:
///   - CaptionFileLoader → Flickr8k token file or `image,caption` CSV
pub trait CaptionSource {
    /// Load every available pair from this source.
    fn load_all(&self) -> Result<Vec<CaptionPair>>;
}

// ─── ImageCaptioner ───────────────────────────────────────────────────────────
/// Any component that can describe an image in words.
///
/// Implementations:
///   - CaptionUseCase → encoder + attention decoder, greedy decoding
pub trait ImageCaptioner {
    /// Produce a caption for the image stored at `image`.
    fn caption(&self, image: &Path) -> Result<String>;
}
