// ============================================================
// Layer 3 — CaptionPair Domain Type
// ============================================================
// A caption corpus is a list of (image, sentence) pairs.
// Datasets such as Flickr8k describe each image with several
// captions, so the same image path appears in several pairs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One image and one human-written description of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionPair {
    /// Path to the image file on disk
    pub image: PathBuf,

    /// The caption text, exactly as it appeared in the corpus
    pub caption: String,
}

impl CaptionPair {
    pub fn new(image: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self {
            image:   image.into(),
            caption: caption.into(),
        }
    }

    /// Number of whitespace-separated words in the caption
    pub fn word_count(&self) -> usize {
        self.caption.split_whitespace().count()
    }
}
