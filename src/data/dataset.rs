// ============================================================
// Layer 4 — Caption Dataset
// ============================================================
// Encoded (image, caption) samples ready for training.
//
// Each sample keeps the image path rather than pixels; images are
// decoded one at a time by the training loop. Training walks the
// samples cyclically, so iteration i uses sample (i - 1) % len.

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::caption::CaptionPair;
use crate::domain::vocabulary::Vocabulary;

/// One training example: an image and the word indices of one of
/// its captions, terminated by EOS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSample {
    pub image:      PathBuf,
    pub caption:    String,
    pub target_ids: Vec<usize>,
}

impl CaptionSample {
    /// Build a sample from an already-normalised pair.
    pub fn from_pair(pair: &CaptionPair, vocab: &Vocabulary) -> Self {
        Self {
            image:      pair.image.clone(),
            caption:    pair.caption.clone(),
            target_ids: vocab.encode(&pair.caption),
        }
    }

    /// Number of decoder steps this sample takes (words + EOS).
    pub fn target_len(&self) -> usize {
        self.target_ids.len()
    }
}

pub struct CaptionDataset {
    samples: Vec<CaptionSample>,
}

impl CaptionDataset {
    pub fn new(samples: Vec<CaptionSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// The sample used at training iteration `iteration` (1-based),
    /// cycling through the set.
    pub fn cyclic(&self, iteration: usize) -> Option<CaptionSample> {
        if self.samples.is_empty() {
            return None;
        }
        self.get(iteration.saturating_sub(1) % self.samples.len())
    }
}

impl Dataset<CaptionSample> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
