// ============================================================
// Layer 2 — CaptionUseCase
// ============================================================
// Loads a trained run from its checkpoint directory and captions
// single images:
//
//   Step 1: Validate the image path
//   Step 2: Load vocabulary            (Layer 6 - infra)
//   Step 3: Rebuild encoder + decoder  (Layer 5 - ml)
//   Step 4: Greedy decode              (Layer 5 - ml)

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::data::loader::absolute;
use crate::domain::traits::ImageCaptioner;
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::captioner::{strongest_region, Captioner};

type InferBackend = burn::backend::Wgpu;

/// One caption word and the feature-grid cell it attended to most.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendedWord {
    pub word:   String,
    /// Row-major index into the encoder's feature grid
    pub region: Option<usize>,
    pub weight: f32,
}

/// Absolute form of `path`, or the user-facing error when nothing
/// exists there.
pub fn validate_path(path: &Path) -> Result<PathBuf> {
    let abs = absolute(path);
    if !abs.exists() {
        bail!(
            "Path '{}' does not exist. Please provide a valid image path to annotate.",
            abs.display()
        );
    }
    Ok(abs)
}

pub struct CaptionUseCase {
    captioner: Captioner<InferBackend>,
}

impl CaptionUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(checkpoint_dir)?;
        let vocab        = VocabStore::new(ckpt_manager.dir()).load()?;
        let device       = burn::backend::wgpu::WgpuDevice::default();
        let captioner    = Captioner::from_checkpoint(&ckpt_manager, vocab, device)?;
        Ok(Self { captioner })
    }

    /// Caption words paired with their most attended grid cell.
    pub fn attended_words(&self, image: &Path) -> Result<Vec<AttendedWord>> {
        let image     = validate_path(image)?;
        let generated = self.captioner.describe(&image)?;
        let vocab     = self.captioner.vocab();

        Ok(attended_words(&generated.token_ids, &generated.attention, |id| {
            vocab.word(id).to_string()
        }))
    }
}

impl ImageCaptioner for CaptionUseCase {
    fn caption(&self, image: &Path) -> Result<String> {
        let image = validate_path(image)?;
        tracing::info!("Captioning '{}'", image.display());
        self.captioner.caption_text(&image)
    }
}

/// Pair each predicted word (EOS excluded) with its attention row.
fn attended_words(
    token_ids: &[usize],
    attention: &[Vec<f32>],
    word:      impl Fn(usize) -> String,
) -> Vec<AttendedWord> {
    use crate::domain::vocabulary::EOS_TOKEN;

    token_ids
        .iter()
        .zip(attention)
        .take_while(|(&id, _)| id != EOS_TOKEN)
        .map(|(&id, weights)| {
            let region = strongest_region(weights);
            AttendedWord {
                word:   word(id),
                region,
                weight: region.map(|i| weights[i]).unwrap_or(0.0),
            }
        })
        .collect()
}
