// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load image/caption pairs   (Layer 4 - data)
//   Step 2: Normalise captions         (Layer 4 - data)
//   Step 3: Drop over-long captions    (Layer 4 - data)
//   Step 4: Build + save vocabulary    (Layer 3 + 6)
//   Step 5: Encode training samples    (Layer 4 - data)
//   Step 6: Split train/validation     (Layer 4 - data)
//   Step 7: Save config                (Layer 6 - infra)
//   Step 8: Run training loop          (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{CaptionDataset, CaptionSample},
    loader::CaptionFileLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{caption::CaptionPair, traits::CaptionSource, vocabulary::Vocabulary};
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::{
    attention::AttentionMethod,
    decoder::DecoderConfig,
    encoder::VggArch,
    trainer::{run_training, TrainingSummary},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved as train_config.json next to the checkpoint so `caption`
// can rebuild exactly the same encoder and decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub captions_file:         String,
    pub images_dir:            String,
    pub checkpoint_dir:        String,
    pub iterations:            usize,
    pub learning_rate:         f64,
    pub grad_clip:             f64,
    pub teacher_forcing_ratio: f64,
    pub dropout:               f64,
    pub n_layers:              usize,
    pub hidden_size:           usize,
    pub attention:             AttentionMethod,
    pub print_every:           usize,
    pub plot_every:            usize,
    /// 0 = save only once training finishes
    pub save_every:            usize,
    pub image_size:            usize,
    pub encoder:               VggArch,
    pub encoder_weights:       Option<String>,
    pub max_caption_len:       usize,
    pub min_word_count:        usize,
    pub train_fraction:        f64,
    pub seed:                  u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            captions_file:         "data/captions.txt".to_string(),
            images_dir:            "data/images".to_string(),
            checkpoint_dir:        "checkpoints".to_string(),
            iterations:            50_000,
            learning_rate:         1e-4,
            grad_clip:             0.5,
            teacher_forcing_ratio: 0.5,
            dropout:               0.05,
            n_layers:              2,
            hidden_size:           128,
            attention:             AttentionMethod::General,
            print_every:           100,
            plot_every:            200,
            save_every:            0,
            image_size:            224,
            encoder:               VggArch::Vgg16,
            encoder_weights:       None,
            max_caption_len:       20,
            min_word_count:        1,
            train_fraction:        0.9,
            seed:                  42,
        }
    }
}

impl TrainConfig {
    pub fn decoder_config(&self, vocab_size: usize, feature_dim: usize) -> DecoderConfig {
        DecoderConfig::new(vocab_size, self.hidden_size, feature_dim)
            .with_n_layers(self.n_layers)
            .with_dropout(self.dropout)
            .with_attention(self.attention)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Load image/caption pairs ─────────────────────────────────
        tracing::info!("Loading captions from '{}'", cfg.captions_file);
        let loader = CaptionFileLoader::new(&cfg.captions_file, &cfg.images_dir);
        let pairs  = loader.load_all()?;
        tracing::info!("Loaded {} image/caption pairs", pairs.len());

        // ── Step 2 + 3: Normalise and filter ──────────────────────────────────
        let pairs = prepare_pairs(pairs, cfg.max_caption_len);
        if pairs.is_empty() {
            bail!(
                "No usable captions in '{}' (max caption length {})",
                cfg.captions_file,
                cfg.max_caption_len
            );
        }
        tracing::info!("Kept {} pairs after normalisation", pairs.len());

        // ── Step 4: Vocabulary ────────────────────────────────────────────────
        let vocab = build_vocabulary(&pairs, cfg.min_word_count);
        tracing::info!("Vocabulary: {} words", vocab.n_words());
        VocabStore::new(&cfg.checkpoint_dir).save(&vocab)?;

        // ── Step 5: Encode samples ────────────────────────────────────────────
        let samples: Vec<CaptionSample> = pairs
            .iter()
            .map(|pair| CaptionSample::from_pair(pair, &vocab))
            .collect();

        // ── Step 6: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, cfg.train_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 7: Save config for captioning ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;

        // ── Step 8: Run training loop (Layer 5) ───────────────────────────────
        run_training(
            cfg,
            vocab.n_words(),
            CaptionDataset::new(train_samples),
            CaptionDataset::new(val_samples),
            ckpt_manager,
        )
    }
}

/// Normalise every caption and drop those that are empty or whose
/// target (words + EOS) would exceed `max_len` decoder steps.
pub fn prepare_pairs(pairs: Vec<CaptionPair>, max_len: usize) -> Vec<CaptionPair> {
    let preprocessor = Preprocessor::new();
    pairs
        .into_iter()
        .map(|pair| CaptionPair {
            caption: preprocessor.clean(&pair.caption),
            ..pair
        })
        .filter(|pair| {
            let words = pair.word_count();
            words > 0 && words < max_len
        })
        .collect()
}

pub fn build_vocabulary(pairs: &[CaptionPair], min_word_count: usize) -> Vocabulary {
    let mut vocab = Vocabulary::new();
    for pair in pairs {
        vocab.add_sentence(&pair.caption);
    }
    if min_word_count > 1 {
        let before = vocab.n_words();
        vocab = vocab.trimmed(min_word_count);
        tracing::info!(
            "Trimmed vocabulary from {} to {} words (min count {})",
            before,
            vocab.n_words(),
            min_word_count
        );
    }
    vocab
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::UNK_TOKEN;

    #[test]
    fn test_prepare_normalises_and_filters() {
        let pairs = vec![
            CaptionPair::new("a.jpg", "A Dog's running!"),
            CaptionPair::new("b.jpg", "   "),
            CaptionPair::new("c.jpg", "one two three four five"),
        ];
        let kept = prepare_pairs(pairs, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].caption, "a dog s running");
    }

    #[test]
    fn test_vocabulary_trimming() {
        let pairs = vec![
            CaptionPair::new("a.jpg", "a dog runs"),
            CaptionPair::new("b.jpg", "a dog sits"),
        ];
        let vocab = build_vocabulary(&pairs, 2);
        assert_eq!(vocab.n_words(), 5); // sos eos unk a dog
        assert_eq!(vocab.index_of("runs"), UNK_TOKEN);
        assert_ne!(vocab.index_of("dog"), UNK_TOKEN);
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg = TrainConfig {
            attention: AttentionMethod::Concat,
            encoder:   VggArch::Vgg19,
            encoder_weights: Some("weights/vgg19".into()),
            ..TrainConfig::default()
        };
        let json   = serde_json::to_string(&cfg).unwrap();
        let parsed: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.attention, AttentionMethod::Concat);
        assert_eq!(parsed.encoder, VggArch::Vgg19);
        assert_eq!(parsed.encoder_weights.as_deref(), Some("weights/vgg19"));
        assert!(json.contains("\"concat\""));
    }

    #[test]
    fn test_decoder_config_follows_train_config() {
        let cfg = TrainConfig { n_layers: 3, hidden_size: 32, ..TrainConfig::default() };
        let dc  = cfg.decoder_config(100, 512);
        assert_eq!(dc.n_layers, 3);
        assert_eq!(dc.hidden_size, 32);
        assert_eq!(dc.feature_dim, 512);
        assert_eq!(dc.attention, AttentionMethod::General);
    }

    #[test]
    fn test_execute_fails_without_captions_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            captions_file:  dir.path().join("missing.txt").to_string_lossy().into_owned(),
            images_dir:     dir.path().to_string_lossy().into_owned(),
            checkpoint_dir: dir.path().join("ckpt").to_string_lossy().into_owned(),
            ..TrainConfig::default()
        };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }
}
