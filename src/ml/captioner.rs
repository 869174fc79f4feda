// ============================================================
// Layer 5 — Captioner
// ============================================================
// Greedy decoding with the trained decoder:
//
//   image ─► Encoder ─► features ─► project once
//   SOS ─► step ─► argmax ─► step ─► argmax ─► ... until EOS
//                                                or max_len words
//
// The attention weights of every step are kept so callers can show
// which image region each word looked at.
use anyhow::{bail, Result};
use burn::prelude::*;
use std::path::Path;

use crate::data::image_loader::load_image;
use crate::domain::vocabulary::{Vocabulary, EOS_TOKEN, SOS_TOKEN};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::decoder::DecoderRnn;
use crate::ml::encoder::{build_encoder, Encoder, EncoderConfig};
use crate::ml::trainer::token_input;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCaption {
    /// Predicted word indices, ending with EOS unless max_len was hit
    pub token_ids: Vec<usize>,
    /// One row of attention weights per predicted word
    pub attention: Vec<Vec<f32>>,
}

impl GeneratedCaption {
    pub fn reached_eos(&self) -> bool {
        self.token_ids.last() == Some(&EOS_TOKEN)
    }
}

pub fn greedy_decode<B: Backend>(
    decoder:  &DecoderRnn<B>,
    features: Tensor<B, 3>,
    max_len:  usize,
) -> Result<GeneratedCaption> {
    let [batch, _, _] = features.dims();
    if batch != 1 {
        bail!("Greedy decoding takes one image at a time, got a batch of {batch}");
    }

    let device = features.device();
    let maps   = decoder.project_features(features);

    let mut state = decoder.init_state(1, &device);
    let mut input = token_input::<B>(SOS_TOKEN, &device);
    let mut out   = GeneratedCaption { token_ids: Vec::new(), attention: Vec::new() };

    for _ in 0..max_len {
        let step = decoder.step(input, state, maps.clone());
        state = step.state;

        let weights: Vec<f32> = step
            .attention
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow::anyhow!("Cannot read attention weights: {e:?}"))?;
        out.attention.push(weights);

        let predicted = step.log_probs.argmax(1);
        let word = predicted.clone().into_scalar().elem::<i64>() as usize;
        out.token_ids.push(word);
        if word == EOS_TOKEN {
            break;
        }
        input = predicted;
    }

    Ok(out)
}

/// Index of the image position with the largest attention weight.
pub fn strongest_region(weights: &[f32]) -> Option<usize> {
    weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

pub struct Captioner<B: Backend> {
    encoder:    Encoder<B>,
    decoder:    DecoderRnn<B>,
    vocab:      Vocabulary,
    image_size: usize,
    max_len:    usize,
    device:     B::Device,
}

impl<B: Backend> Captioner<B> {
    pub fn new(
        encoder:    Encoder<B>,
        decoder:    DecoderRnn<B>,
        vocab:      Vocabulary,
        image_size: usize,
        max_len:    usize,
        device:     B::Device,
    ) -> Self {
        Self { encoder, decoder, vocab, image_size, max_len, device }
    }

    /// Rebuild encoder and decoder from a training run's checkpoint
    /// directory. `vocab` must be the vocabulary saved by that run.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        vocab:        Vocabulary,
        device:       B::Device,
    ) -> Result<Self> {
        let cfg = ckpt_manager.load_config()?;

        let encoder = build_encoder::<B>(
            cfg.encoder,
            cfg.encoder_weights.as_deref().map(Path::new),
            &device,
        )?;
        let feature_dim = EncoderConfig::vgg(cfg.encoder).feature_dim();

        let decoder: DecoderRnn<B> = cfg.decoder_config(vocab.n_words(), feature_dim).init(&device);
        let mut decoder = ckpt_manager.load_decoder(decoder, &device)?;
        decoder.attention = ckpt_manager.load_attention(decoder.attention, &device)?;
        tracing::info!("Decoder loaded from '{}'", ckpt_manager.dir().display());

        Ok(Self::new(encoder, decoder, vocab, cfg.image_size, cfg.max_caption_len, device))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn describe(&self, image: &Path) -> Result<GeneratedCaption> {
        let images   = load_image::<B>(image, self.image_size, &self.device)?;
        let features = self.encoder.forward(images);
        greedy_decode(&self.decoder, features, self.max_len)
    }

    /// Caption text for `image`, without SOS/EOS markers.
    pub fn caption_text(&self, image: &Path) -> Result<String> {
        let generated = self.describe(image)?;
        if !generated.reached_eos() {
            tracing::debug!("Caption hit the {} word limit before EOS", self.max_len);
        }
        Ok(self.vocab.decode(&generated.token_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::decoder::DecoderConfig;
    use burn::backend::NdArray;
    use image::{ImageBuffer, Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn decoder(device: &<TestBackend as Backend>::Device) -> DecoderRnn<TestBackend> {
        DecoderConfig::new(6, 8, 4).with_dropout(0.0).init(device)
    }

    #[test]
    fn test_decode_respects_max_len() {
        let device   = Default::default();
        let decoder  = decoder(&device);
        let features = Tensor::<TestBackend, 3>::ones([1, 3, 4], &device);

        let out = greedy_decode(&decoder, features, 5).unwrap();
        assert!(!out.token_ids.is_empty());
        assert!(out.token_ids.len() <= 5);
        assert_eq!(out.attention.len(), out.token_ids.len());
        if out.token_ids.len() < 5 {
            assert!(out.reached_eos());
        }
    }

    #[test]
    fn test_attention_rows_are_distributions() {
        let device   = Default::default();
        let decoder  = decoder(&device);
        let features = Tensor::<TestBackend, 3>::random(
            [1, 3, 4], burn::tensor::Distribution::Default, &device,
        );

        let out = greedy_decode(&decoder, features, 4).unwrap();
        for row in &out.attention {
            assert_eq!(row.len(), 3);
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_decode_rejects_batches() {
        let device   = Default::default();
        let decoder  = decoder(&device);
        let features = Tensor::<TestBackend, 3>::ones([2, 3, 4], &device);
        assert!(greedy_decode(&decoder, features, 3).is_err());
    }

    #[test]
    fn test_strongest_region() {
        assert_eq!(strongest_region(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(strongest_region(&[]), None);
    }

    #[test]
    fn test_caption_text_from_image() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();

        let path = dir.path().join("dog.png");
        let img: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([30, 90, 200]));
        img.save(&path).unwrap();

        let mut vocab = Vocabulary::new();
        vocab.add_sentence("a dog");
        vocab.add_sentence("grass");
        assert_eq!(vocab.n_words(), 6);

        let encoder   = EncoderConfig::new(vec![vec![4], vec![4]]).init::<TestBackend>(&device);
        let captioner = Captioner::new(encoder, decoder(&device), vocab, 8, 4, device);

        let text = captioner.caption_text(&path).unwrap();
        assert!(!text.contains("<sos>"));
        assert!(!text.contains("<eos>"));
        assert!(text.split_whitespace().count() <= 4);
    }

    #[test]
    fn test_from_checkpoint_restores_decoder() {
        use crate::application::train_use_case::TrainConfig;
        use crate::ml::encoder::VggArch;

        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let mut vocab = Vocabulary::new();
        vocab.add_sentence("a dog");
        let cfg = TrainConfig {
            encoder:     VggArch::Vgg11,
            hidden_size: 8,
            n_layers:    1,
            image_size:  32,
            ..TrainConfig::default()
        };
        let feature_dim = EncoderConfig::vgg(cfg.encoder).feature_dim();
        let trained: DecoderRnn<TestBackend> =
            cfg.decoder_config(vocab.n_words(), feature_dim).init(&device);
        ckpt.save_config(&cfg).unwrap();
        ckpt.save_decoder(&trained).unwrap();

        let captioner = Captioner::<TestBackend>::from_checkpoint(&ckpt, vocab, device).unwrap();
        let weights = |d: &DecoderRnn<TestBackend>| -> Vec<f32> {
            d.out.weight.val().into_data().to_vec().unwrap()
        };
        assert_eq!(weights(&captioner.decoder), weights(&trained));
        assert_eq!(captioner.image_size, 32);
    }

    #[test]
    fn test_missing_image_fails() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();

        let encoder   = EncoderConfig::new(vec![vec![4]]).init::<TestBackend>(&device);
        let captioner = Captioner::new(encoder, decoder(&device), Vocabulary::new(), 8, 4, device);
        assert!(captioner.describe(&dir.path().join("nope.png")).is_err());
    }
}
