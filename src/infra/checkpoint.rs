// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores decoder weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. decoder_params    — every decoder parameter (embedding,
//                          LSTM stack, attention, feature
//                          projection, output layer)
//   2. attention_params  — the attention module on its own
//   3. train_config.json — the TrainConfig the run used
//
// The encoder is never saved: it is frozen, so its weights are
// whatever `--encoder-weights` pointed at, recorded in the config.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::attention::Attention;
use crate::ml::decoder::DecoderRnn;

const DECODER_FILE:   &str = "decoder_params";
const ATTENTION_FILE: &str = "attention_params";
const CONFIG_FILE:    &str = "train_config.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write decoder and attention parameters, replacing earlier ones.
    pub fn save_decoder<B: Backend>(&self, decoder: &DecoderRnn<B>) -> Result<()> {
        let recorder = CompactRecorder::new();

        let path = self.dir.join(DECODER_FILE);
        recorder
            .record(decoder.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save decoder to '{}'", path.display()))?;

        let path = self.dir.join(ATTENTION_FILE);
        recorder
            .record(decoder.attention.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save attention to '{}'", path.display()))?;

        tracing::debug!("Saved decoder checkpoint to '{}'", self.dir.display());
        Ok(())
    }

    /// Load saved parameters into `decoder`, which must have been
    /// built from the same DecoderConfig.
    pub fn load_decoder<B: Backend>(
        &self,
        decoder: DecoderRnn<B>,
        device:  &B::Device,
    ) -> Result<DecoderRnn<B>> {
        let path   = self.dir.join(DECODER_FILE);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load decoder '{}'. Have you trained the model first?", path.display())
            })?;
        Ok(decoder.load_record(record))
    }

    pub fn load_attention<B: Backend>(
        &self,
        attention: Attention<B>,
        device:    &B::Device,
    ) -> Result<Attention<B>> {
        let path   = self.dir.join(ATTENTION_FILE);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load attention '{}'", path.display()))?;
        Ok(attention.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'caption'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}
