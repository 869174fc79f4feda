// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Persists the caption vocabulary as a HuggingFace tokenizer JSON
// (WordLevel model) so training and captioning agree on every
// word index, and the file can be opened by any `tokenizers`
// consumer.
//
// The JSON is written by hand rather than through a trainer: the
// vocabulary is already built (Layer 3) and its index order must be
// preserved exactly.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::vocabulary::{Vocabulary, EOS_TOKEN, EOS_WORD, SOS_TOKEN, SOS_WORD, UNK_TOKEN, UNK_WORD};

const VOCAB_FILE: &str = "tokenizer.json";

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn save(&self, vocab: &Vocabulary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut words = serde_json::Map::new();
        for (word, index) in vocab.entries() {
            words.insert(word.to_string(), serde_json::json!(index));
        }

        let special = |id: usize, content: &str| {
            serde_json::json!({
                "id": id, "content": content, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            })
        };

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                special(SOS_TOKEN, SOS_WORD),
                special(EOS_TOKEN, EOS_WORD),
                special(UNK_TOKEN, UNK_WORD),
            ],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": words,
                "unk_token": UNK_WORD
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;

        tracing::info!("Vocabulary of {} words saved to '{}'", vocab.n_words(), path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Vocabulary> {
        let tokenizer = self.load_tokenizer()?;
        let vocab = Vocabulary::from_indices(
            tokenizer
                .get_vocab(true)
                .into_iter()
                .map(|(word, id)| (word, id as usize)),
        );
        tracing::debug!("Loaded vocabulary of {} words", vocab.n_words());
        Ok(vocab)
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load vocabulary from '{}': {}", path.display(), e)
        })
    }
}
