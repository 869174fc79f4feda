// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional word <-> index mapping built from the
// normalised caption corpus.
//
// Index layout:
//   0 → <sos>   first decoder input of every sequence
//   1 → <eos>   appended to every target, stops decoding
//   2 → <unk>   any word missing from the vocabulary
//   3.. → corpus words in order of first appearance
//
// Every encoded caption ends with EOS, so a target sequence
// is never empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SOS_TOKEN: usize = 0;
pub const EOS_TOKEN: usize = 1;
pub const UNK_TOKEN: usize = 2;

pub const SOS_WORD: &str = "<sos>";
pub const EOS_WORD: &str = "<eos>";
pub const UNK_WORD: &str = "<unk>";

const RESERVED: [&str; 3] = [SOS_WORD, EOS_WORD, UNK_WORD];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    word2index: HashMap<String, usize>,
    word2count: HashMap<String, usize>,
    index2word: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    /// An empty vocabulary holding only the reserved tokens.
    pub fn new() -> Self {
        let index2word: Vec<String> = RESERVED.iter().map(|w| w.to_string()).collect();
        let word2index = index2word
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self {
            word2index,
            word2count: HashMap::new(),
            index2word,
        }
    }

    /// Rebuild a vocabulary from an index table, e.g. one read back
    /// from disk. Indices must be dense; gaps are filled with `<unk>`.
    pub fn from_indices(words: impl IntoIterator<Item = (String, usize)>) -> Self {
        let mut vocab = Self::new();
        for (word, index) in words {
            if index >= vocab.index2word.len() {
                vocab.index2word.resize(index + 1, UNK_WORD.to_string());
            }
            vocab.index2word[index] = word.clone();
            vocab.word2index.insert(word, index);
        }
        vocab
    }

    pub fn add_sentence(&mut self, sentence: &str) {
        for word in sentence.split_whitespace() {
            self.add_word(word);
        }
    }

    pub fn add_word(&mut self, word: &str) {
        if RESERVED.contains(&word) {
            return;
        }
        *self.word2count.entry(word.to_string()).or_insert(0) += 1;
        if !self.word2index.contains_key(word) {
            self.word2index.insert(word.to_string(), self.index2word.len());
            self.index2word.push(word.to_string());
        }
    }

    /// A copy that keeps only words seen at least `min_count` times.
    /// Surviving words are re-indexed in their original order.
    pub fn trimmed(&self, min_count: usize) -> Self {
        let mut out = Self::new();
        for word in self.index2word.iter().skip(RESERVED.len()) {
            let count = self.count(word);
            if count >= min_count {
                out.word2index.insert(word.clone(), out.index2word.len());
                out.index2word.push(word.clone());
                out.word2count.insert(word.clone(), count);
            }
        }
        out
    }

    /// Word indices of `sentence` followed by EOS.
    pub fn encode(&self, sentence: &str) -> Vec<usize> {
        sentence
            .split_whitespace()
            .map(|w| self.index_of(w))
            .chain(std::iter::once(EOS_TOKEN))
            .collect()
    }

    /// Words for `ids`, stopping at the first EOS. SOS is skipped.
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .take_while(|&&id| id != EOS_TOKEN)
            .filter(|&&id| id != SOS_TOKEN)
            .map(|&id| self.word(id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn index_of(&self, word: &str) -> usize {
        self.word2index.get(word).copied().unwrap_or(UNK_TOKEN)
    }

    pub fn word(&self, index: usize) -> &str {
        self.index2word
            .get(index)
            .map(String::as_str)
            .unwrap_or(UNK_WORD)
    }

    pub fn count(&self, word: &str) -> usize {
        self.word2count.get(word).copied().unwrap_or(0)
    }

    /// Vocabulary size including the reserved tokens.
    pub fn n_words(&self) -> usize {
        self.index2word.len()
    }

    /// All (word, index) entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index2word.iter().enumerate().map(|(i, w)| (w.as_str(), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tokens() {
        let v = Vocabulary::new();
        assert_eq!(v.n_words(), 3);
        assert_eq!(v.index_of("<sos>"), SOS_TOKEN);
        assert_eq!(v.index_of("<eos>"), EOS_TOKEN);
        assert_eq!(v.word(UNK_TOKEN), "<unk>");
    }

    #[test]
    fn test_words_indexed_in_order_of_appearance() {
        let mut v = Vocabulary::new();
        v.add_sentence("a dog runs");
        v.add_sentence("a cat sits");
        assert_eq!(v.index_of("a"), 3);
        assert_eq!(v.index_of("dog"), 4);
        assert_eq!(v.index_of("cat"), 6);
        assert_eq!(v.count("a"), 2);
        assert_eq!(v.n_words(), 8);
    }

    #[test]
    fn test_encode_appends_eos_and_maps_unknown() {
        let mut v = Vocabulary::new();
        v.add_sentence("a dog");
        assert_eq!(v.encode("a dog"), vec![3, 4, EOS_TOKEN]);
        assert_eq!(v.encode("a zebra"), vec![3, UNK_TOKEN, EOS_TOKEN]);
        assert_eq!(v.encode(""), vec![EOS_TOKEN]);
    }

    #[test]
    fn test_decode_stops_at_eos() {
        let mut v = Vocabulary::new();
        v.add_sentence("a dog runs");
        let text = v.decode(&[SOS_TOKEN, 3, 4, EOS_TOKEN, 5]);
        assert_eq!(text, "a dog");
    }

    #[test]
    fn test_trimmed_drops_rare_words() {
        let mut v = Vocabulary::new();
        v.add_sentence("a dog");
        v.add_sentence("a cat");
        let t = v.trimmed(2);
        assert_eq!(t.n_words(), 4);
        assert_eq!(t.index_of("a"), 3);
        assert_eq!(t.index_of("dog"), UNK_TOKEN);
    }

    #[test]
    fn test_from_indices_restores_mapping() {
        let mut v = Vocabulary::new();
        v.add_sentence("two birds fly");
        let entries: Vec<(String, usize)> =
            v.entries().map(|(w, i)| (w.to_string(), i)).collect();
        let restored = Vocabulary::from_indices(entries);
        assert_eq!(restored.n_words(), v.n_words());
        assert_eq!(restored.encode("birds fly"), v.encode("birds fly"));
    }

    #[test]
    fn test_reserved_words_are_not_counted() {
        let mut v = Vocabulary::new();
        v.add_sentence("<eos> dog");
        assert_eq!(v.n_words(), 4);
        assert_eq!(v.count("<eos>"), 0);
    }
}
