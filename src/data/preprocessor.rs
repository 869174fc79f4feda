// ============================================================
// Layer 4 — Caption Preprocessor
// ============================================================
// Normalises raw captions before they reach the vocabulary.
//
// Corpus captions are inconsistent in case and punctuation:
//   "A dog runs ."   "a dog, running!"   "A  dog\truns"
// should all become the same word sequence, otherwise the
// vocabulary fills up with near-duplicates like "dog," and "dog".
//
// Cleaning steps (applied in order):
//   1. Lowercase
//   2. Every character that is not alphanumeric becomes a space,
//      apostrophes included: "dog's" → "dog s"
//   3. Collapse runs of whitespace into one space and trim

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalise one caption into space-separated lowercase words.
    pub fn clean(&self, text: &str) -> String {
        let mapped: String = text
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
