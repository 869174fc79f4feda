// ============================================================
// Layer 4 — Caption File Loader
// ============================================================
// Reads the caption index of a captioning corpus and resolves
// every image name against the images directory.
//
// Two line formats are understood:
//
//   Flickr8k token file (Flickr8k.token.txt):
//     1000268201_693b08cb0e.jpg#0<TAB>A child in a pink dress ...
//
//   CSV (Kaggle Flickr8k captions.txt):
//     image,caption
//     1000268201_693b08cb0e.jpg,A child in a pink dress ...
//
// In the CSV form only the first comma separates the columns,
// captions themselves may contain commas.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::caption::CaptionPair;
use crate::domain::traits::CaptionSource;

pub struct CaptionFileLoader {
    /// Path to the caption index file
    captions_file: PathBuf,
    /// Directory that image names are relative to
    images_dir: PathBuf,
}

impl CaptionFileLoader {
    pub fn new(captions_file: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            captions_file: captions_file.into(),
            images_dir:    images_dir.into(),
        }
    }
}

impl CaptionSource for CaptionFileLoader {
    fn load_all(&self) -> Result<Vec<CaptionPair>> {
        let text = fs::read_to_string(&self.captions_file).with_context(|| {
            format!("Cannot read caption file '{}'", self.captions_file.display())
        })?;

        let mut pairs   = Vec::new();
        let mut missing = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            let Some((image, caption)) = parse_line(line) else {
                if !line.trim().is_empty() && !is_csv_header(line) {
                    tracing::debug!("Skipping malformed line {}: '{}'", line_no + 1, line);
                }
                continue;
            };

            let path = self.images_dir.join(image);
            if !path.exists() {
                missing += 1;
                continue;
            }
            pairs.push(CaptionPair::new(path, caption));
        }

        if missing > 0 {
            tracing::warn!(
                "Skipped {} captions whose image is missing from '{}'",
                missing,
                self.images_dir.display()
            );
        }
        tracing::info!(
            "Loaded {} caption pairs from '{}'",
            pairs.len(),
            self.captions_file.display()
        );
        Ok(pairs)
    }
}

fn is_csv_header(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("image,caption")
}

/// Split one index line into (image name, caption).
/// Returns None for blank lines, the CSV header, and lines
/// without a caption column.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || is_csv_header(line) {
        return None;
    }

    let (image, caption) = match line.split_once('\t') {
        // "name.jpg#3" → "name.jpg"
        Some((key, caption)) => (key.split('#').next().unwrap_or(key), caption),
        None => line.split_once(',')?,
    };

    let image   = image.trim();
    let caption = caption.trim();
    if image.is_empty() || caption.is_empty() {
        return None;
    }
    Some((image, caption))
}

/// Resolve a user-supplied path to an absolute one for messages.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_format_strips_caption_number() {
        let parsed = parse_line("1000_abc.jpg#2\tA dog runs .");
        assert_eq!(parsed, Some(("1000_abc.jpg", "A dog runs .")));
    }

    #[test]
    fn test_parse_csv_keeps_commas_in_caption() {
        let parsed = parse_line("x.jpg,A man, a plan, a canal");
        assert_eq!(parsed, Some(("x.jpg", "A man, a plan, a canal")));
    }

    #[test]
    fn test_parse_skips_header_and_blank() {
        assert_eq!(parse_line("image,caption"), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("x.jpg,"), None);
    }

    #[test]
    fn test_load_all_skips_missing_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"not really a jpeg").unwrap();
        let index = dir.path().join("captions.txt");
        fs::write(
            &index,
            "image,caption\na.jpg,A cat sleeps\nb.jpg,A dog barks\na.jpg,A cat on a bed\n",
        )
        .unwrap();

        let loader = CaptionFileLoader::new(&index, dir.path());
        let pairs  = loader.load_all().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].image, dir.path().join("a.jpg"));
        assert_eq!(pairs[1].caption, "A cat on a bed");
    }

    #[test]
    fn test_missing_index_file_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let loader = CaptionFileLoader::new(dir.path().join("nope.txt"), dir.path());
        assert!(loader.load_all().is_err());
    }
}
