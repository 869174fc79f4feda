// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the corpus on disk and the tensors the
// model consumes:
//
//   caption index file + images directory
//       │
//       ▼
//   CaptionFileLoader → (image path, raw caption) pairs
//       │
//       ▼
//   Preprocessor      → lowercase, punctuation-free captions
//       │
//       ▼
//   Vocabulary        → word indices + EOS        (Layer 3)
//       │
//       ▼
//   CaptionDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   image_loader     → [1, 3, H, W] normalised pixels per step
//
// Reference: Burn Book §4 (Datasets)

/// Reads Flickr8k-style caption index files
pub mod loader;

/// Normalises caption text
pub mod preprocessor;

/// Decodes and normalises images into encoder input tensors
pub mod image_loader;

/// Implements Burn's Dataset trait for caption samples
pub mod dataset;

/// Seeded shuffle and train/validation split
pub mod splitter;
