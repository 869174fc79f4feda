// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Every network in the captioner lives here:
//
//   encoder.rs   — VGG-style convolutional encoder, frozen.
//                  Turns an image into a grid of feature vectors
//                  [batch, positions, channels]
//
//   attention.rs — Luong attention (dot / general / concat) over
//                  the feature grid, driven by the decoder state
//
//   decoder.rs   — Embedding + stacked LSTM + attention + output
//                  projection, one word per step
//
//   clipping.rs  — Global gradient-norm clipping over a module
//
//   trainer.rs   — Teacher-forcing training loop with gradient
//                  clipping, progress lines, loss curve, validation
//
//   captioner.rs — Greedy decoding of a single image
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Simonyan & Zisserman (2015) Very Deep Conv Networks

/// Frozen convolutional image encoder
pub mod encoder;

/// Attention over encoder feature positions
pub mod attention;

/// Attention LSTM decoder
pub mod decoder;

/// Gradient clipping across all parameters
pub mod clipping;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Greedy caption generation
pub mod captioner;
