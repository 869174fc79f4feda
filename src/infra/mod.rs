// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by training and captioning:
//
//   checkpoint.rs  — decoder / attention weights (Burn
//                    CompactRecorder) and the TrainConfig JSON
//
//   vocab_store.rs — the vocabulary as a HuggingFace tokenizer
//                    file, so captioning decodes with exactly the
//                    indices training used
//
//   metrics.rs     — running loss averages and the loss-curve CSV
//
//   timing.rs      — "Xm Ys (- Xm Ys)" progress strings
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Decoder checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary persistence
pub mod vocab_store;

/// Loss tracking and loss-curve CSV
pub mod metrics;

/// Elapsed / remaining time formatting
pub mod timing;
