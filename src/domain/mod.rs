// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe captioning data:
// image/caption pairs, the word vocabulary, and the
// abstraction over where caption pairs come from.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One image paired with one caption
pub mod caption;

// Word <-> index mapping with reserved SOS / EOS / UNK tokens
pub mod vocabulary;

// Core abstractions (traits) that other layers implement
pub mod traits;
