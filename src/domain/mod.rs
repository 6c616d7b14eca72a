// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing the chatbot's data.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - NO tokenizer types

// A prompt/response pair of dialogue lines
pub mod sentence_pair;

// Typed errors callers match on
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
