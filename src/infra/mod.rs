// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by training and chat:
//
//   tokenizer_store.rs — where the tokenizer comes from (run dir,
//                        pretrained file, or built from pairs)
//   vocabulary.rs      — id ↔ token mapping over that tokenizer
//   checkpoint.rs      — directory bundles of weights, optimiser
//                        state, vocabulary and metadata
//   metrics.rs         — progress rows appended to metrics.csv

/// Tokenizer loading, building, and saving
pub mod tokenizer_store;

/// Token ↔ id mapping and special tokens
pub mod vocabulary;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
