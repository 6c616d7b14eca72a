// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the raw Cornell corpus to padded tensor batches:
//
//   movie_lines.txt + movie_conversations.txt
//       │
//       ▼
//   corpus        → conversations → consecutive sentence pairs
//       │
//       ▼
//   formatted     → one `prompt [SEP] response` line per pair
//       │
//       ▼
//   normalizer    → lowercase ASCII, punctuation split off
//       │
//       ▼
//   dataset       → length filter, random batch sampling
//       │
//       ▼
//   batcher       → padded prompts/targets + target mask
//
// Reference: Burn Book §4 (Datasets and Batching)

/// Cornell movie-dialogue corpus parsing
pub mod corpus;

/// The intermediate one-pair-per-line file
pub mod formatted;

/// Unicode → ASCII sentence normalisation
pub mod normalizer;

/// Pair filtering and the in-memory dataset
pub mod dataset;

/// Padding, sorting and masking into tensor batches
pub mod batcher;
