// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for each command:
//
//   prepare — raw corpus → formatted pair file
//   train   — formatted pairs → vocabulary → trained checkpoints
//   chat    — checkpoint → interactive greedy replies
//
// No tensor math lives here; this layer only wires data, ml
// and infra together and picks the burn backend.

/// Corpus → formatted pair file
pub mod prepare_use_case;

/// The training workflow
pub mod train_use_case;

/// The interactive chat workflow
pub mod chat_use_case;
