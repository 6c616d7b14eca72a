// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to pair sources and responders
// through these traits and never sees file formats or tensors.

use anyhow::Result;
use crate::domain::sentence_pair::SentencePair;

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Any component that can produce sentence pairs.
///
/// Implementations:
///   - CornellCorpus      → raw movie_lines / movie_conversations files
///   - FormattedPairFile  → the one-pair-per-line intermediate file
pub trait PairSource {
    /// Load every pair this source holds.
    fn load_pairs(&self) -> Result<Vec<SentencePair>>;
}

// ─── Responder ────────────────────────────────────────────────────────────────
/// Any component that answers a line of dialogue.
///
/// Implementations:
///   - ChatUseCase → greedy decoding with the trained seq2seq model
pub trait Responder {
    /// Produce the reply to `prompt`.
    fn respond(&self, prompt: &str) -> Result<String>;
}
