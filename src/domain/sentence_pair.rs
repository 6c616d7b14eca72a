// ============================================================
// Layer 3 — SentencePair Domain Type
// ============================================================
// One conversational exchange: a line of dialogue (the prompt)
// and the line that answered it (the response).
//
// Pairs start life as raw corpus text, are normalised when the
// formatted file is read back, and are finally tokenised into
// an EncodedPair just before batching.
//
// Example:
//   prompt:   "can we make this quick ?"
//   response: "well i thought we d start with pronunciation ."

use serde::{Deserialize, Serialize};

/// A (prompt, response) pair of dialogue lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    /// The line the model reads
    pub prompt: String,

    /// The line the model learns to produce
    pub response: String,
}

impl SentencePair {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt:   prompt.into(),
            response: response.into(),
        }
    }

    /// Word counts of (prompt, response), split on single spaces.
    ///
    /// Normalised text has exactly one space between words, so this
    /// is the word count used by the length filter.
    pub fn word_counts(&self) -> (usize, usize) {
        (
            self.prompt.split(' ').count(),
            self.response.split(' ').count(),
        )
    }
}

/// A sentence pair after tokenisation. Both sides carry the
/// tokenizer's special tokens (`[CLS] … [SEP]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPair {
    pub prompt:   Vec<u32>,
    pub response: Vec<u32>,
}
