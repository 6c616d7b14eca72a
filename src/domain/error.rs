// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Most failures travel as anyhow::Error with context attached.
// The enums below exist for the cases a caller needs to tell
// apart: the chat loop recovers from VocabError::UnknownToken,
// and model construction or resuming reports ConfigError before
// any tensor is allocated.

use thiserror::Error;

/// Invalid model or training configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The attention scoring function is not one of dot/general/concat.
    #[error("'{0}' is not an appropriate attention method (expected dot, general or concat)")]
    UnknownAttentionMethod(String),

    /// The decoder is seeded from the encoder's final hidden states,
    /// so it cannot have more layers than the encoder has states.
    #[error("decoder has {decoder} layers but the encoder only provides {encoder_states} hidden states")]
    LayerMismatch {
        decoder:        usize,
        encoder_states: usize,
    },

    /// A numeric hyperparameter is outside its valid range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        name:   &'static str,
        reason: String,
    },

    /// A resumed run asks for a different model or vocabulary than
    /// the run it continues.
    #[error("cannot resume: {name} was {saved}, now {requested}")]
    ResumeMismatch {
        name:      &'static str,
        saved:     String,
        requested: String,
    },
}

/// Failures when mapping text to token ids.
#[derive(Debug, Error)]
pub enum VocabError {
    /// The input contains a word the vocabulary cannot represent.
    #[error("unknown token '{0}'")]
    UnknownToken(String),

    /// The underlying tokenizer failed.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

/// Malformed corpus input. Always fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("{file}:{line}: expected {expected} fields, found {found}")]
    MissingFields {
        file:     String,
        line:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("{file}:{line}: conversation references unknown line id '{id}'")]
    UnknownLineId {
        file: String,
        line: usize,
        id:   String,
    },

    #[error("{file}:{line}: expected exactly one '{marker}' separator")]
    MissingSeparator {
        file:   String,
        line:   usize,
        marker: &'static str,
    },
}
