// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns the raw Cornell corpus into the formatted pair file:
//
//   Step 1: Parse movie_lines.txt + movie_conversations.txt
//   Step 2: Extract consecutive-utterance pairs
//   Step 3: Write one `prompt <d> [SEP] <d> response` per line

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    corpus::CornellCorpus,
    formatted::{unescape_delimiter, write_formatted},
};
use crate::domain::traits::PairSource;

pub const DEFAULT_OUTPUT_FILE: &str = "formatted_movie_lines.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Directory with movie_lines.txt and movie_conversations.txt
    pub corpus_dir:  String,
    /// Defaults to `{corpus_dir}/formatted_movie_lines.txt`
    pub output_file: Option<String>,
    /// May contain escapes such as `\t`
    pub delimiter:   String,
}

impl PrepareConfig {
    pub fn output_path(&self) -> PathBuf {
        match &self.output_file {
            Some(path) => PathBuf::from(path),
            None       => PathBuf::from(&self.corpus_dir).join(DEFAULT_OUTPUT_FILE),
        }
    }
}

pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Returns the output path and the number of pairs written.
    pub fn execute(&self) -> Result<(PathBuf, usize)> {
        let cfg = &self.config;

        // ── Step 1 + 2: Parse and pair ────────────────────────────────────────
        let corpus = CornellCorpus::new(&cfg.corpus_dir);
        let pairs  = corpus.load_pairs()?;
        tracing::info!("Extracted {} sentence pairs", pairs.len());

        // ── Step 3: Write ─────────────────────────────────────────────────────
        let output    = cfg.output_path();
        let delimiter = unescape_delimiter(&cfg.delimiter);
        tracing::info!("Writing newly formatted file to '{}'", output.display());
        write_formatted(&output, &pairs, &delimiter)?;

        Ok((output, pairs.len()))
    }
}
