// ============================================================
// Layer 4 — Text Normaliser
// ============================================================
// Reduces a line of movie dialogue to the small alphabet the
// model is trained on.
//
// Steps (applied in order):
//   1. Lowercase and trim
//   2. Unicode NFD decomposition, then drop combining marks
//      ("café" → "cafe")
//   3. Put a space in front of every '.', '!' and '?'
//   4. Replace every run of other non-letters with a space
//   5. Collapse runs of whitespace into one space
//
// Step 2 reuses the normalisers that ship with the tokenizers
// crate so the corpus and the tokenizer agree on accents.
// Steps 3-5 are regex substitutions compiled once per normaliser.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tokenizers::normalizers::{strip::StripAccents, unicode::NFD};
use tokenizers::{NormalizedString, Normalizer};

pub struct TextNormalizer {
    punctuation: Regex,
    non_letters: Regex,
    whitespace:  Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            punctuation: Regex::new(r"([.!?])").context("Failed to compile punctuation regex")?,
            non_letters: Regex::new(r"[^a-zA-Z.!?]+").context("Failed to compile letter regex")?,
            whitespace:  Regex::new(r"\s+").context("Failed to compile whitespace regex")?,
        })
    }

    /// Normalise one line of dialogue.
    pub fn normalize(&self, text: &str) -> Result<String> {
        // ── Step 1: lowercase + trim ──────────────────────────────────────────
        let lowered = text.to_lowercase();

        // ── Step 2: strip accents ─────────────────────────────────────────────
        let mut normalized = NormalizedString::from(lowered.trim());
        NFD.normalize(&mut normalized)
            .map_err(|e| anyhow!("NFD normalisation failed: {e}"))?;
        StripAccents.normalize(&mut normalized)
            .map_err(|e| anyhow!("Accent stripping failed: {e}"))?;

        // ── Steps 3-5: punctuation, letters, whitespace ───────────────────────
        let spaced  = self.punctuation.replace_all(normalized.get(), " $1");
        let letters = self.non_letters.replace_all(&spaced, " ");
        let single  = self.whitespace.replace_all(&letters, " ");

        Ok(single.trim().to_string())
    }
}
