// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Decides where the vocabulary comes from and keeps a copy of
// it as `tokenizer.json` in the run directory:
//
//   1. run dir already has tokenizer.json  → load it (resume)
//   2. a pretrained tokenizer.json is given → load it, copy it in
//   3. otherwise                           → build a word-level
//      tokenizer from the training pairs and save it
//
// The built tokenizer mirrors BERT's conventions: special tokens
// at BERT ids, corpus words from id 104 upward, and a
// BertProcessing post-processor that wraps every sequence in
// [CLS] … [SEP].
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the JSON is written by hand and
// loaded back instead of going through a trainer.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

use crate::infra::vocabulary::{
    CLS_ID, CLS_TOKEN, EOS_ID, EOS_TOKEN, MASK_ID, MASK_TOKEN, PAD_ID, PAD_TOKEN,
    SEP_ID, SEP_TOKEN, SOS_ID, SOS_TOKEN, UNK_ID, UNK_TOKEN,
};

/// First id handed to a corpus word.
pub const FIRST_WORD_ID: usize = 104;

const SPECIAL_TOKENS: [(&str, u32); 7] = [
    (PAD_TOKEN,  PAD_ID),
    (SOS_TOKEN,  SOS_ID),
    (EOS_TOKEN,  EOS_ID),
    (UNK_TOKEN,  UNK_ID),
    (CLS_TOKEN,  CLS_ID),
    (SEP_TOKEN,  SEP_ID),
    (MASK_TOKEN, MASK_ID),
];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load the run's tokenizer, else a pretrained one, else build from `texts`.
    pub fn load_or_build(
        &self,
        pretrained: Option<&Path>,
        texts:      &[String],
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        let tok_path = self.path();
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from '{}'", tok_path.display());
            return load(&tok_path);
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        if let Some(path) = pretrained {
            tracing::info!("Loading pretrained tokenizer from '{}'", path.display());
            let tokenizer = load(path)?;
            tokenizer
                .save(&tok_path, true)
                .map_err(|e| anyhow::anyhow!("Cannot copy tokenizer to '{}': {e}", tok_path.display()))?;
            return Ok(tokenizer);
        }

        tracing::info!("Building word-level tokenizer (vocab_size={})", vocab_size);
        self.build_and_save(texts, vocab_size)
    }

    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        // ── Step 1: Word frequencies ──────────────────────────────────────────
        // Texts are already normalized, so punctuation arrives as its own word.
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties alphabetical so ids are reproducible
        let mut words: Vec<(&str, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(vocab_size.saturating_sub(FIRST_WORD_ID));

        // ── Step 2: Vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        let mut next_id = FIRST_WORD_ID;
        for (word, _) in &words {
            if !vocab.contains_key(*word) {
                vocab.insert(word.to_string(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .map(|(token, id)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: Tokenizer JSON in HuggingFace format ──────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "BertProcessing",
                "sep": [SEP_TOKEN, SEP_ID],
                "cls": [CLS_TOKEN, CLS_ID]
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", tok_path.display()))?;

        tracing::info!(
            "Tokenizer built with {} corpus words, saved to '{}'",
            next_id - FIRST_WORD_ID,
            tok_path.display()
        );

        load(&tok_path)
    }
}

fn load(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let texts = vec!["b a a .".to_string(), "c a b".to_string()];

        let built = store.load_or_build(None, &texts, 1000).unwrap();
        assert!(store.path().exists());
        // most frequent word gets the first id
        assert_eq!(built.token_to_id("a"), Some(104));
        assert_eq!(built.token_to_id("b"), Some(105));

        // second call loads the saved file even with different texts
        let reloaded = store.load_or_build(None, &["zzz".to_string()], 1000).unwrap();
        assert_eq!(reloaded.token_to_id("a"), Some(104));
        assert_eq!(reloaded.token_to_id("zzz"), None);
    }

    #[test]
    fn test_vocab_size_caps_words() {
        let dir = tempfile::tempdir().unwrap();
        let texts = vec!["a a a b b c".to_string()];
        let tok = TokenizerStore::new(dir.path()).load_or_build(None, &texts, 106).unwrap();
        assert!(tok.token_to_id("a").is_some());
        assert!(tok.token_to_id("b").is_some());
        assert!(tok.token_to_id("c").is_none());
    }

    #[test]
    fn test_pretrained_is_copied_into_run_dir() {
        let src = tempfile::tempdir().unwrap();
        let pretrained = TokenizerStore::new(src.path())
            .load_or_build(None, &["hi there".to_string()], 1000)
            .unwrap();
        drop(pretrained);

        let run = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(run.path());
        let tok = store
            .load_or_build(Some(&src.path().join("tokenizer.json")), &[], 1000)
            .unwrap();
        assert!(store.path().exists());
        assert!(tok.token_to_id("there").is_some());
    }
}
