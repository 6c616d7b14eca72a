// ============================================================
// Layer 6 — Vocabulary
// ============================================================
// Token text ↔ id mapping, backed by a HuggingFace tokenizer.
// Either a pretrained BERT WordPiece tokenizer or the word-level
// one built by TokenizerStore; both share BERT special-token ids.
//
//   [PAD]=0  [SOS]=1  [EOS]=2  [UNK]=100  [CLS]=101  [SEP]=102  [MASK]=103
//
// Encoding always adds [CLS] … [SEP] (the tokenizer's post-
// processor does that), so [CLS] doubles as the decoder's
// start-of-sequence token.

use anyhow::{Context, Result};
use std::path::Path;
use tokenizers::Tokenizer;

use crate::domain::error::VocabError;
use crate::domain::sentence_pair::{EncodedPair, SentencePair};

pub const PAD_ID:  u32 = 0;
pub const SOS_ID:  u32 = 1;
pub const EOS_ID:  u32 = 2;
pub const UNK_ID:  u32 = 100;
pub const CLS_ID:  u32 = 101;
pub const SEP_ID:  u32 = 102;
pub const MASK_ID: u32 = 103;

pub const PAD_TOKEN:  &str = "[PAD]";
pub const SOS_TOKEN:  &str = "[SOS]";
pub const EOS_TOKEN:  &str = "[EOS]";
pub const UNK_TOKEN:  &str = "[UNK]";
pub const CLS_TOKEN:  &str = "[CLS]";
pub const SEP_TOKEN:  &str = "[SEP]";
pub const MASK_TOKEN: &str = "[MASK]";

/// Immutable once training starts.
pub struct Vocabulary {
    name:      String,
    tokenizer: Tokenizer,
    unk_id:    u32,
}

impl Vocabulary {
    pub fn new(name: impl Into<String>, tokenizer: Tokenizer) -> Self {
        let unk_id = tokenizer.token_to_id(UNK_TOKEN).unwrap_or(UNK_ID);
        Self { name: name.into(), tokenizer, unk_id }
    }

    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))?;
        Ok(Self::new(name, tokenizer))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        self.tokenizer
            .save(path, true)
            .map_err(|e| anyhow::anyhow!("Cannot save tokenizer to '{}': {e}", path.display()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Embedding rows needed to cover every id (largest id + 1).
    pub fn size(&self) -> usize {
        self.tokenizer
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&id| id as usize + 1)
    }

    /// Ids for `text`, wrapped in [CLS] … [SEP]. Unknown words become [UNK].
    pub fn encode(&self, text: &str) -> Result<Vec<u32>, VocabError> {
        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| VocabError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Like `encode`, but fails on the first word that maps to [UNK].
    pub fn encode_strict(&self, text: &str) -> Result<Vec<u32>, VocabError> {
        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| VocabError::Tokenizer(e.to_string()))?;

        let unknown = encoding.get_ids().iter().position(|&id| id == self.unk_id);
        if let Some(i) = unknown {
            let (start, end) = encoding.get_offsets()[i];
            let word = text.get(start..end).unwrap_or(UNK_TOKEN);
            return Err(VocabError::UnknownToken(word.to_string()));
        }
        Ok(encoding.get_ids().to_vec())
    }

    pub fn encode_pair(&self, pair: &SentencePair) -> Result<EncodedPair, VocabError> {
        Ok(EncodedPair {
            prompt:   self.encode(&pair.prompt)?,
            response: self.encode(&pair.response)?,
        })
    }

    /// Text for `ids` with special tokens dropped.
    pub fn decode(&self, ids: &[u32]) -> Result<String, VocabError> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| VocabError::Tokenizer(e.to_string()))
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.tokenizer.id_to_token(id)
    }

    /// Raw token strings (WordPiece `##` pieces kept as-is).
    pub fn ids_to_tokens(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.id_to_token(id).unwrap_or_else(|| UNK_TOKEN.to_string()))
            .collect()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    pub fn pad_id(&self) -> u32 {
        self.token_to_id(PAD_TOKEN).unwrap_or(PAD_ID)
    }

    /// First decoder input for every sequence.
    pub fn start_token(&self) -> u32 {
        self.token_to_id(CLS_TOKEN).unwrap_or(CLS_ID)
    }

    /// Markers that never belong in a printed reply.
    pub fn is_special(&self, id: u32) -> bool {
        matches!(id, PAD_ID | SOS_ID | EOS_ID | CLS_ID | SEP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn vocab() -> (tempfile::TempDir, Vocabulary) {
        let dir = tempfile::tempdir().unwrap();
        let texts = vec![
            "hello there .".to_string(),
            "how are you ?".to_string(),
            "hello again !".to_string(),
        ];
        let tok = TokenizerStore::new(dir.path()).load_or_build(None, &texts, 1000).unwrap();
        (dir, Vocabulary::new("test", tok))
    }

    #[test]
    fn test_encode_wraps_in_cls_sep() {
        let (_dir, v) = vocab();
        let ids = v.encode("hello there").unwrap();
        assert_eq!(ids.first(), Some(&CLS_ID));
        assert_eq!(ids.last(), Some(&SEP_ID));
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_round_trip() {
        let (_dir, v) = vocab();
        for text in ["hello there .", "how are you ?", "you again !"] {
            let ids = v.encode(text).unwrap();
            assert_eq!(v.decode(&ids).unwrap(), text);
            let tokens = v.ids_to_tokens(&ids[1..ids.len() - 1]);
            assert_eq!(tokens.join(" "), text);
        }
    }

    #[test]
    fn test_encode_strict_reports_unknown_word() {
        let (_dir, v) = vocab();
        match v.encode_strict("hello zebra") {
            Err(VocabError::UnknownToken(w)) => assert_eq!(w, "zebra"),
            other => panic!("expected UnknownToken, got {other:?}"),
        }
        assert!(v.encode_strict("hello you").is_ok());
    }

    #[test]
    fn test_size_covers_largest_id() {
        let (_dir, v) = vocab();
        // 104 reserved slots plus the corpus words
        let words = ["hello", "there", ".", "how", "are", "you", "?", "again", "!"];
        assert_eq!(v.size(), 104 + words.len());
        for w in words {
            assert!((v.token_to_id(w).unwrap() as usize) < v.size());
        }
    }

    #[test]
    fn test_special_ids() {
        let (_dir, v) = vocab();
        assert_eq!(v.start_token(), CLS_ID);
        assert_eq!(v.pad_id(), PAD_ID);
        assert!(v.is_special(SEP_ID));
        assert!(!v.is_special(v.token_to_id("hello").unwrap()));
    }
}
