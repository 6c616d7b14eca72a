use burn::data::dataset::Dataset;
use rand::Rng;

use crate::domain::sentence_pair::SentencePair;

/// True iff both sides have fewer than `max_length` words.
pub fn keep_pair(pair: &SentencePair, max_length: usize) -> bool {
    let (prompt_words, response_words) = pair.word_counts();
    prompt_words < max_length && response_words < max_length
}

/// Drop every pair with `max_length` or more words on either side.
pub fn filter_pairs(pairs: Vec<SentencePair>, max_length: usize) -> Vec<SentencePair> {
    let before = pairs.len();
    let kept: Vec<SentencePair> = pairs
        .into_iter()
        .filter(|p| keep_pair(p, max_length))
        .collect();
    tracing::info!(
        "Trimmed to {} sentence pairs (from {}, max_length={})",
        kept.len(), before, max_length,
    );
    kept
}

/// The filtered training pairs. Batches are drawn uniformly at
/// random with replacement.
pub struct PairDataset {
    pairs: Vec<SentencePair>,
}

impl PairDataset {
    pub fn new(pairs: Vec<SentencePair>) -> Self { Self { pairs } }

    pub fn pair_count(&self) -> usize { self.pairs.len() }

    /// Draw `batch_size` random indices. Returns an empty list for an
    /// empty dataset.
    pub fn sample_indices<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<usize> {
        if self.pairs.is_empty() {
            return Vec::new();
        }
        (0..batch_size).map(|_| rng.gen_range(0..self.pairs.len())).collect()
    }

    /// Fetch the pairs at `indices`, in order.
    pub fn pairs_at(&self, indices: &[usize]) -> Vec<SentencePair> {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }

    /// Every prompt and response, for building a vocabulary.
    pub fn texts(&self) -> Vec<String> {
        self.pairs
            .iter()
            .flat_map(|p| [p.prompt.clone(), p.response.clone()])
            .collect()
    }
}

impl Dataset<SentencePair> for PairDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
