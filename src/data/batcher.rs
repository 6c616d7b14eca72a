// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Turns a list of tokenised sentence pairs into the padded
// tensors the encoder and decoder consume.
//
// Steps:
//   1. Sort pairs by prompt length, longest first
//   2. Right-pad prompts with PAD, remember true lengths
//   3. Right-pad responses with PAD
//   4. Build the response mask: true on real tokens only
//
// Shapes (batch-first):
//   prompts  [batch, max_prompt_len]   Int
//   targets  [batch, max_target_len]   Int
//   mask     [batch, max_target_len]   Bool
//
// Invariant: mask.sum() == Σ response lengths.

use burn::prelude::*;

use crate::domain::sentence_pair::EncodedPair;

/// One training batch.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Prompt token ids — [batch, max_prompt_len], sorted by length desc
    pub prompts: Tensor<B, 2, Int>,

    /// True prompt lengths, same order as `prompts`
    pub prompt_lengths: Vec<usize>,

    /// Response token ids — [batch, max_target_len]
    pub targets: Tensor<B, 2, Int>,

    /// true = real response token, false = padding
    pub mask: Tensor<B, 2, Bool>,

    /// Longest response in the batch; the decoder runs this many steps
    pub max_target_len: usize,
}

/// Row-major padded id matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Padded {
    pub flat:    Vec<i32>,
    pub lengths: Vec<usize>,
    pub max_len: usize,
}

/// Right-pad every sequence to the longest one with `pad`.
pub fn zero_pad(seqs: &[Vec<u32>], pad: u32) -> Padded {
    let lengths: Vec<usize> = seqs.iter().map(Vec::len).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);

    let mut flat = Vec::with_capacity(seqs.len() * max_len);
    for seq in seqs {
        flat.extend(seq.iter().map(|&id| id as i32));
        flat.extend(std::iter::repeat(pad as i32).take(max_len - seq.len()));
    }
    Padded { flat, lengths, max_len }
}

/// 1 for the first `len` positions of each row, 0 after.
pub fn binary_mask(lengths: &[usize], max_len: usize) -> Vec<i32> {
    lengths
        .iter()
        .flat_map(|&len| (0..max_len).map(move |j| i32::from(j < len)))
        .collect()
}

/// Holds the target device so tensors land on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    pub device: B::Device,
    pad_id:     u32,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }

    /// Build a batch. `items` must not be empty.
    pub fn batch(&self, mut items: Vec<EncodedPair>) -> Seq2SeqBatch<B> {
        // ── Sort by prompt length, descending ─────────────────────────────────
        items.sort_by(|a, b| b.prompt.len().cmp(&a.prompt.len()));
        let batch_size = items.len();

        let prompts:   Vec<Vec<u32>> = items.iter().map(|p| p.prompt.clone()).collect();
        let responses: Vec<Vec<u32>> = items.into_iter().map(|p| p.response).collect();

        // ── Pad ───────────────────────────────────────────────────────────────
        let input  = zero_pad(&prompts,   self.pad_id);
        let output = zero_pad(&responses, self.pad_id);
        let mask   = binary_mask(&output.lengths, output.max_len);

        // ── Tensors ───────────────────────────────────────────────────────────
        let prompts = Tensor::<B, 1, Int>::from_ints(
            input.flat.as_slice(), &self.device,
        ).reshape([batch_size, input.max_len]);

        let targets = Tensor::<B, 1, Int>::from_ints(
            output.flat.as_slice(), &self.device,
        ).reshape([batch_size, output.max_len]);

        let mask = Tensor::<B, 1, Int>::from_ints(
            mask.as_slice(), &self.device,
        ).reshape([batch_size, output.max_len]).equal_elem(1);

        Seq2SeqBatch {
            prompts,
            prompt_lengths: input.lengths,
            targets,
            mask,
            max_target_len: output.max_len,
        }
    }
}
