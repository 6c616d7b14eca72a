// ============================================================
// Layer 5 — Greedy Search Decoder
// ============================================================
// Generates a reply for a single prompt:
//
//   1. Encode the prompt once
//   2. Seed the decoder hidden state from the encoder
//   3. Start from [CLS]
//   4. Repeat exactly `max_length` times:
//        decoder step → take the most probable token and its
//        probability → feed the token back in
//
// There is no stop-token check; trimming the output is the
// caller's job.

use anyhow::Result;
use burn::prelude::*;

use crate::ml::decoder::LuongAttnDecoder;
use crate::ml::encoder::EncoderRnn;
use crate::ml::model::Seq2Seq;

/// Tokens and their softmax scores, always the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyOutput {
    pub tokens: Vec<u32>,
    pub scores: Vec<f32>,
}

pub struct GreedySearchDecoder<B: Backend> {
    encoder:     EncoderRnn<B>,
    decoder:     LuongAttnDecoder<B>,
    start_token: u32,
    device:      B::Device,
}

impl<B: Backend> GreedySearchDecoder<B> {
    pub fn new(model: Seq2Seq<B>, start_token: u32, device: B::Device) -> Self {
        Self {
            encoder: model.encoder,
            decoder: model.decoder,
            start_token,
            device,
        }
    }

    pub fn search(&self, prompt: &[u32], max_length: usize) -> Result<GreedyOutput> {
        if prompt.is_empty() {
            anyhow::bail!("Cannot decode an empty prompt");
        }

        // ── Step 1: Encode ────────────────────────────────────────────────────
        let ids: Vec<i32> = prompt.iter().map(|&id| id as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([1, prompt.len()]);
        let encoded = self.encoder.forward(input, &[prompt.len()]);

        // ── Step 2: Seed ──────────────────────────────────────────────────────
        let mut hidden = self.decoder.initial_hidden(encoded.hidden);
        let mut next = Tensor::<B, 1, Int>::from_ints([self.start_token as i32].as_slice(), &self.device);

        // ── Step 3: Decode ────────────────────────────────────────────────────
        let mut tokens = Vec::with_capacity(max_length);
        let mut scores = Vec::with_capacity(max_length);
        for _ in 0..max_length {
            let step = self.decoder.forward(
                &self.encoder.embedding,
                next,
                hidden,
                encoded.outputs.clone(),
            );
            hidden = step.hidden;

            let (score, index) = step.probs.max_dim_with_indices(1);
            let token = index.clone().into_scalar().elem::<i64>();
            tokens.push(token as u32);
            scores.push(score.into_scalar().elem::<f32>());

            next = index.reshape([1]);
        }

        tracing::debug!("Greedy search produced {} tokens", tokens.len());
        Ok(GreedyOutput { tokens, scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::Seq2SeqConfig;

    type TestBackend = burn::backend::NdArray;

    fn searcher() -> GreedySearchDecoder<TestBackend> {
        let device = Default::default();
        let model = Seq2SeqConfig::new(110, 8)
            .with_dropout(0.0)
            .init::<TestBackend>(&device)
            .unwrap();
        GreedySearchDecoder::new(model, 101, device)
    }

    #[test]
    fn test_runs_exactly_max_length_steps() {
        let s = searcher();
        for max_length in [1, 5, 10] {
            let out = s.search(&[101, 104, 105, 102], max_length).unwrap();
            assert_eq!(out.tokens.len(), max_length);
            assert_eq!(out.scores.len(), out.tokens.len());
        }
    }

    #[test]
    fn test_scores_are_probabilities() {
        let out = searcher().search(&[101, 106, 102], 4).unwrap();
        for (&token, &score) in out.tokens.iter().zip(&out.scores) {
            assert!(token < 110);
            assert!(score > 0.0 && score <= 1.0);
        }
    }

    #[test]
    fn test_deterministic() {
        let s = searcher();
        let a = s.search(&[101, 104, 102], 6).unwrap();
        let b = s.search(&[101, 104, 102], 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(searcher().search(&[], 3).is_err());
    }
}
