// ============================================================
// Layer 5 — Luong Attention Decoder (single step)
// ============================================================
// Advances the decoder by exactly one output token. Callers
// (the trainer and the greedy searcher) own the loop.
//
//   input token [batch]
//       │ shared embedding → dropout
//       ▼
//   stacked GRU step  (previous hidden [layers, batch, hidden])
//       │ rnn_out [batch, hidden]
//       ├──────────────► attention over encoder outputs
//       │                       │ weights [batch, seq]
//       │                       ▼
//       │               context = Σ weights ⊙ encoder outputs
//       ▼                       │
//   tanh(W_c [rnn_out; context]) ◄┘
//       │
//       ▼
//   softmax(W_o ·)  → probabilities [batch, vocab]

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::ConfigError;
use crate::ml::attention::{LuongAttention, LuongAttentionConfig};
use crate::ml::gru::{GruCell, GruCellConfig};

#[derive(Config, Debug)]
pub struct LuongAttnDecoderConfig {
    /// "dot", "general" or "concat"
    pub attn_model:  String,
    pub hidden_size: usize,
    /// Vocabulary size
    pub output_size: usize,
    #[config(default = 1)]
    pub n_layers:    usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl LuongAttnDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<LuongAttnDecoder<B>, ConfigError> {
        let attn = LuongAttentionConfig::new(self.attn_model.clone(), self.hidden_size)
            .init(device)?;
        let layers = (0..self.n_layers)
            .map(|_| GruCellConfig::new(self.hidden_size, self.hidden_size).init(device))
            .collect();
        let layer_dropout = if self.n_layers == 1 { 0.0 } else { self.dropout };

        Ok(LuongAttnDecoder {
            embedding_dropout: DropoutConfig::new(self.dropout).init(),
            layers,
            layer_dropout:     DropoutConfig::new(layer_dropout).init(),
            concat:            LinearConfig::new(2 * self.hidden_size, self.hidden_size).init(device),
            out:               LinearConfig::new(self.hidden_size, self.output_size).init(device),
            attn,
            hidden_size:       self.hidden_size,
        })
    }
}

#[derive(Module, Debug)]
pub struct LuongAttnDecoder<B: Backend> {
    pub embedding_dropout: Dropout,
    pub layers:            Vec<GruCell<B>>,
    pub layer_dropout:     Dropout,
    pub concat:            Linear<B>,
    pub out:               Linear<B>,
    pub attn:              LuongAttention<B>,
    pub hidden_size:       usize,
}

/// Result of one decoder step.
pub struct DecoderStep<B: Backend> {
    /// Softmax over the vocabulary — [batch, vocab]
    pub probs:     Tensor<B, 2>,
    /// New hidden state — [layers, batch, hidden]
    pub hidden:    Tensor<B, 3>,
    /// Attention weights — [batch, seq]
    pub attention: Tensor<B, 2>,
}

impl<B: Backend> LuongAttnDecoder<B> {
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Seed the decoder from the encoder's final states: the first
    /// `n_layers` entries of `[layers * 2, batch, hidden]`.
    pub fn initial_hidden(&self, encoder_hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, batch, hidden] = encoder_hidden.dims();
        encoder_hidden.slice([0..self.n_layers(), 0..batch, 0..hidden])
    }

    pub fn forward(
        &self,
        embedding:       &Embedding<B>,
        input_step:      Tensor<B, 1, Int>,
        last_hidden:     Tensor<B, 3>,
        encoder_outputs: Tensor<B, 3>,
    ) -> DecoderStep<B> {
        let [batch] = input_step.dims();
        let [_, seq_len, _] = encoder_outputs.dims();
        let h = self.hidden_size;

        // ── Embed the current input token ─────────────────────────────────────
        let embedded = embedding
            .forward(input_step.reshape([batch, 1]))
            .reshape([batch, h]);
        let mut x = self.embedding_dropout.forward(embedded);

        // ── One step through the GRU stack ────────────────────────────────────
        let mut next_hidden = Vec::with_capacity(self.layers.len());
        for (l, cell) in self.layers.iter().enumerate() {
            if l > 0 {
                x = self.layer_dropout.forward(x);
            }
            let prev = last_hidden.clone()
                .slice([l..l + 1, 0..batch, 0..h])
                .reshape([batch, h]);
            x = cell.step(x, prev);
            next_hidden.push(x.clone());
        }
        let rnn_output = x;

        // ── Attention + context vector ────────────────────────────────────────
        let attention = self.attn.forward(rnn_output.clone(), encoder_outputs.clone());
        let context = attention.clone()
            .reshape([batch, 1, seq_len])
            .matmul(encoder_outputs)
            .reshape([batch, h]);

        // ── Combine and project to the vocabulary ─────────────────────────────
        let concat_output = self.concat
            .forward(Tensor::cat(vec![rnn_output, context], 1))
            .tanh();
        let probs = softmax(self.out.forward(concat_output), 1);

        DecoderStep {
            probs,
            hidden: Tensor::stack(next_hidden, 0),
            attention,
        }
    }
}
