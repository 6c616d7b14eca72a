// ============================================================
// Layer 5 — Recurrent Encoder
// ============================================================
// Multi-layer bidirectional GRU over the padded prompt batch.
//
//   prompt ids [batch, seq]
//       │ embedding (shared with the decoder)
//       ▼
//   layer 0:  fwd GRU ─┐
//             bwd GRU ─┴─ concat → dropout → layer 1 ... → layer N-1
//       │
//       ▼
//   outputs = fwd + bwd of the top layer   [batch, seq, hidden]
//   hidden  = final state of every (layer, direction)
//             [layers * 2, batch, hidden], ordered
//             (l0 fwd, l0 bwd, l1 fwd, l1 bwd, ...)
//
// Summing rather than concatenating the two directions keeps the
// output width at `hidden_size`, which the attention layer needs.

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig},
    prelude::*,
};

use crate::ml::gru::{length_mask, GruCell, GruCellConfig};

#[derive(Config, Debug)]
pub struct EncoderRnnConfig {
    pub vocab_size:  usize,
    pub hidden_size: usize,
    #[config(default = 1)]
    pub n_layers:    usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl EncoderRnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderRnn<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let layers = (0..self.n_layers)
            .map(|l| {
                // layers above the first read both directions of the one below
                let d_input = if l == 0 { self.hidden_size } else { 2 * self.hidden_size };
                BiGruLayer {
                    fwd: GruCellConfig::new(d_input, self.hidden_size).init(device),
                    bwd: GruCellConfig::new(d_input, self.hidden_size).init(device),
                }
            })
            .collect();
        // dropout only sits between layers
        let dropout = if self.n_layers == 1 { 0.0 } else { self.dropout };

        EncoderRnn {
            embedding,
            layers,
            dropout: DropoutConfig::new(dropout).init(),
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct BiGruLayer<B: Backend> {
    pub fwd: GruCell<B>,
    pub bwd: GruCell<B>,
}

#[derive(Module, Debug)]
pub struct EncoderRnn<B: Backend> {
    /// Token embedding, also read by the decoder
    pub embedding:   Embedding<B>,
    pub layers:      Vec<BiGruLayer<B>>,
    pub dropout:     Dropout,
    pub hidden_size: usize,
}

pub struct EncoderOutput<B: Backend> {
    /// Summed bidirectional outputs of the top layer — [batch, seq, hidden]
    pub outputs: Tensor<B, 3>,
    /// Final hidden states — [layers * 2, batch, hidden]
    pub hidden:  Tensor<B, 3>,
}

impl<B: Backend> EncoderRnn<B> {
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// input_ids: [batch, seq] right-padded; lengths: true length per row
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, lengths: &[usize]) -> EncoderOutput<B> {
        let [_, seq_len] = input_ids.dims();
        let device = input_ids.device();
        let mask = length_mask::<B>(lengths, seq_len, &device);

        let mut x = self.embedding.forward(input_ids);
        let mut finals = Vec::with_capacity(2 * self.layers.len());
        let mut top = None;

        for (l, layer) in self.layers.iter().enumerate() {
            if l > 0 {
                x = self.dropout.forward(x);
            }
            let (out_f, h_f) = layer.fwd.run(x.clone(), mask.clone(), None, false);
            let (out_b, h_b) = layer.bwd.run(x.clone(), mask.clone(), None, true);
            finals.push(h_f);
            finals.push(h_b);

            if l + 1 == self.layers.len() {
                top = Some(out_f + out_b);
            } else {
                x = Tensor::cat(vec![out_f, out_b], 2);
            }
        }

        EncoderOutput {
            // with zero layers the embedding passes straight through
            outputs: top.unwrap_or(x),
            hidden:  Tensor::stack(finals, 0),
        }
    }
}
