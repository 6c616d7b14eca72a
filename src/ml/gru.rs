// ============================================================
// Layer 5 — GRU Cell
// ============================================================
// A single gated recurrent unit, stepped one time slice at a
// time. The encoder runs it over whole padded sequences in both
// directions; the decoder advances it once per output token.
//
//   r  = σ(W_ir x + b_ir + W_hr h + b_hr)
//   z  = σ(W_iz x + b_iz + W_hz h + b_hz)
//   n  = tanh(W_in x + b_in + r ⊙ (W_hn h + b_hn))
//   h' = (1 - z) ⊙ n + z ⊙ h
//
// Padding: `run` takes a 0/1 mask per position. On padded steps
// the hidden state is carried through unchanged and the output
// is zero, which is exactly what a packed sequence computes. In
// the reverse direction this means each sequence starts from its
// own last real token.
//
// Reference: Cho et al. (2014)

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

#[derive(Config, Debug)]
pub struct GruCellConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl GruCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCell<B> {
        GruCell {
            input_gates:  LinearConfig::new(self.d_input,  3 * self.d_hidden).init(device),
            hidden_gates: LinearConfig::new(self.d_hidden, 3 * self.d_hidden).init(device),
            d_hidden:     self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    /// x → [r | z | n] pre-activations
    pub input_gates:  Linear<B>,
    /// h → [r | z | n] pre-activations
    pub hidden_gates: Linear<B>,
    pub d_hidden:     usize,
}

impl<B: Backend> GruCell<B> {
    /// One step. x: [batch, d_input], h: [batch, d_hidden] → [batch, d_hidden]
    pub fn step(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = x.dims();
        let d = self.d_hidden;

        let gi = self.input_gates.forward(x);
        let gh = self.hidden_gates.forward(h.clone());

        let gate = |t: &Tensor<B, 2>, k: usize| t.clone().slice([0..batch, k * d..(k + 1) * d]);

        let r = sigmoid(gate(&gi, 0) + gate(&gh, 0));
        let z = sigmoid(gate(&gi, 1) + gate(&gh, 1));
        let n = (gate(&gi, 2) + r * gate(&gh, 2)).tanh();

        // (1 - z) ⊙ n + z ⊙ h
        n.clone() + z * (h - n)
    }

    /// Run over a whole sequence.
    ///
    /// inputs: [batch, seq, d_input], mask: [batch, seq] (1.0 real, 0.0 pad)
    /// Returns (outputs [batch, seq, d_hidden], final hidden [batch, d_hidden]).
    pub fn run(
        &self,
        inputs:  Tensor<B, 3>,
        mask:    Tensor<B, 2>,
        initial: Option<Tensor<B, 2>>,
        reverse: bool,
    ) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let [batch, seq_len, d_input] = inputs.dims();
        let mut h = initial
            .unwrap_or_else(|| Tensor::zeros([batch, self.d_hidden], &inputs.device()));

        let order: Vec<usize> = if reverse {
            (0..seq_len).rev().collect()
        } else {
            (0..seq_len).collect()
        };

        let mut outputs = Vec::with_capacity(seq_len);
        for t in order {
            let x_t = inputs.clone()
                .slice([0..batch, t..t + 1, 0..d_input])
                .reshape([batch, d_input]);
            let m_t = mask.clone().slice([0..batch, t..t + 1]); // [batch, 1]

            let h_new = self.step(x_t, h.clone());
            // frozen on padding
            h = h.clone() + (h_new - h) * m_t.clone();
            outputs.push(h.clone() * m_t);
        }
        if reverse {
            outputs.reverse();
        }

        (Tensor::stack(outputs, 1), h)
    }
}

/// Float mask [batch, max_len] with 1.0 on the first `len` positions.
pub fn length_mask<B: Backend>(lengths: &[usize], max_len: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..max_len).map(move |j| if j < len { 1.0 } else { 0.0 }))
        .collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([lengths.len(), max_len])
}
