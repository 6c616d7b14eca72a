// ============================================================
// Layer 5 — Luong Attention
// ============================================================
// Scores the decoder's current hidden state h against every
// encoder output e_s, then softmaxes over the source positions.
//
//   dot:      score(h, e) = h · e
//   general:  score(h, e) = h · (W e)
//   concat:   score(h, e) = v · tanh(W [h; e])
//
// Output: weights [batch, seq], each row sums to 1.
//
// The method is chosen by name when the config is initialised;
// an unknown name fails there, before any weights exist.
//
// Reference: Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionMethod {
    #[default]
    Dot,
    General,
    Concat,
}

impl FromStr for AttentionMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot"     => Ok(Self::Dot),
            "general" => Ok(Self::General),
            "concat"  => Ok(Self::Concat),
            other     => Err(ConfigError::UnknownAttentionMethod(other.to_string())),
        }
    }
}

impl fmt::Display for AttentionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dot     => "dot",
            Self::General => "general",
            Self::Concat  => "concat",
        };
        f.write_str(name)
    }
}

#[derive(Config, Debug)]
pub struct LuongAttentionConfig {
    /// "dot", "general" or "concat"
    pub method:      String,
    pub hidden_size: usize,
}

impl LuongAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<LuongAttention<B>, ConfigError> {
        let method: AttentionMethod = self.method.parse()?;
        let h = self.hidden_size;

        let (general, concat, v) = match method {
            AttentionMethod::Dot => (None, None, None),
            AttentionMethod::General => (Some(LinearConfig::new(h, h).init(device)), None, None),
            AttentionMethod::Concat => (
                None,
                Some(LinearConfig::new(2 * h, h).init(device)),
                Some(LinearConfig::new(h, 1).with_bias(false).init(device)),
            ),
        };
        Ok(LuongAttention { general, concat, v })
    }
}

/// The scoring layers present decide the method: none → dot,
/// `general` → general, `concat` + `v` → concat.
#[derive(Module, Debug)]
pub struct LuongAttention<B: Backend> {
    pub general: Option<Linear<B>>,
    pub concat:  Option<Linear<B>>,
    pub v:       Option<Linear<B>>,
}

impl<B: Backend> LuongAttention<B> {
    pub fn method(&self) -> AttentionMethod {
        if self.concat.is_some() {
            AttentionMethod::Concat
        } else if self.general.is_some() {
            AttentionMethod::General
        } else {
            AttentionMethod::Dot
        }
    }

    /// Raw energies. hidden: [batch, hidden], encoder_outputs: [batch, seq, hidden]
    fn score(&self, hidden: Tensor<B, 2>, encoder_outputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, seq_len, h] = encoder_outputs.dims();
        let query = hidden.reshape([batch, 1, h]);

        let energies = match (&self.concat, &self.v, &self.general) {
            (Some(concat), Some(v), _) => {
                let expanded = query.expand([batch, seq_len, h]);
                let energy = concat
                    .forward(Tensor::cat(vec![expanded, encoder_outputs], 2))
                    .tanh();
                v.forward(energy)
            }
            (_, _, Some(general)) => (query * general.forward(encoder_outputs)).sum_dim(2),
            _ => (query * encoder_outputs).sum_dim(2),
        };
        energies.reshape([batch, seq_len])
    }

    /// Attention weights over source positions — [batch, seq], rows sum to 1.
    pub fn forward(&self, hidden: Tensor<B, 2>, encoder_outputs: Tensor<B, 3>) -> Tensor<B, 2> {
        softmax(self.score(hidden, encoder_outputs), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;

    type TestBackend = burn::backend::NdArray;

    fn check_rows_sum_to_one(method: &str) {
        let device = Default::default();
        let attn = LuongAttentionConfig::new(method.to_string(), 4)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(attn.method().to_string(), method);

        let hidden = Tensor::<TestBackend, 2>::random([3, 4], Distribution::Default, &device);
        let enc    = Tensor::<TestBackend, 3>::random([3, 5, 4], Distribution::Default, &device);
        let w = attn.forward(hidden, enc);
        assert_eq!(w.dims(), [3, 5]);

        let sums: Vec<f32> = w.sum_dim(1).into_data().convert::<f32>().to_vec().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sums to {s}");
        }
    }

    #[test]
    fn test_dot_weights_normalised() {
        check_rows_sum_to_one("dot");
    }

    #[test]
    fn test_general_weights_normalised() {
        check_rows_sum_to_one("general");
    }

    #[test]
    fn test_concat_weights_normalised() {
        check_rows_sum_to_one("concat");
    }

    #[test]
    fn test_unknown_method_rejected_at_init() {
        let result = LuongAttentionConfig::new("bahdanau".to_string(), 4)
            .init::<TestBackend>(&Default::default());
        assert_eq!(
            result.unwrap_err(),
            ConfigError::UnknownAttentionMethod("bahdanau".to_string())
        );
    }

    #[test]
    fn test_dot_prefers_aligned_position() {
        let device = Default::default();
        let attn = LuongAttentionConfig::new("dot".to_string(), 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let hidden = Tensor::<TestBackend, 1>::from_floats([4.0f32, 0.0], &device).reshape([1, 2]);
        let enc = Tensor::<TestBackend, 1>::from_floats([0.0f32, 1.0, 1.0, 0.0], &device)
            .reshape([1, 2, 2]);
        let w: Vec<f32> = attn.forward(hidden, enc).into_data().convert::<f32>().to_vec().unwrap();
        assert!(w[1] > w[0]);
    }
}
