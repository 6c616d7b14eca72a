// ============================================================
// Layer 5 — Seq2Seq Model
// ============================================================
// Bundles the encoder and the attention decoder behind one
// config so checkpoints and the chat loop can rebuild the
// exact architecture from `checkpoint.json`.
//
// The token embedding lives inside the encoder and is passed
// by reference to every decoder step, so one set of weights
// serves both sides.

use burn::prelude::*;

use crate::domain::error::ConfigError;
use crate::ml::decoder::{LuongAttnDecoder, LuongAttnDecoderConfig};
use crate::ml::encoder::{EncoderRnn, EncoderRnnConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug, PartialEq)]
pub struct Seq2SeqConfig {
    pub vocab_size:       usize,
    pub hidden_size:      usize,
    #[config(default = 2)]
    pub encoder_n_layers: usize,
    #[config(default = 2)]
    pub decoder_n_layers: usize,
    #[config(default = 0.1)]
    pub dropout:          f64,
    #[config(default = "String::from(\"dot\")")]
    pub attn_model:       String,
}

impl Seq2SeqConfig {
    /// Check the hyperparameters fit together before allocating weights.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vocab_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "vocab_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.hidden_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "hidden_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.encoder_n_layers == 0 || self.decoder_n_layers == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_layers",
                reason: "encoder and decoder need at least one layer".to_string(),
            });
        }
        // decoder hidden is seeded from the first `decoder_n_layers`
        // of the encoder's `2 * encoder_n_layers` final states
        if self.decoder_n_layers > 2 * self.encoder_n_layers {
            return Err(ConfigError::LayerMismatch {
                decoder:        self.decoder_n_layers,
                encoder_states: 2 * self.encoder_n_layers,
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::InvalidValue {
                name: "dropout",
                reason: format!("{} is outside [0, 1)", self.dropout),
            });
        }
        Ok(())
    }

    pub fn encoder_config(&self) -> EncoderRnnConfig {
        EncoderRnnConfig::new(self.vocab_size, self.hidden_size)
            .with_n_layers(self.encoder_n_layers)
            .with_dropout(self.dropout)
    }

    pub fn decoder_config(&self) -> LuongAttnDecoderConfig {
        LuongAttnDecoderConfig::new(self.attn_model.clone(), self.hidden_size, self.vocab_size)
            .with_n_layers(self.decoder_n_layers)
            .with_dropout(self.dropout)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Seq2Seq<B>, ConfigError> {
        self.validate()?;
        Ok(Seq2Seq {
            encoder: self.encoder_config().init(device),
            decoder: self.decoder_config().init(device)?,
        })
    }
}

#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    pub encoder: EncoderRnn<B>,
    pub decoder: LuongAttnDecoder<B>,
}
