// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Read + normalise the formatted pair file  (Layer 4 - data)
//   Step 2: Drop pairs that are too long               (Layer 4 - data)
//   Step 3: Locate the run directory, check a resume   (Layer 6 - infra)
//   Step 4: Load or build the vocabulary               (Layer 6 - infra)
//   Step 5: Save config                                (Layer 6 - infra)
//   Step 6: Build model + optimisers, maybe resume     (Layer 5 - ml)
//   Step 7: Run the iteration loop                     (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{dataset::{filter_pairs, PairDataset}, formatted::FormattedPairFile};
use crate::domain::{error::ConfigError, traits::PairSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
    vocabulary::Vocabulary,
};
use crate::ml::{
    model::Seq2SeqConfig,
    trainer::{adam_trainer, TrainPlan, TrainerSettings},
    CpuBackend, DeviceKind, GpuBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints as train_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Formatted pair file written by `prepare`
    pub datafile:               String,
    pub corpus_name:            String,
    pub save_dir:               String,
    pub model_name:             String,
    /// dot, general or concat
    pub attn_model:             String,
    pub hidden_size:            usize,
    pub encoder_n_layers:       usize,
    pub decoder_n_layers:       usize,
    pub dropout:                f64,
    pub batch_size:             usize,
    /// Pairs with this many words or more on either side are dropped
    pub max_length:             usize,
    /// Global gradient norm limit per module; 0 disables clipping
    pub clip:                   f64,
    pub teacher_forcing_ratio:  f64,
    pub learning_rate:          f64,
    pub decoder_learning_ratio: f64,
    pub n_iteration:            usize,
    pub print_every:            usize,
    pub save_every:             usize,
    /// Resume from this checkpoint iteration of the same run
    pub checkpoint_iter:        Option<usize>,
    /// Pretrained tokenizer.json (e.g. BERT WordPiece)
    pub tokenizer_path:         Option<String>,
    /// Upper bound on ids when building a word-level vocabulary
    pub vocab_size:             usize,
    pub device:                 DeviceKind,
    pub seed:                   u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            datafile:               "data/cornell_movie_dialogs_corpus/formatted_movie_lines.txt".to_string(),
            corpus_name:            "cornell_movie_dialogs_corpus".to_string(),
            save_dir:               "data/save".to_string(),
            model_name:             "cb_model".to_string(),
            attn_model:             "dot".to_string(),
            hidden_size:            768,
            encoder_n_layers:       2,
            decoder_n_layers:       2,
            dropout:                0.1,
            batch_size:             64,
            max_length:             10,
            clip:                   50.0,
            teacher_forcing_ratio:  1.0,
            learning_rate:          1e-4,
            decoder_learning_ratio: 5.0,
            n_iteration:            50_000,
            print_every:            1,
            save_every:             10_000,
            checkpoint_iter:        None,
            tokenizer_path:         None,
            vocab_size:             30_522,
            device:                 DeviceKind::Cpu,
            seed:                   42,
        }
    }
}

impl TrainConfig {
    /// Range checks for the training-loop values. Model shape is
    /// checked separately by `Seq2SeqConfig::validate`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &'static str, reason: &str| ConfigError::InvalidValue {
            name,
            reason: reason.to_string(),
        };
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.n_iteration == 0 {
            return Err(invalid("n_iteration", "must be at least 1"));
        }
        if self.max_length == 0 {
            return Err(invalid("max_length", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.teacher_forcing_ratio) {
            return Err(invalid("teacher_forcing_ratio", "must be within [0, 1]"));
        }
        if self.learning_rate <= 0.0 || self.decoder_learning_ratio <= 0.0 {
            return Err(invalid("learning_rate", "rates must be positive"));
        }
        if self.clip < 0.0 {
            return Err(invalid("clip", "must not be negative"));
        }
        if let Some(it) = self.checkpoint_iter {
            if it >= self.n_iteration {
                return Err(invalid("checkpoint_iter", "nothing left to train after this iteration"));
            }
        }
        Ok(())
    }

    /// A resumed run must keep the model shape and vocabulary source of
    /// the run it continues. Schedule and rates may change.
    pub fn check_resume(&self, saved: &TrainConfig) -> Result<(), ConfigError> {
        let checks: [(&'static str, String, String); 7] = [
            ("attn_model", saved.attn_model.clone(), self.attn_model.clone()),
            ("hidden_size", saved.hidden_size.to_string(), self.hidden_size.to_string()),
            ("encoder_n_layers", saved.encoder_n_layers.to_string(), self.encoder_n_layers.to_string()),
            ("decoder_n_layers", saved.decoder_n_layers.to_string(), self.decoder_n_layers.to_string()),
            ("dropout", saved.dropout.to_string(), self.dropout.to_string()),
            ("tokenizer_path", format!("{:?}", saved.tokenizer_path), format!("{:?}", self.tokenizer_path)),
            ("vocab_size", saved.vocab_size.to_string(), self.vocab_size.to_string()),
        ];
        for (name, was, now) in checks {
            if was != now {
                return Err(ConfigError::ResumeMismatch { name, saved: was, requested: now });
            }
        }
        Ok(())
    }

    pub fn model_config(&self, vocab_size: usize) -> Seq2SeqConfig {
        Seq2SeqConfig::new(vocab_size, self.hidden_size)
            .with_encoder_n_layers(self.encoder_n_layers)
            .with_decoder_n_layers(self.decoder_n_layers)
            .with_dropout(self.dropout)
            .with_attn_model(self.attn_model.clone())
    }

    pub fn checkpoint_manager(&self) -> CheckpointManager {
        CheckpointManager::for_run(
            Path::new(&self.save_dir),
            &self.model_name,
            &self.corpus_name,
            self.encoder_n_layers,
            self.decoder_n_layers,
            self.hidden_size,
        )
    }

    fn settings(&self) -> TrainerSettings {
        TrainerSettings {
            learning_rate:          self.learning_rate,
            decoder_learning_ratio: self.decoder_learning_ratio,
            teacher_forcing_ratio:  self.teacher_forcing_ratio,
            seed:                   self.seed,
        }
    }

    fn plan(&self, start_iteration: usize) -> TrainPlan {
        TrainPlan {
            n_iteration: self.n_iteration,
            batch_size:  self.batch_size,
            print_every: self.print_every,
            save_every:  self.save_every,
            start_iteration,
        }
    }
}

/// Where a run ended.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub run_dir:   PathBuf,
    pub pairs:     usize,
    pub last_loss: f64,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Read pairs ────────────────────────────────────────────────
        tracing::info!("Start preparing training data ...");
        let pairs = FormattedPairFile::new(&cfg.datafile).load_pairs()?;

        // ── Step 2: Filter ────────────────────────────────────────────────────
        let dataset = PairDataset::new(filter_pairs(pairs, cfg.max_length));
        if dataset.pair_count() == 0 {
            anyhow::bail!("No sentence pairs shorter than {} words in '{}'", cfg.max_length, cfg.datafile);
        }

        // ── Step 3: Run directory ─────────────────────────────────────────────
        let ckpt = cfg.checkpoint_manager();
        if cfg.checkpoint_iter.is_some() {
            cfg.check_resume(&ckpt.load_config()?)?;
        }

        // ── Step 4: Vocabulary ────────────────────────────────────────────────
        let vocab = match cfg.checkpoint_iter {
            Some(it) => ckpt.load_vocabulary(it, &cfg.corpus_name)?,
            None => {
                let store = TokenizerStore::new(ckpt.dir());
                let pretrained = cfg.tokenizer_path.as_deref().map(Path::new);
                let tokenizer = store.load_or_build(pretrained, &dataset.texts(), cfg.vocab_size)?;
                Vocabulary::new(&cfg.corpus_name, tokenizer)
            }
        };
        tracing::info!("Vocabulary '{}' covers {} ids", vocab.name(), vocab.size());

        let model_cfg = match cfg.checkpoint_iter {
            Some(it) => ckpt.load_meta(it)?.model,
            None     => cfg.model_config(vocab.size()),
        };

        // ── Step 5: Save config ───────────────────────────────────────────────
        ckpt.save_config(cfg)?;

        // ── Step 6 + 7: Build and train on the chosen backend ─────────────────
        let last_loss = match cfg.device {
            DeviceKind::Cpu => train_on::<Autodiff<CpuBackend>>(
                cfg, &dataset, &vocab, &model_cfg, &ckpt, NdArrayDevice::default(),
            )?,
            DeviceKind::Gpu => train_on::<Autodiff<GpuBackend>>(
                cfg, &dataset, &vocab, &model_cfg, &ckpt, WgpuDevice::default(),
            )?,
        };

        Ok(TrainSummary {
            run_dir: ckpt.dir().to_path_buf(),
            pairs: dataset.pair_count(),
            last_loss,
        })
    }
}

fn train_on<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    dataset:   &PairDataset,
    vocab:     &Vocabulary,
    model_cfg: &Seq2SeqConfig,
    ckpt:      &CheckpointManager,
    device:    B::Device,
) -> Result<f64> {
    tracing::info!("Using device: {:?}", device);

    tracing::info!("Building encoder and decoder ...");
    let model = model_cfg.init::<B>(&device)?;
    let mut trainer = adam_trainer(model, cfg.clip, cfg.settings(), vocab.start_token(), device.clone());

    let start_iteration = match cfg.checkpoint_iter {
        Some(it) => {
            trainer = ckpt.restore(trainer, it, &device)?;
            it + 1
        }
        None => 1,
    };
    tracing::info!(
        "Models built: {} encoder / {} decoder layers, hidden={}, attention={}",
        model_cfg.encoder_n_layers, model_cfg.decoder_n_layers,
        model_cfg.hidden_size, model_cfg.attn_model,
    );

    let metrics = MetricsLogger::new(ckpt.dir())?;
    println!("Training...");
    trainer.train_iters(dataset, vocab, &cfg.plan(start_iteration), model_cfg, ckpt, &metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tiny_config(dir: &Path) -> TrainConfig {
        let datafile = dir.join("pairs.txt");
        fs::write(
            &datafile,
            "Hi there.\t[SEP]\tHello!\n\
             How are you?\t[SEP]\tFine, thanks.\n\
             This prompt is far far too long to keep around.\t[SEP]\tOk.\n",
        ).unwrap();

        TrainConfig {
            datafile:         datafile.to_string_lossy().into_owned(),
            save_dir:         dir.join("save").to_string_lossy().into_owned(),
            hidden_size:      8,
            encoder_n_layers: 1,
            decoder_n_layers: 1,
            dropout:          0.0,
            batch_size:       2,
            max_length:       5,
            n_iteration:      2,
            print_every:      1,
            save_every:       2,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let cfg = TrainConfig { teacher_forcing_ratio: 1.5, ..TrainConfig::default() };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { name: "teacher_forcing_ratio", .. })
        ));
    }

    #[test]
    fn test_end_to_end_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());

        let summary = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(summary.pairs, 2);
        assert!(summary.last_loss.is_finite());

        let ckpt = cfg.checkpoint_manager();
        assert_eq!(summary.run_dir, ckpt.dir());
        assert_eq!(ckpt.latest_iteration().unwrap(), 2);
        assert_eq!(ckpt.load_config().unwrap(), cfg);

        // resume from iteration 2 and run to 4
        let resumed = TrainConfig { checkpoint_iter: Some(2), n_iteration: 4, ..cfg };
        TrainUseCase::new(resumed).execute().unwrap();
        assert_eq!(ckpt.latest_iteration().unwrap(), 4);
    }

    #[test]
    fn test_resume_with_different_attention_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let resumed = TrainConfig {
            checkpoint_iter: Some(2),
            n_iteration:     4,
            attn_model:      "general".to_string(),
            ..cfg.clone()
        };
        let err = TrainUseCase::new(resumed).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ResumeMismatch { name: "attn_model", .. })
        ));

        // nothing was trained or overwritten
        let ckpt = cfg.checkpoint_manager();
        assert_eq!(ckpt.latest_iteration().unwrap(), 2);
        assert_eq!(ckpt.load_config().unwrap(), cfg);
    }

    #[test]
    fn test_check_resume_allows_schedule_changes() {
        let saved = TrainConfig::default();
        let resumed = TrainConfig {
            n_iteration:     80_000,
            learning_rate:   5e-5,
            checkpoint_iter: Some(50_000),
            ..TrainConfig::default()
        };
        assert!(resumed.check_resume(&saved).is_ok());
    }
}
