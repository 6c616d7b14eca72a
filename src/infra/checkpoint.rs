// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training state with Burn's gzipped
// MessagePack recorder at full precision, so a resumed run starts
// from exactly the weights and Adam moments that were saved.
//
// Layout of one run:
//   {save_dir}/{model_name}/{corpus_name}/{enc}-{dec}_{hidden}/
//     train_config.json           ← TrainConfig of the run
//     metrics.csv                 ← progress log
//     tokenizer.json              ← vocabulary used for training
//     latest_checkpoint.json      ← iteration of the newest save
//     {iteration}_checkpoint/
//       encoder.mpk.gz            ← encoder weights (embedding included)
//       decoder.mpk.gz            ← decoder weights
//       embedding.mpk.gz          ← shared embedding on its own
//       encoder_optim.mpk.gz      ← Adam state, encoder side
//       decoder_optim.mpk.gz      ← Adam state, decoder side
//       tokenizer.json            ← vocabulary snapshot
//       checkpoint.json           ← iteration, loss, model config
//
// checkpoint.json carries the Seq2SeqConfig, so chat can rebuild
// the exact architecture before loading weights into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::infra::vocabulary::Vocabulary;
use crate::ml::decoder::LuongAttnDecoder;
use crate::ml::encoder::EncoderRnn;
use crate::ml::model::{Seq2Seq, Seq2SeqConfig};
use crate::ml::trainer::Seq2SeqTrainer;

const LATEST_FILE: &str = "latest_checkpoint.json";
const META_FILE:   &str = "checkpoint.json";
const CONFIG_FILE: &str = "train_config.json";

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Contents of `checkpoint.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub iteration: usize,
    /// Loss of the last iteration before the save
    pub loss:      f64,
    pub model:     Seq2SeqConfig,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// `{save_dir}/{model_name}/{corpus_name}/{enc}-{dec}_{hidden}`
    pub fn for_run(
        save_dir:         &Path,
        model_name:       &str,
        corpus_name:      &str,
        encoder_n_layers: usize,
        decoder_n_layers: usize,
        hidden_size:      usize,
    ) -> Self {
        Self::new(
            save_dir
                .join(model_name)
                .join(corpus_name)
                .join(format!("{encoder_n_layers}-{decoder_n_layers}_{hidden_size}")),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn iteration_dir(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("{iteration}_checkpoint"))
    }

    /// Write a complete checkpoint for `iteration` and move the latest pointer to it.
    pub fn save<B, OE, OD>(
        &self,
        trainer:   &Seq2SeqTrainer<B, OE, OD>,
        iteration: usize,
        loss:      f64,
        config:    &Seq2SeqConfig,
        vocab:     &Vocabulary,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        OE: Optimizer<EncoderRnn<B>, B>,
        OD: Optimizer<LuongAttnDecoder<B>, B>,
    {
        let dir = self.iteration_dir(iteration);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;

        let recorder = CheckpointRecorder::new();
        let model = trainer.model();
        let (encoder_optim, decoder_optim) = trainer.optimizer_records();

        // ── Weights ───────────────────────────────────────────────────────────
        recorder
            .record(model.encoder.clone().into_record(), dir.join("encoder"))
            .with_context(|| format!("Failed to save encoder to '{}'", dir.display()))?;
        recorder
            .record(model.decoder.clone().into_record(), dir.join("decoder"))
            .with_context(|| format!("Failed to save decoder to '{}'", dir.display()))?;
        recorder
            .record(model.encoder.embedding.clone().into_record(), dir.join("embedding"))
            .with_context(|| format!("Failed to save embedding to '{}'", dir.display()))?;

        // ── Optimiser state ───────────────────────────────────────────────────
        Recorder::<B>::record(&recorder, encoder_optim, dir.join("encoder_optim"))
            .with_context(|| "Failed to save encoder optimiser state")?;
        Recorder::<B>::record(&recorder, decoder_optim, dir.join("decoder_optim"))
            .with_context(|| "Failed to save decoder optimiser state")?;

        // ── Vocabulary + metadata ─────────────────────────────────────────────
        vocab.save(&dir.join("tokenizer.json"))?;
        let meta = CheckpointMeta { iteration, loss, model: config.clone() };
        write_json(&dir.join(META_FILE), &meta)?;
        write_json(&self.dir.join(LATEST_FILE), &iteration)?;

        tracing::debug!("Saved checkpoint: iteration {}", iteration);
        Ok(dir)
    }

    /// Iteration recorded in `latest_checkpoint.json`.
    pub fn latest_iteration(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// `iteration`, or the latest one when `None`.
    pub fn resolve(&self, iteration: Option<usize>) -> Result<usize> {
        match iteration {
            Some(i) => Ok(i),
            None    => self.latest_iteration(),
        }
    }

    pub fn load_meta(&self, iteration: usize) -> Result<CheckpointMeta> {
        let path = self.iteration_dir(iteration).join(META_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read checkpoint metadata '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn load_vocabulary(&self, iteration: usize, name: &str) -> Result<Vocabulary> {
        Vocabulary::from_file(name, &self.iteration_dir(iteration).join("tokenizer.json"))
    }

    /// Rebuild the model from `checkpoint.json` and load its weights.
    pub fn load_model<B: Backend>(
        &self,
        iteration: usize,
        device:    &B::Device,
    ) -> Result<(Seq2Seq<B>, CheckpointMeta)> {
        let meta = self.load_meta(iteration)?;
        let model = meta.model.init::<B>(device)?;
        let model = self.load_weights(model, iteration, device)?;
        tracing::info!("Loaded checkpoint from iteration {}", iteration);
        Ok((model, meta))
    }

    /// Restore weights and optimiser state into `trainer` for resuming.
    pub fn restore<B, OE, OD>(
        &self,
        trainer:   Seq2SeqTrainer<B, OE, OD>,
        iteration: usize,
        device:    &B::Device,
    ) -> Result<Seq2SeqTrainer<B, OE, OD>>
    where
        B: AutodiffBackend,
        OE: Optimizer<EncoderRnn<B>, B>,
        OD: Optimizer<LuongAttnDecoder<B>, B>,
    {
        let dir = self.iteration_dir(iteration);
        let model = self.load_weights(trainer.model().clone(), iteration, device)?;

        let recorder = CheckpointRecorder::new();
        let encoder_optim = Recorder::<B>::load::<OE::Record>(&recorder, dir.join("encoder_optim"), device)
            .with_context(|| format!("Cannot load encoder optimiser state from '{}'", dir.display()))?;
        let decoder_optim = Recorder::<B>::load::<OD::Record>(&recorder, dir.join("decoder_optim"), device)
            .with_context(|| format!("Cannot load decoder optimiser state from '{}'", dir.display()))?;

        tracing::info!("Resuming from checkpoint at iteration {}", iteration);
        Ok(trainer.with_state(model, encoder_optim, decoder_optim))
    }

    fn load_weights<B: Backend>(
        &self,
        model:     Seq2Seq<B>,
        iteration: usize,
        device:    &B::Device,
    ) -> Result<Seq2Seq<B>> {
        let dir = self.iteration_dir(iteration);
        let recorder = CheckpointRecorder::new();

        let encoder_record = recorder
            .load(dir.join("encoder"), device)
            .with_context(|| format!("Cannot load encoder from '{}'", dir.display()))?;
        let decoder_record = recorder
            .load(dir.join("decoder"), device)
            .with_context(|| format!("Cannot load decoder from '{}'", dir.display()))?;
        let embedding_record = recorder
            .load(dir.join("embedding"), device)
            .with_context(|| format!("Cannot load embedding from '{}'", dir.display()))?;

        let mut encoder = model.encoder.load_record(encoder_record);
        encoder.embedding = encoder.embedding.load_record(embedding_record);
        let decoder = model.decoder.load_record(decoder_record);

        Ok(Seq2Seq { encoder, decoder })
    }

    /// Saved before training starts. A resumed run is checked against
    /// the previous copy first.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        write_json(&self.dir.join(CONFIG_FILE), cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::PairBatcher;
    use crate::domain::sentence_pair::SentencePair;
    use crate::infra::tokenizer_store::TokenizerStore;
    use crate::ml::trainer::{adam_trainer, TrainerSettings};

    type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
    type InferBackend = burn::backend::NdArray;

    fn settings() -> TrainerSettings {
        TrainerSettings {
            learning_rate: 1e-3,
            decoder_learning_ratio: 5.0,
            teacher_forcing_ratio: 1.0,
            seed: 1,
        }
    }

    #[test]
    fn test_run_dir_layout() {
        let m = CheckpointManager::for_run(Path::new("data/save"), "cb_model", "cornell", 2, 2, 500);
        assert_eq!(m.dir(), Path::new("data/save/cb_model/cornell/2-2_500"));
        assert_eq!(
            m.iteration_dir(4000),
            PathBuf::from("data/save/cb_model/cornell/2-2_500/4000_checkpoint")
        );
    }

    #[test]
    fn test_missing_latest_pointer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::new(dir.path()).latest_iteration().is_err());
    }

    #[test]
    fn test_save_then_load_for_inference() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(None, &["hello there .".to_string()], 1000)
            .unwrap();
        let vocab = Vocabulary::new("test", tok);

        let cfg = Seq2SeqConfig::new(vocab.size(), 6).with_dropout(0.0);
        let device = Default::default();
        let model: Seq2Seq<TrainBackend> = cfg.init(&device).unwrap();
        let trainer = adam_trainer(model, 50.0, settings(), vocab.start_token(), device.clone());

        let manager = CheckpointManager::new(dir.path());
        let saved = manager.save(&trainer, 7, 3.5, &cfg, &vocab).unwrap();

        for file in [
            "encoder.mpk.gz", "decoder.mpk.gz", "embedding.mpk.gz",
            "encoder_optim.mpk.gz", "decoder_optim.mpk.gz",
            "tokenizer.json", "checkpoint.json",
        ] {
            assert!(saved.join(file).exists(), "missing {file}");
        }
        assert_eq!(manager.latest_iteration().unwrap(), 7);

        let (_, meta) = manager.load_model::<InferBackend>(7, &Default::default()).unwrap();
        assert_eq!(meta.iteration, 7);
        assert_eq!(meta.model, cfg);

        let reloaded = manager.load_vocabulary(7, "test").unwrap();
        assert_eq!(reloaded.size(), vocab.size());
    }

    #[test]
    fn test_restore_into_fresh_trainer() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(None, &["a b c".to_string()], 1000)
            .unwrap();
        let vocab = Vocabulary::new("test", tok);
        let cfg = Seq2SeqConfig::new(vocab.size(), 4).with_dropout(0.0);
        let device = Default::default();

        let model: Seq2Seq<TrainBackend> = cfg.init(&device).unwrap();
        let trainer = adam_trainer(model, 50.0, settings(), vocab.start_token(), device.clone());
        let manager = CheckpointManager::new(dir.path());
        manager.save(&trainer, 1, 1.0, &cfg, &vocab).unwrap();

        let fresh: Seq2Seq<TrainBackend> = cfg.init(&device).unwrap();
        let fresh = adam_trainer(fresh, 50.0, settings(), vocab.start_token(), device.clone());
        assert!(manager.restore(fresh, 1, &device).is_ok());
    }

    fn weights(model: &Seq2Seq<TrainBackend>) -> Vec<Vec<f32>> {
        [
            model.encoder.embedding.weight.val(),
            model.decoder.out.weight.val(),
            model.decoder.concat.weight.val(),
        ]
        .into_iter()
        .map(|w| w.into_data().to_vec::<f32>().unwrap())
        .collect()
    }

    #[test]
    fn test_restored_trainer_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build(None, &["how are you ?".to_string(), "fine .".to_string()], 1000)
            .unwrap();
        let vocab = Vocabulary::new("test", tok);
        let cfg = Seq2SeqConfig::new(vocab.size(), 6).with_dropout(0.0);
        let device: <TrainBackend as Backend>::Device = Default::default();

        let pair = SentencePair::new("how are you ?", "fine .");
        let batcher = PairBatcher::<TrainBackend>::new(device.clone(), vocab.pad_id());
        let batch = || batcher.batch(vec![vocab.encode_pair(&pair).unwrap()]);

        // A few updates so the Adam moments are non-trivial.
        let model: Seq2Seq<TrainBackend> = cfg.init(&device).unwrap();
        let mut trainer = adam_trainer(model, 50.0, settings(), vocab.start_token(), device.clone());
        for _ in 0..3 {
            trainer.train_step(&batch());
        }
        let manager = CheckpointManager::new(dir.path());
        manager.save(&trainer, 3, 1.0, &cfg, &vocab).unwrap();

        let fresh: Seq2Seq<TrainBackend> = cfg.init(&device).unwrap();
        let fresh = adam_trainer(fresh, 50.0, settings(), vocab.start_token(), device.clone());
        let mut restored = manager.restore(fresh, 3, &device).unwrap();
        assert_eq!(weights(restored.model()), weights(trainer.model()));

        // Same optimiser state: the next update lands on the same weights.
        let a = trainer.train_step(&batch());
        let b = restored.train_step(&batch());
        assert_eq!(a, b);
        assert_eq!(weights(restored.model()), weights(trainer.model()));
    }
}
