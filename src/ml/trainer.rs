// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Iteration-based seq2seq training with two Adam optimisers.
//
// One iteration:
//   1. Encode the prompt batch
//   2. Seed the decoder with encoder_hidden[..decoder_layers]
//   3. Feed [CLS] to every row, then for each target position:
//        decoder step → masked NLL → accumulate
//        next input = ground truth   (teacher forcing), or
//                     argmax token   (free running)
//      The coin is flipped once per batch.
//   4. Backward on the summed loss
//   5. Split gradients by module and clip each side to a global
//      norm of `clip`
//   6. Step the encoder optimiser at lr and the decoder optimiser
//      at lr × decoder_learning_ratio
//
// The shared embedding lives inside the encoder, so its gradients
// are clipped with the encoder's and applied by its optimiser.
//
// Batch sampling and the teacher-forcing coin use separate RNGs
// seeded from the same seed. A resumed run replays the coins of
// the iterations it skips, so it sees the same draws as a run
// that was never interrupted.
//
// Reference: Luong et al. (2015), Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::{batcher::{PairBatcher, Seq2SeqBatch}, dataset::PairDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{IterationMetrics, MetricsLogger},
    vocabulary::Vocabulary,
};
use crate::ml::decoder::LuongAttnDecoder;
use crate::ml::encoder::EncoderRnn;
use crate::ml::gradients::clip_grad_norm;
use crate::ml::loss::mask_nll_loss;
use crate::ml::model::{Seq2Seq, Seq2SeqConfig};

fn adam<B, M>() -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    AdamConfig::new().init::<B, M>()
}

/// Trainer with one Adam optimiser per side. Each side's gradients are
/// clipped to a global norm of `clip` (`clip <= 0` disables it).
pub fn adam_trainer<B: AutodiffBackend>(
    model:       Seq2Seq<B>,
    clip:        f64,
    settings:    TrainerSettings,
    start_token: u32,
    device:      B::Device,
) -> Seq2SeqTrainer<B, impl Optimizer<EncoderRnn<B>, B>, impl Optimizer<LuongAttnDecoder<B>, B>> {
    Seq2SeqTrainer::new(
        model,
        adam::<B, EncoderRnn<B>>(),
        adam::<B, LuongAttnDecoder<B>>(),
        settings,
        clip,
        start_token,
        device,
    )
}

/// Hyperparameters the step itself needs.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub learning_rate:          f64,
    pub decoder_learning_ratio: f64,
    pub teacher_forcing_ratio:  f64,
    pub seed:                   u64,
}

/// Schedule for `train_iters`. Iterations are 1-based.
#[derive(Debug, Clone)]
pub struct TrainPlan {
    pub n_iteration:     usize,
    pub batch_size:      usize,
    /// 0 disables progress reports
    pub print_every:     usize,
    /// 0 disables checkpoints
    pub save_every:      usize,
    pub start_iteration: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Loss per real target token
    pub avg_loss:       f64,
    pub teacher_forced: bool,
}

pub struct Seq2SeqTrainer<B, OE, OD>
where
    B: AutodiffBackend,
    OE: Optimizer<EncoderRnn<B>, B>,
    OD: Optimizer<LuongAttnDecoder<B>, B>,
{
    model:         Seq2Seq<B>,
    encoder_optim: OE,
    decoder_optim: OD,
    settings:      TrainerSettings,
    clip:          f64,
    start_token:   u32,
    sample_rng:    StdRng,
    coin_rng:      StdRng,
    device:        B::Device,
}

impl<B, OE, OD> Seq2SeqTrainer<B, OE, OD>
where
    B: AutodiffBackend,
    OE: Optimizer<EncoderRnn<B>, B>,
    OD: Optimizer<LuongAttnDecoder<B>, B>,
{
    pub fn new(
        model:         Seq2Seq<B>,
        encoder_optim: OE,
        decoder_optim: OD,
        settings:      TrainerSettings,
        clip:          f64,
        start_token:   u32,
        device:        B::Device,
    ) -> Self {
        let sample_rng = StdRng::seed_from_u64(settings.seed);
        let coin_rng = StdRng::seed_from_u64(settings.seed.wrapping_add(1));
        Self {
            model,
            encoder_optim,
            decoder_optim,
            settings,
            clip,
            start_token,
            sample_rng,
            coin_rng,
            device,
        }
    }

    pub fn model(&self) -> &Seq2Seq<B> {
        &self.model
    }

    pub fn optimizer_records(&self) -> (OE::Record, OD::Record) {
        (self.encoder_optim.to_record(), self.decoder_optim.to_record())
    }

    /// Replace weights and optimiser state, e.g. from a checkpoint.
    pub fn with_state(self, model: Seq2Seq<B>, encoder_record: OE::Record, decoder_record: OD::Record) -> Self {
        Self {
            model,
            encoder_optim: self.encoder_optim.load_record(encoder_record),
            decoder_optim: self.decoder_optim.load_record(decoder_record),
            ..self
        }
    }

    /// One forward/backward pass and one update of both optimisers.
    pub fn train_step(&mut self, batch: &Seq2SeqBatch<B>) -> StepReport {
        let [batch_size, _] = batch.targets.dims();

        // ── Step 1: Encode ────────────────────────────────────────────────────
        let encoded = self.model.encoder.forward(batch.prompts.clone(), &batch.prompt_lengths);
        let mut hidden = self.model.decoder.initial_hidden(encoded.hidden);
        let mut input = Tensor::<B, 1, Int>::from_ints(
            vec![self.start_token as i32; batch_size].as_slice(), &self.device,
        );

        let teacher_forced = self.coin_rng.gen::<f64>() < self.settings.teacher_forcing_ratio;

        // ── Step 2: Decode one position at a time ─────────────────────────────
        let mut loss = Tensor::<B, 1>::zeros([1], &self.device);
        let mut weighted_sum = 0.0f64;
        let mut n_totals = 0usize;

        for t in 0..batch.max_target_len {
            let step = self.model.decoder.forward(
                &self.model.encoder.embedding,
                input,
                hidden,
                encoded.outputs.clone(),
            );
            hidden = step.hidden;

            let target_t = batch.targets.clone()
                .slice([0..batch_size, t..t + 1])
                .reshape([batch_size]);
            let mask_t = batch.mask.clone()
                .slice([0..batch_size, t..t + 1])
                .reshape([batch_size]);

            input = if teacher_forced {
                target_t.clone()
            } else {
                step.probs.clone().argmax(1).reshape([batch_size])
            };

            let (step_loss, n_total) = mask_nll_loss(step.probs, target_t, mask_t);
            weighted_sum += step_loss.clone().into_scalar().elem::<f64>() * n_total as f64;
            n_totals += n_total;
            loss = loss + step_loss;
        }

        // ── Step 3: Backward, clip, separate updates ──────────────────────────
        let mut grads = loss.backward();
        let mut encoder_grads = GradientsParams::from_module(&mut grads, &self.model.encoder);
        let mut decoder_grads = GradientsParams::from_module(&mut grads, &self.model.decoder);
        clip_grad_norm::<B, _>(&self.model.encoder, &mut encoder_grads, self.clip);
        clip_grad_norm::<B, _>(&self.model.decoder, &mut decoder_grads, self.clip);

        let lr = self.settings.learning_rate;
        self.model.encoder = self.encoder_optim.step(lr, self.model.encoder.clone(), encoder_grads);
        self.model.decoder = self.decoder_optim.step(
            lr * self.settings.decoder_learning_ratio,
            self.model.decoder.clone(),
            decoder_grads,
        );

        let avg_loss = if n_totals > 0 { weighted_sum / n_totals as f64 } else { 0.0 };
        StepReport { avg_loss, teacher_forced }
    }

    /// Run iterations `plan.start_iteration..=plan.n_iteration`.
    /// Returns the loss of the last iteration.
    ///
    /// The RNGs are assumed to be at their seeded state, as they are
    /// right after `new` or a checkpoint restore.
    pub fn train_iters(
        &mut self,
        dataset:      &PairDataset,
        vocab:        &Vocabulary,
        plan:         &TrainPlan,
        model_config: &Seq2SeqConfig,
        checkpoints:  &CheckpointManager,
        metrics:      &MetricsLogger,
    ) -> Result<f64> {
        if dataset.pair_count() == 0 {
            anyhow::bail!("No sentence pairs to train on");
        }

        // ── Pre-sample every batch up front ───────────────────────────────────
        tracing::info!("Sampling {} batches of {} pairs", plan.n_iteration, plan.batch_size);
        let batches: Vec<Vec<usize>> = (0..plan.n_iteration)
            .map(|_| dataset.sample_indices(plan.batch_size, &mut self.sample_rng))
            .collect();

        // Skipped iterations still consume their coin.
        let first = plan.start_iteration.max(1);
        for _ in 1..first {
            self.coin_rng.gen::<f64>();
        }

        let batcher = PairBatcher::<B>::new(self.device.clone(), vocab.pad_id());

        let mut print_loss   = 0.0f64;
        let mut print_count  = 0usize;
        let mut print_forced = 0usize;
        let mut last_loss    = f64::NAN;

        tracing::info!("Training from iteration {}", plan.start_iteration);
        for iteration in first..=plan.n_iteration {
            let pairs = dataset.pairs_at(&batches[iteration - 1]);
            let encoded = pairs
                .iter()
                .map(|p| vocab.encode_pair(p))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Cannot encode batch for iteration {iteration}"))?;
            let batch = batcher.batch(encoded);

            let report = self.train_step(&batch);
            last_loss     = report.avg_loss;
            print_loss   += report.avg_loss;
            print_count  += 1;
            print_forced += usize::from(report.teacher_forced);

            if is_due(iteration, plan.print_every) {
                let avg = print_loss / print_count as f64;
                println!(
                    "Iteration: {}; Percent complete: {:.1}%; Average loss: {:.4}",
                    iteration,
                    iteration as f64 / plan.n_iteration as f64 * 100.0,
                    avg,
                );

                let forced = print_forced as f64 / print_count as f64;
                metrics.log(&IterationMetrics::new(iteration, avg, forced))?;

                print_loss   = 0.0;
                print_count  = 0;
                print_forced = 0;
            }

            if is_due(iteration, plan.save_every) {
                let path = checkpoints.save(self, iteration, last_loss, model_config, vocab)?;
                tracing::info!("Checkpoint saved to '{}'", path.display());
            }
        }

        tracing::info!("Training complete!");
        Ok(last_loss)
    }
}

fn is_due(iteration: usize, every: usize) -> bool {
    every > 0 && iteration % every == 0
}
