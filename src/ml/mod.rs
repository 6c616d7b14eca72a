// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All recurrent-network code lives here.
//
//   gru.rs       — GRU cell, stepped or run over padded sequences
//   encoder.rs   — shared embedding + bidirectional GRU stack
//   attention.rs — Luong dot / general / concat scoring
//   decoder.rs   — one attention-decoder step
//   loss.rs      — NLL masked to real target tokens
//   gradients.rs — global gradient-norm clipping per module
//   model.rs     — encoder + decoder behind one Config
//   trainer.rs   — per-batch step and the iteration loop
//   search.rs    — greedy decoding for chat
//
// Backends: training runs on Autodiff<NdArray> (cpu) or
// Autodiff<Wgpu> (gpu); chat runs on the plain backend.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Luong et al. (2015), Cho et al. (2014)

use serde::{Deserialize, Serialize};

pub mod gru;
pub mod encoder;
pub mod attention;
pub mod decoder;
pub mod loss;
pub mod gradients;
pub mod model;
pub mod trainer;
pub mod search;

pub type CpuBackend = burn::backend::NdArray;
pub type GpuBackend = burn::backend::Wgpu;

/// Which burn backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Gpu,
}
