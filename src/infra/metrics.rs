// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per progress report of the training loop.
//
// Columns:
//   iteration            — iteration the report was taken at
//   avg_loss             — mean per-token loss since the last report
//   teacher_forced_ratio — share of those iterations that used
//                          teacher forcing
//
// Output file: {run_dir}/metrics.csv
//
// Example:
//   iteration,avg_loss,teacher_forced_ratio
//   100,5.912345,1.000000
//   200,4.870021,1.000000
//
// The header is written only when the file is new, so a resumed
// run keeps appending to the same log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const CSV_HEADER: &str = "iteration,avg_loss,teacher_forced_ratio";

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub iteration: usize,

    /// Mean masked NLL per real target token
    pub avg_loss: f64,

    /// Range [0.0, 1.0]
    pub teacher_forced_ratio: f64,
}

impl IterationMetrics {
    pub fn new(iteration: usize, avg_loss: f64, teacher_forced_ratio: f64) -> Self {
        Self { iteration, avg_loss, teacher_forced_ratio }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &IterationMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6}", m.iteration, m.avg_loss, m.teacher_forced_ratio)?;

        tracing::debug!(
            "Logged iteration {} metrics: avg_loss={:.4}",
            m.iteration,
            m.avg_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
