// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands off to Layer 2.
//
//   1. `prepare` — corpus → formatted pair file
//   2. `train`   — formatted pairs → checkpoints
//   3. `chat`    — interactive loop over a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{ChatArgs, Commands, PrepareArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "movie-chatbot",
    version,
    about = "Train a seq2seq attention chatbot on the Cornell movie-dialogue corpus, then chat with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args) => run_prepare(args),
            Commands::Train(args)   => run_train(args),
            Commands::Chat(args)    => run_chat(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    tracing::info!("Preparing corpus in: {}", args.corpus_dir);
    let (path, count) = PrepareUseCase::new(args.into()).execute()?;
    println!("Wrote {} pairs to {}", count, path.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.datafile);
    let summary = TrainUseCase::new(args.into()).execute()?;
    println!(
        "Training complete on {} pairs. Checkpoints in {}",
        summary.pairs,
        summary.run_dir.display()
    );
    Ok(())
}

fn run_chat(args: ChatArgs) -> Result<()> {
    use crate::application::chat_use_case;

    chat_use_case::run(&args.into())
}
