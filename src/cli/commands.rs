// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// The three subcommands: `prepare`, `train` and `chat`, and all
// their flags. Each Args struct converts into the matching
// application-layer config, so the application never sees clap.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    chat_use_case::ChatConfig,
    prepare_use_case::PrepareConfig,
    train_use_case::TrainConfig,
};
use crate::ml::DeviceKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract sentence pairs from the Cornell corpus into a formatted file
    Prepare(PrepareArgs),

    /// Train the seq2seq chatbot on a formatted pair file
    Train(TrainArgs),

    /// Chat with a trained checkpoint
    Chat(ChatArgs),
}

/// Backend to run the model on
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    /// NdArray on the CPU
    Cpu,
    /// WGPU
    Gpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => DeviceKind::Cpu,
            DeviceArg::Gpu => DeviceKind::Gpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory containing movie_lines.txt and movie_conversations.txt
    #[arg(long, default_value = "data/cornell_movie_dialogs_corpus")]
    pub corpus_dir: String,

    /// Output file (default: <corpus_dir>/formatted_movie_lines.txt)
    #[arg(long)]
    pub output_file: Option<String>,

    /// Field delimiter; escapes such as "\t" are resolved
    #[arg(long, default_value = " ")]
    pub delimiter: String,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            corpus_dir:  a.corpus_dir,
            output_file: a.output_file,
            delimiter:   a.delimiter,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Formatted pair file produced by `prepare`
    #[arg(long, default_value = "data/cornell_movie_dialogs_corpus/formatted_movie_lines.txt")]
    pub datafile: String,

    /// Name used in the checkpoint path
    #[arg(long, default_value = "cornell_movie_dialogs_corpus")]
    pub corpus_name: String,

    /// Root directory for checkpoints
    #[arg(long, default_value = "data/save")]
    pub save_dir: String,

    #[arg(long, default_value = "cb_model")]
    pub model_name: String,

    /// Attention scoring: dot, general or concat
    #[arg(long, default_value = "dot")]
    pub attn_model: String,

    #[arg(long, default_value_t = 768)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 2)]
    pub encoder_n_layers: usize,

    /// At most twice the encoder layers
    #[arg(long, default_value_t = 2)]
    pub decoder_n_layers: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Pairs with this many words or more on either side are dropped
    #[arg(long, default_value_t = 10)]
    pub max_length: usize,

    /// Gradient norm limit (0 disables clipping)
    #[arg(long, default_value_t = 50.0)]
    pub clip: f64,

    /// Probability a batch is decoded with ground-truth inputs
    #[arg(long, default_value_t = 1.0)]
    pub teacher_forcing_ratio: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// Decoder learning rate = learning_rate × this
    #[arg(long, default_value_t = 5.0)]
    pub decoder_learning_ratio: f64,

    #[arg(long, default_value_t = 50_000)]
    pub n_iteration: usize,

    /// Report every N iterations (0 = never)
    #[arg(long, default_value_t = 1)]
    pub print_every: usize,

    /// Checkpoint every N iterations (0 = never)
    #[arg(long, default_value_t = 10_000)]
    pub save_every: usize,

    /// Resume from this checkpoint iteration
    #[arg(long)]
    pub checkpoint_iter: Option<usize>,

    /// Pretrained tokenizer.json instead of building a word-level one
    #[arg(long)]
    pub tokenizer_path: Option<String>,

    /// Largest id range when building the vocabulary
    #[arg(long, default_value_t = 30_522)]
    pub vocab_size: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,

    /// Seed for batch sampling and teacher-forcing draws
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            datafile:               a.datafile,
            corpus_name:            a.corpus_name,
            save_dir:               a.save_dir,
            model_name:             a.model_name,
            attn_model:             a.attn_model,
            hidden_size:            a.hidden_size,
            encoder_n_layers:       a.encoder_n_layers,
            decoder_n_layers:       a.decoder_n_layers,
            dropout:                a.dropout,
            batch_size:             a.batch_size,
            max_length:             a.max_length,
            clip:                   a.clip,
            teacher_forcing_ratio:  a.teacher_forcing_ratio,
            learning_rate:          a.learning_rate,
            decoder_learning_ratio: a.decoder_learning_ratio,
            n_iteration:            a.n_iteration,
            print_every:            a.print_every,
            save_every:             a.save_every,
            checkpoint_iter:        a.checkpoint_iter,
            tokenizer_path:         a.tokenizer_path,
            vocab_size:             a.vocab_size,
            device:                 a.device.into(),
            seed:                   a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Run directory, e.g. data/save/cb_model/<corpus>/2-2_768
    #[arg(long)]
    pub checkpoint_dir: String,

    /// Checkpoint iteration (default: latest)
    #[arg(long)]
    pub iteration: Option<usize>,

    /// Tokens generated per reply
    #[arg(long, default_value_t = 10)]
    pub max_length: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}

impl From<ChatArgs> for ChatConfig {
    fn from(a: ChatArgs) -> Self {
        ChatConfig {
            checkpoint_dir: a.checkpoint_dir,
            iteration:      a.iteration,
            max_length:     a.max_length,
            device:         a.device.into(),
        }
    }
}
