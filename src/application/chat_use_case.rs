// ============================================================
// Layer 2 — Chat Use Case
// ============================================================
// Interactive loop over a trained checkpoint:
//
//   > user line
//       │ normalise (same rules as training data)
//       │ strict encode — unknown word → message, keep looping
//       ▼
//   greedy search, max_length tokens
//       │ drop [CLS]/[SEP]/[PAD]/[SOS]/[EOS]
//       │ cut after the first "." or "?"
//       │ glue WordPiece "##" pieces onto the previous word
//       ▼
//   Bot: reply
//
// `exit`, `quit` or end of input stops the loop.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

use crate::data::normalizer::TextNormalizer;
use crate::domain::{error::VocabError, traits::Responder};
use crate::infra::{checkpoint::CheckpointManager, vocabulary::Vocabulary};
use crate::ml::{search::GreedySearchDecoder, CpuBackend, DeviceKind, GpuBackend};

pub const UNKNOWN_WORD_MESSAGE: &str = "Error: Encountered unknown word.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Run directory holding `{iteration}_checkpoint/` folders
    pub checkpoint_dir: String,
    /// Defaults to the latest saved iteration
    pub iteration:      Option<usize>,
    /// Greedy decoding steps per reply
    pub max_length:     usize,
    pub device:         DeviceKind,
}

pub struct ChatUseCase<B: Backend> {
    searcher:   GreedySearchDecoder<B>,
    vocab:      Vocabulary,
    normalizer: TextNormalizer,
    max_length: usize,
}

impl<B: Backend> ChatUseCase<B> {
    pub fn load(cfg: &ChatConfig, device: B::Device) -> Result<Self> {
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        let iteration = ckpt.resolve(cfg.iteration)?;

        let (model, meta) = ckpt.load_model::<B>(iteration, &device)?;
        let vocab = ckpt.load_vocabulary(iteration, "chat")?;
        tracing::info!(
            "Chatting with iteration {} (attention={}, hidden={})",
            meta.iteration, meta.model.attn_model, meta.model.hidden_size,
        );

        Ok(Self {
            searcher:   GreedySearchDecoder::new(model, vocab.start_token(), device),
            vocab,
            normalizer: TextNormalizer::new()?,
            max_length: cfg.max_length,
        })
    }
}

impl<B: Backend> Responder for ChatUseCase<B> {
    fn respond(&self, prompt: &str) -> Result<String> {
        let normalized = self.normalizer.normalize(prompt)?;
        let ids = self.vocab.encode_strict(&normalized)?;
        tracing::debug!("Model input: {}", self.vocab.decode(&ids)?);

        let output = self.searcher.search(&ids, self.max_length)?;
        let kept: Vec<u32> = output
            .tokens
            .into_iter()
            .filter(|&id| !self.vocab.is_special(id))
            .collect();

        Ok(format_response(&self.vocab.ids_to_tokens(&kept)))
    }
}

/// Cut after the first "." or "?" and merge "##" continuations.
pub fn format_response(tokens: &[String]) -> String {
    let mut words: Vec<String> = Vec::new();
    for token in tokens {
        match token.strip_prefix("##") {
            Some(piece) => match words.last_mut() {
                Some(last) => last.push_str(piece),
                None       => words.push(piece.to_string()),
            },
            None => words.push(token.clone()),
        }
        if token == "." || token == "?" {
            break;
        }
    }
    words.join(" ")
}

/// Read lines from `input` until exit/quit/EOF, writing replies to `output`.
pub fn run_repl<R: BufRead, W: Write>(responder: &impl Responder, mut input: R, mut output: W) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let sentence = line.trim();
        if sentence == "exit" || sentence == "quit" {
            break;
        }

        match responder.respond(sentence) {
            Ok(reply) => writeln!(output, "Bot: {reply}")?,
            Err(e) => match e.downcast_ref::<VocabError>() {
                Some(VocabError::UnknownToken(word)) => {
                    tracing::debug!("Unknown word '{}'", word);
                    writeln!(output, "{UNKNOWN_WORD_MESSAGE}")?;
                }
                _ => return Err(e),
            },
        }
    }
    Ok(())
}

/// Load the checkpoint on the configured backend and chat over stdin/stdout.
pub fn run(cfg: &ChatConfig) -> Result<()> {
    let stdin  = io::stdin();
    let stdout = io::stdout();
    match cfg.device {
        DeviceKind::Cpu => {
            let chat = ChatUseCase::<CpuBackend>::load(cfg, NdArrayDevice::default())?;
            run_repl(&chat, stdin.lock(), stdout.lock())
        }
        DeviceKind::Gpu => {
            let chat = ChatUseCase::<GpuBackend>::load(cfg, WgpuDevice::default())?;
            run_repl(&chat, stdin.lock(), stdout.lock())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_format_cuts_after_first_stop() {
        assert_eq!(format_response(&tokens(&["i", "am", "fine", ".", "you", "?"])), "i am fine .");
        assert_eq!(format_response(&tokens(&["who", "?", "me", "."])), "who ?");
        assert_eq!(format_response(&tokens(&["no", "stop", "here"])), "no stop here");
    }

    #[test]
    fn test_format_merges_wordpieces() {
        assert_eq!(
            format_response(&tokens(&["play", "##ing", "base", "##ball", "."])),
            "playing baseball ."
        );
        assert_eq!(format_response(&tokens(&["##ly", "ok"])), "ly ok");
    }

    struct Scripted;

    impl Responder for Scripted {
        fn respond(&self, prompt: &str) -> Result<String> {
            match prompt {
                "zebra" => Err(VocabError::UnknownToken("zebra".to_string()).into()),
                "boom"  => Err(anyhow::anyhow!("tensor exploded")),
                other   => Ok(format!("you said {other}")),
            }
        }
    }

    fn run_script(script: &str) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result = run_repl(&Scripted, script.as_bytes(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_repl_replies_until_quit() {
        let (result, out) = run_script("hello\nquit\nnever reached\n");
        assert!(result.is_ok());
        assert_eq!(out, "> Bot: you said hello\n> ");
    }

    #[test]
    fn test_repl_recovers_from_unknown_word() {
        let (result, out) = run_script("zebra\nhi\nexit\n");
        assert!(result.is_ok());
        assert_eq!(out, format!("> {UNKNOWN_WORD_MESSAGE}\n> Bot: you said hi\n> "));
    }

    #[test]
    fn test_repl_propagates_other_errors() {
        let (result, _) = run_script("boom\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_checkpoint_and_respond() {
        use crate::infra::tokenizer_store::TokenizerStore;
        use crate::ml::{model::Seq2SeqConfig, trainer::{adam_trainer, TrainerSettings}};

        let dir = tempfile::tempdir().unwrap();
        let texts = vec!["hello there .".to_string(), "how are you ?".to_string()];
        let tok = TokenizerStore::new(dir.path()).load_or_build(None, &texts, 1000).unwrap();
        let vocab = Vocabulary::new("test", tok);

        let model_cfg = Seq2SeqConfig::new(vocab.size(), 6).with_dropout(0.0);
        let device = Default::default();
        let model = model_cfg.init::<burn::backend::Autodiff<CpuBackend>>(&device).unwrap();
        let settings = TrainerSettings {
            learning_rate: 1e-3,
            decoder_learning_ratio: 5.0,
            teacher_forcing_ratio: 1.0,
            seed: 3,
        };
        let trainer = adam_trainer(model, 50.0, settings, vocab.start_token(), device);
        CheckpointManager::new(dir.path()).save(&trainer, 3, 1.0, &model_cfg, &vocab).unwrap();

        let cfg = ChatConfig {
            checkpoint_dir: dir.path().to_string_lossy().into_owned(),
            iteration:      None,
            max_length:     5,
            device:         DeviceKind::Cpu,
        };
        let chat = ChatUseCase::<CpuBackend>::load(&cfg, Default::default()).unwrap();

        let reply = chat.respond("How are you?").unwrap();
        assert!(reply.split_whitespace().count() <= 5);

        let err = chat.respond("hello zebra").unwrap_err();
        assert!(matches!(err.downcast_ref::<VocabError>(), Some(VocabError::UnknownToken(_))));
    }

    #[test]
    fn test_repl_stops_at_eof() {
        let (result, out) = run_script("hi\n");
        assert!(result.is_ok());
        assert_eq!(out, "> Bot: you said hi\n> \n");
    }
}
