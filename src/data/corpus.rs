// ============================================================
// Layer 4 — Cornell Movie-Dialogs Corpus Loader
// ============================================================
// Reads the two raw corpus files and turns conversations into
// consecutive (prompt, response) pairs.
//
// File format (ISO-8859-1, fields separated by " +++$+++ "):
//
//   movie_lines.txt
//     L1045 +++$+++ u0 +++$+++ m0 +++$+++ BIANCA +++$+++ They do not!
//
//   movie_conversations.txt
//     u0 +++$+++ u2 +++$+++ m0 +++$+++ ['L194', 'L195', 'L196', 'L197']
//
// A line with too few fields, or a conversation that points at
// an unknown line id, aborts the load. There is no recovery.
//
// A conversation of N lines yields N-1 pairs:
//   (L194 → L195), (L195 → L196), (L196 → L197)

use anyhow::{Context, Result};
use regex::Regex;
use std::{collections::HashMap, fs, path::{Path, PathBuf}};

use crate::domain::error::CorpusError;
use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::PairSource;

/// Field separator used by both corpus files
pub const FIELD_SEPARATOR: &str = " +++$+++ ";

pub const LINES_FILE: &str = "movie_lines.txt";
pub const CONVERSATIONS_FILE: &str = "movie_conversations.txt";

const LINE_FIELD_COUNT: usize = 5;
const CONVERSATION_FIELD_COUNT: usize = 4;

/// One utterance from movie_lines.txt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieLine {
    pub line_id:      String,
    pub character_id: String,
    pub movie_id:     String,
    pub character:    String,
    pub text:         String,
}

/// One conversation from movie_conversations.txt, with its
/// utterances resolved in order. The speaker and movie columns are
/// already carried by each MovieLine.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub lines: Vec<MovieLine>,
}

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of
/// the same value, so this cannot fail.
fn read_latin1(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Split a raw record and check it has at least `expected` fields.
fn split_fields<'a>(
    raw:      &'a str,
    expected: usize,
    file:     &str,
    line:     usize,
) -> Result<Vec<&'a str>, CorpusError> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() < expected {
        return Err(CorpusError::MissingFields {
            file: file.to_string(),
            line,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

/// Parse the contents of movie_lines.txt into a map keyed by line id.
pub fn parse_lines(contents: &str, file: &str) -> Result<HashMap<String, MovieLine>, CorpusError> {
    let mut lines = HashMap::new();
    for (idx, raw) in contents.lines().enumerate() {
        let f = split_fields(raw, LINE_FIELD_COUNT, file, idx + 1)?;
        let line = MovieLine {
            line_id:      f[0].to_string(),
            character_id: f[1].to_string(),
            movie_id:     f[2].to_string(),
            character:    f[3].to_string(),
            text:         f[4].to_string(),
        };
        lines.insert(line.line_id.clone(), line);
    }
    Ok(lines)
}

/// Parse the contents of movie_conversations.txt, resolving every
/// utterance id against `lines`.
pub fn parse_conversations(
    contents: &str,
    file:     &str,
    lines:    &HashMap<String, MovieLine>,
) -> Result<Vec<Conversation>> {
    let utterance_id = Regex::new(r"L[0-9]+")?;
    let mut conversations = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let f = split_fields(raw, CONVERSATION_FIELD_COUNT, file, idx + 1)?;

        let mut resolved = Vec::new();
        for id in utterance_id.find_iter(f[3]).map(|m| m.as_str()) {
            let line = lines.get(id).ok_or_else(|| CorpusError::UnknownLineId {
                file: file.to_string(),
                line: idx + 1,
                id:   id.to_string(),
            })?;
            resolved.push(line.clone());
        }

        conversations.push(Conversation { lines: resolved });
    }
    Ok(conversations)
}

/// Turn each conversation into consecutive (line i, line i+1) pairs.
/// Pairs where either side is blank after trimming are dropped.
pub fn extract_sentence_pairs(conversations: &[Conversation]) -> Vec<SentencePair> {
    conversations
        .iter()
        .flat_map(|conv| conv.lines.windows(2))
        .filter_map(|w| {
            let prompt   = w[0].text.trim();
            let response = w[1].text.trim();
            (!prompt.is_empty() && !response.is_empty())
                .then(|| SentencePair::new(prompt, response))
        })
        .collect()
}

/// The raw corpus directory, holding movie_lines.txt and
/// movie_conversations.txt.
pub struct CornellCorpus {
    dir: PathBuf,
}

impl CornellCorpus {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_conversations(&self) -> Result<Vec<Conversation>> {
        let lines_path = self.dir.join(LINES_FILE);
        let convs_path = self.dir.join(CONVERSATIONS_FILE);

        tracing::info!("Loading lines from '{}'", lines_path.display());
        let lines = parse_lines(&read_latin1(&lines_path)?, LINES_FILE)?;
        tracing::info!("Loaded {} lines", lines.len());

        tracing::info!("Loading conversations from '{}'", convs_path.display());
        let conversations =
            parse_conversations(&read_latin1(&convs_path)?, CONVERSATIONS_FILE, &lines)?;
        tracing::info!("Loaded {} conversations", conversations.len());

        Ok(conversations)
    }
}

impl PairSource for CornellCorpus {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let conversations = self.load_conversations()?;
        Ok(extract_sentence_pairs(&conversations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: &str = "\
L1045 +++$+++ u0 +++$+++ m0 +++$+++ BIANCA +++$+++ They do not!
L1044 +++$+++ u2 +++$+++ m0 +++$+++ CAMERON +++$+++ They do to!
L985 +++$+++ u0 +++$+++ m0 +++$+++ BIANCA +++$+++ I hope so.
L984 +++$+++ u2 +++$+++ m0 +++$+++ CAMERON +++$+++ She okay?
L100 +++$+++ u2 +++$+++ m0 +++$+++ CAMERON +++$+++    ";

    const CONVERSATIONS: &str = "\
u0 +++$+++ u2 +++$+++ m0 +++$+++ ['L1044', 'L1045']
u0 +++$+++ u2 +++$+++ m0 +++$+++ ['L984', 'L985', 'L100']";

    #[test]
    fn test_parse_lines() {
        let lines = parse_lines(LINES, "lines").unwrap();
        assert_eq!(lines.len(), 5);
        let l = &lines["L1045"];
        assert_eq!(l.character, "BIANCA");
        assert_eq!(l.text, "They do not!");
    }

    #[test]
    fn test_parse_lines_rejects_short_record() {
        let err = parse_lines("L1 +++$+++ u0 +++$+++ m0", "lines").unwrap_err();
        assert_eq!(
            err,
            CorpusError::MissingFields {
                file: "lines".into(),
                line: 1,
                expected: 5,
                found: 3,
            }
        );
    }

    #[test]
    fn test_conversations_resolve_in_order() {
        let lines = parse_lines(LINES, "lines").unwrap();
        let convs = parse_conversations(CONVERSATIONS, "convs", &lines).unwrap();
        assert_eq!(convs.len(), 2);
        let ids: Vec<&str> = convs[1].lines.iter().map(|l| l.line_id.as_str()).collect();
        assert_eq!(ids, vec!["L984", "L985", "L100"]);
    }

    #[test]
    fn test_unknown_line_id_is_fatal() {
        let lines = parse_lines(LINES, "lines").unwrap();
        let result = parse_conversations(
            "u0 +++$+++ u2 +++$+++ m0 +++$+++ ['L1', 'L2']",
            "convs",
            &lines,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_pairs_skips_blank_lines() {
        let lines = parse_lines(LINES, "lines").unwrap();
        let convs = parse_conversations(CONVERSATIONS, "convs", &lines).unwrap();
        let pairs = extract_sentence_pairs(&convs);
        // L1044→L1045, L984→L985; L985→L100 is dropped because L100 is blank
        assert_eq!(
            pairs,
            vec![
                SentencePair::new("They do to!", "They do not!"),
                SentencePair::new("She okay?", "I hope so."),
            ]
        );
    }

    #[test]
    fn test_corpus_reads_latin1_files() {
        let dir = tempfile::tempdir().unwrap();
        // 0xE9 is 'é' in ISO-8859-1 and invalid as a lone UTF-8 byte
        let mut lines = b"L1 +++$+++ u0 +++$+++ m0 +++$+++ A +++$+++ Caf\xE9?\n".to_vec();
        lines.extend_from_slice(b"L2 +++$+++ u1 +++$+++ m0 +++$+++ B +++$+++ Yes.\n");
        fs::write(dir.path().join(LINES_FILE), lines).unwrap();
        fs::write(
            dir.path().join(CONVERSATIONS_FILE),
            "u0 +++$+++ u1 +++$+++ m0 +++$+++ ['L1', 'L2']\n",
        )
        .unwrap();

        let pairs = CornellCorpus::new(dir.path()).load_pairs().unwrap();
        assert_eq!(pairs, vec![SentencePair::new("Café?", "Yes.")]);
    }
}
