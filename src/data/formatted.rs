// ============================================================
// Layer 4 — Formatted Pair File
// ============================================================
// The intermediate file between corpus parsing and training.
// One pair per line:
//
//   <prompt><delim>[SEP]<delim><response>
//
// The delimiter is configurable and may be given with escape
// sequences ("\t" on the command line becomes a real tab).
// Reading splits on the literal [SEP] marker, so the delimiter
// itself never has to be parsed back.

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::data::normalizer::TextNormalizer;
use crate::domain::error::CorpusError;
use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::PairSource;

/// Marker placed between prompt and response
pub const SEPARATOR_MARKER: &str = "[SEP]";

/// Resolve backslash escapes in a delimiter given on the command line.
/// Unknown escapes are kept verbatim.
pub fn unescape_delimiter(raw: &str) -> String {
    let mut out   = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t')   => out.push('\t'),
            Some('n')   => out.push('\n'),
            Some('r')   => out.push('\r'),
            Some('s')   => out.push(' '),
            Some('\\')  => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Write pairs to `path`, one per line.
pub fn write_formatted(path: &Path, pairs: &[SentencePair], delimiter: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    for pair in pairs {
        writeln!(
            w,
            "{}{d}{}{d}{}",
            pair.prompt,
            SEPARATOR_MARKER,
            pair.response,
            d = delimiter,
        )?;
    }
    w.flush()?;
    tracing::info!("Wrote {} pairs to '{}'", pairs.len(), path.display());
    Ok(())
}

/// Split one formatted line into its raw (prompt, response) halves.
pub fn split_formatted_line(raw: &str, file: &str, line: usize) -> Result<(String, String), CorpusError> {
    let parts: Vec<&str> = raw.split(SEPARATOR_MARKER).collect();
    if parts.len() != 2 {
        return Err(CorpusError::MissingSeparator {
            file: file.to_string(),
            line,
            marker: SEPARATOR_MARKER,
        });
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// The formatted file as a pair source. Pairs are normalised as
/// they are read.
pub struct FormattedPairFile {
    path: PathBuf,
}

impl FormattedPairFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PairSource for FormattedPairFile {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!(
                "Cannot read '{}'. Run 'prepare' first.", self.path.display()
            ))?;
        let file = self.path.display().to_string();
        let normalizer = TextNormalizer::new()?;

        let mut pairs = Vec::new();
        for (idx, raw) in contents.trim().lines().enumerate() {
            let (prompt, response) = split_formatted_line(raw.trim(), &file, idx + 1)?;
            pairs.push(SentencePair::new(
                normalizer.normalize(&prompt)?,
                normalizer.normalize(&response)?,
            ));
        }
        tracing::info!("Read {} sentence pairs from '{}'", pairs.len(), file);
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_tab() {
        assert_eq!(unescape_delimiter(r"\t"), "\t");
        assert_eq!(unescape_delimiter(" "), " ");
        assert_eq!(unescape_delimiter(r"a\qb"), r"a\qb");
    }

    #[test]
    fn test_split_requires_single_marker() {
        assert!(split_formatted_line("no marker here", "f", 1).is_err());
        assert!(split_formatted_line("a [SEP] b [SEP] c", "f", 1).is_err());
        let (p, r) = split_formatted_line("hello [SEP] hi", "f", 1).unwrap();
        assert_eq!((p.as_str(), r.as_str()), ("hello ", " hi"));
    }

    #[test]
    fn test_written_file_reads_back_normalised() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("formatted.txt");
        let pairs = vec![
            SentencePair::new("They do not!", "They do to!"),
            SentencePair::new("Can we make this quick?", "Sure."),
        ];
        write_formatted(&path, &pairs, "\t").unwrap();

        let read = FormattedPairFile::new(&path).load_pairs().unwrap();
        assert_eq!(
            read,
            vec![
                SentencePair::new("they do not !", "they do to !"),
                SentencePair::new("can we make this quick ?", "sure ."),
            ]
        );
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "hello [SEP] there\nno separator\n").unwrap();
        assert!(FormattedPairFile::new(&path).load_pairs().is_err());
    }
}
