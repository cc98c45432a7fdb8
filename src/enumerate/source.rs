//! Candidate sources: list replay and combinatorial generation

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace};

use super::formats::FormatTemplate;
use super::state::{fingerprint, Cursor};
use crate::error::{Result, UserForgeError};
use crate::username::{Normalizer, UsernameFormatter};
use crate::validation_error;

/// A normalized username ready to be probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub username: String,
    /// Enumeration position, for sources that can resume
    pub position: Option<Cursor>,
}

/// Read a names/surnames list, trimming lines and skipping blank ones
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| UserForgeError::io_at(e, path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Streams candidates from a line-delimited wordlist
pub struct ListSource {
    reader: BufReader<BoxedReader>,
    buf: Vec<u8>,
    line_number: u64,
    normalizer: Box<dyn Normalizer>,
}

impl ListSource {
    /// Open a wordlist; `-` reads standard input
    pub async fn open(path: &str) -> Result<Self> {
        if path == "-" {
            return Ok(Self::from_reader(tokio::io::stdin()));
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| UserForgeError::io_at(e, Path::new(path)))?;
        Ok(Self::from_reader(file))
    }

    pub fn from_reader(reader: impl AsyncRead + Unpin + Send + 'static) -> Self {
        let boxed: BoxedReader = Box::new(reader);
        Self {
            reader: BufReader::new(boxed),
            buf: Vec::new(),
            line_number: 0,
            normalizer: Box::new(UsernameFormatter::new()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Next valid candidate; malformed lines are logged and skipped.
    ///
    /// Lines are read as raw bytes, so a line that is not UTF-8 is dropped
    /// on its own instead of ending the stream.
    pub async fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                trace!(lines = self.line_number, "Wordlist exhausted");
                return Ok(None);
            }
            self.line_number += 1;

            let line = match std::str::from_utf8(trim_line_ending(&self.buf)) {
                Ok(line) => line,
                Err(e) => {
                    debug!(line = self.line_number, error = %e, "[!] Dropping candidate that is not UTF-8");
                    continue;
                }
            };
            if line.trim().is_empty() {
                trace!(line = self.line_number, "Skipping blank line");
                continue;
            }

            match self.normalizer.normalize(line) {
                Ok(username) => {
                    return Ok(Some(Candidate {
                        username,
                        position: None,
                    }))
                }
                Err(e) => debug!(line = self.line_number, raw = %line, error = %e, "[!] Dropping candidate"),
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Expands names × surnames × formats in name-major, format-innermost order
pub struct CombinatorialSource {
    names: Vec<String>,
    surnames: Vec<String>,
    formats: Vec<FormatTemplate>,
    cursor: Cursor,
    normalizer: Box<dyn Normalizer>,
}

impl CombinatorialSource {
    /// Create a source positioned at the start of the enumeration
    pub fn new(names: Vec<String>, surnames: Vec<String>, formats: Vec<FormatTemplate>) -> Self {
        Self {
            names,
            surnames,
            formats,
            cursor: Cursor::default(),
            normalizer: Box::new(UsernameFormatter::new()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Continue from a previously persisted cursor
    pub fn resume_from(mut self, cursor: Cursor) -> Result<Self> {
        self.check_bounds(cursor)?;
        self.cursor = cursor;
        Ok(self)
    }

    fn check_bounds(&self, cursor: Cursor) -> Result<()> {
        let (n, s, f) = (self.names.len(), self.surnames.len(), self.formats.len());
        let at_end = cursor.names_index == n && cursor.surnames_index == 0 && cursor.formats_index == 0;
        let inside = cursor.names_index < n && cursor.surnames_index < s && cursor.formats_index < f;

        if cursor == Cursor::default() || at_end || inside {
            Ok(())
        } else {
            Err(validation_error!(
                "Cursor {} is out of range for {} names, {} surnames and {} formats",
                cursor,
                n,
                s,
                f
            ))
        }
    }

    /// Position of the next candidate
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Total number of triples, valid or not
    pub fn total(&self) -> u64 {
        self.names.len() as u64 * self.surnames.len() as u64 * self.formats.len() as u64
    }

    /// Triples already consumed
    pub fn ordinal(&self) -> u64 {
        if self.is_exhausted() {
            return self.total();
        }
        self.cursor.ordinal(self.surnames.len(), self.formats.len())
    }

    pub fn remaining(&self) -> u64 {
        self.total().saturating_sub(self.ordinal())
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.names_index >= self.names.len() || self.surnames.is_empty() || self.formats.is_empty()
    }

    /// Digest of the inputs, stored next to the cursor
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.names, &self.surnames, &self.formats)
    }

    fn advance(&mut self) {
        self.cursor.formats_index += 1;
        if self.cursor.formats_index >= self.formats.len() {
            self.cursor.formats_index = 0;
            self.cursor.surnames_index += 1;
            if self.cursor.surnames_index >= self.surnames.len() {
                self.cursor.surnames_index = 0;
                self.cursor.names_index += 1;
            }
        }
    }
}

impl Iterator for CombinatorialSource {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.is_exhausted() {
            let position = self.cursor;
            let raw = self.formats[position.formats_index].render(
                &self.names[position.names_index],
                &self.surnames[position.surnames_index],
            );
            self.advance();

            match self.normalizer.normalize(&raw) {
                Ok(username) => {
                    return Some(Candidate {
                        username,
                        position: Some(position),
                    })
                }
                Err(e) => debug!(raw = %raw, cursor = %position, error = %e, "[!] Dropping candidate"),
            }
        }
        None
    }
}

/// Unified source wrapper
pub enum CandidateSource {
    List(ListSource),
    Combinatorial(CombinatorialSource),
}

impl CandidateSource {
    pub async fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        match self {
            CandidateSource::List(s) => s.next_candidate().await,
            CandidateSource::Combinatorial(s) => Ok(s.next()),
        }
    }

    /// Resume position, for sources that support it
    pub fn cursor(&self) -> Option<Cursor> {
        match self {
            CandidateSource::List(_) => None,
            CandidateSource::Combinatorial(s) => Some(s.cursor()),
        }
    }

    pub fn fingerprint(&self) -> Option<String> {
        match self {
            CandidateSource::List(_) => None,
            CandidateSource::Combinatorial(s) => Some(s.fingerprint()),
        }
    }

    /// Known size of the enumeration
    pub fn total(&self) -> Option<u64> {
        match self {
            CandidateSource::List(_) => None,
            CandidateSource::Combinatorial(s) => Some(s.total()),
        }
    }

    /// Triples left to generate
    pub fn remaining(&self) -> Option<u64> {
        match self {
            CandidateSource::List(_) => None,
            CandidateSource::Combinatorial(s) => Some(s.remaining()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CandidateSource::List(_) => "list",
            CandidateSource::Combinatorial(_) => "combinatorial",
        }
    }
}

impl From<ListSource> for CandidateSource {
    fn from(source: ListSource) -> Self {
        CandidateSource::List(source)
    }
}

impl From<CombinatorialSource> for CandidateSource {
    fn from(source: CombinatorialSource) -> Self {
        CandidateSource::Combinatorial(source)
    }
}
