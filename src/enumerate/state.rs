//! Run state persistence for resume capability

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::formats::FormatTemplate;
use super::source::CombinatorialSource;
use crate::error::{Result, UserForgeError};
use crate::types::DEFAULT_STATE_FILE;

/// Position in the name × surname × format enumeration.
///
/// Points at the next triple to emit. Inner indices are reset to zero whenever
/// an enclosing index advances, so the cursor only ever grows in
/// lexicographic order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cursor {
    pub names_index: usize,
    pub surnames_index: usize,
    pub formats_index: usize,
}

impl Cursor {
    pub fn new(names_index: usize, surnames_index: usize, formats_index: usize) -> Self {
        Self {
            names_index,
            surnames_index,
            formats_index,
        }
    }

    /// Number of triples that precede this cursor for the given list sizes
    pub fn ordinal(&self, surnames: usize, formats: usize) -> u64 {
        let (s, f) = (surnames as u64, formats as u64);
        self.names_index as u64 * s * f + self.surnames_index as u64 * f + self.formats_index as u64
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.names_index, self.surnames_index, self.formats_index
        )
    }
}

/// Contents of the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(flatten)]
    pub cursor: Cursor,
    /// Digest of the input lists the cursor refers to
    #[serde(rename = "Fingerprint", default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl RunState {
    pub fn new(cursor: Cursor, fingerprint: Option<String>) -> Self {
        Self { cursor, fingerprint }
    }

    /// Check that this state was produced from the same inputs.
    ///
    /// States written without a fingerprint are accepted as-is.
    pub fn verify(&self, expected: &str) -> Result<()> {
        match &self.fingerprint {
            Some(found) if found != expected => Err(UserForgeError::validation(
                "State file was written for different names, surnames or formats; \
                 supply the original inputs or remove the state file",
            )),
            Some(_) => Ok(()),
            None => {
                warn!("State file has no fingerprint; assuming the input lists are unchanged");
                Ok(())
            }
        }
    }
}

/// Digest of the inputs a cursor indexes into
pub fn fingerprint(names: &[String], surnames: &[String], formats: &[FormatTemplate]) -> String {
    let mut hasher = Sha256::new();
    for section in [names.len(), surnames.len(), formats.len()] {
        hasher.update((section as u64).to_le_bytes());
    }
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([0xffu8]);
    for surname in surnames {
        hasher.update(surname.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([0xffu8]);
    for format in formats {
        hasher.update(format.pattern().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Reads and writes the state file
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    path: PathBuf,
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl CheckpointManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get default state file path
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_STATE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state, replacing any previous file.
    ///
    /// The content goes to a sibling `.tmp` file first and is renamed over
    /// the target, so readers never observe a half-written state.
    pub fn save(&self, state: &RunState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| UserForgeError::internal(format!("Failed to serialize state: {}", e)))?;

        let tmp = self.tmp_path();
        std::fs::write(&tmp, content).map_err(|e| self.error(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            self.error(e.to_string())
        })
    }

    /// Load state; `Ok(None)` when no state file exists
    pub fn load(&self) -> Result<Option<RunState>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file found, new scan");
                return Ok(None);
            }
            Err(e) => return Err(self.error(e.to_string())),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| self.error(format!("Malformed state file: {}", e)))
    }

    /// Position `source` at the saved cursor.
    ///
    /// A missing state file means a fresh run from the zero cursor; a state
    /// written for different inputs is rejected.
    pub fn restore(&self, source: CombinatorialSource) -> Result<CombinatorialSource> {
        let Some(state) = self.load()? else {
            return Ok(source);
        };

        state.verify(&source.fingerprint())?;
        info!(cursor = %state.cursor, path = %self.path.display(), "Resuming from saved state");
        source.resume_from(state.cursor)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn error(&self, message: String) -> UserForgeError {
        UserForgeError::checkpoint(message, Some(self.path.to_string_lossy().to_string()))
    }
}
