//! Core types and structures for userforge

use std::path::PathBuf;
use std::time::Duration;

use crate::config_error;
use crate::error::Result;

/// Default state file name, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// Result reported by a probe for a single candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The identity exists on the target
    Valid,
    /// The target reported the identity does not exist
    Invalid,
    /// The probe could not decide (network failure, unexpected reply, ...)
    Error(String),
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Valid => write!(f, "valid"),
            ProbeOutcome::Invalid => write!(f, "invalid"),
            ProbeOutcome::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Service the candidates are probed against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    /// Full domain name, e.g. `corp.example.com`
    pub domain: String,
    /// KDC address; resolved by the probe when absent
    pub kdc: Option<String>,
}

impl Target {
    pub fn new(domain: impl Into<String>, kdc: Option<String>) -> Self {
        Self {
            domain: domain.into(),
            kdc,
        }
    }

    /// Kerberos realm: the upper-cased domain
    pub fn realm(&self) -> String {
        self.domain.to_uppercase()
    }
}

/// Configuration for an enumeration run
#[derive(Debug, Clone)]
pub struct EnumConfig {
    /// Number of concurrent probe workers (also the queue capacity)
    pub threads: usize,
    /// Delay applied by the producer before each enqueue
    pub delay: Duration,
    /// How long in-flight work may drain after an interrupt
    pub drain_timeout: Duration,
    /// Probe target
    pub target: Target,
    /// Checkpoint location
    pub state_file: PathBuf,
}

impl Default for EnumConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            delay: Duration::ZERO,
            drain_timeout: Duration::from_secs(10),
            target: Target::default(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl EnumConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(config_error!("thread count must be at least 1, got {}", self.threads));
        }
        Ok(())
    }
}
