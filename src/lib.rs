//! userforge - resumable username enumeration
//!
//! Generates candidate usernames from wordlists or from name × surname ×
//! format combinations, probes them concurrently at a controlled rate and
//! checkpoints the exact enumeration position so interrupted runs resume
//! where they stopped.

pub mod enumerate;
pub mod error;
pub mod probe;
pub mod types;
pub mod username;

// Re-export commonly used types
pub use error::{Result, UserForgeError};
pub use types::{EnumConfig, ProbeOutcome, Target};

// Re-export main functionality
pub use enumerate::{
    CandidateSource, CheckpointManager, CombinatorialSource, Cursor, Enumerator, FormatLevel,
    ListSource, RunOutcome, RunReport, ShutdownSignal,
};
pub use probe::{CommandProbe, DryRunProbe, Probe};
pub use username::{Normalizer, UsernameFormatter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() -> Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();
    Ok(())
}
