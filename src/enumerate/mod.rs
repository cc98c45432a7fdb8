//! Enumeration engine - generate, schedule, count and checkpoint candidates
//!
//! Sources produce candidates in a fixed order, a bounded queue feeds them to
//! a pool of probe workers, and the combinatorial cursor is persisted on
//! shutdown so the next run can pick up where this one stopped.

mod formats;
mod pipeline;
mod progress;
mod shutdown;
mod source;
mod state;

pub use formats::{FormatLevel, FormatTemplate};
pub use pipeline::{CheckpointStatus, Enumerator, RunOutcome, RunReport};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use shutdown::ShutdownSignal;
pub use source::{read_lines, Candidate, CandidateSource, CombinatorialSource, ListSource};
pub use state::{fingerprint, CheckpointManager, Cursor, RunState};
