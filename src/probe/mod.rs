//! Identity probe seam
//!
//! The engine never talks to the target itself: every candidate is handed to a
//! [`Probe`], which answers with a [`ProbeOutcome`]. The Kerberos pre-auth
//! exchange lives behind this trait.

mod command;

pub use command::CommandProbe;

use async_trait::async_trait;

use crate::types::{ProbeOutcome, Target};

/// Trait for identity verification methods
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check whether `username` exists on `target`
    async fn probe(&self, username: &str, target: &Target) -> ProbeOutcome;

    /// Get the probe name
    fn name(&self) -> &str;
}

/// Probe that only prints candidates to stdout and reports every one as
/// invalid. Turns a run into a pure candidate generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProbe;

#[async_trait]
impl Probe for DryRunProbe {
    async fn probe(&self, username: &str, _target: &Target) -> ProbeOutcome {
        println!("{}", username);
        ProbeOutcome::Invalid
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
