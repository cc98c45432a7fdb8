//! Probe backed by an external program

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::Probe;
use crate::error::UserForgeError;
use crate::types::{ProbeOutcome, Target};

/// Runs `<program> [args..] <username>` per candidate.
///
/// The target is passed through the environment (`USERFORGE_DOMAIN`,
/// `USERFORGE_REALM`, `USERFORGE_KDC`). Exit status 0 means the identity
/// exists, 1 means it does not; anything else is an inconclusive result.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    name: String,
}

impl CommandProbe {
    /// Create a probe for `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = format!("command:{}", program.display());
        Self {
            program,
            args: Vec::new(),
            timeout: Duration::from_secs(30),
            name,
        }
    }

    /// Build a probe from a shell-like command line (`prog --flag value`)
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).with_args(words.map(str::to_string).collect()))
    }

    /// Fixed arguments placed before the username
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Per-candidate timeout; an expired probe counts as an error
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, username: &str, target: &Target) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(username)
            .env("USERFORGE_DOMAIN", &target.domain)
            .env("USERFORGE_REALM", target.realm())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(kdc) = &target.kdc {
            cmd.env("USERFORGE_KDC", kdc);
        }
        cmd
    }
}

fn inconclusive(err: UserForgeError) -> ProbeOutcome {
    ProbeOutcome::Error(err.to_string())
}

#[async_trait]
impl Probe for CommandProbe {
    async fn probe(&self, username: &str, target: &Target) -> ProbeOutcome {
        let mut cmd = self.command(username, target);

        let status = match tokio::time::timeout(self.timeout, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return inconclusive(UserForgeError::probe(
                    username,
                    format!("failed to spawn {}: {}", self.program.display(), e),
                ))
            }
            Err(_) => {
                return inconclusive(UserForgeError::timeout(
                    format!("probe for '{}'", username),
                    self.timeout,
                ))
            }
        };

        match status.code() {
            Some(0) => ProbeOutcome::Valid,
            Some(1) => ProbeOutcome::Invalid,
            Some(code) => inconclusive(UserForgeError::probe(
                username,
                format!("probe exited with status {}", code),
            )),
            None => inconclusive(UserForgeError::probe(username, "probe terminated by signal")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
