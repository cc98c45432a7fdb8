//! Username syntax normalization
//!
//! Every candidate passes through a [`Normalizer`] before it is queued. The
//! default [`UsernameFormatter`] follows the usual Active Directory rules for
//! the user part of a principal.

mod formatter;

pub use formatter::UsernameFormatter;

use crate::error::Result;

/// Turns a raw candidate into the exact string handed to the probe.
///
/// Implementations must be pure: the same input always yields the same
/// output, since resumed runs rely on reproducing the candidate sequence.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Result<String>;
}
