//! Typed ID wrappers.
//!
//! Delivery jobs are identified by a newtype around a UUID so that job IDs
//! cannot be confused with chat identifiers or other strings in log fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single delivery job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
