//! Domain primitives: TimeMs, UserId, MachineId.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time in milliseconds since Unix epoch.
///
/// A value of 0 on a machine's `last_claimed_at` means "never claimed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier` (negative if `earlier` is in the future).
    pub fn since(&self, earlier: TimeMs) -> i64 {
        self.0 - earlier.0
    }
}

/// Opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a UserId from a string.
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        UserId(Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque machine identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(pub String);

impl MachineId {
    /// Create a MachineId from a string.
    pub fn new(id: String) -> Self {
        MachineId(id)
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        MachineId(Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
