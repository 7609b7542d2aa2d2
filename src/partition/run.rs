//! Run identity.
//!
//! Every partition run is scoped by a [`RunToken`]. The token is written to
//! each visited node as its `visited` stamp, so a level stored on a node only
//! belongs to a run if the stamps match.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Opaque identifier of one partition run. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(Arc<str>);

impl RunToken {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Arc::from(token.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunToken {
    fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for RunToken {
    fn from(s: String) -> Self { Self(Arc::from(s)) }
}

impl PartialEq<str> for RunToken {
    fn eq(&self, other: &str) -> bool { &*self.0 == other }
}

/// Sequence shared by every issuer in the process.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Issues monotonically numbered run tokens.
///
/// Tokens look like `run-18f2a3c4d5e-1f4a-7`: prefix, the issuer's creation
/// time in hex microseconds, the process id in hex, then a sequence number
/// drawn from a process-wide counter. Issuers in one process never hand out
/// the same sequence number, whatever their prefix or creation time.
#[derive(Debug)]
pub struct RunIssuer {
    prefix: String,
    epoch: String,
    issued: AtomicU64,
}

impl RunIssuer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            epoch: format!("{:x}-{:x}", Utc::now().timestamp_micros(), std::process::id()),
            issued: AtomicU64::new(0),
        }
    }

    /// Mint the next token.
    pub fn issue(&self) -> RunToken {
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        self.issued.fetch_add(1, Ordering::Relaxed);
        RunToken::from(format!("{}-{}-{}", self.prefix, self.epoch, seq))
    }

    /// Number of tokens this issuer has minted.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl Default for RunIssuer {
    fn default() -> Self {
        Self::new("run")
    }
}
