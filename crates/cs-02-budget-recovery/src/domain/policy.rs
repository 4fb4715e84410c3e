//! Recovery policy selection.

use crate::error::RecoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed per deployment; never switched while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Discard progress, restore the server's checkpoint, report failure.
    #[default]
    Rollback,
    /// Keep progress, lend the client's scheduling context to the server.
    Emergency,
    /// Keep progress, raise the client's budget step by step.
    Extend,
}

impl RecoveryPolicy {
    pub const ALL: [RecoveryPolicy; 3] = [Self::Rollback, Self::Emergency, Self::Extend];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rollback => "rollback",
            Self::Emergency => "emergency",
            Self::Extend => "extend",
        }
    }

    /// Whether the server runs only on donated contexts.
    ///
    /// Emergency donation needs the server to own a context it can give up.
    pub fn server_is_passive(&self) -> bool {
        !matches!(self, Self::Emergency)
    }
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryPolicy {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rollback" => Ok(Self::Rollback),
            "emergency" | "emergency-budget" => Ok(Self::Emergency),
            "extend" => Ok(Self::Extend),
            other => Err(RecoveryError::InvalidConfig(format!(
                "unknown recovery policy '{other}'"
            ))),
        }
    }
}
