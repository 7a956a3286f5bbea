// SPDX-License-Identifier: MIT OR Apache-2.0
//! abp-router
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Parses `execute.action` and resolves it against the gateway's static
//! target table. Both failure modes here are reached before Core is ever
//! consulted, since an unroutable request cannot be forwarded regardless of
//! what Core decides.

use std::fmt;

use abp_core::{ForwardTarget, TargetTable};

/// Routing failure, carrying the stable DENY reason code C6 surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// `execute.action` was missing, had no `:`, or had an empty half.
    InvalidActionFormat,
    /// The action's service half has no entry in the target table.
    UnknownForwardTarget,
}

impl RouterError {
    /// Stable DENY reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidActionFormat => "invalid_action_format",
            Self::UnknownForwardTarget => "unknown_forward_target",
        }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for RouterError {}

/// Split `action` into `(service, operation)` on the first `:`.
///
/// Both halves are trimmed and must be non-empty after trimming.
pub fn parse_action(action: &str) -> Result<(String, String), RouterError> {
    let (service, operation) = action
        .split_once(':')
        .ok_or(RouterError::InvalidActionFormat)?;
    let service = service.trim();
    let operation = operation.trim();
    if service.is_empty() || operation.is_empty() {
        return Err(RouterError::InvalidActionFormat);
    }
    Ok((service.to_string(), operation.to_string()))
}

/// Look `service` up in `targets`, the configured routing table.
pub fn resolve_target<'a>(
    service: &str,
    targets: &'a TargetTable,
) -> Result<&'a ForwardTarget, RouterError> {
    targets
        .get(service)
        .ok_or(RouterError::UnknownForwardTarget)
}
