/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the volume scheduler.
//!
//! Two types model the two failure layers:
//!
//! * [`FilterElimination`]: how many hosts one filter removed during a
//!   scheduling pass (diagnostic detail, carried inside errors).
//! * [`SchedulerError`]: top-level failure returned from
//!   [`FilterScheduler::schedule()`](super::FilterScheduler::schedule).
//!
//! Every variant carries enough structured data to emit a fully-qualified
//! `tracing` event and to give the volume a human-readable error reason.
//! None of them is fatal to the scheduler process.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::FILTER_NAMES;
use crate::weights::WEIGHER_NAMES;

// ── Filter diagnostics ────────────────────────────────────────────────────────

/// Outcome of one filter in the chain for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterElimination {
    pub filter: String,
    /// Hosts this filter removed.
    pub eliminated: usize,
    /// Hosts left after this filter ran.
    pub remaining: usize,
}

impl fmt::Display for FilterElimination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} removed {} ({} left)",
            self.filter, self.eliminated, self.remaining
        )
    }
}

/// Render a whole elimination list on one line: `A removed 1 (3 left), B ...`.
pub fn describe_eliminations(eliminations: &[FilterElimination]) -> String {
    eliminations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!("; last failure: {e}"),
        None => String::new(),
    }
}

// ── Top-level scheduler errors ────────────────────────────────────────────────

/// Top-level error type returned by the scheduler.
///
/// | Variant | Retried automatically? |
/// |---|---|
/// | `NoValidHost` | no |
/// | `MaxRetriesExceeded` | no (terminal) |
/// | `UnknownFilter` / `UnknownWeigher` | no (startup configuration) |
/// | `InvalidRequest` | no |
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No host survived the filter chain (or none is known at all).
    ///
    /// `eliminations` tells operators *which* filter emptied the candidate
    /// set.
    #[error("No valid host was found. {reason}")]
    NoValidHost {
        reason: String,
        eliminations: Vec<FilterElimination>,
    },

    /// The request was already scheduled `max_attempts` times.
    #[error(
        "Exceeded max scheduling attempts {max_attempts} for volume '{volume_id}'{}",
        last_error_suffix(.last_error)
    )]
    MaxRetriesExceeded {
        volume_id: String,
        attempts: u32,
        max_attempts: u32,
        last_error: Option<String>,
    },

    /// A configured filter name has no constructor.
    #[error("unknown filter '{0}' (valid: {names})", names = FILTER_NAMES.join(", "))]
    UnknownFilter(String),

    /// A configured weigher name has no constructor.
    #[error("unknown weigher '{0}' (valid: {names})", names = WEIGHER_NAMES.join(", "))]
    UnknownWeigher(String),

    /// The request lacks something the operation needs.
    #[error("invalid request for volume '{volume_id}': {reason}")]
    InvalidRequest { volume_id: String, reason: String },
}

impl SchedulerError {
    /// Shorthand for a `NoValidHost` without filter diagnostics.
    pub fn no_valid_host(reason: impl Into<String>) -> Self {
        SchedulerError::NoValidHost {
            reason: reason.into(),
            eliminations: Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
