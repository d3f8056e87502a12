/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! RPC-layer errors.

use thiserror::Error;

use super::version::RpcVersion;

#[derive(Debug, Error)]
pub enum RpcError {
    /// The peer's version cap is too low for this method.  Raised locally,
    /// before anything is sent.
    #[error("method '{method}' needs RPC version {required} but the peer is capped at {cap}")]
    VersionMismatch {
        method: &'static str,
        required: RpcVersion,
        cap: RpcVersion,
    },

    /// A received envelope carries a version this side cannot handle.
    #[error("unsupported RPC version {received} (this side speaks {supported})")]
    UnsupportedVersion {
        received: RpcVersion,
        supported: RpcVersion,
    },

    #[error("unknown RPC method '{0}'")]
    UnknownMethod(String),

    #[error("invalid RPC version '{0}'")]
    InvalidVersion(String),

    #[error("cannot encode '{method}' arguments: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode '{method}' payload: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// Delivery failed (queue closed, peer unreachable, rejected).
    #[error("transport failure on topic '{topic}': {reason}")]
    Transport { topic: String, reason: String },
}

impl RpcError {
    pub fn transport(topic: &str, reason: impl Into<String>) -> Self {
        RpcError::Transport {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}
