/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! `major.minor` RPC versions.
//!
//! A minor bump adds methods or optional fields and stays compatible with
//! older receivers that understand the same major; a major bump never is.
//!
//! | Version | Change |
//! |---|---|
//! | 1.0 | `update_service_capabilities`, `create_volume` |
//! | 1.1 | `create_volume` carries `image_id` |
//! | 1.2 | `create_volume` carries `filter_properties` |
//! | 1.3 | `migrate_volume_to_host` |
//! | 1.4 | `retype` |
//! | 1.5 | `manage_existing` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::RpcError;

/// Highest version this build speaks.
pub const RPC_API_VERSION: RpcVersion = RpcVersion::new(1, 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RpcVersion {
    pub major: u32,
    pub minor: u32,
}

impl RpcVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// `true` when a peer capped at `cap` can receive a message that needs
    /// `required`.
    pub fn can_send(required: RpcVersion, cap: RpcVersion) -> bool {
        required.major == cap.major && required.minor <= cap.minor
    }

    /// `true` when a receiver speaking `self` can handle a message stamped
    /// `incoming`.
    pub fn accepts(self, incoming: RpcVersion) -> bool {
        Self::can_send(incoming, self)
    }
}

impl fmt::Display for RpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for RpcVersion {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RpcError::InvalidVersion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for RpcVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
