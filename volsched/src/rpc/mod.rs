/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Versioned RPC boundary between the volume API, the scheduler and the
//! volume services.
//!
//! ```text
//! rpc/
//! ├── version.rs    – RpcVersion, RPC_API_VERSION
//! ├── envelope.rs   – {method, version, args} + argument payloads
//! ├── transport.rs  – Transport trait, in-process LocalTransport
//! ├── grpc.rs       – GrpcTransport (client) + CastReceiver (server)
//! ├── api.rs        – SchedulerApi client facade
//! └── error.rs      – RpcError
//! ```

pub mod api;
pub mod envelope;
pub mod error;
pub mod grpc;
pub mod transport;
pub mod version;

pub use api::SchedulerApi;
pub use envelope::{
    CapabilityUpdateArgs, CreateVolumeArgs, Envelope, ManageExistingArgs, Method,
    MigrateVolumeArgs, RetypeArgs,
};
pub use error::RpcError;
pub use transport::{LocalTransport, Transport};
pub use version::{RpcVersion, RPC_API_VERSION};
