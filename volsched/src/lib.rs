/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! volsched – filter/weigher volume scheduler
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── proto/          – generated gRPC/protobuf types & stubs
//! ├── config/         – YAML scheduler configuration
//! ├── host_state      – per-backend capacity & capability snapshot
//! ├── host_manager/   – HostStateRegistry + service directory
//! ├── request         – RequestSpec, FilterProperties, retry history
//! ├── filters/        – hard constraints (capacity, zone, capabilities, retry)
//! ├── weights/        – soft preferences (capacity weighers)
//! ├── scheduler/      – FilterScheduler + SchedulerError
//! ├── context         – per-process SchedulerContext
//! ├── rpc/            – versioned envelopes, transports, SchedulerApi
//! ├── manager         – consumes scheduler casts
//! └── volume          – dispatch to volume services, volume status
//! ```

pub mod config;
pub mod context;
pub mod filters;
pub mod host_manager;
pub mod host_state;
pub mod manager;
pub mod proto;
pub mod request;
pub mod rpc;
pub mod scheduler;
pub mod volume;
pub mod weights;
