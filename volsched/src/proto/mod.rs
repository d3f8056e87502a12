/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

/// Proto-generated modules.
///
/// `tonic::include_proto!` expands to an `include!` of the file that
/// prost/tonic-build wrote into `OUT_DIR` during the build script.
pub mod volsched_v1 {
    // Package `volsched.v1` → generated file `volsched.v1.rs`.
    tonic::include_proto!("volsched.v1");
}
