/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Per-process scheduler context.
//!
//! Everything a scheduling call needs is built once at startup from the
//! loaded [`SchedulerConfig`] and shared as `Arc<SchedulerContext>`; there is
//! no global state.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::host_manager::{HostStateRegistry, ServiceDirectory};
use crate::scheduler::{FilterScheduler, SchedulerError};

#[derive(Debug)]
pub struct SchedulerContext {
    config: SchedulerConfig,
    registry: Arc<HostStateRegistry>,
    scheduler: FilterScheduler,
}

impl SchedulerContext {
    /// Build the registry and resolve the filter / weigher chains.
    ///
    /// # Errors
    /// Unknown filter or weigher names in `config`.
    pub fn new(
        config: SchedulerConfig,
        directory: Arc<dyn ServiceDirectory>,
    ) -> Result<Self, SchedulerError> {
        let registry = Arc::new(HostStateRegistry::new(&config.scheduler, directory));
        let scheduler = FilterScheduler::from_section(Arc::clone(&registry), &config.scheduler)?;
        Ok(Self {
            config,
            registry,
            scheduler,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<HostStateRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &FilterScheduler {
        &self.scheduler
    }
}
