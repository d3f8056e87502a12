/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Filter scheduler: picks the backend a volume is placed on.
//!
//! [`FilterScheduler`] takes a snapshot of every schedulable host from the
//! [`HostStateRegistry`], removes ineligible hosts with the [`FilterChain`],
//! ranks the survivors with the [`WeigherChain`] and returns the best one.
//!
//! # Request lifecycle
//! ```text
//! Start ──► Filtered ──► Ranked ──► Selected
//!   │          │
//!   └──────────┴──► Failed (MaxRetriesExceeded | NoValidHost)
//! ```
//!
//! A reschedule after a provisioning failure is just another call to
//! [`schedule()`](FilterScheduler::schedule) with the same
//! [`FilterProperties`]: the attempt counter grows and the `RetryFilter`
//! keeps the failed hosts out.
//!
//! The scheduler holds no per-request state, so one instance serves any
//! number of concurrent requests.  Selection is deterministic: the same
//! snapshot and request always produce the same host.

pub mod error;

pub use error::{describe_eliminations, FilterElimination, SchedulerError};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SchedulerSection;
use crate::filters::FilterChain;
use crate::host_manager::HostStateRegistry;
use crate::host_state::HostState;
use crate::request::{FilterProperties, MigrationPolicy, RequestSpec, RetryInfo};
use crate::weights::{WeighedHost, WeigherChain};

/// Where one scheduling call currently is.
#[derive(Debug)]
enum RequestState {
    Start,
    Filtered {
        passed: Vec<Arc<HostState>>,
        eliminations: Vec<FilterElimination>,
    },
    Ranked(Vec<WeighedHost>),
    Selected(WeighedHost),
    Failed(SchedulerError),
}

/// Candidates that survived filtering, best first.
struct Candidates {
    ranked: Vec<WeighedHost>,
    eliminations: Vec<FilterElimination>,
}

// ── FilterScheduler ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FilterScheduler {
    registry: Arc<HostStateRegistry>,
    filters: FilterChain,
    weighers: WeigherChain,
    max_attempts: u32,
}

impl FilterScheduler {
    pub fn new(
        registry: Arc<HostStateRegistry>,
        filters: FilterChain,
        weighers: WeigherChain,
        max_attempts: u32,
    ) -> Self {
        Self {
            registry,
            filters,
            weighers,
            max_attempts,
        }
    }

    /// Resolve the configured filter and weigher names.
    ///
    /// # Errors
    /// [`SchedulerError::UnknownFilter`] / [`SchedulerError::UnknownWeigher`].
    pub fn from_section(
        registry: Arc<HostStateRegistry>,
        section: &SchedulerSection,
    ) -> Result<Self, SchedulerError> {
        let filters = FilterChain::from_names(&section.default_filters, section)?;
        let weighers = WeigherChain::from_names(&section.default_weighers, section)?;
        info!(
            filters  = ?filters.names(),
            weighers = ?weighers.names(),
            max_attempts = section.max_attempts,
            "filter scheduler ready"
        );
        Ok(Self::new(registry, filters, weighers, section.max_attempts))
    }

    pub fn registry(&self) -> &Arc<HostStateRegistry> {
        &self.registry
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    // ── Public entry points ───────────────────────────────────────────────────

    /// Select a host for `spec`.
    ///
    /// Counts this call as one attempt in `props.retry`.
    ///
    /// # Errors
    /// * [`SchedulerError::MaxRetriesExceeded`] once the attempt counter
    ///   passes `max_attempts`; nothing is filtered in that case.
    /// * [`SchedulerError::NoValidHost`] when no host survives the filters,
    ///   or the service directory has never answered.
    pub async fn schedule(
        &self,
        spec: &RequestSpec,
        props: &mut FilterProperties,
    ) -> Result<WeighedHost, SchedulerError> {
        let mut state = RequestState::Start;
        loop {
            state = match state {
                RequestState::Start => match self.populate_retry(spec, props) {
                    Err(e) => RequestState::Failed(e),
                    Ok(()) => match self.registry.get_all_host_states().await {
                        Err(e) => RequestState::Failed(SchedulerError::no_valid_host(e.to_string())),
                        Ok(hosts) => {
                            let outcome = self.filters.filter(hosts, spec, props);
                            RequestState::Filtered {
                                passed: outcome.passed,
                                eliminations: outcome.eliminations,
                            }
                        }
                    },
                },
                RequestState::Filtered {
                    passed,
                    eliminations,
                } => {
                    if passed.is_empty() {
                        RequestState::Failed(no_hosts_left(spec, eliminations))
                    } else {
                        RequestState::Ranked(self.weighers.weigh(passed, props))
                    }
                }
                RequestState::Ranked(ranked) => match ranked.into_iter().next() {
                    Some(best) => RequestState::Selected(best),
                    None => RequestState::Failed(SchedulerError::no_valid_host(
                        "no weighed hosts available",
                    )),
                },
                RequestState::Selected(best) => {
                    info!(
                        volume_id = %spec.volume_id,
                        host      = %best.host.host,
                        weight    = best.weight,
                        attempt   = props.num_attempts(),
                        "host selected"
                    );
                    return Ok(best);
                }
                RequestState::Failed(e) => {
                    warn!(volume_id = %spec.volume_id, error = %e, "scheduling failed");
                    return Err(e);
                }
            };
            debug!(volume_id = %spec.volume_id, state = state.label(), "request state");
        }
    }

    /// Filter and weigh without touching the retry history.
    ///
    /// An empty list means no host is eligible.
    pub async fn get_weighted_candidates(
        &self,
        spec: &RequestSpec,
        props: &FilterProperties,
    ) -> Result<Vec<WeighedHost>, SchedulerError> {
        Ok(self.candidates(spec, props).await?.ranked)
    }

    /// Check that the named `host` may take `spec` (forced migration,
    /// managing an existing volume).
    ///
    /// # Errors
    /// [`SchedulerError::NoValidHost`] when the host is unknown, down, or
    /// fails any filter.
    pub async fn host_passes_filters(
        &self,
        host: &str,
        spec: &RequestSpec,
        props: &FilterProperties,
    ) -> Result<WeighedHost, SchedulerError> {
        let Candidates {
            ranked,
            eliminations,
        } = self.candidates(spec, props).await?;

        match ranked.into_iter().find(|w| w.host.host == host) {
            Some(found) => {
                debug!(volume_id = %spec.volume_id, host, "requested host passes filters");
                Ok(found)
            }
            None => Err(SchedulerError::NoValidHost {
                reason: format!(
                    "cannot place volume '{}' on host {host}",
                    spec.volume_id
                ),
                eliminations,
            }),
        }
    }

    /// Pick a host for a retype of a volume currently on `current_host`.
    ///
    /// The current host is preferred whenever it still satisfies the new
    /// type; its capacity check is waived because the data already lives
    /// there.  Otherwise the best other host is returned, unless the
    /// migration policy forbids moving the volume.
    pub async fn find_retype_host(
        &self,
        spec: &RequestSpec,
        props: &FilterProperties,
        current_host: &str,
    ) -> Result<WeighedHost, SchedulerError> {
        let mut props = props.clone();
        props.vol_exists_on = Some(current_host.to_string());

        let Candidates {
            ranked,
            eliminations,
        } = self.candidates(spec, &props).await?;

        if let Some(current) = ranked.iter().find(|w| w.host.host == current_host) {
            debug!(volume_id = %spec.volume_id, host = current_host, "retype stays on current host");
            return Ok(current.clone());
        }

        if props.migration_policy == MigrationPolicy::Never {
            return Err(SchedulerError::NoValidHost {
                reason: format!(
                    "retype of volume '{}' needs migration off {current_host} but migration policy is never",
                    spec.volume_id
                ),
                eliminations,
            });
        }

        match ranked.into_iter().next() {
            Some(best) => {
                info!(
                    volume_id = %spec.volume_id,
                    from = current_host,
                    to   = %best.host.host,
                    "retype requires migration"
                );
                Ok(best)
            }
            None => Err(no_hosts_left(spec, eliminations)),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn candidates(
        &self,
        spec: &RequestSpec,
        props: &FilterProperties,
    ) -> Result<Candidates, SchedulerError> {
        let hosts = self
            .registry
            .get_all_host_states()
            .await
            .map_err(|e| SchedulerError::no_valid_host(e.to_string()))?;
        let outcome = self.filters.filter(hosts, spec, props);
        Ok(Candidates {
            ranked: self.weighers.weigh(outcome.passed, props),
            eliminations: outcome.eliminations,
        })
    }

    /// Count this attempt and enforce `max_attempts`.
    fn populate_retry(
        &self,
        spec: &RequestSpec,
        props: &mut FilterProperties,
    ) -> Result<(), SchedulerError> {
        let retry = props.retry.get_or_insert_with(RetryInfo::default);
        retry.num_attempts += 1;

        if retry.num_attempts > self.max_attempts {
            return Err(SchedulerError::MaxRetriesExceeded {
                volume_id: spec.volume_id.clone(),
                attempts: retry.num_attempts,
                max_attempts: self.max_attempts,
                last_error: retry
                    .hosts
                    .last()
                    .map(|h| format!("{}: {}", h.host, h.reason)),
            });
        }
        if retry.num_attempts > 1 {
            info!(
                volume_id = %spec.volume_id,
                attempt = retry.num_attempts,
                excluded = ?retry.hosts.iter().map(|h| h.host.as_str()).collect::<Vec<_>>(),
                "rescheduling"
            );
        }
        Ok(())
    }
}

impl RequestState {
    fn label(&self) -> &'static str {
        match self {
            RequestState::Start => "start",
            RequestState::Filtered { .. } => "filtered",
            RequestState::Ranked(_) => "ranked",
            RequestState::Selected(_) => "selected",
            RequestState::Failed(_) => "failed",
        }
    }
}

fn no_hosts_left(spec: &RequestSpec, eliminations: Vec<FilterElimination>) -> SchedulerError {
    let reason = if eliminations.is_empty() {
        format!("no hosts available for volume '{}'", spec.volume_id)
    } else {
        format!(
            "filters rejected every host for volume '{}' ({} GB): {}",
            spec.volume_id,
            spec.size_gb,
            describe_eliminations(&eliminations)
        )
    };
    SchedulerError::NoValidHost {
        reason,
        eliminations,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
