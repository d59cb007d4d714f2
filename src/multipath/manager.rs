//! Per-connection scheduler registry.

use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::scheduler::LinkContext;
use super::{ConnectionAggregate, Decision, Policy, Scheduler, SchedulerConfig, SchedulerStats, Subflow};
use crate::error::{Error, Result};
use crate::types::{ConnectionId, PathId};

/// Owns one [`Scheduler`] per connection.
///
/// Connections never share estimator state; the registry only shares the
/// configuration and the read-only link metrics. Calls for different
/// connections proceed in parallel, calls for one connection are serialized.
pub struct SchedulerRegistry {
    config: SchedulerConfig,
    link: Option<LinkContext>,
    schedulers: DashMap<ConnectionId, Mutex<Scheduler>>,
}

impl SchedulerRegistry {
    /// Create a registry with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            link: None,
            schedulers: DashMap::new(),
        }
    }

    /// Attach link metrics handed to every new cross-layer scheduler.
    pub fn with_link_context(mut self, link: LinkContext) -> Self {
        self.link = Some(link);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.schedulers.contains_key(&id)
    }

    /// Register a connection with the configured policy.
    pub fn register(&self, id: ConnectionId) -> Result<()> {
        self.register_with_policy(id, self.config.policy)
    }

    /// Register a connection with an explicit policy.
    pub fn register_with_policy(&self, id: ConnectionId, policy: Policy) -> Result<()> {
        match self.schedulers.entry(id) {
            Entry::Occupied(_) => Err(Error::ConnectionExists(id)),
            Entry::Vacant(slot) => {
                let mut scheduler = Scheduler::with_policy(policy, &self.config);
                if let Some(link) = &self.link {
                    scheduler = scheduler.with_link_context(link.clone());
                }
                slot.insert(Mutex::new(scheduler));
                info!(connection = %id, policy = %policy, "Connection registered");
                Ok(())
            }
        }
    }

    /// Drop a connection's state and return its final counters.
    pub fn release(&self, id: ConnectionId) -> Result<SchedulerStats> {
        let (_, scheduler) = self
            .schedulers
            .remove(&id)
            .ok_or(Error::UnknownConnection(id))?;
        let scheduler = scheduler.into_inner();
        scheduler.release();
        Ok(scheduler.stats().clone())
    }

    /// Schedule one send opportunity for a connection.
    pub fn schedule(
        &self,
        id: ConnectionId,
        paths: &[Subflow],
        conn: &ConnectionAggregate,
    ) -> Result<Decision> {
        self.schedule_at(id, paths, conn, Instant::now())
    }

    /// Schedule with an explicit clock.
    pub fn schedule_at(
        &self,
        id: ConnectionId,
        paths: &[Subflow],
        conn: &ConnectionAggregate,
        now: Instant,
    ) -> Result<Decision> {
        let entry = self
            .schedulers
            .get(&id)
            .ok_or(Error::UnknownConnection(id))?;
        let decision = entry.lock().select_at(paths, conn, now);
        debug!(connection = %id, %decision, "scheduled");
        Ok(decision)
    }

    /// Primary path for the next send opportunity of a connection.
    pub fn select_path(
        &self,
        id: ConnectionId,
        paths: &[Subflow],
        conn: &ConnectionAggregate,
    ) -> Result<Option<PathId>> {
        Ok(self.schedule(id, paths, conn)?.primary())
    }

    /// Current counters of a connection.
    pub fn stats(&self, id: ConnectionId) -> Result<SchedulerStats> {
        let entry = self
            .schedulers
            .get(&id)
            .ok_or(Error::UnknownConnection(id))?;
        let stats = entry.lock().stats().clone();
        Ok(stats)
    }

    /// Current lambda (per-mille) of a connection.
    pub fn lambda(&self, id: ConnectionId) -> Result<u32> {
        let entry = self
            .schedulers
            .get(&id)
            .ok_or(Error::UnknownConnection(id))?;
        let lambda = entry.lock().lambda();
        Ok(lambda)
    }
}

impl std::fmt::Debug for SchedulerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRegistry")
            .field("config", &self.config)
            .field("connections", &self.schedulers.len())
            .finish_non_exhaustive()
    }
}
