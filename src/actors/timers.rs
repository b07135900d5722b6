//! # Actor Timers
//!
//! Creates, replaces and deletes actor timers and runs one task per live
//! timer. Each task waits on three sources at once: the next tick, the
//! optional expiration and its cancellation token. Whichever completes
//! first wins; the pending sleeps are dropped on every exit path.
//!
//! Create and delete are serialized by one engine-wide lock so that the
//! "cancel existing, store new" sequence cannot interleave with a delete.

use super::clock::Clock;
use super::errors::{TimerError, TimerResult};
use super::registry::{ActiveTimerCounts, TimerHandle, TimerRegistry};
use super::table::ActorActivationTable;
use super::timer::{CreateTimerRequest, DeleteTimerRequest, TimerKey, TimerRecord};
use crate::config::ActorsConfig;
use crate::logging::log_timer_operation;
use crate::metrics::actors as actor_metrics;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Delivers a timer tick to the actor
#[async_trait]
pub trait TimerExecutor: Send + Sync + Debug {
    async fn execute_timer(&self, timer: &TimerRecord) -> anyhow::Result<()>;
}

#[derive(Debug)]
struct TimersInner {
    clock: Arc<dyn Clock>,
    table: Arc<dyn ActorActivationTable>,
    executor: Arc<dyn TimerExecutor>,
    registry: Arc<TimerRegistry>,
    counts: Arc<ActiveTimerCounts>,
    lifecycle_lock: Mutex<()>,
    default_callback: Option<String>,
}

/// Timer engine handle; clones share the same registry and tasks
#[derive(Debug, Clone)]
pub struct ActorTimers {
    inner: Arc<TimersInner>,
}

impl ActorTimers {
    pub fn new(
        clock: Arc<dyn Clock>,
        table: Arc<dyn ActorActivationTable>,
        executor: Arc<dyn TimerExecutor>,
    ) -> Self {
        Self::with_stores(
            clock,
            table,
            executor,
            Arc::new(TimerRegistry::new()),
            Arc::new(ActiveTimerCounts::new()),
            &ActorsConfig::default(),
        )
    }

    /// Builds the engine over caller-supplied stores
    pub fn with_stores(
        clock: Arc<dyn Clock>,
        table: Arc<dyn ActorActivationTable>,
        executor: Arc<dyn TimerExecutor>,
        registry: Arc<TimerRegistry>,
        counts: Arc<ActiveTimerCounts>,
        settings: &ActorsConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TimersInner {
                clock,
                table,
                executor,
                registry,
                counts,
                lifecycle_lock: Mutex::new(()),
                default_callback: settings.default_timer_callback.clone(),
            }),
        }
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.inner.registry
    }

    pub fn counts(&self) -> &ActiveTimerCounts {
        &self.inner.counts
    }

    /// Registers a timer, replacing any timer with the same identity.
    pub async fn create_timer(&self, mut request: CreateTimerRequest) -> TimerResult<()> {
        if request.callback.is_empty() {
            if let Some(callback) = &self.inner.default_callback {
                request.callback = callback.clone();
            }
        }
        let record = TimerRecord::from_request(&request, self.inner.clock.now())?;
        let key = record.key.clone();

        let _guard = self.inner.lifecycle_lock.lock().await;

        if !self.inner.table.is_activated(&key.actor_type, &key.actor_id) {
            return Err(TimerError::actor_not_activated(key.actor_key()));
        }

        if let Some(existing) = self.inner.registry.get(&key) {
            existing.token.cancel();
        }

        debug!(
            timer = %key,
            due_time = %record.due_time_spec,
            period = %record.period_spec,
            ttl = ?record.expiration,
            "Create timer"
        );

        let (handle, replaced) = self.inner.registry.put(key.clone());
        if replaced.is_some() {
            self.inner.counts.update(&key.actor_type, -1);
        }
        self.inner.counts.update(&key.actor_type, 1);

        log_timer_operation(
            "create",
            &key.actor_type,
            &key.actor_id,
            &key.name,
            if replaced.is_some() { "replaced" } else { "created" },
            None,
        );

        tokio::spawn(self.clone().run_timer(record, handle));
        Ok(())
    }

    /// Removes a timer; deleting an unknown timer succeeds.
    pub async fn delete_timer(&self, request: &DeleteTimerRequest) -> TimerResult<()> {
        let key = request.key();
        let _guard = self.inner.lifecycle_lock.lock().await;

        if let Some(handle) = self.inner.registry.remove(&key) {
            handle.token.cancel();
            self.inner.counts.update(&key.actor_type, -1);
            log_timer_operation("delete", &key.actor_type, &key.actor_id, &key.name, "deleted", None);
        }
        Ok(())
    }

    async fn run_timer(self, mut record: TimerRecord, handle: TimerHandle) {
        let key = record.key.clone();
        let clock = Arc::clone(&self.inner.clock);

        let expiration = record.expiration;
        let ttl = async {
            match expiration {
                Some(at) => clock.sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(ttl);

        loop {
            let next_tick = clock.sleep_until(record.next_tick());
            tokio::select! {
                biased;
                _ = handle.token.cancelled() => {
                    info!(
                        timer = %key,
                        due_time = %record.due_time_spec,
                        period = %record.period_spec,
                        ttl = %record.ttl_spec,
                        "Timer has been deleted"
                    );
                    return;
                }
                _ = &mut ttl => {
                    info!(
                        timer = %key,
                        due_time = %record.due_time_spec,
                        period = %record.period_spec,
                        ttl = %record.ttl_spec,
                        "Timer has expired"
                    );
                    break;
                }
                _ = next_tick => {}
            }

            if !self.inner.table.is_activated(&key.actor_type, &key.actor_id) {
                // The registry entry stays behind; deactivation cleans up elsewhere
                error!(timer = %key, "Could not find active timer");
                return;
            }

            let result = self.inner.executor.execute_timer(&record).await;
            actor_metrics::record_timer_fired(&key.actor_type, result.is_ok());
            if let Err(e) = result {
                error!(timer = %key, actor = %key.actor_key(), error = %e, "Error invoking timer on actor");
            }

            if record.tick_executed() {
                info!(timer = %key, ticks = record.ticks_executed(), "Timer has been completed");
                break;
            }
        }

        self.remove_own(&key, handle.generation).await;
    }

    /// Self-initiated teardown; never removes a replacement timer.
    async fn remove_own(&self, key: &TimerKey, generation: u64) {
        let _guard = self.inner.lifecycle_lock.lock().await;
        if self.inner.registry.compare_and_remove(key, generation) {
            self.inner.counts.update(&key.actor_type, -1);
            log_timer_operation("delete", &key.actor_type, &key.actor_id, &key.name, "finished", None);
        }
    }
}
