use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule as CronExpr;
use lab_types::{Error, Result};
use parking_lot::Mutex;

use crate::concurrency::ConcurrencyGuard;
use crate::listing::Listing;
use crate::pipeline::{process, Normalizer, Sink, Source};
use crate::task::{Schedule, Task, TaskConfig};

const MIN_RERUN_GUARD: i64 = 5; // minutes
const POOL_KEY: &str = "__pool__";

fn next_cron_fire(expr: &str, tz: chrono_tz::Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = CronExpr::from_str(expr).ok()?;
    let after_tz = after.with_timezone(&tz);
    schedule.after(&after_tz).next().map(|dt| dt.with_timezone(&Utc))
}

/// Pure due-or-not decision (spec.md §4.7's Scheduler Loop rules), kept
/// separate from the async worker-pool machinery so it can be tested
/// without a clock or a runtime.
pub fn is_due(schedule: &Schedule, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    if let Some(last) = last_run {
        if now - last < Duration::minutes(MIN_RERUN_GUARD) {
            return false;
        }
    }
    match schedule {
        Schedule::Interval { value_seconds } => match last_run {
            None => true,
            Some(last) => now - last >= Duration::seconds(*value_seconds as i64),
        },
        Schedule::Cron { value, tz } => {
            let tz = tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC);
            let after = last_run.unwrap_or_else(|| now - Duration::days(366));
            matches!(next_cron_fire(value, tz, after), Some(next) if next <= now)
        }
    }
}

fn next_run_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Interval { value_seconds } => Some(now + Duration::seconds(*value_seconds as i64)),
        Schedule::Cron { value, tz } => {
            let tz = tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC);
            next_cron_fire(value, tz, now)
        }
    }
}

/// Drives configured [`Task`]s through their source → normalizer →
/// processor → sink pipeline, on a `tick(now)` the caller invokes at least
/// once a minute. Bounded by `max_concurrent` pool-wide and one in-flight
/// run per task id.
pub struct TaskScheduler {
    tasks: Mutex<HashMap<String, Task>>,
    sources: HashMap<String, Arc<dyn Source>>,
    sinks: HashMap<String, Arc<dyn Sink>>,
    normalizer: Arc<dyn Normalizer>,
    concurrency: ConcurrencyGuard,
    max_concurrent: u32,
}

impl TaskScheduler {
    pub fn new(normalizer: Arc<dyn Normalizer>, max_concurrent: u32) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            sources: HashMap::new(),
            sinks: HashMap::new(),
            normalizer,
            concurrency: ConcurrencyGuard::new(),
            max_concurrent,
        }
    }

    pub fn register_source(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn register_sink(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.insert(sink.id().to_string(), sink);
    }

    pub fn add_task(&self, config: TaskConfig) {
        self.tasks.lock().insert(config.id.clone(), Task::new(config));
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.tasks.lock().get(id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn stop_task(&self, id: &str) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            task.mark_stopped();
        }
    }

    /// Enumerates enabled, due tasks and spawns each pipeline run
    /// concurrently, honoring the pool-wide and per-task concurrency
    /// bounds. Tasks that don't fit are deferred to the next wake, per
    /// spec.md §4.7's Worker Pool rule. Requires an `Arc<Self>` since each
    /// run outlives this call on its own spawned task.
    pub async fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<String> {
        let due_ids: Vec<String> = {
            let tasks = self.tasks.lock();
            tasks
                .values()
                .filter(|t| t.config.enabled && is_due(&t.config.schedule, t.status.last_run, now))
                .map(|t| t.config.id.clone())
                .collect()
        };

        let mut handles = Vec::new();
        let mut fired = Vec::new();
        for id in due_ids {
            if !self.concurrency.try_acquire(POOL_KEY, self.max_concurrent) {
                break;
            }
            if !self.concurrency.try_acquire(&id, 1) {
                self.concurrency.release(POOL_KEY);
                continue;
            }

            fired.push(id.clone());
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                this.run_task(&id, now).await;
                this.concurrency.release(&id);
                this.concurrency.release(POOL_KEY);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        fired
    }

    /// Runs one task's pipeline immediately, bypassing the due-check and
    /// concurrency bounds. Used by `tick` internally and directly by
    /// callers that want to force a run (e.g. a manual trigger).
    pub async fn run_task(&self, id: &str, now: DateTime<Utc>) {
        let config = {
            let mut tasks = self.tasks.lock();
            match tasks.get_mut(id) {
                Some(task) => {
                    task.mark_started(now);
                    task.config.clone()
                }
                None => return,
            }
        };

        match self.execute_pipeline(&config).await {
            Ok(listings) => {
                let mut tasks = self.tasks.lock();
                if let Some(task) = tasks.get_mut(id) {
                    task.mark_completed(next_run_after(&config.schedule, now));
                }
                tracing::info!(task_id = %id, count = listings.len(), "task run completed");
            }
            Err(err) => {
                let mut tasks = self.tasks.lock();
                if let Some(task) = tasks.get_mut(id) {
                    task.mark_error(err.to_string());
                }
                tracing::warn!(task_id = %id, error = %err, "task run failed");
            }
        }
    }

    async fn execute_pipeline(&self, config: &TaskConfig) -> Result<Vec<Listing>> {
        let mut raw = Vec::new();
        let params = serde_json::to_value(&config.params)?;
        for source_id in &config.sources {
            let source = self
                .sources
                .get(source_id)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown source: {source_id}")))?;
            raw.extend(source.fetch(&params).await?);
        }

        let normalized = self.normalizer.normalize(raw);
        let processed = process(normalized, &config.params);

        for sink_id in &config.sinks {
            match self.sinks.get(sink_id) {
                Some(sink) => {
                    if let Err(err) = sink.send(&processed).await {
                        tracing::warn!(sink_id = %sink_id, error = %err, "sink failed, not retried this run");
                    }
                }
                None => tracing::warn!(sink_id = %sink_id, "unknown sink, skipped"),
            }
        }

        Ok(processed)
    }
}
