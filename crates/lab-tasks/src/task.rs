use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `created, running, stopped, completed, error` (spec.md §4, Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Running,
    Stopped,
    Completed,
    Error,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Created
    }
}

/// `type=cron` fires on the cron crate's 6-field (with seconds) schedule;
/// `type=interval` fires every `value_seconds`, with the first run
/// immediate (see the Open Question decision in DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Cron {
        value: String,
        #[serde(default = "default_tz")]
        tz: String,
    },
    Interval {
        value_seconds: u64,
    },
}

fn default_tz() -> String {
    "UTC".into()
}

/// Processor parameters: price-range filter, currency match, and a ranked
/// top-N truncation (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorParams {
    #[serde(default)]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    pub currency: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_max_price() -> f64 {
    f64::INFINITY
}

fn default_top_n() -> usize {
    5
}

/// Static configuration for a scheduled task, as created from a preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schedule: Schedule,
    pub params: ProcessorParams,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Mutable run-state for a task, persisted after every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u32,
    pub error_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub config: TaskConfig,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(config: TaskConfig) -> Self {
        Self { config, status: TaskStatus::default() }
    }

    /// Marks the start of a run: bumps `run_count`, records `last_run`.
    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        self.status.state = TaskState::Running;
        self.status.last_run = Some(now);
        self.status.run_count += 1;
    }

    pub fn mark_completed(&mut self, next_run: Option<DateTime<Utc>>) {
        self.status.state = TaskState::Completed;
        self.status.next_run = next_run;
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status.state = TaskState::Error;
        self.status.error_count += 1;
        self.status.last_error = Some(message.into());
    }

    pub fn mark_stopped(&mut self) {
        self.status.state = TaskState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TaskConfig {
        TaskConfig {
            id: "t1".into(),
            name: "deals".into(),
            description: String::new(),
            schedule: Schedule::Interval { value_seconds: 3600 },
            params: ProcessorParams { min_price: 0.0, max_price: 100.0, currency: "USD".into(), top_n: 5 },
            sources: vec!["marketplace".into()],
            sinks: vec!["telegram".into()],
            enabled: true,
        }
    }

    #[test]
    fn new_task_starts_created() {
        let task = Task::new(config());
        assert_eq!(task.status.state, TaskState::Created);
        assert_eq!(task.status.run_count, 0);
    }

    #[test]
    fn lifecycle_transitions() {
        let mut task = Task::new(config());
        let t0 = Utc::now();
        task.mark_started(t0);
        assert_eq!(task.status.state, TaskState::Running);
        assert_eq!(task.status.run_count, 1);
        assert_eq!(task.status.last_run, Some(t0));

        task.mark_completed(Some(t0 + chrono::Duration::hours(1)));
        assert_eq!(task.status.state, TaskState::Completed);
        assert!(task.status.next_run.is_some());
    }

    #[test]
    fn error_increments_error_count() {
        let mut task = Task::new(config());
        task.mark_error("source unreachable");
        assert_eq!(task.status.state, TaskState::Error);
        assert_eq!(task.status.error_count, 1);
        assert_eq!(task.status.last_error.as_deref(), Some("source unreachable"));
    }
}
