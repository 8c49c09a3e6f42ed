//! Scheduled task pipelines, independent of the conversation engine: a
//! cron/interval Scheduler Loop driving a bounded Worker Pool through a
//! source → normalizer → processor → sink pipeline.

mod concurrency;
mod listing;
mod pipeline;
mod scheduler;
mod task;

pub use concurrency::ConcurrencyGuard;
pub use listing::Listing;
pub use pipeline::{process, FieldMappingNormalizer, Normalizer, Sink, Source};
pub use scheduler::{is_due, TaskScheduler};
pub use task::{ProcessorParams, Schedule, Task, TaskConfig, TaskState, TaskStatus};
