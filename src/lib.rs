//! # taskgrid
//!
//! A parallel task execution engine: priority-driven, resource-aware,
//! dependency-ordered scheduling for asynchronous workloads, plus a fan-out
//! executor that dispatches one request to many LLM providers concurrently
//! and aggregates the results.
//!
//! ## Architecture Overview
//!
//! - **[`scheduler`]**: the three executors and their shared primitives
//!   (ready queue, resource pool, dependency graph, retry policy)
//! - **[`llm`]**: provider-agnostic request/response types and the
//!   [`llm::LlmProvider`] trait the fan-out layer dispatches through
//! - **[`parallel`]**: concurrent multi-provider dispatch with per-call
//!   timeouts and selectable result aggregation
//! - **[`config`]**: TOML-backed engine configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskgrid::{AdvancedScheduler, ScheduleOptions, SchedulerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scheduler = AdvancedScheduler::new(SchedulerConfig::default());
//!     scheduler.start().await;
//!
//!     let handle = scheduler
//!         .schedule_task(
//!             || async { Ok::<_, anyhow::Error>(42) },
//!             ScheduleOptions::new("demo").with_priority(5),
//!         )
//!         .await?;
//!
//!     println!("result: {}", handle.wait().await?);
//!     Ok(())
//! }
//! ```

/// Task scheduling: executors, ready queue, resources, dependencies, retry.
pub mod scheduler;

/// Provider-agnostic LLM request/response abstraction.
pub mod llm;

/// Concurrent multi-provider dispatch and result aggregation.
pub mod parallel;

/// Engine configuration loading and persistence.
pub mod config;

// Re-export the main scheduling types
pub use scheduler::{
    AdvancedScheduler, DependencyManager, PriorityStrategy, RetryPolicy, ScheduleOptions,
    SchedulerConfig, Task, TaskError, TaskHandle, TaskId, TaskScheduler, TaskStats, TaskStatus,
};

// Re-export the fan-out surface
pub use llm::{LlmProvider, LlmRequest, LlmResponse, MockProvider, ProviderError};
pub use parallel::{AggregationStrategy, ParallelConfig, ParallelExecutor, ResultAggregator};

// Re-export configuration
pub use config::EngineConfig;
