//! Priority-driven, resource-aware, dependency-ordered task scheduling.
//!
//! Three executors share the primitives in this module:
//! - [`TaskScheduler`]: bounded-concurrency priority queue.
//! - [`AdvancedScheduler`]: adds resource accounting, dependency gating,
//!   retry with backoff, pluggable queue strategies, and bounded history.
//! - [`DependencyManager`]: pure DAG execution with failure cascade.

pub mod advanced;
pub mod basic;
pub mod dependency;
pub mod graph;
pub mod queue;
pub mod resources;
pub mod retry;
pub mod types;


pub use advanced::{AdvancedScheduler, SchedulerConfig};
pub use basic::TaskScheduler;
pub use dependency::DependencyManager;
pub use graph::{DependencyGraph, GraphError};
pub use queue::{PriorityStrategy, ReadyQueue};
pub use resources::ResourcePool;
pub use retry::RetryPolicy;
pub use types::{
    CategoryStats, CompletedTaskRecord, ScheduleOptions, Task, TaskError, TaskHandle, TaskId,
    TaskStats, TaskStatus,
};
