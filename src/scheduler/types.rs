use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// A schedulable unit of work: re-invocable so the engine can retry it.
pub type TaskFn<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Hook fired when a pending task is cancelled before it started.
pub type CancelHook = Box<dyn FnOnce() + Send>;

/// Task lifecycle states.
///
/// Legal transitions: pending -> running -> {completed | failed};
/// failed -> pending only via retry; pending -> cancelled only while pending.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Core task record with scheduling metadata and state tracking.
///
/// The owning scheduler exclusively holds these records; callers only ever
/// see clones through introspection and the [`TaskHandle`] they were given
/// at submission time.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub category: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub required_resources: HashMap<String, f64>,
    pub max_retries: u32,
    pub retry_count: u32,
    pub metadata: HashMap<String, String>,
}

impl Task {
    /// Create a new pending task record from schedule options.
    pub fn new(id: TaskId, options: &ScheduleOptions) -> Self {
        Self {
            id,
            category: options.category.clone(),
            priority: options.priority,
            created_at: Utc::now(),
            deadline: options.deadline,
            started_at: None,
            completed_at: None,
            status: TaskStatus::Pending,
            dependencies: options.dependencies.clone(),
            required_resources: options.required_resources.clone(),
            max_retries: options.max_retries,
            retry_count: 0,
            metadata: options.metadata.clone(),
        }
    }

    /// Check if task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Check if task is waiting to run
    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Pending)
    }

    /// Check if task is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.status, TaskStatus::Running)
    }

    /// Total required-resource magnitude across all named resources.
    pub fn resource_magnitude(&self) -> f64 {
        self.required_resources.values().sum()
    }

    /// Time the task spent queued before it first started, if it started.
    pub fn wait_time(&self) -> Option<Duration> {
        self.started_at
            .map(|started| started.signed_duration_since(self.created_at))
    }

    /// Wall-clock execution time, if the task ran to a terminal state.
    pub fn execution_time(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed.signed_duration_since(started)),
            _ => None,
        }
    }
}

/// Scheduling metadata supplied at submission time.
pub struct ScheduleOptions {
    pub priority: i32,
    pub category: String,
    pub deadline: Option<DateTime<Utc>>,
    pub dependencies: Vec<TaskId>,
    pub max_retries: u32,
    pub required_resources: HashMap<String, f64>,
    pub metadata: HashMap<String, String>,
    pub on_cancel: Option<CancelHook>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            category: "default".to_string(),
            deadline: None,
            dependencies: Vec::new(),
            max_retries: 0,
            required_resources: HashMap::new(),
            metadata: HashMap::new(),
            on_cancel: None,
        }
    }
}

impl ScheduleOptions {
    /// Create options for the given category
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Default::default()
        }
    }

    /// Set task priority (higher = more urgent)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set an absolute deadline used by deadline-aware queue strategies
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Declare tasks that must complete before this one may run
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set how many times a failing task is retried before giving up
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Require an amount of a named resource while the task runs
    pub fn with_resource(mut self, name: &str, amount: f64) -> Self {
        self.required_resources.insert(name.to_string(), amount);
        self
    }

    /// Attach an opaque metadata entry
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Install a hook fired if the task is cancelled before starting
    pub fn with_cancel_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for ScheduleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleOptions")
            .field("priority", &self.priority)
            .field("category", &self.category)
            .field("deadline", &self.deadline)
            .field("dependencies", &self.dependencies)
            .field("max_retries", &self.max_retries)
            .field("required_resources", &self.required_resources)
            .field("metadata", &self.metadata)
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Engine error taxonomy surfaced on result handles and registration calls.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task cancelled: {reason}")]
    Cancelled { reason: String },
    #[error("registering task {task_id} would create a dependency cycle")]
    CyclicDependency { task_id: String },
    #[error("task {task_id} declares unknown dependency {dependency}")]
    MissingDependency { task_id: String, dependency: String },
    #[error("task {task_id} is already registered")]
    AlreadyRegistered { task_id: String },
    #[error("dependency {dependency} of task {task_id} failed")]
    DependencyFailed { task_id: String, dependency: String },
    #[error("task execution failed: {0}")]
    Execution(String),
    #[error("task {0} not found")]
    NotFound(String),
    #[error("scheduler shut down before the task resolved")]
    SchedulerShutdown,
}

/// Single-resolution handle a caller awaits for a task's outcome.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    receiver: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, receiver: oneshot::Receiver<Result<T, TaskError>>) -> Self {
        Self { id, receiver }
    }

    /// The id the scheduler assigned to this task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Wait for the task to resolve with a value or an error.
    pub async fn wait(self) -> Result<T, TaskError> {
        self.receiver
            .await
            .unwrap_or(Err(TaskError::SchedulerShutdown))
    }
}

/// Immutable snapshot kept in the bounded completion history.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CompletedTaskRecord {
    pub id: TaskId,
    pub category: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl CompletedTaskRecord {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            category: task.category.clone(),
            status: task.status,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            retry_count: task.retry_count,
        }
    }
}

/// Per-category task counts.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryStats {
    pub queued: u32,
    pub running: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
}

/// Aggregate scheduler statistics for monitoring.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TaskStats {
    pub queued: u32,
    pub running: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub per_category: HashMap<String, CategoryStats>,
    pub average_execution_ms: Option<f64>,
    pub average_wait_ms: Option<f64>,
    pub total_retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_options_builder() {
        let deadline = Utc::now() + Duration::minutes(5);
        let options = ScheduleOptions::new("embedding")
            .with_priority(7)
            .with_deadline(deadline)
            .with_max_retries(2)
            .with_resource("cpu", 4.0)
            .with_metadata("model", "small");

        assert_eq!(options.category, "embedding");
        assert_eq!(options.priority, 7);
        assert_eq!(options.deadline, Some(deadline));
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.required_resources.get("cpu"), Some(&4.0));
        assert_eq!(options.metadata.get("model"), Some(&"small".to_string()));
        assert!(options.on_cancel.is_none());
    }

    #[test]
    fn task_record_lifecycle_helpers() {
        let options = ScheduleOptions::new("chat").with_resource("cpu", 2.0).with_resource("gpu", 1.0);
        let mut task = Task::new(Uuid::new_v4(), &options);

        assert!(task.is_pending());
        assert!(!task.is_terminal());
        assert_eq!(task.resource_magnitude(), 3.0);
        assert!(task.wait_time().is_none());

        task.status = TaskStatus::Running;
        task.started_at = Some(task.created_at + Duration::milliseconds(50));
        assert!(task.is_running());

        task.status = TaskStatus::Completed;
        task.completed_at = Some(task.created_at + Duration::milliseconds(150));
        assert!(task.is_terminal());
        assert_eq!(
            task.execution_time(),
            Some(Duration::milliseconds(100))
        );
        assert_eq!(task.wait_time(), Some(Duration::milliseconds(50)));
    }
}
