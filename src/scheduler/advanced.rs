use crate::scheduler::graph::{DependencyGraph, GraphError};
use crate::scheduler::queue::{PriorityStrategy, QueueItem, ReadyQueue, SortKey};
use crate::scheduler::resources::ResourcePool;
use crate::scheduler::retry::RetryPolicy;
use crate::scheduler::types::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

/// Advanced scheduler configuration
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SchedulerConfig {
    pub max_concurrent_tasks: usize,
    pub history_limit: usize,
    #[serde(default)]
    pub strategy: PriorityStrategy,
    #[serde(default)]
    pub resources: HashMap<String, f64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            history_limit: 256,
            strategy: PriorityStrategy::default(),
            resources: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }
}

struct TaskEntry<T> {
    task: Task,
    func: TaskFn<T>,
    completion: Option<oneshot::Sender<Result<T, TaskError>>>,
    on_cancel: Option<CancelHook>,
}

struct SchedulerState<T> {
    started: bool,
    tasks: HashMap<TaskId, TaskEntry<T>>,
    queue: ReadyQueue,
    running: HashSet<TaskId>,
    graph: DependencyGraph<TaskId>,
    pool: ResourcePool,
    history: VecDeque<CompletedTaskRecord>,
}

struct SchedulerInner<T> {
    config: SchedulerConfig,
    state: Mutex<SchedulerState<T>>,
}

/// Priority-driven, resource-aware, dependency-ordered task scheduler.
///
/// All mutable state (ready queue, running set, resource pool, dependency
/// graph, completion history) lives behind one mutex so that admission,
/// completion, and strategy or resource changes are linearized. Task bodies
/// run as spawned futures; the scheduling loop itself never blocks.
///
/// The scheduler starts stopped: call [`AdvancedScheduler::start`] after
/// submitting (or at any point before expecting work to run).
pub struct AdvancedScheduler<T> {
    inner: Arc<SchedulerInner<T>>,
}

impl<T> Clone for AdvancedScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> AdvancedScheduler<T> {
    pub fn new(config: SchedulerConfig) -> Self {
        let state = SchedulerState {
            started: false,
            tasks: HashMap::new(),
            queue: ReadyQueue::new(config.strategy),
            running: HashSet::new(),
            graph: DependencyGraph::new(),
            pool: ResourcePool::new(config.resources.clone()),
            history: VecDeque::new(),
        };
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Begin admitting queued tasks.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.started {
            state.started = true;
            info!("scheduler started");
            SchedulerInner::pump(&self.inner, &mut state);
        }
    }

    /// Stop admitting tasks. Running tasks finish on their own; queued tasks
    /// stay queued until the next `start`.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        state.started = false;
        info!(queued = state.queue.len(), running = state.running.len(), "scheduler stopped");
    }

    /// Register a task and return the handle its caller awaits.
    ///
    /// Nothing is validated eagerly beyond graph acyclicity: unknown
    /// dependency ids hold the task invisible to the scheduling loop until
    /// they complete. A dependency set that would close a cycle fails the
    /// call with no task created.
    pub async fn schedule_task<F, Fut>(
        &self,
        func: F,
        options: ScheduleOptions,
    ) -> Result<TaskHandle<T>, TaskError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let func: TaskFn<T> = Arc::new(move || Box::pin(func()));
        let mut state = self.inner.state.lock().await;

        let id = TaskId::new_v4();
        if let Err(err) = state.graph.add_task(id, &options.dependencies) {
            return Err(match err {
                GraphError::Cycle { node } => TaskError::CyclicDependency {
                    task_id: node.to_string(),
                },
                GraphError::DuplicateNode { node } => TaskError::AlreadyRegistered {
                    task_id: node.to_string(),
                },
            });
        }

        let task = Task::new(id, &options);
        let (sender, receiver) = oneshot::channel();
        let ready = state.graph.is_ready(&id);
        let key = SortKey::from(&task);
        state.tasks.insert(
            id,
            TaskEntry {
                task,
                func,
                completion: Some(sender),
                on_cancel: options.on_cancel,
            },
        );

        if ready {
            state.queue.push(QueueItem::new(id, key));
            debug!(task = %id, category = %options.category, priority = options.priority, "task enqueued");
        } else {
            debug!(task = %id, category = %options.category, "task held until dependencies complete");
        }

        SchedulerInner::pump(&self.inner, &mut state);
        Ok(TaskHandle::new(id, receiver))
    }

    /// Cancel a pending task. Returns false for running or terminal tasks;
    /// cancellation never preempts started work.
    pub async fn cancel_task(&self, id: TaskId) -> bool {
        let mut state = self.inner.state.lock().await;
        SchedulerInner::cancel_locked(&self.inner, &mut state, id, "cancelled by caller")
    }

    /// Cancel every pending task in a category; returns how many were cancelled.
    pub async fn cancel_tasks_by_category(&self, category: &str) -> usize {
        let mut state = self.inner.state.lock().await;
        let targets: Vec<TaskId> = state
            .tasks
            .values()
            .filter(|entry| entry.task.category == category && entry.task.is_pending())
            .map(|entry| entry.task.id)
            .collect();

        let mut cancelled = 0;
        for id in targets {
            if SchedulerInner::cancel_locked(&self.inner, &mut state, id, "category cancelled") {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(category, cancelled, "cancelled tasks by category");
        }
        cancelled
    }

    /// Cancel every task currently sitting in the active queue. Held tasks
    /// (unmet dependencies) are untouched.
    pub async fn clear_queue(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let queued: Vec<TaskId> = state.queue.drain().into_iter().map(|item| item.id).collect();
        let mut cancelled = 0;
        for id in queued {
            if SchedulerInner::cancel_locked(&self.inner, &mut state, id, "queue cleared") {
                cancelled += 1;
            }
        }
        info!(cancelled, "cleared task queue");
        cancelled
    }

    /// Atomically switch the queue ordering discipline.
    pub async fn set_priority_strategy(&self, strategy: PriorityStrategy) {
        let mut state = self.inner.state.lock().await;
        state.queue.set_strategy(strategy);
        SchedulerInner::pump(&self.inner, &mut state);
    }

    /// Replace resource pool capacities and immediately resume admission.
    pub async fn update_resource_pool(&self, capacities: HashMap<String, f64>) {
        let mut state = self.inner.state.lock().await;
        state.pool.replace(capacities);
        SchedulerInner::pump(&self.inner, &mut state);
    }

    /// Number of tasks in the active queue.
    pub async fn queue_len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    /// Snapshot of a tracked task's record.
    pub async fn task_info(&self, id: TaskId) -> Option<Task> {
        let state = self.inner.state.lock().await;
        state.tasks.get(&id).map(|entry| entry.task.clone())
    }

    /// Aggregate statistics over live tasks and the completion history.
    pub async fn task_stats(&self) -> TaskStats {
        let state = self.inner.state.lock().await;
        let mut stats = TaskStats::default();

        for entry in state.tasks.values() {
            let per_category = stats
                .per_category
                .entry(entry.task.category.clone())
                .or_default();
            match entry.task.status {
                TaskStatus::Pending => {
                    stats.queued += 1;
                    per_category.queued += 1;
                }
                TaskStatus::Running => {
                    stats.running += 1;
                    per_category.running += 1;
                }
                // Failed but still holding its completion sender: the task is
                // waiting out a retry backoff and will re-enter the queue.
                TaskStatus::Failed if entry.completion.is_some() => {
                    stats.queued += 1;
                    per_category.queued += 1;
                }
                // Terminal tasks are counted from the history below.
                _ => {}
            }
        }

        let mut execution_ms = Vec::new();
        let mut wait_ms = Vec::new();
        for record in &state.history {
            let per_category = stats.per_category.entry(record.category.clone()).or_default();
            match record.status {
                TaskStatus::Completed => {
                    stats.completed += 1;
                    per_category.completed += 1;
                }
                TaskStatus::Failed => {
                    stats.failed += 1;
                    per_category.failed += 1;
                }
                TaskStatus::Cancelled => {
                    stats.cancelled += 1;
                    per_category.cancelled += 1;
                }
                _ => {}
            }
            stats.total_retries += record.retry_count as u64;
            if let (Some(started), Some(completed)) = (record.started_at, record.completed_at) {
                execution_ms.push(completed.signed_duration_since(started).num_milliseconds() as f64);
            }
            if let Some(started) = record.started_at {
                wait_ms.push(started.signed_duration_since(record.created_at).num_milliseconds() as f64);
            }
        }

        if !execution_ms.is_empty() {
            stats.average_execution_ms =
                Some(execution_ms.iter().sum::<f64>() / execution_ms.len() as f64);
        }
        if !wait_ms.is_empty() {
            stats.average_wait_ms = Some(wait_ms.iter().sum::<f64>() / wait_ms.len() as f64);
        }
        stats
    }
}

impl<T: Send + 'static> SchedulerInner<T> {
    /// The scheduling loop. Runs under the state lock after every admission,
    /// completion, and strategy or resource change; spawns task bodies and
    /// returns as soon as the head task cannot be admitted.
    fn pump(inner: &Arc<Self>, state: &mut SchedulerState<T>) {
        loop {
            if !state.started || state.running.len() >= inner.config.max_concurrent_tasks {
                break;
            }
            let Some(head) = state.queue.peek() else {
                break;
            };
            let id = head.id;

            if !state.graph.is_ready(&id) {
                // Only dependency-satisfied tasks are ever enqueued, so this
                // branch is dead by construction.
                warn!(task = %id, "queued task has unmet dependencies; removing from queue");
                state.queue.remove(&id);
                continue;
            }

            let Some(entry) = state.tasks.get_mut(&id) else {
                warn!(task = %id, "queued task has no record; removing from queue");
                state.queue.remove(&id);
                continue;
            };
            let demand = entry.task.required_resources.clone();
            if !state.pool.can_admit(&demand) {
                // Head-of-line blocking: lighter tasks behind a starved head
                // are not promoted.
                debug!(task = %id, "head task blocked on resources");
                break;
            }

            entry.task.status = TaskStatus::Running;
            entry.task.started_at = Some(Utc::now());
            let func = entry.func.clone();
            state.queue.remove(&id);
            state.pool.reserve(&demand);
            state.running.insert(id);
            info!(task = %id, running = state.running.len(), "task admitted");

            let inner = inner.clone();
            tokio::spawn(async move {
                let result = (func)().await;
                Self::complete(inner, id, result).await;
            });
        }
    }

    /// Completion path for a spawned task body.
    async fn complete(inner: Arc<Self>, id: TaskId, result: anyhow::Result<T>) {
        let mut state = inner.state.lock().await;
        state.running.remove(&id);

        let Some(entry) = state.tasks.get(&id) else {
            warn!(task = %id, "completed task has no record");
            Self::pump(&inner, &mut state);
            return;
        };
        let demand = entry.task.required_resources.clone();
        state.pool.release(&demand);

        match result {
            Ok(value) => {
                if let Some(entry) = state.tasks.get_mut(&id) {
                    entry.task.status = TaskStatus::Completed;
                    entry.task.completed_at = Some(Utc::now());
                    if let Some(sender) = entry.completion.take() {
                        let _ = sender.send(Ok(value));
                    }
                }
                info!(task = %id, "task completed");
                state.graph.mark_satisfied(&id);
                Self::record_history(&inner, &mut state, id);
                Self::admit_ready_dependents(&mut state, id);
            }
            Err(err) => {
                let (retry_count, max_retries) = state
                    .tasks
                    .get(&id)
                    .map(|entry| (entry.task.retry_count, entry.task.max_retries))
                    .unwrap_or((0, 0));

                if retry_count < max_retries {
                    if let Some(entry) = state.tasks.get_mut(&id) {
                        entry.task.retry_count += 1;
                        entry.task.status = TaskStatus::Failed;
                        entry.task.started_at = None;
                    }
                    let attempt = retry_count + 1;
                    let delay = inner.config.retry.delay_for(attempt);
                    warn!(task = %id, attempt, ?delay, error = %err, "task failed; retry scheduled");
                    let retry_inner = inner.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        Self::requeue_retry(retry_inner, id).await;
                    });
                } else {
                    if let Some(entry) = state.tasks.get_mut(&id) {
                        entry.task.status = TaskStatus::Failed;
                        entry.task.completed_at = Some(Utc::now());
                        if let Some(sender) = entry.completion.take() {
                            let _ = sender.send(Err(TaskError::Execution(err.to_string())));
                        }
                    }
                    error!(task = %id, retries = retry_count, error = %err, "task failed permanently");
                    Self::record_history(&inner, &mut state, id);
                }
            }
        }

        Self::pump(&inner, &mut state);
    }

    /// Move a failed task back to pending after its backoff delay.
    ///
    /// The record's `created_at` is refreshed: a retried task does not regain
    /// queue seniority under FIFO-like strategies.
    async fn requeue_retry(inner: Arc<Self>, id: TaskId) {
        let mut state = inner.state.lock().await;
        let key = match state.tasks.get_mut(&id) {
            Some(entry) if entry.task.status == TaskStatus::Failed && entry.completion.is_some() => {
                entry.task.status = TaskStatus::Pending;
                entry.task.created_at = Utc::now();
                Some(SortKey::from(&entry.task))
            }
            _ => None,
        };
        if let Some(key) = key {
            state.queue.push(QueueItem::new(id, key));
            debug!(task = %id, "task requeued for retry");
            Self::pump(&inner, &mut state);
        }
    }

    /// Admit every dependent of `id` whose dependencies are now all satisfied.
    fn admit_ready_dependents(state: &mut SchedulerState<T>, id: TaskId) {
        for dependent in state.graph.dependents_of(&id) {
            let ready = state
                .tasks
                .get(&dependent)
                .map(|entry| entry.task.is_pending())
                .unwrap_or(false)
                && !state.queue.contains(&dependent)
                && state.graph.is_ready(&dependent);
            if ready {
                if let Some(entry) = state.tasks.get(&dependent) {
                    let key = SortKey::from(&entry.task);
                    state.queue.push(QueueItem::new(dependent, key));
                    debug!(task = %dependent, "dependent task released to queue");
                }
            }
        }
    }

    /// Shared cancellation path; caller holds the state lock.
    fn cancel_locked(
        inner: &Arc<Self>,
        state: &mut SchedulerState<T>,
        id: TaskId,
        reason: &str,
    ) -> bool {
        let Some(entry) = state.tasks.get_mut(&id) else {
            return false;
        };
        if !entry.task.is_pending() {
            return false;
        }

        entry.task.status = TaskStatus::Cancelled;
        entry.task.completed_at = Some(Utc::now());
        if let Some(hook) = entry.on_cancel.take() {
            hook();
        }
        if let Some(sender) = entry.completion.take() {
            let _ = sender.send(Err(TaskError::Cancelled {
                reason: reason.to_string(),
            }));
        }
        state.queue.remove(&id);
        info!(task = %id, reason, "task cancelled");
        Self::record_history(inner, state, id);
        true
    }

    /// Append a terminal task to the bounded history, evicting FIFO.
    ///
    /// Evicted completed tasks have their graph node pruned (the fulfilled
    /// edge disappears from dependents); failed and cancelled nodes stay
    /// pinned unsatisfied so dependents are never falsely admitted.
    fn record_history(inner: &Arc<Self>, state: &mut SchedulerState<T>, id: TaskId) {
        let Some(entry) = state.tasks.get(&id) else {
            return;
        };
        state.history.push_back(CompletedTaskRecord::from_task(&entry.task));

        while state.history.len() > inner.config.history_limit {
            if let Some(evicted) = state.history.pop_front() {
                state.tasks.remove(&evicted.id);
                if evicted.status == TaskStatus::Completed {
                    state.graph.remove_node(&evicted.id);
                }
                debug!(task = %evicted.id, "evicted task from completion history");
            }
        }
    }
}
