use crate::scheduler::queue::{PriorityStrategy, QueueItem, ReadyQueue, SortKey};
use crate::scheduler::types::*;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info};

struct BasicEntry<T> {
    task: Task,
    func: TaskFn<T>,
    completion: Option<oneshot::Sender<Result<T, TaskError>>>,
}

struct BasicState<T> {
    started: bool,
    tasks: HashMap<TaskId, BasicEntry<T>>,
    queue: ReadyQueue,
    running: HashSet<TaskId>,
}

struct BasicInner<T> {
    max_concurrent: usize,
    state: Mutex<BasicState<T>>,
}

/// Bounded-concurrency execution of a single priority-ordered queue with
/// category-based cancellation.
///
/// The simpler sibling of [`crate::scheduler::AdvancedScheduler`]: no
/// deadlines, dependencies, resource admission, or retries. Terminal tasks
/// are dropped from tracking immediately.
pub struct TaskScheduler<T> {
    inner: Arc<BasicInner<T>>,
}

impl<T> Clone for TaskScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> TaskScheduler<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(BasicInner {
                max_concurrent,
                state: Mutex::new(BasicState {
                    started: false,
                    tasks: HashMap::new(),
                    queue: ReadyQueue::new(PriorityStrategy::Simple),
                    running: HashSet::new(),
                }),
            }),
        }
    }

    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.started {
            state.started = true;
            BasicInner::pump(&self.inner, &mut state);
        }
    }

    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        state.started = false;
    }

    /// Submit a task with a priority and category; returns the result handle.
    pub async fn schedule<F, Fut>(&self, func: F, priority: i32, category: &str) -> TaskHandle<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let func: TaskFn<T> = Arc::new(move || Box::pin(func()));
        let mut state = self.inner.state.lock().await;

        let id = TaskId::new_v4();
        let options = ScheduleOptions::new(category).with_priority(priority);
        let task = Task::new(id, &options);
        let key = SortKey::from(&task);
        let (sender, receiver) = oneshot::channel();
        state.tasks.insert(
            id,
            BasicEntry {
                task,
                func,
                completion: Some(sender),
            },
        );
        state.queue.push(QueueItem::new(id, key));
        debug!(task = %id, category, priority, "task enqueued");

        BasicInner::pump(&self.inner, &mut state);
        TaskHandle::new(id, receiver)
    }

    /// Cancel a pending task; running tasks are never preempted.
    pub async fn cancel_task(&self, id: TaskId) -> bool {
        let mut state = self.inner.state.lock().await;
        BasicInner::cancel_locked(&mut state, id)
    }

    /// Cancel every pending task in a category.
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
            if BasicInner::cancel_locked(&mut state, id) {
                cancelled += 1;
            }
        }
        cancelled
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }
}

impl<T: Send + 'static> BasicInner<T> {
    fn pump(inner: &Arc<Self>, state: &mut BasicState<T>) {
        loop {
            if !state.started || state.running.len() >= inner.max_concurrent {
                break;
            }
            let Some(item) = state.queue.pop_front() else {
                break;
            };
            let id = item.id;
            let Some(entry) = state.tasks.get_mut(&id) else {
                continue;
            };
            entry.task.status = TaskStatus::Running;
            entry.task.started_at = Some(Utc::now());
            let func = entry.func.clone();
            state.running.insert(id);
            info!(task = %id, "task admitted");

            let inner = inner.clone();
            tokio::spawn(async move {
                let result = (func)().await;
                Self::complete(inner, id, result).await;
            });
        }
    }

    async fn complete(inner: Arc<Self>, id: TaskId, result: anyhow::Result<T>) {
        let mut state = inner.state.lock().await;
        state.running.remove(&id);
        if let Some(mut entry) = state.tasks.remove(&id) {
            let outcome = result.map_err(|err| TaskError::Execution(err.to_string()));
            if let Some(sender) = entry.completion.take() {
                let _ = sender.send(outcome);
            }
        }
        Self::pump(&inner, &mut state);
    }

    fn cancel_locked(state: &mut BasicState<T>, id: TaskId) -> bool {
        let pending = state
            .tasks
            .get(&id)
            .map(|entry| entry.task.is_pending())
            .unwrap_or(false);
        if !pending {
            return false;
        }
        state.queue.remove(&id);
        if let Some(mut entry) = state.tasks.remove(&id) {
            if let Some(sender) = entry.completion.take() {
                let _ = sender.send(Err(TaskError::Cancelled {
                    reason: "cancelled by caller".to_string(),
                }));
            }
        }
        info!(task = %id, "task cancelled");
        true
    }
}
