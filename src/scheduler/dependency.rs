use crate::scheduler::graph::{DependencyGraph, GraphError};
use crate::scheduler::types::{TaskError, TaskFn, TaskStatus};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, info, warn};

struct ManagedTask<T> {
    name: String,
    func: TaskFn<T>,
    status: TaskStatus,
    /// Set once the task has been handed to an executor, so completion
    /// sweeps and recursive execution never double-run it.
    launched: bool,
    result: Option<Result<T, TaskError>>,
}

struct ManagerState<T> {
    tasks: HashMap<String, ManagedTask<T>>,
    graph: DependencyGraph<String>,
    /// True while a full-graph run is in progress. Completions only
    /// auto-launch newly unblocked tasks during `execute_all`; a single
    /// `execute_task` run stays confined to its transitive dependencies.
    full_run: bool,
}

struct ManagerInner<T> {
    semaphore: Arc<Semaphore>,
    notify: Notify,
    state: Mutex<ManagerState<T>>,
}

/// DAG-first task executor: execution order is derived entirely from
/// dependency edges rather than priority.
///
/// Tasks are registered up front with explicit dependencies (which must
/// already be registered), validated for cycles with atomic rollback, and
/// executed either all at once (`execute_all`) or on demand (`execute_task`).
/// There is no retry support here; a failed task fails its transitive
/// dependents with [`TaskError::DependencyFailed`].
pub struct DependencyManager<T> {
    inner: Arc<ManagerInner<T>>,
}

impl<T> Clone for DependencyManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> DependencyManager<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
                notify: Notify::new(),
                state: Mutex::new(ManagerState {
                    tasks: HashMap::new(),
                    graph: DependencyGraph::new(),
                    full_run: false,
                }),
            }),
        }
    }

    /// Register a task with explicit dependency edges.
    ///
    /// Every dependency must already be registered; an edge set that would
    /// close a cycle is rejected with the graph rolled back and no task
    /// created.
    pub async fn register_task<F, Fut>(
        &self,
        id: &str,
        name: &str,
        func: F,
        dependencies: &[&str],
    ) -> Result<(), TaskError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut state = self.inner.state.lock().await;

        if state.tasks.contains_key(id) {
            return Err(TaskError::AlreadyRegistered {
                task_id: id.to_string(),
            });
        }
        for dep in dependencies {
            if !state.tasks.contains_key(*dep) {
                return Err(TaskError::MissingDependency {
                    task_id: id.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }

        let owned_deps: Vec<String> = dependencies.iter().map(|dep| dep.to_string()).collect();
        state
            .graph
            .add_task(id.to_string(), &owned_deps)
            .map_err(|err| match err {
                GraphError::Cycle { node } => TaskError::CyclicDependency { task_id: node },
                GraphError::DuplicateNode { node } => TaskError::AlreadyRegistered { task_id: node },
            })?;

        let func: TaskFn<T> = Arc::new(move || Box::pin(func()));
        state.tasks.insert(
            id.to_string(),
            ManagedTask {
                name: name.to_string(),
                func,
                status: TaskStatus::Pending,
                launched: false,
                result: None,
            },
        );
        debug!(task = id, name, dependencies = dependencies.len(), "task registered");
        Ok(())
    }

    /// Execute every registered task in dependency order and return a map
    /// from task id to its result once all of them have resolved.
    pub async fn execute_all(&self) -> HashMap<String, Result<T, TaskError>> {
        let launch = {
            let mut state = self.inner.state.lock().await;
            info!(tasks = state.tasks.len(), "executing full task graph");
            state.full_run = true;
            ManagerInner::collect_launchable(&mut state)
        };
        for id in launch {
            tokio::spawn(ManagerInner::run_task(self.inner.clone(), id));
        }

        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().await;
                if state.tasks.values().all(|task| task.result.is_some()) {
                    state.full_run = false;
                    return state
                        .tasks
                        .iter()
                        .filter_map(|(id, task)| {
                            task.result.clone().map(|result| (id.clone(), result))
                        })
                        .collect();
                }
            }
            notified.await;
        }
    }

    /// Execute one task, first resolving each of its transitive dependencies
    /// sequentially. If the task is already in flight its existing outcome is
    /// awaited rather than double-executing.
    pub async fn execute_task(&self, id: &str) -> Result<T, TaskError> {
        let dependencies = {
            let state = self.inner.state.lock().await;
            let Some(task) = state.tasks.get(id) else {
                return Err(TaskError::NotFound(id.to_string()));
            };
            if let Some(result) = &task.result {
                return result.clone();
            }
            if task.launched {
                drop(state);
                return self.wait_for_result(id).await;
            }
            state.graph.dependencies_of(&id.to_string())
        };

        for dep in dependencies {
            if Box::pin(self.execute_task(&dep)).await.is_err() {
                return Err(TaskError::DependencyFailed {
                    task_id: id.to_string(),
                    dependency: dep,
                });
            }
        }

        {
            let mut state = self.inner.state.lock().await;
            let Some(task) = state.tasks.get_mut(id) else {
                return Err(TaskError::NotFound(id.to_string()));
            };
            if let Some(result) = &task.result {
                return result.clone();
            }
            if task.launched {
                drop(state);
                return self.wait_for_result(id).await;
            }
            task.launched = true;
        }

        ManagerInner::run_task(self.inner.clone(), id.to_string()).await;
        self.wait_for_result(id).await
    }

    /// Current status of every registered task.
    pub async fn tasks_status(&self) -> HashMap<String, TaskStatus> {
        let state = self.inner.state.lock().await;
        state
            .tasks
            .iter()
            .map(|(id, task)| (id.clone(), task.status))
            .collect()
    }

    /// A deterministic valid linearization of the dependency graph.
    pub async fn topological_order(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        state.graph.topological_order()
    }

    /// The registered display name of a task, if known.
    pub async fn task_name(&self, id: &str) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.tasks.get(id).map(|task| task.name.clone())
    }

    /// Result of a task, if it has resolved.
    pub async fn task_result(&self, id: &str) -> Option<Result<T, TaskError>> {
        let state = self.inner.state.lock().await;
        state.tasks.get(id).and_then(|task| task.result.clone())
    }

    async fn wait_for_result(&self, id: &str) -> Result<T, TaskError> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let state = self.inner.state.lock().await;
                match state.tasks.get(id) {
                    Some(task) => {
                        if let Some(result) = &task.result {
                            return result.clone();
                        }
                    }
                    None => return Err(TaskError::NotFound(id.to_string())),
                }
            }
            notified.await;
        }
    }
}

impl<T: Clone + Send + 'static> ManagerInner<T> {
    /// Fail every unlaunched task with a failed dependency (transitively),
    /// then return the unlaunched ready set, marking it launched.
    fn collect_launchable(state: &mut ManagerState<T>) -> Vec<String> {
        loop {
            let mut blocked = None;
            'scan: for (id, task) in &state.tasks {
                if task.result.is_some() || task.launched {
                    continue;
                }
                for dep in state.graph.dependencies_of(id) {
                    let failed = state
                        .tasks
                        .get(&dep)
                        .and_then(|dep_task| dep_task.result.as_ref())
                        .map(|result| result.is_err())
                        .unwrap_or(false);
                    if failed {
                        blocked = Some((id.clone(), dep));
                        break 'scan;
                    }
                }
            }
            let Some((id, dep)) = blocked else {
                break;
            };
            warn!(task = %id, dependency = %dep, "failing task whose dependency failed");
            if let Some(task) = state.tasks.get_mut(&id) {
                task.status = TaskStatus::Failed;
                task.launched = true;
                task.result = Some(Err(TaskError::DependencyFailed {
                    task_id: id.clone(),
                    dependency: dep,
                }));
            }
        }

        let mut ready: Vec<String> = state
            .tasks
            .iter()
            .filter(|(id, task)| {
                task.result.is_none() && !task.launched && state.graph.is_ready(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();
        for id in &ready {
            if let Some(task) = state.tasks.get_mut(id) {
                task.launched = true;
            }
        }
        ready
    }

    /// Run one task body under the global concurrency cap, then sweep the
    /// graph for newly unblocked work. Boxed so completion can respawn
    /// dependents recursively.
    fn run_task(inner: Arc<Self>, id: String) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let Ok(permit) = inner.semaphore.clone().acquire_owned().await else {
                return;
            };

            let func = {
                let mut state = inner.state.lock().await;
                let Some(task) = state.tasks.get_mut(&id) else {
                    return;
                };
                task.status = TaskStatus::Running;
                task.func.clone()
            };
            debug!(task = %id, "dependency task started");

            let result = (func)().await;
            drop(permit);

            let launch = {
                let mut state = inner.state.lock().await;
                match result {
                    Ok(value) => {
                        if let Some(task) = state.tasks.get_mut(&id) {
                            task.status = TaskStatus::Completed;
                            task.result = Some(Ok(value));
                        }
                        state.graph.mark_satisfied(&id);
                        info!(task = %id, "dependency task completed");
                    }
                    Err(err) => {
                        if let Some(task) = state.tasks.get_mut(&id) {
                            task.status = TaskStatus::Failed;
                            task.result = Some(Err(TaskError::Execution(err.to_string())));
                        }
                        warn!(task = %id, error = %err, "dependency task failed");
                    }
                }
                if state.full_run {
                    Self::collect_launchable(&mut state)
                } else {
                    Vec::new()
                }
            };
            for next in launch {
                tokio::spawn(Self::run_task(inner.clone(), next));
            }
            inner.notify.notify_waiters();
        })
    }
}
