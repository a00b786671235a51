use crate::scheduler::types::{Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Total orderings selectable at runtime for the ready queue.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityStrategy {
    /// Descending numeric priority
    #[default]
    Simple,
    /// Ascending submission time
    Fifo,
    /// Ascending deadline; tasks without a deadline sort last
    Deadline,
    /// Ascending total resource magnitude, ties broken by descending priority
    ResourceAware,
    /// Deadline first, then descending priority, then longest wait
    Custom,
}

/// Ordering inputs snapshotted when a task enters the queue.
///
/// All five strategies order over these fields, so a strategy switch never
/// needs to consult the task records again.
#[derive(Clone, Copy, Debug)]
pub struct SortKey {
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub resource_magnitude: f64,
}

impl From<&Task> for SortKey {
    fn from(task: &Task) -> Self {
        Self {
            priority: task.priority,
            created_at: task.created_at,
            deadline: task.deadline,
            resource_magnitude: task.resource_magnitude(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct QueueItem {
    pub id: TaskId,
    pub key: SortKey,
}

impl QueueItem {
    pub fn new(id: TaskId, key: SortKey) -> Self {
        Self { id, key }
    }
}

/// Deadlines compare ascending; a missing deadline sorts after every present one.
fn compare_deadline(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(strategy: PriorityStrategy, a: &SortKey, b: &SortKey) -> Ordering {
    match strategy {
        PriorityStrategy::Simple => b.priority.cmp(&a.priority),
        PriorityStrategy::Fifo => a.created_at.cmp(&b.created_at),
        PriorityStrategy::Deadline => compare_deadline(a.deadline, b.deadline),
        PriorityStrategy::ResourceAware => a
            .resource_magnitude
            .partial_cmp(&b.resource_magnitude)
            .unwrap_or(Ordering::Equal)
            .then(b.priority.cmp(&a.priority)),
        PriorityStrategy::Custom => compare_deadline(a.deadline, b.deadline)
            .then(b.priority.cmp(&a.priority))
            // longest-waiting task first
            .then(a.created_at.cmp(&b.created_at)),
    }
}

/// Priority-ordered ready queue over task ids.
///
/// Kept sorted on insertion; equal keys preserve insertion order. The head
/// (index 0) is the next candidate for admission.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    strategy: PriorityStrategy,
    items: Vec<QueueItem>,
}

impl ReadyQueue {
    pub fn new(strategy: PriorityStrategy) -> Self {
        Self {
            strategy,
            items: Vec::new(),
        }
    }

    pub fn strategy(&self) -> PriorityStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.items.iter().any(|item| item.id == *id)
    }

    /// Insert behind all items that sort equal, preserving arrival order.
    pub fn push(&mut self, item: QueueItem) {
        let index = self
            .items
            .partition_point(|existing| compare(self.strategy, &existing.key, &item.key) != Ordering::Greater);
        self.items.insert(index, item);
    }

    pub fn peek(&self) -> Option<&QueueItem> {
        self.items.first()
    }

    pub fn pop_front(&mut self) -> Option<QueueItem> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Remove a task wherever it sits in the queue.
    pub fn remove(&mut self, id: &TaskId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != *id);
        self.items.len() != before
    }

    /// Drain all queued items, e.g. for bulk cancellation.
    pub fn drain(&mut self) -> Vec<QueueItem> {
        std::mem::take(&mut self.items)
    }

    /// Switch the active ordering: drain the queue into a flat list and
    /// re-insert every task under the new strategy. No task is lost or
    /// duplicated; running and terminal tasks are unaffected because they are
    /// never queued.
    pub fn set_strategy(&mut self, strategy: PriorityStrategy) {
        if strategy == self.strategy {
            return;
        }
        debug!(from = ?self.strategy, to = ?strategy, queued = self.items.len(), "switching priority strategy");
        let drained = self.drain();
        self.strategy = strategy;
        for item in drained {
            self.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    // One shared base per test so equal offsets produce equal instants.
    fn key(
        base: DateTime<Utc>,
        priority: i32,
        age_ms: i64,
        deadline_ms: Option<i64>,
        resources: f64,
    ) -> SortKey {
        SortKey {
            priority,
            created_at: base - Duration::milliseconds(age_ms),
            deadline: deadline_ms.map(|ms| base + Duration::milliseconds(ms)),
            resource_magnitude: resources,
        }
    }

    fn ids(queue: &ReadyQueue) -> Vec<TaskId> {
        queue.items.iter().map(|item| item.id).collect()
    }

    #[test]
    fn simple_orders_by_descending_priority() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Simple);
        let base = Utc::now();
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        queue.push(QueueItem::new(low, key(base, 1, 0, None, 0.0)));
        queue.push(QueueItem::new(high, key(base, 9, 0, None, 0.0)));
        assert_eq!(ids(&queue), vec![high, low]);
    }

    #[test]
    fn fifo_orders_by_submission_time() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Fifo);
        let base = Utc::now();
        let newer = Uuid::new_v4();
        let older = Uuid::new_v4();
        queue.push(QueueItem::new(newer, key(base, 9, 10, None, 0.0)));
        queue.push(QueueItem::new(older, key(base, 1, 500, None, 0.0)));
        assert_eq!(ids(&queue), vec![older, newer]);
    }

    #[test]
    fn deadline_sorts_missing_deadlines_last() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Deadline);
        let base = Utc::now();
        let none = Uuid::new_v4();
        let late = Uuid::new_v4();
        let soon = Uuid::new_v4();
        queue.push(QueueItem::new(none, key(base, 9, 0, None, 0.0)));
        queue.push(QueueItem::new(late, key(base, 1, 0, Some(5_000), 0.0)));
        queue.push(QueueItem::new(soon, key(base, 1, 0, Some(100), 0.0)));
        assert_eq!(ids(&queue), vec![soon, late, none]);
    }

    #[test]
    fn resource_aware_prefers_light_tasks_then_priority() {
        let mut queue = ReadyQueue::new(PriorityStrategy::ResourceAware);
        let base = Utc::now();
        let heavy = Uuid::new_v4();
        let light_low = Uuid::new_v4();
        let light_high = Uuid::new_v4();
        queue.push(QueueItem::new(heavy, key(base, 9, 0, None, 16.0)));
        queue.push(QueueItem::new(light_low, key(base, 1, 0, None, 2.0)));
        queue.push(QueueItem::new(light_high, key(base, 5, 0, None, 2.0)));
        assert_eq!(ids(&queue), vec![light_high, light_low, heavy]);
    }

    #[test]
    fn custom_orders_deadline_then_priority_then_wait() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Custom);
        let base = Utc::now();
        let no_deadline = Uuid::new_v4();
        let deadline_low = Uuid::new_v4();
        let deadline_high = Uuid::new_v4();
        let waited_longer = Uuid::new_v4();
        queue.push(QueueItem::new(no_deadline, key(base, 9, 1_000, None, 0.0)));
        queue.push(QueueItem::new(deadline_low, key(base, 1, 0, Some(100), 0.0)));
        queue.push(QueueItem::new(deadline_high, key(base, 5, 0, Some(100), 0.0)));
        queue.push(QueueItem::new(waited_longer, key(base, 5, 800, Some(100), 0.0)));
        assert_eq!(
            ids(&queue),
            vec![waited_longer, deadline_high, deadline_low, no_deadline]
        );
    }

    #[test]
    fn strategy_switch_keeps_every_task() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Simple);
        let base = Utc::now();
        let mut all = Vec::new();
        for priority in 0..10 {
            let id = Uuid::new_v4();
            all.push(id);
            queue.push(QueueItem::new(id, key(base, priority, priority as i64, None, 0.0)));
        }

        queue.set_strategy(PriorityStrategy::Fifo);
        assert_eq!(queue.len(), 10);
        let mut reordered = ids(&queue);
        reordered.sort();
        all.sort();
        assert_eq!(reordered, all);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut queue = ReadyQueue::new(PriorityStrategy::Simple);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let shared = key(Utc::now(), 5, 0, None, 0.0);
        queue.push(QueueItem::new(first, shared));
        queue.push(QueueItem::new(second, shared));
        assert_eq!(ids(&queue), vec![first, second]);
    }
}
