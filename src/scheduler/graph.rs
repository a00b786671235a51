use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::debug;

/// Error raised when a registration would violate the acyclicity invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError<K: Debug> {
    #[error("adding task {node:?} would create a dependency cycle")]
    Cycle { node: K },
    #[error("node {node:?} already exists")]
    DuplicateNode { node: K },
}

#[derive(Debug, Clone)]
struct Node<K> {
    dependencies: HashSet<K>,
    dependents: HashSet<K>,
    satisfied: bool,
    /// False for placeholder nodes created on behalf of an unknown dependency.
    registered: bool,
}

impl<K> Default for Node<K> {
    fn default() -> Self {
        Self {
            dependencies: HashSet::new(),
            dependents: HashSet::new(),
            satisfied: false,
            registered: false,
        }
    }
}

/// Directed acyclic graph over task ids.
///
/// Edges point from a dependency to its dependents. The graph is always
/// acyclic: an insertion that would close a cycle is rejected and rolled back
/// atomically, leaving the node and edge sets exactly as they were.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    nodes: HashMap<K, Node<K>>,
}

impl<K> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }
}

impl<K> DependencyGraph<K>
where
    K: Eq + Hash + Ord + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &K) -> bool {
        self.nodes.contains_key(id)
    }

    /// Register a task node together with its dependency edges, atomically.
    ///
    /// Dependencies that are not yet known get unsatisfied placeholder nodes;
    /// a node that only ever existed as a placeholder can itself be registered
    /// later. If any edge would close a cycle, every staged change is rolled
    /// back and the graph is left exactly as it was.
    pub fn add_task(&mut self, id: K, dependencies: &[K]) -> Result<(), GraphError<K>> {
        let was_placeholder = match self.nodes.get(&id) {
            Some(node) if node.registered => {
                return Err(GraphError::DuplicateNode { node: id });
            }
            Some(_) => true,
            None => false,
        };

        // Stage: remember which dependency nodes this call creates so a
        // failed validation can discard exactly what it added.
        let mut created_placeholders = Vec::new();
        let node = self.nodes.entry(id.clone()).or_default();
        node.registered = true;
        for dep in dependencies {
            if !self.nodes.contains_key(dep) {
                self.nodes.insert(dep.clone(), Node::default());
                created_placeholders.push(dep.clone());
            }
        }
        for dep in dependencies {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.dependencies.insert(dep.clone());
            }
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                dep_node.dependents.insert(id.clone());
            }
        }

        if self.has_cycle_through(&id) {
            for dep in dependencies {
                if let Some(dep_node) = self.nodes.get_mut(dep) {
                    dep_node.dependents.remove(&id);
                }
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.dependencies.remove(dep);
                }
            }
            for placeholder in created_placeholders {
                self.nodes.remove(&placeholder);
            }
            if was_placeholder {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.registered = false;
                }
            } else {
                self.nodes.remove(&id);
            }
            return Err(GraphError::Cycle { node: id });
        }

        debug!(node = ?id, dependencies = dependencies.len(), "registered dependency node");
        Ok(())
    }

    /// DFS with a recursion stack from `start`, following dependency edges.
    /// The graph was acyclic before the staged insertion, so any new cycle
    /// must pass through `start`.
    fn has_cycle_through(&self, start: &K) -> bool {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        self.dfs_cycle(start, &mut visited, &mut stack)
    }

    fn dfs_cycle(&self, id: &K, visited: &mut HashSet<K>, stack: &mut HashSet<K>) -> bool {
        if stack.contains(id) {
            return true;
        }
        if visited.contains(id) {
            return false;
        }
        visited.insert(id.clone());
        stack.insert(id.clone());

        if let Some(node) = self.nodes.get(id) {
            for dep in &node.dependencies {
                if self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.remove(id);
        false
    }

    /// Mark a node's work as completed, unblocking its dependents.
    pub fn mark_satisfied(&mut self, id: &K) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.satisfied = true;
        }
    }

    pub fn is_satisfied(&self, id: &K) -> bool {
        // A pruned node was completed and evicted; treat it as satisfied.
        self.nodes.get(id).map(|node| node.satisfied).unwrap_or(true)
    }

    /// Whether every dependency of `id` is satisfied.
    pub fn is_ready(&self, id: &K) -> bool {
        match self.nodes.get(id) {
            Some(node) => node.dependencies.iter().all(|dep| self.is_satisfied(dep)),
            None => true,
        }
    }

    /// Dependents of a node, in deterministic order.
    pub fn dependents_of(&self, id: &K) -> Vec<K> {
        let mut dependents: Vec<K> = self
            .nodes
            .get(id)
            .map(|node| node.dependents.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    /// Dependencies of a node, in deterministic order.
    pub fn dependencies_of(&self, id: &K) -> Vec<K> {
        let mut dependencies: Vec<K> = self
            .nodes
            .get(id)
            .map(|node| node.dependencies.iter().cloned().collect())
            .unwrap_or_default();
        dependencies.sort();
        dependencies
    }

    /// Detach a node from both edge directions and drop it.
    pub fn remove_node(&mut self, id: &K) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        for dependent in &node.dependents {
            if let Some(other) = self.nodes.get_mut(dependent) {
                other.dependencies.remove(id);
            }
        }
        for dependency in &node.dependencies {
            if let Some(other) = self.nodes.get_mut(dependency) {
                other.dependents.remove(id);
            }
        }
    }

    /// Deterministic topological order (Kahn's algorithm; the ready set is
    /// kept sorted so equal graphs always linearize identically).
    pub fn topological_order(&self) -> Vec<K> {
        let mut in_degree: HashMap<K, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.dependencies.len()))
            .collect();

        let mut ready: Vec<K> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.first().cloned() {
            ready.remove(0);
            for dependent in self.dependents_of(&id) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        let position = ready.binary_search(&dependent).unwrap_or_else(|p| p);
                        ready.insert(position, dependent);
                    }
                }
            }
            order.push(id);
        }
        order
    }
}
