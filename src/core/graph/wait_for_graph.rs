//! Wait-For Graph for cycles of any length
//!
//! Nodes are transaction instances. An edge `A -> B` means instance A is
//! blocked on a resource owned by instance B. The graph is rebuilt from the
//! Wait-For Registry on every sweep that uses it.
//!
//! Two mappings are kept so that removing a victim is proportional to its
//! neighbours:
//! 1. *Forward graph (`edges`)*: `A -> {B}`, searched with BFS.
//! 2. *Reverse graph (`incoming_edges`)*: `B -> {A}`, used for cleanup.
//!
//! Before an edge `A -> B` is inserted the graph checks whether a path from B
//! back to A already exists; if so the edge would close a cycle and the path
//! is returned instead.

use crate::core::types::InstanceId;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Directed graph of instance wait relationships
#[derive(Default)]
pub struct WaitForGraph {
    /// Maps an instance to all instances it is waiting for
    pub(crate) edges: FxHashMap<InstanceId, FxHashSet<InstanceId>>,

    /// Maps an instance to all instances waiting for it
    pub(crate) incoming_edges: FxHashMap<InstanceId, FxHashSet<InstanceId>>,

    // Cached buffers for BFS to avoid repeated allocations
    bfs_queue: VecDeque<InstanceId>,
    bfs_visited: FxHashSet<InstanceId>,
    bfs_parent: FxHashMap<InstanceId, InstanceId>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self {
            bfs_queue: VecDeque::with_capacity(16),
            ..Default::default()
        }
    }

    /// Add a directed edge: `from` waits for `to`
    ///
    /// # Returns
    /// * `Some(path)` - the edge would close a cycle; `path` runs from `to`
    ///   to `from` and the edge is not inserted
    /// * `None` - the edge was inserted (or already existed)
    pub fn add_edge(&mut self, from: InstanceId, to: InstanceId) -> Option<Vec<InstanceId>> {
        if let Some(targets) = self.edges.get(&from)
            && targets.contains(&to)
        {
            return None;
        }

        if let Some(path) = self.find_path(to, from) {
            return Some(path);
        }

        self.edges.entry(from).or_default().insert(to);
        self.incoming_edges.entry(to).or_default().insert(from);

        None
    }

    /// Remove all edges of `node`, incoming and outgoing
    pub fn remove_node(&mut self, node: InstanceId) {
        if let Some(targets) = self.edges.remove(&node) {
            for target in targets {
                if let Some(waiters) = self.incoming_edges.get_mut(&target) {
                    waiters.remove(&node);
                    if waiters.is_empty() {
                        self.incoming_edges.remove(&target);
                    }
                }
            }
        }

        if let Some(waiters) = self.incoming_edges.remove(&node) {
            for waiter in waiters {
                if let Some(forward_set) = self.edges.get_mut(&waiter) {
                    forward_set.remove(&node);
                    if forward_set.is_empty() {
                        self.edges.remove(&waiter);
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(FxHashSet::len).sum()
    }

    /// Find a path from `start` to `target` using BFS
    fn find_path(&mut self, start: InstanceId, target: InstanceId) -> Option<Vec<InstanceId>> {
        if start == target {
            return Some(vec![start]);
        }

        self.bfs_queue.clear();
        self.bfs_visited.clear();
        self.bfs_parent.clear();

        self.bfs_queue.push_back(start);
        self.bfs_visited.insert(start);

        while let Some(current) = self.bfs_queue.pop_front() {
            if current == target {
                let mut path = Vec::with_capacity(self.bfs_parent.len() + 1);
                let mut curr = target;
                path.push(curr);
                while let Some(&p) = self.bfs_parent.get(&curr) {
                    path.push(p);
                    curr = p;
                }
                path.reverse();
                return Some(path);
            }

            if let Some(neighbors) = self.edges.get(&current) {
                for &neighbor in neighbors {
                    if self.bfs_visited.insert(neighbor) {
                        self.bfs_parent.insert(neighbor, current);
                        self.bfs_queue.push_back(neighbor);
                    }
                }
            }
        }

        None
    }
}
