use crate::core::detector::{BrokenCycle, Detector};
use crate::core::graph::WaitForGraph;
use crate::core::lock_manager::LockTable;
use crate::core::transaction::Transaction;
use crate::core::types::InstanceId;
use fxhash::FxHashMap;
use std::sync::Arc;

impl Detector {
    /// Search the full wait-for graph for cycles of any length
    ///
    /// Edges run from each waiting instance to the owner of the resource it
    /// waits on. Edges are inserted in registry order; an edge that would
    /// close a cycle yields that cycle, which is broken on the spot. The
    /// victim is then dropped from the graph and the search continues.
    pub(crate) fn sweep_graph(&self, table: &mut LockTable) -> Vec<BrokenCycle> {
        let records = table.registry().records().to_vec();
        let waiters: FxHashMap<InstanceId, Arc<Transaction>> = records
            .iter()
            .map(|r| (r.txn.instance(), Arc::clone(&r.txn)))
            .collect();

        let mut graph = WaitForGraph::new();
        let mut broken = Vec::new();

        for record in &records {
            if record.txn.is_aborted() {
                continue;
            }
            let Some(owner) = table.owner(record.resource).map(|o| o.instance()) else {
                continue;
            };
            if owner == record.txn.instance() {
                continue;
            }

            let Some(mut path) = graph.add_edge(record.txn.instance(), owner) else {
                continue;
            };
            // path runs owner ..= waiter; rotate it into wait order
            path.rotate_right(1);
            let cycle = path
                .iter()
                .filter_map(|instance| waiters.get(instance).cloned())
                .collect::<Vec<_>>();

            if let Some(found) = self.break_cycle(table, cycle) {
                graph.remove_node(found.victim.instance());
                broken.push(found);
            }
        }

        broken
    }
}
