//! Graph used by the general cycle search
//!
//! The pairwise sweep works directly on the Wait-For Registry; the wait-for
//! graph strategy rebuilds this graph from it on every sweep.

pub(crate) mod wait_for_graph;

pub(crate) use wait_for_graph::WaitForGraph;
