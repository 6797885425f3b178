//! Integration tests: a node wired to a scripted relay, and several nodes
//! sharing one flooding relay.

pub mod multi_node;
pub mod node_flows;
