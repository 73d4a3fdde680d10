//! Change-observation protocol (spec §4.5): full snapshots and
//! delta-since-watermark views over output ports, both read-only with
//! respect to the engine.

use dataflow_core::Value;

use crate::arena::PortArena;
use crate::graph::GraphStore;

/// One output port's identity and current value, as exposed by
/// [`snapshot`] and [`delta`].
#[derive(Debug, Clone, PartialEq)]
pub struct PortSample {
    pub node_id: String,
    pub port_id: String,
    pub value: Value,
}

/// A mapping from every output port to its current value.
pub fn snapshot(store: &GraphStore, arena: &PortArena) -> Vec<PortSample> {
    store
        .ports()
        .iter()
        .filter(|p| p.is_output())
        .map(|p| PortSample {
            node_id: p.node_id.clone(),
            port_id: p.port_id.clone(),
            value: arena.value(p.handle.index()).clone(),
        })
        .collect()
}

/// Output ports whose generation stamp is strictly greater than
/// `watermark`, each with its final value. Because the port arena holds
/// exactly one value per port, a port written multiple times within a
/// single evaluation still appears at most once here, satisfying the
/// at-most-once-per-port-per-generation contract.
pub fn delta(store: &GraphStore, arena: &PortArena, watermark: u64) -> Vec<PortSample> {
    store
        .ports()
        .iter()
        .filter(|p| p.is_output())
        .filter(|p| arena.generation(p.handle.index()) > watermark)
        .map(|p| PortSample {
            node_id: p.node_id.clone(),
            port_id: p.port_id.clone(),
            value: arena.value(p.handle.index()).clone(),
        })
        .collect()
}
