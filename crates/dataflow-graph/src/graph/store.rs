use ahash::AHashMap;
use smallvec::SmallVec;

use dataflow_core::{
    DType, Direction, NodeHandle, NodeKind, ParamValue, PortDescriptor, PortHandle, Value,
};

/// One node as recorded in the immutable-after-load graph store.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub inputs: SmallVec<[PortHandle; 4]>,
    pub outputs: SmallVec<[PortHandle; 4]>,
    pub parameters: AHashMap<String, ParamValue>,
}

impl NodeRecord {
    /// The declared type of the node's first output — the compute type
    /// used for this node's internal arithmetic (spec §4.2/§4.3). Nodes
    /// with no declared output have no compute type; callers that reach
    /// this case have a malformed description that should have been
    /// rejected at load.
    pub fn compute_type(&self, ports: &[PortDescriptor]) -> DType {
        self.outputs
            .first()
            .map(|h| ports[h.index()].dtype)
            .unwrap_or(DType::F64)
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }
}

/// Immutable-after-load tables describing nodes, ports, edges,
/// topological order, and adjacency. See spec §3/§4.1.
pub struct GraphStore {
    pub(crate) nodes: Vec<NodeRecord>,
    pub(crate) node_id_to_handle: AHashMap<String, NodeHandle>,
    /// Canonical per-node handle, indexed by position — the same value
    /// handed out at load, carrying the node's `debug_name`. Reused
    /// wherever a `NodeHandle` is needed for an existing node, rather
    /// than reconstructed from a bare index.
    pub(crate) node_handles: Vec<NodeHandle>,

    pub(crate) ports: Vec<PortDescriptor>,
    pub(crate) port_lookup: AHashMap<(NodeHandle, String, Direction), PortHandle>,

    /// Node handles in topological order.
    pub(crate) topo_order: Vec<NodeHandle>,
    /// `node_handle.index() -> position in topo_order`.
    pub(crate) topo_index: Vec<u32>,

    /// For each output port handle, the ordered list of input port
    /// handles it feeds (spec: "reverse adjacency").
    pub(crate) reverse_adjacency: Vec<SmallVec<[PortHandle; 4]>>,
    /// For each node, the ordered list of downstream node handles that
    /// consume any of its outputs, deduplicated (spec: "forward
    /// dependents").
    pub(crate) forward_dependents: Vec<SmallVec<[NodeHandle; 4]>>,
}

impl GraphStore {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn node(&self, handle: NodeHandle) -> &NodeRecord {
        &self.nodes[handle.index()]
    }

    pub fn node_handle(&self, node_id: &str) -> Option<NodeHandle> {
        self.node_id_to_handle.get(node_id).copied()
    }

    /// Canonical node handles, one per node, in load order.
    pub fn node_handles(&self) -> &[NodeHandle] {
        &self.node_handles
    }

    pub fn port(&self, handle: PortHandle) -> &PortDescriptor {
        &self.ports[handle.index()]
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    /// Pure lookup: resolve a `(node_id, port_id, direction)` triple to
    /// its handle.
    pub fn port_handle(
        &self,
        node_id: &str,
        port_id: &str,
        direction: Direction,
    ) -> Option<PortHandle> {
        let node_handle = *self.node_id_to_handle.get(node_id)?;
        self.port_lookup
            .get(&(node_handle, port_id.to_string(), direction))
            .copied()
    }

    pub fn topo_order(&self) -> &[NodeHandle] {
        &self.topo_order
    }

    pub fn topo_index(&self, handle: NodeHandle) -> u32 {
        self.topo_index[handle.index()]
    }

    pub fn reverse_adjacency(&self, output: PortHandle) -> &[PortHandle] {
        &self.reverse_adjacency[output.index()]
    }

    pub fn forward_dependents(&self, node: NodeHandle) -> &[NodeHandle] {
        &self.forward_dependents[node.index()]
    }

    /// Nodes with no outgoing edges — the AOT generator's `Outputs`
    /// record has one field per sink, in node-load order (spec §4.6).
    pub fn sinks(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.node_handles.iter().copied().filter(move |&h| {
            self.nodes[h.index()]
                .outputs
                .iter()
                .all(|out| self.reverse_adjacency[out.index()].is_empty())
        })
    }

    /// `DeviceTrigger` nodes in node-load order — the AOT generator's
    /// `Inputs` record has one field per device trigger (spec §4.6).
    pub fn device_triggers(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.node_handles
            .iter()
            .copied()
            .filter(move |&h| self.nodes[h.index()].kind == NodeKind::DeviceTrigger)
    }

    pub fn initial_port_value(&self, handle: PortHandle) -> Value {
        self.ports[handle.index()].dtype.zero()
    }

    /// Overwrite a node's parameter. The only runtime mutation the store
    /// permits after `load`: a `DeviceTrigger`'s `value` parameter (and,
    /// vestigially, its `min_interval`/`max_interval`) are written by
    /// external agents via `set_input`/`set_input_config`, while every
    /// other table built at load stays fixed for the graph's lifetime.
    pub fn set_parameter(&mut self, handle: NodeHandle, name: &str, value: ParamValue) {
        self.nodes[handle.index()]
            .parameters
            .insert(name.to_string(), value);
    }
}

pub(crate) struct PortLookupBuilder<'a> {
    pub lookup: &'a mut AHashMap<(NodeHandle, String, Direction), PortHandle>,
}

impl<'a> PortLookupBuilder<'a> {
    pub fn insert(&mut self, node: NodeHandle, port_id: &str, direction: Direction, handle: PortHandle) {
        self.lookup
            .insert((node, port_id.to_string(), direction), handle);
    }
}
