use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use dataflow_core::{
    DType, Direction, GraphDescription, LoadError, NodeHandle, PortDescriptor, PortHandle,
    UnknownReference,
};

use super::store::{GraphStore, NodeRecord, PortLookupBuilder};

struct PendingEdge {
    src_node: NodeHandle,
    src_port: PortHandle,
    dst_node: NodeHandle,
    dst_port: PortHandle,
}

/// Leak an owned string to a `&'static str` for a handle's `debug_name`.
/// Node/port identifiers are fixed for the lifetime of a loaded graph, so
/// this trades an unreclaimed allocation per load for `Copy` handles that
/// carry their own name — the same tradeoff `NodeID::debug_name` makes in
/// the engine this one is modeled on, there baked in at compile time
/// instead of leaked at load time since those names are static strings.
fn leak_str(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}

/// Build the immutable graph store from an already-parsed description.
/// See spec §4.1 for the full contract.
pub fn load(description: &GraphDescription) -> Result<GraphStore, LoadError> {
    let mut nodes = Vec::with_capacity(description.nodes.len());
    let mut node_id_to_handle = AHashMap::with_capacity(description.nodes.len());
    let mut node_handles = Vec::with_capacity(description.nodes.len());
    let mut ports = Vec::new();
    let mut port_lookup = AHashMap::new();

    // Pass 1: assign node handles and, within each node, input port
    // handles before output port handles, both in declared order.
    for node_desc in &description.nodes {
        if node_id_to_handle.contains_key(&node_desc.id) {
            return Err(LoadError::DuplicateNodeId(node_desc.id.clone()));
        }

        let node_handle = NodeHandle::new(nodes.len() as u32, leak_str(node_desc.id.clone()));
        node_id_to_handle.insert(node_desc.id.clone(), node_handle);
        node_handles.push(node_handle);

        let mut inputs = SmallVec::new();
        let mut outputs = SmallVec::new();
        let mut lookup_builder = PortLookupBuilder {
            lookup: &mut port_lookup,
        };

        for port in &node_desc.inputs {
            let debug_name = leak_str(format!("{}.{}", node_desc.id, port.id));
            let handle = PortHandle::new(ports.len() as u32, debug_name);
            ports.push(PortDescriptor {
                handle,
                node_id: node_desc.id.clone(),
                port_id: port.id.clone(),
                direction: Direction::Input,
                dtype: port.dtype.into(),
            });
            lookup_builder.insert(node_handle, &port.id, Direction::Input, handle);
            inputs.push(handle);
        }
        for port in &node_desc.outputs {
            let debug_name = leak_str(format!("{}.{}", node_desc.id, port.id));
            let handle = PortHandle::new(ports.len() as u32, debug_name);
            ports.push(PortDescriptor {
                handle,
                node_id: node_desc.id.clone(),
                port_id: port.id.clone(),
                direction: Direction::Output,
                dtype: port.dtype.into(),
            });
            lookup_builder.insert(node_handle, &port.id, Direction::Output, handle);
            outputs.push(handle);
        }

        let mut parameters = AHashMap::with_capacity(node_desc.parameters.len());
        for (k, v) in &node_desc.parameters {
            parameters.insert(k.clone(), v.clone());
        }

        nodes.push(NodeRecord {
            id: node_desc.id.clone(),
            kind: node_desc.kind,
            inputs,
            outputs,
            parameters,
        });
    }

    // Pass 2: resolve connections into handle-space edges, checking
    // reference validity and numeric coercion rules.
    let mut connected_input_ports: AHashSet<PortHandle> = AHashSet::with_capacity(description.connections.len());
    let mut edges = Vec::with_capacity(description.connections.len());

    for conn in &description.connections {
        let src_node = node_id_to_handle
            .get(&conn.from_node)
            .copied()
            .ok_or_else(|| LoadError::UnknownReference(UnknownReference::Node(conn.from_node.clone())))?;
        let dst_node = node_id_to_handle
            .get(&conn.to_node)
            .copied()
            .ok_or_else(|| LoadError::UnknownReference(UnknownReference::Node(conn.to_node.clone())))?;

        let src_port = nodes[src_node.index()]
            .outputs
            .iter()
            .copied()
            .find(|h| ports[h.index()].port_id == conn.from_port)
            .ok_or_else(|| {
                LoadError::UnknownReference(UnknownReference::Port {
                    node: conn.from_node.clone(),
                    port: conn.from_port.clone(),
                })
            })?;
        let dst_port = nodes[dst_node.index()]
            .inputs
            .iter()
            .copied()
            .find(|h| ports[h.index()].port_id == conn.to_port)
            .ok_or_else(|| {
                LoadError::UnknownReference(UnknownReference::Port {
                    node: conn.to_node.clone(),
                    port: conn.to_port.clone(),
                })
            })?;

        let src_dtype = ports[src_port.index()].dtype;
        let dst_dtype = ports[dst_port.index()].dtype;
        check_type_compat(src_dtype, dst_dtype, conn)?;

        if !connected_input_ports.insert(dst_port) {
            return Err(LoadError::InputPortAlreadyConnected {
                node: conn.to_node.clone(),
                port: conn.to_port.clone(),
            });
        }

        edges.push(PendingEdge {
            src_node,
            src_port,
            dst_node,
            dst_port,
        });
    }

    // Pass 3: build reverse adjacency (output port -> fed input ports)
    // and topological order via Kahn's algorithm, breaking ties among
    // simultaneously-ready nodes by node identifier for determinism
    // (spec §4.4: "ties broken by node identifier").
    let mut reverse_adjacency: Vec<SmallVec<[PortHandle; 4]>> = vec![SmallVec::new(); ports.len()];
    let mut outgoing: Vec<SmallVec<[NodeHandle; 4]>> = vec![SmallVec::new(); nodes.len()];
    let mut forward_dependents: Vec<SmallVec<[NodeHandle; 4]>> = vec![SmallVec::new(); nodes.len()];
    let mut in_degree = vec![0u32; nodes.len()];
    let mut seen_dependent: Vec<AHashSet<NodeHandle>> = vec![AHashSet::new(); nodes.len()];

    for edge in &edges {
        reverse_adjacency[edge.src_port.index()].push(edge.dst_port);
        if seen_dependent[edge.src_node.index()].insert(edge.dst_node) {
            forward_dependents[edge.src_node.index()].push(edge.dst_node);
            outgoing[edge.src_node.index()].push(edge.dst_node);
            in_degree[edge.dst_node.index()] += 1;
        }
    }

    let mut ready: BTreeSet<(String, NodeHandle)> = BTreeSet::new();
    for (i, node) in nodes.iter().enumerate() {
        if in_degree[i] == 0 {
            ready.insert((node.id.clone(), node_handles[i]));
        }
    }

    let mut topo_order = Vec::with_capacity(nodes.len());
    while let Some((id, handle)) = ready.iter().next().cloned() {
        ready.remove(&(id, handle));
        topo_order.push(handle);

        for &dep in &outgoing[handle.index()] {
            in_degree[dep.index()] -= 1;
            if in_degree[dep.index()] == 0 {
                ready.insert((nodes[dep.index()].id.clone(), dep));
            }
        }
    }

    if topo_order.len() != nodes.len() {
        return Err(LoadError::CycleDetected);
    }

    let mut topo_index = vec![0u32; nodes.len()];
    for (pos, &handle) in topo_order.iter().enumerate() {
        topo_index[handle.index()] = pos as u32;
    }

    Ok(GraphStore {
        nodes,
        node_id_to_handle,
        node_handles,
        ports,
        port_lookup,
        topo_order,
        topo_index,
        reverse_adjacency,
        forward_dependents,
    })
}

fn check_type_compat(
    src: DType,
    dst: DType,
    conn: &dataflow_core::ConnectionDesc,
) -> Result<(), LoadError> {
    let ok = match (src.is_numeric(), dst.is_numeric()) {
        (true, true) => true,
        (false, false) => src == dst,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(LoadError::TypeMismatch {
            src_node: conn.from_node.clone(),
            src_port: conn.from_port.clone(),
            dst_node: conn.to_node.clone(),
            dst_port: conn.to_port.clone(),
        })
    }
}
