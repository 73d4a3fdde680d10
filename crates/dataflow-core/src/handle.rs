use std::fmt;
use std::hash::{Hash, Hasher};

use crate::value::DType;

/// A dense integer identifier assigned to a port at load, stable for the
/// life of the loaded graph. Handles are assigned in `[0, total_ports)`
/// in load order: for each node (in declared order), input ports are
/// handed out before output ports, both in declared order.
///
/// Carries a `debug_name` copied from the node/port's declared string id
/// at load (`"{node_id}.{port_id}"`), mirroring
/// `firewheel_graph::graph::NodeID`'s `idx` + `debug_name` pair — equality,
/// ordering, and hashing compare `idx` alone, so two handles with the same
/// index are the same handle regardless of how their name was produced.
#[derive(Clone, Copy)]
pub struct PortHandle {
    pub idx: u32,
    pub debug_name: &'static str,
}

impl PortHandle {
    pub fn new(idx: u32, debug_name: &'static str) -> Self {
        Self { idx, debug_name }
    }

    pub fn index(self) -> usize {
        self.idx as usize
    }
}

impl PartialEq for PortHandle {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl Eq for PortHandle {}

impl PartialOrd for PortHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PortHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.idx.cmp(&other.idx)
    }
}

impl Hash for PortHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

impl fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.debug_name, self.idx)
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.idx)
    }
}

/// A dense index into the node table, also used as the node's position
/// in the topological order (the scheduler's ready queue orders by this
/// value, then by node identifier, to break ties).
///
/// Carries a `debug_name` copied from the node's declared string id at
/// load, same rationale as [`PortHandle`].
#[derive(Clone, Copy)]
pub struct NodeHandle {
    pub idx: u32,
    pub debug_name: &'static str,
}

impl NodeHandle {
    pub fn new(idx: u32, debug_name: &'static str) -> Self {
        Self { idx, debug_name }
    }

    pub fn index(self) -> usize {
        self.idx as usize
    }
}

impl PartialEq for NodeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl Eq for NodeHandle {}

impl PartialOrd for NodeHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.idx.cmp(&other.idx)
    }
}

impl Hash for NodeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.debug_name, self.idx)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.idx)
    }
}

/// The direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// A descriptor for one port, shared verbatim between the interpreter's
/// graph store and the AOT generator's descriptor tables (spec §4.1,
/// §4.6). `node_id`/`port_id` are the declared string identifiers from
/// the graph description; `handle` is the dense integer assigned at load.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    pub handle: PortHandle,
    pub node_id: String,
    pub port_id: String,
    pub direction: Direction,
    pub dtype: DType,
}

impl PortDescriptor {
    pub fn is_output(&self) -> bool {
        matches!(self.direction, Direction::Output)
    }
}
