use serde::Deserialize;
use std::fmt;

/// The closed set of built-in node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum NodeKind {
    Value,
    DeviceTrigger,
    Timer,
    Counter,
    Add,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Value => "Value",
            NodeKind::DeviceTrigger => "DeviceTrigger",
            NodeKind::Timer => "Timer",
            NodeKind::Counter => "Counter",
            NodeKind::Add => "Add",
        };
        f.write_str(s)
    }
}

impl NodeKind {
    /// Whether nodes of this kind own per-node-kind state beyond their
    /// port values (Timer's accumulator, Counter's previous-edge/total).
    pub fn is_stateful(self) -> bool {
        matches!(self, NodeKind::Timer | NodeKind::Counter)
    }
}
