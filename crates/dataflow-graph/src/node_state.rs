/// Per-node-kind state that is not a port value. Held as parallel arrays
/// indexed by node position (the node's dense [`dataflow_core::NodeHandle`]),
/// avoiding per-instance allocation (spec §9: "Per-node-kind state held as
/// parallel arrays indexed by node position"). Only `Timer` and `Counter`
/// are stateful; other kinds read an all-zero default and never write one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerState {
    /// Accumulated milliseconds since the last pulse.
    pub accumulator: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterState {
    /// Whether the first input was "high" (> 0.5) on the previous
    /// evaluation.
    pub prev_high: bool,
    /// The running total of rising edges observed so far.
    pub total: f64,
}

/// The full per-node-kind state arena, pre-sized at load (spec §5:
/// "Parameter storage and per-node-kind side tables are pre-sized at
/// load").
pub struct NodeKindState {
    pub timers: Vec<TimerState>,
    pub counters: Vec<CounterState>,
}

impl NodeKindState {
    pub fn new(node_count: usize) -> Self {
        Self {
            timers: vec![TimerState::default(); node_count],
            counters: vec![CounterState::default(); node_count],
        }
    }
}
