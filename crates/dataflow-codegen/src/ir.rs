//! An in-process executable form of the ahead-of-time contract (spec
//! §4.6). `GeneratedProgram` *is* the `Inputs`/`Outputs`/`State` record
//! layout and the five binary-contract operations, so the parity
//! properties against [`dataflow_graph::EngineCtx`] can be asserted as
//! ordinary `#[test]`s without compiling anything. [`crate::render`]
//! turns one of these into the textual deliverable.

use ahash::AHashMap;
use smallvec::SmallVec;

use dataflow_core::{sum_values, DType, NodeHandle, NodeKind, PortDescriptor, PortHandle, Value};
use dataflow_graph::graph::GraphStore;

/// One field of the generated `Inputs` record per `DeviceTrigger`, in
/// node-load order (spec §4.6).
#[derive(Debug, Clone)]
pub struct Inputs {
    values: Vec<Value>,
}

impl Inputs {
    fn zeroed(dtypes: &[DType]) -> Self {
        Self {
            values: dtypes.iter().map(|d| d.zero()).collect(),
        }
    }
}

/// One field of the generated `Outputs` record per sink node, in
/// node-load order (spec §4.6).
#[derive(Debug, Clone)]
pub struct Outputs {
    values: Vec<Value>,
}

impl Outputs {
    fn zeroed(dtypes: &[DType]) -> Self {
        Self {
            values: dtypes.iter().map(|d| d.zero()).collect(),
        }
    }

    pub fn get(&self, sink_index: usize) -> &Value {
        &self.values[sink_index]
    }
}

/// The generated `State` record: one f64 accumulator and one
/// compute-type pulse field per Timer, one i32 previous-edge state and
/// one f64 running-total per Counter (spec §4.6, literal field types).
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    timer_accumulators: Vec<f64>,
    timer_pulses: Vec<Value>,
    counter_prev_edge: Vec<i32>,
    counter_totals: Vec<f64>,
}

impl State {
    fn zeroed(timer_compute_types: &[DType], counter_count: usize) -> Self {
        Self {
            timer_accumulators: vec![0.0; timer_compute_types.len()],
            timer_pulses: timer_compute_types.iter().map(|d| d.zero()).collect(),
            counter_prev_edge: vec![0; counter_count],
            counter_totals: vec![0.0; counter_count],
        }
    }
}

#[derive(Debug, Clone)]
struct TimerSlot {
    node: NodeHandle,
    out_ports: SmallVec<[PortHandle; 4]>,
    compute_type: DType,
    interval_ms: Option<f64>,
}

#[derive(Debug, Clone)]
struct CounterSlot {
    node: NodeHandle,
    in_port: Option<PortHandle>,
    out_ports: SmallVec<[PortHandle; 4]>,
    compute_type: DType,
}

/// One node's contribution to `step()`'s straight-line evaluation, in
/// topological order. Mirrors `dataflow_graph::compute::evaluate_node`,
/// specialized so every input is known to already be up to date (no
/// dirty tracking: the AOT `step` always re-evaluates the whole graph,
/// per spec §4.6 — "the straight-line evaluation of the graph in
/// topological order").
enum NodeOp {
    /// A baked constant, re-asserted into its output port(s) every step.
    Value {
        out_ports: SmallVec<[PortHandle; 4]>,
        value: Value,
    },
    /// Seeded from `Inputs` at the start of `step()`.
    DeviceTrigger {
        out_ports: SmallVec<[PortHandle; 4]>,
        input_index: usize,
    },
    /// Seeded from `State`'s persisted pulse field — `tick()` is the
    /// only thing that advances a Timer's accumulator.
    Timer {
        out_ports: SmallVec<[PortHandle; 4]>,
        timer_index: usize,
    },
    Counter {
        in_port: Option<PortHandle>,
        out_ports: SmallVec<[PortHandle; 4]>,
        counter_index: usize,
        compute_type: DType,
    },
    Add {
        in_ports: SmallVec<[PortHandle; 4]>,
        out_ports: SmallVec<[PortHandle; 4]>,
        compute_type: DType,
    },
}

/// One descriptor-table row, shared verbatim with the renderer (spec
/// §4.6 "descriptor tables").
#[derive(Debug, Clone)]
pub struct PortTableEntry {
    pub handle: PortHandle,
    pub node_id: String,
    pub port_id: String,
    pub is_output: bool,
    pub dtype: DType,
}

#[derive(Debug, Clone)]
pub struct DeviceTriggerInputEntry {
    pub node_id: String,
    pub byte_offset_into_inputs: usize,
    pub dtype: DType,
}

/// The descriptor tables a host uses to address ports without statically
/// knowing the graph (spec §4.6/§6.3).
#[derive(Debug, Clone)]
pub struct Descriptors {
    pub ports: Vec<PortTableEntry>,
    pub topo_order: Vec<NodeHandle>,
    pub device_trigger_inputs: Vec<DeviceTriggerInputEntry>,
}

/// What kind of storage backs a given output port, for [`GeneratedProgram::get_output`].
enum OutputSource {
    Constant(Value),
    Timer { timer_index: usize },
    Counter { counter_index: usize, compute_type: DType },
    Sink { sink_index: usize },
    /// A non-sink `Add` output: in real generated source this value
    /// lives only in a local variable inside `step()`'s body and has no
    /// storage once `step()` returns, so it is unreadable via this API
    /// (mirrors the stated "DeviceTriggers are not readable" carve-out —
    /// spec §4.6 enumerates sink / Timer / Counter / constant as the
    /// readable cases and is silent on this one).
    Unreadable,
}

/// The ahead-of-time contract for one specific loaded graph (spec §4.6).
pub struct GeneratedProgram {
    ops: Vec<NodeOp>,
    /// `reverse_adjacency[output.index()]` = input ports it feeds,
    /// identical in content to `GraphStore::reverse_adjacency`.
    reverse_adjacency: Vec<SmallVec<[PortHandle; 4]>>,
    port_dtypes: Vec<DType>,
    timers: Vec<TimerSlot>,
    counters: Vec<CounterSlot>,
    device_trigger_count: usize,
    sink_ports: Vec<PortHandle>,
    output_source: Vec<OutputSource>,
    descriptors: Descriptors,
}

impl GeneratedProgram {
    /// Compile a loaded graph into its ahead-of-time form. Analogous to
    /// what a real code generator would do while emitting source; here
    /// it builds the in-process IR directly.
    pub fn compile(store: &GraphStore) -> GeneratedProgram {
        log::debug!(
            "compiling ahead-of-time program: {} nodes, {} ports",
            store.node_count(),
            store.port_count()
        );

        let port_dtypes: Vec<DType> = store.ports().iter().map(|p| p.dtype).collect();

        let reverse_adjacency: Vec<SmallVec<[PortHandle; 4]>> = store
            .ports()
            .iter()
            .map(|p| store.reverse_adjacency(p.handle).iter().copied().collect())
            .collect();

        let mut timers = Vec::new();
        let mut counters = Vec::new();
        let mut device_trigger_inputs: Vec<(NodeHandle, DType)> = Vec::new();
        let mut device_trigger_index: AHashMap<NodeHandle, usize> = AHashMap::new();

        // Inputs/Outputs/State field order is node-load order (spec §4.6 /
        // §6.3), not topological order — iterate the canonical per-node
        // handles, which are already in load order.
        for &handle in store.node_handles() {
            let node = store.node(handle);
            match node.kind {
                NodeKind::DeviceTrigger => {
                    device_trigger_index.insert(handle, device_trigger_inputs.len());
                    device_trigger_inputs.push((handle, node.compute_type(store.ports())));
                }
                NodeKind::Timer => {
                    let interval_ms = node
                        .param("interval_ms")
                        .map(|p| p.as_f64())
                        .filter(|&v| v > 0.0);
                    timers.push(TimerSlot {
                        node: handle,
                        out_ports: node.outputs.clone(),
                        compute_type: node.compute_type(store.ports()),
                        interval_ms,
                    });
                }
                NodeKind::Counter => {
                    counters.push(CounterSlot {
                        node: handle,
                        in_port: node.inputs.first().copied(),
                        out_ports: node.outputs.clone(),
                        compute_type: node.compute_type(store.ports()),
                    });
                }
                _ => {}
            }
        }

        let timer_index_of: AHashMap<NodeHandle, usize> =
            timers.iter().enumerate().map(|(i, t)| (t.node, i)).collect();
        let counter_index_of: AHashMap<NodeHandle, usize> =
            counters.iter().enumerate().map(|(i, c)| (c.node, i)).collect();

        let mut ops = Vec::with_capacity(store.node_count());
        for &handle in store.topo_order() {
            let node = store.node(handle);
            let op = match node.kind {
                NodeKind::Value => NodeOp::Value {
                    out_ports: node.outputs.clone(),
                    value: node
                        .param("value")
                        .map(|p| p.to_value(node.compute_type(store.ports())))
                        .unwrap_or_else(|| node.compute_type(store.ports()).zero()),
                },
                NodeKind::DeviceTrigger => NodeOp::DeviceTrigger {
                    out_ports: node.outputs.clone(),
                    input_index: device_trigger_index[&handle],
                },
                NodeKind::Timer => NodeOp::Timer {
                    out_ports: node.outputs.clone(),
                    timer_index: timer_index_of[&handle],
                },
                NodeKind::Counter => NodeOp::Counter {
                    in_port: node.inputs.first().copied(),
                    out_ports: node.outputs.clone(),
                    counter_index: counter_index_of[&handle],
                    compute_type: node.compute_type(store.ports()),
                },
                NodeKind::Add => NodeOp::Add {
                    in_ports: node.inputs.clone(),
                    out_ports: node.outputs.clone(),
                    compute_type: node.compute_type(store.ports()),
                },
            };
            ops.push(op);
        }

        let sink_ports: Vec<PortHandle> = store
            .sinks()
            .filter_map(|h| store.node(h).outputs.first().copied())
            .collect();
        let sink_index_of: AHashMap<PortHandle, usize> =
            sink_ports.iter().enumerate().map(|(i, &p)| (p, i)).collect();

        let mut output_source: Vec<OutputSource> = Vec::with_capacity(store.port_count());
        output_source.resize_with(store.port_count(), || OutputSource::Unreadable);
        for &handle in store.topo_order() {
            let node = store.node(handle);
            let source = match node.kind {
                NodeKind::Value => OutputSource::Constant(
                    node.param("value")
                        .map(|p| p.to_value(node.compute_type(store.ports())))
                        .unwrap_or_else(|| node.compute_type(store.ports()).zero()),
                ),
                NodeKind::Timer => OutputSource::Timer {
                    timer_index: timer_index_of[&handle],
                },
                NodeKind::Counter => OutputSource::Counter {
                    counter_index: counter_index_of[&handle],
                    compute_type: node.compute_type(store.ports()),
                },
                NodeKind::DeviceTrigger | NodeKind::Add => OutputSource::Unreadable,
            };
            for &out in &node.outputs {
                if let Some(&sink_index) = sink_index_of.get(&out) {
                    output_source[out.index()] = OutputSource::Sink { sink_index };
                } else {
                    output_source[out.index()] = source.clone();
                }
            }
        }

        let ports = store
            .ports()
            .iter()
            .map(|desc: &PortDescriptor| PortTableEntry {
                handle: desc.handle,
                node_id: desc.node_id.clone(),
                port_id: desc.port_id.clone(),
                is_output: desc.is_output(),
                dtype: desc.dtype,
            })
            .collect();

        let mut offset = 0usize;
        let device_trigger_input_entries = device_trigger_inputs
            .iter()
            .map(|&(handle, dtype)| {
                let entry = DeviceTriggerInputEntry {
                    node_id: store.node(handle).id.clone(),
                    byte_offset_into_inputs: offset,
                    dtype,
                };
                offset += dtype.size_in_bytes();
                entry
            })
            .collect();

        let descriptors = Descriptors {
            ports,
            topo_order: store.topo_order().to_vec(),
            device_trigger_inputs: device_trigger_input_entries,
        };

        log::trace!(
            "compiled program: {} timers, {} counters, {} device triggers, {} sinks",
            timers.len(),
            counters.len(),
            device_trigger_inputs.len(),
            sink_ports.len()
        );

        GeneratedProgram {
            ops,
            reverse_adjacency,
            port_dtypes,
            timers,
            counters,
            device_trigger_count: device_trigger_inputs.len(),
            sink_ports,
            output_source,
            descriptors,
        }
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    pub fn new_inputs(&self) -> Inputs {
        Inputs::zeroed(
            &self
                .descriptors
                .device_trigger_inputs
                .iter()
                .map(|e| e.dtype)
                .collect::<Vec<_>>(),
        )
    }

    pub fn new_outputs(&self) -> Outputs {
        Outputs::zeroed(
            &self
                .sink_ports
                .iter()
                .map(|&p| self.port_dtypes[p.index()])
                .collect::<Vec<_>>(),
        )
    }

    pub fn new_state(&self) -> State {
        let timer_types: Vec<DType> = self.timers.iter().map(|t| t.compute_type).collect();
        State::zeroed(&timer_types, self.counters.len())
    }

    /// `init(state)`: zero every field of `state` (spec §4.6).
    pub fn init(&self, state: &mut State) {
        *state = self.new_state();
    }

    /// `reset(state)`: equivalent to `init` (spec §4.6).
    pub fn reset(&self, state: &mut State) {
        self.init(state);
    }

    /// `set_input(handle, value, inputs, state)`: writes a DeviceTrigger
    /// input by port handle, value coerced to the port's declared type
    /// (spec §4.6). A handle that does not name a DeviceTrigger output
    /// port is a no-op, mirroring the interpreter's `RuntimeMissError`
    /// non-fatal handling of an unknown target.
    pub fn set_input(&self, handle: PortHandle, value: Value, inputs: &mut Inputs, _state: &mut State) {
        let Some(input_index) = self.input_index_of(handle) else {
            return;
        };
        let dtype = self.port_dtypes[handle.index()];
        inputs.values[input_index] = value.coerce(dtype);
    }

    fn input_index_of(&self, handle: PortHandle) -> Option<usize> {
        self.ops.iter().find_map(|op| match op {
            NodeOp::DeviceTrigger { out_ports, input_index } if out_ports.contains(&handle) => {
                Some(*input_index)
            }
            _ => None,
        })
    }

    /// `tick(Δt, inputs, outputs, state)`: advance Timers as in §4.3.
    /// One pulse per call regardless of how many intervals `Δt` spans,
    /// carrying the remainder in the accumulator (DESIGN.md's resolution
    /// of the "multiple intervals per tick" open question — identical
    /// policy to the interpreter's `advance_timer`). Counters are not
    /// advanced here: like the interpreter, a Counter only samples its
    /// input during straight-line evaluation (`step`), not `tick`.
    pub fn tick(&self, dt_ms: f64, _inputs: &Inputs, outputs: &mut Outputs, state: &mut State) {
        if dt_ms <= 0.0 {
            return;
        }

        for (timer_index, timer) in self.timers.iter().enumerate() {
            let Some(interval_ms) = timer.interval_ms else {
                state.timer_pulses[timer_index] = timer.compute_type.zero();
                self.write_sink_if_any(&timer.out_ports, &state.timer_pulses[timer_index].clone(), outputs);
                continue;
            };

            state.timer_accumulators[timer_index] += dt_ms;
            let fires = state.timer_accumulators[timer_index] >= interval_ms;
            if fires {
                state.timer_accumulators[timer_index] -= interval_ms;
            }

            let new_value = if fires {
                Value::I32(1).coerce(timer.compute_type)
            } else {
                Value::I32(0).coerce(timer.compute_type)
            };
            state.timer_pulses[timer_index] = new_value.clone();
            self.write_sink_if_any(&timer.out_ports, &new_value, outputs);
        }
    }

    fn write_sink_if_any(&self, out_ports: &[PortHandle], value: &Value, outputs: &mut Outputs) {
        for &port in out_ports {
            if let Some(sink_index) = self.sink_index(port) {
                outputs.values[sink_index] = value.coerce(self.port_dtypes[port.index()]);
            }
        }
    }

    fn sink_index(&self, port: PortHandle) -> Option<usize> {
        self.sink_ports.iter().position(|&p| p == port)
    }

    /// `step(inputs, outputs, state)`: the straight-line evaluation of
    /// the graph in topological order, with Add nodes reduced to typed
    /// sums of their predecessors' local temporaries (spec §4.6).
    pub fn step(&self, inputs: &Inputs, outputs: &mut Outputs, state: &mut State) {
        let mut locals: Vec<Value> = self.port_dtypes.iter().map(|d| d.zero()).collect();

        for op in &self.ops {
            match op {
                NodeOp::Value { out_ports, value } => {
                    self.assign(&mut locals, out_ports, value.clone());
                }
                NodeOp::DeviceTrigger { out_ports, input_index } => {
                    let value = inputs.values[*input_index].clone();
                    self.assign(&mut locals, out_ports, value);
                }
                NodeOp::Timer { out_ports, timer_index } => {
                    let value = state.timer_pulses[*timer_index].clone();
                    self.assign(&mut locals, out_ports, value);
                }
                NodeOp::Counter {
                    in_port,
                    out_ports,
                    counter_index,
                    compute_type,
                } => {
                    let high = in_port
                        .map(|p| locals[p.index()].as_f64() > 0.5)
                        .unwrap_or(false);
                    let was_high = state.counter_prev_edge[*counter_index] != 0;
                    if high && !was_high {
                        state.counter_totals[*counter_index] += 1.0;
                    }
                    state.counter_prev_edge[*counter_index] = high as i32;
                    let value = Value::F64(state.counter_totals[*counter_index]).coerce(*compute_type);
                    self.assign(&mut locals, out_ports, value);
                }
                NodeOp::Add {
                    in_ports,
                    out_ports,
                    compute_type,
                } => {
                    let operands = in_ports.iter().map(|p| locals[p.index()].coerce(*compute_type));
                    let owned: Vec<Value> = operands.collect();
                    let value = sum_values(*compute_type, owned.iter());
                    self.assign(&mut locals, out_ports, value);
                }
            }
        }

        for &port in &self.sink_ports {
            let sink_index = self.sink_index(port).expect("sink_ports is self-indexing");
            outputs.values[sink_index] = locals[port.index()].clone();
        }
    }

    fn assign(&self, locals: &mut [Value], out_ports: &[PortHandle], value: Value) {
        for &out in out_ports {
            locals[out.index()] = value.clone();
            for &dst in &self.reverse_adjacency[out.index()] {
                let dst_dtype = self.port_dtypes[dst.index()];
                locals[dst.index()] = value.coerce(dst_dtype);
            }
        }
    }

    /// `get_output(handle, outputs, state)`: read any output port's
    /// current value (spec §4.6). Timer and Counter results come from
    /// `state`, sink results from `outputs`, constants from the baked
    /// value. Returns `None` for a DeviceTrigger handle (excluded by
    /// spec) or a non-sink Add handle (see [`OutputSource::Unreadable`]).
    pub fn get_output(&self, handle: PortHandle, outputs: &Outputs, state: &State) -> Option<Value> {
        match &self.output_source[handle.index()] {
            OutputSource::Constant(v) => Some(v.clone()),
            OutputSource::Timer { timer_index } => Some(state.timer_pulses[*timer_index].clone()),
            OutputSource::Counter { counter_index, compute_type } => {
                Some(Value::F64(state.counter_totals[*counter_index]).coerce(*compute_type))
            }
            OutputSource::Sink { sink_index } => Some(outputs.values[*sink_index].clone()),
            OutputSource::Unreadable => None,
        }
    }

    pub fn device_trigger_count(&self) -> usize {
        self.device_trigger_count
    }

    /// `(node_id, dtype)` for each `DeviceTrigger`, in `Inputs` field
    /// order — what [`crate::render`] needs to name that struct's
    /// fields.
    pub fn device_trigger_fields(&self) -> Vec<(String, DType)> {
        self.descriptors
            .device_trigger_inputs
            .iter()
            .map(|e| (e.node_id.clone(), e.dtype))
            .collect()
    }

    /// `(node_id, dtype)` for each sink, in `Outputs` field order.
    pub fn sink_fields(&self) -> Vec<(String, DType)> {
        self.sink_ports
            .iter()
            .map(|&p| {
                let entry = self
                    .descriptors
                    .ports
                    .iter()
                    .find(|e| e.handle == p)
                    .expect("sink port is in the port table");
                (entry.node_id.clone(), entry.dtype)
            })
            .collect()
    }

    /// `(node_id, dtype)` for each Timer, in `State`'s timer-field order.
    pub fn timer_fields(&self) -> Vec<(String, DType)> {
        self.timers
            .iter()
            .map(|t| (t.node.debug_name.to_string(), t.compute_type))
            .collect()
    }

    /// `node_id` for each Counter, in `State`'s counter-field order.
    pub fn counter_fields(&self) -> Vec<String> {
        self.counters
            .iter()
            .map(|c| c.node.debug_name.to_string())
            .collect()
    }
}

impl Clone for OutputSource {
    fn clone(&self) -> Self {
        match self {
            OutputSource::Constant(v) => OutputSource::Constant(v.clone()),
            OutputSource::Timer { timer_index } => OutputSource::Timer {
                timer_index: *timer_index,
            },
            OutputSource::Counter { counter_index, compute_type } => OutputSource::Counter {
                counter_index: *counter_index,
                compute_type: *compute_type,
            },
            OutputSource::Sink { sink_index } => OutputSource::Sink {
                sink_index: *sink_index,
            },
            OutputSource::Unreadable => OutputSource::Unreadable,
        }
    }
}
