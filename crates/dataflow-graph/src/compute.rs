//! Per-node-kind semantics (spec §4.3). Shared between the cold-start
//! full sweep and steady-state dirty-driven evaluation; `tick` calls into
//! [`advance_timer`] separately, on its own schedule.

use dataflow_core::{sum_values, DType, NodeHandle, NodeKind, Value};

use crate::arena::PortArena;
use crate::graph::GraphStore;
use crate::node_state::NodeKindState;

/// Evaluate one node's kind-specific semantics, reading its inputs from
/// the port arena and writing each output back into the arena with the
/// given generation stamp. Returns the node's primary-output value
/// before this evaluation ran, so the caller (the scheduler) can compare
/// it against the freshly-written value to decide whether to propagate.
pub fn evaluate_node(
    store: &GraphStore,
    handle: NodeHandle,
    arena: &mut PortArena,
    state: &mut NodeKindState,
    generation: u64,
) -> Option<Value> {
    let node = store.node(handle);
    let compute_type = node.compute_type(store.ports());
    let primary_output = node.outputs.first().copied();
    let before = primary_output.map(|h| arena.value(h.index()).clone());

    match node.kind {
        NodeKind::Value => {
            let v = param_value(node, "value", compute_type);
            write_all_outputs(store, handle, arena, v, generation);
        }
        NodeKind::DeviceTrigger => {
            // `value` holds the last value written by an external
            // `set_input` call; absent a prior write it defaults to the
            // compute type's zero (spec §7 ParameterError: missing
            // parameter holds the output at zero rather than failing).
            let v = param_value(node, "value", compute_type);
            write_all_outputs(store, handle, arena, v, generation);
        }
        NodeKind::Timer => {
            // The output was already written by the most recent `tick`
            // (or is the type-appropriate zero if `tick` has never run).
            // Re-assert it here so a cold-start sweep stamps every
            // output's generation, and so steady-state re-evaluation
            // (e.g. triggered by an upstream change reaching a Timer
            // with no inputs, which cannot happen, but defensively) is a
            // no-op.
            if let Some(out) = primary_output {
                let current = arena.value(out.index()).clone();
                arena.write(out.index(), current, generation);
            }
        }
        NodeKind::Counter => {
            let high = node
                .inputs
                .first()
                .map(|h| arena.value(h.index()).as_f64() > 0.5)
                .unwrap_or(false);

            let counter = &mut state.counters[handle.index()];
            if high && !counter.prev_high {
                counter.total += 1.0;
            }
            counter.prev_high = high;

            let v = Value::F64(counter.total).coerce(compute_type);
            write_all_outputs(store, handle, arena, v, generation);
        }
        NodeKind::Add => {
            let inputs: Vec<Value> = node
                .inputs
                .iter()
                .map(|h| arena.value(h.index()).coerce(compute_type))
                .collect();
            let v = sum_values(compute_type, inputs.iter());
            write_all_outputs(store, handle, arena, v, generation);
        }
    }

    before
}

/// Advance a Timer node under `tick(Δt)` (spec §4.4/§4.3). Writes the
/// pulse/reset output with `generation` (the caller passes `current
/// generation + 1`, anticipating the `evaluate()` about to happen).
/// Returns `true` if the output transitioned (either direction), which
/// the scheduler uses to decide whether to enqueue the Timer's
/// dependents.
pub fn advance_timer(
    store: &GraphStore,
    handle: NodeHandle,
    arena: &mut PortArena,
    state: &mut NodeKindState,
    dt_ms: f64,
    generation: u64,
) -> bool {
    let node = store.node(handle);
    debug_assert_eq!(node.kind, NodeKind::Timer);
    let compute_type = node.compute_type(store.ports());

    let interval_ms = node
        .param("interval_ms")
        .map(|p| p.as_f64())
        .filter(|&v| v > 0.0);

    let Some(out) = node.outputs.first().copied() else {
        return false;
    };

    // ParameterError: a Timer without a positive `interval_ms` holds its
    // output at zero rather than failing the load (spec §7).
    let Some(interval_ms) = interval_ms else {
        let before = arena.value(out.index()).clone();
        let zero = compute_type.zero();
        let changed = !before.change_eq(&zero);
        arena.write(out.index(), zero, generation);
        return changed;
    };

    let timer = &mut state.timers[handle.index()];
    timer.accumulator += dt_ms;

    let fires = timer.accumulator >= interval_ms;
    if fires {
        timer.accumulator -= interval_ms;
    }

    let new_value = if fires {
        Value::I32(1).coerce(compute_type)
    } else {
        Value::I32(0).coerce(compute_type)
    };

    // A pulse is transient: high for exactly the one evaluation
    // following a firing, then low again. Both the 0 -> 1 and the
    // 1 -> 0 transition are reported as changes equally (spec §4.3).
    //
    // A firing is always dirty, even if the stored value happens to
    // read the same as last time (two firings in immediate succession,
    // with no intervening non-firing tick to show the low in between):
    // each firing is its own event and must still reach dependents such
    // as a Counter watching for rising edges.
    let before = arena.value(out.index()).clone();
    let dirty = fires || !before.change_eq(&new_value);
    arena.write(out.index(), new_value, generation);
    dirty
}

fn param_value(node: &crate::graph::NodeRecord, name: &str, compute_type: DType) -> Value {
    node.param(name)
        .map(|p| p.to_value(compute_type))
        .unwrap_or_else(|| compute_type.zero())
}

fn write_all_outputs(
    store: &GraphStore,
    handle: NodeHandle,
    arena: &mut PortArena,
    value: Value,
    generation: u64,
) {
    for out in &store.node(handle).outputs {
        arena.write(out.index(), value.clone(), generation);
    }
}
