use std::collections::BTreeSet;

use dataflow_core::{NodeHandle, NodeKind, Value};

use crate::arena::PortArena;
use crate::compute;
use crate::graph::GraphStore;
use crate::node_state::NodeKindState;

/// Drives deterministic evaluation with the minimum amount of work that
/// still produces correct output state (spec §4.4).
pub struct Scheduler {
    /// Current evaluation generation. Incremented at the start of every
    /// `evaluate()` call.
    generation: u64,
    /// Whether the next `evaluate()` call is the cold-start full sweep.
    cold_start: bool,
    /// Ready queue, ordered by `(topological index, node handle)` —
    /// node handles are assigned in load order and used as the
    /// identifier tie-break (spec §4.4: "ties broken by node
    /// identifier"). `NodeHandle`'s `Ord` compares its index alone, so
    /// the tie-break is exactly the raw index as before.
    ready: BTreeSet<(u32, NodeHandle)>,
    /// Per-node "last enqueued in generation" stamp, for duplicate
    /// suppression.
    last_enqueued_gen: Vec<u64>,
}

impl Scheduler {
    pub fn new(node_count: usize) -> Self {
        Self {
            generation: 0,
            cold_start: true,
            ready: BTreeSet::new(),
            last_enqueued_gen: vec![0; node_count],
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation
    }

    /// Enqueue a node for evaluation in `target_gen`, honoring duplicate
    /// suppression. `target_gen` is `self.generation + 1` when called
    /// from outside an `evaluate()` drain (`tick`, `set_input`) — the
    /// node is dirty for the *upcoming* call. It is the in-progress
    /// `evaluate()` call's own `generation` when called from within that
    /// call's drain loop, so a multi-hop dependency chain fully
    /// propagates to a fixed point in one `evaluate()` rather than one
    /// hop per call.
    fn enqueue_for_generation(&mut self, store: &GraphStore, node: NodeHandle, target_gen: u64) {
        if self.last_enqueued_gen[node.index()] == target_gen {
            return;
        }
        self.last_enqueued_gen[node.index()] = target_gen;
        self.ready.insert((store.topo_index(node), node));
    }

    fn enqueue_dependents_for_generation(&mut self, store: &GraphStore, node: NodeHandle, target_gen: u64) {
        for &dep in store.forward_dependents(node) {
            self.enqueue_for_generation(store, dep, target_gen);
        }
    }

    /// Externally notify the scheduler that `node`'s externally-visible
    /// input changed (a `DeviceTrigger` after `set_input`). The node
    /// itself is enqueued so its own re-evaluation picks up the new
    /// parameter value and propagates like any other dirty node.
    pub fn notify_external_write(&mut self, store: &GraphStore, node: NodeHandle) {
        self.enqueue_for_generation(store, node, self.generation + 1);
    }

    /// Advance all Timer nodes under `tick(Δt)` (spec §4.4). A no-op if
    /// `dt_ms <= 0`.
    pub fn tick(
        &mut self,
        dt_ms: f64,
        store: &GraphStore,
        arena: &mut PortArena,
        state: &mut NodeKindState,
    ) {
        if dt_ms <= 0.0 {
            return;
        }

        let next_gen = self.generation + 1;

        for &handle in store.node_handles() {
            if store.node(handle).kind != NodeKind::Timer {
                continue;
            }

            let dirty = compute::advance_timer(store, handle, arena, state, dt_ms, next_gen);
            propagate_outputs(store, handle, arena, next_gen);
            if dirty {
                self.enqueue_dependents_for_generation(store, handle, next_gen);
            }
        }
    }

    /// Drive the ready queue to empty, per spec §4.4.
    pub fn evaluate(&mut self, store: &GraphStore, arena: &mut PortArena, state: &mut NodeKindState) {
        self.generation += 1;
        let generation = self.generation;

        if self.cold_start {
            for &handle in store.topo_order() {
                evaluate_and_propagate(store, handle, arena, state, generation);
            }
            self.ready.clear();
            self.cold_start = false;
            return;
        }

        while let Some(&(topo_idx, handle)) = self.ready.iter().next() {
            self.ready.remove(&(topo_idx, handle));

            let before = evaluate_and_propagate(store, handle, arena, state, generation);

            if let Some(before_value) = before {
                let node = store.node(handle);
                if let Some(&out) = node.outputs.first() {
                    if !before_value.change_eq(arena.value(out.index())) {
                        self.enqueue_dependents_for_generation(store, handle, generation);
                    }
                }
            }
        }
    }
}

/// Evaluate one node's semantics, then propagate each output to the
/// input ports it feeds (spec §4.4 step 5), coercing at the destination
/// per §4.2. Returns the primary output's value *before* this
/// evaluation, for the caller's change-detection decision.
fn evaluate_and_propagate(
    store: &GraphStore,
    handle: NodeHandle,
    arena: &mut PortArena,
    state: &mut NodeKindState,
    generation: u64,
) -> Option<Value> {
    let before = compute::evaluate_node(store, handle, arena, state, generation);
    propagate_outputs(store, handle, arena, generation);
    before
}

/// Copy every output of `handle` to the input ports its edges feed,
/// coercing at the destination (spec §4.2/§4.4 step 5). Shared by
/// ordinary evaluation and by `tick`, which writes a Timer's output
/// directly and so must propagate it itself — a Timer is never placed
/// in the ready queue (only its dependents are), so `evaluate_node`
/// never runs the propagation step on its behalf in steady state.
fn propagate_outputs(store: &GraphStore, handle: NodeHandle, arena: &mut PortArena, generation: u64) {
    for &out in &store.node(handle).outputs {
        let destinations = store.reverse_adjacency(out);
        if destinations.is_empty() {
            continue;
        }
        let value = arena.value(out.index()).clone();
        for &dst in destinations {
            let dst_dtype = store.port(dst).dtype;
            let coerced = value.coerce(dst_dtype);
            arena.write(dst.index(), coerced, generation);
        }
    }
}
