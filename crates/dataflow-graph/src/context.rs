use dataflow_core::{Direction, GraphDescription, LoadError, NodeKind, ParamValue};

use crate::arena::PortArena;
use crate::graph::{self, GraphStore};
use crate::node_state::NodeKindState;
use crate::observe::{self, PortSample};
use crate::scheduler::Scheduler;

struct Loaded {
    store: GraphStore,
    arena: PortArena,
    state: NodeKindState,
    scheduler: Scheduler,
}

/// The public engine context: graph store, port arena, per-node-kind
/// state, and scheduler, wired together behind the operation set in
/// spec §6.2.
///
/// Starts unloaded. A fatal `load` error leaves the context exactly as
/// it was before the call (spec §7): unloaded if never loaded, or still
/// running the previously-loaded graph otherwise.
pub struct EngineCtx {
    loaded: Option<Loaded>,
    snapshot_generation: u64,
}

impl Default for EngineCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCtx {
    pub fn new() -> Self {
        Self {
            loaded: None,
            snapshot_generation: 0,
        }
    }

    /// Build the immutable graph tables from an already-parsed
    /// description and (re)initialize the evaluation state. On failure,
    /// the previously-loaded graph (if any) keeps running untouched.
    pub fn load(&mut self, description: &GraphDescription) -> Result<(), LoadError> {
        let store = graph::load(description)?;
        let arena = PortArena::new(store.ports());
        let state = NodeKindState::new(store.node_count());
        let scheduler = Scheduler::new(store.node_count());

        self.loaded = Some(Loaded {
            store,
            arena,
            state,
            scheduler,
        });
        Ok(())
    }

    /// Release the loaded graph's tables. A subsequent `evaluate` is a
    /// no-op returning an empty snapshot (spec §7).
    pub fn unload(&mut self) {
        self.loaded = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Write a `DeviceTrigger`'s externally-visible input. Silently a
    /// no-op if `node_id` is unknown or not a `DeviceTrigger` — this is
    /// a `RuntimeMissError`, not fatal (spec §7).
    pub fn set_input(&mut self, node_id: &str, value: f64) {
        let Some(loaded) = self.loaded.as_mut() else {
            log::warn!("set_input({node_id:?}) called on an unloaded engine");
            return;
        };

        let Some(handle) = loaded.store.node_handle(node_id) else {
            log::debug!("set_input: unknown node id {:?}", node_id);
            return;
        };

        if loaded.store.node(handle).kind != NodeKind::DeviceTrigger {
            log::debug!("set_input: node {:?} is not a DeviceTrigger", node_id);
            return;
        }

        let new_param = ParamValue::Float(value);
        let changed = loaded.store.node(handle).param("value") != Some(&new_param);
        loaded.store.set_parameter(handle, "value", new_param);

        if changed {
            loaded.scheduler.notify_external_write(&loaded.store, handle);
        }
    }

    /// Set the legacy `min_interval`/`max_interval` timing parameters on
    /// a `DeviceTrigger` (spec §6.1: "legacy parameters ... may be
    /// ignored by the core engine"). Stored for forward compatibility;
    /// the built-in node kinds never read them.
    pub fn set_input_config(&mut self, node_id: &str, min_interval: i64, max_interval: i64) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        let Some(handle) = loaded.store.node_handle(node_id) else {
            log::debug!("set_input_config: unknown node id {:?}", node_id);
            return;
        };
        loaded
            .store
            .set_parameter(handle, "min_interval", ParamValue::Int(min_interval));
        loaded
            .store
            .set_parameter(handle, "max_interval", ParamValue::Int(max_interval));
    }

    /// Advance all Timer nodes. A no-op if `dt_ms <= 0`.
    pub fn tick(&mut self, dt_ms: f64) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        loaded
            .scheduler
            .tick(dt_ms, &loaded.store, &mut loaded.arena, &mut loaded.state);
    }

    /// Drive the ready queue to empty. A no-op on an unloaded engine.
    pub fn evaluate(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            return;
        };
        loaded
            .scheduler
            .evaluate(&loaded.store, &mut loaded.arena, &mut loaded.state);
    }

    /// A mapping from every output port to its current value. Empty if
    /// the engine is unloaded.
    pub fn snapshot(&self) -> Vec<PortSample> {
        match &self.loaded {
            Some(loaded) => observe::snapshot(&loaded.store, &loaded.arena),
            None => Vec::new(),
        }
    }

    /// Output ports whose generation stamp is strictly greater than
    /// `since_generation`. Empty if the engine is unloaded.
    pub fn delta(&self, since_generation: u64) -> Vec<PortSample> {
        match &self.loaded {
            Some(loaded) => observe::delta(&loaded.store, &loaded.arena, since_generation),
            None => Vec::new(),
        }
    }

    pub fn current_evaluation_generation(&self) -> u64 {
        self.loaded
            .as_ref()
            .map(|l| l.scheduler.current_generation())
            .unwrap_or(0)
    }

    /// Increment and return the snapshot-generation counter. Orthogonal
    /// to the evaluation generation (spec §3).
    pub fn begin_snapshot_generation(&mut self) -> u64 {
        self.snapshot_generation += 1;
        self.snapshot_generation
    }

    pub fn port_handle(
        &self,
        node_id: &str,
        port_id: &str,
        direction: Direction,
    ) -> Option<dataflow_core::PortHandle> {
        self.loaded
            .as_ref()
            .and_then(|l| l.store.port_handle(node_id, port_id, direction))
    }
}
