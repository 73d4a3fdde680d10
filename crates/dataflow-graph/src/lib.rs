mod arena;
mod compute;
mod context;
pub mod graph;
mod node_state;
pub mod observe;
pub mod scheduler;

pub use arena::PortArena;
pub use context::EngineCtx;
pub use node_state::{CounterState, NodeKindState, TimerState};
pub use observe::PortSample;
pub use scheduler::Scheduler;

#[cfg(test)]
mod tests;
