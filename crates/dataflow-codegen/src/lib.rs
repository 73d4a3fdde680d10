//! Ahead-of-time code generator (spec §4.6).
//!
//! Split in two, because this workspace never invokes a Rust compiler:
//! [`ir::GeneratedProgram`] *is* the `Inputs`/`Outputs`/`State` contract,
//! executable in-process so the parity properties in spec §8 are ordinary
//! `#[test]`s against [`dataflow_graph::EngineCtx`]; [`render::render`]
//! turns one of those programs into the textual Rust source a real build
//! would compile.

pub mod ir;
pub mod render;

#[cfg(test)]
mod parity_tests;

pub use ir::GeneratedProgram;
pub use render::render;
