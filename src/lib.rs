pub use dataflow_codegen::*;
pub use dataflow_core::*;
pub use dataflow_graph::*;
