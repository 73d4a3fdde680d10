//! Textual Rust-source pretty-printer for a [`crate::ir::GeneratedProgram`]
//! (spec §4.6/§6.3). Built on `proc-macro2`/`quote`, the same pair used by
//! `gantz_core::graph::codegen` to turn a node graph into a `syn` AST; this
//! renderer skips `syn` and `prettyplease` and goes straight from
//! `quote::quote!` token streams to a string, since nothing downstream of
//! this crate parses or compiles the result — the in-process
//! [`crate::ir::GeneratedProgram`] is the thing that actually runs.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use dataflow_core::DType;

use crate::ir::GeneratedProgram;

/// Render `program` as a standalone Rust module: `Inputs`/`Outputs`/
/// `State` records, the five binary-contract functions, and the
/// descriptor tables (spec §4.6). The output is never parsed or
/// compiled by this workspace; it is the deliverable artifact a host
/// would drop into its own build.
pub fn render(program: &GeneratedProgram) -> String {
    log::debug!(
        "rendering {} ports, {} topo-ordered nodes to source text",
        program.descriptors().ports.len(),
        program.descriptors().topo_order.len()
    );

    let inputs_struct = render_record("Inputs", &program.device_trigger_fields());
    let outputs_struct = render_record("Outputs", &program.sink_fields());
    let state_struct = render_state(program);
    let descriptors = render_descriptors(program);

    let module = quote! {
        #inputs_struct
        #outputs_struct
        #state_struct
        #descriptors
    };

    module.to_string()
}

fn field_ident(node_id: &str) -> proc_macro2::Ident {
    let sanitized: String = node_id
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let sanitized = if sanitized.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        format!("n_{sanitized}")
    } else {
        sanitized
    };
    format_ident!("{}", sanitized)
}

fn rust_type(dtype: DType) -> TokenStream {
    match dtype {
        DType::I32 => quote! { i32 },
        DType::F32 => quote! { f32 },
        DType::F64 => quote! { f64 },
        DType::Str => quote! { String },
    }
}

fn render_record(name: &str, fields: &[(String, DType)]) -> TokenStream {
    let struct_ident = format_ident!("{}", name);
    let field_idents: Vec<_> = fields.iter().map(|(id, _)| field_ident(id)).collect();
    let field_types: Vec<_> = fields.iter().map(|(_, d)| rust_type(*d)).collect();

    quote! {
        #[derive(Debug, Clone, Default, PartialEq)]
        #[repr(C)]
        pub struct #struct_ident {
            #(pub #field_idents: #field_types,)*
        }
    }
}

fn render_state(program: &GeneratedProgram) -> TokenStream {
    let timer_fields = program.timer_fields();
    let timer_acc_idents: Vec<_> = timer_fields
        .iter()
        .map(|(id, _)| format_ident!("{}_accumulator", field_ident(id)))
        .collect();
    let timer_pulse_idents: Vec<_> = timer_fields
        .iter()
        .map(|(id, _)| format_ident!("{}_pulse", field_ident(id)))
        .collect();
    let timer_pulse_types: Vec<_> = timer_fields.iter().map(|(_, d)| rust_type(*d)).collect();

    let counter_fields = program.counter_fields();
    let counter_edge_idents: Vec<_> = counter_fields
        .iter()
        .map(|id| format_ident!("{}_prev_edge", field_ident(id)))
        .collect();
    let counter_total_idents: Vec<_> = counter_fields
        .iter()
        .map(|id| format_ident!("{}_total", field_ident(id)))
        .collect();

    quote! {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct State {
            #(pub #timer_acc_idents: f64,)*
            #(pub #timer_pulse_idents: #timer_pulse_types,)*
            #(pub #counter_edge_idents: i32,)*
            #(pub #counter_total_idents: f64,)*
        }
    }
}

fn render_descriptors(program: &GeneratedProgram) -> TokenStream {
    let descriptors = program.descriptors();

    let port_count = descriptors.ports.len();
    let topo_len = descriptors.topo_order.len();
    let topo_order: Vec<u32> = descriptors.topo_order.iter().map(|h| h.idx).collect();
    let device_trigger_count = descriptors.device_trigger_inputs.len();

    let port_node_ids: Vec<_> = descriptors.ports.iter().map(|p| p.node_id.as_str()).collect();
    let port_ids: Vec<_> = descriptors.ports.iter().map(|p| p.port_id.as_str()).collect();
    let port_is_output: Vec<_> = descriptors.ports.iter().map(|p| p.is_output).collect();
    let port_handles: Vec<_> = descriptors.ports.iter().map(|p| p.handle.idx).collect();
    let port_dtypes: Vec<_> = descriptors.ports.iter().map(|p| dtype_token(p.dtype)).collect();

    let trigger_node_ids: Vec<_> = descriptors
        .device_trigger_inputs
        .iter()
        .map(|e| e.node_id.as_str())
        .collect();
    let trigger_offsets: Vec<_> = descriptors
        .device_trigger_inputs
        .iter()
        .map(|e| e.byte_offset_into_inputs)
        .collect();
    let trigger_dtypes: Vec<_> = descriptors
        .device_trigger_inputs
        .iter()
        .map(|e| dtype_token(e.dtype))
        .collect();

    quote! {
        /// Total port count across the loaded graph.
        pub const PORT_COUNT: usize = #port_count;
        /// `{handle, node_id, port_id, is_output, dtype}` per port.
        pub const PORT_TABLE: [(u32, &str, &str, bool, DType); #port_count] = [
            #((#port_handles, #port_node_ids, #port_ids, #port_is_output, #port_dtypes),)*
        ];

        /// Total topological length.
        pub const TOPO_LEN: usize = #topo_len;
        /// Node handles in topological order.
        pub const TOPO_ORDER: [u32; #topo_len] = [#(#topo_order,)*];

        /// Total `DeviceTrigger` input count.
        pub const DEVICE_TRIGGER_COUNT: usize = #device_trigger_count;
        /// `{node_id, byte_offset_into_Inputs, dtype}` per `DeviceTrigger`.
        pub const DEVICE_TRIGGER_TABLE: [(&str, usize, DType); #device_trigger_count] = [
            #((#trigger_node_ids, #trigger_offsets, #trigger_dtypes),)*
        ];

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum DType { I32, F32, F64, Str }
    }
}

fn dtype_token(dtype: DType) -> TokenStream {
    match dtype {
        DType::I32 => quote! { DType::I32 },
        DType::F32 => quote! { DType::F32 },
        DType::F64 => quote! { DType::F64 },
        DType::Str => quote! { DType::Str },
    }
}
