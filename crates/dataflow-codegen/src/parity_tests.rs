//! Cross-crate parity tests (spec §8 "Round-trip and parity" and the
//! concrete seed scenarios): the same operation sequence applied to
//! `dataflow_graph::EngineCtx` and to `dataflow_codegen::ir::GeneratedProgram`
//! must produce the same output values at every step.

use dataflow_core::{Direction, GraphDescription, Value};
use dataflow_graph::EngineCtx;

use crate::ir::GeneratedProgram;

const PURE_ADD_CHAIN: &str = r#"{
    "nodes": [
        { "id": "a", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "f32"}] },
        { "id": "b", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "f32"}] },
        { "id": "c", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "f32"}] },
        { "id": "sum", "type": "Add",
          "inputs": [{"id":"in1","type":"f32"},{"id":"in2","type":"f32"},{"id":"in3","type":"f32"}],
          "outputs": [{"id":"out1","type":"f32"}] }
    ],
    "connections": [
        { "fromNode": "a", "fromPort": "out1", "toNode": "sum", "toPort": "in1" },
        { "fromNode": "b", "fromPort": "out1", "toNode": "sum", "toPort": "in2" },
        { "fromNode": "c", "fromPort": "out1", "toNode": "sum", "toPort": "in3" }
    ]
}"#;

const COERCION_AT_EDGES: &str = r#"{
    "nodes": [
        { "id": "x", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "i32"}] },
        { "id": "y", "type": "Add", "inputs": [{"id": "in1", "type": "f64"}], "outputs": [{"id": "out1", "type": "f64"}] }
    ],
    "connections": [
        { "fromNode": "x", "fromPort": "out1", "toNode": "y", "toPort": "in1" }
    ]
}"#;

const TIMER_AND_COUNTER: &str = r#"{
    "nodes": [
        { "id": "m", "type": "Timer", "outputs": [{"id": "out1", "type": "f64"}],
          "parameters": { "interval_ms": 3000 } },
        { "id": "c", "type": "Counter", "inputs": [{"id": "in1", "type": "f64"}], "outputs": [{"id": "out1", "type": "i32"}] }
    ],
    "connections": [
        { "fromNode": "m", "fromPort": "out1", "toNode": "c", "toPort": "in1" }
    ]
}"#;

fn build(json: &str) -> (EngineCtx, GeneratedProgram) {
    let description: GraphDescription = serde_json::from_str(json).unwrap();
    let mut ctx = EngineCtx::new();
    ctx.load(&description).unwrap();

    let store = dataflow_graph::graph::load(&description).unwrap();
    let program = GeneratedProgram::compile(&store);

    (ctx, program)
}

/// Scenario 1, run on both engines: `set_input` three triggers, then
/// `evaluate`/`step`. Both must report `sum:out1 == 7.0`.
#[test]
fn pure_add_chain_parity() {
    let (mut ctx, program) = build(PURE_ADD_CHAIN);

    ctx.set_input("a", 1.0);
    ctx.set_input("b", 2.0);
    ctx.set_input("c", 4.0);
    ctx.evaluate();

    let interpreter_sum = ctx
        .snapshot()
        .into_iter()
        .find(|s| s.node_id == "sum" && s.port_id == "out1")
        .unwrap()
        .value;
    assert_eq!(interpreter_sum, Value::F32(7.0));

    let a_handle = ctx.port_handle("a", "out1", Direction::Output).unwrap();
    let b_handle = ctx.port_handle("b", "out1", Direction::Output).unwrap();
    let c_handle = ctx.port_handle("c", "out1", Direction::Output).unwrap();
    let sum_handle = ctx.port_handle("sum", "out1", Direction::Output).unwrap();

    let mut inputs = program.new_inputs();
    let mut outputs = program.new_outputs();
    let mut state = program.new_state();
    program.init(&mut state);
    program.set_input(a_handle, Value::F32(1.0), &mut inputs, &mut state);
    program.set_input(b_handle, Value::F32(2.0), &mut inputs, &mut state);
    program.set_input(c_handle, Value::F32(4.0), &mut inputs, &mut state);
    program.step(&inputs, &mut outputs, &mut state);

    let aot_sum = program.get_output(sum_handle, &outputs, &state).unwrap();
    assert_eq!(aot_sum, interpreter_sum);
}

/// Scenario 2: i32 DeviceTrigger feeding an f64 Add — exact widen on
/// both engines.
#[test]
fn coercion_at_edges_parity() {
    let (mut ctx, program) = build(COERCION_AT_EDGES);

    ctx.set_input("x", 3.0);
    ctx.evaluate();
    let interpreter_y = ctx
        .snapshot()
        .into_iter()
        .find(|s| s.node_id == "y" && s.port_id == "out1")
        .unwrap()
        .value;
    assert_eq!(interpreter_y, Value::F64(3.0));

    let x_handle = ctx.port_handle("x", "out1", Direction::Output).unwrap();
    let y_handle = ctx.port_handle("y", "out1", Direction::Output).unwrap();

    let mut inputs = program.new_inputs();
    let mut outputs = program.new_outputs();
    let mut state = program.new_state();
    program.init(&mut state);
    program.set_input(x_handle, Value::I32(3), &mut inputs, &mut state);
    program.step(&inputs, &mut outputs, &mut state);

    assert_eq!(program.get_output(y_handle, &outputs, &state).unwrap(), interpreter_y);
}

/// Scenario 3's tick sequence, run on both engines in lockstep — each
/// `tick`/`evaluate` pair on the interpreter mirrored by a `tick`/`step`
/// pair on the AOT program. Asserts parity after every step, not just
/// the final value.
#[test]
fn timer_counter_sequence_parity() {
    let (mut ctx, program) = build(TIMER_AND_COUNTER);

    let c_out = ctx.port_handle("c", "out1", Direction::Output).unwrap();

    let mut inputs = program.new_inputs();
    let mut outputs = program.new_outputs();
    let mut state = program.new_state();
    program.init(&mut state);

    let ticks = [1500.0, 1500.0, 3000.0, 1500.0, 1500.0];
    for dt in ticks {
        ctx.tick(dt);
        ctx.evaluate();
        program.tick(dt, &inputs, &mut outputs, &mut state);
        program.step(&inputs, &mut outputs, &mut state);

        let interpreter_c = ctx
            .snapshot()
            .into_iter()
            .find(|s| s.node_id == "c" && s.port_id == "out1")
            .unwrap()
            .value;
        let aot_c = program.get_output(c_out, &outputs, &state).unwrap();
        assert_eq!(aot_c, interpreter_c, "parity after tick({dt})");
    }
}

/// Scenario 6: AOT determinism under repeated `step` calls with fixed
/// inputs — `Outputs.sum` stable at 7.0, `State` stays all-zero (no
/// Timer/Counter in this graph).
#[test]
fn aot_determinism_under_repeated_step() {
    let (_, program) = build(PURE_ADD_CHAIN);

    let a_handle = program
        .descriptors()
        .ports
        .iter()
        .find(|p| p.node_id == "a" && p.is_output)
        .unwrap()
        .handle;
    let b_handle = program
        .descriptors()
        .ports
        .iter()
        .find(|p| p.node_id == "b" && p.is_output)
        .unwrap()
        .handle;
    let c_handle = program
        .descriptors()
        .ports
        .iter()
        .find(|p| p.node_id == "c" && p.is_output)
        .unwrap()
        .handle;
    let sum_handle = program
        .descriptors()
        .ports
        .iter()
        .find(|p| p.node_id == "sum" && p.is_output)
        .unwrap()
        .handle;

    let mut inputs = program.new_inputs();
    let mut outputs = program.new_outputs();
    let mut state = program.new_state();
    program.init(&mut state);
    program.set_input(a_handle, Value::F32(1.0), &mut inputs, &mut state);
    program.set_input(b_handle, Value::F32(2.0), &mut inputs, &mut state);
    program.set_input(c_handle, Value::F32(4.0), &mut inputs, &mut state);

    for _ in 0..10 {
        program.step(&inputs, &mut outputs, &mut state);
        assert_eq!(program.get_output(sum_handle, &outputs, &state).unwrap(), Value::F32(7.0));
        // No Timer/Counter nodes in this graph, so `State` (which holds
        // only their side-tables) stays equal to its zeroed form.
        assert_eq!(state, program.new_state());
    }
}
