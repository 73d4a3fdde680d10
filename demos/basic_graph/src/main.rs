//! Wires up a small graph in-process — one `DeviceTrigger`, one `Timer`,
//! a `Counter` watching the timer, and an `Add` summing the trigger with
//! the counter's running total — then drives `tick`/`evaluate` a few
//! times and prints what changed.

use dataflow_core::GraphDescription;
use dataflow_graph::EngineCtx;

const GRAPH: &str = r#"{
    "nodes": [
        { "id": "trigger", "type": "DeviceTrigger", "outputs": [{"id": "out1", "type": "f64"}] },
        { "id": "timer", "type": "Timer", "outputs": [{"id": "out1", "type": "f64"}],
          "parameters": { "interval_ms": 1000 } },
        { "id": "counter", "type": "Counter",
          "inputs": [{"id": "in1", "type": "f64"}],
          "outputs": [{"id": "out1", "type": "f64"}] },
        { "id": "sum", "type": "Add",
          "inputs": [{"id": "in1", "type": "f64"}, {"id": "in2", "type": "f64"}],
          "outputs": [{"id": "out1", "type": "f64"}] }
    ],
    "connections": [
        { "fromNode": "timer", "fromPort": "out1", "toNode": "counter", "toPort": "in1" },
        { "fromNode": "trigger", "fromPort": "out1", "toNode": "sum", "toPort": "in1" },
        { "fromNode": "counter", "fromPort": "out1", "toNode": "sum", "toPort": "in2" }
    ]
}"#;

fn main() {
    simple_log::quick!("info");

    let description: GraphDescription = serde_json::from_str(GRAPH).expect("GRAPH is valid");

    let mut ctx = EngineCtx::new();
    if let Err(e) = ctx.load(&description) {
        log::error!("load failed: {e}");
        return;
    }
    ctx.evaluate();

    ctx.set_input("trigger", 5.0);
    for step in 0..4 {
        ctx.tick(1000.0);
        ctx.evaluate();

        let watermark = ctx.current_evaluation_generation().saturating_sub(1);
        for sample in ctx.delta(watermark) {
            log::info!(
                "step {step}: {}:{} = {:?}",
                sample.node_id,
                sample.port_id,
                sample.value
            );
        }
    }

    println!("finished");
}
