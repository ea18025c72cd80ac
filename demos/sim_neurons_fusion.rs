use axon_opt::graph::GraphBuilder;
use axon_opt::operator::{NeuronModelRegistry, Operator, SimNeurons};
use axon_opt::{MergeOptimizer, OptimizerConfig};

fn main() -> anyhow::Result<()> {
    axon_opt::telemetry::init_subscriber();

    println!("SimNeurons fusion demo: three independent populations sharing one neuron model");

    let mut gb = GraphBuilder::new();
    let mut models = NeuronModelRegistry::new();
    let lif = models.register("LIF(tau_rc=0.02, tau_ref=0.002)");

    let mut ops = Vec::new();
    for i in 0..3 {
        let j = gb.zeros_f64(format!("J{i}"), &[4]);
        let output = gb.zeros_f64(format!("output{i}"), &[4]);
        let refractory = gb.zeros_f64(format!("refractory{i}"), &[4]);
        ops.push(gb.add_operator(Operator::SimNeurons(SimNeurons {
            model: lif,
            j,
            output,
            states: vec![refractory],
        })));
    }
    gb.infer_dependencies();

    let mut model = gb.into_model();
    println!("before: {} operators", model.operator_count());

    let optimizer = MergeOptimizer::new(OptimizerConfig::default());
    let passes = optimizer.optimize(&mut model)?;

    println!(
        "after {passes} passes: {} operator(s) (expected 1 fused SimNeurons)",
        model.operator_count()
    );

    Ok(())
}
