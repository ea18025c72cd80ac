use axon_opt::graph::GraphBuilder;
use axon_opt::operator::{ElementwiseInc, Operator};
use axon_opt::signal::Buffer;
use axon_opt::{MergeOptimizer, OptimizerConfig};
use ndarray::array;

fn main() -> anyhow::Result<()> {
    axon_opt::telemetry::init_subscriber();

    println!("View-merge demo: two ElementwiseInc ops over adjacent slices of one buffer");

    let mut gb = GraphBuilder::new();

    let a_base = gb.base_signal("a", Buffer::F64(array![1.0, 2.0, 3.0, 4.0].into_dyn()), false);
    let b_base = gb.base_signal("b", Buffer::F64(array![10.0, 20.0, 30.0, 40.0].into_dyn()), false);
    let y_base = gb.zeros_f64("y", &[4]);

    let a0 = gb.slice(a_base, 0, 0..2)?;
    let a1 = gb.slice(a_base, 0, 2..4)?;
    let b0 = gb.slice(b_base, 0, 0..2)?;
    let b1 = gb.slice(b_base, 0, 2..4)?;
    let y0 = gb.slice(y_base, 0, 0..2)?;
    let y1 = gb.slice(y_base, 0, 2..4)?;

    let op0 = gb.add_operator(Operator::ElementwiseInc(ElementwiseInc { a: a0, b: b0, y: y0 }));
    let op1 = gb.add_operator(Operator::ElementwiseInc(ElementwiseInc { a: a1, b: b1, y: y1 }));
    gb.infer_dependencies();
    let _ = (op0, op1);

    let mut model = gb.into_model();
    println!("before: {} operators", model.operator_count());

    let optimizer = MergeOptimizer::new(OptimizerConfig::default());
    let passes = optimizer.optimize(&mut model)?;

    println!(
        "after {passes} passes: {} operator(s) (expected 1, spanning the whole buffer)",
        model.operator_count()
    );

    Ok(())
}
