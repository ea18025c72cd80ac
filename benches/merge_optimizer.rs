use axon_opt::graph::GraphBuilder;
use axon_opt::operator::{NeuronModelRegistry, Operator, SimNeurons};
use axon_opt::{MergeOptimizer, OptimizerConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn build_sim_neurons_model(count: usize) -> axon_opt::Model {
    let mut gb = GraphBuilder::new();
    let mut models = NeuronModelRegistry::new();
    let lif = models.register("LIF");

    for i in 0..count {
        let j = gb.zeros_f64(format!("J{i}"), &[16]);
        let output = gb.zeros_f64(format!("output{i}"), &[16]);
        gb.add_operator(Operator::SimNeurons(SimNeurons {
            model: lif,
            j,
            output,
            states: vec![],
        }));
    }
    gb.infer_dependencies();
    gb.into_model()
}

fn bench_merge_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_optimizer");
    for &count in &[8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || build_sim_neurons_model(count),
                |mut model| {
                    let optimizer = MergeOptimizer::new(OptimizerConfig::default());
                    black_box(optimizer.optimize(&mut model).unwrap());
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge_optimizer);
criterion_main!(benches);
