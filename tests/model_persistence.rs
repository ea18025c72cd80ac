//! JSON round-trip of a `Model`, including a custom operator kind,
//! mirroring `examples/persistence_flow_tests.rs` in this codebase's
//! tensor-graph sibling module (SPEC_FULL.md §2, "Persistence").

use axon_opt::error::OptResult;
use axon_opt::graph::GraphBuilder;
use axon_opt::operator::{CustomOperator, ElementwiseInc, NeuronModelRegistry, Operator, SimNeurons};
use axon_opt::signal::merge::SignalReplacements;
use axon_opt::signal::{SignalArena, SignalId};
use axon_opt::Model;
use serde::{Deserialize, Serialize};

#[test]
fn model_round_trips_through_json() {
    let mut gb = GraphBuilder::new();
    let mut models = NeuronModelRegistry::new();
    let lif = models.register("LIF");

    let a = gb.zeros_f64("a", &[4]);
    let b = gb.zeros_f64("b", &[4]);
    let y = gb.zeros_f64("y", &[4]);
    gb.add_operator(Operator::ElementwiseInc(ElementwiseInc { a, b, y }));

    let j = gb.zeros_f64("J", &[4]);
    let output = gb.zeros_f64("output", &[4]);
    gb.add_operator(Operator::SimNeurons(SimNeurons {
        model: lif,
        j,
        output,
        states: vec![],
    }));
    gb.infer_dependencies();

    let owner = gb.new_owner();
    gb.set_named_signal(owner, "output", output);

    let model = gb.into_model();
    let json = model.to_json().unwrap();
    let reloaded = Model::from_json(&json).unwrap();

    assert_eq!(reloaded.operator_count(), model.operator_count());
    assert_eq!(
        reloaded.named_signal(owner, "output"),
        model.named_signal(owner, "output")
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DoubleWrite {
    dst: SignalId,
}

#[typetag::serde]
impl CustomOperator for DoubleWrite {
    fn all_signals(&self) -> Vec<SignalId> {
        vec![self.dst]
    }

    fn can_merge(&self, _other: &dyn CustomOperator) -> bool {
        false
    }

    fn merge(
        &self,
        _others: &[&dyn CustomOperator],
        _arena: &mut SignalArena,
        _replacements: &mut SignalReplacements,
    ) -> OptResult<Box<dyn CustomOperator>> {
        unreachable!("DoubleWrite never merges in this test")
    }

    fn clone_box(&self) -> Box<dyn CustomOperator> {
        Box::new(self.clone())
    }
}

#[test]
fn custom_operator_round_trips_through_json_via_typetag() {
    let mut gb = GraphBuilder::new();
    let dst = gb.zeros_f64("dst", &[2]);
    gb.add_operator(Operator::Custom(Box::new(DoubleWrite { dst })));
    let model = gb.into_model();

    let json = model.to_json().unwrap();
    let reloaded = Model::from_json(&json).unwrap();

    assert_eq!(reloaded.operator_count(), 1);
    let id = reloaded.live_operators().next().unwrap();
    match reloaded.operator(id) {
        Operator::Custom(op) => assert_eq!(op.all_signals(), vec![dst]),
        other => panic!("expected a Custom operator, got {other:?}"),
    }
}
