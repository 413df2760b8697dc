// Copyright 2026 The relplan_opt Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The step-plan builder (`spec.md` §4.D, §6.1): runs the five phases in order over an
//! already-optimized intermediate plan.

use tracing::debug;

use crate::error::Result;
use crate::options::OptimizerOptions;
use crate::relational::RelGraph;
use crate::stepplan::collect_exchange_columns::collect_exchange_columns;
use crate::stepplan::collect_exchange_steps::collect_exchange_steps;
use crate::stepplan::collect_process_steps::collect_process_steps;
use crate::stepplan::link_steps::link_steps;
use crate::stepplan::rewrite_stream_variables::rewrite_stream_variables;
use crate::stepplan::StepGraph;

pub struct StepPlanBuilder<'a> {
    options: &'a OptimizerOptions,
}

impl<'a> StepPlanBuilder<'a> {
    pub fn new(options: &'a OptimizerOptions) -> Self {
        StepPlanBuilder { options }
    }

    /// `step_plan_builder.build(graph, options)` (`spec.md` §6.1). `graph` must already
    /// have been through `intermediate_plan_optimizer::run`; this does no optimization
    /// of its own, only lowering.
    pub fn build(&self, mut graph: RelGraph) -> Result<StepGraph> {
        let mut step_graph = StepGraph::new();

        collect_exchange_steps(&mut graph, &mut step_graph, self.options)?;
        debug!(nodes = step_graph.node_indices().count(), "collected exchange steps");

        collect_process_steps(&graph, &mut step_graph)?;
        debug!(nodes = step_graph.node_indices().count(), "collected process steps");

        link_steps(&mut step_graph)?;

        let mut info_map = collect_exchange_columns(&mut step_graph)?;
        rewrite_stream_variables(&mut step_graph, &mut info_map)?;

        Ok(step_graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::catalog::CatalogProvider;
    use crate::relational::op::{EmitOp, ValuesOp};
    use crate::relational::Operator;

    #[test]
    fn a_single_values_to_emit_chain_becomes_one_process_with_no_exchanges() {
        let factory = VariableFactory;
        let a = factory.stream("a");
        let mut graph = RelGraph::new();
        let values = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![a.clone()],
            rows: vec![vec![crate::scalar::Scalar::bool_lit(true)]],
        }));
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![a] }));
        graph.connect(values, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(CatalogProvider::new());
        let builder = StepPlanBuilder::new(&options);
        let step_graph = builder.build(graph).unwrap();

        let processes: Vec<_> = step_graph
            .node_indices()
            .filter(|&id| step_graph.step(id).as_process().is_some())
            .collect();
        assert_eq!(processes.len(), 1);
    }
}
