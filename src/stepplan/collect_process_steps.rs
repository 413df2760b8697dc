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

//! Collect process steps (`spec.md` §4.D.2): partitions the mutated intermediate
//! graph into weakly connected components. `offer` operators have no output port and
//! `take_*` operators have no input port, so once `collect_exchange_steps` has spliced
//! them in, every component already stops at an exchange boundary on its own — this
//! pass only needs to find the components and lift each one into its own `RelGraph`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::relational::{NodeIndex, RelGraph};
use crate::stepplan::{ProcessStep, Step, StepGraph};

fn weakly_connected_components(graph: &RelGraph) -> Vec<Vec<NodeIndex>> {
    let mut visited = HashSet::new();
    let mut components = Vec::new();

    for start in graph.node_indices() {
        if !visited.insert(start) {
            continue;
        }
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for neighbor in graph
                .predecessors(node)
                .into_iter()
                .chain(graph.successors(node))
            {
                if visited.insert(neighbor) {
                    component.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Lifts `component`'s nodes (and the edges between them) out of `graph` into a fresh
/// `RelGraph`, reconnecting every port exactly as it was.
fn extract_component(graph: &RelGraph, component: &[NodeIndex]) -> Result<RelGraph> {
    let mut sub = RelGraph::new();
    let mut mapping: HashMap<NodeIndex, NodeIndex> = HashMap::with_capacity(component.len());

    for &old in component {
        let new = sub.add_operator(graph.operator(old).clone());
        mapping.insert(old, new);
    }

    for &old in component {
        let op = graph.operator(old);
        for index in 0..op.input_port_count() {
            if let Some(opposite) = graph.input_opposite(old, index) {
                let from = mapping[&opposite.node];
                let to = mapping[&old];
                sub.connect(from, opposite.index, to, index)?;
            }
        }
    }

    Ok(sub)
}

/// Partitions `graph` into processes and adds each as a `Step::Process` in
/// `step_graph`. Linking processes to the exchanges they produce into or consume from
/// is `link_steps`'s job, not this one's.
pub fn collect_process_steps(graph: &RelGraph, step_graph: &mut StepGraph) -> Result<()> {
    for component in weakly_connected_components(graph) {
        let sub = extract_component(graph, &component)?;
        step_graph.add_step(Step::Process(ProcessStep { graph: sub }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{EmitOp, FilterOp, ValuesOp};
    use crate::relational::Operator;
    use crate::scalar::Scalar;

    #[test]
    fn two_disjoint_chains_become_two_processes() {
        let factory = VariableFactory;
        let mut graph = RelGraph::new();

        let a = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![factory.stream("a")],
            rows: vec![],
        }));
        let a_emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![] }));
        graph.connect(a, 0, a_emit, 0).unwrap();

        let b = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![factory.stream("b")],
            rows: vec![],
        }));
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(Scalar::bool_lit(true))));
        graph.connect(b, 0, filter, 0).unwrap();

        let mut step_graph = StepGraph::new();
        collect_process_steps(&graph, &mut step_graph).unwrap();

        let processes: Vec<_> = step_graph
            .node_indices()
            .filter(|&id| step_graph.step(id).as_process().is_some())
            .collect();
        assert_eq!(processes.len(), 2);
        for id in processes {
            let process = step_graph.step(id).as_process().unwrap();
            assert_eq!(process.graph.node_count(), 2);
        }
    }
}
