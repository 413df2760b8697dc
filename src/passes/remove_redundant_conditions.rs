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

//! Remove redundant conditions (`spec.md` §4.B.7): the last pass in the fixed pipeline.
//! Simplifies every filter conjunct and join residual condition with three-valued
//! logic, dropping atoms that simplify to constant-true and splicing out filters left
//! with nothing to check.

use crate::error::Result;
use crate::relational::{Operator, RelGraph};
use crate::transforms::simplify::simplify_and_rewrite;

fn simplify_conjuncts(conjuncts: &mut Vec<crate::scalar::Scalar>) {
    for c in conjuncts.iter_mut() {
        let taken = std::mem::replace(c, crate::scalar::Scalar::bool_lit(true));
        *c = simplify_and_rewrite(taken);
    }
    conjuncts.retain(|c| !c.is_true_literal());
}

pub fn remove_redundant_conditions(graph: &mut RelGraph) -> Result<()> {
    let mut to_splice = Vec::new();

    for node in graph.node_indices() {
        match graph.operator_mut(node) {
            Operator::Filter(f) => {
                simplify_conjuncts(&mut f.conjuncts);
                if f.conjuncts.is_empty() {
                    to_splice.push(node);
                }
            }
            Operator::JoinRelation(j) => simplify_conjuncts(&mut j.condition),
            Operator::JoinFind(j) => simplify_conjuncts(&mut j.condition),
            Operator::JoinScan(j) => simplify_conjuncts(&mut j.condition),
            _ => {}
        }
    }

    for node in to_splice {
        if graph.input_opposite(node, 0).is_some() && graph.output_opposite(node, 0).is_some() {
            graph.splice_out(node)?;
        }
        graph.remove_operator(node);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{EmitOp, FilterOp, ValuesOp};
    use crate::scalar::{CompareOp, Scalar};

    #[test]
    fn constant_true_filter_is_spliced_out() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let mut graph = RelGraph::new();
        let values = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone()],
            rows: vec![vec![Scalar::bool_lit(true)]],
        }));
        // `c0 = c0 OR TRUE` simplifies to constant true.
        let condition = Scalar::Binary(
            crate::scalar::BinaryOp::Or,
            Box::new(Scalar::Compare(
                CompareOp::Eq,
                Box::new(Scalar::var(c0.clone())),
                Box::new(Scalar::var(c0.clone())),
            )),
            Box::new(Scalar::bool_lit(true)),
        );
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![c0] }));
        graph.connect(values, 0, filter, 0).unwrap();
        graph.connect(filter, 0, emit, 0).unwrap();

        remove_redundant_conditions(&mut graph).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.input_opposite(emit, 0).map(|p| p.node), Some(values));
    }

    #[test]
    fn non_constant_conjunct_survives() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let mut graph = RelGraph::new();
        let condition = Scalar::Compare(
            CompareOp::Gt,
            Box::new(Scalar::var(c0.clone())),
            Box::new(Scalar::Immediate(crate::scalar::ScalarValue::Int64(0))),
        );
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition.clone())));

        remove_redundant_conditions(&mut graph).unwrap();

        match graph.operator(filter) {
            Operator::Filter(f) => assert_eq!(f.conjuncts, vec![condition]),
            _ => unreachable!(),
        }
    }
}
