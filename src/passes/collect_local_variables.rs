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

//! Collect local variables (`spec.md` §4.B.2): applies `let`-inlining to every scalar
//! expression reachable from the operator graph.

use std::mem;

use crate::error::Result;
use crate::relational::{Operator, RelGraph};
use crate::scalar::Scalar;
use crate::transforms::let_rewrite::collect_local_variables as rewrite;

fn rewrite_in_place(expr: &mut Scalar, always_inline: bool) {
    let taken = mem::replace(expr, Scalar::bool_lit(true));
    *expr = rewrite(taken, always_inline);
}

fn rewrite_all(exprs: &mut [Scalar], always_inline: bool) {
    for e in exprs {
        rewrite_in_place(e, always_inline);
    }
}

fn rewrite_keys(keys: &mut [(std::sync::Arc<crate::catalog::Column>, Scalar)], always_inline: bool) {
    for (_, e) in keys {
        rewrite_in_place(e, always_inline);
    }
}

fn rewrite_endpoint(endpoint: &mut crate::endpoint::Endpoint, always_inline: bool) {
    use crate::endpoint::EndpointKind;
    for (_, e) in &mut endpoint.keys {
        rewrite_in_place(e, always_inline);
    }
    match &mut endpoint.kind {
        EndpointKind::Inclusive(e) | EndpointKind::Exclusive(e) => rewrite_in_place(e, always_inline),
        EndpointKind::PrefixedInclusive(ks) | EndpointKind::PrefixedExclusive(ks) => {
            rewrite_keys(ks, always_inline)
        }
        EndpointKind::Unbound => {}
    }
}

pub fn collect_local_variables(graph: &mut RelGraph, always_inline: bool) -> Result<()> {
    for node in graph.node_indices() {
        match graph.operator_mut(node) {
            Operator::Find(f) => rewrite_keys(&mut f.keys, always_inline),
            Operator::Scan(s) => {
                let mut lower = mem::take(&mut s.lower);
                let mut upper = mem::take(&mut s.upper);
                rewrite_endpoint(&mut lower, always_inline);
                rewrite_endpoint(&mut upper, always_inline);
                let s = match graph.operator_mut(node) {
                    Operator::Scan(s) => s,
                    _ => unreachable!(),
                };
                s.lower = lower;
                s.upper = upper;
            }
            Operator::Project(p) => {
                for (_, e) in &mut p.columns {
                    rewrite_in_place(e, always_inline);
                }
            }
            Operator::Filter(f) => rewrite_all(&mut f.conjuncts, always_inline),
            Operator::Values(v) => {
                for row in &mut v.rows {
                    rewrite_all(row, always_inline);
                }
            }
            Operator::JoinRelation(j) => rewrite_all(&mut j.condition, always_inline),
            Operator::JoinFind(j) => {
                rewrite_keys(&mut j.keys, always_inline);
                rewrite_all(&mut j.condition, always_inline);
            }
            Operator::JoinScan(j) => {
                let mut lower = mem::take(&mut j.lower);
                let mut upper = mem::take(&mut j.upper);
                rewrite_endpoint(&mut lower, always_inline);
                rewrite_endpoint(&mut upper, always_inline);
                let j = match graph.operator_mut(node) {
                    Operator::JoinScan(j) => j,
                    _ => unreachable!(),
                };
                j.lower = lower;
                j.upper = upper;
                rewrite_all(&mut j.condition, always_inline);
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::FilterOp;
    use crate::scalar::BinaryOp;

    #[test]
    fn inlines_trivial_let_inside_a_filter_condition() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let x = factory.local("x");
        let condition = Scalar::Let {
            variable: x.clone(),
            value: Box::new(Scalar::var(c0.clone())),
            body: Box::new(Scalar::Binary(
                BinaryOp::Add,
                Box::new(Scalar::var(x.clone())),
                Box::new(Scalar::var(x)),
            )),
        };
        let mut graph = RelGraph::new();
        let filter = graph.add_operator(Operator::Filter(FilterOp {
            conjuncts: vec![condition],
        }));

        collect_local_variables(&mut graph, false).unwrap();

        match graph.operator(filter) {
            Operator::Filter(f) => {
                assert_eq!(
                    f.conjuncts[0],
                    Scalar::Binary(
                        BinaryOp::Add,
                        Box::new(Scalar::var(c0.clone())),
                        Box::new(Scalar::var(c0)),
                    )
                );
            }
            _ => unreachable!(),
        }
    }
}
