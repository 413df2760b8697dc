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

//! Remove redundant stream variables (`spec.md` §4.B.1): walks operators
//! downstream-to-upstream, propagating a "used" set, dropping declarations nothing
//! downstream needs and deleting operators left with nothing to declare.

use std::collections::HashSet;

use crate::binding::VariableRef;
use crate::endpoint::{Endpoint, EndpointKind};
use crate::error::Result;
use crate::relational::{NodeIndex, Operator, RelGraph};
use crate::transforms::collect_stream_vars::collect_stream_vars;

fn mark(used: &mut HashSet<VariableRef>, v: &VariableRef) {
    if v.is_stream_variable() {
        used.insert(v.clone());
    }
}

fn mark_expr(used: &mut HashSet<VariableRef>, expr: &crate::scalar::Scalar) {
    collect_stream_vars(expr, |v| {
        used.insert(v.clone());
    });
}

fn mark_endpoint(used: &mut HashSet<VariableRef>, endpoint: &Endpoint) {
    for (_, expr) in &endpoint.keys {
        mark_expr(used, expr);
    }
    match &endpoint.kind {
        EndpointKind::Inclusive(e) | EndpointKind::Exclusive(e) => mark_expr(used, e),
        EndpointKind::PrefixedInclusive(ks) | EndpointKind::PrefixedExclusive(ks) => {
            for (_, e) in ks {
                mark_expr(used, e);
            }
        }
        EndpointKind::Unbound => {}
    }
}

pub fn remove_redundant_stream_variables(graph: &mut RelGraph) -> Result<()> {
    let mut used: HashSet<VariableRef> = HashSet::new();
    let mut to_delete: Vec<NodeIndex> = Vec::new();

    for node in graph.downstream_to_upstream_order() {
        match graph.operator_mut(node) {
            Operator::Emit(e) => {
                for v in &e.columns {
                    mark(&mut used, v);
                }
            }
            Operator::Write(w) => {
                for v in w.keys.iter().chain(w.values.iter()) {
                    mark(&mut used, v);
                }
            }
            Operator::Find(f) => {
                f.columns
                    .retain(|c| !c.variable.is_stream_variable() || used.contains(&c.variable));
                for (_, expr) in &f.keys {
                    mark_expr(&mut used, expr);
                }
            }
            Operator::Scan(s) => {
                s.columns
                    .retain(|c| !c.variable.is_stream_variable() || used.contains(&c.variable));
                let (lower, upper) = (s.lower.clone(), s.upper.clone());
                mark_endpoint(&mut used, &lower);
                mark_endpoint(&mut used, &upper);
            }
            Operator::JoinFind(j) => {
                j.columns
                    .retain(|c| !c.variable.is_stream_variable() || used.contains(&c.variable));
                for (_, expr) in j.keys.clone().iter() {
                    mark_expr(&mut used, expr);
                }
                for atom in j.condition.clone().iter() {
                    mark_expr(&mut used, atom);
                }
            }
            Operator::JoinScan(j) => {
                j.columns
                    .retain(|c| !c.variable.is_stream_variable() || used.contains(&c.variable));
                let (lower, upper, condition) = (j.lower.clone(), j.upper.clone(), j.condition.clone());
                mark_endpoint(&mut used, &lower);
                mark_endpoint(&mut used, &upper);
                for atom in &condition {
                    mark_expr(&mut used, atom);
                }
            }
            Operator::Project(p) => {
                p.columns.retain(|(v, _)| !v.is_stream_variable() || used.contains(v));
                if p.columns.is_empty() {
                    to_delete.push(node);
                } else {
                    for (_, expr) in p.columns.clone().iter() {
                        mark_expr(&mut used, expr);
                    }
                }
            }
            Operator::Filter(f) => {
                for atom in f.conjuncts.clone().iter() {
                    mark_expr(&mut used, atom);
                }
            }
            Operator::JoinRelation(j) => {
                for atom in j.condition.clone().iter() {
                    mark_expr(&mut used, atom);
                }
            }
            Operator::Identify(i) => {
                if !used.contains(&i.variable) {
                    to_delete.push(node);
                }
            }
            Operator::AggregateRelation(a) => {
                a.aggregations.retain(|c| used.contains(&c.destination));
                for gk in a.group_keys.clone().iter() {
                    mark(&mut used, gk);
                }
                for agg in a.aggregations.clone().iter() {
                    for arg in &agg.arguments {
                        mark(&mut used, arg);
                    }
                }
            }
            Operator::DistinctRelation(d) => {
                for gk in d.group_keys.clone().iter() {
                    mark(&mut used, gk);
                }
            }
            Operator::LimitRelation(l) => {
                for gk in l.group_keys.clone().iter() {
                    mark(&mut used, gk);
                }
                for (sk, _) in l.sort_keys.clone().iter() {
                    mark(&mut used, sk);
                }
            }
            Operator::Union(u) => {
                u.mappings.retain(|m| used.contains(&m.destination));
                for m in u.mappings.clone().iter() {
                    if let Some(l) = &m.left {
                        mark(&mut used, l);
                    }
                    if let Some(r) = &m.right {
                        mark(&mut used, r);
                    }
                }
            }
            Operator::Intersection(s) | Operator::Difference(s) => {
                for k in s.left_keys.clone().iter().chain(s.right_keys.clone().iter()) {
                    mark(&mut used, k);
                }
            }
            Operator::Values(v) => {
                let keep: Vec<bool> = v
                    .columns
                    .iter()
                    .map(|c| !c.is_stream_variable() || used.contains(c))
                    .collect();
                let mut i = 0;
                v.columns.retain(|_| {
                    let k = keep[i];
                    i += 1;
                    k
                });
                for row in &mut v.rows {
                    let mut j = 0;
                    row.retain(|_| {
                        let k = keep[j];
                        j += 1;
                        k
                    });
                }
            }
            Operator::Escape(e) => {
                e.mappings.retain(|(_, dst)| used.contains(dst));
                for (src, _) in e.mappings.clone().iter() {
                    mark(&mut used, src);
                }
            }
            _ => {}
        }
    }

    for node in to_delete {
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
    use crate::relational::op::{EmitOp, IdentifyOp, ValuesOp};

    #[test]
    fn identify_with_unused_variable_is_deleted() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let ident_var = factory.stream("ident");

        let mut graph = RelGraph::new();
        let values = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone()],
            rows: vec![vec![crate::scalar::Scalar::bool_lit(true)]],
        }));
        let identify = graph.add_operator(Operator::Identify(IdentifyOp {
            variable: ident_var,
        }));
        let emit = graph.add_operator(Operator::Emit(EmitOp {
            columns: vec![c0.clone()],
        }));
        graph.connect(values, 0, identify, 0).unwrap();
        graph.connect(identify, 0, emit, 0).unwrap();

        remove_redundant_stream_variables(&mut graph).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert!(graph.input_opposite(emit, 0).map(|p| p.node) == Some(values));
    }

    #[test]
    fn values_drops_unused_column_from_every_row() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let c1 = factory.stream("c1");

        let mut graph = RelGraph::new();
        let values = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone(), c1.clone()],
            rows: vec![vec![
                crate::scalar::Scalar::bool_lit(true),
                crate::scalar::Scalar::bool_lit(false),
            ]],
        }));
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![c0.clone()] }));
        graph.connect(values, 0, emit, 0).unwrap();

        remove_redundant_stream_variables(&mut graph).unwrap();

        match graph.operator(values) {
            Operator::Values(v) => {
                assert_eq!(v.columns, vec![c0]);
                assert_eq!(v.rows[0].len(), 1);
            }
            _ => unreachable!(),
        }
    }
}
