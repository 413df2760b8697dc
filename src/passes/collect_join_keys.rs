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

//! Collect join keys (`spec.md` §4.B.6): the last chance, before the step plan is
//! built, to narrow a plain `join_relation` residual condition down to endpoints a
//! broadcast strategy can probe by. A join left untouched here still has the cogroup
//! strategy available; one that gets endpoints populated is committed to broadcast
//! (`stepplan::available_join_strategies` excludes cogroup once a prefix or key pair is
//! set).

use crate::error::Result;
use crate::flow::flow_set;
use crate::keyterm::SearchKeyTerm;
use crate::options::{OptimizerOptions, RuntimeFeature};
use crate::passes::rewrite_join::swap_join_inputs;
use crate::relational::op::{JoinKeyEndpoint, JoinKeyEndpointKind};
use crate::relational::{NodeIndex, Operator, Port, RelGraph};
use crate::scalar::Scalar;
use crate::stepplan::{available_join_strategies, EndpointStyle, JoinStrategy};
use crate::binding::VariableRef;

/// Builds `(lower, upper)` from an ordered term list the way `endpoint::build_endpoints`
/// does, but keyed by stream variable rather than catalog column, and without purging
/// the source atoms: the join residual condition still has to be checked in full until
/// the step-plan builder actually lowers this join to a physical operator.
fn build_join_key_endpoints(terms: &[(VariableRef, SearchKeyTerm)]) -> (JoinKeyEndpoint, JoinKeyEndpoint) {
    let mut lower = JoinKeyEndpoint::default();
    let mut upper = JoinKeyEndpoint::default();

    if terms.is_empty() {
        return (lower, upper);
    }

    for (var, term) in &terms[..terms.len() - 1] {
        if let Some(factor) = term.equivalent_factor() {
            lower.keys.push((var.clone(), factor.clone()));
            upper.keys.push((var.clone(), factor));
        }
    }

    let (last_var, last_term) = &terms[terms.len() - 1];

    if let Some(factor) = last_term.equivalent_factor() {
        lower.keys.push((last_var.clone(), factor.clone()));
        upper.keys.push((last_var.clone(), factor));
        lower.kind = JoinKeyEndpointKind::PrefixedInclusive(lower.keys.clone());
        upper.kind = JoinKeyEndpointKind::PrefixedInclusive(upper.keys.clone());
        return (lower, upper);
    }

    if let Some((value, inclusive)) = last_term.lower_factor() {
        lower.keys.push((last_var.clone(), value));
        lower.kind = if inclusive {
            JoinKeyEndpointKind::PrefixedInclusive(lower.keys.clone())
        } else {
            JoinKeyEndpointKind::PrefixedExclusive(lower.keys.clone())
        };
    } else if !lower.keys.is_empty() {
        lower.kind = JoinKeyEndpointKind::PrefixedInclusive(lower.keys.clone());
    }

    if let Some((value, inclusive)) = last_term.upper_factor() {
        upper.keys.push((last_var.clone(), value));
        upper.kind = if inclusive {
            JoinKeyEndpointKind::PrefixedInclusive(upper.keys.clone())
        } else {
            JoinKeyEndpointKind::PrefixedExclusive(upper.keys.clone())
        };
    } else if !upper.keys.is_empty() {
        upper.kind = JoinKeyEndpointKind::PrefixedInclusive(upper.keys.clone());
    }

    (lower, upper)
}

/// Whether `term`'s equivalent factor is itself a reference to a variable visible on the
/// opposite side: the key-pair case (`spec.md` §4.B.6), the strongest evidence a column
/// is a genuine equi-join key rather than a point lookup against a constant.
fn is_key_pair(term: &SearchKeyTerm, opposite_vars: &std::collections::HashSet<VariableRef>) -> bool {
    match term.equivalent_factor() {
        Some(Scalar::VariableReference(v)) => opposite_vars.contains(&v),
        _ => false,
    }
}

fn collect_one(graph: &mut RelGraph, options: &OptimizerOptions, join_node: NodeIndex) -> Result<()> {
    let (kind, condition) = match graph.operator(join_node) {
        Operator::JoinRelation(j) => (j.kind, j.condition.clone()),
        _ => return Ok(()),
    };

    if let Some(JoinStrategy::Cogroup) = options.hints.join.get(&join_node).copied() {
        return Ok(());
    }

    let unset_style = EndpointStyle {
        has_prefix_or_key_pair: false,
    };
    if !available_join_strategies(kind, unset_style).contains(&JoinStrategy::Broadcast) {
        return Ok(());
    }

    let mut probe_is_right = false;
    if let Some(volume) = &options.volume_hints {
        if let (Some(left_port), Some(right_port)) = (
            graph.input_opposite(join_node, 0),
            graph.input_opposite(join_node, 1),
        ) {
            if let (Some(left_volume), Some(right_volume)) = (volume.get(left_port), volume.get(right_port)) {
                if left_volume.total() > right_volume.total() * 100.0 {
                    probe_is_right = true;
                }
            }
        }
    }

    let probe_index = if probe_is_right { 1 } else { 0 };
    let build_index = 1 - probe_index;
    let probe_vars = flow_set(graph, Port::input(join_node, probe_index));
    let build_vars = flow_set(graph, Port::input(join_node, build_index));

    let mut builder = crate::keyterm::SearchKeyTermBuilder::new();
    builder.add_join_condition(join_node, &condition, &probe_vars)?;

    let broadcast_find_enabled = options.runtime_features.is_enabled(RuntimeFeature::BroadcastExchange);
    let broadcast_scan_enabled = options.runtime_features.is_enabled(RuntimeFeature::BroadcastJoinScan);

    let mut key_pairs = Vec::new();
    let mut other_equivalents = Vec::new();
    let mut ranges = Vec::new();
    for (var, term) in builder.terms() {
        if term.equivalent() {
            if is_key_pair(term, &build_vars) {
                key_pairs.push((var.clone(), term.clone()));
            } else {
                other_equivalents.push((var.clone(), term.clone()));
            }
        } else if term.full_bounded() || term.half_bounded() {
            ranges.push((var.clone(), term.clone()));
        }
    }

    if key_pairs.is_empty() && other_equivalents.is_empty() && ranges.is_empty() {
        return Ok(());
    }

    key_pairs.sort_by(|a, b| a.0.kind().label().cmp(b.0.kind().label()));
    let mut ordered = key_pairs;

    if broadcast_find_enabled {
        other_equivalents.sort_by(|a, b| a.0.kind().label().cmp(b.0.kind().label()));
        ordered.extend(other_equivalents);
    }

    if broadcast_scan_enabled {
        if let Some(best) = ranges
            .into_iter()
            .max_by_key(|(_, t)| if t.full_bounded() { 2 } else { 1 })
        {
            ordered.push(best);
        }
    }

    if ordered.is_empty() {
        return Ok(());
    }

    if probe_is_right {
        swap_join_inputs(graph, join_node)?;
    }

    let (lower, upper) = build_join_key_endpoints(&ordered);
    if let Operator::JoinRelation(j) = graph.operator_mut(join_node) {
        j.lower = Some(lower);
        j.upper = Some(upper);
    }

    Ok(())
}

pub fn collect_join_keys(graph: &mut RelGraph, options: &OptimizerOptions) -> Result<()> {
    let candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| matches!(graph.operator(n), Operator::JoinRelation(j) if !j.has_endpoints()))
        .collect();
    for join_node in candidates {
        collect_one(graph, options, join_node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::catalog::CatalogProvider;
    use crate::relational::op::{EmitOp, JoinKind, JoinRelationOp, ValuesOp};
    use crate::scalar::CompareOp;

    #[test]
    fn equi_join_between_two_stream_relations_gets_a_key_pair_endpoint() {
        let factory = VariableFactory;
        let lk = factory.stream("lk");
        let rk = factory.stream("rk");

        let mut graph = RelGraph::new();
        let left = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![lk.clone()],
            rows: vec![],
        }));
        let right = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![rk.clone()],
            rows: vec![],
        }));
        let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
            JoinKind::Inner,
            vec![Scalar::Compare(
                CompareOp::Eq,
                Box::new(Scalar::var(lk.clone())),
                Box::new(Scalar::var(rk)),
            )],
        )));
        graph.connect(left, 0, join, 0).unwrap();
        graph.connect(right, 0, join, 1).unwrap();
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![lk] }));
        graph.connect(join, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(CatalogProvider::new());
        collect_join_keys(&mut graph, &options).unwrap();

        match graph.operator(join) {
            Operator::JoinRelation(j) => {
                assert!(j.has_endpoints());
                match &j.lower {
                    Some(e) => assert_eq!(e.keys.len(), 1),
                    None => panic!("expected a populated lower endpoint"),
                }
            }
            other => panic!("expected join_relation, got {other:?}"),
        }
    }

    #[test]
    fn full_outer_join_never_gets_endpoints() {
        let factory = VariableFactory;
        let lk = factory.stream("lk");
        let rk = factory.stream("rk");

        let mut graph = RelGraph::new();
        let left = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![lk.clone()],
            rows: vec![],
        }));
        let right = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![rk.clone()],
            rows: vec![],
        }));
        let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
            JoinKind::FullOuter,
            vec![Scalar::Compare(
                CompareOp::Eq,
                Box::new(Scalar::var(lk.clone())),
                Box::new(Scalar::var(rk)),
            )],
        )));
        graph.connect(left, 0, join, 0).unwrap();
        graph.connect(right, 0, join, 1).unwrap();
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![lk] }));
        graph.connect(join, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(CatalogProvider::new());
        collect_join_keys(&mut graph, &options).unwrap();

        match graph.operator(join) {
            Operator::JoinRelation(j) => assert!(!j.has_endpoints()),
            other => panic!("expected join_relation, got {other:?}"),
        }
    }
}
