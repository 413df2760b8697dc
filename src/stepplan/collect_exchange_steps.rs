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

//! Collect exchange steps (`spec.md` §4.D.1): the step-plan builder's first phase.
//! Walks every intermediate-only operator and replaces it with the step-plan shape
//! that realizes it: exchange steps in the new `StepGraph`, plus `offer`/`take_*`
//! operators spliced into the source `RelGraph` in its place.

use std::collections::HashSet;

use crate::binding::VariableRef;
use crate::error::Result;
use crate::flow::flow_set;
use crate::options::{OptimizerOptions, RuntimeFeature};
use crate::relational::op::{
    CogroupSide, JoinBroadcastOp, JoinGroupOp, OfferOp, SetGroupOp, SetMapping, TakeCogroupOp,
    TakeFlatOp, TakeGroupOp,
};
use crate::relational::{NodeIndex, Operator, Port, RelGraph};
use crate::scalar::{CompareOp, Scalar};
use crate::stepplan::{AggregateStep, BroadcastStep, ExchangeId, ForwardStep, GroupStep, JoinStrategy, Step, StepGraph};

fn dedup_keys(keys: &[VariableRef]) -> Vec<VariableRef> {
    let mut seen = HashSet::new();
    keys.iter().filter(|k| seen.insert((*k).clone())).cloned().collect()
}

/// Finds `left = right` key pairs in a join condition: one stream variable from each
/// side, the keys a cogroup strategy partitions both exchanges by.
fn extract_cogroup_keys(
    condition: &[Scalar],
    left_vars: &HashSet<VariableRef>,
    right_vars: &HashSet<VariableRef>,
) -> Vec<(VariableRef, VariableRef)> {
    let mut pairs = Vec::new();
    for atom in condition {
        if let Scalar::Compare(CompareOp::Eq, lhs, rhs) = atom {
            if let (Scalar::VariableReference(a), Scalar::VariableReference(b)) = (lhs.as_ref(), rhs.as_ref()) {
                if left_vars.contains(a) && right_vars.contains(b) {
                    pairs.push((a.clone(), b.clone()));
                } else if left_vars.contains(b) && right_vars.contains(a) {
                    pairs.push((b.clone(), a.clone()));
                }
            }
        }
    }
    pairs
}

/// Disconnects whatever feeds `node`'s input `input_index` and wires an `offer` of
/// `exchange` in between instead.
fn splice_offer(graph: &mut RelGraph, node: NodeIndex, input_index: usize, exchange: ExchangeId) -> Result<()> {
    if let Some(upstream) = graph.input_opposite(node, input_index) {
        graph.disconnect_input(node, input_index);
        let offer = graph.add_operator(Operator::Offer(OfferOp {
            exchange,
            columns: Vec::new(),
        }));
        graph.connect(upstream.node, upstream.index, offer, 0)?;
    }
    Ok(())
}

fn reconnect_downstream(graph: &mut RelGraph, new_node: NodeIndex, downstream: Option<Port>) -> Result<()> {
    if let Some(d) = downstream {
        graph.connect(new_node, 0, d.node, d.index)?;
    }
    Ok(())
}

fn collect_join(
    graph: &mut RelGraph,
    step_graph: &mut StepGraph,
    options: &OptimizerOptions,
    node: NodeIndex,
) -> Result<()> {
    let (kind, condition, has_endpoints, lower, upper) = match graph.operator(node) {
        Operator::JoinRelation(j) => (
            j.kind,
            j.condition.clone(),
            j.has_endpoints(),
            j.lower.clone(),
            j.upper.clone(),
        ),
        _ => return Ok(()),
    };

    let hint = options.hints.join.get(&node).copied();
    let strategy = match hint {
        Some(s) => s,
        None => {
            let broadcast_enabled = options.runtime_features.is_enabled(RuntimeFeature::BroadcastExchange);
            if broadcast_enabled && has_endpoints {
                JoinStrategy::Broadcast
            } else {
                JoinStrategy::Cogroup
            }
        }
    };

    // Flow sets must be computed while the inputs are still connected.
    let left_vars = flow_set(graph, Port::input(node, 0));
    let right_vars = flow_set(graph, Port::input(node, 1));

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    match strategy {
        JoinStrategy::Cogroup => {
            let key_pairs = extract_cogroup_keys(&condition, &left_vars, &right_vars);
            let left_keys: Vec<VariableRef> = key_pairs.iter().map(|(l, _)| l.clone()).collect();
            let right_keys: Vec<VariableRef> = key_pairs.iter().map(|(_, r)| r.clone()).collect();

            let left_exchange = step_graph.add_step(Step::Group(GroupStep {
                columns: Vec::new(),
                group_keys: left_keys,
                sort_keys: Vec::new(),
                limit: None,
            }));
            let right_exchange = step_graph.add_step(Step::Group(GroupStep {
                columns: Vec::new(),
                group_keys: right_keys,
                sort_keys: Vec::new(),
                limit: None,
            }));

            splice_offer(graph, node, 0, left_exchange)?;
            splice_offer(graph, node, 1, right_exchange)?;
            graph.disconnect_input(node, 0);
            graph.disconnect_input(node, 1);

            let take = graph.add_operator(Operator::TakeCogroup(TakeCogroupOp {
                groups: vec![
                    CogroupSide { exchange: left_exchange, columns: Vec::new() },
                    CogroupSide { exchange: right_exchange, columns: Vec::new() },
                ],
            }));
            let join_group = graph.add_operator(Operator::JoinGroup(JoinGroupOp { kind, condition }));
            graph.connect(take, 0, join_group, 0)?;
            reconnect_downstream(graph, join_group, downstream)?;
        }
        JoinStrategy::Broadcast => {
            let broadcast_exchange = step_graph.add_step(Step::Broadcast(BroadcastStep { columns: Vec::new() }));
            splice_offer(graph, node, 1, broadcast_exchange)?;
            let left_input = graph.input_opposite(node, 0);
            graph.disconnect_input(node, 0);
            graph.disconnect_input(node, 1);

            let join_broadcast = graph.add_operator(Operator::JoinBroadcast(JoinBroadcastOp {
                kind,
                exchange: broadcast_exchange,
                lower: lower.unwrap_or_default(),
                upper: upper.unwrap_or_default(),
                condition,
            }));
            if let Some(li) = left_input {
                graph.connect(li.node, li.index, join_broadcast, 0)?;
            }
            reconnect_downstream(graph, join_broadcast, downstream)?;
        }
    }

    graph.remove_operator(node);
    Ok(())
}

fn collect_aggregate(
    graph: &mut RelGraph,
    step_graph: &mut StepGraph,
    options: &OptimizerOptions,
    node: NodeIndex,
) -> Result<()> {
    let (group_keys, aggregations) = match graph.operator(node) {
        Operator::AggregateRelation(a) => (dedup_keys(&a.group_keys), a.aggregations.clone()),
        _ => return Ok(()),
    };

    let use_aggregate_exchange = options
        .hints
        .aggregate_exchange
        .get(&node)
        .copied()
        .unwrap_or_else(|| options.runtime_features.is_enabled(RuntimeFeature::AggregateExchange));

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    if use_aggregate_exchange {
        let exchange = step_graph.add_step(Step::Aggregate(AggregateStep {
            columns: Vec::new(),
            group_keys,
            aggregations,
        }));
        splice_offer(graph, node, 0, exchange)?;
        graph.disconnect_input(node, 0);

        let take = graph.add_operator(Operator::TakeGroup(TakeGroupOp { exchange, columns: Vec::new() }));
        let flatten = graph.add_operator(Operator::Flatten(crate::relational::op::FlattenOp));
        graph.connect(take, 0, flatten, 0)?;
        reconnect_downstream(graph, flatten, downstream)?;
    } else {
        let exchange = step_graph.add_step(Step::Group(GroupStep {
            columns: Vec::new(),
            group_keys: group_keys.clone(),
            sort_keys: Vec::new(),
            limit: None,
        }));
        splice_offer(graph, node, 0, exchange)?;
        graph.disconnect_input(node, 0);

        let take = graph.add_operator(Operator::TakeGroup(TakeGroupOp { exchange, columns: Vec::new() }));
        let aggregate_group = graph.add_operator(Operator::AggregateGroup(crate::relational::op::AggregateGroupOp {
            group_keys,
            aggregations,
        }));
        graph.connect(take, 0, aggregate_group, 0)?;
        reconnect_downstream(graph, aggregate_group, downstream)?;
    }

    graph.remove_operator(node);
    Ok(())
}

fn collect_distinct(graph: &mut RelGraph, step_graph: &mut StepGraph, node: NodeIndex) -> Result<()> {
    let group_keys = match graph.operator(node) {
        Operator::DistinctRelation(d) => dedup_keys(&d.group_keys),
        _ => return Ok(()),
    };

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    let exchange = step_graph.add_step(Step::Group(GroupStep {
        columns: Vec::new(),
        group_keys,
        sort_keys: Vec::new(),
        limit: Some(1),
    }));
    splice_offer(graph, node, 0, exchange)?;
    graph.disconnect_input(node, 0);

    let take = graph.add_operator(Operator::TakeGroup(TakeGroupOp { exchange, columns: Vec::new() }));
    let flatten = graph.add_operator(Operator::Flatten(crate::relational::op::FlattenOp));
    graph.connect(take, 0, flatten, 0)?;
    reconnect_downstream(graph, flatten, downstream)?;

    graph.remove_operator(node);
    Ok(())
}

fn collect_limit(graph: &mut RelGraph, step_graph: &mut StepGraph, node: NodeIndex) -> Result<()> {
    let (group_keys, sort_keys, limit) = match graph.operator(node) {
        Operator::LimitRelation(l) => (dedup_keys(&l.group_keys), l.sort_keys.clone(), l.limit),
        _ => return Ok(()),
    };

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    if group_keys.is_empty() && sort_keys.is_empty() {
        let exchange = step_graph.add_step(Step::Forward(ForwardStep { columns: Vec::new(), limit: Some(limit) }));
        splice_offer(graph, node, 0, exchange)?;
        graph.disconnect_input(node, 0);

        let take = graph.add_operator(Operator::TakeFlat(TakeFlatOp { exchange, columns: Vec::new() }));
        reconnect_downstream(graph, take, downstream)?;
    } else {
        let exchange = step_graph.add_step(Step::Group(GroupStep {
            columns: Vec::new(),
            group_keys,
            sort_keys,
            limit: Some(limit),
        }));
        splice_offer(graph, node, 0, exchange)?;
        graph.disconnect_input(node, 0);

        let take = graph.add_operator(Operator::TakeGroup(TakeGroupOp { exchange, columns: Vec::new() }));
        let flatten = graph.add_operator(Operator::Flatten(crate::relational::op::FlattenOp));
        graph.connect(take, 0, flatten, 0)?;
        reconnect_downstream(graph, flatten, downstream)?;
    }

    graph.remove_operator(node);
    Ok(())
}

fn collect_union(graph: &mut RelGraph, step_graph: &mut StepGraph, node: NodeIndex) -> Result<()> {
    let (all, mappings) = match graph.operator(node) {
        Operator::Union(u) => (u.all, u.mappings.clone()),
        _ => return Ok(()),
    };

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    let left_columns: Vec<(VariableRef, VariableRef)> = mappings
        .iter()
        .filter_map(|m| m.left.clone().map(|l| (l, m.destination.clone())))
        .collect();
    let right_columns: Vec<(VariableRef, VariableRef)> = mappings
        .iter()
        .filter_map(|m| m.right.clone().map(|r| (r, m.destination.clone())))
        .collect();

    if all {
        let exchange = step_graph.add_step(Step::Forward(ForwardStep { columns: Vec::new(), limit: None }));
        splice_offer_with_columns(graph, node, 0, exchange, left_columns)?;
        splice_offer_with_columns(graph, node, 1, exchange, right_columns)?;
        graph.disconnect_input(node, 0);
        graph.disconnect_input(node, 1);

        let take = graph.add_operator(Operator::TakeFlat(TakeFlatOp { exchange, columns: Vec::new() }));
        reconnect_downstream(graph, take, downstream)?;
    } else {
        let group_keys = dedup_keys(&mappings.iter().map(|m| m.destination.clone()).collect::<Vec<_>>());
        let exchange = step_graph.add_step(Step::Group(GroupStep {
            columns: Vec::new(),
            group_keys,
            sort_keys: Vec::new(),
            limit: Some(1),
        }));
        splice_offer_with_columns(graph, node, 0, exchange, left_columns)?;
        splice_offer_with_columns(graph, node, 1, exchange, right_columns)?;
        graph.disconnect_input(node, 0);
        graph.disconnect_input(node, 1);

        let take = graph.add_operator(Operator::TakeGroup(TakeGroupOp { exchange, columns: Vec::new() }));
        let flatten = graph.add_operator(Operator::Flatten(crate::relational::op::FlattenOp));
        graph.connect(take, 0, flatten, 0)?;
        reconnect_downstream(graph, flatten, downstream)?;
    }

    graph.remove_operator(node);
    Ok(())
}

fn splice_offer_with_columns(
    graph: &mut RelGraph,
    node: NodeIndex,
    input_index: usize,
    exchange: ExchangeId,
    columns: Vec<(VariableRef, VariableRef)>,
) -> Result<()> {
    if let Some(upstream) = graph.input_opposite(node, input_index) {
        graph.disconnect_input(node, input_index);
        let offer = graph.add_operator(Operator::Offer(OfferOp { exchange, columns }));
        graph.connect(upstream.node, upstream.index, offer, 0)?;
    }
    Ok(())
}

fn collect_set(graph: &mut RelGraph, step_graph: &mut StepGraph, node: NodeIndex, is_intersection: bool) -> Result<()> {
    let (distinct, left_keys, right_keys) = match graph.operator(node) {
        Operator::Intersection(s) | Operator::Difference(s) => (s.distinct, s.left_keys.clone(), s.right_keys.clone()),
        _ => return Ok(()),
    };

    let downstream = graph.output_opposite(node, 0);
    graph.disconnect_output(node, 0);

    let limit = if distinct { Some(1) } else { None };
    let left_exchange = step_graph.add_step(Step::Group(GroupStep {
        columns: Vec::new(),
        group_keys: left_keys,
        sort_keys: Vec::new(),
        limit,
    }));
    let right_exchange = step_graph.add_step(Step::Group(GroupStep {
        columns: Vec::new(),
        group_keys: right_keys,
        sort_keys: Vec::new(),
        limit,
    }));

    splice_offer(graph, node, 0, left_exchange)?;
    splice_offer(graph, node, 1, right_exchange)?;
    graph.disconnect_input(node, 0);
    graph.disconnect_input(node, 1);

    let take = graph.add_operator(Operator::TakeCogroup(TakeCogroupOp {
        groups: vec![
            CogroupSide { exchange: left_exchange, columns: Vec::new() },
            CogroupSide { exchange: right_exchange, columns: Vec::new() },
        ],
    }));
    let set_group = if is_intersection {
        graph.add_operator(Operator::IntersectionGroup(SetGroupOp { distinct }))
    } else {
        graph.add_operator(Operator::DifferenceGroup(SetGroupOp { distinct }))
    };
    graph.connect(take, 0, set_group, 0)?;
    reconnect_downstream(graph, set_group, downstream)?;

    graph.remove_operator(node);
    Ok(())
}

pub fn collect_exchange_steps(graph: &mut RelGraph, step_graph: &mut StepGraph, options: &OptimizerOptions) -> Result<()> {
    let candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| graph.operator(n).is_intermediate_only())
        .collect();

    for node in candidates {
        match graph.operator(node) {
            Operator::JoinRelation(_) => collect_join(graph, step_graph, options, node)?,
            Operator::AggregateRelation(_) => collect_aggregate(graph, step_graph, options, node)?,
            Operator::DistinctRelation(_) => collect_distinct(graph, step_graph, node)?,
            Operator::LimitRelation(_) => collect_limit(graph, step_graph, node)?,
            Operator::Union(_) => collect_union(graph, step_graph, node)?,
            Operator::Intersection(_) => collect_set(graph, step_graph, node, true)?,
            Operator::Difference(_) => collect_set(graph, step_graph, node, false)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::catalog::CatalogProvider;
    use crate::relational::op::{EmitOp, JoinKind, JoinRelationOp, ValuesOp};
    use crate::scalar::Scalar;

    #[test]
    fn plain_equi_join_becomes_cogroup_take_and_join_group() {
        let factory = VariableFactory;
        let lk = factory.stream("lk");
        let rk = factory.stream("rk");

        let mut graph = RelGraph::new();
        let left = graph.add_operator(Operator::Values(ValuesOp { columns: vec![lk.clone()], rows: vec![] }));
        let right = graph.add_operator(Operator::Values(ValuesOp { columns: vec![rk.clone()], rows: vec![] }));
        let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
            JoinKind::Inner,
            vec![Scalar::Compare(CompareOp::Eq, Box::new(Scalar::var(lk.clone())), Box::new(Scalar::var(rk.clone())))],
        )));
        graph.connect(left, 0, join, 0).unwrap();
        graph.connect(right, 0, join, 1).unwrap();
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![lk] }));
        graph.connect(join, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(CatalogProvider::new());
        let mut step_graph = StepGraph::new();
        collect_exchange_steps(&mut graph, &mut step_graph, &options).unwrap();

        let take = graph.input_opposite(emit, 0).map(|p| p.node);
        // emit <- join_group <- take_cogroup
        let join_group_node = graph.input_opposite(graph.input_opposite(emit, 0).unwrap().node, 0);
        assert!(join_group_node.is_some());
        assert!(matches!(graph.operator(take.unwrap()), Operator::JoinGroup(_)));
    }
}
