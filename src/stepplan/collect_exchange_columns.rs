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

//! Collect exchange columns (`spec.md` §4.D.4): a sort-from-upstream walk over the
//! step graph's topological order. Every `process` step is a single linear chain by
//! now (`collect_exchange_steps` already collapsed every fan-in operator behind a
//! `take_cogroup`), so walking it is just a pass over `RelGraph::topological_order`
//! carrying an "available columns" buffer. Each exchange step, visited right after the
//! processes that produce into it, turns the columns its `offer`s allocated into its
//! own declared column/group-key/sort-key lists.

use crate::binding::VariableRef;
use crate::error::{Error, Result};
use crate::relational::op::JoinKind;
use crate::relational::{NodeIndex, Operator, RelGraph};
use crate::stepplan::{AggregateStep, ExchangeColumnInfoMap, ExchangeId, GroupStep, Step, StepGraph};

/// If `node`'s single input comes straight off a `take_cogroup`, the length of its
/// first group's column list — the split point `step-join`/`*_group` shrink to for
/// semi/anti joins and set-difference operators (`spec.md` §4.D.4).
fn preceding_cogroup_split(graph: &RelGraph, node: NodeIndex) -> Option<usize> {
    let pred = graph.input_opposite(node, 0)?;
    match graph.operator(pred.node) {
        Operator::TakeCogroup(t) => t.groups.first().map(|side| side.columns.len()),
        _ => None,
    }
}

fn collect_process_columns(graph: &mut RelGraph, info_map: &mut ExchangeColumnInfoMap) -> Result<()> {
    let mut available: Vec<VariableRef> = Vec::new();

    for node in graph.topological_order() {
        let split = preceding_cogroup_split(graph, node);

        match graph.operator_mut(node) {
            Operator::Find(f) => {
                if !available.is_empty() {
                    return Err(Error::inconsistent("find reached with a non-empty column buffer"));
                }
                available.extend(f.columns.iter().map(|c| c.variable.clone()));
            }
            Operator::Scan(s) => {
                if !available.is_empty() {
                    return Err(Error::inconsistent("scan reached with a non-empty column buffer"));
                }
                available.extend(s.columns.iter().map(|c| c.variable.clone()));
            }
            Operator::Values(v) => {
                available.extend(v.columns.iter().cloned());
            }
            Operator::Project(p) => {
                available.extend(p.columns.iter().map(|(v, _)| v.clone()));
            }
            Operator::Filter(_) | Operator::Buffer(_) | Operator::Flatten(_) => {}
            Operator::Identify(i) => {
                available.push(i.variable.clone());
            }
            Operator::JoinBroadcast(j) => {
                if !matches!(j.kind, JoinKind::Semi | JoinKind::Anti) {
                    if let Some(info) = info_map.get(j.exchange) {
                        available.extend(info.pairs().iter().map(|(origin, _)| origin.clone()));
                    }
                }
            }
            Operator::JoinGroup(j) => {
                if matches!(j.kind, JoinKind::Semi | JoinKind::Anti) {
                    if let Some(len) = split {
                        available.truncate(len);
                    }
                }
            }
            Operator::AggregateGroup(a) => {
                available.retain(|v| a.group_keys.contains(v));
                available.extend(a.aggregations.iter().map(|c| c.destination.clone()));
            }
            Operator::IntersectionGroup(_) | Operator::DifferenceGroup(_) => {
                if let Some(len) = split {
                    available.truncate(len);
                }
            }
            Operator::Escape(e) => {
                available = e.mappings.iter().map(|(_, dst)| dst.clone()).collect();
            }
            Operator::Emit(_) | Operator::Write(_) => {
                available.clear();
            }
            Operator::TakeFlat(t) => {
                let info = info_map.entry(t.exchange);
                t.columns = info.pairs().iter().map(|(origin, _)| origin.clone()).collect();
                available = t.columns.clone();
            }
            Operator::TakeGroup(t) => {
                let info = info_map.entry(t.exchange);
                t.columns = info.pairs().iter().map(|(origin, _)| origin.clone()).collect();
                available = t.columns.clone();
            }
            Operator::TakeCogroup(t) => {
                available.clear();
                for side in t.groups.iter_mut() {
                    let info = info_map.entry(side.exchange);
                    side.columns = info.pairs().iter().map(|(origin, _)| origin.clone()).collect();
                    available.extend(side.columns.iter().cloned());
                }
            }
            Operator::Offer(o) => {
                let info = info_map.entry(o.exchange);
                if o.columns.is_empty() {
                    o.columns = available.iter().map(|v| (v.clone(), info.allocate(v))).collect();
                } else {
                    for (_, destination) in o.columns.iter_mut() {
                        *destination = info.allocate(destination);
                    }
                }
                available.clear();
            }
            // join_relation/aggregate_relation/distinct_relation/limit_relation/union/
            // intersection/difference never survive `collect_exchange_steps`.
            _ => {}
        }
    }

    Ok(())
}

/// `forward`/`broadcast` (`spec.md` §4.D.4): if nothing declared columns yet, take them
/// straight from the exchange's allocated pairs; otherwise the existing list names the
/// desired column order by origin variable, so re-derive the info from it.
fn fill_forward_like(id: ExchangeId, columns: &mut Vec<VariableRef>, info_map: &mut ExchangeColumnInfoMap) {
    let info = info_map.entry(id);
    if columns.is_empty() {
        *columns = info.pairs().iter().map(|(_, col)| col.clone()).collect();
        return;
    }
    let declared_origins = std::mem::take(columns);
    for origin in &declared_origins {
        info.allocate(origin);
    }
    *columns = info.pairs().iter().map(|(_, col)| col.clone()).collect();
}

fn fill_group(id: ExchangeId, step: &mut GroupStep, info_map: &mut ExchangeColumnInfoMap) -> Result<()> {
    fill_forward_like(id, &mut step.columns, info_map);
    let info = info_map
        .get(id)
        .ok_or_else(|| Error::inconsistent("group exchange missing its column info"))?;

    let mut group_keys = Vec::with_capacity(step.group_keys.len());
    for key in &step.group_keys {
        let column = info
            .exchange_column_for(key)
            .ok_or_else(|| Error::inconsistent(format!("no exchange column for group key {key}")))?;
        group_keys.push(column);
    }

    let mut sort_keys = Vec::with_capacity(step.sort_keys.len());
    for (key, direction) in &step.sort_keys {
        let column = info
            .exchange_column_for(key)
            .ok_or_else(|| Error::inconsistent(format!("no exchange column for sort key {key}")))?;
        sort_keys.push((column, *direction));
    }

    step.group_keys = group_keys;
    step.sort_keys = sort_keys;
    Ok(())
}

/// `aggregate` (`spec.md` §4.D.4): the upstream `offer` swept in every stream variable
/// visible at that point, not just what the aggregation needs — rebuild the info so
/// only group keys and aggregation destinations remain visible downstream.
fn fill_aggregate(id: ExchangeId, step: &mut AggregateStep, info_map: &mut ExchangeColumnInfoMap) -> Result<()> {
    let info = info_map.entry(id);

    let mut rebuilt = Vec::with_capacity(step.group_keys.len() + step.aggregations.len());
    let mut group_keys = Vec::with_capacity(step.group_keys.len());
    for key in &step.group_keys {
        let column = info
            .exchange_column_for(key)
            .ok_or_else(|| Error::inconsistent(format!("aggregate exchange missing group key {key}")))?;
        rebuilt.push((key.clone(), column.clone()));
        group_keys.push(column);
    }

    let mut aggregations = Vec::with_capacity(step.aggregations.len());
    for aggregation in &step.aggregations {
        let mut arguments = Vec::with_capacity(aggregation.arguments.len());
        for argument in &aggregation.arguments {
            let column = info
                .exchange_column_for(argument)
                .ok_or_else(|| Error::inconsistent(format!("aggregate exchange missing argument {argument}")))?;
            arguments.push(column);
        }
        let destination = info.allocate(&aggregation.destination);
        rebuilt.push((aggregation.destination.clone(), destination.clone()));
        aggregations.push(crate::relational::op::AggregateColumn {
            destination,
            function: aggregation.function,
            arguments,
        });
    }

    info.replace_pairs(rebuilt);
    step.group_keys = group_keys;
    step.aggregations = aggregations;
    step.columns = info.pairs().iter().map(|(_, col)| col.clone()).collect();
    Ok(())
}

pub fn collect_exchange_columns(step_graph: &mut StepGraph) -> Result<ExchangeColumnInfoMap> {
    let mut info_map = ExchangeColumnInfoMap::new();

    for step_id in step_graph.topological_order() {
        match step_graph.step_mut(step_id) {
            Step::Process(process) => collect_process_columns(&mut process.graph, &mut info_map)?,
            Step::Forward(f) => fill_forward_like(step_id, &mut f.columns, &mut info_map),
            Step::Broadcast(b) => fill_forward_like(step_id, &mut b.columns, &mut info_map),
            Step::Group(g) => fill_group(step_id, g, &mut info_map)?,
            Step::Aggregate(a) => fill_aggregate(step_id, a, &mut info_map)?,
            Step::Discard(_) => {}
        }
    }

    Ok(info_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{EmitOp, OfferOp, TakeFlatOp, ValuesOp};
    use crate::relational::RelGraph;
    use crate::stepplan::{ForwardStep, ProcessStep};

    #[test]
    fn forward_exchange_inherits_columns_from_its_offer() {
        let factory = VariableFactory;
        let a = factory.stream("a");

        let mut step_graph = StepGraph::new();
        let exchange = step_graph.add_step(Step::Forward(ForwardStep { columns: vec![], limit: None }));

        let mut producer = RelGraph::new();
        let values = producer.add_operator(Operator::Values(ValuesOp { columns: vec![a.clone()], rows: vec![] }));
        let offer = producer.add_operator(Operator::Offer(OfferOp { exchange, columns: vec![] }));
        producer.connect(values, 0, offer, 0).unwrap();
        let producer_id = step_graph.add_step(Step::Process(ProcessStep { graph: producer }));
        step_graph.link(producer_id, exchange, crate::stepplan::StepLinkKind::Produces);

        let mut consumer = RelGraph::new();
        let take = consumer.add_operator(Operator::TakeFlat(TakeFlatOp { exchange, columns: vec![] }));
        let emit = consumer.add_operator(Operator::Emit(EmitOp { columns: vec![] }));
        consumer.connect(take, 0, emit, 0).unwrap();
        let consumer_id = step_graph.add_step(Step::Process(ProcessStep { graph: consumer }));
        step_graph.link(consumer_id, exchange, crate::stepplan::StepLinkKind::Consumes);

        collect_exchange_columns(&mut step_graph).unwrap();

        match step_graph.step(exchange) {
            Step::Forward(f) => assert_eq!(f.columns.len(), 1),
            other => panic!("expected forward step, got {other:?}"),
        }
        match step_graph.step(consumer_id) {
            Step::Process(p) => match p.graph.operator(take) {
                Operator::TakeFlat(t) => assert_eq!(t.columns.len(), 1),
                other => panic!("expected take_flat, got {other:?}"),
            },
            other => panic!("expected process step, got {other:?}"),
        }
    }
}
