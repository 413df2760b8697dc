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

//! Rewrite join (`spec.md` §4.B.5): turns a `join_relation` whose right (or, for inner
//! joins, left) input is a bare scan behind zero or more filters into a `join_find` or
//! `join_scan` that probes the index directly instead of materializing the whole side.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{Column, Index};
use crate::endpoint::build_endpoints;
use crate::error::Result;
use crate::estimator::{EstimateResult, IndexAttribute};
use crate::keyterm::{SearchKeyTerm, SearchKeyTermBuilder};
use crate::options::OptimizerOptions;
use crate::passes::rewrite_scan::candidate_search_key;
use crate::relational::op::{JoinFindOp, JoinKind, JoinRelationOp, JoinScanOp};
use crate::relational::{NodeIndex, Operator, RelGraph};
use crate::scalar::Scalar;

struct Attempt {
    scan_node: NodeIndex,
    filters: Vec<NodeIndex>,
    index: Arc<Index>,
    terms: Vec<(Arc<Column>, SearchKeyTerm)>,
    result: EstimateResult,
}

/// Walks upstream from `(start, start_index)` looking for a bare scan, optionally
/// passing through filters (`direct = false`). Returns the scan and the filters
/// absorbed along the way, nearest-to-the-join first.
fn walk_to_scan(graph: &RelGraph, start: NodeIndex, start_index: usize, direct: bool) -> Option<(NodeIndex, Vec<NodeIndex>)> {
    let mut absorbed = Vec::new();
    let mut current = graph.input_opposite(start, start_index)?;
    loop {
        match graph.operator(current.node) {
            Operator::Scan(_) => return Some((current.node, absorbed)),
            Operator::Filter(_) if !direct => {
                absorbed.push(current.node);
                current = graph.input_opposite(current.node, 0)?;
            }
            _ => return None,
        }
    }
}

fn try_side(
    graph: &RelGraph,
    options: &OptimizerOptions,
    join_node: NodeIndex,
    port_index: usize,
    direct: bool,
    join_condition: &[Scalar],
) -> Option<Attempt> {
    let (scan_node, filters) = walk_to_scan(graph, join_node, port_index, direct)?;
    let (table, columns) = match graph.operator(scan_node) {
        Operator::Scan(s) => (Arc::clone(&s.index.table), s.columns.clone()),
        _ => return None,
    };

    let keys_set: HashSet<_> = columns.iter().map(|c| c.variable.clone()).collect();
    let mut builder = SearchKeyTermBuilder::new();
    for &f in &filters {
        if let Operator::Filter(filter) = graph.operator(f) {
            builder.add_filter(f, &filter.conjuncts, &keys_set).ok()?;
        }
    }
    builder.add_join_condition(join_node, join_condition, &keys_set).ok()?;

    let mut best: Option<(Arc<Index>, Vec<(Arc<Column>, SearchKeyTerm)>, EstimateResult)> = None;
    for index in options.storage_provider.indices_on(&table) {
        let (candidate, terms) = candidate_search_key(&mut builder, &index, &columns);
        if terms.is_empty() {
            continue;
        }
        let Some(result) = options
            .index_estimator
            .estimate(&index, &candidate, &[], &keys_set)
        else {
            continue;
        };
        let better = match &best {
            Some((_, _, saved)) => result.better_than(saved),
            None => true,
        };
        if better {
            let short_circuits = result.short_circuits();
            best = Some((index, terms, result));
            if short_circuits {
                break;
            }
        }
    }

    best.map(|(index, terms, result)| Attempt {
        scan_node,
        filters,
        index,
        terms,
        result,
    })
}

pub(crate) fn swap_join_inputs(graph: &mut RelGraph, join_node: NodeIndex) -> Result<()> {
    let left = graph.input_opposite(join_node, 0);
    let right = graph.input_opposite(join_node, 1);
    graph.disconnect_input(join_node, 0);
    graph.disconnect_input(join_node, 1);
    if let Some(r) = right {
        graph.connect(r.node, r.index, join_node, 0)?;
    }
    if let Some(l) = left {
        graph.connect(l.node, l.index, join_node, 1)?;
    }
    Ok(())
}

fn merge_condition(graph: &RelGraph, join_node: NodeIndex, filters: &[NodeIndex]) -> Vec<Scalar> {
    let mut merged = match graph.operator(join_node) {
        Operator::JoinRelation(j) => j.condition.clone(),
        _ => Vec::new(),
    };
    for &f in filters {
        if let Operator::Filter(filter) = graph.operator(f) {
            merged.extend(filter.conjuncts.iter().cloned());
        }
    }
    merged
}

fn rewrite_one(graph: &mut RelGraph, options: &OptimizerOptions, join_node: NodeIndex) -> Result<()> {
    let (kind, condition) = match graph.operator(join_node) {
        Operator::JoinRelation(j) => (j.kind, j.condition.clone()),
        _ => return Ok(()),
    };

    let right_attempt = if kind.allows_scan_rewrite_on_right() {
        try_side(graph, options, join_node, 1, kind.direct_scan_lookup(), &condition)
    } else {
        None
    };
    let left_attempt = if kind.allows_scan_rewrite_on_left() {
        try_side(graph, options, join_node, 0, false, &condition)
    } else {
        None
    };

    let chosen = match (right_attempt, left_attempt) {
        (None, None) => None,
        (Some(r), None) => Some((false, r)),
        (None, Some(l)) => Some((true, l)),
        (Some(r), Some(l)) => {
            if r.result.better_than(&l.result) {
                Some((false, r))
            } else {
                Some((true, l))
            }
        }
    };

    let Some((is_left, attempt)) = chosen else {
        return Ok(());
    };

    if is_left {
        swap_join_inputs(graph, join_node)?;
    }

    let Attempt {
        scan_node,
        filters,
        index,
        terms,
        result,
    } = attempt;

    let columns = match graph.operator(scan_node) {
        Operator::Scan(s) => s.columns.clone(),
        _ => return Ok(()),
    };

    let new_operator = if result.attributes.contains(IndexAttribute::Find) {
        let mut keys = Vec::new();
        for (column, term) in &terms {
            match term.purge_equivalent_factor(graph) {
                Some(factor) => keys.push((Arc::clone(column), factor)),
                None => break,
            }
        }
        let condition = merge_condition(graph, join_node, &filters);
        Operator::JoinFind(JoinFindOp {
            kind,
            index,
            columns,
            keys,
            condition,
        })
    } else {
        let (lower, upper) = build_endpoints(graph, &terms)?;
        let condition = merge_condition(graph, join_node, &filters);
        Operator::JoinScan(JoinScanOp {
            kind,
            index,
            columns,
            lower,
            upper,
            condition,
        })
    };

    let left_input = graph.input_opposite(join_node, 0);
    let downstream = graph.output_opposite(join_node, 0);

    graph.remove_operator(join_node);
    graph.remove_operator(scan_node);
    for f in filters {
        graph.remove_operator(f);
    }

    let new_node = graph.add_operator(new_operator);
    if let Some(li) = left_input {
        graph.connect(li.node, li.index, new_node, 0)?;
    }
    if let Some(d) = downstream {
        graph.connect(new_node, 0, d.node, d.index)?;
    }

    Ok(())
}

pub fn rewrite_join(graph: &mut RelGraph, options: &OptimizerOptions) -> Result<()> {
    let candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| matches!(graph.operator(n), Operator::JoinRelation(j) if !j.has_endpoints()))
        .collect();
    for join_node in candidates {
        rewrite_one(graph, options, join_node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::catalog::{CatalogProvider, Column, DataType, IndexFeature, IndexFeatures, IndexKeyElement, SortDirection, Table};
    use crate::endpoint::Endpoint;
    use crate::relational::op::{ColumnMapping, EmitOp, FilterOp, ScanOp, ValuesOp};
    use crate::scalar::{CompareOp, ScalarValue};

    #[test]
    fn inner_join_against_a_unique_index_becomes_join_find() {
        let table = Table::new("t1", vec![Column::new("c0", DataType::new("int"))]);
        let col0 = Arc::clone(&table.columns[0]);
        let index = Arc::new(Index {
            name: "i0".into(),
            table: Arc::clone(&table),
            keys: vec![IndexKeyElement {
                column: Arc::clone(&col0),
                direction: SortDirection::Ascending,
            }],
            values: vec![],
            features: IndexFeatures::from_iter([
                IndexFeature::Primary,
                IndexFeature::Find,
                IndexFeature::Unique,
            ]),
        });

        let provider = CatalogProvider::new();
        provider.add_table(Arc::clone(&table), false).unwrap();
        provider.add_index(Arc::clone(&index), false).unwrap();

        let factory = VariableFactory;
        let lv = factory.stream("lv");
        let c0 = factory.stream("c0");

        let mut graph = RelGraph::new();
        let left = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![lv.clone()],
            rows: vec![],
        }));
        let scan = graph.add_operator(Operator::Scan(ScanOp {
            index: Arc::clone(&index),
            columns: vec![ColumnMapping {
                column: Arc::clone(&col0),
                variable: c0.clone(),
            }],
            lower: Endpoint::unbound(),
            upper: Endpoint::unbound(),
            limit: None,
        }));
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(Scalar::Compare(
            CompareOp::Gt,
            Box::new(Scalar::var(c0.clone())),
            Box::new(Scalar::Immediate(ScalarValue::Int64(0))),
        ))));
        graph.connect(scan, 0, filter, 0).unwrap();
        let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
            JoinKind::Inner,
            vec![Scalar::Compare(
                CompareOp::Eq,
                Box::new(Scalar::var(lv.clone())),
                Box::new(Scalar::var(c0)),
            )],
        )));
        graph.connect(left, 0, join, 0).unwrap();
        graph.connect(filter, 0, join, 1).unwrap();
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![lv] }));
        graph.connect(join, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(provider);
        rewrite_join(&mut graph, &options).unwrap();

        assert_eq!(graph.node_count(), 3);
        let new_node = graph.input_opposite(emit, 0).unwrap().node;
        match graph.operator(new_node) {
            Operator::JoinFind(j) => {
                assert_eq!(j.index.name, "i0");
                assert_eq!(j.keys.len(), 1);
                assert_eq!(j.condition.len(), 2);
            }
            other => panic!("expected join_find, got {other:?}"),
        }
        assert_eq!(graph.input_opposite(new_node, 0).map(|p| p.node), Some(left));
    }
}
