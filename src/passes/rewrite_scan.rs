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

//! Rewrite scan (`spec.md` §4.B.4): collects the predicate absorbed by a bare scan's
//! downstream filter chain into per-key search terms, then asks the index estimator
//! whether some other index on the table beats the one the scan currently targets.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{Column, Index};
use crate::endpoint::build_endpoints;
use crate::error::Result;
use crate::estimator::{CandidateSearchKey, EstimateResult, IndexAttribute};
use crate::keyterm::{SearchKeyTerm, SearchKeyTermBuilder};
use crate::options::OptimizerOptions;
use crate::relational::op::{ColumnMapping, FindOp};
use crate::relational::{NodeIndex, Operator, RelGraph};

pub(crate) fn candidate_search_key(
    builder: &mut SearchKeyTermBuilder,
    index: &Arc<Index>,
    columns: &[ColumnMapping],
) -> (CandidateSearchKey, Vec<(Arc<Column>, SearchKeyTerm)>) {
    let mut terms = Vec::new();
    for key in &index.keys {
        let Some(mapping) = columns.iter().find(|c| Arc::ptr_eq(&c.column, &key.column)) else {
            break;
        };
        match builder.find(&mapping.variable) {
            Some(term) if term.equivalent() => terms.push((Arc::clone(&key.column), term.clone())),
            Some(term) if term.full_bounded() || term.half_bounded() => {
                terms.push((Arc::clone(&key.column), term.clone()));
                break;
            }
            _ => break,
        }
    }
    let has_range_suffix = terms.last().is_some_and(|(_, t)| !t.equivalent());
    let equivalent_prefix_len = if has_range_suffix {
        terms.len() - 1
    } else {
        terms.len()
    };
    (
        CandidateSearchKey {
            equivalent_prefix_len,
            has_range_suffix,
        },
        terms,
    )
}

fn rewrite_one(graph: &mut RelGraph, options: &OptimizerOptions, scan_node: NodeIndex) -> Result<()> {
    let (table_index, columns) = match graph.operator(scan_node) {
        Operator::Scan(s) => (Arc::clone(&s.index), s.columns.clone()),
        _ => return Ok(()),
    };

    let keys_set: HashSet<_> = columns.iter().map(|c| c.variable.clone()).collect();
    let mut builder = SearchKeyTermBuilder::new();
    let mut cursor = graph.output_opposite(scan_node, 0);
    while let Some(port) = cursor {
        match graph.operator(port.node) {
            Operator::Filter(f) => {
                builder.add_filter(port.node, &f.conjuncts, &keys_set)?;
                cursor = graph.output_opposite(port.node, 0);
            }
            _ => break,
        }
    }

    let mut best: Option<(Arc<Index>, Vec<(Arc<Column>, SearchKeyTerm)>, EstimateResult)> = None;
    for index in options.storage_provider.indices_on(&table_index.table) {
        let (candidate, terms) = candidate_search_key(&mut builder, &index, &columns);
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

    let Some((index, terms, result)) = best else {
        return Ok(());
    };

    if result.attributes.contains(IndexAttribute::Find) {
        let mut keys = Vec::new();
        for (column, term) in &terms {
            match term.purge_equivalent_factor(graph) {
                Some(factor) => keys.push((Arc::clone(column), factor)),
                None => break,
            }
        }
        let find_node = graph.add_operator(Operator::Find(FindOp {
            index,
            keys,
            columns: columns.clone(),
        }));
        if let Some(downstream) = graph.output_opposite(scan_node, 0) {
            graph.disconnect_output(scan_node, 0);
            graph.disconnect_input(downstream.node, downstream.index);
            graph.connect(find_node, 0, downstream.node, downstream.index)?;
        }
        graph.remove_operator(scan_node);
    } else {
        let (lower, upper) = build_endpoints(graph, &terms)?;
        if let Operator::Scan(s) = graph.operator_mut(scan_node) {
            s.index = index;
            s.lower = lower;
            s.upper = upper;
        }
    }

    Ok(())
}

pub fn rewrite_scan(graph: &mut RelGraph, options: &OptimizerOptions) -> Result<()> {
    let candidates: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| matches!(graph.operator(n), Operator::Scan(s) if s.limit.is_none() && !s.has_endpoints()))
        .collect();
    for scan_node in candidates {
        rewrite_one(graph, options, scan_node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::catalog::{CatalogProvider, DataType, IndexFeature, IndexFeatures, IndexKeyElement, SortDirection, Table};
    use crate::endpoint::Endpoint;
    use crate::relational::op::{EmitOp, FilterOp, ScanOp};
    use crate::scalar::{CompareOp, Scalar, ScalarValue};

    #[test]
    fn range_predicate_retargets_scan_to_a_range_capable_index() {
        let table = Table::new(
            "t0",
            vec![
                Column::new("c0", DataType::new("int")),
                Column::new("c1", DataType::new("int")),
            ],
        );
        let col0 = Arc::clone(&table.columns[0]);
        let col1 = Arc::clone(&table.columns[1]);

        let primary = Arc::new(Index {
            name: "i0".into(),
            table: Arc::clone(&table),
            keys: vec![IndexKeyElement {
                column: Arc::clone(&col0),
                direction: SortDirection::Ascending,
            }],
            values: vec![Arc::clone(&col1)],
            features: IndexFeatures::from_iter([
                IndexFeature::Primary,
                IndexFeature::Find,
                IndexFeature::Unique,
            ]),
        });
        let secondary = Arc::new(Index {
            name: "x0".into(),
            table: Arc::clone(&table),
            keys: vec![IndexKeyElement {
                column: Arc::clone(&col0),
                direction: SortDirection::Ascending,
            }],
            values: vec![],
            features: IndexFeatures::from_iter([IndexFeature::Scan]),
        });

        let provider = CatalogProvider::new();
        provider.add_table(Arc::clone(&table), false).unwrap();
        provider.add_index(Arc::clone(&primary), false).unwrap();
        provider.add_index(Arc::clone(&secondary), false).unwrap();

        let factory = VariableFactory;
        let c0_var = factory.stream("c0");
        let c1_var = factory.stream("c1");

        let mut graph = RelGraph::new();
        let scan = graph.add_operator(Operator::Scan(ScanOp {
            index: Arc::clone(&primary),
            columns: vec![
                ColumnMapping {
                    column: Arc::clone(&col0),
                    variable: c0_var.clone(),
                },
                ColumnMapping {
                    column: Arc::clone(&col1),
                    variable: c1_var.clone(),
                },
            ],
            lower: Endpoint::unbound(),
            upper: Endpoint::unbound(),
            limit: None,
        }));
        let condition = Scalar::and(
            Scalar::Compare(
                CompareOp::Ge,
                Box::new(Scalar::var(c0_var.clone())),
                Box::new(Scalar::Immediate(ScalarValue::Int64(0))),
            ),
            Scalar::Compare(
                CompareOp::Lt,
                Box::new(Scalar::var(c0_var.clone())),
                Box::new(Scalar::Immediate(ScalarValue::Int64(100))),
            ),
        );
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
        let emit = graph.add_operator(Operator::Emit(EmitOp {
            columns: vec![c0_var],
        }));
        graph.connect(scan, 0, filter, 0).unwrap();
        graph.connect(filter, 0, emit, 0).unwrap();

        let options = OptimizerOptions::new(provider);
        rewrite_scan(&mut graph, &options).unwrap();

        match graph.operator(scan) {
            Operator::Scan(s) => {
                assert_eq!(s.index.name, "x0");
                assert!(s.has_endpoints());
                match &s.lower.kind {
                    crate::endpoint::EndpointKind::PrefixedInclusive(keys) => {
                        assert_eq!(keys.len(), 1);
                        assert!(Arc::ptr_eq(&keys[0].0, &col0));
                        assert_eq!(keys[0].1, Scalar::Immediate(ScalarValue::Int64(0)));
                    }
                    other => panic!("expected lower=prefixed_inclusive[c0=0], got {other:?}"),
                }
                match &s.upper.kind {
                    crate::endpoint::EndpointKind::PrefixedExclusive(keys) => {
                        assert_eq!(keys.len(), 1);
                        assert!(Arc::ptr_eq(&keys[0].0, &col0));
                        assert_eq!(keys[0].1, Scalar::Immediate(ScalarValue::Int64(100)));
                    }
                    other => panic!("expected upper=prefixed_exclusive[c0=100], got {other:?}"),
                }
            }
            other => panic!("expected scan to remain (retargeted), got {other:?}"),
        }
    }
}
