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

//! End-to-end scenarios S1-S6 (`spec.md` §8), each run against the real pass pipeline
//! (or the specific pass(es) the scenario names) over a small shared catalog, not mocks.

use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use relplan_opt::binding::VariableFactory;
use relplan_opt::catalog::{
    CatalogProvider, Column, DataType, Index, IndexFeature, IndexFeatures, IndexKeyElement, SortDirection, Table,
};
use relplan_opt::endpoint::{Endpoint, EndpointKind};
use relplan_opt::options::OptimizerOptions;
use relplan_opt::passes;
use relplan_opt::relational::op::{
    ColumnMapping, EmitOp, FilterOp, FindOp, JoinKind, JoinRelationOp, ScanOp, ValuesOp,
};
use relplan_opt::relational::{Operator, RelGraph};
use relplan_opt::scalar::{CompareOp, Scalar, ScalarValue};
use relplan_opt::stepplan::{Step, StepPlanBuilder};

fn t0_with_primary_and_scan_secondary() -> (Arc<Table>, Arc<Index>, Arc<Index>) {
    let table = Table::new(
        "t0",
        vec![
            Column::new("c0", DataType::new("int")),
            Column::new("c1", DataType::new("int")),
            Column::new("c2", DataType::new("int")),
        ],
    );
    let col0 = Arc::clone(&table.columns[0]);
    let primary = Arc::new(Index {
        name: "i0".into(),
        table: Arc::clone(&table),
        keys: vec![IndexKeyElement {
            column: Arc::clone(&col0),
            direction: SortDirection::Ascending,
        }],
        values: vec![Arc::clone(&table.columns[1]), Arc::clone(&table.columns[2])],
        features: IndexFeatures::from_iter([IndexFeature::Primary, IndexFeature::Find, IndexFeature::Unique]),
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
    (table, primary, secondary)
}

/// S1 (range rewrite to index scan): `scan(I0, {C0->c0, C1->c1}) -> filter(0 <= c0 AND
/// c0 < 100) -> emit(c0)` retargets to `X0` with `lower=prefixed_inclusive[C0=0],
/// upper=prefixed_exclusive[C0=100]`, and once `remove_redundant_conditions` also runs
/// the now-empty filter disappears.
#[test]
fn s1_range_rewrite_to_index_scan() {
    let (table, primary, secondary) = t0_with_primary_and_scan_secondary();
    let col0 = Arc::clone(&table.columns[0]);
    let col1 = Arc::clone(&table.columns[1]);

    let provider = CatalogProvider::new();
    provider.add_table(Arc::clone(&table), false).unwrap();
    provider.add_index(Arc::clone(&primary), false).unwrap();
    provider.add_index(Arc::clone(&secondary), false).unwrap();

    let factory = VariableFactory;
    let c0 = factory.stream("c0");
    let c1 = factory.stream("c1");

    let mut graph = RelGraph::new();
    let scan = graph.add_operator(Operator::Scan(ScanOp {
        index: Arc::clone(&primary),
        columns: vec![
            ColumnMapping { column: Arc::clone(&col0), variable: c0.clone() },
            ColumnMapping { column: Arc::clone(&col1), variable: c1.clone() },
        ],
        lower: Endpoint::unbound(),
        upper: Endpoint::unbound(),
        limit: None,
    }));
    let condition = Scalar::and(
        Scalar::Compare(
            CompareOp::Ge,
            Box::new(Scalar::var(c0.clone())),
            Box::new(Scalar::Immediate(ScalarValue::Int64(0))),
        ),
        Scalar::Compare(
            CompareOp::Lt,
            Box::new(Scalar::var(c0.clone())),
            Box::new(Scalar::Immediate(ScalarValue::Int64(100))),
        ),
    );
    let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
    let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![c0] }));
    graph.connect(scan, 0, filter, 0).unwrap();
    graph.connect(filter, 0, emit, 0).unwrap();

    let options = OptimizerOptions::new(provider);
    passes::rewrite_scan(&mut graph, &options).unwrap();

    match graph.operator(scan) {
        Operator::Scan(s) => {
            assert_eq!(s.index.name, "x0");
            assert_matches!(&s.lower.kind, EndpointKind::PrefixedInclusive(keys) if keys.len() == 1
                && Arc::ptr_eq(&keys[0].0, &col0)
                && keys[0].1 == Scalar::Immediate(ScalarValue::Int64(0)));
            assert_matches!(&s.upper.kind, EndpointKind::PrefixedExclusive(keys) if keys.len() == 1
                && Arc::ptr_eq(&keys[0].0, &col0)
                && keys[0].1 == Scalar::Immediate(ScalarValue::Int64(100)));
        }
        other => panic!("expected scan to remain (retargeted), got {other:?}"),
    }
    // the atoms absorbed into the endpoint were turned into `true` in place, not
    // removed, so the filter still exists with nothing left to check.
    match graph.operator(filter) {
        Operator::Filter(f) => assert!(f.conjuncts.iter().all(Scalar::is_true_literal)),
        other => panic!("expected filter to remain with no live conjuncts, got {other:?}"),
    }

    passes::remove_redundant_conditions(&mut graph).unwrap();
    assert_eq!(graph.input_opposite(emit, 0).map(|p| p.node), Some(scan));
    assert!(!matches!(graph.operator(graph.input_opposite(emit, 0).unwrap().node), Operator::Filter(_)));
}

/// S2 (point rewrite to find): with a unique index `Xu` on `(C0)` also declared, `scan(I0,
/// ...) -> filter(c0 = 0) -> emit(c0)` rewrites directly to `find(Xu, keys=[C0=0],
/// cols={C0->c0, C1->c1})`.
#[test]
fn s2_point_rewrite_to_find() {
    let table = Table::new(
        "t0",
        vec![Column::new("c0", DataType::new("int")), Column::new("c1", DataType::new("int"))],
    );
    let col0 = Arc::clone(&table.columns[0]);
    let col1 = Arc::clone(&table.columns[1]);

    let primary = Arc::new(Index {
        name: "i0".into(),
        table: Arc::clone(&table),
        keys: vec![IndexKeyElement { column: Arc::clone(&col0), direction: SortDirection::Ascending }],
        values: vec![Arc::clone(&col1)],
        features: IndexFeatures::from_iter([IndexFeature::Primary, IndexFeature::Scan]),
    });
    let unique = Arc::new(Index {
        name: "xu".into(),
        table: Arc::clone(&table),
        keys: vec![IndexKeyElement { column: Arc::clone(&col0), direction: SortDirection::Ascending }],
        values: vec![Arc::clone(&col1)],
        features: IndexFeatures::from_iter([IndexFeature::Find, IndexFeature::Unique]),
    });

    let provider = CatalogProvider::new();
    provider.add_table(Arc::clone(&table), false).unwrap();
    provider.add_index(Arc::clone(&primary), false).unwrap();
    provider.add_index(Arc::clone(&unique), false).unwrap();

    let factory = VariableFactory;
    let c0 = factory.stream("c0");
    let c1 = factory.stream("c1");

    let mut graph = RelGraph::new();
    let scan = graph.add_operator(Operator::Scan(ScanOp {
        index: Arc::clone(&primary),
        columns: vec![
            ColumnMapping { column: Arc::clone(&col0), variable: c0.clone() },
            ColumnMapping { column: Arc::clone(&col1), variable: c1.clone() },
        ],
        lower: Endpoint::unbound(),
        upper: Endpoint::unbound(),
        limit: None,
    }));
    let condition = Scalar::Compare(
        CompareOp::Eq,
        Box::new(Scalar::var(c0.clone())),
        Box::new(Scalar::Immediate(ScalarValue::Int64(0))),
    );
    let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
    let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![c0] }));
    graph.connect(scan, 0, filter, 0).unwrap();
    graph.connect(filter, 0, emit, 0).unwrap();

    let options = OptimizerOptions::new(provider);
    passes::rewrite_scan(&mut graph, &options).unwrap();

    assert!(!graph.node_indices().any(|n| matches!(graph.operator(n), Operator::Scan(_))));
    let find_node = graph
        .node_indices()
        .find(|&n| matches!(graph.operator(n), Operator::Find(_)))
        .expect("scan should have rewritten to a find");
    match graph.operator(find_node) {
        Operator::Find(FindOp { index, keys, columns }) => {
            assert_eq!(index.name, "xu");
            assert_eq!(keys.len(), 1);
            assert!(Arc::ptr_eq(&keys[0].0, &col0));
            assert_eq!(keys[0].1, Scalar::Immediate(ScalarValue::Int64(0)));
            assert_eq!(columns.len(), 2);
        }
        other => unreachable!("{other:?}"),
    }
}

/// S3 (cogroup join): a plain equi-join between two stream relations lowers, via the
/// full step-plan builder, to two `Group` exchanges (one per side) feeding a third
/// process whose sub-graph is `take_cogroup -> join_group -> emit`.
#[test]
fn s3_cogroup_join() {
    let factory = VariableFactory;
    let cl0 = factory.stream("cl0");
    let cl1 = factory.stream("cl1");
    let cr0 = factory.stream("cr0");
    let cr1 = factory.stream("cr1");

    let mut graph = RelGraph::new();
    let left = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cl0.clone(), cl1.clone()], rows: vec![] }));
    let right = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cr0.clone(), cr1.clone()], rows: vec![] }));
    let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
        JoinKind::Inner,
        vec![Scalar::Compare(CompareOp::Eq, Box::new(Scalar::var(cl0)), Box::new(Scalar::var(cr0)))],
    )));
    graph.connect(left, 0, join, 0).unwrap();
    graph.connect(right, 0, join, 1).unwrap();
    let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![cl1, cr1] }));
    graph.connect(join, 0, emit, 0).unwrap();

    let options = OptimizerOptions::new(CatalogProvider::new());
    let step_graph = StepPlanBuilder::new(&options).build(graph).unwrap();

    let group_exchanges: Vec<_> = step_graph
        .node_indices()
        .filter(|&id| matches!(step_graph.step(id), Step::Group(g) if g.group_keys.len() == 1))
        .collect();
    assert_eq!(group_exchanges.len(), 2, "expected one group exchange per join side");

    let processes: Vec<_> = step_graph.node_indices().filter(|&id| step_graph.step(id).as_process().is_some()).collect();
    assert_eq!(processes.len(), 3, "two source processes plus the cogroup-join process");

    let cogroup_process = processes
        .iter()
        .copied()
        .find(|&id| {
            step_graph
                .step(id)
                .as_process()
                .unwrap()
                .graph
                .node_indices()
                .any(|n| matches!(step_graph.step(id).as_process().unwrap().graph.operator(n), Operator::TakeCogroup(_)))
        })
        .expect("expected a process containing take_cogroup");

    let process = step_graph.step(cogroup_process).as_process().unwrap();
    let take = process.graph.node_indices().find(|&n| matches!(process.graph.operator(n), Operator::TakeCogroup(_))).unwrap();
    let join_group = process.graph.output_opposite(take, 0).map(|p| p.node);
    assert_matches!(join_group.map(|n| process.graph.operator(n)), Some(Operator::JoinGroup(_)));
    let emit_node = join_group.and_then(|jg| process.graph.output_opposite(jg, 0)).map(|p| p.node);
    assert_matches!(emit_node.map(|n| process.graph.operator(n)), Some(Operator::Emit(_)));

    let upstream = step_graph.upstream_exchanges(cogroup_process);
    assert_eq!(upstream.len(), 2);
    assert!(upstream.iter().all(|e| group_exchanges.contains(e)));
}

/// S4 (full_outer forbids broadcast): `available_join_strategies` for a `full_outer`
/// join never includes broadcast, and `collect_join_keys` — consulting exactly that
/// function — leaves such a join's residual condition untouched rather than collecting
/// endpoints it could never probe with.
#[test]
fn s4_full_outer_forbids_broadcast() {
    use relplan_opt::stepplan::{available_join_strategies, EndpointStyle, JoinStrategy};

    let strategies = available_join_strategies(JoinKind::FullOuter, EndpointStyle { has_prefix_or_key_pair: false });
    assert_eq!(strategies, vec![JoinStrategy::Cogroup]);

    let factory = VariableFactory;
    let cl0 = factory.stream("cl0");
    let cr0 = factory.stream("cr0");

    let mut graph = RelGraph::new();
    let left = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cl0.clone()], rows: vec![] }));
    let right = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cr0.clone()], rows: vec![] }));
    let condition = vec![Scalar::Compare(CompareOp::Eq, Box::new(Scalar::var(cl0.clone())), Box::new(Scalar::var(cr0)))];
    let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(JoinKind::FullOuter, condition.clone())));
    graph.connect(left, 0, join, 0).unwrap();
    graph.connect(right, 0, join, 1).unwrap();
    let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![cl0] }));
    graph.connect(join, 0, emit, 0).unwrap();

    let options = OptimizerOptions::new(CatalogProvider::new());
    passes::collect_join_keys(&mut graph, &options).unwrap();

    match graph.operator(join) {
        Operator::JoinRelation(j) => {
            assert!(!j.has_endpoints());
            assert_eq!(j.condition, condition, "the opposite-side atoms must survive untouched");
        }
        other => panic!("expected join_relation, got {other:?}"),
    }
}

/// S5 (predicate push-down through inner join): `filter(cl1 < 5 AND cr1 < 10)` above an
/// inner join splits across both sides; no filter remains between the join and `emit`.
#[test]
fn s5_predicate_push_down_through_inner_join() {
    let factory = VariableFactory;
    let cl0 = factory.stream("cl0");
    let cl1 = factory.stream("cl1");
    let cr0 = factory.stream("cr0");
    let cr1 = factory.stream("cr1");

    let mut graph = RelGraph::new();
    let left = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cl0.clone(), cl1.clone()], rows: vec![] }));
    let right = graph.add_operator(Operator::Values(ValuesOp { columns: vec![cr0.clone(), cr1.clone()], rows: vec![] }));
    let join = graph.add_operator(Operator::JoinRelation(JoinRelationOp::new(
        JoinKind::Inner,
        vec![Scalar::Compare(CompareOp::Eq, Box::new(Scalar::var(cl0.clone())), Box::new(Scalar::var(cr0.clone())))],
    )));
    graph.connect(left, 0, join, 0).unwrap();
    graph.connect(right, 0, join, 1).unwrap();
    let condition = Scalar::and(
        Scalar::Compare(CompareOp::Lt, Box::new(Scalar::var(cl1.clone())), Box::new(Scalar::Immediate(ScalarValue::Int64(5)))),
        Scalar::Compare(CompareOp::Lt, Box::new(Scalar::var(cr1)), Box::new(Scalar::Immediate(ScalarValue::Int64(10)))),
    );
    let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
    let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![cl0] }));
    graph.connect(join, 0, filter, 0).unwrap();
    graph.connect(filter, 0, emit, 0).unwrap();

    passes::push_down_selections(&mut graph).unwrap();

    // no filter survives directly between join and emit.
    assert_eq!(graph.input_opposite(emit, 0).map(|p| p.node), Some(join));

    let left_filter = graph.input_opposite(join, 0).map(|p| p.node);
    assert_matches!(left_filter.map(|n| graph.operator(n)), Some(Operator::Filter(f)) if f.conjuncts.len() == 1
        && f.conjuncts[0] == Scalar::Compare(CompareOp::Lt, Box::new(Scalar::var(cl1.clone())), Box::new(Scalar::Immediate(ScalarValue::Int64(5)))));
    assert_eq!(graph.input_opposite(left_filter.unwrap(), 0).map(|p| p.node), Some(left));

    let right_filter = graph.input_opposite(join, 1).map(|p| p.node);
    assert_matches!(right_filter.map(|n| graph.operator(n)), Some(Operator::Filter(_)));
    assert_eq!(graph.input_opposite(right_filter.unwrap(), 0).map(|p| p.node), Some(right));

    match graph.operator(join) {
        Operator::JoinRelation(j) => {
            assert_eq!(j.condition.len(), 1);
            assert_eq!(j.condition[0], Scalar::Compare(CompareOp::Eq, Box::new(Scalar::var(cl0)), Box::new(Scalar::var(cr0))));
        }
        other => panic!("expected join_relation, got {other:?}"),
    }
}

/// S6 (let inlining): `let x = c0 in x + x`, `c0` a stream variable, inlines via
/// `collect_local_variables` (with `always_inline=false`) to `c0 + c0`.
#[test]
fn s6_let_inlining() {
    let factory = VariableFactory;
    let c0 = factory.stream("c0");
    let x = factory.local("x");
    let condition = Scalar::Let {
        variable: x.clone(),
        value: Box::new(Scalar::var(c0.clone())),
        body: Box::new(Scalar::Binary(
            relplan_opt::scalar::BinaryOp::Add,
            Box::new(Scalar::var(x.clone())),
            Box::new(Scalar::var(x)),
        )),
    };

    let mut graph = RelGraph::new();
    let filter = graph.add_operator(Operator::Filter(FilterOp { conjuncts: vec![condition] }));

    passes::collect_local_variables(&mut graph, false).unwrap();

    match graph.operator(filter) {
        Operator::Filter(f) => assert_eq!(
            f.conjuncts[0],
            Scalar::Binary(relplan_opt::scalar::BinaryOp::Add, Box::new(Scalar::var(c0.clone())), Box::new(Scalar::var(c0))),
        ),
        other => panic!("expected filter, got {other:?}"),
    }
}
