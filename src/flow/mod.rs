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

//! Stream-variable flow tracing and per-edge volume estimates (`spec.md` §3.4).
//!
//! A query `find(graph, port, v)` walks upstream from an input port accumulating the
//! stream variables each operator declares, until either `v` turns up or an `escape`
//! operator is crossed (an `escape` renames variables, so it is a hard separator).

use std::collections::{HashMap, HashSet};

use crate::binding::VariableRef;
use crate::relational::{NodeIndex, Operator, Port, RelGraph};

/// Every stream variable an operator introduces on its own output — i.e. every
/// variable whose *originator* (`spec.md` §3.4) is this operator. Pass-through
/// operators (`filter`, `buffer`, `distinct_relation`, `limit_relation`, joins that
/// combine two sides without renaming) declare nothing of their own.
pub fn declared_variables(op: &Operator) -> Vec<VariableRef> {
    match op {
        Operator::Find(f) => f.columns.iter().map(|c| c.variable.clone()).collect(),
        Operator::Scan(s) => s.columns.iter().map(|c| c.variable.clone()).collect(),
        Operator::Values(v) => v.columns.clone(),
        Operator::Project(p) => p.columns.iter().map(|(v, _)| v.clone()).collect(),
        Operator::Identify(i) => vec![i.variable.clone()],
        Operator::JoinFind(j) => j.columns.iter().map(|c| c.variable.clone()).collect(),
        Operator::JoinScan(j) => j.columns.iter().map(|c| c.variable.clone()).collect(),
        Operator::AggregateRelation(a) => a
            .group_keys
            .iter()
            .cloned()
            .chain(a.aggregations.iter().map(|c| c.destination.clone()))
            .collect(),
        Operator::Union(u) => u.mappings.iter().map(|m| m.destination.clone()).collect(),
        // By convention the left side's group keys are the output identities for a
        // binary-group set operator (`spec.md` §9 open question, "the left side is by
        // convention the first group").
        Operator::Intersection(s) | Operator::Difference(s) => s.left_keys.clone(),
        Operator::Escape(e) => e.mappings.iter().map(|(_, dst)| dst.clone()).collect(),
        _ => Vec::new(),
    }
}

fn search(graph: &RelGraph, node: NodeIndex, var: &VariableRef) -> Option<NodeIndex> {
    let op = graph.operator(node);
    if declared_variables(op).iter().any(|v| v == var) {
        return Some(node);
    }
    if matches!(op, Operator::Escape(_)) {
        return None;
    }
    for i in 0..op.input_port_count() {
        if let Some(opposite) = graph.input_opposite(node, i) {
            if let Some(found) = search(graph, opposite.node, var) {
                return Some(found);
            }
        }
    }
    None
}

/// Walks upstream from `input`, returning the originating operator of `var`, if any is
/// reachable without crossing an `escape`.
pub fn find(graph: &RelGraph, input: Port, var: &VariableRef) -> Option<NodeIndex> {
    let opposite = graph.input_opposite(input.node, input.index)?;
    search(graph, opposite.node, var)
}

/// Whether `var` is visible upstream of `input` (ignoring the originator).
pub fn visible(graph: &RelGraph, input: Port, var: &VariableRef) -> bool {
    find(graph, input, var).is_some()
}

fn collect_flow(graph: &RelGraph, node: NodeIndex, out: &mut HashSet<VariableRef>) {
    let op = graph.operator(node);
    out.extend(declared_variables(op));
    if matches!(op, Operator::Escape(_)) {
        return;
    }
    for i in 0..op.input_port_count() {
        if let Some(opposite) = graph.input_opposite(node, i) {
            collect_flow(graph, opposite.node, out);
        }
    }
}

/// Every stream variable reachable upstream of `input`, stopping at an `escape`
/// (`spec.md` §4.B.6: "trace stream-variable flow at each input to find candidate
/// join-key variables"). A bulk counterpart to `find`, which only checks one variable.
pub fn flow_set(graph: &RelGraph, input: Port) -> HashSet<VariableRef> {
    let mut out = HashSet::new();
    if let Some(opposite) = graph.input_opposite(input.node, input.index) {
        collect_flow(graph, opposite.node, &mut out);
    }
    out
}

/// Per-output-port `(row_count, column_size)` estimate (`spec.md` §3.4), supplied by
/// the caller (row-count estimation is out of scope for the core); consulted only by
/// the join-rewrite cost tiebreaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeInfo {
    pub row_count: f64,
    pub column_size: f64,
}

impl VolumeInfo {
    pub fn total(&self) -> f64 {
        self.row_count * self.column_size
    }
}

#[derive(Debug, Default)]
pub struct FlowVolumeMap {
    map: HashMap<(NodeIndex, usize), VolumeInfo>,
}

impl FlowVolumeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, port: Port, info: VolumeInfo) {
        self.map.insert((port.node, port.index), info);
    }

    pub fn get(&self, port: Port) -> Option<VolumeInfo> {
        self.map.get(&(port.node, port.index)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{FilterOp, ValuesOp};
    use crate::scalar::Scalar;

    #[test]
    fn finds_variable_declared_by_scan_through_a_filter() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let mut graph = RelGraph::new();
        let scan = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone()],
            rows: vec![],
        }));
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(Scalar::bool_lit(true))));
        graph.connect(scan, 0, filter, 0).unwrap();

        let found = find(&graph, Port::input(filter, 0), &c0);
        assert_eq!(found, Some(scan));
    }

    #[test]
    fn escape_hides_upstream_variables() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let renamed = factory.stream("c0_renamed");
        let mut graph = RelGraph::new();
        let scan = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone()],
            rows: vec![],
        }));
        let escape = graph.add_operator(Operator::Escape(crate::relational::op::EscapeOp {
            mappings: vec![(c0.clone(), renamed.clone())],
        }));
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(Scalar::bool_lit(true))));
        graph.connect(scan, 0, escape, 0).unwrap();
        graph.connect(escape, 0, filter, 0).unwrap();

        assert_eq!(find(&graph, Port::input(filter, 0), &c0), None);
        assert_eq!(find(&graph, Port::input(filter, 0), &renamed), Some(escape));
    }
}
