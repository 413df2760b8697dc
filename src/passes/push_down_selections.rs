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

//! Push down selections (`spec.md` §4.B.3): walks the graph from its sinks upstream,
//! carrying predicate atoms as far toward their sources as operator semantics allow.
//!
//! Atoms ride in a per-edge mask. An atom that reaches an operator it cannot pass
//! through is "flushed": reinserted as a fresh `filter` spliced onto the edge it was
//! riding. An atom visible on both sides of an inner/semi join is duplicated (carried
//! on both sides); `AtomCell`'s `Rc` strong count doubles as that duplication's
//! reference count, so `release` only moves the atom out of its owning slot (leaving
//! `TRUE` behind) when this is the last surviving handle, and clones it otherwise.

use std::collections::VecDeque;
use std::rc::Rc;
use std::cell::RefCell;

use crate::binding::VariableRef;
use crate::error::Result;
use crate::relational::op::{FilterOp, JoinKind};
use crate::relational::{NodeIndex, Operator, Port, RelGraph};
use crate::scalar::Scalar;
use crate::transforms::collect_stream_vars::collect_stream_vars;

struct AtomCell {
    value: RefCell<Scalar>,
    vars: Vec<VariableRef>,
}

type AtomRef = Rc<AtomCell>;
type Mask = Vec<AtomRef>;

fn new_atom(value: Scalar) -> AtomRef {
    let mut vars = Vec::new();
    collect_stream_vars(&value, |v| vars.push(v.clone()));
    Rc::new(AtomCell {
        value: RefCell::new(value),
        vars,
    })
}

/// Moves the atom's expression out (leaving `TRUE` behind) if this is the only
/// surviving handle, else clones it.
fn release(atom: AtomRef) -> Scalar {
    if Rc::strong_count(&atom) == 1 {
        atom.value.replace(Scalar::bool_lit(true))
    } else {
        atom.value.borrow().clone()
    }
}

fn clone_value(atom: &AtomRef) -> Scalar {
    atom.value.borrow().clone()
}

fn visible_on(graph: &RelGraph, input: Port, vars: &[VariableRef]) -> bool {
    vars.iter().all(|v| crate::flow::visible(graph, input, v))
}

/// Disconnects `node`'s output port 0 from whatever it feeds and splices in a new
/// `filter` carrying `atoms` (`spec.md` §4.B.3, "flush an atom on an output port").
fn flush_at_output(graph: &mut RelGraph, node: NodeIndex, atoms: Vec<Scalar>) -> Result<()> {
    if atoms.is_empty() {
        return Ok(());
    }
    let Some(downstream) = graph.output_opposite(node, 0) else {
        return Ok(());
    };
    graph.disconnect_output(node, 0);
    graph.disconnect_input(downstream.node, downstream.index);
    let filter = graph.add_operator(Operator::Filter(FilterOp { conjuncts: atoms }));
    graph.connect(node, 0, filter, 0)?;
    graph.connect(filter, 0, downstream.node, downstream.index)?;
    Ok(())
}

fn enqueue_upstream(graph: &RelGraph, queue: &mut VecDeque<(NodeIndex, Mask)>, node: NodeIndex, index: usize, mask: Mask) {
    if let Some(up) = graph.input_opposite(node, index) {
        queue.push_back((up.node, mask));
    }
}

pub fn push_down_selections(graph: &mut RelGraph) -> Result<()> {
    let mut queue: VecDeque<(NodeIndex, Mask)> = graph
        .node_indices()
        .filter(|&n| graph.operator(n).output_port_count() == 0)
        .map(|n| (n, Vec::new()))
        .collect();

    while let Some((node, mut mask)) = queue.pop_front() {
        match graph.operator(node).name() {
            "filter" => {
                let conjuncts = match graph.operator_mut(node) {
                    Operator::Filter(f) => std::mem::take(&mut f.conjuncts),
                    _ => unreachable!(),
                };
                mask.extend(conjuncts.into_iter().map(new_atom));
                enqueue_upstream(graph, &mut queue, node, 0, mask);
            }
            "join_relation" => {
                let kind = match graph.operator(node) {
                    Operator::JoinRelation(j) => j.kind,
                    _ => unreachable!(),
                };
                match kind {
                    JoinKind::Inner | JoinKind::Semi => {
                        let condition_atoms = match graph.operator_mut(node) {
                            Operator::JoinRelation(j) => std::mem::take(&mut j.condition),
                            _ => unreachable!(),
                        };
                        let left_port = Port::input(node, 0);
                        let right_port = Port::input(node, 1);
                        let mut left_mask = Vec::new();
                        let mut right_mask = Vec::new();
                        let mut remaining_condition = Vec::new();

                        let mut all_atoms: Vec<AtomRef> = mask;
                        all_atoms.extend(condition_atoms.into_iter().map(new_atom));

                        for atom in all_atoms {
                            let vl = visible_on(graph, left_port, &atom.vars);
                            let vr = visible_on(graph, right_port, &atom.vars);
                            match (vl, vr) {
                                (true, true) => {
                                    left_mask.push(atom.clone());
                                    right_mask.push(atom);
                                }
                                (true, false) => left_mask.push(atom),
                                (false, true) => right_mask.push(atom),
                                (false, false) => remaining_condition.push(release(atom)),
                            }
                        }

                        if let Operator::JoinRelation(j) = graph.operator_mut(node) {
                            j.condition = remaining_condition;
                        }
                        enqueue_upstream(graph, &mut queue, node, 0, left_mask);
                        enqueue_upstream(graph, &mut queue, node, 1, right_mask);
                    }
                    JoinKind::LeftOuter | JoinKind::Anti => {
                        let left_port = Port::input(node, 0);
                        let mut left_mask = Vec::new();
                        let mut to_flush = Vec::new();
                        for atom in mask {
                            if visible_on(graph, left_port, &atom.vars) {
                                left_mask.push(atom);
                            } else {
                                to_flush.push(atom);
                            }
                        }
                        let flushed: Vec<Scalar> = to_flush.into_iter().map(release).collect();
                        flush_at_output(graph, node, flushed)?;
                        enqueue_upstream(graph, &mut queue, node, 0, left_mask);
                        enqueue_upstream(graph, &mut queue, node, 1, Vec::new());
                    }
                    JoinKind::FullOuter => {
                        let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                        flush_at_output(graph, node, flushed)?;
                        enqueue_upstream(graph, &mut queue, node, 0, Vec::new());
                        enqueue_upstream(graph, &mut queue, node, 1, Vec::new());
                    }
                }
            }
            "join_find" | "join_scan" => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, Vec::new());
            }
            "project" => {
                let declared: Vec<VariableRef> = match graph.operator(node) {
                    Operator::Project(p) => p.columns.iter().map(|(v, _)| v.clone()).collect(),
                    _ => unreachable!(),
                };
                let (flush, carry): (Vec<AtomRef>, Vec<AtomRef>) = mask
                    .into_iter()
                    .partition(|a| a.vars.iter().any(|v| declared.contains(v)));
                let flushed: Vec<Scalar> = flush.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, carry);
            }
            "aggregate_relation" => {
                let group_keys: Vec<VariableRef> = match graph.operator(node) {
                    Operator::AggregateRelation(a) => a.group_keys.clone(),
                    _ => unreachable!(),
                };
                let (passable, others): (Vec<AtomRef>, Vec<AtomRef>) = mask
                    .into_iter()
                    .partition(|a| a.vars.iter().all(|v| group_keys.contains(v)));
                let flushed: Vec<Scalar> = others.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, passable);
            }
            "distinct_relation" | "limit_relation" => {
                let group_keys: Vec<VariableRef> = match graph.operator(node) {
                    Operator::DistinctRelation(d) => d.group_keys.clone(),
                    Operator::LimitRelation(l) => l
                        .group_keys
                        .iter()
                        .cloned()
                        .chain(l.sort_keys.iter().map(|(v, _)| v.clone()))
                        .collect(),
                    _ => unreachable!(),
                };
                let (passable, others): (Vec<AtomRef>, Vec<AtomRef>) = mask
                    .into_iter()
                    .partition(|a| a.vars.iter().all(|v| group_keys.contains(v)));
                // The passable atoms continue upstream AND are flushed again as a copy
                // here: distinct/limit may collapse rows, so a pre-group filter on the
                // same keys is still a valid, independently-checkable condition on the
                // post-group result (`spec.md` §4.B.3).
                let mut flushed: Vec<Scalar> = passable.iter().map(clone_value).collect();
                flushed.extend(others.into_iter().map(release));
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, passable);
            }
            "union" => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, Vec::new());
                enqueue_upstream(graph, &mut queue, node, 1, Vec::new());
            }
            "intersection" | "difference" => {
                enqueue_upstream(graph, &mut queue, node, 0, mask);
                enqueue_upstream(graph, &mut queue, node, 1, Vec::new());
            }
            "identify" => {
                let var = match graph.operator(node) {
                    Operator::Identify(i) => i.variable.clone(),
                    _ => unreachable!(),
                };
                let (flush, carry): (Vec<AtomRef>, Vec<AtomRef>) =
                    mask.into_iter().partition(|a| a.vars.contains(&var));
                let flushed: Vec<Scalar> = flush.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, carry);
            }
            "escape" => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                enqueue_upstream(graph, &mut queue, node, 0, Vec::new());
            }
            "buffer" => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
                // Never walk into a buffer in this pass.
            }
            "find" | "scan" | "values" => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
            }
            "emit" | "write" => {
                // Terminal operators carry no atoms of their own; just keep walking.
                enqueue_upstream(graph, &mut queue, node, 0, mask);
            }
            _ => {
                let flushed: Vec<Scalar> = mask.into_iter().map(release).collect();
                flush_at_output(graph, node, flushed)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{EmitOp, ValuesOp};
    use crate::scalar::{CompareOp, ScalarValue};

    #[test]
    fn filter_atom_is_pushed_above_a_passthrough_project() {
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let p0 = factory.stream("p0");

        let mut graph = RelGraph::new();
        let values = graph.add_operator(Operator::Values(ValuesOp {
            columns: vec![c0.clone()],
            rows: vec![vec![Scalar::bool_lit(true)]],
        }));
        let project = graph.add_operator(Operator::Project(crate::relational::op::ProjectOp {
            columns: vec![(p0.clone(), Scalar::var(c0.clone()))],
        }));
        let condition = Scalar::Compare(
            CompareOp::Gt,
            Box::new(Scalar::var(p0.clone())),
            Box::new(Scalar::Immediate(ScalarValue::Int64(0))),
        );
        let filter = graph.add_operator(Operator::Filter(FilterOp::new(condition)));
        let emit = graph.add_operator(Operator::Emit(EmitOp { columns: vec![p0] }));
        graph.connect(values, 0, project, 0).unwrap();
        graph.connect(project, 0, filter, 0).unwrap();
        graph.connect(filter, 0, emit, 0).unwrap();

        push_down_selections(&mut graph).unwrap();

        // the atom references `p0`, which project declares: it cannot be pushed past
        // project, so it stays flushed on project's output, directly below it, and
        // project's own input is untouched.
        assert_eq!(graph.input_opposite(project, 0).map(|p| p.node), Some(values));
        let just_below_project = graph.output_opposite(project, 0).unwrap().node;
        assert_ne!(just_below_project, filter);
        match graph.operator(just_below_project) {
            Operator::Filter(f) => assert_eq!(f.conjuncts.len(), 1),
            other => panic!("expected a flushed filter, got {other:?}"),
        }
    }
}
