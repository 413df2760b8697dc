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

//! Rewrite stream variables (`spec.md` §4.D.5): a sort-from-downstream walk that mints
//! the final per-process stream-variable identities and prunes every column nothing
//! downstream ever asked for. Runs over the step graph's reverse topological order, so
//! a consuming process's demand (which columns it actually reads from an exchange) is
//! known before the exchange step — and, in turn, the process that produces into it —
//! is visited.

use std::collections::{HashMap, HashSet};

use crate::binding::{VariableFactory, VariableRef};
use crate::endpoint::{Endpoint, EndpointKind};
use crate::error::{Error, Result};
use crate::relational::op::{AggregateColumn, JoinKeyEndpoint, JoinKeyEndpointKind};
use crate::relational::{NodeIndex, Operator, RelGraph};
use crate::stepplan::scalar_rewriter::{ScalarRewriter, StreamVariableResolver};
use crate::stepplan::{AggregateStep, ExchangeColumnInfoMap, ExchangeId, GroupStep, Step, StepGraph};
use crate::transforms::collect_stream_vars::collect_stream_vars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewriteStatus {
    /// A replacement was minted because something downstream referenced it, but no
    /// declaring operator has confirmed it yet.
    Undefined,
    /// A declaring operator confirmed the variable and kept it.
    Defined,
}

/// Per-process bookkeeping for `rewrite_stream_variables` (`spec.md` §4.D.5):
/// `old_variable -> (new_variable, status)`, plus an `escape`-derived alias chain so a
/// renamed variable resolves through to whatever replacement its alias target earns.
pub struct StreamVariableRewriterContext {
    factory: VariableFactory,
    map: HashMap<VariableRef, (VariableRef, RewriteStatus)>,
    aliases: HashMap<VariableRef, VariableRef>,
}

impl StreamVariableRewriterContext {
    pub fn new() -> Self {
        StreamVariableRewriterContext {
            factory: VariableFactory,
            map: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    fn canonical(&self, var: &VariableRef) -> VariableRef {
        let mut current = var.clone();
        while let Some(target) = self.aliases.get(&current) {
            current = target.clone();
        }
        current
    }

    /// Records that `source` is an escaped rename of `destination`: any reference to
    /// `source` resolves through to whatever replacement `destination` earns.
    pub fn alias(&mut self, source: &VariableRef, destination: &VariableRef) {
        self.aliases.insert(source.clone(), destination.clone());
    }

    /// A use: mints a replacement eagerly if this is the first reference.
    pub fn rewrite_use(&mut self, var: &VariableRef) -> VariableRef {
        let canonical = self.canonical(var);
        if let Some((replacement, _)) = self.map.get(&canonical) {
            return replacement.clone();
        }
        let replacement = self.factory.stream(canonical.kind().label().to_string());
        self.map
            .insert(canonical, (replacement.clone(), RewriteStatus::Undefined));
        replacement
    }

    /// A declaration site: returns the replacement only if something downstream
    /// actually referenced it, marking it `Defined`. Returns `None` for a column
    /// nothing ever used, meaning the caller should drop the declaration.
    pub fn try_rewrite_define(&mut self, var: &VariableRef) -> Option<VariableRef> {
        let canonical = self.canonical(var);
        match self.map.get_mut(&canonical) {
            Some((replacement, status)) => {
                *status = RewriteStatus::Defined;
                Some(replacement.clone())
            }
            None => None,
        }
    }

    /// Variables that were referenced but never defined by a declaring operator —
    /// dangling references (`spec.md` §4.D.5).
    fn undefined(&self) -> Vec<VariableRef> {
        self.map
            .iter()
            .filter(|(_, (_, status))| *status == RewriteStatus::Undefined)
            .map(|(old, _)| old.clone())
            .collect()
    }
}

impl Default for StreamVariableRewriterContext {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamVariableResolver for StreamVariableRewriterContext {
    fn rewrite_use(&mut self, var: &VariableRef) -> VariableRef {
        StreamVariableRewriterContext::rewrite_use(self, var)
    }
}

fn rewrite_join_key_endpoint(endpoint: &mut JoinKeyEndpoint, ctx: &mut StreamVariableRewriterContext) -> Result<()> {
    let mut keys = Vec::with_capacity(endpoint.keys.len());
    for (var, scalar) in std::mem::take(&mut endpoint.keys) {
        let var = StreamVariableRewriterContext::rewrite_use(ctx, &var);
        let mut rewriter = ScalarRewriter::new(ctx);
        keys.push((var, rewriter.rewrite(scalar)?));
    }
    endpoint.keys = keys;

    endpoint.kind = match std::mem::replace(&mut endpoint.kind, JoinKeyEndpointKind::Unbound) {
        JoinKeyEndpointKind::Unbound => JoinKeyEndpointKind::Unbound,
        JoinKeyEndpointKind::Inclusive(s) => {
            let mut rewriter = ScalarRewriter::new(ctx);
            JoinKeyEndpointKind::Inclusive(rewriter.rewrite(s)?)
        }
        JoinKeyEndpointKind::Exclusive(s) => {
            let mut rewriter = ScalarRewriter::new(ctx);
            JoinKeyEndpointKind::Exclusive(rewriter.rewrite(s)?)
        }
        JoinKeyEndpointKind::PrefixedInclusive(keys) => {
            JoinKeyEndpointKind::PrefixedInclusive(rewrite_prefixed_keys(keys, ctx)?)
        }
        JoinKeyEndpointKind::PrefixedExclusive(keys) => {
            JoinKeyEndpointKind::PrefixedExclusive(rewrite_prefixed_keys(keys, ctx)?)
        }
    };
    Ok(())
}

fn rewrite_prefixed_keys(
    keys: Vec<(VariableRef, crate::scalar::Scalar)>,
    ctx: &mut StreamVariableRewriterContext,
) -> Result<Vec<(VariableRef, crate::scalar::Scalar)>> {
    let mut out = Vec::with_capacity(keys.len());
    for (var, scalar) in keys {
        let var = StreamVariableRewriterContext::rewrite_use(ctx, &var);
        let mut rewriter = ScalarRewriter::new(ctx);
        out.push((var, rewriter.rewrite(scalar)?));
    }
    Ok(out)
}

fn rewrite_endpoint(endpoint: &mut Endpoint, ctx: &mut StreamVariableRewriterContext) -> Result<()> {
    let mut keys = Vec::with_capacity(endpoint.keys.len());
    for (column, scalar) in std::mem::take(&mut endpoint.keys) {
        let mut rewriter = ScalarRewriter::new(ctx);
        keys.push((column, rewriter.rewrite(scalar)?));
    }
    endpoint.keys = keys;

    endpoint.kind = match std::mem::replace(&mut endpoint.kind, EndpointKind::Unbound) {
        EndpointKind::Unbound => EndpointKind::Unbound,
        EndpointKind::Inclusive(s) => {
            let mut rewriter = ScalarRewriter::new(ctx);
            EndpointKind::Inclusive(rewriter.rewrite(s)?)
        }
        EndpointKind::Exclusive(s) => {
            let mut rewriter = ScalarRewriter::new(ctx);
            EndpointKind::Exclusive(rewriter.rewrite(s)?)
        }
        EndpointKind::PrefixedInclusive(keys) => EndpointKind::PrefixedInclusive(rewrite_column_keys(keys, ctx)?),
        EndpointKind::PrefixedExclusive(keys) => EndpointKind::PrefixedExclusive(rewrite_column_keys(keys, ctx)?),
    };
    Ok(())
}

fn rewrite_column_keys(
    keys: Vec<(std::sync::Arc<crate::catalog::Column>, crate::scalar::Scalar)>,
    ctx: &mut StreamVariableRewriterContext,
) -> Result<Vec<(std::sync::Arc<crate::catalog::Column>, crate::scalar::Scalar)>> {
    let mut out = Vec::with_capacity(keys.len());
    for (column, scalar) in keys {
        let mut rewriter = ScalarRewriter::new(ctx);
        out.push((column, rewriter.rewrite(scalar)?));
    }
    Ok(out)
}

/// `take_flat`/`take_group`/each `take_cogroup` side (`spec.md` §4.D.5): touches the
/// exchange column backing every local column something downstream still wants, drops
/// the rest.
fn rewrite_take_columns(
    exchange: ExchangeId,
    columns: &mut Vec<VariableRef>,
    ctx: &mut StreamVariableRewriterContext,
    info_map: &mut ExchangeColumnInfoMap,
) -> Result<()> {
    let mut kept = Vec::with_capacity(columns.len());
    for origin in std::mem::take(columns) {
        if let Some(replacement) = ctx.try_rewrite_define(&origin) {
            if let Some(info) = info_map.get_mut(exchange) {
                if let Some(column) = info.exchange_column_for(&origin) {
                    info.touch(&column);
                }
            }
            kept.push(replacement);
        }
    }
    *columns = kept;
    Ok(())
}

fn touch_broadcast_references(
    exchange: ExchangeId,
    condition: &[crate::scalar::Scalar],
    lower: &JoinKeyEndpoint,
    upper: &JoinKeyEndpoint,
    info_map: &mut ExchangeColumnInfoMap,
) {
    let mut referenced: HashSet<VariableRef> = HashSet::new();
    for atom in condition {
        collect_stream_vars(atom, |v| {
            referenced.insert(v.clone());
        });
    }
    for endpoint in [lower, upper] {
        for (_, scalar) in &endpoint.keys {
            collect_stream_vars(scalar, |v| {
                referenced.insert(v.clone());
            });
        }
        let prefixed = match &endpoint.kind {
            JoinKeyEndpointKind::PrefixedInclusive(keys) | JoinKeyEndpointKind::PrefixedExclusive(keys) => {
                Some(keys)
            }
            _ => None,
        };
        if let Some(keys) = prefixed {
            for (_, scalar) in keys {
                collect_stream_vars(scalar, |v| {
                    referenced.insert(v.clone());
                });
            }
        }
    }

    if let Some(info) = info_map.get_mut(exchange) {
        for var in &referenced {
            if let Some(column) = info.exchange_column_for(var) {
                info.touch(&column);
            }
        }
    }
}

fn rewrite_process(graph: &mut RelGraph, info_map: &mut ExchangeColumnInfoMap) -> Result<()> {
    let mut ctx = StreamVariableRewriterContext::new();

    let escapes: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| matches!(graph.operator(n), Operator::Escape(_)))
        .collect();
    for node in escapes {
        if let Operator::Escape(e) = graph.operator(node) {
            for (source, destination) in e.mappings.clone() {
                ctx.alias(&source, &destination);
            }
        }
        graph.splice_out(node)?;
        graph.remove_operator(node);
    }

    let order = graph.downstream_to_upstream_order();
    for node in order {
        if let Operator::Identify(identify) = graph.operator(node) {
            let var = identify.variable.clone();
            match ctx.try_rewrite_define(&var) {
                Some(replacement) => {
                    if let Operator::Identify(identify) = graph.operator_mut(node) {
                        identify.variable = replacement;
                    }
                }
                None => {
                    graph.splice_out(node)?;
                    graph.remove_operator(node);
                }
            }
            continue;
        }

        match graph.operator_mut(node) {
            Operator::Emit(op) => {
                op.columns = op.columns.iter().map(|v| ctx.rewrite_use(v)).collect();
            }
            Operator::Write(op) => {
                op.keys = op.keys.iter().map(|v| ctx.rewrite_use(v)).collect();
                op.values = op.values.iter().map(|v| ctx.rewrite_use(v)).collect();
            }
            Operator::Filter(op) => {
                let mut rewritten = Vec::with_capacity(op.conjuncts.len());
                for conjunct in std::mem::take(&mut op.conjuncts) {
                    let mut rewriter = ScalarRewriter::new(&mut ctx);
                    rewritten.push(rewriter.rewrite(conjunct)?);
                }
                op.conjuncts = rewritten;
            }
            Operator::Project(op) => {
                let mut kept = Vec::with_capacity(op.columns.len());
                for (var, value) in std::mem::take(&mut op.columns).into_iter().rev() {
                    if let Some(replacement) = ctx.try_rewrite_define(&var) {
                        let mut rewriter = ScalarRewriter::new(&mut ctx);
                        kept.push((replacement, rewriter.rewrite(value)?));
                    }
                }
                kept.reverse();
                op.columns = kept;
            }
            Operator::Find(op) => {
                let mut kept = Vec::with_capacity(op.columns.len());
                for mut mapping in std::mem::take(&mut op.columns) {
                    if let Some(replacement) = ctx.try_rewrite_define(&mapping.variable) {
                        mapping.variable = replacement;
                        kept.push(mapping);
                    }
                }
                op.columns = kept;
            }
            Operator::Scan(op) => {
                let mut kept = Vec::with_capacity(op.columns.len());
                for mut mapping in std::mem::take(&mut op.columns) {
                    if let Some(replacement) = ctx.try_rewrite_define(&mapping.variable) {
                        mapping.variable = replacement;
                        kept.push(mapping);
                    }
                }
                op.columns = kept;
                rewrite_endpoint(&mut op.lower, &mut ctx)?;
                rewrite_endpoint(&mut op.upper, &mut ctx)?;
            }
            Operator::Values(op) => {
                let mut keep_indices = HashSet::new();
                let mut new_columns = Vec::new();
                for (i, var) in op.columns.iter().enumerate() {
                    if let Some(replacement) = ctx.try_rewrite_define(var) {
                        keep_indices.insert(i);
                        new_columns.push(replacement);
                    }
                }
                let mut new_rows = Vec::with_capacity(op.rows.len());
                for row in std::mem::take(&mut op.rows) {
                    let mut new_row = Vec::with_capacity(keep_indices.len());
                    for (i, scalar) in row.into_iter().enumerate() {
                        if keep_indices.contains(&i) {
                            let mut rewriter = ScalarRewriter::new(&mut ctx);
                            new_row.push(rewriter.rewrite(scalar)?);
                        }
                    }
                    new_rows.push(new_row);
                }
                op.columns = new_columns;
                op.rows = new_rows;
            }
            Operator::JoinGroup(op) => {
                let mut rewritten = Vec::with_capacity(op.condition.len());
                for atom in std::mem::take(&mut op.condition) {
                    let mut rewriter = ScalarRewriter::new(&mut ctx);
                    rewritten.push(rewriter.rewrite(atom)?);
                }
                op.condition = rewritten;
            }
            Operator::JoinBroadcast(op) => {
                touch_broadcast_references(op.exchange, &op.condition, &op.lower, &op.upper, info_map);

                let mut rewritten = Vec::with_capacity(op.condition.len());
                for atom in std::mem::take(&mut op.condition) {
                    let mut rewriter = ScalarRewriter::new(&mut ctx);
                    rewritten.push(rewriter.rewrite(atom)?);
                }
                op.condition = rewritten;
                rewrite_join_key_endpoint(&mut op.lower, &mut ctx)?;
                rewrite_join_key_endpoint(&mut op.upper, &mut ctx)?;
            }
            Operator::TakeFlat(op) => {
                rewrite_take_columns(op.exchange, &mut op.columns, &mut ctx, info_map)?;
            }
            Operator::TakeGroup(op) => {
                rewrite_take_columns(op.exchange, &mut op.columns, &mut ctx, info_map)?;
            }
            Operator::TakeCogroup(op) => {
                for side in op.groups.iter_mut() {
                    rewrite_take_columns(side.exchange, &mut side.columns, &mut ctx, info_map)?;
                }
            }
            Operator::Offer(op) => {
                let touched: Vec<bool> = {
                    let info = info_map.get(op.exchange);
                    op.columns
                        .iter()
                        .map(|(_, destination)| info.map_or(false, |i| i.is_touched(destination)))
                        .collect()
                };
                let mut kept = Vec::with_capacity(op.columns.len());
                for (keep, (source, destination)) in touched.into_iter().zip(std::mem::take(&mut op.columns)) {
                    if keep {
                        kept.push((ctx.rewrite_use(&source), destination));
                    }
                }
                op.columns = kept;
            }
            Operator::AggregateGroup(op) => {
                op.group_keys = op.group_keys.iter().map(|v| ctx.rewrite_use(v)).collect();
                let mut kept = Vec::with_capacity(op.aggregations.len());
                for agg in std::mem::take(&mut op.aggregations) {
                    if let Some(destination) = ctx.try_rewrite_define(&agg.destination) {
                        let arguments = agg.arguments.iter().map(|v| ctx.rewrite_use(v)).collect();
                        kept.push(AggregateColumn {
                            destination,
                            function: agg.function,
                            arguments,
                        });
                    }
                }
                op.aggregations = kept;
            }
            Operator::IntersectionGroup(_)
            | Operator::DifferenceGroup(_)
            | Operator::Flatten(_)
            | Operator::Buffer(_) => {}
            _ => {}
        }
    }

    let undefined = ctx.undefined();
    if !undefined.is_empty() {
        return Err(Error::domain(format!(
            "{} stream variable(s) referenced downstream were never defined upstream",
            undefined.len()
        )));
    }

    Ok(())
}

fn rewrite_forward_like(id: ExchangeId, columns: &mut Vec<VariableRef>, info_map: &mut ExchangeColumnInfoMap) {
    if let Some(info) = info_map.get(id) {
        columns.retain(|c| info.is_touched(c));
    } else {
        columns.clear();
    }
}

fn rewrite_group(id: ExchangeId, step: &mut GroupStep, info_map: &mut ExchangeColumnInfoMap) {
    let info = info_map.entry(id);
    for key in &step.group_keys {
        info.touch(key);
    }
    for (key, _) in &step.sort_keys {
        info.touch(key);
    }
    step.columns.retain(|c| info.is_touched(c));
}

/// `aggregate` (`spec.md` §4.D.5): first prunes the exchange's own output (group keys
/// always retained, aggregations by downstream demand), then resets the touched set to
/// exactly what the *upstream* `offer` must still supply — group keys plus the
/// arguments of whichever aggregations survived.
fn rewrite_aggregate(id: ExchangeId, step: &mut AggregateStep, info_map: &mut ExchangeColumnInfoMap) {
    let info = info_map.entry(id);
    for key in &step.group_keys {
        info.touch(key);
    }
    step.aggregations.retain(|agg| info.is_touched(&agg.destination));
    step.columns.retain(|c| info.is_touched(c));

    info.clear_touched();
    for key in &step.group_keys {
        info.touch(key);
    }
    for agg in &step.aggregations {
        for arg in &agg.arguments {
            info.touch(arg);
        }
    }
}

pub fn rewrite_stream_variables(step_graph: &mut StepGraph, info_map: &mut ExchangeColumnInfoMap) -> Result<()> {
    let mut order = step_graph.topological_order();
    order.reverse();

    for step_id in order {
        match step_graph.step_mut(step_id) {
            Step::Process(process) => rewrite_process(&mut process.graph, info_map)?,
            Step::Forward(f) => rewrite_forward_like(step_id, &mut f.columns, info_map),
            Step::Broadcast(b) => rewrite_forward_like(step_id, &mut b.columns, info_map),
            Step::Group(g) => rewrite_group(step_id, g, info_map),
            Step::Aggregate(a) => rewrite_aggregate(step_id, a, info_map),
            Step::Discard(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::relational::op::{EmitOp, OfferOp, TakeFlatOp, ValuesOp};
    use crate::relational::RelGraph;
    use crate::scalar::Scalar;
    use crate::stepplan::{ForwardStep, ProcessStep, StepLinkKind};

    #[test]
    fn unused_column_is_pruned_from_values_and_take_flat() {
        let factory = VariableFactory;
        let wanted = factory.stream("wanted");
        let unused = factory.stream("unused");

        let mut step_graph = StepGraph::new();
        let exchange = step_graph.add_step(Step::Forward(ForwardStep { columns: vec![], limit: None }));

        let mut producer = RelGraph::new();
        let values = producer.add_operator(Operator::Values(ValuesOp {
            columns: vec![wanted.clone(), unused.clone()],
            rows: vec![vec![Scalar::bool_lit(true), Scalar::bool_lit(true)]],
        }));
        let offer = producer.add_operator(Operator::Offer(OfferOp { exchange, columns: vec![] }));
        producer.connect(values, 0, offer, 0).unwrap();
        let producer_id = step_graph.add_step(Step::Process(ProcessStep { graph: producer }));
        step_graph.link(producer_id, exchange, StepLinkKind::Produces);

        let mut consumer = RelGraph::new();
        let take = consumer.add_operator(Operator::TakeFlat(TakeFlatOp { exchange, columns: vec![] }));
        let emit = consumer.add_operator(Operator::Emit(EmitOp { columns: vec![] }));
        consumer.connect(take, 0, emit, 0).unwrap();
        let consumer_id = step_graph.add_step(Step::Process(ProcessStep { graph: consumer }));
        step_graph.link(consumer_id, exchange, StepLinkKind::Consumes);

        // Emit reads only the `wanted` column, identified by position against the
        // take_flat's column order set up by `collect_exchange_columns` in a real run;
        // for this focused test we populate that order by hand instead of running the
        // full pipeline.
        if let Step::Process(p) = step_graph.step_mut(consumer_id) {
            if let Operator::TakeFlat(t) = p.graph.operator_mut(take) {
                t.columns = vec![wanted.clone(), unused.clone()];
            }
            if let Operator::Emit(e) = p.graph.operator_mut(emit) {
                e.columns = vec![wanted.clone()];
            }
        }
        if let Step::Process(p) = step_graph.step_mut(producer_id) {
            if let Operator::Offer(o) = p.graph.operator_mut(offer) {
                o.columns = vec![
                    (wanted.clone(), wanted.clone()),
                    (unused.clone(), unused.clone()),
                ];
            }
        }

        let mut info_map = ExchangeColumnInfoMap::new();
        {
            let info = info_map.entry(exchange);
            info.bind(wanted.clone(), wanted.clone());
            info.bind(unused.clone(), unused.clone());
        }

        rewrite_stream_variables(&mut step_graph, &mut info_map).unwrap();

        if let Step::Process(p) = step_graph.step(consumer_id) {
            if let Operator::TakeFlat(t) = p.graph.operator(take) {
                assert_eq!(t.columns.len(), 1);
            } else {
                panic!("expected take_flat");
            }
        }
        if let Step::Process(p) = step_graph.step(producer_id) {
            if let Operator::Offer(o) = p.graph.operator(offer) {
                assert_eq!(o.columns.len(), 1);
            } else {
                panic!("expected offer");
            }
        }
    }
}
