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

//! Step-plan builder (`spec.md` §4.D): converts an optimized intermediate plan into a
//! two-level graph of computation steps, each `Process` step containing a sub-graph of
//! step-plan operators.

mod builder;
mod collect_exchange_columns;
mod collect_exchange_steps;
mod collect_process_steps;
pub mod exchange_column_info;
mod link_steps;
pub mod rewrite_stream_variables;
pub mod scalar_rewriter;

pub use builder::StepPlanBuilder;
pub use exchange_column_info::{ExchangeColumnInfo, ExchangeColumnInfoMap};

use petgraph::stable_graph::StableDiGraph;
pub use petgraph::stable_graph::NodeIndex as ExchangeId;

use crate::binding::VariableRef;
use crate::relational::op::JoinKind;
use crate::relational::{op::AggregateColumn, op::SortDirection, RelGraph};

/// `spec.md` §6.6: the two strategies a `join_relation` can be lowered to in the step
/// plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    Cogroup,
    Broadcast,
}

/// Whether the join has already been narrowed to point/range endpoints — broadcast
/// requires at least one prefix (equivalent-only) or key-pair style endpoint; cogroup
/// requires endpoints *not* be set (a plain equi-join residual condition), since a
/// scan/find rewrite already chose a different physical shape for one side.
#[derive(Debug, Clone, Copy)]
pub struct EndpointStyle {
    pub has_prefix_or_key_pair: bool,
}

/// `available_join_strategies(join)` (`spec.md` §6.6): `full_outer` excludes
/// broadcast; prefix/range endpoints exclude cogroup.
pub fn available_join_strategies(kind: JoinKind, endpoint_style: EndpointStyle) -> Vec<JoinStrategy> {
    let mut out = Vec::new();
    if kind != JoinKind::FullOuter {
        out.push(JoinStrategy::Broadcast);
    }
    if !endpoint_style.has_prefix_or_key_pair {
        out.push(JoinStrategy::Cogroup);
    }
    out
}

#[derive(Debug, Clone)]
pub struct ForwardStep {
    pub columns: Vec<VariableRef>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GroupStep {
    pub columns: Vec<VariableRef>,
    pub group_keys: Vec<VariableRef>,
    pub sort_keys: Vec<(VariableRef, SortDirection)>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AggregateStep {
    pub columns: Vec<VariableRef>,
    pub group_keys: Vec<VariableRef>,
    pub aggregations: Vec<AggregateColumn>,
}

#[derive(Debug, Clone)]
pub struct BroadcastStep {
    pub columns: Vec<VariableRef>,
}

#[derive(Debug, Clone, Default)]
pub struct DiscardStep;

#[derive(Debug, Clone)]
pub struct ProcessStep {
    pub graph: RelGraph,
}

/// A top-level step. Steps are linked by plain "consumes"/"produces" edges in
/// `StepGraph` rather than by ports — unlike operators, steps are not port-addressed in
/// `spec.md` §3.1.
#[derive(Debug, Clone)]
pub enum Step {
    Process(ProcessStep),
    Forward(ForwardStep),
    Group(GroupStep),
    Aggregate(AggregateStep),
    Broadcast(BroadcastStep),
    Discard(DiscardStep),
}

impl Step {
    pub fn is_exchange(&self) -> bool {
        !matches!(self, Step::Process(_))
    }

    pub fn as_process(&self) -> Option<&ProcessStep> {
        match self {
            Step::Process(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_process_mut(&mut self) -> Option<&mut ProcessStep> {
        match self {
            Step::Process(p) => Some(p),
            _ => None,
        }
    }
}

/// `process -> exchange` ("produces into") or `exchange -> process` ("consumed from").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepLinkKind {
    Produces,
    Consumes,
}

#[derive(Debug, Default)]
pub struct StepGraph {
    pub(crate) graph: StableDiGraph<Step, StepLinkKind>,
}

impl StepGraph {
    pub fn new() -> Self {
        StepGraph::default()
    }

    pub fn add_step(&mut self, step: Step) -> ExchangeId {
        self.graph.add_node(step)
    }

    pub fn step(&self, id: ExchangeId) -> &Step {
        &self.graph[id]
    }

    pub fn step_mut(&mut self, id: ExchangeId) -> &mut Step {
        &mut self.graph[id]
    }

    pub fn node_indices(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.graph.node_indices()
    }

    /// Link `process` and `exchange`; `kind` is from the process's point of view.
    pub fn link(&mut self, process: ExchangeId, exchange: ExchangeId, kind: StepLinkKind) {
        let already = match kind {
            StepLinkKind::Produces => self.graph.contains_edge(process, exchange),
            StepLinkKind::Consumes => self.graph.contains_edge(exchange, process),
        };
        if already {
            return;
        }
        match kind {
            StepLinkKind::Produces => {
                self.graph.add_edge(process, exchange, kind);
            }
            StepLinkKind::Consumes => {
                self.graph.add_edge(exchange, process, kind);
            }
        }
    }

    /// Exchanges that `process` consumes from (upstream of it).
    pub fn upstream_exchanges(&self, process: ExchangeId) -> Vec<ExchangeId> {
        self.graph
            .neighbors_directed(process, petgraph::Direction::Incoming)
            .collect()
    }

    /// Exchanges that `process` produces into (downstream of it).
    pub fn downstream_exchanges(&self, process: ExchangeId) -> Vec<ExchangeId> {
        self.graph
            .neighbors_directed(process, petgraph::Direction::Outgoing)
            .collect()
    }

    /// Processes consuming from `exchange`.
    pub fn consuming_processes(&self, exchange: ExchangeId) -> Vec<ExchangeId> {
        self.graph
            .neighbors_directed(exchange, petgraph::Direction::Outgoing)
            .collect()
    }

    /// Processes producing into `exchange`.
    pub fn producing_processes(&self, exchange: ExchangeId) -> Vec<ExchangeId> {
        self.graph
            .neighbors_directed(exchange, petgraph::Direction::Incoming)
            .collect()
    }

    /// A topological order over the step graph, computed on demand (`spec.md` §9:
    /// "passes do not cache it").
    pub fn topological_order(&self) -> Vec<ExchangeId> {
        petgraph::algo::toposort(&self.graph, None).unwrap_or_default()
    }
}
