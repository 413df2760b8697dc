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

//! The relational IR: a directed multigraph of operators with typed, ordered input and
//! output ports (`spec.md` §3.1). Backed by `petgraph::stable_graph::StableDiGraph` so
//! node/edge removal never invalidates other nodes' indices — the arena model §9
//! Design Notes calls for, for free.

pub mod op;
mod port;

pub use op::Operator;
pub use port::{Port, PortDirection};

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
pub use petgraph::stable_graph::NodeIndex;

use crate::error::{Error, Result};

/// Edge weight: which output port of the source connects to which input port of the
/// target. Ports carry no other payload (`spec.md` §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLink {
    pub from_index: usize,
    pub to_index: usize,
}

/// A relational operator graph. Owns its operators exclusively; operators own their
/// ports and scalar expressions (`spec.md` §5).
#[derive(Debug, Default)]
pub struct RelGraph {
    graph: StableDiGraph<Operator, PortLink>,
}

impl RelGraph {
    pub fn new() -> Self {
        RelGraph {
            graph: StableDiGraph::new(),
        }
    }

    pub fn add_operator(&mut self, op: Operator) -> NodeIndex {
        self.graph.add_node(op)
    }

    pub fn remove_operator(&mut self, node: NodeIndex) -> Option<Operator> {
        self.graph.remove_node(node)
    }

    pub fn operator(&self, node: NodeIndex) -> &Operator {
        &self.graph[node]
    }

    pub fn operator_mut(&mut self, node: NodeIndex) -> &mut Operator {
        &mut self.graph[node]
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Connect output port `(from, from_index)` to input port `(to, to_index)`. Fails if
    /// either port is already connected (ports connect to *at most one* opposite,
    /// `spec.md` §3.1).
    pub fn connect(
        &mut self,
        from: NodeIndex,
        from_index: usize,
        to: NodeIndex,
        to_index: usize,
    ) -> Result<()> {
        if self.output_opposite(from, from_index).is_some() {
            return Err(Error::domain(format!(
                "output port {from:?}#{from_index} is already connected"
            )));
        }
        if self.input_opposite(to, to_index).is_some() {
            return Err(Error::domain(format!(
                "input port {to:?}#{to_index} is already connected"
            )));
        }
        self.graph.add_edge(
            from,
            to,
            PortLink {
                from_index,
                to_index,
            },
        );
        Ok(())
    }

    /// Disconnect whatever is attached to input port `(node, index)`, if anything.
    pub fn disconnect_input(&mut self, node: NodeIndex, index: usize) {
        if let Some(edge) = self.input_edge(node, index) {
            self.graph.remove_edge(edge);
        }
    }

    pub fn disconnect_output(&mut self, node: NodeIndex, index: usize) {
        if let Some(edge) = self.output_edge(node, index) {
            self.graph.remove_edge(edge);
        }
    }

    /// The output port feeding input port `(node, index)`, if connected.
    pub fn input_opposite(&self, node: NodeIndex, index: usize) -> Option<Port> {
        self.input_edge(node, index).map(|e| {
            let (src, _) = self.graph.edge_endpoints(e).unwrap();
            let link = self.graph[e];
            Port::output(src, link.from_index)
        })
    }

    /// The input port consuming output port `(node, index)`, if connected.
    pub fn output_opposite(&self, node: NodeIndex, index: usize) -> Option<Port> {
        self.output_edge(node, index).map(|e| {
            let (_, dst) = self.graph.edge_endpoints(e).unwrap();
            let link = self.graph[e];
            Port::input(dst, link.to_index)
        })
    }

    fn input_edge(&self, node: NodeIndex, index: usize) -> Option<petgraph::stable_graph::EdgeIndex> {
        self.graph
            .edges_directed(node, petgraph::Direction::Incoming)
            .find(|e| e.weight().to_index == index)
            .map(|e| e.id())
    }

    fn output_edge(&self, node: NodeIndex, index: usize) -> Option<petgraph::stable_graph::EdgeIndex> {
        self.graph
            .edges_directed(node, petgraph::Direction::Outgoing)
            .find(|e| e.weight().from_index == index)
            .map(|e| e.id())
    }

    /// Rewire: connect `port`'s opposite directly to `new_target`'s opposite,
    /// short-circuiting the node in between (used after deleting a no-op operator).
    pub fn splice_out(&mut self, node: NodeIndex) -> Result<()> {
        let input = self
            .input_opposite(node, 0)
            .ok_or_else(|| Error::domain("splice_out: input port not connected"))?;
        let output = self
            .output_opposite(node, 0)
            .ok_or_else(|| Error::domain("splice_out: output port not connected"))?;
        self.disconnect_input(node, 0);
        self.disconnect_output(node, 0);
        self.connect(input.node, input.index, output.node, output.index)
    }

    /// All operators with no output ports (roots for the bottom-up push-down walk,
    /// `spec.md` §5).
    pub fn leaves_without_output(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&n| {
                let op = &self.graph[n];
                (0..op.output_port_count()).all(|i| self.output_opposite(n, i).is_none())
            })
            .collect()
    }

    /// All operators with no input ports (roots for downstream-to-upstream walks that
    /// start at leaves instead of sinks).
    pub fn roots_without_input(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&n| {
                let op = &self.graph[n];
                (0..op.input_port_count()).all(|i| self.input_opposite(n, i).is_none())
            })
            .collect()
    }

    pub fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .collect()
    }

    pub fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
            .collect()
    }

    /// A topological order over the operator graph, upstream-first. Computed on demand,
    /// matching the step-plan builder's own topological order (`spec.md` §9: "passes do
    /// not cache it").
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        petgraph::algo::toposort(&self.graph, None).unwrap_or_default()
    }

    /// Downstream-to-upstream order: the reverse of `topological_order`, used by the
    /// passes that propagate a "used" set from sinks toward sources
    /// (`spec.md` §4.B.1, §5).
    pub fn downstream_to_upstream_order(&self) -> Vec<NodeIndex> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }
}
