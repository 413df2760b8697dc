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

//! Link steps (`spec.md` §4.D.3): for each `process`, finds the exchanges its
//! operators consume from (`take_*`) or produce into (`offer`) and records the link in
//! the step graph, deduplicated.

use std::collections::HashSet;

use crate::error::Result;
use crate::relational::Operator;
use crate::stepplan::{ExchangeId, Step, StepGraph, StepLinkKind};

fn process_links(process: &crate::stepplan::ProcessStep) -> (HashSet<ExchangeId>, HashSet<ExchangeId>) {
    let mut produces = HashSet::new();
    let mut consumes = HashSet::new();

    for node in process.graph.node_indices() {
        match process.graph.operator(node) {
            Operator::Offer(o) => {
                produces.insert(o.exchange);
            }
            Operator::TakeFlat(t) | Operator::TakeGroup(t) => {
                consumes.insert(t.exchange);
            }
            Operator::TakeCogroup(t) => {
                consumes.extend(t.groups.iter().map(|side| side.exchange));
            }
            _ => {}
        }
    }

    (produces, consumes)
}

pub fn link_steps(step_graph: &mut StepGraph) -> Result<()> {
    let process_ids: Vec<ExchangeId> = step_graph
        .node_indices()
        .filter(|&id| matches!(step_graph.step(id), Step::Process(_)))
        .collect();

    for process_id in process_ids {
        let (produces, consumes) = {
            let process = step_graph
                .step(process_id)
                .as_process()
                .expect("filtered to process steps above");
            process_links(process)
        };

        for exchange in produces {
            step_graph.link(process_id, exchange, StepLinkKind::Produces);
        }
        for exchange in consumes {
            step_graph.link(process_id, exchange, StepLinkKind::Consumes);
        }
    }

    Ok(())
}
