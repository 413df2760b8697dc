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

//! The intermediate-plan optimizer (`spec.md` §4.A, §4.B, §6.1): a fixed sequence of
//! seven graph-rewriting passes, each run to completion over the whole graph before the
//! next starts.

pub mod collect_join_keys;
pub mod collect_local_variables;
pub mod push_down_selections;
pub mod remove_redundant_conditions;
pub mod remove_redundant_stream_variables;
pub mod rewrite_join;
pub mod rewrite_scan;

pub use collect_join_keys::collect_join_keys;
pub use collect_local_variables::collect_local_variables;
pub use push_down_selections::push_down_selections;
pub use remove_redundant_conditions::remove_redundant_conditions;
pub use remove_redundant_stream_variables::remove_redundant_stream_variables;
pub use rewrite_join::rewrite_join;
pub use rewrite_scan::rewrite_scan;

use crate::error::Result;
use crate::options::{OptimizerOptions, RuntimeFeature};
use crate::relational::RelGraph;

/// Runs the seven passes in their fixed order (`spec.md` §4.A): each completes fully
/// over the graph before the next begins; none are re-run once later passes start.
pub fn run(graph: &mut RelGraph, options: &OptimizerOptions) -> Result<()> {
    let always_inline = options
        .runtime_features
        .is_enabled(RuntimeFeature::AlwaysInlineScalarLocalVariables);

    remove_redundant_stream_variables(graph)?;
    collect_local_variables(graph, always_inline)?;
    push_down_selections(graph)?;
    rewrite_scan(graph, options)?;
    rewrite_join(graph, options)?;
    collect_join_keys(graph, options)?;
    remove_redundant_conditions(graph)?;

    Ok(())
}
