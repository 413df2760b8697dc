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

//! Query-plan optimization core (`spec.md` §1): turns a catalog-bound relational IR
//! into an optimized intermediate plan, then lowers that into a two-level step plan a
//! runtime can schedule. Four pieces, independently usable:
//!
//! - [`catalog`]: tables, columns, indices, and the provider hierarchy (§3.3, §6.2).
//! - [`passes`] (`intermediate_plan_optimizer`): the seven-pass intermediate-plan
//!   optimizer (§4.A-§4.C).
//! - [`stepplan`] (`step_plan_builder`): the step-plan builder (§4.D).
//! - [`keyterm`]: the search-key term algebra the scan/join rewrites and the step-plan
//!   builder all share (§3.4).

pub mod binding;
pub mod catalog;
pub mod endpoint;
pub mod error;
pub mod estimator;
pub mod flow;
pub mod keyterm;
pub mod options;
pub mod passes;
pub mod prototype;
pub mod relational;
pub mod scalar;
pub mod stepplan;
pub mod transforms;

/// Entry point mirroring `spec.md` §6.1's `intermediate_plan_optimizer.run(graph)`.
pub mod intermediate_plan_optimizer {
    pub use crate::passes::run;
}

/// Entry point mirroring `spec.md` §6.1's `step_plan_builder.build(graph, options)`.
pub mod step_plan_builder {
    pub use crate::stepplan::StepPlanBuilder;

    use crate::error::Result;
    use crate::options::OptimizerOptions;
    use crate::relational::RelGraph;
    use crate::stepplan::StepGraph;

    pub fn build(graph: RelGraph, options: &OptimizerOptions) -> Result<StepGraph> {
        StepPlanBuilder::new(options).build(graph)
    }
}
