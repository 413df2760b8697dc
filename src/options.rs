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

//! Options carried by both top-level entry points (`spec.md` §6.1, §12).

use std::collections::HashMap;
use std::sync::Arc;

use fixedbitset::FixedBitSet;

use crate::catalog::SharedCatalogProvider;
use crate::estimator::{DefaultIndexEstimator, IndexEstimator};
use crate::flow::FlowVolumeMap;
use crate::relational::NodeIndex;
use crate::stepplan::JoinStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFeature {
    BroadcastExchange,
    IndexJoin,
    IndexJoinScan,
    BroadcastJoinScan,
    AggregateExchange,
    AlwaysInlineScalarLocalVariables,
}

const RUNTIME_FEATURE_COUNT: usize = 6;

impl RuntimeFeature {
    fn bit(self) -> usize {
        match self {
            RuntimeFeature::BroadcastExchange => 0,
            RuntimeFeature::IndexJoin => 1,
            RuntimeFeature::IndexJoinScan => 2,
            RuntimeFeature::BroadcastJoinScan => 3,
            RuntimeFeature::AggregateExchange => 4,
            RuntimeFeature::AlwaysInlineScalarLocalVariables => 5,
        }
    }
}

/// A small bitset over `RuntimeFeature`, backed by `fixedbitset` the way the original
/// wire-stable `IndexFeatures` bitset is (`spec.md` §6.3), since both are closed,
/// small, copyable flag sets.
#[derive(Debug, Clone)]
pub struct RuntimeFeatures(FixedBitSet);

impl Default for RuntimeFeatures {
    fn default() -> Self {
        RuntimeFeatures(FixedBitSet::with_capacity(RUNTIME_FEATURE_COUNT))
    }
}

impl RuntimeFeatures {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        let mut f = Self::default();
        f.0.insert_range(..);
        f
    }

    pub fn with(mut self, feature: RuntimeFeature) -> Self {
        self.0.insert(feature.bit());
        self
    }

    pub fn enable(&mut self, feature: RuntimeFeature) {
        self.0.insert(feature.bit());
    }

    pub fn is_enabled(&self, feature: RuntimeFeature) -> bool {
        self.0.contains(feature.bit())
    }
}

/// Per-operator strategy overrides, keyed by the operator's arena index in the
/// intermediate graph being optimized. A fresh `OptimizerOptions` carries no hints;
/// callers populate them between passes if they want to force a specific join or
/// aggregate strategy at a specific node.
#[derive(Debug, Clone, Default)]
pub struct StrategyHints {
    pub join: HashMap<NodeIndex, JoinStrategy>,
    pub aggregate_exchange: HashMap<NodeIndex, bool>,
}

/// Carried by both `intermediate_plan_optimizer::run` and `step_plan_builder::build`
/// (`spec.md` §6.1).
#[derive(Clone)]
pub struct OptimizerOptions {
    pub storage_provider: SharedCatalogProvider,
    pub index_estimator: Arc<dyn IndexEstimator>,
    pub runtime_features: RuntimeFeatures,
    pub hints: StrategyHints,
    /// Per-edge row/column volume estimates, supplied by the caller. Consulted only by
    /// `collect_join_keys`'s build-side tiebreaker (`spec.md` §4.B.6); absent by default
    /// since row-count estimation is out of scope for the core.
    pub volume_hints: Option<Arc<FlowVolumeMap>>,
}

impl std::fmt::Debug for OptimizerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerOptions")
            .field("runtime_features", &self.runtime_features)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

impl OptimizerOptions {
    pub fn new(storage_provider: SharedCatalogProvider) -> Self {
        OptimizerOptions {
            storage_provider,
            index_estimator: Arc::new(DefaultIndexEstimator),
            runtime_features: RuntimeFeatures::none(),
            hints: StrategyHints::default(),
            volume_hints: None,
        }
    }

    pub fn with_runtime_features(mut self, features: RuntimeFeatures) -> Self {
        self.runtime_features = features;
        self
    }

    pub fn with_index_estimator(mut self, estimator: Arc<dyn IndexEstimator>) -> Self {
        self.index_estimator = estimator;
        self
    }

    pub fn with_join_hint(mut self, node: NodeIndex, strategy: JoinStrategy) -> Self {
        self.hints.join.insert(node, strategy);
        self
    }

    pub fn with_volume_hints(mut self, volume: Arc<FlowVolumeMap>) -> Self {
        self.volume_hints = Some(volume);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_set_round_trips() {
        let features = RuntimeFeatures::none()
            .with(RuntimeFeature::IndexJoin)
            .with(RuntimeFeature::AggregateExchange);
        assert!(features.is_enabled(RuntimeFeature::IndexJoin));
        assert!(features.is_enabled(RuntimeFeature::AggregateExchange));
        assert!(!features.is_enabled(RuntimeFeature::BroadcastExchange));
    }
}
