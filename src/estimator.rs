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

//! Index cost estimation (`spec.md` §6.1): an external collaborator interface plus a
//! conservative default implementation the optimizer falls back to when the caller
//! supplies none.

use std::collections::HashSet;
use std::sync::Arc;

use crate::binding::VariableRef;
use crate::catalog::{Index, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexAttribute {
    Find,
    RangeScan,
    FullScan,
    IndexOnly,
    SortFree,
    UniqueByKey,
    CoveredByKey,
    SingleRow,
}

#[derive(Debug, Clone, Default)]
pub struct EstimateAttributes(HashSet<IndexAttribute>);

impl EstimateAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: IndexAttribute) -> Self {
        self.0.insert(attr);
        self
    }

    pub fn contains(&self, attr: IndexAttribute) -> bool {
        self.0.contains(&attr)
    }
}

#[derive(Debug, Clone)]
pub struct EstimateResult {
    pub score: f64,
    pub attributes: EstimateAttributes,
}

impl EstimateResult {
    /// `spec.md` §4.B.4 step 3: a saved result's `single_row` attribute beats a
    /// non-`single_row` one; otherwise the higher score wins.
    pub fn better_than(&self, other: &EstimateResult) -> bool {
        let self_single = self.attributes.contains(IndexAttribute::SingleRow);
        let other_single = other.attributes.contains(IndexAttribute::SingleRow);
        if self_single != other_single {
            return self_single;
        }
        self.score > other.score
    }

    pub fn short_circuits(&self) -> bool {
        self.attributes.contains(IndexAttribute::SingleRow)
            && self.attributes.contains(IndexAttribute::IndexOnly)
    }
}

/// The number of search-key terms supplied, distinguishing an equivalent prefix from a
/// trailing range term.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSearchKey {
    pub equivalent_prefix_len: usize,
    pub has_range_suffix: bool,
}

pub trait IndexEstimator: Send + Sync {
    fn estimate(
        &self,
        index: &Arc<Index>,
        search_key: &CandidateSearchKey,
        sort_keys: &[(VariableRef, SortDirection)],
        referenced_columns: &HashSet<VariableRef>,
    ) -> Option<EstimateResult>;
}

/// A conservative default estimator grounded only in what the catalog declares: an
/// equivalent prefix covering every key column plus a unique index is `single_row`;
/// any prefix through a `find`-capable index counts as `find`; a `scan`-capable index
/// with no unused trailing key gets `range_scan`; nothing ever claims `index_only` (the
/// core has no notion of which columns are stored anywhere but the base table) or
/// `sort_free` (sort-key matching is left to a caller-supplied estimator that actually
/// understands sort order needs).
#[derive(Debug, Default)]
pub struct DefaultIndexEstimator;

impl IndexEstimator for DefaultIndexEstimator {
    fn estimate(
        &self,
        index: &Arc<Index>,
        search_key: &CandidateSearchKey,
        _sort_keys: &[(VariableRef, SortDirection)],
        _referenced_columns: &HashSet<VariableRef>,
    ) -> Option<EstimateResult> {
        let matched = search_key.equivalent_prefix_len + usize::from(search_key.has_range_suffix);
        if matched == 0 {
            return None;
        }

        let mut attrs = EstimateAttributes::new();
        let mut score = matched as f64;

        if index.supports_find() {
            attrs = attrs.with(IndexAttribute::Find);
        }
        if index.supports_scan() {
            attrs = attrs.with(IndexAttribute::RangeScan);
            score += 0.5;
        }
        if index.is_unique() {
            attrs = attrs.with(IndexAttribute::UniqueByKey);
        }
        if index.is_unique()
            && search_key.equivalent_prefix_len == index.keys.len()
            && !search_key.has_range_suffix
        {
            attrs = attrs.with(IndexAttribute::SingleRow);
            score += 10.0;
        }
        if index.is_primary() {
            score += 0.1;
        }

        Some(EstimateResult {
            score,
            attributes: attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, IndexFeature, IndexFeatures, IndexKeyElement, Table};

    fn unique_index(keys: usize) -> Arc<Index> {
        let table = Table::new(
            "t",
            (0..keys as i32)
                .map(|i| Column::new(format!("c{i}"), DataType::new("int")))
                .collect(),
        );
        Arc::new(Index {
            name: "idx".into(),
            table: Arc::clone(&table),
            keys: table
                .columns
                .iter()
                .map(|c| IndexKeyElement {
                    column: Arc::clone(c),
                    direction: SortDirection::Ascending,
                })
                .collect(),
            values: Vec::new(),
            features: IndexFeatures::from_iter([IndexFeature::Find, IndexFeature::Unique]),
        })
    }

    #[test]
    fn full_equivalent_prefix_on_unique_index_is_single_row() {
        let index = unique_index(2);
        let key = CandidateSearchKey {
            equivalent_prefix_len: 2,
            has_range_suffix: false,
        };
        let result = DefaultIndexEstimator
            .estimate(&index, &key, &[], &HashSet::new())
            .unwrap();
        assert!(result.attributes.contains(IndexAttribute::SingleRow));
        // the default estimator never claims `index_only`, so it alone never short-circuits.
        assert!(!result.short_circuits());
    }

    #[test]
    fn empty_key_yields_no_estimate() {
        let index = unique_index(2);
        let key = CandidateSearchKey {
            equivalent_prefix_len: 0,
            has_range_suffix: false,
        };
        assert!(DefaultIndexEstimator
            .estimate(&index, &key, &[], &HashSet::new())
            .is_none());
    }
}
