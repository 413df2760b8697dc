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

use std::sync::Arc;

use super::relation::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct IndexKeyElement {
    pub column: Arc<super::Column>,
    pub direction: SortDirection,
}

/// Wire-stable bitset over `{primary, find, scan, unique, unique_constraint}`, see
/// `spec.md` §6.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexFeature {
    Primary = 0b00001,
    Find = 0b00010,
    Scan = 0b00100,
    Unique = 0b01000,
    UniqueConstraint = 0b10000,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexFeatures(u8);

impl IndexFeatures {
    pub fn empty() -> Self {
        IndexFeatures(0)
    }

    pub fn from_iter(features: impl IntoIterator<Item = IndexFeature>) -> Self {
        let mut bits = 0u8;
        for f in features {
            bits |= f as u8;
        }
        IndexFeatures(bits)
    }

    pub fn contains(&self, f: IndexFeature) -> bool {
        self.0 & (f as u8) != 0
    }

    pub fn insert(&mut self, f: IndexFeature) {
        self.0 |= f as u8;
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Origin table, simple name, ordered key elements, unordered value columns, and a
/// feature set. See `spec.md` §3.3.
#[derive(Debug)]
pub struct Index {
    pub name: String,
    pub table: Arc<Table>,
    pub keys: Vec<IndexKeyElement>,
    pub values: Vec<Arc<super::Column>>,
    pub features: IndexFeatures,
}

impl Index {
    pub fn is_primary(&self) -> bool {
        self.features.contains(IndexFeature::Primary)
    }

    pub fn supports_find(&self) -> bool {
        self.features.contains(IndexFeature::Find)
    }

    pub fn supports_scan(&self) -> bool {
        self.features.contains(IndexFeature::Scan)
    }

    pub fn is_unique(&self) -> bool {
        self.features.contains(IndexFeature::Unique)
    }

    /// Position of `column` within the declared key order, if any.
    pub fn key_position(&self, column: &Arc<super::Column>) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| Arc::ptr_eq(&k.column, column))
    }
}
