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

//! Storage catalog: tables, columns, indices, sequences, and hierarchical providers.
//! See `spec.md` §3.3 and §6.2.

mod index;
mod provider;
mod relation;
mod sequence;

pub use index::{Index, IndexFeature, IndexFeatures, IndexKeyElement, SortDirection};
pub use provider::{CatalogProvider, SharedCatalogProvider};
pub use relation::{Column, ColumnDefault, Relation, RelationKind, Table, View};
pub use sequence::Sequence;

use std::sync::Arc;

/// Opaque, non-persisted data type tag. The scalar/physical type system itself is out of
/// scope (`spec.md` §1); the core only needs type *identity* to compare columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType(pub Arc<str>);

impl DataType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        DataType(name.into())
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
