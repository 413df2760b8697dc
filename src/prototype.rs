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

//! Basic prototype processor (`spec.md` §4.E): a catalog complement that clones
//! table-and-primary-index prototypes and secondary-index prototypes, and exposes
//! `ensure` extension points a caller overrides to register the clone into its own
//! provider. Invocation always returns a fresh clone; registration is the caller's job.

use std::sync::Arc;

use crate::catalog::{Index, Table};

pub struct TableAndPrimaryIndex {
    pub table: Arc<Table>,
    pub primary_index: Arc<Index>,
}

/// Diagnostic sink passed to `ensure`; a no-op default records nothing.
pub trait PrototypeDiagnostics {
    fn note(&mut self, message: &str);
}

#[derive(Debug, Default)]
pub struct NullDiagnostics;

impl PrototypeDiagnostics for NullDiagnostics {
    fn note(&mut self, _message: &str) {}
}

/// `location` naming where in a larger setup sequence the prototype is being ensured;
/// purely informational, forwarded to diagnostics.
pub trait PrototypeProcessor {
    /// Clones `table`/`primary_index` are built from, registers nothing itself. The
    /// default implementation does nothing and reports success.
    fn ensure_table(
        &mut self,
        location: &str,
        table: &Arc<Table>,
        primary_index: &Arc<Index>,
        diag: &mut dyn PrototypeDiagnostics,
    ) -> bool {
        let _ = (location, table, primary_index, diag);
        true
    }

    /// Same extension point for a secondary index.
    fn ensure_secondary_index(
        &mut self,
        location: &str,
        secondary_index: &Arc<Index>,
        diag: &mut dyn PrototypeDiagnostics,
    ) -> bool {
        let _ = (location, secondary_index, diag);
        true
    }
}

/// The default processor: both extension points are no-ops that report success.
#[derive(Debug, Default)]
pub struct DefaultPrototypeProcessor;

impl PrototypeProcessor for DefaultPrototypeProcessor {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, IndexFeature, IndexFeatures, IndexKeyElement, SortDirection};

    #[test]
    fn default_processor_always_succeeds() {
        let table = Table::new("t", vec![Column::new("c0", DataType::new("int"))]);
        let index = Arc::new(Index {
            name: "pk".into(),
            table: Arc::clone(&table),
            keys: vec![IndexKeyElement {
                column: Arc::clone(&table.columns[0]),
                direction: SortDirection::Ascending,
            }],
            values: Vec::new(),
            features: IndexFeatures::from_iter([IndexFeature::Primary]),
        });
        let mut processor = DefaultPrototypeProcessor;
        let mut diag = NullDiagnostics;
        assert!(processor.ensure_table("setup", &table, &index, &mut diag));
        assert!(processor.ensure_secondary_index("setup", &index, &mut diag));
    }
}
