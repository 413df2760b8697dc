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

//! Per-exchange column bookkeeping (`spec.md` §3.5).

use std::collections::{HashMap, HashSet};

use crate::binding::{VariableFactory, VariableRef};

use super::ExchangeId;

/// Ordered `(origin stream-variable, allocated exchange-column)` pairs for one exchange
/// step, plus the set of exchange columns known to be consumed downstream.
#[derive(Debug, Default)]
pub struct ExchangeColumnInfo {
    pairs: Vec<(VariableRef, VariableRef)>,
    by_origin: HashMap<VariableRef, usize>,
    touched: HashSet<VariableRef>,
    factory: VariableFactory,
}

impl ExchangeColumnInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the exchange column for `origin`, allocating a fresh one (labeled after
    /// `origin`) if none exists yet.
    pub fn allocate(&mut self, origin: &VariableRef) -> VariableRef {
        if let Some(&idx) = self.by_origin.get(origin) {
            return self.pairs[idx].1.clone();
        }
        let allocated = self.factory.exchange_column(origin.kind().label().to_string());
        let idx = self.pairs.len();
        self.pairs.push((origin.clone(), allocated.clone()));
        self.by_origin.insert(origin.clone(), idx);
        allocated
    }

    /// Registers a pre-existing `(origin, exchange_column)` pair (used when the exchange
    /// column was allocated elsewhere, e.g. by `collect_exchange_columns` ahead of
    /// `rewrite_stream_variables`).
    pub fn bind(&mut self, origin: VariableRef, exchange_column: VariableRef) {
        if self.by_origin.contains_key(&origin) {
            return;
        }
        let idx = self.pairs.len();
        self.pairs.push((origin.clone(), exchange_column));
        self.by_origin.insert(origin, idx);
    }

    pub fn touch(&mut self, exchange_column: &VariableRef) {
        self.touched.insert(exchange_column.clone());
    }

    pub fn is_touched(&self, exchange_column: &VariableRef) -> bool {
        self.touched.contains(exchange_column)
    }

    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    pub fn pairs(&self) -> &[(VariableRef, VariableRef)] {
        &self.pairs
    }

    pub fn exchange_column_for(&self, origin: &VariableRef) -> Option<VariableRef> {
        self.by_origin.get(origin).map(|&idx| self.pairs[idx].1.clone())
    }

    /// Drop pairs whose exchange column is not in `touched`, preserving order.
    pub fn retain_touched(&mut self) {
        let touched = self.touched.clone();
        self.pairs.retain(|(_, col)| touched.contains(col));
        self.by_origin.clear();
        for (idx, (origin, _)) in self.pairs.iter().enumerate() {
            self.by_origin.insert(origin.clone(), idx);
        }
    }

    /// Wholesale replacement of the pair list, used by the `aggregate` exchange step
    /// (`spec.md` §4.D.4): only group keys and aggregation destinations stay visible
    /// downstream, everything else the upstream `offer` swept in is dropped.
    pub fn replace_pairs(&mut self, pairs: Vec<(VariableRef, VariableRef)>) {
        self.by_origin.clear();
        for (idx, (origin, _)) in pairs.iter().enumerate() {
            self.by_origin.insert(origin.clone(), idx);
        }
        self.pairs = pairs;
    }
}

#[derive(Debug, Default)]
pub struct ExchangeColumnInfoMap {
    map: HashMap<ExchangeId, ExchangeColumnInfo>,
}

impl ExchangeColumnInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, exchange: ExchangeId) -> &mut ExchangeColumnInfo {
        self.map.entry(exchange).or_default()
    }

    pub fn get(&self, exchange: ExchangeId) -> Option<&ExchangeColumnInfo> {
        self.map.get(&exchange)
    }

    pub fn get_mut(&mut self, exchange: ExchangeId) -> Option<&mut ExchangeColumnInfo> {
        self.map.get_mut(&exchange)
    }
}
