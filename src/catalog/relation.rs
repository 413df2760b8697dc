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

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::DataType;

/// Wire-stable tag ordering, see `spec.md` §6.5: `{table=0, view=1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelationKind {
    Table = 0,
    View = 1,
}

/// Wire-stable tag ordering, see `spec.md` §6.4: `{nothing=0, null=1, immediate=2,
/// sequence=3}`.
#[derive(Debug, Clone)]
pub enum ColumnDefault {
    Nothing,
    Null,
    Immediate(crate::scalar::ScalarValue),
    Sequence(Arc<super::Sequence>),
}

impl PartialEq for ColumnDefault {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnDefault::Nothing, ColumnDefault::Nothing) => true,
            (ColumnDefault::Null, ColumnDefault::Null) => true,
            (ColumnDefault::Immediate(a), ColumnDefault::Immediate(b)) => a == b,
            (ColumnDefault::Sequence(a), ColumnDefault::Sequence(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl ColumnDefault {
    pub fn tag(&self) -> u8 {
        match self {
            ColumnDefault::Nothing => 0,
            ColumnDefault::Null => 1,
            ColumnDefault::Immediate(_) => 2,
            ColumnDefault::Sequence(_) => 3,
        }
    }
}

/// A simple name, a data type, nullability/check-like criteria, and an optional default.
///
/// A column's owner is set exactly once, by `Table::new`, and cleared when the owning
/// relation is unregistered from its provider (see `CatalogProvider::remove_table`).
#[derive(Debug)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Opaque check-like criteria; the core never evaluates these, only carries them.
    pub criteria: Vec<String>,
    pub default: ColumnDefault,
    owner: Mutex<Weak<Table>>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
            nullable: true,
            criteria: Vec::new(),
            default: ColumnDefault::Nothing,
            owner: Mutex::new(Weak::new()),
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    pub fn owner(&self) -> Option<Arc<Table>> {
        self.owner.lock().upgrade()
    }

    fn set_owner(&self, owner: &Arc<Table>) {
        *self.owner.lock() = Arc::downgrade(owner);
    }

    fn clear_owner(&self) {
        *self.owner.lock() = Weak::new();
    }
}

/// A base relation with ordered columns.
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Arc<Column>>,
    /// id of the `CatalogProvider` that currently "blesses" this table, if any.
    pub(crate) provider_owner: Mutex<Option<u64>>,
}

impl Table {
    /// Builds a table and binds `owner` on every column exactly once.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Arc<Self> {
        let table = Arc::new(Table {
            name: name.into(),
            columns: columns.into_iter().map(Arc::new).collect(),
            provider_owner: Mutex::new(None),
        });
        for c in &table.columns {
            c.set_owner(&table);
        }
        table
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn unregister(&self) {
        for c in &self.columns {
            c.clear_owner();
        }
    }
}

/// An opaque view relation; the core never inspects its defining query.
#[derive(Debug)]
pub struct View {
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Relation {
    Table(Arc<Table>),
    View(Arc<View>),
}

impl Relation {
    pub fn name(&self) -> &str {
        match self {
            Relation::Table(t) => &t.name,
            Relation::View(v) => &v.name,
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::Table(_) => RelationKind::Table,
            Relation::View(_) => RelationKind::View,
        }
    }

    pub fn as_table(&self) -> Option<&Arc<Table>> {
        match self {
            Relation::Table(t) => Some(t),
            _ => None,
        }
    }
}
