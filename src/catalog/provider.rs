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

//! Hierarchical catalog provider (`spec.md` §3.3, §5, §6.2). `find_X` searches the
//! local store then delegates to the parent; `each_X` yields local entries first, then
//! parent entries not shadowed locally. Reads take a shared lock, mutations an
//! exclusive one; a provider's own methods never call back into itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::{Index, Relation, Sequence, Table, View};

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct Inner {
    relations: HashMap<String, Relation>,
    indices: HashMap<String, Arc<Index>>,
    sequences: HashMap<String, Arc<Sequence>>,
}

pub struct CatalogProvider {
    id: u64,
    parent: Option<SharedCatalogProvider>,
    inner: RwLock<Inner>,
}

pub type SharedCatalogProvider = Arc<CatalogProvider>;

impl CatalogProvider {
    pub fn new() -> SharedCatalogProvider {
        Self::with_parent(None)
    }

    pub fn child_of(parent: &SharedCatalogProvider) -> SharedCatalogProvider {
        Self::with_parent(Some(Arc::clone(parent)))
    }

    fn with_parent(parent: Option<SharedCatalogProvider>) -> SharedCatalogProvider {
        Arc::new(CatalogProvider {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
            parent,
            inner: RwLock::new(Inner::default()),
        })
    }

    // ---- tables / relations ----

    pub fn find_relation(&self, name: &str) -> Option<Relation> {
        if let Some(r) = self.inner.read().relations.get(name).cloned() {
            return Some(r);
        }
        self.parent.as_ref().and_then(|p| p.find_relation(name))
    }

    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        match self.find_relation(name)? {
            Relation::Table(t) => Some(t),
            Relation::View(_) => None,
        }
    }

    pub fn each_relation(&self, mut consumer: impl FnMut(&str, &Relation)) {
        let inner = self.inner.read();
        for (name, rel) in inner.relations.iter() {
            consumer(name, rel);
        }
        if let Some(parent) = &self.parent {
            parent.each_relation(|name, rel| {
                if !inner.relations.contains_key(name) {
                    consumer(name, rel);
                }
            });
        }
    }

    /// Register a table. `overwrite = false` rejects a name already bound locally or in
    /// a parent; the table must not already be blessed by a different provider.
    pub fn add_table(&self, table: Arc<Table>, overwrite: bool) -> Result<()> {
        self.check_conflict(&table.name, overwrite)?;
        self.bless_table(&table)?;
        self.inner
            .write()
            .relations
            .insert(table.name.clone(), Relation::Table(table));
        Ok(())
    }

    pub fn add_view(&self, view: Arc<View>, overwrite: bool) -> Result<()> {
        self.check_conflict(&view.name, overwrite)?;
        self.inner
            .write()
            .relations
            .insert(view.name.clone(), Relation::View(view));
        Ok(())
    }

    pub fn remove_relation(&self, name: &str) -> bool {
        let removed = self.inner.write().relations.remove(name);
        match removed {
            Some(Relation::Table(t)) => {
                t.unregister();
                *t.provider_owner.lock() = None;
                true
            }
            Some(Relation::View(_)) => true,
            None => false,
        }
    }

    // ---- indices ----

    pub fn find_index(&self, name: &str) -> Option<Arc<Index>> {
        if let Some(i) = self.inner.read().indices.get(name).cloned() {
            return Some(i);
        }
        self.parent.as_ref().and_then(|p| p.find_index(name))
    }

    pub fn each_index(&self, mut consumer: impl FnMut(&str, &Arc<Index>)) {
        let inner = self.inner.read();
        for (name, idx) in inner.indices.iter() {
            consumer(name, idx);
        }
        if let Some(parent) = &self.parent {
            parent.each_index(|name, idx| {
                if !inner.indices.contains_key(name) {
                    consumer(name, idx);
                }
            });
        }
    }

    /// All indices (local + inherited, shadow-aware) declared over `table`.
    pub fn indices_on(&self, table: &Arc<Table>) -> Vec<Arc<Index>> {
        let mut out = Vec::new();
        self.each_index(|_, idx| {
            if Arc::ptr_eq(&idx.table, table) {
                out.push(Arc::clone(idx));
            }
        });
        out
    }

    pub fn add_index(&self, index: Arc<Index>, overwrite: bool) -> Result<()> {
        self.check_index_conflict(&index.name, overwrite)?;
        self.inner
            .write()
            .indices
            .insert(index.name.clone(), index);
        Ok(())
    }

    pub fn remove_index(&self, name: &str) -> bool {
        self.inner.write().indices.remove(name).is_some()
    }

    // ---- sequences ----

    pub fn find_sequence(&self, name: &str) -> Option<Arc<Sequence>> {
        if let Some(s) = self.inner.read().sequences.get(name).cloned() {
            return Some(s);
        }
        self.parent.as_ref().and_then(|p| p.find_sequence(name))
    }

    pub fn each_sequence(&self, mut consumer: impl FnMut(&str, &Arc<Sequence>)) {
        let inner = self.inner.read();
        for (name, seq) in inner.sequences.iter() {
            consumer(name, seq);
        }
        if let Some(parent) = &self.parent {
            parent.each_sequence(|name, seq| {
                if !inner.sequences.contains_key(name) {
                    consumer(name, seq);
                }
            });
        }
    }

    pub fn add_sequence(&self, sequence: Arc<Sequence>, overwrite: bool) -> Result<()> {
        self.check_sequence_conflict(&sequence.name, overwrite)?;
        self.bless_sequence(&sequence)?;
        self.inner
            .write()
            .sequences
            .insert(sequence.name.clone(), sequence);
        Ok(())
    }

    pub fn remove_sequence(&self, name: &str) -> bool {
        let removed = self.inner.write().sequences.remove(name);
        if let Some(seq) = removed {
            *seq.provider_owner.lock() = None;
            true
        } else {
            false
        }
    }

    // ---- shared helpers ----

    fn exists_anywhere_relation(&self, name: &str) -> bool {
        self.inner.read().relations.contains_key(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.exists_anywhere_relation(name))
    }

    fn exists_anywhere_index(&self, name: &str) -> bool {
        self.inner.read().indices.contains_key(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.exists_anywhere_index(name))
    }

    fn exists_anywhere_sequence(&self, name: &str) -> bool {
        self.inner.read().sequences.contains_key(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.exists_anywhere_sequence(name))
    }

    fn check_conflict(&self, name: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists_anywhere_relation(name) {
            return Err(Error::catalog_conflict(format!(
                "relation `{name}` already registered"
            )));
        }
        Ok(())
    }

    fn check_index_conflict(&self, name: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists_anywhere_index(name) {
            return Err(Error::catalog_conflict(format!(
                "index `{name}` already registered"
            )));
        }
        Ok(())
    }

    fn check_sequence_conflict(&self, name: &str, overwrite: bool) -> Result<()> {
        if !overwrite && self.exists_anywhere_sequence(name) {
            return Err(Error::catalog_conflict(format!(
                "sequence `{name}` already registered"
            )));
        }
        Ok(())
    }

    fn bless_table(&self, table: &Arc<Table>) -> Result<()> {
        let mut owner = table.provider_owner.lock();
        match *owner {
            Some(id) if id != self.id => Err(Error::argument(format!(
                "table `{}` is already owned by another provider",
                table.name
            ))),
            _ => {
                *owner = Some(self.id);
                Ok(())
            }
        }
    }

    fn bless_sequence(&self, sequence: &Arc<Sequence>) -> Result<()> {
        let mut owner = sequence.provider_owner.lock();
        match *owner {
            Some(id) if id != self.id => Err(Error::argument(format!(
                "sequence `{}` is already owned by another provider",
                sequence.name
            ))),
            _ => {
                *owner = Some(self.id);
                Ok(())
            }
        }
    }
}
