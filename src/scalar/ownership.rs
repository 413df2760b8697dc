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

//! `ownership_reference<scalar>` (`spec.md` §5/§9): a handle that can `find()` (borrow),
//! `exchange(new)` (atomically move out the old expression and install a new one), or be
//! consumed to physically migrate a predicate atom between containers without copying.
//!
//! Plan graphs are single-threaded for the duration of a pass (`spec.md` §5), so this is
//! backed by `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use super::Scalar;

#[derive(Debug, Clone)]
pub struct OwnershipRef(Rc<RefCell<Scalar>>);

impl OwnershipRef {
    pub fn new(value: Scalar) -> Self {
        OwnershipRef(Rc::new(RefCell::new(value)))
    }

    /// Borrow the current value without taking ownership.
    pub fn find(&self) -> Ref<'_, Scalar> {
        self.0.borrow()
    }

    /// Atomically move out the old expression and install `new` in its place, returning
    /// the old one.
    pub fn exchange(&self, new: Scalar) -> Scalar {
        self.0.replace(new)
    }

    /// Move the expression out, leaving a literal `TRUE` in its place (`spec.md`
    /// glossary: "Purge").
    pub fn purge(&self) -> Scalar {
        self.exchange(Scalar::bool_lit(true))
    }

    /// Copy the expression without disturbing the source slot.
    pub fn clone_value(&self) -> Scalar {
        self.find().clone()
    }

    pub fn is_unique(&self) -> bool {
        Rc::strong_count(&self.0) == 1
    }
}
