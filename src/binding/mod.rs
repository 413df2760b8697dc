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

//! Variable descriptors: uniform handles over catalog objects and stream/local
//! variables (`spec.md` §3.2). Descriptors compare by object identity; the binding
//! factory allocates exactly one information object per logical entity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use crate::catalog::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKindTag {
    TableColumn,
    ExternalVariable,
    FrameVariable,
    StreamVariable,
    ExchangeColumn,
    LocalVariable,
}

#[derive(Debug)]
pub enum VariableKind {
    TableColumn(Arc<Column>),
    ExternalVariable { name: String },
    FrameVariable { name: String },
    StreamVariable { label: String },
    ExchangeColumn { label: String },
    LocalVariable { name: String },
}

impl VariableKind {
    pub fn tag(&self) -> VariableKindTag {
        match self {
            VariableKind::TableColumn(_) => VariableKindTag::TableColumn,
            VariableKind::ExternalVariable { .. } => VariableKindTag::ExternalVariable,
            VariableKind::FrameVariable { .. } => VariableKindTag::FrameVariable,
            VariableKind::StreamVariable { .. } => VariableKindTag::StreamVariable,
            VariableKind::ExchangeColumn { .. } => VariableKindTag::ExchangeColumn,
            VariableKind::LocalVariable { .. } => VariableKindTag::LocalVariable,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            VariableKind::TableColumn(c) => &c.name,
            VariableKind::ExternalVariable { name }
            | VariableKind::FrameVariable { name }
            | VariableKind::LocalVariable { name } => name,
            VariableKind::StreamVariable { label } | VariableKind::ExchangeColumn { label } => {
                label
            }
        }
    }
}

#[derive(Debug)]
pub struct VariableInfo {
    pub kind: VariableKind,
}

/// A variable descriptor. Two `VariableRef`s are equal iff they wrap the same
/// information object (`Rc::ptr_eq`), never by structural comparison of `kind`.
#[derive(Debug, Clone)]
pub struct VariableRef(Rc<VariableInfo>);

impl VariableRef {
    pub fn kind(&self) -> &VariableKind {
        &self.0.kind
    }

    pub fn kind_tag(&self) -> VariableKindTag {
        self.0.kind.tag()
    }

    pub fn is_stream_variable(&self) -> bool {
        self.kind_tag() == VariableKindTag::StreamVariable
    }

    pub fn is_local_variable(&self) -> bool {
        self.kind_tag() == VariableKindTag::LocalVariable
    }

    pub fn is_exchange_column(&self) -> bool {
        self.kind_tag() == VariableKindTag::ExchangeColumn
    }

    pub fn as_table_column(&self) -> Option<&Arc<Column>> {
        match &self.0.kind {
            VariableKind::TableColumn(c) => Some(c),
            _ => None,
        }
    }

    fn ptr(&self) -> *const VariableInfo {
        Rc::as_ptr(&self.0)
    }
}

impl PartialEq for VariableRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for VariableRef {}

impl Hash for VariableRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr().hash(state);
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:p}", self.0.kind.label(), self.ptr())
    }
}

/// Allocates fresh variable descriptors. Mirrors the original `binding::factory`: every
/// call (even with an identical label) mints a new, distinctly-identified descriptor.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableFactory;

impl VariableFactory {
    pub fn table_column(&self, column: Arc<Column>) -> VariableRef {
        self.make(VariableKind::TableColumn(column))
    }

    pub fn external(&self, name: impl Into<String>) -> VariableRef {
        self.make(VariableKind::ExternalVariable { name: name.into() })
    }

    pub fn frame(&self, name: impl Into<String>) -> VariableRef {
        self.make(VariableKind::FrameVariable { name: name.into() })
    }

    pub fn stream(&self, label: impl Into<String>) -> VariableRef {
        self.make(VariableKind::StreamVariable {
            label: label.into(),
        })
    }

    pub fn exchange_column(&self, label: impl Into<String>) -> VariableRef {
        self.make(VariableKind::ExchangeColumn {
            label: label.into(),
        })
    }

    pub fn local(&self, name: impl Into<String>) -> VariableRef {
        self.make(VariableKind::LocalVariable { name: name.into() })
    }

    fn make(&self, kind: VariableKind) -> VariableRef {
        VariableRef(Rc::new(VariableInfo { kind }))
    }
}
