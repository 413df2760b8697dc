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

//! Crate-wide error type. See `spec.md` §7 for the taxonomy this mirrors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A catalog addition whose declared name disagrees with the entity's own name, an
    /// entity already owned by another provider, a duplicate local-variable declaration
    /// within one `let`, or a variable descriptor of an unexpected kind.
    #[error("argument violation: {0}")]
    ArgumentViolation(String),

    /// A disconnected port where a pass requires connectivity, an intermediate-only
    /// operator surfacing in a step-plan walk, an operator unsupported by a given pass,
    /// an exchange/take kind mismatch, a dangling stream-variable reference, or an
    /// asymmetric `union` mapping under a distinct quantifier.
    #[error("domain violation: {0}")]
    DomainViolation(String),

    /// `add_X(..., overwrite=false)` where the name already exists locally or in a
    /// parent provider.
    #[error("catalog conflict: {0}")]
    CatalogConflict(String),

    /// A scan-key (or similar) builder was reconfigured after its first query.
    #[error("inconsistent rewrite state: {0}")]
    InconsistentRewriteState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn argument(msg: impl Into<String>) -> Self {
        Error::ArgumentViolation(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Error::DomainViolation(msg.into())
    }

    pub fn catalog_conflict(msg: impl Into<String>) -> Self {
        Error::CatalogConflict(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Error::InconsistentRewriteState(msg.into())
    }
}
