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

//! Range-scan endpoints and their construction from search-key terms (`spec.md` §4.C,
//! glossary "Endpoint").

use std::sync::Arc;

use crate::catalog::Column;
use crate::keyterm::SearchKeyTerm;
use crate::scalar::Scalar;

/// `unbound | inclusive e | exclusive e | prefixed_inclusive (e1..en) | prefixed_exclusive (e1..en)`.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointKind {
    Unbound,
    Inclusive(Scalar),
    Exclusive(Scalar),
    PrefixedInclusive(Vec<(Arc<Column>, Scalar)>),
    PrefixedExclusive(Vec<(Arc<Column>, Scalar)>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Endpoint {
    pub keys: Vec<(Arc<Column>, Scalar)>,
    pub kind: EndpointKind,
}

impl Default for EndpointKind {
    fn default() -> Self {
        EndpointKind::Unbound
    }
}

impl Endpoint {
    pub fn unbound() -> Self {
        Endpoint::default()
    }

    fn finish(mut self) -> Self {
        if matches!(self.kind, EndpointKind::Unbound) {
            if !self.keys.is_empty() {
                self.kind = EndpointKind::PrefixedInclusive(self.keys.clone());
            }
        }
        self
    }
}

/// Builds `(lower, upper)` from an ordered list of terms paralleling index key columns
/// (§4.C). `terms` may be shorter than `key_columns`; all but the last must be
/// equivalent.
pub fn build_endpoints(
    graph: &mut crate::relational::RelGraph,
    terms: &[(Arc<Column>, SearchKeyTerm)],
) -> crate::error::Result<(Endpoint, Endpoint)> {
    use crate::error::Error;

    let mut lower = Endpoint::unbound();
    let mut upper = Endpoint::unbound();

    if terms.is_empty() {
        return Ok((lower, upper));
    }

    for (column, term) in &terms[..terms.len() - 1] {
        if !term.equivalent() {
            return Err(Error::domain(
                "all but the last search-key term must be equivalent",
            ));
        }
        lower
            .keys
            .push((Arc::clone(column), term.clone_equivalent_factor().unwrap()));
        upper
            .keys
            .push((Arc::clone(column), term.purge_equivalent_factor(graph).unwrap()));
    }

    let (last_column, last_term) = &terms[terms.len() - 1];

    if last_term.equivalent() {
        lower
            .keys
            .push((Arc::clone(last_column), last_term.clone_equivalent_factor().unwrap()));
        upper
            .keys
            .push((Arc::clone(last_column), last_term.purge_equivalent_factor(graph).unwrap()));
        lower.kind = EndpointKind::PrefixedInclusive(lower.keys.clone());
        upper.kind = EndpointKind::PrefixedInclusive(upper.keys.clone());
        return Ok((lower, upper));
    }

    if let Some((value, inclusive)) = last_term.purge_lower_factor(graph) {
        lower.keys.push((Arc::clone(last_column), value));
        lower.kind = if inclusive {
            EndpointKind::PrefixedInclusive(lower.keys.clone())
        } else {
            EndpointKind::PrefixedExclusive(lower.keys.clone())
        };
    } else {
        lower = lower.finish();
    }

    if let Some((value, inclusive)) = last_term.purge_upper_factor(graph) {
        upper.keys.push((Arc::clone(last_column), value));
        upper.kind = if inclusive {
            EndpointKind::PrefixedInclusive(upper.keys.clone())
        } else {
            EndpointKind::PrefixedExclusive(upper.keys.clone())
        };
    } else {
        upper = upper.finish();
    }

    Ok((lower, upper))
}
