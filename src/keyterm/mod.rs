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

//! Search-key term algebra (`spec.md` §3.4): extracts `k ⊙ e` comparisons out of a
//! decomposed conjunctive predicate and merges them into per-key equivalent/range
//! terms usable as index endpoints.

use std::collections::{HashMap, HashSet};

use crate::binding::VariableRef;
use crate::error::{Error, Result};
use crate::relational::{NodeIndex, Operator, RelGraph};
use crate::scalar::{BinaryOp, CompareOp, Scalar, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    Equivalent,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermLocation {
    /// Index `index` into the conjunct list of the `Filter` at `node`.
    Filter(NodeIndex, usize),
    /// Index `index` into the residual-condition conjunct list of a join-shaped
    /// operator (`JoinRelation` / `JoinFind` / `JoinScan`) at `node`.
    Join(NodeIndex, usize),
}

#[derive(Debug, Clone)]
struct TermSlot {
    location: TermLocation,
    factor: Scalar,
}

/// One merged per-key term: an equivalent value, or a lower/upper range
/// (`spec.md` §3.4).
#[derive(Debug, Clone, Default)]
pub struct SearchKeyTerm {
    equivalent: Option<TermSlot>,
    lower: Option<(TermSlot, bool)>,
    upper: Option<(TermSlot, bool)>,
}

impl SearchKeyTerm {
    fn merge(&mut self, class: ClassKind, inclusive: bool, slot: TermSlot) {
        // Once an equivalent term has locked this key, later atoms (of any kind) are
        // conflicts and are silently dropped (`spec.md` §3.4, property P10).
        if self.equivalent.is_some() {
            return;
        }
        match class {
            ClassKind::Equivalent => {
                if self.equivalent.is_none() {
                    self.equivalent = Some(slot);
                }
            }
            ClassKind::Lower => {
                if self.lower.is_none() {
                    self.lower = Some((slot, inclusive));
                }
            }
            ClassKind::Upper => {
                if self.upper.is_none() {
                    self.upper = Some((slot, inclusive));
                }
            }
        }
    }

    pub fn equivalent(&self) -> bool {
        self.equivalent.is_some()
    }

    pub fn full_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    pub fn half_bounded(&self) -> bool {
        self.lower.is_some() != self.upper.is_some()
    }

    pub fn equivalent_factor(&self) -> Option<Scalar> {
        self.equivalent.as_ref().map(|s| s.factor.clone())
    }

    pub fn clone_equivalent_factor(&self) -> Option<Scalar> {
        self.equivalent_factor()
    }

    pub fn purge_equivalent_factor(&self, graph: &mut RelGraph) -> Option<Scalar> {
        let slot = self.equivalent.as_ref()?;
        purge_location(graph, slot.location);
        Some(slot.factor.clone())
    }

    pub fn lower_factor(&self) -> Option<(Scalar, bool)> {
        self.lower.as_ref().map(|(s, incl)| (s.factor.clone(), *incl))
    }

    pub fn upper_factor(&self) -> Option<(Scalar, bool)> {
        self.upper.as_ref().map(|(s, incl)| (s.factor.clone(), *incl))
    }

    pub fn purge_lower_factor(&self, graph: &mut RelGraph) -> Option<(Scalar, bool)> {
        let (slot, incl) = self.lower.as_ref()?;
        purge_location(graph, slot.location);
        Some((slot.factor.clone(), *incl))
    }

    pub fn purge_upper_factor(&self, graph: &mut RelGraph) -> Option<(Scalar, bool)> {
        let (slot, incl) = self.upper.as_ref()?;
        purge_location(graph, slot.location);
        Some((slot.factor.clone(), *incl))
    }
}

fn purge_location(graph: &mut RelGraph, location: TermLocation) {
    match location {
        TermLocation::Filter(node, index) => {
            if let Operator::Filter(filter) = graph.operator_mut(node) {
                if let Some(slot) = filter.conjuncts.get_mut(index) {
                    *slot = Scalar::bool_lit(true);
                }
            }
        }
        TermLocation::Join(node, index) => {
            if let Some(condition) = graph.operator_mut(node).join_condition_mut() {
                if let Some(slot) = condition.get_mut(index) {
                    *slot = Scalar::bool_lit(true);
                }
            }
        }
    }
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Ge => CompareOp::Le,
        CompareOp::Eq => CompareOp::Eq,
        CompareOp::NotEq => CompareOp::NotEq,
    }
}

fn negate(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Eq => CompareOp::NotEq,
        CompareOp::NotEq => CompareOp::Eq,
        CompareOp::Lt => CompareOp::Ge,
        CompareOp::Ge => CompareOp::Lt,
        CompareOp::Le => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Le,
    }
}

fn as_key_var<'a>(expr: &'a Scalar, keys: &HashSet<VariableRef>) -> Option<&'a VariableRef> {
    match expr {
        Scalar::VariableReference(v) if keys.contains(v) => Some(v),
        _ => None,
    }
}

/// Classifies one atom (possibly `NOT`-wrapped) against the key-variable set, returning
/// the key it bounds, the term slot it feeds, whether that bound is inclusive, and the
/// side-effect-free expression `e` on the other side.
fn classify_atom(
    atom: &Scalar,
    keys: &HashSet<VariableRef>,
) -> Option<(VariableRef, ClassKind, bool, Scalar)> {
    let (inner, negated) = match atom {
        Scalar::Unary(UnaryOp::Not, inner) => (inner.as_ref(), true),
        other => (other, false),
    };
    let Scalar::Compare(op, lhs, rhs) = inner else {
        return None;
    };
    let lhs_key = as_key_var(lhs, keys);
    let rhs_key = as_key_var(rhs, keys);
    // Both sides reference a key: unusable, skip (spec.md §3.4).
    if lhs_key.is_some() && rhs_key.is_some() {
        return None;
    }
    let (key, factor, key_is_lhs) = if let Some(k) = lhs_key {
        (k.clone(), (**rhs).clone(), true)
    } else if let Some(k) = rhs_key {
        (k.clone(), (**lhs).clone(), false)
    } else {
        return None;
    };

    let normalized = if key_is_lhs { *op } else { flip(*op) };
    let effective = if negated { negate(normalized) } else { normalized };

    let (class, inclusive) = match effective {
        CompareOp::Eq => (ClassKind::Equivalent, true),
        CompareOp::NotEq => return None,
        CompareOp::Lt => (ClassKind::Upper, false),
        CompareOp::Le => (ClassKind::Upper, true),
        CompareOp::Gt => (ClassKind::Lower, false),
        CompareOp::Ge => (ClassKind::Lower, true),
    };
    Some((key, class, inclusive, factor))
}

/// Collects and merges atoms into per-key `SearchKeyTerm`s. Once `find` has been called
/// the builder is considered queried and further `add_*` calls are rejected
/// (`spec.md` §7: "inconsistent rewrite state").
#[derive(Debug, Default)]
pub struct SearchKeyTermBuilder {
    terms: HashMap<VariableRef, SearchKeyTerm>,
    queried: bool,
}

impl SearchKeyTermBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(
        &mut self,
        node: NodeIndex,
        conjuncts: &[Scalar],
        keys: &HashSet<VariableRef>,
    ) -> Result<()> {
        self.ensure_not_queried()?;
        for (index, atom) in conjuncts.iter().enumerate() {
            self.add_atom(TermLocation::Filter(node, index), atom, keys);
        }
        Ok(())
    }

    pub fn add_join_condition(
        &mut self,
        node: NodeIndex,
        conjuncts: &[Scalar],
        keys: &HashSet<VariableRef>,
    ) -> Result<()> {
        self.ensure_not_queried()?;
        for (index, atom) in conjuncts.iter().enumerate() {
            self.add_atom(TermLocation::Join(node, index), atom, keys);
        }
        Ok(())
    }

    fn ensure_not_queried(&self) -> Result<()> {
        if self.queried {
            return Err(Error::inconsistent(
                "search-key term builder reconfigured after the first query",
            ));
        }
        Ok(())
    }

    fn add_atom(&mut self, location: TermLocation, atom: &Scalar, keys: &HashSet<VariableRef>) {
        // An AND that wasn't decomposed yet is still handled here defensively so callers
        // don't have to guarantee full decomposition up front.
        if let Scalar::Binary(BinaryOp::And, lhs, rhs) = atom {
            self.add_atom(location, lhs, keys);
            self.add_atom(location, rhs, keys);
            return;
        }
        if let Some((key, class, inclusive, factor)) = classify_atom(atom, keys) {
            let slot = TermSlot { location, factor };
            self.terms.entry(key).or_default().merge(class, inclusive, slot);
        }
    }

    pub fn find(&mut self, key: &VariableRef) -> Option<&SearchKeyTerm> {
        self.queried = true;
        self.terms.get(key)
    }

    /// All merged terms, keyed by the stream variable they bound. Used where the
    /// candidate keys aren't known up front (`collect_join_keys`, `spec.md` §4.B.6),
    /// unlike `find` which looks up one key an index/scan already names.
    pub fn terms(&mut self) -> impl Iterator<Item = (&VariableRef, &SearchKeyTerm)> {
        self.queried = true;
        self.terms.iter()
    }
}
