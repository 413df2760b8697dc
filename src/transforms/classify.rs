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

//! Classify expression (`spec.md` §4.A): a small tag set describing the shape of a
//! scalar expression, used by passes that need to decide whether it's cheap enough to
//! duplicate (push-down, inlining) without re-deriving the same checks.

use crate::scalar::Scalar;

/// A small bitset over the classification tags; backed by `fixedbitset` the same way
/// `RuntimeFeatures` (`spec.md` §12) is, rather than introducing a dedicated flags type
/// for six bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification(fixedbitset::FixedBitSet);

impl Classification {
    pub const UNKNOWN: usize = 0;
    pub const CONSTANT: usize = 1;
    pub const TRIVIAL: usize = 2;
    pub const SMALL: usize = 3;
    pub const VARIABLE_DECLARATION: usize = 4;
    pub const FUNCTION_CALL: usize = 5;

    fn empty() -> Self {
        Classification(fixedbitset::FixedBitSet::with_capacity(6))
    }

    fn insert(&mut self, bit: usize) {
        self.0.insert(bit);
    }

    pub fn contains(&self, bit: usize) -> bool {
        self.0.contains(bit)
    }

    pub fn is_empty(&self) -> bool {
        self.0.count_ones(..) == 0
    }
}

impl std::ops::BitOrAssign<usize> for Classification {
    fn bitor_assign(&mut self, bit: usize) {
        self.insert(bit);
    }
}

const SMALL_NODE_LIMIT: usize = 8;

/// Counts nodes in the expression tree, capping the walk once it's clear the tree
/// exceeds `SMALL_NODE_LIMIT` (callers only care whether it's small, not the exact size).
fn node_count_at_most(expr: &Scalar, limit: usize) -> usize {
    let mut count = 1;
    expr.for_each_child(|child| {
        if count <= limit {
            count += node_count_at_most(child, limit);
        }
    });
    count
}

pub fn classify(expr: &Scalar) -> Classification {
    let mut flags = Classification::empty();

    match expr {
        Scalar::Immediate(_) => {
            flags |= Classification::CONSTANT;
            flags |= Classification::TRIVIAL;
        }
        Scalar::VariableReference(_) => {
            flags |= Classification::TRIVIAL;
        }
        Scalar::Let { .. } => {
            flags |= Classification::VARIABLE_DECLARATION;
        }
        Scalar::FunctionCall { .. } => {
            flags |= Classification::FUNCTION_CALL;
        }
        _ => {}
    }

    let never_small = matches!(expr, Scalar::FunctionCall { .. } | Scalar::Match(..));
    if !never_small && node_count_at_most(expr, SMALL_NODE_LIMIT) <= SMALL_NODE_LIMIT {
        flags |= Classification::SMALL;
    }

    if flags.is_empty() {
        flags |= Classification::UNKNOWN;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarValue;

    #[test]
    fn immediate_is_constant_and_trivial_and_small() {
        let c = classify(&Scalar::Immediate(ScalarValue::Int64(1)));
        assert!(c.contains(Classification::CONSTANT));
        assert!(c.contains(Classification::TRIVIAL));
        assert!(c.contains(Classification::SMALL));
    }

    #[test]
    fn large_tree_is_not_small() {
        let mut expr = Scalar::bool_lit(true);
        for _ in 0..20 {
            expr = Scalar::and(expr, Scalar::bool_lit(false));
        }
        assert!(!classify(&expr).contains(Classification::SMALL));
    }

    #[test]
    fn function_call_is_never_small_regardless_of_node_count() {
        let expr = Scalar::FunctionCall {
            name: std::sync::Arc::from("now"),
            args: vec![],
        };
        assert!(classify(&expr).contains(Classification::FUNCTION_CALL));
        assert!(!classify(&expr).contains(Classification::SMALL));
    }

    #[test]
    fn match_is_never_small_regardless_of_node_count() {
        let expr = Scalar::Match(Box::new(Scalar::bool_lit(true)), vec![Scalar::bool_lit(false)]);
        assert!(!classify(&expr).contains(Classification::SMALL));
    }
}
