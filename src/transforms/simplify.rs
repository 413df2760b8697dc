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

//! Simplify predicate (`spec.md` §4.A): classifies a scalar predicate under
//! three-valued logic and hoists identities in `AND`/`OR`.

use crate::scalar::{BinaryOp, Scalar, ScalarValue, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    True,
    False,
    Unknown,
    TrueOrUnknown,
    FalseOrUnknown,
    Unsure,
}

impl Verdict {
    fn not(self) -> Verdict {
        match self {
            Verdict::True => Verdict::False,
            Verdict::False => Verdict::True,
            Verdict::Unknown => Verdict::Unknown,
            Verdict::TrueOrUnknown => Verdict::FalseOrUnknown,
            Verdict::FalseOrUnknown => Verdict::TrueOrUnknown,
            Verdict::Unsure => Verdict::Unsure,
        }
    }

    fn and(self, other: Verdict) -> Verdict {
        use Verdict::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, x) | (x, True) => x,
            (Unknown, Unknown) => Unknown,
            (Unknown, FalseOrUnknown) | (FalseOrUnknown, Unknown) => FalseOrUnknown,
            (Unknown, TrueOrUnknown) | (TrueOrUnknown, Unknown) => Unknown,
            (FalseOrUnknown, FalseOrUnknown) => FalseOrUnknown,
            (TrueOrUnknown, TrueOrUnknown) => TrueOrUnknown,
            (FalseOrUnknown, TrueOrUnknown) | (TrueOrUnknown, FalseOrUnknown) => FalseOrUnknown,
            _ => Unsure,
        }
    }

    fn or(self, other: Verdict) -> Verdict {
        use Verdict::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, x) | (x, False) => x,
            (Unknown, Unknown) => Unknown,
            (Unknown, TrueOrUnknown) | (TrueOrUnknown, Unknown) => TrueOrUnknown,
            (Unknown, FalseOrUnknown) | (FalseOrUnknown, Unknown) => Unknown,
            (TrueOrUnknown, TrueOrUnknown) => TrueOrUnknown,
            (FalseOrUnknown, FalseOrUnknown) => FalseOrUnknown,
            (TrueOrUnknown, FalseOrUnknown) | (FalseOrUnknown, TrueOrUnknown) => TrueOrUnknown,
            _ => Unsure,
        }
    }

    pub fn is_constant_true(self) -> bool {
        matches!(self, Verdict::True)
    }
}

/// Classifies `expr`. `AND`/`OR` hoist their non-identity side in place of the operator
/// when the other side resolves to the absorbing/identity element, mirroring the
/// `exchange`-based in-place rewrite `spec.md` §4.A describes (here expressed as
/// returning the verdict only — callers that need the rewritten tree use
/// `simplify_and_rewrite`).
pub fn simplify(expr: &Scalar) -> Verdict {
    match expr {
        Scalar::Immediate(ScalarValue::Boolean(b)) => {
            if *b {
                Verdict::True
            } else {
                Verdict::False
            }
        }
        Scalar::Immediate(ScalarValue::Null) => Verdict::Unknown,
        Scalar::Immediate(_) => Verdict::Unsure,
        Scalar::Unary(op, inner) => {
            let v = simplify(inner);
            match op {
                UnaryOp::Not => v.not(),
                UnaryOp::IsNull => match v {
                    Verdict::Unknown => Verdict::True,
                    Verdict::True | Verdict::False => Verdict::False,
                    _ => Verdict::Unsure,
                },
                UnaryOp::IsTrue => match v {
                    Verdict::True => Verdict::True,
                    Verdict::False | Verdict::Unknown => Verdict::False,
                    _ => Verdict::Unsure,
                },
                UnaryOp::IsFalse => match v {
                    Verdict::False => Verdict::True,
                    Verdict::True | Verdict::Unknown => Verdict::False,
                    _ => Verdict::Unsure,
                },
                UnaryOp::IsUnknown => match v {
                    Verdict::Unknown => Verdict::True,
                    Verdict::True | Verdict::False => Verdict::False,
                    _ => Verdict::Unsure,
                },
                UnaryOp::Negate => Verdict::Unsure,
            }
        }
        Scalar::Binary(BinaryOp::And, lhs, rhs) => simplify(lhs).and(simplify(rhs)),
        Scalar::Binary(BinaryOp::Or, lhs, rhs) => simplify(lhs).or(simplify(rhs)),
        _ => Verdict::Unsure,
    }
}

/// Rewrites `AND`/`OR` nodes whose one side is an absorbing/identity constant, hoisting
/// the other side in its place; returns the rewritten tree.
pub fn simplify_and_rewrite(expr: Scalar) -> Scalar {
    match expr {
        Scalar::Binary(BinaryOp::And, lhs, rhs) => {
            let lhs = simplify_and_rewrite(*lhs);
            let rhs = simplify_and_rewrite(*rhs);
            match (simplify(&lhs), simplify(&rhs)) {
                (Verdict::True, _) => rhs,
                (_, Verdict::True) => lhs,
                (Verdict::False, _) | (_, Verdict::False) => Scalar::bool_lit(false),
                _ => Scalar::and(lhs, rhs),
            }
        }
        Scalar::Binary(BinaryOp::Or, lhs, rhs) => {
            let lhs = simplify_and_rewrite(*lhs);
            let rhs = simplify_and_rewrite(*rhs);
            match (simplify(&lhs), simplify(&rhs)) {
                (Verdict::False, _) => rhs,
                (_, Verdict::False) => lhs,
                (Verdict::True, _) | (_, Verdict::True) => Scalar::bool_lit(true),
                _ => Scalar::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs)),
            }
        }
        Scalar::Unary(op, inner) => Scalar::Unary(op, Box::new(simplify_and_rewrite(*inner))),
        other => other,
    }
}
