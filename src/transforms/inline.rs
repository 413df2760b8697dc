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

//! Inline variable (`spec.md` §4.A): replaces every reference to `target` with a fresh
//! clone of `replacement`.

use crate::binding::VariableRef;
use crate::scalar::Scalar;

pub fn inline(expr: Scalar, target: &VariableRef, replacement: &Scalar) -> Scalar {
    match expr {
        Scalar::VariableReference(ref v) if v == target => replacement.clone_tree(),
        Scalar::VariableReference(_) | Scalar::Immediate(_) => expr,
        Scalar::Unary(op, inner) => Scalar::Unary(op, Box::new(inline(*inner, target, replacement))),
        Scalar::Binary(op, lhs, rhs) => Scalar::Binary(
            op,
            Box::new(inline(*lhs, target, replacement)),
            Box::new(inline(*rhs, target, replacement)),
        ),
        Scalar::Compare(op, lhs, rhs) => Scalar::Compare(
            op,
            Box::new(inline(*lhs, target, replacement)),
            Box::new(inline(*rhs, target, replacement)),
        ),
        Scalar::Match(pattern, alts) => Scalar::Match(
            Box::new(inline(*pattern, target, replacement)),
            alts.into_iter().map(|a| inline(a, target, replacement)).collect(),
        ),
        Scalar::Conditional { branches, otherwise } => Scalar::Conditional {
            branches: branches
                .into_iter()
                .map(|(c, v)| (inline(c, target, replacement), inline(v, target, replacement)))
                .collect(),
            otherwise: otherwise.map(|o| Box::new(inline(*o, target, replacement))),
        },
        Scalar::Coalesce(args) => {
            Scalar::Coalesce(args.into_iter().map(|a| inline(a, target, replacement)).collect())
        }
        Scalar::Let { variable, value, body } => {
            let value = Box::new(inline(*value, target, replacement));
            // The let-bound variable shadows `target` within its own body; but since
            // distinct `Let`s never reuse a `VariableRef` (descriptors are identity-
            // based, `spec.md` §3.2), recursing unconditionally is still correct: a
            // shadowing `variable` can never equal `target`.
            let body = Box::new(inline(*body, target, replacement));
            Scalar::Let { variable, value, body }
        }
        Scalar::FunctionCall { name, args } => Scalar::FunctionCall {
            name,
            args: args.into_iter().map(|a| inline(a, target, replacement)).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::scalar::ScalarValue;

    #[test]
    fn replaces_matching_reference() {
        let factory = VariableFactory;
        let v = factory.local("x");
        let expr = Scalar::and(Scalar::var(v.clone()), Scalar::bool_lit(true));
        let replaced = inline(expr, &v, &Scalar::Immediate(ScalarValue::Int64(7)));
        assert_eq!(
            replaced,
            Scalar::and(Scalar::Immediate(ScalarValue::Int64(7)), Scalar::bool_lit(true))
        );
    }

    #[test]
    fn leaves_other_references_untouched() {
        let factory = VariableFactory;
        let v = factory.local("x");
        let other = factory.local("x"); // same label, distinct identity
        let expr = Scalar::var(other.clone());
        let replaced = inline(expr, &v, &Scalar::bool_lit(false));
        assert_eq!(replaced, Scalar::var(other));
    }
}
