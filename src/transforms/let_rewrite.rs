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

//! The recursive tree-rebuild shared by `collect_local_variables` (`spec.md` §4.B.2):
//! processes every `let` bottom-up, inlining a declarator whose value is cheap enough
//! and does not itself introduce a nested `let`.

use super::classify::{classify, Classification};
use super::inline::inline;
use crate::scalar::Scalar;

pub fn collect_local_variables(expr: Scalar, always_inline: bool) -> Scalar {
    match expr {
        Scalar::Let { variable, value, body } => {
            let value = collect_local_variables(*value, always_inline);
            let body = collect_local_variables(*body, always_inline);
            let classification = classify(&value);
            let inlinable = always_inline
                || (classification.contains(Classification::TRIVIAL)
                    && !classification.contains(Classification::VARIABLE_DECLARATION));
            if inlinable {
                inline(body, &variable, &value)
            } else {
                Scalar::Let {
                    variable,
                    value: Box::new(value),
                    body: Box::new(body),
                }
            }
        }
        Scalar::Immediate(_) | Scalar::VariableReference(_) => expr,
        Scalar::Unary(op, inner) => {
            Scalar::Unary(op, Box::new(collect_local_variables(*inner, always_inline)))
        }
        Scalar::Binary(op, lhs, rhs) => Scalar::Binary(
            op,
            Box::new(collect_local_variables(*lhs, always_inline)),
            Box::new(collect_local_variables(*rhs, always_inline)),
        ),
        Scalar::Compare(op, lhs, rhs) => Scalar::Compare(
            op,
            Box::new(collect_local_variables(*lhs, always_inline)),
            Box::new(collect_local_variables(*rhs, always_inline)),
        ),
        Scalar::Match(pattern, alts) => Scalar::Match(
            Box::new(collect_local_variables(*pattern, always_inline)),
            alts.into_iter()
                .map(|a| collect_local_variables(a, always_inline))
                .collect(),
        ),
        Scalar::Conditional { branches, otherwise } => Scalar::Conditional {
            branches: branches
                .into_iter()
                .map(|(c, v)| {
                    (
                        collect_local_variables(c, always_inline),
                        collect_local_variables(v, always_inline),
                    )
                })
                .collect(),
            otherwise: otherwise.map(|o| Box::new(collect_local_variables(*o, always_inline))),
        },
        Scalar::Coalesce(args) => Scalar::Coalesce(
            args.into_iter()
                .map(|a| collect_local_variables(a, always_inline))
                .collect(),
        ),
        Scalar::FunctionCall { name, args } => Scalar::FunctionCall {
            name,
            args: args
                .into_iter()
                .map(|a| collect_local_variables(a, always_inline))
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;
    use crate::scalar::BinaryOp;

    #[test]
    fn trivial_let_is_inlined() {
        // let x = c0 in x + x, c0 a stream variable -> c0 + c0 (scenario S6).
        let factory = VariableFactory;
        let c0 = factory.stream("c0");
        let x = factory.local("x");
        let expr = Scalar::Let {
            variable: x.clone(),
            value: Box::new(Scalar::var(c0.clone())),
            body: Box::new(Scalar::Binary(
                BinaryOp::Add,
                Box::new(Scalar::var(x.clone())),
                Box::new(Scalar::var(x)),
            )),
        };
        let rewritten = collect_local_variables(expr, false);
        assert_eq!(
            rewritten,
            Scalar::Binary(
                BinaryOp::Add,
                Box::new(Scalar::var(c0.clone())),
                Box::new(Scalar::var(c0)),
            )
        );
    }

    #[test]
    fn outer_let_survives_when_its_value_is_itself_a_surviving_let() {
        let factory = VariableFactory;
        let inner_var = factory.local("y");
        let outer_var = factory.local("x");
        // The inner declarator's value is a function call: not `trivial`, so the inner
        // `let` is never inlined and stays a `let` node.
        let inner_let = Scalar::Let {
            variable: inner_var.clone(),
            value: Box::new(Scalar::FunctionCall {
                name: "now".into(),
                args: vec![],
            }),
            body: Box::new(Scalar::var(inner_var)),
        };
        let expr = Scalar::Let {
            variable: outer_var.clone(),
            value: Box::new(inner_let),
            body: Box::new(Scalar::var(outer_var)),
        };
        let rewritten = collect_local_variables(expr, false);
        // the outer value classifies as `variable_declaration` (it's a `let`), so the
        // outer binding must survive even though nothing else about it is expensive.
        assert!(matches!(rewritten, Scalar::Let { .. }));
    }
}
