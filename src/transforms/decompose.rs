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

//! Decompose predicate (`spec.md` §4.A): flattens a conjunction into its leaf atoms.

use crate::scalar::{BinaryOp, Scalar};

/// Recurses into `AND` and hands every non-`AND` leaf to `consumer`, in left-to-right
/// order. Ownership of `expr` is consumed; every atom is handed out exactly once.
pub fn decompose(expr: Scalar, mut consumer: impl FnMut(Scalar)) {
    fn go(expr: Scalar, consumer: &mut dyn FnMut(Scalar)) {
        match expr {
            Scalar::Binary(BinaryOp::And, lhs, rhs) => {
                go(*lhs, consumer);
                go(*rhs, consumer);
            }
            other => consumer(other),
        }
    }
    go(expr, &mut consumer);
}

/// Convenience wrapper collecting atoms into `out` in order.
pub fn decompose_into(expr: Scalar, out: &mut Vec<Scalar>) {
    decompose(expr, |atom| out.push(atom));
}

/// Convenience wrapper returning a fresh `Vec`.
pub fn decompose_vec(expr: Scalar) -> Vec<Scalar> {
    let mut out = Vec::new();
    decompose_into(expr, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarValue;

    fn lit(n: i64) -> Scalar {
        Scalar::Immediate(ScalarValue::Int64(n))
    }

    #[test]
    fn round_trip_nested_and() {
        // AND(AND(a,b), AND(c,d)) decomposes to exactly [a,b,c,d].
        let (a, b, c, d) = (lit(1), lit(2), lit(3), lit(4));
        let expr = Scalar::and(Scalar::and(a.clone(), b.clone()), Scalar::and(c.clone(), d.clone()));
        let atoms = decompose_vec(expr);
        assert_eq!(atoms, vec![a, b, c, d]);
    }

    #[test]
    fn non_and_is_single_atom() {
        let atoms = decompose_vec(lit(42));
        assert_eq!(atoms, vec![lit(42)]);
    }
}
