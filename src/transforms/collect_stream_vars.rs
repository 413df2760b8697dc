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

//! Collect stream variables (`spec.md` §4.A): walks a scalar expression and invokes a
//! consumer for every `stream_variable` reference found, used by the dead-variable and
//! push-down passes to discover what a predicate or column list actually depends on.

use crate::scalar::Scalar;

pub fn collect_stream_vars(expr: &Scalar, mut consumer: impl FnMut(&crate::binding::VariableRef)) {
    fn go(expr: &Scalar, consumer: &mut dyn FnMut(&crate::binding::VariableRef)) {
        if let Scalar::VariableReference(v) = expr {
            if v.is_stream_variable() {
                consumer(v);
            }
        }
        expr.for_each_child(|child| go(child, consumer));
    }
    go(expr, &mut consumer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;

    #[test]
    fn finds_stream_variables_nested_in_and() {
        let factory = VariableFactory;
        let a = factory.stream("a");
        let b = factory.stream("b");
        let local = factory.local("l");
        let expr = Scalar::and(
            Scalar::and(Scalar::var(a.clone()), Scalar::var(local.clone())),
            Scalar::var(b.clone()),
        );
        let mut found = Vec::new();
        collect_stream_vars(&expr, |v| found.push(v.clone()));
        assert_eq!(found, vec![a, b]);
    }
}
