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

//! Scalar rewriter (`spec.md` §4.D.6): invoked by the process walker in
//! `rewrite_stream_variables` on every scalar subtree a step-plan operator still owns
//! (filter conditions, project values, search-key bound expressions). Retargets stream
//! and exchange-column references through a resolver, and mints a fresh local for every
//! `let` so nested scopes never alias across two rewritten subtrees.

use std::collections::HashMap;

use crate::binding::{VariableFactory, VariableRef};
use crate::error::{Error, Result};
use crate::scalar::Scalar;

/// What `rewrite_use` resolves a non-local variable reference to. Implemented by
/// `StreamVariableRewriterContext` for the process walk; kept as a trait so this module
/// has no dependency on that walk's bookkeeping.
pub trait StreamVariableResolver {
    fn rewrite_use(&mut self, var: &VariableRef) -> VariableRef;
}

pub struct ScalarRewriter<'a, R> {
    resolver: &'a mut R,
    factory: VariableFactory,
    locals: Vec<HashMap<VariableRef, VariableRef>>,
}

impl<'a, R: StreamVariableResolver> ScalarRewriter<'a, R> {
    pub fn new(resolver: &'a mut R) -> Self {
        ScalarRewriter {
            resolver,
            factory: VariableFactory,
            locals: Vec::new(),
        }
    }

    fn local_replacement(&self, var: &VariableRef) -> Option<VariableRef> {
        self.locals.iter().rev().find_map(|scope| scope.get(var).cloned())
    }

    pub fn rewrite(&mut self, expr: Scalar) -> Result<Scalar> {
        match expr {
            Scalar::Immediate(_) => Ok(expr),
            Scalar::VariableReference(ref v) => {
                if v.is_local_variable() {
                    if let Some(replacement) = self.local_replacement(v) {
                        return Ok(Scalar::VariableReference(replacement));
                    }
                    return Ok(expr);
                }
                Ok(Scalar::VariableReference(self.resolver.rewrite_use(v)))
            }
            Scalar::Unary(op, inner) => Ok(Scalar::Unary(op, Box::new(self.rewrite(*inner)?))),
            Scalar::Binary(op, lhs, rhs) => Ok(Scalar::Binary(
                op,
                Box::new(self.rewrite(*lhs)?),
                Box::new(self.rewrite(*rhs)?),
            )),
            Scalar::Compare(op, lhs, rhs) => Ok(Scalar::Compare(
                op,
                Box::new(self.rewrite(*lhs)?),
                Box::new(self.rewrite(*rhs)?),
            )),
            Scalar::Match(pattern, alternatives) => {
                let pattern = Box::new(self.rewrite(*pattern)?);
                let alternatives = alternatives
                    .into_iter()
                    .map(|a| self.rewrite(a))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Scalar::Match(pattern, alternatives))
            }
            Scalar::Conditional { branches, otherwise } => {
                let branches = branches
                    .into_iter()
                    .map(|(c, v)| Ok((self.rewrite(c)?, self.rewrite(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                let otherwise = match otherwise {
                    Some(o) => Some(Box::new(self.rewrite(*o)?)),
                    None => None,
                };
                Ok(Scalar::Conditional { branches, otherwise })
            }
            Scalar::Coalesce(args) => Ok(Scalar::Coalesce(
                args.into_iter().map(|a| self.rewrite(a)).collect::<Result<Vec<_>>>()?,
            )),
            Scalar::Let { variable, value, body } => {
                let value = Box::new(self.rewrite(*value)?);
                if !variable.is_local_variable() {
                    return Err(Error::argument("let binds a non-local_variable descriptor"));
                }
                if self.locals.iter().any(|scope| scope.contains_key(&variable)) {
                    return Err(Error::argument("duplicate local_variable declaration in nested let"));
                }
                let fresh = self.factory.local(variable.kind().label().to_string());
                let mut scope = HashMap::new();
                scope.insert(variable, fresh.clone());
                self.locals.push(scope);
                let body = self.rewrite(*body);
                self.locals.pop();
                Ok(Scalar::Let {
                    variable: fresh,
                    value,
                    body: Box::new(body?),
                })
            }
            Scalar::FunctionCall { name, args } => Ok(Scalar::FunctionCall {
                name,
                args: args.into_iter().map(|a| self.rewrite(a)).collect::<Result<Vec<_>>>()?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::VariableFactory;

    struct Echo;
    impl StreamVariableResolver for Echo {
        fn rewrite_use(&mut self, var: &VariableRef) -> VariableRef {
            var.clone()
        }
    }

    #[test]
    fn let_binding_gets_a_fresh_local_identity() {
        let factory = VariableFactory;
        let x = factory.local("x");
        let expr = Scalar::Let {
            variable: x.clone(),
            value: Box::new(Scalar::bool_lit(true)),
            body: Box::new(Scalar::var(x.clone())),
        };

        let mut echo = Echo;
        let mut rewriter = ScalarRewriter::new(&mut echo);
        let rewritten = rewriter.rewrite(expr).unwrap();

        match rewritten {
            Scalar::Let { variable, body, .. } => match *body {
                Scalar::VariableReference(v) => {
                    assert_ne!(v, x);
                    assert_eq!(v, variable);
                }
                other => panic!("expected variable reference, got {other:?}"),
            },
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn non_local_reference_goes_through_the_resolver() {
        struct Rename(VariableRef);
        impl StreamVariableResolver for Rename {
            fn rewrite_use(&mut self, _var: &VariableRef) -> VariableRef {
                self.0.clone()
            }
        }

        let factory = VariableFactory;
        let stream = factory.stream("s");
        let renamed = factory.stream("s_renamed");
        let mut resolver = Rename(renamed.clone());
        let mut rewriter = ScalarRewriter::new(&mut resolver);

        let rewritten = rewriter.rewrite(Scalar::var(stream)).unwrap();
        assert_eq!(rewritten, Scalar::var(renamed));
    }
}
