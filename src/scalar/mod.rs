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

//! The scalar-expression tree. `spec.md` §1 lists this as an external IR the core only
//! consumes (clones, replaces, releases sub-trees); we still need a concrete type to
//! compile against, so this module defines the minimal tagged union §3.1 describes,
//! plus the closed set of variants the core is allowed to *construct*
//! (`Scalar::bool_lit`, `Scalar::and`, `Scalar::var`).

use std::sync::Arc;

use crate::binding::VariableRef;

mod ownership;
pub use ownership::OwnershipRef;

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(u64), // bit pattern, to keep `Eq`-friendly comparisons cheap and total
    Text(Arc<str>),
}

impl ScalarValue {
    pub fn boolean(b: bool) -> Self {
        ScalarValue::Boolean(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsTrue,
    IsFalse,
    IsUnknown,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A recursive tagged scalar-expression tree. Every non-leaf variant owns its operand
/// sub-trees exclusively (`spec.md` §3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Immediate(ScalarValue),
    VariableReference(VariableRef),
    Unary(UnaryOp, Box<Scalar>),
    Binary(BinaryOp, Box<Scalar>, Box<Scalar>),
    Compare(CompareOp, Box<Scalar>, Box<Scalar>),
    /// Pattern match against a list of `(pattern, escape)` alternatives.
    Match(Box<Scalar>, Vec<Scalar>),
    Conditional {
        branches: Vec<(Scalar, Scalar)>,
        otherwise: Option<Box<Scalar>>,
    },
    Coalesce(Vec<Scalar>),
    /// `let v := value in body`.
    Let {
        variable: VariableRef,
        value: Box<Scalar>,
        body: Box<Scalar>,
    },
    FunctionCall {
        name: Arc<str>,
        args: Vec<Scalar>,
    },
}

impl Scalar {
    /// The closed set of variants the core may construct directly (`spec.md` §3.1):
    /// immediate-boolean, binary-AND, variable-reference.
    pub fn bool_lit(b: bool) -> Self {
        Scalar::Immediate(ScalarValue::Boolean(b))
    }

    pub fn and(lhs: Scalar, rhs: Scalar) -> Self {
        Scalar::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs))
    }

    pub fn var(v: VariableRef) -> Self {
        Scalar::VariableReference(v)
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self, Scalar::Immediate(ScalarValue::Boolean(true)))
    }

    /// Deep clone of the sub-tree (distinct from `Clone::clone` only in name, kept to
    /// mirror the ownership-reference vocabulary used throughout `spec.md` §4).
    pub fn clone_tree(&self) -> Scalar {
        self.clone()
    }

    /// Walks immediate children, used by generic tree walkers (decompose, simplify,
    /// inline, classify, collect-stream-variables) so each only implements the
    /// traversal shape it actually needs instead of re-deriving it.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Scalar)) {
        match self {
            Scalar::Immediate(_) | Scalar::VariableReference(_) => {}
            Scalar::Unary(_, a) => f(a),
            Scalar::Binary(_, a, b) | Scalar::Compare(_, a, b) => {
                f(a);
                f(b);
            }
            Scalar::Match(a, alts) => {
                f(a);
                for alt in alts {
                    f(alt);
                }
            }
            Scalar::Conditional {
                branches,
                otherwise,
            } => {
                for (c, v) in branches {
                    f(c);
                    f(v);
                }
                if let Some(o) = otherwise {
                    f(o);
                }
            }
            Scalar::Coalesce(args) => {
                for a in args {
                    f(a);
                }
            }
            Scalar::Let { value, body, .. } => {
                f(value);
                f(body);
            }
            Scalar::FunctionCall { args, .. } => {
                for a in args {
                    f(a);
                }
            }
        }
    }
}
