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

//! The operator tag set (`spec.md` §3.1): intermediate operators, step-plan operators
//! (which share this same enum — they only ever appear inside a `Process`'s
//! sub-graph), and the handful of fields each needs for the passes in `spec.md` §4.

use std::sync::Arc;

use crate::binding::VariableRef;
use crate::catalog::{Column, Index, Table};
use crate::endpoint::Endpoint;
use crate::scalar::Scalar;
use crate::stepplan::ExchangeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Semi,
    Anti,
    LeftOuter,
    FullOuter,
}

impl JoinKind {
    pub fn allows_scan_rewrite_on_right(&self) -> bool {
        matches!(
            self,
            JoinKind::Inner | JoinKind::Semi | JoinKind::Anti | JoinKind::LeftOuter
        )
    }

    pub fn allows_scan_rewrite_on_left(&self) -> bool {
        matches!(self, JoinKind::Inner)
    }

    /// `direct=true` means the walk toward a bare scan must not pass through filters
    /// (`spec.md` §4.B.5).
    pub fn direct_scan_lookup(&self) -> bool {
        matches!(self, JoinKind::Anti | JoinKind::LeftOuter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub column: Arc<Column>,
    pub variable: VariableRef,
}

#[derive(Debug, Clone)]
pub struct FindOp {
    pub index: Arc<Index>,
    pub keys: Vec<(Arc<Column>, Scalar)>,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone)]
pub struct ScanOp {
    pub index: Arc<Index>,
    pub columns: Vec<ColumnMapping>,
    pub lower: Endpoint,
    pub upper: Endpoint,
    pub limit: Option<u64>,
}

impl ScanOp {
    pub fn has_endpoints(&self) -> bool {
        !matches!(self.lower.kind, crate::endpoint::EndpointKind::Unbound)
            || !matches!(self.upper.kind, crate::endpoint::EndpointKind::Unbound)
    }
}

#[derive(Debug, Clone)]
pub struct ValuesOp {
    pub columns: Vec<VariableRef>,
    pub rows: Vec<Vec<Scalar>>,
}

#[derive(Debug, Clone)]
pub struct ProjectOp {
    pub columns: Vec<(VariableRef, Scalar)>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOp {
    pub conjuncts: Vec<Scalar>,
}

impl FilterOp {
    pub fn new(condition: Scalar) -> Self {
        let mut conjuncts = Vec::new();
        crate::transforms::decompose::decompose_into(condition, &mut conjuncts);
        FilterOp { conjuncts }
    }

    pub fn condition(&self) -> Scalar {
        fold_and(&self.conjuncts)
    }
}

pub fn fold_and(conjuncts: &[Scalar]) -> Scalar {
    let mut it = conjuncts.iter().cloned();
    let Some(first) = it.next() else {
        return Scalar::bool_lit(true);
    };
    it.fold(first, Scalar::and)
}

#[derive(Debug, Clone, Default)]
pub struct BufferOp;

#[derive(Debug, Clone)]
pub struct IdentifyOp {
    pub variable: VariableRef,
}

/// Mirrors `endpoint::EndpointKind`, but keyed by the probe-side stream variable rather
/// than a catalog column: `collect_join_keys` has no index to hang a key prefix off of,
/// only the equi-join variables found on each side (`spec.md` §4.B.6).
#[derive(Debug, Clone, PartialEq)]
pub enum JoinKeyEndpointKind {
    Unbound,
    Inclusive(Scalar),
    Exclusive(Scalar),
    PrefixedInclusive(Vec<(VariableRef, Scalar)>),
    PrefixedExclusive(Vec<(VariableRef, Scalar)>),
}

impl Default for JoinKeyEndpointKind {
    fn default() -> Self {
        JoinKeyEndpointKind::Unbound
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinKeyEndpoint {
    pub keys: Vec<(VariableRef, Scalar)>,
    pub kind: JoinKeyEndpointKind,
}

#[derive(Debug, Clone)]
pub struct JoinRelationOp {
    pub kind: JoinKind,
    pub condition: Vec<Scalar>,
    /// Populated by `collect_join_keys` when a cogroup/broadcast-capable equi-join key
    /// was found; migrated onto the `join_find`/`join_scan` the step-plan builder
    /// produces for a broadcast strategy (`spec.md` §4.B.6, §4.D.1).
    pub lower: Option<JoinKeyEndpoint>,
    pub upper: Option<JoinKeyEndpoint>,
}

impl JoinRelationOp {
    pub fn new(kind: JoinKind, condition: Vec<Scalar>) -> Self {
        JoinRelationOp {
            kind,
            condition,
            lower: None,
            upper: None,
        }
    }

    pub fn has_endpoints(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct JoinFindOp {
    pub kind: JoinKind,
    pub index: Arc<Index>,
    pub columns: Vec<ColumnMapping>,
    pub keys: Vec<(Arc<Column>, Scalar)>,
    pub condition: Vec<Scalar>,
}

#[derive(Debug, Clone)]
pub struct JoinScanOp {
    pub kind: JoinKind,
    pub index: Arc<Index>,
    pub columns: Vec<ColumnMapping>,
    pub lower: Endpoint,
    pub upper: Endpoint,
    pub condition: Vec<Scalar>,
}

#[derive(Debug, Clone)]
pub struct AggregateColumn {
    pub destination: VariableRef,
    pub function: AggregateFunction,
    pub arguments: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct AggregateOp {
    pub group_keys: Vec<VariableRef>,
    pub aggregations: Vec<AggregateColumn>,
}

#[derive(Debug, Clone)]
pub struct DistinctOp {
    pub group_keys: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct LimitOp {
    pub group_keys: Vec<VariableRef>,
    pub sort_keys: Vec<(VariableRef, SortDirection)>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct SetMapping {
    pub destination: VariableRef,
    pub left: Option<VariableRef>,
    pub right: Option<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct UnionOp {
    pub all: bool,
    pub mappings: Vec<SetMapping>,
}

#[derive(Debug, Clone)]
pub struct SetOp {
    pub distinct: bool,
    pub left_keys: Vec<VariableRef>,
    pub right_keys: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct EscapeOp {
    /// `(source, destination)` pairs; `destination` is a fresh variable that renames
    /// `source`, terminating stream-variable flow search (`spec.md` §3.4).
    pub mappings: Vec<(VariableRef, VariableRef)>,
}

#[derive(Debug, Clone)]
pub struct EmitOp {
    pub columns: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct WriteOp {
    pub table: Arc<Table>,
    pub keys: Vec<VariableRef>,
    pub values: Vec<VariableRef>,
}

// ---- step-plan-only operators (live inside a `Process`'s sub-graph) ----

#[derive(Debug, Clone)]
pub struct TakeFlatOp {
    pub exchange: ExchangeId,
    pub columns: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct TakeGroupOp {
    pub exchange: ExchangeId,
    pub columns: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct CogroupSide {
    pub exchange: ExchangeId,
    pub columns: Vec<VariableRef>,
}

#[derive(Debug, Clone)]
pub struct TakeCogroupOp {
    pub groups: Vec<CogroupSide>,
}

#[derive(Debug, Clone)]
pub struct OfferOp {
    pub exchange: ExchangeId,
    /// Declared `(source variable, destination exchange column)` pairs; empty means
    /// "broadcast every currently available stream variable" (`spec.md` §4.D.4).
    pub columns: Vec<(VariableRef, VariableRef)>,
}

#[derive(Debug, Clone)]
pub struct JoinGroupOp {
    pub kind: JoinKind,
    pub condition: Vec<Scalar>,
}

/// The broadcast-strategy counterpart to `JoinGroupOp`: probes the in-memory table a
/// `broadcast` exchange materializes on the right, by the endpoints `collect_join_keys`
/// migrated from the intermediate `join_relation` (`spec.md` §4.B.6, §4.D.1). Unlike
/// `JoinFindOp`/`JoinScanOp` (which probe a catalog index), there is no index here —
/// `exchange` names the broadcast table directly, the same way `TakeFlatOp`/
/// `TakeGroupOp` name their source exchange.
#[derive(Debug, Clone)]
pub struct JoinBroadcastOp {
    pub kind: JoinKind,
    pub exchange: ExchangeId,
    pub lower: JoinKeyEndpoint,
    pub upper: JoinKeyEndpoint,
    pub condition: Vec<Scalar>,
}

#[derive(Debug, Clone)]
pub struct AggregateGroupOp {
    pub group_keys: Vec<VariableRef>,
    pub aggregations: Vec<AggregateColumn>,
}

#[derive(Debug, Clone, Default)]
pub struct SetGroupOp {
    pub distinct: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlattenOp;

/// A relational operator node. Every variant but the terminal ones
/// (`Emit`/`Write`) has at least one output port; every variant but the
/// leaves (`Find`/`Scan`/`Values`/`Take*`) has at least one input port.
#[derive(Debug, Clone)]
pub enum Operator {
    Find(FindOp),
    Scan(ScanOp),
    Values(ValuesOp),
    Project(ProjectOp),
    Filter(FilterOp),
    Buffer(BufferOp),
    Identify(IdentifyOp),
    JoinRelation(JoinRelationOp),
    JoinFind(JoinFindOp),
    JoinScan(JoinScanOp),
    AggregateRelation(AggregateOp),
    DistinctRelation(DistinctOp),
    LimitRelation(LimitOp),
    Union(UnionOp),
    Intersection(SetOp),
    Difference(SetOp),
    Escape(EscapeOp),
    Emit(EmitOp),
    Write(WriteOp),

    TakeFlat(TakeFlatOp),
    TakeGroup(TakeGroupOp),
    TakeCogroup(TakeCogroupOp),
    Offer(OfferOp),
    JoinGroup(JoinGroupOp),
    JoinBroadcast(JoinBroadcastOp),
    AggregateGroup(AggregateGroupOp),
    IntersectionGroup(SetGroupOp),
    DifferenceGroup(SetGroupOp),
    Flatten(FlattenOp),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Find(_) => "find",
            Operator::Scan(_) => "scan",
            Operator::Values(_) => "values",
            Operator::Project(_) => "project",
            Operator::Filter(_) => "filter",
            Operator::Buffer(_) => "buffer",
            Operator::Identify(_) => "identify",
            Operator::JoinRelation(_) => "join_relation",
            Operator::JoinFind(_) => "join_find",
            Operator::JoinScan(_) => "join_scan",
            Operator::AggregateRelation(_) => "aggregate_relation",
            Operator::DistinctRelation(_) => "distinct_relation",
            Operator::LimitRelation(_) => "limit_relation",
            Operator::Union(_) => "union",
            Operator::Intersection(_) => "intersection",
            Operator::Difference(_) => "difference",
            Operator::Escape(_) => "escape",
            Operator::Emit(_) => "emit",
            Operator::Write(_) => "write",
            Operator::TakeFlat(_) => "take_flat",
            Operator::TakeGroup(_) => "take_group",
            Operator::TakeCogroup(_) => "take_cogroup",
            Operator::Offer(_) => "offer",
            Operator::JoinGroup(_) => "join_group",
            Operator::JoinBroadcast(_) => "join_broadcast",
            Operator::AggregateGroup(_) => "aggregate_group",
            Operator::IntersectionGroup(_) => "intersection_group",
            Operator::DifferenceGroup(_) => "difference_group",
            Operator::Flatten(_) => "flatten",
        }
    }

    pub fn input_port_count(&self) -> usize {
        match self {
            Operator::Find(_)
            | Operator::Scan(_)
            | Operator::Values(_)
            | Operator::TakeFlat(_)
            | Operator::TakeGroup(_)
            | Operator::TakeCogroup(_) => 0,
            Operator::JoinRelation(_) => 2,
            Operator::Union(_) | Operator::Intersection(_) | Operator::Difference(_) => 2,
            Operator::Emit(_) | Operator::Write(_) => 1,
            _ => 1,
        }
    }

    pub fn output_port_count(&self) -> usize {
        match self {
            Operator::Emit(_) | Operator::Write(_) | Operator::Offer(_) => 0,
            _ => 1,
        }
    }

    pub fn is_intermediate_only(&self) -> bool {
        matches!(
            self,
            Operator::JoinRelation(_)
                | Operator::AggregateRelation(_)
                | Operator::DistinctRelation(_)
                | Operator::LimitRelation(_)
                | Operator::Union(_)
                | Operator::Intersection(_)
                | Operator::Difference(_)
        )
    }

    pub fn is_step_plan_only(&self) -> bool {
        matches!(
            self,
            Operator::TakeFlat(_)
                | Operator::TakeGroup(_)
                | Operator::TakeCogroup(_)
                | Operator::Offer(_)
                | Operator::JoinGroup(_)
                | Operator::JoinBroadcast(_)
                | Operator::AggregateGroup(_)
                | Operator::IntersectionGroup(_)
                | Operator::DifferenceGroup(_)
                | Operator::Flatten(_)
        )
    }

    /// Mutable access to the residual-condition conjunct list of join-shaped operators,
    /// used by `keyterm::purge_location` without matching on every join variant at every
    /// call site.
    pub fn join_condition_mut(&mut self) -> Option<&mut Vec<Scalar>> {
        match self {
            Operator::JoinRelation(j) => Some(&mut j.condition),
            Operator::JoinFind(j) => Some(&mut j.condition),
            Operator::JoinScan(j) => Some(&mut j.condition),
            Operator::JoinGroup(j) => Some(&mut j.condition),
            Operator::JoinBroadcast(j) => Some(&mut j.condition),
            _ => None,
        }
    }

    pub fn join_condition(&self) -> Option<&[Scalar]> {
        match self {
            Operator::JoinRelation(j) => Some(&j.condition),
            Operator::JoinFind(j) => Some(&j.condition),
            Operator::JoinScan(j) => Some(&j.condition),
            Operator::JoinGroup(j) => Some(&j.condition),
            Operator::JoinBroadcast(j) => Some(&j.condition),
            _ => None,
        }
    }
}
