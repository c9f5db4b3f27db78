//! # Logical Properties
//!
//! Logical properties describe *what* a plan produces, independent of how it is
//! executed. They are shared by every expression of a memo group and are derived
//! bottom-up: a node's properties are a function of its operator and its children's
//! properties only.
//!
//! ## Output Slots
//!
//! The ordered list of slots the node produces. Parents reference these by `SlotId`.
//!
//! ## Functional Dependencies
//!
//! A functional dependency `{a, b} -> {c}` states that any two output rows agreeing
//! on `a` and `b` also agree on `c`. Dependencies are introduced by unique keys,
//! equality predicates, grouping and single-row relations, and flow upward through
//! operators that preserve them.
//!
//! Some operators *block* propagation: their dependency set is always empty no matter
//! what their inputs provide. Inline tables are the canonical example, since literal
//! rows carry no declared keys and nothing is known about their duplicates.
//!
//! Every dependency only ever mentions slots of the node's own output.

use crate::error::{PlanError, Result};
use crate::expr::{BinaryOp, Expr, JoinType};
use crate::plan::LogicalOp;
use crate::slot::{Slot, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// One functional dependency `determinants -> dependents`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncDep {
    pub determinants: BTreeSet<SlotId>,
    pub dependents: BTreeSet<SlotId>,
}

impl fmt::Display for FuncDep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_set = |set: &BTreeSet<SlotId>| {
            set.iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "{{{}}} -> {{{}}}",
            fmt_set(&self.determinants),
            fmt_set(&self.dependents)
        )
    }
}

/// A set of functional dependencies, kept free of trivial and duplicate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDeps {
    deps: Vec<FuncDep>,
}

impl FuncDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `determinants -> dependents`. Dependents already among the determinants
    /// are dropped; dependencies with the same determinants are combined.
    pub fn add(
        &mut self,
        determinants: impl IntoIterator<Item = SlotId>,
        dependents: impl IntoIterator<Item = SlotId>,
    ) {
        let determinants: BTreeSet<SlotId> = determinants.into_iter().collect();
        let dependents: BTreeSet<SlotId> = dependents
            .into_iter()
            .filter(|d| !determinants.contains(d))
            .collect();
        if dependents.is_empty() {
            return;
        }
        match self
            .deps
            .iter_mut()
            .find(|fd| fd.determinants == determinants)
        {
            Some(existing) => existing.dependents.extend(dependents),
            None => self.deps.push(FuncDep {
                determinants,
                dependents,
            }),
        }
    }

    /// `a -> b` and `b -> a`.
    pub fn add_equivalence(&mut self, a: SlotId, b: SlotId) {
        self.add([a], [b]);
        self.add([b], [a]);
    }

    pub fn extend(&mut self, other: &FuncDeps) {
        for fd in &other.deps {
            self.add(fd.determinants.iter().copied(), fd.dependents.iter().copied());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuncDep> {
        self.deps.iter()
    }

    /// Every slot determined by `slots` (including `slots` themselves).
    pub fn closure(&self, slots: &BTreeSet<SlotId>) -> BTreeSet<SlotId> {
        let mut closure = slots.clone();
        loop {
            let before = closure.len();
            for fd in &self.deps {
                if fd.determinants.is_subset(&closure) {
                    closure.extend(fd.dependents.iter().copied());
                }
            }
            if closure.len() == before {
                return closure;
            }
        }
    }

    /// Whether `lhs` functionally determines every slot in `rhs`.
    pub fn determines(&self, lhs: &BTreeSet<SlotId>, rhs: &BTreeSet<SlotId>) -> bool {
        rhs.is_subset(&self.closure(lhs))
    }

    /// Restate the dependencies over `visible` slots only.
    ///
    /// A hidden determinant is replaced by a visible slot that determines it, and
    /// each dependency keeps every visible slot in the closure of its determinants,
    /// so facts that only held transitively through hidden slots survive.
    pub fn project(&self, visible: &BTreeSet<SlotId>) -> FuncDeps {
        let mut out = FuncDeps::new();
        for fd in &self.deps {
            let determinants: Option<BTreeSet<SlotId>> = fd
                .determinants
                .iter()
                .map(|d| self.visible_representative(*d, visible))
                .collect();
            let Some(determinants) = determinants else {
                continue;
            };
            let dependents: Vec<SlotId> = self
                .closure(&determinants)
                .intersection(visible)
                .copied()
                .collect();
            out.add(determinants, dependents);
        }
        out
    }

    fn visible_representative(&self, slot: SlotId, visible: &BTreeSet<SlotId>) -> Option<SlotId> {
        if visible.contains(&slot) {
            return Some(slot);
        }
        visible
            .iter()
            .copied()
            .find(|v| self.closure(&BTreeSet::from([*v])).contains(&slot))
    }
}

impl fmt::Display for FuncDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.deps.iter().map(|fd| fd.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Properties shared by all logically equivalent plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalProperties {
    /// Output slots in order.
    pub output: Vec<Slot>,
    pub func_deps: FuncDeps,
}

impl LogicalProperties {
    pub fn output_ids(&self) -> BTreeSet<SlotId> {
        self.output.iter().map(|s| s.id).collect()
    }
}

/// Derive the properties of `op` applied to inputs with properties `children`.
///
/// Fails if the operator is unbound or is given the wrong number of inputs.
pub fn derive_properties(
    op: &LogicalOp,
    children: &[Arc<LogicalProperties>],
) -> Result<LogicalProperties> {
    let kind = op.kind();
    if op.is_unbound() {
        return Err(PlanError::unbound("logical properties", kind.to_string()));
    }
    if children.len() != kind.arity() {
        return Err(PlanError::Arity {
            kind,
            expected: kind.arity(),
            actual: children.len(),
        });
    }

    let (output, mut func_deps) = match op {
        LogicalOp::UnboundRelation(_)
        | LogicalOp::UnboundInlineTable(_)
        | LogicalOp::UnboundOneRowRelation(_) => {
            return Err(PlanError::unbound("logical properties", kind.to_string()));
        }
        LogicalOp::Scan(scan) => {
            let mut fds = FuncDeps::new();
            let all: Vec<SlotId> = scan.output.iter().map(|s| s.id).collect();
            for key in &scan.unique_keys {
                fds.add(key.iter().copied(), all.iter().copied());
            }
            (scan.output.clone(), fds)
        }
        LogicalOp::InlineTable(table) => (table.output.clone(), FuncDeps::new()),
        LogicalOp::OneRowRelation(one) => {
            let output = one
                .projects
                .iter()
                .map(|p| p.to_slot())
                .collect::<Result<Vec<_>>>()?;
            let mut fds = FuncDeps::new();
            fds.add([], output.iter().map(|s| s.id));
            (output, fds)
        }
        LogicalOp::Filter(filter) => {
            let child = &children[0];
            let mut fds = child.func_deps.clone();
            add_equalities(&mut fds, &filter.predicate);
            (child.output.clone(), fds)
        }
        LogicalOp::Project(project) => {
            let child = &children[0];
            let output = project
                .projects
                .iter()
                .map(|p| p.to_slot())
                .collect::<Result<Vec<_>>>()?;

            let mut fds = child.func_deps.clone();
            for (named, slot) in project.projects.iter().zip(&output) {
                match &named.expr {
                    Expr::SlotRef(input) if input.id != slot.id => {
                        fds.add_equivalence(input.id, slot.id)
                    }
                    Expr::SlotRef(_) => {}
                    // A computed column is determined by the inputs it reads.
                    expr if !expr.contains_aggregate() => {
                        fds.add(expr.slots().into_iter().map(|s| s.id), [slot.id])
                    }
                    _ => {}
                }
            }
            (output, fds)
        }
        LogicalOp::Join(join) => {
            let (left, right) = (&children[0], &children[1]);
            let mut output = left.output.clone();
            let mut fds = FuncDeps::new();
            match join.join_type {
                JoinType::Inner | JoinType::Cross => {
                    fds.extend(&left.func_deps);
                    fds.extend(&right.func_deps);
                    if let Some(cond) = &join.condition {
                        add_equalities(&mut fds, cond);
                    }
                }
                JoinType::Left | JoinType::Semi | JoinType::Anti => fds.extend(&left.func_deps),
                JoinType::Right => fds.extend(&right.func_deps),
                JoinType::Full => {}
            }
            if join.join_type.outputs_right() {
                let null_left = matches!(join.join_type, JoinType::Right | JoinType::Full);
                let null_right = matches!(join.join_type, JoinType::Left | JoinType::Full);
                if null_left {
                    output.iter_mut().for_each(|s| s.nullable = true);
                }
                output.extend(right.output.iter().cloned().map(|mut s| {
                    s.nullable |= null_right;
                    s
                }));
            }
            (output, fds)
        }
        LogicalOp::Aggregate(agg) => {
            let child = &children[0];
            let output = agg
                .outputs
                .iter()
                .map(|o| o.to_slot())
                .collect::<Result<Vec<_>>>()?;
            let all: Vec<SlotId> = output.iter().map(|s| s.id).collect();

            let mut fds = child.func_deps.clone();
            for (named, slot) in agg.outputs.iter().zip(&output) {
                if let Expr::SlotRef(input) = &named.expr {
                    if input.id != slot.id {
                        fds.add_equivalence(input.id, slot.id);
                    }
                }
            }

            // The grouping keys, when all of them are exposed, determine every output.
            let keys: Option<Vec<SlotId>> = agg
                .group_by
                .iter()
                .map(|key| {
                    agg.outputs
                        .iter()
                        .zip(&output)
                        .find(|(named, _)| &named.expr == key)
                        .map(|(_, slot)| slot.id)
                })
                .collect();
            if let Some(keys) = keys {
                fds.add(keys, all);
            }
            (output, fds)
        }
        LogicalOp::Sort(_) => {
            let child = &children[0];
            (child.output.clone(), child.func_deps.clone())
        }
        LogicalOp::Limit(limit) => {
            let child = &children[0];
            let mut fds = child.func_deps.clone();
            if limit.count <= 1 {
                fds.add([], child.output.iter().map(|s| s.id));
            }
            (child.output.clone(), fds)
        }
    };

    if op.blocks_func_deps() {
        func_deps = FuncDeps::new();
    }
    let visible = output.iter().map(|s| s.id).collect();
    Ok(LogicalProperties {
        func_deps: func_deps.project(&visible),
        output,
    })
}

/// Record dependencies implied by equality conjuncts of a predicate.
fn add_equalities(fds: &mut FuncDeps, predicate: &Expr) {
    for conjunct in predicate.conjuncts() {
        if let Expr::BinaryOp {
            op: BinaryOp::Eq,
            left,
            right,
        } = conjunct
        {
            match (left.as_ref(), right.as_ref()) {
                (Expr::SlotRef(a), Expr::SlotRef(b)) => fds.add_equivalence(a.id, b.id),
                (Expr::SlotRef(s), Expr::Literal(v)) | (Expr::Literal(v), Expr::SlotRef(s))
                    if !v.is_null() =>
                {
                    fds.add([], [s.id])
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableRef;
    use crate::expr::NamedExpr;
    use crate::plan::{Aggregate, InlineTable, Join, Limit, OneRowRelation, Project, Scan};
    use crate::types::DataType;

    fn ids(v: &[u32]) -> BTreeSet<SlotId> {
        v.iter().map(|i| SlotId(*i)).collect()
    }

    fn slot(id: u32, name: &str) -> Slot {
        Slot::new(SlotId(id), name, DataType::Int)
    }

    /// Scan of `t(id, a, b)` with `id` unique.
    fn scan(base: u32) -> Arc<LogicalProperties> {
        let op = LogicalOp::Scan(Scan {
            table: TableRef::new("public", "t"),
            output: vec![slot(base, "id"), slot(base + 1, "a"), slot(base + 2, "b")],
            unique_keys: vec![vec![SlotId(base)]],
        });
        Arc::new(derive_properties(&op, &[]).unwrap())
    }

    #[test]
    fn test_closure() {
        let mut fds = FuncDeps::new();
        fds.add([SlotId(1)], [SlotId(2)]);
        fds.add([SlotId(2)], [SlotId(3)]);
        assert_eq!(fds.closure(&ids(&[1])), ids(&[1, 2, 3]));
        assert!(fds.determines(&ids(&[1]), &ids(&[3])));
        assert!(!fds.determines(&ids(&[3]), &ids(&[1])));
    }

    #[test]
    fn test_trivial_and_duplicate_dependencies_are_skipped() {
        let mut fds = FuncDeps::new();
        fds.add([SlotId(1)], [SlotId(1)]);
        assert!(fds.is_empty());
        fds.add([SlotId(1)], [SlotId(2)]);
        fds.add([SlotId(1)], [SlotId(2), SlotId(3)]);
        assert_eq!(fds.len(), 1);
        assert_eq!(fds.to_string(), "[{#1} -> {#2, #3}]");
    }

    #[test]
    fn test_scan_unique_key() {
        let props = scan(0);
        assert!(props.func_deps.determines(&ids(&[0]), &ids(&[1, 2])));
    }

    #[test]
    fn test_inline_table_blocks_dependencies() {
        let op = LogicalOp::InlineTable(InlineTable {
            rows: vec![vec![Expr::int(1)]],
            output: vec![slot(0, "col1")],
        });
        let props = derive_properties(&op, &[]).unwrap();
        assert_eq!(props.output.len(), 1);
        assert!(props.func_deps.is_empty());
    }

    #[test]
    fn test_project_renames_and_drops() {
        let child = scan(0);
        // SELECT id AS k, a + 1 AS c  (b is dropped)
        let op = LogicalOp::Project(Project {
            projects: vec![
                NamedExpr::bound(Expr::SlotRef(child.output[0].clone()), Some("k".into()), SlotId(10)),
                NamedExpr::bound(
                    Expr::binary(BinaryOp::Add, Expr::SlotRef(child.output[1].clone()), Expr::int(1)),
                    Some("c".into()),
                    SlotId(11),
                ),
            ],
        });
        let props = derive_properties(&op, &[child]).unwrap();
        assert_eq!(props.output_ids(), ids(&[10, 11]));
        assert!(props.func_deps.determines(&ids(&[10]), &ids(&[11])));
        for fd in props.func_deps.iter() {
            assert!(fd.determinants.is_subset(&ids(&[10, 11])));
            assert!(fd.dependents.is_subset(&ids(&[10, 11])));
        }
    }

    #[test]
    fn test_join_equalities_and_outer_join_nullability() {
        let (left, right) = (scan(0), scan(10));
        let cond = Expr::equals(
            Expr::SlotRef(left.output[1].clone()),
            Expr::SlotRef(right.output[0].clone()),
        );
        let inner = LogicalOp::Join(Join {
            join_type: JoinType::Inner,
            condition: Some(cond.clone()),
        });
        let props = derive_properties(&inner, &[left.clone(), right.clone()]).unwrap();
        assert_eq!(props.output.len(), 6);
        // left.id -> left.a = right.id -> right.*
        assert!(props.func_deps.determines(&ids(&[0]), &ids(&[10, 11, 12])));

        let full = LogicalOp::Join(Join {
            join_type: JoinType::Full,
            condition: Some(cond),
        });
        let props = derive_properties(&full, &[left, right]).unwrap();
        assert!(props.func_deps.is_empty());
        assert!(props.output.iter().all(|s| s.nullable));
    }

    #[test]
    fn test_semi_join_keeps_left_only() {
        let op = LogicalOp::Join(Join {
            join_type: JoinType::Semi,
            condition: None,
        });
        let props = derive_properties(&op, &[scan(0), scan(10)]).unwrap();
        assert_eq!(props.output_ids(), ids(&[0, 1, 2]));
        assert!(props.func_deps.determines(&ids(&[0]), &ids(&[1, 2])));
    }

    #[test]
    fn test_aggregate_keys_determine_outputs() {
        let child = scan(0);
        let key = Expr::SlotRef(child.output[1].clone());
        let op = LogicalOp::Aggregate(Aggregate {
            group_by: vec![key.clone()],
            outputs: vec![
                NamedExpr::bound(key, None, SlotId(1)),
                NamedExpr::bound(
                    Expr::Function {
                        name: "count".into(),
                        args: vec![],
                        return_type: DataType::BigInt,
                        aggregate: true,
                        distinct: false,
                    },
                    Some("n".into()),
                    SlotId(20),
                ),
            ],
        });
        let props = derive_properties(&op, &[child]).unwrap();
        assert!(props.func_deps.determines(&ids(&[1]), &ids(&[20])));
    }

    #[test]
    fn test_single_row_relations() {
        let one = LogicalOp::OneRowRelation(OneRowRelation {
            projects: vec![NamedExpr::bound(Expr::int(1), Some("x".into()), SlotId(0))],
        });
        let props = derive_properties(&one, &[]).unwrap();
        assert!(props.func_deps.determines(&BTreeSet::new(), &ids(&[0])));

        let limit = LogicalOp::Limit(Limit {
            offset: 0,
            count: 1,
        });
        let props = derive_properties(&limit, &[scan(0)]).unwrap();
        assert!(props.func_deps.determines(&BTreeSet::new(), &ids(&[0, 1, 2])));
    }

    #[test]
    fn test_arity_is_checked() {
        let limit = LogicalOp::Limit(Limit {
            offset: 0,
            count: 5,
        });
        let err = derive_properties(&limit, &[]).unwrap_err();
        assert_eq!(err.to_string(), "Limit expects 1 input(s), got 0");
    }
}
