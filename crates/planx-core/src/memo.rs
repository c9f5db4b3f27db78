//! # Memo
//!
//! The memo is the search space of a Cascades-style optimizer: a set of *groups*,
//! each an equivalence class of logically equivalent plans, where each alternative
//! (a *group expression*) is one operator whose inputs are groups rather than
//! concrete subtrees. A driver explores the space by applying rules to group
//! expressions and adding the results back with `add_expr_to_group`.
//!
//! ## Deduplication
//!
//! Every group expression has a *signature*: its operator payload plus the ids of
//! its child groups. The memo holds at most one expression per signature. Inserting
//! a plan whose signature is already known returns the existing group, which makes
//! `insert` idempotent and lets separately discovered subplans share groups.
//!
//! ## Merging
//!
//! When a rule produces, for group `A`, an expression that already lives in group
//! `B`, the two groups are proven equivalent and are merged. The surviving group
//! (the one with the smaller id) takes over all expressions of the absorbed group,
//! and every parent expression that referenced the absorbed group is rewritten to
//! reference the survivor. Rewriting can make two parents identical; the duplicate
//! is retired and, if the two parents lived in different groups, those groups are
//! merged as well. Merges that would make a group its own descendant are rejected.
//!
//! Absorbed group ids stay valid: lookups follow the merge chain to the survivor.
//!
//! ## Driver Hooks
//!
//! Each group expression carries an explore state and the set of rules already
//! applied to it, so a driver never fires the same rule on the same expression twice.
//! Plans are rebuilt from the memo with `extract` and a driver-supplied choice
//! function.

use crate::error::PlanError;
use crate::plan::{LogicalOp, LogicalPlan, PlanRef};
use crate::properties::{derive_properties, LogicalProperties};
use crate::slot::SlotId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Identifier of a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Identifier of a group expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("unknown group expression {0}")]
    UnknownExpr(ExprId),

    #[error("merging {a} and {b} would make a group its own input")]
    Cycle { a: GroupId, b: GroupId },

    #[error(
        "output of {group} is {{{}}}, expression produces {{{}}}",
        fmt_ids(.expected),
        fmt_ids(.actual)
    )]
    PropertyMismatch {
        group: GroupId,
        expected: Vec<SlotId>,
        actual: Vec<SlotId>,
    },

    #[error("no expression chosen for {0}")]
    NoChoice(GroupId),

    #[error("{expr} is not a member of {group}")]
    InvalidChoice { group: GroupId, expr: ExprId },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

fn fmt_ids(ids: &[SlotId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = MemoError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExploreState {
    Unexplored,
    Explored,
}

/// One alternative in a group: an operator over child groups.
#[derive(Debug, Clone)]
pub struct MemoExpr {
    pub id: ExprId,
    pub op: LogicalOp,
    /// Child groups. Always the current (unmerged) ids.
    pub children: Vec<GroupId>,
    pub group: GroupId,
    pub state: ExploreState,
    applied_rules: HashSet<u64>,
    /// Set when a merge proved the expression identical to another one.
    retired: bool,
}

impl MemoExpr {
    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

/// An equivalence class of group expressions sharing one set of logical properties.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub logical_exprs: Vec<ExprId>,
    props: Arc<LogicalProperties>,
    merged_into: Option<GroupId>,
}

impl Group {
    pub fn properties(&self) -> &Arc<LogicalProperties> {
        &self.props
    }

    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }
}

/// Result of inserting a group expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub group: GroupId,
    pub expr: ExprId,
    /// False when the signature was already present.
    pub inserted: bool,
}

type Signature = (LogicalOp, Vec<GroupId>);

#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<MemoExpr>,
    /// Signature -> the live expression carrying it.
    index: HashMap<Signature, ExprId>,
    /// Group -> expressions that use it as an input.
    parents: HashMap<GroupId, BTreeSet<ExprId>>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a bound plan tree into the memo, bottom-up. Returns the root's group.
    pub fn insert(&mut self, plan: &PlanRef) -> Result<GroupId> {
        if plan.is_unbound() {
            return Err(PlanError::unbound("memo group", plan.kind().to_string()).into());
        }
        let children = plan
            .children()
            .iter()
            .map(|child| self.insert(child))
            .collect::<Result<Vec<_>>>()?;
        let outcome = self.insert_expr(plan.op().clone(), children)?;
        trace!(
            "insert {} -> {} ({})",
            plan.kind(),
            outcome.group,
            if outcome.inserted { "new" } else { "existing" }
        );
        Ok(outcome.group)
    }

    /// Insert one operator over existing groups. A known signature returns its group
    /// unchanged; otherwise a new single-expression group is created.
    pub fn insert_expr(&mut self, op: LogicalOp, children: Vec<GroupId>) -> Result<InsertOutcome> {
        let children = self.resolve_all(&children)?;
        let signature = (op, children);
        if let Some(&existing) = self.index.get(&signature) {
            return Ok(InsertOutcome {
                group: self.root(self.exprs[existing.0 as usize].group),
                expr: existing,
                inserted: false,
            });
        }

        let props = self.derive(&signature.0, &signature.1)?;
        let group = GroupId(self.groups.len() as u32);
        self.groups.push(Group {
            id: group,
            logical_exprs: Vec::new(),
            props: Arc::new(props),
            merged_into: None,
        });
        let expr = self.push_expr(signature, group);
        debug!("memo: new group {} with {}", group, expr);
        Ok(InsertOutcome {
            group,
            expr,
            inserted: true,
        })
    }

    /// Add a rule-produced alternative to `group`.
    ///
    /// If the signature already lives in another group, the two groups are merged and
    /// the returned group is the survivor. The alternative's output slots must be the
    /// group's output slots.
    pub fn add_expr_to_group(
        &mut self,
        group: GroupId,
        op: LogicalOp,
        children: Vec<GroupId>,
    ) -> Result<InsertOutcome> {
        let group = self.resolve(group)?;
        let children = self.resolve_all(&children)?;
        for &child in &children {
            if child == group || self.reaches(child, group) {
                return Err(MemoError::Cycle { a: group, b: child });
            }
        }

        let signature = (op, children);
        if let Some(&existing) = self.index.get(&signature) {
            let other = self.root(self.exprs[existing.0 as usize].group);
            let survivor = if other == group {
                group
            } else {
                self.merge(group, other)?
            };
            return Ok(InsertOutcome {
                group: survivor,
                expr: existing,
                inserted: false,
            });
        }

        let props = self.derive(&signature.0, &signature.1)?;
        self.check_output(group, &props)?;
        let expr = self.push_expr(signature, group);
        trace!("memo: added {} to {}", expr, group);
        Ok(InsertOutcome {
            group,
            expr,
            inserted: true,
        })
    }

    /// Merge two groups proven equivalent. Returns the surviving group.
    ///
    /// A merge that fails part-way through a cascade leaves the merges already done
    /// in place.
    pub fn merge(&mut self, a: GroupId, b: GroupId) -> Result<GroupId> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        if a == b {
            return Ok(a);
        }
        if self.reaches(a, b) || self.reaches(b, a) {
            return Err(MemoError::Cycle { a, b });
        }
        let absorbed_props = Arc::clone(&self.groups[b.0 as usize].props);
        self.check_output(a, &absorbed_props)?;

        let (survivor, absorbed) = if a < b { (a, b) } else { (b, a) };
        debug!("memo: merging {} into {}", absorbed, survivor);

        let moved = std::mem::take(&mut self.groups[absorbed.0 as usize].logical_exprs);
        for &e in &moved {
            self.exprs[e.0 as usize].group = survivor;
        }
        self.groups[survivor.0 as usize].logical_exprs.extend(moved);
        self.groups[absorbed.0 as usize].merged_into = Some(survivor);

        let mut pending = Vec::new();
        let referencing = self.parents.remove(&absorbed).unwrap_or_default();
        for p in referencing {
            if self.exprs[p.0 as usize].retired {
                continue;
            }
            let old_signature = self.signature(p);
            if self.index.get(&old_signature) == Some(&p) {
                self.index.remove(&old_signature);
            }
            for child in &mut self.exprs[p.0 as usize].children {
                if *child == absorbed {
                    *child = survivor;
                }
            }

            let new_signature = self.signature(p);
            match self.index.get(&new_signature).copied() {
                Some(q) if q != p => {
                    let (pg, qg) = (
                        self.root(self.exprs[p.0 as usize].group),
                        self.root(self.exprs[q.0 as usize].group),
                    );
                    self.retire(p);
                    trace!("memo: {} duplicates {} after merge", p, q);
                    if pg != qg {
                        pending.push((pg, qg));
                    }
                }
                _ => {
                    self.index.insert(new_signature, p);
                    self.parents.entry(survivor).or_default().insert(p);
                }
            }
        }

        for (x, y) in pending {
            self.merge(x, y)?;
        }
        Ok(self.root(survivor))
    }

    /// Rebuild a plan tree from `group`, asking `choose` for one expression per group.
    ///
    /// Every node of the result carries the group it was taken from.
    pub fn extract<F>(&self, group: GroupId, mut choose: F) -> Result<PlanRef>
    where
        F: FnMut(&Memo, &Group) -> Option<ExprId>,
    {
        self.extract_with(group, &mut choose)
    }

    fn extract_with<F>(&self, group: GroupId, choose: &mut F) -> Result<PlanRef>
    where
        F: FnMut(&Memo, &Group) -> Option<ExprId>,
    {
        let group = self.resolve(group)?;
        let g = &self.groups[group.0 as usize];
        let chosen = choose(self, g).ok_or(MemoError::NoChoice(group))?;
        if !g.logical_exprs.contains(&chosen) {
            return Err(MemoError::InvalidChoice {
                group,
                expr: chosen,
            });
        }
        let expr = &self.exprs[chosen.0 as usize];
        let children = expr
            .children
            .iter()
            .map(|&c| self.extract_with(c, choose))
            .collect::<Result<Vec<_>>>()?;
        Ok(LogicalPlan::new(expr.op.clone(), children).with_group(group))
    }

    /// Follow merges to the group currently holding `id`'s expressions.
    pub fn resolve(&self, id: GroupId) -> Result<GroupId> {
        if id.0 as usize >= self.groups.len() {
            return Err(MemoError::UnknownGroup(id));
        }
        Ok(self.root(id))
    }

    pub fn group(&self, id: GroupId) -> Result<&Group> {
        let id = self.resolve(id)?;
        Ok(&self.groups[id.0 as usize])
    }

    pub fn expr(&self, id: ExprId) -> Result<&MemoExpr> {
        self.exprs.get(id.0 as usize).ok_or(MemoError::UnknownExpr(id))
    }

    pub fn mark_explored(&mut self, id: ExprId) -> Result<()> {
        self.expr_mut(id)?.state = ExploreState::Explored;
        Ok(())
    }

    pub fn is_explored(&self, id: ExprId) -> Result<bool> {
        Ok(self.expr(id)?.state == ExploreState::Explored)
    }

    /// Live expressions of `group` that the driver has not explored yet.
    pub fn unexplored(&self, group: GroupId) -> Result<Vec<ExprId>> {
        Ok(self
            .group(group)?
            .logical_exprs
            .iter()
            .copied()
            .filter(|e| self.exprs[e.0 as usize].state == ExploreState::Unexplored)
            .collect())
    }

    pub fn rule_applied(&self, id: ExprId, rule_hash: u64) -> bool {
        self.exprs
            .get(id.0 as usize)
            .is_some_and(|e| e.applied_rules.contains(&rule_hash))
    }

    pub fn mark_rule_applied(&mut self, id: ExprId, rule_hash: u64) -> Result<()> {
        self.expr_mut(id)?.applied_rules.insert(rule_hash);
        Ok(())
    }

    /// Number of live (not merged away) groups.
    pub fn num_groups(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_merged()).count()
    }

    /// Number of live (not retired) group expressions.
    pub fn num_exprs(&self) -> usize {
        self.exprs.iter().filter(|e| !e.retired).count()
    }

    /// Serializable view of the live groups, for debugging a driver.
    pub fn snapshot(&self) -> MemoSnapshot {
        let groups = self
            .groups
            .iter()
            .filter(|g| !g.is_merged())
            .map(|g| GroupSnapshot {
                id: g.id,
                output: g.props.output.iter().map(|s| s.to_string()).collect(),
                func_deps: g.props.func_deps.iter().map(|fd| fd.to_string()).collect(),
                exprs: g
                    .logical_exprs
                    .iter()
                    .map(|&e| {
                        let expr = &self.exprs[e.0 as usize];
                        ExprSnapshot {
                            id: expr.id,
                            op: expr.op.to_string(),
                            children: expr.children.clone(),
                            explored: expr.state == ExploreState::Explored,
                        }
                    })
                    .collect(),
            })
            .collect();
        MemoSnapshot { groups }
    }

    fn root(&self, mut id: GroupId) -> GroupId {
        while let Some(next) = self.groups[id.0 as usize].merged_into {
            id = next;
        }
        id
    }

    fn resolve_all(&self, ids: &[GroupId]) -> Result<Vec<GroupId>> {
        ids.iter().map(|&id| self.resolve(id)).collect()
    }

    fn expr_mut(&mut self, id: ExprId) -> Result<&mut MemoExpr> {
        self.exprs
            .get_mut(id.0 as usize)
            .ok_or(MemoError::UnknownExpr(id))
    }

    fn signature(&self, id: ExprId) -> Signature {
        let expr = &self.exprs[id.0 as usize];
        (expr.op.clone(), expr.children.clone())
    }

    fn derive(&self, op: &LogicalOp, children: &[GroupId]) -> Result<LogicalProperties> {
        let child_props: Vec<Arc<LogicalProperties>> = children
            .iter()
            .map(|c| Arc::clone(&self.groups[c.0 as usize].props))
            .collect();
        Ok(derive_properties(op, &child_props)?)
    }

    fn check_output(&self, group: GroupId, props: &LogicalProperties) -> Result<()> {
        let expected = self.groups[group.0 as usize].props.output_ids();
        let actual = props.output_ids();
        if expected != actual {
            return Err(MemoError::PropertyMismatch {
                group,
                expected: expected.into_iter().collect(),
                actual: actual.into_iter().collect(),
            });
        }
        Ok(())
    }

    fn push_expr(&mut self, signature: Signature, group: GroupId) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        let (op, children) = signature;
        for &child in &children {
            self.parents.entry(child).or_default().insert(id);
        }
        self.index.insert((op.clone(), children.clone()), id);
        self.exprs.push(MemoExpr {
            id,
            op,
            children,
            group,
            state: ExploreState::Unexplored,
            applied_rules: HashSet::new(),
            retired: false,
        });
        self.groups[group.0 as usize].logical_exprs.push(id);
        id
    }

    fn retire(&mut self, id: ExprId) {
        let group = self.root(self.exprs[id.0 as usize].group);
        self.groups[group.0 as usize]
            .logical_exprs
            .retain(|&e| e != id);
        let expr = &mut self.exprs[id.0 as usize];
        expr.retired = true;
        for child in &expr.children {
            if let Some(set) = self.parents.get_mut(child) {
                set.remove(&id);
            }
        }
    }

    /// Whether `to` is a strict descendant of `from`.
    fn reaches(&self, from: GroupId, to: GroupId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::from([from]);
        while let Some(g) = stack.pop() {
            for &e in &self.groups[g.0 as usize].logical_exprs {
                for &child in &self.exprs[e.0 as usize].children {
                    let child = self.root(child);
                    if child == to {
                        return true;
                    }
                    if visited.insert(child) {
                        stack.push(child);
                    }
                }
            }
        }
        false
    }
}

/// Choice function taking each group's first expression.
pub fn first_expr(_memo: &Memo, group: &Group) -> Option<ExprId> {
    group.logical_exprs.first().copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoSnapshot {
    pub groups: Vec<GroupSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub output: Vec<String>,
    pub func_deps: Vec<String>,
    pub exprs: Vec<ExprSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprSnapshot {
    pub id: ExprId,
    pub op: String,
    pub children: Vec<GroupId>,
    pub explored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableRef;
    use crate::expr::{BinaryOp, Expr, JoinType};
    use crate::plan::{Filter, InlineTable, Limit, Scan};
    use crate::slot::Slot;
    use crate::types::DataType;

    fn scan_op(name: &str, first_id: u32) -> LogicalOp {
        LogicalOp::Scan(Scan {
            table: TableRef::new("public", name),
            output: vec![
                Slot::new(SlotId(first_id), "id", DataType::BigInt),
                Slot::new(SlotId(first_id + 1), "v", DataType::Int),
            ],
            unique_keys: vec![vec![SlotId(first_id)]],
        })
    }

    fn scan(name: &str, first_id: u32) -> PlanRef {
        LogicalPlan::leaf(scan_op(name, first_id))
    }

    fn limit(count: u64) -> LogicalOp {
        LogicalOp::Limit(Limit { offset: 0, count })
    }

    fn filter_v_gt(value: i64, slot_id: u32) -> LogicalOp {
        LogicalOp::Filter(Filter {
            predicate: Expr::binary(
                BinaryOp::Gt,
                Expr::SlotRef(Slot::new(SlotId(slot_id), "v", DataType::Int)),
                Expr::int(value),
            ),
        })
    }

    #[test]
    fn test_insert_is_idempotent() {
        let plan = LogicalPlan::limit(0, 10, scan("t", 0));
        let mut memo = Memo::new();
        let first = memo.insert(&plan).unwrap();
        let groups = memo.num_groups();
        let exprs = memo.num_exprs();

        let second = memo.insert(&plan).unwrap();
        assert_eq!(first, second);
        assert_eq!(memo.num_groups(), groups);
        assert_eq!(memo.num_exprs(), exprs);
        assert_eq!(groups, 2);
    }

    #[test]
    fn test_shared_subplans_share_groups() {
        let mut memo = Memo::new();
        let a = memo.insert(&LogicalPlan::limit(0, 1, scan("t", 0))).unwrap();
        let b = memo.insert(&LogicalPlan::limit(0, 2, scan("t", 0))).unwrap();
        assert_ne!(a, b);
        // Scan(t) is shared.
        assert_eq!(memo.num_groups(), 3);
    }

    #[test]
    fn test_unbound_plan_is_rejected() {
        let mut memo = Memo::new();
        let plan = LogicalPlan::limit(0, 1, LogicalPlan::unbound_relation(&["t"]));
        let err = memo.insert(&plan).unwrap_err();
        assert!(matches!(err, MemoError::Plan(PlanError::Unbound { .. })));
        assert_eq!(memo.num_groups(), 0);
    }

    #[test]
    fn test_extract_round_trip_preserves_output() {
        let plan = LogicalPlan::join(
            JoinType::Inner,
            None,
            LogicalPlan::limit(0, 5, scan("a", 0)),
            scan("b", 10),
        );
        let mut memo = Memo::new();
        let root = memo.insert(&plan).unwrap();
        let extracted = memo.extract(root, first_expr).unwrap();
        assert_eq!(extracted.output().unwrap(), plan.output().unwrap());
        assert_eq!(extracted.group(), Some(root));
        assert!(extracted.children().iter().all(|c| c.group().is_some()));
    }

    #[test]
    fn test_extract_rejects_bad_choices() {
        let mut memo = Memo::new();
        let root = memo.insert(&scan("t", 0)).unwrap();
        assert_eq!(
            memo.extract(root, |_, _| None).unwrap_err(),
            MemoError::NoChoice(root)
        );
        assert!(matches!(
            memo.extract(root, |_, _| Some(ExprId(99))),
            Err(MemoError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn test_add_expr_to_group_appends_alternative() {
        let mut memo = Memo::new();
        let scan_group = memo.insert(&scan("t", 0)).unwrap();
        let filtered = memo
            .insert_expr(filter_v_gt(1, 1), vec![scan_group])
            .unwrap()
            .group;
        let limited = memo
            .insert_expr(limit(10), vec![filtered])
            .unwrap()
            .group;

        // Limit(Filter(x)) == Filter(Limit(x)) does not hold in general, but the memo
        // only checks that the alternative produces the same slots.
        let inner = memo.insert_expr(limit(10), vec![scan_group]).unwrap().group;
        let outcome = memo
            .add_expr_to_group(limited, filter_v_gt(1, 1), vec![inner])
            .unwrap();
        assert!(outcome.inserted);
        assert_eq!(outcome.group, limited);
        assert_eq!(memo.group(limited).unwrap().logical_exprs.len(), 2);

        // Adding it again is a no-op.
        let again = memo
            .add_expr_to_group(limited, filter_v_gt(1, 1), vec![inner])
            .unwrap();
        assert!(!again.inserted);
        assert_eq!(again.expr, outcome.expr);
    }

    #[test]
    fn test_add_expr_with_different_output_is_rejected() {
        let mut memo = Memo::new();
        let t = memo.insert(&scan("t", 0)).unwrap();
        let u = memo.insert(&scan("u", 10)).unwrap();
        let limited = memo.insert_expr(limit(1), vec![t]).unwrap().group;
        let err = memo
            .add_expr_to_group(limited, limit(1), vec![u])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("output of {} is {{#0, #1}}, expression produces {{#10, #11}}", limited)
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut memo = Memo::new();
        let t = memo.insert(&scan("t", 0)).unwrap();
        let limited = memo.insert_expr(limit(5), vec![t]).unwrap().group;
        let err = memo
            .add_expr_to_group(limited, limit(5), vec![limited])
            .unwrap_err();
        assert!(matches!(err, MemoError::Cycle { .. }));

        let err = memo.merge(t, limited).unwrap_err();
        assert_eq!(err, MemoError::Cycle { a: t, b: limited });
    }

    #[test]
    fn test_merge_rewrites_parents_and_cascades() {
        let mut memo = Memo::new();
        // Two scans of the same table under different names, equivalent by assumption.
        let op_a = scan_op("t", 0);
        let a = memo.insert_expr(op_a, vec![]).unwrap().group;
        let b = memo
            .insert_expr(
                LogicalOp::Scan(Scan {
                    table: TableRef::new("public", "t_alias"),
                    output: vec![
                        Slot::new(SlotId(0), "id", DataType::BigInt),
                        Slot::new(SlotId(1), "v", DataType::Int),
                    ],
                    unique_keys: vec![],
                }),
                vec![],
            )
            .unwrap()
            .group;
        let pa = memo.insert_expr(limit(3), vec![a]).unwrap();
        let pb = memo.insert_expr(limit(3), vec![b]).unwrap();
        assert_ne!(pa.group, pb.group);
        let live_before = memo.num_exprs();

        let survivor = memo.merge(a, b).unwrap();
        assert_eq!(survivor, a);
        assert_eq!(memo.resolve(b).unwrap(), a);
        assert_eq!(memo.group(a).unwrap().logical_exprs.len(), 2);

        // The two parents became identical: one is retired and their groups merged.
        assert_eq!(memo.resolve(pa.group).unwrap(), memo.resolve(pb.group).unwrap());
        assert!(memo.expr(pb.expr).unwrap().is_retired());
        assert_eq!(memo.num_exprs(), live_before - 1);
        assert_eq!(memo.num_groups(), 2);

        // Re-inserting the duplicate signature lands in the merged group.
        let again = memo.insert_expr(limit(3), vec![b]).unwrap();
        assert_eq!(again.expr, pa.expr);
        assert!(!again.inserted);
    }

    #[test]
    fn test_add_expr_found_elsewhere_merges_groups() {
        let mut memo = Memo::new();
        let t = memo.insert(&scan("t", 0)).unwrap();
        let g1 = memo.insert_expr(limit(7), vec![t]).unwrap().group;
        let g2 = memo
            .insert_expr(LogicalOp::Limit(Limit { offset: 0, count: 8 }), vec![t])
            .unwrap()
            .group;
        let outcome = memo.add_expr_to_group(g2, limit(7), vec![t]).unwrap();
        assert!(!outcome.inserted);
        assert_eq!(outcome.group, g1);
        assert_eq!(memo.resolve(g2).unwrap(), g1);
    }

    #[test]
    fn test_explore_state_and_rule_tracking() {
        let mut memo = Memo::new();
        let g = memo.insert(&scan("t", 0)).unwrap();
        let e = memo.group(g).unwrap().logical_exprs[0];

        assert_eq!(memo.unexplored(g).unwrap(), vec![e]);
        memo.mark_explored(e).unwrap();
        assert!(memo.is_explored(e).unwrap());
        assert!(memo.unexplored(g).unwrap().is_empty());

        assert!(!memo.rule_applied(e, 42));
        memo.mark_rule_applied(e, 42).unwrap();
        assert!(memo.rule_applied(e, 42));
        assert!(!memo.rule_applied(e, 7));
        assert_eq!(memo.mark_explored(ExprId(9)), Err(MemoError::UnknownExpr(ExprId(9))));
    }

    #[test]
    fn test_inline_table_group_has_no_func_deps() {
        let mut memo = Memo::new();
        let op = LogicalOp::InlineTable(InlineTable {
            rows: vec![vec![Expr::int(1)], vec![Expr::int(1)]],
            output: vec![Slot::new(SlotId(0), "col1", DataType::TinyInt)],
        });
        let g = memo.insert_expr(op, vec![]).unwrap().group;
        assert!(memo.group(g).unwrap().properties().func_deps.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut memo = Memo::new();
        let plan = LogicalPlan::join(
            JoinType::Cross,
            None,
            scan("a", 0),
            LogicalPlan::join(JoinType::Cross, None, scan("b", 10), scan("c", 20)),
        );
        memo.insert(&plan).unwrap();
        let snapshot = memo.snapshot();
        assert_eq!(snapshot.groups.len(), 5);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["groups"][0]["exprs"][0]["explored"], false);
        assert_eq!(json["groups"][0]["output"][0], "id#0");
    }
}
