//! # Logical Plan Nodes
//!
//! A logical plan is an immutable tree of `LogicalPlan` nodes shared through `Arc`
//! (`PlanRef`). Every rewrite builds new nodes from owned or shared children; no
//! pass mutates a node that another pass can see.
//!
//! ## Operators
//!
//! `LogicalOp` is a closed set of operator variants, each wrapping a payload struct.
//! Operators that need name resolution come in an *unbound* and a *bound* variant
//! (`UnboundInlineTable` / `InlineTable`, `UnboundRelation` / `Scan`, ...). The
//! analyzer is the only component that turns one into the other.
//!
//! ## Capabilities
//!
//! Instead of a class hierarchy, operators answer a few orthogonal questions:
//!
//! - `is_leaf`: the operator takes no inputs.
//! - `is_unbound`: the operator (or an expression it carries) still has unresolved
//!   names. Unbound nodes cannot report output slots or properties.
//! - `is_inline_table`: the operator carries literal rows.
//! - `blocks_func_deps`: functional dependencies never propagate through the operator.
//!
//! ## Cached Properties
//!
//! Each node lazily derives its `LogicalProperties` from its children's properties
//! the first time they are requested and keeps them for its lifetime. A rewritten
//! node is a new node with a fresh cache, so cached values are never invalidated.

use crate::catalog::TableRef;
use crate::error::{PlanError, Result};
use crate::expr::{Expr, JoinType, NamedExpr, SortKey};
use crate::memo::GroupId;
use crate::properties::{derive_properties, FuncDeps, LogicalProperties};
use crate::slot::{Slot, SlotId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Shared handle to an immutable plan node.
pub type PlanRef = Arc<LogicalPlan>;

/// A table named in the query, before catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnboundRelation {
    pub name_parts: Vec<String>,
    /// `FROM t AS alias`: qualifies the columns instead of the table name.
    pub alias: Option<String>,
}

/// Literal rows (`VALUES (...), (...)`) before their columns are named and typed.
///
/// The constructor accepts ragged rows; rectangularity is checked by the binder so
/// that it is reported as a compile error rather than a panic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnboundInlineTable {
    rows: Vec<Vec<NamedExpr>>,
}

impl UnboundInlineTable {
    pub fn new(rows: Vec<Vec<NamedExpr>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<NamedExpr>] {
        &self.rows
    }
}

/// `SELECT <exprs>` without a FROM clause, before binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnboundOneRowRelation {
    pub projects: Vec<NamedExpr>,
}

/// Bound base-table scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scan {
    pub table: TableRef,
    pub output: Vec<Slot>,
    /// Column sets the catalog declares unique, as output slot ids.
    pub unique_keys: Vec<Vec<SlotId>>,
}

/// Bound inline table: every row has one expression per output slot, already cast
/// to that slot's type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InlineTable {
    pub rows: Vec<Vec<Expr>>,
    pub output: Vec<Slot>,
}

/// Bound single-row relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneRowRelation {
    pub projects: Vec<NamedExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub predicate: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub projects: Vec<NamedExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    pub join_type: JoinType,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregate {
    pub group_by: Vec<Expr>,
    pub outputs: Vec<NamedExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub order: Vec<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limit {
    pub offset: u64,
    pub count: u64,
}

/// Logical operators. Children are held by the enclosing `LogicalPlan` (or, inside
/// the memo, referenced by group id), never by the operator itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    UnboundRelation(UnboundRelation),
    UnboundInlineTable(UnboundInlineTable),
    UnboundOneRowRelation(UnboundOneRowRelation),
    Scan(Scan),
    InlineTable(InlineTable),
    OneRowRelation(OneRowRelation),
    Filter(Filter),
    Project(Project),
    Join(Join),
    Aggregate(Aggregate),
    Sort(Sort),
    Limit(Limit),
}

/// Operator discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanKind {
    UnboundRelation,
    UnboundInlineTable,
    UnboundOneRowRelation,
    Scan,
    InlineTable,
    OneRowRelation,
    Filter,
    Project,
    Join,
    Aggregate,
    Sort,
    Limit,
}

impl PlanKind {
    /// Whether this discriminant is one of the unbound operator variants.
    pub fn is_unbound_kind(&self) -> bool {
        matches!(
            self,
            PlanKind::UnboundRelation
                | PlanKind::UnboundInlineTable
                | PlanKind::UnboundOneRowRelation
        )
    }

    /// Number of inputs the operator takes.
    pub fn arity(&self) -> usize {
        match self {
            PlanKind::UnboundRelation
            | PlanKind::UnboundInlineTable
            | PlanKind::UnboundOneRowRelation
            | PlanKind::Scan
            | PlanKind::InlineTable
            | PlanKind::OneRowRelation => 0,
            PlanKind::Join => 2,
            PlanKind::Filter
            | PlanKind::Project
            | PlanKind::Aggregate
            | PlanKind::Sort
            | PlanKind::Limit => 1,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl LogicalOp {
    pub fn kind(&self) -> PlanKind {
        match self {
            LogicalOp::UnboundRelation(_) => PlanKind::UnboundRelation,
            LogicalOp::UnboundInlineTable(_) => PlanKind::UnboundInlineTable,
            LogicalOp::UnboundOneRowRelation(_) => PlanKind::UnboundOneRowRelation,
            LogicalOp::Scan(_) => PlanKind::Scan,
            LogicalOp::InlineTable(_) => PlanKind::InlineTable,
            LogicalOp::OneRowRelation(_) => PlanKind::OneRowRelation,
            LogicalOp::Filter(_) => PlanKind::Filter,
            LogicalOp::Project(_) => PlanKind::Project,
            LogicalOp::Join(_) => PlanKind::Join,
            LogicalOp::Aggregate(_) => PlanKind::Aggregate,
            LogicalOp::Sort(_) => PlanKind::Sort,
            LogicalOp::Limit(_) => PlanKind::Limit,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind().arity() == 0
    }

    /// Unbound variant, or a bound variant still carrying unresolved expressions.
    pub fn is_unbound(&self) -> bool {
        if self.kind().is_unbound_kind() {
            return true;
        }
        if self.named_exprs().iter().any(|ne| ne.id.is_none()) {
            return true;
        }
        self.expressions().into_iter().any(Expr::is_unbound)
    }

    pub fn is_inline_table(&self) -> bool {
        matches!(
            self,
            LogicalOp::UnboundInlineTable(_) | LogicalOp::InlineTable(_)
        )
    }

    /// Literal rows carry no provable dependency between their values, so no
    /// functional dependency may flow out of an inline table.
    pub fn blocks_func_deps(&self) -> bool {
        self.is_inline_table()
    }

    /// Named expressions carried by the operator, in output order.
    pub fn named_exprs(&self) -> Vec<&NamedExpr> {
        match self {
            LogicalOp::UnboundInlineTable(t) => t.rows.iter().flatten().collect(),
            LogicalOp::UnboundOneRowRelation(r) => r.projects.iter().collect(),
            LogicalOp::OneRowRelation(r) => r.projects.iter().collect(),
            LogicalOp::Project(p) => p.projects.iter().collect(),
            LogicalOp::Aggregate(a) => a.outputs.iter().collect(),
            _ => vec![],
        }
    }

    /// All expressions embedded in the operator, for expression-rewriting passes.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            LogicalOp::UnboundRelation(_) | LogicalOp::Scan(_) | LogicalOp::Limit(_) => vec![],
            LogicalOp::UnboundInlineTable(_)
            | LogicalOp::UnboundOneRowRelation(_)
            | LogicalOp::OneRowRelation(_)
            | LogicalOp::Project(_) => self.named_exprs().into_iter().map(|ne| &ne.expr).collect(),
            LogicalOp::InlineTable(t) => t.rows.iter().flatten().collect(),
            LogicalOp::Filter(f) => vec![&f.predicate],
            LogicalOp::Join(j) => j.condition.iter().collect(),
            LogicalOp::Aggregate(a) => a
                .group_by
                .iter()
                .chain(a.outputs.iter().map(|ne| &ne.expr))
                .collect(),
            LogicalOp::Sort(s) => s.order.iter().map(|k| &k.expr).collect(),
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::UnboundRelation(r) => match &r.alias {
                Some(alias) => write!(f, "UnboundRelation({} AS {})", r.name_parts.join("."), alias),
                None => write!(f, "UnboundRelation({})", r.name_parts.join(".")),
            },
            LogicalOp::UnboundInlineTable(t) => write!(f, "UnboundInlineTable(rows={})", t.rows.len()),
            LogicalOp::UnboundOneRowRelation(r) => {
                write!(f, "UnboundOneRowRelation({})", join(&r.projects))
            }
            LogicalOp::Scan(s) => write!(f, "Scan({}, output={})", s.table, join(&s.output)),
            LogicalOp::InlineTable(t) => {
                write!(f, "InlineTable(rows={}, output={})", t.rows.len(), join(&t.output))
            }
            LogicalOp::OneRowRelation(r) => write!(f, "OneRowRelation({})", join(&r.projects)),
            LogicalOp::Filter(flt) => write!(f, "Filter({})", flt.predicate),
            LogicalOp::Project(p) => write!(f, "Project({})", join(&p.projects)),
            LogicalOp::Join(j) => match &j.condition {
                Some(c) => write!(f, "Join({:?}, {})", j.join_type, c),
                None => write!(f, "Join({:?})", j.join_type),
            },
            LogicalOp::Aggregate(a) => write!(
                f,
                "Aggregate(group_by={}, output={})",
                join(&a.group_by),
                join(&a.outputs)
            ),
            LogicalOp::Sort(s) => write!(f, "Sort({})", join(&s.order)),
            LogicalOp::Limit(l) => write!(f, "Limit(offset={}, count={})", l.offset, l.count),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// One node of a logical plan tree.
#[derive(Debug, Clone)]
pub struct LogicalPlan {
    op: LogicalOp,
    children: Vec<PlanRef>,
    /// Memo group this node was extracted from, if any.
    group: Option<GroupId>,
    props: OnceLock<Arc<LogicalProperties>>,
}

impl LogicalPlan {
    pub fn new(op: LogicalOp, children: Vec<PlanRef>) -> PlanRef {
        Arc::new(Self {
            op,
            children,
            group: None,
            props: OnceLock::new(),
        })
    }

    pub fn leaf(op: LogicalOp) -> PlanRef {
        Self::new(op, Vec::new())
    }

    pub fn unbound_relation(name_parts: &[&str]) -> PlanRef {
        Self::leaf(LogicalOp::UnboundRelation(UnboundRelation {
            name_parts: name_parts.iter().map(|p| p.to_string()).collect(),
            alias: None,
        }))
    }

    pub fn aliased_relation(name_parts: &[&str], alias: impl Into<String>) -> PlanRef {
        Self::leaf(LogicalOp::UnboundRelation(UnboundRelation {
            name_parts: name_parts.iter().map(|p| p.to_string()).collect(),
            alias: Some(alias.into()),
        }))
    }

    pub fn unbound_inline_table(rows: Vec<Vec<NamedExpr>>) -> PlanRef {
        Self::leaf(LogicalOp::UnboundInlineTable(UnboundInlineTable::new(rows)))
    }

    pub fn unbound_one_row_relation(projects: Vec<NamedExpr>) -> PlanRef {
        Self::leaf(LogicalOp::UnboundOneRowRelation(UnboundOneRowRelation {
            projects,
        }))
    }

    pub fn filter(predicate: Expr, child: PlanRef) -> PlanRef {
        Self::new(LogicalOp::Filter(Filter { predicate }), vec![child])
    }

    pub fn project(projects: Vec<NamedExpr>, child: PlanRef) -> PlanRef {
        Self::new(LogicalOp::Project(Project { projects }), vec![child])
    }

    pub fn join(
        join_type: JoinType,
        condition: Option<Expr>,
        left: PlanRef,
        right: PlanRef,
    ) -> PlanRef {
        Self::new(
            LogicalOp::Join(Join {
                join_type,
                condition,
            }),
            vec![left, right],
        )
    }

    pub fn aggregate(group_by: Vec<Expr>, outputs: Vec<NamedExpr>, child: PlanRef) -> PlanRef {
        Self::new(
            LogicalOp::Aggregate(Aggregate { group_by, outputs }),
            vec![child],
        )
    }

    pub fn sort(order: Vec<SortKey>, child: PlanRef) -> PlanRef {
        Self::new(LogicalOp::Sort(Sort { order }), vec![child])
    }

    pub fn limit(offset: u64, count: u64, child: PlanRef) -> PlanRef {
        Self::new(LogicalOp::Limit(Limit { offset, count }), vec![child])
    }

    pub fn op(&self) -> &LogicalOp {
        &self.op
    }

    pub fn kind(&self) -> PlanKind {
        self.op.kind()
    }

    pub fn children(&self) -> &[PlanRef] {
        &self.children
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn expressions(&self) -> Vec<&Expr> {
        self.op.expressions()
    }

    pub fn is_unbound(&self) -> bool {
        self.op.is_unbound()
    }

    /// Whether this node or any descendant is unbound.
    pub fn contains_unbound(&self) -> bool {
        self.op.is_unbound() || self.children.iter().any(|c| c.contains_unbound())
    }

    /// Indented explain output of the tree rooted here.
    pub fn tree_string(self: &Arc<Self>) -> String {
        crate::visitor::explain(self)
    }

    /// Same operator over new children. The result has no group and a fresh cache.
    pub fn with_children(&self, children: Vec<PlanRef>) -> PlanRef {
        Self::new(self.op.clone(), children)
    }

    /// Attach the memo group this node belongs to.
    ///
    /// Unbound nodes never belong to a group, so they are returned unchanged.
    pub fn with_group(self: Arc<Self>, group: GroupId) -> PlanRef {
        if self.op.is_unbound() {
            return self;
        }
        Arc::new(Self {
            op: self.op.clone(),
            children: self.children.clone(),
            group: Some(group),
            props: self.props.clone(),
        })
    }

    /// Logical properties, derived from the children on first use and cached.
    pub fn logical_properties(&self) -> Result<Arc<LogicalProperties>> {
        self.properties_for("logical properties")
    }

    /// Ordered output slots. Fails with `PlanError::Unbound` on unbound plans.
    pub fn output(&self) -> Result<Vec<Slot>> {
        Ok(self.properties_for("output")?.output.clone())
    }

    pub fn func_deps(&self) -> Result<FuncDeps> {
        Ok(self.properties_for("functional dependencies")?.func_deps.clone())
    }

    fn properties_for(&self, what: &'static str) -> Result<Arc<LogicalProperties>> {
        if let Some(props) = self.props.get() {
            return Ok(Arc::clone(props));
        }
        if self.op.is_unbound() {
            return Err(PlanError::unbound(what, self.kind().to_string()));
        }
        let child_props = self
            .children
            .iter()
            .map(|c| c.properties_for(what))
            .collect::<Result<Vec<_>>>()?;
        let derived = derive_properties(&self.op, &child_props)?;
        Ok(Arc::clone(self.props.get_or_init(|| Arc::new(derived))))
    }
}
