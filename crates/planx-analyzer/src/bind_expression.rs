//! Bind rules for operators over already-bound inputs.
//!
//! These operators are bound variants that may still hold unbound expressions. Each
//! rule resolves them against the output of its bound children and assigns slot ids
//! to new output columns. A projected bare column keeps the id of the input slot.

use crate::context::BindContext;
use crate::error::{BindErrorKind, Result};
use crate::expr_binder::{require_boolean, ExprBinder};
use crate::rule::BindRule;
use planx_core::expr::{Expr, NamedExpr, SortKey};
use planx_core::plan::{Aggregate, Filter, Join, LogicalOp, LogicalPlan, PlanRef, Project, Sort};
use planx_core::slot::Slot;

/// Output slots of all children, left to right.
fn scope_of(children: &[PlanRef], ctx: &BindContext) -> Result<Vec<Slot>> {
    let mut scope = Vec::new();
    for child in children {
        scope.extend(child.output().map_err(|e| ctx.error(e))?);
    }
    Ok(scope)
}

/// Materialize a bound expression as an output column.
fn name_output(named: &NamedExpr, expr: Expr, ctx: &BindContext) -> NamedExpr {
    if let Some(id) = named.id {
        return NamedExpr::bound(expr, named.alias.clone(), id);
    }
    match (&expr, &named.alias) {
        (Expr::SlotRef(slot), None) => {
            let id = slot.id;
            NamedExpr::bound(expr, None, id)
        }
        _ => {
            let alias = Some(named.name());
            NamedExpr::bound(expr, alias, ctx.next_slot_id())
        }
    }
}

fn reject_aggregate(expr: &Expr, clause: &str, ctx: &BindContext) -> Result<()> {
    if expr.contains_aggregate() {
        return Err(ctx.error(BindErrorKind::Unsupported(format!(
            "aggregate `{}` in {}",
            expr, clause
        ))));
    }
    Ok(())
}

pub struct BindFilter;

impl BindRule<Filter> for BindFilter {
    fn name(&self) -> &'static str {
        "BindFilter"
    }

    fn apply(&self, op: &Filter, children: Vec<PlanRef>, ctx: &mut BindContext) -> Result<PlanRef> {
        let scope = scope_of(&children, ctx)?;
        let binder = ExprBinder::new(&scope, ctx);
        let predicate = binder
            .bind(&op.predicate)
            .and_then(|p| require_boolean(p, "filter predicate"))
            .map_err(|kind| ctx.error(kind))?;
        reject_aggregate(&predicate, "WHERE", ctx)?;
        Ok(LogicalPlan::new(
            LogicalOp::Filter(Filter { predicate }),
            children,
        ))
    }
}

pub struct BindProject;

impl BindRule<Project> for BindProject {
    fn name(&self) -> &'static str {
        "BindProject"
    }

    fn apply(
        &self,
        op: &Project,
        children: Vec<PlanRef>,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        let scope = scope_of(&children, ctx)?;
        let binder = ExprBinder::new(&scope, ctx);
        let mut projects = Vec::with_capacity(op.projects.len());
        for named in &op.projects {
            if let Expr::UnboundStar { qualifier } = &named.expr {
                let slots = binder.expand_star(qualifier).map_err(|kind| ctx.error(kind))?;
                projects.extend(
                    slots
                        .into_iter()
                        .map(|slot| NamedExpr::bound(Expr::SlotRef(slot.clone()), None, slot.id)),
                );
                continue;
            }
            let expr = binder.bind(&named.expr).map_err(|kind| ctx.error(kind))?;
            reject_aggregate(&expr, "a projection without GROUP BY", ctx)?;
            projects.push(name_output(named, expr, ctx));
        }
        Ok(LogicalPlan::new(
            LogicalOp::Project(Project { projects }),
            children,
        ))
    }
}

pub struct BindJoin;

impl BindRule<Join> for BindJoin {
    fn name(&self) -> &'static str {
        "BindJoin"
    }

    fn apply(&self, op: &Join, children: Vec<PlanRef>, ctx: &mut BindContext) -> Result<PlanRef> {
        let condition = match &op.condition {
            Some(condition) => {
                let scope = scope_of(&children, ctx)?;
                let binder = ExprBinder::new(&scope, ctx);
                let bound = binder
                    .bind(condition)
                    .and_then(|c| require_boolean(c, "join condition"))
                    .map_err(|kind| ctx.error(kind))?;
                reject_aggregate(&bound, "a join condition", ctx)?;
                Some(bound)
            }
            None => None,
        };
        Ok(LogicalPlan::new(
            LogicalOp::Join(Join {
                join_type: op.join_type,
                condition,
            }),
            children,
        ))
    }
}

pub struct BindAggregate;

impl BindRule<Aggregate> for BindAggregate {
    fn name(&self) -> &'static str {
        "BindAggregate"
    }

    fn apply(
        &self,
        op: &Aggregate,
        children: Vec<PlanRef>,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        let scope = scope_of(&children, ctx)?;
        let binder = ExprBinder::new(&scope, ctx);

        let group_by = binder.bind_all(&op.group_by).map_err(|kind| ctx.error(kind))?;
        for key in &group_by {
            reject_aggregate(key, "GROUP BY", ctx)?;
        }

        let mut outputs = Vec::with_capacity(op.outputs.len());
        for named in &op.outputs {
            if let Expr::UnboundStar { .. } = named.expr {
                return Err(ctx.error(BindErrorKind::Unsupported(
                    "`*` in an aggregate output".into(),
                )));
            }
            let expr = binder.bind(&named.expr).map_err(|kind| ctx.error(kind))?;
            check_grouped(&expr, &group_by).map_err(|kind| ctx.error(kind))?;
            outputs.push(name_output(named, expr, ctx));
        }

        Ok(LogicalPlan::new(
            LogicalOp::Aggregate(Aggregate { group_by, outputs }),
            children,
        ))
    }
}

/// Every column outside an aggregate call must be covered by a grouping key.
fn check_grouped(expr: &Expr, group_by: &[Expr]) -> std::result::Result<(), BindErrorKind> {
    if group_by.contains(expr) {
        return Ok(());
    }
    match expr {
        Expr::Function {
            aggregate: true, ..
        } => Ok(()),
        Expr::SlotRef(slot) => Err(BindErrorKind::NotGrouped(slot.to_string())),
        _ => expr
            .children()
            .into_iter()
            .try_for_each(|child| check_grouped(child, group_by)),
    }
}

pub struct BindSort;

impl BindRule<Sort> for BindSort {
    fn name(&self) -> &'static str {
        "BindSort"
    }

    fn apply(&self, op: &Sort, children: Vec<PlanRef>, ctx: &mut BindContext) -> Result<PlanRef> {
        let scope = scope_of(&children, ctx)?;
        let binder = ExprBinder::new(&scope, ctx);
        let mut order = Vec::with_capacity(op.order.len());
        for key in &op.order {
            let expr = binder.bind(&key.expr).map_err(|kind| ctx.error(kind))?;
            reject_aggregate(&expr, "ORDER BY", ctx)?;
            order.push(SortKey {
                expr,
                ascending: key.ascending,
                nulls_first: key.nulls_first,
            });
        }
        Ok(LogicalPlan::new(LogicalOp::Sort(Sort { order }), children))
    }
}
