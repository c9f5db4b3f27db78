//! Binding of `SELECT <exprs>` without a FROM clause.
//!
//! The projections are bound with an empty scope and each gets a fresh slot. The
//! bound `OneRowRelation` produces exactly one row, so every output slot is
//! determined by the empty set.

use crate::context::BindContext;
use crate::error::{BindErrorKind, Result};
use crate::expr_binder::ExprBinder;
use crate::rule::BindRule;
use planx_core::expr::{Expr, NamedExpr};
use planx_core::plan::{LogicalOp, LogicalPlan, OneRowRelation, PlanRef, UnboundOneRowRelation};

pub struct BindOneRowRelation;

impl BindRule<UnboundOneRowRelation> for BindOneRowRelation {
    fn name(&self) -> &'static str {
        "BindOneRowRelation"
    }

    fn apply(
        &self,
        op: &UnboundOneRowRelation,
        children: Vec<PlanRef>,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        if op.projects.is_empty() {
            return Err(ctx.error(BindErrorKind::Unsupported("empty select list".into())));
        }
        let binder = ExprBinder::new(&[], ctx);
        let mut projects = Vec::with_capacity(op.projects.len());
        for named in &op.projects {
            if let Expr::UnboundStar { .. } = named.expr {
                return Err(ctx.error(BindErrorKind::Unsupported(
                    "`*` without a FROM clause".into(),
                )));
            }
            let expr = binder.bind(&named.expr).map_err(|kind| ctx.error(kind))?;
            if expr.contains_aggregate() {
                return Err(ctx.error(BindErrorKind::Unsupported(format!(
                    "aggregate `{}` without a FROM clause",
                    expr
                ))));
            }
            let alias = Some(named.name());
            projects.push(NamedExpr::bound(
                expr,
                alias,
                named.id.unwrap_or_else(|| ctx.next_slot_id()),
            ));
        }
        Ok(LogicalPlan::new(
            LogicalOp::OneRowRelation(OneRowRelation { projects }),
            children,
        ))
    }
}
