//! # Binder
//!
//! Post-order walk that turns an unbound plan into a bound one. Children are bound
//! first, then the node's bind rule runs against their outputs.
//!
//! Fully bound subtrees are returned as the same `Arc`, so binding an already bound
//! plan is free and shares every node. The input plan is never modified.
//!
//! The context tracks the path from the root to the node being bound, so every
//! error names where it happened.

use crate::bind_expression::{BindAggregate, BindFilter, BindJoin, BindProject, BindSort};
use crate::bind_inline_table::BindInlineTable;
use crate::bind_one_row_relation::BindOneRowRelation;
use crate::bind_relation::BindRelation;
use crate::context::BindContext;
use crate::error::Result;
use crate::rule::BindRule;
use planx_core::plan::{
    Aggregate, Filter, Join, PlanRef, Project, Sort, UnboundInlineTable, UnboundOneRowRelation,
    UnboundRelation,
};
use planx_core::visitor::PlanVisitor;
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
pub struct Binder;

impl Binder {
    pub fn new() -> Self {
        Self
    }

    /// Bind the tree rooted at `plan`.
    pub fn bind(&mut self, plan: &PlanRef, ctx: &mut BindContext) -> Result<PlanRef> {
        ctx.enter(None, plan.kind());
        let result = self.dispatch(plan, ctx);
        ctx.leave();
        result
    }

    fn bind_children(&mut self, plan: &PlanRef, ctx: &mut BindContext) -> Result<Vec<PlanRef>> {
        let mut children = Vec::with_capacity(plan.children().len());
        for (i, child) in plan.children().iter().enumerate() {
            ctx.enter(Some(i), child.kind());
            let bound = self.dispatch(child, ctx);
            ctx.leave();
            children.push(bound?);
        }
        Ok(children)
    }

    fn apply<O, R: BindRule<O>>(
        &mut self,
        rule: R,
        plan: &PlanRef,
        op: &O,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        if !plan.contains_unbound() {
            return Ok(Arc::clone(plan));
        }
        let children = self.bind_children(plan, ctx)?;
        if !plan.is_unbound() {
            return Ok(plan.with_children(children));
        }
        trace!("{} on {}", rule.name(), plan.op());
        rule.apply(op, children, ctx)
    }
}

impl PlanVisitor<Result<PlanRef>, BindContext> for Binder {
    fn visit(&mut self, plan: &PlanRef, ctx: &mut BindContext) -> Result<PlanRef> {
        if !plan.contains_unbound() {
            return Ok(Arc::clone(plan));
        }
        let children = self.bind_children(plan, ctx)?;
        Ok(plan.with_children(children))
    }

    fn visit_unbound_relation(
        &mut self,
        plan: &PlanRef,
        op: &UnboundRelation,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        self.apply(BindRelation, plan, op, ctx)
    }

    fn visit_unbound_inline_table(
        &mut self,
        plan: &PlanRef,
        op: &UnboundInlineTable,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        self.apply(BindInlineTable, plan, op, ctx)
    }

    fn visit_unbound_one_row_relation(
        &mut self,
        plan: &PlanRef,
        op: &UnboundOneRowRelation,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        self.apply(BindOneRowRelation, plan, op, ctx)
    }

    fn visit_filter(&mut self, plan: &PlanRef, op: &Filter, ctx: &mut BindContext) -> Result<PlanRef> {
        self.apply(BindFilter, plan, op, ctx)
    }

    fn visit_project(
        &mut self,
        plan: &PlanRef,
        op: &Project,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        self.apply(BindProject, plan, op, ctx)
    }

    fn visit_join(&mut self, plan: &PlanRef, op: &Join, ctx: &mut BindContext) -> Result<PlanRef> {
        self.apply(BindJoin, plan, op, ctx)
    }

    fn visit_aggregate(
        &mut self,
        plan: &PlanRef,
        op: &Aggregate,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        self.apply(BindAggregate, plan, op, ctx)
    }

    fn visit_sort(&mut self, plan: &PlanRef, op: &Sort, ctx: &mut BindContext) -> Result<PlanRef> {
        self.apply(BindSort, plan, op, ctx)
    }
}
