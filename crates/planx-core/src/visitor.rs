//! # Plan Visitors
//!
//! `PlanVisitor` is the double-dispatch entry point for passes that treat operators
//! differently: `dispatch` matches the node's operator once and calls the
//! corresponding `visit_*` hook with the typed payload. Every hook defaults to
//! `visit`, so a pass only overrides the operators it cares about.
//!
//! `R` is the per-node result and `C` is mutable context threaded through the walk.
//! Visitors decide themselves whether and in which order to recurse into children.

use crate::plan::{
    Aggregate, Filter, InlineTable, Join, Limit, LogicalOp, OneRowRelation, PlanRef, Project,
    Scan, Sort, UnboundInlineTable, UnboundOneRowRelation, UnboundRelation,
};
use std::fmt::Write;

pub trait PlanVisitor<R, C> {
    /// Fallback for every operator without a dedicated hook.
    fn visit(&mut self, plan: &PlanRef, ctx: &mut C) -> R;

    /// Route `plan` to the hook for its operator.
    fn dispatch(&mut self, plan: &PlanRef, ctx: &mut C) -> R {
        match plan.op() {
            LogicalOp::UnboundRelation(op) => self.visit_unbound_relation(plan, op, ctx),
            LogicalOp::UnboundInlineTable(op) => self.visit_unbound_inline_table(plan, op, ctx),
            LogicalOp::UnboundOneRowRelation(op) => {
                self.visit_unbound_one_row_relation(plan, op, ctx)
            }
            LogicalOp::Scan(op) => self.visit_scan(plan, op, ctx),
            LogicalOp::InlineTable(op) => self.visit_inline_table(plan, op, ctx),
            LogicalOp::OneRowRelation(op) => self.visit_one_row_relation(plan, op, ctx),
            LogicalOp::Filter(op) => self.visit_filter(plan, op, ctx),
            LogicalOp::Project(op) => self.visit_project(plan, op, ctx),
            LogicalOp::Join(op) => self.visit_join(plan, op, ctx),
            LogicalOp::Aggregate(op) => self.visit_aggregate(plan, op, ctx),
            LogicalOp::Sort(op) => self.visit_sort(plan, op, ctx),
            LogicalOp::Limit(op) => self.visit_limit(plan, op, ctx),
        }
    }

    fn visit_unbound_relation(&mut self, plan: &PlanRef, _op: &UnboundRelation, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_unbound_inline_table(
        &mut self,
        plan: &PlanRef,
        _op: &UnboundInlineTable,
        ctx: &mut C,
    ) -> R {
        self.visit(plan, ctx)
    }

    fn visit_unbound_one_row_relation(
        &mut self,
        plan: &PlanRef,
        _op: &UnboundOneRowRelation,
        ctx: &mut C,
    ) -> R {
        self.visit(plan, ctx)
    }

    fn visit_scan(&mut self, plan: &PlanRef, _op: &Scan, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_inline_table(&mut self, plan: &PlanRef, _op: &InlineTable, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_one_row_relation(&mut self, plan: &PlanRef, _op: &OneRowRelation, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_filter(&mut self, plan: &PlanRef, _op: &Filter, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_project(&mut self, plan: &PlanRef, _op: &Project, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_join(&mut self, plan: &PlanRef, _op: &Join, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_aggregate(&mut self, plan: &PlanRef, _op: &Aggregate, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_sort(&mut self, plan: &PlanRef, _op: &Sort, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }

    fn visit_limit(&mut self, plan: &PlanRef, _op: &Limit, ctx: &mut C) -> R {
        self.visit(plan, ctx)
    }
}

/// Render a plan as an indented tree, one operator per line.
///
/// ```text
/// Limit(offset=0, count=10)
///   InlineTable(rows=2, output=[col1#0, col2#1])
///     (CAST(1 AS DECIMAL(4, 1)), 'a')
///     (2.5, 'b')
/// ```
pub fn explain(plan: &PlanRef) -> String {
    let mut printer = PlanPrinter { out: String::new() };
    printer.dispatch(plan, &mut 0);
    printer.out
}

struct PlanPrinter {
    out: String,
}

impl PlanPrinter {
    fn line(&mut self, depth: usize, text: &str) {
        let _ = writeln!(self.out, "{:indent$}{}", "", text, indent = depth * 2);
    }

    fn header(&mut self, plan: &PlanRef, depth: usize) {
        let text = match plan.group() {
            Some(group) => format!("{} [{}]", plan.op(), group),
            None => plan.op().to_string(),
        };
        self.line(depth, &text);
    }

    fn children(&mut self, plan: &PlanRef, depth: &mut usize) {
        *depth += 1;
        for child in plan.children() {
            self.dispatch(child, depth);
        }
        *depth -= 1;
    }
}

impl PlanVisitor<(), usize> for PlanPrinter {
    fn visit(&mut self, plan: &PlanRef, depth: &mut usize) {
        self.header(plan, *depth);
        self.children(plan, depth);
    }

    fn visit_inline_table(&mut self, plan: &PlanRef, op: &InlineTable, depth: &mut usize) {
        self.header(plan, *depth);
        for row in &op.rows {
            let cells: Vec<String> = row.iter().map(|e| e.to_string()).collect();
            self.line(*depth + 1, &format!("({})", cells.join(", ")));
        }
    }

    fn visit_unbound_inline_table(
        &mut self,
        plan: &PlanRef,
        op: &UnboundInlineTable,
        depth: &mut usize,
    ) {
        self.header(plan, *depth);
        for row in op.rows() {
            let cells: Vec<String> = row.iter().map(|e| e.to_string()).collect();
            self.line(*depth + 1, &format!("({})", cells.join(", ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, NamedExpr};
    use crate::plan::LogicalPlan;

    /// Counts operators by kind, recursing through every child.
    #[derive(Default)]
    struct KindCounter {
        leaves: usize,
        inline_tables: usize,
    }

    impl PlanVisitor<(), ()> for KindCounter {
        fn visit(&mut self, plan: &PlanRef, ctx: &mut ()) {
            if plan.op().is_leaf() {
                self.leaves += 1;
            }
            for child in plan.children() {
                self.dispatch(child, ctx);
            }
        }

        fn visit_unbound_inline_table(
            &mut self,
            plan: &PlanRef,
            _op: &UnboundInlineTable,
            ctx: &mut (),
        ) {
            self.inline_tables += 1;
            self.visit(plan, ctx)
        }
    }

    #[test]
    fn test_dispatch_reaches_specific_hook() {
        let values = LogicalPlan::unbound_inline_table(vec![vec![NamedExpr::new(Expr::int(1))]]);
        let plan = LogicalPlan::join(
            crate::expr::JoinType::Cross,
            None,
            LogicalPlan::limit(0, 5, values),
            LogicalPlan::unbound_relation(&["t"]),
        );
        let mut counter = KindCounter::default();
        counter.dispatch(&plan, &mut ());
        assert_eq!(counter.leaves, 2);
        assert_eq!(counter.inline_tables, 1);
    }

    #[test]
    fn test_explain_unbound_plan() {
        let values = LogicalPlan::unbound_inline_table(vec![
            vec![NamedExpr::new(Expr::int(1)), NamedExpr::aliased(Expr::text("a"), "name")],
            vec![NamedExpr::new(Expr::int(2)), NamedExpr::new(Expr::text("b"))],
        ]);
        let plan = LogicalPlan::limit(0, 10, values);
        let text = explain(&plan);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Limit(offset=0, count=10)");
        assert_eq!(lines[1], "  UnboundInlineTable(rows=2)");
        assert!(lines[2].starts_with("    (1, "));
        assert!(lines[2].contains("AS name"));
    }
}
