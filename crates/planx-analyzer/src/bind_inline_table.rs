//! # Inline Table Binding
//!
//! Turns `VALUES (...), (...)` into a typed `InlineTable`:
//!
//! 1. **Shape**: at least one row, at least one column, no more rows than
//!    `max_inline_rows`, and every row as wide as row 0.
//! 2. **Cells**: each cell is bound with an empty scope, so column references are
//!    rejected and function calls are resolved. Aggregate calls are rejected.
//! 3. **Names**: a column takes the explicit name given in row 0, otherwise the
//!    positional default (`col1`, `col2`, ...).
//! 4. **Types**: the column type is the common type of all its cells. Cells of a
//!    different type are wrapped in a `Cast` to it.
//! 5. **Slots**: one fresh slot per column, in input order, nullable if any cell in
//!    the column can be NULL.
//!
//! The result has no functional dependencies: nothing is known about duplicates
//! among literal rows.
//!
//! ```text
//! VALUES (1, 'a'), (2.5, 'b')
//!   => InlineTable(output=[col1 DECIMAL(4, 1), col2 TEXT])
//!        (CAST(1 AS DECIMAL(4, 1)), 'a')
//!        (CAST(2.5 AS DECIMAL(4, 1)), 'b')
//! ```

use crate::context::BindContext;
use crate::error::{BindErrorKind, Result};
use crate::expr_binder::ExprBinder;
use crate::rule::BindRule;
use planx_core::expr::Expr;
use planx_core::plan::{InlineTable, LogicalOp, LogicalPlan, PlanRef, UnboundInlineTable};
use planx_core::slot::Slot;
use tracing::trace;

pub struct BindInlineTable;

impl BindRule<UnboundInlineTable> for BindInlineTable {
    fn name(&self) -> &'static str {
        "BindInlineTable"
    }

    fn apply(
        &self,
        op: &UnboundInlineTable,
        children: Vec<PlanRef>,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        let rows = op.rows();
        let width = check_shape(rows.iter().map(Vec::len), ctx)?;

        let binder = ExprBinder::new(&[], ctx);
        let mut cells: Vec<Vec<Expr>> = Vec::with_capacity(rows.len());
        for row in rows {
            let bound = row
                .iter()
                .map(|named| binder.bind(&named.expr))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|kind| ctx.error(kind))?;
            if let Some(cell) = bound.iter().find(|cell| cell.contains_aggregate()) {
                return Err(ctx.error(BindErrorKind::Unsupported(format!(
                    "aggregate `{}` in VALUES",
                    cell
                ))));
            }
            cells.push(bound);
        }

        let mut output = Vec::with_capacity(width);
        for (column, first) in rows[0].iter().enumerate() {
            let name = first
                .alias
                .clone()
                .unwrap_or_else(|| ctx.config().column_name(column));

            let mut data_type = cells[0][column]
                .data_type()
                .map_err(|e| ctx.error(e))?;
            for row in &cells[1..] {
                let left = data_type;
                let right = row[column].data_type().map_err(|e| ctx.error(e))?;
                data_type = left.common_type(&right).ok_or_else(|| {
                    ctx.error(BindErrorKind::TypeMismatch {
                        column,
                        name: name.clone(),
                        left,
                        right,
                    })
                })?;
            }

            let nullable = cells.iter().any(|row| row[column].nullable());
            output.push(
                Slot::new(ctx.next_slot_id(), name, data_type).with_nullable(nullable),
            );
        }

        let rows = cells
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&output)
                    .map(|(cell, slot)| cell.coerce_to(slot.data_type))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ctx.error(e))?;

        trace!(
            "bound inline table: {} rows, output [{}]",
            rows.len(),
            output
                .iter()
                .map(|s| format!("{} {}", s, s.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(LogicalPlan::new(
            LogicalOp::InlineTable(InlineTable { rows, output }),
            children,
        ))
    }
}

/// Validate row count and widths; returns the column count.
fn check_shape(
    widths: impl ExactSizeIterator<Item = usize>,
    ctx: &BindContext,
) -> Result<usize> {
    let rows = widths.len();
    if rows == 0 {
        return Err(ctx.error(BindErrorKind::EmptyInlineTable));
    }
    let limit = ctx.config().max_inline_rows;
    if rows > limit {
        return Err(ctx.error(BindErrorKind::TooManyRows { rows, limit }));
    }

    let mut expected = None;
    for (row, actual) in widths.enumerate() {
        match expected {
            None if actual == 0 => return Err(ctx.error(BindErrorKind::EmptyRow)),
            None => expected = Some(actual),
            Some(expected) if expected != actual => {
                return Err(ctx.error(BindErrorKind::RowArity {
                    row,
                    expected,
                    actual,
                }))
            }
            Some(_) => {}
        }
    }
    Ok(expected.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::error::ErrorCategory;
    use planx_core::catalog::InMemoryCatalog;
    use planx_core::expr::{NamedExpr, ScalarValue};
    use planx_core::slot::{SlotId, SlotIdGenerator};
    use planx_core::types::DataType;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn context(config: AnalyzerConfig) -> BindContext {
        BindContext::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(config),
            Arc::new(SlotIdGenerator::new()),
        )
    }

    fn bind(rows: Vec<Vec<NamedExpr>>) -> Result<PlanRef> {
        bind_with(rows, AnalyzerConfig::default())
    }

    fn bind_with(rows: Vec<Vec<NamedExpr>>, config: AnalyzerConfig) -> Result<PlanRef> {
        let mut ctx = context(config);
        BindInlineTable.apply(&UnboundInlineTable::new(rows), vec![], &mut ctx)
    }

    fn row(cells: Vec<Expr>) -> Vec<NamedExpr> {
        cells.into_iter().map(NamedExpr::new).collect()
    }

    fn dec(mantissa: i64, scale: u32) -> Expr {
        Expr::lit(ScalarValue::Decimal(Decimal::new(mantissa, scale)))
    }

    fn inline_table(plan: &PlanRef) -> &InlineTable {
        match plan.op() {
            LogicalOp::InlineTable(t) => t,
            other => panic!("expected an inline table, got {}", other),
        }
    }

    #[test]
    fn test_mixed_numeric_column_is_widened() {
        let plan = bind(vec![
            row(vec![Expr::int(1), Expr::text("a")]),
            row(vec![dec(25, 1), Expr::text("b")]),
        ])
        .unwrap();
        let table = inline_table(&plan);

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.output[0].name, "col1");
        assert_eq!(table.output[0].data_type, DataType::decimal(4, 1));
        assert_eq!(table.output[1].name, "col2");
        assert_eq!(table.output[1].data_type, DataType::Text);
        assert_eq!(
            table.rows[0][0],
            Expr::Cast {
                expr: Box::new(Expr::int(1)),
                to: DataType::decimal(4, 1)
            }
        );
        // 2.5 is DECIMAL(2, 1), so it is cast as well.
        assert!(matches!(table.rows[1][0], Expr::Cast { .. }));
        assert_eq!(table.rows[0][1], Expr::text("a"));
        assert!(plan.func_deps().unwrap().is_empty());
    }

    #[test]
    fn test_uniform_column_gets_no_casts() {
        let plan = bind(vec![
            row(vec![Expr::text("x")]),
            row(vec![Expr::text("y")]),
            row(vec![Expr::text("z")]),
        ])
        .unwrap();
        let table = inline_table(&plan);
        assert!(table
            .rows
            .iter()
            .flatten()
            .all(|cell| !matches!(cell, Expr::Cast { .. })));
        assert!(!table.output[0].nullable);
    }

    #[test]
    fn test_explicit_names_and_null_cells() {
        let plan = bind(vec![
            vec![NamedExpr::aliased(Expr::int(1), "id"), NamedExpr::new(Expr::null())],
            row(vec![Expr::null(), Expr::int(7)]),
        ])
        .unwrap();
        let output = plan.output().unwrap();
        assert_eq!(output[0].name, "id");
        assert_eq!(output[1].name, "col2");
        assert!(output[0].nullable);
        assert!(output[1].nullable);
        assert_eq!(output[0].data_type, DataType::TinyInt);
        assert_eq!(output[1].data_type, DataType::TinyInt);
        assert_eq!(output[0].id, SlotId(0));
        assert_eq!(output[1].id, SlotId(1));
    }

    #[test]
    fn test_all_null_column_keeps_null_type() {
        let plan = bind(vec![row(vec![Expr::null()]), row(vec![Expr::null()])]).unwrap();
        assert_eq!(plan.output().unwrap()[0].data_type, DataType::Null);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = bind(vec![
            row(vec![Expr::int(1), Expr::int(2)]),
            row(vec![Expr::int(3), Expr::int(4)]),
            row(vec![Expr::int(5)]),
        ])
        .unwrap_err();
        assert_eq!(
            err.kind,
            BindErrorKind::RowArity {
                row: 2,
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(err.category(), ErrorCategory::Shape);
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        assert_eq!(bind(vec![]).unwrap_err().kind, BindErrorKind::EmptyInlineTable);
        assert_eq!(
            bind(vec![vec![], vec![]]).unwrap_err().kind,
            BindErrorKind::EmptyRow
        );
    }

    #[test]
    fn test_row_limit() {
        let config = AnalyzerConfig {
            max_inline_rows: 2,
            ..AnalyzerConfig::default()
        };
        let rows = (0..3).map(|i| row(vec![Expr::int(i)])).collect();
        assert_eq!(
            bind_with(rows, config).unwrap_err().kind,
            BindErrorKind::TooManyRows { rows: 3, limit: 2 }
        );
    }

    #[test]
    fn test_incompatible_column_names_the_column() {
        let err = bind(vec![
            row(vec![Expr::int(1), Expr::int(1)]),
            row(vec![Expr::int(2), Expr::text("two")]),
        ])
        .unwrap_err();
        assert_eq!(
            err.kind,
            BindErrorKind::TypeMismatch {
                column: 1,
                name: "col2".into(),
                left: DataType::TinyInt,
                right: DataType::Text,
            }
        );
        assert_eq!(err.category(), ErrorCategory::Type);
    }

    #[test]
    fn test_column_reference_in_values_is_unresolved() {
        let err = bind(vec![row(vec![Expr::col("a")])]).unwrap_err();
        assert_eq!(err.kind, BindErrorKind::UnresolvedColumn("a".into()));
    }

    #[test]
    fn test_aggregate_in_values_is_rejected() {
        let err = bind(vec![
            row(vec![Expr::int(1)]),
            row(vec![Expr::call("count", vec![])]),
        ])
        .unwrap_err();
        assert!(matches!(err.kind, BindErrorKind::Unsupported(ref msg) if msg.contains("count")));
        assert_eq!(err.category(), ErrorCategory::Shape);

        // Scalar functions are fine.
        let plan = bind(vec![row(vec![Expr::call("abs", vec![Expr::int(-3)])])]).unwrap();
        assert_eq!(plan.output().unwrap()[0].data_type, DataType::TinyInt);
    }

    #[test]
    fn test_custom_prefix() {
        let config = AnalyzerConfig {
            default_column_prefix: "column".into(),
            ..AnalyzerConfig::default()
        };
        let plan = bind_with(vec![row(vec![Expr::int(1), Expr::int(2)])], config).unwrap();
        let names: Vec<String> = plan.output().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["column1", "column2"]);
    }
}
