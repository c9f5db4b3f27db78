//! # Expression Binding
//!
//! Resolves the unbound expression variants against a *scope*, the ordered output
//! slots of the operator's inputs:
//!
//! - `UnboundSlot` becomes a `SlotRef` to the unique scope slot with that name (and,
//!   if given, a qualifier matching the end of the slot's qualifier).
//! - `UnboundFunction` becomes a `Function` once the catalog resolves an overload for
//!   the bound argument types; arguments are cast to the overload's parameter types.
//! - Operands of comparisons and arithmetic are cast to their common type.
//!
//! `UnboundStar` is only meaningful in a projection list, where the projection rule
//! expands it with `expand_star` before binding.

use crate::config::AnalyzerConfig;
use crate::context::BindContext;
use crate::error::BindErrorKind;
use planx_core::catalog::Catalog;
use planx_core::error::PlanError;
use planx_core::expr::{BinaryOp, Expr, UnaryOp};
use planx_core::slot::Slot;
use planx_core::types::DataType;

type Result<T> = std::result::Result<T, BindErrorKind>;

pub struct ExprBinder<'a> {
    scope: &'a [Slot],
    catalog: &'a dyn Catalog,
    config: &'a AnalyzerConfig,
}

impl<'a> ExprBinder<'a> {
    pub fn new(scope: &'a [Slot], ctx: &'a BindContext) -> Self {
        Self {
            scope,
            catalog: ctx.catalog(),
            config: ctx.config(),
        }
    }

    pub fn bind(&self, expr: &Expr) -> Result<Expr> {
        match expr {
            Expr::UnboundSlot { qualifier, name } => {
                Ok(Expr::SlotRef(self.resolve_column(qualifier, name)?.clone()))
            }
            Expr::UnboundStar { .. } => Err(BindErrorKind::Unsupported(format!("`{}`", expr))),
            Expr::UnboundFunction {
                name,
                args,
                distinct,
            } => {
                let args = self.bind_all(args)?;
                let arg_types = args
                    .iter()
                    .map(Expr::data_type)
                    .collect::<std::result::Result<Vec<_>, PlanError>>()?;
                let signature = self.catalog.resolve_function(name, &arg_types)?;
                let args = args
                    .into_iter()
                    .zip(&signature.arg_types)
                    .map(|(arg, t)| arg.coerce_to(*t))
                    .collect::<std::result::Result<Vec<_>, PlanError>>()?;
                Ok(Expr::Function {
                    name: signature.name,
                    args,
                    return_type: signature.return_type,
                    aggregate: signature.aggregate,
                    distinct: *distinct,
                })
            }
            Expr::Literal(_) | Expr::SlotRef(_) => Ok(expr.clone()),
            Expr::Cast { expr: inner, to } => Ok(Expr::Cast {
                expr: Box::new(self.bind(inner)?),
                to: *to,
            }),
            Expr::BinaryOp { op, left, right } => self.bind_binary(*op, left, right),
            Expr::UnaryOp { op, operand } => {
                let operand = self.bind(operand)?;
                let operand = match op {
                    UnaryOp::Not => require_boolean(operand, "operand of NOT")?,
                    UnaryOp::Neg => {
                        let t = operand.data_type()?;
                        if !(t.is_numeric() || t.is_null()) {
                            return Err(BindErrorKind::InvalidType {
                                context: "operand of unary minus".into(),
                                expected: "numeric",
                                actual: t,
                            });
                        }
                        operand
                    }
                    UnaryOp::IsNull | UnaryOp::IsNotNull => operand,
                };
                Ok(Expr::UnaryOp {
                    op: *op,
                    operand: Box::new(operand),
                })
            }
            Expr::Function {
                name,
                args,
                return_type,
                aggregate,
                distinct,
            } => Ok(Expr::Function {
                name: name.clone(),
                args: self.bind_all(args)?,
                return_type: *return_type,
                aggregate: *aggregate,
                distinct: *distinct,
            }),
            Expr::And(exprs) => Ok(Expr::And(self.bind_predicates(exprs, "operand of AND")?)),
            Expr::Or(exprs) => Ok(Expr::Or(self.bind_predicates(exprs, "operand of OR")?)),
        }
    }

    pub fn bind_all(&self, exprs: &[Expr]) -> Result<Vec<Expr>> {
        exprs.iter().map(|e| self.bind(e)).collect()
    }

    fn bind_predicates(&self, exprs: &[Expr], context: &str) -> Result<Vec<Expr>> {
        exprs
            .iter()
            .map(|e| require_boolean(self.bind(e)?, context))
            .collect()
    }

    fn bind_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Expr> {
        let (left, right) = (self.bind(left)?, self.bind(right)?);
        let (lt, rt) = (left.data_type()?, right.data_type()?);
        let common = lt
            .common_type(&rt)
            .ok_or(BindErrorKind::IncompatibleOperands {
                op,
                left: lt,
                right: rt,
            })?;
        if !op.is_comparison() && !(common.is_numeric() || common.is_null()) {
            return Err(BindErrorKind::InvalidType {
                context: format!("operands of `{}`", op),
                expected: "numeric",
                actual: common,
            });
        }
        Ok(Expr::BinaryOp {
            op,
            left: Box::new(left.coerce_to(common)?),
            right: Box::new(right.coerce_to(common)?),
        })
    }

    /// The unique scope slot called `name` whose qualifier ends with `qualifier`.
    pub fn resolve_column(&self, qualifier: &[String], name: &str) -> Result<&'a Slot> {
        let mut matches: Vec<&'a Slot> = self
            .scope
            .iter()
            .filter(|slot| self.config.names_match(&slot.name, name))
            .filter(|slot| self.qualifier_matches(slot, qualifier))
            .collect();
        matches.dedup_by_key(|slot| slot.id);

        let display = || {
            let mut parts = qualifier.to_vec();
            parts.push(name.to_string());
            parts.join(".")
        };
        match matches.as_slice() {
            [] => Err(BindErrorKind::UnresolvedColumn(display())),
            [slot] => Ok(slot),
            many => Err(BindErrorKind::AmbiguousColumn {
                name: display(),
                candidates: many
                    .iter()
                    .map(|slot| {
                        let mut parts = slot.qualifier.clone();
                        parts.push(slot.to_string());
                        parts.join(".")
                    })
                    .collect(),
            }),
        }
    }

    /// Scope slots selected by `*` (empty qualifier) or `qualifier.*`.
    pub fn expand_star(&self, qualifier: &[String]) -> Result<Vec<&'a Slot>> {
        let slots: Vec<&'a Slot> = self
            .scope
            .iter()
            .filter(|slot| self.qualifier_matches(slot, qualifier))
            .collect();
        if slots.is_empty() && !qualifier.is_empty() {
            return Err(BindErrorKind::UnresolvedColumn(format!(
                "{}.*",
                qualifier.join(".")
            )));
        }
        Ok(slots)
    }

    fn qualifier_matches(&self, slot: &Slot, qualifier: &[String]) -> bool {
        qualifier.len() <= slot.qualifier.len()
            && slot.qualifier[slot.qualifier.len() - qualifier.len()..]
                .iter()
                .zip(qualifier)
                .all(|(have, want)| self.config.names_match(have, want))
    }
}

/// Check that `expr` is a predicate. An untyped NULL is cast to BOOLEAN.
pub fn require_boolean(expr: Expr, context: &str) -> Result<Expr> {
    match expr.data_type()? {
        DataType::Boolean => Ok(expr),
        DataType::Null => Ok(expr.coerce_to(DataType::Boolean)?),
        other => Err(BindErrorKind::InvalidType {
            context: context.to_string(),
            expected: "BOOLEAN",
            actual: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planx_core::catalog::InMemoryCatalog;
    use planx_core::slot::{SlotId, SlotIdGenerator};
    use std::sync::Arc;

    fn context() -> BindContext {
        BindContext::new(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(AnalyzerConfig::default()),
            Arc::new(SlotIdGenerator::starting_at(100)),
        )
    }

    fn scope() -> Vec<Slot> {
        vec![
            Slot::new(SlotId(0), "id", DataType::BigInt)
                .with_qualifier(vec!["sales".into(), "orders".into()]),
            Slot::new(SlotId(1), "amount", DataType::decimal(10, 2))
                .with_qualifier(vec!["sales".into(), "orders".into()]),
            Slot::new(SlotId(2), "id", DataType::Int)
                .with_qualifier(vec!["sales".into(), "items".into()]),
        ]
    }

    #[test]
    fn test_resolve_qualified_and_unqualified() {
        let ctx = context();
        let scope = scope();
        let binder = ExprBinder::new(&scope, &ctx);

        let bound = binder.bind(&Expr::col("AMOUNT")).unwrap();
        assert_eq!(bound, Expr::SlotRef(scope[1].clone()));

        let bound = binder.bind(&Expr::qualified_col(&["items"], "id")).unwrap();
        assert_eq!(bound, Expr::SlotRef(scope[2].clone()));

        let err = binder.bind(&Expr::col("id")).unwrap_err();
        assert!(matches!(err, BindErrorKind::AmbiguousColumn { ref candidates, .. } if candidates.len() == 2));

        let err = binder.bind(&Expr::col("missing")).unwrap_err();
        assert_eq!(err, BindErrorKind::UnresolvedColumn("missing".into()));
    }

    #[test]
    fn test_comparison_operands_are_coerced() {
        let ctx = context();
        let scope = scope();
        let binder = ExprBinder::new(&scope, &ctx);
        let bound = binder
            .bind(&Expr::binary(
                BinaryOp::Gt,
                Expr::qualified_col(&["items"], "id"),
                Expr::int(5),
            ))
            .unwrap();
        let Expr::BinaryOp { left, right, .. } = &bound else {
            panic!("expected a binary op, got {}", bound);
        };
        assert_eq!(left.data_type().unwrap(), DataType::Int);
        assert_eq!(
            **right,
            Expr::Cast {
                expr: Box::new(Expr::int(5)),
                to: DataType::Int
            }
        );
        assert_eq!(bound.data_type().unwrap(), DataType::Boolean);
    }

    #[test]
    fn test_arithmetic_on_text_is_rejected() {
        let ctx = context();
        let binder = ExprBinder::new(&[], &ctx);
        let err = binder
            .bind(&Expr::binary(BinaryOp::Add, Expr::text("a"), Expr::text("b")))
            .unwrap_err();
        assert!(matches!(err, BindErrorKind::InvalidType { expected: "numeric", .. }));

        let err = binder
            .bind(&Expr::binary(BinaryOp::Eq, Expr::text("a"), Expr::int(1)))
            .unwrap_err();
        assert!(matches!(err, BindErrorKind::IncompatibleOperands { .. }));
    }

    #[test]
    fn test_function_resolution() {
        let ctx = context();
        let scope = scope();
        let binder = ExprBinder::new(&scope, &ctx);
        let bound = binder
            .bind(&Expr::call("sum", vec![Expr::col("amount")]))
            .unwrap();
        assert!(bound.contains_aggregate());
        assert_eq!(bound.data_type().unwrap(), DataType::decimal(38, 2));

        let err = binder
            .bind(&Expr::call("no_such_fn", vec![]))
            .unwrap_err();
        assert!(matches!(err, BindErrorKind::Catalog(_)));
    }

    #[test]
    fn test_star_expansion() {
        let ctx = context();
        let scope = scope();
        let binder = ExprBinder::new(&scope, &ctx);
        assert_eq!(binder.expand_star(&[]).unwrap().len(), 3);
        assert_eq!(binder.expand_star(&["orders".into()]).unwrap().len(), 2);
        assert!(binder.expand_star(&["nope".into()]).is_err());
        assert!(binder.bind(&Expr::star()).is_err());
    }

    #[test]
    fn test_predicate_must_be_boolean() {
        assert!(require_boolean(Expr::int(1), "filter predicate").is_err());
        let cast = require_boolean(Expr::null(), "filter predicate").unwrap();
        assert_eq!(cast.data_type().unwrap(), DataType::Boolean);
    }
}
