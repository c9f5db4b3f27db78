//! # Scalar and Named Expressions
//!
//! Expressions are the payload of plan operators: a filter's predicate, a
//! projection's outputs, the literal cells of an inline table. They come in two
//! flavours that share one enum:
//!
//! ## Unbound Expressions
//! Produced by the parser. `UnboundSlot` (a bare column name), `UnboundStar` (`*` or
//! `t.*`) and `UnboundFunction` (a call whose signature is not resolved yet) carry
//! names only. They have no type, and asking for one is an invariant violation.
//!
//! ## Bound Expressions
//! Produced by the analyzer, which is the only component that replaces unbound
//! variants with bound ones. `SlotRef` points at a resolved input column, `Function`
//! carries its resolved return type, and `Cast` is inserted wherever implicit
//! coercion changes a type.
//!
//! ## Named Expressions
//! `NamedExpr` pairs an expression with an optional explicit name and, once bound,
//! the `SlotId` of the column it produces. Projections, aggregate outputs and the
//! cells of an unbound inline table are named expressions.

use crate::error::{PlanError, Result};
use crate::slot::{Slot, SlotId};
use crate::types::DataType;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar value for literals.
///
/// Uses `OrderedFloat` for `f64` so that literals can take part in Eq/Hash
/// comparisons (needed for memo signatures).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    /// SQL NULL value.
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    /// Exact decimal literal such as `2.5`.
    Decimal(Decimal),
    Utf8(String),
    /// Date as days since Unix epoch (1970-01-01).
    Date(i32),
    /// Microseconds since Unix epoch.
    DateTime(i64),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            // Scale is part of the literal's type, so 2.5 and 2.50 are different literals.
            (Self::Decimal(a), Self::Decimal(b)) => a == b && a.scale() == b.scale(),
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Decimal(v) => {
                v.mantissa().hash(state);
                v.scale().hash(state);
            }
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
            Self::DateTime(v) => v.hash(state),
        }
    }
}

impl ScalarValue {
    /// Type of the literal: integers get the narrowest integer type that holds them,
    /// decimals get exactly the digits they are written with.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Boolean,
            ScalarValue::Int64(v) => {
                if i8::try_from(*v).is_ok() {
                    DataType::TinyInt
                } else if i16::try_from(*v).is_ok() {
                    DataType::SmallInt
                } else if i32::try_from(*v).is_ok() {
                    DataType::Int
                } else {
                    DataType::BigInt
                }
            }
            ScalarValue::Float64(_) => DataType::Double,
            ScalarValue::Decimal(d) => {
                let mut mantissa = d.mantissa().unsigned_abs();
                let mut digits: u32 = 1;
                while mantissa >= 10 {
                    mantissa /= 10;
                    digits += 1;
                }
                let scale = d.scale();
                let precision = digits.max(scale);
                DataType::decimal(
                    u8::try_from(precision).unwrap_or(u8::MAX),
                    u8::try_from(scale).unwrap_or(u8::MAX),
                )
            }
            ScalarValue::Utf8(_) => DataType::Text,
            ScalarValue::Date(_) => DataType::Date,
            ScalarValue::DateTime(_) => DataType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Decimal(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v),
            ScalarValue::Date(v) => write!(f, "DATE({})", v),
            ScalarValue::DateTime(v) => write!(f, "DATETIME({})", v),
        }
    }
}

/// Scalar expressions used in predicates, projections, join conditions and inline rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Column named in the query text, not yet resolved against an input schema.
    UnboundSlot { qualifier: Vec<String>, name: String },
    /// `*` or `qualifier.*` in a projection list.
    UnboundStar { qualifier: Vec<String> },
    /// Function call whose signature has not been looked up in the catalog.
    UnboundFunction {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// Constant literal value.
    Literal(ScalarValue),
    /// Reference to a resolved input column.
    SlotRef(Slot),
    /// Explicit or implicitly inserted type conversion.
    Cast { expr: Box<Expr>, to: DataType },
    /// Binary operation (e.g., `a + b`, `x = y`, `price > 100`).
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation (e.g., `NOT flag`, `-value`, `IS NULL`).
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    /// Resolved scalar or aggregate function call.
    Function {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
        aggregate: bool,
        distinct: bool,
    },
    /// Conjunction (AND) of multiple predicates, stored flat.
    And(Vec<Expr>),
    /// Disjunction (OR) of multiple predicates.
    Or(Vec<Expr>),
}

impl Expr {
    /// Unqualified column reference as written by the parser.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::UnboundSlot {
            qualifier: Vec::new(),
            name: name.into(),
        }
    }

    /// Qualified column reference, e.g. `orders.id`.
    pub fn qualified_col(qualifier: &[&str], name: impl Into<String>) -> Self {
        Expr::UnboundSlot {
            qualifier: qualifier.iter().map(|q| q.to_string()).collect(),
            name: name.into(),
        }
    }

    pub fn star() -> Self {
        Expr::UnboundStar {
            qualifier: Vec::new(),
        }
    }

    pub fn lit(value: ScalarValue) -> Self {
        Expr::Literal(value)
    }

    pub fn int(v: i64) -> Self {
        Expr::Literal(ScalarValue::Int64(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Expr::Literal(ScalarValue::Utf8(v.into()))
    }

    pub fn null() -> Self {
        Expr::Literal(ScalarValue::Null)
    }

    /// Unresolved function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::UnboundFunction {
            name: name.into(),
            args,
            distinct: false,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    /// Direct child expressions.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::UnboundSlot { .. }
            | Expr::UnboundStar { .. }
            | Expr::Literal(_)
            | Expr::SlotRef(_) => vec![],
            Expr::UnboundFunction { args, .. } | Expr::Function { args, .. } => {
                args.iter().collect()
            }
            Expr::Cast { expr, .. } => vec![expr.as_ref()],
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::UnaryOp { operand, .. } => vec![operand.as_ref()],
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().collect(),
        }
    }

    /// Whether this expression or any descendant is one of the unbound variants.
    pub fn is_unbound(&self) -> bool {
        match self {
            Expr::UnboundSlot { .. } | Expr::UnboundStar { .. } | Expr::UnboundFunction { .. } => {
                true
            }
            other => other.children().into_iter().any(Expr::is_unbound),
        }
    }

    /// Resolved output type.
    ///
    /// Fails with `PlanError::Unbound` if the expression still contains unresolved names.
    pub fn data_type(&self) -> Result<DataType> {
        match self {
            Expr::UnboundSlot { .. } | Expr::UnboundStar { .. } | Expr::UnboundFunction { .. } => {
                Err(PlanError::unbound("data type", format!("expression `{}`", self)))
            }
            Expr::Literal(v) => Ok(v.data_type()),
            Expr::SlotRef(slot) => Ok(slot.data_type),
            Expr::Cast { to, .. } => Ok(*to),
            Expr::BinaryOp { op, left, right } => {
                let (lt, rt) = (left.data_type()?, right.data_type()?);
                if op.is_comparison() {
                    return Ok(DataType::Boolean);
                }
                lt.common_type(&rt).ok_or(PlanError::IncompatibleOperands {
                    op: *op,
                    left: lt,
                    right: rt,
                })
            }
            Expr::UnaryOp { op, operand } => {
                let t = operand.data_type()?;
                match op {
                    UnaryOp::Neg => Ok(t),
                    UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull => Ok(DataType::Boolean),
                }
            }
            Expr::Function { return_type, .. } => Ok(*return_type),
            Expr::And(exprs) | Expr::Or(exprs) => {
                for e in exprs {
                    e.data_type()?;
                }
                Ok(DataType::Boolean)
            }
        }
    }

    /// Conservative nullability: false only when the expression can never be NULL.
    pub fn nullable(&self) -> bool {
        match self {
            Expr::Literal(v) => v.is_null(),
            Expr::SlotRef(slot) => slot.nullable,
            Expr::UnaryOp {
                op: UnaryOp::IsNull | UnaryOp::IsNotNull,
                ..
            } => false,
            // COUNT never returns NULL.
            Expr::Function {
                name, aggregate, ..
            } if *aggregate && name.eq_ignore_ascii_case("count") => false,
            other => {
                let children = other.children();
                children.is_empty() || children.into_iter().any(Expr::nullable)
            }
        }
    }

    /// Wrap the expression in a cast unless it already has type `target`.
    pub fn coerce_to(self, target: DataType) -> Result<Expr> {
        if self.data_type()? == target {
            Ok(self)
        } else {
            Ok(Expr::Cast {
                expr: Box::new(self),
                to: target,
            })
        }
    }

    /// Return all resolved slot references in this expression.
    pub fn slots(&self) -> Vec<&Slot> {
        let mut slots = Vec::new();
        self.collect_slots(&mut slots);
        slots
    }

    fn collect_slots<'a>(&'a self, out: &mut Vec<&'a Slot>) {
        if let Expr::SlotRef(s) = self {
            out.push(s);
        }
        for child in self.children() {
            child.collect_slots(out);
        }
    }

    /// Whether an aggregate function call appears anywhere in the expression.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Function { aggregate: true, .. } => true,
            other => other.children().into_iter().any(Expr::contains_aggregate),
        }
    }

    /// Flatten AND-chains: (A AND (B AND C)) → [A, B, C].
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(exprs) => exprs.iter().flat_map(|e| e.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Name a column gets when the query does not alias it.
    pub fn display_name(&self) -> String {
        match self {
            Expr::SlotRef(slot) => slot.name.clone(),
            Expr::UnboundSlot { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::UnboundSlot { qualifier, name } => {
                for q in qualifier {
                    write!(f, "{}.", q)?;
                }
                write!(f, "{}", name)
            }
            Expr::UnboundStar { qualifier } => {
                for q in qualifier {
                    write!(f, "{}.", q)?;
                }
                write!(f, "*")
            }
            Expr::UnboundFunction {
                name,
                args,
                distinct,
            }
            | Expr::Function {
                name,
                args,
                distinct,
                ..
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::SlotRef(slot) => write!(f, "{}", slot),
            Expr::Cast { expr, to } => write!(f, "CAST({} AS {})", expr, to),
            Expr::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {}", operand),
                UnaryOp::Neg => write!(f, "-{}", operand),
                UnaryOp::IsNull => write!(f, "{} IS NULL", operand),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", operand),
            },
            Expr::And(exprs) => {
                write!(f, "(")?;
                write_list(f, exprs, " AND ")?;
                write!(f, ")")
            }
            Expr::Or(exprs) => {
                write!(f, "(")?;
                write_list(f, exprs, " OR ")?;
                write!(f, ")")
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// An expression that produces an output column.
///
/// Unbound named expressions have no `id`; the binder assigns one (or reuses the
/// input slot's id for a bare column reference) when it materializes the column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedExpr {
    pub expr: Expr,
    /// Explicit name from `AS alias`, if any.
    pub alias: Option<String>,
    pub id: Option<SlotId>,
}

impl NamedExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            id: None,
        }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
            id: None,
        }
    }

    /// Bound named expression producing the column `id`.
    pub fn bound(expr: Expr, alias: Option<String>, id: SlotId) -> Self {
        Self {
            expr,
            alias,
            id: Some(id),
        }
    }

    /// Explicit name if present, otherwise one derived from the expression.
    pub fn name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.expr.display_name())
    }

    pub fn is_unbound(&self) -> bool {
        self.id.is_none() || self.expr.is_unbound()
    }

    pub fn children(&self) -> Vec<&Expr> {
        vec![&self.expr]
    }

    /// The output column this expression produces.
    pub fn to_slot(&self) -> Result<Slot> {
        let id = self
            .id
            .ok_or_else(|| PlanError::unbound("slot", format!("named expression `{}`", self)))?;
        let data_type = self.expr.data_type()?;
        let qualifier = match (&self.expr, &self.alias) {
            (Expr::SlotRef(s), None) => s.qualifier.clone(),
            _ => Vec::new(),
        };
        Ok(Slot::new(id, self.name(), data_type)
            .with_nullable(self.expr.nullable())
            .with_qualifier(qualifier))
    }
}

impl fmt::Display for NamedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        if let Some(id) = self.id {
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Equality comparison (`=`). Used heavily in join conditions and filters.
    Eq,
    /// Inequality comparison (`<>` or `!=`).
    NotEq,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    LtEq,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    GtEq,
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication (`*`).
    Mul,
    /// Division (`/`).
    Div,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation (`NOT`).
    Not,
    /// Arithmetic negation (unary minus).
    Neg,
    /// Null check (`IS NULL`).
    IsNull,
    /// Non-null check (`IS NOT NULL`).
    IsNotNull,
}

/// SQL join types.
///
/// The join type decides which inputs contribute output columns and which
/// functional dependencies survive the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Inner join: only matching rows from both sides.
    Inner,
    /// Left outer join: all rows from left, matching from right (or NULLs).
    Left,
    /// Right outer join: all rows from right, matching from left (or NULLs).
    Right,
    /// Full outer join: all rows from both sides, NULLs where no match.
    Full,
    /// Semi join: left rows that have at least one match on the right (no right columns).
    Semi,
    /// Anti join: left rows that have no match on the right.
    Anti,
    /// Cross join: Cartesian product of both sides (no condition).
    Cross,
}

impl JoinType {
    /// Whether columns of the right input appear in the join output.
    pub fn outputs_right(&self) -> bool {
        !matches!(self, JoinType::Semi | JoinType::Anti)
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
            nulls_first: false,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.expr,
            if self.ascending { "ASC" } else { "DESC" }
        )?;
        if self.nulls_first {
            write!(f, " NULLS FIRST")?;
        }
        Ok(())
    }
}
