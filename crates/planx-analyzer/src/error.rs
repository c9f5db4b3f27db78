//! # Bind Errors
//!
//! Every failure of the analyzer is a `BindError`: what went wrong (`BindErrorKind`)
//! and where (`NodePath`, the chain of operators from the root to the node being
//! bound). Binder errors abort the whole pass; nothing is retried or recovered.

use planx_core::catalog::CatalogError;
use planx_core::error::PlanError;
use planx_core::expr::BinaryOp;
use planx_core::plan::PlanKind;
use planx_core::types::DataType;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = BindError> = std::result::Result<T, E>;

/// Coarse classification of bind failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The plan's shape is invalid (ragged or empty inline rows, unsupported constructs).
    Shape,
    /// No valid typing exists.
    Type,
    /// A table, column or function could not be resolved uniquely.
    Resolution,
    /// An invariant of the plan model was violated.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindErrorKind {
    #[error("inline table has no rows")]
    EmptyInlineTable,

    #[error("inline table rows have no columns")]
    EmptyRow,

    #[error("inline table has {rows} rows, more than the limit of {limit}")]
    TooManyRows { rows: usize, limit: usize },

    #[error("row {row} has {actual} column(s), expected {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} (`{name}`) has no common type: {left} and {right}")]
    TypeMismatch {
        column: usize,
        name: String,
        left: DataType,
        right: DataType,
    },

    #[error("{context} must be {expected}, got {actual}")]
    InvalidType {
        context: String,
        expected: &'static str,
        actual: DataType,
    },

    #[error("operands of `{op}` have no common type: {left} and {right}")]
    IncompatibleOperands {
        op: BinaryOp,
        left: DataType,
        right: DataType,
    },

    #[error("column `{0}` not found")]
    UnresolvedColumn(String),

    #[error("column `{name}` is ambiguous, candidates: {}", .candidates.join(", "))]
    AmbiguousColumn {
        name: String,
        candidates: Vec<String>,
    },

    #[error("`{0}` must appear in GROUP BY or be used in an aggregate function")]
    NotGrouped(String),

    #[error("{0} is not supported here")]
    Unsupported(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl BindErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BindErrorKind::EmptyInlineTable
            | BindErrorKind::EmptyRow
            | BindErrorKind::TooManyRows { .. }
            | BindErrorKind::RowArity { .. }
            | BindErrorKind::NotGrouped(_)
            | BindErrorKind::Unsupported(_) => ErrorCategory::Shape,
            BindErrorKind::TypeMismatch { .. }
            | BindErrorKind::InvalidType { .. }
            | BindErrorKind::IncompatibleOperands { .. } => ErrorCategory::Type,
            BindErrorKind::UnresolvedColumn(_)
            | BindErrorKind::AmbiguousColumn { .. }
            | BindErrorKind::Catalog(_) => ErrorCategory::Resolution,
            BindErrorKind::Plan(PlanError::IncompatibleOperands { .. }) => ErrorCategory::Type,
            BindErrorKind::Plan(_) => ErrorCategory::Internal,
        }
    }
}

/// One step on the way from the root to the failing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Position among the parent's children; `None` for the root.
    pub child_index: Option<usize>,
    pub kind: PlanKind,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.child_index {
            Some(i) => write!(f, "{}:{}", i, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Operators from the root down to the node an error refers to, rendered as
/// `Limit/0:Join/1:UnboundInlineTable`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<PathSegment>);

impl NodePath {
    /// The node the error refers to.
    pub fn leaf(&self) -> Option<&PathSegment> {
        self.0.last()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at {path})")]
pub struct BindError {
    pub kind: BindErrorKind,
    pub path: NodePath,
}

impl BindError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_path() {
        let err = BindError {
            kind: BindErrorKind::RowArity {
                row: 1,
                expected: 2,
                actual: 1,
            },
            path: NodePath(vec![
                PathSegment {
                    child_index: None,
                    kind: PlanKind::Limit,
                },
                PathSegment {
                    child_index: Some(0),
                    kind: PlanKind::UnboundInlineTable,
                },
            ]),
        };
        assert_eq!(
            err.to_string(),
            "row 1 has 1 column(s), expected 2 (at Limit/0:UnboundInlineTable)"
        );
        assert_eq!(err.category(), ErrorCategory::Shape);
        assert_eq!(err.path.leaf().map(|s| s.kind), Some(PlanKind::UnboundInlineTable));
    }

    #[test]
    fn test_categories() {
        let mismatch = BindErrorKind::TypeMismatch {
            column: 0,
            name: "col1".into(),
            left: DataType::Int,
            right: DataType::Text,
        };
        assert_eq!(mismatch.category(), ErrorCategory::Type);

        let missing: BindErrorKind = CatalogError::NotFound {
            kind: "table",
            name: "t".into(),
        }
        .into();
        assert_eq!(missing.category(), ErrorCategory::Resolution);

        let unbound: BindErrorKind = PlanError::unbound("output", "UnboundRelation").into();
        assert_eq!(unbound.category(), ErrorCategory::Internal);
    }
}
