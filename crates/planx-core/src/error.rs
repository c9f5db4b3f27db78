//! # Plan Invariant Errors
//!
//! Errors in this module signal programmer mistakes rather than bad user input:
//! asking an unbound node for its schema, or building an operator with the wrong
//! number of inputs. They are never retried. Callers that need the value are
//! responsible for binding the plan first.

use crate::expr::BinaryOp;
use crate::plan::PlanKind;
use crate::types::DataType;
use thiserror::Error;

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A bound-only property was requested from an unbound node or expression.
    #[error("cannot compute {what} of unbound {node}")]
    Unbound { what: &'static str, node: String },

    /// An operator was given the wrong number of inputs.
    #[error("{kind} expects {expected} input(s), got {actual}")]
    Arity {
        kind: PlanKind,
        expected: usize,
        actual: usize,
    },

    /// A bound binary expression whose operand types share no common type.
    #[error("operands of `{op}` have no common type: {left} and {right}")]
    IncompatibleOperands {
        op: BinaryOp,
        left: DataType,
        right: DataType,
    },
}

impl PlanError {
    pub fn unbound(what: &'static str, node: impl Into<String>) -> Self {
        PlanError::Unbound {
            what,
            node: node.into(),
        }
    }
}
