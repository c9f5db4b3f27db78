//! # Data Types and Implicit Coercion
//!
//! Every bound expression has a `DataType`. When several expressions must share one
//! type (the rows of a `VALUES` column, the operands of a comparison, the arguments
//! of a function) the binder asks the coercion lattice for their *common type* and
//! casts the expressions that differ from it.
//!
//! ## The Lattice
//!
//! ```text
//!                 Double
//!                /      \
//!            Float    Decimal(p, s)
//!                       |
//!   BigInt > Int > SmallInt > TinyInt         DateTime       Text    Boolean
//!                                                |
//!                                              Date
//!
//!                         Null  (below everything)
//! ```
//!
//! - Integers widen by rank.
//! - An integer meeting a decimal becomes a decimal wide enough for both the
//!   integer's digits and the decimal's scale, capped at 38 digits of precision.
//! - Any other numeric pairing involving a floating type becomes `Double`.
//! - `Date` widens to `DateTime`.
//! - `Text` and `Boolean` only meet themselves (and `Null`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest precision a decimal may carry.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of the untyped `NULL` literal.
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    /// Fixed-point decimal with `precision` total digits, `scale` of them fractional.
    Decimal { precision: u8, scale: u8 },
    Float,
    Double,
    /// Variable-length UTF-8 string.
    Text,
    /// Calendar date.
    Date,
    /// Date and time of day.
    DateTime,
}

impl DataType {
    /// Build a decimal type, clamping precision to `[1, 38]` and scale to the precision.
    pub fn decimal(precision: u8, scale: u8) -> Self {
        let precision = precision.clamp(1, MAX_DECIMAL_PRECISION);
        DataType::Decimal {
            precision,
            scale: scale.min(precision),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub fn is_integer(&self) -> bool {
        self.integer_rank().is_some()
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, DataType::Decimal { .. })
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_decimal() || self.is_floating()
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    fn integer_rank(&self) -> Option<u8> {
        match self {
            DataType::TinyInt => Some(1),
            DataType::SmallInt => Some(2),
            DataType::Int => Some(3),
            DataType::BigInt => Some(4),
            _ => None,
        }
    }

    /// Decimal digits needed to hold every value of an integer type.
    pub fn integer_digits(&self) -> Option<u8> {
        match self {
            DataType::TinyInt => Some(3),
            DataType::SmallInt => Some(5),
            DataType::Int => Some(10),
            DataType::BigInt => Some(19),
            _ => None,
        }
    }

    /// Smallest type both `self` and `other` implicitly coerce to, if any.
    ///
    /// The relation is symmetric, and `t.common_type(&t) == Some(t)` for every `t`.
    pub fn common_type(&self, other: &DataType) -> Option<DataType> {
        use DataType::*;

        if self == other {
            return Some(*self);
        }
        match (*self, *other) {
            (Null, t) | (t, Null) => Some(t),
            (a, b) if a.is_integer() && b.is_integer() => {
                if a.integer_rank() >= b.integer_rank() {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (
                Decimal {
                    precision: p1,
                    scale: s1,
                },
                Decimal {
                    precision: p2,
                    scale: s2,
                },
            ) => Some(widen_decimal(
                p1.saturating_sub(s1).max(p2.saturating_sub(s2)),
                s1.max(s2),
            )),
            (Decimal { precision, scale }, int) | (int, Decimal { precision, scale })
                if int.is_integer() =>
            {
                let int_digits = int.integer_digits()?;
                Some(widen_decimal(
                    precision.saturating_sub(scale).max(int_digits),
                    scale,
                ))
            }
            (a, b) if a.is_numeric() && b.is_numeric() => Some(Double),
            (Date, DateTime) | (DateTime, Date) => Some(DateTime),
            _ => None,
        }
    }

    /// Whether a value of `self` may be implicitly cast to `target`.
    pub fn coercible_to(&self, target: &DataType) -> bool {
        self.common_type(target) == Some(*target)
    }
}

fn widen_decimal(integer_digits: u8, scale: u8) -> DataType {
    let precision = integer_digits.saturating_add(scale).min(MAX_DECIMAL_PRECISION);
    DataType::decimal(precision, scale)
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({}, {})", precision, scale)
            }
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Date => write!(f, "DATE"),
            DataType::DateTime => write!(f, "DATETIME"),
        }
    }
}
