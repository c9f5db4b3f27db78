//! # planx-core: Plan Model, Logical Properties and Memo
//!
//! This crate holds the data structures shared by every pass of the planx query
//! compiler. Parsing produces *unbound* plans built from these types, the analyzer
//! (in `planx-analyzer`) rewrites them into *bound* plans, and the memo groups
//! equivalent bound plans so an external search driver can explore alternatives.
//!
//! ## Module Overview
//!
//! - **`types`**: SQL data types and the implicit-coercion lattice.
//! - **`slot`**: Resolved output column identities (`Slot`, `SlotId`) and the id generator.
//! - **`expr`**: Scalar expressions (unbound and bound variants) and named expressions.
//! - **`plan`**: Logical operators, the immutable `LogicalPlan` node and its capabilities.
//! - **`visitor`**: Double-dispatch traversal over plan nodes, plus the explain printer.
//! - **`properties`**: Output slots and functional dependencies, derived bottom-up.
//! - **`memo`**: Arena of groups and group expressions with signature deduplication.
//! - **`shared`**: Lock-protected memo handle for concurrent rule workers.
//! - **`catalog`**: Catalog trait consumed by the analyzer, and an in-memory catalog.
//! - **`error`**: Invariant-violation errors raised by plan and expression queries.

pub mod catalog;
pub mod error;
pub mod expr;
pub mod memo;
pub mod plan;
pub mod properties;
pub mod shared;
pub mod slot;
pub mod types;
pub mod visitor;
