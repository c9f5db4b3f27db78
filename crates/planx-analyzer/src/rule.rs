//! # Bind Rules
//!
//! Each operator that can carry unresolved names has one bind rule. The binder walks
//! the plan post-order: by the time a rule runs, the node's children are already
//! bound, so the rule can resolve against their output slots.
//!
//! A rule receives the operator payload and the bound children and returns the bound
//! node. It never sees, and therefore never mutates, the unbound input node.

use crate::context::BindContext;
use crate::error::Result;
use planx_core::plan::PlanRef;

pub trait BindRule<Op> {
    /// Name used in traces.
    fn name(&self) -> &'static str;

    fn apply(&self, op: &Op, children: Vec<PlanRef>, ctx: &mut BindContext) -> Result<PlanRef>;
}
