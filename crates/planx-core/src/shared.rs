//! # Shared Memo
//!
//! Rule workers running on several threads share one memo. `SharedMemo` wraps it in a
//! `parking_lot::RwLock`: every mutating operation is one write-locked critical
//! section, so the signature lookup and the table update it guards can never
//! interleave with another writer. Extraction and inspection take the read lock.

use crate::memo::{ExprId, Group, GroupId, InsertOutcome, Memo, Result};
use crate::plan::{LogicalOp, PlanRef};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct SharedMemo {
    inner: RwLock<Memo>,
}

impl SharedMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, plan: &PlanRef) -> Result<GroupId> {
        self.inner.write().insert(plan)
    }

    pub fn insert_expr(&self, op: LogicalOp, children: Vec<GroupId>) -> Result<InsertOutcome> {
        self.inner.write().insert_expr(op, children)
    }

    pub fn add_expr_to_group(
        &self,
        group: GroupId,
        op: LogicalOp,
        children: Vec<GroupId>,
    ) -> Result<InsertOutcome> {
        self.inner.write().add_expr_to_group(group, op, children)
    }

    pub fn merge(&self, a: GroupId, b: GroupId) -> Result<GroupId> {
        self.inner.write().merge(a, b)
    }

    pub fn extract<F>(&self, group: GroupId, choose: F) -> Result<PlanRef>
    where
        F: FnMut(&Memo, &Group) -> Option<ExprId>,
    {
        self.inner.read().extract(group, choose)
    }

    /// Shared access for multi-step inspection.
    pub fn read(&self) -> RwLockReadGuard<'_, Memo> {
        self.inner.read()
    }

    /// Exclusive access for driver bookkeeping (explore flags, applied rules).
    pub fn write(&self) -> RwLockWriteGuard<'_, Memo> {
        self.inner.write()
    }

    pub fn into_inner(self) -> Memo {
        self.inner.into_inner()
    }
}

impl From<Memo> for SharedMemo {
    fn from(memo: Memo) -> Self {
        Self {
            inner: RwLock::new(memo),
        }
    }
}
