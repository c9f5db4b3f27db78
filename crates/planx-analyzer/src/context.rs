//! Per-pass state shared by the bind rules.

use crate::config::AnalyzerConfig;
use crate::error::{BindError, BindErrorKind, NodePath, PathSegment};
use planx_core::catalog::Catalog;
use planx_core::plan::PlanKind;
use planx_core::slot::{SlotId, SlotIdGenerator};
use std::sync::Arc;

pub struct BindContext {
    catalog: Arc<dyn Catalog>,
    config: Arc<AnalyzerConfig>,
    ids: Arc<SlotIdGenerator>,
    path: Vec<PathSegment>,
}

impl BindContext {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        config: Arc<AnalyzerConfig>,
        ids: Arc<SlotIdGenerator>,
    ) -> Self {
        Self {
            catalog,
            config,
            ids,
            path: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn next_slot_id(&self) -> SlotId {
        self.ids.next_id()
    }

    pub(crate) fn enter(&mut self, child_index: Option<usize>, kind: PlanKind) {
        self.path.push(PathSegment { child_index, kind });
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    /// Error at the node currently being bound.
    pub fn error(&self, kind: impl Into<BindErrorKind>) -> BindError {
        BindError {
            kind: kind.into(),
            path: NodePath(self.path.clone()),
        }
    }
}
