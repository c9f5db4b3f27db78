//! # Analyzer
//!
//! Turns an *unbound* logical plan, as produced by a parser, into a *bound* one whose
//! every column is a typed slot with a stable id.
//!
//! ## Bind Rules
//!
//! One rule per operator that can carry unresolved names:
//!
//! - **`BindRelation`**: resolves a table name through the catalog into a `Scan`.
//! - **`BindInlineTable`**: checks that `VALUES` rows are rectangular, infers one
//!   common type per column and casts cells to it.
//! - **`BindOneRowRelation`**: binds `SELECT <exprs>` without a FROM clause.
//! - **`BindFilter`**, **`BindProject`**, **`BindJoin`**, **`BindAggregate`**,
//!   **`BindSort`**: resolve expressions against the outputs of bound children.
//!
//! ## Errors
//!
//! A failed bind returns a `BindError` carrying the error kind, its category, and
//! the path from the root to the offending node. The input plan is left untouched.

pub mod bind_expression;
pub mod bind_inline_table;
pub mod bind_one_row_relation;
pub mod bind_relation;
pub mod binder;
pub mod config;
pub mod context;
pub mod error;
pub mod expr_binder;
pub mod rule;

use crate::binder::Binder;
use crate::config::AnalyzerConfig;
use crate::context::BindContext;
use crate::error::BindError;
use planx_core::catalog::Catalog;
use planx_core::plan::PlanRef;
use planx_core::slot::SlotIdGenerator;
use std::sync::Arc;
use tracing::debug;

/// Entry point: binds plans against one catalog.
///
/// Slot ids come from a single generator shared by every `analyze` call, so plans
/// bound by the same analyzer never reuse an id.
pub struct Analyzer {
    catalog: Arc<dyn Catalog>,
    config: Arc<AnalyzerConfig>,
    ids: Arc<SlotIdGenerator>,
}

impl Analyzer {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_config(catalog, AnalyzerConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn Catalog>, config: AnalyzerConfig) -> Self {
        Self {
            catalog,
            config: Arc::new(config),
            ids: Arc::new(SlotIdGenerator::new()),
        }
    }

    /// Use `ids` for new slots, e.g. to share one id space with another analyzer.
    pub fn with_slot_ids(mut self, ids: Arc<SlotIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Bind `plan`. Returns `plan` itself when it is already fully bound.
    pub fn analyze(&self, plan: &PlanRef) -> Result<PlanRef, BindError> {
        let mut ctx = BindContext::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.config),
            Arc::clone(&self.ids),
        );
        let bound = Binder::new().bind(plan, &mut ctx);
        match &bound {
            Ok(bound) => debug!("analyzed plan:\n{}", bound.tree_string()),
            Err(err) => debug!("analysis failed: {}", err),
        }
        bound
    }
}

/// Bind `plan` against `catalog` with the default configuration.
pub fn analyze(plan: &PlanRef, catalog: Arc<dyn Catalog>) -> Result<PlanRef, BindError> {
    Analyzer::new(catalog).analyze(plan)
}
