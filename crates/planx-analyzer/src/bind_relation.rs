//! # Relation Binding
//!
//! Resolves a table name through the catalog and materializes one slot per column.
//! Slots are qualified with `[schema, table]`, so both `t.col` and `schema.t.col`
//! resolve against them. An aliased relation is qualified by its alias alone. Unique keys declared in the catalog become slot-id keys on
//! the `Scan`, from which the properties engine derives functional dependencies.

use crate::context::BindContext;
use crate::error::Result;
use crate::rule::BindRule;
use planx_core::plan::{LogicalOp, LogicalPlan, PlanRef, Scan, UnboundRelation};
use planx_core::slot::{Slot, SlotId};
use tracing::{debug, warn};

pub struct BindRelation;

impl BindRule<UnboundRelation> for BindRelation {
    fn name(&self) -> &'static str {
        "BindRelation"
    }

    fn apply(
        &self,
        op: &UnboundRelation,
        children: Vec<PlanRef>,
        ctx: &mut BindContext,
    ) -> Result<PlanRef> {
        let meta = ctx
            .catalog()
            .resolve_table(&op.name_parts)
            .map_err(|e| ctx.error(e))?;
        debug!("resolved {} to {}", op.name_parts.join("."), meta.table);

        let qualifier = match &op.alias {
            Some(alias) => vec![alias.clone()],
            None => vec![meta.table.schema.clone(), meta.table.name.clone()],
        };
        let output: Vec<Slot> = meta
            .columns
            .iter()
            .map(|column| {
                Slot::new(ctx.next_slot_id(), column.name.clone(), column.data_type)
                    .with_nullable(column.nullable)
                    .with_qualifier(qualifier.clone())
            })
            .collect();

        let mut unique_keys = Vec::with_capacity(meta.unique_keys.len());
        for key in &meta.unique_keys {
            let ids: Option<Vec<SlotId>> = key
                .iter()
                .map(|name| {
                    output
                        .iter()
                        .find(|slot| ctx.config().names_match(&slot.name, name))
                        .map(|slot| slot.id)
                })
                .collect();
            match ids {
                Some(ids) => unique_keys.push(ids),
                None => warn!(
                    "ignoring unique key ({}) of {}: unknown column",
                    key.join(", "),
                    meta.table
                ),
            }
        }

        Ok(LogicalPlan::new(
            LogicalOp::Scan(Scan {
                table: meta.table,
                output,
                unique_keys,
            }),
            children,
        ))
    }
}
