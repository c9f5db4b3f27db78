//! # Catalog Interface
//!
//! The catalog answers the two questions the analyzer cannot answer from the query
//! text alone: which table a (possibly partial) name refers to, and which function
//! overload a call with given argument types resolves to.
//!
//! ## Trait Design
//!
//! `Catalog` is used behind a trait object (`Arc<dyn Catalog>`) so that different
//! metadata backends can be plugged in. The `InMemoryCatalog` is populated
//! programmatically and serves tests and embedding applications.
//!
//! ## Name Resolution
//!
//! Table names are matched case-insensitively. A name may be given as `table`,
//! `schema.table` or `catalog.schema.table`; the catalog component is ignored. A bare
//! table name that exists in several schemas is ambiguous.
//!
//! Functions registered on the catalog shadow the built-in set.

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Fully-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Everything the analyzer needs to bind a table reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
    /// Column-name sets declared unique (primary keys, unique constraints).
    pub unique_keys: Vec<Vec<String>>,
}

/// A resolved function overload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub arg_types: Vec<DataType>,
    pub return_type: DataType,
    pub aggregate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} `{name}` is ambiguous, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        kind: &'static str,
        name: String,
        candidates: Vec<String>,
    },
}

/// Catalog provides table metadata and function resolution.
pub trait Catalog: Send + Sync {
    /// Resolve a one-, two- or three-part table name.
    fn resolve_table(&self, name_parts: &[String]) -> Result<TableMeta, CatalogError>;

    /// Resolve a function call given the types of its (already bound) arguments.
    fn resolve_function(
        &self,
        name: &str,
        arg_types: &[DataType],
    ) -> Result<FunctionSignature, CatalogError>;
}

/// In-memory catalog for tests and embedding.
///
/// Tables are keyed by their lower-cased fully-qualified name (`schema.table`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: BTreeMap<String, TableMeta>,
    /// User-registered overloads keyed by lower-cased function name.
    functions: BTreeMap<String, Vec<FunctionSignature>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableRef, columns: Vec<ColumnDef>) -> &mut Self {
        self.add_table_with_keys(table, columns, Vec::new())
    }

    pub fn add_table_with_keys(
        &mut self,
        table: TableRef,
        columns: Vec<ColumnDef>,
        unique_keys: Vec<Vec<String>>,
    ) -> &mut Self {
        let key = table.to_string().to_lowercase();
        self.tables.insert(
            key,
            TableMeta {
                table,
                columns,
                unique_keys,
            },
        );
        self
    }

    pub fn add_function(&mut self, signature: FunctionSignature) -> &mut Self {
        self.functions
            .entry(signature.name.to_lowercase())
            .or_default()
            .push(signature);
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn resolve_table(&self, name_parts: &[String]) -> Result<TableMeta, CatalogError> {
        let not_found = || CatalogError::NotFound {
            kind: "table",
            name: name_parts.join("."),
        };
        match name_parts {
            [name] => {
                let suffix = format!(".{}", name.to_lowercase());
                let matches: Vec<&TableMeta> = self
                    .tables
                    .iter()
                    .filter(|(key, _)| key.ends_with(&suffix))
                    .map(|(_, meta)| meta)
                    .collect();
                match matches.as_slice() {
                    [] => Err(not_found()),
                    [meta] => Ok((*meta).clone()),
                    many => Err(CatalogError::Ambiguous {
                        kind: "table",
                        name: name.clone(),
                        candidates: many.iter().map(|m| m.table.to_string()).collect(),
                    }),
                }
            }
            [.., schema, name] if name_parts.len() <= 3 => {
                let key = format!("{}.{}", schema, name).to_lowercase();
                self.tables.get(&key).cloned().ok_or_else(not_found)
            }
            _ => Err(not_found()),
        }
    }

    fn resolve_function(
        &self,
        name: &str,
        arg_types: &[DataType],
    ) -> Result<FunctionSignature, CatalogError> {
        let lower = name.to_lowercase();
        if let Some(overloads) = self.functions.get(&lower) {
            if let Some(sig) = overloads.iter().find(|sig| sig.arg_types == arg_types) {
                return Ok(sig.clone());
            }
            let coercible: Vec<&FunctionSignature> = overloads
                .iter()
                .filter(|sig| {
                    sig.arg_types.len() == arg_types.len()
                        && arg_types
                            .iter()
                            .zip(&sig.arg_types)
                            .all(|(actual, declared)| actual.coercible_to(declared))
                })
                .collect();
            match coercible.as_slice() {
                [] => {}
                [sig] => return Ok((*sig).clone()),
                many => {
                    return Err(CatalogError::Ambiguous {
                        kind: "function",
                        name: call_display(name, arg_types),
                        candidates: many
                            .iter()
                            .map(|sig| call_display(&sig.name, &sig.arg_types))
                            .collect(),
                    })
                }
            }
        }
        builtin_function(&lower, arg_types).ok_or_else(|| CatalogError::NotFound {
            kind: "function",
            name: call_display(name, arg_types),
        })
    }
}

/// `name(T1, T2)`, as shown in function lookup errors.
fn call_display(name: &str, arg_types: &[DataType]) -> String {
    let args: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
    format!("{}({})", name, args.join(", "))
}

/// Built-in scalar and aggregate functions.
fn builtin_function(name: &str, arg_types: &[DataType]) -> Option<FunctionSignature> {
    let (return_type, aggregate) = match (name, arg_types) {
        ("count", [] | [_]) => (DataType::BigInt, true),
        ("min" | "max", [t]) => (*t, true),
        ("sum", [t]) if t.is_integer() || t.is_null() => (DataType::BigInt, true),
        ("sum", [DataType::Decimal { scale, .. }]) => (DataType::decimal(38, *scale), true),
        ("sum", [t]) if t.is_floating() => (DataType::Double, true),
        ("avg", [t]) if t.is_numeric() || t.is_null() => (DataType::Double, true),
        ("abs", [t]) if t.is_numeric() || t.is_null() => (*t, false),
        ("upper" | "lower", [DataType::Text | DataType::Null]) => (DataType::Text, false),
        ("length", [DataType::Text | DataType::Null]) => (DataType::BigInt, false),
        ("coalesce", [first, rest @ ..]) => {
            let common = rest
                .iter()
                .try_fold(*first, |acc, t| acc.common_type(t))?;
            (common, false)
        }
        _ => return None,
    };
    Some(FunctionSignature {
        name: name.to_string(),
        arg_types: arg_types.to_vec(),
        return_type,
        aggregate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(name: &str) -> Vec<String> {
        name.split('.').map(String::from).collect()
    }

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table_with_keys(
                TableRef::new("sales", "orders"),
                vec![
                    ColumnDef::new("id", DataType::BigInt, false),
                    ColumnDef::new("amount", DataType::decimal(10, 2), true),
                ],
                vec![vec!["id".into()]],
            )
            .add_table(
                TableRef::new("sales", "items"),
                vec![ColumnDef::new("id", DataType::BigInt, false)],
            )
            .add_table(
                TableRef::new("archive", "items"),
                vec![ColumnDef::new("id", DataType::BigInt, false)],
            );
        catalog
    }

    #[test]
    fn test_resolve_table_by_partial_name() {
        let catalog = catalog();
        let meta = catalog.resolve_table(&parts("ORDERS")).unwrap();
        assert_eq!(meta.table, TableRef::new("sales", "orders"));
        assert_eq!(meta.unique_keys, vec![vec!["id".to_string()]]);

        let meta = catalog.resolve_table(&parts("prod.archive.items")).unwrap();
        assert_eq!(meta.table.schema, "archive");
    }

    #[test]
    fn test_ambiguous_and_missing_tables() {
        let catalog = catalog();
        let err = catalog.resolve_table(&parts("items")).unwrap_err();
        assert!(matches!(err, CatalogError::Ambiguous { ref candidates, .. } if candidates.len() == 2));

        let err = catalog.resolve_table(&parts("sales.nope")).unwrap_err();
        assert_eq!(err.to_string(), "table `sales.nope` not found");
    }

    #[test]
    fn test_builtin_functions() {
        let catalog = catalog();
        let sum = catalog
            .resolve_function("SUM", &[DataType::decimal(10, 2)])
            .unwrap();
        assert_eq!(sum.return_type, DataType::decimal(38, 2));
        assert!(sum.aggregate);

        let coalesce = catalog
            .resolve_function("coalesce", &[DataType::Null, DataType::Int, DataType::BigInt])
            .unwrap();
        assert_eq!(coalesce.return_type, DataType::BigInt);
        assert!(!coalesce.aggregate);

        assert!(catalog.resolve_function("upper", &[DataType::Int]).is_err());
    }

    #[test]
    fn test_registered_function_shadows_builtin() {
        let mut catalog = catalog();
        catalog.add_function(FunctionSignature {
            name: "abs".into(),
            arg_types: vec![DataType::BigInt],
            return_type: DataType::decimal(20, 0),
            aggregate: false,
        });
        // INT coerces to the registered BIGINT overload.
        let abs = catalog.resolve_function("abs", &[DataType::Int]).unwrap();
        assert_eq!(abs.return_type, DataType::decimal(20, 0));
        // No coercible overload: fall back to the built-in.
        let abs = catalog.resolve_function("abs", &[DataType::Double]).unwrap();
        assert_eq!(abs.return_type, DataType::Double);

        // With a DOUBLE overload as well, INT coerces to both; only an exact match resolves.
        catalog.add_function(FunctionSignature {
            name: "abs".into(),
            arg_types: vec![DataType::Double],
            return_type: DataType::Double,
            aggregate: false,
        });
        let err = catalog.resolve_function("abs", &[DataType::Int]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Ambiguous { kind: "function", ref candidates, .. } if candidates.len() == 2
        ));
        assert_eq!(
            err.to_string(),
            "function `abs(INT)` is ambiguous, candidates: abs(BIGINT), abs(DOUBLE)"
        );
        let abs = catalog.resolve_function("abs", &[DataType::BigInt]).unwrap();
        assert_eq!(abs.return_type, DataType::decimal(20, 0));
    }
}
