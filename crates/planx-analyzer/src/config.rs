//! Analyzer configuration.

use serde::Deserialize;

/// Knobs for the analyzer.
///
/// Deserializable so that an embedding application can load it from its own
/// configuration file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Prefix of generated column names: unnamed inline-table columns become
    /// `{prefix}1`, `{prefix}2`, ...
    pub default_column_prefix: String,
    /// Largest number of rows accepted in one inline table.
    pub max_inline_rows: usize,
    /// Whether column names are matched case-sensitively.
    pub case_sensitive: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_column_prefix: "col".to_string(),
            max_inline_rows: 100_000,
            case_sensitive: false,
        }
    }
}

impl AnalyzerConfig {
    /// Name of the `index`-th (0-based) generated column.
    pub fn column_name(&self, index: usize) -> String {
        format!("{}{}", self.default_column_prefix, index + 1)
    }

    pub(crate) fn names_match(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }
}
