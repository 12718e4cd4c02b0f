//! Translation of core [`Filter`]s into SurrealQL `WHERE` conditions.
//!
//! Every value travels as a bound parameter. They are collected into a
//! single object bound as `$criteria` and addressed as `$criteria.p0`,
//! `$criteria.p1`, ... so the number of clauses never changes the set of
//! bind names. Metadata keys are spliced into the statement as field
//! paths, which is safe because [`MetadataKey`] only admits identifiers.
//!
//! [`MetadataKey`]: archivum_core::filter::MetadataKey

use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::filter::{Clause, Field, Filter};
use serde_json::{Map, Value};

/// Name of the bound parameter holding all clause values.
pub(crate) const CRITERIA_PARAM: &str = "criteria";

/// Which filterable columns a table carries.
#[derive(Debug)]
pub(crate) struct FilterColumns {
    pub table: &'static str,
    /// Columns searched by free text.
    pub text: &'static [&'static str],
    pub category: bool,
    pub tags: bool,
}

pub(crate) const DOCUMENT_COLUMNS: FilterColumns = FilterColumns {
    table: "document",
    text: &["title", "description"],
    category: true,
    tags: true,
};

pub(crate) const CORRESPONDENCE_COLUMNS: FilterColumns = FilterColumns {
    table: "correspondence",
    text: &["subject", "notes", "reference"],
    category: false,
    tags: false,
};

#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    params: Map<String, Value>,
}

impl WhereClause {
    /// ` WHERE a AND b`, or an empty string when nothing is filtered.
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> Value {
        Value::Object(self.params.clone())
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        let placeholder = format!("${CRITERIA_PARAM}.{name}");
        self.params.insert(name, value);
        placeholder
    }
}

pub(crate) fn translate(filter: &Filter, columns: &FilterColumns) -> ArchiveResult<WhereClause> {
    let mut clause = WhereClause::default();

    for item in filter.clauses() {
        let condition = match item {
            Clause::Equals { field, value } => {
                let column = match field {
                    Field::Service => "service",
                    Field::Status => "status",
                    Field::Category if columns.category => "category",
                    Field::Category => return Err(unsupported(columns, "category")),
                };
                let p = clause.bind(Value::String(value.clone()));
                format!("{column} = {p}")
            }
            Clause::Text { needle } => {
                let p = clause.bind(Value::String(needle.clone()));
                let alternatives: Vec<String> = columns
                    .text
                    .iter()
                    .map(|column| {
                        format!("string::contains(string::lowercase({column} ?? ''), {p})")
                    })
                    .collect();
                format!("({})", alternatives.join(" OR "))
            }
            Clause::CreatedBetween { from, to } => {
                let mut bounds = Vec::new();
                if let Some(from) = from {
                    let p = clause.bind(Value::String(from.to_rfc3339()));
                    bounds.push(format!("created_at >= <datetime> {p}"));
                }
                if let Some(to) = to {
                    let p = clause.bind(Value::String(to.to_rfc3339()));
                    bounds.push(format!("created_at <= <datetime> {p}"));
                }
                if bounds.is_empty() {
                    continue;
                }
                bounds.join(" AND ")
            }
            Clause::AnyTag { tags } => {
                if !columns.tags {
                    return Err(unsupported(columns, "tags"));
                }
                let values = tags.iter().cloned().map(Value::String).collect();
                let p = clause.bind(Value::Array(values));
                format!("tags CONTAINSANY {p}")
            }
            Clause::MetadataEquals { key, value } => {
                let p = clause.bind(value.clone());
                format!("metadata.{key} = {p}")
            }
        };
        clause.conditions.push(condition);
    }

    Ok(clause)
}

fn unsupported(columns: &FilterColumns, field: &str) -> ArchiveError {
    ArchiveError::validation(format!("{} cannot be filtered by {field}", columns.table))
}
