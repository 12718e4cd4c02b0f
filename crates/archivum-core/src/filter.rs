//! Query/filter builder.
//!
//! [`build_filter`] turns optional search criteria into a [`Filter`]: a
//! conjunction of storage-agnostic clauses. It never touches storage.
//! The service-scope clause always comes first, and for anyone below
//! super-admin it is the caller's own service regardless of what the
//! criteria ask for.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArchiveError, ArchiveResult};
use crate::models::identity::{Identity, Role, ServiceCode};

/// Name of a key inside an entity's `metadata` object.
///
/// Restricted to ASCII letters, digits and `_` (not starting with a
/// digit) so it can be addressed as a field path by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataKey(String);

impl MetadataKey {
    pub fn new(key: &str) -> ArchiveResult<Self> {
        let mut chars = key.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ArchiveError::validation(format!(
                "invalid metadata key: {key:?}"
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MetadataKey {
    type Error = ArchiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<MetadataKey> for String {
    fn from(key: MetadataKey) -> Self {
        key.0
    }
}

/// Either a single value or a list, as accepted from query strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Optional search criteria supplied by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text query, matched case-insensitively as a substring.
    pub query: Option<String>,
    /// Only honoured for super-admins.
    pub service: Option<ServiceCode>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub tags: Option<OneOrMany<String>>,
    /// Inclusive lower bound on creation time.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Vec<(MetadataKey, Value)>,
}

/// Entity fields compared by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Service,
    Category,
    Status,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Equals { field: Field, value: String },
    /// Case-insensitive substring over the entity's text fields; `needle`
    /// is already lower-cased.
    Text { needle: String },
    /// Inclusive creation-time range; at least one bound is set.
    CreatedBetween {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Matches when the entity carries any of the tags.
    AnyTag { tags: Vec<String> },
    MetadataEquals { key: MetadataKey, value: Value },
}

/// Conjunction of clauses. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The service this filter is pinned to, if any.
    pub fn service_scope(&self) -> Option<&str> {
        self.clauses.iter().find_map(|clause| match clause {
            Clause::Equals {
                field: Field::Service,
                value,
            } => Some(value.as_str()),
            _ => None,
        })
    }
}

pub fn build_filter(identity: &Identity, criteria: &SearchCriteria) -> Filter {
    let service = if identity.role == Role::SuperAdmin {
        criteria.service.as_ref()
    } else {
        Some(&identity.service)
    };

    let mut filter = Filter::all();
    if let Some(service) = service {
        filter = filter.and(Clause::Equals {
            field: Field::Service,
            value: service.as_str().to_string(),
        });
    }

    for (field, value) in [
        (Field::Category, &criteria.category),
        (Field::Status, &criteria.status),
    ] {
        if let Some(value) = non_blank(value.as_deref()) {
            filter = filter.and(Clause::Equals {
                field,
                value: value.to_string(),
            });
        }
    }

    if let Some(query) = non_blank(criteria.query.as_deref()) {
        filter = filter.and(Clause::Text {
            needle: query.to_lowercase(),
        });
    }

    if criteria.date_from.is_some() || criteria.date_to.is_some() {
        filter = filter.and(Clause::CreatedBetween {
            from: criteria.date_from,
            to: criteria.date_to,
        });
    }

    if let Some(tags) = criteria.tags.clone() {
        let tags: Vec<String> = tags
            .into_vec()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !tags.is_empty() {
            filter = filter.and(Clause::AnyTag { tags });
        }
    }

    for (key, value) in &criteria.metadata {
        filter = filter.and(Clause::MetadataEquals {
            key: key.clone(),
            value: value.clone(),
        });
    }

    filter
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
