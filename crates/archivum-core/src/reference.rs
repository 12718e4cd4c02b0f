//! Human-readable business references (`<DOMAIN>-<year>-<seq>`).

use std::fmt;
use std::str::FromStr;

use crate::error::{ArchiveError, ArchiveResult};

/// Width the sequence part is zero-padded to.
pub const SEQUENCE_WIDTH: usize = 5;

/// Upper-case alphanumeric prefix of a reference (e.g., `COUR`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceDomain(String);

impl ReferenceDomain {
    pub fn new(domain: &str) -> ArchiveResult<Self> {
        let domain = domain.trim();
        if domain.is_empty()
            || !domain
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(ArchiveError::validation(format!(
                "invalid reference domain: {domain:?}"
            )));
        }
        Ok(Self(domain.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the counter backing this domain's sequence.
    pub fn sequence_key(&self) -> String {
        format!("reference_{}", self.0.to_ascii_lowercase())
    }
}

impl fmt::Display for ReferenceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a reference. Sequences wider than [`SEQUENCE_WIDTH`] digits are
/// kept whole rather than truncated.
pub fn format_reference(domain: &ReferenceDomain, year: i32, sequence: u64) -> String {
    format!("{domain}-{year}-{sequence:0width$}", width = SEQUENCE_WIDTH)
}

/// A reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub domain: ReferenceDomain,
    pub year: i32,
    pub sequence: u64,
}

impl FromStr for ParsedReference {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArchiveError::validation(format!("malformed reference: {s:?}"));
        let mut parts = s.rsplitn(3, '-');
        let sequence = parts.next().ok_or_else(invalid)?;
        let year = parts.next().ok_or_else(invalid)?;
        let domain = parts.next().ok_or_else(invalid)?;
        if sequence.len() < SEQUENCE_WIDTH || year.len() != 4 {
            return Err(invalid());
        }
        Ok(Self {
            domain: ReferenceDomain::new(domain)?,
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}
