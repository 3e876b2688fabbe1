use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[error("Invalid tenant id '{input}': {source}")]
pub struct TenantIdError {
    input: String,
    #[source]
    source: uuid::Error,
}

/// Process-wide tenant identity; one storage root and at most one workload each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Fresh random identifier
    pub fn generate() -> Self {
        TenantId(Uuid::new_v4())
    }

    pub fn parse(input: &str) -> Result<Self, TenantIdError> {
        Uuid::parse_str(input.trim())
            .map(TenantId)
            .map_err(|source| TenantIdError {
                input: input.to_string(),
                source,
            })
    }
}

impl FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::parse(s)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_to_hyphenated_lowercase() {
        let parsed = TenantId::parse(" 0B4E7A0E5C1F4C1A9F598F3F0F7D3A11 ");
        assert!(parsed.is_ok_and(|t| t.to_string() == "0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11"));
    }

    #[test]
    fn test_parse_rejects_path_like_input() {
        assert!(TenantId::parse("../../etc").is_err());
        assert!(TenantId::parse("").is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(TenantId::generate(), TenantId::generate());
    }
}
