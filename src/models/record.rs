use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PolyportError, Result};

/// Maximum length of a record name, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Default page size when listing records
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: usize = 100;

/// Record entity shared by every protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of a create or update request
///
/// Updates replace every mutable field, so an omitted `value` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordInput {
    pub name: String,
    pub value: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl RecordInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Check the name constraints
    pub fn validate(&self) -> Result<()> {
        let len = self.name.chars().count();
        if len == 0 {
            return Err(PolyportError::InvalidRequest("Name is required".to_string()));
        }
        if len > MAX_NAME_LEN {
            return Err(PolyportError::InvalidRequest(format!(
                "Name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }
        Ok(())
    }
}

/// Record list parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordListParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
}

impl RecordListParams {
    /// Page number, defaulting to the first page
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1)
    }

    /// Page size, defaulting to [`DEFAULT_PAGE_SIZE`]
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Reject out-of-range pagination
    pub fn validate(&self) -> Result<()> {
        if self.page() < 1 {
            return Err(PolyportError::InvalidRequest(
                "page must be at least 1".to_string(),
            ));
        }
        let size = self.page_size();
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(PolyportError::InvalidRequest(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    /// Search term, ignoring blank input
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_input_validation() {
        assert!(RecordInput::new("sensor").validate().is_ok());
        assert!(RecordInput::new("").validate().is_err());
        assert!(RecordInput::new("x".repeat(MAX_NAME_LEN)).validate().is_ok());
        assert!(RecordInput::new("x".repeat(MAX_NAME_LEN + 1))
            .validate()
            .is_err());
        // Length is counted in characters, not bytes
        assert!(RecordInput::new("é".repeat(MAX_NAME_LEN)).validate().is_ok());
    }

    #[test]
    fn test_list_params_defaults_and_bounds() {
        let params = RecordListParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), DEFAULT_PAGE_SIZE);
        assert!(params.validate().is_ok());

        let params = RecordListParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = RecordListParams {
            page_size: Some(MAX_PAGE_SIZE + 1),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let params = RecordListParams {
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(params.search_term(), None);
    }

    #[test]
    fn test_record_serialization_skips_empty_optionals() {
        let record = Record {
            id: 1,
            name: "a".to_string(),
            value: None,
            metadata: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("value").is_none());
        assert!(json.get("metadata").is_none());
        assert!(json["updated_at"].is_null());
    }
}
