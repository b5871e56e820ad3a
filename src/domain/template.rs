//! Broker templates: learned header-to-field mappings keyed by broker.

use chrono::NaiveDateTime;

use super::trade::FieldMapping;

/// A saved column mapping for one broker's export format, reused across
/// uploads. Owned by the template store; `usage_count` and `last_used_at`
/// are bumped whenever the template is matched or reused.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerTemplate {
    pub id: i64,
    pub broker_name: String,
    pub column_mappings: FieldMapping,
    pub sample_headers: Vec<String>,
    pub usage_count: i64,
    pub last_used_at: Option<NaiveDateTime>,
}

impl BrokerTemplate {
    pub fn new(
        id: i64,
        broker_name: impl Into<String>,
        column_mappings: FieldMapping,
        sample_headers: Vec<String>,
    ) -> Self {
        Self {
            id,
            broker_name: broker_name.into(),
            column_mappings,
            sample_headers,
            usage_count: 0,
            last_used_at: None,
        }
    }
}
