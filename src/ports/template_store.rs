//! Broker template library port.

use crate::domain::error::TradeportError;
use crate::domain::template::BrokerTemplate;
use crate::domain::trade::FieldMapping;

/// Read/write access to the shared template library.
///
/// Injected into the workflow so the matcher and learner can be tested
/// against an in-memory fake.
pub trait TemplateStore {
    fn list_templates(&self) -> Result<Vec<BrokerTemplate>, TradeportError>;

    /// Create or update (keyed by broker name) a learned template.
    fn save_template(
        &self,
        broker_name: &str,
        column_mappings: &FieldMapping,
        sample_headers: &[String],
    ) -> Result<(), TradeportError>;

    /// Bump usage count and recency for a matched or reused template.
    fn increment_usage(&self, template_id: i64) -> Result<(), TradeportError>;
}
