//! Rule traits and interfaces

use utdrs_core::model::{DataType, Record, Schema};

/// Rule evaluation errors
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Rule '{rule}' references column '{field}' which is not part of the {data_type} schema")]
    UnknownField {
        rule: String,
        field: String,
        data_type: DataType,
    },

    #[error("Invalid rule configuration: {message}")]
    ConfigurationError { message: String },
}

/// A static known-threat predicate bound to one data type
pub trait ThreatRule: Send + Sync {
    /// Get the rule name
    fn name(&self) -> &str;

    /// Get the rule description
    fn description(&self) -> &str;

    /// Data type whose rows this rule inspects
    fn data_type(&self) -> DataType;

    /// Check a single normalized row
    ///
    /// A null or missing cell never matches. Referencing a column the schema
    /// does not define is an error.
    fn matches(&self, schema: &Schema, record: &Record) -> Result<bool, RuleError>;
}
