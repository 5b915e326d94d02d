//! # Declarative Rule Sets
//!
//! データ種別ごとの既知脅威ルールを JSON/TOML で宣言的に記述する
//! Built-in signatures are only defaults and can be replaced wholesale.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use utdrs_core::model::{DataType, Record, Schema, Value};

use crate::traits::{RuleError, ThreatRule};

/// Predicate evaluated against one column of a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum Predicate {
    /// Case-sensitive substring match against any of the patterns
    Contains { field: String, patterns: Vec<String> },

    /// Exact string equality
    Equals { field: String, value: String },

    /// Never matches
    None,
}

impl Predicate {
    pub fn contains<I, S>(field: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::Contains {
            field: field.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Column the predicate reads, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::Contains { field, .. } | Predicate::Equals { field, .. } => Some(field),
            Predicate::None => None,
        }
    }

    /// Evaluate against a single cell; null never matches
    pub fn evaluate(&self, value: &Value) -> bool {
        let text: Cow<'_, str> = match value {
            Value::Null => return false,
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        };

        match self {
            Predicate::Contains { patterns, .. } => {
                patterns.iter().any(|pattern| text.contains(pattern.as_str()))
            }
            Predicate::Equals { value, .. } => text.as_ref() == value.as_str(),
            Predicate::None => false,
        }
    }
}

/// Named rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub predicate: Predicate,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            predicate,
        }
    }
}

/// Known-threat rules keyed by data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: BTreeMap<DataType, Vec<RuleDefinition>>,
}

impl RuleSet {
    /// A rule set without any rules
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Built-in illustrative signatures
    pub fn builtin() -> Self {
        let mut rules = BTreeMap::new();

        rules.insert(
            DataType::Email,
            vec![RuleDefinition::new(
                "phishing_link",
                "Email links pointing at known malicious or phishing hosts",
                Predicate::contains("links_in_email", ["maliciouslink", "phishinglink"]),
            )],
        );

        rules.insert(
            DataType::ThreatIntelligence,
            vec![RuleDefinition::new(
                "known_malware_hash",
                "Indicator hash matches a known malware pattern",
                Predicate::contains("hash", ["malware_hash_pattern"]),
            )],
        );

        rules.insert(
            DataType::Authentication,
            vec![RuleDefinition::new(
                "failed_login",
                "Failed authentication attempt",
                Predicate::equals("login_status", "failed"),
            )],
        );

        Self { rules }
    }

    /// Parse a JSON document of the form `{"rules": {"email": [...]}}`
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        serde_json::from_str(json).map_err(|e| RuleError::ConfigurationError {
            message: e.to_string(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, RuleError> {
        serde_json::to_string_pretty(self).map_err(|e| RuleError::ConfigurationError {
            message: e.to_string(),
        })
    }

    /// Rules for one data type; empty for types without rules
    pub fn for_type(&self, data_type: DataType) -> &[RuleDefinition] {
        self.rules.get(&data_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the rules of every data type present in `other`
    pub fn overlay(mut self, other: RuleSet) -> Self {
        for (data_type, definitions) in other.rules {
            self.rules.insert(data_type, definitions);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject empty names and empty pattern lists
    pub fn validate(&self) -> Result<(), RuleError> {
        for (data_type, definitions) in &self.rules {
            for definition in definitions {
                if definition.name.trim().is_empty() {
                    return Err(RuleError::ConfigurationError {
                        message: format!("{} rule without a name", data_type),
                    });
                }
                if let Predicate::Contains { patterns, .. } = &definition.predicate {
                    if patterns.is_empty() || patterns.iter().any(String::is_empty) {
                        return Err(RuleError::ConfigurationError {
                            message: format!("rule '{}' has an empty pattern", definition.name),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// [`ThreatRule`] backed by a declarative [`Predicate`]
#[derive(Debug, Clone)]
pub struct PredicateRule {
    data_type: DataType,
    definition: RuleDefinition,
}

impl PredicateRule {
    pub fn new(data_type: DataType, definition: RuleDefinition) -> Self {
        Self {
            data_type,
            definition,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.definition.predicate
    }
}

impl ThreatRule for PredicateRule {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn matches(&self, schema: &Schema, record: &Record) -> Result<bool, RuleError> {
        let Some(field) = self.definition.predicate.field() else {
            return Ok(false);
        };

        let position = schema.position(field).ok_or_else(|| RuleError::UnknownField {
            rule: self.definition.name.clone(),
            field: field.to_string(),
            data_type: self.data_type,
        })?;

        Ok(record
            .get(position)
            .map(|value| self.definition.predicate.evaluate(value))
            .unwrap_or(false))
    }
}
