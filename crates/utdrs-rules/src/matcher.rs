//! Known-threat matching over normalized rows

use std::collections::HashSet;
use tracing::{debug, info};
use utdrs_core::error::DetectionError;
use utdrs_core::model::{CanonicalProjection, DataType, Record, RecordSet, Value};

use crate::dsl::{PredicateRule, RuleSet};
use crate::traits::{RuleError, ThreatRule};

/// Registered known-threat rules
pub struct RuleRegistry {
    rules: Vec<Box<dyn ThreatRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build a registry holding one [`PredicateRule`] per definition
    pub fn from_rule_set(rule_set: &RuleSet) -> Self {
        let mut registry = Self::new();
        for (data_type, definitions) in &rule_set.rules {
            for definition in definitions {
                registry.register(Box::new(PredicateRule::new(*data_type, definition.clone())));
            }
        }
        registry
    }

    /// Register a rule
    pub fn register(&mut self, rule: Box<dyn ThreatRule>) {
        self.rules.push(rule);
    }

    /// Rules that apply to `data_type`, in registration order
    pub fn rules_for(&self, data_type: DataType) -> Vec<&dyn ThreatRule> {
        self.rules
            .iter()
            .filter(|rule| rule.data_type() == data_type)
            .map(|rule| rule.as_ref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rows of `projection` matching any rule for its data type
    ///
    /// Rows equal in every value are reported once, at their first position.
    pub fn match_rows(&self, projection: &CanonicalProjection) -> Result<RecordSet, RuleError> {
        let rules = self.rules_for(projection.data_type());
        let schema = projection.schema();

        if rules.is_empty() {
            debug!("No known-threat rules for {} data", projection.data_type());
            return Ok(RecordSet::empty(schema.clone()));
        }

        let mut seen: HashSet<&[Value]> = HashSet::new();
        let mut matched: Vec<Record> = Vec::new();

        for record in projection.records() {
            let mut hit = false;
            for rule in &rules {
                if rule.matches(schema, record)? {
                    debug!("Row {} matched rule '{}'", record.index, rule.name());
                    hit = true;
                    break;
                }
            }

            if hit && seen.insert(record.values.as_slice()) {
                matched.push(record.clone());
            }
        }

        info!(
            "{} known threat(s) in {} {} rows",
            matched.len(),
            projection.len(),
            projection.data_type()
        );
        Ok(RecordSet::new(schema.clone(), matched))
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::from_rule_set(&RuleSet::builtin())
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Select deduplicated rows matching a known-threat rule
///
/// Rule failures surface as internal processing errors.
pub fn match_known_threats(
    projection: &CanonicalProjection,
    registry: &RuleRegistry,
) -> Result<RecordSet, DetectionError> {
    registry
        .match_rows(projection)
        .map_err(|e| DetectionError::InternalProcessing(e.to_string()))
}
