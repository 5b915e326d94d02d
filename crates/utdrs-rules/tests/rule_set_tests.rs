use proptest::prelude::*;
use utdrs_core::model::{ColumnKind, ColumnSpec, DataType, Record, Schema, Value};
use utdrs_rules::{Predicate, PredicateRule, RuleDefinition, RuleSet, ThreatRule};

fn data_type_strategy() -> impl Strategy<Value = DataType> {
    prop::sample::select(DataType::ALL.to_vec())
}

fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        ("[a-z_]{1,12}", prop::collection::vec("[a-z0-9_.]{1,16}", 1..4))
            .prop_map(|(field, patterns)| Predicate::contains(field, patterns)),
        ("[a-z_]{1,12}", "[a-z0-9]{1,10}").prop_map(|(field, value)| Predicate::equals(field, value)),
        Just(Predicate::None),
    ]
}

proptest! {
    #[test]
    fn prop_rule_set_survives_json(
        entries in prop::collection::vec((data_type_strategy(), "[a-z_]{1,10}", predicate_strategy()), 0..8)
    ) {
        let mut rules = RuleSet::empty();
        for (data_type, name, predicate) in entries {
            rules
                .rules
                .entry(data_type)
                .or_default()
                .push(RuleDefinition::new(name, "generated", predicate));
        }

        let json = rules.to_json_pretty().unwrap();
        let parsed = RuleSet::from_json(&json).unwrap();
        prop_assert_eq!(parsed, rules);
    }

    #[test]
    fn prop_contains_matches_any_cell_embedding_a_pattern(
        prefix in "[a-z]{0,8}",
        pattern in "[a-z]{1,8}",
        suffix in "[a-z]{0,8}",
    ) {
        let schema = Schema::new(vec![ColumnSpec::new("hash", ColumnKind::Text)]);
        let rule = PredicateRule::new(
            DataType::ThreatIntelligence,
            RuleDefinition::new("embedded", "", Predicate::contains("hash", [pattern.clone()])),
        );
        let record = Record::new(0, vec![Value::Text(format!("{}{}{}", prefix, pattern, suffix))]);
        prop_assert!(rule.matches(&schema, &record).unwrap());
    }
}

#[test]
fn test_failed_login_rule_is_exact() {
    let schema = Schema::new(vec![ColumnSpec::new("login_status", ColumnKind::Categorical)]);
    let rules = RuleSet::builtin();
    let definition = rules.for_type(DataType::Authentication)[0].clone();
    let rule = PredicateRule::new(DataType::Authentication, definition);

    let failed = Record::new(0, vec![Value::Text("failed".to_string())]);
    let success = Record::new(1, vec![Value::Text("success".to_string())]);
    let missing = Record::new(2, vec![Value::Null]);

    assert!(rule.matches(&schema, &failed).unwrap());
    assert!(!rule.matches(&schema, &success).unwrap());
    assert!(!rule.matches(&schema, &missing).unwrap());
}

#[test]
fn test_numeric_cells_compare_by_text() {
    let schema = Schema::new(vec![ColumnSpec::new("ttl", ColumnKind::Numeric)]);
    let rule = PredicateRule::new(
        DataType::Network,
        RuleDefinition::new("ttl_one", "", Predicate::equals("ttl", "1")),
    );
    assert!(rule.matches(&schema, &Record::new(0, vec![Value::Number(1.0)])).unwrap());
    assert!(!rule.matches(&schema, &Record::new(0, vec![Value::Number(64.0)])).unwrap());
}
