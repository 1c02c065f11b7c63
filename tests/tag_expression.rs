// tests/tag_expression.rs

use proptest::prelude::*;

use std::path::Path;

use testdispatch::discovery::discover_units;
use testdispatch::dispatch::TestUnit;
use testdispatch::errors::DispatchError;
use testdispatch::fs::mock::MockFileSystem;
use testdispatch::tags::{
    categorize, check_unit, contains_tag, extract_tags, filter_units, is_eligible,
    scenario_count, Eligibility, TagExpression,
};
use testdispatch_test_utils::init_tracing;

const SMOKE_FEATURE: &str = "\
@smoke
Feature: Login

  Scenario: valid password
    Given a user
";

#[test]
fn extract_tags_keeps_duplicates_in_order() {
    let tags = extract_tags("@b and (@a or @b) and not @c");
    assert_eq!(tags, vec!["@b", "@a", "@b", "@c"]);
}

#[test]
fn categorize_without_not_clause_includes_everything() {
    let expr = categorize("@smoke or @regression");
    assert_eq!(expr.included_tags, vec!["@smoke", "@regression"]);
    assert!(expr.excluded_tags.is_empty());
}

#[test]
fn categorize_splits_on_first_not_clause() {
    let expr = categorize("@smoke and not (@flaky and @slow)");
    assert_eq!(expr.included_tags, vec!["@smoke"]);
    assert_eq!(expr.excluded_tags, vec!["@flaky", "@slow"]);
}

#[test]
fn categorize_ignores_later_not_clauses() {
    let expr = categorize("@smoke and not @flaky and not @wip");
    assert_eq!(expr.excluded_tags, vec!["@flaky"]);
    assert_eq!(expr.included_tags, vec!["@smoke", "@wip"]);
}

#[test]
fn contains_tag_is_whole_word() {
    assert!(contains_tag("@smoke\nFeature: x", "@smoke"));
    assert!(contains_tag("tags: @a @smoke", "@smoke"));
    assert!(!contains_tag("@smoke_test Feature", "@smoke"));
    assert!(!contains_tag("email@smoke", "@smoke"));
}

#[test]
fn no_filter_means_every_file_is_eligible() {
    assert_eq!(is_eligible("", None), Eligibility::UNFILTERED);
    assert!(is_eligible("anything at all", None).is_eligible());
}

#[test]
fn single_included_tag_with_one_scenario_is_eligible() {
    let verdict = is_eligible(SMOKE_FEATURE, Some("@smoke"));
    assert!(verdict.included);
    assert!(verdict.not_fully_excluded);
    assert!(verdict.is_eligible());
}

#[test]
fn absent_excluded_tag_keeps_file() {
    let verdict = is_eligible(SMOKE_FEATURE, Some("@smoke and not @flaky"));
    assert!(verdict.not_fully_excluded);
    assert!(verdict.is_eligible());
}

#[test]
fn partially_tagged_exclude_clause_drops_file() {
    let text = "\
@smoke
Feature: Cart
  @flaky
  Scenario: add item
  Scenario: remove item
";
    let verdict = is_eligible(text, Some("@smoke and not @flaky"));
    assert!(verdict.included);
    assert!(!verdict.not_fully_excluded);
    assert!(!verdict.is_eligible());
}

#[test]
fn fully_tagged_exclude_clause_is_treated_as_included() {
    let text = "\
@smoke
Feature: Cart
  @flaky
  Scenario: add item
  @flaky
  Scenario Outline: remove <item>
";
    assert_eq!(scenario_count(text), 2);
    let verdict = is_eligible(text, Some("@smoke and not @flaky"));
    assert!(verdict.not_fully_excluded);
    assert!(verdict.is_eligible());
}

#[test]
fn excluded_tag_in_file_without_scenarios_is_ignored() {
    let verdict = is_eligible("@smoke @flaky\nFeature: empty", Some("@smoke and not @flaky"));
    assert!(verdict.is_eligible());
}

#[test]
fn missing_included_tag_is_not_eligible() {
    let verdict = is_eligible(SMOKE_FEATURE, Some("@regression"));
    assert!(!verdict.included);
    assert!(!verdict.is_eligible());
}

#[test]
fn exclusion_only_filter_matches_nothing() {
    let expr = TagExpression::parse("not @flaky");
    assert!(expr.included_tags.is_empty());
    assert!(!expr.evaluate(SMOKE_FEATURE).is_eligible());
}

#[test]
fn filter_units_skips_unreadable_and_ineligible_files() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("suite/login.feature", SMOKE_FEATURE);
    fs.add_file("suite/cart.feature", "@regression\nFeature: Cart\n  Scenario: x\n");

    let units = vec![
        TestUnit::new("suite/login.feature"),
        TestUnit::new("suite/cart.feature"),
        TestUnit::new("suite/deleted.feature"),
    ];

    let eligible = filter_units(&fs, units, Some("@smoke"));
    assert_eq!(eligible, vec![TestUnit::new("suite/login.feature")]);
}

#[test]
fn unit_deleted_after_discovery_is_a_file_read_error() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("suite/login.feature", SMOKE_FEATURE);
    fs.add_file("suite/logout.feature", SMOKE_FEATURE);

    let units = discover_units(&fs, Path::new("suite"), "*.feature").unwrap();
    assert_eq!(units.len(), 2);
    fs.remove_file("suite/logout.feature");

    let expr = TagExpression::parse("@smoke");
    let err = check_unit(&fs, &TestUnit::new("suite/logout.feature"), &expr).unwrap_err();
    assert!(matches!(err, DispatchError::FileReadError { .. }));

    let eligible = filter_units(&fs, units, Some("@smoke"));
    assert_eq!(eligible, vec![TestUnit::new("suite/login.feature")]);
}

#[test]
fn filter_units_without_filter_reads_nothing() {
    let fs = MockFileSystem::new();
    let units = vec![TestUnit::new("missing/a.feature"), TestUnit::new("missing/b.feature")];
    let eligible = filter_units(&fs, units.clone(), None);
    assert_eq!(eligible, units);
}

fn filter_strategy() -> impl Strategy<Value = String> {
    let tag = "@[a-z]{1,6}";
    (
        proptest::collection::vec(tag, 1..4),
        proptest::option::of(proptest::collection::vec(tag, 1..3)),
    )
        .prop_map(|(included, excluded)| {
            let mut expr = included.join(" or ");
            if let Some(excluded) = excluded {
                expr.push_str(&format!(" and not ({})", excluded.join(" and ")));
            }
            expr
        })
}

proptest! {
    #[test]
    fn categorize_is_idempotent(expr in filter_strategy()) {
        prop_assert_eq!(categorize(&expr), categorize(&expr));
    }

    #[test]
    fn without_not_clause_everything_is_included(tags in proptest::collection::vec("@[a-z]{1,6}", 1..6)) {
        let expr = categorize(&tags.join(" or "));
        prop_assert!(expr.excluded_tags.is_empty());
        let mut expected: Vec<String> = Vec::new();
        for tag in extract_tags(&tags.join(" ")) {
            if !expected.contains(&tag) {
                expected.push(tag);
            }
        }
        prop_assert_eq!(expr.included_tags, expected);
    }

    #[test]
    fn unfiltered_units_are_always_included(text in ".*") {
        prop_assert!(is_eligible(&text, None).included);
    }
}
