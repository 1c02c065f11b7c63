// tests/discovery.rs

use std::path::Path;

use testdispatch::discovery::discover_units;
use testdispatch::dispatch::TestUnit;
use testdispatch::errors::DispatchError;
use testdispatch::fs::mock::MockFileSystem;

fn suite() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("e2e/login.feature", "Feature: login");
    fs.add_file("e2e/cart/add.feature", "Feature: add");
    fs.add_file("e2e/cart/notes.md", "# notes");
    fs.add_file("e2e/cart/steps.js", "// steps");
    fs
}

#[test]
fn walks_directories_and_sorts_matches() {
    let fs = suite();
    let units = discover_units(&fs, Path::new("e2e"), "**/*.feature").unwrap();
    assert_eq!(
        units,
        vec![
            TestUnit::new("e2e/cart/add.feature"),
            TestUnit::new("e2e/login.feature"),
        ]
    );
}

#[test]
fn single_file_spec_is_the_only_unit() {
    let fs = suite();
    let units = discover_units(&fs, Path::new("e2e/cart/steps.js"), "**/*.feature").unwrap();
    assert_eq!(units, vec![TestUnit::new("e2e/cart/steps.js")]);
}

#[test]
fn pattern_is_relative_to_spec_path() {
    let fs = suite();
    let units = discover_units(&fs, Path::new("e2e"), "cart/*").unwrap();
    let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["e2e/cart/add.feature", "e2e/cart/notes.md", "e2e/cart/steps.js"]
    );
}

#[test]
fn missing_spec_path_is_a_config_error() {
    let fs = suite();
    let err = discover_units(&fs, Path::new("nope"), "**/*.feature").unwrap_err();
    assert!(matches!(err, DispatchError::ConfigError(_)));
}

#[test]
fn test_unit_file_name() {
    assert_eq!(TestUnit::new("e2e/cart/add.feature").file_name(), "add.feature");
    assert_eq!(TestUnit::new("add.feature").file_name(), "add.feature");
}
