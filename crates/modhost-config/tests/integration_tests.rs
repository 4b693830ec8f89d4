//! Integration tests for reading configuration files from disk.

use std::fs;

use modhost_config::{ConfigError, Configuration};
use modhost_test_helpers::{must, must_some};
use tempfile::tempdir;

#[test]
fn test_from_file_reads_metadata() {
    let dir = must(tempdir());
    let path = dir.path().join("Chihuahua.conf");
    must(fs::write(
        &path,
        "# The smallest dog in the world\ndepends=Dog\nreplaces=Pug\n\n[data]\nname=Rodriguez\n",
    ));

    let conf = must(Configuration::from_file(&path));
    assert_eq!(conf.values("depends"), vec!["Dog"]);
    assert_eq!(conf.values("replaces"), vec!["Pug"]);
    let data = must_some(conf.group("data"), "data group should exist");
    assert_eq!(data.value("name"), Some("Rodriguez"));
    assert_eq!(conf.path(), Some(path.as_path()));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = must(tempdir());
    let result = Configuration::from_file(dir.path().join("Nope.conf"));
    match result {
        Err(ConfigError::Io { path, .. }) => assert!(path.ends_with("Nope.conf")),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_syntax_error_reports_line() {
    let dir = must(tempdir());
    let path = dir.path().join("Snail.conf");
    must(fs::write(&path, "depends=Dog\n[broken\n"));

    let err = match Configuration::from_file(&path) {
        Ok(conf) => panic!("expected parse failure, got {conf:?}"),
        Err(e) => e,
    };
    assert_eq!(err.line(), Some(2));
    assert!(err.to_string().contains("closing bracket"));
}
