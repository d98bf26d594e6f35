//! End-to-end tests for the `resolve` command.

mod common;
use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_default_descriptor() {
    let fixture = TestFixture::new().with_descriptor(descriptors::CHAIN);

    fixture
        .command()
        .arg("resolve")
        .arg("--color")
        .arg("never")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration classes (3):"))
        .stdout(predicate::str::contains(
            "com.acme.Leaf [full] (imported by com.acme.Child)",
        ))
        .stdout(predicate::str::contains("leafService -> com.acme.Leaf.leafService()"))
        .stdout(predicate::str::contains("[OK] No problems found"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_json_output() {
    let fixture = TestFixture::new().with_descriptor(descriptors::CHAIN);

    let output = fixture
        .command()
        .args(["resolve", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = json["configuration_classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|class| class["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["com.acme.Leaf", "com.acme.Child", "com.acme.App"]);
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_cycle_fails_unless_lenient() {
    let fixture = TestFixture::new().with_descriptor(descriptors::CYCLE);

    fixture
        .command()
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular import"));

    fixture
        .command()
        .args(["resolve", "--lenient", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Problems (1):"))
        .stdout(predicate::str::contains("[A->B]"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_descriptor_from_env() {
    let fixture = TestFixture::new().with_file("conf/app.yaml", descriptors::CHAIN);

    fixture
        .command()
        .env("CONFGRAPH_DESCRIPTOR", "conf/app.yaml")
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("com.acme.App"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_missing_descriptor() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load descriptor"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_resolve_property_file_next_to_descriptor() {
    let fixture = TestFixture::new()
        .with_file("app.properties", "greeting=hello\n")
        .with_descriptor(
            r#"
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          name: appProps
          value: "classpath:app.properties"
"#,
        );

    fixture
        .command()
        .args(["resolve", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. appProps"));
}
