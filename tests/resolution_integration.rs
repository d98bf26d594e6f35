//! Library-level resolution tests driven by YAML descriptors.

use std::path::Path;

use confgraph::bootstrap::{self, Resolution};
use confgraph::config::{self, DescriptorFormat};
use confgraph::error::Error;
use confgraph::registry::DefinitionOrigin;
use confgraph::resolution::ProblemKind;

fn resolve(yaml: &str) -> confgraph::error::Result<Resolution> {
    let descriptor = config::parse(yaml, DescriptorFormat::Yaml)?;
    bootstrap::resolve(&descriptor, Path::new("."))
}

fn definition_names(resolution: &Resolution) -> Vec<&str> {
    resolution
        .definitions
        .iter()
        .map(|(name, _)| name.as_str())
        .collect()
}

#[test]
fn test_shared_import_keeps_one_node_with_every_importer() {
    let resolution = resolve(
        r#"
roots: [A, C]
classes:
  - name: A
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [B]
  - name: C
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [B]
  - name: B
    annotations:
      - type: Configuration
"#,
    )
    .unwrap();

    let model = &resolution.model;
    assert_eq!(model.class_names(), vec!["B", "A", "C"]);
    assert_eq!(model.get("B").unwrap().imported_by, vec!["A", "C"]);
    assert_eq!(definition_names(&resolution), vec!["a", "c", "B"]);
}

#[test]
fn test_cycle_chain_is_reported() {
    let yaml = r#"
settings:
  problem_policy: lenient
roots: [A]
classes:
  - name: A
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [B]
  - name: B
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [A]
"#;
    let resolution = resolve(yaml).unwrap();
    let problems = &resolution.model.problems;
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].kind, ProblemKind::CircularImport);
    assert_eq!(problems[0].chain_display(), "[A->B]");

    let strict = yaml.replace("problem_policy: lenient", "problem_policy: fail_fast");
    assert!(matches!(resolve(&strict), Err(Error::CircularImport { .. })));
}

#[test]
fn test_group_order_wins_over_declaration_order() {
    let resolution = resolve(
        r#"
roots: [X, Y]
plugins:
  - kind: group
    class: ReversingGroup
    strategy: reverse
  - kind: deferred_selector
    class: SelectorX
    imports: [ImportedX]
    group: ReversingGroup
  - kind: deferred_selector
    class: SelectorY
    imports: [ImportedY]
    group: ReversingGroup
classes:
  - name: X
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [SelectorX]
  - name: Y
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [SelectorY]
  - name: ImportedX
    annotations:
      - type: Configuration
  - name: ImportedY
    annotations:
      - type: Configuration
"#,
    )
    .unwrap();

    assert_eq!(
        resolution.model.class_names(),
        vec!["X", "Y", "ImportedY", "ImportedX"]
    );
    assert_eq!(resolution.model.get("ImportedX").unwrap().imported_by, vec!["X"]);
}

#[test]
fn test_same_named_property_sources_merge_newest_first() {
    let resolution = resolve(
        r#"
resources_inline:
  "first.properties": "key=one\nonly.first=yes"
  "second.properties": "key=two"
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          name: app
          value: "classpath:first.properties"
      - type: Import
        attributes:
          value: [Other]
  - name: Other
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          name: app
          value: "classpath:second.properties"
"#,
    )
    .unwrap();

    let sources = &resolution.model.property_sources;
    assert_eq!(sources.names(), vec!["app"]);
    assert_eq!(sources.property("key"), Some("two"));
    assert_eq!(sources.property("only.first"), Some("yes"));
}

#[test]
fn test_distinct_property_sources_follow_environment_base() {
    let resolution = resolve(
        r#"
environment:
  properties:
    base: value
resources_inline:
  "p1.properties": "shared=p1"
  "p2.properties": "shared=p2"
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          name: p1
          value: "classpath:p1.properties"
      - type: Import
        attributes:
          value: [Other]
  - name: Other
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          name: p2
          value: "classpath:p2.properties"
"#,
    )
    .unwrap();

    assert_eq!(
        resolution.model.property_sources.names(),
        vec![bootstrap::DESCRIPTOR_PROPERTIES, "p2", "p1"]
    );
}

#[test]
fn test_register_phase_condition_does_not_skip_parsing() {
    let resolution = resolve(
        r#"
plugins:
  - kind: condition
    class: RegisterOnly
    matches: false
    phase: register_bean
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [Guarded]
  - name: Guarded
    annotations:
      - type: Configuration
      - type: Conditional
        attributes:
          value: [RegisterOnly]
    methods:
      - name: guardedBean
        annotations:
          - type: Bean
"#,
    )
    .unwrap();

    assert_eq!(resolution.model.class_names(), vec!["Guarded", "App"]);
    assert_eq!(definition_names(&resolution), vec!["app"]);
}

#[test]
fn test_registrar_output_is_resolved_in_next_pass() {
    let resolution = resolve(
        r#"
plugins:
  - kind: registrar
    class: LateRegistrar
    definitions:
      - name: late
        class: LateConfig
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [LateRegistrar]
  - name: LateConfig
    annotations:
      - type: Configuration
    methods:
      - name: lateBean
        annotations:
          - type: Bean
"#,
    )
    .unwrap();

    assert_eq!(resolution.model.class_names(), vec!["App", "LateConfig"]);
    let names = definition_names(&resolution);
    assert!(names.contains(&"late"));
    assert!(names.contains(&"lateBean"));
    let (_, late_bean) = resolution
        .definitions
        .iter()
        .find(|(name, _)| name == "lateBean")
        .unwrap();
    assert_eq!(late_bean.factory_bean_name.as_deref(), Some("late"));
    assert_eq!(late_bean.origin, DefinitionOrigin::BeanMethod);
}

#[test]
fn test_profiles_and_property_conditions() {
    let resolution = resolve(
        r#"
environment:
  active_profiles: [dev]
  properties:
    feature:
      enabled: true
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [ProdOnly, NotProd, Feature, Disabled]
  - name: ProdOnly
    annotations:
      - type: Configuration
      - type: Profile
        attributes:
          value: prod
  - name: NotProd
    annotations:
      - type: Configuration
      - type: Profile
        attributes:
          value: "!prod"
  - name: Feature
    annotations:
      - type: Configuration
      - type: ConditionalOnProperty
        attributes:
          name: feature.enabled
          having_value: "true"
  - name: Disabled
    annotations:
      - type: Configuration
      - type: ConditionalOnProperty
        attributes:
          name: feature.missing
"#,
    )
    .unwrap();

    assert_eq!(
        resolution.model.class_names(),
        vec!["NotProd", "Feature", "App"]
    );
}

#[test]
fn test_placeholder_in_property_source_location() {
    let resolution = resolve(
        r#"
environment:
  properties:
    stage: prod
resources_inline:
  "prod.properties": "datasource.url=jdbc:prod"
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          value: "classpath:${stage}.properties"
"#,
    )
    .unwrap();

    assert_eq!(
        resolution.model.property_sources.property("datasource.url"),
        Some("jdbc:prod")
    );
}

#[test]
fn test_component_scan_registers_scanned_configuration() {
    let resolution = resolve(
        r#"
roots: [com.acme.App]
classes:
  - name: com.acme.App
    annotations:
      - type: Configuration
      - type: ComponentScan
        attributes:
          base_packages: [com.acme.web]
  - name: com.acme.web.WebConfig
    annotations:
      - type: Configuration
  - name: com.acme.data.DataConfig
    annotations:
      - type: Configuration
"#,
    )
    .unwrap();

    let names = resolution.model.class_names();
    assert!(names.contains(&"com.acme.web.WebConfig".to_string()));
    assert!(!names.contains(&"com.acme.data.DataConfig".to_string()));
    let (_, scanned) = resolution
        .definitions
        .iter()
        .find(|(name, _)| name == "webConfig")
        .unwrap();
    assert_eq!(scanned.origin, DefinitionOrigin::Scanned);
}

#[test]
fn test_json_descriptor_resolves_like_yaml() {
    let json = r#"{
  "roots": ["App"],
  "classes": [
    {"name": "App", "annotations": [
      {"type": "Configuration"},
      {"type": "Import", "attributes": {"value": ["Child"]}}
    ]},
    {"name": "Child", "annotations": [{"type": "Configuration"}]}
  ]
}"#;
    let descriptor = config::parse(json, DescriptorFormat::Json).unwrap();
    let resolution = bootstrap::resolve(&descriptor, Path::new(".")).unwrap();
    assert_eq!(resolution.model.class_names(), vec!["Child", "App"]);
}

#[test]
fn test_missing_property_file_is_fatal_unless_ignored() {
    let yaml = r#"
roots: [App]
classes:
  - name: App
    annotations:
      - type: Configuration
      - type: PropertySource
        attributes:
          value: "classpath:absent.properties"
"#;
    assert!(resolve(yaml).is_err());

    let ignored = yaml.replace(
        "value: \"classpath:absent.properties\"",
        "value: \"classpath:absent.properties\"\n          ignore_resource_not_found: true",
    );
    let resolution = resolve(&ignored).unwrap();
    assert!(resolution.model.property_sources.is_empty());
}
