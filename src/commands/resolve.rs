//! # Resolve Command Implementation
//!
//! This module implements the `resolve` subcommand, which runs a descriptor
//! to a fixed point and reports the resulting configuration model.
//!
//! ## Functionality
//!
//! - **Configuration Classes**: Every resolved class in processing order,
//!   with its bean name or the classes that imported it.
//! - **Property Sources**: The effective property source order, highest
//!   precedence first.
//! - **Definitions**: The registry contents after loading.
//! - **Problems**: Anything collected when running leniently.
//!
//! Output is plain text by default or JSON with `--format json`.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use confgraph::bootstrap::Resolution;
use confgraph::defaults::DEFAULT_DESCRIPTOR;
use confgraph::output::{ColorChoice, Marker, ReportStyle};
use confgraph::registry::{BeanDefinition, ConfigurationKind};
use confgraph::resolution::Problem;

/// Resolve a descriptor and print the configuration model
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path to the descriptor file (YAML, JSON or TOML).
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CONFGRAPH_DESCRIPTOR",
        default_value = DEFAULT_DESCRIPTOR
    )]
    pub descriptor: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Collect problems instead of stopping at the first one.
    #[arg(long)]
    pub lenient: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ReportFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Machine-readable JSON document
    Json,
}

#[derive(Debug, Serialize)]
struct ClassReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ConfigurationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bean_name: Option<String>,
    imported_by: Vec<String>,
    bean_methods: Vec<String>,
    imported_resources: Vec<String>,
    registrars: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DefinitionReport<'a> {
    name: &'a str,
    #[serde(flatten)]
    definition: &'a BeanDefinition,
}

#[derive(Debug, Serialize)]
struct ResolutionReport<'a> {
    configuration_classes: Vec<ClassReport>,
    property_sources: Vec<String>,
    definitions: Vec<DefinitionReport<'a>>,
    problems: &'a [Problem],
}

impl<'a> ResolutionReport<'a> {
    fn new(resolution: &'a Resolution) -> Self {
        let configuration_classes = resolution
            .model
            .configuration_classes
            .iter()
            .map(|class| ClassReport {
                name: class.name().to_string(),
                kind: class.kind(),
                bean_name: class.bean_name.clone(),
                imported_by: class.imported_by.clone(),
                bean_methods: class.bean_methods.iter().map(|m| m.name.clone()).collect(),
                imported_resources: class
                    .imported_resources
                    .iter()
                    .map(|r| r.location.clone())
                    .collect(),
                registrars: class
                    .registrars
                    .iter()
                    .map(|r| r.class_name.clone())
                    .collect(),
            })
            .collect();
        let definitions = resolution
            .definitions
            .iter()
            .map(|(name, definition)| DefinitionReport { name, definition })
            .collect();
        Self {
            configuration_classes,
            property_sources: resolution.model.property_sources.names(),
            definitions,
            problems: &resolution.model.problems,
        }
    }
}

/// Execute the `resolve` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color` - The global `--color` choice, used for the text format
pub fn execute(args: ResolveArgs, color: ColorChoice) -> Result<()> {
    let resolution = super::load_and_resolve(&args.descriptor, args.lenient)?;
    match args.format {
        ReportFormat::Json => println!("{}", render_json(&resolution)?),
        ReportFormat::Text => {
            print!("{}", render_text(&resolution, ReportStyle::for_choice(color)));
        }
    }
    Ok(())
}

fn render_json(resolution: &Resolution) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ResolutionReport::new(resolution))?)
}

fn render_text(resolution: &Resolution, style: ReportStyle) -> String {
    let report = ResolutionReport::new(resolution);
    let mut text = String::new();

    let _ = writeln!(
        text,
        "{} Configuration classes ({}):",
        style.marker(Marker::Classes),
        report.configuration_classes.len()
    );
    for class in &report.configuration_classes {
        let provenance = match &class.bean_name {
            Some(bean) => format!("bean '{}'", bean),
            None if !class.imported_by.is_empty() => {
                format!("imported by {}", class.imported_by.join(", "))
            }
            None => "root".to_string(),
        };
        let kind = match class.kind {
            Some(ConfigurationKind::Full) => " [full]",
            Some(ConfigurationKind::Lite) => " [lite]",
            None => "",
        };
        let _ = writeln!(text, "  {}{} ({})", class.name, kind, provenance);
        if !class.bean_methods.is_empty() {
            let _ = writeln!(text, "    bean methods: {}", class.bean_methods.join(", "));
        }
        if !class.imported_resources.is_empty() {
            let _ = writeln!(text, "    resources: {}", class.imported_resources.join(", "));
        }
        if !class.registrars.is_empty() {
            let _ = writeln!(text, "    registrars: {}", class.registrars.join(", "));
        }
    }

    let _ = writeln!(
        text,
        "{} Property sources ({}):",
        style.marker(Marker::Sources),
        report.property_sources.len()
    );
    for (index, name) in report.property_sources.iter().enumerate() {
        let _ = writeln!(text, "  {}. {}", index + 1, name);
    }

    let _ = writeln!(
        text,
        "{} Definitions ({}):",
        style.marker(Marker::Definitions),
        report.definitions.len()
    );
    for entry in &report.definitions {
        let target = match (
            &entry.definition.factory_bean_name,
            &entry.definition.factory_method_name,
        ) {
            (Some(bean), Some(method)) => format!("{}.{}()", bean, method),
            (None, Some(method)) => format!(
                "{}.{}()",
                entry.definition.class_name.as_deref().unwrap_or("?"),
                method
            ),
            _ => entry.definition.class_name.clone().unwrap_or_default(),
        };
        let _ = writeln!(text, "  {} -> {}", entry.name, target);
    }

    if report.problems.is_empty() {
        let _ = writeln!(text, "{}", style.line(Marker::Ok, "No problems found"));
    } else {
        let _ = writeln!(
            text,
            "{} Problems ({}):",
            style.marker(Marker::Problems),
            report.problems.len()
        );
        for problem in report.problems {
            let _ = writeln!(text, "  {}", problem);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = r#"
roots: [com.acme.App]
classes:
  - name: com.acme.App
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [com.acme.Child]
    methods:
      - name: appService
        annotations:
          - type: Bean
  - name: com.acme.Child
    annotations:
      - type: Configuration
"#;

    fn resolve_yaml(yaml: &str, lenient: bool) -> Result<Resolution> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("confgraph.yaml");
        std::fs::write(&path, yaml).unwrap();
        super::super::load_and_resolve(&path, lenient)
    }

    #[test]
    fn test_text_report_lists_provenance() {
        let resolution = resolve_yaml(DESCRIPTOR, false).unwrap();
        let text = render_text(&resolution, ReportStyle::plain());

        assert!(text.contains("[CLASSES] Configuration classes (2):"));
        assert!(text.contains("com.acme.Child [full] (imported by com.acme.App)"));
        assert!(text.contains("com.acme.App [full] (bean 'app')"));
        assert!(text.contains("bean methods: appService"));
        assert!(text.contains("appService -> app.appService()"));
        assert!(text.contains("[OK] No problems found"));
    }

    #[test]
    fn test_json_report_shape() {
        let resolution = resolve_yaml(DESCRIPTOR, false).unwrap();
        let json: serde_json::Value = serde_json::from_str(&render_json(&resolution).unwrap()).unwrap();

        let classes = json["configuration_classes"].as_array().unwrap();
        assert_eq!(classes[0]["name"], "com.acme.Child");
        assert_eq!(classes[0]["imported_by"][0], "com.acme.App");
        assert_eq!(json["definitions"][2]["name"], "appService");
        assert_eq!(json["definitions"][2]["origin"], "bean_method");
        assert!(json["problems"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_lenient_run_reports_problems() {
        let yaml = r#"
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
        assert!(resolve_yaml(yaml, false).is_err());

        let resolution = resolve_yaml(yaml, true).unwrap();
        let text = render_text(&resolution, ReportStyle::plain());
        assert!(text.contains("[WARN] Problems (1):"));
        assert!(text.contains("[A->B]"));
    }

    #[test]
    fn test_execute_missing_descriptor() {
        let args = ResolveArgs {
            descriptor: Path::new("/nonexistent/confgraph.yaml").to_path_buf(),
            format: ReportFormat::Text,
            lenient: false,
        };
        let error = execute(args, ColorChoice::Never).unwrap_err();
        assert!(error.to_string().contains("Failed to load descriptor"));
    }
}
