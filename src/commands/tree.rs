//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays how the
//! resolved configuration classes were reached: each root class with the
//! classes it imported beneath it.
//!
//! ## Functionality
//!
//! - **Import Provenance**: A class imported by several parents appears
//!   under each of them.
//! - **Depth Control**: Supports `--depth` flag to limit tree depth
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::collections::HashSet;
use std::path::PathBuf;

use confgraph::defaults::DEFAULT_DESCRIPTOR;
use confgraph::output::{ColorChoice, Marker, ReportStyle};
use confgraph::resolution::{ConfigurationClass, ResolvedModel};

/// Display the import provenance tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the descriptor file (YAML, JSON or TOML).
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CONFGRAPH_DESCRIPTOR",
        default_value = DEFAULT_DESCRIPTOR
    )]
    pub descriptor: PathBuf,

    /// Maximum depth to display in the tree.
    ///
    /// If not specified, displays the full tree.
    /// Use 0 to show only the root classes, 1 to show their direct imports, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,

    /// Collect problems instead of stopping at the first one.
    #[arg(long)]
    pub lenient: bool,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, color: ColorChoice) -> Result<()> {
    let style = ReportStyle::for_choice(color);
    let resolution = super::load_and_resolve(&args.descriptor, args.lenient)?;
    println!(
        "{}",
        style.line(
            Marker::Tree,
            format_args!("Import tree for: {}", args.descriptor.display())
        )
    );

    let tree_root = build_tree(&resolution.model, args.depth.unwrap_or(usize::MAX));
    print_tree(&tree_root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

    Ok(())
}

/// Builds the provenance forest under a synthetic root node.
fn build_tree(model: &ResolvedModel, max_depth: usize) -> TreeNode {
    let children = model
        .configuration_classes
        .iter()
        .filter(|class| class.bean_name.is_some() || !class.is_imported())
        .map(|class| {
            let mut path = HashSet::new();
            build_tree_node(model, class, max_depth, 0, &mut path)
        })
        .collect();
    TreeNode {
        label: "configuration".to_string(),
        children,
    }
}

fn build_tree_node<'a>(
    model: &'a ResolvedModel,
    class: &'a ConfigurationClass,
    max_depth: usize,
    current_depth: usize,
    path: &mut HashSet<&'a str>,
) -> TreeNode {
    let label = match &class.bean_name {
        Some(bean) => format!("{} ({})", class.name(), bean),
        None => class.name().to_string(),
    };
    if current_depth >= max_depth || !path.insert(class.name()) {
        return TreeNode {
            label,
            children: vec![],
        };
    }

    let children = model
        .configuration_classes
        .iter()
        .filter(|child| child.imported_by.iter().any(|parent| parent == class.name()))
        .map(|child| build_tree_node(model, child, max_depth, current_depth + 1, path))
        .collect();
    path.remove(class.name());
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
