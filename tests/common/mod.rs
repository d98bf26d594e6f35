//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_descriptor(descriptors::CHAIN);
//! fixture.command().arg("resolve").assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::descriptors;
    pub use super::TestFixture;
}

/// Descriptor snippets shared by several tests.
#[allow(dead_code)]
pub mod descriptors {
    /// A root importing a child that imports a leaf with one bean method.
    pub const CHAIN: &str = r#"
roots: [com.acme.App]
classes:
  - name: com.acme.App
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [com.acme.Child]
  - name: com.acme.Child
    annotations:
      - type: Configuration
      - type: Import
        attributes:
          value: [com.acme.Leaf]
  - name: com.acme.Leaf
    annotations:
      - type: Configuration
    methods:
      - name: leafService
        annotations:
          - type: Bean
"#;

    /// Two classes importing each other.
    pub const CYCLE: &str = r#"
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

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "roots: [unclosed\n";
}

/// A temporary directory holding a `confgraph.yaml` and any resources.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `confgraph.yaml` descriptor with the given content.
    pub fn with_descriptor(self, content: &str) -> Self {
        self.with_file("confgraph.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the descriptor file.
    pub fn descriptor_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("confgraph.yaml")
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("confgraph");
        cmd.current_dir(self.path()).env_remove("CONFGRAPH_DESCRIPTOR");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
