//! # Error Handling
//!
//! This module defines the centralized error type for `confgraph`. It uses
//! `thiserror` to derive a single `Error` enum covering every failure mode of
//! a resolution run, from unreadable class metadata to unresolvable
//! placeholders.
//!
//! ## Categories
//!
//! - **Structural errors** (`Metadata`, `ClassNotFound`, `Instantiation`):
//!   fatal; they abort the run once wrapped into `DefinitionStore` with the
//!   identity of the offending configuration source.
//! - **Cycle problems** (`CircularImport`): produced when a fail-fast
//!   diagnostics policy enforces a recorded problem.
//! - **Resource and placeholder errors** (`ResourceNotFound`, `UnknownHost`,
//!   `UnresolvablePlaceholder`): tolerated by property-source directives that
//!   set `ignore_resource_not_found`, fatal otherwise. See
//!   [`Error::is_recoverable_location_error`].
//! - **Descriptor errors** (`ConfigParse`): the descriptor file could not be
//!   understood.
//!
//! The `Result` alias is used throughout the crate.

use thiserror::Error;

/// Main error type for confgraph operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing a descriptor file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the descriptor
        hint: Option<String>,
    },

    /// Structural metadata for a class could not be read.
    #[error("Failed to read metadata for class [{class_name}]: {message}")]
    Metadata { class_name: String, message: String },

    /// A class referenced by name is unknown to every collaborator.
    #[error("Class not found: {class_name}")]
    ClassNotFound { class_name: String },

    /// A plugin class could not be constructed.
    #[error("Failed to instantiate [{class_name}]: {message}")]
    Instantiation { class_name: String, message: String },

    /// A fatal error while building the configuration model, identifying the
    /// configuration source that was being processed.
    #[error("{message}: {source}")]
    DefinitionStore {
        message: String,
        #[source]
        source: Box<Error>,
    },

    /// A circular import was detected and the problem policy is fail-fast.
    #[error("Circular import detected: {message} (chain: {chain})")]
    CircularImport { chain: String, message: String },

    /// A configuration class failed validation under a fail-fast policy.
    #[error("Invalid configuration class [{class_name}]: {message}")]
    InvalidConfiguration { class_name: String, message: String },

    /// The import stack grew past the configured depth cap.
    #[error("Import depth limit of {limit} exceeded while processing [{class_name}]")]
    ImportDepthExceeded { class_name: String, limit: usize },

    /// A bean definition name was registered twice and overriding is disabled.
    #[error("Cannot register bean definition [{name}]: a definition with that name already exists")]
    DefinitionOverride { name: String },

    /// A resource location did not resolve to readable content.
    #[error("Resource not found: {location}")]
    ResourceNotFound { location: String },

    /// A resource location named a host that cannot be resolved.
    #[error("Unknown host '{host}' for resource {location}")]
    UnknownHost { location: String, host: String },

    /// A resource location uses a scheme no loader understands.
    #[error("Unsupported resource location: {location}")]
    UnsupportedLocation { location: String },

    /// A required placeholder had no value and no default.
    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    /// A placeholder referenced itself, directly or transitively.
    #[error("Circular placeholder reference '{placeholder}' in property definitions")]
    CircularPlaceholder { placeholder: String },

    /// A property source could not be built from a resource.
    #[error("Invalid property source {location}: {message}")]
    PropertySource { location: String, message: String },

    /// The requested character encoding is not supported.
    #[error("Unsupported encoding '{encoding}' for resource {location}")]
    UnsupportedEncoding { location: String, encoding: String },

    /// A `Profile` value is not a well-formed profile expression.
    #[error("Malformed profile expression '{expression}': {message}")]
    InvalidProfileExpression { expression: String, message: String },

    /// A property-source list operation referenced a missing entry.
    #[error("Property source '{name}' does not exist")]
    MissingPropertySource { name: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wraps this error as a store-time error carrying `message`.
    ///
    /// Errors that already are store-time errors pass through unchanged so
    /// the innermost source identity is the one reported.
    pub fn in_store_context(self, message: impl Into<String>) -> Error {
        match self {
            Error::DefinitionStore { .. } => self,
            other => Error::DefinitionStore {
                message: message.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether a failure to load a declared location may be ignored when the
    /// declaring directive allows missing resources.
    pub fn is_recoverable_location_error(&self) -> bool {
        matches!(
            self,
            Error::ResourceNotFound { .. }
                | Error::UnknownHost { .. }
                | Error::UnresolvablePlaceholder { .. }
        )
    }

    /// Returns the innermost error behind any store-time wrapping.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::DefinitionStore { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
