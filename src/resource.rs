//! # Resources and Property-Source Loading
//!
//! A [`ResourceLoader`] turns a location string into readable bytes. Two
//! loaders ship with the crate:
//!
//! - [`FileSystemResourceLoader`] understands `classpath:` (relative to a base
//!   directory), `file:` URLs and plain paths.
//! - [`InMemoryResourceLoader`] serves content registered up front and may
//!   fall back to another loader.
//!
//! [`DefaultPropertySourceFactory`] builds property sources from resources in
//! `.properties`, YAML, JSON or TOML form, flattening nested structures into
//! dotted keys.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use url::Url;

use crate::environment::{MapPropertySource, PropertySource};
use crate::error::{Error, Result};
use crate::plugin::PropertySourceFactory;

/// The resource loader shared by every participant of one resolution run.
pub type SharedResourceLoader = Rc<dyn ResourceLoader>;

pub const CLASSPATH_PREFIX: &str = "classpath:";

/// Content loaded from a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub location: String,
    pub description: String,
    pub content: Vec<u8>,
}

impl Resource {
    pub fn new(location: impl Into<String>, description: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            location: location.into(),
            description: description.into(),
            content,
        }
    }

    /// Lowercased file extension of the location, if any.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.location.rsplit(['/', ':']).next()?;
        let (_, extension) = file_name.rsplit_once('.')?;
        Some(extension.to_ascii_lowercase())
    }
}

/// A resource paired with the character encoding to read it with.
#[derive(Debug, Clone)]
pub struct EncodedResource {
    pub resource: Resource,
    pub encoding: Option<String>,
}

impl EncodedResource {
    pub fn new(resource: Resource, encoding: Option<String>) -> Self {
        Self { resource, encoding }
    }

    /// Decodes the content; UTF-8 unless another supported encoding is named.
    pub fn read_to_string(&self) -> Result<String> {
        let encoding = self
            .encoding
            .as_deref()
            .map(|e| e.trim().to_ascii_uppercase().replace('_', "-"));
        match encoding.as_deref() {
            None | Some("") | Some("UTF-8") | Some("UTF8") => {
                String::from_utf8(self.resource.content.clone()).map_err(|e| Error::PropertySource {
                    location: self.resource.location.clone(),
                    message: format!("invalid UTF-8: {}", e),
                })
            }
            Some("ISO-8859-1") | Some("LATIN1") | Some("LATIN-1") => {
                Ok(self.resource.content.iter().map(|b| *b as char).collect())
            }
            Some(_) => Err(Error::UnsupportedEncoding {
                location: self.resource.location.clone(),
                encoding: self.encoding.clone().unwrap_or_default(),
            }),
        }
    }
}

/// Resolves location strings to resources.
pub trait ResourceLoader {
    fn get_resource(&self, location: &str) -> Result<Resource>;
}

/// Loads resources from the file system.
#[derive(Debug, Clone)]
pub struct FileSystemResourceLoader {
    base: PathBuf,
}

impl FileSystemResourceLoader {
    /// `classpath:` and relative locations resolve against `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn read_path(&self, location: &str, path: &Path, description: String) -> Result<Resource> {
        if !path.is_file() {
            return Err(Error::ResourceNotFound {
                location: location.to_string(),
            });
        }
        let content = std::fs::read(path)?;
        Ok(Resource::new(location, description, content))
    }
}

impl ResourceLoader for FileSystemResourceLoader {
    fn get_resource(&self, location: &str) -> Result<Resource> {
        if let Some(rest) = location.strip_prefix(CLASSPATH_PREFIX) {
            let relative = rest.trim_start_matches('/');
            let path = self.base.join(relative);
            return self.read_path(location, &path, format!("class path resource [{}]", relative));
        }

        if location.contains("://") || location.starts_with("file:") {
            let url = Url::parse(location)?;
            return match url.scheme() {
                "file" => {
                    let path = url.to_file_path().map_err(|_| Error::UnsupportedLocation {
                        location: location.to_string(),
                    })?;
                    let description = format!("URL [{}]", url);
                    self.read_path(location, &path, description)
                }
                _ => match url.host_str() {
                    None | Some("") => Err(Error::UnknownHost {
                        location: location.to_string(),
                        host: String::new(),
                    }),
                    Some(_) => Err(Error::UnsupportedLocation {
                        location: location.to_string(),
                    }),
                },
            };
        }

        let path = Path::new(location);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        };
        let description = format!("file [{}]", path.display());
        self.read_path(location, &path, description)
    }
}

/// Serves resources registered in memory.
#[derive(Default)]
pub struct InMemoryResourceLoader {
    resources: HashMap<String, Vec<u8>>,
    fallback: Option<Box<dyn ResourceLoader>>,
}

impl InMemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers content under a location; `classpath:` prefixes are optional.
    pub fn with_resource(mut self, location: &str, content: impl Into<Vec<u8>>) -> Self {
        self.resources
            .insert(Self::normalize(location).to_string(), content.into());
        self
    }

    /// Loader consulted for locations not held in memory.
    pub fn with_fallback(mut self, fallback: Box<dyn ResourceLoader>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn normalize(location: &str) -> &str {
        location
            .strip_prefix(CLASSPATH_PREFIX)
            .unwrap_or(location)
            .trim_start_matches('/')
    }
}

impl ResourceLoader for InMemoryResourceLoader {
    fn get_resource(&self, location: &str) -> Result<Resource> {
        let key = Self::normalize(location);
        if let Some(content) = self.resources.get(key) {
            return Ok(Resource::new(
                location,
                format!("in-memory resource [{}]", key),
                content.clone(),
            ));
        }
        match &self.fallback {
            Some(fallback) => fallback.get_resource(location),
            None => Err(Error::ResourceNotFound {
                location: location.to_string(),
            }),
        }
    }
}

/// Builds map property sources from `.properties`, YAML, JSON or TOML resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPropertySourceFactory;

impl PropertySourceFactory for DefaultPropertySourceFactory {
    fn create_property_source(
        &self,
        name: Option<&str>,
        resource: &EncodedResource,
    ) -> Result<PropertySource> {
        let text = resource.read_to_string()?;
        let location = &resource.resource.location;
        let properties = match resource.resource.extension().as_deref() {
            Some("yaml") | Some("yml") => {
                let value: Value = if text.trim().is_empty() {
                    Value::Null
                } else {
                    serde_yaml::from_str(&text)?
                };
                flatten_document(location, value)?
            }
            Some("json") => flatten_document(location, serde_json::from_str(&text)?)?,
            Some("toml") => flatten_document(location, toml::from_str(&text)?)?,
            _ => parse_properties(&text),
        };

        let description = resource.resource.description.clone();
        let mut source = MapPropertySource::new(name.unwrap_or(&description), properties);
        source.resource_name = Some(description);
        Ok(PropertySource::Map(source))
    }
}

fn flatten_document(location: &str, value: Value) -> Result<BTreeMap<String, String>> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(_) => {
            let mut properties = BTreeMap::new();
            flatten_value("", &value, &mut properties);
            Ok(properties)
        }
        _ => Err(Error::PropertySource {
            location: location.to_string(),
            message: "top-level document must be a mapping".to_string(),
        }),
    }
}

/// Flattens nested objects and arrays into dotted and indexed keys.
pub fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_value(&key, nested, out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(&format!("{}[{}]", prefix, index), item, out);
            }
        }
        Value::Null => {
            out.insert(prefix.to_string(), String::new());
        }
        Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Parses `.properties` text: `key=value`, `key: value` or `key value`,
/// `#`/`!` comments and backslash line continuations.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut logical = String::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if logical.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')) {
            continue;
        }
        let continued = ends_with_odd_backslashes(trimmed);
        if continued {
            logical.push_str(&trimmed[..trimmed.len() - 1]);
            continue;
        }
        logical.push_str(trimmed);
        let (key, value) = split_property(&logical);
        properties.insert(unescape(&key), unescape(&value));
        logical.clear();
    }
    if !logical.is_empty() {
        let (key, value) = split_property(&logical);
        properties.insert(unescape(&key), unescape(&value));
    }
    properties
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_property(line: &str) -> (String, String) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                return (
                    line[..index].trim_end().to_string(),
                    line[index + 1..].trim_start().to_string(),
                )
            }
            c if c.is_whitespace() => {
                let rest = line[index..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (line[..index].to_string(), rest.trim_start().to_string());
            }
            _ => {}
        }
    }
    (line.to_string(), String::new())
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn encoded(location: &str, content: &[u8], encoding: Option<&str>) -> EncodedResource {
        EncodedResource::new(
            Resource::new(location, format!("test [{}]", location), content.to_vec()),
            encoding.map(str::to_string),
        )
    }

    fn properties_of(source: &PropertySource) -> &BTreeMap<String, String> {
        match source {
            PropertySource::Map(map) => &map.properties,
            PropertySource::Composite(_) => panic!("expected a map source"),
        }
    }

    #[test]
    fn test_parse_properties_forms() {
        let text = "# comment\n! also comment\na=1\nb : 2\nc 3\nlong = one \\\n    two\nescaped\\=key=v\n";
        let properties = parse_properties(text);
        assert_eq!(properties["a"], "1");
        assert_eq!(properties["b"], "2");
        assert_eq!(properties["c"], "3");
        assert_eq!(properties["long"], "one two");
        assert_eq!(properties["escaped=key"], "v");
    }

    #[test]
    fn test_factory_flattens_yaml() {
        let resource = encoded(
            "classpath:app.yaml",
            b"server:\n  port: 8080\n  hosts: [a, b]\nflag: true\n",
            None,
        );
        let source = DefaultPropertySourceFactory
            .create_property_source(Some("app"), &resource)
            .unwrap();
        assert_eq!(source.name(), "app");
        let properties = properties_of(&source);
        assert_eq!(properties["server.port"], "8080");
        assert_eq!(properties["server.hosts[1]"], "b");
        assert_eq!(properties["flag"], "true");
    }

    #[test]
    fn test_factory_json_and_toml() {
        let json = encoded("app.json", br#"{"a": {"b": "c"}}"#, None);
        let source = DefaultPropertySourceFactory
            .create_property_source(None, &json)
            .unwrap();
        assert_eq!(source.name(), "test [app.json]");
        assert_eq!(source.get("a.b"), Some("c"));

        let toml = encoded("app.toml", b"[db]\nurl = \"jdbc:x\"\n", None);
        let source = DefaultPropertySourceFactory
            .create_property_source(None, &toml)
            .unwrap();
        assert_eq!(source.get("db.url"), Some("jdbc:x"));
    }

    #[test]
    fn test_latin1_encoding() {
        let resource = encoded("app.properties", &[b'k', b'=', 0xE9], Some("ISO-8859-1"));
        let source = DefaultPropertySourceFactory
            .create_property_source(None, &resource)
            .unwrap();
        assert_eq!(source.get("k"), Some("é"));
    }

    #[test]
    fn test_unsupported_encoding() {
        let resource = encoded("app.properties", b"k=v", Some("EBCDIC"));
        let error = DefaultPropertySourceFactory
            .create_property_source(None, &resource)
            .unwrap_err();
        assert!(matches!(error, Error::UnsupportedEncoding { .. }));
    }

    #[test]
    fn test_file_system_loader_classpath_and_missing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.properties"), "k=v").unwrap();
        let loader = FileSystemResourceLoader::new(temp.path());

        let resource = loader.get_resource("classpath:/app.properties").unwrap();
        assert_eq!(resource.content, b"k=v");
        assert_eq!(resource.description, "class path resource [app.properties]");

        let error = loader.get_resource("classpath:missing.properties").unwrap_err();
        assert!(matches!(error, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn test_file_system_loader_remote_locations() {
        let loader = FileSystemResourceLoader::new(".");
        assert!(matches!(
            loader.get_resource("http://example.org/app.properties"),
            Err(Error::UnsupportedLocation { .. })
        ));
    }

    #[test]
    fn test_in_memory_loader_with_fallback() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("disk.properties"), "d=1").unwrap();
        let loader = InMemoryResourceLoader::new()
            .with_resource("mem.properties", "m=1")
            .with_fallback(Box::new(FileSystemResourceLoader::new(temp.path())));

        assert_eq!(
            loader.get_resource("classpath:mem.properties").unwrap().content,
            b"m=1"
        );
        assert_eq!(
            loader.get_resource("classpath:disk.properties").unwrap().content,
            b"d=1"
        );
        assert!(loader.get_resource("classpath:none.properties").is_err());
    }

    #[test]
    fn test_resource_extension() {
        let resource = Resource::new("classpath:config/app.YML", "x", Vec::new());
        assert_eq!(resource.extension().as_deref(), Some("yml"));
        let resource = Resource::new("classpath:noext", "x", Vec::new());
        assert_eq!(resource.extension(), None);
    }
}
