//! `${...}` placeholder substitution.
//!
//! Placeholders may be nested (`${${env}.url}`), may carry a default after
//! the value separator (`${port:8080}`), and resolved values are themselves
//! scanned for further placeholders. A placeholder that refers back to
//! itself through any chain of values is reported as circular.

use std::collections::HashSet;

use crate::error::{Error, Result};

pub const DEFAULT_PREFIX: &str = "${";
pub const DEFAULT_SUFFIX: &str = "}";
pub const DEFAULT_VALUE_SEPARATOR: &str = ":";

/// Replaces placeholders in text using a caller-supplied lookup.
#[derive(Debug, Clone)]
pub struct PlaceholderHelper {
    prefix: String,
    suffix: String,
    simple_prefix: String,
    value_separator: Option<String>,
    ignore_unresolvable: bool,
}

impl PlaceholderHelper {
    /// A helper using `${`, `}` and `:`.
    pub fn new(ignore_unresolvable: bool) -> Self {
        Self::with_delimiters(
            DEFAULT_PREFIX,
            DEFAULT_SUFFIX,
            Some(DEFAULT_VALUE_SEPARATOR),
            ignore_unresolvable,
        )
    }

    pub fn with_delimiters(
        prefix: &str,
        suffix: &str,
        value_separator: Option<&str>,
        ignore_unresolvable: bool,
    ) -> Self {
        // A `${` prefix nests on a bare `{` when the suffix is `}`.
        let simple_prefix = match (prefix.strip_suffix('{'), suffix) {
            (Some(_), "}") => "{".to_string(),
            _ => prefix.to_string(),
        };
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            simple_prefix,
            value_separator: value_separator.map(str::to_string),
            ignore_unresolvable,
        }
    }

    /// Replaces every placeholder in `value` with what `resolve` returns for it.
    pub fn replace_placeholders(
        &self,
        value: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
    ) -> Result<String> {
        let mut visited = HashSet::new();
        self.parse_value(value, resolve, &mut visited)
    }

    fn parse_value(
        &self,
        value: &str,
        resolve: &dyn Fn(&str) -> Option<String>,
        visited: &mut HashSet<String>,
    ) -> Result<String> {
        let mut result = value.to_string();
        let mut start = find_from(&result, &self.prefix, 0);

        while let Some(start_index) = start {
            let Some(end_index) = self.find_end_index(&result, start_index) else {
                break;
            };
            let original = result[start_index + self.prefix.len()..end_index].to_string();
            if !visited.insert(original.clone()) {
                return Err(Error::CircularPlaceholder {
                    placeholder: original,
                });
            }

            let placeholder = self.parse_value(&original, resolve, visited)?;
            let mut resolved = resolve(&placeholder);
            if resolved.is_none() {
                if let Some(separator) = &self.value_separator {
                    if let Some((key, default)) = placeholder.split_once(separator.as_str()) {
                        resolved = resolve(key).or_else(|| Some(default.to_string()));
                    }
                }
            }

            match resolved {
                Some(raw) => {
                    let replacement = self.parse_value(&raw, resolve, visited)?;
                    result.replace_range(start_index..end_index + self.suffix.len(), &replacement);
                    start = find_from(&result, &self.prefix, start_index + replacement.len());
                }
                None if self.ignore_unresolvable => {
                    start = find_from(&result, &self.prefix, end_index + self.suffix.len());
                }
                None => {
                    return Err(Error::UnresolvablePlaceholder {
                        placeholder,
                        value: value.to_string(),
                    });
                }
            }
            visited.remove(&original);
        }
        Ok(result)
    }

    fn find_end_index(&self, buf: &str, start_index: usize) -> Option<usize> {
        let bytes = buf.as_bytes();
        let mut index = start_index + self.prefix.len();
        let mut within_nested = 0usize;
        while index < bytes.len() {
            if bytes[index..].starts_with(self.suffix.as_bytes()) {
                if within_nested > 0 {
                    within_nested -= 1;
                    index += self.suffix.len();
                } else {
                    return Some(index);
                }
            } else if bytes[index..].starts_with(self.simple_prefix.as_bytes()) {
                within_nested += 1;
                index += self.simple_prefix.len();
            } else {
                index += 1;
            }
        }
        None
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .as_bytes()
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())
        .map(|offset| offset + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_simple_replacement() {
        let helper = PlaceholderHelper::new(false);
        let resolve = lookup(&[("name", "world")]);
        assert_eq!(
            helper.replace_placeholders("hello ${name}!", &resolve).unwrap(),
            "hello world!"
        );
    }

    #[test]
    fn test_default_value() {
        let helper = PlaceholderHelper::new(false);
        let resolve = lookup(&[]);
        assert_eq!(
            helper
                .replace_placeholders("port=${server.port:8080}", &resolve)
                .unwrap(),
            "port=8080"
        );
    }

    #[test]
    fn test_nested_key_and_recursive_value() {
        let helper = PlaceholderHelper::new(false);
        let resolve = lookup(&[
            ("env", "prod"),
            ("prod.url", "https://${host}"),
            ("host", "example.org"),
        ]);
        assert_eq!(
            helper.replace_placeholders("${${env}.url}", &resolve).unwrap(),
            "https://example.org"
        );
    }

    #[test]
    fn test_unresolvable_required() {
        let helper = PlaceholderHelper::new(false);
        let error = helper
            .replace_placeholders("classpath:${missing}.properties", &lookup(&[]))
            .unwrap_err();
        assert!(matches!(
            error,
            Error::UnresolvablePlaceholder { ref placeholder, .. } if placeholder == "missing"
        ));
        assert!(error.is_recoverable_location_error());
    }

    #[test]
    fn test_unresolvable_ignored() {
        let helper = PlaceholderHelper::new(true);
        let resolve = lookup(&[("b", "2")]);
        assert_eq!(
            helper.replace_placeholders("${a}-${b}", &resolve).unwrap(),
            "${a}-2"
        );
    }

    #[test]
    fn test_circular_reference() {
        let helper = PlaceholderHelper::new(false);
        let resolve = lookup(&[("a", "${b}"), ("b", "${a}")]);
        let error = helper.replace_placeholders("${a}", &resolve).unwrap_err();
        assert!(matches!(error, Error::CircularPlaceholder { .. }));
    }

    #[test]
    fn test_same_placeholder_twice_is_not_circular() {
        let helper = PlaceholderHelper::new(false);
        let resolve = lookup(&[("x", "1")]);
        assert_eq!(
            helper.replace_placeholders("${x}${x}", &resolve).unwrap(),
            "11"
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_left_alone() {
        let helper = PlaceholderHelper::new(false);
        assert_eq!(
            helper.replace_placeholders("${open", &lookup(&[])).unwrap(),
            "${open"
        );
    }

    proptest! {
        #[test]
        fn text_without_prefix_is_unchanged(text in "[^$]*") {
            let helper = PlaceholderHelper::new(false);
            prop_assert_eq!(helper.replace_placeholders(&text, &lookup(&[])).unwrap(), text);
        }

        #[test]
        fn resolved_value_is_substituted(key in "[a-z]{1,8}", value in "[a-zA-Z0-9 ]{0,16}") {
            let helper = PlaceholderHelper::new(false);
            let resolve = lookup(&[(key.as_str(), value.as_str())]);
            let text = format!("<${{{}}}>", key);
            prop_assert_eq!(
                helper.replace_placeholders(&text, &resolve).unwrap(),
                format!("<{}>", value)
            );
        }
    }
}
