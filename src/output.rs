//! # Report Styling
//!
//! Every status line the `confgraph` commands print starts with a
//! [`Marker`] saying what the line reports: a section of the resolved
//! model, a validation step, or the outcome. A decorated [`ReportStyle`]
//! renders markers as emoji; a plain one renders bracketed tags such as
//! `[OK]` or `[WARN]`, which is what scripts and piped output see.
//!
//! ## Choosing a style
//!
//! `--color always` and `--color never` decide outright. Under `auto` the
//! environment is consulted in this order:
//! - `NO_COLOR` set to anything, even empty: plain
//! - `CLICOLOR=0`: plain
//! - `CLICOLOR_FORCE` set to a non-zero value: decorated
//! - `TERM=dumb`: plain
//! - otherwise decorated only when stdout is a color-capable terminal

use std::env;
use std::fmt;

/// Value of the global `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    Always,
    Never,
    #[default]
    Auto,
}

impl ColorChoice {
    /// Whether reports are decorated, given an environment lookup and a
    /// terminal check used only in `auto` mode.
    fn decorates(
        self,
        var: impl Fn(&str) -> Option<String>,
        is_color_terminal: impl FnOnce() -> bool,
    ) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => {
                if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
                    false
                } else if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
                    true
                } else if var("TERM").as_deref() == Some("dumb") {
                    false
                } else {
                    is_color_terminal()
                }
            }
        }
    }
}

/// What a report line is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Configuration classes section of `resolve`.
    Classes,
    /// Property sources section of `resolve`.
    Sources,
    /// Registered definitions section of `resolve`.
    Definitions,
    /// Heading of the `tree` output.
    Tree,
    /// A validation step is starting.
    Scan,
    /// A step succeeded, or nothing was found to report.
    Ok,
    /// Problems were collected but the run completed.
    Problems,
    /// A step failed.
    Failed,
    /// The descriptor passed every check.
    Done,
}

impl Marker {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Classes => "📦",
            Self::Sources => "📋",
            Self::Definitions => "🧩",
            Self::Tree => "🌳",
            Self::Scan => "🔍",
            Self::Ok => "✅",
            Self::Problems => "⚠️",
            Self::Failed => "❌",
            Self::Done => "🎉",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Classes => "[CLASSES]",
            Self::Sources => "[SOURCES]",
            Self::Definitions => "[DEFS]",
            Self::Tree => "[TREE]",
            Self::Scan => "[SCAN]",
            Self::Ok => "[OK]",
            Self::Problems => "[WARN]",
            Self::Failed => "[ERR]",
            Self::Done => "[DONE]",
        }
    }
}

/// How markers are rendered for one command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStyle {
    decorated: bool,
}

impl ReportStyle {
    /// The style for `choice` in the current process environment.
    pub fn for_choice(choice: ColorChoice) -> Self {
        let decorated = choice.decorates(
            |name| env::var_os(name).map(|value| value.to_string_lossy().into_owned()),
            || console::Term::stdout().features().colors_supported(),
        );
        Self { decorated }
    }

    pub fn plain() -> Self {
        Self { decorated: false }
    }

    pub fn decorated() -> Self {
        Self { decorated: true }
    }

    pub fn is_decorated(&self) -> bool {
        self.decorated
    }

    pub fn marker(&self, marker: Marker) -> &'static str {
        if self.decorated {
            marker.glyph()
        } else {
            marker.tag()
        }
    }

    /// `text` prefixed with the rendered marker.
    pub fn line(&self, marker: Marker, text: impl fmt::Display) -> String {
        format!("{} {}", self.marker(marker), text)
    }
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self::for_choice(ColorChoice::Auto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn decorates_with(vars: &[(&str, &str)], terminal: bool) -> bool {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ColorChoice::Auto.decorates(|name| vars.get(name).cloned(), || terminal)
    }

    #[test]
    fn test_explicit_choices_ignore_environment() {
        let never_called = || -> bool { panic!("terminal check must not run") };
        assert!(ColorChoice::Always.decorates(|_| Some("1".into()), never_called));
        assert!(!ColorChoice::Never.decorates(|_| None, never_called));
    }

    #[test]
    fn test_auto_follows_terminal_by_default() {
        assert!(decorates_with(&[], true));
        assert!(!decorates_with(&[], false));
    }

    #[test]
    fn test_auto_environment_overrides() {
        assert!(!decorates_with(&[("NO_COLOR", "")], true));
        assert!(!decorates_with(&[("CLICOLOR", "0")], true));
        assert!(!decorates_with(&[("TERM", "dumb")], true));
        assert!(decorates_with(&[("CLICOLOR_FORCE", "1")], false));
        assert!(!decorates_with(&[("CLICOLOR_FORCE", "0")], false));
        assert!(!decorates_with(&[("NO_COLOR", "1"), ("CLICOLOR_FORCE", "1")], true));
    }

    #[test]
    fn test_plain_style_uses_tags() {
        let style = ReportStyle::plain();
        assert_eq!(style.marker(Marker::Problems), "[WARN]");
        assert_eq!(
            style.line(Marker::Classes, "Configuration classes (2):"),
            "[CLASSES] Configuration classes (2):"
        );
    }

    #[test]
    fn test_decorated_style_uses_glyphs() {
        let style = ReportStyle::decorated();
        assert!(style.is_decorated());
        assert_eq!(style.line(Marker::Done, "Descriptor is valid"), "🎉 Descriptor is valid");
    }
}
