//! Problems found while building the model, and the policy that decides
//! whether they abort the run.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::config::ProblemPolicy;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    CircularImport,
    InvalidConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub kind: ProblemKind,
    pub class_name: String,
    pub message: String,
    /// Import stack at detection time, bottom first. Empty for validation
    /// problems.
    pub chain: Vec<String>,
}

fn simple_name(class_name: &str) -> &str {
    class_name
        .rsplit(|c| c == '.' || c == '$')
        .next()
        .unwrap_or(class_name)
}

impl Problem {
    /// `attempted` was about to be imported while already on the stack.
    pub fn circular_import(attempted: &str, chain: Vec<String>) -> Self {
        let importer = chain.last().map(String::as_str).unwrap_or(attempted);
        let attempted_simple = simple_name(attempted);
        let message = format!(
            "A circular import has been detected: Illegal attempt by configuration class '{}' \
             to import class '{}' as '{}' is already present in the current import stack {}",
            simple_name(importer),
            attempted_simple,
            attempted_simple,
            Self::format_chain(&chain)
        );
        Self {
            kind: ProblemKind::CircularImport,
            class_name: attempted.to_string(),
            message,
            chain,
        }
    }

    pub fn invalid_configuration(class_name: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ProblemKind::InvalidConfiguration,
            class_name: class_name.to_string(),
            message: message.into(),
            chain: Vec::new(),
        }
    }

    fn format_chain(chain: &[String]) -> String {
        let names: Vec<&str> = chain.iter().map(|name| simple_name(name)).collect();
        format!("[{}]", names.join("->"))
    }

    /// `[A->B]` using simple names.
    pub fn chain_display(&self) -> String {
        Self::format_chain(&self.chain)
    }

    pub fn to_error(&self) -> Error {
        match self.kind {
            ProblemKind::CircularImport => Error::CircularImport {
                chain: self.chain_display(),
                message: self.message.clone(),
            },
            ProblemKind::InvalidConfiguration => Error::InvalidConfiguration {
                class_name: self.class_name.clone(),
                message: self.message.clone(),
            },
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Sink for problems.
pub trait ProblemReporter {
    fn error(&mut self, problem: Problem);
}

/// Collects problems and applies a [`ProblemPolicy`] to them.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    problems: Vec<Problem>,
    enforced: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Applies the policy to problems reported since the last call.
    ///
    /// Fail-fast turns the first new problem into an error; lenient logs
    /// each one and carries on.
    pub fn enforce(&mut self, policy: ProblemPolicy) -> Result<()> {
        let fresh = &self.problems[self.enforced..];
        self.enforced = self.problems.len();
        match policy {
            ProblemPolicy::FailFast => match fresh.first() {
                Some(problem) => Err(problem.to_error()),
                None => Ok(()),
            },
            ProblemPolicy::Lenient => {
                for problem in fresh {
                    warn!("{}", problem);
                }
                Ok(())
            }
        }
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl ProblemReporter for Diagnostics {
    fn error(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_import_message() {
        let problem = Problem::circular_import(
            "com.acme.A",
            vec!["com.acme.A".to_string(), "com.acme.B".to_string()],
        );
        assert_eq!(problem.chain_display(), "[A->B]");
        assert!(problem
            .message
            .contains("Illegal attempt by configuration class 'B' to import class 'A'"));
        assert!(matches!(problem.to_error(), Error::CircularImport { .. }));
    }

    #[test]
    fn test_fail_fast_reports_first_new_problem() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.enforce(ProblemPolicy::FailFast).is_ok());

        diagnostics.error(Problem::invalid_configuration("A", "first"));
        diagnostics.error(Problem::invalid_configuration("B", "second"));
        let error = diagnostics.enforce(ProblemPolicy::FailFast).unwrap_err();
        assert!(error.to_string().contains("first"));

        // already enforced problems are not raised twice
        assert!(diagnostics.enforce(ProblemPolicy::FailFast).is_ok());
        assert_eq!(diagnostics.problems().len(), 2);
    }

    #[test]
    fn test_lenient_logs_and_continues() {
        testing_logger::setup();
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(Problem::invalid_configuration("A", "final class"));
        assert!(diagnostics.enforce(ProblemPolicy::Lenient).is_ok());

        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|log| log.level == log::Level::Warn && log.body.contains("final class")));
        });
    }
}
