//! Profile expressions.
//!
//! A `Profile` value is either a bare profile name or an expression over
//! names with `!` (not), `&` (and), `|` (or) and parentheses, such as
//! `prod & (us-east | eu-central)`. `&` and `|` may not be mixed at the
//! same level without parentheses: `a & b | c` is rejected.

use crate::error::{Error, Result};

/// A parsed profile expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileExpression {
    Name(String),
    Not(Box<ProfileExpression>),
    And(Vec<ProfileExpression>),
    Or(Vec<ProfileExpression>),
}

impl ProfileExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        let tokens = tokenize(expression);
        if tokens.is_empty() {
            return Err(malformed(expression, "must contain text"));
        }
        let mut parser = Parser {
            expression,
            tokens,
            position: 0,
        };
        let parsed = parser.expression()?;
        if parser.position < parser.tokens.len() {
            return Err(malformed(expression, "unexpected trailing input"));
        }
        Ok(parsed)
    }

    /// Evaluates the expression, asking `is_active` about each name.
    pub fn matches(&self, is_active: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Name(name) => is_active(name),
            Self::Not(inner) => !inner.matches(is_active),
            Self::And(operands) => operands.iter().all(|o| o.matches(is_active)),
            Self::Or(operands) => operands.iter().any(|o| o.matches(is_active)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Name(&'a str),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (index, ch) in expression.char_indices() {
        let operator = match ch {
            '!' => Token::Not,
            '&' => Token::And,
            '|' => Token::Or,
            '(' => Token::Open,
            ')' => Token::Close,
            _ => continue,
        };
        push_name(&mut tokens, &expression[start..index]);
        tokens.push(operator);
        start = index + ch.len_utf8();
    }
    push_name(&mut tokens, &expression[start..]);
    tokens
}

fn push_name<'a>(tokens: &mut Vec<Token<'a>>, segment: &'a str) {
    let name = segment.trim();
    if !name.is_empty() {
        tokens.push(Token::Name(name));
    }
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<ProfileExpression> {
        let mut operands = vec![self.operand()?];
        let mut operator = None;
        while let Some(token @ (Token::And | Token::Or)) = self.peek() {
            if operator.is_some_and(|current| current != token) {
                return Err(malformed(
                    self.expression,
                    "'&' and '|' must not be mixed without parentheses",
                ));
            }
            operator = Some(token);
            self.position += 1;
            operands.push(self.operand()?);
        }
        Ok(match operator {
            Some(Token::And) => ProfileExpression::And(operands),
            Some(_) => ProfileExpression::Or(operands),
            None => operands.remove(0),
        })
    }

    fn operand(&mut self) -> Result<ProfileExpression> {
        match self.next() {
            Some(Token::Name(name)) => Ok(ProfileExpression::Name(name.to_string())),
            Some(Token::Not) => Ok(ProfileExpression::Not(Box::new(self.operand()?))),
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(malformed(self.expression, "unbalanced parentheses")),
                }
            }
            _ => Err(malformed(self.expression, "expected a profile name")),
        }
    }
}

fn malformed(expression: &str, message: &str) -> Error {
    Error::InvalidProfileExpression {
        expression: expression.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn name(value: &str) -> ProfileExpression {
        ProfileExpression::Name(value.to_string())
    }

    fn accepts(expression: &str, active: &[&str]) -> bool {
        ProfileExpression::parse(expression)
            .unwrap()
            .matches(&|profile| active.contains(&profile))
    }

    #[test]
    fn test_parse_single_name_and_negation() {
        assert_eq!(ProfileExpression::parse(" prod ").unwrap(), name("prod"));
        assert_eq!(
            ProfileExpression::parse("!prod").unwrap(),
            ProfileExpression::Not(Box::new(name("prod")))
        );
    }

    #[test]
    fn test_parse_grouped_expression() {
        assert_eq!(
            ProfileExpression::parse("prod & (us-east | eu-central)").unwrap(),
            ProfileExpression::And(vec![
                name("prod"),
                ProfileExpression::Or(vec![name("us-east"), name("eu-central")]),
            ])
        );
    }

    #[test]
    fn test_matches() {
        assert!(accepts("a & b", &["a", "b"]));
        assert!(!accepts("a & b", &["a"]));
        assert!(accepts("a | b", &["b"]));
        assert!(accepts("!a & b", &["b"]));
        assert!(!accepts("!(a | b)", &["b"]));
        assert!(accepts("(a & b) | c", &["c"]));
        assert!(accepts("a | b | c", &["c"]));
    }

    #[test]
    fn test_malformed_expressions() {
        for expression in ["", "  ", "a & b | c", "(a & b", "a & b)", "a &", "!", "()", "a (b)"] {
            assert!(
                matches!(
                    ProfileExpression::parse(expression),
                    Err(Error::InvalidProfileExpression { .. })
                ),
                "expected {:?} to be rejected",
                expression
            );
        }
    }

    proptest! {
        #[test]
        fn double_negation_is_identity(profile in "[a-z]{1,8}", active in any::<bool>()) {
            let set: Vec<&str> = if active { vec![profile.as_str()] } else { Vec::new() };
            let plain = accepts(&profile, &set);
            let doubled = accepts(&format!("!!{}", profile), &set);
            prop_assert_eq!(plain, doubled);
            prop_assert_eq!(plain, active);
        }
    }
}
