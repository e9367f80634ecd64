//! The single admin predicate: a regex matched against either the sender's
//! nick or host.

use regex::Regex;

use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminField {
    Nick,
    Host,
}

#[derive(Debug, Clone)]
pub struct AdminRule {
    field: AdminField,
    pattern: Regex,
}

impl AdminRule {
    /// Parse `nick:<regex>` or `host:<regex>`.
    pub fn parse(criteria: &str) -> Result<Self, BotError> {
        let (field, expr) = criteria
            .trim()
            .split_once(':')
            .ok_or_else(|| BotError::AdminCriteria(criteria.to_string()))?;

        let field = match field {
            "nick" => AdminField::Nick,
            "host" => AdminField::Host,
            other => {
                return Err(BotError::AdminCriteria(format!(
                    "unknown field '{other}'"
                )))
            }
        };
        if expr.is_empty() {
            return Err(BotError::AdminCriteria("empty expression".to_string()));
        }

        let pattern = Regex::new(expr).map_err(|e| BotError::AdminCriteria(e.to_string()))?;
        Ok(Self { field, pattern })
    }

    pub fn field(&self) -> AdminField {
        self.field
    }

    pub fn permits(&self, nick: &str, host: &str) -> bool {
        match self.field {
            AdminField::Nick => self.pattern.is_match(nick),
            AdminField::Host => self.pattern.is_match(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nick_rule() {
        let rule = AdminRule::parse("nick:^op$").unwrap();
        assert_eq!(rule.field(), AdminField::Nick);
        assert!(rule.permits("op", "anything"));
        assert!(!rule.permits("oper", "anything"));
    }

    #[test]
    fn test_host_rule_keeps_colons_in_expression() {
        let rule = AdminRule::parse("host:^2001:db8::1$").unwrap();
        assert!(rule.permits("whoever", "2001:db8::1"));
        assert!(!rule.permits("2001:db8::1", "example.org"));
    }

    #[test]
    fn test_bad_criteria() {
        assert!(AdminRule::parse("").is_err());
        assert!(AdminRule::parse("user:x").is_err());
        assert!(AdminRule::parse("nick:").is_err());
        assert!(AdminRule::parse("nick:(").is_err());
    }
}
