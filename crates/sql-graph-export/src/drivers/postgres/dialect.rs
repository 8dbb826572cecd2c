//! PostgreSQL SQL dialect (Strategy pattern).

use crate::core::identifier::quote_pg;
use crate::core::traits::Dialect;
use crate::error::Result;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TableName;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(dialect.quote_ident("my\"table").unwrap(), "\"my\"\"table\"");
    }

    #[test]
    fn test_qualify() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.qualify(&TableName::new("public", "student")).unwrap(),
            "\"public\".\"student\""
        );
    }
}
