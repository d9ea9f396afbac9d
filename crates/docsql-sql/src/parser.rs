//! sqlparser-based parsing of a single statement

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParserError),

    #[error("Syntax error: empty statement")]
    Empty,

    #[error("Syntax error: expected one statement, found {0}")]
    MultipleStatements(usize),
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        "SYNTAX_ERROR"
    }
}

/// Parse SQL text holding exactly one statement.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)?;
    match statements.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(statements.remove(0)),
        n => Err(ParseError::MultipleStatements(n)),
    }
}
