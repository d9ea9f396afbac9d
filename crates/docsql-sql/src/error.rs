use thiserror::Error;

/// Failure to map a parsed statement onto a command. Raised before any gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("unsupported syntax: {0}")]
    SyntaxUnsupported(String),

    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("duplicate result name: {0}")]
    DuplicateResultName(String),
}

impl TranslationError {
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::SyntaxUnsupported(_) => "SYNTAX_UNSUPPORTED",
            TranslationError::UnsupportedPredicate(_) => "UNSUPPORTED_PREDICATE",
            TranslationError::UnsupportedStatement(_) => "UNSUPPORTED_STATEMENT",
            TranslationError::DuplicateResultName(_) => "DUPLICATE_RESULT_NAME",
        }
    }

    pub(crate) fn syntax(construct: impl Into<String>) -> Self {
        TranslationError::SyntaxUnsupported(construct.into())
    }
}
