//! docsql SQL front end - parsing and translation into commands
//!
//! Text is parsed with `sqlparser` into a generic statement AST, then the
//! [`Translator`] turns that AST into a [`docsql_ir::Command`]. Neither step
//! touches the network.

mod error;
mod literal;
mod parser;
mod predicate;
mod translate;

pub use error::TranslationError;
pub use parser::{parse, ParseError};
pub use translate::{translate, TranslateOptions, Translator, DEFAULT_MAX_PAGE_SIZE};
