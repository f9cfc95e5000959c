//! Grammar and AST construction for Rez files.
//!
//! Two entry points share the grammar: [`Parser::parse_file`] consumes a
//! whole (preprocessed) token stream into a [`ast::File`], and
//! [`parse_expression_tokens`] runs the expression rules over an ephemeral
//! token list, the secondary entry the preprocessor uses for directive
//! operands.

pub mod ast;
mod parser;

pub use parser::{parse_expression_tokens, Parser};
