//! Lexical analysis for Rez source text.
//!
//! The lexer turns characters into [`token::Token`]s. Preprocessor directives
//! are recognized here as whole-line tokens whose operands are sub-lexed into
//! payloads; the preprocessor crate consumes those payloads without having to
//! re-scan any text.

pub mod lexer;
pub mod macroman;
pub mod strings;
pub mod token;
pub mod token_stream;

pub use lexer::Lexer;
pub use token_stream::{TokenListCursor, TokenStream};
