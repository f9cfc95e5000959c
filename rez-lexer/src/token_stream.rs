use rez_foundation::errors::RezError;

use crate::token::{SourcePos, Token, TokenKind};

/// A pull source of tokens.
///
/// Streams never run dry: once the underlying input is exhausted they keep
/// yielding `EndOfFile` tokens. Fetching a token can fail with any pipeline
/// error because the preprocessor (itself a `TokenStream`) may have to
/// parse and evaluate directive operands to produce the next token.
pub trait TokenStream {
    fn next_token(&mut self) -> Result<Token, RezError>;
}

impl<T> TokenStream for &mut T
where
    T: TokenStream + ?Sized,
{
    fn next_token(&mut self) -> Result<Token, RezError> {
        (**self).next_token()
    }
}

/// Replays an in-memory token list.
///
/// This is the ephemeral stream behind the parser's secondary entry point:
/// directive operands, macro replacement lists, and enum constant values are
/// captured as lists and parsed through one of these.
pub struct TokenListCursor {
    tokens: std::vec::IntoIter<Token>,
    end_pos: SourcePos,
}

impl TokenListCursor {
    /// `fallback` positions the end-of-input token when the list is empty.
    pub fn new(tokens: Vec<Token>, fallback: SourcePos) -> Self {
        let end_pos = tokens.last().map(|token| token.pos.clone()).unwrap_or(fallback);
        Self {
            tokens: tokens.into_iter(),
            end_pos,
        }
    }
}

impl TokenStream for TokenListCursor {
    fn next_token(&mut self) -> Result<Token, RezError> {
        Ok(self.tokens.next().unwrap_or_else(|| Token {
            kind: TokenKind::EndOfFile,
            text: String::new(),
            pos: self.end_pos.clone(),
        }))
    }
}
