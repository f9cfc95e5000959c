//! The enum rewrite.
//!
//! Enum constants are macros: `enum { A, B = 5 };` defines `A` and `B` in
//! the macro table, each expanding to a single decimal literal. Unlike
//! ordinary macros their values are evaluated when declared, not when used.
//! The tokens themselves still flow to the parser so the AST records the
//! syntactic enum too.

use rez_foundation::errors::RezError;
use rez_lexer::token::{SourcePos, Token, TokenKind};

use crate::{int_token, Preprocessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EnumState {
    #[default]
    Inactive,
    /// Right after the `enum` keyword.
    Enum,
    /// After the optional type-name placeholder.
    TypeName,
    /// At the start of the next constant declaration.
    Next,
    /// After a constant's name.
    Name,
    /// Collecting an explicit value after `=`.
    Equals,
    /// After the closing brace; only `;` may follow.
    End,
}

#[derive(Debug, Default)]
pub(crate) struct EnumRewrite {
    state: EnumState,
    /// Value the next implicit constant receives.
    counter: i64,
    constant_name: Option<String>,
    value_tokens: Vec<Token>,
    /// Paren/bracket/brace nesting inside an explicit value. The value is
    /// terminated by `,` or `}` at depth zero.
    depth: i64,
}

impl EnumRewrite {
    pub(crate) fn is_active(&self) -> bool {
        self.state != EnumState::Inactive
    }
}

impl Preprocessor {
    pub(crate) fn enum_begin(&mut self) -> Result<(), RezError> {
        if self.enum_rewrite.is_active() {
            return Err(self.error("enum declarations cannot nest"));
        }
        self.enum_rewrite.state = EnumState::Enum;
        self.enum_rewrite.counter = 0;
        Ok(())
    }

    /// Advances the mini state machine by one token.
    pub(crate) fn enum_step(&mut self, token: &Token) -> Result<(), RezError> {
        match self.enum_rewrite.state {
            EnumState::Inactive => {}
            EnumState::Enum => match &token.kind {
                TokenKind::Ident => self.enum_rewrite.state = EnumState::TypeName,
                TokenKind::LeftBrace => self.enum_rewrite.state = EnumState::Next,
                _ => {
                    return Err(self.error(format!(
                        "expected an identifier or `{{` after `enum`, got {}",
                        token.describe()
                    )))
                }
            },
            EnumState::TypeName => match &token.kind {
                TokenKind::LeftBrace => self.enum_rewrite.state = EnumState::Next,
                _ => {
                    return Err(self.error(format!(
                        "expected `{{` to open the enum body, got {}",
                        token.describe()
                    )))
                }
            },
            EnumState::Next => match &token.kind {
                TokenKind::Ident => {
                    self.enum_rewrite.constant_name = Some(token.text.clone());
                    self.enum_rewrite.state = EnumState::Name;
                }
                TokenKind::RightBrace => self.enum_rewrite.state = EnumState::End,
                _ => {
                    return Err(self.error(format!(
                        "expected an enum constant name or `}}`, got {}",
                        token.describe()
                    )))
                }
            },
            EnumState::Name => match &token.kind {
                TokenKind::Assign => {
                    self.enum_rewrite.state = EnumState::Equals;
                    self.enum_rewrite.value_tokens.clear();
                    self.enum_rewrite.depth = 0;
                }
                TokenKind::Comma => {
                    self.define_current_constant(&token.pos)?;
                    self.enum_rewrite.counter = self.enum_rewrite.counter.wrapping_add(1);
                    self.enum_rewrite.state = EnumState::Next;
                }
                TokenKind::RightBrace => {
                    self.define_current_constant(&token.pos)?;
                    self.enum_rewrite.state = EnumState::End;
                }
                _ => {
                    return Err(self.error(format!(
                        "expected `=`, `,` or `}}` after the enum constant name, got {}",
                        token.describe()
                    )))
                }
            },
            EnumState::Equals => match &token.kind {
                TokenKind::Comma if self.enum_rewrite.depth == 0 => {
                    self.finish_explicit_value(token)?;
                    self.enum_rewrite.counter = self.enum_rewrite.counter.wrapping_add(1);
                    self.enum_rewrite.state = EnumState::Next;
                }
                TokenKind::RightBrace if self.enum_rewrite.depth == 0 => {
                    self.finish_explicit_value(token)?;
                    self.enum_rewrite.state = EnumState::End;
                }
                kind => {
                    self.enum_rewrite.value_tokens.push(token.clone());
                    match kind {
                        TokenKind::LeftParen
                        | TokenKind::LeftBracket
                        | TokenKind::LeftBrace => self.enum_rewrite.depth += 1,
                        TokenKind::RightParen
                        | TokenKind::RightBracket
                        | TokenKind::RightBrace => self.enum_rewrite.depth -= 1,
                        _ => {}
                    }
                }
            },
            EnumState::End => match &token.kind {
                TokenKind::Semi => self.enum_rewrite = EnumRewrite::default(),
                _ => {
                    return Err(self.error(format!(
                        "expected `;` after the enum declaration, got {}",
                        token.describe()
                    )))
                }
            },
        }
        Ok(())
    }

    /// Sets the counter from a collected explicit value, then defines the
    /// constant.
    fn finish_explicit_value(&mut self, terminator: &Token) -> Result<(), RezError> {
        let tokens = std::mem::take(&mut self.enum_rewrite.value_tokens);
        let value = self.eval_int_tokens(tokens)?;
        self.enum_rewrite.counter = value;
        self.define_current_constant(&terminator.pos)
    }

    fn define_current_constant(&mut self, pos: &SourcePos) -> Result<(), RezError> {
        let Some(name) = self.enum_rewrite.constant_name.take() else {
            return Err(self.error("enum constant name missing"));
        };
        let value = self.enum_rewrite.counter;
        self.macros.define(&name, vec![int_token(value, pos.clone())]);
        Ok(())
    }
}
