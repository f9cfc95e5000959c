//! Expression parsing: Pratt (precedence climbing) for the integer grammar,
//! plus string expressions as runs of concatenated singles.

use rez_foundation::errors::RezError;
use rez_lexer::{
    strings,
    token::{IntBase, Keyword, RezFn, Token, TokenKind},
    TokenStream,
};

use super::Parser;
use crate::ast::{
    Expr, IntBinaryOp, IntExpr, IntFn, IntUnaryOp, ResourceAttribute, StringExpr, StringFn,
};

/// Binding power of an infix operator; higher binds tighter. Mirrors the
/// C-family precedence ladder from `||` up through `* / %`.
fn binding_power(kind: &TokenKind) -> Option<(u8, IntBinaryOp)> {
    Some(match kind {
        TokenKind::Or => (1, IntBinaryOp::BoolOr),
        TokenKind::And => (2, IntBinaryOp::BoolAnd),
        TokenKind::BitOr => (3, IntBinaryOp::BitOr),
        TokenKind::BitXor => (4, IntBinaryOp::BitXor),
        TokenKind::BitAnd => (5, IntBinaryOp::BitAnd),
        TokenKind::Equal => (6, IntBinaryOp::Eq),
        TokenKind::NotEqual => (6, IntBinaryOp::Ne),
        TokenKind::Less => (7, IntBinaryOp::Lt),
        TokenKind::Greater => (7, IntBinaryOp::Gt),
        TokenKind::LessEqual => (7, IntBinaryOp::Le),
        TokenKind::GreaterEqual => (7, IntBinaryOp::Ge),
        TokenKind::ShiftLeft => (8, IntBinaryOp::Shl),
        TokenKind::ShiftRight => (8, IntBinaryOp::Shr),
        TokenKind::Add => (9, IntBinaryOp::Add),
        TokenKind::Sub => (9, IntBinaryOp::Sub),
        TokenKind::Mul => (10, IntBinaryOp::Mul),
        TokenKind::Div => (10, IntBinaryOp::Div),
        TokenKind::Rem => (10, IntBinaryOp::Mod),
        _ => return None,
    })
}

fn attribute_keyword(keyword: Keyword) -> Option<ResourceAttribute> {
    Some(match keyword {
        Keyword::Compressed => ResourceAttribute::Compressed,
        Keyword::Uncompressed => ResourceAttribute::Uncompressed,
        Keyword::Changed => ResourceAttribute::Changed,
        Keyword::Unchanged => ResourceAttribute::Unchanged,
        Keyword::Preload => ResourceAttribute::Preload,
        Keyword::Nonpreload => ResourceAttribute::Nonpreload,
        Keyword::Protected => ResourceAttribute::Protected,
        Keyword::Unprotected => ResourceAttribute::Unprotected,
        Keyword::Locked => ResourceAttribute::Locked,
        Keyword::Unlocked => ResourceAttribute::Unlocked,
        Keyword::Purgeable => ResourceAttribute::Purgeable,
        Keyword::Nonpurgeable => ResourceAttribute::Nonpurgeable,
        Keyword::Sysheap => ResourceAttribute::Sysheap,
        Keyword::Appheap => ResourceAttribute::Appheap,
        _ => return None,
    })
}

impl<T> Parser<T>
where
    T: TokenStream,
{
    pub(crate) fn expression(&mut self) -> Result<Expr, RezError> {
        if self.starts_string_expr()? {
            Ok(Expr::Str(self.string_expr()?))
        } else {
            Ok(Expr::Int(self.int_expr()?))
        }
    }

    pub(crate) fn starts_string_expr(&mut self) -> Result<bool, RezError> {
        Ok(match &self.peek()?.kind {
            TokenKind::StringLit(_) | TokenKind::HexStringLit(_) => true,
            TokenKind::RezFn(function) => function.returns_string(),
            _ => false,
        })
    }

    pub(crate) fn int_expr(&mut self) -> Result<IntExpr, RezError> {
        self.int_binary(0)
    }

    fn int_binary(&mut self, min_bp: u8) -> Result<IntExpr, RezError> {
        let left = self.int_unary()?;
        self.continue_int_binary(left, min_bp)
    }

    /// Runs the infix loop with an already-parsed left operand. Resource
    /// value parsing uses this to extend a bare symbol into an expression.
    pub(crate) fn continue_int_binary(
        &mut self,
        mut left: IntExpr,
        min_bp: u8,
    ) -> Result<IntExpr, RezError> {
        loop {
            let Some((bp, op)) = binding_power(&self.peek()?.kind) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.next()?;
            let right = self.int_binary(bp + 1)?;
            left = IntExpr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn int_unary(&mut self) -> Result<IntExpr, RezError> {
        let op = match self.peek()?.kind {
            TokenKind::Sub => Some(IntUnaryOp::Neg),
            TokenKind::Not => Some(IntUnaryOp::BoolNot),
            TokenKind::BitNot => Some(IntUnaryOp::BitNot),
            _ => None,
        };
        match op {
            Some(op) => {
                self.next()?;
                Ok(IntExpr::Unary(op, Box::new(self.int_unary()?)))
            }
            None => self.int_primary(),
        }
    }

    fn int_primary(&mut self) -> Result<IntExpr, RezError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::IntLit(base) => self.int_literal(&token, base),
            TokenKind::Keyword(keyword) => match attribute_keyword(keyword) {
                Some(attribute) => Ok(IntExpr::Attribute(attribute)),
                None => Err(self.unexpected(&token, "an integer expression")),
            },
            TokenKind::Ident => self.symbol_or_subscript(token),
            TokenKind::LeftParen => {
                let inner = self.int_expr()?;
                self.expect(TokenKind::RightParen, "`)` to close the grouped expression")?;
                Ok(inner)
            }
            TokenKind::RezFn(function) if !function.returns_string() => self.int_fn(function),
            _ => Err(self.unexpected(&token, "an integer expression")),
        }
    }

    pub(crate) fn int_literal(&mut self, token: &Token, base: IntBase) -> Result<IntExpr, RezError> {
        let text = token.text.as_str();
        let value = match base {
            IntBase::Dec => text
                .parse::<i64>()
                .map_err(|_| self.error_at(token, "integer literal out of range"))?,
            IntBase::Hex => {
                let digits = text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .or_else(|| text.strip_prefix('$'))
                    .unwrap_or(text);
                // Hex, octal and binary literals are bit patterns; they wrap
                // into the signed range rather than overflow.
                u64::from_str_radix(digits, 16)
                    .map_err(|_| self.error_at(token, "integer literal out of range"))?
                    as i64
            }
            IntBase::Oct => u64::from_str_radix(text, 8)
                .map_err(|_| self.error_at(token, "integer literal out of range"))?
                as i64,
            IntBase::Bin => {
                let digits = text
                    .strip_prefix("0b")
                    .or_else(|| text.strip_prefix("0B"))
                    .unwrap_or(text);
                u64::from_str_radix(digits, 2)
                    .map_err(|_| self.error_at(token, "integer literal out of range"))?
                    as i64
            }
            IntBase::Char => strings::decode_char_literal(text)
                .map_err(|message| self.error_at(token, message))?,
        };
        Ok(IntExpr::Literal(value))
    }

    /// An identifier in integer context: a plain symbol, or a label
    /// subscript when followed by `[`.
    pub(crate) fn symbol_or_subscript(&mut self, ident: Token) -> Result<IntExpr, RezError> {
        if self.peek()?.kind != TokenKind::LeftBracket {
            return Ok(IntExpr::Symbol(ident.text));
        }
        self.next()?;
        let mut subscripts = vec![self.int_expr()?];
        while self.eat(&TokenKind::Comma)? {
            subscripts.push(self.int_expr()?);
        }
        self.expect(TokenKind::RightBracket, "`]` to close the subscript")?;
        Ok(IntExpr::LabelSubscript {
            name: ident.text,
            subscripts,
        })
    }

    /// Optional trailing comma, then the closing paren of an argument list.
    fn finish_args(&mut self) -> Result<(), RezError> {
        self.eat(&TokenKind::Comma)?;
        self.expect(TokenKind::RightParen, "`)` to close the argument list")?;
        Ok(())
    }

    fn array_name_arg(&mut self, function: RezFn) -> Result<String, RezError> {
        self.expect(TokenKind::LeftParen, "`(`")?;
        let array = self.expect_ident(&format!("an array name in `$${}`", function.as_str()))?;
        self.finish_args()?;
        Ok(array)
    }

    fn int_arg(&mut self) -> Result<Box<IntExpr>, RezError> {
        Ok(Box::new(self.int_expr()?))
    }

    fn int_fn(&mut self, function: RezFn) -> Result<IntExpr, RezError> {
        let call = match function {
            RezFn::ArrayIndex => IntFn::ArrayIndex {
                array: self.array_name_arg(function)?,
            },
            RezFn::CountOf => IntFn::CountOf {
                array: self.array_name_arg(function)?,
            },
            RezFn::Attributes => IntFn::Attributes,
            RezFn::Id => IntFn::Id,
            RezFn::ResourceSize => IntFn::ResourceSize,
            RezFn::Type => IntFn::Type,
            RezFn::Day => IntFn::Day,
            RezFn::Hour => IntFn::Hour,
            RezFn::Minute => IntFn::Minute,
            RezFn::Month => IntFn::Month,
            RezFn::Second => IntFn::Second,
            RezFn::Weekday => IntFn::Weekday,
            RezFn::Year => IntFn::Year,
            RezFn::BitField => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let start = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let offset = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let length = self.int_arg()?;
                self.finish_args()?;
                IntFn::BitField {
                    start,
                    offset,
                    length,
                }
            }
            RezFn::Byte | RezFn::Word | RezFn::Long => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let start = self.int_arg()?;
                self.finish_args()?;
                match function {
                    RezFn::Byte => IntFn::Byte { start },
                    RezFn::Word => IntFn::Word { start },
                    _ => IntFn::Long { start },
                }
            }
            RezFn::PackedSize => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let start = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let row_bytes = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let row_count = self.int_arg()?;
                self.finish_args()?;
                IntFn::PackedSize {
                    start,
                    row_bytes,
                    row_count,
                }
            }
            // String-returning functions are filtered out by the caller.
            _ => unreachable!("{function:?} does not return an integer"),
        };
        Ok(IntExpr::Fn(call))
    }

    /// A non-empty run of string singles, concatenated.
    pub(crate) fn string_expr(&mut self) -> Result<StringExpr, RezError> {
        let mut parts = vec![self.string_single()?];
        while self.starts_string_expr()? {
            parts.push(self.string_single()?);
        }
        if parts.len() == 1 {
            Ok(parts.pop().expect("parts is non-empty"))
        } else {
            Ok(StringExpr::Concat(parts))
        }
    }

    fn string_single(&mut self) -> Result<StringExpr, RezError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::StringLit(bytes) | TokenKind::HexStringLit(bytes) => {
                Ok(StringExpr::Literal(bytes))
            }
            TokenKind::RezFn(function) if function.returns_string() => self.string_fn(function),
            _ => Err(self.unexpected(&token, "a string expression")),
        }
    }

    fn string_arg(&mut self) -> Result<Box<StringExpr>, RezError> {
        Ok(Box::new(self.string_expr()?))
    }

    fn string_fn(&mut self, function: RezFn) -> Result<StringExpr, RezError> {
        let call = match function {
            RezFn::Date => StringFn::Date,
            RezFn::Time => StringFn::Time,
            RezFn::Name => StringFn::Name,
            RezFn::Version => StringFn::Version,
            RezFn::Format => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let format = self.string_arg()?;
                let mut args = Vec::new();
                while self.eat(&TokenKind::Comma)? {
                    if self.peek()?.kind == TokenKind::RightParen {
                        break;
                    }
                    args.push(self.expression()?);
                }
                self.expect(TokenKind::RightParen, "`)` to close the argument list")?;
                StringFn::Format { format, args }
            }
            RezFn::Read => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let path = self.string_arg()?;
                self.finish_args()?;
                StringFn::Read { path }
            }
            RezFn::Shell => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let variable = self.string_arg()?;
                self.finish_args()?;
                StringFn::Shell { variable }
            }
            RezFn::Resource => {
                self.expect(TokenKind::LeftParen, "`(`")?;
                let path = self.string_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let res_type = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let id = self.int_arg()?;
                self.expect(TokenKind::Comma, "`,`")?;
                let name = self.string_arg()?;
                self.finish_args()?;
                StringFn::Resource {
                    path,
                    res_type,
                    id,
                    name,
                }
            }
            _ => unreachable!("{function:?} does not return a string"),
        };
        Ok(StringExpr::Fn(call))
    }
}
