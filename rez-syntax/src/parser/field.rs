//! Field declarations inside `type` statements.

use rez_foundation::errors::RezError;
use rez_lexer::{
    token::{Keyword, Token, TokenKind},
    TokenStream,
};

use super::Parser;
use crate::ast::{
    AlignField, AlignUnit, ArrayField, Field, FillField, FillUnit, NumericBase, NumericFieldType,
    NumericKind, SimpleField, SimpleFieldType, StringFieldType, StringFormat, StringKind,
    SwitchCase, SwitchField, SymbolicConstant,
};

fn is_modifier(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::Key
            | Keyword::Unsigned
            | Keyword::Binary
            | Keyword::Octal
            | Keyword::Decimal
            | Keyword::Hex
            | Keyword::Literal
    )
}

impl<T> Parser<T>
where
    T: TokenStream,
{
    /// A run of field declarations, ended by `}` or the next `case`.
    pub(crate) fn fields(&mut self) -> Result<Vec<Field>, RezError> {
        let mut fields = Vec::new();
        loop {
            match self.peek_kind()? {
                TokenKind::RightBrace | TokenKind::EndOfFile => break,
                TokenKind::Keyword(Keyword::Case) => break,
                TokenKind::Ident => {
                    let name = self.next()?.text;
                    self.expect(TokenKind::Colon, "`:` after the label name")?;
                    fields.push(Field::Label(name));
                }
                _ => {
                    let field = self.field()?;
                    fields.push(field);
                }
            }
        }
        Ok(fields)
    }

    fn field(&mut self) -> Result<Field, RezError> {
        let TokenKind::Keyword(keyword) = self.peek_kind()? else {
            let token = self.next()?;
            return Err(self.unexpected(&token, "a field declaration"));
        };
        match keyword {
            Keyword::Fill => self.fill_field(),
            Keyword::Align => self.align_field(),
            Keyword::Array | Keyword::Wide => self.array_field(),
            Keyword::Switch => self.switch_field(),
            _ => self.simple_field(),
        }
    }

    fn field_end(&mut self) -> Result<(), RezError> {
        self.expect(TokenKind::Semi, "`;` to end the field")?;
        Ok(())
    }

    fn fill_field(&mut self) -> Result<Field, RezError> {
        self.next()?;
        let token = self.next()?;
        let unit = match token.kind {
            TokenKind::Keyword(Keyword::Bit) => FillUnit::Bit,
            TokenKind::Keyword(Keyword::Nibble) => FillUnit::Nibble,
            TokenKind::Keyword(Keyword::Byte) => FillUnit::Byte,
            TokenKind::Keyword(Keyword::Word) => FillUnit::Word,
            TokenKind::Keyword(Keyword::Long) => FillUnit::Long,
            _ => {
                return Err(
                    self.unexpected(&token, "a fill unit (bit, nibble, byte, word, long)")
                )
            }
        };
        let count = if self.eat(&TokenKind::LeftBracket)? {
            let count = self.int_expr()?;
            self.expect(TokenKind::RightBracket, "`]`")?;
            Some(count)
        } else {
            None
        };
        self.field_end()?;
        Ok(Field::Fill(FillField { unit, count }))
    }

    fn align_field(&mut self) -> Result<Field, RezError> {
        self.next()?;
        let token = self.next()?;
        let unit = match token.kind {
            TokenKind::Keyword(Keyword::Nibble) => AlignUnit::Nibble,
            TokenKind::Keyword(Keyword::Byte) => AlignUnit::Byte,
            TokenKind::Keyword(Keyword::Word) => AlignUnit::Word,
            TokenKind::Keyword(Keyword::Long) => AlignUnit::Long,
            _ => {
                return Err(
                    self.unexpected(&token, "an align unit (nibble, byte, word, long)")
                )
            }
        };
        self.field_end()?;
        Ok(Field::Align(AlignField { unit }))
    }

    fn array_field(&mut self) -> Result<Field, RezError> {
        let mut wide = false;
        while self.eat(&TokenKind::Keyword(Keyword::Wide))? {
            wide = true;
        }
        self.expect(TokenKind::Keyword(Keyword::Array), "`array`")?;
        let mut label = None;
        let mut count = None;
        if self.peek()?.kind == TokenKind::Ident {
            label = Some(self.next()?.text);
        } else if self.eat(&TokenKind::LeftBracket)? {
            count = Some(self.int_expr()?);
            self.expect(TokenKind::RightBracket, "`]`")?;
        }
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let fields = self.fields()?;
        self.expect(TokenKind::RightBrace, "`}` to close the array")?;
        self.field_end()?;
        Ok(Field::Array(ArrayField {
            wide,
            label,
            count,
            fields,
        }))
    }

    fn switch_field(&mut self) -> Result<Field, RezError> {
        self.next()?;
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let mut cases = Vec::new();
        while self.eat(&TokenKind::Keyword(Keyword::Case))? {
            let label_token = self.next()?;
            if label_token.kind != TokenKind::Ident {
                return Err(self.unexpected(&label_token, "a case name"));
            }
            self.expect(TokenKind::Colon, "`:` after the case name")?;
            let fields = self.fields()?;
            let key_count = fields
                .iter()
                .filter(|field| matches!(field, Field::Simple(simple) if simple.is_key))
                .count();
            if key_count != 1 {
                return Err(self.error_at(
                    &label_token,
                    format!(
                        "switch case `{}` must declare exactly one `key` field, found {key_count}",
                        label_token.text
                    ),
                ));
            }
            cases.push(SwitchCase {
                label: label_token.text,
                fields,
            });
        }
        self.expect(TokenKind::RightBrace, "`}` to close the switch")?;
        self.field_end()?;
        Ok(Field::Switch(SwitchField { cases }))
    }

    fn simple_field(&mut self) -> Result<Field, RezError> {
        let mut modifiers: Vec<(Keyword, Token)> = Vec::new();
        while let TokenKind::Keyword(keyword) = self.peek_kind()? {
            if !is_modifier(keyword) {
                break;
            }
            let token = self.next()?;
            if modifiers.iter().any(|(seen, _)| *seen == keyword) {
                return Err(self.error_at(
                    &token,
                    format!("duplicate field modifier `{}`", keyword.as_str()),
                ));
            }
            modifiers.push((keyword, token));
        }

        let type_token = self.next()?;
        let TokenKind::Keyword(keyword) = type_token.kind else {
            return Err(self.unexpected(&type_token, "a field type"));
        };
        let mut field_type = match keyword {
            Keyword::Boolean => SimpleFieldType::Boolean,
            Keyword::Bitstring => {
                self.expect(TokenKind::LeftBracket, "`[` and a bit width")?;
                let size = self.int_expr()?;
                self.expect(TokenKind::RightBracket, "`]`")?;
                SimpleFieldType::Numeric(NumericFieldType {
                    signed: true,
                    base: NumericBase::Decimal,
                    kind: NumericKind::Bitstring,
                    size: Some(size),
                })
            }
            Keyword::Byte | Keyword::Integer | Keyword::Longint => {
                SimpleFieldType::Numeric(NumericFieldType {
                    signed: true,
                    base: NumericBase::Decimal,
                    kind: match keyword {
                        Keyword::Byte => NumericKind::Byte,
                        Keyword::Integer => NumericKind::Integer,
                        _ => NumericKind::Longint,
                    },
                    size: None,
                })
            }
            Keyword::Char => SimpleFieldType::Char,
            Keyword::String | Keyword::Cstring | Keyword::Pstring | Keyword::Wstring => {
                let length = if self.eat(&TokenKind::LeftBracket)? {
                    let length = self.int_expr()?;
                    self.expect(TokenKind::RightBracket, "`]`")?;
                    Some(length)
                } else {
                    None
                };
                SimpleFieldType::String(StringFieldType {
                    format: StringFormat::Literal,
                    kind: match keyword {
                        Keyword::String => StringKind::String,
                        Keyword::Cstring => StringKind::Cstring,
                        Keyword::Pstring => StringKind::Pstring,
                        _ => StringKind::Wstring,
                    },
                    length,
                })
            }
            Keyword::Point => SimpleFieldType::Point,
            Keyword::Rect => SimpleFieldType::Rect,
            _ => return Err(self.unexpected(&type_token, "a field type")),
        };

        let mut is_key = false;
        let mut base_modifier = false;
        for (keyword, token) in &modifiers {
            match keyword {
                Keyword::Key => is_key = true,
                Keyword::Unsigned => match &mut field_type {
                    SimpleFieldType::Numeric(numeric) => numeric.signed = false,
                    _ => {
                        return Err(self.error_at(
                            token,
                            "`unsigned` is only valid on bitstring, byte, integer and longint fields",
                        ))
                    }
                },
                Keyword::Hex => match &mut field_type {
                    SimpleFieldType::Numeric(numeric) => {
                        self.set_base(numeric, NumericBase::Hex, &mut base_modifier, token)?
                    }
                    SimpleFieldType::String(string) if string.kind == StringKind::String => {
                        string.format = StringFormat::Hex
                    }
                    _ => {
                        return Err(self.error_at(
                            token,
                            "`hex` is only valid on numeric fields and plain `string`",
                        ))
                    }
                },
                Keyword::Binary | Keyword::Octal | Keyword::Decimal | Keyword::Literal => {
                    let base = match keyword {
                        Keyword::Binary => NumericBase::Binary,
                        Keyword::Octal => NumericBase::Octal,
                        Keyword::Decimal => NumericBase::Decimal,
                        _ => NumericBase::Literal,
                    };
                    match &mut field_type {
                        SimpleFieldType::Numeric(numeric) => {
                            self.set_base(numeric, base, &mut base_modifier, token)?
                        }
                        _ => {
                            return Err(self.error_at(
                                token,
                                format!(
                                    "`{}` is only valid on numeric fields",
                                    keyword.as_str()
                                ),
                            ))
                        }
                    }
                }
                _ => unreachable!("non-modifier keyword collected"),
            }
        }

        let mut value = None;
        let mut symbolic_constants = Vec::new();
        if self.eat(&TokenKind::Assign)? {
            value = Some(self.resource_value()?);
        } else if self.peek()?.kind == TokenKind::Ident {
            symbolic_constants = self.symbolic_constants()?;
        }
        self.field_end()?;
        Ok(Field::Simple(SimpleField {
            field_type,
            value,
            symbolic_constants,
            is_key,
        }))
    }

    fn set_base(
        &self,
        numeric: &mut NumericFieldType,
        base: NumericBase,
        base_modifier: &mut bool,
        token: &Token,
    ) -> Result<(), RezError> {
        if *base_modifier {
            return Err(self.error_at(token, "conflicting display base modifiers"));
        }
        numeric.base = base;
        *base_modifier = true;
        Ok(())
    }

    fn symbolic_constants(&mut self) -> Result<Vec<SymbolicConstant>, RezError> {
        let mut constants = Vec::new();
        loop {
            if self.peek()?.kind != TokenKind::Ident {
                break;
            }
            let name = self.next()?.text;
            let value = if self.eat(&TokenKind::Assign)? {
                Some(self.resource_value()?)
            } else {
                None
            };
            constants.push(SymbolicConstant { name, value });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(constants)
    }
}
