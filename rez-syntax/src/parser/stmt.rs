//! Statement-level grammar: the eight top-level statements, resource specs,
//! and resource values.

use rez_foundation::errors::RezError;
use rez_lexer::{
    token::{Keyword, TokenKind},
    TokenStream,
};

use super::Parser;
use crate::ast::{
    Change, Data, Delete, EnumConstant, EnumStmt, Expr, File, IdOrName, IdRange, IncludeFrom,
    IncludeStmt, IncludeTo, IntExpr, ReadStmt, ResourceAttributes, ResourceSpecDef,
    ResourceSpecTypeDef, ResourceSpecTypeUse, ResourceSpecUse, ResourceStmt, ResourceValue,
    Statement, TypeBody, TypeDefId, TypeStmt,
};

impl<T> Parser<T>
where
    T: TokenStream,
{
    pub(crate) fn file(&mut self) -> Result<File, RezError> {
        let mut statements = Vec::new();
        loop {
            let keyword = match self.peek_kind()? {
                TokenKind::EndOfFile => break,
                // A stray semicolon is a valid (empty) statement.
                TokenKind::Semi => {
                    self.next()?;
                    continue;
                }
                TokenKind::Keyword(keyword) => keyword,
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "a statement"));
                }
            };
            let statement = match keyword {
                Keyword::Change => Statement::Change(self.change_statement()?),
                Keyword::Data => Statement::Data(self.data_statement()?),
                Keyword::Delete => Statement::Delete(self.delete_statement()?),
                Keyword::Enum => Statement::Enum(self.enum_statement()?),
                Keyword::Include => Statement::Include(self.include_statement()?),
                Keyword::Read => Statement::Read(self.read_statement()?),
                Keyword::Resource => Statement::Resource(self.resource_statement()?),
                Keyword::Type => Statement::Type(self.type_statement()?),
                _ => {
                    let token = self.next()?;
                    return Err(self.unexpected(&token, "a statement"));
                }
            };
            statements.push(statement);
        }
        Ok(File { statements })
    }

    fn statement_end(&mut self) -> Result<(), RezError> {
        self.expect(TokenKind::Semi, "`;` to end the statement")?;
        Ok(())
    }

    fn change_statement(&mut self) -> Result<Change, RezError> {
        self.next()?;
        let from_spec = self.resource_spec_use()?;
        self.expect(TokenKind::Keyword(Keyword::To), "`to`")?;
        let to_spec = self.resource_spec_def()?;
        self.statement_end()?;
        Ok(Change { from_spec, to_spec })
    }

    fn data_statement(&mut self) -> Result<Data, RezError> {
        self.next()?;
        let spec = self.resource_spec_def()?;
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let value = if self.starts_string_expr()? {
            Some(self.string_expr()?)
        } else {
            None
        };
        self.eat(&TokenKind::Semi)?;
        self.expect(TokenKind::RightBrace, "`}`")?;
        self.statement_end()?;
        Ok(Data { spec, value })
    }

    fn delete_statement(&mut self) -> Result<Delete, RezError> {
        self.next()?;
        let spec = self.resource_spec_use()?;
        self.statement_end()?;
        Ok(Delete { spec })
    }

    fn enum_statement(&mut self) -> Result<EnumStmt, RezError> {
        self.next()?;
        let name = if self.peek()?.kind == TokenKind::Ident {
            Some(self.next()?.text)
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let mut constants = Vec::new();
        loop {
            if self.peek()?.kind == TokenKind::RightBrace {
                break;
            }
            let constant_name = self.expect_ident("an enum constant name")?;
            let value = if self.eat(&TokenKind::Assign)? {
                Some(self.int_expr()?)
            } else {
                None
            };
            constants.push(EnumConstant {
                name: constant_name,
                value,
            });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RightBrace, "`}` to close the enum")?;
        self.statement_end()?;
        Ok(EnumStmt { name, constants })
    }

    fn include_statement(&mut self) -> Result<IncludeStmt, RezError> {
        self.next()?;
        let path = self.string_expr()?;
        let (from_spec, to_spec) = match self.peek_kind()? {
            TokenKind::Semi => (None, None),
            TokenKind::Keyword(Keyword::Not) => {
                self.next()?;
                (Some(IncludeFrom::Not(self.int_expr()?)), None)
            }
            _ => {
                let use_spec = self.resource_spec_use()?;
                let to_spec = if self.eat(&TokenKind::Keyword(Keyword::As))? {
                    let res_type = self.int_expr()?;
                    if self.peek()?.kind == TokenKind::LeftParen {
                        Some(IncludeTo::Def(self.finish_resource_spec_def(res_type)?))
                    } else {
                        Some(IncludeTo::Type(res_type))
                    }
                } else {
                    None
                };
                (Some(IncludeFrom::Use(use_spec)), to_spec)
            }
        };
        self.statement_end()?;
        Ok(IncludeStmt {
            path,
            from_spec,
            to_spec,
        })
    }

    fn read_statement(&mut self) -> Result<ReadStmt, RezError> {
        self.next()?;
        let spec = self.resource_spec_def()?;
        let path = self.string_expr()?;
        self.statement_end()?;
        Ok(ReadStmt { spec, path })
    }

    fn resource_statement(&mut self) -> Result<ResourceStmt, RezError> {
        self.next()?;
        let spec = self.resource_spec_def()?;
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let values = self.resource_values()?;
        self.eat(&TokenKind::Semi)?;
        self.expect(TokenKind::RightBrace, "`}` to close the resource body")?;
        self.statement_end()?;
        Ok(ResourceStmt { spec, values })
    }

    fn type_statement(&mut self) -> Result<TypeStmt, RezError> {
        self.next()?;
        let spec = self.resource_spec_typedef()?;
        let body = if self.eat(&TokenKind::Keyword(Keyword::As))? {
            let res_type = self.int_expr()?;
            let id = if self.eat(&TokenKind::LeftParen)? {
                let id = self.int_expr()?;
                self.expect(TokenKind::RightParen, "`)`")?;
                Some(id)
            } else {
                None
            };
            TypeBody::Alias(ResourceSpecTypeUse { res_type, id })
        } else {
            self.expect(TokenKind::LeftBrace, "`{` or `as`")?;
            let fields = self.fields()?;
            self.expect(TokenKind::RightBrace, "`}` to close the field list")?;
            TypeBody::Fields(fields)
        };
        self.statement_end()?;
        Ok(TypeStmt { spec, body })
    }

    fn resource_spec_typedef(&mut self) -> Result<ResourceSpecTypeDef, RezError> {
        let res_type = self.int_expr()?;
        let id = if self.eat(&TokenKind::LeftParen)? {
            let begin = self.int_expr()?;
            let id = if self.eat(&TokenKind::Colon)? {
                TypeDefId::Range(IdRange {
                    begin,
                    end: self.int_expr()?,
                })
            } else {
                TypeDefId::Single(begin)
            };
            self.expect(TokenKind::RightParen, "`)`")?;
            Some(id)
        } else {
            None
        };
        Ok(ResourceSpecTypeDef { res_type, id })
    }

    pub(crate) fn resource_spec_use(&mut self) -> Result<ResourceSpecUse, RezError> {
        let res_type = self.int_expr()?;
        let id_or_name = if self.eat(&TokenKind::LeftParen)? {
            let id_or_name = if self.starts_string_expr()? {
                IdOrName::Name(self.string_expr()?)
            } else {
                let begin = self.int_expr()?;
                if self.eat(&TokenKind::Colon)? {
                    IdOrName::Range(IdRange {
                        begin,
                        end: self.int_expr()?,
                    })
                } else {
                    IdOrName::Id(begin)
                }
            };
            self.expect(TokenKind::RightParen, "`)`")?;
            Some(id_or_name)
        } else {
            None
        };
        Ok(ResourceSpecUse {
            res_type,
            id_or_name,
        })
    }

    fn resource_spec_def(&mut self) -> Result<ResourceSpecDef, RezError> {
        let res_type = self.int_expr()?;
        self.finish_resource_spec_def(res_type)
    }

    /// Parses the parenthesized tail of a def spec; the type expression has
    /// already been consumed.
    pub(crate) fn finish_resource_spec_def(
        &mut self,
        res_type: IntExpr,
    ) -> Result<ResourceSpecDef, RezError> {
        self.expect(TokenKind::LeftParen, "`(`")?;
        let id = self.int_expr()?;
        let mut name = None;
        let mut attributes = ResourceAttributes::default();
        if self.eat(&TokenKind::Comma)? {
            if self.starts_string_expr()? {
                name = Some(self.string_expr()?);
                if self.eat(&TokenKind::Comma)? {
                    attributes = self.resource_attributes()?;
                }
            } else {
                attributes = self.resource_attributes()?;
            }
        }
        self.expect(TokenKind::RightParen, "`)` to close the resource spec")?;
        Ok(ResourceSpecDef {
            res_type,
            id,
            name,
            attributes,
        })
    }

    /// Either a comma-separated list of attribute names, or one arbitrary
    /// integer expression.
    fn resource_attributes(&mut self) -> Result<ResourceAttributes, RezError> {
        let first = self.int_expr()?;
        let at_list_boundary = matches!(
            self.peek()?.kind,
            TokenKind::Comma | TokenKind::RightParen
        );
        match first {
            IntExpr::Attribute(attribute) if at_list_boundary => {
                let mut named = vec![attribute];
                while self.eat(&TokenKind::Comma)? {
                    let expr = self.int_expr()?;
                    let IntExpr::Attribute(attribute) = expr else {
                        let token = self.peek()?.clone();
                        return Err(self.error_at(
                            &token,
                            "a resource attribute list may only contain attribute names",
                        ));
                    };
                    named.push(attribute);
                }
                Ok(ResourceAttributes::Named(named))
            }
            expr => Ok(ResourceAttributes::Expr(expr)),
        }
    }

    /// A comma-separated run of resource values, possibly empty, with an
    /// optional trailing comma.
    pub(crate) fn resource_values(&mut self) -> Result<Vec<ResourceValue>, RezError> {
        let mut values = Vec::new();
        loop {
            if matches!(
                self.peek()?.kind,
                TokenKind::RightBrace | TokenKind::Semi | TokenKind::EndOfFile
            ) {
                break;
            }
            values.push(self.resource_value()?);
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(values)
    }

    pub(crate) fn resource_value(&mut self) -> Result<ResourceValue, RezError> {
        match self.peek_kind()? {
            TokenKind::LeftBrace => self.array_value(),
            TokenKind::Ident => {
                if self.peek2()?.kind == TokenKind::LeftBrace {
                    // `caseName { values }` selects a switch case.
                    let label = self.next()?.text;
                    self.next()?;
                    let values = self.resource_values()?;
                    self.eat(&TokenKind::Semi)?;
                    self.expect(TokenKind::RightBrace, "`}` to close the switch value")?;
                    return Ok(ResourceValue::Switch { label, values });
                }
                // A bare symbol, or an integer expression that starts with
                // one.
                let ident = self.next()?;
                let primary = self.symbol_or_subscript(ident)?;
                match self.continue_int_binary(primary, 0)? {
                    IntExpr::Symbol(name) => Ok(ResourceValue::Symbol(name)),
                    expr => Ok(ResourceValue::Expr(Expr::Int(expr))),
                }
            }
            _ => Ok(ResourceValue::Expr(self.expression()?)),
        }
    }

    /// `{ group; group; … }` where each group is a comma-separated value
    /// run. Groups hold whole array iterations.
    fn array_value(&mut self) -> Result<ResourceValue, RezError> {
        self.expect(TokenKind::LeftBrace, "`{`")?;
        let mut groups = Vec::new();
        if self.peek()?.kind != TokenKind::RightBrace {
            loop {
                groups.push(self.resource_values()?);
                if !self.eat(&TokenKind::Semi)? {
                    break;
                }
                if self.peek()?.kind == TokenKind::RightBrace {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightBrace, "`}` to close the array value")?;
        Ok(ResourceValue::Array(groups))
    }
}
