mod expr;
mod field;
mod stmt;

use std::collections::VecDeque;

use rez_foundation::errors::{ParseError, RezError};
use rez_lexer::{
    token::{SourcePos, Token, TokenKind},
    TokenListCursor, TokenStream,
};
use tracing::trace;

use crate::ast::{Expr, File};

/// Recursive-descent parser over any token source.
///
/// The token source is a type parameter so the same grammar runs against the
/// live preprocessor and against captured token lists; see
/// [`parse_expression_tokens`].
pub struct Parser<T> {
    tokens: T,
    peeked: VecDeque<Token>,
}

impl<T> Parser<T>
where
    T: TokenStream,
{
    pub fn new(tokens: T) -> Self {
        Self {
            tokens,
            peeked: VecDeque::with_capacity(2),
        }
    }

    /// Hands the token source back, e.g. to recover a preprocessor.
    pub fn into_tokens(self) -> T {
        self.tokens
    }

    pub(crate) fn next(&mut self) -> Result<Token, RezError> {
        match self.peeked.pop_front() {
            Some(token) => Ok(token),
            None => self.tokens.next_token(),
        }
    }

    pub(crate) fn peek(&mut self) -> Result<&Token, RezError> {
        self.fill(1)?;
        Ok(&self.peeked[0])
    }

    /// Second token of lookahead; only the `ident {` switch-value form
    /// needs it.
    pub(crate) fn peek2(&mut self) -> Result<&Token, RezError> {
        self.fill(2)?;
        Ok(&self.peeked[1])
    }

    /// Clones the next token's kind without consuming it, releasing the
    /// lookahead borrow so callers can keep parsing inside a match.
    pub(crate) fn peek_kind(&mut self) -> Result<TokenKind, RezError> {
        Ok(self.peek()?.kind.clone())
    }

    fn fill(&mut self, depth: usize) -> Result<(), RezError> {
        while self.peeked.len() < depth {
            let token = self.tokens.next_token()?;
            self.peeked.push_back(token);
        }
        Ok(())
    }

    /// Consumes the next token if it has exactly this kind.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> Result<bool, RezError> {
        if &self.peek()?.kind == kind {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, RezError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, what))
        }
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> Result<String, RezError> {
        let token = self.next()?;
        if token.kind == TokenKind::Ident {
            Ok(token.text)
        } else {
            Err(self.unexpected(&token, what))
        }
    }

    pub(crate) fn error_at(&self, token: &Token, message: impl Into<String>) -> RezError {
        ParseError::at(message, token.pos.location()).into()
    }

    pub(crate) fn unexpected(&self, token: &Token, expected: &str) -> RezError {
        self.error_at(token, format!("expected {expected}, got {}", token.describe()))
    }

    /// Parses a whole file: statements until end of input.
    pub fn parse_file(&mut self) -> Result<File, RezError> {
        trace!("parsing file");
        self.file()
    }

    /// Parses a single expression, leaving any following tokens unread.
    pub fn parse_expression(&mut self) -> Result<Expr, RezError> {
        self.expression()
    }
}

/// Runs the expression grammar over a captured token list and requires the
/// list to be fully consumed.
///
/// `fallback` positions "unexpected end" diagnostics when the list is empty.
pub fn parse_expression_tokens(
    tokens: Vec<Token>,
    fallback: SourcePos,
) -> Result<Expr, RezError> {
    let mut parser = Parser::new(TokenListCursor::new(tokens, fallback));
    let expr = parser.parse_expression()?;
    let next = parser.next()?;
    if next.kind != TokenKind::EndOfFile {
        return Err(parser.unexpected(&next, "end of expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rez_lexer::Lexer;

    use super::*;
    use crate::ast::*;

    fn parser_for(source: &str) -> Parser<TokenListCursor> {
        let mut lexer = Lexer::new("test.r", source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex error");
            match token.kind {
                TokenKind::EndOfFile => break,
                // The preprocessor consumes newlines before the parser ever
                // sees them; these tests feed the parser directly.
                TokenKind::Newline => continue,
                _ => tokens.push(token),
            }
        }
        Parser::new(TokenListCursor::new(tokens, SourcePos::synthetic()))
    }

    fn parse_file(source: &str) -> File {
        parser_for(source).parse_file().expect("parse error")
    }

    fn parse_int(source: &str) -> IntExpr {
        match parser_for(source).parse_expression().expect("parse error") {
            Expr::Int(expr) => expr,
            Expr::Str(expr) => panic!("expected an int expression, got {expr:?}"),
        }
    }

    fn literal(value: i64) -> Box<IntExpr> {
        Box::new(IntExpr::Literal(value))
    }

    #[test]
    fn char_literals_pack_big_endian() {
        assert_eq!(parse_int("'ABCD'"), IntExpr::Literal(0x41424344));
        assert_eq!(parse_int("'A'"), IntExpr::Literal(0x41));
    }

    #[test]
    fn literal_bases() {
        assert_eq!(parse_int("0x1F"), IntExpr::Literal(31));
        assert_eq!(parse_int("$1F"), IntExpr::Literal(31));
        assert_eq!(parse_int("017"), IntExpr::Literal(15));
        assert_eq!(parse_int("0b101"), IntExpr::Literal(5));
        assert_eq!(
            parse_int("$FFFFFFFFFFFFFFFF"),
            IntExpr::Literal(-1),
            "hex literals are bit patterns"
        );
    }

    #[test]
    fn precedence_ladder() {
        assert_eq!(
            parse_int("1 + 2 * 3"),
            IntExpr::Binary(
                IntBinaryOp::Add,
                literal(1),
                Box::new(IntExpr::Binary(IntBinaryOp::Mul, literal(2), literal(3))),
            )
        );
        assert_eq!(
            parse_int("1 << 2 + 3"),
            IntExpr::Binary(
                IntBinaryOp::Shl,
                literal(1),
                Box::new(IntExpr::Binary(IntBinaryOp::Add, literal(2), literal(3))),
            )
        );
        assert_eq!(
            parse_int("1 - 2 - 3"),
            IntExpr::Binary(
                IntBinaryOp::Sub,
                Box::new(IntExpr::Binary(IntBinaryOp::Sub, literal(1), literal(2))),
                literal(3),
            ),
            "binary operators are left-associative"
        );
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        assert_eq!(
            parse_int("-1 * 2"),
            IntExpr::Binary(
                IntBinaryOp::Mul,
                Box::new(IntExpr::Unary(IntUnaryOp::Neg, literal(1))),
                literal(2),
            )
        );
    }

    #[test]
    fn label_subscripts() {
        assert_eq!(
            parse_int("counts[1, 2]"),
            IntExpr::LabelSubscript {
                name: String::from("counts"),
                subscripts: vec![IntExpr::Literal(1), IntExpr::Literal(2)],
            }
        );
        assert_eq!(parse_int("counts"), IntExpr::Symbol(String::from("counts")));
    }

    #[test]
    fn string_concatenation() {
        let expr = parser_for(r#""a" $"42" $$Version"#)
            .parse_expression()
            .expect("parse error");
        assert_eq!(
            expr,
            Expr::Str(StringExpr::Concat(vec![
                StringExpr::Literal(b"a".to_vec()),
                StringExpr::Literal(vec![0x42]),
                StringExpr::Fn(StringFn::Version),
            ]))
        );
    }

    #[test]
    fn a_single_string_literal_is_not_a_concat() {
        let expr = parser_for(r#""alone""#).parse_expression().expect("parse error");
        assert_eq!(expr, Expr::Str(StringExpr::Literal(b"alone".to_vec())));
    }

    #[test]
    fn rez_function_arities() {
        assert_eq!(
            parse_int("$$BitField(label, 0, 4)"),
            IntExpr::Fn(IntFn::BitField {
                start: Box::new(IntExpr::Symbol(String::from("label"))),
                offset: literal(0),
                length: literal(4),
            })
        );
        assert_eq!(
            parse_int("$$CountOf(parts,)"),
            IntExpr::Fn(IntFn::CountOf {
                array: String::from("parts"),
            }),
            "a trailing comma is allowed before `)`"
        );
        assert!(parser_for("$$Byte()").parse_expression().is_err());
    }

    #[test]
    fn resource_statement_with_spec() {
        let file = parse_file(indoc! {r#"
            resource 'MENU' (128, "File", preload, locked) {
                "New", 5,
            };
        "#});
        let [Statement::Resource(resource)] = &file.statements[..] else {
            panic!("expected one resource statement, got {file:?}");
        };
        assert_eq!(resource.spec.res_type, IntExpr::Literal(0x4D454E55));
        assert_eq!(resource.spec.id, IntExpr::Literal(128));
        assert_eq!(
            resource.spec.name,
            Some(StringExpr::Literal(b"File".to_vec()))
        );
        assert_eq!(
            resource.spec.attributes,
            ResourceAttributes::Named(vec![
                ResourceAttribute::Preload,
                ResourceAttribute::Locked,
            ])
        );
        assert_eq!(
            resource.values,
            vec![
                ResourceValue::Expr(Expr::Str(StringExpr::Literal(b"New".to_vec()))),
                ResourceValue::Expr(Expr::Int(IntExpr::Literal(5))),
            ]
        );
    }

    #[test]
    fn resource_spec_attributes_as_expression() {
        let file = parse_file("resource 'XXXX' (0, preload | locked) { };");
        let [Statement::Resource(resource)] = &file.statements[..] else {
            panic!("expected one resource statement");
        };
        assert_eq!(
            resource.spec.attributes,
            ResourceAttributes::Expr(IntExpr::Binary(
                IntBinaryOp::BitOr,
                Box::new(IntExpr::Attribute(ResourceAttribute::Preload)),
                Box::new(IntExpr::Attribute(ResourceAttribute::Locked)),
            ))
        );
    }

    #[test]
    fn type_statement_fields() {
        let file = parse_file(indoc! {"
            type 'DEMO' {
                start:
                byte;
                unsigned hex integer = 0xFF;
                cstring[16];
                fill word;
                align long;
                array entries {
                    integer;
                };
            };
        "});
        let [Statement::Type(type_stmt)] = &file.statements[..] else {
            panic!("expected one type statement");
        };
        let TypeBody::Fields(fields) = &type_stmt.body else {
            panic!("expected a field list");
        };
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], Field::Label(String::from("start")));
        assert_eq!(
            fields[1],
            Field::Simple(SimpleField {
                field_type: SimpleFieldType::Numeric(NumericFieldType {
                    signed: true,
                    base: NumericBase::Decimal,
                    kind: NumericKind::Byte,
                    size: None,
                }),
                value: None,
                symbolic_constants: vec![],
                is_key: false,
            })
        );
        assert_eq!(
            fields[2],
            Field::Simple(SimpleField {
                field_type: SimpleFieldType::Numeric(NumericFieldType {
                    signed: false,
                    base: NumericBase::Hex,
                    kind: NumericKind::Integer,
                    size: None,
                }),
                value: Some(ResourceValue::Expr(Expr::Int(IntExpr::Literal(255)))),
                symbolic_constants: vec![],
                is_key: false,
            })
        );
        assert_eq!(
            fields[3],
            Field::Simple(SimpleField {
                field_type: SimpleFieldType::String(StringFieldType {
                    format: StringFormat::Literal,
                    kind: StringKind::Cstring,
                    length: Some(IntExpr::Literal(16)),
                }),
                value: None,
                symbolic_constants: vec![],
                is_key: false,
            })
        );
        assert_eq!(
            fields[4],
            Field::Fill(FillField {
                unit: FillUnit::Word,
                count: None,
            })
        );
        assert_eq!(fields[5], Field::Align(AlignField { unit: AlignUnit::Long }));
        let Field::Array(array) = &fields[6] else {
            panic!("expected an array field");
        };
        assert_eq!(array.label.as_deref(), Some("entries"));
        assert_eq!(array.count, None);
        assert!(!array.wide);
    }

    #[test]
    fn switch_fields_require_exactly_one_key() {
        let file = parse_file(indoc! {"
            type 'DLOG' {
                switch {
                    case ok:
                        key integer = 1;
                        pstring;
                    case cancel:
                        key integer = 2;
                };
            };
        "});
        let [Statement::Type(type_stmt)] = &file.statements[..] else {
            panic!("expected one type statement");
        };
        let TypeBody::Fields(fields) = &type_stmt.body else {
            panic!("expected a field list");
        };
        let Field::Switch(switch) = &fields[0] else {
            panic!("expected a switch field");
        };
        assert_eq!(switch.cases.len(), 2);
        assert_eq!(switch.cases[0].label, "ok");

        let keyless = indoc! {"
            type 'DLOG' {
                switch {
                    case broken:
                        integer;
                };
            };
        "};
        assert!(parser_for(keyless).parse_file().is_err());
    }

    #[test]
    fn symbolic_constants_on_fields() {
        let file = parse_file("type 'BOOL' { boolean yes = 1, no = 0; };");
        let [Statement::Type(type_stmt)] = &file.statements[..] else {
            panic!("expected one type statement");
        };
        let TypeBody::Fields(fields) = &type_stmt.body else {
            panic!("expected fields");
        };
        let Field::Simple(simple) = &fields[0] else {
            panic!("expected a simple field");
        };
        assert_eq!(simple.value, None);
        assert_eq!(
            simple.symbolic_constants,
            vec![
                SymbolicConstant {
                    name: String::from("yes"),
                    value: Some(ResourceValue::Expr(Expr::Int(IntExpr::Literal(1)))),
                },
                SymbolicConstant {
                    name: String::from("no"),
                    value: Some(ResourceValue::Expr(Expr::Int(IntExpr::Literal(0)))),
                },
            ]
        );
    }

    #[test]
    fn duplicate_and_misplaced_modifiers_are_rejected() {
        assert!(parser_for("type 'T' { hex hex integer; };").parse_file().is_err());
        assert!(parser_for("type 'T' { unsigned cstring; };").parse_file().is_err());
        assert!(parser_for("type 'T' { hex cstring; };").parse_file().is_err());
        assert!(parser_for("type 'T' { octal hex integer; };").parse_file().is_err());
    }

    #[test]
    fn type_alias() {
        let file = parse_file("type 'ALRT' (128) as 'DLOG' (129);");
        let [Statement::Type(type_stmt)] = &file.statements[..] else {
            panic!("expected one type statement");
        };
        assert_eq!(
            type_stmt.spec.id,
            Some(TypeDefId::Single(IntExpr::Literal(128)))
        );
        assert_eq!(
            type_stmt.body,
            TypeBody::Alias(ResourceSpecTypeUse {
                res_type: IntExpr::Literal(0x444C4F47),
                id: Some(IntExpr::Literal(129)),
            })
        );
    }

    #[test]
    fn include_statement_shapes() {
        let file = parse_file(indoc! {r#"
            include "every.rsrc";
            include "icons.rsrc" 'ICON' (128);
            include "all-but.rsrc" not 'CODE';
            include "retype.rsrc" 'ICON' as 'cicn';
            include "respec.rsrc" 'DLOG' (1) as 'DLOG' (2, "Copy", purgeable);
        "#});
        assert_eq!(file.statements.len(), 5);
        let Statement::Include(plain) = &file.statements[0] else {
            panic!("expected include");
        };
        assert!(plain.from_spec.is_none() && plain.to_spec.is_none());
        let Statement::Include(inverted) = &file.statements[2] else {
            panic!("expected include");
        };
        assert!(matches!(inverted.from_spec, Some(IncludeFrom::Not(_))));
        let Statement::Include(retype) = &file.statements[3] else {
            panic!("expected include");
        };
        assert!(matches!(retype.to_spec, Some(IncludeTo::Type(_))));
        let Statement::Include(respec) = &file.statements[4] else {
            panic!("expected include");
        };
        assert!(matches!(respec.to_spec, Some(IncludeTo::Def(_))));
    }

    #[test]
    fn change_data_delete_read_statements() {
        let file = parse_file(indoc! {r#"
            change 'STR ' (128) to 'STR ' (129);
            data 'junk' (0) { $"DEADBEEF" };
            delete 'STR ' (0:100);
            read 'SND ' (5000) "bark.snd";
        "#});
        assert_eq!(file.statements.len(), 4);
        assert!(matches!(&file.statements[0], Statement::Change(_)));
        let Statement::Data(data) = &file.statements[1] else {
            panic!("expected data");
        };
        assert_eq!(
            data.value,
            Some(StringExpr::Literal(vec![0xDE, 0xAD, 0xBE, 0xEF]))
        );
        let Statement::Delete(delete) = &file.statements[2] else {
            panic!("expected delete");
        };
        assert!(matches!(
            delete.spec.id_or_name,
            Some(IdOrName::Range(_))
        ));
        assert!(matches!(&file.statements[3], Statement::Read(_)));
    }

    #[test]
    fn enum_statement_records_syntax() {
        let file = parse_file("enum sizes { small, medium = 10, large };");
        let [Statement::Enum(enum_stmt)] = &file.statements[..] else {
            panic!("expected an enum statement");
        };
        assert_eq!(enum_stmt.name.as_deref(), Some("sizes"));
        assert_eq!(
            enum_stmt.constants,
            vec![
                EnumConstant {
                    name: String::from("small"),
                    value: None,
                },
                EnumConstant {
                    name: String::from("medium"),
                    value: Some(IntExpr::Literal(10)),
                },
                EnumConstant {
                    name: String::from("large"),
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn array_values_group_on_semicolons() {
        let file = parse_file("resource 'LIST' (1) { { 1, 2; 3, 4; } };");
        let [Statement::Resource(resource)] = &file.statements[..] else {
            panic!("expected a resource statement");
        };
        assert_eq!(
            resource.values,
            vec![ResourceValue::Array(vec![
                vec![
                    ResourceValue::Expr(Expr::Int(IntExpr::Literal(1))),
                    ResourceValue::Expr(Expr::Int(IntExpr::Literal(2))),
                ],
                vec![
                    ResourceValue::Expr(Expr::Int(IntExpr::Literal(3))),
                    ResourceValue::Expr(Expr::Int(IntExpr::Literal(4))),
                ],
            ])]
        );
    }

    #[test]
    fn switch_and_symbol_values() {
        let file = parse_file("resource 'DITL' (1) { ok { 1, done }, flags };");
        let [Statement::Resource(resource)] = &file.statements[..] else {
            panic!("expected a resource statement");
        };
        assert_eq!(
            resource.values,
            vec![
                ResourceValue::Switch {
                    label: String::from("ok"),
                    values: vec![
                        ResourceValue::Expr(Expr::Int(IntExpr::Literal(1))),
                        ResourceValue::Symbol(String::from("done")),
                    ],
                },
                ResourceValue::Symbol(String::from("flags")),
            ]
        );
    }

    #[test]
    fn symbol_values_extend_into_expressions() {
        let file = parse_file("resource 'CNT ' (1) { total + 1 };");
        let [Statement::Resource(resource)] = &file.statements[..] else {
            panic!("expected a resource statement");
        };
        assert_eq!(
            resource.values,
            vec![ResourceValue::Expr(Expr::Int(IntExpr::Binary(
                IntBinaryOp::Add,
                Box::new(IntExpr::Symbol(String::from("total"))),
                literal(1),
            )))]
        );
    }

    #[test]
    fn stray_semicolons_are_allowed_between_statements() {
        let file = parse_file(";; resource 'a   ' (1) { };;");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn expression_entry_rejects_trailing_tokens() {
        let mut lexer = Lexer::new("test.r", "1 + 2 3");
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::EndOfFile {
                break;
            }
            tokens.push(token);
        }
        assert!(parse_expression_tokens(tokens, SourcePos::synthetic()).is_err());
    }

    #[test]
    fn defined_is_not_an_expression() {
        assert!(parser_for("defined(x)").parse_expression().is_err());
    }
}
