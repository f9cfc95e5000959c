//! The preprocessor: a token-stream filter between the lexer and the parser.
//!
//! It owns the macro table, the include stack, the conditional-compilation
//! stack, the pending-expansion buffer and the enum-rewrite state machine.
//! Directive operands are computed by calling back into the parser and
//! evaluator over captured token lists, which is why this crate sits above
//! `rez-syntax` and `rez-eval` while the parser only knows the
//! [`TokenStream`] trait.

mod enums;
mod include;

use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use camino::Utf8PathBuf;
use rez_eval::{Evaluator, Value};
use rez_foundation::{
    errors::{PreprocessError, RezError, SourceLocation},
    ident::{fold, CaseInsensitive},
};
use rez_lexer::{
    macroman,
    token::{
        Directive, IfdefDirective, IfdefKind, IncludeDirective, IncludeFilename, IncludeKind,
        IntBase, Keyword, SourcePos, Token, TokenKind,
    },
    Lexer, TokenStream,
};
use rez_syntax::parse_expression_tokens;
use tracing::{debug, trace};

use enums::EnumRewrite;
pub use include::{FileSource, FsFileSource};

/// Expanding a macro while this many names are already being expanded is an
/// error; recursion is detected only by depth.
const MAX_EXPANSION_DEPTH: usize = 100;

/// A decimal integer token, used for `defined` rewrites, enum constants and
/// the predefined macros.
fn int_token(value: i64, pos: SourcePos) -> Token {
    Token {
        kind: TokenKind::IntLit(IntBase::Dec),
        text: value.to_string(),
        pos,
    }
}

/// The macro table: case-folded names to shared replacement token lists.
///
/// Replacement lists are immutable once stored, so expansions alias them
/// through `Rc` instead of cloning.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    map: HashMap<CaseInsensitive<String>, Rc<[Token]>>,
}

impl MacroTable {
    /// A table holding the four predefined macros: `true`, `false`, `rez`
    /// and `derez`. They are ordinary macros and may be redefined or
    /// undefined.
    pub fn predefined(derez: bool) -> Self {
        let mut table = Self::default();
        table.define_int("true", 1);
        table.define_int("false", 0);
        table.define_int("rez", i64::from(!derez));
        table.define_int("derez", i64::from(derez));
        table
    }

    fn define_int(&mut self, name: &str, value: i64) {
        self.define(name, vec![int_token(value, SourcePos::synthetic())]);
    }

    /// Defines or redefines a macro. Redefinition is not an error.
    pub fn define(&mut self, name: &str, replacement: Vec<Token>) {
        self.map
            .insert(CaseInsensitive::new(name.to_owned()), Rc::from(replacement));
    }

    /// Removes a macro; removing an unknown name is not an error.
    pub fn undefine(&mut self, name: &str) {
        self.map.remove(CaseInsensitive::new_ref(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(CaseInsensitive::new_ref(name))
    }

    pub fn get(&self, name: &str) -> Option<Rc<[Token]>> {
        self.map.get(CaseInsensitive::new_ref(name)).cloned()
    }
}

/// State of one conditional-compilation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IfState {
    /// Tokens pass through.
    Active,
    /// No branch of this `#if`/`#elif` chain has matched yet.
    Waiting,
    /// A branch already matched; the rest of the chain is skipped.
    Done,
    /// The enclosing conditional suppresses this block entirely.
    OuterInactive,
}

/// One entry of the include stack: a lexer over a buffered file, plus the
/// framework root when the file was found through a framework rewrite.
pub(crate) struct IncludeFrame {
    pub(crate) lexer: Lexer,
    pub(crate) framework: Option<Utf8PathBuf>,
}

/// Pending-expansion entries; `End` marks where a macro's replacement
/// finishes so the depth bookkeeping can pop the macro-name stack.
enum Pending {
    Token(Token),
    End,
}

/// Configuration for a preprocessor instance.
#[derive(Default)]
pub struct Options {
    /// Extra macros to seed the table with, on top of the predefined ones.
    pub macros: Vec<(String, Vec<Token>)>,
    /// DeRez mode: flips the predefined `rez`/`derez` macros.
    pub derez: bool,
    /// Directories searched for quoted includes, before the system path.
    pub include_path: Vec<Utf8PathBuf>,
    /// Directories searched for every include.
    pub sys_include_path: Vec<Utf8PathBuf>,
}

pub struct Preprocessor {
    pub macros: MacroTable,
    evaluator: Evaluator,
    include_stack: Vec<IncludeFrame>,
    /// Reverse stack of tokens produced by macro expansion and not yet
    /// consumed.
    expansion: Vec<Pending>,
    /// Names of all macros currently being expanded.
    macro_stack: Vec<String>,
    if_stack: Vec<IfState>,
    if_state: IfState,
    /// `(name, angled)` keys of files already pulled in; `#import` skips
    /// duplicates, `#include` always re-enters but still records the key.
    included_files: HashSet<(String, bool)>,
    enum_rewrite: EnumRewrite,
    include_path: Vec<Utf8PathBuf>,
    sys_include_path: Vec<Utf8PathBuf>,
    file_source: Box<dyn FileSource>,
    print_sink: Box<dyn FnMut(&str)>,
}

impl Preprocessor {
    pub fn new(lexer: Lexer, evaluator: Evaluator, options: Options) -> Self {
        let mut macros = MacroTable::predefined(options.derez);
        for (name, replacement) in options.macros {
            macros.define(&name, replacement);
        }
        Self {
            macros,
            evaluator,
            include_stack: vec![IncludeFrame {
                lexer,
                framework: None,
            }],
            expansion: Vec::new(),
            macro_stack: Vec::new(),
            if_stack: Vec::new(),
            if_state: IfState::Active,
            included_files: HashSet::new(),
            enum_rewrite: EnumRewrite::default(),
            include_path: options.include_path,
            sys_include_path: options.sys_include_path,
            file_source: Box::new(FsFileSource),
            print_sink: Box::new(|_| {}),
        }
    }

    /// Replaces the include-file source; the default reads from disk.
    pub fn with_file_source(mut self, file_source: Box<dyn FileSource>) -> Self {
        self.file_source = file_source;
        self
    }

    /// Replaces the `#printf` sink; the default discards output.
    pub fn with_print_sink(mut self, print_sink: Box<dyn FnMut(&str)>) -> Self {
        self.print_sink = print_sink;
        self
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    pub fn into_evaluator(self) -> Evaluator {
        self.evaluator
    }

    fn frame(&self) -> &IncludeFrame {
        self.include_stack.last().expect("include stack is never empty")
    }

    pub(crate) fn location(&self) -> SourceLocation {
        let lexer = &self.frame().lexer;
        SourceLocation::new(&**lexer.filename(), lexer.line())
    }

    fn current_pos(&self) -> SourcePos {
        let lexer = &self.frame().lexer;
        SourcePos {
            file: Rc::clone(lexer.filename()),
            line: lexer.line(),
            offset: 0,
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> RezError {
        PreprocessError::at(message, self.location()).into()
    }

    /// Pulls one token from the pending-expansion buffer or the current
    /// include frame, expanding macros unless `expand` is false (used when
    /// a token's identity matters, as in `defined`).
    fn next_raw(&mut self, expand: bool) -> Result<Token, RezError> {
        loop {
            let token = match self.expansion.pop() {
                Some(Pending::End) => {
                    self.macro_stack.pop();
                    continue;
                }
                Some(Pending::Token(token)) => token,
                None => {
                    let frame = self
                        .include_stack
                        .last_mut()
                        .expect("include stack is never empty");
                    let token = frame.lexer.next_token()?;
                    if token.kind == TokenKind::EndOfFile && self.include_stack.len() > 1 {
                        self.include_stack.pop();
                        continue;
                    }
                    token
                }
            };
            if token.kind == TokenKind::Ident
                && expand
                && matches!(self.if_state, IfState::Active | IfState::Waiting)
            {
                if let Some(replacement) = self.macros.get(&token.text) {
                    if self.macro_stack.len() >= MAX_EXPANSION_DEPTH {
                        return Err(self.error(format!(
                            "maximum macro expansion depth ({MAX_EXPANSION_DEPTH}) exceeded \
                             while expanding `{}`",
                            token.text
                        )));
                    }
                    self.expansion.push(Pending::End);
                    for replacement_token in replacement.iter().rev() {
                        self.expansion.push(Pending::Token(replacement_token.clone()));
                    }
                    self.macro_stack.push(fold(&token.text));
                    continue;
                }
            }
            return Ok(token);
        }
    }

    /// Parses and evaluates a captured token list.
    pub(crate) fn eval_tokens(&mut self, tokens: Vec<Token>) -> Result<Value, RezError> {
        let fallback = tokens
            .first()
            .map(|token| token.pos.clone())
            .unwrap_or_else(|| self.current_pos());
        let expr = parse_expression_tokens(tokens, fallback)?;
        Ok(self.evaluator.eval(&expr)?)
    }

    pub(crate) fn eval_int_tokens(&mut self, tokens: Vec<Token>) -> Result<i64, RezError> {
        match self.eval_tokens(tokens)? {
            Value::Int(value) => Ok(value),
            Value::Bytes(_) => Err(self.error("expected an integer expression")),
        }
    }

    /// Collects directive operand tokens up to a newline, `;`, or end of
    /// input. For `#if`/`#elif` the pseudo-operator `defined` is rewritten
    /// to a `1`/`0` literal here.
    fn collect_operand_tokens(&mut self, rewrite_defined: bool) -> Result<Vec<Token>, RezError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_raw(true)?;
            match &token.kind {
                TokenKind::Newline | TokenKind::Semi | TokenKind::EndOfFile => break,
                TokenKind::Keyword(Keyword::Defined) if rewrite_defined => {
                    let defined = self.defined_operand()?;
                    tokens.push(int_token(i64::from(defined), token.pos));
                }
                _ => tokens.push(token),
            }
        }
        Ok(tokens)
    }

    /// `defined NAME` or `defined(NAME)`; the name is read without macro
    /// expansion.
    fn defined_operand(&mut self) -> Result<bool, RezError> {
        let token = self.next_raw(false)?;
        let name = if token.kind == TokenKind::LeftParen {
            let name_token = self.next_raw(false)?;
            let name = self.defined_name(&name_token)?;
            let close = self.next_raw(false)?;
            if close.kind != TokenKind::RightParen {
                return Err(self.error(format!(
                    "expected `)` after the name in `defined`, got {}",
                    close.describe()
                )));
            }
            name
        } else {
            self.defined_name(&token)?
        };
        Ok(self.macros.contains(&name))
    }

    fn defined_name(&self, token: &Token) -> Result<String, RezError> {
        // Keywords are accepted too, mirroring the lenient reference
        // behavior; they can never actually be defined.
        match &token.kind {
            TokenKind::Ident | TokenKind::Keyword(_) => Ok(token.text.clone()),
            _ => Err(self.error(format!(
                "expected an identifier after `defined`, got {}",
                token.describe()
            ))),
        }
    }

    fn eval_condition(&mut self) -> Result<bool, RezError> {
        let tokens = self.collect_operand_tokens(true)?;
        Ok(self.eval_tokens(tokens)?.truthy())
    }

    fn handle_if(&mut self) -> Result<(), RezError> {
        if self.if_state != IfState::Active {
            self.if_stack.push(self.if_state);
            self.if_state = IfState::OuterInactive;
            // The condition tokens fall through to the inactive skip.
            return Ok(());
        }
        let condition = self.eval_condition()?;
        self.if_stack.push(self.if_state);
        self.if_state = if condition {
            IfState::Active
        } else {
            IfState::Waiting
        };
        Ok(())
    }

    fn handle_elif(&mut self) -> Result<(), RezError> {
        if self.if_stack.is_empty() {
            return Err(self.error("#elif outside of a conditional block"));
        }
        match self.if_state {
            // The condition tokens are discarded by the inactive skip.
            IfState::Done | IfState::OuterInactive => Ok(()),
            IfState::Active => {
                self.if_state = IfState::Done;
                Ok(())
            }
            IfState::Waiting => {
                if self.eval_condition()? {
                    self.if_state = IfState::Active;
                }
                Ok(())
            }
        }
    }

    fn handle_ifdef(&mut self, ifdef: &IfdefDirective) {
        let defined = self.macros.contains(&ifdef.name);
        let condition = defined ^ (ifdef.kind == IfdefKind::Ifndef);
        let enclosing = self.if_state;
        self.if_stack.push(enclosing);
        self.if_state = if enclosing != IfState::Active {
            IfState::OuterInactive
        } else if condition {
            IfState::Active
        } else {
            IfState::Waiting
        };
    }

    fn handle_else(&mut self) -> Result<(), RezError> {
        if self.if_stack.is_empty() {
            return Err(self.error("#else outside of a conditional block"));
        }
        match self.if_state {
            IfState::OuterInactive => {}
            IfState::Waiting => self.if_state = IfState::Active,
            _ => self.if_state = IfState::Done,
        }
        Ok(())
    }

    fn handle_endif(&mut self) -> Result<(), RezError> {
        match self.if_stack.pop() {
            Some(state) => {
                self.if_state = state;
                Ok(())
            }
            None => Err(self.error("#endif outside of a conditional block")),
        }
    }

    fn handle_include(&mut self, include: &IncludeDirective) -> Result<(), RezError> {
        let (name, angled) = match &include.filename {
            IncludeFilename::Angled(name) => (name.clone(), true),
            IncludeFilename::Tokens(tokens) => {
                if tokens.is_empty() {
                    // An include whose filename expression is empty (the
                    // sequence was cut short by a stray terminator)
                    // silently does nothing.
                    return Ok(());
                }
                match self.eval_tokens(tokens.clone())? {
                    Value::Bytes(bytes) => (macroman::decode(&bytes), false),
                    Value::Int(_) => {
                        return Err(self.error("include path must be a string expression"))
                    }
                }
            }
        };
        let once = include.kind == IncludeKind::Import;
        if once && self.included_files.contains(&(name.clone(), angled)) {
            trace!(file = %name, "skipping already-imported file");
            return Ok(());
        }
        self.included_files.insert((name.clone(), angled));
        let frame = self.resolve_include(&name, angled)?;
        debug!(file = %name, depth = self.include_stack.len(), "entering include file");
        self.include_stack.push(frame);
        Ok(())
    }

    fn handle_printf(&mut self) -> Result<(), RezError> {
        let tokens = self.collect_operand_tokens(false)?;
        if tokens.is_empty() {
            return Err(self.error("missing arguments after #printf"));
        }
        if tokens[0].kind != TokenKind::LeftParen {
            return Err(self.error(format!(
                "expected `(` after #printf, got {}",
                tokens[0].describe()
            )));
        }
        if tokens[tokens.len() - 1].kind != TokenKind::RightParen {
            return Err(self.error("expected `)` to end the #printf argument list"));
        }

        // Split on top-level commas, respecting paren nesting.
        let mut args: Vec<Vec<Token>> = vec![Vec::new()];
        let mut depth = 0i32;
        for token in &tokens[1..tokens.len() - 1] {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(self.error("unmatched `)` in the #printf argument list"));
                    }
                }
                TokenKind::Comma if depth == 0 => {
                    args.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            args.last_mut().expect("args is never empty").push(token.clone());
        }
        if depth > 0 {
            return Err(self.error("unmatched `(` in the #printf argument list"));
        }
        if args.last().is_some_and(Vec::is_empty) {
            args.pop();
        }
        if args.is_empty() {
            return Err(self.error("#printf needs at least one argument"));
        }
        if args.len() > 20 {
            return Err(self.error(format!(
                "#printf got {} arguments, the maximum is 20",
                args.len()
            )));
        }

        let values = args
            .into_iter()
            .map(|arg| self.eval_tokens(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let Value::Bytes(format) = &values[0] else {
            return Err(self.error("the #printf format must be a string expression"));
        };
        let rendered = self.evaluator.format(format, &values[1..])?;
        let text = macroman::decode(&rendered);
        (self.print_sink)(&text);
        Ok(())
    }
}

impl TokenStream for Preprocessor {
    fn next_token(&mut self) -> Result<Token, RezError> {
        loop {
            let token = self.next_raw(true)?;
            match &token.kind {
                TokenKind::Directive(directive) => match directive {
                    Directive::If => self.handle_if()?,
                    Directive::Elif => self.handle_elif()?,
                    Directive::Ifdef(ifdef) => self.handle_ifdef(ifdef),
                    Directive::Else => self.handle_else()?,
                    Directive::Endif => self.handle_endif()?,
                    Directive::Empty => {}
                    _ if self.if_state != IfState::Active => {}
                    Directive::Define(define) => {
                        trace!(name = %define.name, "#define");
                        self.macros.define(&define.name, define.replacement.clone());
                    }
                    Directive::Undef { name } => self.macros.undefine(name),
                    Directive::Include(include) => self.handle_include(include)?,
                    Directive::Printf => self.handle_printf()?,
                },
                TokenKind::Newline => {}
                TokenKind::EndOfFile => return Ok(token),
                _ if self.if_state != IfState::Active => {}
                TokenKind::Keyword(Keyword::Enum) => {
                    self.enum_begin()?;
                    return Ok(token);
                }
                _ if self.enum_rewrite.is_active() => {
                    self.enum_step(&token)?;
                    return Ok(token);
                }
                _ => return Ok(token),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, rc::Rc};

    use camino::Utf8Path;
    use indoc::indoc;
    use rez_eval::HostHooks;
    use rez_foundation::errors::EvalError;
    use rez_syntax::{
        ast::{File, IntExpr, Statement},
        Parser,
    };

    use super::*;

    struct MapFileSource {
        files: HashMap<Utf8PathBuf, String>,
    }

    impl MapFileSource {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                files: entries
                    .iter()
                    .map(|(path, content)| (Utf8PathBuf::from(path), (*content).to_owned()))
                    .collect(),
            }
        }
    }

    impl FileSource for MapFileSource {
        fn read(&mut self, path: &Utf8Path) -> io::Result<Option<String>> {
            Ok(self.files.get(path).cloned())
        }
    }

    fn preprocessor(source: &str) -> Preprocessor {
        Preprocessor::new(
            Lexer::new("main.r", source),
            Evaluator::default(),
            Options::default(),
        )
    }

    fn drain(mut preprocessor: Preprocessor) -> Result<Vec<Token>, RezError> {
        let mut tokens = Vec::new();
        loop {
            let token = preprocessor.next_token()?;
            if token.kind == TokenKind::EndOfFile {
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|token| token.text.as_str()).collect()
    }

    fn parse(preprocessor: Preprocessor) -> Result<(File, Preprocessor), RezError> {
        let mut parser = Parser::new(preprocessor);
        let file = parser.parse_file()?;
        Ok((file, parser.into_tokens()))
    }

    fn resource_id(file: &File, index: usize) -> &IntExpr {
        let Statement::Resource(resource) = &file.statements[index] else {
            panic!("expected a resource statement, got {:?}", file.statements[index]);
        };
        &resource.spec.id
    }

    fn macro_text(preprocessor: &Preprocessor, name: &str) -> String {
        let replacement = preprocessor
            .macros
            .get(name)
            .unwrap_or_else(|| panic!("macro `{name}` is not defined"));
        replacement
            .iter()
            .map(|token| token.text.clone())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn macros_expand_where_the_identifier_stood() {
        let (file, _) = parse(preprocessor(indoc! {"
            #define N 3
            resource 'TYPE' (N*10) { };
        "}))
        .expect("pipeline error");
        let mut evaluator = Evaluator::default();
        assert_eq!(evaluator.eval_int(resource_id(&file, 0)).unwrap(), 30);
    }

    #[test]
    fn macro_names_fold_case() {
        let (file, _) = parse(preprocessor(indoc! {"
            #define Foo 1
            resource 'CASE' (FOO + foo + fOo) { };
        "}))
        .expect("pipeline error");
        let mut evaluator = Evaluator::default();
        assert_eq!(evaluator.eval_int(resource_id(&file, 0)).unwrap(), 3);
    }

    #[test]
    fn predefined_macros_follow_the_mode() {
        let (file, _) = parse(preprocessor(indoc! {"
            #if rez && true && !derez && !false
            resource 'MODE' (1) { };
            #endif
        "}))
        .expect("pipeline error");
        assert_eq!(file.statements.len(), 1);

        let derez = Preprocessor::new(
            Lexer::new("main.r", "#if derez\nresource 'MODE' (2) { };\n#endif\n"),
            Evaluator::default(),
            Options {
                derez: true,
                ..Options::default()
            },
        );
        let (file, _) = parse(derez).expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn enum_constants_become_macros() {
        let (file, preprocessor) = parse(preprocessor(indoc! {"
            enum sizes { A, B = 5, C, D };
        "}))
        .expect("pipeline error");
        assert_eq!(macro_text(&preprocessor, "A"), "0");
        assert_eq!(macro_text(&preprocessor, "b"), "5");
        assert_eq!(macro_text(&preprocessor, "C"), "6");
        assert_eq!(macro_text(&preprocessor, "D"), "7");
        // The syntactic enum still reaches the AST.
        let [Statement::Enum(enum_stmt)] = &file.statements[..] else {
            panic!("expected an enum statement");
        };
        assert_eq!(enum_stmt.constants.len(), 4);
    }

    #[test]
    fn enum_values_resolve_in_later_statements() {
        let (file, _) = parse(preprocessor(indoc! {"
            enum { A, B = 10, C };
            resource 'X' (C) { };
        "}))
        .expect("pipeline error");
        assert_eq!(resource_id(&file, 1), &IntExpr::Literal(11));
    }

    #[test]
    fn enum_explicit_value_at_closing_brace() {
        let (_, preprocessor) = parse(preprocessor("enum { A = 2 + 3 };\n")).expect("pipeline error");
        assert_eq!(macro_text(&preprocessor, "a"), "5");
    }

    #[test]
    fn enum_counter_can_go_negative() {
        let (_, preprocessor) =
            parse(preprocessor("enum { A = -2, B, C };\n")).expect("pipeline error");
        assert_eq!(macro_text(&preprocessor, "a"), "-2");
        assert_eq!(macro_text(&preprocessor, "b"), "-1");
        assert_eq!(macro_text(&preprocessor, "c"), "0");
    }

    #[test]
    fn nested_enums_are_rejected() {
        assert!(drain(preprocessor("enum { enum };\n")).is_err());
    }

    #[test]
    fn inactive_blocks_never_reach_the_parser() {
        let (file, _) = parse(preprocessor(indoc! {"
            #ifdef NOPE
            junk junk ; ) {
            #endif
            type 'X' { byte; };
        "}))
        .expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
        assert!(matches!(&file.statements[0], Statement::Type(_)));
    }

    #[test]
    fn elif_chains_pick_the_first_truthy_branch_once() {
        let tokens = drain(preprocessor(indoc! {"
            #if 0
            one
            #elif 1
            two
            #elif 1
            three
            #else
            four
            #endif
        "}))
        .expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["two"]);
    }

    #[test]
    fn else_runs_when_no_branch_matched() {
        let tokens = drain(preprocessor(indoc! {"
            #if 0
            a
            #else
            b
            #endif
        "}))
        .expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["b"]);
    }

    #[test]
    fn conditionals_nest_inside_inactive_blocks() {
        let tokens = drain(preprocessor(indoc! {"
            #if 0
            #if 1
            a
            #endif
            b
            #endif
            c
        "}))
        .expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["c"]);
    }

    #[test]
    fn a_semicolon_ends_a_condition() {
        let tokens = drain(preprocessor("#if 1; kept\n#endif\n")).expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["kept"]);
    }

    #[test]
    fn unbalanced_conditionals_are_errors() {
        assert!(drain(preprocessor("#endif\n")).is_err());
        assert!(drain(preprocessor("#else\n")).is_err());
        assert!(drain(preprocessor("#elif 1\n")).is_err());
    }

    #[test]
    fn recursive_macros_hit_the_depth_bound() {
        let error = drain(preprocessor("#define A A\nA\n")).expect_err("should overflow");
        assert!(error.to_string().contains("expansion depth"));
    }

    #[test]
    fn defined_reads_its_operand_without_expansion() {
        // `X` expands to `defined(Y)` but is never used; the `#ifdef` must
        // simply test whether `Y` is a macro.
        let (file, _) = parse(preprocessor(indoc! {"
            #define X defined(Y)
            #ifdef Y
            junk (
            #endif
            type 'T' { byte; };
        "}))
        .expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn defined_with_and_without_parens() {
        let tokens = drain(preprocessor(indoc! {"
            #define FOO 1
            #if defined FOO && defined(FOO)
            yes
            #endif
            #if defined(BAR)
            no
            #endif
        "}))
        .expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["yes"]);
    }

    #[test]
    fn undef_removes_a_macro_silently() {
        let tokens = drain(preprocessor(indoc! {"
            #define A 1
            #undef A
            #undef A
            A
        "}))
        .expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["A"]);
    }

    #[test]
    fn define_replacement_may_contain_whole_statements() {
        let (file, _) = parse(preprocessor(indoc! {"
            #define STMT type 'q   ' { byte; };
            STMT
        "}))
        .expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn import_is_idempotent_include_is_not() {
        let options = || Options {
            include_path: vec![Utf8PathBuf::from("inc")],
            ..Options::default()
        };
        let files: &[(&str, &str)] = &[("inc/h.r", "type 'H   ' { byte; };\n")];

        let imported = Preprocessor::new(
            Lexer::new("main.r", "#import \"h.r\"\n#import \"h.r\"\n"),
            Evaluator::default(),
            options(),
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        let (file, _) = parse(imported).expect("pipeline error");
        assert_eq!(file.statements.len(), 1);

        let included = Preprocessor::new(
            Lexer::new("main.r", "#include \"h.r\"\n#include \"h.r\"\n"),
            Evaluator::default(),
            options(),
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        let (file, _) = parse(included).expect("pipeline error");
        assert_eq!(file.statements.len(), 2);
    }

    #[test]
    fn include_search_order() {
        // Angled includes skip the user include path.
        let files: &[(&str, &str)] = &[
            ("inc/only.r", "resource 'USER' (1) { };\n"),
            ("sys/shared.r", "resource 'SYS ' (2) { };\n"),
        ];
        let options = || Options {
            include_path: vec![Utf8PathBuf::from("inc")],
            sys_include_path: vec![Utf8PathBuf::from("sys")],
            ..Options::default()
        };

        let quoted = Preprocessor::new(
            Lexer::new("main.r", "#include \"only.r\"\n#include <shared.r>\n"),
            Evaluator::default(),
            options(),
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        let (file, _) = parse(quoted).expect("pipeline error");
        assert_eq!(file.statements.len(), 2);

        let angled = Preprocessor::new(
            Lexer::new("main.r", "#include <only.r>\n"),
            Evaluator::default(),
            options(),
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        assert!(parse(angled).is_err(), "angled includes skip the user path");
    }

    #[test]
    fn framework_includes_nest() {
        let files: &[(&str, &str)] = &[
            (
                "fw/Carbon.framework/Headers/Carbon.r",
                "#include <HIToolbox/HIToolbox.r>\n",
            ),
            (
                "fw/Carbon.framework/Frameworks/HIToolbox.framework/Headers/HIToolbox.r",
                "type 'HITB' { byte; };\n",
            ),
        ];
        let preprocessor = Preprocessor::new(
            Lexer::new("main.r", "#include <Carbon/Carbon.r>\n"),
            Evaluator::default(),
            Options {
                sys_include_path: vec![Utf8PathBuf::from("fw")],
                ..Options::default()
            },
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        let (file, _) = parse(preprocessor).expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn missing_include_is_an_error() {
        let error = drain(preprocessor("#include <nowhere.r>\n")).expect_err("should fail");
        assert!(error.to_string().contains("nowhere.r"));
    }

    #[test]
    fn empty_quoted_include_silently_no_ops() {
        let (file, _) = parse(preprocessor("#include ;\ntype 'T' { byte; };\n"))
            .expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn quoted_include_filenames_do_not_expand_macros() {
        let preprocessor = preprocessor("#define F \"h.r\"\n#include F\n");
        assert!(drain(preprocessor).is_err(), "identifier in include path");
    }

    #[test]
    fn quoted_include_concatenates_string_expressions() {
        let files: &[(&str, &str)] = &[("inc/h.r", "type 'H   ' { byte; };\n")];
        let preprocessor = Preprocessor::new(
            Lexer::new("main.r", "#include \"h\" \".r\";\n"),
            Evaluator::default(),
            Options {
                include_path: vec![Utf8PathBuf::from("inc")],
                ..Options::default()
            },
        )
        .with_file_source(Box::new(MapFileSource::new(files)));
        let (file, _) = parse(preprocessor).expect("pipeline error");
        assert_eq!(file.statements.len(), 1);
    }

    struct EchoHooks;

    impl HostHooks for EchoHooks {
        fn format(&mut self, format: &[u8], args: &[Value]) -> Result<Vec<u8>, EvalError> {
            let mut out = format.to_vec();
            for arg in args {
                out.push(b' ');
                match arg {
                    Value::Int(value) => out.extend(value.to_string().into_bytes()),
                    Value::Bytes(bytes) => out.extend_from_slice(bytes),
                }
            }
            Ok(out)
        }
    }

    fn printf_preprocessor(source: &str, printed: Rc<RefCell<Vec<String>>>) -> Preprocessor {
        Preprocessor::new(
            Lexer::new("main.r", source),
            Evaluator::new(Box::new(EchoHooks)),
            Options::default(),
        )
        .with_print_sink(Box::new(move |text| printed.borrow_mut().push(text.to_owned())))
    }

    #[test]
    fn printf_formats_through_the_evaluator_hook() {
        let printed = Rc::new(RefCell::new(Vec::new()));
        let tokens = drain(printf_preprocessor(
            "#printf(\"count: %d\", 2 + 3)\n",
            Rc::clone(&printed),
        ))
        .expect("preprocess error");
        assert!(tokens.is_empty(), "#printf never emits tokens");
        assert_eq!(*printed.borrow(), vec![String::from("count: %d 5")]);
    }

    #[test]
    fn printf_keeps_parenthesized_arguments_intact() {
        let printed = Rc::new(RefCell::new(Vec::new()));
        drain(printf_preprocessor(
            "#printf(\"x\", (1 + 2) * 3)\n",
            Rc::clone(&printed),
        ))
        .expect("preprocess error");
        assert_eq!(*printed.borrow(), vec![String::from("x 9")]);
    }

    #[test]
    fn printf_argument_count_is_bounded() {
        let printed = Rc::new(RefCell::new(Vec::new()));
        let mut source = String::from("#printf(\"f\"");
        for i in 0..20 {
            source.push_str(&format!(", {i}"));
        }
        source.push_str(")\n");
        assert!(
            drain(printf_preprocessor(&source, Rc::clone(&printed))).is_err(),
            "21 arguments"
        );
        assert!(drain(printf_preprocessor("#printf 1\n", printed)).is_err(), "missing parens");
    }

    #[test]
    fn newlines_never_reach_the_parser() {
        let tokens = drain(preprocessor("a\nb\n\nc\n")).expect("preprocess error");
        assert_eq!(texts(&tokens), vec!["a", "b", "c"]);
    }

    #[test]
    fn a_realistic_file_round_trips_through_the_whole_pipeline() {
        let header = indoc! {r#"
            #ifndef __MENUS_R__
            #define __MENUS_R__
            type 'MENU' {
                integer;
                fill word;
                array items {
                    pstring;
                    byte;
                };
            };
            enum { kFileMenuID = 128, kEditMenuID };
            #endif
        "#};
        let main = indoc! {r#"
            #include "menus.r"
            #include "menus.r"
            #if kEditMenuID > kFileMenuID
            resource 'MENU' (kEditMenuID, "Edit", preload) {
                257,
                { "Undo", 0; "Redo", 0; }
            };
            #endif
        "#};
        let preprocessor = Preprocessor::new(
            Lexer::new("main.r", main),
            Evaluator::default(),
            Options {
                include_path: vec![Utf8PathBuf::from("headers")],
                ..Options::default()
            },
        )
        .with_file_source(Box::new(MapFileSource::new(&[("headers/menus.r", header)])));
        let (file, preprocessor) = parse(preprocessor).expect("pipeline error");

        // The header's type declaration arrives twice (#include re-enters,
        // and the guard macro suppresses the second body), the enum once,
        // and the guarded resource once.
        assert_eq!(file.statements.len(), 3);
        assert!(matches!(&file.statements[0], Statement::Type(_)));
        assert!(matches!(&file.statements[1], Statement::Enum(_)));
        let Statement::Resource(resource) = &file.statements[2] else {
            panic!("expected a resource statement");
        };
        assert_eq!(resource.spec.id, IntExpr::Literal(129));
        assert_eq!(resource.values.len(), 2);
        assert_eq!(macro_text(&preprocessor, "kFileMenuID"), "128");
        assert_eq!(macro_text(&preprocessor, "kEditMenuID"), "129");
    }
}
