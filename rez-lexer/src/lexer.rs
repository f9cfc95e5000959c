use std::rc::Rc;

use rez_foundation::errors::{LexError, RezError, SourceLocation};

use crate::{
    strings,
    token::{
        DefineDirective, Directive, IfdefDirective, IfdefKind, IncludeDirective, IncludeFilename,
        IncludeKind, IntBase, Keyword, RezFn, SourcePos, Token, TokenKind,
    },
    token_stream::TokenStream,
};

/// The character-walking lexer over one buffered source file.
///
/// Directive lines are recognized here: the lexer classifies the word after
/// `#` and, for the directives with structured operands, runs a sub-lexer
/// over the remainder of the line to build the token's payload.
#[derive(Debug)]
pub struct Lexer {
    filename: Rc<str>,
    input: Rc<str>,
    position: usize,
    line: u32,
    /// False until the first token or comment on the current line. A `#`
    /// starts a directive only while this is false.
    line_has_tokens: bool,
}

impl Lexer {
    pub fn new(filename: impl Into<Rc<str>>, source: &str) -> Self {
        Self {
            filename: filename.into(),
            // A backslash at end of line is a continuation, removed before
            // any tokenization.
            input: Rc::from(source.replace("\\\n", "")),
            position: 0,
            line: 1,
            line_has_tokens: false,
        }
    }

    pub fn filename(&self) -> &Rc<str> {
        &self.filename
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// A fresh lexer over directive operand text, positioned at the parent's
    /// line for diagnostics.
    fn sublexer(&self, text: &str) -> Lexer {
        Lexer {
            filename: Rc::clone(&self.filename),
            input: Rc::from(text),
            position: 0,
            line: self.line,
            line_has_tokens: true,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.position += c.len_utf8();
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(' ' | '\t') = self.current_char() {
            self.advance_char();
        }
    }

    fn discard_line(&mut self) {
        while !matches!(self.current_char(), None | Some('\n')) {
            self.advance_char();
        }
    }

    fn take_ident(&mut self) -> String {
        let start = self.position;
        if let Some('a'..='z' | 'A'..='Z' | '_') = self.current_char() {
            self.advance_char();
            while let Some('a'..='z' | 'A'..='Z' | '0'..='9' | '_') = self.current_char() {
                self.advance_char();
            }
        }
        self.input[start..self.position].to_owned()
    }

    fn error(&self, message: impl Into<String>) -> RezError {
        LexError::at(message, SourceLocation::new(&*self.filename, self.line)).into()
    }

    fn make(&self, kind: TokenKind, start: usize, line: u32) -> Token {
        Token {
            kind,
            text: self.input[start..self.position].to_owned(),
            pos: SourcePos {
                file: Rc::clone(&self.filename),
                line,
                offset: start,
            },
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance_char();
        kind
    }

    fn single_or_double(&mut self, kind: TokenKind, second: char, double_kind: TokenKind) -> TokenKind {
        self.advance_char();
        if self.current_char() == Some(second) {
            self.advance_char();
            double_kind
        } else {
            kind
        }
    }

    fn block_comment(&mut self) -> Result<(), RezError> {
        self.advance_char();
        self.advance_char();
        loop {
            match self.current_char() {
                None => return Err(self.error("block comment is missing its `*/` terminator")),
                Some('*') if self.peek_char() == Some('/') => {
                    self.advance_char();
                    self.advance_char();
                    return Ok(());
                }
                Some('\n') => {
                    self.line += 1;
                    self.advance_char();
                }
                _ => self.advance_char(),
            }
        }
    }

    fn identifier(&mut self, start: usize, line: u32) -> Token {
        let ident = self.take_ident();
        let kind = match Keyword::from_ident(&ident) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident,
        };
        self.make(kind, start, line)
    }

    fn number(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        let base = if self.current_char() == Some('0') {
            self.advance_char();
            match self.current_char() {
                Some('x' | 'X') => {
                    self.advance_char();
                    if self.take_digits(16) == 0 {
                        return Err(self.error("expected hex digits after `0x`"));
                    }
                    IntBase::Hex
                }
                Some('b' | 'B') => {
                    self.advance_char();
                    if self.take_digits(2) == 0 {
                        return Err(self.error("expected binary digits after `0b`"));
                    }
                    IntBase::Bin
                }
                Some('0'..='9') => {
                    // A leading zero means octal; digits 8 and 9 demote the
                    // literal back to decimal.
                    let mut octal = true;
                    while let Some(c @ '0'..='9') = self.current_char() {
                        octal &= c <= '7';
                        self.advance_char();
                    }
                    if octal {
                        IntBase::Oct
                    } else {
                        IntBase::Dec
                    }
                }
                _ => IntBase::Dec,
            }
        } else {
            self.take_digits(10);
            IntBase::Dec
        };
        Ok(self.make(TokenKind::IntLit(base), start, line))
    }

    fn take_digits(&mut self, radix: u32) -> usize {
        let mut count = 0;
        while self.current_char().is_some_and(|c| c.is_digit(radix)) {
            self.advance_char();
            count += 1;
        }
        count
    }

    /// Scans a quoted literal body, escape-aware, up to `quote`. Returns the
    /// byte range of the body and leaves the position after the close quote.
    fn quoted_body(&mut self, quote: char, what: &str) -> Result<(usize, usize), RezError> {
        self.advance_char();
        let body_start = self.position;
        loop {
            match self.current_char() {
                None | Some('\n') => {
                    return Err(self.error(format!("{what} is missing its closing quote")))
                }
                Some('\\') => {
                    self.advance_char();
                    if self.current_char().is_none() {
                        return Err(self.error(format!("{what} is missing its closing quote")));
                    }
                    self.advance_char();
                }
                Some(c) if c == quote => break,
                _ => self.advance_char(),
            }
        }
        let body_end = self.position;
        self.advance_char();
        Ok((body_start, body_end))
    }

    fn string_literal(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        let (body_start, body_end) = self.quoted_body('"', "string literal")?;
        let input = Rc::clone(&self.input);
        let bytes =
            strings::decode_escapes(&input[body_start..body_end]).map_err(|m| self.error(m))?;
        Ok(self.make(TokenKind::StringLit(bytes), start, line))
    }

    fn char_literal(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        let (body_start, body_end) = self.quoted_body('\'', "character literal")?;
        // Validate the escapes now; the parser decodes the value later.
        let input = Rc::clone(&self.input);
        strings::decode_escapes(&input[body_start..body_end]).map_err(|m| self.error(m))?;
        Ok(self.make(TokenKind::IntLit(IntBase::Char), start, line))
    }

    fn hex_string_literal(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        self.advance_char();
        let mut bytes = Vec::new();
        let mut pending: Option<u32> = None;
        loop {
            match self.current_char() {
                Some(' ' | '\t') => self.advance_char(),
                Some('"') => {
                    self.advance_char();
                    break;
                }
                Some(c) if c.is_ascii_hexdigit() => {
                    let digit = c.to_digit(16).unwrap();
                    match pending.take() {
                        Some(high) => bytes.push((high * 16 + digit) as u8),
                        None => pending = Some(digit),
                    }
                    self.advance_char();
                }
                Some(c) => {
                    return Err(self.error(format!(
                        "unexpected character {c:?} in hex string literal"
                    )))
                }
                None => return Err(self.error("hex string literal is missing its closing quote")),
            }
        }
        if pending.is_some() {
            return Err(self.error("hex string literal has an odd number of digits"));
        }
        Ok(self.make(TokenKind::HexStringLit(bytes), start, line))
    }

    fn dollar(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        self.advance_char();
        match self.current_char() {
            Some('$') => {
                self.advance_char();
                let name = self.take_ident();
                if name.is_empty() {
                    return Err(self.error("expected a function name after `$$`"));
                }
                match RezFn::from_ident(&name) {
                    Some(function) => Ok(self.make(TokenKind::RezFn(function), start, line)),
                    None => Err(self.error(format!("unknown Rez function `$${name}`"))),
                }
            }
            Some('"') => self.hex_string_literal(start, line),
            Some(c) if c.is_ascii_hexdigit() => {
                self.take_digits(16);
                Ok(self.make(TokenKind::IntLit(IntBase::Hex), start, line))
            }
            _ => Err(self.error("expected hex digits, a hex string, or a `$$` function after `$`")),
        }
    }

    fn scan_token(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        let c = self.current_char().expect("scan_token requires input");
        let kind = match c {
            'a'..='z' | 'A'..='Z' | '_' => return Ok(self.identifier(start, line)),
            '0'..='9' => return self.number(start, line),
            '"' => return self.string_literal(start, line),
            '\'' => return self.char_literal(start, line),
            '$' => return self.dollar(start, line),
            '+' => self.single(TokenKind::Add),
            '-' => self.single(TokenKind::Sub),
            '*' => self.single(TokenKind::Mul),
            '/' => self.single(TokenKind::Div),
            '%' => self.single(TokenKind::Rem),
            '~' => self.single(TokenKind::BitNot),
            '^' => self.single(TokenKind::BitXor),
            '&' => self.single_or_double(TokenKind::BitAnd, '&', TokenKind::And),
            '|' => self.single_or_double(TokenKind::BitOr, '|', TokenKind::Or),
            '=' => self.single_or_double(TokenKind::Assign, '=', TokenKind::Equal),
            '!' => self.single_or_double(TokenKind::Not, '=', TokenKind::NotEqual),
            '<' => {
                self.advance_char();
                match self.current_char() {
                    Some('<') => self.single(TokenKind::ShiftLeft),
                    Some('=') => self.single(TokenKind::LessEqual),
                    _ => TokenKind::Less,
                }
            }
            '>' => {
                self.advance_char();
                match self.current_char() {
                    Some('>') => self.single(TokenKind::ShiftRight),
                    Some('=') => self.single(TokenKind::GreaterEqual),
                    _ => TokenKind::Greater,
                }
            }
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semi),
            ':' => self.single(TokenKind::Colon),
            other => return Err(self.error(format!("unrecognized character {other:?}"))),
        };
        Ok(self.make(kind, start, line))
    }

    fn directive(&mut self, start: usize, line: u32) -> Result<Token, RezError> {
        self.advance_char();
        self.skip_blanks();
        let word_start = self.position;
        let word = self.take_ident();
        let directive = match word.as_str() {
            "include" => self.pp_include(IncludeKind::Include)?,
            "import" => self.pp_include(IncludeKind::Import)?,
            "define" => self.pp_define()?,
            "undef" => Directive::Undef {
                name: self.directive_name("#undef")?,
            },
            "ifdef" => Directive::Ifdef(IfdefDirective {
                kind: IfdefKind::Ifdef,
                name: self.directive_name("#ifdef")?,
            }),
            "ifndef" => Directive::Ifdef(IfdefDirective {
                kind: IfdefKind::Ifndef,
                name: self.directive_name("#ifndef")?,
            }),
            // `#if`, `#elif` and `#printf` operands flow through the normal
            // token stream until the preprocessor sees a newline or `;`.
            "if" => Directive::If,
            "elif" => Directive::Elif,
            "printf" => Directive::Printf,
            "else" => {
                self.discard_line();
                Directive::Else
            }
            "endif" => {
                self.discard_line();
                Directive::Endif
            }
            _ => {
                // A stray `#`: emit an empty directive and rescan from the
                // word itself.
                self.position = word_start;
                Directive::Empty
            }
        };
        Ok(self.make(TokenKind::Directive(directive), start, line))
    }

    fn directive_name(&mut self, directive: &str) -> Result<String, RezError> {
        self.skip_blanks();
        let name = self.take_ident();
        if name.is_empty() {
            return Err(self.error(format!("expected a name after `{directive}`")));
        }
        // Anything else on the line is ignored, valid or not.
        self.discard_line();
        Ok(name)
    }

    /// Sub-lexes the rest of the current line, stopping at `;` when
    /// `stop_at_semi` is set (the `;` itself is dropped).
    fn line_payload(&mut self, stop_at_semi: bool) -> Result<Vec<Token>, RezError> {
        let text_start = self.position;
        self.discard_line();
        let input = Rc::clone(&self.input);
        let mut sub = self.sublexer(&input[text_start..self.position]);
        let mut tokens = Vec::new();
        loop {
            let token = sub.next_token()?;
            match token.kind {
                TokenKind::EndOfFile => break,
                TokenKind::Semi if stop_at_semi => break,
                _ => tokens.push(token),
            }
        }
        Ok(tokens)
    }

    fn pp_include(&mut self, kind: IncludeKind) -> Result<Directive, RezError> {
        self.skip_blanks();
        let filename = if self.current_char() == Some('<') {
            self.advance_char();
            let name_start = self.position;
            while !matches!(self.current_char(), None | Some('\n') | Some('>')) {
                self.advance_char();
            }
            if self.current_char() != Some('>') {
                return Err(self.error("missing `>` to close the include filename"));
            }
            let name = self.input[name_start..self.position].to_owned();
            self.advance_char();
            self.discard_line();
            IncludeFilename::Angled(name)
        } else {
            IncludeFilename::Tokens(self.line_payload(true)?)
        };
        Ok(Directive::Include(IncludeDirective { kind, filename }))
    }

    fn pp_define(&mut self) -> Result<Directive, RezError> {
        self.skip_blanks();
        let name = self.take_ident();
        if name.is_empty() {
            return Err(self.error("expected a macro name after `#define`"));
        }
        self.skip_blanks();
        let replacement = self.line_payload(false)?;
        Ok(Directive::Define(DefineDirective { name, replacement }))
    }
}

impl TokenStream for Lexer {
    fn next_token(&mut self) -> Result<Token, RezError> {
        loop {
            self.skip_blanks();
            let start = self.position;
            let line = self.line;
            let Some(c) = self.current_char() else {
                return Ok(self.make(TokenKind::EndOfFile, start, line));
            };
            match c {
                '\n' => {
                    self.advance_char();
                    self.line += 1;
                    self.line_has_tokens = false;
                    return Ok(self.make(TokenKind::Newline, start, line));
                }
                '/' if self.peek_char() == Some('/') => {
                    self.line_has_tokens = true;
                    self.discard_line();
                }
                '/' if self.peek_char() == Some('*') => {
                    self.line_has_tokens = true;
                    self.block_comment()?;
                }
                '#' if !self.line_has_tokens => {
                    self.line_has_tokens = true;
                    return self.directive(start, line);
                }
                _ => {
                    self.line_has_tokens = true;
                    return self.scan_token(start, line);
                }
            }
        }
    }
}
