use std::rc::Rc;

use rez_foundation::{errors::SourceLocation, ident::fold};

/// Position of a token in its source: file name, 1-based line, byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: Rc<str>,
    pub line: u32,
    pub offset: usize,
}

impl SourcePos {
    /// Position for tokens that were synthesized rather than lexed, such as
    /// the decimal literals the enum rewrite plants in the macro table.
    pub fn synthetic() -> Self {
        Self {
            file: Rc::from("<generated>"),
            line: 0,
            offset: 0,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(&*self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The raw lexeme, exactly as written (string and character literals keep
    /// their quotes).
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    /// Renders the token for error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::EndOfFile => String::from("end of file"),
            TokenKind::Newline => String::from("end of line"),
            _ => format!("`{}`", self.text),
        }
    }
}

/// Every kind of token the lexer can produce.
///
/// Directive tokens carry already sub-lexed payloads, so downstream stages
/// never look back at the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Newline,
    EndOfFile,

    Ident,
    Keyword(Keyword),
    RezFn(RezFn),

    IntLit(IntBase),
    /// Text string literal, decoded to Mac OS Roman bytes.
    StringLit(Vec<u8>),
    /// Hex string literal `$"…"`, decoded to its bytes.
    HexStringLit(Vec<u8>),

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    ShiftLeft,
    ShiftRight,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    Not,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Assign,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Semi,
    Colon,

    Directive(Directive),
}

/// How an integer literal was spelled; decoding happens at AST construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBase {
    Dec,
    Hex,
    Oct,
    Bin,
    /// `'…'` character literal; the bytes pack big-endian into the value.
    Char,
}

/// A whole-line preprocessor directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Include(IncludeDirective),
    Define(DefineDirective),
    Undef { name: String },
    If,
    Elif,
    Ifdef(IfdefDirective),
    Else,
    Endif,
    Printf,
    /// A `#` with no recognized directive word after it.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub kind: IncludeKind,
    pub filename: IncludeFilename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeFilename {
    /// `<…>` form; the raw text between the brackets.
    Angled(String),
    /// Quoted form; a string expression sub-lexed up to `;` or end of line.
    Tokens(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineDirective {
    pub name: String,
    pub replacement: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdefDirective {
    pub kind: IfdefKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfdefKind {
    Ifdef,
    Ifndef,
}

macro_rules! keywords {
    ($($Name:ident = $text:literal),* $(,)?) => {
        /// The reserved words of the Rez language, recognized by case-folding
        /// every identifier against this set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Keyword {
            $($Name),*
        }

        impl Keyword {
            pub fn from_ident(ident: &str) -> Option<Keyword> {
                match fold(ident).as_str() {
                    $($text => Some(Keyword::$Name),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$Name => $text),*
                }
            }
        }
    };
}

keywords! {
    // Top-level structures.
    As = "as",
    Change = "change",
    Data = "data",
    Delete = "delete",
    Enum = "enum",
    Include = "include",
    Not = "not",
    Type = "type",
    Read = "read",
    Resource = "resource",
    To = "to",

    // Primitive types.
    Bit = "bit",
    Bitstring = "bitstring",
    Boolean = "boolean",
    Byte = "byte",
    Char = "char",
    Cstring = "cstring",
    Nibble = "nibble",
    Integer = "integer",
    Long = "long",
    Longint = "longint",
    Point = "point",
    Pstring = "pstring",
    Rect = "rect",
    String = "string",
    Word = "word",
    Wstring = "wstring",

    // Field modifiers.
    Binary = "binary",
    Decimal = "decimal",
    Hex = "hex",
    Key = "key",
    Literal = "literal",
    Octal = "octal",
    Unsigned = "unsigned",

    // Compound field syntax.
    Align = "align",
    Array = "array",
    Case = "case",
    Fill = "fill",
    Switch = "switch",
    Wide = "wide",

    // Named resource attributes.
    Appheap = "appheap",
    Changed = "changed",
    Compressed = "compressed",
    Locked = "locked",
    Nonpreload = "nonpreload",
    Nonpurgeable = "nonpurgeable",
    Preload = "preload",
    Protected = "protected",
    Purgeable = "purgeable",
    Sysheap = "sysheap",
    Unchanged = "unchanged",
    Uncompressed = "uncompressed",
    Unlocked = "unlocked",
    Unprotected = "unprotected",

    // Only meaningful in preprocessor conditions, but reserved everywhere.
    Defined = "defined",
}

macro_rules! rez_fns {
    ($($Name:ident = $text:literal),* $(,)?) => {
        /// The closed set of `$$` built-in functions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum RezFn {
            $($Name),*
        }

        impl RezFn {
            /// Looks up the identifier following `$$`, case-insensitively.
            pub fn from_ident(ident: &str) -> Option<RezFn> {
                match fold(ident).as_str() {
                    $($text => Some(RezFn::$Name),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(RezFn::$Name => $text),*
                }
            }
        }
    };
}

rez_fns! {
    ArrayIndex = "arrayindex",
    Attributes = "attributes",
    BitField = "bitfield",
    Byte = "byte",
    CountOf = "countof",
    Date = "date",
    Day = "day",
    Format = "format",
    Hour = "hour",
    Id = "id",
    Long = "long",
    Minute = "minute",
    Month = "month",
    Name = "name",
    PackedSize = "packedsize",
    Read = "read",
    Resource = "resource",
    ResourceSize = "resourcesize",
    Second = "second",
    Shell = "shell",
    Time = "time",
    Type = "type",
    Version = "version",
    Weekday = "weekday",
    Word = "word",
    Year = "year",
}

impl RezFn {
    /// Whether the function produces a byte string rather than an integer.
    pub fn returns_string(self) -> bool {
        matches!(
            self,
            RezFn::Date
                | RezFn::Format
                | RezFn::Name
                | RezFn::Read
                | RezFn::Resource
                | RezFn::Shell
                | RezFn::Time
                | RezFn::Version
        )
    }
}
