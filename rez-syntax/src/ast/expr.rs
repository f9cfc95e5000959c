/// An expression of either kind.
///
/// Rez keeps integer and string expressions strictly apart; positions that
/// accept both (resource values, `#printf`/`$$Format` arguments) use this
/// wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(IntExpr),
    Str(StringExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntExpr {
    /// Any numeric literal: decimal, hex, octal, binary, or a character
    /// literal packed big-endian.
    Literal(i64),
    Attribute(ResourceAttribute),
    /// A symbol use that is known to be an integer from its context.
    /// Resolution happens at evaluation time.
    Symbol(String),
    /// `label[i, j]`. A label without subscripts parses as `Symbol`.
    LabelSubscript {
        name: String,
        subscripts: Vec<IntExpr>,
    },
    Fn(IntFn),
    Unary(IntUnaryOp, Box<IntExpr>),
    Binary(IntBinaryOp, Box<IntExpr>, Box<IntExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntUnaryOp {
    Neg,
    BoolNot,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    BoolAnd,
    BoolOr,
}

/// A named resource attribute.
///
/// Attributes carry fixed bit weights; a list of them ORs together. The
/// `un*`/`non*` names all weigh zero; they exist so a definition can spell
/// out the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAttribute {
    Compressed,
    Uncompressed,
    Changed,
    Unchanged,
    Preload,
    Nonpreload,
    Protected,
    Unprotected,
    Locked,
    Unlocked,
    Purgeable,
    Nonpurgeable,
    Sysheap,
    Appheap,
}

impl ResourceAttribute {
    pub fn weight(self) -> i64 {
        match self {
            ResourceAttribute::Compressed => 1,
            ResourceAttribute::Changed => 2,
            ResourceAttribute::Preload => 4,
            ResourceAttribute::Protected => 8,
            ResourceAttribute::Locked => 16,
            ResourceAttribute::Purgeable => 32,
            ResourceAttribute::Sysheap => 64,
            ResourceAttribute::Uncompressed
            | ResourceAttribute::Unchanged
            | ResourceAttribute::Nonpreload
            | ResourceAttribute::Unprotected
            | ResourceAttribute::Unlocked
            | ResourceAttribute::Nonpurgeable
            | ResourceAttribute::Appheap => 0,
        }
    }
}

/// A `$$` function returning an integer. Arities are fixed by variant shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntFn {
    ArrayIndex {
        array: String,
    },
    CountOf {
        array: String,
    },
    Attributes,
    Id,
    ResourceSize,
    Type,
    Day,
    Hour,
    Minute,
    Month,
    Second,
    Weekday,
    Year,
    BitField {
        start: Box<IntExpr>,
        offset: Box<IntExpr>,
        length: Box<IntExpr>,
    },
    Byte {
        start: Box<IntExpr>,
    },
    Word {
        start: Box<IntExpr>,
    },
    Long {
        start: Box<IntExpr>,
    },
    PackedSize {
        start: Box<IntExpr>,
        row_bytes: Box<IntExpr>,
        row_count: Box<IntExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringExpr {
    /// A text or hex string literal, as Mac OS Roman bytes. Adjacent
    /// literals are not merged at parse time; they become a `Concat`.
    Literal(Vec<u8>),
    /// A symbol use that is known to be a string from its context.
    Symbol(String),
    Concat(Vec<StringExpr>),
    Fn(StringFn),
}

/// A `$$` function returning a byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFn {
    Date,
    Time,
    Name,
    Version,
    Format {
        format: Box<StringExpr>,
        args: Vec<Expr>,
    },
    Read {
        path: Box<StringExpr>,
    },
    Resource {
        path: Box<StringExpr>,
        res_type: Box<IntExpr>,
        id: Box<IntExpr>,
        name: Box<StringExpr>,
    },
    Shell {
        variable: Box<StringExpr>,
    },
}
