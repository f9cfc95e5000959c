use super::{Expr, Field, IntExpr, ResourceAttribute, StringExpr};

/// A parsed Rez source file: the root node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct File {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Change(Change),
    Data(Data),
    Delete(Delete),
    Enum(EnumStmt),
    Include(IncludeStmt),
    Read(ReadStmt),
    Resource(ResourceStmt),
    Type(TypeStmt),
}

/// `change <use> to <def>;`: retypes existing resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub from_spec: ResourceSpecUse,
    pub to_spec: ResourceSpecDef,
}

/// `data <def> { "raw bytes" };`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub spec: ResourceSpecDef,
    /// Raw resource data; `None` means no data.
    pub value: Option<StringExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub spec: ResourceSpecUse,
}

/// The syntactic record of an `enum` declaration.
///
/// The names here are informational: the preprocessor has already turned
/// every constant into a macro by the time this node exists, and those
/// macros may be redefined or undefined later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumStmt {
    /// The optional type-name placeholder after `enum`; it has no meaning.
    pub name: Option<String>,
    pub constants: Vec<EnumConstant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    /// The explicit value, if one was written. Implicit values continue
    /// from the previous constant plus one.
    pub value: Option<IntExpr>,
}

/// `include "file" ...;`: copies resources from another file's resource fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeStmt {
    pub path: StringExpr,
    pub from_spec: Option<IncludeFrom>,
    pub to_spec: Option<IncludeTo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeFrom {
    Use(ResourceSpecUse),
    /// `include "file" not 'TYPE';`: everything except this type.
    Not(IntExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTo {
    Type(IntExpr),
    Def(ResourceSpecDef),
}

/// `read <def> "path";`: fills a resource from a file's data fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStmt {
    pub spec: ResourceSpecDef,
    pub path: StringExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStmt {
    pub spec: ResourceSpecDef,
    /// Field values; must match the applicable type declaration.
    pub values: Vec<ResourceValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStmt {
    pub spec: ResourceSpecTypeDef,
    pub body: TypeBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBody {
    /// `type 'XXXX' { ... };`: a field layout declaration.
    Fields(Vec<Field>),
    /// `type 'XXXX' as 'YYYY';`: an alias of another declaration.
    Alias(ResourceSpecTypeUse),
}

/// An inclusive resource ID range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRange {
    pub begin: IntExpr,
    pub end: IntExpr,
}

/// The spec heading a `type` declaration. Without an ID the declaration
/// applies to every resource of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpecTypeDef {
    pub res_type: IntExpr,
    pub id: Option<TypeDefId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefId {
    Single(IntExpr),
    Range(IdRange),
}

/// A reference to an existing type declaration (the `as` side of a type
/// alias).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpecTypeUse {
    pub res_type: IntExpr,
    pub id: Option<IntExpr>,
}

/// The spec used when defining a resource instance: type and ID required,
/// name optional, attributes either named flags or one explicit expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpecDef {
    pub res_type: IntExpr,
    pub id: IntExpr,
    pub name: Option<StringExpr>,
    pub attributes: ResourceAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAttributes {
    /// Named flags, ORed together at evaluation. Empty means default.
    Named(Vec<ResourceAttribute>),
    Expr(IntExpr),
}

impl Default for ResourceAttributes {
    fn default() -> Self {
        ResourceAttributes::Named(Vec::new())
    }
}

/// The spec used when referring to existing resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpecUse {
    pub res_type: IntExpr,
    pub id_or_name: Option<IdOrName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOrName {
    Id(IntExpr),
    Range(IdRange),
    Name(StringExpr),
}

/// Anything that can appear as a field value inside a `resource` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    /// A bare symbol whose type is not known from context.
    Symbol(String),
    Expr(Expr),
    /// Array iterations: groups separated by `;`, values within a group by
    /// `,`. One group may span several iterations, but an iteration never
    /// spans groups.
    Array(Vec<Vec<ResourceValue>>),
    /// `caseName { values }` selecting a switch case.
    Switch {
        label: String,
        values: Vec<ResourceValue>,
    },
}
