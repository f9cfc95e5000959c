//! The constant-expression evaluator.
//!
//! Interprets expression ASTs against an environment: a symbol table, named
//! array state, the resource currently being built, a reference clock, and a
//! set of host hooks for the functions with side effects. The preprocessor
//! runs this evaluator for `#if` conditions, enum constant values, include
//! paths and `#printf` arguments; callers can also use it directly on the
//! expressions a parsed file contains.

use std::collections::HashMap;

use bitflags::bitflags;
use chrono::{Datelike, NaiveDateTime, Timelike};
use rez_foundation::{errors::EvalError, ident::CaseInsensitive};
use rez_syntax::ast::{
    Expr, IntBinaryOp, IntExpr, IntFn, IntUnaryOp, ResourceAttributes, StringExpr, StringFn,
};

/// The version string `$$Version` reports by default.
pub const REZ_VERSION: &[u8] = concat!("rezc version ", env!("CARGO_PKG_VERSION")).as_bytes();

/// A computed value. Rez expressions produce integers or byte strings,
/// nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Condition truthiness: a nonzero integer or a non-empty byte string.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(value) => *value != 0,
            Value::Bytes(bytes) => !bytes.is_empty(),
        }
    }
}

/// What a symbol can be bound to. Sequences back labels declared inside
/// arrays; they are indexed with 1-based subscripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    Int(i64),
    Bytes(Vec<u8>),
    Seq(Vec<SymbolValue>),
}

/// Per-array state backing `$$ArrayIndex` and `$$CountOf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayState {
    /// Current 1-based iteration index.
    pub index: i64,
    /// Total number of iterations.
    pub count: i64,
}

bitflags! {
    /// Resource attribute bits as stored in a resource fork.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResourceAttrs: u8 {
        const COMPRESSED = 1;
        const CHANGED = 2;
        const PRELOAD = 4;
        const PROTECTED = 8;
        const LOCKED = 16;
        const PURGEABLE = 32;
        const SYSHEAP = 64;
    }
}

/// The resource currently being built, read by `$$Attributes`, `$$ID`,
/// `$$Name`, `$$Type`, `$$ResourceSize` and the `$$BitField` family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub res_type: i64,
    pub id: i64,
    pub name: Vec<u8>,
    pub attributes: ResourceAttrs,
    pub data: Vec<u8>,
}

/// Host-provided hooks for the functions that touch the outside world.
///
/// Every default implementation refuses: file, resource-fork and shell
/// access stay off unless a host opts in.
pub trait HostHooks {
    fn read(&mut self, _path: &[u8]) -> Result<Vec<u8>, EvalError> {
        Err(EvalError::new("$$Read is not implemented by this host"))
    }

    fn resource(
        &mut self,
        _path: &[u8],
        _res_type: i64,
        _id: i64,
        _name: &[u8],
    ) -> Result<Vec<u8>, EvalError> {
        Err(EvalError::new("$$Resource is not implemented by this host"))
    }

    fn shell(&mut self, _variable: &[u8]) -> Result<Vec<u8>, EvalError> {
        Err(EvalError::new("$$Shell is not implemented by this host"))
    }

    /// `$$Format` and `#printf` rendering.
    fn format(&mut self, _format: &[u8], _args: &[Value]) -> Result<Vec<u8>, EvalError> {
        Err(EvalError::new("$$Format is not implemented by this host"))
    }
}

/// The hook set that implements nothing.
pub struct NoHooks;

impl HostHooks for NoHooks {}

pub struct Evaluator {
    pub symbols: HashMap<CaseInsensitive<String>, SymbolValue>,
    pub arrays: HashMap<CaseInsensitive<String>, ArrayState>,
    pub current_resource: Option<ResourceState>,
    /// Reference clock for `$$Date`/`$$Time` and friends. Defaults to the
    /// Unix epoch so output is reproducible.
    pub clock: NaiveDateTime,
    /// What `$$Version` returns.
    pub version: Vec<u8>,
    hooks: Box<dyn HostHooks>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Box::new(NoHooks))
    }
}

impl Evaluator {
    pub fn new(hooks: Box<dyn HostHooks>) -> Self {
        Self {
            symbols: HashMap::new(),
            arrays: HashMap::new(),
            current_resource: None,
            clock: NaiveDateTime::UNIX_EPOCH,
            version: REZ_VERSION.to_vec(),
            hooks,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            // A bare symbol produces whatever it is bound to, regardless of
            // the context it was parsed in.
            Expr::Int(IntExpr::Symbol(name)) | Expr::Str(StringExpr::Symbol(name)) => {
                self.symbol_value(name)
            }
            Expr::Int(expr) => Ok(Value::Int(self.eval_int(expr)?)),
            Expr::Str(expr) => Ok(Value::Bytes(self.eval_bytes(expr)?)),
        }
    }

    /// Renders `#printf`/`$$Format` output through the host's format hook.
    pub fn format(&mut self, format: &[u8], args: &[Value]) -> Result<Vec<u8>, EvalError> {
        self.hooks.format(format, args)
    }

    /// Evaluates a def spec's attributes: named flags OR their weights
    /// together, an explicit expression is used as-is.
    pub fn eval_attributes(&mut self, attributes: &ResourceAttributes) -> Result<i64, EvalError> {
        match attributes {
            ResourceAttributes::Named(named) => Ok(named
                .iter()
                .fold(0, |bits, attribute| bits | attribute.weight())),
            ResourceAttributes::Expr(expr) => self.eval_int(expr),
        }
    }

    fn symbol_value(&self, name: &str) -> Result<Value, EvalError> {
        match self.symbols.get(CaseInsensitive::new_ref(name)) {
            None => Err(EvalError::new(format!("unknown symbol `{name}`"))),
            Some(SymbolValue::Int(value)) => Ok(Value::Int(*value)),
            Some(SymbolValue::Bytes(bytes)) => Ok(Value::Bytes(bytes.clone())),
            Some(SymbolValue::Seq(_)) => Err(EvalError::new(format!(
                "label `{name}` needs a subscript"
            ))),
        }
    }

    pub fn eval_int(&mut self, expr: &IntExpr) -> Result<i64, EvalError> {
        match expr {
            IntExpr::Literal(value) => Ok(*value),
            IntExpr::Attribute(attribute) => Ok(attribute.weight()),
            IntExpr::Symbol(name) => match self.symbol_value(name)? {
                Value::Int(value) => Ok(value),
                Value::Bytes(_) => Err(EvalError::new(format!(
                    "symbol `{name}` is a string, expected an integer"
                ))),
            },
            IntExpr::LabelSubscript { name, subscripts } => {
                self.label_subscript(name, subscripts)
            }
            IntExpr::Fn(function) => self.eval_int_fn(function),
            IntExpr::Unary(op, operand) => {
                let value = self.eval_int(operand)?;
                Ok(match op {
                    IntUnaryOp::Neg => value.wrapping_neg(),
                    IntUnaryOp::BoolNot => i64::from(value == 0),
                    IntUnaryOp::BitNot => !value,
                })
            }
            IntExpr::Binary(op, left, right) => self.eval_binary(*op, left, right),
        }
    }

    fn eval_binary(
        &mut self,
        op: IntBinaryOp,
        left: &IntExpr,
        right: &IntExpr,
    ) -> Result<i64, EvalError> {
        let left = self.eval_int(left)?;
        // The boolean operators short-circuit; their right side must not be
        // evaluated when the left side decides the result.
        match op {
            IntBinaryOp::BoolAnd => {
                return if left == 0 { Ok(0) } else { self.eval_int(right) };
            }
            IntBinaryOp::BoolOr => {
                return if left != 0 { Ok(left) } else { self.eval_int(right) };
            }
            _ => {}
        }
        let right = self.eval_int(right)?;
        Ok(match op {
            IntBinaryOp::Mul => left.wrapping_mul(right),
            IntBinaryOp::Add => left.wrapping_add(right),
            IntBinaryOp::Sub => left.wrapping_sub(right),
            // Division truncates toward zero and ignores the divisor's sign;
            // the result takes the dividend's sign. Computed in 128 bits so
            // the i64::MIN corners cannot trap.
            IntBinaryOp::Div => {
                if right == 0 {
                    return Err(EvalError::new("division by zero"));
                }
                (i128::from(left) / i128::from(right).abs()) as i64
            }
            IntBinaryOp::Mod => {
                if right == 0 {
                    return Err(EvalError::new("modulo by zero"));
                }
                (i128::from(left) % i128::from(right).abs()) as i64
            }
            // A negative shift count produces 0, as does shifting everything
            // out of a 64-bit value.
            IntBinaryOp::Shl => {
                if (0..64).contains(&right) {
                    left.wrapping_shl(right as u32)
                } else {
                    0
                }
            }
            IntBinaryOp::Shr => {
                if (0..64).contains(&right) {
                    left >> right
                } else if right >= 64 && left < 0 {
                    -1
                } else {
                    0
                }
            }
            IntBinaryOp::Lt => i64::from(left < right),
            IntBinaryOp::Gt => i64::from(left > right),
            IntBinaryOp::Le => i64::from(left <= right),
            IntBinaryOp::Ge => i64::from(left >= right),
            IntBinaryOp::Eq => i64::from(left == right),
            IntBinaryOp::Ne => i64::from(left != right),
            IntBinaryOp::BitAnd => left & right,
            IntBinaryOp::BitXor => left ^ right,
            IntBinaryOp::BitOr => left | right,
            IntBinaryOp::BoolAnd | IntBinaryOp::BoolOr => unreachable!("handled above"),
        })
    }

    fn eval_int_fn(&mut self, function: &IntFn) -> Result<i64, EvalError> {
        match function {
            IntFn::ArrayIndex { array } => Ok(self.array(array)?.index),
            IntFn::CountOf { array } => Ok(self.array(array)?.count),
            IntFn::Attributes => Ok(self
                .current_resource
                .as_ref()
                .map_or(0, |resource| i64::from(resource.attributes.bits()))),
            IntFn::Id => Ok(self.current_resource.as_ref().map_or(0, |resource| resource.id)),
            IntFn::ResourceSize => Ok(self
                .current_resource
                .as_ref()
                .map_or(0, |resource| resource.data.len() as i64)),
            IntFn::Type => Ok(self
                .current_resource
                .as_ref()
                .map_or(0, |resource| resource.res_type)),
            IntFn::Day => Ok(i64::from(self.clock.day())),
            IntFn::Hour => Ok(i64::from(self.clock.hour())),
            IntFn::Minute => Ok(i64::from(self.clock.minute())),
            IntFn::Month => Ok(i64::from(self.clock.month())),
            IntFn::Second => Ok(i64::from(self.clock.second())),
            IntFn::Year => Ok(i64::from(self.clock.year())),
            // 1 through 7, with 1 being Sunday.
            IntFn::Weekday => {
                Ok(i64::from(self.clock.weekday().num_days_from_sunday()) + 1)
            }
            IntFn::BitField {
                start,
                offset,
                length,
            } => {
                let start = self.eval_int(start)?;
                let offset = self.eval_int(offset)?;
                let length = self.eval_int(length)?;
                self.bitfield(start, offset, length)
            }
            IntFn::Byte { start } => {
                let start = self.eval_int(start)?;
                self.bitfield(start, 0, 8)
            }
            IntFn::Word { start } => {
                let start = self.eval_int(start)?;
                self.bitfield(start, 0, 16)
            }
            IntFn::Long { start } => {
                let start = self.eval_int(start)?;
                self.bitfield(start, 0, 32)
            }
            IntFn::PackedSize { .. } => {
                Err(EvalError::new("$$PackedSize is not implemented"))
            }
        }
    }

    fn array(&self, name: &str) -> Result<ArrayState, EvalError> {
        self.arrays
            .get(CaseInsensitive::new_ref(name))
            .copied()
            .ok_or_else(|| EvalError::new(format!("unknown array `{name}`")))
    }

    /// Reads `length` bits starting `start + offset` bits into the current
    /// resource's data, big-endian, sign-extended.
    fn bitfield(&self, start: i64, offset: i64, length: i64) -> Result<i64, EvalError> {
        let resource = self
            .current_resource
            .as_ref()
            .ok_or_else(|| EvalError::new("$$BitField used with no current resource"))?;
        if !(0..=64).contains(&length) {
            return Err(EvalError::new(format!(
                "bit field length {length} is outside 0..=64"
            )));
        }
        let first = start
            .checked_add(offset)
            .filter(|&bit| bit >= 0)
            .ok_or_else(|| EvalError::new("bit field position is negative"))?;
        let mut value = 0u64;
        for i in 0..length {
            let bit_index = (first + i) as u64;
            let byte = resource
                .data
                .get((bit_index / 8) as usize)
                .ok_or_else(|| EvalError::new("bit field reads past the end of the resource"))?;
            let bit = (byte >> (7 - bit_index % 8)) & 1;
            value = (value << 1) | u64::from(bit);
        }
        if length > 0 && length < 64 && (value >> (length - 1)) & 1 == 1 {
            value |= u64::MAX << length;
        }
        Ok(value as i64)
    }

    fn label_subscript(
        &mut self,
        name: &str,
        subscripts: &[IntExpr],
    ) -> Result<i64, EvalError> {
        let indices = subscripts
            .iter()
            .map(|subscript| self.eval_int(subscript))
            .collect::<Result<Vec<_>, _>>()?;
        let mut current = self
            .symbols
            .get(CaseInsensitive::new_ref(name))
            .ok_or_else(|| EvalError::new(format!("unknown label `{name}`")))?;
        for index in indices {
            let SymbolValue::Seq(items) = current else {
                return Err(EvalError::new(format!(
                    "too many subscripts for label `{name}`"
                )));
            };
            current = usize::try_from(index - 1)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or_else(|| {
                    EvalError::new(format!(
                        "subscript {index} is out of range for label `{name}`"
                    ))
                })?;
        }
        match current {
            SymbolValue::Int(value) => Ok(*value),
            SymbolValue::Seq(_) => Err(EvalError::new(format!(
                "too few subscripts for label `{name}`"
            ))),
            SymbolValue::Bytes(_) => Err(EvalError::new(format!(
                "label `{name}` is not an integer"
            ))),
        }
    }

    pub fn eval_bytes(&mut self, expr: &StringExpr) -> Result<Vec<u8>, EvalError> {
        match expr {
            StringExpr::Literal(bytes) => Ok(bytes.clone()),
            StringExpr::Symbol(name) => match self.symbol_value(name)? {
                Value::Bytes(bytes) => Ok(bytes),
                Value::Int(_) => Err(EvalError::new(format!(
                    "symbol `{name}` is an integer, expected a string"
                ))),
            },
            // Byte-level concatenation, no separator.
            StringExpr::Concat(parts) => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend_from_slice(&self.eval_bytes(part)?);
                }
                Ok(out)
            }
            StringExpr::Fn(function) => self.eval_string_fn(function),
        }
    }

    fn eval_string_fn(&mut self, function: &StringFn) -> Result<Vec<u8>, EvalError> {
        match function {
            StringFn::Date => Ok(self.clock.format("%Y-%m-%d").to_string().into_bytes()),
            StringFn::Time => Ok(self.clock.format("%H:%M:%S").to_string().into_bytes()),
            StringFn::Name => Ok(self
                .current_resource
                .as_ref()
                .map_or_else(Vec::new, |resource| resource.name.clone())),
            StringFn::Version => Ok(self.version.clone()),
            StringFn::Format { format, args } => {
                let format = self.eval_bytes(format)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.hooks.format(&format, &args)
            }
            StringFn::Read { path } => {
                let path = self.eval_bytes(path)?;
                self.hooks.read(&path)
            }
            StringFn::Shell { variable } => {
                let variable = self.eval_bytes(variable)?;
                self.hooks.shell(&variable)
            }
            StringFn::Resource {
                path,
                res_type,
                id,
                name,
            } => {
                let path = self.eval_bytes(path)?;
                let res_type = self.eval_int(res_type)?;
                let id = self.eval_int(id)?;
                let name = self.eval_bytes(name)?;
                self.hooks.resource(&path, res_type, id, &name)
            }
        }
    }
}
