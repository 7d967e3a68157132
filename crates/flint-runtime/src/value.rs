//! Runtime values.
//!
//! Primitive values are copied on assignment. Composite values (arrays,
//! anonymous records, functions, class instances and host objects) are held
//! behind `Arc`, so assignment shares the underlying object and `==` compares
//! identity rather than contents.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use flint_parser::TypeName;

use crate::class::Instance;
use crate::error::{EvalError, EvalResult};
use crate::function::FunctionSignature;
use crate::interop::HostObject;

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Str(Arc<str>),
    Array(Arc<ArrayValue>),
    Record(Arc<RecordValue>),
    Function(Arc<FunctionSignature>),
    Instance(Arc<Instance>),
    Host(HostObject),
}

impl Value {
    /// The runtime type name used in diagnostics and overload keys.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Boolean(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "anon",
            Value::Function(_) => "func",
            Value::Instance(_) => "instance",
            Value::Host(_) => "reflection",
        }
    }

    /// Whether this value is acceptable for a slot declared with `ty`. Any
    /// class instance satisfies `instance`; there is no per-class typing.
    pub fn matches_type(&self, ty: TypeName) -> bool {
        matches!(
            (self, ty),
            (Value::Integer(_), TypeName::Int)
                | (Value::Float(_), TypeName::Float)
                | (Value::Double(_), TypeName::Double)
                | (Value::Boolean(_), TypeName::Bool)
                | (Value::Str(_), TypeName::Str)
                | (Value::Array(_), TypeName::Array)
                | (Value::Record(_), TypeName::Anon)
                | (Value::Function(_), TypeName::Func)
                | (Value::Instance(_), TypeName::Instance)
                | (Value::Host(_), TypeName::Reflection)
        )
    }

    /// Default value for a declaration without an initialiser. Types with no
    /// sensible default (func, array, instance, reflection) return `None` and
    /// the declaration is rejected.
    pub fn default_for(ty: TypeName) -> Option<Value> {
        match ty {
            TypeName::Int => Some(Value::Integer(0)),
            TypeName::Float => Some(Value::Float(0.0)),
            TypeName::Double => Some(Value::Double(0.0)),
            TypeName::Bool => Some(Value::Boolean(false)),
            TypeName::Str => Some(Value::Str(Arc::from(""))),
            TypeName::Anon => Some(Value::Record(Arc::new(RecordValue::new(Vec::new())))),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    // ====== Binary operators ====== //

    pub fn add(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_add(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(Arc::from(format!("{a}{b}")))),
            _ => Err(EvalError::operator_mismatch(
                "+",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn subtract(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_sub(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
            _ => Err(EvalError::operator_mismatch(
                "-",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn multiply(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_mul(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
            _ => Err(EvalError::operator_mismatch(
                "*",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn divide(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_div(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
            _ => Err(EvalError::operator_mismatch(
                "/",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn modulo(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a % b)),
            _ => Err(EvalError::operator_mismatch(
                "%",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn and(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(*a && *b)),
            _ => Err(EvalError::operator_mismatch(
                "&&",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    pub fn or(&self, other: &Value) -> EvalResult<Value> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(*a || *b)),
            _ => Err(EvalError::operator_mismatch(
                "||",
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    /// Equality for `==` and `!=`. Primitives compare by value, composites by
    /// identity. Mixed operand types are an error rather than `false`.
    pub fn equals(&self, other: &Value, op: &'static str) -> EvalResult<bool> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::Double(a), Value::Double(b)) => Ok(a == b),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::Array(a), Value::Array(b)) => Ok(Arc::ptr_eq(a, b)),
            (Value::Record(a), Value::Record(b)) => Ok(Arc::ptr_eq(a, b)),
            (Value::Function(a), Value::Function(b)) => Ok(Arc::ptr_eq(a, b)),
            (Value::Instance(a), Value::Instance(b)) => Ok(Arc::ptr_eq(a, b)),
            (Value::Host(a), Value::Host(b)) => Ok(a.same_object(b)),
            _ => Err(EvalError::operator_mismatch(
                op,
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    /// Ordering for the relational operators. Only primitives are ordered.
    /// NaN sorts low.
    pub fn compare(&self, other: &Value, op: &'static str) -> EvalResult<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => {
                Ok(a.partial_cmp(b).unwrap_or(Ordering::Less))
            }
            (Value::Double(a), Value::Double(b)) => {
                Ok(a.partial_cmp(b).unwrap_or(Ordering::Less))
            }
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(EvalError::operator_mismatch(
                op,
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    // ====== Unary operators ====== //

    pub fn not(&self) -> EvalResult<Value> {
        match self {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            _ => Err(EvalError::UnaryTypeMismatch {
                op: "!",
                operand: self.type_name(),
            }),
        }
    }

    pub fn negate(&self) -> EvalResult<Value> {
        match self {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            Value::Float(n) => Ok(Value::Float(-n)),
            Value::Double(n) => Ok(Value::Double(-n)),
            _ => Err(EvalError::UnaryTypeMismatch {
                op: "-",
                operand: self.type_name(),
            }),
        }
    }

    pub fn unary_plus(&self) -> EvalResult<Value> {
        match self {
            Value::Integer(_) | Value::Float(_) | Value::Double(_) => Ok(self.clone()),
            _ => Err(EvalError::UnaryTypeMismatch {
                op: "+",
                operand: self.type_name(),
            }),
        }
    }

    /// Textual form, identical to what `print` emits.
    pub fn string_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{n}.0"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Double(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{n}.0"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(a) => write!(f, "{a}"),
            Value::Record(r) => write!(f, "{r}"),
            Value::Function(sig) => write!(f, "function {}", sig.signature_string()),
            Value::Instance(inst) => write!(f, "{} instance", inst.class_name()),
            Value::Host(h) => write!(f, "{h}"),
        }
    }
}

// ====== Arrays ====== //

/// A fixed-length array over a primitive element type. Cells are filled with
/// the element type's default at construction.
#[derive(Debug)]
pub struct ArrayValue {
    elem: TypeName,
    cells: RefCell<Vec<Value>>,
}

impl ArrayValue {
    pub fn new(elem: TypeName, length: usize) -> EvalResult<ArrayValue> {
        let default = match elem {
            TypeName::Int => Value::Integer(0),
            TypeName::Float => Value::Float(0.0),
            TypeName::Double => Value::Double(0.0),
            TypeName::Bool => Value::Boolean(false),
            TypeName::Str => Value::Str(Arc::from("")),
            other => return Err(EvalError::BadArrayElementType(other.as_str())),
        };
        Ok(ArrayValue {
            elem,
            cells: RefCell::new(vec![default; length]),
        })
    }

    pub fn elem_type(&self) -> TypeName {
        self.elem
    }

    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: i64) -> EvalResult<Value> {
        let cells = self.cells.borrow();
        let slot = check_bounds(index, cells.len())?;
        Ok(cells[slot].clone())
    }

    pub fn put(&self, index: i64, value: Value) -> EvalResult<()> {
        let mut cells = self.cells.borrow_mut();
        let slot = check_bounds(index, cells.len())?;
        if !value.matches_type(self.elem) {
            return Err(EvalError::ArrayElementMismatch {
                got: value.type_name(),
                want: self.elem.as_str(),
            });
        }
        cells[slot] = value;
        Ok(())
    }
}

fn check_bounds(index: i64, length: usize) -> EvalResult<usize> {
    if index < 0 || index as usize >= length {
        return Err(EvalError::IndexOutOfBounds { index, length });
    }
    Ok(index as usize)
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, cell) in self.cells.borrow().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{cell}")?;
        }
        write!(f, "]")
    }
}

// ====== Anonymous records ====== //

/// An anonymous record. Members are fixed at construction; writes are
/// rejected by the evaluator. Duplicate member names keep the last value.
#[derive(Debug)]
pub struct RecordValue {
    members: IndexMap<String, Value>,
}

impl RecordValue {
    pub fn new(members: Vec<(String, Value)>) -> RecordValue {
        let mut map = IndexMap::new();
        for (name, value) in members {
            map.insert(name, value);
        }
        RecordValue { members: map }
    }

    pub fn get(&self, name: &str) -> EvalResult<Value> {
        self.members
            .get(name)
            .cloned()
            .ok_or(EvalError::UndefinedMember)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        write!(f, "}}")
    }
}
