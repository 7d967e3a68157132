//! Host interop.
//!
//! Host classes are Rust-implemented classes exposed to scripts under dotted
//! names such as `math.Vector2`. A registered class lists constructors,
//! methods, fields and static methods as closures over an opaque handle.
//!
//! A `HostObject` carries two class pointers: the tag class, which controls
//! what is visible (a value cast to an ancestor only shows the ancestor's
//! surface), and the runtime class, which supplies method implementations.
//! An object without a handle is a class handle, usable for static calls.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub type HostHandle = Arc<RefCell<dyn Any>>;

/// Parameter and field types on the host side. `int` crosses the boundary as
/// `i32`; out-of-range integers fail conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Int,
    Float,
    Double,
    Bool,
    Str,
    Object(&'static str),
}

fn host_type_name(ty: HostType) -> &'static str {
    match ty {
        HostType::Int => "int",
        HostType::Float => "float",
        HostType::Double => "double",
        HostType::Bool => "bool",
        HostType::Str => "string",
        HostType::Object(_) => "reflection",
    }
}

#[derive(Clone)]
pub enum HostValue {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Object { class: String, handle: HostHandle },
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Int(n) => write!(f, "Int({n})"),
            HostValue::Float(n) => write!(f, "Float({n})"),
            HostValue::Double(n) => write!(f, "Double({n})"),
            HostValue::Bool(b) => write!(f, "Bool({b})"),
            HostValue::Str(s) => write!(f, "Str({s:?})"),
            HostValue::Object { class, .. } => write!(f, "Object({class})"),
        }
    }
}

/// Convert a script value for the host side. Functions, arrays, records and
/// class instances do not cross the boundary.
pub fn to_host(value: &Value) -> Option<HostValue> {
    match value {
        Value::Integer(n) => i32::try_from(*n).ok().map(HostValue::Int),
        Value::Float(n) => Some(HostValue::Float(*n)),
        Value::Double(n) => Some(HostValue::Double(*n)),
        Value::Boolean(b) => Some(HostValue::Bool(*b)),
        Value::Str(s) => Some(HostValue::Str(s.to_string())),
        Value::Host(obj) => obj.handle.as_ref().map(|handle| HostValue::Object {
            class: obj.runtime.name.clone(),
            handle: handle.clone(),
        }),
        _ => None,
    }
}

type ConstructorFn = Box<dyn Fn(&[HostValue]) -> EvalResult<HostHandle>>;
type MethodFn = Box<dyn Fn(&HostHandle, &[HostValue]) -> EvalResult<Option<HostValue>>>;
type StaticFn = Box<dyn Fn(&[HostValue]) -> EvalResult<Option<HostValue>>>;
type GetterFn = Box<dyn Fn(&HostHandle) -> EvalResult<HostValue>>;
type SetterFn = Box<dyn Fn(&HostHandle, HostValue) -> EvalResult<()>>;

struct HostConstructor {
    param_types: Vec<HostType>,
    build: ConstructorFn,
}

struct HostMethod {
    name: String,
    param_types: Vec<HostType>,
    /// `None` declares the method abstract: visible on the tag chain but
    /// implemented further down the runtime chain.
    body: Option<MethodFn>,
}

struct HostStatic {
    name: String,
    param_types: Vec<HostType>,
    body: StaticFn,
}

struct HostField {
    name: String,
    ty: HostType,
    get: GetterFn,
    set: SetterFn,
}

pub struct HostClass {
    name: String,
    parent: Option<String>,
    is_abstract: bool,
    constructors: Vec<HostConstructor>,
    methods: Vec<HostMethod>,
    statics: Vec<HostStatic>,
    fields: Vec<HostField>,
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl HostClass {
    pub fn new(name: impl Into<String>) -> HostClass {
        HostClass {
            name: name.into(),
            parent: None,
            is_abstract: false,
            constructors: Vec::new(),
            methods: Vec::new(),
            statics: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: &str) -> HostClass {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn abstract_class(mut self) -> HostClass {
        self.is_abstract = true;
        self
    }

    pub fn constructor(
        mut self,
        params: &[HostType],
        build: impl Fn(&[HostValue]) -> EvalResult<HostHandle> + 'static,
    ) -> HostClass {
        self.constructors.push(HostConstructor {
            param_types: params.to_vec(),
            build: Box::new(build),
        });
        self
    }

    pub fn method(
        mut self,
        name: &str,
        params: &[HostType],
        body: impl Fn(&HostHandle, &[HostValue]) -> EvalResult<Option<HostValue>> + 'static,
    ) -> HostClass {
        self.methods.push(HostMethod {
            name: name.to_string(),
            param_types: params.to_vec(),
            body: Some(Box::new(body)),
        });
        self
    }

    pub fn abstract_method(mut self, name: &str, params: &[HostType]) -> HostClass {
        self.methods.push(HostMethod {
            name: name.to_string(),
            param_types: params.to_vec(),
            body: None,
        });
        self
    }

    pub fn static_method(
        mut self,
        name: &str,
        params: &[HostType],
        body: impl Fn(&[HostValue]) -> EvalResult<Option<HostValue>> + 'static,
    ) -> HostClass {
        self.statics.push(HostStatic {
            name: name.to_string(),
            param_types: params.to_vec(),
            body: Box::new(body),
        });
        self
    }

    pub fn field(
        mut self,
        name: &str,
        ty: HostType,
        get: impl Fn(&HostHandle) -> EvalResult<HostValue> + 'static,
        set: impl Fn(&HostHandle, HostValue) -> EvalResult<()> + 'static,
    ) -> HostClass {
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            get: Box::new(get),
            set: Box::new(set),
        });
        self
    }
}

/// A host-side value as seen by scripts: either a live object or, when
/// `handle` is `None`, a class handle for static access.
#[derive(Clone)]
pub struct HostObject {
    class: Arc<HostClass>,
    runtime: Arc<HostClass>,
    handle: Option<HostHandle>,
}

impl HostObject {
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn is_class_handle(&self) -> bool {
        self.handle.is_none()
    }

    pub fn same_object(&self, other: &HostObject) -> bool {
        match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => Arc::ptr_eq(&self.class, &other.class),
            _ => false,
        }
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class", &self.class.name)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle {
            None => write!(f, "{}", self.class.name),
            Some(_) => write!(f, "{} instance", self.class.name),
        }
    }
}

#[derive(Debug, Default)]
pub struct HostRegistry {
    classes: HashMap<String, Arc<HostClass>>,
}

impl HostRegistry {
    pub fn new() -> HostRegistry {
        HostRegistry::default()
    }

    pub fn register(&mut self, class: HostClass) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn find(&self, name: &str) -> Option<Arc<HostClass>> {
        self.classes.get(name).cloned()
    }

    pub fn is_ancestor(&self, ancestor: &str, class: &Arc<HostClass>) -> bool {
        let mut cursor = class.clone();
        while let Some(parent_name) = cursor.parent.clone() {
            if parent_name == ancestor {
                return true;
            }
            match self.find(&parent_name) {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        false
    }

    /// The class itself followed by its ancestors, nearest first.
    fn chain(&self, start: &Arc<HostClass>) -> Vec<Arc<HostClass>> {
        let mut chain = vec![start.clone()];
        let mut cursor = start.clone();
        while let Some(parent_name) = cursor.parent.clone() {
            match self.find(&parent_name) {
                Some(parent) => {
                    chain.push(parent.clone());
                    cursor = parent;
                }
                None => break,
            }
        }
        chain
    }

    fn param_matches(&self, want: HostType, got: &HostValue) -> bool {
        match (want, got) {
            (HostType::Int, HostValue::Int(_)) => true,
            (HostType::Float, HostValue::Float(_)) => true,
            (HostType::Double, HostValue::Double(_)) => true,
            (HostType::Bool, HostValue::Bool(_)) => true,
            (HostType::Str, HostValue::Str(_)) => true,
            (HostType::Object(want_class), HostValue::Object { class, .. }) => {
                class == want_class
                    || self
                        .find(class)
                        .map(|c| self.is_ancestor(want_class, &c))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }

    fn signature_matches(&self, want: &[HostType], got: &[HostValue]) -> bool {
        want.len() == got.len()
            && want
                .iter()
                .zip(got)
                .all(|(ty, value)| self.param_matches(*ty, value))
    }

    fn find_instance_method(
        &self,
        start: &Arc<HostClass>,
        name: &str,
        args: &[HostValue],
    ) -> Option<(Arc<HostClass>, usize)> {
        for class in self.chain(start) {
            if let Some(i) = class.methods.iter().position(|m| {
                m.name == name && self.signature_matches(&m.param_types, args)
            }) {
                return Some((class, i));
            }
        }
        None
    }

    fn find_implementation(
        &self,
        start: &Arc<HostClass>,
        name: &str,
        args: &[HostValue],
    ) -> Option<(Arc<HostClass>, usize)> {
        for class in self.chain(start) {
            if let Some(i) = class.methods.iter().position(|m| {
                m.name == name && m.body.is_some() && self.signature_matches(&m.param_types, args)
            }) {
                return Some((class, i));
            }
        }
        None
    }

    fn find_static(
        &self,
        start: &Arc<HostClass>,
        name: &str,
        args: &[HostValue],
    ) -> Option<(Arc<HostClass>, usize)> {
        for class in self.chain(start) {
            if let Some(i) = class.statics.iter().position(|s| {
                s.name == name && self.signature_matches(&s.param_types, args)
            }) {
                return Some((class, i));
            }
        }
        None
    }

    fn from_host(&self, value: HostValue) -> EvalResult<Value> {
        Ok(match value {
            HostValue::Int(n) => Value::Integer(i64::from(n)),
            HostValue::Float(n) => Value::Float(n),
            HostValue::Double(n) => Value::Double(n),
            HostValue::Bool(b) => Value::Boolean(b),
            HostValue::Str(s) => Value::Str(Arc::from(s.as_str())),
            HostValue::Object { class, handle } => {
                let descriptor = self
                    .find(&class)
                    .ok_or_else(|| EvalError::HostClassNotFound(class.clone()))?;
                Value::Host(HostObject {
                    class: descriptor.clone(),
                    runtime: descriptor,
                    handle: Some(handle),
                })
            }
        })
    }

    /// A class handle for static access, as produced by `reflection("name")`.
    pub fn class_handle(&self, class_name: &str) -> EvalResult<Value> {
        let class = self
            .find(class_name)
            .ok_or_else(|| EvalError::HostClassNotFound(class_name.to_string()))?;
        Ok(Value::Host(HostObject {
            class: class.clone(),
            runtime: class,
            handle: None,
        }))
    }

    pub fn construct(&self, class_name: &str, args: &[Value]) -> EvalResult<Value> {
        tracing::debug!("Constructing host object {}", class_name);
        let class = self
            .find(class_name)
            .ok_or_else(|| EvalError::HostClassNotFound(class_name.to_string()))?;
        if class.is_abstract {
            return Err(EvalError::HostInstantiationFailed(class_name.to_string()));
        }
        let mut host_args = Vec::with_capacity(args.len());
        for arg in args {
            match to_host(arg) {
                Some(value) => host_args.push(value),
                None => return Err(EvalError::HostConstructorArguments(class_name.to_string())),
            }
        }
        let ctor = class
            .constructors
            .iter()
            .find(|ctor| self.signature_matches(&ctor.param_types, &host_args));
        let Some(ctor) = ctor else {
            return Err(if args.is_empty() {
                EvalError::HostDefaultInstantiationFailed(class_name.to_string())
            } else {
                EvalError::HostConstructorNotFound(class_name.to_string())
            });
        };
        let handle = (ctor.build)(&host_args)?;
        Ok(Value::Host(HostObject {
            class: class.clone(),
            runtime: class,
            handle: Some(handle),
        }))
    }

    pub fn invoke(
        &self,
        obj: &HostObject,
        method: &str,
        args: &[Value],
    ) -> EvalResult<Option<Value>> {
        tracing::debug!("Invoking host method {} on {}", method, obj.class.name);
        let mut host_args = Vec::with_capacity(args.len());
        for arg in args {
            match to_host(arg) {
                Some(value) => host_args.push(value),
                None => return Err(EvalError::HostMethodFailed(method.to_string())),
            }
        }
        match &obj.handle {
            None => match self.find_static(&obj.class, method, &host_args) {
                Some((class, i)) => {
                    let out = (class.statics[i].body)(&host_args)?;
                    out.map(|value| self.from_host(value)).transpose()
                }
                None => {
                    if self
                        .find_instance_method(&obj.class, method, &host_args)
                        .is_some()
                    {
                        Err(EvalError::HostTargetInvalid)
                    } else {
                        Err(EvalError::HostMethodFailed(method.to_string()))
                    }
                }
            },
            Some(handle) => {
                if self
                    .find_instance_method(&obj.class, method, &host_args)
                    .is_some()
                {
                    let (class, i) = self
                        .find_implementation(&obj.runtime, method, &host_args)
                        .ok_or_else(|| EvalError::HostMethodFailed(method.to_string()))?;
                    let body = class.methods[i]
                        .body
                        .as_ref()
                        .ok_or_else(|| EvalError::HostMethodFailed(method.to_string()))?;
                    let out = body(handle, &host_args)?;
                    out.map(|value| self.from_host(value)).transpose()
                } else if let Some((class, i)) = self.find_static(&obj.class, method, &host_args) {
                    let out = (class.statics[i].body)(&host_args)?;
                    out.map(|value| self.from_host(value)).transpose()
                } else {
                    Err(EvalError::HostMethodFailed(method.to_string()))
                }
            }
        }
    }

    pub fn get_field(&self, obj: &HostObject, name: &str) -> EvalResult<Value> {
        let Some(handle) = &obj.handle else {
            return Err(EvalError::UndefinedMember);
        };
        for class in self.chain(&obj.class) {
            if let Some(i) = class.fields.iter().position(|f| f.name == name) {
                let out = (class.fields[i].get)(handle)?;
                return self.from_host(out);
            }
        }
        Err(EvalError::UndefinedMember)
    }

    pub fn set_field(&self, obj: &HostObject, name: &str, value: Value) -> EvalResult<()> {
        let Some(handle) = &obj.handle else {
            return Err(EvalError::UndefinedMember);
        };
        for class in self.chain(&obj.class) {
            if let Some(i) = class.fields.iter().position(|f| f.name == name) {
                let field = &class.fields[i];
                let converted = to_host(&value)
                    .filter(|got| self.param_matches(field.ty, got))
                    .ok_or_else(|| {
                        EvalError::assign_mismatch(value.type_name(), host_type_name(field.ty))
                    })?;
                return (field.set)(handle, converted);
            }
        }
        Err(EvalError::UndefinedMember)
    }

    /// Re-tag `obj` as `class_name`, which must be its runtime class or one
    /// of that class's ancestors.
    pub fn cast(&self, obj: &HostObject, class_name: &str) -> EvalResult<Value> {
        let target = self
            .find(class_name)
            .ok_or_else(|| EvalError::HostClassNotFound(class_name.to_string()))?;
        if obj.runtime.name == class_name || self.is_ancestor(class_name, &obj.runtime) {
            Ok(Value::Host(HostObject {
                class: target,
                runtime: obj.runtime.clone(),
                handle: obj.handle.clone(),
            }))
        } else {
            Err(EvalError::UnsupportedCast)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry_with_pair() -> HostRegistry {
        let mut registry = HostRegistry::new();
        registry.register(HostClass::new("demo.Base").abstract_class());
        registry.register(
            HostClass::new("demo.Leaf")
                .with_parent("demo.Base")
                .constructor(&[], |_| Ok(Arc::new(RefCell::new(0_i32)) as HostHandle)),
        );
        registry
    }

    #[test]
    fn ancestry_follows_parent_names() {
        let registry = registry_with_pair();
        let leaf = registry.find("demo.Leaf").unwrap();
        assert!(registry.is_ancestor("demo.Base", &leaf));
        assert!(!registry.is_ancestor("demo.Leaf", &leaf));
    }

    #[test]
    fn abstract_classes_cannot_be_constructed() {
        let registry = registry_with_pair();
        let err = registry.construct("demo.Base", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Could not create instance of demo.Base.");
    }

    #[test]
    fn unknown_classes_are_reported_with_the_full_path() {
        let registry = registry_with_pair();
        let err = registry.construct("demo.Missing", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find demo.Missing. Verify that full class path is present."
        );
    }

    #[test]
    fn out_of_range_integers_do_not_convert() {
        assert!(to_host(&Value::Integer(i64::from(i32::MAX) + 1)).is_none());
        assert!(matches!(
            to_host(&Value::Integer(42)),
            Some(HostValue::Int(42))
        ));
    }

    #[test]
    fn upcast_and_back() {
        let registry = registry_with_pair();
        let value = registry.construct("demo.Leaf", &[]).unwrap();
        let Value::Host(obj) = value else {
            panic!("expected host object");
        };
        let Value::Host(tagged) = registry.cast(&obj, "demo.Base").unwrap() else {
            panic!("expected host object");
        };
        assert_eq!(tagged.class_name(), "demo.Base");
        let Value::Host(again) = registry.cast(&tagged, "demo.Leaf").unwrap() else {
            panic!("expected host object");
        };
        assert_eq!(again.class_name(), "demo.Leaf");
    }
}
