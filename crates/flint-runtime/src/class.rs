//! Classes, instances and interfaces.
//!
//! A `ClassDescriptor` is built once when the class definition is evaluated:
//! field templates with their definition-time default values, methods, an
//! optional constructor and any nested classes. Instantiation copies the
//! templates into a fresh `Instance`; because composite values share their
//! payload through `Arc`, a composite default is shared between instances
//! while primitives are copied.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use flint_parser::{Modifier, TypeName};

use crate::error::{EvalError, EvalResult};
use crate::function::FunctionSignature;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct FieldTemplate {
    pub modifier: Modifier,
    pub ty: TypeName,
    pub default: Value,
}

#[derive(Debug)]
struct ClassConstructor {
    key: String,
    signature: Arc<FunctionSignature>,
}

#[derive(Debug)]
pub struct ClassDescriptor {
    name: String,
    depth: usize,
    fields: IndexMap<String, FieldTemplate>,
    methods: HashMap<String, Arc<FunctionSignature>>,
    nested: HashMap<String, Arc<ClassDescriptor>>,
    constructor: Option<ClassConstructor>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>, depth: usize) -> ClassDescriptor {
        ClassDescriptor {
            name: name.into(),
            depth,
            fields: IndexMap::new(),
            methods: HashMap::new(),
            nested: HashMap::new(),
            constructor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn define_field(
        &mut self,
        name: &str,
        modifier: Modifier,
        ty: TypeName,
        default: Value,
    ) -> EvalResult<()> {
        if self.fields.contains_key(name) {
            return Err(EvalError::FieldExists {
                name: name.to_string(),
                class: self.name.clone(),
            });
        }
        self.fields.insert(
            name.to_string(),
            FieldTemplate {
                modifier,
                ty,
                default,
            },
        );
        Ok(())
    }

    /// Methods are keyed by name; a redefinition replaces the earlier one.
    pub fn add_method(&mut self, sig: Arc<FunctionSignature>) {
        self.methods.insert(sig.name().to_string(), sig);
    }

    pub fn set_constructor(
        &mut self,
        key: String,
        signature: Arc<FunctionSignature>,
    ) -> EvalResult<()> {
        if self.constructor.is_some() {
            return Err(EvalError::DuplicateConstructor(self.name.clone()));
        }
        self.constructor = Some(ClassConstructor { key, signature });
        Ok(())
    }

    pub fn add_nested(&mut self, class: Arc<ClassDescriptor>) {
        self.nested.insert(class.name().to_string(), class);
    }

    pub fn find_method(&self, name: &str) -> Option<Arc<FunctionSignature>> {
        self.methods.get(name).cloned()
    }

    pub fn find_nested(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.nested.get(name).cloned()
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// The constructor, provided its overload key matches the call.
    pub fn matching_constructor(&self, key: &str) -> Option<Arc<FunctionSignature>> {
        match &self.constructor {
            Some(ctor) if ctor.key == key => Some(ctor.signature.clone()),
            _ => None,
        }
    }

    pub fn field_templates(&self) -> impl Iterator<Item = (&String, &FieldTemplate)> {
        self.fields.iter()
    }
}

// ====== Instances ====== //

#[derive(Debug)]
struct FieldSlot {
    modifier: Modifier,
    ty: TypeName,
    value: Value,
}

/// A live object. Field writes enforce the declared modifiers: `const`
/// fields never change, `readonly` fields change only while the instance's
/// constructor is running.
#[derive(Debug)]
pub struct Instance {
    class: Arc<ClassDescriptor>,
    fields: RefCell<IndexMap<String, FieldSlot>>,
    in_constructor: Cell<bool>,
}

impl Instance {
    pub fn instantiate(class: &Arc<ClassDescriptor>) -> Arc<Instance> {
        let fields = class
            .field_templates()
            .map(|(name, template)| {
                (
                    name.clone(),
                    FieldSlot {
                        modifier: template.modifier,
                        ty: template.ty,
                        value: template.default.clone(),
                    },
                )
            })
            .collect();
        Arc::new(Instance {
            class: class.clone(),
            fields: RefCell::new(fields),
            in_constructor: Cell::new(false),
        })
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> EvalResult<Value> {
        self.try_get_field(name).ok_or(EvalError::UndefinedMember)
    }

    pub fn try_get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).map(|slot| slot.value.clone())
    }

    pub fn set_field(&self, name: &str, value: Value) -> EvalResult<()> {
        let mut fields = self.fields.borrow_mut();
        let slot = fields.get_mut(name).ok_or(EvalError::UndefinedMember)?;
        match slot.modifier {
            Modifier::Const => return Err(EvalError::ConstFieldWrite),
            Modifier::Readonly if !self.in_constructor.get() => {
                return Err(EvalError::ReadonlyFieldWrite)
            }
            _ => {}
        }
        if !value.matches_type(slot.ty) {
            return Err(EvalError::assign_mismatch(value.type_name(), slot.ty.as_str()));
        }
        slot.value = value;
        Ok(())
    }

    pub fn set_in_constructor(&self, active: bool) {
        self.in_constructor.set(active);
    }
}

// ====== Interfaces ====== //

#[derive(Debug, Clone)]
pub struct InterfaceMethodSig {
    pub name: String,
    pub return_type: TypeName,
    pub param_types: Vec<TypeName>,
}

#[derive(Debug)]
pub struct InterfaceDescriptor {
    name: String,
    methods: Vec<InterfaceMethodSig>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, methods: Vec<InterfaceMethodSig>) -> InterfaceDescriptor {
        InterfaceDescriptor {
            name: name.into(),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check that `class` provides every method the interface requires, with
    /// matching parameter and return types.
    pub fn check_conformance(&self, class: &ClassDescriptor) -> EvalResult<()> {
        for method in &self.methods {
            let satisfied = class.find_method(&method.name).is_some_and(|sig| {
                sig.return_type() == method.return_type
                    && sig.param_count() == method.param_types.len()
                    && sig
                        .params()
                        .iter()
                        .zip(&method.param_types)
                        .all(|((_, ty), want)| ty == want)
            });
            if !satisfied {
                return Err(EvalError::InterfaceNotSatisfied {
                    class: class.name().to_string(),
                    interface: self.name.clone(),
                    function: method.name.clone(),
                });
            }
        }
        Ok(())
    }
}
