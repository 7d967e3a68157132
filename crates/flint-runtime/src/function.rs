//! Function signatures.
//!
//! A `FunctionSignature` is the shared, immutable part of a function: name,
//! parameters, body and the slot-name map for its activation records. The
//! map is shared by every invocation of the function, so a name claims the
//! same slot index on every call. Retraction clears the slot's contents in a
//! record without disturbing the map.
//!
//! Functions, classes and interfaces defined inside the body live in nested
//! tables on the signature, mirroring the levels of the runtime display.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use flint_parser::{Expr, Param, Stmt, TypeName};

use crate::class::{ClassDescriptor, InterfaceDescriptor};
use crate::error::{EvalError, EvalResult};

#[derive(Debug)]
pub struct FunctionSignature {
    name: String,
    depth: usize,
    params: Vec<(String, TypeName)>,
    return_type: TypeName,
    body: Vec<Stmt>,
    return_expr: Option<Expr>,
    slots: RefCell<IndexMap<String, usize>>,
    functions: RefCell<HashMap<String, Arc<FunctionSignature>>>,
    classes: RefCell<HashMap<String, Arc<ClassDescriptor>>>,
    interfaces: RefCell<HashMap<String, Arc<InterfaceDescriptor>>>,
}

impl FunctionSignature {
    pub fn new(
        name: String,
        depth: usize,
        params: &[Param],
        return_type: TypeName,
        body: Vec<Stmt>,
        return_expr: Option<Expr>,
    ) -> EvalResult<FunctionSignature> {
        if return_type != TypeName::Void && return_expr.is_none() {
            return Err(EvalError::ReturnTypeWithoutReturn);
        }
        let mut slots = IndexMap::new();
        let mut param_list = Vec::with_capacity(params.len());
        for param in params {
            let slot = slots.len();
            if slots.insert(param.name.name.clone(), slot).is_some() {
                return Err(EvalError::ParameterExists {
                    name: param.name.name.clone(),
                    function: name,
                });
            }
            param_list.push((param.name.name.clone(), param.ty));
        }
        Ok(FunctionSignature {
            name,
            depth,
            params: param_list,
            return_type,
            body,
            return_expr,
            slots: RefCell::new(slots),
            functions: RefCell::new(HashMap::new()),
            classes: RefCell::new(HashMap::new()),
            interfaces: RefCell::new(HashMap::new()),
        })
    }

    /// The signature backing the top level of a program.
    pub fn root() -> FunctionSignature {
        FunctionSignature {
            name: "%main".to_string(),
            depth: 0,
            params: Vec::new(),
            return_type: TypeName::Void,
            body: Vec::new(),
            return_expr: None,
            slots: RefCell::new(IndexMap::new()),
            functions: RefCell::new(HashMap::new()),
            classes: RefCell::new(HashMap::new()),
            interfaces: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display level this function's activation records occupy.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn return_type(&self) -> TypeName {
        self.return_type
    }

    pub fn has_return(&self) -> bool {
        self.return_expr.is_some()
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn return_expr(&self) -> Option<&Expr> {
        self.return_expr.as_ref()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[(String, TypeName)] {
        &self.params
    }

    /// `name(int,string)` form used in arity diagnostics.
    pub fn signature_string(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|(_, ty)| ty.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    // ====== Slot map ====== //

    /// Slot index for `name`, claiming a fresh one on first use.
    pub fn ensure_slot(&self, name: &str) -> usize {
        let mut slots = self.slots.borrow_mut();
        if let Some(slot) = slots.get(name) {
            return *slot;
        }
        let slot = slots.len();
        slots.insert(name.to_string(), slot);
        slot
    }

    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots.borrow().get(name).copied()
    }

    pub fn slot_names(&self) -> Vec<String> {
        self.slots.borrow().keys().cloned().collect()
    }

    // ====== Nested definitions ====== //

    pub fn add_function(&self, sig: Arc<FunctionSignature>) {
        self.functions
            .borrow_mut()
            .insert(sig.name().to_string(), sig);
    }

    pub fn find_function(&self, name: &str) -> Option<Arc<FunctionSignature>> {
        self.functions.borrow().get(name).cloned()
    }

    pub fn remove_function(&self, name: &str) {
        self.functions.borrow_mut().remove(name);
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.borrow().keys().cloned().collect()
    }

    pub fn add_class(&self, class: Arc<ClassDescriptor>) {
        self.classes
            .borrow_mut()
            .insert(class.name().to_string(), class);
    }

    pub fn find_class(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn remove_class(&self, name: &str) {
        self.classes.borrow_mut().remove(name);
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.borrow().keys().cloned().collect()
    }

    pub fn add_interface(&self, interface: Arc<InterfaceDescriptor>) {
        self.interfaces
            .borrow_mut()
            .insert(interface.name().to_string(), interface);
    }

    pub fn find_interface(&self, name: &str) -> Option<Arc<InterfaceDescriptor>> {
        self.interfaces.borrow().get(name).cloned()
    }

    pub fn remove_interface(&self, name: &str) {
        self.interfaces.borrow_mut().remove(name);
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_parser::Identifier;
    use pretty_assertions::assert_eq;

    fn param(ty: TypeName, name: &str) -> Param {
        Param {
            ty,
            name: Identifier {
                name: name.to_string(),
                span: flint_parser::Span::default(),
            },
        }
    }

    #[test]
    fn signature_string_lists_parameter_types() {
        let sig = FunctionSignature::new(
            "add".to_string(),
            1,
            &[param(TypeName::Int, "a"), param(TypeName::Int, "b")],
            TypeName::Void,
            Vec::new(),
            None,
        )
        .unwrap();
        assert_eq!(sig.signature_string(), "add(int,int)");
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let err = FunctionSignature::new(
            "f".to_string(),
            1,
            &[param(TypeName::Int, "x"), param(TypeName::Str, "x")],
            TypeName::Void,
            Vec::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Parameter x already exists in function f");
    }

    #[test]
    fn return_type_requires_a_return_expression() {
        let err = FunctionSignature::new(
            "f".to_string(),
            1,
            &[],
            TypeName::Int,
            Vec::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set return type for function without return expression."
        );
    }

    #[test]
    fn slots_are_stable_across_calls() {
        let sig = FunctionSignature::new(
            "f".to_string(),
            1,
            &[param(TypeName::Int, "x")],
            TypeName::Void,
            Vec::new(),
            None,
        )
        .unwrap();
        assert_eq!(sig.slot_of("x"), Some(0));
        assert_eq!(sig.ensure_slot("local"), 1);
        assert_eq!(sig.ensure_slot("local"), 1);
        assert_eq!(sig.slot_names(), vec!["x".to_string(), "local".to_string()]);
    }
}
