//! The scope display.
//!
//! Scoping follows a classic display: a fixed ladder of levels, one per
//! lexical function-nesting depth, each holding the activation record of the
//! innermost active call at that depth. Entering a call swaps its record in
//! at the signature's depth and the displaced record is restored on exit, so
//! recursion works without the display growing.
//!
//! An activation record's slots are `Option`s. A retracted name keeps its
//! slot in the signature's shared map but the cell is cleared, which makes
//! the name invisible to lookup while later redefinitions reuse the slot.

use std::cell::RefCell;
use std::sync::Arc;

use crate::class::{ClassDescriptor, InterfaceDescriptor};
use crate::error::{EvalError, EvalResult};
use crate::function::FunctionSignature;
use crate::value::Value;

/// Maximum function nesting depth, and therefore the height of the display.
pub const MAX_NESTING: usize = 64;

#[derive(Debug)]
struct SlotValue {
    value: Value,
    is_const: bool,
}

/// One activation of a function: the signature plus the slot contents for
/// this particular call.
#[derive(Debug)]
pub struct ActivationRecord {
    signature: Arc<FunctionSignature>,
    slots: RefCell<Vec<Option<SlotValue>>>,
}

impl ActivationRecord {
    pub fn new(signature: Arc<FunctionSignature>) -> ActivationRecord {
        ActivationRecord {
            signature,
            slots: RefCell::new(Vec::new()),
        }
    }

    pub fn signature(&self) -> &Arc<FunctionSignature> {
        &self.signature
    }

    /// Bind call arguments into parameter slots, checking count and types the
    /// way the arguments arrive: an extra argument is reported as soon as it
    /// is seen, missing ones only once the list is exhausted.
    pub fn bind_arguments(&self, args: &[Value]) -> EvalResult<()> {
        let params = self.signature.params();
        for (i, value) in args.iter().enumerate() {
            if i >= params.len() {
                return Err(EvalError::WrongArgCount {
                    signature: self.signature.signature_string(),
                    expected: params.len(),
                    got: i + 1,
                });
            }
            let (_, ty) = params[i];
            if !value.matches_type(ty) {
                return Err(EvalError::ParameterTypeMismatch {
                    got: value.type_name(),
                    want: ty.as_str(),
                });
            }
            self.write_slot(
                i,
                SlotValue {
                    value: value.clone(),
                    is_const: false,
                },
            );
        }
        if args.len() < params.len() {
            return Err(EvalError::WrongArgCount {
                signature: self.signature.signature_string(),
                expected: params.len(),
                got: args.len(),
            });
        }
        Ok(())
    }

    fn write_slot(&self, slot: usize, contents: SlotValue) {
        let mut slots = self.slots.borrow_mut();
        if slot >= slots.len() {
            slots.resize_with(slot + 1, || None);
        }
        slots[slot] = Some(contents);
    }

    pub fn define(&self, name: &str, value: Value, is_const: bool) -> usize {
        let slot = self.signature.ensure_slot(name);
        self.write_slot(slot, SlotValue { value, is_const });
        slot
    }

    /// Slot index of `name`, if the name is defined and currently occupied.
    pub fn find_slot(&self, name: &str) -> Option<usize> {
        let slot = self.signature.slot_of(name)?;
        match self.slots.borrow().get(slot) {
            Some(Some(_)) => Some(slot),
            _ => None,
        }
    }

    pub fn get(&self, slot: usize) -> Option<Value> {
        self.slots
            .borrow()
            .get(slot)
            .and_then(|cell| cell.as_ref())
            .map(|sv| sv.value.clone())
    }

    pub fn set(&self, slot: usize, value: Value) -> EvalResult<()> {
        let mut slots = self.slots.borrow_mut();
        match slots.get_mut(slot) {
            Some(Some(existing)) => {
                if existing.is_const {
                    return Err(EvalError::ConstReassignment);
                }
                existing.value = value;
                Ok(())
            }
            _ => {
                drop(slots);
                self.write_slot(
                    slot,
                    SlotValue {
                        value,
                        is_const: false,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn clear_slot(&self, name: &str) {
        if let Some(slot) = self.signature.slot_of(name) {
            if let Some(cell) = self.slots.borrow_mut().get_mut(slot) {
                *cell = None;
            }
        }
    }

    /// Names currently visible in this record, in slot order.
    pub fn variable_names(&self) -> Vec<String> {
        let slots = self.slots.borrow();
        self.signature
            .slot_names()
            .into_iter()
            .enumerate()
            .filter(|(slot, _)| matches!(slots.get(*slot), Some(Some(_))))
            .map(|(_, name)| name)
            .collect()
    }
}

/// A resolved variable: the record that owns it plus the slot index. Reads
/// and writes go straight to the slot, so a reference stays valid for the
/// rest of the call that produced it.
#[derive(Debug, Clone)]
pub struct Reference {
    record: Arc<ActivationRecord>,
    slot: usize,
}

impl Reference {
    pub fn value(&self) -> Option<Value> {
        self.record.get(self.slot)
    }

    pub fn assign(&self, value: Value) -> EvalResult<()> {
        self.record.set(self.slot, value)
    }
}

/// State needed to undo an `activate`. Produced and consumed in pairs by the
/// evaluator around each call.
#[derive(Debug)]
pub struct DisplayFrame {
    depth: usize,
    displaced: Option<Arc<ActivationRecord>>,
    prior: Arc<ActivationRecord>,
    prior_level: usize,
}

/// Names introduced at the current level, captured before a block runs so
/// strictly-new ones can be retracted afterwards.
#[derive(Debug)]
pub struct ScopeSnapshot {
    pub variables: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug)]
pub struct Display {
    records: Vec<Option<Arc<ActivationRecord>>>,
    current: Arc<ActivationRecord>,
    current_level: usize,
}

impl Display {
    pub fn new() -> Display {
        let root = Arc::new(ActivationRecord::new(Arc::new(FunctionSignature::root())));
        let mut records = Vec::new();
        records.resize_with(MAX_NESTING, || None);
        records[0] = Some(root.clone());
        Display {
            records,
            current: root,
            current_level: 0,
        }
    }

    pub fn level(&self) -> usize {
        self.current_level
    }

    pub fn current_record(&self) -> Arc<ActivationRecord> {
        self.current.clone()
    }

    /// Swap `record` in at its signature's depth and make it the current
    /// level. The returned frame must be handed back to [`Display::restore`].
    pub fn activate(&mut self, record: Arc<ActivationRecord>) -> EvalResult<DisplayFrame> {
        let depth = record.signature().depth();
        if depth >= MAX_NESTING {
            return Err(EvalError::NestingTooDeep);
        }
        let displaced = std::mem::replace(&mut self.records[depth], Some(record.clone()));
        let frame = DisplayFrame {
            depth,
            displaced,
            prior: std::mem::replace(&mut self.current, record),
            prior_level: self.current_level,
        };
        self.current_level = depth;
        Ok(frame)
    }

    pub fn restore(&mut self, frame: DisplayFrame) {
        self.records[frame.depth] = frame.displaced;
        self.current = frame.prior;
        self.current_level = frame.prior_level;
    }

    // ====== Variables ====== //

    pub fn find_reference(&self, name: &str) -> Option<Reference> {
        for level in (0..=self.current_level).rev() {
            if let Some(record) = &self.records[level] {
                if let Some(slot) = record.find_slot(name) {
                    return Some(Reference {
                        record: record.clone(),
                        slot,
                    });
                }
            }
        }
        None
    }

    pub fn define_variable(&self, name: &str, value: Value, is_const: bool) -> Reference {
        let slot = self.current.define(name, value, is_const);
        Reference {
            record: self.current.clone(),
            slot,
        }
    }

    pub fn retract_variable(&self, name: &str) {
        self.current.clear_slot(name);
    }

    // ====== Functions ====== //

    pub fn find_function(&self, name: &str) -> Option<Arc<FunctionSignature>> {
        for level in (0..=self.current_level).rev() {
            if let Some(record) = &self.records[level] {
                if let Some(sig) = record.signature().find_function(name) {
                    return Some(sig);
                }
            }
        }
        None
    }

    pub fn find_function_in_current_level(&self, name: &str) -> Option<Arc<FunctionSignature>> {
        self.current.signature().find_function(name)
    }

    pub fn add_function(&self, sig: Arc<FunctionSignature>) {
        self.current.signature().add_function(sig);
    }

    pub fn retract_function(&self, name: &str) {
        self.current.signature().remove_function(name);
    }

    // ====== Classes ====== //

    pub fn find_class(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        for level in (0..=self.current_level).rev() {
            if let Some(record) = &self.records[level] {
                if let Some(class) = record.signature().find_class(name) {
                    return Some(class);
                }
            }
        }
        None
    }

    pub fn find_class_in_current_level(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.current.signature().find_class(name)
    }

    pub fn add_class(&self, class: Arc<ClassDescriptor>) {
        self.current.signature().add_class(class);
    }

    pub fn retract_class(&self, name: &str) {
        self.current.signature().remove_class(name);
    }

    // ====== Interfaces ====== //

    pub fn find_interface(&self, name: &str) -> Option<Arc<InterfaceDescriptor>> {
        for level in (0..=self.current_level).rev() {
            if let Some(record) = &self.records[level] {
                if let Some(interface) = record.signature().find_interface(name) {
                    return Some(interface);
                }
            }
        }
        None
    }

    pub fn add_interface(&self, interface: Arc<InterfaceDescriptor>) {
        self.current.signature().add_interface(interface);
    }

    pub fn retract_interface(&self, name: &str) {
        self.current.signature().remove_interface(name);
    }

    /// Everything named at the current level right now.
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            variables: self.current.variable_names(),
            functions: self.current.signature().function_names(),
            classes: self.current.signature().class_names(),
            interfaces: self.current.signature().interface_names(),
        }
    }
}

impl Default for Display {
    fn default() -> Display {
        Display::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_parser::TypeName;
    use pretty_assertions::assert_eq;

    fn signature_at(depth: usize) -> Arc<FunctionSignature> {
        Arc::new(
            FunctionSignature::new(
                format!("f{depth}"),
                depth,
                &[],
                TypeName::Void,
                Vec::new(),
                None,
            )
            .unwrap(),
        )
    }

    #[test]
    fn define_then_find() {
        let display = Display::new();
        display.define_variable("x", Value::Integer(7), false);
        let reference = display.find_reference("x").unwrap();
        assert_eq!(reference.value().unwrap().as_integer(), Some(7));
        assert!(display.find_reference("y").is_none());
    }

    #[test]
    fn const_slots_reject_writes() {
        let display = Display::new();
        display.define_variable("x", Value::Integer(1), true);
        let reference = display.find_reference("x").unwrap();
        let err = reference.assign(Value::Integer(2)).unwrap_err();
        assert_eq!(err.to_string(), "Cannot re-assign to constant value.");
    }

    #[test]
    fn retraction_hides_the_name_and_reuses_the_slot() {
        let display = Display::new();
        display.define_variable("x", Value::Integer(1), false);
        display.retract_variable("x");
        assert!(display.find_reference("x").is_none());

        display.define_variable("x", Value::Integer(2), false);
        let record = display.current_record();
        assert_eq!(record.find_slot("x"), Some(0));
        assert_eq!(record.variable_names(), vec!["x".to_string()]);
    }

    #[test]
    fn activation_swaps_levels_in_and_out() {
        let mut display = Display::new();
        display.define_variable("global", Value::Integer(1), false);

        let record = Arc::new(ActivationRecord::new(signature_at(1)));
        let frame = display.activate(record).unwrap();
        assert_eq!(display.level(), 1);
        display.define_variable("local", Value::Integer(2), false);
        assert!(display.find_reference("global").is_some());

        display.restore(frame);
        assert_eq!(display.level(), 0);
        assert!(display.find_reference("local").is_none());
    }

    #[test]
    fn nesting_is_bounded() {
        let mut display = Display::new();
        let record = Arc::new(ActivationRecord::new(signature_at(MAX_NESTING)));
        let err = display.activate(record).unwrap_err();
        assert_eq!(err.to_string(), "Functions nested too deeply.");
    }

    #[test]
    fn argument_binding_reports_arity() {
        let sig = Arc::new(
            FunctionSignature::new(
                "f".to_string(),
                1,
                &[flint_parser::Param {
                    ty: TypeName::Int,
                    name: flint_parser::Identifier {
                        name: "a".to_string(),
                        span: flint_parser::Span::default(),
                    },
                }],
                TypeName::Void,
                Vec::new(),
                None,
            )
            .unwrap(),
        );
        let record = ActivationRecord::new(sig);
        let err = record
            .bind_arguments(&[Value::Integer(1), Value::Integer(2)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Function f(int) expected 1 arguments but got 2."
        );
        let err = record.bind_arguments(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Function f(int) expected 1 arguments but got 0."
        );
    }
}
