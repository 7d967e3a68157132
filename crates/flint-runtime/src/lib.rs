//! Runtime for the flint scripting language.
//!
//! The runtime takes the AST produced by `flint-parser` and evaluates it
//! directly. Evaluation is single threaded; interior mutability is used for
//! the scope display, instance fields and array cells so that values can be
//! shared freely through `Arc` without a mutex.

#![allow(clippy::arc_with_non_send_sync)]

pub mod class;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod interop;
pub mod value;

pub use class::{ClassDescriptor, FieldTemplate, Instance, InterfaceDescriptor};
pub use display::{ActivationRecord, Display, Reference, MAX_NESTING};
pub use error::{EvalError, EvalResult};
pub use evaluator::Evaluator;
pub use function::FunctionSignature;
pub use interop::{HostClass, HostHandle, HostObject, HostRegistry, HostType, HostValue};
pub use value::{ArrayValue, RecordValue, Value};
