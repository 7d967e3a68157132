//! The `text` classes.

use std::cell::RefCell;
use std::sync::Arc;

use flint_runtime::{
    EvalError, EvalResult, HostClass, HostHandle, HostRegistry, HostType, HostValue,
};

struct BuilderData {
    buf: String,
}

pub fn register(registry: &mut HostRegistry) {
    registry.register(builder_class());
}

/// `text.StringBuilder` accumulates text; `append` is overloaded for strings
/// and integers.
fn builder_class() -> HostClass {
    HostClass::new("text.StringBuilder")
        .constructor(&[], |_args| Ok(builder_handle(String::new())))
        .constructor(&[HostType::Str], |args| {
            Ok(builder_handle(str_value(&args[0])))
        })
        .method("append", &[HostType::Str], |handle, args| {
            let text = str_value(&args[0]);
            with_builder(handle, |b| {
                b.buf.push_str(&text);
                None
            })
        })
        .method("append", &[HostType::Int], |handle, args| {
            let n = int_value(&args[0]);
            with_builder(handle, |b| {
                b.buf.push_str(&n.to_string());
                None
            })
        })
        .method("length", &[], |handle, _args| {
            with_builder(handle, |b| Some(HostValue::Int(b.buf.len() as i32)))
        })
        .method("build", &[], |handle, _args| {
            with_builder(handle, |b| Some(HostValue::Str(b.buf.clone())))
        })
}

fn builder_handle(buf: String) -> HostHandle {
    Arc::new(RefCell::new(BuilderData { buf })) as HostHandle
}

fn with_builder<T>(handle: &HostHandle, f: impl FnOnce(&mut BuilderData) -> T) -> EvalResult<T> {
    let mut data = handle.borrow_mut();
    let builder = data
        .downcast_mut::<BuilderData>()
        .ok_or(EvalError::HostTargetInvalid)?;
    Ok(f(builder))
}

fn str_value(value: &HostValue) -> String {
    match value {
        HostValue::Str(s) => s.clone(),
        _ => unreachable!(),
    }
}

fn int_value(value: &HostValue) -> i32 {
    match value {
        HostValue::Int(n) => *n,
        _ => unreachable!(),
    }
}
