//! The `util` classes.

use std::cell::RefCell;
use std::sync::Arc;

use flint_runtime::{
    EvalError, EvalResult, HostClass, HostHandle, HostRegistry, HostType, HostValue,
};

struct CounterData {
    count: i32,
}

pub fn register(registry: &mut HostRegistry) {
    registry.register(counter_class());
}

/// `util.Counter` holds an integer exposed both as a writable field and
/// through methods.
fn counter_class() -> HostClass {
    HostClass::new("util.Counter")
        .constructor(&[], |_args| Ok(counter_handle(0)))
        .constructor(&[HostType::Int], |args| {
            Ok(counter_handle(int_value(&args[0])))
        })
        .field(
            "count",
            HostType::Int,
            |handle| with_counter(handle, |c| HostValue::Int(c.count)),
            |handle, value| with_counter(handle, |c| c.count = int_value(&value)),
        )
        .method("increment", &[], |handle, _args| {
            with_counter(handle, |c| {
                c.count = c.count.wrapping_add(1);
                None
            })
        })
        .method("decrement", &[], |handle, _args| {
            with_counter(handle, |c| {
                c.count = c.count.wrapping_sub(1);
                None
            })
        })
        .method("reset", &[], |handle, _args| {
            with_counter(handle, |c| {
                c.count = 0;
                None
            })
        })
        .method("value", &[], |handle, _args| {
            with_counter(handle, |c| Some(HostValue::Int(c.count)))
        })
}

fn counter_handle(count: i32) -> HostHandle {
    Arc::new(RefCell::new(CounterData { count })) as HostHandle
}

fn with_counter<T>(handle: &HostHandle, f: impl FnOnce(&mut CounterData) -> T) -> EvalResult<T> {
    let mut data = handle.borrow_mut();
    let counter = data
        .downcast_mut::<CounterData>()
        .ok_or(EvalError::HostTargetInvalid)?;
    Ok(f(counter))
}

fn int_value(value: &HostValue) -> i32 {
    match value {
        HostValue::Int(n) => *n,
        _ => unreachable!(),
    }
}
