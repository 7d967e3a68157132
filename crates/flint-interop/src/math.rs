//! The `math` classes: an abstract `Tuple` base and a mutable `Vector2`.
//!
//! `Tuple` exists to exercise ancestor tagging; a `Vector2` cast to
//! `math.Tuple` only exposes `size`, dispatched to the runtime class.

use std::cell::RefCell;
use std::sync::Arc;

use flint_runtime::{
    EvalError, EvalResult, HostClass, HostHandle, HostRegistry, HostType, HostValue,
};

struct Vector2Data {
    x: f64,
    y: f64,
}

pub fn register(registry: &mut HostRegistry) {
    registry.register(tuple_class());
    registry.register(vector2_class());
}

fn tuple_class() -> HostClass {
    HostClass::new("math.Tuple")
        .abstract_class()
        .abstract_method("size", &[])
}

fn vector2_class() -> HostClass {
    HostClass::new("math.Vector2")
        .with_parent("math.Tuple")
        .constructor(&[HostType::Double, HostType::Double], |args| {
            Ok(Arc::new(RefCell::new(Vector2Data {
                x: double_value(&args[0]),
                y: double_value(&args[1]),
            })) as HostHandle)
        })
        .field(
            "x",
            HostType::Double,
            |handle| with_vector(handle, |v| HostValue::Double(v.x)),
            |handle, value| with_vector(handle, |v| v.x = double_value(&value)),
        )
        .field(
            "y",
            HostType::Double,
            |handle| with_vector(handle, |v| HostValue::Double(v.y)),
            |handle, value| with_vector(handle, |v| v.y = double_value(&value)),
        )
        .method("length", &[], |handle, _args| {
            with_vector(handle, |v| {
                Some(HostValue::Double((v.x * v.x + v.y * v.y).sqrt()))
            })
        })
        .method("dot", &[HostType::Object("math.Vector2")], |handle, args| {
            let HostValue::Object { handle: other, .. } = &args[0] else {
                unreachable!();
            };
            let (ox, oy) = with_vector(other, |v| (v.x, v.y))?;
            with_vector(handle, |v| Some(HostValue::Double(v.x * ox + v.y * oy)))
        })
        .method("scale", &[HostType::Double], |handle, args| {
            let factor = double_value(&args[0]);
            with_vector(handle, |v| {
                v.x *= factor;
                v.y *= factor;
                None
            })
        })
        .method("size", &[], |_handle, _args| Ok(Some(HostValue::Int(2))))
        .static_method("unit", &[], |_args| {
            Ok(Some(HostValue::Object {
                class: "math.Vector2".to_string(),
                handle: Arc::new(RefCell::new(Vector2Data { x: 1.0, y: 0.0 })) as HostHandle,
            }))
        })
}

fn with_vector<T>(handle: &HostHandle, f: impl FnOnce(&mut Vector2Data) -> T) -> EvalResult<T> {
    let mut data = handle.borrow_mut();
    let vector = data
        .downcast_mut::<Vector2Data>()
        .ok_or(EvalError::HostTargetInvalid)?;
    Ok(f(vector))
}

// Argument shapes are guaranteed by signature dispatch.
fn double_value(value: &HostValue) -> f64 {
    match value {
        HostValue::Double(n) => *n,
        _ => unreachable!(),
    }
}
