//! Arithmetic and logic operators as static methods
//!
//! Registered on the `void_event::Operators` type so persistent calls can
//! compute values and pass them on through return value links.

use std::ops::{Add, Div, Mul, Sub};
use std::sync::{Arc, OnceLock};
use void_reflect::{register_type, MethodInfo, ReflectError, Reflected, Result, TypeInfo};

/// Type key of the operator methods
pub const OPERATORS_TYPE: &str = "void_event::Operators";

static OPERATORS: OnceLock<Result<Arc<TypeInfo>>> = OnceLock::new();

/// Register the operator methods once and return their type
pub fn register_operators() -> Result<Arc<TypeInfo>> {
    OPERATORS
        .get_or_init(|| register_type(operators_type()))
        .clone()
}

// Integer arithmetic wraps; division by zero is an invocation error
macro_rules! with_integer_operators {
    ($info:expr, $ty:ty) => {
        $info
            .with_method(MethodInfo::function2::<$ty, $ty, $ty, _>("Add", ["a", "b"], <$ty>::wrapping_add))
            .with_method(MethodInfo::function2::<$ty, $ty, $ty, _>("Subtract", ["a", "b"], <$ty>::wrapping_sub))
            .with_method(MethodInfo::function2::<$ty, $ty, $ty, _>("Multiply", ["a", "b"], <$ty>::wrapping_mul))
            .with_method(MethodInfo::try_function2::<$ty, $ty, $ty, _>("Divide", ["a", "b"], |a, b| {
                if b == 0 {
                    Err(ReflectError::invocation("Attempted to divide by zero"))
                } else {
                    Ok(a.wrapping_div(b))
                }
            }))
            .with_method(MethodInfo::function2::<$ty, $ty, bool, _>("Equals", ["a", "b"], |a, b| a == b))
    };
}

fn operators_type() -> TypeInfo {
    let info = TypeInfo::class(OPERATORS_TYPE)
        .with_method(MethodInfo::function1::<bool, bool, _>("Invert", "value", |value| !value))
        .with_method(MethodInfo::function2::<bool, bool, bool, _>("Equals", ["a", "b"], |a, b| a == b));

    let info = with_float_operators::<f64>(info);
    let info = with_float_operators::<f32>(info);
    let info = with_integer_operators!(info, i32);
    with_integer_operators!(info, i64)
}

fn with_float_operators<T>(info: TypeInfo) -> TypeInfo
where
    T: Reflected
        + Copy
        + PartialEq
        + Add<Output = T>
        + Sub<Output = T>
        + Mul<Output = T>
        + Div<Output = T>
        + Send
        + Sync
        + 'static,
{
    info.with_method(MethodInfo::function2::<T, T, T, _>("Add", ["a", "b"], |a, b| a + b))
        .with_method(MethodInfo::function2::<T, T, T, _>("Subtract", ["a", "b"], |a, b| a - b))
        .with_method(MethodInfo::function2::<T, T, T, _>("Multiply", ["a", "b"], |a, b| a * b))
        .with_method(MethodInfo::function2::<T, T, T, _>("Divide", ["a", "b"], |a, b| a / b))
        .with_method(MethodInfo::function2::<T, T, bool, _>("Equals", ["a", "b"], |a, b| a == b))
}
