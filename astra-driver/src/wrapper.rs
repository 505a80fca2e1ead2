//! Wrapper introspection for driver-facing types.

use std::any::{Any, type_name};

use crate::error::{AstraError, AstraResult};

/// Lets callers ask whether an object is, or can be viewed as, a given type.
pub trait Wrapper: Any + Sized {
    /// Whether `self` can be unwrapped as `T`.
    fn is_wrapper_for<T: Any>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// View `self` as `T`.
    fn unwrap_as<T: Any>(&self) -> AstraResult<&T> {
        (self as &dyn Any).downcast_ref::<T>().ok_or_else(|| {
            let name = type_name::<T>();
            AstraError::NotAWrapper(name.rsplit("::").next().unwrap_or(name).to_string())
        })
    }
}
