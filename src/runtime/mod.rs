//! Runtime object model
//!
//! Values exported by hot-reloadable modules: primitives, ordinary objects,
//! native functions and classes with a patchable behavior table.

mod value;

pub use value::{NativeFn, Object, ObjectKind, Value};
