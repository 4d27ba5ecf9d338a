//! JavaScript value types
//!
//! A small dynamic object model: ordinary objects, native functions and
//! classes. Classes carry a behavior table (the `prototype` object) whose own
//! `prototype` link is the delegation target for method lookup, so a class
//! can be re-pointed at a new base without touching its instances.

use crate::error::{messages, Error, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type alias for native function implementations (`this`, arguments)
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value>>;

/// A JavaScript value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes functions and classes)
    Object(Rc<RefCell<Object>>),
}

impl Value {
    /// Convert to number
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Object(_) => f64::NAN,
        }
    }

    /// Convert to JavaScript string representation
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(true) => "true".to_string(),
            Value::Boolean(false) => "false".to_string(),
            Value::Number(n) => {
                if n.is_nan() {
                    "NaN".to_string()
                } else if n.is_infinite() {
                    if *n > 0.0 {
                        "Infinity".to_string()
                    } else {
                        "-Infinity".to_string()
                    }
                } else if *n == 0.0 {
                    "0".to_string()
                } else {
                    format!("{}", n)
                }
            }
            Value::String(s) => s.clone(),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Ordinary => "[object Object]".to_string(),
                ObjectKind::NativeFunction { name, .. } => format!("[Function: {}]", name),
                ObjectKind::Class { name, .. } => format!("[class {}]", name),
            },
        }
    }

    /// Get the typeof string
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// Strict equality (===); objects compare by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() || b.is_nan() {
                    false
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Create a new object value
    pub fn new_object() -> Value {
        Value::Object(Rc::new(RefCell::new(Object::new())))
    }

    /// Create a new native function value
    pub fn new_function<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::NativeFunction {
                name: name.into(),
                func: Rc::new(func),
            },
            properties: HashMap::default(),
            prototype: None,
        })))
    }

    /// Create a new class value with an empty behavior table
    pub fn new_class(name: impl Into<String>) -> Value {
        Self::new_class_with_super(name, None, None)
    }

    /// Create a new class value with an optional constructor and superclass
    ///
    /// The behavior table delegates to the superclass's table and the class
    /// object itself delegates to the superclass, so both instance methods and
    /// statics are inherited.
    pub fn new_class_with_super(
        name: impl Into<String>,
        constructor: Option<NativeFn>,
        super_class: Option<&Value>,
    ) -> Value {
        let super_obj = super_class.and_then(|sc| match sc {
            Value::Object(obj) if sc.is_class() => Some(Rc::clone(obj)),
            _ => None,
        });
        let behavior = Object {
            kind: ObjectKind::Ordinary,
            properties: HashMap::default(),
            prototype: super_class.and_then(Value::class_prototype),
        };

        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Class {
                name: name.into(),
                constructor,
                prototype: Rc::new(RefCell::new(behavior)),
            },
            properties: HashMap::default(),
            prototype: super_obj,
        })))
    }

    /// Define an instance method on a class's behavior table
    pub fn define_method<F>(&self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        let table = self
            .class_prototype()
            .ok_or_else(|| Error::type_error(messages::not_a_constructor(&self.to_js_string())))?;
        table
            .borrow_mut()
            .properties
            .insert(name.to_string(), Value::new_function(name, func));
        Ok(())
    }

    /// Check if value can be called
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(
                obj.borrow().kind,
                ObjectKind::NativeFunction { .. } | ObjectKind::Class { .. }
            ),
            _ => false,
        }
    }

    /// Check if value is a class (constructor-like)
    pub fn is_class(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Class { .. }),
            _ => false,
        }
    }

    /// Check if value is an ordinary (non-callable) object
    pub fn is_plain_object(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Ordinary),
            _ => false,
        }
    }

    /// Declared name of a class
    pub fn class_name(&self) -> Option<String> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Class { name, .. } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Behavior table of a class
    pub fn class_prototype(&self) -> Option<Rc<RefCell<Object>>> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Class { prototype, .. } => Some(Rc::clone(prototype)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get a property, following the prototype chain
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.borrow().get_property(key).unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    /// Set an own property
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().properties.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(Error::type_error(messages::not_an_object(&self.to_js_string()))),
        }
    }

    /// Own property keys, sorted
    pub fn own_keys(&self) -> Vec<String> {
        match self {
            Value::Object(obj) => {
                let mut keys: Vec<String> = obj.borrow().properties.keys().cloned().collect();
                keys.sort();
                keys
            }
            _ => Vec::new(),
        }
    }

    /// Call a function value
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        let func = match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { func, .. } => Some(Rc::clone(func)),
                ObjectKind::Class { name, .. } => {
                    return Err(Error::type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        name
                    )))
                }
                ObjectKind::Ordinary => None,
            },
            _ => None,
        };
        match func {
            Some(func) => func(this, args),
            None => Err(Error::type_error(messages::not_a_function(&self.to_js_string()))),
        }
    }

    /// Look up a method through the prototype chain and call it with `self` as `this`
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self.get(name);
        if !method.is_callable() {
            return Err(Error::type_error(messages::method_not_a_function(
                &self.to_js_string(),
                name,
            )));
        }
        method.call(self, args)
    }

    /// Construct a new instance of a class (`new C(...args)`)
    pub fn construct(&self, args: &[Value]) -> Result<Value> {
        let table = self
            .class_prototype()
            .ok_or_else(|| Error::type_error(messages::not_a_constructor(&self.to_js_string())))?;
        let instance = Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Ordinary,
            properties: HashMap::default(),
            prototype: Some(table),
        })));

        if let Some(ctor) = self.find_constructor() {
            ctor(&instance, args)?;
        }
        Ok(instance)
    }

    /// Nearest constructor along the class's inheritance chain
    fn find_constructor(&self) -> Option<NativeFn> {
        let Value::Object(start) = self else {
            return None;
        };
        let mut current = Some(Rc::clone(start));
        while let Some(obj) = current {
            let obj = obj.borrow();
            if let ObjectKind::Class {
                constructor: Some(ctor),
                ..
            } = &obj.kind
            {
                return Some(Rc::clone(ctor));
            }
            current = obj.prototype.clone();
        }
        None
    }

    /// `instanceof`: whether the class's behavior table is on the value's prototype chain
    pub fn instance_of(&self, class: &Value) -> bool {
        let (Value::Object(obj), Some(table)) = (self, class.class_prototype()) else {
            return false;
        };
        let mut current = obj.borrow().prototype.clone();
        while let Some(proto) = current {
            if Rc::ptr_eq(&proto, &table) {
                return true;
            }
            current = proto.borrow().prototype.clone();
        }
        false
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Ordinary => write!(f, "{{...}}"),
                ObjectKind::NativeFunction { name, .. } => write!(f, "[Function: {}]", name),
                ObjectKind::Class { name, .. } => write!(f, "[Class: {}]", name),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// A JavaScript object
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Own properties (statics, for a class)
    pub properties: HashMap<String, Value>,
    /// Prototype (delegation target)
    pub prototype: Option<Rc<RefCell<Object>>>,
}

impl Object {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            kind: ObjectKind::Ordinary,
            properties: HashMap::default(),
            prototype: None,
        }
    }

    /// Get a property, checking own properties first, then the prototype chain
    pub fn get_property(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }
        let mut current = self.prototype.clone();
        while let Some(proto) = current {
            let proto = proto.borrow();
            if let Some(value) = proto.properties.get(key) {
                return Some(value.clone());
            }
            current = proto.prototype.clone();
        }
        None
    }
}

/// Object kinds
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Native function
    NativeFunction { name: String, func: NativeFn },
    /// Class object
    Class {
        name: String,
        /// Initializer run against each new instance
        constructor: Option<NativeFn>,
        /// Behavior table shared by all instances
        prototype: Rc<RefCell<Object>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_class() -> Value {
        let ctor: NativeFn = Rc::new(|this, args| {
            let start = args.first().cloned().unwrap_or(Value::Number(0.0));
            this.set("count", start)?;
            Ok(Value::Undefined)
        });
        let class = Value::new_class_with_super("Counter", Some(ctor), None);
        class
            .define_method("next", |this, _| {
                let next = this.get("count").to_number() + 1.0;
                this.set("count", Value::Number(next))?;
                Ok(Value::Number(next))
            })
            .unwrap();
        class
    }

    #[test]
    fn test_construct_and_call_method() {
        let class = counter_class();
        let counter = class.construct(&[Value::Number(5.0)]).unwrap();
        assert_eq!(counter.call_method("next", &[]).unwrap(), Value::Number(6.0));
        assert_eq!(counter.get("count"), Value::Number(6.0));
        assert!(counter.instance_of(&class));
    }

    #[test]
    fn test_inherited_methods_and_statics() {
        let base = Value::new_class("Base");
        base.define_method("kind", |_, _| Ok(Value::from("base"))).unwrap();
        base.set("registry", Value::from("shared")).unwrap();

        let derived = Value::new_class_with_super("Derived", None, Some(&base));
        let instance = derived.construct(&[]).unwrap();

        assert_eq!(instance.call_method("kind", &[]).unwrap(), Value::from("base"));
        assert_eq!(derived.get("registry"), Value::from("shared"));
        assert!(instance.instance_of(&base));
        assert!(instance.instance_of(&derived));
    }

    #[test]
    fn test_class_is_not_callable_without_new() {
        let class = Value::new_class("Widget");
        assert!(class.is_callable());
        assert_eq!(class.type_of(), "function");
        assert!(class.call(&Value::Undefined, &[]).is_err());
    }

    #[test]
    fn test_missing_method_is_type_error() {
        let instance = Value::new_class("Empty").construct(&[]).unwrap();
        let err = instance.call_method("missing", &[]).unwrap_err();
        assert!(err.to_string().starts_with("TypeError"));
    }

    #[test]
    fn test_identity_equality() {
        let a = Value::new_object();
        let b = Value::new_object();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_construct_non_class_fails() {
        let err = Value::Number(1.0).construct(&[]).unwrap_err();
        assert!(err.to_string().contains("is not a constructor"));
    }
}
