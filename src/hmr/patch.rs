//! Class identity patching
//!
//! When a reloaded module defines a class under a name seen before, every
//! earlier identity of that class is kept in lockstep with the newest one:
//! old identities get the new methods and static functions, the new identity
//! inherits the accumulated static state. Instances built from any identity
//! keep working and run the latest code, and identity checks against each
//! class are unaffected.
//!
//! Types opt in through [`Patchable`]; the runtime [`Value`] implements it.

use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::runtime::{Object, Value};

/// A constructor-like type whose shape can be enumerated and rewritten
pub trait Patchable: Clone {
    /// A static or member field value
    type Field: Clone;
    /// Delegation target of the behavior table
    type Link: Clone;

    /// Declared name, or `None` when the value is not constructor-like
    fn constructor_name(&self) -> Option<String>;

    /// Whether two handles refer to the same identity
    fn same_identity(&self, other: &Self) -> bool;

    /// Own static fields
    fn own_statics(&self) -> Vec<(String, Self::Field)>;

    fn set_static(&self, name: &str, value: Self::Field) -> Result<()>;

    /// Own fields of the behavior table shared by instances
    fn own_members(&self) -> Vec<(String, Self::Field)>;

    fn set_member(&self, name: &str, value: Self::Field) -> Result<()>;

    fn is_callable(field: &Self::Field) -> bool;

    fn behavior_link(&self) -> Option<Self::Link>;

    fn set_behavior_link(&self, link: Option<Self::Link>) -> Result<()>;
}

impl Patchable for Value {
    type Field = Value;
    type Link = Rc<RefCell<Object>>;

    fn constructor_name(&self) -> Option<String> {
        self.class_name()
    }

    fn same_identity(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }

    fn own_statics(&self) -> Vec<(String, Value)> {
        self.own_keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect()
    }

    fn set_static(&self, name: &str, value: Value) -> Result<()> {
        self.set(name, value)
    }

    fn own_members(&self) -> Vec<(String, Value)> {
        let Some(table) = self.class_prototype() else {
            return Vec::new();
        };
        let table = table.borrow();
        let mut members: Vec<(String, Value)> = table
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    fn set_member(&self, name: &str, value: Value) -> Result<()> {
        if let Some(table) = self.class_prototype() {
            table.borrow_mut().properties.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn is_callable(field: &Value) -> bool {
        field.is_callable()
    }

    fn behavior_link(&self) -> Option<Self::Link> {
        let table = self.class_prototype()?;
        let link = table.borrow().prototype.clone();
        link
    }

    fn set_behavior_link(&self, link: Option<Self::Link>) -> Result<()> {
        if let Some(table) = self.class_prototype() {
            table.borrow_mut().prototype = link;
        }
        Ok(())
    }
}

/// Every identity ever seen per declared class name, oldest first
#[derive(Debug)]
pub struct PatchHistory<T = Value> {
    identities: HashMap<String, Vec<T>>,
}

impl<T> Default for PatchHistory<T> {
    fn default() -> Self {
        Self {
            identities: HashMap::default(),
        }
    }
}

impl<T: Patchable> PatchHistory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile each constructor with all earlier identities of its name
    ///
    /// Values that are not constructor-like are skipped. Returns the names
    /// that were recorded.
    pub fn patch(&mut self, constructors: &[T]) -> Result<Vec<String>> {
        let mut patched = Vec::new();
        for new in constructors {
            let Some(name) = new.constructor_name() else {
                continue;
            };
            let history = self.identities.entry(name.clone()).or_default();
            if history.iter().any(|old| old.same_identity(new)) {
                continue;
            }
            for old in history.iter() {
                reconcile(old, new)?;
            }
            history.push(new.clone());
            patched.push(name);
        }
        Ok(patched)
    }

    /// Identities recorded under `name`, oldest first
    pub fn identities(&self, name: &str) -> &[T] {
        self.identities.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names with at least one recorded identity
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.identities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl PatchHistory<Value> {
    /// Patch the constructor-like parts of a module's exports
    ///
    /// A class export is patched directly; for a plain object export, every
    /// class-valued property is patched and all other properties are left
    /// alone.
    pub fn patch_exports(&mut self, exports: &Value) -> Result<Vec<String>> {
        if exports.is_class() {
            return self.patch(std::slice::from_ref(exports));
        }
        if !exports.is_plain_object() {
            return Ok(Vec::new());
        }
        let classes: Vec<Value> = exports
            .own_keys()
            .iter()
            .map(|key| exports.get(key))
            .filter(Value::is_class)
            .collect();
        self.patch(&classes)
    }
}

/// Bring one older identity up to date with a newer one
fn reconcile<T: Patchable>(old: &T, new: &T) -> Result<()> {
    for (name, value) in old.own_statics() {
        if !T::is_callable(&value) {
            new.set_static(&name, value)?;
        }
    }
    for (name, value) in new.own_statics() {
        if T::is_callable(&value) {
            old.set_static(&name, value)?;
        }
    }
    for (name, value) in new.own_members() {
        if T::is_callable(&value) {
            old.set_member(&name, value)?;
        }
    }
    old.set_behavior_link(new.behavior_link())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(greeting: &'static str) -> Value {
        let class = Value::new_class("Widget");
        class
            .define_method("greet", move |_, _| Ok(Value::from(greeting)))
            .unwrap();
        class
    }

    #[test]
    fn test_old_instances_run_new_methods() {
        let mut history = PatchHistory::new();
        let old = widget("v1");
        history.patch(&[old.clone()]).unwrap();
        let instance = old.construct(&[]).unwrap();

        let new = widget("v2");
        history.patch(&[new.clone()]).unwrap();

        assert_eq!(instance.call_method("greet", &[]).unwrap(), Value::from("v2"));
        assert!(instance.instance_of(&old));
        assert!(!instance.instance_of(&new));
        assert_ne!(old, new);
        assert_eq!(history.identities("Widget").len(), 2);
    }

    #[test]
    fn test_static_state_carries_forward_and_static_functions_flow_back() {
        let mut history = PatchHistory::new();
        let old = widget("v1");
        old.set("count", Value::Number(3.0)).unwrap();
        old.set("describe", Value::new_function("describe", |_, _| Ok(Value::from("old"))))
            .unwrap();
        history.patch(&[old.clone()]).unwrap();

        let new = widget("v2");
        new.set("count", Value::Number(0.0)).unwrap();
        new.set("describe", Value::new_function("describe", |_, _| Ok(Value::from("new"))))
            .unwrap();
        history.patch(&[new.clone()]).unwrap();

        assert_eq!(new.get("count"), Value::Number(3.0));
        assert_eq!(
            old.call_method("describe", &[]).unwrap(),
            Value::from("new")
        );
    }

    #[test]
    fn test_every_historical_identity_is_updated() {
        let mut history = PatchHistory::new();
        let v1 = widget("v1");
        let v2 = widget("v2");
        history.patch(&[v1.clone()]).unwrap();
        let first = v1.construct(&[]).unwrap();
        history.patch(&[v2.clone()]).unwrap();
        let second = v2.construct(&[]).unwrap();

        history.patch(&[widget("v3")]).unwrap();

        assert_eq!(first.call_method("greet", &[]).unwrap(), Value::from("v3"));
        assert_eq!(second.call_method("greet", &[]).unwrap(), Value::from("v3"));
    }

    #[test]
    fn test_base_class_change_is_propagated() {
        let mut history = PatchHistory::new();
        let base_v1 = Value::new_class("Base");
        base_v1.define_method("kind", |_, _| Ok(Value::from("base v1"))).unwrap();
        let old = Value::new_class_with_super("Widget", None, Some(&base_v1));
        history.patch(&[old.clone()]).unwrap();
        let instance = old.construct(&[]).unwrap();

        let base_v2 = Value::new_class("Base");
        base_v2.define_method("kind", |_, _| Ok(Value::from("base v2"))).unwrap();
        let new = Value::new_class_with_super("Widget", None, Some(&base_v2));
        history.patch(&[new]).unwrap();

        assert_eq!(instance.call_method("kind", &[]).unwrap(), Value::from("base v2"));
    }

    #[test]
    fn test_instance_state_is_untouched() {
        let mut history = PatchHistory::new();
        let old = widget("v1");
        history.patch(&[old.clone()]).unwrap();
        let instance = old.construct(&[]).unwrap();
        instance.set("label", Value::from("mine")).unwrap();

        history.patch(&[widget("v2")]).unwrap();
        assert_eq!(instance.get("label"), Value::from("mine"));
    }

    #[test]
    fn test_repatching_same_identity_is_noop() {
        let mut history = PatchHistory::new();
        let class = widget("v1");
        history.patch(&[class.clone()]).unwrap();
        assert!(history.patch(&[class]).unwrap().is_empty());
        assert_eq!(history.identities("Widget").len(), 1);
    }

    #[test]
    fn test_patch_exports_only_touches_classes() {
        let mut history = PatchHistory::new();
        let exports = Value::new_object();
        exports.set("Foo", Value::new_class("Foo")).unwrap();
        exports.set("bar", Value::Number(42.0)).unwrap();

        let patched = history.patch_exports(&exports).unwrap();
        assert_eq!(patched, vec!["Foo".to_string()]);
        assert_eq!(exports.get("bar"), Value::Number(42.0));
        assert_eq!(history.names(), vec!["Foo".to_string()]);
    }

    #[test]
    fn test_patch_exports_accepts_a_bare_class() {
        let mut history = PatchHistory::new();
        let old = widget("v1");
        assert_eq!(history.patch_exports(&old).unwrap(), vec!["Widget".to_string()]);
        let instance = old.construct(&[]).unwrap();

        let new = widget("v2");
        assert_eq!(history.patch_exports(&new).unwrap(), vec!["Widget".to_string()]);
        assert_eq!(instance.call_method("greet", &[]).unwrap(), Value::from("v2"));
        assert_eq!(history.identities("Widget").len(), 2);
    }

    #[test]
    fn test_patch_exports_ignores_primitives() {
        let mut history = PatchHistory::new();
        assert!(history.patch_exports(&Value::Number(1.0)).unwrap().is_empty());
        assert!(history.is_empty());
    }
}
