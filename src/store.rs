//! Mutable run state: global variables and live objects.

use std::collections::BTreeMap;

use crate::ast::ClassDef;

/// Name lookups used by expression evaluation.
///
/// Implemented by the global [`Store`] and by a method call's local scope.
pub trait Env {
    fn int(&self, name: &str) -> Option<i64>;
    fn boolean(&self, name: &str) -> Option<bool>;
    fn field(&self, object: &str, field: &str) -> Option<i64>;

    fn string(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Splits `object.field` at the first dot.
pub fn split_dotted(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    pub class: String,
    pub fields: BTreeMap<String, i64>,
}

impl Object {
    pub fn instantiate(class: &ClassDef) -> Self {
        Object {
            class: class.name.clone(),
            fields: class.fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub ints: BTreeMap<String, i64>,
    pub strings: BTreeMap<String, String>,
    pub bools: BTreeMap<String, bool>,
    pub objects: BTreeMap<String, Object>,
}

impl Store {
    /// Assigns a bare name: declared booleans keep their type, anything else
    /// is written to the integer table.
    pub fn assign(&mut self, name: &str, value: i64) {
        if let Some(flag) = self.bools.get_mut(name) {
            *flag = value != 0;
        } else {
            self.ints.insert(name.to_string(), value);
        }
    }

    /// Writes `object.field`, creating the object and field when missing.
    pub fn set_field(&mut self, object: &str, field: &str, value: i64) {
        self.objects
            .entry(object.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), value);
    }

    pub fn instantiate(&mut self, instance: &str, class: &ClassDef) {
        self.objects
            .insert(instance.to_string(), Object::instantiate(class));
    }
}

impl Env for Store {
    fn int(&self, name: &str) -> Option<i64> {
        self.ints.get(name).copied()
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }

    fn field(&self, object: &str, field: &str) -> Option<i64> {
        self.objects.get(object)?.fields.get(field).copied()
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }
}
