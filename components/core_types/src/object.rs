//! Callable and object handles.
//!
//! The full object model lives in the interpreter. The async runtime only
//! needs two things from it: something it can call, and something it can ask
//! for a named member. [`Function`] and [`Object`] are the minimal shapes of
//! those two capabilities.

use crate::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Result of calling a function: the return value, or the thrown payload.
pub type Completion = Result<Value, Value>;

type NativeFn = dyn Fn(Value, Vec<Value>) -> Completion;

/// A callable JavaScript function.
///
/// Cloning a `Function` shares the underlying closure; two clones compare
/// equal as values.
///
/// # Examples
///
/// ```
/// use core_types::{Function, Value};
///
/// let double = Function::new("double", |_this, args| match args.first() {
///     Some(Value::Smi(n)) => Ok(Value::Smi(n * 2)),
///     _ => Err(Value::type_error("expected a number")),
/// });
///
/// assert_eq!(double.call(Value::Undefined, vec![Value::Smi(21)]), Ok(Value::Smi(42)));
/// assert!(double.call(Value::Undefined, vec![]).is_err());
/// ```
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    body: Rc<NativeFn>,
}

impl Function {
    /// Creates a new Function from a closure receiving `this` and the arguments.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Completion + 'static,
    {
        Self {
            name: Rc::from(name),
            body: Rc::new(f),
        }
    }

    /// The function's name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the function with the given receiver and arguments.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Completion {
        (self.body)(this, args)
    }

    /// Returns true if both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function {{ name: {:?} }}", self.name)
    }
}

/// An own property slot.
#[derive(Clone, Debug)]
enum Slot {
    Data(Value),
    Getter(Function),
}

/// A plain JavaScript object: an ordered bag of own properties.
///
/// Properties are either data values or getter functions. Reading a getter
/// invokes it with the object as receiver, and may throw.
///
/// # Examples
///
/// ```
/// use core_types::{Object, Value};
///
/// let obj = Object::new();
/// obj.set("answer", Value::Smi(42));
/// assert_eq!(obj.get("answer"), Ok(Value::Smi(42)));
/// assert_eq!(obj.get("missing"), Ok(Value::Undefined));
/// ```
#[derive(Clone, Default)]
pub struct Object {
    properties: Rc<RefCell<Vec<(String, Slot)>>>,
}

impl Object {
    /// Creates an object with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Object::set`].
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value.into());
        self
    }

    /// Sets a data property, replacing any existing slot with that key.
    pub fn set(&self, key: &str, value: Value) {
        self.put(key, Slot::Data(value));
    }

    /// Defines a getter for `key`.
    pub fn define_getter(&self, key: &str, getter: Function) {
        self.put(key, Slot::Getter(getter));
    }

    /// Reads a property. Missing keys read as `undefined`.
    pub fn get(&self, key: &str) -> Completion {
        // Clone the slot out so a getter can mutate this object.
        let slot = self
            .properties
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, slot)| slot.clone());
        match slot {
            None => Ok(Value::Undefined),
            Some(Slot::Data(value)) => Ok(value),
            Some(Slot::Getter(getter)) => getter.call(Value::Object(self.clone()), Vec::new()),
        }
    }

    /// Returns true if the object has an own property named `key`.
    pub fn has(&self, key: &str) -> bool {
        self.properties.borrow().iter().any(|(k, _)| k == key)
    }

    /// Returns true if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }

    fn put(&self, key: &str, slot: Slot) {
        let mut properties = self.properties.borrow_mut();
        match properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = slot,
            None => properties.push((key.to_string(), slot)),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only: values may point back at this object.
        let properties = self.properties.borrow();
        f.debug_set().entries(properties.iter().map(|(k, _)| k)).finish()
    }
}
