//! Global-scope values and property records.
//!
//! A deliberately small value model: enough to observe isolation,
//! injection, escaping, and function rebinding, without implementing a
//! script engine.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::cell::RefCell;

/// What a function's `this` resolves to when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisBinding {
    /// Not yet bound; resolves dynamically.
    Unbound,
    /// Bound to the real global scope.
    RealScope,
    /// Bound to the sandbox façade.
    Facade,
}

/// A function value with capability tags attached at creation time.
///
/// The tags replace runtime introspection: whether a fallback read must
/// rebind the function is decided here, not by inspecting the function.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    /// Stable identity; rebinding preserves it.
    pub id: u64,
    /// Whether a real-scope fallback read returns this function rebound to
    /// the real scope. Constructors and already-bound functions carry
    /// `false` and are returned unmodified.
    pub rebind_on_fallback: bool,
    /// Whether this function is a constructor.
    pub is_constructor: bool,
    /// Current `this` binding.
    pub this_binding: ThisBinding,
}

impl FunctionValue {
    /// Create a plain rebindable function.
    pub fn plain(id: u64) -> Self {
        FunctionValue {
            id,
            rebind_on_fallback: true,
            is_constructor: false,
            this_binding: ThisBinding::Unbound,
        }
    }

    /// Create a constructor function (never rebound on fallback).
    pub fn constructor(id: u64) -> Self {
        FunctionValue {
            id,
            rebind_on_fallback: false,
            is_constructor: true,
            this_binding: ThisBinding::Unbound,
        }
    }

    /// Create an already-bound function (never rebound on fallback).
    pub fn bound(id: u64, binding: ThisBinding) -> Self {
        FunctionValue {
            id,
            rebind_on_fallback: false,
            is_constructor: false,
            this_binding: binding,
        }
    }

    /// Whether this function is already bound.
    pub fn is_bound(&self) -> bool {
        self.this_binding != ThisBinding::Unbound
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.this_binding == other.this_binding
    }
}

/// A global-scope value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(FunctionValue),
    /// A shared object (string-keyed).
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    /// Escape-hatch reference back to the real global scope.
    RealScopeRef,
    /// Escape-hatch reference back to the real document.
    RealDocumentRef,
}

impl Value {
    /// Create a string value.
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    /// Create an empty shared object.
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Check truthiness the way script code would.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Get the function payload, if this is a function.
    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A property slot: a value plus its data descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Create an ordinary writable property.
    pub fn plain(value: Value) -> Self {
        Property {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Create a read-only property.
    pub fn readonly(value: Value) -> Self {
        Property {
            value,
            writable: false,
            enumerable: true,
            configurable: false,
        }
    }
}
