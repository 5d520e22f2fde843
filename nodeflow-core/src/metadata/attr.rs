//! Attribute Descriptors
//!
//! An [`Attr`] describes one attribute of a node type: its name, whether it
//! is an input or an output, its value type and how to build its default
//! value. Attributes are immutable once added to a [`Metadata`].
//!
//! [`InAttr`] and [`OutAttr`] are the typed handles returned when an attribute
//! is declared. Compute callbacks capture them to read and write values.
//!
//! [`Metadata`]: super::Metadata

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{TypeTag, Value};

/// Direction of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Values flow into the node.
    Input,
    /// Values are produced by the node.
    Output,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Input => f.write_str("input"),
            Category::Output => f.write_str("output"),
        }
    }
}

/// Per-attribute behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrFlags {
    /// Whether the value is written to documents. Non-serializable inputs are
    /// also reset to their default when disconnected.
    pub serializable: bool,
}

impl Default for AttrFlags {
    fn default() -> Self {
        Self { serializable: true }
    }
}

/// Factory producing an attribute's default value.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Immutable descriptor of one attribute.
#[derive(Clone)]
pub struct Attr {
    name: String,
    category: Category,
    value_type: TypeTag,
    default: DefaultFactory,
    flags: AttrFlags,
}

impl Attr {
    /// Create a descriptor with a default-value factory.
    pub fn new<F>(name: impl Into<String>, category: Category, value_type: TypeTag, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            category,
            value_type,
            default: Arc::new(default),
            flags: AttrFlags::default(),
        }
    }

    /// Create a descriptor whose default is a copy of `value`.
    pub fn with_value(name: impl Into<String>, category: Category, value: Value) -> Self {
        let value_type = value.type_tag();
        Self::new(name, category, value_type, move || value.clone())
    }

    /// Create an untyped descriptor. Its default is the null value.
    pub fn void(name: impl Into<String>, category: Category) -> Self {
        Self::new(name, category, TypeTag::void(), Value::null)
    }

    /// Replace the behaviour flags.
    pub fn with_flags(mut self, flags: AttrFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attribute name, unique within its node type.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Input or output.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Declared type. Void for untyped attributes.
    pub fn value_type(&self) -> TypeTag {
        self.value_type
    }

    /// Whether the attribute is declared untyped.
    pub fn is_void(&self) -> bool {
        self.value_type.is_void()
    }

    /// Behaviour flags.
    pub fn flags(&self) -> AttrFlags {
        self.flags
    }

    /// Build a fresh default value.
    pub fn default_value(&self) -> Value {
        (self.default)()
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("value_type", &self.value_type)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Typed handle of an input attribute.
pub struct InAttr<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

/// Typed handle of an output attribute.
pub struct OutAttr<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! attr_handle {
    ($handle:ident) => {
        impl<T> $handle<T> {
            pub(crate) fn new(index: usize) -> Self {
                Self {
                    index,
                    _marker: PhantomData,
                }
            }

            /// Index of the attribute within its metadata.
            pub fn index(&self) -> usize {
                self.index
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $handle<T> {}

        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($handle)).field(&self.index).finish()
            }
        }
    };
}

attr_handle!(InAttr);
attr_handle!(OutAttr);
