//! Type-Erased Values
//!
//! Every attribute slot of every node holds a [`Value`]: a shared, immutable,
//! type-erased payload that may also be null (an untyped slot that has not yet
//! been given a concrete type).
//!
//! # Types
//!
//! Payload types implement [`Data`], which gives them a stable registered name
//! instead of relying on compiler-generated type names. [`TypeTag`] pairs that
//! name with the `TypeId` used for comparisons and a JSON decoder used when a
//! document is loaded.
//!
//! Values are reference counted, so copying a value from an output to every
//! connected input is a pointer copy, not a deep clone.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// A payload type that can flow through the graph.
///
/// `TYPE_NAME` must be unique among the types used by one graph; it is what
/// documents record as the resolved type of a port.
pub trait Data: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name of the type.
    const TYPE_NAME: &'static str;
}

macro_rules! impl_data {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Data for $ty {
                const TYPE_NAME: &'static str = $name;
            }
        )*
    };
}

impl_data! {
    f32 => "float",
    f64 => "double",
    i32 => "int",
    i64 => "long",
    u32 => "uint",
    u64 => "ulong",
    bool => "bool",
    String => "string",
    Vec<f32> => "float_array",
}

/// Marker type of untyped ("void") attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Void;

type Decoder = fn(serde_json::Value) -> std::result::Result<Value, serde_json::Error>;

/// Runtime type descriptor of a port or value.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
    decode: Option<Decoder>,
}

impl TypeTag {
    /// Descriptor of a concrete payload type.
    pub fn of<T: Data>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::TYPE_NAME,
            decode: Some(decode::<T>),
        }
    }

    /// Descriptor of the untyped (void) type.
    pub fn void() -> Self {
        Self {
            id: TypeId::of::<Void>(),
            name: "void",
            decode: None,
        }
    }

    /// Whether this is the untyped descriptor.
    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<Void>()
    }

    /// Whether this descriptor stands for `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// The registered type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decode a JSON payload into a value of this type.
    pub fn decode(&self, json: serde_json::Value) -> Result<Value> {
        match self.decode {
            Some(decode) => Ok(decode(json)?),
            None => Err(Error::Serialization(format!(
                "cannot decode a value of type '{}'",
                self.name
            ))),
        }
    }
}

fn decode<T: Data>(json: serde_json::Value) -> std::result::Result<Value, serde_json::Error> {
    serde_json::from_value::<T>(json).map(Value::new)
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Object-safe view of a [`Data`] payload.
trait ErasedData: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn type_tag(&self) -> TypeTag;
    fn eq_erased(&self, other: &dyn ErasedData) -> bool;
    fn to_json(&self) -> std::result::Result<serde_json::Value, serde_json::Error>;
}

impl<T: Data> ErasedData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn eq_erased(&self, other: &dyn ErasedData) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| other == self)
    }

    fn to_json(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Content of one attribute slot.
#[derive(Clone, Default)]
pub struct Value {
    inner: Option<Arc<dyn ErasedData>>,
}

impl Value {
    /// Wrap a payload.
    pub fn new<T: Data>(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }

    /// The untyped, empty value.
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Whether the slot holds no payload.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Type of the payload, or void for a null value.
    pub fn type_tag(&self) -> TypeTag {
        self.inner
            .as_ref()
            .map_or_else(TypeTag::void, |inner| inner.type_tag())
    }

    /// Borrow the payload as `T`, if it is one.
    pub fn downcast_ref<T: Data>(&self) -> Option<&T> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.as_any().downcast_ref::<T>())
    }

    /// Serialize the payload. A null value becomes JSON `null`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match &self.inner {
            Some(inner) => Ok(inner.to_json()?),
            None => Ok(serde_json::Value::Null),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a.eq_erased(b.as_ref()),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => inner.fmt(f),
            None => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_value_is_void() {
        let value = Value::null();
        assert!(value.is_null());
        assert!(value.type_tag().is_void());
        assert_eq!(value.to_json().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn values_compare_by_payload() {
        assert_eq!(Value::new(2.5f32), Value::new(2.5f32));
        assert_ne!(Value::new(2.5f32), Value::new(3.0f32));
        // Same bits, different types.
        assert_ne!(Value::new(1i32), Value::new(1u32));
        assert_ne!(Value::new(1i32), Value::null());
    }

    #[test]
    fn downcast_checks_type() {
        let value = Value::new(String::from("hello"));
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(value.downcast_ref::<f32>().is_none());
        assert_eq!(value.type_tag(), TypeTag::of::<String>());
    }

    #[test]
    fn type_tag_decodes_json() {
        let tag = TypeTag::of::<Vec<f32>>();
        let value = tag.decode(serde_json::json!([1.0, 2.0])).unwrap();
        assert_eq!(value, Value::new(vec![1.0f32, 2.0]));
        assert_eq!(tag.name(), "float_array");

        assert!(TypeTag::void().decode(serde_json::json!(1)).is_err());
    }
}
