//! Metadata Register
//!
//! The register maps node type names to their [`MetadataHandle`]s and data
//! type names to their [`TypeTag`]s. Documents refer to both by name, so a
//! graph can only be loaded against a register that knows every type it uses.
//!
//! The register is an explicit object rather than a process-wide singleton.
//! Plugins receive a reference to it and register their types; the lock makes
//! it safe to share between threads even though graphs themselves are not.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::node_type::{Metadata, MetadataHandle};
use crate::error::{Error, Result};
use crate::graph::network;
use crate::value::{Data, TypeTag};

/// Registry of node types and data types.
#[derive(Default)]
pub struct MetadataRegister {
    node_types: RwLock<IndexMap<String, MetadataHandle>>,
    data_types: RwLock<IndexMap<&'static str, TypeTag>>,
}

impl MetadataRegister {
    /// Create an empty register.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a register pre-populated with the network node types and the
    /// built-in data types.
    pub fn with_builtins() -> Self {
        let register = Self::new();
        for meta in [
            network::input_metadata(),
            network::output_metadata(),
            network::network_metadata(),
        ] {
            register
                .node_types
                .write()
                .insert(meta.type_name().to_string(), MetadataHandle::new(meta));
        }

        register.register_type::<f32>();
        register.register_type::<f64>();
        register.register_type::<i32>();
        register.register_type::<i64>();
        register.register_type::<u32>();
        register.register_type::<u64>();
        register.register_type::<bool>();
        register.register_type::<String>();
        register.register_type::<Vec<f32>>();
        register
    }

    /// Register a node type. Fails if the type name is already taken.
    pub fn register(&self, meta: Metadata) -> Result<MetadataHandle> {
        self.register_handle(MetadataHandle::new(meta))
    }

    /// Register an existing handle. Fails if the type name is already taken.
    pub fn register_handle(&self, handle: MetadataHandle) -> Result<MetadataHandle> {
        let mut node_types = self.node_types.write();
        if node_types.contains_key(handle.type_name()) {
            return Err(Error::DuplicateName(handle.type_name().to_string()));
        }

        debug!(node_type = handle.type_name(), "registered node type");
        node_types.insert(handle.type_name().to_string(), handle.clone());
        Ok(handle)
    }

    /// Remove a node type. Existing instances keep their handle.
    pub fn unregister(&self, type_name: &str) -> Option<MetadataHandle> {
        self.node_types.write().shift_remove(type_name)
    }

    /// Look up a node type.
    pub fn get(&self, type_name: &str) -> Option<MetadataHandle> {
        self.node_types.read().get(type_name).cloned()
    }

    /// Look up a node type, failing with [`Error::UnknownNodeType`].
    pub fn require(&self, type_name: &str) -> Result<MetadataHandle> {
        self.get(type_name)
            .ok_or_else(|| Error::UnknownNodeType(type_name.to_string()))
    }

    /// Whether a node type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.read().contains_key(type_name)
    }

    /// Registered node type names, in registration order.
    pub fn type_names(&self) -> Vec<String> {
        self.node_types.read().keys().cloned().collect()
    }

    /// Number of registered node types.
    pub fn len(&self) -> usize {
        self.node_types.read().len()
    }

    /// Whether no node type is registered.
    pub fn is_empty(&self) -> bool {
        self.node_types.read().is_empty()
    }

    /// Register a data type so documents can name it.
    pub fn register_type<T: Data>(&self) -> TypeTag {
        let tag = TypeTag::of::<T>();
        self.data_types.write().insert(T::TYPE_NAME, tag);
        tag
    }

    /// Look up a data type by name.
    pub fn data_type(&self, name: &str) -> Option<TypeTag> {
        self.data_types.read().get(name).copied()
    }
}
