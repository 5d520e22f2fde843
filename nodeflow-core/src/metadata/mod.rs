//! Node Type Declarations
//!
//! This module holds everything that describes a node type independently of
//! any instance:
//!
//! - [`Attr`]: one attribute (name, direction, type, default)
//! - [`Metadata`]: the node type (attributes, influence relation, compute)
//! - [`Datablock`]: the per-instance value storage built from a `Metadata`
//! - [`MetadataRegister`]: the registry documents resolve type names against
//!
//! Node type plugins build a `Metadata`, wrap it in a [`MetadataHandle`] and
//! register it. Every instance of the type shares that handle. Networks are
//! the exception: each network owns its metadata, which grows and shrinks as
//! boundary ports are wired inside it.

mod attr;
mod datablock;
mod node_type;
mod register;

pub use attr::{Attr, AttrFlags, Category, DefaultFactory, InAttr, OutAttr};
pub use datablock::Datablock;
pub use node_type::{ComputeFn, Metadata, MetadataHandle};
pub use register::MetadataRegister;
