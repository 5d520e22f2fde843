//! Nodeflow Core
//!
//! This crate provides an incremental dataflow graph engine. It implements:
//!
//! - Typed node declarations with per-output influence relations
//! - Lazy, pull-based evaluation with dirty tracking
//! - Nested sub-networks whose ports mirror pseudo-nodes wired inside them
//! - Untyped ports that adopt the type of whatever they are connected to
//! - Graph documents in JSON and MessagePack
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `metadata`: node type declarations and the type register
//! - `graph`: the node arena, connections, networks and evaluation
//! - `values`: the facade compute callbacks work through
//! - `document`: serializable graph documents
//!
//! # Example
//!
//! ```rust,ignore
//! use nodeflow_core::{Graph, Metadata, MetadataHandle, State};
//!
//! let mut meta = Metadata::new("add");
//! let a = meta.add_input("a", 0.0f32);
//! let b = meta.add_input("b", 0.0f32);
//! let out = meta.add_output("out", 0.0f32);
//! meta.add_influence(&a, &out);
//! meta.add_influence(&b, &out);
//! meta.set_compute(move |values| {
//!     let sum = values.get(&a)? + values.get(&b)?;
//!     values.set(&out, sum)?;
//!     Ok(State::new())
//! });
//! let add = MetadataHandle::new(meta);
//!
//! let mut graph = Graph::new();
//! let node = graph.add_node(graph.root(), &add, "add")?;
//! graph.set(graph.port(node, "a")?, 2.0f32)?;
//! graph.set(graph.port(node, "b")?, 3.0f32)?;
//!
//! // Nothing has been computed yet; reading the output pulls it.
//! assert_eq!(graph.get::<f32>(graph.port(node, "out")?)?, 5.0);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod graph;
pub mod metadata;
pub mod state;
pub mod value;
pub mod values;

pub use config::Config;
pub use document::{BlindDocument, ConnectionDocument, NetworkDocument, NodeDocument};
pub use error::{ComputeError, Error, Result};
pub use events::{GraphEvent, SubscriberId};
pub use graph::{Graph, NodeKind, NodeOptions, PortInfo, PortRef, Selection, UniqueId};
pub use metadata::{Attr, AttrFlags, Category, Datablock, InAttr, Metadata, MetadataHandle, MetadataRegister, OutAttr};
pub use state::{Severity, State};
pub use value::{Data, TypeTag, Value, Void};
pub use values::Values;
