// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph model and connection validation for node editors.
//!
//! This crate provides the data side of a node editor:
//! - Typed ports declared by pluggable node models
//! - Connection validation (direction, data type, cardinality, cycles)
//! - Atomic graph mutation with model hooks and observer notifications
//! - Snapshots and settings files
//!
//! ## Architecture
//!
//! A [`Graph`] owns its [`Node`]s and [`Connection`]s and is the only
//! mutator of either. Node behavior lives behind the [`NodeModel`] trait;
//! models are built by factories held in a [`DataTypeRegistry`], which also
//! decides which data types may be linked. Every connection attempt passes
//! through [`validation::validate`] before anything is changed.
//!
//! ```
//! use nodeflow_graph::models::calculator::create_calculator_registry;
//! use nodeflow_graph::{Graph, GraphError, PortValue};
//! use std::sync::Arc;
//!
//! let mut graph = Graph::new(Arc::new(create_calculator_registry()));
//! let a = graph.create_node_by_key("NumberSource").unwrap();
//! let b = graph.create_node_by_key("NumberSource").unwrap();
//! let sum = graph.create_node_by_key("Addition").unwrap();
//!
//! graph.connect(a, 0, sum, 0).unwrap();
//! graph.connect(b, 0, sum, 1).unwrap();
//! assert_eq!(graph.out_data(sum, 0).unwrap(), Some(PortValue::Decimal(0.0)));
//!
//! // Closing a loop is refused and leaves the graph unchanged
//! let next = graph.create_node_by_key("Addition").unwrap();
//! graph.connect(sum, 0, next, 0).unwrap();
//! assert!(matches!(
//!     graph.connect(next, 0, sum, 0),
//!     Err(GraphError::Cycle { .. })
//! ));
//! assert_eq!(graph.connection_count(), 3);
//! ```

pub mod config;
pub mod connection;
pub mod data_type;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod models;
pub mod node;
pub mod port;
pub mod registry;
pub mod snapshot;
pub mod validation;

pub use config::{GraphSettings, RegistrySettings, Settings};
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use data_type::{DataType, ExactMatch, NumericWidening, PortValue, TypeCompatibility};
pub use error::{GraphError, Result};
pub use events::{GraphEvent, GraphObserver, ObserverId};
pub use graph::{Graph, SharedGraph};
pub use model::{ModelError, NodeModel, NodeValidation, ValidationState};
pub use node::{Node, NodeId};
pub use port::{ConnectionPolicy, Port, PortAddress, PortDirection, PortSpec};
pub use registry::{DataTypeRegistry, ModelFactory, RegistryError, TypeConverter};
pub use snapshot::{ConnectionRecord, GraphSnapshot, NodeRecord, SnapshotError};
pub use validation::ConnectionPlan;
