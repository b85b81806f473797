// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saving and restoring graphs.
//!
//! A snapshot lists nodes (id, registry key, model state) and connections
//! (endpoint node ids and port indices). Loading replays node creation and
//! then every connection in listed order through the normal validation
//! path; any refusal fails the whole load.

use crate::config::GraphSettings;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::ModelError;
use crate::node::{Node, NodeId};
use crate::registry::{DataTypeRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A node's type key is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A connection was refused during replay
    #[error("Connection {index} could not be restored: {source}")]
    Connection {
        /// Position in the snapshot's connection list
        index: usize,
        /// Refusal
        #[source]
        source: GraphError,
    },

    /// A model rejected its saved state
    #[error("Node {node} could not restore its state: {source}")]
    ModelState {
        /// Node whose state was rejected
        node: NodeId,
        /// Reason given by the model
        #[source]
        source: ModelError,
    },

    /// Two node records share an id
    #[error("Duplicate node id in snapshot: {0}")]
    DuplicateNode(NodeId),

    /// JSON error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id, kept on load
    pub id: NodeId,
    /// Registry key of the model
    pub type_key: String,
    /// Output of the model's `save`
    #[serde(default)]
    pub model_state: serde_json::Value,
}

/// A saved connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Source node
    pub out_node: NodeId,
    /// Source output index
    pub out_port: usize,
    /// Target node
    pub in_node: NodeId,
    /// Target input index
    pub in_port: usize,
}

/// Serializable description of a graph's structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in creation order
    pub nodes: Vec<NodeRecord>,
    /// Connections in creation order
    pub connections: Vec<ConnectionRecord>,
}

impl GraphSnapshot {
    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Save snapshot to file
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load snapshot from file
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Connection records as a set, for order-independent comparison
    pub fn connection_set(&self) -> HashSet<ConnectionRecord> {
        self.connections.iter().copied().collect()
    }
}

impl Graph {
    /// Capture the graph's structure and model state
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes()
                .map(|node| NodeRecord {
                    id: node.id,
                    type_key: node.type_key().to_string(),
                    model_state: node.model().save(),
                })
                .collect(),
            connections: self
                .connections()
                .map(|c| ConnectionRecord {
                    out_node: c.out_node,
                    out_port: c.out_port,
                    in_node: c.in_node,
                    in_port: c.in_port,
                })
                .collect(),
        }
    }

    /// Build a new graph from a snapshot
    pub fn from_snapshot(
        registry: Arc<DataTypeRegistry>,
        settings: GraphSettings,
        snapshot: &GraphSnapshot,
    ) -> Result<Self, SnapshotError> {
        // Replay must never evict: a snapshot with two wires on one input
        // is refused rather than silently dropping one of them
        let replay_settings = GraphSettings {
            replace_occupied_input: false,
            ..settings.clone()
        };
        let mut graph = Graph::with_settings(registry, replay_settings);

        for record in &snapshot.nodes {
            if graph.node(record.id).is_some() {
                return Err(SnapshotError::DuplicateNode(record.id));
            }
            let mut model = graph.registry().create(&record.type_key)?;
            model
                .restore(&record.model_state)
                .map_err(|source| SnapshotError::ModelState {
                    node: record.id,
                    source,
                })?;
            graph.insert_node(Node::with_type_key(record.id, record.type_key.clone(), model));
        }

        for (index, record) in snapshot.connections.iter().enumerate() {
            graph
                .connect(record.out_node, record.out_port, record.in_node, record.in_port)
                .map_err(|source| SnapshotError::Connection { index, source })?;
        }

        graph.set_settings(settings);
        tracing::info!(
            nodes = graph.node_count(),
            connections = graph.connection_count(),
            "graph loaded from snapshot"
        );
        Ok(graph)
    }

    /// Replace this graph's contents with a snapshot.
    ///
    /// The snapshot is replayed on a scratch graph first; on failure this
    /// graph is left untouched.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
        let staged = Graph::from_snapshot(self.registry_handle(), self.settings().clone(), snapshot)?;
        self.clear();
        self.adopt(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::events::GraphEvent;
    use crate::model::NodeModel;
    use crate::port::PortSpec;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Constant {
        value: i64,
    }

    impl NodeModel for Constant {
        fn name(&self) -> &str {
            "Constant"
        }

        fn input_ports(&self) -> Vec<PortSpec> {
            Vec::new()
        }

        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::output(DataType::integer())]
        }

        fn save(&self) -> serde_json::Value {
            serde_json::json!({ "value": self.value })
        }

        fn restore(&mut self, state: &serde_json::Value) -> Result<(), ModelError> {
            self.value = state
                .get("value")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| ModelError::new("missing value"))?;
            Ok(())
        }
    }

    struct Sum;

    impl NodeModel for Sum {
        fn name(&self) -> &str {
            "Sum"
        }

        fn input_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::input(DataType::integer()), PortSpec::input(DataType::integer())]
        }

        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::output(DataType::integer())]
        }
    }

    fn registry() -> Arc<DataTypeRegistry> {
        let mut registry = DataTypeRegistry::new();
        registry.register("Constant", || Box::new(Constant::default())).unwrap();
        registry.register("Sum", || Box::new(Sum)).unwrap();
        Arc::new(registry)
    }

    fn sample(registry: Arc<DataTypeRegistry>) -> Graph {
        let mut graph = Graph::new(registry);
        let a = graph.create_node_by_key("Constant").unwrap();
        let b = graph.create_node_by_key("Constant").unwrap();
        let sum = graph.create_node_by_key("Sum").unwrap();
        let total = graph.create_node_by_key("Sum").unwrap();
        graph.with_model_mut::<Constant, _>(a, |m| m.value = 4).unwrap();
        graph.with_model_mut::<Constant, _>(b, |m| m.value = 9).unwrap();
        graph.connect(a, 0, sum, 0).unwrap();
        graph.connect(b, 0, sum, 1).unwrap();
        graph.connect(sum, 0, total, 0).unwrap();
        graph.connect(a, 0, total, 1).unwrap();
        graph
    }

    #[test]
    fn test_round_trip() {
        let registry = registry();
        let graph = sample(Arc::clone(&registry));
        let snapshot = graph.snapshot();

        let json = snapshot.to_json().unwrap();
        let loaded = Graph::from_snapshot(registry, GraphSettings::default(), &GraphSnapshot::from_json(&json).unwrap()).unwrap();

        let reloaded = loaded.snapshot();
        assert_eq!(reloaded.nodes, snapshot.nodes);
        assert_eq!(reloaded.connection_set(), snapshot.connection_set());
        assert_eq!(loaded.connection_count(), 4);
        assert_eq!(loaded.settings(), &GraphSettings::default());

        let first = snapshot.nodes[0].id;
        assert_eq!(loaded.model::<Constant>(first).unwrap().value, 4);
    }

    #[test]
    fn test_records_registry_key_not_model_name() {
        let mut registry = DataTypeRegistry::new();
        registry.register("Constant", || Box::new(Constant::default())).unwrap();
        registry.register("Total", || Box::new(Sum)).unwrap();
        let registry = Arc::new(registry);

        let mut graph = Graph::new(Arc::clone(&registry));
        let a = graph.create_node_by_key("Constant").unwrap();
        let total = graph.create_node_by_key("Total").unwrap();
        graph.connect(a, 0, total, 0).unwrap();

        let snapshot = graph.snapshot();
        let record = snapshot.nodes.iter().find(|r| r.id == total).unwrap();
        assert_eq!(record.type_key, "Total");

        let loaded = Graph::from_snapshot(registry, GraphSettings::default(), &snapshot).unwrap();
        assert_eq!(loaded.node(total).map(Node::type_key), Some("Total"));
        assert_eq!(loaded.connection_count(), 1);
    }

    #[test]
    fn test_unknown_type_key_fails_load() {
        let snapshot = GraphSnapshot {
            nodes: vec![NodeRecord {
                id: NodeId::new(),
                type_key: "Nope".to_string(),
                model_state: serde_json::Value::Null,
            }],
            connections: Vec::new(),
        };
        assert!(matches!(
            Graph::from_snapshot(registry(), GraphSettings::default(), &snapshot),
            Err(SnapshotError::Registry(RegistryError::UnknownModel(_)))
        ));
    }

    #[test]
    fn test_cycle_fails_whole_load() {
        let registry = registry();
        let mut graph = Graph::new(Arc::clone(&registry));
        let first = graph.create_node_by_key("Sum").unwrap();
        let second = graph.create_node_by_key("Sum").unwrap();
        graph.connect(first, 0, second, 0).unwrap();

        let mut snapshot = graph.snapshot();
        snapshot.connections.push(ConnectionRecord {
            out_node: second,
            out_port: 0,
            in_node: first,
            in_port: 0,
        });

        let err = Graph::from_snapshot(registry, GraphSettings::default(), &snapshot).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Connection { index: 1, source: GraphError::Cycle { .. } }
        ));
    }

    #[test]
    fn test_doubled_input_is_not_evicted_on_load() {
        let registry = registry();
        let mut graph = Graph::new(Arc::clone(&registry));
        let a = graph.create_node_by_key("Constant").unwrap();
        let b = graph.create_node_by_key("Constant").unwrap();
        let sum = graph.create_node_by_key("Sum").unwrap();
        graph.connect(a, 0, sum, 0).unwrap();

        let mut snapshot = graph.snapshot();
        snapshot.connections.push(ConnectionRecord {
            out_node: b,
            out_port: 0,
            in_node: sum,
            in_port: 0,
        });

        assert!(Graph::from_snapshot(registry, GraphSettings::default(), &snapshot).is_err());
    }

    #[test]
    fn test_bad_model_state_fails_load() {
        let snapshot = GraphSnapshot {
            nodes: vec![NodeRecord {
                id: NodeId::new(),
                type_key: "Constant".to_string(),
                model_state: serde_json::json!({ "other": 1 }),
            }],
            connections: Vec::new(),
        };
        assert!(matches!(
            Graph::from_snapshot(registry(), GraphSettings::default(), &snapshot),
            Err(SnapshotError::ModelState { .. })
        ));
    }

    #[test]
    fn test_duplicate_node_id_fails_load() {
        let id = NodeId::new();
        let record = NodeRecord {
            id,
            type_key: "Sum".to_string(),
            model_state: serde_json::Value::Null,
        };
        let snapshot = GraphSnapshot {
            nodes: vec![record.clone(), record],
            connections: Vec::new(),
        };
        assert!(matches!(
            Graph::from_snapshot(registry(), GraphSettings::default(), &snapshot),
            Err(SnapshotError::DuplicateNode(dup)) if dup == id
        ));
    }

    #[test]
    fn test_restore_is_all_or_nothing() {
        let registry = registry();
        let mut graph = sample(Arc::clone(&registry));
        let before = graph.snapshot();

        let mut broken = before.clone();
        broken.connections.push(ConnectionRecord {
            out_node: NodeId::new(),
            out_port: 0,
            in_node: before.nodes[0].id,
            in_port: 0,
        });
        assert!(graph.restore(&broken).is_err());
        assert_eq!(graph.snapshot(), before);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        graph.subscribe(move |event: &GraphEvent| sink.lock().push(event.clone()));

        let mut other = Graph::new(registry);
        let lone = other.create_node_by_key("Sum").unwrap();
        graph.restore(&other.snapshot()).unwrap();

        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![lone]);
        assert_eq!(graph.connection_count(), 0);

        let events = events.lock();
        let removed = events.iter().filter(|e| matches!(e, GraphEvent::ConnectionRemoved(_))).count();
        let deleted = events.iter().filter(|e| matches!(e, GraphEvent::NodeDeleted(_))).count();
        assert_eq!(removed, 4);
        assert_eq!(deleted, 4);
        assert_eq!(events.last(), Some(&GraphEvent::NodeCreated(lone)));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("nodeflow-snapshot-{}.json", uuid::Uuid::new_v4()));
        let snapshot = sample(registry()).snapshot();

        snapshot.save(&path).unwrap();
        let loaded = GraphSnapshot::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, snapshot);
    }
}
