// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! The graph is the only mutator of its nodes and connections. Every
//! mutation validates first, then changes the internal maps in one step,
//! and only then runs model hooks and observers. A refused mutation leaves
//! the graph exactly as it was.

use crate::config::GraphSettings;
use crate::connection::{Connection, ConnectionId};
use crate::data_type::PortValue;
use crate::error::{GraphError, Result};
use crate::events::{GraphEvent, GraphObserver, ObserverId, Observers};
use crate::model::{NodeModel, NodeValidation};
use crate::node::{Node, NodeId};
use crate::port::{Port, PortAddress, PortDirection};
use crate::registry::DataTypeRegistry;
use crate::validation::{self, ConnectionPlan};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// A graph shared between one writer and any number of readers
pub type SharedGraph = Arc<RwLock<Graph>>;

/// A node graph
pub struct Graph {
    /// Graph name
    pub name: String,
    registry: Arc<DataTypeRegistry>,
    settings: GraphSettings,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    observers: Observers,
}

impl Graph {
    /// Create a new empty graph with default settings
    pub fn new(registry: Arc<DataTypeRegistry>) -> Self {
        Self::with_settings(registry, GraphSettings::default())
    }

    /// Create a new empty graph
    pub fn with_settings(registry: Arc<DataTypeRegistry>, settings: GraphSettings) -> Self {
        Self {
            name: "Untitled".to_string(),
            registry,
            settings,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            observers: Observers::default(),
        }
    }

    /// Set the graph name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wrap the graph for shared access
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    /// Registry used for node creation and type compatibility
    pub fn registry(&self) -> &DataTypeRegistry {
        &self.registry
    }

    pub(crate) fn registry_handle(&self) -> Arc<DataTypeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Settings in effect
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Change settings; existing connections are kept as they are
    pub fn set_settings(&mut self, settings: GraphSettings) {
        self.settings = settings;
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: impl GraphObserver + 'static) -> ObserverId {
        self.observers.subscribe(Box::new(observer))
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node built from `model`
    pub fn create_node(&mut self, model: Box<dyn NodeModel>) -> NodeId {
        let id = NodeId::new();
        self.insert_node(Node::new(id, model));
        id
    }

    /// Add a node whose model comes from the registry.
    ///
    /// The node records `type_key`, which is what snapshots store.
    pub fn create_node_by_key(&mut self, type_key: &str) -> Result<NodeId> {
        let model = self.registry.create(type_key)?;
        let id = NodeId::new();
        self.insert_node(Node::with_type_key(id, type_key, model));
        Ok(id)
    }

    pub(crate) fn insert_node(&mut self, node: Node) {
        let id = node.id;
        tracing::debug!(
            node = %id,
            type_key = node.type_key(),
            inputs = node.inputs().len(),
            outputs = node.outputs().len(),
            "node created"
        );
        self.nodes.insert(id, node);
        self.observers.emit(&GraphEvent::NodeCreated(id));
    }

    /// Remove a node and every connection touching it.
    ///
    /// All incident connections are detached before any hook or observer
    /// runs; observers see one `ConnectionRemoved` per connection followed
    /// by `NodeDeleted`.
    pub fn delete_node(&mut self, node_id: NodeId) -> Result<Node> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::UnknownNode(node_id))?;
        let incident: Vec<ConnectionId> = node
            .ports()
            .flat_map(Port::connection_ids)
            .collect();

        let neighbours: Vec<NodeId> = incident
            .iter()
            .filter_map(|id| self.connections.get(id))
            .map(|c| if c.out_node == node_id { c.in_node } else { c.out_node })
            .collect();
        let before = self.validations(&neighbours);

        let removed: Vec<Connection> = incident
            .into_iter()
            .filter_map(|id| self.detach(id))
            .collect();
        let mut node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;

        let mut events = Vec::with_capacity(removed.len() + 1);
        for connection in &removed {
            self.fire_disconnected(connection, Some(&mut node));
            events.push(GraphEvent::ConnectionRemoved(connection.id));
        }
        events.push(GraphEvent::NodeDeleted(node_id));
        events.extend(self.validation_changes(before));

        tracing::debug!(node = %node_id, connections = removed.len(), "node deleted");
        self.observers.emit_all(&events);
        Ok(node)
    }

    /// Replace a node's model, keeping its id.
    ///
    /// Ports are derived once per node, so a model with a new port layout
    /// is installed as a fresh node: every existing connection is removed.
    pub fn replace_node(&mut self, node_id: NodeId, model: Box<dyn NodeModel>) -> Result<Node> {
        let old = self.delete_node(node_id)?;
        self.insert_node(Node::new(node_id, model));
        Ok(old)
    }

    /// Remove every connection, then every node
    pub fn clear(&mut self) {
        let connections: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in connections {
            if let Err(err) = self.delete_connection(id) {
                tracing::warn!(connection = %id, %err, "clear skipped connection");
            }
        }
        let nodes: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in nodes {
            if let Err(err) = self.delete_node(id) {
                tracing::warn!(node = %id, %err, "clear skipped node");
            }
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs, in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a port
    pub fn port(&self, address: PortAddress) -> Result<&Port> {
        let node = self.node(address.node).ok_or(GraphError::UnknownNode(address.node))?;
        node.port(address.direction, address.index)
            .ok_or(GraphError::UnknownPort(address))
    }

    /// The node's model as its concrete type
    pub fn model<M: NodeModel>(&self, node_id: NodeId) -> Result<&M> {
        let node = self.node(node_id).ok_or(GraphError::UnknownNode(node_id))?;
        node.model_as::<M>().ok_or(GraphError::ModelMismatch {
            node: node_id,
            expected: std::any::type_name::<M>(),
        })
    }

    /// Mutate a node's model in place.
    ///
    /// Emits `NodeValidationChanged` when the edit changes the model's
    /// validation state. Port declarations are not re-read; use
    /// [`Graph::replace_node`] for layout changes.
    pub fn with_model_mut<M, R>(&mut self, node_id: NodeId, f: impl FnOnce(&mut M) -> R) -> Result<R>
    where
        M: NodeModel,
    {
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::UnknownNode(node_id))?;
        let before = node.model().validation();
        let model = node.model_as_mut::<M>().ok_or(GraphError::ModelMismatch {
            node: node_id,
            expected: std::any::type_name::<M>(),
        })?;
        let result = f(model);
        let events = self.validation_changes(vec![(node_id, before)]);
        self.observers.emit_all(&events);
        Ok(result)
    }

    /// Current validation state of a node's model
    pub fn validation(&self, node_id: NodeId) -> Result<NodeValidation> {
        self.node(node_id)
            .map(|node| node.model().validation())
            .ok_or(GraphError::UnknownNode(node_id))
    }

    /// Token currently produced on an output port
    pub fn out_data(&self, node_id: NodeId, port_index: usize) -> Result<Option<PortValue>> {
        let address = PortAddress::output(node_id, port_index);
        self.port(address)?;
        Ok(self.output_token(address))
    }

    /// Token an input port would receive from its most recent connection
    pub fn in_data(&self, node_id: NodeId, port_index: usize) -> Result<Option<PortValue>> {
        let port = self.port(PortAddress::input(node_id, port_index))?;
        Ok(self.upstream_token(port))
    }

    /// Hand every input of a node the current upstream token.
    ///
    /// Only this node is refreshed; nothing downstream of it is touched.
    pub fn refresh_inputs(&mut self, node_id: NodeId) -> Result<()> {
        let node = self.node(node_id).ok_or(GraphError::UnknownNode(node_id))?;
        let before = node.model().validation();
        let tokens: Vec<Option<PortValue>> = node
            .inputs()
            .iter()
            .map(|port| self.upstream_token(port))
            .collect();

        if let Some(node) = self.nodes.get_mut(&node_id) {
            for (index, token) in tokens.into_iter().enumerate() {
                node.model_mut().set_in_data(index, token);
            }
        }
        let events = self.validation_changes(vec![(node_id, before)]);
        self.observers.emit_all(&events);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect output `out_port` of `out_node` to input `in_port` of `in_node`
    pub fn connect(
        &mut self,
        out_node: NodeId,
        out_port: usize,
        in_node: NodeId,
        in_port: usize,
    ) -> Result<ConnectionId> {
        self.create_connection(
            PortAddress::output(out_node, out_port),
            PortAddress::input(in_node, in_port),
        )
    }

    /// Run all checks for a proposed connection without committing it
    pub fn can_connect(&self, source: PortAddress, target: PortAddress) -> Result<ConnectionPlan> {
        validation::validate(self, source, target)
    }

    /// Validate and commit a connection from `source` to `target`.
    ///
    /// The target model's `on_input_connected` hook runs once, before the
    /// commit, and may refuse. When the target is a full single input and
    /// replacement is enabled, the old connection is removed in the same
    /// step and observers see its `ConnectionRemoved` before the new
    /// `ConnectionCreated`.
    pub fn create_connection(&mut self, source: PortAddress, target: PortAddress) -> Result<ConnectionId> {
        let plan = validation::validate(self, source, target).inspect_err(|err| {
            tracing::warn!(%source, %target, reason = %err, "connection refused");
        })?;

        let mut connection = Connection::new(source.node, source.index, target.node, target.index);

        let mut touched = vec![source.node, target.node];
        if let Some(evicted) = plan.evict.and_then(|id| self.connections.get(&id)) {
            touched.push(evicted.out_node);
        }
        let before = self.validations(&touched);

        let target_node = self
            .nodes
            .get_mut(&target.node)
            .ok_or(GraphError::UnknownNode(target.node))?;
        if let Err(source_err) = target_node.model_mut().on_input_connected(target.index, &connection) {
            tracing::warn!(%source, %target, reason = %source_err, "connection refused by model");
            return Err(GraphError::ModelRejected {
                node: target.node,
                source: source_err,
            });
        }

        // Commit: nothing below can fail
        let evicted = plan.evict.and_then(|id| self.detach(id));
        connection.commit();
        let id = connection.id;
        self.attach(connection.clone());

        let mut events = Vec::with_capacity(3);
        if let Some(evicted) = &evicted {
            self.fire_disconnected(evicted, None);
            events.push(GraphEvent::ConnectionRemoved(evicted.id));
        }
        self.fire_connected(&connection);
        events.push(GraphEvent::ConnectionCreated(id));
        events.extend(self.validation_changes(before));

        tracing::debug!(
            connection = %id,
            %source,
            %target,
            evicted = ?evicted.as_ref().map(|c| c.id),
            "connection created"
        );
        self.observers.emit_all(&events);
        Ok(id)
    }

    /// Remove a connection
    pub fn delete_connection(&mut self, connection_id: ConnectionId) -> Result<Connection> {
        let (out_node, in_node) = self
            .connections
            .get(&connection_id)
            .map(|c| (c.out_node, c.in_node))
            .ok_or(GraphError::UnknownConnection(connection_id))?;
        let before = self.validations(&[out_node, in_node]);

        let connection = self
            .detach(connection_id)
            .ok_or(GraphError::UnknownConnection(connection_id))?;
        self.fire_disconnected(&connection, None);

        let mut events = vec![GraphEvent::ConnectionRemoved(connection_id)];
        events.extend(self.validation_changes(before));

        tracing::debug!(connection = %connection_id, "connection removed");
        self.observers.emit_all(&events);
        Ok(connection)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections, in creation order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get connections attached to a port
    pub fn connections_at(&self, address: PortAddress) -> Result<Vec<&Connection>> {
        let port = self.port(address)?;
        Ok(port
            .connection_ids()
            .filter_map(|id| self.connections.get(&id))
            .collect())
    }

    /// Nodes fed directly by this node's outputs
    pub fn successors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&node_id)
            .into_iter()
            .flat_map(|node| node.outputs().iter().flat_map(Port::connection_ids))
            .filter_map(|id| self.connections.get(&id))
            .map(|c| c.in_node)
    }

    /// Nodes feeding this node's inputs directly
    pub fn predecessors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&node_id)
            .into_iter()
            .flat_map(|node| node.inputs().iter().flat_map(Port::connection_ids))
            .filter_map(|id| self.connections.get(&id))
            .map(|c| c.out_node)
    }

    /// Whether `to` is downstream of `from`
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        validation::is_reachable(self, from, to)
    }

    /// Nodes ordered so that every node comes after all of its inputs.
    ///
    /// Fails only when cycle checking was disabled and a cycle was built.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: IndexMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        for connection in self.connections.values() {
            if let Some(degree) = in_degree.get_mut(&connection.in_node) {
                *degree += 1;
            }
        }

        let mut ready: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node_id) = ready.pop_front() {
            order.push(node_id);
            for next in self.successors(node_id) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = self
                .connections
                .values()
                .find(|c| in_degree.get(&c.in_node).is_some_and(|d| *d > 0))
                .map(|c| (c.out_node, c.in_node));
            if let Some((from, to)) = stuck {
                return Err(GraphError::Cycle { from, to });
            }
        }
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn attach(&mut self, connection: Connection) {
        for address in [connection.source(), connection.target()] {
            if let Some(port) = self
                .nodes
                .get_mut(&address.node)
                .and_then(|node| node.port_mut(address.direction, address.index))
            {
                port.attach(connection.id);
            }
        }
        self.connections.insert(connection.id, connection);
    }

    fn detach(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let mut connection = self.connections.shift_remove(&connection_id)?;
        for address in [connection.source(), connection.target()] {
            if let Some(port) = self
                .nodes
                .get_mut(&address.node)
                .and_then(|node| node.port_mut(address.direction, address.index))
            {
                port.detach(connection_id);
            }
        }
        connection.remove();
        Some(connection)
    }

    fn output_token(&self, address: PortAddress) -> Option<PortValue> {
        self.nodes
            .get(&address.node)
            .and_then(|node| node.model().out_data(address.index))
    }

    /// Source token as the target input receives it, converted when the
    /// two port types differ and the registry holds a converter
    fn delivered_token(&self, connection: &Connection) -> Option<PortValue> {
        let token = self.output_token(connection.source())?;
        let (Ok(output), Ok(input)) =
            (self.port(connection.source()), self.port(connection.target()))
        else {
            return Some(token);
        };
        Some(self.registry.convert(&output.data_type, &input.data_type, token))
    }

    fn upstream_token(&self, input: &Port) -> Option<PortValue> {
        input
            .connection_ids()
            .last()
            .and_then(|id| self.connections.get(&id))
            .and_then(|c| self.delivered_token(c))
    }

    fn fire_connected(&mut self, connection: &Connection) {
        let token = self.delivered_token(connection);
        if let Some(node) = self.nodes.get_mut(&connection.out_node) {
            node.model_mut().on_output_connected(connection.out_port, connection);
        }
        if let Some(node) = self.nodes.get_mut(&connection.in_node) {
            node.model_mut().set_in_data(connection.in_port, token);
        }
    }

    /// Run disconnect hooks; `removed` is a node already taken out of the map.
    ///
    /// The target input is handed the token of its newest remaining
    /// connection, or `None` once it has none.
    fn fire_disconnected(&mut self, connection: &Connection, mut removed: Option<&mut Node>) {
        let remaining = self
            .port(connection.target())
            .ok()
            .and_then(|port| self.upstream_token(port));
        for direction in [PortDirection::Output, PortDirection::Input] {
            let address = match direction {
                PortDirection::Output => connection.source(),
                PortDirection::Input => connection.target(),
            };
            let node = match removed.as_deref_mut() {
                Some(node) if node.id == address.node => Some(node),
                _ => self.nodes.get_mut(&address.node),
            };
            let Some(node) = node else { continue };
            let model = node.model_mut();
            match direction {
                PortDirection::Output => model.on_output_disconnected(address.index, connection),
                PortDirection::Input => {
                    model.on_input_disconnected(address.index, connection);
                    model.set_in_data(address.index, remaining.clone());
                }
            }
        }
    }

    fn validations(&self, node_ids: &[NodeId]) -> Vec<(NodeId, NodeValidation)> {
        let mut seen = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            if seen.iter().any(|(seen_id, _)| seen_id == id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                seen.push((*id, node.model().validation()));
            }
        }
        seen
    }

    fn validation_changes(&self, before: Vec<(NodeId, NodeValidation)>) -> Vec<GraphEvent> {
        before
            .into_iter()
            .filter_map(|(id, old)| {
                let current = self.nodes.get(&id)?.model().validation();
                (current != old).then_some(GraphEvent::NodeValidationChanged(id, current))
            })
            .collect()
    }

    /// Move the nodes and connections of `other` into this graph, which
    /// must be empty. Hooks already ran on `other`; only observers of this
    /// graph are notified.
    pub(crate) fn adopt(&mut self, other: Graph) {
        debug_assert!(self.nodes.is_empty() && self.connections.is_empty());
        self.nodes = other.nodes;
        self.connections = other.connections;

        let events: Vec<GraphEvent> = self
            .nodes
            .keys()
            .map(|id| GraphEvent::NodeCreated(*id))
            .chain(self.connections.keys().map(|id| GraphEvent::ConnectionCreated(*id)))
            .collect();
        self.observers.emit_all(&events);
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}
