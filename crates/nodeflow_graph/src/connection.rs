// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a connection.
///
/// `Proposed -> Committed -> Removed`; a rejected proposal never becomes a
/// connection and is reported to the caller as an error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Built for validation, not yet in the graph
    Proposed,
    /// Live in the graph
    Committed,
    /// Detached from both ports and dropped from the graph
    Removed,
}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub out_node: NodeId,
    /// Source output index
    pub out_port: usize,
    /// Target node ID
    pub in_node: NodeId,
    /// Target input index
    pub in_port: usize,
    state: ConnectionState,
}

impl Connection {
    /// Create a proposed connection
    pub fn new(out_node: NodeId, out_port: usize, in_node: NodeId, in_port: usize) -> Self {
        Self {
            id: ConnectionId::new(),
            out_node,
            out_port,
            in_node,
            in_port,
            state: ConnectionState::Proposed,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection is committed in a graph
    pub fn is_valid(&self) -> bool {
        self.state == ConnectionState::Committed
    }

    pub(crate) fn commit(&mut self) {
        debug_assert_eq!(self.state, ConnectionState::Proposed);
        self.state = ConnectionState::Committed;
    }

    pub(crate) fn remove(&mut self) {
        self.state = ConnectionState::Removed;
    }

    /// Address of the source port
    pub fn source(&self) -> PortAddress {
        PortAddress::output(self.out_node, self.out_port)
    }

    /// Address of the target port
    pub fn target(&self) -> PortAddress {
        PortAddress::input(self.in_node, self.in_port)
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.out_node == node_id || self.in_node == node_id
    }

    /// Check if this connection links exactly these two ports
    pub fn links(&self, source: PortAddress, target: PortAddress) -> bool {
        self.source() == source && self.target() == target
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.target())
    }
}
