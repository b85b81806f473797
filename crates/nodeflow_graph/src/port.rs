// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::connection::ConnectionId;
use crate::data_type::DataType;
use crate::node::NodeId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction a port must have to be linked with this one
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// How many connections a port may hold at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// At most one connection
    One,
    /// Unbounded
    Many,
    /// At most `n` connections
    AtMost(usize),
}

impl ConnectionPolicy {
    /// Maximum number of connections, `None` when unbounded
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::One => Some(1),
            Self::Many => None,
            Self::AtMost(n) => Some(n),
        }
    }

    /// Whether a port already holding `count` connections may take another
    pub fn admits(self, count: usize) -> bool {
        self.limit().is_none_or(|limit| count < limit)
    }
}

/// Declaration of a port, as listed by a node model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Data type accepted or produced
    pub data_type: DataType,
    /// Optional caption shown instead of the data type name
    pub label: Option<String>,
    /// Cardinality rule
    pub policy: ConnectionPolicy,
}

impl PortSpec {
    /// Input declaration; inputs accept a single connection by default
    pub fn input(data_type: DataType) -> Self {
        Self {
            data_type,
            label: None,
            policy: ConnectionPolicy::One,
        }
    }

    /// Output declaration; outputs fan out to any number of inputs by default
    pub fn output(data_type: DataType) -> Self {
        Self {
            data_type,
            label: None,
            policy: ConnectionPolicy::Many,
        }
    }

    /// Set the caption
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Override the cardinality rule
    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Address of a port: owning node, direction and index within that direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    /// Owning node
    pub node: NodeId,
    /// Port direction
    pub direction: PortDirection,
    /// Index among the node's ports of the same direction
    pub index: usize,
}

impl PortAddress {
    /// Address of an input port
    pub fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Input,
            index,
        }
    }

    /// Address of an output port
    pub fn output(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Output,
            index,
        }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[{}]", self.node, self.direction, self.index)
    }
}

/// A concrete port on a node in the graph
#[derive(Debug, Clone)]
pub struct Port {
    /// Owning node
    pub node_id: NodeId,
    /// Port direction
    pub direction: PortDirection,
    /// Index among the node's ports of the same direction
    pub index: usize,
    /// Data type
    pub data_type: DataType,
    /// Optional caption
    pub label: Option<String>,
    /// Cardinality rule
    pub policy: ConnectionPolicy,
    connections: IndexSet<ConnectionId>,
}

impl Port {
    /// Create a port from its declaration
    pub fn from_spec(
        node_id: NodeId,
        direction: PortDirection,
        index: usize,
        spec: PortSpec,
    ) -> Self {
        Self {
            node_id,
            direction,
            index,
            data_type: spec.data_type,
            label: spec.label,
            policy: spec.policy,
            connections: IndexSet::new(),
        }
    }

    /// Address of this port
    pub fn address(&self) -> PortAddress {
        PortAddress {
            node: self.node_id,
            direction: self.direction,
            index: self.index,
        }
    }

    /// Text to show next to the port
    pub fn display_text(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.data_type.name)
    }

    /// Attached connections, in attachment order
    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    /// Number of attached connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is attached
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether one more connection fits under the port's policy
    pub fn can_accept(&self) -> bool {
        self.policy.admits(self.connections.len())
    }

    pub(crate) fn attach(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    pub(crate) fn detach(&mut self, id: ConnectionId) -> bool {
        self.connections.shift_remove(&id)
    }
}
