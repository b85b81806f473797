// SPDX-License-Identifier: MIT OR Apache-2.0
//! Refusals returned by graph mutations.

use crate::connection::ConnectionId;
use crate::data_type::DataType;
use crate::model::ModelError;
use crate::node::NodeId;
use crate::port::PortAddress;
use crate::registry::RegistryError;
use thiserror::Error;

/// Every way a graph operation can be refused.
///
/// The graph is unchanged whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// Port not found on an existing node
    #[error("Port not found: {0}")]
    UnknownPort(PortAddress),

    /// Connection not found
    #[error("Connection not found: {0}")]
    UnknownConnection(ConnectionId),

    /// Both endpoints are on the same node
    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeId),

    /// Source is not an output or target is not an input
    #[error("Cannot connect {from} to {to}: connections run from an output to an input")]
    Direction {
        /// Proposed source port
        from: PortAddress,
        /// Proposed target port
        to: PortAddress,
    },

    /// Data types are incompatible
    #[error("{output} and {input} are not compatible")]
    DataType {
        /// Type produced by the source
        output: DataType,
        /// Type accepted by the target
        input: DataType,
    },

    /// Port holds as many connections as its policy allows
    #[error("Port {0} cannot take another connection")]
    PortNotEmpty(PortAddress),

    /// The two ports are already linked
    #[error("Ports already connected by {0}")]
    AlreadyConnected(ConnectionId),

    /// The edge would close a cycle
    #[error("Connecting {from} to {to} would introduce a cycle in the graph")]
    Cycle {
        /// Source node of the proposed edge
        from: NodeId,
        /// Target node of the proposed edge
        to: NodeId,
    },

    /// The target node's model refused the connection
    #[error("Node {node} refused the connection: {source}")]
    ModelRejected {
        /// Refusing node
        node: NodeId,
        /// Reason given by the model
        #[source]
        source: ModelError,
    },

    /// The node's model is not of the requested type
    #[error("Node {node} is not a {expected}")]
    ModelMismatch {
        /// Node that was looked up
        node: NodeId,
        /// Requested model type
        expected: &'static str,
    },

    /// Registry failure while creating a node
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl GraphError {
    /// Whether the error is a refused connection rather than a missing entity
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::SelfConnection(_)
                | Self::Direction { .. }
                | Self::DataType { .. }
                | Self::PortNotEmpty(_)
                | Self::AlreadyConnected(_)
                | Self::Cycle { .. }
                | Self::ModelRejected { .. }
        )
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
