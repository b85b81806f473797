// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::model::NodeModel;
use crate::port::{Port, PortAddress, PortDirection};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A node instance in the graph: a model plus the ports derived from it
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    type_key: String,
    model: Box<dyn NodeModel>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl Node {
    /// Build a node, deriving its ports from the model's declarations.
    ///
    /// The type key is the model's name.
    pub fn new(id: NodeId, model: Box<dyn NodeModel>) -> Self {
        let type_key = model.name().to_string();
        Self::with_type_key(id, type_key, model)
    }

    /// Build a node made from the registry entry `type_key`
    pub fn with_type_key(id: NodeId, type_key: impl Into<String>, model: Box<dyn NodeModel>) -> Self {
        let inputs = model
            .input_ports()
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Port::from_spec(id, PortDirection::Input, index, spec))
            .collect();
        let outputs = model
            .output_ports()
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Port::from_spec(id, PortDirection::Output, index, spec))
            .collect();

        Self {
            id,
            type_key: type_key.into(),
            model,
            inputs,
            outputs,
        }
    }

    /// Registry key the node was created from
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// The node's model
    pub fn model(&self) -> &dyn NodeModel {
        &*self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut dyn NodeModel {
        &mut *self.model
    }

    /// The model as its concrete type
    pub fn model_as<M: NodeModel>(&self) -> Option<&M> {
        let any: &dyn Any = &*self.model;
        any.downcast_ref::<M>()
    }

    pub(crate) fn model_as_mut<M: NodeModel>(&mut self) -> Option<&mut M> {
        let any: &mut dyn Any = &mut *self.model;
        any.downcast_mut::<M>()
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Input ports in declaration order
    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    /// Output ports in declaration order
    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Get a port by direction and index
    pub fn port(&self, direction: PortDirection, index: usize) -> Option<&Port> {
        match direction {
            PortDirection::Input => self.inputs.get(index),
            PortDirection::Output => self.outputs.get(index),
        }
    }

    pub(crate) fn port_mut(&mut self, direction: PortDirection, index: usize) -> Option<&mut Port> {
        match direction {
            PortDirection::Input => self.inputs.get_mut(index),
            PortDirection::Output => self.outputs.get_mut(index),
        }
    }

    /// Port at a given address, if it belongs to this node
    pub fn port_at(&self, address: PortAddress) -> Option<&Port> {
        if address.node != self.id {
            return None;
        }
        self.port(address.direction, address.index)
    }

    /// Get all ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Number of connections attached to any port of this node
    pub fn connection_count(&self) -> usize {
        self.ports().map(Port::connection_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::port::{ConnectionPolicy, PortSpec};

    struct Mixer;

    impl NodeModel for Mixer {
        fn name(&self) -> &str {
            "Mixer"
        }

        fn input_ports(&self) -> Vec<PortSpec> {
            vec![
                PortSpec::input(DataType::decimal()).with_label("A"),
                PortSpec::input(DataType::decimal()).with_label("B"),
            ]
        }

        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::output(DataType::decimal()).with_policy(ConnectionPolicy::AtMost(2))]
        }
    }

    #[test]
    fn test_ports_derived_from_model() {
        let id = NodeId::new();
        let node = Node::new(id, Box::new(Mixer));

        assert_eq!(node.type_key(), "Mixer");
        assert_eq!(node.inputs().len(), 2);
        assert_eq!(node.outputs().len(), 1);
        assert_eq!(node.input(1).map(Port::display_text), Some("B"));
        assert_eq!(node.output(0).map(|p| p.policy), Some(ConnectionPolicy::AtMost(2)));
        assert!(node.input(2).is_none());
        assert!(node.ports().all(|p| p.node_id == id));
        assert_eq!(node.connection_count(), 0);
    }

    #[test]
    fn test_port_at_checks_owner() {
        let node = Node::new(NodeId::new(), Box::new(Mixer));
        assert!(node.port_at(PortAddress::input(node.id, 0)).is_some());
        assert!(node.port_at(PortAddress::input(NodeId::new(), 0)).is_none());
    }

    #[test]
    fn test_type_key_is_kept_apart_from_name() {
        let node = Node::with_type_key(NodeId::new(), "Blend", Box::new(Mixer));
        assert_eq!(node.type_key(), "Blend");
        assert_eq!(node.model().name(), "Mixer");
    }

    #[test]
    fn test_model_as() {
        let node = Node::new(NodeId::new(), Box::new(Mixer));
        assert!(node.model_as::<Mixer>().is_some());
    }
}
