// SPDX-License-Identifier: MIT OR Apache-2.0
//! Behavior contract implemented by every kind of node.
//!
//! A model declares its ports once and is told about connections attaching
//! to or detaching from them. The graph owns the model; hooks run
//! synchronously inside the mutating call.

use crate::connection::Connection;
use crate::data_type::PortValue;
use crate::port::PortSpec;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Severity of a node's advisory validation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationState {
    /// Node is fully configured
    #[default]
    Valid,
    /// Node works but something is missing
    Warning,
    /// Node cannot produce output
    Error,
}

/// Validation state together with a message for the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeValidation {
    /// Severity
    pub state: ValidationState,
    /// Explanation, empty when valid
    pub message: String,
}

impl NodeValidation {
    /// No problems
    pub fn valid() -> Self {
        Self::default()
    }

    /// Warning with a message
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            state: ValidationState::Warning,
            message: message.into(),
        }
    }

    /// Error with a message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: ValidationState::Error,
            message: message.into(),
        }
    }
}

/// Failure raised by a model hook or while restoring model state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

impl ModelError {
    /// Create a new model error
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Capability interface of a node kind.
///
/// Only the port declarations and the registry key are required; every hook
/// has a no-op default.
pub trait NodeModel: Any + Send + Sync {
    /// Registry key of this model
    fn name(&self) -> &str;

    /// Caption shown on the node, defaults to the name
    fn caption(&self) -> &str {
        self.name()
    }

    /// Ordered input port declarations
    fn input_ports(&self) -> Vec<PortSpec>;

    /// Ordered output port declarations
    fn output_ports(&self) -> Vec<PortSpec>;

    /// A connection is about to attach to input `port_index`.
    ///
    /// Called exactly once per connection, before the graph commits it.
    /// Returning an error refuses the connection and leaves the graph
    /// untouched, so implementations must not change their own state when
    /// refusing.
    ///
    /// When the connection replaces one already on a single input, this
    /// runs before the replaced connection's
    /// [`NodeModel::on_input_disconnected`]; a refusal keeps that
    /// connection in place.
    fn on_input_connected(&mut self, port_index: usize, connection: &Connection) -> Result<(), ModelError> {
        let _ = (port_index, connection);
        Ok(())
    }

    /// A connection detached from input `port_index`
    fn on_input_disconnected(&mut self, port_index: usize, connection: &Connection) {
        let _ = (port_index, connection);
    }

    /// A connection attached to output `port_index`
    fn on_output_connected(&mut self, port_index: usize, connection: &Connection) {
        let _ = (port_index, connection);
    }

    /// A connection detached from output `port_index`
    fn on_output_disconnected(&mut self, port_index: usize, connection: &Connection) {
        let _ = (port_index, connection);
    }

    /// Upstream token handed to input `port_index`, `None` when it was cleared
    fn set_in_data(&mut self, port_index: usize, data: Option<PortValue>) {
        let _ = (port_index, data);
    }

    /// Token currently produced on output `port_index`
    fn out_data(&self, port_index: usize) -> Option<PortValue> {
        let _ = port_index;
        None
    }

    /// Advisory validation state
    fn validation(&self) -> NodeValidation {
        NodeValidation::valid()
    }

    /// Model specific state for snapshots
    fn save(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restore state produced by [`NodeModel::save`]
    fn restore(&mut self, state: &serde_json::Value) -> Result<(), ModelError> {
        let _ = state;
        Ok(())
    }
}

impl std::fmt::Debug for dyn NodeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeModel").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;

    struct Passthrough;

    impl NodeModel for Passthrough {
        fn name(&self) -> &str {
            "Passthrough"
        }

        fn input_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::input(DataType::text())]
        }

        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::output(DataType::text())]
        }
    }

    #[test]
    fn test_defaults() {
        let mut model = Passthrough;
        assert_eq!(model.caption(), "Passthrough");
        assert_eq!(model.validation(), NodeValidation::valid());
        assert_eq!(model.out_data(0), None);
        assert_eq!(model.save(), serde_json::Value::Null);
        assert!(model.restore(&serde_json::json!({"anything": 1})).is_ok());
    }

    #[test]
    fn test_downcast_through_any() {
        let model: Box<dyn NodeModel> = Box::new(Passthrough);
        let any: &dyn Any = &*model;
        assert!(any.downcast_ref::<Passthrough>().is_some());
    }
}
