// SPDX-License-Identifier: MIT OR Apache-2.0
//! Checks run before a connection is committed.
//!
//! Every check is a pure function of a graph and a proposed edge, so each
//! one can be exercised on its own. [`validate`] runs them in order and
//! stops at the first refusal:
//!
//! 1. both endpoints exist
//! 2. the endpoints are on different nodes
//! 3. the edge runs from an output to an input
//! 4. the data types are compatible
//! 5. both ports have room (an occupied single input may be evicted)
//! 6. the edge does not close a cycle

use crate::connection::ConnectionId;
use crate::config::GraphSettings;
use crate::data_type::TypeCompatibility;
use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{ConnectionPolicy, Port, PortAddress, PortDirection};
use std::collections::{HashSet, VecDeque};

/// Outcome of a successful validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPlan {
    /// Output port the connection starts from
    pub source: PortAddress,
    /// Input port the connection ends at
    pub target: PortAddress,
    /// Connection that must be removed from the target first
    pub evict: Option<ConnectionId>,
}

/// Resolve both endpoints to ports of existing nodes
pub fn check_endpoints<'g>(
    graph: &'g Graph,
    source: PortAddress,
    target: PortAddress,
) -> Result<(&'g Port, &'g Port)> {
    let resolve = |address: PortAddress| -> Result<&'g Port> {
        let node = graph
            .node(address.node)
            .ok_or(GraphError::UnknownNode(address.node))?;
        node.port(address.direction, address.index)
            .ok_or(GraphError::UnknownPort(address))
    };
    Ok((resolve(source)?, resolve(target)?))
}

/// Refuse edges whose endpoints share a node
pub fn check_self_connection(source: PortAddress, target: PortAddress) -> Result<()> {
    if source.node == target.node {
        return Err(GraphError::SelfConnection(source.node));
    }
    Ok(())
}

/// Refuse anything but output -> input
pub fn check_direction(source: PortAddress, target: PortAddress) -> Result<()> {
    if source.direction != PortDirection::Output || target.direction != source.direction.opposite() {
        return Err(GraphError::Direction {
            from: source,
            to: target,
        });
    }
    Ok(())
}

/// Refuse incompatible data types
pub fn check_data_type(
    compatibility: &dyn TypeCompatibility,
    source: &Port,
    target: &Port,
) -> Result<()> {
    if !compatibility.is_compatible(&source.data_type, &target.data_type) {
        return Err(GraphError::DataType {
            output: source.data_type.clone(),
            input: target.data_type.clone(),
        });
    }
    Ok(())
}

/// Check both ports have room for one more connection.
///
/// Returns the connection to evict when the target is a full single input
/// and `settings.replace_occupied_input` is set.
pub fn check_cardinality(
    graph: &Graph,
    source: &Port,
    target: &Port,
    settings: &GraphSettings,
) -> Result<Option<ConnectionId>> {
    let (source_address, target_address) = (source.address(), target.address());
    if let Some(existing) = source.connection_ids().find(|id| {
        graph
            .connection(*id)
            .is_some_and(|c| c.links(source_address, target_address))
    }) {
        return Err(GraphError::AlreadyConnected(existing));
    }

    let mut evict = None;
    if !target.can_accept() {
        let replaceable = target.policy == ConnectionPolicy::One && settings.replace_occupied_input;
        match target.connection_ids().next() {
            Some(existing) if replaceable => evict = Some(existing),
            _ => return Err(GraphError::PortNotEmpty(target_address)),
        }
    }

    // Outputs are never evicted
    if !source.can_accept() {
        return Err(GraphError::PortNotEmpty(source_address));
    }

    Ok(evict)
}

/// Whether `to` can be reached from `from` by following connections
/// downstream. A node always reaches itself.
pub fn is_reachable(graph: &Graph, from: NodeId, to: NodeId) -> bool {
    if from == to {
        return true;
    }

    let mut visited = HashSet::with_capacity(graph.node_count());
    let mut pending = VecDeque::from([from]);
    visited.insert(from);

    while let Some(node_id) = pending.pop_front() {
        for next in graph.successors(node_id) {
            if next == to {
                return true;
            }
            if visited.insert(next) {
                pending.push_back(next);
            }
        }
    }
    false
}

/// Refuse an edge `from -> to` when `to` already reaches `from`
pub fn check_cycle(graph: &Graph, from: NodeId, to: NodeId) -> Result<()> {
    if is_reachable(graph, to, from) {
        return Err(GraphError::Cycle { from, to });
    }
    Ok(())
}

/// Run every check, in order, against the graph's registry and settings
pub fn validate(graph: &Graph, source: PortAddress, target: PortAddress) -> Result<ConnectionPlan> {
    let (source_port, target_port) = check_endpoints(graph, source, target)?;
    check_self_connection(source, target)?;
    check_direction(source, target)?;
    check_data_type(graph.registry(), source_port, target_port)?;
    let evict = check_cardinality(graph, source_port, target_port, graph.settings())?;
    if graph.settings().check_cycles {
        check_cycle(graph, source.node, target.node)?;
    }

    Ok(ConnectionPlan {
        source,
        target,
        evict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::{DataType, ExactMatch};
    use crate::model::NodeModel;
    use crate::port::PortSpec;
    use crate::registry::DataTypeRegistry;
    use std::sync::Arc;

    struct Relay(DataType);

    impl NodeModel for Relay {
        fn name(&self) -> &str {
            "Relay"
        }

        fn input_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::input(self.0.clone())]
        }

        fn output_ports(&self) -> Vec<PortSpec> {
            vec![PortSpec::output(self.0.clone())]
        }
    }

    fn graph() -> Graph {
        Graph::new(Arc::new(DataTypeRegistry::new()))
    }

    fn relay(graph: &mut Graph, data_type: DataType) -> NodeId {
        graph.create_node(Box::new(Relay(data_type)))
    }

    #[test]
    fn test_check_endpoints() {
        let mut graph = graph();
        let a = relay(&mut graph, DataType::integer());
        let b = relay(&mut graph, DataType::integer());

        assert!(check_endpoints(&graph, PortAddress::output(a, 0), PortAddress::input(b, 0)).is_ok());

        let missing = NodeId::new();
        assert_eq!(
            check_endpoints(&graph, PortAddress::output(missing, 0), PortAddress::input(b, 0)).unwrap_err(),
            GraphError::UnknownNode(missing)
        );
        assert_eq!(
            check_endpoints(&graph, PortAddress::output(a, 3), PortAddress::input(b, 0)).unwrap_err(),
            GraphError::UnknownPort(PortAddress::output(a, 3))
        );
    }

    #[test]
    fn test_check_self_connection() {
        let node = NodeId::new();
        assert_eq!(
            check_self_connection(PortAddress::output(node, 0), PortAddress::input(node, 0)),
            Err(GraphError::SelfConnection(node))
        );
        assert!(check_self_connection(PortAddress::output(node, 0), PortAddress::input(NodeId::new(), 0)).is_ok());
    }

    #[test]
    fn test_check_direction() {
        let (a, b) = (NodeId::new(), NodeId::new());
        assert!(check_direction(PortAddress::output(a, 0), PortAddress::input(b, 0)).is_ok());
        assert!(check_direction(PortAddress::output(a, 0), PortAddress::output(b, 0)).is_err());
        assert!(check_direction(PortAddress::input(a, 0), PortAddress::input(b, 0)).is_err());
        assert!(check_direction(PortAddress::input(a, 0), PortAddress::output(b, 0)).is_err());
    }

    #[test]
    fn test_check_data_type() {
        let mut graph = graph();
        let a = relay(&mut graph, DataType::integer());
        let b = relay(&mut graph, DataType::text());
        let (out, inp) = check_endpoints(&graph, PortAddress::output(a, 0), PortAddress::input(b, 0)).unwrap();

        assert!(matches!(
            check_data_type(&ExactMatch, out, inp),
            Err(GraphError::DataType { output, input }) if output.id == "integer" && input.id == "text"
        ));
        assert!(check_data_type(&|_: &DataType, _: &DataType| true, out, inp).is_ok());
    }

    #[test]
    fn test_check_cardinality_eviction_flag() {
        let mut graph = graph();
        let a = relay(&mut graph, DataType::integer());
        let b = relay(&mut graph, DataType::integer());
        let c = relay(&mut graph, DataType::integer());
        let existing = graph.connect(a, 0, c, 0).unwrap();

        let (out, inp) = check_endpoints(&graph, PortAddress::output(b, 0), PortAddress::input(c, 0)).unwrap();

        let replace = GraphSettings::default();
        assert_eq!(check_cardinality(&graph, out, inp, &replace), Ok(Some(existing)));

        let refuse = GraphSettings {
            replace_occupied_input: false,
            ..GraphSettings::default()
        };
        assert_eq!(
            check_cardinality(&graph, out, inp, &refuse),
            Err(GraphError::PortNotEmpty(PortAddress::input(c, 0)))
        );
    }

    #[test]
    fn test_check_cardinality_duplicate() {
        let mut graph = graph();
        let a = relay(&mut graph, DataType::integer());
        let b = relay(&mut graph, DataType::integer());
        let existing = graph.connect(a, 0, b, 0).unwrap();

        let (out, inp) = check_endpoints(&graph, PortAddress::output(a, 0), PortAddress::input(b, 0)).unwrap();
        assert_eq!(
            check_cardinality(&graph, out, inp, &GraphSettings::default()),
            Err(GraphError::AlreadyConnected(existing))
        );
    }

    #[test]
    fn test_reachability_and_cycles() {
        let mut graph = graph();
        let a = relay(&mut graph, DataType::integer());
        let b = relay(&mut graph, DataType::integer());
        let c = relay(&mut graph, DataType::integer());
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(b, 0, c, 0).unwrap();

        assert!(is_reachable(&graph, a, c));
        assert!(!is_reachable(&graph, c, a));
        assert!(is_reachable(&graph, b, b));

        assert_eq!(check_cycle(&graph, c, a), Err(GraphError::Cycle { from: c, to: a }));
        assert!(check_cycle(&graph, a, c).is_ok());
    }
}
