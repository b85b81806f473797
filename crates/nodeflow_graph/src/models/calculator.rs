// SPDX-License-Identifier: MIT OR Apache-2.0
//! Calculator node family.
//!
//! Number sources feed binary math operations whose results can be shown
//! by a display node. Operations recompute whenever an input token changes
//! and report a warning until both operands are present.

use crate::connection::Connection;
use crate::data_type::{DataType, PortValue};
use crate::model::{ModelError, NodeModel, NodeValidation};
use crate::port::PortSpec;
use crate::registry::{DataTypeRegistry, RegistryError};
use serde_json::{json, Value};

const MISSING_INPUTS: &str = "Missing or incorrect inputs";
const DIVISION_BY_ZERO: &str = "Division by zero error";

/// Create the calculator registry with all available models
pub fn create_calculator_registry() -> DataTypeRegistry {
    let mut registry = DataTypeRegistry::new();
    // A fresh registry holds no keys, so none of these can collide
    register_calculator_models(&mut registry).unwrap_or_else(|err| {
        tracing::error!(%err, "calculator registry setup failed");
    });
    registry
}

/// Add the calculator models and converters to an existing registry
pub fn register_calculator_models(registry: &mut DataTypeRegistry) -> Result<(), RegistryError> {
    // ========================================================================
    // Sources
    // ========================================================================

    registry.register_model("NumberSource", "Sources", || Box::new(NumberSource::default()))?;
    registry.register_model("IntegerSource", "Sources", || Box::new(IntegerSource::default()))?;

    // ========================================================================
    // Operations
    // ========================================================================

    for operation in Operation::ALL {
        registry.register_model(operation.name(), "Operations", move || {
            Box::new(MathOperation::new(operation))
        })?;
    }

    // ========================================================================
    // Displays
    // ========================================================================

    registry.register_model("NumberDisplay", "Displays", || Box::new(NumberDisplay::default()))?;

    registry.register_type_converter(&DataType::integer(), &DataType::decimal(), integer_to_decimal);
    registry.register_type_converter(&DataType::decimal(), &DataType::integer(), decimal_to_integer);
    Ok(())
}

fn integer_to_decimal(value: PortValue) -> PortValue {
    match value {
        PortValue::Integer(v) => PortValue::Decimal(v as f64),
        other => other,
    }
}

/// Truncates toward zero
fn decimal_to_integer(value: PortValue) -> PortValue {
    match value {
        PortValue::Decimal(v) => PortValue::Integer(v as i64),
        other => other,
    }
}

fn read_number(state: &Value) -> Result<&Value, ModelError> {
    state
        .get("number")
        .ok_or_else(|| ModelError::new("missing \"number\" field"))
}

/// Decimal constant
#[derive(Debug, Clone, Default)]
pub struct NumberSource {
    value: f64,
}

impl NumberSource {
    /// Source producing `value`
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Change the value; downstream inputs see it after a refresh
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

impl NodeModel for NumberSource {
    fn name(&self) -> &str {
        "NumberSource"
    }

    fn input_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::output(DataType::decimal()).with_label("Result")]
    }

    fn out_data(&self, port_index: usize) -> Option<PortValue> {
        (port_index == 0).then_some(PortValue::Decimal(self.value))
    }

    fn save(&self) -> Value {
        json!({ "number": self.value })
    }

    fn restore(&mut self, state: &Value) -> Result<(), ModelError> {
        self.value = read_number(state)?
            .as_f64()
            .ok_or_else(|| ModelError::new("\"number\" is not a decimal"))?;
        Ok(())
    }
}

/// Integer constant
#[derive(Debug, Clone, Default)]
pub struct IntegerSource {
    value: i64,
}

impl IntegerSource {
    /// Source producing `value`
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    /// Current value
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Change the value; downstream inputs see it after a refresh
    pub fn set_value(&mut self, value: i64) {
        self.value = value;
    }
}

impl NodeModel for IntegerSource {
    fn name(&self) -> &str {
        "IntegerSource"
    }

    fn input_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::output(DataType::integer()).with_label("Result")]
    }

    fn out_data(&self, port_index: usize) -> Option<PortValue> {
        (port_index == 0).then_some(PortValue::Integer(self.value))
    }

    fn save(&self) -> Value {
        json!({ "number": self.value })
    }

    fn restore(&mut self, state: &Value) -> Result<(), ModelError> {
        self.value = read_number(state)?
            .as_i64()
            .ok_or_else(|| ModelError::new("\"number\" is not an integer"))?;
        Ok(())
    }
}

/// Binary operation performed by a [`MathOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `a + b`
    Addition,
    /// `a - b`
    Subtraction,
    /// `a * b`
    Multiplication,
    /// `a / b`, fails on a zero divisor
    Division,
    /// Integer remainder, fails on a zero divisor
    Modulo,
}

impl Operation {
    /// Every operation, in palette order
    pub const ALL: [Operation; 5] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiplication,
        Self::Division,
        Self::Modulo,
    ];

    /// Registry key
    pub fn name(self) -> &'static str {
        match self {
            Self::Addition => "Addition",
            Self::Subtraction => "Subtraction",
            Self::Multiplication => "Multiplication",
            Self::Division => "Division",
            Self::Modulo => "Modulo",
        }
    }

    /// Type of both operands and the result
    pub fn data_type(self) -> DataType {
        match self {
            Self::Modulo => DataType::integer(),
            _ => DataType::decimal(),
        }
    }

    fn operand_labels(self) -> [&'static str; 2] {
        match self {
            Self::Addition | Self::Multiplication => ["A", "B"],
            Self::Subtraction => ["Minuend", "Subtrahend"],
            Self::Division | Self::Modulo => ["Dividend", "Divisor"],
        }
    }

    /// Compute the result, or the message explaining why there is none
    fn apply(self, lhs: &PortValue, rhs: &PortValue) -> Result<PortValue, &'static str> {
        if self == Self::Modulo {
            let (Some(a), Some(b)) = (as_whole(lhs), as_whole(rhs)) else {
                return Err(MISSING_INPUTS);
            };
            if b == 0 {
                return Err(DIVISION_BY_ZERO);
            }
            return Ok(PortValue::Integer(a.wrapping_rem(b)));
        }

        let (Some(a), Some(b)) = (lhs.as_decimal(), rhs.as_decimal()) else {
            return Err(MISSING_INPUTS);
        };
        let result = match self {
            Self::Addition => a + b,
            Self::Subtraction => a - b,
            Self::Multiplication => a * b,
            Self::Division | Self::Modulo => {
                if b == 0.0 {
                    return Err(DIVISION_BY_ZERO);
                }
                a / b
            }
        };
        Ok(PortValue::Decimal(result))
    }
}

/// Integer view of a token; decimals are truncated like the converter does
fn as_whole(value: &PortValue) -> Option<i64> {
    match value {
        PortValue::Integer(v) => Some(*v),
        PortValue::Decimal(v) => Some(*v as i64),
        PortValue::Text(_) => None,
    }
}

/// Two-input math node
#[derive(Debug, Clone)]
pub struct MathOperation {
    operation: Operation,
    operands: [Option<PortValue>; 2],
    result: Option<PortValue>,
    validation: NodeValidation,
}

impl MathOperation {
    /// Create an operation node with no inputs yet
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            operands: [None, None],
            result: None,
            validation: NodeValidation::warning("Uninitialized"),
        }
    }

    /// Operation performed
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Last computed result
    pub fn result(&self) -> Option<&PortValue> {
        self.result.as_ref()
    }

    fn recompute(&mut self) {
        let outcome = match &self.operands {
            [Some(lhs), Some(rhs)] => self.operation.apply(lhs, rhs),
            _ => Err(MISSING_INPUTS),
        };
        match outcome {
            Ok(value) => {
                self.result = Some(value);
                self.validation = NodeValidation::valid();
            }
            Err(message) => {
                self.result = None;
                self.validation = if message == DIVISION_BY_ZERO {
                    NodeValidation::error(message)
                } else {
                    NodeValidation::warning(message)
                };
            }
        }
    }
}

impl NodeModel for MathOperation {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn input_ports(&self) -> Vec<PortSpec> {
        self.operation
            .operand_labels()
            .into_iter()
            .map(|label| PortSpec::input(self.operation.data_type()).with_label(label))
            .collect()
    }

    fn output_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::output(self.operation.data_type()).with_label("Result")]
    }

    fn set_in_data(&mut self, port_index: usize, data: Option<PortValue>) {
        let Some(slot) = self.operands.get_mut(port_index) else {
            return;
        };
        *slot = data;
        self.recompute();
    }

    fn out_data(&self, port_index: usize) -> Option<PortValue> {
        if port_index == 0 {
            self.result.clone()
        } else {
            None
        }
    }

    fn validation(&self) -> NodeValidation {
        self.validation.clone()
    }
}

/// Sink showing the number it receives
#[derive(Debug, Clone)]
pub struct NumberDisplay {
    value: Option<PortValue>,
    validation: NodeValidation,
}

impl Default for NumberDisplay {
    fn default() -> Self {
        Self {
            value: None,
            validation: NodeValidation::warning("Uninitialized"),
        }
    }
}

impl NumberDisplay {
    /// Number currently shown
    pub fn value(&self) -> Option<&PortValue> {
        self.value.as_ref()
    }

    /// Text shown on the node, empty when nothing is connected
    pub fn text(&self) -> String {
        self.value.as_ref().map(PortValue::to_string).unwrap_or_default()
    }
}

impl NodeModel for NumberDisplay {
    fn name(&self) -> &str {
        "NumberDisplay"
    }

    fn input_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input(DataType::decimal()).with_label("Number")]
    }

    fn output_ports(&self) -> Vec<PortSpec> {
        Vec::new()
    }

    fn on_input_disconnected(&mut self, _port_index: usize, connection: &Connection) {
        tracing::trace!(%connection, "display input detached");
    }

    fn set_in_data(&mut self, _port_index: usize, data: Option<PortValue>) {
        let numeric = data.as_ref().and_then(PortValue::as_decimal).is_some();
        if numeric {
            self.value = data;
            self.validation = NodeValidation::valid();
        } else {
            self.value = None;
            self.validation = NodeValidation::warning(MISSING_INPUTS);
        }
    }

    fn validation(&self) -> NodeValidation {
        self.validation.clone()
    }
}
