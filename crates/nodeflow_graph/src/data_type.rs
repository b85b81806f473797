// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data types carried by ports and the rules deciding which ones may be linked.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the kind of value a port accepts or produces.
///
/// Two data types are the same kind when their ids match; the name is only
/// used for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    /// Stable identifier used for compatibility checks
    pub id: String,
    /// Human readable name
    pub name: String,
}

impl DataType {
    /// Create a new data type
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Floating point number
    pub fn decimal() -> Self {
        Self::new("decimal", "Decimal")
    }

    /// Whole number
    pub fn integer() -> Self {
        Self::new("integer", "Integer")
    }

    /// Text value
    pub fn text() -> Self {
        Self::new("text", "Text")
    }

    /// Whether both types share the same id
    pub fn same_kind(&self, other: &DataType) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Answers whether an output of one type may feed an input of another.
pub trait TypeCompatibility: Send + Sync {
    /// Check if `output` can be connected to `input`
    fn is_compatible(&self, output: &DataType, input: &DataType) -> bool;
}

impl<F> TypeCompatibility for F
where
    F: Fn(&DataType, &DataType) -> bool + Send + Sync,
{
    fn is_compatible(&self, output: &DataType, input: &DataType) -> bool {
        self(output, input)
    }
}

/// Default rule: ids must match exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl TypeCompatibility for ExactMatch {
    fn is_compatible(&self, output: &DataType, input: &DataType) -> bool {
        output.same_kind(input)
    }
}

/// Exact match plus implicit numeric widening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericWidening;

impl TypeCompatibility for NumericWidening {
    fn is_compatible(&self, output: &DataType, input: &DataType) -> bool {
        if output.same_kind(input) {
            return true;
        }

        // Widening only; narrowing would lose the fractional part
        matches!(
            (output.id.as_str(), input.id.as_str()),
            ("integer", "decimal")
        )
    }
}

/// Value token produced by an output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Floating point number
    Decimal(f64),
    /// Whole number
    Integer(i64),
    /// Text
    Text(String),
}

impl PortValue {
    /// Get the data type for this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Decimal(_) => DataType::decimal(),
            Self::Integer(_) => DataType::integer(),
            Self::Text(_) => DataType::text(),
        }
    }

    /// Numeric view of the value, widening integers
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::Text(_) => None,
        }
    }

    /// Integer view of the value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(ExactMatch.is_compatible(&DataType::integer(), &DataType::integer()));
        assert!(!ExactMatch.is_compatible(&DataType::integer(), &DataType::text()));
        // Names are display only
        let renamed = DataType::new("integer", "Whole Number");
        assert!(ExactMatch.is_compatible(&renamed, &DataType::integer()));
    }

    #[test]
    fn test_numeric_widening_is_directional() {
        assert!(NumericWidening.is_compatible(&DataType::integer(), &DataType::decimal()));
        assert!(!NumericWidening.is_compatible(&DataType::decimal(), &DataType::integer()));
        assert!(!NumericWidening.is_compatible(&DataType::text(), &DataType::decimal()));
    }

    #[test]
    fn test_closure_predicate() {
        let anything_to_text = |_: &DataType, input: &DataType| input.id == "text";
        assert!(anything_to_text.is_compatible(&DataType::decimal(), &DataType::text()));
        assert!(!anything_to_text.is_compatible(&DataType::text(), &DataType::decimal()));
    }

    #[test]
    fn test_port_value_types() {
        assert_eq!(PortValue::Integer(3).data_type(), DataType::integer());
        assert_eq!(PortValue::Integer(3).as_decimal(), Some(3.0));
        assert_eq!(PortValue::Text("a".into()).as_decimal(), None);
        assert_eq!(PortValue::Decimal(1.5).to_string(), "1.5");
    }
}
