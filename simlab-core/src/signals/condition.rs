//! Signal configuration as written by users.
//!
//! These types mirror the strategy file and keep omitted fields as `None`.
//! Defaults (AND logic, `value` field) are applied in exactly one place,
//! [`super::tree::compile_group`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance for `==` and `!=`.
pub const EQ_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "==", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
}

impl Comparison {
    pub fn is_crossing(self) -> bool {
        matches!(self, Comparison::CrossesAbove | Comparison::CrossesBelow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::CrossesAbove => "crosses_above",
            Comparison::CrossesBelow => "crosses_below",
        }
    }

    /// Point comparison. Crossing variants need the previous pair and are
    /// handled by [`Comparison::crossed`].
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Gte => lhs >= rhs,
            Comparison::Eq => (lhs - rhs).abs() <= EQ_TOLERANCE,
            Comparison::Ne => (lhs - rhs).abs() > EQ_TOLERANCE,
            Comparison::CrossesAbove | Comparison::CrossesBelow => false,
        }
    }

    /// Crossing between the previous and current candle.
    pub fn crossed(self, prev: (f64, f64), now: (f64, f64)) -> bool {
        match self {
            Comparison::CrossesAbove => prev.0 <= prev.1 && now.0 > now.1,
            Comparison::CrossesBelow => prev.0 >= prev.1 && now.0 < now.1,
            _ => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Value(f64),
    Indicator {
        indicator: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCondition {
    pub indicator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(alias = "operator")]
    pub op: Comparison,
    pub threshold: Operand,
}

impl SignalCondition {
    pub fn new(indicator: impl Into<String>, op: Comparison, threshold: impl Into<Operand>) -> Self {
        Self {
            indicator: indicator.into(),
            field: None,
            op,
            threshold: threshold.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Compare against another indicator's field.
    pub fn against(
        indicator: impl Into<String>,
        op: Comparison,
        other: impl Into<String>,
        other_field: Option<&str>,
    ) -> Self {
        Self {
            indicator: indicator.into(),
            field: None,
            op,
            threshold: Operand::Indicator {
                indicator: other.into(),
                field: other_field.map(str::to_string),
            },
        }
    }
}

/// Nested AND/OR group. Evaluation order is document order: conditions
/// first, then nested groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<SignalCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<SignalGroupConfig>,
}

impl SignalGroupConfig {
    pub fn all(conditions: Vec<SignalCondition>) -> Self {
        Self {
            logic: Some(Logic::And),
            conditions,
            groups: Vec::new(),
        }
    }

    pub fn any(conditions: Vec<SignalCondition>) -> Self {
        Self {
            logic: Some(Logic::Or),
            conditions,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: SignalGroupConfig) -> Self {
        self.groups.push(group);
        self
    }
}
