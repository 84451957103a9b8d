//! Normalised signal tree.
//!
//! A [`SignalGroupConfig`] is compiled once, at strategy load, into a
//! [`SignalNode`]: group logic defaults to AND, omitted fields resolve to
//! [`VALUE_FIELD`], and every indicator/field reference is checked against
//! the strategy's declared indicators. Evaluation never sees an `Option`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;
use crate::indicators::VALUE_FIELD;

use super::condition::{Comparison, Logic, Operand, SignalCondition, SignalGroupConfig};

/// Deepest nesting accepted for a signal group.
pub const MAX_GROUP_DEPTH: usize = 16;

/// Declared indicator aliases and the fields each exposes.
pub type IndicatorCatalog = BTreeMap<String, &'static [&'static str]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub indicator: String,
    pub field: String,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.indicator, self.field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperand {
    Constant(f64),
    Field(FieldRef),
}

impl fmt::Display for ResolvedOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedOperand::Constant(v) => write!(f, "{v}"),
            ResolvedOperand::Field(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCondition {
    pub lhs: FieldRef,
    pub op: Comparison,
    pub rhs: ResolvedOperand,
}

impl fmt::Display for CompiledCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalNode {
    Leaf(CompiledCondition),
    Group {
        logic: Logic,
        children: Vec<SignalNode>,
    },
}

impl SignalNode {
    /// True if any leaf in the tree is a crossing condition.
    pub fn uses_crossing(&self) -> bool {
        match self {
            SignalNode::Leaf(c) => c.op.is_crossing(),
            SignalNode::Group { children, .. } => children.iter().any(SignalNode::uses_crossing),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            SignalNode::Leaf(_) => 1,
            SignalNode::Group { children, .. } => children.iter().map(SignalNode::leaf_count).sum(),
        }
    }
}

/// Compile a group against the declared indicators.
pub fn compile_group(
    group: &SignalGroupConfig,
    catalog: &IndicatorCatalog,
) -> Result<SignalNode, ConfigError> {
    compile_at_depth(group, catalog, 0)
}

fn compile_at_depth(
    group: &SignalGroupConfig,
    catalog: &IndicatorCatalog,
    depth: usize,
) -> Result<SignalNode, ConfigError> {
    if depth >= MAX_GROUP_DEPTH {
        return Err(ConfigError::MalformedSignalGroup(format!(
            "groups nested deeper than {MAX_GROUP_DEPTH} levels"
        )));
    }

    let mut children = Vec::with_capacity(group.conditions.len() + group.groups.len());
    for condition in &group.conditions {
        children.push(SignalNode::Leaf(compile_condition(condition, catalog)?));
    }
    for nested in &group.groups {
        children.push(compile_at_depth(nested, catalog, depth + 1)?);
    }

    Ok(SignalNode::Group {
        logic: group.logic.unwrap_or_default(),
        children,
    })
}

fn compile_condition(
    condition: &SignalCondition,
    catalog: &IndicatorCatalog,
) -> Result<CompiledCondition, ConfigError> {
    let lhs = resolve_field(&condition.indicator, condition.field.as_deref(), catalog)?;
    let rhs = match &condition.threshold {
        Operand::Value(v) => {
            if !v.is_finite() {
                return Err(ConfigError::MalformedSignalGroup(format!(
                    "threshold for '{}' is not a finite number",
                    lhs
                )));
            }
            ResolvedOperand::Constant(*v)
        }
        Operand::Indicator { indicator, field } => {
            ResolvedOperand::Field(resolve_field(indicator, field.as_deref(), catalog)?)
        }
    };
    Ok(CompiledCondition {
        lhs,
        op: condition.op,
        rhs,
    })
}

fn resolve_field(
    indicator: &str,
    field: Option<&str>,
    catalog: &IndicatorCatalog,
) -> Result<FieldRef, ConfigError> {
    let fields = catalog
        .get(indicator)
        .ok_or_else(|| ConfigError::UnknownIndicator(indicator.to_string()))?;
    let field = field.unwrap_or(VALUE_FIELD);
    if !fields.contains(&field) {
        return Err(ConfigError::UnknownField {
            indicator: indicator.to_string(),
            field: field.to_string(),
            available: fields.join(", "),
        });
    }
    Ok(FieldRef {
        indicator: indicator.to_string(),
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> IndicatorCatalog {
        let mut c = IndicatorCatalog::new();
        c.insert("rsi".into(), &["value"][..]);
        c.insert("macd".into(), &["value", "signal", "histogram"][..]);
        c
    }

    #[test]
    fn omitted_logic_and_field_are_normalised() {
        let group = SignalGroupConfig {
            logic: None,
            conditions: vec![SignalCondition::new("rsi", Comparison::Lt, 30.0)],
            groups: vec![],
        };
        let node = compile_group(&group, &catalog()).unwrap();
        let SignalNode::Group { logic, children } = node else {
            panic!("expected group");
        };
        assert_eq!(logic, Logic::And);
        let SignalNode::Leaf(cond) = &children[0] else {
            panic!("expected leaf");
        };
        assert_eq!(cond.lhs.field, "value");
        assert_eq!(cond.to_string(), "rsi.value < 30");
    }

    #[test]
    fn document_order_conditions_then_groups() {
        let group = SignalGroupConfig::all(vec![SignalCondition::new("rsi", Comparison::Gt, 50.0)])
            .with_group(SignalGroupConfig::any(vec![]));
        let SignalNode::Group { children, .. } = compile_group(&group, &catalog()).unwrap() else {
            panic!("expected group");
        };
        assert!(matches!(children[0], SignalNode::Leaf(_)));
        assert!(matches!(children[1], SignalNode::Group { logic: Logic::Or, .. }));
    }

    #[test]
    fn unknown_indicator_rejected() {
        let group = SignalGroupConfig::all(vec![SignalCondition::new("ema", Comparison::Gt, 1.0)]);
        assert_eq!(
            compile_group(&group, &catalog()),
            Err(ConfigError::UnknownIndicator("ema".into()))
        );
    }

    #[test]
    fn unknown_field_rejected_with_available_list() {
        let group = SignalGroupConfig::all(vec![
            SignalCondition::new("macd", Comparison::Gt, 0.0).with_field("upper")
        ]);
        match compile_group(&group, &catalog()) {
            Err(ConfigError::UnknownField { available, .. }) => {
                assert_eq!(available, "value, signal, histogram")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_operand_indicator_rejected() {
        let group = SignalGroupConfig::all(vec![SignalCondition::against(
            "rsi",
            Comparison::CrossesAbove,
            "slow",
            None,
        )]);
        assert_eq!(
            compile_group(&group, &catalog()),
            Err(ConfigError::UnknownIndicator("slow".into()))
        );
    }

    #[test]
    fn non_finite_threshold_rejected() {
        let group = SignalGroupConfig::all(vec![SignalCondition::new("rsi", Comparison::Gt, f64::NAN)]);
        assert!(matches!(
            compile_group(&group, &catalog()),
            Err(ConfigError::MalformedSignalGroup(_))
        ));
    }

    #[test]
    fn excessive_nesting_rejected() {
        let mut group = SignalGroupConfig::default();
        for _ in 0..MAX_GROUP_DEPTH {
            group = SignalGroupConfig::default().with_group(group);
        }
        assert!(matches!(
            compile_group(&group, &catalog()),
            Err(ConfigError::MalformedSignalGroup(_))
        ));
    }

    #[test]
    fn crossing_detection() {
        let plain = SignalGroupConfig::all(vec![SignalCondition::new("rsi", Comparison::Gt, 1.0)]);
        let crossing = SignalGroupConfig::default().with_group(SignalGroupConfig::all(vec![
            SignalCondition::against("macd", Comparison::CrossesAbove, "macd", Some("signal")),
        ]));
        assert!(!compile_group(&plain, &catalog()).unwrap().uses_crossing());
        let node = compile_group(&crossing, &catalog()).unwrap();
        assert!(node.uses_crossing());
        assert_eq!(node.leaf_count(), 1);
    }
}
