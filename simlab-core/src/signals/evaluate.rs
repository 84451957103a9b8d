//! Signal evaluation against one candle's indicator snapshot.
//!
//! Children are visited in document order. AND stops at the first false
//! child, OR at the first true one; the trace records exactly the nodes
//! that were visited.

use serde::Serialize;

use crate::domain::Candle;
use crate::indicators::IndicatorSnapshot;

use super::condition::Logic;
use super::tree::{CompiledCondition, FieldRef, ResolvedOperand, SignalNode};

/// Inputs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub candle: &'a Candle,
    pub indicators: &'a IndicatorSnapshot,
    /// Previous candle's snapshot. Crossing conditions are unsatisfied
    /// without it.
    pub prev_indicators: Option<&'a IndicatorSnapshot>,
}

/// Why a leaf could not be evaluated normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceNote {
    InvalidSnapshot,
    MissingValue,
    MissingPrevious,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TraceEntry {
    Condition {
        depth: usize,
        condition: String,
        lhs: Option<f64>,
        rhs: Option<f64>,
        satisfied: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<TraceNote>,
    },
    Group {
        depth: usize,
        logic: Logic,
        visited: usize,
        satisfied: bool,
    },
}

impl TraceEntry {
    pub fn satisfied(&self) -> bool {
        match self {
            TraceEntry::Condition { satisfied, .. } | TraceEntry::Group { satisfied, .. } => {
                *satisfied
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalOutcome {
    pub satisfied: bool,
    pub trace: Vec<TraceEntry>,
}

/// Evaluate a compiled signal tree.
///
/// An AND group with no children is satisfied (vacuous truth); an OR group
/// with no children is not. Leaves read nothing from an invalid snapshot
/// and are unsatisfied there.
pub fn evaluate(node: &SignalNode, ctx: &EvalContext<'_>) -> SignalOutcome {
    let mut trace = Vec::new();
    let satisfied = eval_node(node, ctx, 0, &mut trace);
    SignalOutcome { satisfied, trace }
}

fn eval_node(node: &SignalNode, ctx: &EvalContext<'_>, depth: usize, trace: &mut Vec<TraceEntry>) -> bool {
    match node {
        SignalNode::Leaf(condition) => {
            let entry = eval_condition(condition, ctx, depth);
            let satisfied = entry.satisfied();
            trace.push(entry);
            satisfied
        }
        SignalNode::Group { logic, children } => {
            // Reserve the group's slot so it precedes its children in the trace.
            let slot = trace.len();
            trace.push(TraceEntry::Group {
                depth,
                logic: *logic,
                visited: 0,
                satisfied: false,
            });

            let mut visited = 0;
            let satisfied = match logic {
                Logic::And => {
                    let mut result = true;
                    for child in children {
                        visited += 1;
                        if !eval_node(child, ctx, depth + 1, trace) {
                            result = false;
                            break;
                        }
                    }
                    result
                }
                Logic::Or => {
                    let mut result = false;
                    for child in children {
                        visited += 1;
                        if eval_node(child, ctx, depth + 1, trace) {
                            result = true;
                            break;
                        }
                    }
                    result
                }
            };

            trace[slot] = TraceEntry::Group {
                depth,
                logic: *logic,
                visited,
                satisfied,
            };
            satisfied
        }
    }
}

fn read(snapshot: &IndicatorSnapshot, field: &FieldRef) -> Option<f64> {
    snapshot.get(&field.indicator, &field.field)
}

fn read_operand(snapshot: &IndicatorSnapshot, operand: &ResolvedOperand) -> Option<f64> {
    match operand {
        ResolvedOperand::Constant(v) => Some(*v),
        ResolvedOperand::Field(field) => read(snapshot, field),
    }
}

fn eval_condition(condition: &CompiledCondition, ctx: &EvalContext<'_>, depth: usize) -> TraceEntry {
    let unsatisfied = |lhs: Option<f64>, rhs: Option<f64>, note: TraceNote| TraceEntry::Condition {
        depth,
        condition: condition.to_string(),
        lhs,
        rhs,
        satisfied: false,
        note: Some(note),
    };

    if !ctx.indicators.valid {
        return unsatisfied(None, None, TraceNote::InvalidSnapshot);
    }

    let lhs = read(ctx.indicators, &condition.lhs);
    let rhs = read_operand(ctx.indicators, &condition.rhs);
    let (Some(l), Some(r)) = (lhs, rhs) else {
        return unsatisfied(lhs, rhs, TraceNote::MissingValue);
    };

    let satisfied = if condition.op.is_crossing() {
        let prev = ctx.prev_indicators.filter(|p| p.valid).and_then(|p| {
            Some((read(p, &condition.lhs)?, read_operand(p, &condition.rhs)?))
        });
        match prev {
            Some(prev) => condition.op.crossed(prev, (l, r)),
            None => return unsatisfied(lhs, rhs, TraceNote::MissingPrevious),
        }
    } else {
        condition.op.holds(l, r)
    };

    TraceEntry::Condition {
        depth,
        condition: condition.to_string(),
        lhs,
        rhs,
        satisfied,
        note: None,
    }
}
