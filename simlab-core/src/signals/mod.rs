//! Signal evaluator: boolean condition trees over indicator snapshots.
//!
//! Configuration ([`SignalGroupConfig`]) is compiled once into a
//! [`SignalNode`] tree and evaluated per candle with [`evaluate`].

pub mod condition;
pub mod evaluate;
pub mod tree;

pub use condition::{Comparison, Logic, Operand, SignalCondition, SignalGroupConfig, EQ_TOLERANCE};
pub use evaluate::{evaluate, EvalContext, SignalOutcome, TraceEntry, TraceNote};
pub use tree::{
    compile_group, CompiledCondition, FieldRef, IndicatorCatalog, ResolvedOperand, SignalNode,
    MAX_GROUP_DEPTH,
};
