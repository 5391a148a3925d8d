//! Physical planning and push-based execution for tdf.
//!
//! Architecture role:
//! - binds logical expressions to column ordinals ([`expressions`])
//! - translates logical plans into linked operator chains ([`physical_planner`])
//! - chooses the physical aggregation strategy ([`strategy`])
//! - runs the chain from its scan and tracks the query lifecycle ([`state`])
//!
//! Key modules:
//! - [`accumulator`]
//! - [`expressions`]
//! - [`operators`]
//! - [`physical_planner`]
//! - [`state`]
//! - [`strategy`]

pub mod accumulator;
pub mod expressions;
pub mod operators;
pub mod physical_planner;
pub mod state;
pub mod strategy;

pub use accumulator::{create_accumulator, Accumulator};
pub use expressions::{evaluate_binary, PhysicalExpr};
pub use operators::PhysicalPlan;
pub use physical_planner::{create_physical_expr, DefaultQueryPlanner, QueryPlanner};
pub use state::{Query, QueryState, SessionState};
pub use strategy::{
    AggregateConstructor, AggregateParts, AggregateStrategy, AggregateStrategyRegistry,
    AggregateStrategySelector, GroupArityStrategySelector,
};
