//! Logical planning for tdf: expressions, plans, validation and optimization.
//!
//! Architecture role:
//! - [`LogicalPlanBuilder`] assembles a validated [`LogicalPlan`] chain
//! - [`Optimizer`] rewrites it with rule passes, projection pushdown first
//! - [`pretty_print`] renders the stable text form used by tests and tools
//!
//! Key modules:
//! - [`logical_plan`]
//! - [`builder`]
//! - [`validator`]
//! - [`optimizer`]
//! - [`explain`]

pub mod builder;
pub mod explain;
pub mod logical_plan;
pub mod optimizer;
pub mod validator;

pub use builder::LogicalPlanBuilder;
pub use explain::pretty_print;
pub use logical_plan::*;
pub use optimizer::{Optimizer, OptimizerRule, ProjectionPushdown};
pub use validator::validate;
