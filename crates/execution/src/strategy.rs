//! Physical strategy selection for aggregation.
//!
//! One logical `Aggregate` has several physical realizations. A
//! [`AggregateStrategySelector`] decides which one from the shape of the
//! compiled aggregate; the [`AggregateStrategyRegistry`] maps that decision
//! to a constructor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::SchemaRef;
use tdf_common::{Result, TdfError};

use crate::expressions::PhysicalExpr;
use crate::operators::{AggregateInput, HashAggregateExec, OrderedAggregateExec, PhysicalPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateStrategy {
    /// Unordered hash table keyed by the encoded group tuple.
    Hash,
    /// Ordered map; output is sorted by group key.
    Ordered,
}

impl fmt::Display for AggregateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateStrategy::Hash => write!(f, "hash"),
            AggregateStrategy::Ordered => write!(f, "ordered"),
        }
    }
}

/// A compiled aggregate waiting for its physical operator.
#[derive(Debug)]
pub struct AggregateParts {
    pub group_exprs: Vec<PhysicalExpr>,
    pub aggr_exprs: Vec<AggregateInput>,
    pub schema: SchemaRef,
}

/// Builds the physical operator for a chosen strategy, linked to `next`.
pub type AggregateConstructor = fn(AggregateParts, PhysicalPlan) -> Result<PhysicalPlan>;

/// Decision function over the aggregate's shape.
pub trait AggregateStrategySelector: Send + Sync + fmt::Debug {
    fn select(&self, parts: &AggregateParts) -> AggregateStrategy;
}

/// More than one group-by expression selects the ordered strategy,
/// anything else the hash strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupArityStrategySelector;

impl AggregateStrategySelector for GroupArityStrategySelector {
    fn select(&self, parts: &AggregateParts) -> AggregateStrategy {
        if parts.group_exprs.len() > 1 {
            AggregateStrategy::Ordered
        } else {
            AggregateStrategy::Hash
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateStrategyRegistry {
    selector: Arc<dyn AggregateStrategySelector>,
    constructors: HashMap<AggregateStrategy, AggregateConstructor>,
}

impl Default for AggregateStrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStrategyRegistry {
    /// Registry with both built-in strategies and the group-arity selector.
    pub fn new() -> Self {
        let mut constructors: HashMap<AggregateStrategy, AggregateConstructor> = HashMap::new();
        constructors.insert(AggregateStrategy::Hash, hash_aggregate);
        constructors.insert(AggregateStrategy::Ordered, ordered_aggregate);
        Self {
            selector: Arc::new(GroupArityStrategySelector),
            constructors,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn AggregateStrategySelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Registers or replaces the constructor for `strategy`.
    ///
    /// Returns `true` when an existing constructor was replaced.
    pub fn register(&mut self, strategy: AggregateStrategy, ctor: AggregateConstructor) -> bool {
        self.constructors.insert(strategy, ctor).is_some()
    }

    pub fn select(&self, parts: &AggregateParts) -> AggregateStrategy {
        self.selector.select(parts)
    }

    /// Selects a strategy for `parts` and builds its operator.
    pub fn create(&self, parts: AggregateParts, next: PhysicalPlan) -> Result<PhysicalPlan> {
        let strategy = self.select(&parts);
        let ctor = self.constructors.get(&strategy).ok_or_else(|| {
            TdfError::Planning(format!("no constructor registered for {strategy} aggregation"))
        })?;
        ctor(parts, next)
    }
}

fn hash_aggregate(parts: AggregateParts, next: PhysicalPlan) -> Result<PhysicalPlan> {
    HashAggregateExec::try_new(parts.group_exprs, parts.aggr_exprs, parts.schema, next)
        .map(PhysicalPlan::HashAggregate)
}

fn ordered_aggregate(parts: AggregateParts, next: PhysicalPlan) -> Result<PhysicalPlan> {
    OrderedAggregateExec::try_new(parts.group_exprs, parts.aggr_exprs, parts.schema, next)
        .map(PhysicalPlan::OrderedAggregate)
}
