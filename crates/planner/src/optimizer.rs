use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tdf_common::{Result, SchemaExt};
use tracing::debug;

use crate::logical_plan::{Expr, LogicalPlan};

/// Rewrite rule applied to a whole logical plan.
///
/// Rules must preserve query results; they may only change how cheaply
/// those results are produced.
pub trait OptimizerRule: Send + Sync {
    /// Stable rule name used by the registry and logs.
    fn name(&self) -> &str;
    /// Rewrite input plan and return transformed plan.
    fn rewrite(&self, plan: LogicalPlan) -> Result<LogicalPlan>;
}

/// Rule-based optimizer.
///
/// Built-in rules run first in a fixed order, then custom rules sorted by
/// name. Each rule consumes the previous rule's output.
pub struct Optimizer {
    builtin_rules: Vec<Arc<dyn OptimizerRule>>,
    custom_rules: RwLock<HashMap<String, Arc<dyn OptimizerRule>>>,
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .custom_rules
            .read()
            .map(|m| m.len())
            .unwrap_or_default();
        f.debug_struct("Optimizer")
            .field(
                "builtin_rules",
                &self.builtin_rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("custom_rules", &count)
            .finish()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer {
    /// Optimizer with the built-in pipeline: projection pushdown.
    pub fn new() -> Self {
        Self {
            builtin_rules: vec![Arc::new(ProjectionPushdown)],
            custom_rules: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a custom optimizer rule.
    ///
    /// Returns `true` when an existing rule with the same name was replaced.
    pub fn register_rule(&self, rule: Arc<dyn OptimizerRule>) -> bool {
        self.custom_rules
            .write()
            .expect("optimizer rule lock poisoned")
            .insert(rule.name().to_string(), rule)
            .is_some()
    }

    /// Deregister a custom optimizer rule by name.
    ///
    /// Returns `true` when an existing rule was removed.
    pub fn deregister_rule(&self, name: &str) -> bool {
        self.custom_rules
            .write()
            .expect("optimizer rule lock poisoned")
            .remove(name)
            .is_some()
    }

    pub fn optimize(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        let mut custom = self
            .custom_rules
            .read()
            .expect("optimizer rule lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect::<Vec<_>>();
        custom.sort_by(|a, b| a.0.cmp(&b.0));

        let mut plan = plan;
        for rule in self
            .builtin_rules
            .iter()
            .chain(custom.iter().map(|(_, r)| r))
        {
            plan = rule.rewrite(plan)?;
            debug!(rule = rule.name(), "optimizer rule applied");
        }
        Ok(plan)
    }
}

// -----------------------------
// Projection pushdown
// -----------------------------

/// Narrows the leaf scan to the columns referenced by its ancestors.
///
/// Names are collected top-down in first-seen order. Only nodes that define
/// their own output (projection, aggregate) allow narrowing; a plan with
/// neither above the scan still needs every source column and keeps its
/// projection.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectionPushdown;

impl OptimizerRule for ProjectionPushdown {
    fn name(&self) -> &str {
        "projection_pushdown"
    }

    fn rewrite(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
        let mut required = Vec::new();
        pushdown(plan, &mut required, true)
    }
}

fn pushdown(
    plan: LogicalPlan,
    required: &mut Vec<String>,
    needs_all: bool,
) -> Result<LogicalPlan> {
    match plan {
        LogicalPlan::Output { input, sink } => Ok(LogicalPlan::Output {
            input: Box::new(pushdown(*input, required, needs_all)?),
            sink,
        }),
        LogicalPlan::Projection { input, exprs } => {
            exprs.iter().for_each(|e| add_columns(e, required));
            Ok(LogicalPlan::Projection {
                input: Box::new(pushdown(*input, required, false)?),
                exprs,
            })
        }
        LogicalPlan::Selection { input, predicate } => {
            add_columns(&predicate, required);
            Ok(LogicalPlan::Selection {
                input: Box::new(pushdown(*input, required, needs_all)?),
                predicate,
            })
        }
        LogicalPlan::Aggregate {
            input,
            group_exprs,
            aggr_exprs,
        } => {
            group_exprs
                .iter()
                .chain(&aggr_exprs)
                .for_each(|e| add_columns(e, required));
            Ok(LogicalPlan::Aggregate {
                input: Box::new(pushdown(*input, required, false)?),
                group_exprs,
                aggr_exprs,
            })
        }
        input @ LogicalPlan::Input { .. } => {
            if needs_all || required.is_empty() {
                return Ok(input);
            }
            let available = input.schema()?;
            let keep: Vec<String> = required
                .iter()
                .filter(|c| available.ordinal_of(c).is_some())
                .cloned()
                .collect();
            if keep.is_empty() {
                return Ok(input);
            }
            match input {
                LogicalPlan::Input { path, source, .. } => Ok(LogicalPlan::Input {
                    path,
                    source,
                    projection: Some(keep),
                }),
                other => Ok(other),
            }
        }
    }
}

fn add_columns(e: &Expr, required: &mut Vec<String>) {
    let mut cols = Vec::new();
    e.collect_columns(&mut cols);
    for c in cols {
        if !required.contains(&c) {
            required.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};
    use tdf_storage::MemTableProvider;

    use super::*;
    use crate::builder::LogicalPlanBuilder;
    use crate::explain::pretty_print;
    use crate::logical_plan::{AggregateExpr, AggregateFunction, BinaryOp, LiteralValue};

    fn source() -> Arc<MemTableProvider> {
        Arc::new(MemTableProvider::new(
            "t",
            Arc::new(Schema::new(vec![
                Field::new("a", DataType::Int64, false),
                Field::new("b", DataType::Int64, false),
                Field::new("c", DataType::Int64, false),
            ])),
        ))
    }

    fn col(n: &str) -> Expr {
        Expr::Column(n.to_string())
    }

    fn leaf_projection(plan: &LogicalPlan) -> Option<Vec<String>> {
        match plan {
            LogicalPlan::Input { projection, .. } => projection.clone(),
            other => leaf_projection(other.input().expect("chain ends in a scan")),
        }
    }

    #[test]
    fn selection_only_plan_keeps_every_column() {
        let plan = LogicalPlanBuilder::new()
            .input("t", source(), None)
            .filter(Expr::BinaryExpr {
                left: Box::new(col("a")),
                op: BinaryOp::Gt,
                right: Box::new(Expr::Literal(LiteralValue::Int64(1))),
            })
            .build()
            .expect("plan");
        let optimized = Optimizer::new().optimize(plan.clone()).expect("optimize");
        assert_eq!(pretty_print(&plan, 0), pretty_print(&optimized, 0));
    }

    #[test]
    fn aggregate_operands_are_pushed_in_first_seen_order() {
        let plan = LogicalPlanBuilder::new()
            .input("t", source(), None)
            .aggregate(
                vec![col("c")],
                vec![Expr::AggregateFunction(AggregateExpr {
                    func: AggregateFunction::Sum,
                    expr: Box::new(col("a")),
                })],
            )
            .build()
            .expect("plan");
        let optimized = Optimizer::new().optimize(plan).expect("optimize");
        assert_eq!(
            leaf_projection(&optimized),
            Some(vec!["c".to_string(), "a".to_string()])
        );
    }

    struct CountingRule(&'static str, Arc<std::sync::atomic::AtomicUsize>);

    impl OptimizerRule for CountingRule {
        fn name(&self) -> &str {
            self.0
        }

        fn rewrite(&self, plan: LogicalPlan) -> Result<LogicalPlan> {
            self.1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(plan)
        }
    }

    #[test]
    fn custom_rules_can_be_registered_and_removed() {
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let opt = Optimizer::new();
        assert!(!opt.register_rule(Arc::new(CountingRule("count", hits.clone()))));
        assert!(opt.register_rule(Arc::new(CountingRule("count", hits.clone()))));

        let plan = LogicalPlanBuilder::new()
            .input("t", source(), None)
            .build()
            .expect("plan");
        opt.optimize(plan.clone()).expect("optimize");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert!(opt.deregister_rule("count"));
        opt.optimize(plan).expect("optimize");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
