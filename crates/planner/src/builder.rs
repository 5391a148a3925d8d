use std::sync::Arc;

use tdf_common::{Result, TdfError};
use tdf_storage::TableProvider;

use crate::logical_plan::{Expr, LogicalPlan, Sink};
use crate::validator::validate;

/// Fluent constructor for logical plans.
///
/// Every step wraps the current plan as the input of a new root. Misuse
/// (e.g. a filter before any input) is remembered and reported by
/// [`LogicalPlanBuilder::build`]. Cloning is cheap and the clones never
/// share a root, so an inspection copy and an execution copy can diverge.
#[derive(Debug, Clone, Default)]
pub struct LogicalPlanBuilder {
    plan: Option<LogicalPlan>,
    error: Option<String>,
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder continuing from an existing plan.
    pub fn from_plan(plan: LogicalPlan) -> Self {
        Self {
            plan: Some(plan),
            error: None,
        }
    }

    /// Starts the chain with a scan of `source`.
    pub fn input(
        mut self,
        path: impl Into<String>,
        source: Arc<dyn TableProvider>,
        projection: Option<Vec<String>>,
    ) -> Self {
        if self.plan.is_some() {
            self.fail("input() called on a builder that already has an input");
            return self;
        }
        self.plan = Some(LogicalPlan::Input {
            path: path.into(),
            source,
            projection,
        });
        self
    }

    pub fn project(self, exprs: Vec<Expr>) -> Self {
        self.wrap("project", |input| LogicalPlan::Projection { input, exprs })
    }

    pub fn filter(self, predicate: Expr) -> Self {
        self.wrap("filter", |input| LogicalPlan::Selection { input, predicate })
    }

    pub fn aggregate(self, group_exprs: Vec<Expr>, aggr_exprs: Vec<Expr>) -> Self {
        self.wrap("aggregate", |input| LogicalPlan::Aggregate {
            input,
            group_exprs,
            aggr_exprs,
        })
    }

    /// Terminates the chain with a sink receiving result batches.
    pub fn output(self, sink: Sink) -> Self {
        self.wrap("output", |input| LogicalPlan::Output { input, sink })
    }

    /// Current root without validation.
    pub fn plan(&self) -> Option<&LogicalPlan> {
        self.plan.as_ref()
    }

    /// Validates and returns the plan. The builder stays usable.
    pub fn build(&self) -> Result<LogicalPlan> {
        if let Some(msg) = &self.error {
            return Err(TdfError::Validation(msg.clone()));
        }
        let plan = self
            .plan
            .clone()
            .ok_or_else(|| TdfError::Validation("plan has no input".to_string()))?;
        validate(&plan)?;
        Ok(plan)
    }

    fn wrap(mut self, step: &str, f: impl FnOnce(Box<LogicalPlan>) -> LogicalPlan) -> Self {
        match self.plan.take() {
            Some(plan) => self.plan = Some(f(Box::new(plan))),
            None => self.fail(&format!("{step}() called before input()")),
        }
        self
    }

    fn fail(&mut self, msg: &str) {
        // first error wins
        if self.error.is_none() {
            self.error = Some(msg.to_string());
        }
    }
}
