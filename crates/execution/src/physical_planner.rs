//! Logical-to-physical translation.
//!
//! Contracts:
//! - the logical chain is walked once, leaf first, with a cursor holding the
//!   schema produced so far; every expression is bound against that schema
//! - operators are constructed in reverse data-flow order so each one
//!   receives its already-linked downstream operator
//! - any failure discards the partially built tree

use std::fmt;
use std::sync::Arc;

use arrow_schema::{DataType, Schema, SchemaRef};
use tdf_common::{Result, ScalarValue, SchemaExt, TdfError};
use tdf_planner::{Expr, LiteralValue, LogicalPlan, Sink};
use tracing::debug;

use crate::expressions::PhysicalExpr;
use crate::operators::{
    AggregateInput, OutputExec, PhysicalPlan, ProjectionExec, ScanExec, SelectionExec,
};
use crate::strategy::{AggregateParts, AggregateStrategyRegistry};

/// Turns an optimized logical plan into an executable operator tree.
pub trait QueryPlanner: Send + Sync + fmt::Debug {
    fn create_physical_plan(&self, logical: &LogicalPlan) -> Result<PhysicalPlan>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultQueryPlanner {
    strategies: AggregateStrategyRegistry,
}

impl DefaultQueryPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(strategies: AggregateStrategyRegistry) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &AggregateStrategyRegistry {
        &self.strategies
    }
}

/// Binds `expr` to the ordinals of `input`.
pub fn create_physical_expr(expr: &Expr, input: &Schema) -> Result<PhysicalExpr> {
    match expr {
        Expr::Column(name) => {
            let index = input.ordinal_of(name).ok_or_else(|| {
                TdfError::Planning(format!("no column named '{name}' in input schema"))
            })?;
            Ok(PhysicalExpr::Column {
                index,
                data_type: input.field(index).data_type().clone(),
            })
        }
        Expr::Literal(v) => Ok(PhysicalExpr::Literal(literal_value(v))),
        Expr::BinaryExpr { left, op, right } => Ok(PhysicalExpr::Binary {
            left: Box::new(create_physical_expr(left, input)?),
            op: *op,
            right: Box::new(create_physical_expr(right, input)?),
        }),
        Expr::AggregateFunction(agg) => Ok(PhysicalExpr::Aggregate {
            func: agg.func,
            expr: Box::new(create_physical_expr(&agg.expr, input)?),
        }),
    }
}

fn literal_value(v: &LiteralValue) -> ScalarValue {
    match v {
        LiteralValue::Int32(x) => ScalarValue::Int32(*x),
        LiteralValue::Int64(x) => ScalarValue::Int64(*x),
        LiteralValue::Float64(x) => ScalarValue::Float64(*x),
        LiteralValue::Utf8(x) => ScalarValue::Utf8(x.clone()),
        LiteralValue::Boolean(x) => ScalarValue::Boolean(*x),
    }
}

/// A compiled operator between the scan and the output.
enum Stage {
    Projection(Vec<PhysicalExpr>, SchemaRef),
    Selection(PhysicalExpr, SchemaRef),
    Aggregate(AggregateParts),
}

impl QueryPlanner for DefaultQueryPlanner {
    fn create_physical_plan(&self, logical: &LogicalPlan) -> Result<PhysicalPlan> {
        let LogicalPlan::Output { input, sink } = logical else {
            return Err(TdfError::Planning(
                "plan root must be an output operation".to_string(),
            ));
        };

        // root-to-leaf, Output excluded
        let mut chain = Vec::new();
        let mut node = input.as_ref();
        loop {
            match node {
                LogicalPlan::Output { .. } => {
                    return Err(TdfError::Planning(
                        "output operation must be the root of the plan".to_string(),
                    ))
                }
                LogicalPlan::Input { .. } => break,
                _ => {}
            }
            chain.push(node);
            node = node.input().ok_or_else(|| {
                TdfError::Planning(format!("operation without input in plan:\n{node}"))
            })?;
        }
        let LogicalPlan::Input {
            path,
            source,
            projection,
        } = node
        else {
            return Err(TdfError::Planning("plan has no input".to_string()));
        };

        let scan_schema = node.schema()?;
        let mut cursor = scan_schema.clone();
        let mut stages = Vec::with_capacity(chain.len());
        for node in chain.into_iter().rev() {
            let schema = node.schema()?;
            let stage = match node {
                LogicalPlan::Projection { exprs, .. } => Stage::Projection(
                    exprs
                        .iter()
                        .map(|e| create_physical_expr(e, &cursor))
                        .collect::<Result<Vec<_>>>()?,
                    schema.clone(),
                ),
                LogicalPlan::Selection { predicate, .. } => {
                    let predicate = create_physical_expr(predicate, &cursor)?;
                    let dt = predicate.data_type()?;
                    if dt != DataType::Boolean {
                        return Err(TdfError::Planning(format!(
                            "selection predicate {predicate} has type {dt}, expected Boolean"
                        )));
                    }
                    Stage::Selection(predicate, schema.clone())
                }
                LogicalPlan::Aggregate {
                    group_exprs,
                    aggr_exprs,
                    ..
                } => Stage::Aggregate(AggregateParts {
                    group_exprs: group_exprs
                        .iter()
                        .map(|e| create_physical_expr(e, &cursor))
                        .collect::<Result<Vec<_>>>()?,
                    aggr_exprs: aggr_exprs
                        .iter()
                        .map(|e| aggregate_input(e, &cursor))
                        .collect::<Result<Vec<_>>>()?,
                    schema: schema.clone(),
                }),
                LogicalPlan::Input { .. } | LogicalPlan::Output { .. } => {
                    unreachable!("chain holds only intermediate operations")
                }
            };
            stages.push(stage);
            cursor = schema;
        }

        let next = self.link(stages, sink.clone(), cursor)?;
        let plan = PhysicalPlan::Scan(ScanExec::new(
            path.clone(),
            Arc::clone(source),
            projection.clone(),
            scan_schema,
            vec![next],
        ));
        debug!(plan = %plan.display_indent(), "physical plan created");
        Ok(plan)
    }
}

impl DefaultQueryPlanner {
    /// Builds the operators downstream of the scan, output first.
    fn link(&self, stages: Vec<Stage>, sink: Sink, out_schema: SchemaRef) -> Result<PhysicalPlan> {
        let mut next = PhysicalPlan::Output(OutputExec::new(sink, out_schema));
        for stage in stages.into_iter().rev() {
            next = match stage {
                Stage::Projection(exprs, schema) => {
                    PhysicalPlan::Projection(ProjectionExec::new(exprs, schema, next))
                }
                Stage::Selection(predicate, schema) => {
                    PhysicalPlan::Selection(SelectionExec::new(predicate, schema, next))
                }
                Stage::Aggregate(parts) => {
                    debug!(
                        strategy = %self.strategies.select(&parts),
                        groups = parts.group_exprs.len(),
                        "aggregate strategy selected"
                    );
                    self.strategies.create(parts, next)?
                }
            };
        }
        Ok(next)
    }
}

fn aggregate_input(expr: &Expr, input: &Schema) -> Result<AggregateInput> {
    match expr {
        Expr::AggregateFunction(agg) => Ok(AggregateInput {
            func: agg.func,
            input: create_physical_expr(&agg.expr, input)?,
            input_type: agg.expr.data_type(input)?,
        }),
        other => Err(TdfError::Planning(format!(
            "{other} is not an aggregate function"
        ))),
    }
}
