//! Structural and type checks run by `LogicalPlanBuilder::build`.

use arrow_schema::{DataType, Schema};
use tdf_common::{Result, SchemaExt, TdfError};

use crate::logical_plan::{Expr, LogicalPlan};

/// Rejects plans the planner could not compile or that would fail for
/// every input.
pub fn validate(plan: &LogicalPlan) -> Result<()> {
    validate_node(plan, true)
}

fn validate_node(plan: &LogicalPlan, is_root: bool) -> Result<()> {
    if let Some(input) = plan.input() {
        validate_node(input, false)?;
    }
    match plan {
        LogicalPlan::Input {
            source, projection, ..
        } => {
            if let Some(cols) = projection {
                source
                    .schema()
                    .select(cols)
                    .map_err(|e| TdfError::Validation(format!("input projection: {e}")))?;
            }
        }
        LogicalPlan::Projection { input, exprs } => {
            if exprs.is_empty() {
                return Err(TdfError::Validation("projection has no expressions".into()));
            }
            let schema = input.schema()?;
            for e in exprs {
                no_aggregates(e, "projection")?;
                check_expr(e, &schema)?;
            }
        }
        LogicalPlan::Selection { input, predicate } => {
            no_aggregates(predicate, "filter")?;
            let schema = input.schema()?;
            let dt = check_expr(predicate, &schema)?;
            if dt != DataType::Boolean {
                return Err(TdfError::Validation(format!(
                    "filter predicate {predicate} is {dt:?}, expected Boolean"
                )));
            }
        }
        LogicalPlan::Aggregate {
            input,
            group_exprs,
            aggr_exprs,
        } => {
            if group_exprs.is_empty() && aggr_exprs.is_empty() {
                return Err(TdfError::Validation("aggregate has no expressions".into()));
            }
            let schema = input.schema()?;
            for g in group_exprs {
                no_aggregates(g, "group by")?;
                check_expr(g, &schema)?;
            }
            for a in aggr_exprs {
                let Expr::AggregateFunction(agg) = a else {
                    return Err(TdfError::Validation(format!(
                        "{a} is not an aggregate function"
                    )));
                };
                no_aggregates(&agg.expr, "aggregate operand")?;
                check_expr(a, &schema)?;
            }
        }
        LogicalPlan::Output { .. } => {
            if !is_root {
                return Err(TdfError::Validation(
                    "output must be the last operation".into(),
                ));
            }
        }
    }
    Ok(())
}

fn no_aggregates(e: &Expr, place: &str) -> Result<()> {
    if e.contains_aggregate() {
        return Err(TdfError::Validation(format!(
            "aggregate function not allowed in {place}: {e}"
        )));
    }
    Ok(())
}

/// Type-checks `e` against `schema` and returns its type.
fn check_expr(e: &Expr, schema: &Schema) -> Result<DataType> {
    match e {
        Expr::Column(_) | Expr::Literal(_) => e.data_type(schema),
        Expr::BinaryExpr { left, op, right } => {
            let l = check_expr(left, schema)?;
            let r = check_expr(right, schema)?;
            if op.is_logical() {
                if l != DataType::Boolean || r != DataType::Boolean {
                    return Err(TdfError::Validation(format!(
                        "{op} needs Boolean operands, got {l:?} and {r:?} in {e}"
                    )));
                }
            } else if l != r {
                return Err(TdfError::Validation(format!(
                    "type mismatch in {e}: {l:?} vs {r:?}"
                )));
            }
            Ok(DataType::Boolean)
        }
        Expr::AggregateFunction(agg) => {
            let inner = check_expr(&agg.expr, schema)?;
            agg.func.return_type(&inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::Field;
    use tdf_storage::MemTableProvider;

    use crate::builder::LogicalPlanBuilder;
    use crate::logical_plan::{AggregateExpr, AggregateFunction, BinaryOp, LiteralValue, Sink};

    use super::*;

    fn builder() -> LogicalPlanBuilder {
        let source = Arc::new(MemTableProvider::new(
            "t",
            Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, true),
            ])),
        ));
        LogicalPlanBuilder::new().input("t", source, None)
    }

    fn col(n: &str) -> Expr {
        Expr::Column(n.to_string())
    }

    fn cmp(l: Expr, op: BinaryOp, r: Expr) -> Expr {
        Expr::BinaryExpr {
            left: Box::new(l),
            op,
            right: Box::new(r),
        }
    }

    fn sum(e: Expr) -> Expr {
        Expr::AggregateFunction(AggregateExpr {
            func: AggregateFunction::Sum,
            expr: Box::new(e),
        })
    }

    fn assert_invalid(b: LogicalPlanBuilder, needle: &str) {
        let err = b.build().expect_err("must be rejected");
        assert!(matches!(err, TdfError::Validation(_)), "{err}");
        assert!(err.to_string().contains(needle), "{err}");
    }

    #[test]
    fn accepts_well_formed_chain() {
        builder()
            .filter(cmp(col("id"), BinaryOp::Lt, Expr::Literal(LiteralValue::Int64(3))))
            .project(vec![col("id")])
            .aggregate(vec![], vec![sum(col("id"))])
            .output(Sink::discard())
            .build()
            .expect("valid plan");
    }

    #[test]
    fn rejects_unknown_column() {
        assert_invalid(builder().project(vec![col("nope")]), "unknown column 'nope'");
    }

    #[test]
    fn rejects_non_boolean_predicate() {
        assert_invalid(builder().filter(col("id")), "expected Boolean");
    }

    #[test]
    fn rejects_mismatched_comparison_types() {
        assert_invalid(
            builder().filter(cmp(col("name"), BinaryOp::Eq, Expr::Literal(LiteralValue::Int64(1)))),
            "type mismatch",
        );
    }

    #[test]
    fn rejects_misplaced_aggregates() {
        assert_invalid(builder().project(vec![sum(col("id"))]), "not allowed in projection");
        assert_invalid(builder().aggregate(vec![col("id")], vec![col("id")]), "not an aggregate");
        assert_invalid(builder().aggregate(vec![], vec![sum(col("name"))]), "sum()");
    }

    #[test]
    fn rejects_steps_before_input_and_nested_output() {
        assert_invalid(LogicalPlanBuilder::new().filter(col("id")), "before input()");
        assert_invalid(
            builder().output(Sink::discard()).project(vec![col("id")]),
            "output must be the last",
        );
        assert_invalid(LogicalPlanBuilder::new(), "no input");
    }

    #[test]
    fn clone_does_not_share_root() {
        let base = builder().project(vec![col("id")]);
        let exec = base.clone().output(Sink::discard());
        assert!(matches!(base.build().expect("base"), LogicalPlan::Projection { .. }));
        assert!(matches!(exec.build().expect("exec"), LogicalPlan::Output { .. }));
    }
}
