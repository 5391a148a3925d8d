use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use tdf_planner::{
    pretty_print, AggregateExpr, AggregateFunction, BinaryOp, Expr, LiteralValue, LogicalPlan,
    LogicalPlanBuilder, Optimizer, Sink,
};
use tdf_storage::MemTableProvider;

fn source() -> Arc<MemTableProvider> {
    Arc::new(MemTableProvider::new(
        "t",
        Arc::new(Schema::new(vec![
            Field::new("c1", DataType::Int64, false),
            Field::new("c2", DataType::Int64, false),
            Field::new("c3", DataType::Int64, false),
        ])),
    ))
}

fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

fn lit(v: i64) -> Expr {
    Expr::Literal(LiteralValue::Int64(v))
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn agg(func: AggregateFunction, e: Expr) -> Expr {
    Expr::AggregateFunction(AggregateExpr {
        func,
        expr: Box::new(e),
    })
}

fn optimizer_snapshot(name: &str, plan: LogicalPlan) {
    let before = pretty_print(&plan, 0);
    let after = pretty_print(&Optimizer::new().optimize(plan).expect("optimize"), 0);
    let snapshot = format!(
        "# optimizer-golden: {name}\n\n## before\n{before}\n## after\n{after}"
    );

    let path = snapshot_path(name);
    if should_bless() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot dir");
        }
        fs::write(&path, snapshot).expect("write snapshot");
        return;
    }

    let expected = fs::read_to_string(&path).unwrap_or_else(|_| {
        panic!(
            "missing snapshot at {}. Run with BLESS=1 to create it.",
            path.display()
        )
    });
    if expected != snapshot {
        panic!(
            "snapshot mismatch for {name}\npath: {}\n\n{}\n\nRun with BLESS=1 to accept changes.",
            path.display(),
            unified_diff(&expected, &snapshot)
        );
    }
}

#[test]
fn golden_filter_project_aggregate() {
    let plan = LogicalPlanBuilder::new()
        .input("mem://t", source(), None)
        .filter(binary(col("c1"), BinaryOp::Eq, lit(200)))
        .project(vec![col("c1"), col("c2")])
        .aggregate(vec![col("c1")], vec![agg(AggregateFunction::Sum, col("c2"))])
        .build()
        .expect("plan");
    optimizer_snapshot("filter_project_aggregate", plan);
}

#[test]
fn golden_nested_predicate_columns() {
    let predicate = binary(
        binary(col("c3"), BinaryOp::Lt, lit(10)),
        BinaryOp::And,
        binary(col("c2"), BinaryOp::NotEq, lit(0)),
    );
    let plan = LogicalPlanBuilder::new()
        .input("mem://t", source(), None)
        .filter(predicate)
        .project(vec![col("c2"), col("c1")])
        .aggregate(
            vec![col("c2")],
            vec![
                agg(AggregateFunction::Max, col("c1")),
                agg(AggregateFunction::Min, col("c1")),
            ],
        )
        .build()
        .expect("plan");
    optimizer_snapshot("nested_predicate_columns", plan);
}

#[test]
fn golden_output_over_explicit_projection() {
    let plan = LogicalPlanBuilder::new()
        .input(
            "mem://t",
            source(),
            Some(vec!["c1".to_string(), "c2".to_string(), "c3".to_string()]),
        )
        .project(vec![col("c3")])
        .output(Sink::discard())
        .build()
        .expect("plan");
    optimizer_snapshot("output_over_explicit_projection", plan);
}

fn should_bless() -> bool {
    matches!(std::env::var("BLESS").as_deref(), Ok("1"))
        || matches!(std::env::var("UPDATE_SNAPSHOTS").as_deref(), Ok("1"))
}

fn snapshot_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
        .join("optimizer")
        .join(format!("{name}.snap"))
}

fn unified_diff(expected: &str, actual: &str) -> String {
    let exp: Vec<&str> = expected.lines().collect();
    let act: Vec<&str> = actual.lines().collect();
    let mut out = String::new();
    out.push_str("--- expected\n+++ actual\n");
    let max = exp.len().max(act.len());
    for i in 0..max {
        match (exp.get(i), act.get(i)) {
            (Some(e), Some(a)) if e == a => {
                out.push_str(&format!(" {:04} {e}\n", i + 1));
            }
            (Some(e), Some(a)) => {
                out.push_str(&format!("-{:04} {e}\n", i + 1));
                out.push_str(&format!("+{:04} {a}\n", i + 1));
            }
            (Some(e), None) => out.push_str(&format!("-{:04} {e}\n", i + 1)),
            (None, Some(a)) => out.push_str(&format!("+{:04} {a}\n", i + 1)),
            (None, None) => {}
        }
    }
    out
}
