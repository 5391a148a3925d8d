use crate::logical_plan::{Expr, LogicalPlan};

/// Renders `plan` one node per line, each line prefixed by `indent` tabs and
/// each child one tab deeper.
///
/// Tests and tools compare this output textually, so the format is stable:
///
/// ```text
/// Aggregate: groupExpr=[#c1], aggregateExpr=[sum(#c2)]
///     Projection: #c1, #c2
///         Filter: #c1 = 200
///             Input: t.parquet; projExpr=[c1 c2]
/// ```
pub fn pretty_print(plan: &LogicalPlan, indent: usize) -> String {
    let mut out = String::new();
    fmt_plan(plan, indent, &mut out);
    out
}

fn fmt_plan(plan: &LogicalPlan, indent: usize, out: &mut String) {
    out.push_str(&"\t".repeat(indent));
    match plan {
        LogicalPlan::Input {
            path, projection, ..
        } => {
            let proj = match projection {
                Some(cols) => format!("[{}]", cols.join(" ")),
                None => "None".to_string(),
            };
            out.push_str(&format!("Input: {path}; projExpr={proj}\n"));
        }
        LogicalPlan::Projection { input, exprs } => {
            out.push_str(&format!("Projection: {}\n", join(exprs, ", ")));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Selection { input, predicate } => {
            out.push_str(&format!("Filter: {predicate}\n"));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Aggregate {
            input,
            group_exprs,
            aggr_exprs,
        } => {
            out.push_str(&format!(
                "Aggregate: groupExpr=[{}], aggregateExpr=[{}]\n",
                join(group_exprs, " "),
                join(aggr_exprs, " ")
            ));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Output { input, .. } => {
            out.push_str("Output\n");
            fmt_plan(input, indent + 1, out);
        }
    }
}

fn join(exprs: &[Expr], sep: &str) -> String {
    exprs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}
