//! Push-based physical operators.
//!
//! A physical plan is a chain rooted at a [`ScanExec`]: the scan drives the
//! query and pushes batches into its downstream operators, each of which
//! owns its own downstream (`next`) link. Links are fixed at construction.
//!
//! Operator roles are strict. `execute` is only valid on a scan, while
//! `callback` and `finish` are only valid on the operators below it. Calling
//! a method outside its role is a bug in the caller and panics.

mod aggregate;
mod output;
mod projection;
mod scan;
mod selection;

use arrow_schema::SchemaRef;
use tdf_common::{Batch, Result, TaskContext};

pub use aggregate::{
    encode_group_key, AggregateExec, AggregateInput, GroupEntry, GroupTable, HashAggregateExec, HashGroups,
    OrderedAggregateExec, OrderedGroups,
};
pub use output::OutputExec;
pub use projection::ProjectionExec;
pub use scan::ScanExec;
pub use selection::SelectionExec;

#[derive(Debug)]
pub enum PhysicalPlan {
    Scan(ScanExec),
    Projection(ProjectionExec),
    Selection(SelectionExec),
    HashAggregate(HashAggregateExec),
    OrderedAggregate(OrderedAggregateExec),
    Output(OutputExec),
}

impl PhysicalPlan {
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalPlan::Scan(_) => "Scan",
            PhysicalPlan::Projection(_) => "Projection",
            PhysicalPlan::Selection(_) => "Selection",
            PhysicalPlan::HashAggregate(_) => "HashAggregate",
            PhysicalPlan::OrderedAggregate(_) => "OrderedAggregate",
            PhysicalPlan::Output(_) => "Output",
        }
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            PhysicalPlan::Scan(op) => op.schema(),
            PhysicalPlan::Projection(op) => op.schema(),
            PhysicalPlan::Selection(op) => op.schema(),
            PhysicalPlan::HashAggregate(op) => op.schema(),
            PhysicalPlan::OrderedAggregate(op) => op.schema(),
            PhysicalPlan::Output(op) => op.schema(),
        }
    }

    /// Downstream operators this one pushes into.
    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::Scan(op) => op.next.iter().collect(),
            PhysicalPlan::Projection(op) => vec![op.next.as_ref()],
            PhysicalPlan::Selection(op) => vec![op.next.as_ref()],
            PhysicalPlan::HashAggregate(op) => vec![op.next.as_ref()],
            PhysicalPlan::OrderedAggregate(op) => vec![op.next.as_ref()],
            PhysicalPlan::Output(_) => vec![],
        }
    }

    /// Receives one batch from upstream.
    ///
    /// # Panics
    /// When called on a scan.
    pub fn callback(&mut self, batch: Batch) -> Result<()> {
        match self {
            PhysicalPlan::Scan(_) => panic!("callback() called on a scan; scans only produce"),
            PhysicalPlan::Projection(op) => op.callback(batch),
            PhysicalPlan::Selection(op) => op.callback(batch),
            PhysicalPlan::HashAggregate(op) => op.callback(batch),
            PhysicalPlan::OrderedAggregate(op) => op.callback(batch),
            PhysicalPlan::Output(op) => op.callback(batch),
        }
    }

    /// Signals end of input; stateful operators flush before propagating.
    ///
    /// # Panics
    /// When called on a scan.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            PhysicalPlan::Scan(_) => panic!("finish() called on a scan; scans finish their children"),
            PhysicalPlan::Projection(op) => op.next.finish(),
            PhysicalPlan::Selection(op) => op.next.finish(),
            PhysicalPlan::HashAggregate(op) => op.finish(),
            PhysicalPlan::OrderedAggregate(op) => op.finish(),
            PhysicalPlan::Output(_) => Ok(()),
        }
    }

    /// Runs the whole pipeline.
    ///
    /// # Panics
    /// When called on anything but a scan.
    pub async fn execute(&mut self, ctx: &TaskContext) -> Result<()> {
        match self {
            PhysicalPlan::Scan(scan) => scan.execute(ctx).await,
            other => panic!(
                "execute() called on {}; only a scan can drive a query",
                other.name()
            ),
        }
    }

    /// Indented rendering in data-flow order, scan first.
    pub fn display_indent(&self) -> String {
        let mut out = String::new();
        fmt_plan(self, 0, &mut out);
        out
    }
}

fn fmt_plan(plan: &PhysicalPlan, indent: usize, out: &mut String) {
    out.push_str(&"\t".repeat(indent));
    let line = match plan {
        PhysicalPlan::Scan(op) => {
            let proj = match &op.projection {
                Some(cols) => format!("[{}]", cols.join(" ")),
                None => "None".to_string(),
            };
            format!("Scan: {}; projection={proj}", op.path)
        }
        PhysicalPlan::Projection(op) => format!("Projection: {}", join(&op.exprs, ", ")),
        PhysicalPlan::Selection(op) => format!("Selection: {}", op.predicate),
        PhysicalPlan::HashAggregate(op) => fmt_aggregate("HashAggregate", op),
        PhysicalPlan::OrderedAggregate(op) => fmt_aggregate("OrderedAggregate", op),
        PhysicalPlan::Output(_) => "Output".to_string(),
    };
    out.push_str(&line);
    out.push('\n');
    for child in plan.children() {
        fmt_plan(child, indent + 1, out);
    }
}

fn fmt_aggregate<T: GroupTable>(name: &str, op: &AggregateExec<T>) -> String {
    let aggs: Vec<String> = op
        .aggr_exprs
        .iter()
        .map(|a| format!("{}({})", a.func.name(), a.input))
        .collect();
    format!(
        "{name}: groupExpr=[{}], aggregateExpr=[{}]",
        join(&op.group_exprs, " "),
        aggs.join(" ")
    )
}

fn join<T: std::fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}
