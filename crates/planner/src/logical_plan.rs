use std::fmt;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use tdf_common::{is_supported_type, Batch, Result, SchemaExt, TdfError};
use tdf_storage::TableProvider;

/// Scalar and aggregate expressions over named columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to an input column by name.
    Column(String),
    Literal(LiteralValue),
    BinaryExpr {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Reduction over an inner expression. Only valid in an aggregate list.
    AggregateFunction(AggregateExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
}

impl LiteralValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
            Self::Boolean(_) => DataType::Boolean,
        }
    }
}

/// Binary operators yielding a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    /// Looks up a function by its lowercase name (`sum`, `count`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "avg" => Some(Self::Avg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
        }
    }

    /// Output type for an operand of type `input`.
    pub fn return_type(self, input: &DataType) -> Result<DataType> {
        let numeric = matches!(input, DataType::Int32 | DataType::Int64 | DataType::Float64);
        match self {
            Self::Count => Ok(DataType::Int64),
            Self::Sum if matches!(input, DataType::Int32 | DataType::Int64) => Ok(DataType::Int64),
            Self::Sum if input == &DataType::Float64 => Ok(DataType::Float64),
            Self::Avg if numeric => Ok(DataType::Float64),
            Self::Min | Self::Max if is_supported_type(input) => Ok(input.clone()),
            _ => Err(TdfError::Validation(format!(
                "{}() does not accept {input:?} operands",
                self.name()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub func: AggregateFunction,
    pub expr: Box<Expr>,
}

impl Expr {
    /// Output type of this expression over `input`.
    pub fn data_type(&self, input: &Schema) -> Result<DataType> {
        match self {
            Expr::Column(name) => input
                .ordinal_of(name)
                .map(|i| input.field(i).data_type().clone())
                .ok_or_else(|| TdfError::Validation(format!("unknown column '{name}'"))),
            Expr::Literal(v) => Ok(v.data_type()),
            Expr::BinaryExpr { .. } => Ok(DataType::Boolean),
            Expr::AggregateFunction(agg) => agg.func.return_type(&agg.expr.data_type(input)?),
        }
    }

    /// Output field of this expression over `input`. Columns keep their input
    /// field; anything else is named after its display form.
    pub fn to_field(&self, input: &Schema) -> Result<Field> {
        match self {
            Expr::Column(name) => input
                .ordinal_of(name)
                .map(|i| input.field(i).clone())
                .ok_or_else(|| TdfError::Validation(format!("unknown column '{name}'"))),
            other => Ok(Field::new(other.to_string(), other.data_type(input)?, true)),
        }
    }

    /// Every column name referenced, in first-seen order, duplicates included.
    pub fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column(name) => out.push(name.clone()),
            Expr::Literal(_) => {}
            Expr::BinaryExpr { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::AggregateFunction(agg) => agg.expr.collect_columns(out),
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::AggregateFunction(_) => true,
            Expr::BinaryExpr { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::Column(_) | Expr::Literal(_) => false,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "'{v}'"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "#{name}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::BinaryExpr { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::AggregateFunction(agg) => write!(f, "{}({})", agg.func.name(), agg.expr),
        }
    }
}

/// Terminal callback receiving result batches.
pub type SinkFn = dyn Fn(Batch) -> Result<()> + Send + Sync;

#[derive(Clone)]
pub struct Sink(Arc<SinkFn>);

impl Sink {
    pub fn new(f: impl Fn(Batch) -> Result<()> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Sink that drops every batch.
    pub fn discard() -> Self {
        Self::new(|_| Ok(()))
    }

    pub fn call(&self, batch: Batch) -> Result<()> {
        (self.0)(batch)
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sink")
    }
}

/// Relational operations forming a chain from the root down to one scan.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    Input {
        path: String,
        source: Arc<dyn TableProvider>,
        /// Columns to read. `None` reads every column.
        projection: Option<Vec<String>>,
    },
    Projection {
        input: Box<LogicalPlan>,
        exprs: Vec<Expr>,
    },
    Selection {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        group_exprs: Vec<Expr>,
        aggr_exprs: Vec<Expr>,
    },
    Output {
        input: Box<LogicalPlan>,
        sink: Sink,
    },
}

impl LogicalPlan {
    pub fn input(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Input { .. } => None,
            LogicalPlan::Projection { input, .. }
            | LogicalPlan::Selection { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Output { input, .. } => Some(input),
        }
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        self.input().into_iter().collect()
    }

    /// Schema produced by this node, derived from its input.
    pub fn schema(&self) -> Result<SchemaRef> {
        match self {
            LogicalPlan::Input {
                source, projection, ..
            } => {
                let schema = source.schema();
                match projection {
                    Some(cols) => Ok(Arc::new(schema.select(cols)?)),
                    None => Ok(schema),
                }
            }
            LogicalPlan::Projection { input, exprs } => {
                let in_schema = input.schema()?;
                let fields = exprs
                    .iter()
                    .map(|e| e.to_field(&in_schema))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(Schema::new(fields)))
            }
            LogicalPlan::Selection { input, .. } | LogicalPlan::Output { input, .. } => {
                input.schema()
            }
            LogicalPlan::Aggregate {
                input,
                group_exprs,
                aggr_exprs,
            } => {
                let in_schema = input.schema()?;
                let fields = group_exprs
                    .iter()
                    .chain(aggr_exprs)
                    .map(|e| e.to_field(&in_schema))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(Schema::new(fields)))
            }
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::explain::pretty_print(self, 0))
    }
}
